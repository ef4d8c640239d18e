// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 层级路径查询
//!
//! 支持的 XPath 子集:
//!
//! - 绝对路径 `/html/body`、任意层级 `//div`、相对路径 `body/div`、`.//a`
//! - 名称测试与通配符 `*`，`.` 与 `..`
//! - 结尾步骤 `text()` 与 `@attr` / `@*`
//! - 谓词: `[2]`、`[last()]`、`[@id]`、`[@id='x']`、`[@id!='x']`、`[text()='x']`、
//!   `[contains(@class,'x')]`、`[starts-with(.,'x')]`、`[child]`

use crate::documents::static_document::element_text;
use crate::documents::{DocumentError, PathMatch};
use scraper::{ElementRef, Html};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Child,
    Descendant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum NameTest {
    Any,
    Named(String),
}

impl NameTest {
    fn matches(&self, element: &ElementRef<'_>) -> bool {
        match self {
            NameTest::Any => true,
            NameTest::Named(name) => element.value().name().eq_ignore_ascii_case(name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum StepKind {
    Element(NameTest),
    Text,
    Attribute(NameTest),
    SelfNode,
    Parent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Operand {
    Attribute(String),
    Text,
    Context,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Predicate {
    Position(usize),
    Last,
    HasAttribute(String),
    AttributeEquals(String, String),
    AttributeNotEquals(String, String),
    TextEquals(String),
    Contains(Operand, String),
    StartsWith(Operand, String),
    HasChild(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Step {
    axis: Axis,
    kind: StepKind,
    predicates: Vec<Predicate>,
}

/// 已解析的路径表达式
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathQuery {
    source: String,
    absolute: bool,
    steps: Vec<Step>,
}

#[derive(Clone, Copy)]
enum Context<'a> {
    Document,
    Element(ElementRef<'a>),
}

impl PathQuery {
    /// 解析路径表达式
    pub fn parse(path: &str) -> Result<Self, DocumentError> {
        Parser::new(path).parse()
    }

    /// 在文档上求值
    pub fn evaluate<'a>(&self, html: &'a Html) -> Result<Vec<PathMatch<ElementRef<'a>>>, DocumentError> {
        let start = if self.absolute {
            Context::Document
        } else {
            Context::Element(html.root_element())
        };
        let mut contexts = vec![start];

        for (index, step) in self.steps.iter().enumerate() {
            let is_last = index + 1 == self.steps.len();
            match &step.kind {
                StepKind::Text | StepKind::Attribute(_) => {
                    if !is_last {
                        return Err(self.error("text() and @attribute must be the final step"));
                    }
                    if !step.predicates.is_empty() {
                        return Err(self.error("predicates are only supported on element steps"));
                    }
                    return Ok(self
                        .terminal_values(html, &contexts, step)
                        .into_iter()
                        .map(PathMatch::Value)
                        .collect());
                }
                _ => contexts = self.apply_step(html, &contexts, step),
            }
        }

        Ok(contexts
            .into_iter()
            .filter_map(|ctx| match ctx {
                Context::Element(element) => Some(PathMatch::Node(element)),
                Context::Document => None,
            })
            .collect())
    }

    fn error(&self, reason: &str) -> DocumentError {
        DocumentError::InvalidPath {
            path: self.source.clone(),
            reason: reason.to_string(),
        }
    }

    fn apply_step<'a>(
        &self,
        html: &'a Html,
        contexts: &[Context<'a>],
        step: &Step,
    ) -> Vec<Context<'a>> {
        let bases = match step.axis {
            Axis::Child => contexts.to_vec(),
            Axis::Descendant => descendant_or_self(html, contexts),
        };

        let mut seen = HashSet::new();
        let mut output = Vec::new();
        for base in bases {
            let candidates: Vec<Context<'a>> = match &step.kind {
                StepKind::Element(test) => children(html, base)
                    .into_iter()
                    .filter(|el| test.matches(el))
                    .map(Context::Element)
                    .collect(),
                StepKind::SelfNode => vec![base],
                StepKind::Parent => parent(base).into_iter().collect(),
                StepKind::Text | StepKind::Attribute(_) => Vec::new(),
            };

            for ctx in apply_predicates(candidates, &step.predicates) {
                let key = match ctx {
                    Context::Document => None,
                    Context::Element(el) => Some(el.id()),
                };
                if seen.insert(key) {
                    output.push(ctx);
                }
            }
        }

        if output.len() < 2 {
            return output;
        }

        // Union in document order; node ids follow creation order, not tree position
        let mut ordered = Vec::with_capacity(output.len());
        if seen.contains(&None) {
            ordered.push(Context::Document);
        }
        ordered.extend(
            html.root_element()
                .descendants()
                .filter(|node| seen.contains(&Some(node.id())))
                .filter_map(ElementRef::wrap)
                .map(Context::Element),
        );
        ordered
    }

    fn terminal_values<'a>(
        &self,
        html: &'a Html,
        contexts: &[Context<'a>],
        step: &Step,
    ) -> Vec<String> {
        let elements: Vec<ElementRef<'a>> = match step.axis {
            Axis::Child => contexts
                .iter()
                .filter_map(|ctx| match ctx {
                    Context::Element(el) => Some(*el),
                    Context::Document => None,
                })
                .collect(),
            Axis::Descendant => {
                let mut seen = HashSet::new();
                let mut all = Vec::new();
                for ctx in contexts {
                    let root = match ctx {
                        Context::Element(el) => *el,
                        Context::Document => html.root_element(),
                    };
                    for el in root.descendants().filter_map(ElementRef::wrap) {
                        if seen.insert(el.id()) {
                            all.push(el);
                        }
                    }
                }
                all
            }
        };

        let mut values = Vec::new();
        for element in elements {
            match &step.kind {
                StepKind::Text => {
                    for child in element.children() {
                        if let Some(text) = child.value().as_text() {
                            let text: &str = text;
                            if !text.trim().is_empty() {
                                values.push(text.to_string());
                            }
                        }
                    }
                }
                StepKind::Attribute(NameTest::Named(name)) => {
                    if let Some(value) = element.value().attr(name) {
                        values.push(value.to_string());
                    }
                }
                StepKind::Attribute(NameTest::Any) => {
                    values.extend(element.value().attrs().map(|(_, v)| v.to_string()));
                }
                _ => {}
            }
        }
        values
    }
}

/// 文档根节点之外只有根元素一个子元素
fn children<'a>(html: &'a Html, ctx: Context<'a>) -> Vec<ElementRef<'a>> {
    match ctx {
        Context::Document => vec![html.root_element()],
        Context::Element(el) => el.children().filter_map(ElementRef::wrap).collect(),
    }
}

fn parent(ctx: Context<'_>) -> Option<Context<'_>> {
    match ctx {
        Context::Document => None,
        Context::Element(el) => Some(match el.parent().and_then(ElementRef::wrap) {
            Some(parent) => Context::Element(parent),
            None => Context::Document,
        }),
    }
}

fn descendant_or_self<'a>(html: &'a Html, contexts: &[Context<'a>]) -> Vec<Context<'a>> {
    let mut seen = HashSet::new();
    let mut output = Vec::new();
    for ctx in contexts {
        let root = match ctx {
            Context::Document => {
                if seen.insert(None) {
                    output.push(Context::Document);
                }
                html.root_element()
            }
            Context::Element(el) => *el,
        };
        for el in root.descendants().filter_map(ElementRef::wrap) {
            if seen.insert(Some(el.id())) {
                output.push(Context::Element(el));
            }
        }
    }
    output
}

fn apply_predicates<'a>(mut nodes: Vec<Context<'a>>, predicates: &[Predicate]) -> Vec<Context<'a>> {
    for predicate in predicates {
        let total = nodes.len();
        nodes = nodes
            .into_iter()
            .enumerate()
            .filter(|(index, ctx)| predicate_holds(predicate, *ctx, index + 1, total))
            .map(|(_, ctx)| ctx)
            .collect();
    }
    nodes
}

fn predicate_holds(predicate: &Predicate, ctx: Context<'_>, position: usize, total: usize) -> bool {
    let element = match ctx {
        Context::Element(el) => el,
        Context::Document => return false,
    };
    let attr = |name: &str| element.value().attr(name);

    match predicate {
        Predicate::Position(n) => position == *n,
        Predicate::Last => position == total,
        Predicate::HasAttribute(name) => attr(name).is_some(),
        Predicate::AttributeEquals(name, value) => attr(name) == Some(value.as_str()),
        Predicate::AttributeNotEquals(name, value) => {
            attr(name).is_some_and(|v| v != value.as_str())
        }
        Predicate::TextEquals(value) => direct_text(&element) == *value,
        Predicate::Contains(operand, needle) => {
            operand_value(operand, &element).is_some_and(|v| v.contains(needle.as_str()))
        }
        Predicate::StartsWith(operand, prefix) => {
            operand_value(operand, &element).is_some_and(|v| v.starts_with(prefix.as_str()))
        }
        Predicate::HasChild(name) => element
            .children()
            .filter_map(ElementRef::wrap)
            .any(|child| child.value().name().eq_ignore_ascii_case(name)),
    }
}

fn direct_text(element: &ElementRef<'_>) -> String {
    element
        .children()
        .filter_map(|child| child.value().as_text().map(|t| t.to_string()))
        .collect::<String>()
        .trim()
        .to_string()
}

fn operand_value(operand: &Operand, element: &ElementRef<'_>) -> Option<String> {
    match operand {
        Operand::Attribute(name) => element.value().attr(name).map(str::to_string),
        Operand::Text => Some(direct_text(element)),
        Operand::Context => Some(element_text(element)),
    }
}

struct Parser<'s> {
    source: &'s str,
    chars: Vec<char>,
    pos: usize,
}

impl<'s> Parser<'s> {
    fn new(source: &'s str) -> Self {
        Self {
            source,
            chars: source.trim().chars().collect(),
            pos: 0,
        }
    }

    fn error(&self, reason: impl Into<String>) -> DocumentError {
        DocumentError::InvalidPath {
            path: self.source.to_string(),
            reason: reason.into(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn consume(&mut self, token: &str) -> bool {
        let len = token.chars().count();
        let matches = self.chars.len() >= self.pos + len
            && self.chars[self.pos..self.pos + len].iter().copied().eq(token.chars());
        if matches {
            self.pos += len;
        }
        matches
    }

    fn expect(&mut self, token: &str) -> Result<(), DocumentError> {
        if self.consume(token) {
            Ok(())
        } else {
            Err(self.error(format!("expected '{}' at position {}", token, self.pos)))
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn parse(mut self) -> Result<PathQuery, DocumentError> {
        if self.at_end() {
            return Err(self.error("path is empty"));
        }

        let (absolute, mut axis) = if self.consume("//") {
            (true, Axis::Descendant)
        } else if self.consume("/") {
            (true, Axis::Child)
        } else {
            (false, Axis::Child)
        };

        let mut steps = Vec::new();
        loop {
            self.skip_whitespace();
            let kind = self.parse_step_kind()?;
            let mut predicates = Vec::new();
            self.skip_whitespace();
            while self.consume("[") {
                predicates.push(self.parse_predicate()?);
                self.skip_whitespace();
                self.expect("]")?;
                self.skip_whitespace();
            }
            steps.push(Step {
                axis,
                kind,
                predicates,
            });

            if self.at_end() {
                break;
            }
            axis = if self.consume("//") {
                Axis::Descendant
            } else if self.consume("/") {
                Axis::Child
            } else {
                return Err(self.error(format!("unexpected character at position {}", self.pos)));
            };
        }

        Ok(PathQuery {
            source: self.source.to_string(),
            absolute,
            steps,
        })
    }

    fn parse_step_kind(&mut self) -> Result<StepKind, DocumentError> {
        if self.consume("..") {
            return Ok(StepKind::Parent);
        }
        if self.consume(".") {
            return Ok(StepKind::SelfNode);
        }
        if self.consume("@") {
            return Ok(StepKind::Attribute(self.parse_name_test()?));
        }
        if self.consume("text()") {
            return Ok(StepKind::Text);
        }
        Ok(StepKind::Element(self.parse_name_test()?))
    }

    fn parse_name_test(&mut self) -> Result<NameTest, DocumentError> {
        if self.consume("*") {
            return Ok(NameTest::Any);
        }
        let name = self.parse_name()?;
        Ok(NameTest::Named(name))
    }

    fn parse_name(&mut self) -> Result<String, DocumentError> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            self.pos += 1;
        }
        if start == self.pos {
            return Err(self.error(format!("expected a name at position {}", start)));
        }
        Ok(self.chars[start..self.pos].iter().collect())
    }

    fn parse_literal(&mut self) -> Result<String, DocumentError> {
        self.skip_whitespace();
        let quote = match self.peek() {
            Some(q @ ('\'' | '"')) => q,
            _ => return Err(self.error(format!("expected a quoted string at position {}", self.pos))),
        };
        self.pos += 1;
        let start = self.pos;
        while self.peek().is_some_and(|c| c != quote) {
            self.pos += 1;
        }
        if self.at_end() {
            return Err(self.error("unterminated string literal"));
        }
        let literal = self.chars[start..self.pos].iter().collect();
        self.pos += 1;
        Ok(literal)
    }

    fn parse_operand(&mut self) -> Result<Operand, DocumentError> {
        self.skip_whitespace();
        if self.consume("@") {
            return Ok(Operand::Attribute(self.parse_name()?));
        }
        if self.consume("text()") {
            return Ok(Operand::Text);
        }
        if self.consume(".") {
            return Ok(Operand::Context);
        }
        Err(self.error(format!("expected @attr, text() or '.' at position {}", self.pos)))
    }

    fn parse_function_args(&mut self) -> Result<(Operand, String), DocumentError> {
        let operand = self.parse_operand()?;
        self.skip_whitespace();
        self.expect(",")?;
        let literal = self.parse_literal()?;
        self.skip_whitespace();
        self.expect(")")?;
        Ok((operand, literal))
    }

    fn parse_predicate(&mut self) -> Result<Predicate, DocumentError> {
        self.skip_whitespace();

        if self.peek().is_some_and(|c| c.is_ascii_digit()) {
            let start = self.pos;
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.pos += 1;
            }
            let digits: String = self.chars[start..self.pos].iter().collect();
            let position: usize = digits
                .parse()
                .map_err(|_| self.error("position predicate is out of range"))?;
            if position == 0 {
                return Err(self.error("positions start at 1"));
            }
            return Ok(Predicate::Position(position));
        }
        if self.consume("last()") {
            return Ok(Predicate::Last);
        }
        if self.consume("contains(") {
            let (operand, literal) = self.parse_function_args()?;
            return Ok(Predicate::Contains(operand, literal));
        }
        if self.consume("starts-with(") {
            let (operand, literal) = self.parse_function_args()?;
            return Ok(Predicate::StartsWith(operand, literal));
        }
        if self.consume("text()") {
            self.skip_whitespace();
            self.expect("=")?;
            return Ok(Predicate::TextEquals(self.parse_literal()?));
        }
        if self.consume("@") {
            let name = self.parse_name()?;
            self.skip_whitespace();
            if self.consume("!=") {
                return Ok(Predicate::AttributeNotEquals(name, self.parse_literal()?));
            }
            if self.consume("=") {
                return Ok(Predicate::AttributeEquals(name, self.parse_literal()?));
            }
            return Ok(Predicate::HasAttribute(name));
        }

        Ok(Predicate::HasChild(self.parse_name()?))
    }
}
