// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域模型模块
///
/// 提取规则、抓取选项、单页结果与抓取结果
pub mod extraction_rule;
pub mod options;
pub mod page;
pub mod scrape_result;
