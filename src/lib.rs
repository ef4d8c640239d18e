// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 应用程序模块
///
/// 抓取编排器与按抓取方式选择的抓取器
pub mod application;

/// 配置模块
///
/// 处理应用程序的配置设置和环境变量
pub mod config;

/// 文档模块
///
/// 静态 HTML 与浏览器渲染结果的统一查询接口
pub mod documents;

/// 领域模块
///
/// 包含核心数据结构和领域服务
pub mod domain;

/// 引擎模块
///
/// HTTP 与无头浏览器两种抓取后端
pub mod engines;

/// 工具模块
///
/// 提供通用的工具函数和辅助功能
pub mod utils;
