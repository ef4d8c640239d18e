// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域层模块
///
/// - 领域模型（models）：提取规则、抓取选项、页面数据和抓取结果
/// - 服务（services）：规则求值、值变换、页面分析和分页决策
///
/// 领域层不依赖具体的抓取后端
pub mod models;
pub mod services;
