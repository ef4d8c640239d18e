// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域服务模块
///
/// 包含的服务：
/// - 提取服务（extraction_service）：对任意文档表示求值提取规则
/// - 页面分析（page_analysis）：元数据、链接、图片和表格
/// - 分页服务（pagination_service）：决定下一页地址与停止条件
/// - 值变换（transforms）：规则上的 strip / lower / upper / int / float / bool
pub mod extraction_service;
pub mod page_analysis;
pub mod pagination_service;
pub mod transforms;
