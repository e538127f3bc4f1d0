// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # Exception 模块
//!
//! 该模块定义了请求分发器在处理生命周期中可能抛出的各类异常情况。
//!
//! ## 设计意图
//! - **错误分类**：涵盖了协议解析错误、路由注册错误以及响应写入错误。
//! - **传播策略**：解析与注册错误以 `Result` 返回给调用方，绝不静默吞掉；
//!   路由未命中不属于异常，由 `Router` 以兜底处理器解决。
//! - **上下文记录**：出错位置的具体内容（报文行、路径等）在检测处通过日志
//!   记录，枚举本身保持无字段、可 `Copy`。

use std::fmt;

/// 分发器处理请求过程中发生的异常类型。
///
/// 该枚举通常作为 `Result` 的 `Err` 部分返回，用于指示处理失败的具体原因。
#[derive(Debug, Copy, Clone)]
pub enum Exception {
    /// 连接在发送任何字节之前就被关闭，没有可解析的请求。
    EmptyRequest,
    /// 请求行无法按单个空格切分出恰好三个记号（方法、路径、协议）。
    MalformedStatusLine,
    /// 某个头字段行中不含冒号，无法切分出键值对。
    MalformedHeader,
    /// 读取或写入字节流时发生的 I/O 错误（不含正常的流结束）。
    TransportError,
    /// 在已经挂有处理器的路径上再次注册处理器。首次注册保持有效。
    DuplicateRoute,
    /// 注册路径既非空串又不以 `/` 开头。
    InvalidPathSyntax,
    /// 状态码超出 100 到 599 的合法区间。
    InvalidStatusCode,
    /// 匹配到的路由路径与请求路径在结构上不一致。该错误指示分发器内部
    /// 的缺陷而非非法输入，不应被当作普通的"未找到"结果处理。
    RouteParamMismatch,
}

use Exception::*;

/// 为 `Exception` 实现 `Display` 特性，使其支持字符串格式化输出。
///
/// 这些描述信息主要用于系统日志（Logging）以及启动失败时的报错输出。
impl fmt::Display for Exception {
    /// 根据错误类型写入人类可读的描述文本。
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmptyRequest => write!(f, "Empty request"),
            MalformedStatusLine => write!(f, "Malformed status line"),
            MalformedHeader => write!(f, "Malformed header line"),
            TransportError => write!(f, "Failed to read or write stream data"),
            DuplicateRoute => write!(f, "A handler is already registered at this path"),
            InvalidPathSyntax => write!(f, "Route path must be empty or start with '/'"),
            InvalidStatusCode => write!(f, "Invalid http status code"),
            RouteParamMismatch => write!(f, "Handler path and request path do not line up"),
        }
    }
}
