// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 路由模块
//!
//! 该模块实现按 HTTP 方法组织的路径前缀树（Trie）：
//! - 每个节点对应路径中的一个段（Segment），以 `:` 开头的段是命名通配符，
//!   可以匹配任意字面段并把匹配值绑定到同名参数上。
//! - 子节点按注册顺序存放；匹配采用深度优先、先到先得的策略，字面段与
//!   通配符段之间不做特异性比较，注册顺序是唯一的决胜规则。
//! - 路由表在启动阶段一次性构建完成，此后只读，可被任意多个连接任务
//!   并发查询而无需加锁。
//!
//! 路由未命中不是错误：查询统一落到兜底的"未找到"处理器上。

use crate::exception::Exception;
use crate::request::Request;
use crate::response::ResponseWriter;

use log::error;

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// 处理器返回的装箱 Future
pub type HandlerFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// 请求处理器。
///
/// 处理器接收解析完成的 [`Request`]（路由参数已填充）和一个
/// [`ResponseWriter`]，每次调用应当恰好产生一个完整的响应。
pub type Handler = Arc<dyn Fn(Request, ResponseWriter) -> HandlerFuture + Send + Sync>;

/// 前缀树中的一个节点。
struct RouteNode {
    /// 从根到本节点的完整注册路径（以 `/` 连接），用于参数提取
    path: String,
    /// 本节点对应的段文本
    segment: String,
    /// 段是否为命名通配符（以 `:` 开头）
    is_wildcard: bool,
    /// 挂在本节点上的处理器。一个节点至多一个。
    handler: Option<Handler>,
    /// 子节点，按注册顺序存放
    children: Vec<RouteNode>,
}

impl RouteNode {
    fn new(path: String, segment: String, is_wildcard: bool) -> Self {
        Self {
            path,
            segment,
            is_wildcard,
            handler: None,
            children: Vec::new(),
        }
    }

    fn root() -> Self {
        Self::new(String::new(), String::new(), false)
    }

    /// 沿着剩余路径逐段下降，必要时创建新节点，最终把处理器挂到
    /// 终点节点上。终点已有处理器时返回 [`Exception::DuplicateRoute`]，
    /// 不覆盖原处理器。
    fn add_node(&mut self, tail_path: &str, handler: Handler) -> Result<(), Exception> {
        let tail_path = tail_path.trim_matches('/');
        if tail_path.is_empty() {
            if self.handler.is_some() {
                error!("路径'{}'上已经注册过处理器", self.path);
                return Err(Exception::DuplicateRoute);
            }
            self.handler = Some(handler);
            return Ok(());
        }

        let (segment, rest, has_rest) = match tail_path.split_once('/') {
            Some((segment, rest)) => (segment, rest, true),
            None => (tail_path, "", false),
        };

        // 已有同名子节点（按段文本的字面相等判断）则直接下降
        if let Some(index) = self
            .children
            .iter()
            .position(|child| child.segment == segment)
        {
            return self.children[index].add_node(rest, handler);
        }

        let mut child = RouteNode::new(
            format!("{}/{}", self.path, segment),
            segment.to_string(),
            segment.starts_with(':'),
        );
        if has_rest {
            child.add_node(rest, handler)?;
        } else {
            child.handler = Some(handler);
        }
        self.children.push(child);
        Ok(())
    }

    /// 在本节点的子树中匹配剩余路径。
    ///
    /// 剩余路径耗尽时，当且仅当本节点挂有处理器才算命中；否则取出下一
    /// 个段，按注册顺序尝试每个候选子节点（通配符子节点匹配任何字面段，
    /// 字面子节点要求段文本相等），深度优先地返回第一个成功的匹配。
    fn find(&self, path: &str) -> Option<&RouteNode> {
        let path = path.strip_prefix('/').unwrap_or(path);
        if path.is_empty() {
            if self.handler.is_some() {
                return Some(self);
            }
            return None;
        }

        let (segment, rest) = match path.split_once('/') {
            Some((segment, rest)) => (segment, rest),
            None => (path, ""),
        };
        for child in &self.children {
            if !child.is_wildcard && child.segment != segment {
                continue;
            }
            if let Some(node) = child.find(rest) {
                return Some(node);
            }
        }
        None
    }
}

/// 按 HTTP 方法组织的路由表。
///
/// 启动阶段一次性构建；此后只读，由各连接任务并发查询。
pub struct Router {
    method_trees: HashMap<String, RouteNode>,
    not_found_handler: Handler,
}

impl Router {
    pub fn new() -> Self {
        Self {
            method_trees: HashMap::new(),
            not_found_handler: Arc::new(|request, response| {
                Box::pin(default_not_found(request, response))
            }),
        }
    }

    /// 在指定方法与路径上注册处理器。
    ///
    /// `path` 必须为空串或以 `/` 开头，否则返回
    /// [`Exception::InvalidPathSyntax`]；在已有处理器的路径上重复注册
    /// 返回 [`Exception::DuplicateRoute`]。
    pub fn register<F>(&mut self, method: &str, path: &str, handler: F) -> Result<(), Exception>
    where
        F: Fn(Request, ResponseWriter) -> HandlerFuture + Send + Sync + 'static,
    {
        if !path.is_empty() && !path.starts_with('/') {
            error!("注册路径必须以'/'开头：'{}'", path);
            return Err(Exception::InvalidPathSyntax);
        }

        let root = self
            .method_trees
            .entry(method.to_string())
            .or_insert_with(RouteNode::root);
        root.add_node(path, Arc::new(handler))
    }

    /// 注册 GET 路由
    pub fn get<F>(&mut self, path: &str, handler: F) -> Result<(), Exception>
    where
        F: Fn(Request, ResponseWriter) -> HandlerFuture + Send + Sync + 'static,
    {
        self.register("GET", path, handler)
    }

    /// 注册 POST 路由
    pub fn post<F>(&mut self, path: &str, handler: F) -> Result<(), Exception>
    where
        F: Fn(Request, ResponseWriter) -> HandlerFuture + Send + Sync + 'static,
    {
        self.register("POST", path, handler)
    }

    /// 为请求查找处理器，并在命中时填充 `request.params`。
    ///
    /// 方法没有对应的前缀树、请求路径为空或不以 `/` 开头、以及树中
    /// 没有命中节点，都解析为兜底的"未找到"处理器——路由未命中在
    /// 这一层不是错误。唯一的 `Err` 是 [`Exception::RouteParamMismatch`]：
    /// 命中节点的注册路径与请求路径在结构上不一致，说明前缀树本身
    /// 已经失去一致性，调用方不应继续提供服务。
    pub fn find_handler(&self, request: &mut Request) -> Result<Handler, Exception> {
        let root = match self.method_trees.get(request.method()) {
            Some(root) => root,
            None => return Ok(self.not_found_handler.clone()),
        };

        if request.path().is_empty() || !request.path().starts_with('/') {
            return Ok(self.not_found_handler.clone());
        }

        let node = match root.find(request.path()) {
            Some(node) => node,
            None => return Ok(self.not_found_handler.clone()),
        };
        let handler = match &node.handler {
            Some(handler) => handler.clone(),
            None => return Ok(self.not_found_handler.clone()),
        };

        let params = extract_route_params(&node.path, request.path())?;
        request.set_params(params);
        Ok(handler)
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

/// 兜底处理器：回应一个不带响应体的 404
async fn default_not_found(_request: Request, mut response: ResponseWriter) {
    if let Err(e) = response.write_header(404).await {
        error!("写出404响应失败: {}", e);
    }
}

/// 把命中节点的注册路径与请求路径逐段对齐，提取通配符参数。
///
/// 两条路径的段数不一致说明前缀树与匹配结果在结构上发生了偏离，
/// 返回 [`Exception::RouteParamMismatch`]。
fn extract_route_params(
    handler_path: &str,
    request_path: &str,
) -> Result<HashMap<String, String>, Exception> {
    let handler_parts: Vec<&str> = handler_path
        .strip_prefix('/')
        .unwrap_or(handler_path)
        .split('/')
        .collect();
    let request_parts: Vec<&str> = request_path
        .strip_prefix('/')
        .unwrap_or(request_path)
        .split('/')
        .collect();
    if handler_parts.len() != request_parts.len() {
        error!(
            "路由与请求路径结构不一致：handler='{}' request='{}'",
            handler_path, request_path
        );
        return Err(Exception::RouteParamMismatch);
    }

    let mut params = HashMap::new();
    for (handler_part, request_part) in handler_parts.iter().zip(request_parts.iter()) {
        if let Some(name) = handler_part.strip_prefix(':') {
            params.insert(name.to_string(), request_part.to_string());
        }
    }
    Ok(params)
}
