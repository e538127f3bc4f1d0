// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # HTTP 请求解析模块
//!
//! 该模块是分发器的核心组件之一，负责将连接上读取的原始字节流
//! 解析为强类型的 `Request` 结构体。它涵盖了：
//! 1. 请求行（Request-Line）的解析（方法、路径、协议）。
//! 2. HTTP 标头（Headers）的逐行提取，直至空行或流结束。
//! 3. 请求体（Body）的定位：解析器本身不读取请求体，`Request.body`
//!    即头部结束后尚未消费的字节流，由处理器按 `Content-Length` 读取。

use crate::exception::Exception;
use log::error;

use std::collections::HashMap;
use std::fmt;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};

/// 表示一个完整的 HTTP 请求。
///
/// 每个连接恰好构造一次；路由匹配成功后由 `Router` 填充一次 `params`，
/// 此后只读，连接关闭时随之丢弃。
pub struct Request {
    /// HTTP 请求方法记号（如 "GET"、"POST"）
    method: String,
    /// 请求的资源路径（以 `/` 开头；畸形输入下可能为空串）
    path: String,
    /// HTTP 协议版本记号（如 "HTTP/1.1"）
    protocol: String,
    /// 头字段映射。键按客户端发送的原样保存，不做大小写归一化；
    /// 同名键以后写入者为准。
    headers: HashMap<String, String>,
    /// 路由参数映射，仅在路由匹配成功后由 `Router` 填充。
    params: HashMap<String, String>,
    /// 头部结束后尚未消费的字节流。
    body: Box<dyn AsyncBufRead + Send + Unpin>,
}

/// 从字节流中解析出一个 `Request`。
///
/// # 解析规则
/// 按 `\n` 逐行读取（容忍行尾多出的 `\r`）：
/// - 第一行为请求行，按单个空格切分，必须恰好得到三个记号；
///   流立即结束（读到 0 字节）返回 [`Exception::EmptyRequest`]，
///   记号数量不对返回 [`Exception::MalformedStatusLine`]。
/// - 其后每行为一个头字段，读到长度为零的行或流结束为止；
///   行内按**第一个**冒号切分，没有冒号返回 [`Exception::MalformedHeader`]。
///   值去除首尾空格，键原样保存。
/// - 读取过程中的 I/O 失败（非正常流结束）返回 [`Exception::TransportError`]。
///
/// 解析结束后，`stream` 的剩余部分原样成为 `Request.body`。
pub async fn parse_request<R>(mut stream: R) -> Result<Request, Exception>
where
    R: AsyncBufRead + Send + Unpin + 'static,
{
    let mut line = Vec::new();

    // 1. 读取并切分请求行
    let count = match stream.read_until(b'\n', &mut line).await {
        Ok(count) => count,
        Err(e) => {
            error!("读取请求行失败: {}", e);
            return Err(Exception::TransportError);
        }
    };
    if count == 0 {
        return Err(Exception::EmptyRequest);
    }

    let status_line = String::from_utf8_lossy(trim_line(&line)).into_owned();
    let parts: Vec<&str> = status_line.split(' ').collect();
    if parts.len() != 3 {
        error!("HTTP请求行格式不正确：'{}'", status_line);
        return Err(Exception::MalformedStatusLine);
    }
    let method = parts[0].to_string();
    let path = parts[1].to_string();
    let protocol = parts[2].to_string();

    // 2. 逐行解析头字段，直到空行或流结束
    let mut headers = HashMap::new();
    loop {
        line.clear();
        let count = match stream.read_until(b'\n', &mut line).await {
            Ok(count) => count,
            Err(e) => {
                error!("读取头字段失败: {}", e);
                return Err(Exception::TransportError);
            }
        };
        if count == 0 {
            break;
        }

        let header_line = trim_line(&line);
        if header_line.is_empty() {
            break;
        }

        let header_text = String::from_utf8_lossy(header_line);
        let (key, value) = match header_text.split_once(':') {
            Some(pair) => pair,
            None => {
                error!("HTTP头字段格式不正确：'{}'", header_text);
                return Err(Exception::MalformedHeader);
            }
        };
        headers.insert(key.to_string(), value.trim_matches(' ').to_string());
    }

    Ok(Request {
        method,
        path,
        protocol,
        headers,
        params: HashMap::new(),
        body: Box::new(stream),
    })
}

/// 去掉行尾的 `\n` 以及它之前可能存在的 `\r`。
fn trim_line(line: &[u8]) -> &[u8] {
    let mut end = line.len();
    if end > 0 && line[end - 1] == b'\n' {
        end -= 1;
    }
    if end > 0 && line[end - 1] == b'\r' {
        end -= 1;
    }
    &line[..end]
}

// --- 访问器实现 ---

impl Request {
    /// 获取请求方法记号
    pub fn method(&self) -> &str {
        &self.method
    }

    /// 获取请求路径
    pub fn path(&self) -> &str {
        &self.path
    }

    /// 获取协议版本记号
    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    /// 获取全部头字段
    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// 按原样大小写精确查找某个头字段的值。
    ///
    /// 查找是大小写敏感的：调用方必须使用与客户端发送时一致的写法，
    /// 例如 `Content-Length`、`User-Agent`、`Accept-Encoding`。
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key).map(|value| value.as_str())
    }

    /// 获取全部路由参数。路由匹配成功之前为空映射。
    pub fn params(&self) -> &HashMap<String, String> {
        &self.params
    }

    /// 查找某个命名通配符绑定的参数值
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(|value| value.as_str())
    }

    /// 获取请求体字节流的可变引用。
    ///
    /// 流的起点位于头部终止空行之后；处理器自行负责按 `Content-Length`
    /// 读取恰好对应数量的字节。
    pub fn body_mut(&mut self) -> &mut (dyn AsyncBufRead + Send + Unpin) {
        &mut *self.body
    }

    pub(crate) fn set_params(&mut self, params: HashMap<String, String>) {
        self.params = params;
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("protocol", &self.protocol)
            .field("headers", &self.headers)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    /// 验证常规 GET 请求的解析，包括请求行三要素和头字段
    #[tokio::test]
    async fn test_parse_get_request() {
        let raw = b"GET /index.html HTTP/1.1\r\nHost: localhost:4221\r\nUser-Agent: Test-Browser\r\n\r\n";

        let request = parse_request(&raw[..]).await.unwrap();

        assert_eq!(request.method(), "GET");
        assert_eq!(request.path(), "/index.html");
        assert_eq!(request.protocol(), "HTTP/1.1");
        assert_eq!(request.header("Host"), Some("localhost:4221"));
        assert_eq!(request.header("User-Agent"), Some("Test-Browser"));
        assert!(request.params().is_empty());
    }

    /// 空字节流应当产生 EmptyRequest
    #[tokio::test]
    async fn test_empty_stream() {
        let result = parse_request(&b""[..]).await;

        assert!(result.is_err());
        match result.unwrap_err() {
            Exception::EmptyRequest => {}
            e => panic!("Expected EmptyRequest, got {:?}", e),
        }
    }

    /// 请求行缺少协议记号应当产生 MalformedStatusLine
    #[tokio::test]
    async fn test_missing_protocol_token() {
        let result = parse_request(&b"GET /\r\n\r\n"[..]).await;

        assert!(result.is_err());
        match result.unwrap_err() {
            Exception::MalformedStatusLine => {}
            e => panic!("Expected MalformedStatusLine, got {:?}", e),
        }
    }

    /// 请求行多出一个记号同样是畸形的
    #[tokio::test]
    async fn test_extra_status_line_token() {
        let result = parse_request(&b"GET / extra HTTP/1.1\r\n\r\n"[..]).await;

        assert!(result.is_err());
        match result.unwrap_err() {
            Exception::MalformedStatusLine => {}
            e => panic!("Expected MalformedStatusLine, got {:?}", e),
        }
    }

    /// 不含冒号的头字段行应当产生 MalformedHeader
    #[tokio::test]
    async fn test_header_without_colon() {
        let result = parse_request(&b"GET / HTTP/1.1\r\nBad-Header-No-Colon\r\n\r\n"[..]).await;

        assert!(result.is_err());
        match result.unwrap_err() {
            Exception::MalformedHeader => {}
            e => panic!("Expected MalformedHeader, got {:?}", e),
        }
    }

    /// 头字段值按第一个冒号切分，值中允许再出现冒号
    #[tokio::test]
    async fn test_header_value_with_colon() {
        let raw = b"GET / HTTP/1.1\r\nHost: localhost:4221\r\n\r\n";

        let request = parse_request(&raw[..]).await.unwrap();

        assert_eq!(request.header("Host"), Some("localhost:4221"));
    }

    /// 头字段值去除首尾空格，键保持原样
    #[tokio::test]
    async fn test_header_value_trimming() {
        let raw = b"GET / HTTP/1.1\r\nX-Padded:    lots of space   \r\n\r\n";

        let request = parse_request(&raw[..]).await.unwrap();

        assert_eq!(request.header("X-Padded"), Some("lots of space"));
    }

    /// 键按原样保存：查找是大小写敏感的
    #[tokio::test]
    async fn test_header_keys_are_case_sensitive() {
        let raw = b"GET / HTTP/1.1\r\nuser-agent: curl/8.0\r\n\r\n";

        let request = parse_request(&raw[..]).await.unwrap();

        assert_eq!(request.header("user-agent"), Some("curl/8.0"));
        assert_eq!(request.header("User-Agent"), None);
    }

    /// 同名头字段以后写入者为准
    #[tokio::test]
    async fn test_duplicate_header_last_write_wins() {
        let raw = b"GET / HTTP/1.1\r\nX-Tag: first\r\nX-Tag: second\r\n\r\n";

        let request = parse_request(&raw[..]).await.unwrap();

        assert_eq!(request.header("X-Tag"), Some("second"));
    }

    /// 只用 `\n` 结尾的行同样可以解析（容忍缺失的 `\r`）
    #[tokio::test]
    async fn test_bare_newline_lines() {
        let raw = b"POST /submit HTTP/1.1\nContent-Length: 4\n\nbody";

        let request = parse_request(&raw[..]).await.unwrap();

        assert_eq!(request.method(), "POST");
        assert_eq!(request.header("Content-Length"), Some("4"));
    }

    /// 头部结束后，流的剩余部分就是请求体
    #[tokio::test]
    async fn test_body_is_left_unconsumed() {
        let raw = b"POST /submit HTTP/1.1\r\nContent-Length: 10\r\n\r\ntest=value";

        let mut request = parse_request(&raw[..]).await.unwrap();

        let length: usize = request.header("Content-Length").unwrap().parse().unwrap();
        let mut body = vec![0u8; length];
        request.body_mut().read_exact(&mut body).await.unwrap();
        assert_eq!(&body, b"test=value");
    }

    /// 头部在流结束处终止（没有空行）也应当解析成功
    #[tokio::test]
    async fn test_headers_terminated_by_eof() {
        let raw = b"GET / HTTP/1.1\r\nHost: localhost\r\n";

        let request = parse_request(&raw[..]).await.unwrap();

        assert_eq!(request.header("Host"), Some("localhost"));
    }
}
