use crate::{
    exception::Exception,
    param::{CRLF, HTTP_PROTOCOL, STATUS_CODES, STATUS_CODE_MAX, STATUS_CODE_MIN},
};

use log::error;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use std::collections::HashMap;

/// 处理器用来产生响应的写出端。
///
/// 状态行与头部块采用一次性提交（write-once）语义：第一次 `write` 调用
/// 将它们与本次数据合并为单个缓冲区原子地发出；此后对状态码或头字段的
/// 修改不再影响已发送的字节。
pub struct ResponseWriter {
    headers: HashMap<String, String>,
    // 0 表示尚未设置状态码
    status: u16,
    committed: bool,
    sink: Box<dyn AsyncWrite + Send + Unpin>,
}

impl ResponseWriter {
    pub fn new(sink: Box<dyn AsyncWrite + Send + Unpin>) -> Self {
        Self {
            headers: HashMap::new(),
            status: 0,
            committed: false,
            sink,
        }
    }

    /// 记录一个头字段。同名字段以后写入者为准。
    pub fn set_header(&mut self, key: &str, value: &str) {
        self.headers.insert(key.to_string(), value.to_string());
    }

    pub fn headers_mut(&mut self) -> &mut HashMap<String, String> {
        &mut self.headers
    }

    /// 记录待发送的状态码。
    ///
    /// 状态码必须位于 100 到 599 之间，否则返回
    /// [`Exception::InvalidStatusCode`]。首个字节写出之后调用本方法
    /// 不再有任何效果。
    pub fn set_status(&mut self, code: u16) -> Result<(), Exception> {
        if !(STATUS_CODE_MIN..=STATUS_CODE_MAX).contains(&code) {
            error!("非法的HTTP状态码：{}", code);
            return Err(Exception::InvalidStatusCode);
        }
        if !self.committed {
            self.status = code;
        }
        Ok(())
    }

    /// 以指定状态码提交一个没有响应体的响应。
    ///
    /// 等价于在状态码尚未设置时调用 [`set_status`](Self::set_status)，
    /// 然后提交一次空的写出。
    pub async fn write_header(&mut self, code: u16) -> Result<usize, Exception> {
        if self.status < STATUS_CODE_MIN {
            self.set_status(code)?;
        }
        self.write(&[]).await
    }

    /// 写出响应数据。
    ///
    /// 首次调用时，若状态码尚未设置则默认 200；随后将状态行、全部已
    /// 记录的头字段、空行与 `data` 拼为单个缓冲区一次性发出。后续调用
    /// 只追加原始字节。返回本次写出的字节总数。
    pub async fn write(&mut self, data: &[u8]) -> Result<usize, Exception> {
        if self.status < STATUS_CODE_MIN {
            self.status = 200;
        }

        let mut buffer = Vec::with_capacity(data.len() + 128);
        if !self.committed {
            let reason = STATUS_CODES.get(&self.status).copied().unwrap_or("");
            buffer.extend_from_slice(
                format!("{} {} {}{}", HTTP_PROTOCOL, self.status, reason, CRLF).as_bytes(),
            );
            for (key, value) in &self.headers {
                buffer.extend_from_slice(format!("{}: {}{}", key, value, CRLF).as_bytes());
            }
            buffer.extend_from_slice(CRLF.as_bytes());
            self.committed = true;
        }
        buffer.extend_from_slice(data);

        if let Err(e) = self.sink.write_all(&buffer).await {
            error!("写出响应数据失败: {}", e);
            return Err(Exception::TransportError);
        }
        if let Err(e) = self.sink.flush().await {
            error!("冲刷响应数据失败: {}", e);
            return Err(Exception::TransportError);
        }
        Ok(buffer.len())
    }
}
