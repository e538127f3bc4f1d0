//! # 路由表与请求处理器
//!
//! 分发器核心之外的协作方：在启动阶段把具体的处理器注册进 [`Router`]，
//! 处理器从 [`Request`] 读取数据、通过 [`ResponseWriter`] 产生响应。

use crate::cache::FileCache;
use crate::config::Config;
use crate::exception::Exception;
use crate::request::Request;
use crate::response::ResponseWriter;
use crate::router::Router;

use bytes::Bytes;
use flate2::{write::GzEncoder, Compression};
use log::{error, warn};

use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

use tokio::io::AsyncReadExt;

/// 构建完整的路由表。
///
/// 注册错误（重复路径、非法路径语法）原样返回给调用方，由入口代码
/// 决定终止启动。
pub fn setup_router(config: &Config, cache: &Arc<Mutex<FileCache>>) -> Result<Router, Exception> {
    let mut router = Router::new();

    router.get("/", |_request, mut response| {
        Box::pin(async move {
            if let Err(e) = response.write_header(200).await {
                error!("写出根路径响应失败: {}", e);
            }
        })
    })?;

    router.get("/echo/:text", |request, response| {
        Box::pin(handle_echo(request, response))
    })?;

    router.get("/user-agent", |request, response| {
        Box::pin(handle_user_agent(request, response))
    })?;

    let public_dir = config.public_dir().to_string();
    let file_cache = Arc::clone(cache);
    let cache_file_limit = config.cache_file_limit();
    router.get("/files/:filename", move |request, response| {
        let public_dir = public_dir.clone();
        let file_cache = Arc::clone(&file_cache);
        Box::pin(async move {
            handle_get_file(request, response, public_dir, file_cache, cache_file_limit).await
        })
    })?;

    let public_dir = config.public_dir().to_string();
    router.post("/files/:filename", move |request, response| {
        let public_dir = public_dir.clone();
        Box::pin(async move { handle_post_file(request, response, public_dir).await })
    })?;

    Ok(router)
}

/// `GET /echo/:text`：把路径参数原样作为响应体返回。
///
/// 客户端通过 `Accept-Encoding` 声明支持 gzip 时，响应体改为 gzip
/// 压缩结果，并设置对应的 `Content-Encoding` 与压缩后的长度。
async fn handle_echo(request: Request, mut response: ResponseWriter) {
    let text = request.param("text").unwrap_or_default().to_string();

    response.set_header("Content-Type", "text/plain");
    response.set_header("Content-Length", &text.len().to_string());

    let wants_gzip = match request.header("Accept-Encoding") {
        Some(value) => accepts_gzip(value),
        None => false,
    };
    if !wants_gzip {
        let _ = response.set_status(200);
        if let Err(e) = response.write(text.as_bytes()).await {
            error!("写出echo响应失败: {}", e);
        }
        return;
    }

    let compressed = match gzip_compress(text.as_bytes()) {
        Ok(data) => data,
        Err(e) => {
            error!("压缩echo内容失败: {}", e);
            let _ = response.write_header(500).await;
            return;
        }
    };
    response.set_header("Content-Encoding", "gzip");
    response.set_header("Content-Length", &compressed.len().to_string());
    let _ = response.set_status(200);
    if let Err(e) = response.write(&compressed).await {
        error!("写出echo响应失败: {}", e);
    }
}

/// `GET /user-agent`：回显 `User-Agent` 头的值。
async fn handle_user_agent(request: Request, mut response: ResponseWriter) {
    let user_agent = match request.header("User-Agent") {
        Some(value) => value.to_string(),
        None => {
            error!("请求中没有User-Agent头");
            let _ = response.write_header(500).await;
            return;
        }
    };

    let _ = response.set_status(200);
    response.set_header("Content-Type", "text/plain");
    response.set_header("Content-Length", &user_agent.len().to_string());
    if let Err(e) = response.write(user_agent.as_bytes()).await {
        error!("写出user-agent响应失败: {}", e);
    }
}

/// `GET /files/:filename`：以二进制流形式返回公开目录下的文件。
///
/// 读取经过共享的文件缓存；缓存条目按修改时间做有效性校验。
async fn handle_get_file(
    request: Request,
    mut response: ResponseWriter,
    public_dir: String,
    cache: Arc<Mutex<FileCache>>,
    cache_file_limit: u64,
) {
    let filename = request.param("filename").unwrap_or_default().to_string();
    let path = Path::new(&public_dir).join(&filename);
    let path_str = path.to_string_lossy().to_string();

    let metadata = match tokio::fs::metadata(&path).await {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            let _ = response.write_header(404).await;
            return;
        }
        Err(e) => {
            error!("无法获取文件{}的元数据: {}", path_str, e);
            let _ = response.write_header(500).await;
            return;
        }
    };
    let modified_time = match metadata.modified() {
        Ok(time) => time,
        Err(e) => {
            error!("无法获取文件{}的修改时间: {}", path_str, e);
            let _ = response.write_header(500).await;
            return;
        }
    };

    let cached = {
        let mut cache_lock = match cache.lock() {
            Ok(lock) => lock,
            Err(poisoned) => {
                warn!("缓存锁被污染，恢复并继续");
                poisoned.into_inner()
            }
        };
        cache_lock.lookup(&path_str, modified_time).cloned()
    };

    let data = match cached {
        Some(bytes) => bytes,
        None => {
            let contents = match tokio::fs::read(&path).await {
                Ok(contents) => contents,
                Err(e) => {
                    error!("无法读取文件{}: {}", path_str, e);
                    let _ = response.write_header(500).await;
                    return;
                }
            };
            let bytes = Bytes::from(contents);
            if FileCache::should_cache(metadata.len(), cache_file_limit) {
                let mut cache_lock = match cache.lock() {
                    Ok(lock) => lock,
                    Err(poisoned) => {
                        warn!("缓存锁被污染，恢复并继续");
                        poisoned.into_inner()
                    }
                };
                cache_lock.store(&path_str, bytes.clone(), modified_time);
            }
            bytes
        }
    };

    let _ = response.set_status(200);
    response.set_header("Content-Type", "application/octet-stream");
    response.set_header("Content-Length", &data.len().to_string());
    if let Err(e) = response.write(&data).await {
        error!("写出文件{}失败: {}", path_str, e);
    }
}

/// `POST /files/:filename`：按 `Content-Length` 读取请求体并写入
/// 公开目录下的文件，成功时回应 201。
async fn handle_post_file(mut request: Request, mut response: ResponseWriter, public_dir: String) {
    let filename = request.param("filename").unwrap_or_default().to_string();
    let path = Path::new(&public_dir).join(&filename);

    let size: usize = request
        .header("Content-Length")
        .and_then(|value| value.parse().ok())
        .unwrap_or(0);
    let mut contents = vec![0u8; size];
    if let Err(e) = request.body_mut().read_exact(&mut contents).await {
        error!("读取请求体失败: {}", e);
        let _ = response.write_header(500).await;
        return;
    }

    if let Err(e) = tokio::fs::write(&path, &contents).await {
        error!("写入文件{}失败: {}", path.to_string_lossy(), e);
        let _ = response.write_header(500).await;
        return;
    }

    let _ = response.write_header(201).await;
}

/// 客户端的 `Accept-Encoding` 值中是否列出了 gzip
fn accepts_gzip(header_value: &str) -> bool {
    header_value
        .split(',')
        .any(|encoding| encoding.trim() == "gzip")
}

fn gzip_compress(data: &[u8]) -> io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}
