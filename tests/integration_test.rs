//! 端到端分发测试：用内存双工流代替 TCP 连接，完整走一遍
//! 字节流入 → 解析 → 路由查找 → 处理器调用 → 字节流出 的控制路径。

use dispatcher::{parse_request, setup_router, Config, FileCache, ResponseWriter, Router};

use std::sync::{Arc, Mutex};

use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};

/// 模拟连接处理单元：把原始请求字节送进分发流程，取回响应字节。
///
/// 帧层解析失败时连接直接关闭、不产生任何响应字节，此时返回 `None`。
async fn dispatch(router: &Router, raw: &[u8]) -> Option<Vec<u8>> {
    let (mut client, server) = tokio::io::duplex(65536);

    client.write_all(raw).await.unwrap();
    // 关闭客户端写方向，模拟请求发送完毕
    client.shutdown().await.unwrap();

    let (read_half, write_half) = tokio::io::split(server);
    let mut request = match parse_request(BufReader::new(read_half)).await {
        Ok(request) => request,
        Err(_) => return None,
    };
    let handler = router.find_handler(&mut request).unwrap();
    let response = ResponseWriter::new(Box::new(write_half));
    handler(request, response).await;

    let mut out = Vec::new();
    client.read_to_end(&mut out).await.unwrap();
    Some(out)
}

/// 把响应字节切成头部文本与响应体
fn split_response(raw: &[u8]) -> (String, Vec<u8>) {
    let boundary = raw
        .windows(4)
        .position(|window| window == b"\r\n\r\n")
        .expect("response has no header terminator");
    let head = String::from_utf8(raw[..boundary + 2].to_vec()).unwrap();
    (head, raw[boundary + 4..].to_vec())
}

/// 构造一个公开目录指向临时目录的配置
fn test_config(dir: &std::path::Path) -> Config {
    let public_dir = dir.join("public");
    std::fs::create_dir_all(&public_dir).unwrap();
    let config_path = dir.join("test.toml");
    std::fs::write(
        &config_path,
        format!(
            "public_dir = \"{}\"\nport = 4221\nworker_threads = 1\ncache_size = 4\nlocal = true\n",
            public_dir.to_string_lossy()
        ),
    )
    .unwrap();
    Config::from_toml(config_path.to_str().unwrap())
}

fn build_router(config: &Config) -> Router {
    let cache = Arc::new(Mutex::new(FileCache::from_capacity(config.cache_size())));
    setup_router(config, &cache).unwrap()
}

#[tokio::test]
async fn test_echo_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let router = build_router(&test_config(dir.path()));

    let sent = dispatch(&router, b"GET /echo/hello HTTP/1.1\r\n\r\n")
        .await
        .unwrap();

    let (head, body) = split_response(&sent);
    assert!(head.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(head.contains("Content-Length: 5\r\n"));
    assert!(head.contains("Content-Type: text/plain\r\n"));
    assert_eq!(body, b"hello");
}

#[tokio::test]
async fn test_root_returns_empty_200() {
    let dir = tempfile::tempdir().unwrap();
    let router = build_router(&test_config(dir.path()));

    let sent = dispatch(&router, b"GET / HTTP/1.1\r\n\r\n").await.unwrap();

    assert_eq!(sent, b"HTTP/1.1 200 OK\r\n\r\n");
}

#[tokio::test]
async fn test_unmatched_route_yields_404() {
    let dir = tempfile::tempdir().unwrap();
    let router = build_router(&test_config(dir.path()));

    let sent = dispatch(&router, b"GET /does/not/exist HTTP/1.1\r\n\r\n")
        .await
        .unwrap();

    assert_eq!(sent, b"HTTP/1.1 404 Not Found\r\n\r\n");
}

#[tokio::test]
async fn test_user_agent_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let router = build_router(&test_config(dir.path()));

    let sent = dispatch(
        &router,
        b"GET /user-agent HTTP/1.1\r\nUser-Agent: integration-suite/0.1\r\n\r\n",
    )
    .await
    .unwrap();

    let (head, body) = split_response(&sent);
    assert!(head.starts_with("HTTP/1.1 200 OK\r\n"));
    assert_eq!(body, b"integration-suite/0.1");
}

/// POST 写入文件后，再通过 GET 取回同样的内容
#[tokio::test]
async fn test_post_then_get_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let router = build_router(&config);

    let sent = dispatch(
        &router,
        b"POST /files/data.bin HTTP/1.1\r\nContent-Length: 12\r\n\r\nhello, files",
    )
    .await
    .unwrap();
    let (head, _) = split_response(&sent);
    assert!(head.starts_with("HTTP/1.1 201 Created\r\n"));

    let sent = dispatch(&router, b"GET /files/data.bin HTTP/1.1\r\n\r\n")
        .await
        .unwrap();
    let (head, body) = split_response(&sent);
    assert!(head.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(head.contains("Content-Type: application/octet-stream\r\n"));
    assert!(head.contains("Content-Length: 12\r\n"));
    assert_eq!(body, b"hello, files");
}

#[tokio::test]
async fn test_missing_file_yields_404() {
    let dir = tempfile::tempdir().unwrap();
    let router = build_router(&test_config(dir.path()));

    let sent = dispatch(&router, b"GET /files/absent.txt HTTP/1.1\r\n\r\n")
        .await
        .unwrap();

    assert_eq!(sent, b"HTTP/1.1 404 Not Found\r\n\r\n");
}

/// 帧层畸形的请求直接关闭连接，不产生响应
#[tokio::test]
async fn test_malformed_request_closes_without_response() {
    let dir = tempfile::tempdir().unwrap();
    let router = build_router(&test_config(dir.path()));

    assert!(dispatch(&router, b"GET /\r\n\r\n").await.is_none());
    assert!(dispatch(&router, b"").await.is_none());
    assert!(dispatch(&router, b"GET / HTTP/1.1\r\nBad-Header-No-Colon\r\n\r\n")
        .await
        .is_none());
}

/// gzip 协商贯穿完整的分发路径
#[tokio::test]
async fn test_echo_gzip_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let router = build_router(&test_config(dir.path()));

    let sent = dispatch(
        &router,
        b"GET /echo/compressed HTTP/1.1\r\nAccept-Encoding: gzip\r\n\r\n",
    )
    .await
    .unwrap();

    let (head, body) = split_response(&sent);
    assert!(head.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(head.contains("Content-Encoding: gzip\r\n"));
    // gzip 魔数
    assert_eq!(&body[0..2], &[0x1f, 0x8b]);
}
