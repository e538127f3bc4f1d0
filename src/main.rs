// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 异步 HTTP 请求分发器
//!
//! 该模块实现了基于 Tokio 运行时的多线程 HTTP/1.1 请求分发服务。
//! 核心流程：原始字节流 → 结构化 Request → 路由查找 → 处理器调用 →
//! 响应字节写回，全部发生在单个连接的控制路径上。
//! 附带功能包括：
//! - 启动阶段一次性构建、此后只读的按方法路由表
//! - 基于 LRU 的文件缓存系统
//! - 后台管理控制台（CLI 指令交互）

use dispatcher::cache::FileCache;
use dispatcher::config::Config;
use dispatcher::request::parse_request;
use dispatcher::response::ResponseWriter;
use dispatcher::router::Router;
use dispatcher::routes::setup_router;

use log::{debug, error, info};
use log4rs;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    net::{TcpListener, TcpStream},
    runtime::Builder,
};

use std::{
    net::{Ipv4Addr, SocketAddrV4},
    sync::{Arc, Mutex},
    time::Instant,
};

/// # 程序入口点
///
/// 初始化系统环境、加载配置、构建路由表并启动主事件循环。
fn main() {
    // 1. 初始化日志系统：采用 log4rs 异步日志架构，通过外部 YAML 灵活配置级别与输出目的地
    log4rs::init_file("config/log4rs.yaml", Default::default()).unwrap();

    // 2. 环境配置加载：从 TOML 文件读取运行参数
    let config = Config::from_toml("config/development.toml");
    info!("配置文件已载入");
    info!("public dir: {}", config.public_dir());
    if let Err(e) = std::fs::create_dir_all(config.public_dir()) {
        error!("无法创建公开目录{}：{}", config.public_dir(), e);
        panic!("无法创建公开目录{}：{}", config.public_dir(), e);
    }

    // 3. 异步运行时定制：根据配置文件动态分配工作线程数
    let worker_threads = config.worker_threads();
    let runtime = Builder::new_multi_thread()
        .worker_threads(worker_threads)
        .enable_all()
        .build()
        .unwrap();

    // 4. 共享资源初始化：
    // - 使用 Arc<Mutex<...>> 保证文件缓存在多线程环境下的线程安全
    // - 采用容量受限的缓存机制防止内存溢出
    let cache = Arc::new(Mutex::new(FileCache::from_capacity(config.cache_size())));

    // 5. 路由表构建：注册失败（重复路径、非法语法）直接终止启动
    let router = match setup_router(&config, &cache) {
        Ok(router) => Arc::new(router),
        Err(e) => {
            error!("路由注册失败: {}", e);
            panic!("路由注册失败: {}", e);
        }
    };
    info!("路由表构建完成");

    runtime.block_on(async move {
        // 6. 网络层初始化：
        // 支持全地址监听 (0.0.0.0) 或本地回环监听 (127.0.0.1)
        let port: u16 = config.port();
        let address = match config.local() {
            true => Ipv4Addr::new(127, 0, 0, 1),
            false => Ipv4Addr::new(0, 0, 0, 0),
        };
        info!("服务端将在{}:{}上监听Socket连接", address, port);
        let socket = SocketAddrV4::new(address, port);

        let listener = match TcpListener::bind(socket).await {
            Ok(listener) => listener,
            Err(e) => {
                error!("无法绑定端口：{}，错误：{}", port, e);
                panic!("无法绑定端口：{}，错误：{}", port, e);
            }
        };
        info!("端口{}绑定完成", port);

        // 7. 服务器状态与生命周期管理
        // shutdown_flag: 用于优雅停机 (Graceful Shutdown)
        // active_connection: 原子追踪当前并发连接数
        let shutdown_flag = Arc::new(Mutex::new(false));
        let active_connection = Arc::new(Mutex::new(0u32));

        // 8. 启动交互式管理控制台任务
        // 该任务运行在后台，不阻塞监听循环，提供运维指令支持
        tokio::spawn({
            let shutdown_flag = Arc::clone(&shutdown_flag);
            let active_connection = Arc::clone(&active_connection);
            async move {
                let stdin = tokio::io::stdin();
                let mut reader = BufReader::new(stdin);
                let mut input = String::new();
                loop {
                    input.clear();
                    match reader.read_line(&mut input).await {
                        // 标准输入被关闭（例如后台运行），控制台任务退出
                        Ok(0) | Err(_) => break,
                        Ok(_) => {}
                    }
                    let cmd = input.trim();
                    match cmd {
                        "stop" => {
                            let mut flag = shutdown_flag.lock().unwrap();
                            *flag = true;
                            println!("停机指令已激活，服务器将在接受下一个连接后关闭...");
                            break;
                        }
                        "help" => {
                            println!("== Dispatcher Help ==");
                            println!("stop   - 发出停机信号");
                            println!("status - 查看当前服务器运行状态");
                            println!("help   - 显示此帮助信息");
                            println!("=====================");
                        }
                        "status" => {
                            let active_count = *active_connection.lock().unwrap();
                            println!("== Dispatcher 状态 ==");
                            println!("当前活跃连接数: {}", active_count);
                            println!("=====================");
                        }
                        _ => {
                            println!("无效的命令：{}", cmd);
                        }
                    }
                }
            }
        });

        let mut id: u128 = 0;

        // 9. 主事件循环 (Accept Loop)
        // 持续接收新连接并将其分发至 Tokio 线程池进行异步处理
        loop {
            // 检查停机标志位：只停止接受新连接，不打断正在处理的请求
            if *shutdown_flag.lock().unwrap() {
                info!("主循环接收到停机指令，正在退出...");
                break;
            }

            // 等待新的 TCP 连接
            let (stream, addr) = listener.accept().await.unwrap();
            debug!("新的连接：{}", addr);

            // 为每个连接克隆资源句柄（Arc 引用计数增加）
            let active_connection_arc = Arc::clone(&active_connection);
            let router_arc = Arc::clone(&router);

            debug!("[ID{}]TCP连接已建立", id);

            // 每个连接一个独立的处理单元；各单元之间互不通信
            tokio::spawn(async move {
                {
                    // 连接计数加 1
                    let mut lock = active_connection_arc.lock().unwrap();
                    *lock += 1;
                }

                // 核心业务处理
                handle_connection(stream, id, router_arc).await;

                {
                    // 处理完成后连接计数减 1
                    let mut lock = active_connection_arc.lock().unwrap();
                    *lock -= 1;
                }
            });
            id += 1; // 增加请求唯一标识序列
        }
    });
}

/// # 连接处理器
///
/// 负责单个 TCP 流的生命周期：解析请求、查找路由、调用处理器。
/// 连接在本函数返回、读写两半被丢弃时关闭。
async fn handle_connection(stream: TcpStream, id: u128, router: Arc<Router>) {
    let (read_half, write_half) = stream.into_split();
    let reader = BufReader::new(read_half);

    let start_time = Instant::now();

    // 1. 协议解析阶段：将字节流转换为结构化的 Request 对象。
    // 帧层解析失败时无法安全地构造响应，直接关闭连接、不做任何回应。
    let mut request = match parse_request(reader).await {
        Ok(request) => request,
        Err(e) => {
            error!("[ID{}]解析HTTP请求失败: {}", id, e);
            return;
        }
    };
    debug!("[ID{}]成功解析HTTP请求", id);

    // 2. 路由查找阶段：未命中的路由由兜底处理器负责回应。
    // 参数提取的结构性不一致说明路由表已经失去一致性，属于不可恢复
    // 的内部缺陷：记录日志后整体中止，绝不带着错误状态继续提供服务。
    let handler = match router.find_handler(&mut request) {
        Ok(handler) => handler,
        Err(e) => {
            error!("[ID{}]路由参数提取失败，内部状态已不一致: {}", id, e);
            std::process::abort();
        }
    };

    // 3. 结构化日志记录：便于后期审计
    info!(
        "[ID{}] {} {} {}",
        id,
        request.method(),
        request.path(),
        request.protocol(),
    );

    // 4. 处理器调用阶段：每次调用恰好产生一个响应
    let response = ResponseWriter::new(Box::new(write_half));
    handler(request, response).await;

    debug!(
        "[ID{}]请求处理完成，服务端用时{}ms",
        id,
        start_time.elapsed().as_millis()
    );
}
