// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # Chef 预览服务器
//!
//! 用法：`chef [config.toml]`，默认读取 `config/chef.toml`。
//!
//! 启动流程：初始化日志、载入配置、检查站点的文章目录布局，
//! 然后在单线程阻塞循环中为 `www_root` 下烘焙好的静态文件提供服务。

use std::{env, path::Path, process};

use log::{error, info, warn, LevelFilter};
use log4rs::{
    append::console::ConsoleAppender,
    config::{Appender, Config as LogConfig, Root},
    encode::pattern::PatternEncoder,
};

use chef::{
    config::Config,
    connection::TcpNetworkHandler,
    driver::{Driver, DriverOptions},
    exception::Exception,
    filesystem::PostFileSystem,
    handler::{HandlerRegistry, StaticFileHandler},
    util::ensure_directory,
};

const DEFAULT_CONFIG: &str = "config/chef.toml";
const LOG_CONFIG: &str = "config/log4rs.yaml";

fn main() {
    init_logging();

    let config_file = env::args().nth(1).unwrap_or_else(|| DEFAULT_CONFIG.to_string());
    if let Err(e) = serve(&config_file) {
        error!("{}", e);
        process::exit(1);
    }
}

/// 优先使用 YAML 日志配置，找不到时退回到控制台输出。
fn init_logging() {
    if log4rs::init_file(LOG_CONFIG, Default::default()).is_ok() {
        return;
    }
    let stdout = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new("{d(%H:%M:%S)} {h({l:<5})} {m}{n}")))
        .build();
    let config = LogConfig::builder()
        .appender(Appender::builder().build("stdout", Box::new(stdout)))
        .build(Root::builder().appender("stdout").build(LevelFilter::Info));
    match config {
        Ok(config) => {
            if let Err(e) = log4rs::init_config(config) {
                eprintln!("无法初始化日志系统：{}", e);
            }
        }
        Err(e) => eprintln!("无法初始化日志系统：{}", e),
    }
    warn!("未找到{}，日志只输出到控制台", LOG_CONFIG);
}

fn serve(config_file: &str) -> Result<(), Exception> {
    let config = if Path::new(config_file).exists() {
        Config::from_toml(config_file)?
    } else {
        warn!("未找到配置文件{}，使用默认配置", config_file);
        Config::new()
    };

    // 布局名称未知时直接失败
    let posts = PostFileSystem::create(config.site(), None)?;
    info!("文章目录布局：{}", posts.format());
    match posts.get_page_files() {
        Ok(pages) => info!("找到{}个页面", pages.len()),
        Err(e) => warn!("无法枚举页面：{}", e),
    }
    match posts.get_post_files() {
        Ok(posts) => info!("找到{}篇文章", posts.len()),
        Err(e) => warn!("无法枚举文章：{}", e),
    }

    let root = config.www_root();
    if ensure_directory(Path::new(root), true)? {
        info!("已创建www root：{}", root);
    }
    info!("www root: {}", root);

    let static_files = || StaticFileHandler::new(root);
    let mut registry = HandlerRegistry::new();
    registry
        .add_request_handler("GET", static_files())
        .add_request_handler("HEAD", static_files());

    let network = TcpNetworkHandler::bind(config.address(), config.port(), config.read_timeout())?;
    let options = DriverOptions {
        keep_alive: config.keep_alive(),
    };
    Driver::new(network, registry, options).run()
}
