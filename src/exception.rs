// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # Exception 模块
//!
//! 该模块定义了整个 crate 共用的错误类型：从文章路径解析、目录维护，
//! 到开发服务器的网络收发与请求处理，所有失败都以 [`Exception`] 的形式返回。
//!
//! ## 设计意图
//! - **错误分类**：配置错误、未找到、解析错误、I/O 错误、网络错误与处理器错误各自独立成变体。
//! - **语义映射**：[`Exception::status_code`] 把错误映射为 HTTP 状态码，供处理管线生成错误响应。
//! - **日志友好**：通过实现 `std::fmt::Display`，错误信息只写入日志，不会泄露到响应体中。

use std::{fmt, io, path::PathBuf};

/// 处理过程中可能发生的异常类型。
#[derive(Debug)]
pub enum Exception {
    /// `posts_fs` 配置了未知的目录布局，启动时即失败。
    UnknownPostsFs(String),
    /// 配置文件无法读取或解析。
    Config(String),
    /// 站点没有文章目录，却要求解析文章路径。
    PostsDirMissing,
    /// 捕获组中缺少必需的 `slug`。
    MissingSlug,
    /// 通配符模式匹配到零个或多个文件。对应 `404 Not Found`。
    PostNotFound(String),
    /// 路径模板与实际文件路径不一致，说明存在程序或配置缺陷。
    PathComponentsMismatch(PathBuf),
    /// 通配符模式本身非法。
    InvalidPattern(String),
    /// 无法创建目录。
    CreateDir { path: PathBuf, err: io::Error },
    /// 无法把目录改为可写。
    MakeWritable { path: PathBuf, err: io::Error },
    /// 无法删除文件。
    Unlink { path: PathBuf, err: io::Error },
    /// 无法删除目录。
    Rmdir { path: PathBuf, err: io::Error },
    /// 无法遍历目录。
    ReadDir { path: PathBuf, err: io::Error },
    /// 读取超时。`received` 为超时前已经收到的字节数。
    TimedOut { received: usize },
    /// 对端在发送任何数据之前关闭了连接。
    ConnectionClosed,
    /// 其它网络读写错误。
    Network(io::Error),
    /// 请求字节流不是合法的 UTF-8。
    RequestIsNotUtf8,
    /// 请求行格式非法。
    MalformedRequest(String),
    /// 不支持的 HTTP 协议版本。
    UnsupportedHttpVersion(String),
    /// 请求路径非法（例如目录遍历）。对应 `400 Bad Request`。
    InvalidPath(String),
    /// 处理器显式给出状态码的失败。`code` 为 0 时按 500 处理。
    Web { code: u16, message: String },
    /// 处理器内部的其它失败。
    Handler(String),
}

use Exception::*;

impl Exception {
    /// 处理管线据此决定错误响应的状态码。
    pub fn status_code(&self) -> u16 {
        match self {
            Web { code, .. } if *code != 0 => *code,
            PostNotFound(_) => 404,
            InvalidPath(_)
            | MalformedRequest(_)
            | RequestIsNotUtf8
            | UnsupportedHttpVersion(_) => 400,
            _ => 500,
        }
    }

    /// 写日志时使用的数字代码，与原始错误一一对应。
    pub fn code(&self) -> u16 {
        match self {
            Web { code, .. } => *code,
            _ => self.status_code(),
        }
    }

    /// 把读写错误归类为超时或普通网络错误。
    pub fn from_io(err: io::Error, received: usize) -> Self {
        match err.kind() {
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => TimedOut { received },
            _ => Network(err),
        }
    }
}

impl fmt::Display for Exception {
    /// 根据错误类型写入人类可读的描述文本。
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnknownPostsFs(value) => write!(f, "Unknown posts_fs: {}", value),
            Config(message) => write!(f, "Invalid configuration: {}", message),
            PostsDirMissing => write!(
                f,
                "Can't get the path info for a captured post URL when no post directory exists in the website"
            ),
            MissingSlug => write!(f, "Capture groups have no 'slug'"),
            PostNotFound(pattern) => write!(f, "No single post matches '{}' (404)", pattern),
            PathComponentsMismatch(path) => write!(
                f,
                "Can't extract path components from path: {}",
                path.display()
            ),
            InvalidPattern(message) => write!(f, "Invalid path pattern: {}", message),
            CreateDir { path, err } => {
                write!(f, "Can't create directory '{}': {}", path.display(), err)
            }
            MakeWritable { path, err } => {
                write!(f, "Can't make directory '{}' writable: {}", path.display(), err)
            }
            Unlink { path, err } => write!(f, "Can't unlink file '{}': {}", path.display(), err),
            Rmdir { path, err } => write!(f, "Can't rmdir directory '{}': {}", path.display(), err),
            ReadDir { path, err } => write!(f, "Can't read directory '{}': {}", path.display(), err),
            TimedOut { received } => write!(f, "Timed out after receiving {} bytes", received),
            ConnectionClosed => write!(f, "Connection closed by peer"),
            Network(err) => write!(f, "Network error: {}", err),
            RequestIsNotUtf8 => write!(f, "Request bytes can't be parsed in UTF-8"),
            MalformedRequest(line) => write!(f, "Malformed request line: {}", line),
            UnsupportedHttpVersion(version) => write!(f, "Unsupported HTTP version: {}", version),
            InvalidPath(path) => write!(f, "Invalid path (400): {}", path),
            Web { code, message } => write!(f, "{}: {}", code, message),
            Handler(message) => write!(f, "{}", message),
        }
    }
}

impl std::error::Error for Exception {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CreateDir { err, .. }
            | MakeWritable { err, .. }
            | Unlink { err, .. }
            | Rmdir { err, .. }
            | ReadDir { err, .. }
            | Network(err) => Some(err),
            _ => None,
        }
    }
}
