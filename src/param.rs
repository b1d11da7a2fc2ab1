// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 协议参数与常量模块
//!
//! 该模块定义了开发服务器与文章路径解析共用的常量和数据结构，包括：
//! - HTTP 状态码的原因短语（Reason Phrase）。
//! - 静态文件服务所需的 MIME 类型映射表。
//! - HTTP 协议版本的强类型枚举。
//! - 访问日志格式与保留的页面文件名。

use std::{collections::HashMap, fmt};

use lazy_static::lazy_static;

/// 目录请求时使用的默认文件名
pub const HTML_INDEX: &str = "index.html";

/// 服务器名称标识，用于 HTTP 响应头的 `Server` 字段
pub const SERVER_NAME: &str = "PieCrust Chef Server";

/// HTTP 协议规定的换行符（Carriage Return Line Feed）
pub const CRLF: &str = "\r\n";

/// 请求头结束标记
pub const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";

/// 响应头 `Date` 字段的格式（RFC 1123）
pub const RESPONSE_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// 访问日志中的时间格式
pub const REQUEST_DATE_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

/// 分类列表模板页的文件名（不含扩展名），不作为普通页面烘焙
pub const CATEGORY_PAGE_NAME: &str = "_category";

/// 标签列表模板页的文件名（不含扩展名），不作为普通页面烘焙
pub const TAG_PAGE_NAME: &str = "_tag";

/// 默认博客的键名。使用该键时文章直接位于文章根目录下。
pub const DEFAULT_BLOG_KEY: &str = "blog";

/// 静态文件后缀名与 `Content-Type` 的对应关系，覆盖烘焙输出中常见的文件类型。
const MIME_TABLE: &[(&str, &str)] = &[
    ("html", "text/html;charset=utf-8"),
    ("htm", "text/html;charset=utf-8"),
    ("xhtml", "application/xhtml+xml"),
    ("css", "text/css;charset=utf-8"),
    ("js", "text/javascript;charset=utf-8"),
    ("json", "application/json"),
    ("xml", "text/xml"),
    ("atom", "application/atom+xml"),
    ("rss", "application/rss+xml"),
    ("txt", "text/plain"),
    ("md", "text/markdown"),
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("svg", "image/svg+xml"),
    ("webp", "image/webp"),
    ("ico", "image/x-icon"),
    ("woff", "font/woff"),
    ("woff2", "font/woff2"),
    ("ttf", "font/ttf"),
    ("pdf", "application/pdf"),
    ("zip", "application/zip"),
];

lazy_static! {
    /// 按后缀名查找 MIME 类型，后缀名统一为小写。
    pub static ref MIME_TYPES: HashMap<&'static str, &'static str> =
        MIME_TABLE.iter().copied().collect();
}

/// 支持的 HTTP 协议版本
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HttpVersion {
    /// HTTP/1.0 版本，默认关闭连接
    V1_0,
    /// HTTP/1.1 版本，默认保持连接
    V1_1,
}

impl HttpVersion {
    /// 解析请求行中的协议版本字符串
    pub fn parse(version: &str) -> Option<Self> {
        match version.to_uppercase().as_str() {
            "HTTP/1.0" => Some(HttpVersion::V1_0),
            "HTTP/1.1" => Some(HttpVersion::V1_1),
            _ => None,
        }
    }
}

impl fmt::Display for HttpVersion {
    /// 将枚举格式化为 HTTP 报文中的版本字符串
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            HttpVersion::V1_0 => write!(f, "HTTP/1.0"),
            HttpVersion::V1_1 => write!(f, "HTTP/1.1"),
        }
    }
}

/// 查询状态码的原因短语（RFC 9110），未登记的状态码返回 `"Unknown"`
pub fn reason_phrase(code: u16) -> &'static str {
    match code {
        100 => "Continue",
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        204 => "No Content",
        206 => "Partial Content",
        301 => "Moved Permanently",
        302 => "Found",
        303 => "See Other",
        304 => "Not Modified",
        307 => "Temporary Redirect",
        308 => "Permanent Redirect",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        406 => "Not Acceptable",
        408 => "Request Timeout",
        410 => "Gone",
        411 => "Length Required",
        413 => "Content Too Large",
        414 => "URI Too Long",
        415 => "Unsupported Media Type",
        416 => "Range Not Satisfiable",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        505 => "HTTP Version Not Supported",
        _ => "Unknown",
    }
}
