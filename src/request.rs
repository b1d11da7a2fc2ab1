// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # HTTP 请求处理模块
//!
//! 负责把连接驱动读到的请求头行与可选的请求体组装成强类型的 `Request` 结构体。它涵盖了：
//! 1. 请求行（Request-Line）的解析（方法、URI、版本）。
//! 2. 请求头按原始顺序保存，字段名查找不区分大小写。
//! 3. 服务器元数据（监听地址与端口）的携带。

use bytes::Bytes;
use log::error;

use crate::{exception::Exception, param::*};

/// 处理请求的服务器信息。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    /// 监听地址
    pub name: String,
    /// 监听端口
    pub port: u16,
}

/// 表示一个完整的 HTTP 请求。
#[derive(Debug, Clone)]
pub struct Request {
    /// 服务器信息
    server: ServerInfo,
    /// HTTP 请求方法，统一为大写
    method: String,
    /// 请求的资源标识（包含查询字符串）
    uri: String,
    /// HTTP 协议版本
    version: HttpVersion,
    /// 按出现顺序保存的请求头
    headers: Vec<(String, String)>,
    /// 请求体
    body: Option<Bytes>,
}

impl Request {
    /// 从请求头行尝试构建 `Request` 实例。
    ///
    /// # 逻辑步骤
    /// 1. 解析请求行：提取方法、URI 和协议版本。
    /// 2. 迭代解析标头：以第一个 `:` 为界拆分字段名与值，空行之后的内容被忽略。
    ///
    /// # 错误处理
    /// 请求行不完整时返回 `MalformedRequest`，协议版本不受支持时返回 `UnsupportedHttpVersion`。
    pub fn try_from(
        server: ServerInfo,
        lines: &[String],
        body: Option<Bytes>,
    ) -> Result<Self, Exception> {
        let request_line = lines.first().map(String::as_str).unwrap_or("");
        let parts: Vec<&str> = request_line.split_whitespace().collect();
        if parts.len() < 3 {
            error!("HTTP请求行格式不正确：{}", request_line);
            return Err(Exception::MalformedRequest(request_line.to_string()));
        }

        let method = parts[0].to_uppercase();
        let version_str = parts[parts.len() - 1];
        let version = match HttpVersion::parse(version_str) {
            Some(v) => v,
            None => {
                error!("不支持的HTTP协议版本：{}", version_str);
                return Err(Exception::UnsupportedHttpVersion(version_str.to_string()));
            }
        };
        // 路径中出现空格虽不规范，但通过 join 尝试恢复
        let uri = parts[1..parts.len() - 1].join(" ");

        let mut headers = Vec::new();
        for line in lines.iter().skip(1) {
            if line.is_empty() {
                break;
            }
            match line.split_once(':') {
                Some((name, value)) => {
                    headers.push((name.trim().to_string(), value.trim().to_string()))
                }
                None => error!("忽略无法解析的请求头：{}", line),
            }
        }

        Ok(Self {
            server,
            method,
            uri,
            version,
            headers,
            body,
        })
    }

    /// 从原始请求头字节块构建，字节块须为合法的 UTF-8。
    pub fn from_bytes(
        server: ServerInfo,
        head: &[u8],
        body: Option<Bytes>,
    ) -> Result<Self, Exception> {
        let text = std::str::from_utf8(head).map_err(|_| Exception::RequestIsNotUtf8)?;
        let lines: Vec<String> = text.split(CRLF).map(str::to_string).collect();
        Self::try_from(server, &lines, body)
    }
}

// --- Getter 访问器实现 ---

impl Request {
    pub fn server(&self) -> &ServerInfo {
        &self.server
    }

    /// 获取请求方法（大写）
    pub fn method(&self) -> &str {
        &self.method
    }

    /// 获取完整的请求 URI（含查询参数）
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// 获取不含查询参数的路径部分
    pub fn uri_path(&self) -> &str {
        match self.uri.split_once('?') {
            Some((path, _)) => path,
            None => &self.uri,
        }
    }

    /// 获取查询字符串
    pub fn query(&self) -> Option<&str> {
        self.uri.split_once('?').map(|(_, query)| query)
    }

    /// 获取 HTTP 协议版本
    pub fn version(&self) -> HttpVersion {
        self.version
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// 按字段名（不区分大小写）查找第一个匹配的请求头
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// 设置请求头，已存在时替换其值。供预处理器改写请求使用。
    pub fn set_header(&mut self, name: &str, value: &str) {
        match self.headers.iter_mut().find(|(n, _)| n.eq_ignore_ascii_case(name)) {
            Some(header) => header.1 = value.to_string(),
            None => self.headers.push((name.to_string(), value.to_string())),
        }
    }

    pub fn set_uri(&mut self, uri: &str) {
        self.uri = uri.to_string();
    }

    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }
}
