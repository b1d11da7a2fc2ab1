// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 连接驱动
//!
//! 单线程、同步阻塞的服务循环：同一时刻只持有一个连接，在这个连接上一次只处理一个请求。
//!
//! 每一轮循环：
//! 1. 没有连接时阻塞等待新连接。
//! 2. 读取请求头直到空行，若声明了 `Content-Length` 则继续读取请求体。
//! 3. 交给处理器注册表生成响应，并按长连接策略补上 `Connection` 与 `Content-Length`。
//! 4. 一次性写出响应，核对实际发送的字节数。
//! 5. 记录访问日志，出错或按策略需要时关闭连接。

use std::time::{Duration, Instant};

use bytes::Bytes;
use chrono::prelude::*;
use lazy_static::lazy_static;
use log::{debug, error, info, log, Level};
use regex::Regex;

use crate::{
    connection::{Connection, NetworkHandler},
    exception::Exception,
    handler::HandlerRegistry,
    param::*,
    request::{Request, ServerInfo},
    response::Response,
};

lazy_static! {
    static ref CONTENT_LENGTH: Regex = Regex::new(r"^Content-Length:\s*(\d+)\s*$").unwrap();
}

#[derive(Debug, Clone, Copy)]
pub struct DriverOptions {
    /// 为假时每个响应之后都关闭连接
    pub keep_alive: bool,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self { keep_alive: true }
    }
}

/// 一次请求在接收、处理、发送三个阶段的起止时刻。
#[derive(Debug, Clone)]
pub struct Profiling {
    receive: (Instant, Option<Instant>),
    process: Option<(Instant, Option<Instant>)>,
    send: Option<(Instant, Option<Instant>)>,
}

impl Profiling {
    fn new() -> Self {
        Self {
            receive: (Instant::now(), None),
            process: None,
            send: None,
        }
    }

    pub fn receive_time(&self) -> Option<Duration> {
        span(Some(self.receive))
    }

    pub fn process_time(&self) -> Option<Duration> {
        span(self.process)
    }

    pub fn send_time(&self) -> Option<Duration> {
        span(self.send)
    }

    /// 三个阶段耗时之和，按毫秒向上取整。
    pub fn total_ms(&self) -> u64 {
        let total: Duration = [self.receive_time(), self.process_time(), self.send_time()]
            .iter()
            .flatten()
            .sum();
        let micros = total.as_micros() as u64;
        (micros + 999) / 1000
    }
}

fn span(phase: Option<(Instant, Option<Instant>)>) -> Option<Duration> {
    match phase {
        Some((start, Some(end))) => Some(end.duration_since(start)),
        _ => None,
    }
}

/// 一轮请求循环的全部记录，供日志与测试检查。
#[derive(Debug)]
pub struct RequestInfo {
    /// 读取阶段出错，连接将被关闭
    pub error: bool,
    /// 长连接策略决定关闭连接
    pub close_socket: bool,
    /// 请求头各行，不含结尾的空行
    pub headers: Option<Vec<String>>,
    pub body: Option<Bytes>,
    pub request: Option<Request>,
    pub response: Option<Response>,
    pub profiling: Profiling,
    head: Vec<u8>,
}

impl RequestInfo {
    fn new() -> Self {
        Self {
            error: false,
            close_socket: true,
            headers: None,
            body: None,
            request: None,
            response: None,
            profiling: Profiling::new(),
            head: Vec::new(),
        }
    }
}

pub struct Driver<N: NetworkHandler> {
    network: N,
    registry: HandlerRegistry,
    options: DriverOptions,
    connection: Option<Connection<N::Stream>>,
}

impl<N: NetworkHandler> Driver<N> {
    pub fn new(network: N, registry: HandlerRegistry, options: DriverOptions) -> Self {
        Self {
            network,
            registry,
            options,
            connection: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    pub fn network(&self) -> &N {
        &self.network
    }

    /// 永远运行。进程只会被外部终止。
    pub fn run(&mut self) -> ! {
        info!(
            "开始在{}:{}上提供服务",
            self.network.address(),
            self.network.port()
        );
        loop {
            if let Err(e) = self.run_once() {
                error!("无法建立连接：{}", e);
            }
        }
    }

    /// 执行一轮完整的请求循环。只有接受新连接失败时才返回错误。
    pub fn run_once(&mut self) -> Result<RequestInfo, Exception> {
        let mut connection = match self.connection.take() {
            Some(connection) => connection,
            None => {
                debug!("等待新的连接...");
                self.network.connect()?
            }
        };

        let mut info = read_request(&mut connection);
        if !info.error {
            let response = self.process_request(&mut info);
            send_response(&mut connection, &response, &mut info);
            info.response = Some(response);
        }

        log_request(&connection, &info);

        if info.close_socket || info.error {
            debug!("关闭连接");
        } else {
            self.connection = Some(connection);
        }
        Ok(info)
    }

    fn server_info(&self) -> ServerInfo {
        ServerInfo {
            name: self.network.address().to_string(),
            port: self.network.port(),
        }
    }

    fn process_request(&self, info: &mut RequestInfo) -> Response {
        let start = Instant::now();

        let (mut response, close_socket) =
            match Request::from_bytes(self.server_info(), &info.head, info.body.clone()) {
                Ok(mut request) => {
                    let response = self.registry.process(&mut request);
                    let close_socket = self.should_close(&request);
                    info.request = Some(request);
                    (response, close_socket)
                }
                Err(e) => {
                    error!("无法解析HTTP请求：{}", e);
                    (Response::from_status_code(e.status_code()), true)
                }
            };

        info.close_socket = close_socket;
        response.set_header("Connection", if close_socket { "close" } else { "keep-alive" });
        if response.header("Content-Length").is_none() {
            let length = response.body_len().to_string();
            response.set_header("Content-Length", &length);
        }

        info.profiling.process = Some((start, Some(Instant::now())));
        response
    }

    /// HTTP/1.0 默认关闭，HTTP/1.1 默认保持。
    fn should_close(&self, request: &Request) -> bool {
        if !self.options.keep_alive {
            return true;
        }
        let connection = request.header("Connection");
        match request.version() {
            HttpVersion::V1_0 => {
                !connection.map_or(false, |c| c.eq_ignore_ascii_case("keep-alive"))
            }
            HttpVersion::V1_1 => connection.map_or(false, |c| c.eq_ignore_ascii_case("close")),
        }
    }
}

fn read_request<S>(connection: &mut Connection<S>) -> RequestInfo
where
    S: std::io::Read + std::io::Write,
{
    let mut info = RequestInfo::new();
    if let Err(e) = receive(connection, &mut info) {
        let headers_read = info.headers.is_some();
        let message = match &e {
            Exception::TimedOut { received: 0 } if !headers_read => "等待请求超时，结束会话".to_string(),
            Exception::TimedOut { received } => format!("接收请求时超时，已收到{}字节", received),
            Exception::ConnectionClosed if !headers_read => "客户端已关闭连接".to_string(),
            e => format!("读取请求失败：{}", e),
        };
        log!(read_failure_level(&e, headers_read), "{}", message);
        info.error = true;
    }
    info.profiling.receive.1 = Some(Instant::now());
    info
}

/// 空闲连接上一个字节都没收到就超时或关闭属于正常结束，只记 debug；
/// 其余情况（请求收到一半）都是错误。
fn read_failure_level(e: &Exception, headers_read: bool) -> Level {
    match e {
        Exception::TimedOut { received: 0 } | Exception::ConnectionClosed if !headers_read => {
            Level::Debug
        }
        _ => Level::Error,
    }
}

fn receive<S>(connection: &mut Connection<S>, info: &mut RequestInfo) -> Result<(), Exception>
where
    S: std::io::Read + std::io::Write,
{
    let mut head = connection.read_until(HEADER_TERMINATOR)?;
    head.truncate(head.len() - HEADER_TERMINATOR.len());

    let lines: Vec<String> = String::from_utf8_lossy(&head)
        .split(CRLF)
        .map(str::to_string)
        .collect();
    let content_length = lines
        .iter()
        .filter_map(|line| CONTENT_LENGTH.captures(line))
        .filter_map(|captures| captures[1].parse::<usize>().ok())
        .last()
        .unwrap_or(0);
    info.headers = Some(lines);
    info.head = head;

    if content_length > 0 {
        info.body = Some(Bytes::from(connection.read(content_length)?));
    }
    Ok(())
}

fn send_response<S>(connection: &mut Connection<S>, response: &Response, info: &mut RequestInfo)
where
    S: std::io::Read + std::io::Write,
{
    let start = Instant::now();
    let (bytes, header_length) = response.to_wire(&Utc::now());
    match connection.write(&bytes) {
        Ok(transmitted) => {
            let is_head = info.request.as_ref().map_or(false, |r| r.method() == "HEAD");
            check_transmitted(response, header_length, transmitted, is_head);
        }
        Err(e) => {
            error!("发送响应失败：");
            error!("{}: {}", e.code(), e);
            info.error = true;
        }
    }
    info.profiling.send = Some((start, Some(Instant::now())));
}

/// 核对发送的字节数。只记录日志，不做修正。
fn check_transmitted(response: &Response, header_length: usize, transmitted: usize, is_head: bool) {
    let declared = response
        .header("Content-Length")
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(0);
    let expected = if is_head { header_length } else { header_length + declared };

    debug!("已发送{}字节", transmitted);
    if transmitted != expected {
        error!(
            "实际发送字节数与声明的字节数相差{}字节",
            transmitted as i64 - expected as i64
        );
    }
    if !is_head && declared != response.body_len() {
        error!(
            "声明的响应体长度为{}，实际应为{}",
            declared,
            response.body_len()
        );
    }
}

/// 访问日志：`[日期] 客户端 --> 方法 路径 --> 状态码 原因短语 [耗时ms]`
fn log_request<S>(connection: &Connection<S>, info: &RequestInfo)
where
    S: std::io::Read + std::io::Write,
{
    if let Some(line) = access_log_line(connection.client_address(), info) {
        info!("{}", line);
    }
}

/// 没有响应时不记录。请求头无法解析时方法记为 `-`，路径记原始请求行。
fn access_log_line(client: &str, info: &RequestInfo) -> Option<String> {
    let response = info.response.as_ref()?;
    let (method, path) = match &info.request {
        Some(request) => (request.method(), request.uri_path()),
        None => {
            let request_line = info
                .headers
                .as_ref()
                .and_then(|lines| lines.first())
                .map(String::as_str)
                .filter(|line| !line.is_empty())
                .unwrap_or("-");
            ("-", request_line)
        }
    };
    Some(format_access_log(
        client,
        method,
        path,
        response,
        info.profiling.total_ms(),
    ))
}

fn format_access_log(
    client: &str,
    method: &str,
    path: &str,
    response: &Response,
    total_ms: u64,
) -> String {
    format!(
        "[{}] {} --> {} {} --> {} {} [{}ms]",
        Local::now().format(REQUEST_DATE_FORMAT),
        client,
        method,
        path,
        response.status_code(),
        response.information(),
        total_ms
    )
}
