// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 传输层
//!
//! 连接驱动只通过 [`NetworkHandler`] 与 [`Connection`] 接触网络：
//! 前者负责接受新连接，后者提供“读到分隔符为止”“读取定长字节”“写出全部字节”三种阻塞操作。
//! 超时作为可恢复的 [`Exception::TimedOut`] 单独上报，而不是普通的 I/O 错误。

use std::{
    io::{self, BufRead, BufReader, Read, Write},
    net::{TcpListener, TcpStream},
    time::Duration,
};

use log::debug;

use crate::exception::Exception;

/// 接受连接的一方。同一时刻驱动只持有一个连接。
pub trait NetworkHandler {
    type Stream: Read + Write;

    /// 阻塞直到有新的客户端连接。
    fn connect(&mut self) -> Result<Connection<Self::Stream>, Exception>;

    /// 监听地址
    fn address(&self) -> &str;

    /// 监听端口
    fn port(&self) -> u16;
}

/// 一个已接受的连接。
pub struct Connection<S: Read + Write> {
    reader: BufReader<S>,
    client_address: String,
}

impl<S: Read + Write> Connection<S> {
    pub fn new(stream: S, client_address: impl Into<String>) -> Self {
        Self {
            reader: BufReader::new(stream),
            client_address: client_address.into(),
        }
    }

    pub fn client_address(&self) -> &str {
        &self.client_address
    }

    /// 读取直到（并包含）`delimiter` 为止的全部字节。
    ///
    /// 对端在发送任何字节之前关闭连接时返回 `ConnectionClosed`；
    /// 读到一半被关闭则是普通的网络错误。
    pub fn read_until(&mut self, delimiter: &[u8]) -> Result<Vec<u8>, Exception> {
        let mut buffer = Vec::new();
        let last = match delimiter.last() {
            Some(last) => *last,
            None => return Ok(buffer),
        };

        loop {
            let n = self
                .reader
                .read_until(last, &mut buffer)
                .map_err(|e| Exception::from_io(e, buffer.len()))?;
            if n == 0 {
                return Err(eof(buffer.len()));
            }
            if buffer.ends_with(delimiter) {
                return Ok(buffer);
            }
        }
    }

    /// 精确读取 `length` 个字节。
    ///
    /// 缓冲区随实际收到的数据增长，不按 `length` 预先分配。
    pub fn read(&mut self, length: usize) -> Result<Vec<u8>, Exception> {
        let mut buffer = Vec::new();
        self.reader
            .by_ref()
            .take(length as u64)
            .read_to_end(&mut buffer)
            .map_err(|e| Exception::from_io(e, buffer.len()))?;
        if buffer.len() < length {
            return Err(eof(buffer.len()));
        }
        Ok(buffer)
    }

    /// 写出全部字节并返回实际发送的字节数。
    pub fn write(&mut self, data: &[u8]) -> Result<usize, Exception> {
        let stream = self.reader.get_mut();
        let mut transmitted = 0;
        while transmitted < data.len() {
            match stream.write(&data[transmitted..]) {
                Ok(0) => break,
                Ok(n) => transmitted += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(Exception::from_io(e, transmitted)),
            }
        }
        stream
            .flush()
            .map_err(|e| Exception::from_io(e, transmitted))?;
        Ok(transmitted)
    }
}

fn eof(received: usize) -> Exception {
    if received == 0 {
        Exception::ConnectionClosed
    } else {
        Exception::Network(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("连接在收到{}字节后被关闭", received),
        ))
    }
}

/// 基于 `std::net::TcpListener` 的阻塞式实现。
pub struct TcpNetworkHandler {
    listener: TcpListener,
    address: String,
    port: u16,
    read_timeout: Option<Duration>,
}

impl TcpNetworkHandler {
    /// 绑定监听地址。`port` 为 0 时由系统分配端口，可通过 [`NetworkHandler::port`] 取得。
    pub fn bind(
        address: &str,
        port: u16,
        read_timeout: Option<Duration>,
    ) -> Result<Self, Exception> {
        let listener = TcpListener::bind((address, port)).map_err(Exception::Network)?;
        let port = listener.local_addr().map_err(Exception::Network)?.port();
        Ok(Self {
            listener,
            address: address.to_string(),
            port,
            read_timeout,
        })
    }
}

impl NetworkHandler for TcpNetworkHandler {
    type Stream = TcpStream;

    fn connect(&mut self) -> Result<Connection<TcpStream>, Exception> {
        let (stream, addr) = self.listener.accept().map_err(Exception::Network)?;
        stream
            .set_read_timeout(self.read_timeout)
            .map_err(Exception::Network)?;
        debug!("新的连接：{}", addr);
        Ok(Connection::new(stream, addr.ip().to_string()))
    }

    fn address(&self) -> &str {
        &self.address
    }

    fn port(&self) -> u16 {
        self.port
    }
}
