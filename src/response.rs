use bytes::Bytes;
use chrono::prelude::*;

use crate::{param::*, util::HtmlBuilder};

/// 由处理器生成、在发送前只会被修改响应头的 HTTP 响应。
#[derive(Debug, Clone)]
pub struct Response {
    status_code: u16,
    headers: Vec<(String, String)>,
    body: Option<Bytes>,
}

impl Response {
    pub fn new(code: u16) -> Self {
        Self {
            status_code: code,
            headers: Vec::new(),
            body: None,
        }
    }

    /// 带 HTML 错误页的响应，页面只包含状态码与原因短语。
    pub fn from_status_code(code: u16) -> Self {
        Self::new(code)
            .with_header("Content-Type", "text/html;charset=utf-8")
            .with_body(HtmlBuilder::from_status_code(code).build())
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.set_header(name, value);
        self
    }

    /// 设置响应头，已存在同名（不区分大小写）字段时替换其值。
    pub fn set_header(&mut self, name: &str, value: &str) -> &mut Self {
        match self
            .headers
            .iter_mut()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
        {
            Some(header) => header.1 = value.to_string(),
            None => self.headers.push((name.to_string(), value.to_string())),
        }
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// 序列化为线上字节。返回完整报文以及其中响应头部分（含空行）的长度。
    pub fn to_wire(&self, date: &DateTime<Utc>) -> (Vec<u8>, usize) {
        let status_line: &str = &self.status_line();
        let date: &str = &format_date(date);
        let mut header = [
            status_line,
            CRLF,
            "Server: ",
            SERVER_NAME,
            CRLF,
            "Date: ",
            date,
            CRLF,
        ]
        .concat();
        for (name, value) in &self.headers {
            header.push_str(&[name.as_str(), ": ", value.as_str(), CRLF].concat());
        }
        header.push_str(CRLF);

        let header_length = header.len();
        let mut bytes = header.into_bytes();
        if let Some(body) = &self.body {
            bytes.extend_from_slice(body);
        }
        (bytes, header_length)
    }

    pub fn as_bytes(&self) -> Vec<u8> {
        self.to_wire(&Utc::now()).0
    }
}

impl Response {
    /// 响应总是以 HTTP/1.1 的状态行发出
    pub fn status_line(&self) -> String {
        format!("HTTP/1.1 {} {}", self.status_code, self.information())
    }

    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn information(&self) -> &'static str {
        reason_phrase(self.status_code)
    }

    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    pub fn body_len(&self) -> usize {
        self.body.as_ref().map_or(0, |b| b.len())
    }
}

fn format_date(date: &DateTime<Utc>) -> String {
    date.format(RESPONSE_DATE_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_date() {
        let date = Utc.with_ymd_and_hms(2012, 3, 14, 15, 9, 26).unwrap();
        assert_eq!(format_date(&date), "Wed, 14 Mar 2012 15:09:26 GMT");
    }

    #[test]
    fn test_response_new() {
        let response = Response::new(200);

        assert_eq!(response.status_code(), 200);
        assert_eq!(response.information(), "OK");
        assert_eq!(response.status_line(), "HTTP/1.1 200 OK");
        assert!(response.body().is_none());
        assert!(response.headers().is_empty());
    }

    #[test]
    fn test_wire_layout() {
        let date = Utc.with_ymd_and_hms(2012, 3, 14, 15, 9, 26).unwrap();
        let response = Response::new(200)
            .with_header("Content-Type", "text/plain")
            .with_body("Hello");

        let (bytes, header_length) = response.to_wire(&date);
        let text = String::from_utf8(bytes.clone()).unwrap();

        assert_eq!(
            text,
            "HTTP/1.1 200 OK\r\n\
             Server: PieCrust Chef Server\r\n\
             Date: Wed, 14 Mar 2012 15:09:26 GMT\r\n\
             Content-Type: text/plain\r\n\
             \r\n\
             Hello"
        );
        assert_eq!(header_length, bytes.len() - 5);
    }

    #[test]
    fn test_set_header_replaces_case_insensitively() {
        let mut response = Response::new(200).with_header("content-length", "3");
        response.set_header("Content-Length", "4");

        assert_eq!(response.headers().len(), 1);
        assert_eq!(response.header("CONTENT-LENGTH"), Some("4"));
    }

    #[test]
    fn test_response_status_code_various() {
        for (code, expected_info) in [
            (200, "OK"),
            (201, "Created"),
            (204, "No Content"),
            (301, "Moved Permanently"),
            (400, "Bad Request"),
            (404, "Not Found"),
            (405, "Method Not Allowed"),
            (500, "Internal Server Error"),
        ] {
            let response = Response::new(code);
            assert_eq!(response.status_code(), code);
            assert_eq!(response.information(), expected_info);
        }
    }

    #[test]
    fn test_error_page_response() {
        let response = Response::from_status_code(500);
        let bytes = response.as_bytes();
        let text = String::from_utf8_lossy(&bytes);

        assert!(text.starts_with("HTTP/1.1 500 Internal Server Error\r\n"));
        assert!(text.contains("Content-Type: text/html;charset=utf-8"));
        assert!(text.contains("<h1>500</h1>"));
    }
}
