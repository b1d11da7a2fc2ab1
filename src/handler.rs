// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 请求处理管线
//!
//! 一个请求依次经过：
//! 1. 可选的预处理器：可以改写请求，也可以直接给出响应从而短路后续处理。
//! 2. 按 HTTP 方法注册的处理器链：按注册顺序逐个尝试，第一个给出响应的处理器胜出。
//! 3. 都没有给出响应时返回默认响应。
//!
//! 处理过程中的任何错误都会被记录日志并转换为错误响应，不会继续向上传播。

use std::{
    collections::HashMap,
    ffi::OsStr,
    fs,
    path::PathBuf,
};

use log::{debug, error};

use crate::{
    exception::Exception,
    param::{HTML_INDEX, MIME_TYPES},
    request::Request,
    response::Response,
    util::join_under_root,
};

/// 处理器的统一接口：能处理时返回 `Some(Response)`，否则返回 `None` 交给下一个处理器。
pub trait RequestHandler {
    fn try_handle(&self, request: &Request) -> Result<Option<Response>, Exception>;
}

impl<F> RequestHandler for F
where
    F: Fn(&Request) -> Result<Option<Response>, Exception>,
{
    fn try_handle(&self, request: &Request) -> Result<Option<Response>, Exception> {
        self(request)
    }
}

/// 预处理器，先于所有处理器执行。
pub type Preprocessor = Box<dyn Fn(&mut Request) -> Result<Option<Response>, Exception>>;

/// 以大写 HTTP 方法为键的处理器注册表。只在启动阶段修改，服务期间只读。
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Vec<Box<dyn RequestHandler>>>,
    methods: Vec<String>,
    preprocessor: Option<Preprocessor>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册处理器，同一方法下先注册的优先。
    pub fn add_request_handler<H>(&mut self, method: &str, handler: H) -> &mut Self
    where
        H: RequestHandler + 'static,
    {
        let method = method.to_uppercase();
        if !self.handlers.contains_key(&method) {
            self.methods.push(method.clone());
        }
        self.handlers
            .entry(method)
            .or_default()
            .push(Box::new(handler));
        self
    }

    pub fn set_preprocessor<F>(&mut self, preprocessor: F) -> &mut Self
    where
        F: Fn(&mut Request) -> Result<Option<Response>, Exception> + 'static,
    {
        self.preprocessor = Some(Box::new(preprocessor));
        self
    }

    /// 已注册的方法，按首次注册的顺序。
    pub fn methods(&self) -> &[String] {
        &self.methods
    }

    /// 运行整条管线，总能得到一个响应。
    pub fn process(&self, request: &mut Request) -> Response {
        match self.run(request) {
            Ok(response) => response,
            Err(e) => {
                error!("处理请求时发生错误：");
                error!("{}: {}", e.code(), e);
                Response::from_status_code(e.status_code())
            }
        }
    }

    fn run(&self, request: &mut Request) -> Result<Response, Exception> {
        if let Some(preprocessor) = &self.preprocessor {
            if let Some(response) = preprocessor(request)? {
                debug!("预处理器直接给出了响应");
                return Ok(response);
            }
        }

        let handlers = match self.handlers.get(request.method()) {
            Some(handlers) => handlers,
            None => {
                debug!("没有为{}方法注册处理器，返回405", request.method());
                return Ok(Response::from_status_code(405)
                    .with_header("Allow", &self.methods.join(", ")));
            }
        };

        for handler in handlers {
            if let Some(response) = handler.try_handle(request)? {
                return Ok(response);
            }
        }
        debug!("没有处理器响应{} {}，返回404", request.method(), request.uri());
        Ok(Response::from_status_code(404))
    }
}

/// 把请求路径映射到根目录下的文件并原样返回。文件不存在时交给下一个处理器。
pub struct StaticFileHandler {
    root: PathBuf,
}

impl StaticFileHandler {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, request: &Request) -> Result<Option<PathBuf>, Exception> {
        let uri_path = request.uri_path();
        let path = match join_under_root(&self.root, uri_path) {
            Some(path) => path,
            None => return Err(Exception::InvalidPath(uri_path.to_string())),
        };
        let path = if path.is_dir() { path.join(HTML_INDEX) } else { path };
        debug!("映射物理路径：{}", path.display());
        Ok(if path.is_file() { Some(path) } else { None })
    }
}

impl RequestHandler for StaticFileHandler {
    fn try_handle(&self, request: &Request) -> Result<Option<Response>, Exception> {
        let path = match self.resolve(request)? {
            Some(path) => path,
            None => return Ok(None),
        };

        let contents = fs::read(&path)
            .map_err(|e| Exception::Handler(format!("无法读取文件{}：{}", path.display(), e)))?;
        let mime = path.extension().map_or(MIME_DEFAULT, get_mime);
        let response = Response::new(200)
            .with_header("Content-Type", mime)
            .with_header("Content-Length", &contents.len().to_string());
        if request.method() == "HEAD" {
            Ok(Some(response))
        } else {
            Ok(Some(response.with_body(contents)))
        }
    }
}

const MIME_DEFAULT: &str = "application/octet-stream";

fn get_mime(extension: &OsStr) -> &'static str {
    extension
        .to_str()
        .and_then(|e| MIME_TYPES.get(e.to_lowercase().as_str()).copied())
        .unwrap_or(MIME_DEFAULT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::ServerInfo;
    use std::{cell::Cell, rc::Rc};

    type Outcome = Result<Option<Response>, Exception>;
    use tempfile::TempDir;

    fn request(method: &str, uri: &str) -> Request {
        let raw = format!("{} {} HTTP/1.1\r\nHost: localhost\r\n\r\n", method, uri);
        let server = ServerInfo {
            name: "127.0.0.1".to_string(),
            port: 8080,
        };
        Request::from_bytes(server, raw.as_bytes(), None).unwrap()
    }

    fn text(body: &'static str) -> impl Fn(&Request) -> Outcome {
        move |_: &Request| Ok(Some(Response::new(200).with_body(body)))
    }

    fn pass(_: &Request) -> Outcome {
        Ok(None)
    }

    #[test]
    fn test_first_answer_wins() {
        let mut registry = HandlerRegistry::new();
        registry
            .add_request_handler("get", pass)
            .add_request_handler("GET", text("first"))
            .add_request_handler("GET", text("second"));

        let response = registry.process(&mut request("GET", "/"));
        assert_eq!(response.body().unwrap().as_ref(), b"first");
    }

    #[test]
    fn test_handlers_are_keyed_by_method() {
        let mut registry = HandlerRegistry::new();
        registry
            .add_request_handler("GET", text("get"))
            .add_request_handler("POST", text("post"));

        let response = registry.process(&mut request("POST", "/"));
        assert_eq!(response.body().unwrap().as_ref(), b"post");
    }

    #[test]
    fn test_no_answer_is_404() {
        let mut registry = HandlerRegistry::new();
        registry.add_request_handler("GET", pass);

        let response = registry.process(&mut request("GET", "/missing"));
        assert_eq!(response.status_code(), 404);
    }

    #[test]
    fn test_unregistered_method_is_405() {
        let mut registry = HandlerRegistry::new();
        registry
            .add_request_handler("GET", pass)
            .add_request_handler("HEAD", pass);

        let response = registry.process(&mut request("DELETE", "/"));
        assert_eq!(response.status_code(), 405);
        assert_eq!(response.header("Allow"), Some("GET, HEAD"));
    }

    #[test]
    fn test_preprocessor_can_short_circuit() {
        let called = Rc::new(Cell::new(false));
        let called_in_handler = Rc::clone(&called);

        let mut registry = HandlerRegistry::new();
        registry.add_request_handler("GET", move |_: &Request| -> Outcome {
            called_in_handler.set(true);
            Ok(Some(Response::new(200)))
        });
        registry.set_preprocessor(|_: &mut Request| Ok(Some(Response::new(304))));

        let response = registry.process(&mut request("GET", "/"));
        assert_eq!(response.status_code(), 304);
        assert!(!called.get());
    }

    #[test]
    fn test_preprocessor_can_rewrite_request() {
        let mut registry = HandlerRegistry::new();
        registry.set_preprocessor(|request: &mut Request| {
            request.set_uri("/rewritten");
            Ok(None)
        });
        registry.add_request_handler("GET", |request: &Request| -> Outcome {
            Ok(Some(Response::new(200).with_body(request.uri().to_string())))
        });

        let response = registry.process(&mut request("GET", "/original"));
        assert_eq!(response.body().unwrap().as_ref(), b"/rewritten");
    }

    #[test]
    fn test_explicit_status_failure() {
        let mut registry = HandlerRegistry::new();
        registry.add_request_handler("GET", |_: &Request| -> Outcome {
            Err(Exception::Web {
                code: 403,
                message: "secret".to_string(),
            })
        });

        let response = registry.process(&mut request("GET", "/"));
        assert_eq!(response.status_code(), 403);
        let body = String::from_utf8_lossy(response.body().unwrap()).to_string();
        assert!(!body.contains("secret"));
    }

    #[test]
    fn test_unset_status_and_generic_failures_are_500() {
        let mut registry = HandlerRegistry::new();
        registry.add_request_handler("GET", |_: &Request| -> Outcome {
            Err(Exception::Web {
                code: 0,
                message: "unset".to_string(),
            })
        });
        registry.add_request_handler("POST", |_: &Request| -> Outcome {
            Err(Exception::Handler("template exploded".to_string()))
        });

        assert_eq!(registry.process(&mut request("GET", "/")).status_code(), 500);
        let response = registry.process(&mut request("POST", "/"));
        assert_eq!(response.status_code(), 500);
        let body = String::from_utf8_lossy(response.body().unwrap()).to_string();
        assert!(!body.contains("template exploded"));
    }

    #[test]
    fn test_post_not_found_maps_to_404() {
        let mut registry = HandlerRegistry::new();
        registry.add_request_handler("GET", |_: &Request| -> Outcome {
            Err(Exception::PostNotFound("posts/????-??-??_x.html".to_string()))
        });
        assert_eq!(registry.process(&mut request("GET", "/x")).status_code(), 404);
    }

    #[test]
    fn test_static_file_handler() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("blog")).unwrap();
        fs::write(dir.path().join("index.html"), "<p>home</p>").unwrap();
        fs::write(dir.path().join("blog/style.css"), "p {}").unwrap();

        let handler = StaticFileHandler::new(dir.path());

        let response = handler.try_handle(&request("GET", "/")).unwrap().unwrap();
        assert_eq!(response.body().unwrap().as_ref(), b"<p>home</p>");
        assert_eq!(response.header("Content-Type"), Some("text/html;charset=utf-8"));

        let response = handler
            .try_handle(&request("GET", "/blog/style.css?v=2"))
            .unwrap()
            .unwrap();
        assert_eq!(response.header("Content-Type"), Some("text/css;charset=utf-8"));
        assert_eq!(response.header("Content-Length"), Some("4"));

        assert!(handler.try_handle(&request("GET", "/nope.html")).unwrap().is_none());
    }

    #[test]
    fn test_static_file_handler_head_has_no_body() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.txt"), "0123456789").unwrap();

        let handler = StaticFileHandler::new(dir.path());
        let response = handler.try_handle(&request("HEAD", "/a.txt")).unwrap().unwrap();
        assert!(response.body().is_none());
        assert_eq!(response.header("Content-Length"), Some("10"));
    }

    #[test]
    fn test_static_file_handler_rejects_traversal() {
        let dir = TempDir::new().unwrap();
        let handler = StaticFileHandler::new(dir.path());

        let result = handler.try_handle(&request("GET", "/../etc/passwd"));
        match result {
            Err(e) => assert_eq!(e.status_code(), 400),
            Ok(r) => panic!("Expected InvalidPath, got {:?}", r),
        }
    }

    #[test]
    fn test_get_mime() {
        assert_eq!(get_mime(OsStr::new("html")), "text/html;charset=utf-8");
        assert_eq!(get_mime(OsStr::new("PNG")), "image/png");
        assert_eq!(get_mime(OsStr::new("unknown_extension")), MIME_DEFAULT);
    }
}
