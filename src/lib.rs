pub mod config;
pub mod connection;
pub mod driver;
pub mod exception;
pub mod filesystem;
pub mod handler;
pub mod param;
pub mod path_format;
pub mod request;
pub mod response;
pub mod util;

pub use config::{Config, Site, SiteConfig};
pub use connection::{Connection, NetworkHandler, TcpNetworkHandler};
pub use driver::{Driver, DriverOptions, Profiling, RequestInfo};
pub use exception::Exception;
pub use filesystem::{CaptureGroups, PathInfo, PathLister, PostFileSystem};
pub use handler::{HandlerRegistry, RequestHandler, StaticFileHandler};
pub use param::HttpVersion;
pub use path_format::PathFormat;
pub use request::{Request, ServerInfo};
pub use response::Response;
pub use util::{delete_directory_contents, ensure_directory, HtmlBuilder};
