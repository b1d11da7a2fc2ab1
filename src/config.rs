use serde_derive::Deserialize;
use serde_derive::Serialize;

use log::{info, warn};
use std::fs::File;
use std::io::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::exception::Exception;

/// 站点信息的只读视图，文章路径解析层只通过它获取目录与布局配置。
pub trait Site {
    /// 文章根目录，`None` 表示站点没有文章。
    fn posts_dir(&self) -> Option<&Path>;
    /// 页面根目录，`None` 表示站点没有普通页面。
    fn pages_dir(&self) -> Option<&Path>;
    /// 文章目录布局的名称（`hierarchy`、`shallow` 或 `flat`）。
    fn posts_fs(&self) -> &str;
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SiteConfig {
    #[serde(default)]
    posts_dir: Option<PathBuf>,
    #[serde(default)]
    pages_dir: Option<PathBuf>,
    #[serde(default = "default_posts_fs")]
    posts_fs: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    #[serde(default = "default_www_root")]
    www_root: String,
    #[serde(default = "default_address")]
    address: String,
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default = "default_keep_alive")]
    keep_alive: bool,
    #[serde(default = "default_read_timeout_secs")]
    read_timeout_secs: u64,
    #[serde(default)]
    site: SiteConfig,
}

fn default_www_root() -> String {
    "_counter".to_string()
}

fn default_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_keep_alive() -> bool {
    true
}

fn default_read_timeout_secs() -> u64 {
    10
}

fn default_posts_fs() -> String {
    "flat".to_string()
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            posts_dir: Some(PathBuf::from("_content/posts")),
            pages_dir: Some(PathBuf::from("_content/pages")),
            posts_fs: default_posts_fs(),
        }
    }
}

impl SiteConfig {
    pub fn new(posts_dir: Option<PathBuf>, pages_dir: Option<PathBuf>, posts_fs: &str) -> Self {
        Self {
            posts_dir,
            pages_dir,
            posts_fs: posts_fs.to_string(),
        }
    }
}

impl Site for SiteConfig {
    fn posts_dir(&self) -> Option<&Path> {
        self.posts_dir.as_deref()
    }

    fn pages_dir(&self) -> Option<&Path> {
        self.pages_dir.as_deref()
    }

    fn posts_fs(&self) -> &str {
        &self.posts_fs
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        Self {
            www_root: default_www_root(),
            address: default_address(),
            port: default_port(),
            keep_alive: default_keep_alive(),
            read_timeout_secs: default_read_timeout_secs(),
            site: SiteConfig::default(),
        }
    }

    pub fn from_toml(filename: &str) -> Result<Self, Exception> {
        let mut file = File::open(filename)
            .map_err(|e| Exception::Config(format!("no such file {}: {}", filename, e)))?;
        let mut str_val = String::new();
        file.read_to_string(&mut str_val)
            .map_err(|e| Exception::Config(format!("error reading {}: {}", filename, e)))?;
        let config = Self::from_str(&str_val)?;
        info!("配置文件{}已载入", filename);
        Ok(config)
    }

    pub fn from_str(text: &str) -> Result<Self, Exception> {
        let raw_config: Config =
            toml::from_str(text).map_err(|e| Exception::Config(e.to_string()))?;
        if raw_config.port == 0 {
            warn!("port被设置为0，系统将随机分配一个可用端口。");
        }
        Ok(raw_config)
    }
}

impl Config {
    pub fn www_root(&self) -> &str {
        &self.www_root
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn keep_alive(&self) -> bool {
        self.keep_alive
    }

    /// 读取超时；配置为 0 时不设超时。
    pub fn read_timeout(&self) -> Option<Duration> {
        match self.read_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    pub fn site(&self) -> &SiteConfig {
        &self.site
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_for_empty_file() {
        let config = Config::from_str("").unwrap();
        assert_eq!(config.port(), 8080);
        assert_eq!(config.address(), "127.0.0.1");
        assert!(config.keep_alive());
        assert_eq!(config.read_timeout(), Some(Duration::from_secs(10)));
        assert_eq!(config.site().posts_fs(), "flat");
        assert_eq!(config.site().posts_dir(), Some(Path::new("_content/posts")));
    }

    #[test]
    fn test_full_file() {
        let text = r#"
            www_root = "out"
            address = "0.0.0.0"
            port = 9000
            keep_alive = false
            read_timeout_secs = 0

            [site]
            posts_dir = "posts"
            posts_fs = "hierarchy"
        "#;
        let config = Config::from_str(text).unwrap();
        assert_eq!(config.www_root(), "out");
        assert_eq!(config.address(), "0.0.0.0");
        assert_eq!(config.port(), 9000);
        assert!(!config.keep_alive());
        assert_eq!(config.read_timeout(), None);
        assert_eq!(config.site().posts_dir(), Some(Path::new("posts")));
        assert_eq!(config.site().pages_dir(), None);
        assert_eq!(config.site().posts_fs(), "hierarchy");
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let result = Config::from_str("port = \"not a number\"");
        assert!(matches!(result, Err(Exception::Config(_))));
    }

    #[test]
    fn test_missing_file() {
        let result = Config::from_toml("/nonexistent/chef.toml");
        assert!(matches!(result, Err(Exception::Config(_))));
    }
}
