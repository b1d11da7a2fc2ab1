// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 文章路径格式模块
//!
//! 文章在磁盘上的存放方式由一个路径模板决定，模板中的占位符
//! `%year%`、`%month%`、`%day%`、`%slug%` 在生成路径时被替换。
//! 同一个模板也被编译成正则表达式，用来从物理路径反推出各个组成部分。
//!
//! | 布局 | 模板 |
//! |---|---|
//! | `hierarchy` | `%year%/%month%/%day%_%slug%.html` |
//! | `shallow` | `%year%-%month%-%day%_%slug%.html` |
//! | `flat` | `%slug%.html` |

use std::{fmt, str::FromStr};

use regex::Regex;

use crate::exception::Exception;

pub const YEAR_PLACEHOLDER: &str = "%year%";
pub const MONTH_PLACEHOLDER: &str = "%month%";
pub const DAY_PLACEHOLDER: &str = "%day%";
pub const SLUG_PLACEHOLDER: &str = "%slug%";

/// 文章目录布局。启动时根据配置选定，之后不再改变。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathFormat {
    /// 按年、月分目录存放
    Hierarchy,
    /// 所有文章位于同一目录，文件名带完整日期
    Shallow,
    /// 文件名只有 slug，日期来自文章元数据
    Flat,
}

/// 从路径中反推出的文章组成部分。布局不包含日期时日期字段为 `None`。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostComponents {
    pub year: Option<String>,
    pub month: Option<String>,
    pub day: Option<String>,
    pub slug: String,
}

impl PathFormat {
    /// 按配置值选择布局，未知的值是致命的配置错误。
    pub fn from_config(value: &str) -> Result<Self, Exception> {
        match value {
            "hierarchy" => Ok(PathFormat::Hierarchy),
            "shallow" => Ok(PathFormat::Shallow),
            "flat" => Ok(PathFormat::Flat),
            _ => Err(Exception::UnknownPostsFs(value.to_string())),
        }
    }

    pub fn pattern(&self) -> &'static str {
        match self {
            PathFormat::Hierarchy => "%year%/%month%/%day%_%slug%.html",
            PathFormat::Shallow => "%year%-%month%-%day%_%slug%.html",
            PathFormat::Flat => "%slug%.html",
        }
    }

    pub fn has_date(&self) -> bool {
        !matches!(self, PathFormat::Flat)
    }

    /// 用给定的值替换模板中的全部占位符，得到相对于文章根目录的路径。
    pub fn format(&self, year: &str, month: &str, day: &str, slug: &str) -> String {
        self.pattern()
            .replace(YEAR_PLACEHOLDER, year)
            .replace(MONTH_PLACEHOLDER, month)
            .replace(DAY_PLACEHOLDER, day)
            .replace(SLUG_PLACEHOLDER, slug)
    }

    /// 把模板编译为带命名捕获组的正则表达式，首尾锚定。
    ///
    /// 模板里的字面字符全部转义，占位符依次替换为
    /// `(?P<year>\d{4})`、`(?P<month>\d{2})`、`(?P<day>\d{2})`、`(?P<slug>.+)`。
    pub fn components_regex(&self) -> Regex {
        let escaped = regex::escape(self.pattern())
            .replace(YEAR_PLACEHOLDER, r"(?P<year>\d{4})")
            .replace(MONTH_PLACEHOLDER, r"(?P<month>\d{2})")
            .replace(DAY_PLACEHOLDER, r"(?P<day>\d{2})")
            .replace(SLUG_PLACEHOLDER, r"(?P<slug>.+)");
        // 三种模板都是编译期固定的字符串，编译不会失败
        Regex::new(&format!("^{}$", escaped)).unwrap()
    }

    /// 从相对路径（分隔符为 `/`）中提取组成部分。
    pub fn capture(&self, relative_path: &str) -> Option<PostComponents> {
        let captures = self.components_regex().captures(relative_path)?;
        let group = |name: &str| captures.name(name).map(|m| m.as_str().to_string());
        Some(PostComponents {
            year: group("year"),
            month: group("month"),
            day: group("day"),
            slug: group("slug")?,
        })
    }
}

impl FromStr for PathFormat {
    type Err = Exception;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_config(s)
    }
}

impl fmt::Display for PathFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathFormat::Hierarchy => write!(f, "hierarchy"),
            PathFormat::Shallow => write!(f, "shallow"),
            PathFormat::Flat => write!(f, "flat"),
        }
    }
}
