// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 文章文件系统模块
//!
//! 负责在逻辑标识（年/月/日/slug）与磁盘上的物理文件之间来回映射：
//! 1. 枚举页面目录中可烘焙的页面文件。
//! 2. 按日期倒序枚举文章文件。
//! 3. 根据 URL 捕获组解析文章路径；URL 未包含的日期部分通过通配符查找
//!    唯一匹配的文件，再用路径模板反推出来（即“重新捕获”）。

use std::{
    cmp::Ordering,
    collections::HashMap,
    path::{Component, Path, PathBuf},
    time::SystemTime,
};

use glob::Pattern;
use log::{debug, warn};
use regex::Captures;
use walkdir::WalkDir;

use crate::{
    config::Site,
    exception::Exception,
    param::{CATEGORY_PAGE_NAME, DEFAULT_BLOG_KEY, TAG_PAGE_NAME},
    path_format::PathFormat,
};

const YEAR_WILDCARD: &str = "????";
const MONTH_WILDCARD: &str = "??";
const DAY_WILDCARD: &str = "??";

/// URL 中解码出的文章组成部分。`slug` 必须存在，日期部分可以缺失。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptureGroups {
    pub year: Option<String>,
    pub month: Option<String>,
    pub day: Option<String>,
    pub slug: String,
}

impl CaptureGroups {
    pub fn new(slug: &str) -> Self {
        Self {
            slug: slug.to_string(),
            ..Default::default()
        }
    }

    pub fn year(mut self, year: &str) -> Self {
        self.year = Some(year.to_string());
        self
    }

    pub fn month(mut self, month: &str) -> Self {
        self.month = Some(month.to_string());
        self
    }

    pub fn day(mut self, day: &str) -> Self {
        self.day = Some(day.to_string());
        self
    }

    /// 从路由正则的命名捕获组构造。
    pub fn from_captures(captures: &Captures) -> Result<Self, Exception> {
        let group = |name: &str| captures.name(name).map(|m| m.as_str().to_string());
        Ok(Self {
            year: group("year"),
            month: group("month"),
            day: group("day"),
            slug: group("slug").ok_or(Exception::MissingSlug)?,
        })
    }

    pub fn from_map(map: &HashMap<String, String>) -> Result<Self, Exception> {
        Ok(Self {
            year: map.get("year").cloned(),
            month: map.get("month").cloned(),
            day: map.get("day").cloned(),
            slug: map.get("slug").cloned().ok_or(Exception::MissingSlug)?,
        })
    }

    fn needs_recapture(&self) -> bool {
        self.year.is_none() || self.month.is_none() || self.day.is_none()
    }
}

/// 文章路径解析的结果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathInfo {
    pub year: Option<String>,
    pub month: Option<String>,
    pub day: Option<String>,
    pub slug: String,
    pub path: PathBuf,
}

/// 页面目录中的一个可烘焙页面。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageFile {
    pub path: PathBuf,
    pub relative_path: String,
}

/// 文章目录中的一篇文章。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostFile {
    pub path: PathBuf,
    pub relative_path: String,
    pub year: Option<String>,
    pub month: Option<String>,
    pub day: Option<String>,
    pub slug: String,
}

/// 通配符展开的抽象，测试中可以替换为内存中的文件列表。
#[cfg_attr(test, mockall::automock)]
pub trait PathLister {
    fn glob(&self, pattern: &str) -> Result<Vec<PathBuf>, Exception>;
}

/// 基于 `glob` crate 的真实磁盘实现。
#[derive(Debug, Default, Clone, Copy)]
pub struct GlobLister;

impl PathLister for GlobLister {
    fn glob(&self, pattern: &str) -> Result<Vec<PathBuf>, Exception> {
        let paths = glob::glob(pattern).map_err(|e| Exception::InvalidPattern(e.to_string()))?;
        let mut matches = Vec::new();
        for entry in paths {
            match entry {
                Ok(path) => matches.push(path),
                Err(e) => warn!("展开通配符{}时无法读取{}", pattern, e.path().display()),
            }
        }
        Ok(matches)
    }
}

/// 解析文章路径。
///
/// `posts_root` 是文章根目录（已包含子博客目录）。捕获组齐全时直接拼出路径，
/// 不检查文件是否存在；缺少日期部分时用通配符展开，只有恰好一个匹配才算成功，
/// 然后用模板正则从该文件相对于 `posts_root` 的路径中取回缺失的部分。
pub fn resolve_post_path(
    format: PathFormat,
    posts_root: &Path,
    captures: &CaptureGroups,
    lister: &dyn PathLister,
) -> Result<PathInfo, Exception> {
    let slug = captures.slug.as_str();
    let relative = format.format(
        captures.year.as_deref().unwrap_or(YEAR_WILDCARD),
        captures.month.as_deref().unwrap_or(MONTH_WILDCARD),
        captures.day.as_deref().unwrap_or(DAY_WILDCARD),
        slug,
    );

    if !captures.needs_recapture() {
        return Ok(PathInfo {
            year: captures.year.clone(),
            month: captures.month.clone(),
            day: captures.day.clone(),
            slug: slug.to_string(),
            path: posts_root.join(relative),
        });
    }

    // 只有日期通配符应当生效，根目录与 slug 中的特殊字符一律按字面处理
    let glob_relative = format.format(
        captures
            .year
            .as_deref()
            .map(Pattern::escape)
            .as_deref()
            .unwrap_or(YEAR_WILDCARD),
        captures
            .month
            .as_deref()
            .map(Pattern::escape)
            .as_deref()
            .unwrap_or(MONTH_WILDCARD),
        captures
            .day
            .as_deref()
            .map(Pattern::escape)
            .as_deref()
            .unwrap_or(DAY_WILDCARD),
        &Pattern::escape(slug),
    );
    let root = Pattern::escape(&to_forward_slashes(posts_root));
    let pattern = if root.is_empty() {
        glob_relative
    } else {
        format!("{}/{}", root.trim_end_matches('/'), glob_relative)
    };
    debug!("重新捕获文章路径：{}", pattern);

    let mut matches = lister.glob(&pattern)?;
    if matches.len() != 1 {
        debug!("{}匹配到{}个文件", pattern, matches.len());
        return Err(Exception::PostNotFound(pattern));
    }
    let path = matches.remove(0);

    // slug 本身可以包含 `/`，所以对相对于文章根目录的整段路径反推
    let components = match relative_to_root(&path, posts_root).and_then(|r| format.capture(&r)) {
        Some(components) => components,
        None => return Err(Exception::PathComponentsMismatch(path)),
    };

    Ok(PathInfo {
        year: components.year.or_else(|| captures.year.clone()),
        month: components.month.or_else(|| captures.month.clone()),
        day: components.day.or_else(|| captures.day.clone()),
        slug: components.slug,
        path,
    })
}

/// 某个博客的文章与页面文件系统。
pub struct PostFileSystem {
    posts_dir: Option<PathBuf>,
    pages_dir: Option<PathBuf>,
    sub_dir: Option<String>,
    format: PathFormat,
    lister: Box<dyn PathLister>,
}

impl PostFileSystem {
    /// 根据站点配置创建文件系统。`sub_dir` 为默认博客键或 `None` 时文章直接位于文章根目录。
    pub fn create(site: &dyn Site, sub_dir: Option<&str>) -> Result<Self, Exception> {
        let format = PathFormat::from_config(site.posts_fs())?;
        Ok(Self::new(
            site.posts_dir().map(Path::to_path_buf),
            site.pages_dir().map(Path::to_path_buf),
            sub_dir,
            format,
        ))
    }

    pub fn new(
        posts_dir: Option<PathBuf>,
        pages_dir: Option<PathBuf>,
        sub_dir: Option<&str>,
        format: PathFormat,
    ) -> Self {
        let sub_dir = sub_dir
            .filter(|s| *s != DEFAULT_BLOG_KEY)
            .map(|s| s.trim_matches(|c| c == '/' || c == '\\').to_string())
            .filter(|s| !s.is_empty());
        Self {
            posts_dir,
            pages_dir,
            sub_dir,
            format,
            lister: Box::new(GlobLister),
        }
    }

    /// 替换通配符展开的实现。
    pub fn with_lister(mut self, lister: Box<dyn PathLister>) -> Self {
        self.lister = lister;
        self
    }

    pub fn format(&self) -> PathFormat {
        self.format
    }

    /// 文章实际所在的目录（文章根目录加上子博客目录）。
    pub fn posts_root(&self) -> Option<PathBuf> {
        let dir = self.posts_dir.as_ref()?;
        Some(match &self.sub_dir {
            Some(sub) => dir.join(sub),
            None => dir.clone(),
        })
    }

    /// 枚举页面目录下的可烘焙页面，顺序不保证。
    pub fn get_page_files(&self) -> Result<Vec<PageFile>, Exception> {
        let pages_dir = match &self.pages_dir {
            Some(dir) => dir,
            None => return Ok(Vec::new()),
        };

        let mut pages = Vec::new();
        for entry in WalkDir::new(pages_dir) {
            let entry = entry.map_err(|e| walk_error(pages_dir, e))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("");
            let extension = path.extension().and_then(|s| s.to_str()).unwrap_or("");
            if stem == CATEGORY_PAGE_NAME || stem == TAG_PAGE_NAME || extension != "html" {
                continue;
            }
            let relative_path = path
                .strip_prefix(pages_dir)
                .map(to_forward_slashes)
                .unwrap_or_default();
            pages.push(PageFile {
                path: path.to_path_buf(),
                relative_path,
            });
        }
        Ok(pages)
    }

    /// 按日期倒序枚举文章。`flat` 布局的路径不含日期，按修改时间倒序。
    pub fn get_post_files(&self) -> Result<Vec<PostFile>, Exception> {
        let root = match self.posts_root() {
            Some(root) => root,
            None => return Ok(Vec::new()),
        };
        if !root.is_dir() {
            return Ok(Vec::new());
        }

        let mut posts = Vec::new();
        for entry in WalkDir::new(&root) {
            let entry = entry.map_err(|e| walk_error(&root, e))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let relative_path = match path.strip_prefix(&root) {
                Ok(rel) => to_forward_slashes(rel),
                Err(_) => continue,
            };
            let components = match self.format.capture(&relative_path) {
                Some(components) => components,
                None => {
                    warn!("忽略不符合{}布局的文章文件：{}", self.format, path.display());
                    continue;
                }
            };
            let modified = entry
                .metadata()
                .ok()
                .and_then(|m| m.modified().ok())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            posts.push((
                modified,
                PostFile {
                    path: path.to_path_buf(),
                    relative_path,
                    year: components.year,
                    month: components.month,
                    day: components.day,
                    slug: components.slug,
                },
            ));
        }

        if self.format.has_date() {
            posts.sort_by(|(_, a), (_, b)| compare_dates(b, a));
        } else {
            posts.sort_by(|(ta, a), (tb, b)| tb.cmp(ta).then_with(|| b.slug.cmp(&a.slug)));
        }
        Ok(posts.into_iter().map(|(_, post)| post).collect())
    }

    /// 根据捕获组解析文章的物理路径。
    pub fn get_post_path_info(&self, captures: &CaptureGroups) -> Result<PathInfo, Exception> {
        let root = self.posts_root().ok_or(Exception::PostsDirMissing)?;
        resolve_post_path(self.format, &root, captures, self.lister.as_ref())
    }
}

fn compare_dates(a: &PostFile, b: &PostFile) -> Ordering {
    (&a.year, &a.month, &a.day, &a.slug).cmp(&(&b.year, &b.month, &b.day, &b.slug))
}

fn walk_error(root: &Path, err: walkdir::Error) -> Exception {
    let path = err.path().unwrap_or(root).to_path_buf();
    let err = err
        .into_io_error()
        .unwrap_or_else(|| std::io::Error::new(std::io::ErrorKind::Other, "filesystem loop"));
    Exception::ReadDir { path, err }
}

/// 匹配路径相对于文章根目录的部分，分隔符统一为 `/`。
/// 通配符展开可能去掉根目录开头的 `./`，两种写法都接受。
fn relative_to_root(path: &Path, root: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok().or_else(|| {
        let trimmed: PathBuf = root
            .components()
            .skip_while(|c| matches!(c, Component::CurDir))
            .collect();
        path.strip_prefix(trimmed).ok()
    })?;
    Some(to_forward_slashes(relative))
}

fn to_forward_slashes(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
