use std::{
    fs,
    path::{Path, PathBuf},
};

use log::debug;
use regex::Regex;

use crate::{exception::Exception, param::reason_phrase};

/// 确保目录存在。目录原本不存在并被创建时返回 `true`，已存在时什么也不做并返回 `false`。
///
/// `writable` 为真且新建的目录不可写时，尝试放开权限。
pub fn ensure_directory(dir: &Path, writable: bool) -> Result<bool, Exception> {
    if dir.is_dir() {
        return Ok(false);
    }

    create_dir_all(dir).map_err(|err| Exception::CreateDir {
        path: dir.to_path_buf(),
        err,
    })?;
    debug!("已创建目录：{}", dir.display());

    if writable && !is_writable(dir) {
        make_writable(dir).map_err(|err| Exception::MakeWritable {
            path: dir.to_path_buf(),
            err,
        })?;
    }
    Ok(true)
}

#[cfg(unix)]
fn create_dir_all(dir: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    fs::DirBuilder::new().recursive(true).mode(0o777).create(dir)
}

#[cfg(not(unix))]
fn create_dir_all(dir: &Path) -> std::io::Result<()> {
    fs::DirBuilder::new().recursive(true).create(dir)
}

fn is_writable(dir: &Path) -> bool {
    fs::metadata(dir)
        .map(|m| !m.permissions().readonly())
        .unwrap_or(false)
}

#[cfg(unix)]
fn make_writable(dir: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(dir, fs::Permissions::from_mode(0o777))
}

#[cfg(not(unix))]
fn make_writable(dir: &Path) -> std::io::Result<()> {
    let mut permissions = fs::metadata(dir)?.permissions();
    permissions.set_readonly(false);
    fs::set_permissions(dir, permissions)
}

/// 递归删除 `dir` 下的内容，`dir` 本身始终保留。
///
/// 相对路径（以 `/` 连接）匹配 `skip` 的文件或目录原样保留，它们的上级目录也不会被删除。
/// 任何一次删除失败都会立即中止整个操作，已删除的文件不会恢复。
pub fn delete_directory_contents(dir: &Path, skip: Option<&Regex>) -> Result<(), Exception> {
    delete_recursive(dir, skip, 0, "")?;
    Ok(())
}

/// 返回该目录下是否有被跳过而保留下来的条目。
fn delete_recursive(
    dir: &Path,
    skip: Option<&Regex>,
    level: usize,
    relative_parent: &str,
) -> Result<bool, Exception> {
    let read_dir_error = |err| Exception::ReadDir {
        path: dir.to_path_buf(),
        err,
    };

    let mut skipped = false;
    for entry in fs::read_dir(dir).map_err(read_dir_error)? {
        let entry = entry.map_err(read_dir_error)?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let relative = if relative_parent.is_empty() {
            name
        } else {
            format!("{}/{}", relative_parent, name)
        };

        if skip.map_or(false, |pattern| pattern.is_match(&relative)) {
            debug!("保留：{}", relative);
            skipped = true;
            continue;
        }

        let path = entry.path();
        let is_dir = entry.file_type().map_err(read_dir_error)?.is_dir();
        if is_dir {
            skipped |= delete_recursive(&path, skip, level + 1, &relative)?;
        } else {
            fs::remove_file(&path).map_err(|err| Exception::Unlink { path, err })?;
        }
    }

    if level > 0 && !skipped && dir.is_dir() {
        fs::remove_dir(dir).map_err(|err| Exception::Rmdir {
            path: dir.to_path_buf(),
            err,
        })?;
    }
    Ok(skipped)
}

/// 把相对路径安全地拼接到根目录下，拒绝 `..` 等越界片段。
pub fn join_under_root(root: &Path, relative: &str) -> Option<PathBuf> {
    let mut path = root.to_path_buf();
    for segment in relative.split('/') {
        match segment {
            "" | "." => continue,
            ".." => return None,
            s if s.contains('\\') || s.contains('\0') => return None,
            s => path.push(s),
        }
    }
    Some(path)
}

pub struct HtmlBuilder {
    title: String,
    css: String,
    body: String,
}

impl HtmlBuilder {
    /// 错误页只包含状态码与标准原因短语，内部错误信息只写日志。
    pub fn from_status_code(code: u16) -> Self {
        let title = format!("{} {}", code, reason_phrase(code));
        let css = r"
            body {
                width: 35em;
                margin: 0 auto;
                font-family: Tahoma, Verdana, Arial, sans-serif;
            }
            "
        .to_string();
        let body = format!(
            r"
            <h1>{}</h1>
            <p>{}</p>
            ",
            code,
            reason_phrase(code)
        );
        Self { title, css, body }
    }

    pub fn build(&self) -> String {
        format!(
            r##"<!DOCTYPE html>
            <html>
                <head>
                    <meta charset="utf-8">
                    <title>{}</title>
                    <style>{}</style>
                </head>
                <body>
                {}
                </body>
            </html>"##,
            self.title, self.css, self.body
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(root: &Path, relative: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"x").unwrap();
    }

    #[test]
    fn test_ensure_directory_creates_chain() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("a/b/c");

        assert!(ensure_directory(&target, true).unwrap());
        assert!(target.is_dir());
        assert!(!fs::metadata(&target).unwrap().permissions().readonly());
    }

    #[test]
    fn test_ensure_directory_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("cache");
        assert!(ensure_directory(&target, false).unwrap());
        touch(&target, "keep.txt");

        assert!(!ensure_directory(&target, false).unwrap());
        assert!(!ensure_directory(&target, true).unwrap());
        assert!(target.join("keep.txt").is_file());
    }

    #[test]
    fn test_ensure_directory_fails_on_file() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "blocker");
        let result = ensure_directory(&dir.path().join("blocker/sub"), false);
        assert!(matches!(result, Err(Exception::CreateDir { .. })));
    }

    #[test]
    fn test_delete_everything_keeps_root() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "a.html");
        touch(dir.path(), "sub/b.html");
        touch(dir.path(), "sub/deeper/c.html");

        delete_directory_contents(dir.path(), None).unwrap();

        assert!(dir.path().is_dir());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_delete_empty_root() {
        let dir = TempDir::new().unwrap();
        delete_directory_contents(dir.path(), None).unwrap();
        assert!(dir.path().is_dir());
    }

    #[test]
    fn test_skipped_files_survive_with_ancestors() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "pages/index.html");
        touch(dir.path(), "pages/keep/.gitignore");
        touch(dir.path(), "posts/2012/01/01_a.html");
        touch(dir.path(), "top.html");

        let skip = Regex::new(r"\.gitignore$").unwrap();
        delete_directory_contents(dir.path(), Some(&skip)).unwrap();

        assert!(dir.path().join("pages/keep/.gitignore").is_file());
        assert!(!dir.path().join("pages/index.html").exists());
        assert!(!dir.path().join("posts").exists());
        assert!(!dir.path().join("top.html").exists());
    }

    #[test]
    fn test_skipped_directory_is_left_untouched() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "templates/layout.html");
        touch(dir.path(), "templates/partials/nav.html");
        touch(dir.path(), "output/page.html");

        let skip = Regex::new(r"^templates$").unwrap();
        delete_directory_contents(dir.path(), Some(&skip)).unwrap();

        assert!(dir.path().join("templates/layout.html").is_file());
        assert!(dir.path().join("templates/partials/nav.html").is_file());
        assert!(!dir.path().join("output").exists());
    }

    #[test]
    fn test_skip_pattern_sees_relative_forward_slash_paths() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "a/b/keep.txt");
        touch(dir.path(), "a/b/drop.txt");

        let skip = Regex::new(r"^a/b/keep\.txt$").unwrap();
        delete_directory_contents(dir.path(), Some(&skip)).unwrap();

        assert!(dir.path().join("a/b/keep.txt").is_file());
        assert!(!dir.path().join("a/b/drop.txt").exists());
    }

    #[test]
    fn test_delete_missing_dir_is_error() {
        let dir = TempDir::new().unwrap();
        let result = delete_directory_contents(&dir.path().join("nope"), None);
        assert!(matches!(result, Err(Exception::ReadDir { .. })));
    }

    #[test]
    fn test_join_under_root() {
        let root = Path::new("/srv");
        assert_eq!(
            join_under_root(root, "/a/./b.html"),
            Some(PathBuf::from("/srv/a/b.html"))
        );
        assert_eq!(join_under_root(root, "/"), Some(PathBuf::from("/srv")));
        assert_eq!(join_under_root(root, "/../etc/passwd"), None);
        assert_eq!(join_under_root(root, "/a\\..\\b"), None);
    }

    #[test]
    fn test_html_builder_from_status_code() {
        let html = HtmlBuilder::from_status_code(404).build();
        assert!(html.contains("404"));
        assert!(html.contains("Not Found"));
        assert!(html.contains("<!DOCTYPE html>"));
        assert!(html.contains("</html>"));
    }

    #[test]
    fn test_html_builder_unknown_code() {
        let html = HtmlBuilder::from_status_code(599).build();
        assert!(html.contains("599 Unknown"));
    }
}
