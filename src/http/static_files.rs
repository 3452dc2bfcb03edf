//! Maps request paths onto files under the web root.
//!
//! A directory resolves to its `index.html` when one exists, otherwise to
//! a generated listing. Nothing is cached between requests.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use html_escape::{encode_double_quoted_attribute, encode_text};
use thiserror::Error;
use tokio::fs::{self, File};

use crate::http::response::StatusCode;

pub const INDEX_FILE: &str = "index.html";

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("resource not found")]
    NotFound,
    #[error("permission denied")]
    PermissionDenied,
    #[error("path escapes the web root")]
    Traversal,
    #[error("io error: {0}")]
    Io(#[source] std::io::Error),
}

impl ResolveError {
    pub fn status(&self) -> StatusCode {
        match self {
            ResolveError::NotFound => StatusCode::NotFound,
            ResolveError::PermissionDenied | ResolveError::Traversal => StatusCode::Forbidden,
            ResolveError::Io(_) => StatusCode::InternalServerError,
        }
    }

    fn from_open(err: std::io::Error) -> Self {
        match err.kind() {
            ErrorKind::NotFound => ResolveError::NotFound,
            ErrorKind::PermissionDenied => ResolveError::PermissionDenied,
            _ => ResolveError::Io(err),
        }
    }
}

/// Outcome of resolving a request path.
#[derive(Debug)]
pub enum Resolution {
    /// A directory without an index file, with its entry names in
    /// enumeration order.
    Directory(Vec<String>),
    /// A regular file (or a directory's index file), already opened.
    File { path: PathBuf, file: File },
}

/// Turns a request path into a relative path with no `..` segments.
///
/// Leading slashes and `.` segments are dropped.
pub fn normalize_path(request_path: &str) -> Result<PathBuf, ResolveError> {
    let mut normalized = PathBuf::new();
    for component in Path::new(request_path).components() {
        match component {
            Component::RootDir | Component::CurDir => {}
            Component::Normal(segment) => normalized.push(segment),
            Component::ParentDir | Component::Prefix(_) => return Err(ResolveError::Traversal),
        }
    }
    Ok(normalized)
}

/// Resolves `request_path` against `root`.
pub async fn resolve(root: &Path, request_path: &str) -> Result<Resolution, ResolveError> {
    let mut path = root.join(normalize_path(request_path)?);

    // Any stat failure counts as not found.
    let meta = fs::metadata(&path).await.map_err(|_| ResolveError::NotFound)?;
    ensure_within(root, &path).await?;

    if meta.is_dir() {
        let index = path.join(INDEX_FILE);
        match fs::metadata(&index).await {
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return list_directory(&path).await.map(Resolution::Directory);
            }
            _ => {
                ensure_within(root, &index).await?;
                path = index;
            }
        }
    }

    let file = File::open(&path).await.map_err(ResolveError::from_open)?;
    Ok(Resolution::File { path, file })
}

/// Fails with `Traversal` when `path`, after following symlinks, lies
/// outside `root`.
async fn ensure_within(root: &Path, path: &Path) -> Result<(), ResolveError> {
    let root = fs::canonicalize(root).await.map_err(ResolveError::Io)?;
    let real = fs::canonicalize(path).await.map_err(ResolveError::from_open)?;
    if real.starts_with(&root) {
        Ok(())
    } else {
        tracing::warn!(path = %path.display(), resolved = %real.display(), "Symlink leads outside the web root");
        Err(ResolveError::Traversal)
    }
}

async fn list_directory(path: &Path) -> Result<Vec<String>, ResolveError> {
    let mut entries = fs::read_dir(path).await.map_err(ResolveError::from_open)?;
    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(ResolveError::Io)? {
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    Ok(names)
}

/// Renders a directory listing. Each entry links to the request path
/// with the entry name appended.
pub fn render_listing(request_path: &str, names: &[String]) -> String {
    let mut html = String::from("<body><ul>\n");
    for name in names {
        let href = format!("{request_path}{name}");
        html.push_str(&format!(
            "<li><a href=\"{}\">{}</a></li>\n",
            encode_double_quoted_attribute(&href),
            encode_text(name)
        ));
    }
    html.push_str("</ul></body>\n");
    html
}
