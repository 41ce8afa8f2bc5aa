//! Mapping request paths to files inside a site root
//!
//! The requested path is joined to the root, canonicalized and checked to
//! still lie inside the canonical root. This rejects `..` segments and
//! symlinks pointing out of the site before anything is opened.

use crate::error::{BookpubError, BookpubResult};
use axum::body::{Body, Bytes};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use futures_util::StreamExt;
use std::path::{Component, Path, PathBuf};
use tokio_util::io::ReaderStream;

/// Read size when streaming files
pub const CHUNK_SIZE: usize = 64 * 1024;

const INDEX_FILE: &str = "index.html";
const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// A file that may be served, with its content type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServedFile {
    pub path: PathBuf,
    pub content_type: String,
}

/// Resolve `sub_path` (already percent-decoded) inside `root`
pub fn resolve_served_file(root: &Path, sub_path: &str) -> BookpubResult<ServedFile> {
    let relative = relative_path(sub_path)?;

    let root = canonical(root, sub_path)?;
    let mut path = canonical(&root.join(&relative), sub_path)?;
    ensure_contained(&root, &path, sub_path)?;

    if path.is_dir() {
        path = canonical(&path.join(INDEX_FILE), sub_path)?;
        ensure_contained(&root, &path, sub_path)?;
    }

    if !path.is_file() {
        return Err(BookpubError::NotFound(sub_path.to_string()));
    }

    Ok(ServedFile {
        content_type: content_type_for(&path),
        path,
    })
}

/// Reject request paths that try to leave the site, before any lookup
pub fn check_request_path(sub_path: &str) -> BookpubResult<()> {
    relative_path(sub_path).map(|_| ())
}

/// Validate a request path lexically; only plain names are allowed
fn relative_path(sub_path: &str) -> BookpubResult<PathBuf> {
    let mut relative = PathBuf::new();
    for component in Path::new(sub_path.trim_start_matches('/')).components() {
        match component {
            Component::Normal(name) => relative.push(name),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(BookpubError::PathTraversal(sub_path.to_string()));
            }
        }
    }
    Ok(relative)
}

fn canonical(path: &Path, sub_path: &str) -> BookpubResult<PathBuf> {
    path.canonicalize().map_err(|e| match e.kind() {
        std::io::ErrorKind::PermissionDenied => {
            BookpubError::io(format!("resolving {}", path.display()), e)
        }
        _ => BookpubError::NotFound(sub_path.to_string()),
    })
}

fn ensure_contained(root: &Path, path: &Path, sub_path: &str) -> BookpubResult<()> {
    if path.starts_with(root) {
        Ok(())
    } else {
        Err(BookpubError::PathTraversal(sub_path.to_string()))
    }
}

/// Content type from the file extension
///
/// Compressed files are declared as the compressed type, not as the type of
/// what they decompress to.
pub fn content_type_for(path: &Path) -> String {
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase());

    match extension.as_deref() {
        Some("gz") | Some("tgz") => "application/gzip".to_string(),
        Some("bz2") => "application/x-bzip2".to_string(),
        Some("xz") => "application/x-xz".to_string(),
        _ => mime_guess::from_path(path)
            .first_raw()
            .unwrap_or(FALLBACK_CONTENT_TYPE)
            .to_string(),
    }
}

/// Open a served file as a chunked byte stream
pub async fn open_stream(file: &ServedFile) -> BookpubResult<ReaderStream<tokio::fs::File>> {
    let handle = tokio::fs::File::open(&file.path)
        .await
        .map_err(|e| BookpubError::io(format!("opening {}", file.path.display()), e))?;
    Ok(ReaderStream::with_capacity(handle, CHUNK_SIZE))
}

/// Full file response with its inferred content type
pub async fn file_response(file: &ServedFile) -> BookpubResult<Response> {
    file_response_after(file, Bytes::new()).await
}

/// File response whose body starts with `preamble` before the file bytes
pub async fn file_response_after(file: &ServedFile, preamble: Bytes) -> BookpubResult<Response> {
    let stream = open_stream(file).await?;
    let body = if preamble.is_empty() {
        Body::from_stream(stream)
    } else {
        let head = futures_util::stream::once(async move { Ok::<_, std::io::Error>(preamble) });
        Body::from_stream(head.chain(stream))
    };
    Ok(([(header::CONTENT_TYPE, file.content_type.clone())], body).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn site() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("site/chapter")).unwrap();
        fs::write(dir.path().join("site/index.html"), "<h1>home</h1>").unwrap();
        fs::write(dir.path().join("site/chapter/index.html"), "<h1>ch</h1>").unwrap();
        fs::write(dir.path().join("site/chapter/data.csv.gz"), [0x1f, 0x8b]).unwrap();
        fs::write(dir.path().join("site/style.css"), "body {}").unwrap();
        fs::write(dir.path().join("secret.txt"), "secret").unwrap();
        dir
    }

    #[test]
    fn serves_plain_files() {
        let dir = site();
        let root = dir.path().join("site");

        let file = resolve_served_file(&root, "style.css").unwrap();
        assert_eq!(file.content_type, "text/css");
        assert!(file.path.ends_with("style.css"));
    }

    #[test]
    fn directories_serve_index() {
        let dir = site();
        let root = dir.path().join("site");

        let top = resolve_served_file(&root, "").unwrap();
        assert!(top.path.ends_with("site/index.html"));
        assert_eq!(top.content_type, "text/html");

        let chapter = resolve_served_file(&root, "chapter/").unwrap();
        assert!(chapter.path.ends_with("chapter/index.html"));
    }

    #[test]
    fn compressed_files_keep_compressed_type() {
        let dir = site();
        let file = resolve_served_file(&dir.path().join("site"), "chapter/data.csv.gz").unwrap();
        assert_eq!(file.content_type, "application/gzip");
    }

    #[test]
    fn parent_segments_are_rejected() {
        let dir = site();
        let root = dir.path().join("site");

        for attempt in ["../secret.txt", "../../etc/passwd", "chapter/../../secret.txt"] {
            let err = resolve_served_file(&root, attempt).unwrap_err();
            assert!(
                matches!(err, BookpubError::PathTraversal(_)),
                "{attempt} was not rejected"
            );
        }
    }

    #[cfg(unix)]
    #[test]
    fn symlink_escape_is_rejected() {
        let dir = site();
        let root = dir.path().join("site");
        std::os::unix::fs::symlink(dir.path(), root.join("escape")).unwrap();
        std::os::unix::fs::symlink(dir.path().join("secret.txt"), root.join("leak.txt")).unwrap();

        let err = resolve_served_file(&root, "escape/secret.txt").unwrap_err();
        assert!(matches!(err, BookpubError::PathTraversal(_)));

        let err = resolve_served_file(&root, "leak.txt").unwrap_err();
        assert!(matches!(err, BookpubError::PathTraversal(_)));
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_index_outside_root_is_rejected() {
        let dir = site();
        let root = dir.path().join("site");
        fs::create_dir(root.join("trap")).unwrap();
        std::os::unix::fs::symlink(dir.path().join("secret.txt"), root.join("trap/index.html"))
            .unwrap();

        let err = resolve_served_file(&root, "trap/").unwrap_err();
        assert!(matches!(err, BookpubError::PathTraversal(_)));
    }

    #[test]
    fn request_paths_are_checked_lexically() {
        assert!(check_request_path("chapter/intro.html").is_ok());
        assert!(check_request_path("./chapter/").is_ok());
        assert!(check_request_path("").is_ok());
        assert!(check_request_path("a/../../b").is_err());
    }

    #[test]
    fn missing_files_are_not_found() {
        let dir = site();
        let root = dir.path().join("site");

        assert!(matches!(
            resolve_served_file(&root, "nope.html").unwrap_err(),
            BookpubError::NotFound(_)
        ));
        assert!(matches!(
            resolve_served_file(&root, "style.css/x").unwrap_err(),
            BookpubError::NotFound(_)
        ));

        // Directory without an index
        fs::create_dir(root.join("empty")).unwrap();
        assert!(matches!(
            resolve_served_file(&root, "empty").unwrap_err(),
            BookpubError::NotFound(_)
        ));
    }

    #[test]
    fn unknown_extension_falls_back() {
        assert_eq!(content_type_for(Path::new("blob.unknownext")), FALLBACK_CONTENT_TYPE);
        assert_eq!(content_type_for(Path::new("img/logo.png")), "image/png");
    }

    #[tokio::test]
    async fn file_response_streams_contents() {
        let dir = site();
        let file = resolve_served_file(&dir.path().join("site"), "index.html").unwrap();
        let response = file_response(&file).await.unwrap();

        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/html"
        );
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"<h1>home</h1>");
    }

    #[tokio::test]
    async fn preamble_precedes_file_bytes() {
        let dir = site();
        let file = resolve_served_file(&dir.path().join("site"), "style.css").unwrap();
        let response = file_response_after(&file, Bytes::from("Building...\n"))
            .await
            .unwrap();

        assert_eq!(response.headers().get(header::CONTENT_TYPE).unwrap(), "text/css");
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"Building...\nbody {}");
    }
}
