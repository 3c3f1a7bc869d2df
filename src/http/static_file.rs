//! Resolves a request target to a file under a configured document root.
//!
//! Deliberately small: MIME sniffing and disk serving are named out of scope by spec.md as
//! external-collaborator concerns, so this is just enough to keep the dispatcher's demo content
//! honest and path-traversal-safe.

use std::path::{Component, Path, PathBuf};

/// Why a request target couldn't be resolved to a servable file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveError {
    /// The target climbed above the document root (`..`) or was otherwise not a plain path.
    Traversal,
    /// The resolved path doesn't exist or isn't a regular file.
    NotFound,
}

/// A file resolved to serve, and whether its bytes need inflating first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    /// Serve the file's bytes as-is.
    Plain(PathBuf),
    /// The file is a pre-compressed static asset (see [`resolve`]'s doc comment); its bytes are
    /// an 8-byte little-endian decompressed length followed by a raw DEFLATE stream, and must be
    /// passed through [`crate::http::content_encoding::decode_deflate`] before serving.
    Deflate(PathBuf),
}

impl Resolved {
    /// The underlying path, regardless of encoding.
    pub fn path(&self) -> &Path {
        match self {
            Resolved::Plain(p) | Resolved::Deflate(p) => p,
        }
    }
}

/// Resolves `target` (a request-line path, e.g. `/index.html`) against `document_root`,
/// rejecting anything that would escape it.
///
/// If the plain file doesn't exist but a `<target>.deflate` sibling does, that sibling is served
/// instead, decompressed on the fly: an operator can keep a large asset on disk deflate-compressed
/// and this server expands it per request rather than storing two copies.
pub fn resolve(document_root: &Path, target: &str) -> Result<Resolved, ResolveError> {
    let target = target.split('?').next().unwrap_or(target);
    let relative = target.trim_start_matches('/');
    let relative = if relative.is_empty() { "index.html" } else { relative };

    let mut resolved = document_root.to_path_buf();
    for component in Path::new(relative).components() {
        match component {
            Component::Normal(part) => resolved.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(ResolveError::Traversal)
            }
        }
    }

    if resolved.is_file() {
        return Ok(Resolved::Plain(resolved));
    }

    let mut deflated = resolved.clone().into_os_string();
    deflated.push(".deflate");
    let deflated = PathBuf::from(deflated);
    if deflated.is_file() {
        return Ok(Resolved::Deflate(deflated));
    }

    Err(ResolveError::NotFound)
}

/// A small extension-to-MIME-type table covering common static assets; anything unrecognized
/// falls back to `application/octet-stream`.
pub fn mime_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("html") | Some("htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js") => "application/javascript; charset=utf-8",
        Some("json") => "application/json",
        Some("txt") => "text/plain; charset=utf-8",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("ico") => "image/x-icon",
        _ => "application/octet-stream",
    }
}
