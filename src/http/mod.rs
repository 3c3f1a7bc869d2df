//! The HTTP task: request parsing, response building, and the small amount of request-handling
//! logic needed to serve static files. Named out of scope by spec.md as an "external
//! collaborator" — the concurrent connection core treats this module as a black box it calls
//! into once a request head has fully arrived.

pub mod content_encoding;
pub mod method;
pub mod request;
pub mod response;
pub mod static_file;
pub mod status;
pub mod version;

pub use method::Method;
pub use request::Request;
pub use response::Response;
pub use status::Status;
pub use version::Version;

use std::path::Path;

use thiserror::Error;

/// Failure parsing a request head.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum HttpError {
    /// The method token wasn't one this server recognizes.
    #[error("unrecognized request method")]
    Method,
    /// The request line didn't have exactly three space-separated fields.
    #[error("malformed request line")]
    RequestLine,
    /// The version token wasn't `HTTP/1.0`, `HTTP/1.1`, `HTTP/2`, or `HTTP/3`.
    #[error("unrecognized HTTP version")]
    Version,
    /// A header line had no `:` separator.
    #[error("malformed header line")]
    Header,
    /// The head wasn't valid UTF-8.
    #[error("request head was not valid UTF-8")]
    Encoding,
}

/// Serves `request` out of `document_root`, the full round trip from request target to response
/// bytes: resolves a static file, decompresses the body if `Content-Encoding: deflate` was
/// declared, and maps filesystem/protocol failures to the right status code.
pub fn handle(request: &Request, document_root: &Path) -> Response {
    use static_file::{ResolveError, Resolved};

    if matches!(request.version, Version::H2 | Version::H3) {
        return Response::new(Status::HttpVersionNotSupported);
    }

    if !matches!(request.method, Method::Get | Method::Head) {
        return Response::new(Status::MethodNotAllowed);
    }

    match static_file::resolve(document_root, &request.target) {
        Ok(Resolved::Plain(path)) => match std::fs::read(&path) {
            Ok(body) => {
                let body = if request.method == Method::Head { Vec::new() } else { body };
                Response::new(Status::Ok)
                    .header("Content-Type", static_file::mime_type(&path))
                    .with_body(body)
            }
            Err(_) => Response::new(Status::InternalServerError),
        },
        Ok(Resolved::Deflate(path)) => match std::fs::read(&path) {
            Ok(raw) if raw.len() >= 8 => {
                let (len_bytes, stream) = raw.split_at(8);
                let expected_len = u64::from_le_bytes(len_bytes.try_into().unwrap()) as usize;
                let logical = path.with_extension("");
                let body = if request.method == Method::Head {
                    Vec::new()
                } else {
                    content_encoding::decode_deflate(stream, expected_len)
                };
                Response::new(Status::Ok)
                    .header("Content-Type", static_file::mime_type(&logical))
                    .with_body(body)
            }
            Ok(_) | Err(_) => Response::new(Status::InternalServerError),
        },
        Err(ResolveError::Traversal) => Response::new(Status::Forbidden),
        Err(ResolveError::NotFound) => Response::new(Status::NotFound),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn serves_an_existing_file() {
        let dir = std::env::temp_dir().join("maestro_http_handle_test");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("hello.txt"), b"hello").unwrap();

        let (request, _) = Request::parse(b"GET /hello.txt HTTP/1.1\r\n\r\n").unwrap().unwrap();
        let mut out = Vec::new();
        handle(&request, &dir).write_to(&mut out);

        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.ends_with("hello"));

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_file_is_404() {
        let dir = std::env::temp_dir();
        let (request, _) = Request::parse(b"GET /does-not-exist HTTP/1.1\r\n\r\n").unwrap().unwrap();
        let mut out = Vec::new();
        handle(&request, &dir).write_to(&mut out);
        assert!(String::from_utf8(out).unwrap().starts_with("HTTP/1.1 404 Not Found\r\n"));
    }

    #[test]
    fn mismatched_http_version_is_505() {
        let dir = std::env::temp_dir();
        let (request, _) = Request::parse(b"GET /x HTTP/2\r\n\r\n").unwrap().unwrap();
        let mut out = Vec::new();
        handle(&request, &dir).write_to(&mut out);
        assert!(String::from_utf8(out).unwrap().starts_with("HTTP/1.1 505"));
    }

    #[test]
    fn post_is_method_not_allowed() {
        let dir = std::env::temp_dir();
        let (request, _) = Request::parse(b"POST /x HTTP/1.1\r\n\r\n").unwrap().unwrap();
        let mut out = Vec::new();
        handle(&request, &dir).write_to(&mut out);
        assert!(String::from_utf8(out).unwrap().starts_with("HTTP/1.1 405"));
    }

    /// A single stored (uncompressed) DEFLATE block wrapping `data` verbatim, matching the
    /// on-disk `.deflate` sidecar format `resolve` expects (an 8-byte length prefix handled at
    /// the call site, not here).
    fn stored_deflate_block(data: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(data.len() + 5);
        out.push(0b0000_0001);
        let len = data.len() as u16;
        out.extend_from_slice(&len.to_le_bytes());
        out.extend_from_slice(&(!len).to_le_bytes());
        out.extend_from_slice(data);
        out
    }

    #[test]
    fn serves_a_precompressed_sidecar_transparently() {
        let dir = std::env::temp_dir().join("maestro_http_handle_deflate_test");
        fs::create_dir_all(&dir).unwrap();

        let original = b"decompressed static content";
        let mut sidecar = (original.len() as u64).to_le_bytes().to_vec();
        sidecar.extend_from_slice(&stored_deflate_block(original));
        fs::write(dir.join("big.txt.deflate"), &sidecar).unwrap();

        let (request, _) = Request::parse(b"GET /big.txt HTTP/1.1\r\n\r\n").unwrap().unwrap();
        let mut out = Vec::new();
        handle(&request, &dir).write_to(&mut out);

        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.ends_with("decompressed static content"));

        fs::remove_dir_all(&dir).ok();
    }
}
