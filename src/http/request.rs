//! A request-line + header parser over an owned, growable buffer.
//!
//! The teacher's own `H1Request` borrows `&str` slices straight out of the socket's read buffer,
//! and flags in a comment that this doesn't survive a request arriving across multiple TCP
//! reads — the lifetimes would have to thread through every partial buffer in turn. This version
//! resolves that the direction the teacher's comment points to: wait until a complete head has
//! accumulated in the connection's owned [`crate::buffer::Buffer`], then parse out of that single
//! contiguous slice into owned `String`s. One parse, no partial state to resume.

use std::collections::HashMap;

use super::{HttpError, Method, Version};

/// A parsed request line and header block. The body, if any, is handled separately by the
/// caller once `Content-Length` is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Request method.
    pub method: Method,
    /// Request target, verbatim (no percent-decoding — that's `static_file`'s job).
    pub target: String,
    /// Request version.
    pub version: Version,
    /// Header names are stored lowercased; lookups should go through [`Self::header`].
    headers: HashMap<String, String>,
}

impl Request {
    /// Looks up a header by name, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// Whether the connection should be kept alive after this request, per the `Connection`
    /// header if present, else the version's default (RFC 9110 §9.3 / RFC 7230 §6.1).
    pub fn keep_alive(&self) -> bool {
        match self.header("connection") {
            Some(v) if v.eq_ignore_ascii_case("close") => false,
            Some(v) if v.eq_ignore_ascii_case("keep-alive") => true,
            _ => self.version.keeps_alive_by_default(),
        }
    }

    /// The declared request body length, if a well-formed `Content-Length` header is present.
    pub fn content_length(&self) -> Option<usize> {
        self.header("content-length")?.trim().parse().ok()
    }

    /// Attempts to parse a complete request head (request-line and headers, up to and including
    /// the terminating blank line) out of `buf`.
    ///
    /// Returns `Ok(None)` if `buf` doesn't yet contain a full head (more reads are needed),
    /// `Ok(Some((request, head_len)))` with `head_len` the number of bytes the head occupied (so
    /// the caller can advance its read buffer past it), or `Err` if what has arrived so far is
    /// already malformed.
    pub fn parse(buf: &[u8]) -> Result<Option<(Request, usize)>, HttpError> {
        let Some(head_end) = find_subslice(buf, b"\r\n\r\n") else {
            return Ok(None);
        };
        let head = &buf[..head_end];
        let head_len = head_end + 4;

        let text = std::str::from_utf8(head).map_err(|_| HttpError::Encoding)?;
        let mut lines = text.split("\r\n");

        let request_line = lines.next().ok_or(HttpError::RequestLine)?;
        let mut parts = request_line.split(' ');
        let method = parts.next().ok_or(HttpError::RequestLine)?.parse()?;
        let target = parts.next().ok_or(HttpError::RequestLine)?.to_string();
        let version = Version::parse(parts.next().ok_or(HttpError::RequestLine)?)?;
        if parts.next().is_some() || target.is_empty() {
            return Err(HttpError::RequestLine);
        }

        let mut headers = HashMap::new();
        for line in lines {
            if line.is_empty() {
                continue;
            }
            let (name, value) = line.split_once(':').ok_or(HttpError::Header)?;
            headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
        }

        Ok(Some((
            Request { method, target, version, headers },
            head_len,
        )))
    }
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incomplete_head_asks_for_more_data() {
        assert_eq!(Request::parse(b"GET / HTTP/1.1\r\nHost: x").unwrap(), None);
    }

    #[test]
    fn parses_method_target_version_and_headers() {
        let buf = b"GET /index.html HTTP/1.1\r\nHost: example.com\r\nConnection: close\r\n\r\n";
        let (req, len) = Request::parse(buf).unwrap().unwrap();
        assert_eq!(len, buf.len());
        assert_eq!(req.method, Method::Get);
        assert_eq!(req.target, "/index.html");
        assert_eq!(req.version, Version::H1_1);
        assert_eq!(req.header("host"), Some("example.com"));
        assert_eq!(req.header("HOST"), Some("example.com"));
        assert!(!req.keep_alive());
    }

    #[test]
    fn http_1_1_defaults_to_keep_alive_without_a_connection_header() {
        let buf = b"GET / HTTP/1.1\r\n\r\n";
        let (req, _) = Request::parse(buf).unwrap().unwrap();
        assert!(req.keep_alive());
    }

    #[test]
    fn http_1_0_defaults_to_close_without_a_connection_header() {
        let buf = b"GET / HTTP/1.0\r\n\r\n";
        let (req, _) = Request::parse(buf).unwrap().unwrap();
        assert!(!req.keep_alive());
    }

    #[test]
    fn trailing_bytes_after_the_head_are_not_consumed() {
        let buf = b"GET / HTTP/1.1\r\n\r\nextra body bytes";
        let (_, len) = Request::parse(buf).unwrap().unwrap();
        assert_eq!(&buf[len..], b"extra body bytes");
    }

    #[test]
    fn malformed_request_line_is_rejected() {
        let buf = b"GET /\r\n\r\n";
        assert!(matches!(Request::parse(buf), Err(HttpError::RequestLine)));
    }

    #[test]
    fn content_length_is_parsed_when_present() {
        let buf = b"POST / HTTP/1.1\r\nContent-Length: 42\r\n\r\n";
        let (req, _) = Request::parse(buf).unwrap().unwrap();
        assert_eq!(req.content_length(), Some(42));
    }
}
