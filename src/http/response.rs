//! Status-line + headers + body response builder.

use super::Status;

/// A response ready to be serialized onto the wire.
#[derive(Debug, Clone)]
pub struct Response {
    status: Status,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl Response {
    /// Builds an empty response with the given status.
    pub fn new(status: Status) -> Self {
        Response { status, headers: Vec::new(), body: Vec::new() }
    }

    /// Attaches a header. `Content-Length` is set automatically by [`Self::with_body`]; callers
    /// shouldn't add it themselves.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Attaches a body and sets `Content-Length` to match.
    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    /// Serializes the status line, headers, `Content-Length`, and body into `out`.
    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(b"HTTP/1.1 ");
        out.extend_from_slice(self.status.to_string().as_bytes());
        out.extend_from_slice(b"\r\n");

        for (name, value) in &self.headers {
            out.extend_from_slice(name.as_bytes());
            out.extend_from_slice(b": ");
            out.extend_from_slice(value.as_bytes());
            out.extend_from_slice(b"\r\n");
        }

        out.extend_from_slice(b"Content-Length: ");
        out.extend_from_slice(self.body.len().to_string().as_bytes());
        out.extend_from_slice(b"\r\n\r\n");
        out.extend_from_slice(&self.body);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_status_headers_and_body() {
        let resp = Response::new(Status::Ok)
            .header("Content-Type", "text/plain")
            .with_body(b"hi".to_vec());

        let mut out = Vec::new();
        resp.write_to(&mut out);

        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.contains("Content-Type: text/plain\r\n"));
        assert!(text.contains("Content-Length: 2\r\n"));
        assert!(text.ends_with("hi"));
    }

    #[test]
    fn empty_body_still_sets_content_length_zero() {
        let mut out = Vec::new();
        Response::new(Status::NoContent).write_to(&mut out);
        assert!(String::from_utf8(out).unwrap().contains("Content-Length: 0\r\n"));
    }
}
