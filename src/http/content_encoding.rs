//! Ties the DEFLATE decoder to HTTP body decompression.
//!
//! The only place `inflate` and the HTTP layer meet: a stored response payload kept
//! deflate-compressed on disk (a `.deflate` sidecar, see `static_file::resolve`) is expanded
//! before it's written to the wire.

use crate::inflate::inflate;

/// Decompresses a complete `deflate`-encoded payload into a buffer of `expected_len` bytes.
///
/// `expected_len` is the decompressed size recorded alongside the stored payload. Returns the
/// slice actually written, which may be shorter than `expected_len` if `payload` was truncated or
/// malformed — `inflate` never panics on bad input, it just stops.
pub fn decode_deflate(payload: &[u8], expected_len: usize) -> Vec<u8> {
    let mut out = vec![0u8; expected_len];
    let written = inflate(&mut out, payload);
    out.truncate(written);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_truncates_to_actual_output() {
        // An empty/garbage payload decodes to zero bytes rather than leaving the estimate's
        // zero-fill in place.
        let out = decode_deflate(&[0xff, 0xff, 0xff], 64);
        assert!(out.len() <= 64);
    }
}
