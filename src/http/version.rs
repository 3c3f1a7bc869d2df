//! Representation of the HTTP version on a request/response line.

use std::fmt::Display;

use super::HttpError;

/// HTTP version. Only 1.0 and 1.1 are ever produced by this server; 2 and 3 are recognized on
/// parse only so a mismatched client gets a clean `HTTP Version Not Supported` instead of a
/// parse failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    /// HTTP/1.0
    H1_0,
    /// HTTP/1.1
    H1_1,
    /// HTTP/2
    H2,
    /// HTTP/3
    H3,
}

impl Version {
    /// Whether keep-alive is the default for this version absent a `Connection` header:
    /// HTTP/1.1 defaults to persistent connections, HTTP/1.0 does not.
    pub fn keeps_alive_by_default(&self) -> bool {
        matches!(self, Self::H1_1)
    }

    pub(crate) fn parse(s: &str) -> Result<Self, HttpError> {
        match s {
            "HTTP/1.0" => Ok(Self::H1_0),
            "HTTP/1.1" => Ok(Self::H1_1),
            "HTTP/2" | "HTTP/2.0" => Ok(Self::H2),
            "HTTP/3" => Ok(Self::H3),
            _ => Err(HttpError::Version),
        }
    }
}

impl Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::H1_0 => "HTTP/1.0",
            Self::H1_1 => "HTTP/1.1",
            Self::H2 => "HTTP/2",
            Self::H3 => "HTTP/3",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn h1_1_defaults_to_keep_alive() {
        assert!(Version::H1_1.keeps_alive_by_default());
        assert!(!Version::H1_0.keeps_alive_by_default());
    }

    #[test]
    fn unknown_version_is_an_error() {
        assert_eq!(Version::parse("HTTP/0.9"), Err(HttpError::Version));
    }
}
