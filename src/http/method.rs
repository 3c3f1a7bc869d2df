//! Representation of the requested HTTP method.

use std::fmt::Display;
use std::str::FromStr;

use super::HttpError;

/// Request method, [RFC 9110 §9](https://www.rfc-editor.org/rfc/rfc9110#section-9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// 9.3.1
    Get,
    /// 9.3.2
    Head,
    /// 9.3.3
    Post,
    /// 9.3.4
    Put,
    /// 9.3.5
    Delete,
    /// 9.3.6
    Connect,
    /// 9.3.7
    Options,
    /// 9.3.8
    Trace,
}

impl Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Connect => "CONNECT",
            Self::Options => "OPTIONS",
            Self::Trace => "TRACE",
        })
    }
}

impl FromStr for Method {
    type Err = HttpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GET" => Ok(Self::Get),
            "HEAD" => Ok(Self::Head),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "DELETE" => Ok(Self::Delete),
            "CONNECT" => Ok(Self::Connect),
            "OPTIONS" => Ok(Self::Options),
            "TRACE" => Ok(Self::Trace),
            _ => Err(HttpError::Method),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_display_and_parse() {
        for m in [
            Method::Get,
            Method::Head,
            Method::Post,
            Method::Put,
            Method::Delete,
            Method::Connect,
            Method::Options,
            Method::Trace,
        ] {
            assert_eq!(m.to_string().parse::<Method>().unwrap(), m);
        }
    }

    #[test]
    fn unknown_method_is_an_error() {
        assert_eq!("PATCH".parse::<Method>(), Err(HttpError::Method));
    }
}
