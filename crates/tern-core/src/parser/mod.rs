//! HTTP/1.1 request parser
//!
//! Turns one buffered request frame into a [`ParsedRequest`]. The parser
//! is a pure function over the bytes it is given: it never reads more and
//! never looks at `Content-Length`. Use [`RequestFramer`] to collect a
//! frame from partial reads first.

mod framer;

pub use framer::{FrameState, RequestFramer};

use crate::request::QueryParams;
use crate::{Error, Result};
use bytes::Bytes;
use std::collections::HashMap;

/// The only protocol version accepted on the request line
pub const HTTP_VERSION: &str = "HTTP/1.1";

const CRLF: &[u8] = b"\r\n";
const HEADER_END: &[u8] = b"\r\n\r\n";

/// Request data extracted from a frame, before routing
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRequest {
    /// Method token, passed through untouched
    pub method: String,
    /// Percent-decoded path, without the query string
    pub path: String,
    /// Query parameters
    pub query: QueryParams,
    /// Headers; a repeated name keeps its last value
    pub headers: HashMap<String, String>,
    /// Bytes after the header block with surrounding CR/LF trimmed
    pub body: Bytes,
}

/// Parse a complete request frame
pub fn parse_request(buf: &[u8]) -> Result<ParsedRequest> {
    let line_end = find(buf, CRLF)
        .ok_or_else(|| Error::MalformedRequestLine("no CRLF in request".to_string()))?;
    let head_end = find(buf, HEADER_END).ok_or(Error::MissingSeparator)?;

    let headers = parse_headers(&buf[line_end..head_end])?;
    let body = Bytes::copy_from_slice(trim_crlf(&buf[head_end..]));

    let line = std::str::from_utf8(&buf[..line_end])
        .map_err(|_| Error::MalformedRequestLine("request line is not UTF-8".to_string()))?;
    let (method, target) = parse_request_line(line)?;

    let decoded = decode_path(target)?;
    let (path, query) = split_request_uri(&decoded)?;

    Ok(ParsedRequest {
        method: method.to_string(),
        path,
        query: query.as_deref().map(QueryParams::parse).unwrap_or_default(),
        headers,
        body,
    })
}

/// Split `<method> <target> HTTP/1.1` into method and target
fn parse_request_line(line: &str) -> Result<(&str, &str)> {
    let parts: Vec<&str> = line.split(' ').collect();
    let &[method, target, version] = parts.as_slice() else {
        return Err(Error::MalformedRequestLine(format!(
            "expected 3 tokens, found {}",
            parts.len()
        )));
    };

    if version != HTTP_VERSION {
        return Err(Error::UnsupportedVersion(version.to_string()));
    }

    Ok((method, target))
}

/// Parse the header block. `region` starts at the CRLF ending the request
/// line, so the first element of the split is always empty and skipped.
fn parse_headers(region: &[u8]) -> Result<HashMap<String, String>> {
    let region = std::str::from_utf8(region)
        .map_err(|_| Error::InvalidHeaderFormat("header block is not UTF-8".to_string()))?;

    let mut headers = HashMap::new();
    for line in region.split("\r\n").skip(1) {
        let parts: Vec<&str> = line.split(": ").collect();
        let &[name, value] = parts.as_slice() else {
            return Err(Error::InvalidHeaderFormat(line.to_string()));
        };
        headers.insert(name.to_string(), value.to_string());
    }

    Ok(headers)
}

/// Percent-decode a request target. Every `%` must start a two-digit hex
/// escape and the decoded bytes must be UTF-8. `+` is left alone.
pub fn decode_path(raw: &str) -> Result<String> {
    check_escapes(raw).map_err(Error::PathDecode)?;

    urlencoding::decode(raw)
        .map(|s| s.into_owned())
        .map_err(|e| Error::PathDecode(e.to_string()))
}

/// Fail on any `%` that does not start a two-digit hex escape
fn check_escapes(s: &str) -> std::result::Result<(), String> {
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let valid = bytes
                .get(i + 1..i + 3)
                .is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit));
            if !valid {
                let end = (i + 3).min(bytes.len());
                return Err(format!(
                    "invalid escape {:?}",
                    String::from_utf8_lossy(&bytes[i..end])
                ));
            }
            i += 3;
        } else {
            i += 1;
        }
    }
    Ok(())
}

/// Split a decoded request URI into path and raw query string.
///
/// Accepts origin form (`/path?query`), absolute form
/// (`http://host/path?query`) and the asterisk form (`*`). The path is
/// sliced from `uri` as given, never re-encoded or normalized, so both
/// forms yield the same path. A `%` left over after decoding must still
/// start a valid escape.
pub fn split_request_uri(uri: &str) -> Result<(String, Option<String>)> {
    if uri.is_empty() {
        return Err(Error::UriParse("empty request URI".to_string()));
    }
    if uri.bytes().any(|b| b.is_ascii_control()) {
        return Err(Error::UriParse(format!("control character in {:?}", uri)));
    }
    check_escapes(uri).map_err(Error::UriParse)?;
    if uri == "*" {
        return Ok(("*".to_string(), None));
    }

    let target = if uri.starts_with('/') {
        uri
    } else {
        // Validation only; the url crate's own path is normalized
        let url = url::Url::parse(uri).map_err(|e| Error::UriParse(format!("{}: {:?}", e, uri)))?;
        let rest = uri
            .split_once(':')
            .filter(|(scheme, _)| scheme.eq_ignore_ascii_case(url.scheme()))
            .map(|(_, rest)| rest)
            .ok_or_else(|| Error::UriParse(format!("no scheme in {:?}", uri)))?;
        match rest.strip_prefix("//") {
            Some(authority) => authority
                .find(|c| c == '/' || c == '?')
                .map_or("", |i| &authority[i..]),
            None => rest,
        }
    };

    Ok(match target.split_once('?') {
        Some((path, query)) => (path.to_string(), Some(query.to_string())),
        None => (target.to_string(), None),
    })
}

/// Strip leading and trailing CR/LF bytes
fn trim_crlf(bytes: &[u8]) -> &[u8] {
    let is_crlf = |b: &u8| *b == b'\r' || *b == b'\n';
    let start = bytes.iter().position(|b| !is_crlf(b)).unwrap_or(bytes.len());
    let end = bytes.iter().rposition(|b| !is_crlf(b)).map_or(start, |i| i + 1);
    &bytes[start..end]
}

/// Position of the first occurrence of `needle` in `haystack`
#[inline]
pub(crate) fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_get() {
        let req = parse_request(b"GET /users HTTP/1.1\r\nHost: localhost\r\n\r\n").unwrap();

        assert_eq!(req.method, "GET");
        assert_eq!(req.path, "/users");
        assert!(req.query.is_empty());
        assert_eq!(req.headers.get("Host"), Some(&"localhost".to_string()));
        assert!(req.body.is_empty());
    }

    #[test]
    fn test_parse_with_query() {
        let req =
            parse_request(b"GET /users?page=1&tag=a&tag=b+c HTTP/1.1\r\nHost: x\r\n\r\n").unwrap();

        assert_eq!(req.path, "/users");
        assert_eq!(req.query.get("page"), Some("1"));
        assert_eq!(req.query.get_all("tag"), &["a".to_string(), "b c".to_string()]);
    }

    #[test]
    fn test_parse_no_headers() {
        let req = parse_request(b"GET / HTTP/1.1\r\n\r\n").unwrap();
        assert_eq!(req.path, "/");
        assert!(req.headers.is_empty());
    }

    #[test]
    fn test_method_is_opaque() {
        let req = parse_request(b"BREW /pot HTTP/1.1\r\n\r\n").unwrap();
        assert_eq!(req.method, "BREW");
    }

    #[test]
    fn test_body_trimmed() {
        let req =
            parse_request(b"POST /echo HTTP/1.1\r\nContent-Length: 99\r\n\r\n\r\nhello\r\nworld\r\n\n")
                .unwrap();
        assert_eq!(&req.body[..], b"hello\r\nworld");
    }

    #[test]
    fn test_duplicate_header_last_wins() {
        let req = parse_request(b"GET / HTTP/1.1\r\nX-A: 1\r\nX-A: 2\r\n\r\n").unwrap();
        assert_eq!(req.headers.get("X-A"), Some(&"2".to_string()));
        assert_eq!(req.headers.len(), 1);
    }

    #[test]
    fn test_missing_crlf() {
        let err = parse_request(b"GET / HTTP/1.1").unwrap_err();
        assert!(matches!(err, Error::MalformedRequestLine(_)));
    }

    #[test]
    fn test_missing_separator() {
        let err = parse_request(b"GET / HTTP/1.1\r\nHost: x\r\n").unwrap_err();
        assert!(matches!(err, Error::MissingSeparator));
    }

    #[test]
    fn test_wrong_token_count() {
        for raw in [
            &b"GET /\r\n\r\n"[..],
            b"GET / HTTP/1.1 extra\r\n\r\n",
            b"GET  / HTTP/1.1\r\n\r\n",
        ] {
            let err = parse_request(raw).unwrap_err();
            assert!(matches!(err, Error::MalformedRequestLine(_)), "{:?}", err);
        }
    }

    #[test]
    fn test_unsupported_version() {
        let err = parse_request(b"GET / HTTP/1.0\r\n\r\n").unwrap_err();
        assert!(matches!(err, Error::UnsupportedVersion(v) if v == "HTTP/1.0"));
    }

    #[test]
    fn test_invalid_header_format() {
        let err = parse_request(b"GET / HTTP/1.1\r\nHost:x\r\n\r\n").unwrap_err();
        assert!(matches!(err, Error::InvalidHeaderFormat(_)));

        let err = parse_request(b"GET / HTTP/1.1\r\nX-Time: 12: 30\r\n\r\n").unwrap_err();
        assert!(matches!(err, Error::InvalidHeaderFormat(_)));
    }

    #[test]
    fn test_header_checked_before_request_line() {
        let err = parse_request(b"GET / HTTP/1.0\r\nbroken\r\n\r\n").unwrap_err();
        assert!(matches!(err, Error::InvalidHeaderFormat(_)));
    }

    #[test]
    fn test_path_is_decoded() {
        let req = parse_request(b"GET /files/hello%20world HTTP/1.1\r\n\r\n").unwrap();
        assert_eq!(req.path, "/files/hello world");

        let req = parse_request(b"GET /a%2Fb HTTP/1.1\r\n\r\n").unwrap();
        assert_eq!(req.path, "/a/b");

        // An encoded '?' is decoded before the query split
        let req = parse_request(b"GET /search%3Fq%3Drust HTTP/1.1\r\n\r\n").unwrap();
        assert_eq!(req.path, "/search");
        assert_eq!(req.query.get("q"), Some("rust"));
    }

    #[test]
    fn test_path_decode_error() {
        for raw in [
            &b"GET /bad%zz HTTP/1.1\r\n\r\n"[..],
            b"GET /bad% HTTP/1.1\r\n\r\n",
            b"GET /bad%ff HTTP/1.1\r\n\r\n",
        ] {
            let err = parse_request(raw).unwrap_err();
            assert!(matches!(err, Error::PathDecode(_)), "{:?}", err);
        }
    }

    #[test]
    fn test_uri_parse_error() {
        let err = parse_request(b"GET relative/path HTTP/1.1\r\n\r\n").unwrap_err();
        assert!(matches!(err, Error::UriParse(_)));

        let err = parse_request(b"GET /a%0Ab HTTP/1.1\r\n\r\n").unwrap_err();
        assert!(matches!(err, Error::UriParse(_)));
    }

    #[test]
    fn test_absolute_form() {
        let req = parse_request(b"GET http://example.com/users/7?x=1 HTTP/1.1\r\n\r\n").unwrap();
        assert_eq!(req.path, "/users/7");
        assert_eq!(req.query.get("x"), Some("1"));
    }

    #[test]
    fn test_absolute_form_path_matches_origin_form() {
        for (origin, absolute) in [
            (&b"GET /hello%20world HTTP/1.1\r\n\r\n"[..], &b"GET http://h/hello%20world HTTP/1.1\r\n\r\n"[..]),
            (&b"GET /a/../b?k=v HTTP/1.1\r\n\r\n"[..], &b"GET http://h:8080/a/../b?k=v HTTP/1.1\r\n\r\n"[..]),
        ] {
            let origin = parse_request(origin).unwrap();
            let absolute = parse_request(absolute).unwrap();
            assert_eq!(origin.path, absolute.path);
            assert_eq!(origin.query, absolute.query);
        }

        let req = parse_request(b"GET http://h/hello%20world HTTP/1.1\r\n\r\n").unwrap();
        assert_eq!(req.path, "/hello world");
        let req = parse_request(b"GET http://h/a/../b HTTP/1.1\r\n\r\n").unwrap();
        assert_eq!(req.path, "/a/../b");
    }

    #[test]
    fn test_absolute_form_without_path() {
        let req = parse_request(b"GET http://h?x=1 HTTP/1.1\r\n\r\n").unwrap();
        assert_eq!(req.path, "");
        assert_eq!(req.query.get("x"), Some("1"));
    }

    #[test]
    fn test_stray_percent_after_decoding() {
        let err = parse_request(b"GET /100%25 HTTP/1.1\r\n\r\n").unwrap_err();
        assert!(matches!(err, Error::UriParse(_)), "{:?}", err);

        // Decodes to a valid escape, which is kept as-is
        let req = parse_request(b"GET /100%2541 HTTP/1.1\r\n\r\n").unwrap();
        assert_eq!(req.path, "/100%41");
    }

    #[test]
    fn test_asterisk_form() {
        let req = parse_request(b"OPTIONS * HTTP/1.1\r\n\r\n").unwrap();
        assert_eq!(req.path, "*");
    }

    #[test]
    fn test_trim_crlf() {
        assert_eq!(trim_crlf(b"\r\n\r\n"), b"");
        assert_eq!(trim_crlf(b""), b"");
        assert_eq!(trim_crlf(b"\nabc\r"), b"abc");
        assert_eq!(trim_crlf(b" a "), b" a ");
    }
}
