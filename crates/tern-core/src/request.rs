//! HTTP Request types

use crate::conn::Conn;
use crate::parser::ParsedRequest;
use smallvec::SmallVec;
use std::collections::HashMap;

/// Multi-valued query parameters
///
/// Values for one key keep the order they appeared in; keys are unordered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    values: HashMap<String, SmallVec<[String; 1]>>,
}

impl QueryParams {
    /// Parse a raw query string (`a=1&b=2&a=3`) using form-urlencoded rules
    pub fn parse(query: &str) -> Self {
        let mut params = Self::default();
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            params.append(key.into_owned(), value.into_owned());
        }
        params
    }

    /// Add a value under `key`
    pub fn append(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.entry(key.into()).or_default().push(value.into());
    }

    /// First value for `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .and_then(|v| v.first())
            .map(String::as_str)
    }

    /// All values for `key`, in declaration order
    pub fn get_all(&self, key: &str) -> &[String] {
        self.values.get(key).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Number of distinct keys
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over keys and their values
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

/// HTTP Request handed to a route handler
#[derive(Debug, Clone)]
pub struct Request {
    /// Method token as sent by the client
    pub method: String,
    /// Decoded request path (without query string)
    pub path: String,
    /// Query parameters
    pub query: QueryParams,
    /// Request headers (exact names, last duplicate wins)
    pub headers: HashMap<String, String>,
    /// Route parameters (populated by the router on a match)
    pub params: HashMap<String, String>,
    /// Request body
    pub body: bytes::Bytes,
    /// Connection the request arrived on
    pub conn: Conn,
}

impl Request {
    /// Build a request from parser output
    pub fn from_parsed(parsed: ParsedRequest, conn: Conn) -> Self {
        Self {
            method: parsed.method,
            path: parsed.path,
            query: parsed.query,
            headers: parsed.headers,
            params: HashMap::new(),
            body: parsed.body,
            conn,
        }
    }

    /// Get a header value (case-insensitive)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(name)
            .or_else(|| {
                self.headers
                    .iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case(name))
                    .map(|(_, v)| v)
            })
            .map(String::as_str)
    }

    /// Get a route parameter
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(|s| s.as_str())
    }

    /// Get the first value of a query parameter
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.get(name)
    }
}
