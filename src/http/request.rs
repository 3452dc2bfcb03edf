/// Path prefix routed to the lookup bridge instead of the filesystem.
pub const LOOKUP_PREFIX: &str = "/mdb-lookup";

/// HTTP request methods.
///
/// Only GET is served. Anything else is kept verbatim so it can be
/// logged before the request is answered with 501 Not Implemented.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Method {
    /// GET - Retrieve a resource
    GET,
    /// Any other token found in the method position
    Other(String),
}

impl Method {
    /// Parses an HTTP method token.
    ///
    /// Matching is case-sensitive, so `get` is not GET.
    ///
    /// # Example
    ///
    /// ```
    /// # use lantern::http::request::Method;
    /// assert_eq!(Method::from_token("GET"), Method::GET);
    /// assert_eq!(Method::from_token("get"), Method::Other("get".to_string()));
    /// ```
    pub fn from_token(s: &str) -> Self {
        match s {
            "GET" => Method::GET,
            other => Method::Other(other.to_string()),
        }
    }
}

/// Protocol versions accepted on the request line.
pub const SUPPORTED_VERSIONS: [&str; 2] = ["HTTP/1.0", "HTTP/1.1"];

/// A parsed HTTP request line.
///
/// Lives for a single connection; headers are read and dropped by the
/// parser, so only the request line survives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// The HTTP method
    pub method: Method,
    /// Raw request target, including any `?query` suffix
    pub target: String,
    /// HTTP version token (`HTTP/1.0` or `HTTP/1.1`)
    pub version: String,
}

impl Request {
    /// Returns the target with any query suffix removed.
    pub fn path(&self) -> &str {
        match self.target.split_once('?') {
            Some((path, _)) => path,
            None => &self.target,
        }
    }

    /// Whether this request is for the lookup bridge.
    pub fn is_lookup(&self) -> bool {
        self.target.starts_with(LOOKUP_PREFIX)
    }

    /// Extracts the lookup query: everything after the first `=` in the
    /// raw target, forwarded without decoding.
    ///
    /// Returns `None` when no query has been submitted yet.
    pub fn lookup_query(&self) -> Option<&str> {
        self.target.split_once('=').map(|(_, query)| query)
    }
}
