use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

use crate::http::request::{Method, Request, SUPPORTED_VERSIONS};
use crate::http::response::StatusCode;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("malformed request line")]
    Malformed,
    #[error("line exceeds {limit} bytes")]
    LineTooLong { limit: usize, prefix: String },
    #[error("unsupported protocol version {0:?}")]
    UnsupportedVersion(String),
    #[error("unsupported method {0:?}")]
    UnsupportedMethod(String),
}

impl ParseError {
    pub fn status(&self) -> StatusCode {
        match self {
            ParseError::Malformed | ParseError::LineTooLong { .. } => StatusCode::BadRequest,
            ParseError::UnsupportedVersion(_) => StatusCode::HttpVersionNotSupported,
            ParseError::UnsupportedMethod(_) => StatusCode::NotImplemented,
        }
    }
}

/// Parses one request line of the form `METHOD TARGET VERSION`.
///
/// The line is split on single spaces. The target is every token between
/// the first and the last, joined back with single spaces, so targets
/// containing literal spaces survive. Checks run in a fixed order:
/// token count, then version, then method.
pub fn parse_request_line(line: &str) -> Result<Request, ParseError> {
    let tokens: Vec<&str> = line.split(' ').collect();

    let (method, rest) = match tokens.split_first() {
        Some((method, rest)) if rest.len() >= 2 => (*method, rest),
        _ => return Err(ParseError::Malformed),
    };
    let (version, target) = rest.split_last().ok_or(ParseError::Malformed)?;

    if !SUPPORTED_VERSIONS.contains(version) {
        return Err(ParseError::UnsupportedVersion(version.to_string()));
    }

    let method = match Method::from_token(method) {
        Method::GET => Method::GET,
        Method::Other(other) => return Err(ParseError::UnsupportedMethod(other)),
    };

    Ok(Request {
        method,
        target: target.join(" "),
        version: version.to_string(),
    })
}

/// Longest slice of an over-long line kept for the access log.
pub const MAX_LOGGED_PREFIX: usize = 64;

/// Reads a single line, without its terminator, reading at most `limit`
/// bytes.
///
/// Returns `Ok(None)` on end-of-stream before any byte arrives. An
/// over-long line is reported with its first bytes.
pub async fn read_line<R>(reader: &mut R, limit: usize) -> std::io::Result<Option<Result<String, ParseError>>>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    // One extra byte lets an over-long line be told apart from one that
    // exactly fills the limit.
    let n = (&mut *reader)
        .take(limit as u64 + 1)
        .read_until(b'\n', &mut buf)
        .await?;

    if n == 0 {
        return Ok(None);
    }
    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    } else if n > limit {
        let kept = buf.len().min(limit).min(MAX_LOGGED_PREFIX);
        return Ok(Some(Err(ParseError::LineTooLong {
            limit,
            prefix: String::from_utf8_lossy(&buf[..kept]).into_owned(),
        })));
    }

    Ok(Some(Ok(String::from_utf8_lossy(&buf).into_owned())))
}

/// Reads and discards header lines up to and including the first blank
/// line, or until end-of-stream.
pub async fn discard_headers<R>(reader: &mut R, limit: usize) -> std::io::Result<Result<(), ParseError>>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        match read_line(reader, limit).await? {
            None => return Ok(Ok(())),
            Some(Ok(line)) if line.is_empty() => return Ok(Ok(())),
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Ok(Err(e)),
        }
    }
}
