use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::time::timeout;
use tracing::info;

use crate::http::response::{error_page, StatusCode};

#[derive(Debug, Error)]
pub enum WriterError {
    #[error("{0} called in state {1:?}")]
    OutOfOrder(&'static str, WriterState),
    #[error("client write timed out")]
    Timeout,
    #[error("client write failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Where a response is in its lifecycle.
///
/// Body chunks may be sent any number of times once headers are out;
/// closing consumes the writer, so there is no state after `HeadersSent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterState {
    NotStarted,
    HeadersSent,
}

/// Writes one HTTP/1.0 response to a client and closes the connection.
pub struct ResponseWriter<W> {
    stream: BufWriter<W>,
    state: WriterState,
    write_timeout: Duration,
    client: String,
    request_line: String,
    status: Option<StatusCode>,
}

impl<W> ResponseWriter<W>
where
    W: AsyncWrite + Unpin,
{
    pub fn new(stream: W, client: impl Into<String>, write_timeout: Duration) -> Self {
        Self {
            stream: BufWriter::new(stream),
            state: WriterState::NotStarted,
            write_timeout,
            client: client.into(),
            request_line: String::new(),
            status: None,
        }
    }

    /// Records the request line so it shows up in the access log.
    pub fn set_request_line(&mut self, line: impl Into<String>) {
        self.request_line = line.into();
    }

    pub fn state(&self) -> WriterState {
        self.state
    }

    /// The status sent to the client, if headers have gone out.
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    /// Sends `HTTP/1.0 <code> <reason>\r\n\r\n` and logs the request.
    pub async fn send_headers(&mut self, status: StatusCode) -> Result<(), WriterError> {
        if self.state != WriterState::NotStarted {
            return Err(WriterError::OutOfOrder("send_headers", self.state));
        }
        info!(
            client = %self.client,
            request = %self.request_line,
            status = status.as_u16(),
            reason = status.reason_phrase(),
            "request"
        );

        self.state = WriterState::HeadersSent;
        self.status = Some(status);
        let line = status.status_line();
        self.write(line.as_bytes()).await
    }

    pub async fn send_body(&mut self, body: &[u8]) -> Result<(), WriterError> {
        if self.state != WriterState::HeadersSent {
            return Err(WriterError::OutOfOrder("send_body", self.state));
        }
        self.write(body).await
    }

    /// Pushes buffered bytes to the client without closing.
    pub async fn flush(&mut self) -> Result<(), WriterError> {
        timeout(self.write_timeout, self.stream.flush())
            .await
            .map_err(|_| WriterError::Timeout)??;
        Ok(())
    }

    /// Sends a complete error response. A generated page is used when no
    /// body is supplied.
    pub async fn send_error_page(
        &mut self,
        status: StatusCode,
        body: Option<&[u8]>,
    ) -> Result<(), WriterError> {
        self.send_headers(status).await?;
        match body {
            Some(body) => self.send_body(body).await,
            None => self.send_body(&error_page(status)).await,
        }
    }

    /// Flushes and shuts the connection down.
    ///
    /// Takes `self`, so a connection can only be closed once. The shutdown
    /// is attempted even when the flush fails.
    pub async fn close(mut self) -> Result<(), WriterError> {
        let flushed = self.flush().await;
        let shutdown = timeout(self.write_timeout, self.stream.shutdown())
            .await
            .map_err(|_| WriterError::Timeout)
            .and_then(|res| res.map_err(WriterError::from));
        flushed.and(shutdown)
    }

    async fn write(&mut self, bytes: &[u8]) -> Result<(), WriterError> {
        timeout(self.write_timeout, self.stream.write_all(bytes))
            .await
            .map_err(|_| WriterError::Timeout)??;
        Ok(())
    }
}
