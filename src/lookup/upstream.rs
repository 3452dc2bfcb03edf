//! Shared connection to the lookup service.

use std::time::Duration;

use anyhow::Context;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufStream};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, MutexGuard};
use tokio::time::timeout;

use crate::http::response::StatusCode;
use crate::lookup::record::{parse_record, LookupRecord};

/// Byte stream the upstream can run over.
pub trait UpstreamStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T> UpstreamStream for T where T: AsyncRead + AsyncWrite + Unpin + Send {}

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("query contains a line break")]
    InvalidQuery,
    #[error("unexpected reply line {0:?}")]
    Protocol(String),
    #[error("lookup service timed out")]
    Timeout,
    #[error("lookup connection is out of sync")]
    Poisoned,
    #[error("lookup io error: {0}")]
    Io(#[from] std::io::Error),
}

impl LookupError {
    pub fn status(&self) -> StatusCode {
        match self {
            LookupError::InvalidQuery => StatusCode::BadRequest,
            _ => StatusCode::InternalServerError,
        }
    }
}

struct Channel {
    io: BufStream<Box<dyn UpstreamStream>>,
    /// Set once the reply framing can no longer be trusted.
    poisoned: bool,
}

/// The lookup service connection, shared by every handler.
pub struct Upstream {
    channel: Mutex<Channel>,
    io_timeout: Duration,
}

impl Upstream {
    pub fn new<S>(stream: S, io_timeout: Duration) -> Self
    where
        S: UpstreamStream + 'static,
    {
        let stream: Box<dyn UpstreamStream> = Box::new(stream);
        Self {
            channel: Mutex::new(Channel {
                io: BufStream::new(stream),
                poisoned: false,
            }),
            io_timeout,
        }
    }

    /// Dials the lookup service.
    pub async fn connect(addr: &str, io_timeout: Duration) -> anyhow::Result<Self> {
        let stream = timeout(io_timeout, TcpStream::connect(addr))
            .await
            .with_context(|| format!("timed out connecting to lookup service at {addr}"))?
            .with_context(|| format!("failed to connect to lookup service at {addr}"))?;
        tracing::info!(upstream = %addr, "Connected to lookup service");
        Ok(Self::new(stream, io_timeout))
    }

    /// Starts a query: waits for exclusive use of the connection, then
    /// sends `query` followed by a newline.
    ///
    /// The returned session holds the connection until it is dropped.
    pub async fn begin(&self, query: &str) -> Result<LookupSession<'_>, LookupError> {
        if query.contains(['\r', '\n']) {
            return Err(LookupError::InvalidQuery);
        }

        let channel = self.channel.lock().await;
        if channel.poisoned {
            return Err(LookupError::Poisoned);
        }

        let mut session = LookupSession {
            channel,
            io_timeout: self.io_timeout,
            done: false,
        };
        session.send(query).await?;
        Ok(session)
    }
}

/// Exclusive use of the upstream for one query and its reply.
pub struct LookupSession<'a> {
    channel: MutexGuard<'a, Channel>,
    io_timeout: Duration,
    done: bool,
}

impl LookupSession<'_> {
    async fn send(&mut self, query: &str) -> Result<(), LookupError> {
        let line = format!("{query}\n");
        let io = &mut self.channel.io;
        let sent = timeout(self.io_timeout, async {
            io.write_all(line.as_bytes()).await?;
            io.flush().await?;
            Ok::<_, std::io::Error>(())
        })
        .await;

        match sent {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(self.fail(LookupError::Io(e))),
            Err(_) => Err(self.fail(LookupError::Timeout)),
        }
    }

    /// Reads the next record of the reply.
    ///
    /// Returns `Ok(None)` once a blank line or end-of-stream ends the
    /// reply. A line that is not a record is drained past before the
    /// error is returned, so the connection stays aligned for the next
    /// query.
    pub async fn next_record(&mut self) -> Result<Option<LookupRecord>, LookupError> {
        let Some(line) = self.read_line().await? else {
            return Ok(None);
        };

        match parse_record(&line) {
            Some(record) => Ok(Some(record)),
            None => {
                tracing::error!(line = %line, "Lookup service sent an unexpected line");
                self.drain().await;
                Err(LookupError::Protocol(line))
            }
        }
    }

    /// Consumes the rest of the reply without looking at it.
    pub async fn drain(&mut self) {
        while let Ok(Some(_)) = self.read_line().await {}
    }

    async fn read_line(&mut self) -> Result<Option<String>, LookupError> {
        if self.done {
            return Ok(None);
        }

        // Stored names and messages need not be UTF-8.
        let mut buf = Vec::new();
        let read = timeout(self.io_timeout, self.channel.io.read_until(b'\n', &mut buf)).await;
        let n = match read {
            Ok(Ok(n)) => n,
            Ok(Err(e)) => return Err(self.fail(LookupError::Io(e))),
            Err(_) => return Err(self.fail(LookupError::Timeout)),
        };

        if n == 0 {
            tracing::warn!("Lookup service closed the connection");
            self.done = true;
            self.channel.poisoned = true;
            return Ok(None);
        }

        let line = String::from_utf8_lossy(&buf);
        let line = line.trim_end_matches(['\r', '\n']);
        if line.is_empty() {
            self.done = true;
            return Ok(None);
        }
        Ok(Some(line.to_string()))
    }

    fn fail(&mut self, err: LookupError) -> LookupError {
        tracing::error!(error = %err, "Lookup connection failed, marking it unusable");
        self.done = true;
        self.channel.poisoned = true;
        err
    }
}

impl Drop for LookupSession<'_> {
    fn drop(&mut self) {
        // Abandoned mid-reply: the unread lines would be handed to the
        // next query.
        if !self.done {
            self.channel.poisoned = true;
        }
    }
}
