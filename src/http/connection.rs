use std::sync::Arc;

use anyhow::Context;
use bytes::BytesMut;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, BufReader, ReadHalf};
use tokio::time::timeout;

use crate::http::parser::{discard_headers, parse_request_line, read_line, ParseError};
use crate::http::request::Request;
use crate::http::response::StatusCode;
use crate::http::static_files::{render_listing, resolve, Resolution};
use crate::http::writer::{ResponseWriter, WriterError};
use crate::lookup::page::serve_lookup;
use crate::server::ServerState;

const CHUNK_SIZE: usize = 4096;

pub struct Connection<S> {
    stream: S,
    client: String,
    state: Arc<ServerState>,
}

pub enum HandlerState {
    ReadingRequestLine,
    ReadingHeaders(Result<Request, ParseError>),
    Classified(Result<Request, ParseError>),
    Responding(Reply),
    Closed,
}

/// What the client is going to get back.
pub enum Reply {
    Lookup(Request),
    Static(Request),
    Error(StatusCode),
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(stream: S, client: impl Into<String>, state: Arc<ServerState>) -> Self {
        Self {
            stream,
            client: client.into(),
            state,
        }
    }

    /// Handles one request and closes the connection.
    ///
    /// The connection is closed on every path, including when answering
    /// fails part way through.
    pub async fn run(self) -> anyhow::Result<()> {
        let client_timeout = self.state.config.client_timeout();
        let (read_half, write_half) = tokio::io::split(self.stream);
        let mut reader = BufReader::new(read_half);
        let mut writer = ResponseWriter::new(write_half, self.client, client_timeout);

        let handled = drive(&self.state, &mut reader, &mut writer).await;
        let closed = writer.close().await;

        handled.context("failed to answer request")?;
        closed.context("failed to close connection")?;
        Ok(())
    }
}

async fn drive<S, W>(
    state: &ServerState,
    reader: &mut BufReader<ReadHalf<S>>,
    writer: &mut ResponseWriter<W>,
) -> Result<(), WriterError>
where
    S: AsyncRead + AsyncWrite + Unpin,
    W: AsyncWrite + Unpin,
{
    let client_timeout = state.config.client_timeout();
    let max_line = state.config.limits.max_request_line;
    let mut current = HandlerState::ReadingRequestLine;

    loop {
        current = match current {
            HandlerState::ReadingRequestLine => {
                let line = match timeout(client_timeout, read_line(reader, max_line)).await {
                    Ok(Ok(Some(line))) => line,
                    // Nothing arrived: same as an empty request line.
                    Ok(Ok(None)) => Ok(String::new()),
                    Ok(Err(e)) => {
                        tracing::debug!(error = %e, "Failed to read request line");
                        writer.set_request_line("<read failed>");
                        Err(ParseError::Malformed)
                    }
                    Err(_) => {
                        tracing::debug!("Timed out reading request line");
                        writer.set_request_line("<timed out>");
                        Err(ParseError::Malformed)
                    }
                };

                let parsed = match line {
                    Ok(line) => {
                        writer.set_request_line(line.as_str());
                        parse_request_line(&line)
                    }
                    Err(ParseError::LineTooLong { limit, prefix }) => {
                        writer.set_request_line(format!("{prefix}..."));
                        Err(ParseError::LineTooLong { limit, prefix })
                    }
                    Err(e) => Err(e),
                };
                HandlerState::ReadingHeaders(parsed)
            }

            HandlerState::ReadingHeaders(parsed) => {
                let parsed = match parsed {
                    Err(e @ ParseError::LineTooLong { .. }) => Err(e),
                    parsed => match timeout(client_timeout, discard_headers(reader, max_line)).await {
                        Ok(Ok(Ok(()))) => parsed,
                        Ok(Ok(Err(e))) => parsed.and(Err(e)),
                        Ok(Err(_)) | Err(_) => parsed.and(Err(ParseError::Malformed)),
                    },
                };
                HandlerState::Classified(parsed)
            }

            HandlerState::Classified(Ok(request)) if request.is_lookup() => {
                HandlerState::Responding(Reply::Lookup(request))
            }
            HandlerState::Classified(Ok(request)) => HandlerState::Responding(Reply::Static(request)),
            HandlerState::Classified(Err(e)) => {
                tracing::debug!(error = %e, "Rejecting request");
                HandlerState::Responding(Reply::Error(e.status()))
            }

            HandlerState::Responding(reply) => {
                respond(state, writer, reply).await?;
                HandlerState::Closed
            }

            HandlerState::Closed => break,
        };
    }

    Ok(())
}

async fn respond<W>(state: &ServerState, writer: &mut ResponseWriter<W>, reply: Reply) -> Result<(), WriterError>
where
    W: AsyncWrite + Unpin,
{
    match reply {
        Reply::Error(status) => writer.send_error_page(status, None).await,
        Reply::Lookup(request) => serve_lookup(writer, &state.upstream, request.lookup_query()).await,
        Reply::Static(request) => serve_static(state, writer, &request).await,
    }
}

async fn serve_static<W>(state: &ServerState, writer: &mut ResponseWriter<W>, request: &Request) -> Result<(), WriterError>
where
    W: AsyncWrite + Unpin,
{
    let path = request.path();
    match resolve(&state.config.web_root, path).await {
        Ok(Resolution::Directory(names)) => {
            writer.send_headers(StatusCode::Ok).await?;
            writer.send_body(render_listing(path, &names).as_bytes()).await
        }
        Ok(Resolution::File { path, file }) => {
            tracing::debug!(file = %path.display(), "Serving file");
            writer.send_headers(StatusCode::Ok).await?;
            stream_file(writer, file).await
        }
        Err(e) => {
            tracing::debug!(error = %e, path = %path, "Resolution failed");
            writer.send_error_page(e.status(), None).await
        }
    }
}

/// Copies a file to the client in fixed-size chunks. A read failure ends
/// the body early; the status line is already out by then.
async fn stream_file<W>(writer: &mut ResponseWriter<W>, mut file: File) -> Result<(), WriterError>
where
    W: AsyncWrite + Unpin,
{
    let mut buf = BytesMut::with_capacity(CHUNK_SIZE);
    loop {
        buf.clear();
        match file.read_buf(&mut buf).await {
            Ok(0) => return Ok(()),
            Ok(_) => writer.send_body(&buf).await?,
            Err(e) => {
                tracing::warn!(error = %e, "File read failed mid-stream");
                return Ok(());
            }
        }
    }
}
