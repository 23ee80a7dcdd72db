use std::fmt;
use std::io::ErrorKind;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::ConnectionLimits;
use crate::http::mime;
use crate::http::parser::{ParseError, decode_line, parse_request, trim_line_ending};
use crate::http::request::Request;
use crate::http::resolve::{Resolved, ServedRoot, directory_index};
use crate::http::response::Response;
use crate::http::writer::ResponseWriter;

/// The request line and headers did not arrive in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderTimeout(pub Duration);

impl fmt::Display for HeaderTimeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "no complete request within {:?}", self.0)
    }
}

impl std::error::Error for HeaderTimeout {}

/// Tells failures caused by the peer apart from failures of the handler.
///
/// Header timeouts and the peer resetting, aborting or hanging up
/// mid-transfer count as the peer's doing.
pub fn is_peer_error(err: &anyhow::Error) -> bool {
    if err.downcast_ref::<HeaderTimeout>().is_some() {
        return true;
    }
    err.chain()
        .filter_map(|cause| cause.downcast_ref::<std::io::Error>())
        .any(|io| {
            matches!(
                io.kind(),
                ErrorKind::ConnectionReset
                    | ErrorKind::ConnectionAborted
                    | ErrorKind::BrokenPipe
                    | ErrorKind::UnexpectedEof
                    | ErrorKind::WriteZero
            )
        })
}

/// One accepted client connection, served exactly once.
pub struct Connection<S> {
    stream: BufReader<S>,
    root: Arc<ServedRoot>,
    limits: ConnectionLimits,
    state: ConnectionState,
}

pub enum ConnectionState {
    Reading,
    Processing(Request),
    Writing(ResponseWriter),
    Closed,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, root: Arc<ServedRoot>, limits: ConnectionLimits) -> Self {
        Self {
            stream: BufReader::new(stream),
            root,
            limits,
            state: ConnectionState::Reading,
        }
    }

    /// Reads one request, answers it and shuts down the write side.
    ///
    /// The shutdown happens on every path; its own failure is only logged.
    /// The underlying stream is released when the connection is dropped.
    pub async fn run(&mut self) -> anyhow::Result<()> {
        let result = self.drive().await;

        if let Err(e) = self.stream.shutdown().await {
            debug!("Shutdown failed: {}", e);
        }

        result
    }

    async fn drive(&mut self) -> anyhow::Result<()> {
        loop {
            match std::mem::replace(&mut self.state, ConnectionState::Closed) {
                ConnectionState::Reading => {
                    let limit = self.limits.header_timeout;
                    let read = timeout(limit, self.read_request())
                        .await
                        .map_err(|_| HeaderTimeout(limit))?;

                    self.state = match read {
                        Ok(Some(req)) => ConnectionState::Processing(req),
                        Ok(None) => {
                            debug!("Peer closed before sending a request");
                            ConnectionState::Closed
                        }
                        Err(e) => match e.downcast_ref::<ParseError>() {
                            Some(parse_error) => {
                                warn!("Malformed request: {}", parse_error);
                                ConnectionState::Writing(ResponseWriter::new(
                                    Response::bad_request(),
                                ))
                            }
                            None => return Err(e),
                        },
                    };
                }

                ConnectionState::Processing(req) => {
                    let response = Self::handle_request(&self.root, &req).await;
                    info!(
                        status = response.status.as_u16(),
                        content_type = response.content_type,
                        "{} {}",
                        req.method,
                        req.target
                    );
                    self.state = ConnectionState::Writing(ResponseWriter::new(response));
                }

                ConnectionState::Writing(writer) => {
                    let sent = writer.write_to_stream(&mut self.stream).await?;
                    debug!(bytes = sent, "Response body sent");
                    self.state = ConnectionState::Closed;
                }

                ConnectionState::Closed => {
                    break;
                }
            }
        }

        Ok(())
    }

    /// Reads the request line and header block.
    ///
    /// Returns `Ok(None)` if the peer closed without sending anything. End of
    /// input inside the header block ends the block.
    pub async fn read_request(&mut self) -> anyhow::Result<Option<Request>> {
        let Some(request_line) = self.read_line().await? else {
            return Ok(None);
        };
        info!("{}", request_line);

        let mut header_lines = Vec::new();
        while let Some(line) = self.read_line().await? {
            if line.is_empty() {
                break;
            }
            debug!("{}", line);
            header_lines.push(line);
        }

        Ok(Some(parse_request(&request_line, header_lines)?))
    }

    async fn read_line(&mut self) -> anyhow::Result<Option<String>> {
        let limit = self.limits.max_line_len;
        let mut line = Vec::new();

        let n = (&mut self.stream)
            .take(limit as u64)
            .read_until(b'\n', &mut line)
            .await?;

        if n == 0 {
            return Ok(None);
        }
        if n == limit && !line.ends_with(b"\n") {
            return Err(ParseError::LineTooLong(limit).into());
        }

        Ok(Some(decode_line(trim_line_ending(&line))))
    }

    async fn handle_request(root: &ServedRoot, req: &Request) -> Response {
        debug!(
            user_agent = req.header("User-Agent").unwrap_or("-"),
            version = req.version.as_deref().unwrap_or("-"),
            "Resolving {}",
            req.target
        );

        match root.resolve(&req.target).await {
            Resolved::File { path, file } => {
                debug!("Serving {}", path.display());
                Response::file(file, mime::content_type(&req.target))
            }
            Resolved::Directory { path } => match directory_index(&path, &req.target).await {
                Ok(page) => Response::html(page),
                Err(e) => {
                    warn!("Failed to list {}: {}", path.display(), e);
                    Response::internal_error()
                }
            },
            Resolved::NotFound => Response::not_found(),
            Resolved::Forbidden => Response::forbidden(),
            Resolved::Failed(e) => {
                warn!("Failed to open {}: {}", req.target, e);
                Response::internal_error()
            }
        }
    }
}
