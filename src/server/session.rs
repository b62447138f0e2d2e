use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::http::reader::{ReadError, RequestReader};
use crate::http::request::Request;
use crate::http::writer::ResponseWriter;
use crate::server::handler::Handler;
use crate::server::stats::{NoReporter, Reporter, SessionStats, next_connection_id};

/// One keep-alive connection: read a request, run the handler, write the
/// response, repeat until the connection has to close.
///
/// Requests on a session are strictly serialized; the next read does not
/// start until the previous response is fully written.
pub struct Session<S, H, R = NoReporter> {
    stream: S,
    handler: Arc<H>,
    reporter: Arc<R>,
    reader: RequestReader,
    stats: Option<SessionStats>,
    state: SessionState,
}

enum SessionState {
    Reading,
    Dispatching(Request),
    Writing {
        writer: ResponseWriter,
        need_eof: bool,
    },
    HalfClosed,
    Closed,
}

impl<S, H> Session<S, H, NoReporter>
where
    S: AsyncRead + AsyncWrite + Unpin,
    H: Handler,
{
    pub fn new(stream: S, handler: Arc<H>) -> Self {
        Session::with_reporter(stream, handler, Arc::new(NoReporter), None)
    }
}

impl<S, H, R> Session<S, H, R>
where
    S: AsyncRead + AsyncWrite + Unpin,
    H: Handler,
    R: Reporter,
{
    pub fn with_reporter(
        stream: S,
        handler: Arc<H>,
        reporter: Arc<R>,
        peer: Option<SocketAddr>,
    ) -> Self {
        let stats = R::ENABLED.then(|| SessionStats::new(next_connection_id(), peer));

        Self {
            stream,
            handler,
            reporter,
            reader: RequestReader::default(),
            stats,
            state: SessionState::Reading,
        }
    }

    /// Replaces the default request reader, e.g. to use a different size
    /// limit.
    pub fn reader(mut self, reader: RequestReader) -> Self {
        self.reader = reader;
        self
    }

    /// Drives the session to completion and releases the stream.
    ///
    /// Protocol and transport failures end the session quietly. A handler
    /// error is returned to the caller. Statistics are reported on every
    /// path.
    pub async fn run(mut self) -> anyhow::Result<()> {
        let result = self.drive().await;

        if let Some(mut stats) = self.stats.take() {
            stats.finish();
            self.reporter.report(&stats);
        }

        result
    }

    async fn drive(&mut self) -> anyhow::Result<()> {
        loop {
            match std::mem::replace(&mut self.state, SessionState::Closed) {
                SessionState::Reading => match self.reader.read_request(&mut self.stream).await {
                    Ok((request, consumed)) => {
                        if let Some(stats) = self.stats.as_mut() {
                            stats.record_read(consumed);
                        }
                        self.state = SessionState::Dispatching(request);
                    }
                    Err(ReadError::EndOfStream) => {
                        self.state = SessionState::HalfClosed;
                    }
                    Err(e) => {
                        debug!(error = %e, "Closing session after read failure");
                    }
                },

                SessionState::Dispatching(request) => {
                    let keep_alive = request.keep_alive();

                    let mut response = self.handler.call(request).await?;
                    response.prepare_payload();
                    response.set_keep_alive(keep_alive);

                    self.state = SessionState::Writing {
                        writer: ResponseWriter::new(&response),
                        need_eof: response.need_eof(),
                    };
                }

                SessionState::Writing {
                    mut writer,
                    need_eof,
                } => match writer.write_to_stream(&mut self.stream).await {
                    Ok(written) => {
                        if let Some(stats) = self.stats.as_mut() {
                            stats.record_response(written);
                        }
                        self.state = if need_eof {
                            SessionState::HalfClosed
                        } else {
                            SessionState::Reading
                        };
                    }
                    Err(e) => {
                        debug!(error = %e, "Closing session after write failure");
                    }
                },

                SessionState::HalfClosed => {
                    if let Err(e) = self.stream.shutdown().await {
                        debug!(error = %e, "Half-close failed");
                    }
                }

                SessionState::Closed => return Ok(()),
            }
        }
    }
}
