//! The serverless loop: sequential parse → dispatch → write over one duplex
//! byte stream.

use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;
use http::{Method, StatusCode};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::config::FramingConfig;
use crate::dispatch::DispatchEngine;
use crate::framing::decoder::{DecodedRequest, RequestDecoder};
use crate::framing::encoder::ResponseEncoder;
use crate::framing::input::{SessionInput, SharedInput};
use crate::framing::FramingError;
use crate::http::{Exchange, MediaType, Response};
use crate::observability::metrics;

/// Drives one exchange at a time between a byte source and a byte sink.
pub struct ServerlessApplication {
    engine: Arc<DispatchEngine>,
    config: FramingConfig,
    decoder: RequestDecoder,
    encoder: ResponseEncoder,
}

/// Totals for one run of the loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopSummary {
    pub exchanges: u64,
    pub protocol_errors: u64,
}

impl ServerlessApplication {
    pub fn new(engine: Arc<DispatchEngine>, config: FramingConfig) -> Self {
        Self {
            decoder: RequestDecoder::new(config.input_buffer_size),
            encoder: ResponseEncoder::new(config.output_buffer_size),
            engine,
            config,
        }
    }

    pub fn engine(&self) -> &Arc<DispatchEngine> {
        &self.engine
    }

    /// Serve until the input ends between exchanges.
    pub async fn run<R, W>(&self, input: R, output: W) -> Result<LoopSummary, FramingError>
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Unpin,
    {
        self.serve(input, output, std::future::pending()).await
    }

    /// Serve until the input ends or a shutdown signal arrives while the
    /// loop is waiting for a new request.
    pub async fn run_with_shutdown<R, W>(
        &self,
        input: R,
        output: W,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<LoopSummary, FramingError>
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Unpin,
    {
        self.serve(input, output, async move {
            let _ = shutdown.recv().await;
        })
        .await
    }

    /// Serve over the process boundary: an inherited socket on fd 0 when
    /// configured and present, else stdin/stdout.
    pub async fn run_stdio(
        &self,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<LoopSummary, FramingError> {
        #[cfg(unix)]
        if self.config.use_inherited_channel {
            match inherited::channel()? {
                Some(inherited::Channel::Tcp(stream)) => {
                    info!("serving on inherited TCP socket");
                    let (reader, writer) = stream.into_split();
                    return self.run_with_shutdown(reader, writer, shutdown).await;
                }
                Some(inherited::Channel::Unix(stream)) => {
                    info!("serving on inherited Unix socket");
                    let (reader, writer) = stream.into_split();
                    return self.run_with_shutdown(reader, writer, shutdown).await;
                }
                None => {}
            }
        }
        info!("serving on stdin/stdout");
        self.run_with_shutdown(tokio::io::stdin(), tokio::io::stdout(), shutdown)
            .await
    }

    async fn serve<R, W, S>(
        &self,
        input: R,
        mut output: W,
        shutdown: S,
    ) -> Result<LoopSummary, FramingError>
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Unpin,
        S: Future<Output = ()>,
    {
        let input = SessionInput::shared(input);
        let mut summary = LoopSummary::default();
        tokio::pin!(shutdown);

        loop {
            let has_data = tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!(exchanges = summary.exchanges, "shutdown requested between exchanges");
                    break;
                }
                ready = await_input(&input) => ready?,
            };
            if !has_data {
                break;
            }

            match self.decoder.decode(&input).await {
                Ok(None) => break,
                Ok(Some(decoded)) => {
                    self.exchange(decoded, &mut output).await?;
                    summary.exchanges += 1;
                }
                Err(FramingError::Io(e)) => return Err(FramingError::Io(e)),
                Err(error) => {
                    warn!(error = %error, "rejecting malformed request");
                    metrics::record_protocol_error(error.kind());
                    self.encoder
                        .write(&mut output, &bad_request(&error), false)
                        .await?;
                    summary.protocol_errors += 1;
                }
            }
        }

        debug!(
            exchanges = summary.exchanges,
            protocol_errors = summary.protocol_errors,
            "input closed, serverless loop finished"
        );
        Ok(summary)
    }

    async fn exchange<R, W>(
        &self,
        decoded: DecodedRequest<R>,
        output: &mut W,
    ) -> Result<(), FramingError>
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Unpin,
    {
        let DecodedRequest { request, window } = decoded;
        let omit_body = *request.method() == Method::HEAD;

        let mut exchange = Exchange::new(request);
        self.engine.service(&mut exchange).await;
        let exchange_id = exchange.id();
        match self
            .encoder
            .write(output, &exchange.response, omit_body)
            .await
        {
            Err(FramingError::InvalidResponseHead(reason)) => {
                error!(exchange_id = %exchange_id, reason = %reason, "refusing to write response head");
                metrics::record_protocol_error("response_head");
                self.encoder
                    .write(output, &unwritable_response(), omit_body)
                    .await?;
            }
            result => {
                result?;
            }
        }

        exchange.finish().await;
        // Whatever a partial reader left in the window belongs to this
        // request, never to the next one.
        if let Some(mut window) = window {
            let drained = tokio::io::copy(&mut window, &mut tokio::io::sink()).await?;
            if drained > 0 {
                debug!(exchange_id = %exchange_id, drained, "drained unread request body");
            }
        }
        Ok(())
    }
}

/// Wait until at least one byte is available. Cancel-safe: bytes read here
/// are pushed back for the decoder.
async fn await_input<R>(input: &SharedInput<R>) -> Result<bool, FramingError>
where
    R: AsyncRead + Unpin,
{
    if input.lock().pending() > 0 {
        return Ok(true);
    }
    let mut chunk = [0u8; 1024];
    let n = input.clone().read(&mut chunk).await?;
    if n == 0 {
        return Ok(false);
    }
    input.lock().unread(&chunk[..n]);
    Ok(true)
}

/// Stand-in for a response whose head would break the framing.
fn unwritable_response() -> Response {
    let mut response = Response::new(StatusCode::INTERNAL_SERVER_ERROR);
    response.set_content_type(&MediaType::text_plain());
    response.set_body(Bytes::from_static(b"response head contained invalid characters"));
    response
}

fn bad_request(error: &FramingError) -> Response {
    let mut response = Response::new(StatusCode::BAD_REQUEST);
    response.set_content_type(&MediaType::text_plain());
    response.set_body(Bytes::from(error.to_string()));
    response
}

#[cfg(unix)]
mod inherited {
    //! Detection of a socket handed to the process as fd 0.

    use std::io;
    use std::os::fd::{AsFd, OwnedFd};
    use std::os::unix::fs::FileTypeExt;

    pub enum Channel {
        Tcp(tokio::net::TcpStream),
        Unix(tokio::net::UnixStream),
    }

    pub fn channel() -> io::Result<Option<Channel>> {
        let stdin = io::stdin();
        let fd: OwnedFd = match stdin.as_fd().try_clone_to_owned() {
            Ok(fd) => fd,
            Err(_) => return Ok(None),
        };
        let file = std::fs::File::from(fd);
        if !file.metadata()?.file_type().is_socket() {
            return Ok(None);
        }
        let fd = OwnedFd::from(file);

        // An AF_UNIX peer has no IP address, so the TCP view fails there.
        let tcp = std::net::TcpStream::from(fd);
        if tcp.local_addr().is_ok() {
            tcp.set_nonblocking(true)?;
            return Ok(Some(Channel::Tcp(tokio::net::TcpStream::from_std(tcp)?)));
        }
        let unix = std::os::unix::net::UnixStream::from(OwnedFd::from(tcp));
        unix.set_nonblocking(true)?;
        Ok(Some(Channel::Unix(tokio::net::UnixStream::from_std(unix)?)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::{Route, RouteTable};
    use std::io::Cursor;

    fn app() -> ServerlessApplication {
        let mut routes = RouteTable::new();
        routes
            .add(Route::get("/ping", |_| async { Ok("pong".into()) }))
            .unwrap();
        let engine = DispatchEngine::builder(routes).build();
        ServerlessApplication::new(Arc::new(engine), FramingConfig::default())
    }

    #[tokio::test]
    async fn shutdown_before_first_byte_stops_cleanly() {
        let (tx, rx) = broadcast::channel(1);
        tx.send(()).unwrap();
        let (reader, _writer) = tokio::io::duplex(64);
        let mut out = Vec::new();

        let summary = app().run_with_shutdown(reader, &mut out, rx).await.unwrap();
        assert_eq!(summary, LoopSummary::default());
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn bad_request_does_not_stop_the_loop() {
        let input = Cursor::new(b"NOT-HTTP\r\n\r\nGET /ping HTTP/1.1\r\n\r\n".to_vec());
        let mut out = Vec::new();

        let summary = app().run(input, &mut out).await.unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(summary.exchanges, 1);
        assert_eq!(summary.protocol_errors, 1);
        assert!(text.starts_with("HTTP/1.1 400 Bad Request\r\n"));
        assert!(text.ends_with("\r\n\r\npong"));
    }
}
