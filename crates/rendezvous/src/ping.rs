#[cfg(test)]
#[path = "tests/ping.rs"]
mod tests;

use core::time::Duration;
use std::io;

use eyre::{Result as EyreResult, WrapErr};
use futures_util::{SinkExt, StreamExt};
use libp2p::{PeerId, StreamProtocol};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::select;
use tokio::time::sleep;
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

mod codec;

pub use codec::{CodecError, PingCodec, MAX_LINE_LENGTH};

pub const PING_PROTOCOL: StreamProtocol = StreamProtocol::new("/v1/ping");

pub const PING: &str = "ping";
pub const PONG: &str = "pong";

pub type PingStream<S> = Framed<S, PingCodec>;

/// How an initiator loop went by the time it was cancelled.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct PingReport {
    pub succeeded: usize,
    pub failed: usize,
}

/// Answers one inbound stream: reads a single line, replies [`PONG`] and keeps
/// the stream open until the peer closes it or `shutdown` fires.
///
/// Anything the peer sends after the first line is read and dropped without a
/// reply. Returns the line that was received.
pub async fn serve<S>(peer: PeerId, stream: S, shutdown: CancellationToken) -> EyreResult<String>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    info!(%peer, "Got a new stream!");

    let mut framed = Framed::new(stream, PingCodec::new());

    let line = respond(&mut framed).await?;

    select! {
        () = shutdown.cancelled() => {}
        () = drain(peer, &mut framed) => {}
    }

    Ok(line)
}

/// One responder exchange on an already framed stream.
pub async fn respond<S>(framed: &mut PingStream<S>) -> EyreResult<String>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let line = read_line(framed).await.wrap_err("read data error")?;

    info!("received - {}", line);

    write_line(framed, PONG).await.wrap_err("send data error")?;

    Ok(line)
}

async fn drain<S>(peer: PeerId, framed: &mut PingStream<S>)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    while let Some(Ok(line)) = framed.next().await {
        debug!(%peer, %line, "Ignoring line on answered stream");
    }

    debug!(%peer, "Inbound stream closed");
}

/// Pings `peer` over `stream` every `interval` until `shutdown` fires.
///
/// A failed round is logged and the next one is attempted after the usual
/// interval; only cancellation ends the loop.
pub async fn initiate<S>(
    peer: PeerId,
    stream: S,
    interval: Duration,
    shutdown: CancellationToken,
) -> PingReport
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut framed = Framed::new(stream, PingCodec::new());
    let mut report = PingReport::default();

    loop {
        select! {
            biased;
            () = shutdown.cancelled() => break,
            result = exchange(&mut framed) => match result {
                Ok(_) => report.succeeded += 1,
                Err(err) => {
                    warn!(%peer, "Ping round failed: {:?}", err);
                    report.failed += 1;
                }
            },
        }

        select! {
            biased;
            () = shutdown.cancelled() => break,
            () = sleep(interval) => {}
        }
    }

    debug!(%peer, ?report, "Ping loop stopped");

    report
}

/// One initiator round: send [`PING`] and wait for the reply line.
pub async fn exchange<S>(framed: &mut PingStream<S>) -> EyreResult<String>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    write_line(framed, PING).await.wrap_err("send data error")?;

    let reply = read_line(framed).await.wrap_err("read data error")?;

    info!("received - {}", reply);

    Ok(reply)
}

async fn read_line<S>(framed: &mut PingStream<S>) -> Result<String, CodecError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    match framed.next().await {
        Some(line) => line,
        None => Err(io::Error::from(io::ErrorKind::UnexpectedEof).into()),
    }
}

async fn write_line<S>(framed: &mut PingStream<S>, line: &str) -> Result<(), CodecError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    info!("send - {}", line);

    framed.send(line).await
}
