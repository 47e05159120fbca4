//! Duplex session over one established connection.
//!
//! Two flows share the connection, each touching only its own direction:
//!
//! - inbound (spawned task): connection -> local output
//! - outbound (caller's task): local input -> connection
//!
//! They stop through the shared `ShutdownCoordinator`. A lost peer detected
//! by the inbound flow wakes the outbound flow even while it waits on local
//! input, because that wait is raced against the stop condition.

use std::sync::Arc;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, error, warn};

use crate::network::{FrameReader, FrameWriter};
use crate::service::{ProtocolConfig, ShutdownCoordinator, ShutdownState};

pub use counters::{CounterSnapshot, SessionCounters};

mod counters;

/// Why the outbound flow stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// local input reached end of stream
    InputExhausted,
    /// local input could not be read
    InputFailed,
    StopRequested,
    PeerLost,
}

#[derive(Debug)]
pub struct Session {
    counters: Arc<SessionCounters>,
    coordinator: ShutdownCoordinator,
    max_message_len: usize,
    send_buffer_size: usize,
}

async fn write_flushed<O: AsyncWrite + Unpin>(output: &mut O, data: &[u8]) -> std::io::Result<()> {
    output.write_all(data).await?;
    output.flush().await
}

async fn inbound_flow<R, O>(
    mut reader: FrameReader<R>,
    mut output: O,
    counters: Arc<SessionCounters>,
    coordinator: ShutdownCoordinator,
) where
    R: AsyncRead + Unpin,
    O: AsyncWrite + Unpin,
{
    let mut shutdown = coordinator.subscribe();
    while !shutdown.is_shutdown() {
        let frame = tokio::select! {
            _ = shutdown.recv() => break,
            frame = reader.read_frame() => frame,
        };
        match frame {
            Ok(payload) => {
                counters.add_received(payload.len() as u64);
                // a stalled local output must not hold up a stop
                let written = tokio::select! {
                    _ = shutdown.recv() => break,
                    written = write_flushed(&mut output, &payload) => written,
                };
                if let Err(err) = written {
                    warn!(
                        "could not write {} bytes to local output: {}",
                        payload.len(),
                        err
                    );
                }
            }
            Err(err) if err.is_peer_lost() => {
                debug!("peer closed the connection");
                coordinator.peer_lost();
                break;
            }
            Err(err) => {
                // framing cannot be resynchronised, nothing to retry
                error!("inbound flow stopped: {}", err);
                break;
            }
        }
    }
    debug!("inbound flow exited");
}

impl Session {
    pub fn new(
        counters: Arc<SessionCounters>,
        coordinator: ShutdownCoordinator,
        protocol: &ProtocolConfig,
    ) -> Self {
        Session {
            counters,
            coordinator,
            max_message_len: protocol.max_message_len,
            send_buffer_size: protocol.send_buffer_size,
        }
    }

    /// Runs both flows until the outbound one stops, then stops the inbound
    /// flow, waits for it and closes the connection.
    ///
    /// `reader`/`writer` are the two halves of the connection. Status reports
    /// go to `diagnostics`.
    #[tracing::instrument(skip_all)]
    pub async fn run<R, W, I, O, D>(
        &self,
        reader: R,
        writer: W,
        input: I,
        output: O,
        diagnostics: D,
    ) -> SessionEnd
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin,
        I: AsyncRead + Unpin,
        O: AsyncWrite + Unpin + Send + 'static,
        D: AsyncWrite + Unpin,
    {
        let inbound = tokio::spawn(inbound_flow(
            FrameReader::new(reader, self.max_message_len),
            output,
            Arc::clone(&self.counters),
            self.coordinator.clone(),
        ));

        let mut writer = FrameWriter::new(writer);
        let end = self.outbound_flow(&mut writer, input, diagnostics).await;
        debug!("outbound flow exited: {:?}", end);

        self.coordinator.request_stop();
        if let Err(join_error) = inbound.await {
            error!("inbound flow failed: {}", join_error);
        }
        if let Err(err) = writer.shutdown().await {
            debug!("closing connection: {}", err);
        }
        end
    }

    async fn outbound_flow<W, I, D>(
        &self,
        writer: &mut FrameWriter<W>,
        mut input: I,
        mut diagnostics: D,
    ) -> SessionEnd
    where
        W: AsyncWrite + Unpin,
        I: AsyncRead + Unpin,
        D: AsyncWrite + Unpin,
    {
        let mut shutdown = self.coordinator.subscribe();
        let mut buffer = BytesMut::zeroed(self.send_buffer_size);
        'relay: loop {
            // reading is cancel safe: a report or a stop never loses input
            let read = tokio::select! {
                biased;
                _ = shutdown.recv() => break self.stop_reason(),
                _ = self.coordinator.status_requested() => {
                    self.report_status(&mut diagnostics).await;
                    continue;
                }
                read = input.read(&mut buffer[..]) => read,
            };
            let len = match read {
                Ok(0) => break SessionEnd::InputExhausted,
                Ok(len) => len,
                Err(err) => {
                    error!("could not read local input: {}", err);
                    break SessionEnd::InputFailed;
                }
            };

            // a send blocked on a full peer window still answers status requests
            let send = writer.write_frame(&buffer[..len]);
            tokio::pin!(send);
            let sent = loop {
                tokio::select! {
                    biased;
                    _ = shutdown.recv() => break 'relay self.stop_reason(),
                    _ = self.coordinator.status_requested() => {
                        self.report_status(&mut diagnostics).await;
                    }
                    sent = &mut send => break sent,
                }
            };
            match sent {
                Ok(sent) => self.counters.add_sent(sent as u64),
                // only end of input or a stop ends this flow
                Err(err) => warn!("dropped {} bytes of local input: {}", len, err),
            }
        }
    }

    fn stop_reason(&self) -> SessionEnd {
        match self.coordinator.state() {
            ShutdownState::PeerLost => SessionEnd::PeerLost,
            _ => SessionEnd::StopRequested,
        }
    }

    async fn report_status<D: AsyncWrite + Unpin>(&self, diagnostics: &mut D) {
        let line = format!("{}\n", self.counters.snapshot());
        if let Err(err) = write_flushed(diagnostics, line.as_bytes()).await {
            debug!("could not write status report: {}", err);
        }
    }
}
