//! Tokio runtime for the two execution contexts
//!
//! - **control task**: owns `HeadsetControl` and serializes host frames and
//!   stack events through one queue, so they never run concurrently
//! - **audio task**: drains the relay at the SCO cadence
//! - **host link**: one task parses inbound frames, one writes `HostEvent`s

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use embassy_sync::blocking_mutex::raw::{CriticalSectionRawMutex, RawMutex};
use headset_control::protocol::read_frame_async;
use headset_control::{
    Frame, FrameError, HeadsetControl, HostEvent, KeyValueStore, ManagementEvent, MicRelayBuffer,
    StackServices, Verdict, MIC_BUFFER_LEN,
};
use log::{debug, info, trace, warn};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::config::HostConfig;
use crate::error::{HostError, HostResult};
use crate::nvram::FileNvram;
use crate::services::{HostServices, PairingFlags};

/// Relay shared between the control task and the audio task
pub type HostRelay = MicRelayBuffer<CriticalSectionRawMutex, MIC_BUFFER_LEN>;

/// Largest encoded `HostEvent` frame
const EVENT_FRAME_LEN: usize = 32;

/// Work item for the control task
#[derive(Debug)]
pub enum Inbound {
    /// Host command frame
    Frame(Frame),
    /// Stack notification, with an optional channel for the handled event
    /// (including any out-fields the dispatcher filled in) and its verdict
    Stack {
        event: ManagementEvent,
        reply: Option<oneshot::Sender<(ManagementEvent, Verdict)>>,
    },
}

impl Inbound {
    pub fn stack(event: ManagementEvent) -> Self {
        Inbound::Stack { event, reply: None }
    }
}

/// Control task body: handle queued work until every sender is gone
pub async fn run_control<'a, M, S, P, const N: usize>(
    mut control: HeadsetControl<'a, M, S, P, N>,
    mut inbound: mpsc::UnboundedReceiver<Inbound>,
) -> HeadsetControl<'a, M, S, P, N>
where
    M: RawMutex,
    S: KeyValueStore,
    P: StackServices,
{
    while let Some(work) = inbound.recv().await {
        match work {
            Inbound::Frame(frame) => control.route_command(frame.command()),
            Inbound::Stack { mut event, reply } => {
                let verdict = control.handle_event(&mut event);
                trace!("{} -> {:?}", event.kind(), verdict);
                if let Some(reply) = reply {
                    let _ = reply.send((event, verdict));
                }
            }
        }
    }
    debug!("control queue closed");
    control
}

/// Audio task body: one frame per tick, silence when the relay is empty
pub async fn run_audio<M: RawMutex, const N: usize>(
    mic: &MicRelayBuffer<M, N>,
    frame_len: usize,
    period: Duration,
    sink: mpsc::Sender<Vec<u8>>,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut frame = vec![0u8; frame_len];

    loop {
        ticker.tick().await;
        // an empty relay still yields a silent frame
        mic.drain(&mut frame);
        if sink.send(frame.clone()).await.is_err() {
            debug!("audio sink closed");
            return;
        }
    }
}

/// `embedded-io-async` view of a tokio reader, so the host link is parsed by
/// the same frame reader as the UART
pub struct LinkReader<R>(pub R);

impl<R> embedded_io_async::ErrorType for LinkReader<R> {
    type Error = std::io::Error;
}

impl<R: AsyncRead + Unpin> embedded_io_async::Read for LinkReader<R> {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        self.0.read(buf).await
    }
}

/// Host reader body: frames go to the control queue until end of stream
///
/// Oversized frames are skipped; a stream that ends inside a frame is an
/// error.
pub async fn run_host_reader<R: AsyncRead + Unpin>(
    reader: R,
    inbound: mpsc::UnboundedSender<Inbound>,
) -> HostResult<()> {
    let mut reader = LinkReader(reader);
    loop {
        match read_frame_async(&mut reader).await {
            Ok(Some(frame)) => {
                trace!("host frame {:#06x}, {} bytes", frame.opcode, frame.payload.len());
                inbound
                    .send(Inbound::Frame(frame))
                    .map_err(|_| HostError::ChannelClosed)?;
            }
            Ok(None) => {
                info!("host link closed");
                return Ok(());
            }
            Err(FrameError::PayloadTooLarge(len)) => {
                warn!("skipped oversized host frame ({} bytes)", len);
            }
            Err(e) => return Err(e.into()),
        }
    }
}

/// Event writer body: encode each `HostEvent` onto the host link
pub async fn run_event_writer<W: AsyncWrite + Unpin>(
    mut writer: W,
    mut events: mpsc::UnboundedReceiver<HostEvent>,
) -> HostResult<()> {
    let mut buf = [0u8; EVENT_FRAME_LEN];
    while let Some(event) = events.recv().await {
        let n = event.encode_frame(&mut buf)?;
        writer.write_all(&buf[..n]).await?;
        writer.flush().await?;
        debug!("sent {:?}", event);
    }
    Ok(())
}

/// Running headset instance
pub struct HostRuntime {
    inbound: mpsc::UnboundedSender<Inbound>,
    flags: Arc<PairingFlags>,
    relay: &'static HostRelay,
    control: JoinHandle<()>,
    audio: JoinHandle<()>,
    reader: JoinHandle<HostResult<()>>,
    writer: JoinHandle<HostResult<()>>,
}

impl HostRuntime {
    /// Spawn every task and announce the device on the host link
    pub fn spawn<R, W>(
        config: &HostConfig,
        nvram: FileNvram,
        relay: &'static HostRelay,
        host_rx: R,
        host_tx: W,
        audio_sink: mpsc::Sender<Vec<u8>>,
    ) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let flags = Arc::new(PairingFlags::default());
        flags.pairing_allowed.store(config.pairing_allowed, Ordering::Release);
        flags.fast_pair.store(config.fast_pair, Ordering::Release);

        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        if event_tx.send(HostEvent::DeviceStarted).is_err() {
            warn!("event writer gone before start");
        }

        let loopback = config.loopback_stack.then(|| inbound_tx.clone());
        let services = HostServices::new(
            flags.clone(),
            nvram.clone(),
            event_tx,
            loopback,
            config.mic_frame_len,
        );
        let control = HeadsetControl::new(relay, nvram, services);

        let control = tokio::spawn(async move {
            run_control(control, inbound_rx).await;
        });
        let audio = tokio::spawn(run_audio(
            relay,
            config.mic_frame_len,
            config.mic_frame_interval(),
            audio_sink,
        ));
        let reader = tokio::spawn(run_host_reader(host_rx, inbound_tx.clone()));
        let writer = tokio::spawn(run_event_writer(host_tx, event_rx));

        info!(
            "headset runtime started (control core {})",
            headset_control::VERSION
        );
        Self {
            inbound: inbound_tx,
            flags,
            relay,
            control,
            audio,
            reader,
            writer,
        }
    }

    /// Deliver a stack notification and wait for its verdict
    pub async fn handle_event(
        &self,
        event: ManagementEvent,
    ) -> HostResult<(ManagementEvent, Verdict)> {
        let (reply, verdict) = oneshot::channel();
        self.inbound
            .send(Inbound::Stack {
                event,
                reply: Some(reply),
            })
            .map_err(|_| HostError::ChannelClosed)?;
        verdict.await.map_err(|_| HostError::ChannelClosed)
    }

    pub fn set_pairing_allowed(&self, allowed: bool) {
        self.flags.pairing_allowed.store(allowed, Ordering::Release);
    }

    pub fn relay(&self) -> &'static HostRelay {
        self.relay
    }

    /// Resolves when the inbound host stream ends or fails
    pub async fn host_link_closed(&mut self) -> HostResult<()> {
        (&mut self.reader).await?
    }

    /// Stop every task
    pub fn shutdown(self) {
        let stats = self.relay.stats();
        info!(
            "relay: {} bytes in, {} dropped, {} frames out, {} bytes padded",
            stats.bytes_accepted, stats.bytes_dropped, stats.frames_drained, stats.bytes_padded
        );
        self.reader.abort();
        self.audio.abort();
        self.control.abort();
        self.writer.abort();
    }
}
