//! pipeline coordinator — the receive/decode/render/audio pipeline for
//! one peer session, plus the QoS timer and NACK ticker.
//!
//! `Session` is deliberately receiver-shaped: it owns the four pipeline
//! stages (Receive/Decode/Render/Audio) and the Decoder/Renderer/AudioSink
//! external backends. The host-side send path (Encoder, packet cache, FEC,
//! rate control) is a separate, simpler pipeline in [`crate::host`] —
//! `riftcast-cache`'s own doc comments already describe the packet cache
//! and FEC encoder as sender-only components that never run on the
//! receiver.

use std::net::UdpSocket;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use bytes::Bytes;
use riftcast_clipboard::ClipboardSync;
use riftcast_core::{ConnectionLifecycle, DecodedFrame, GamingMode, InputEvent, SessionConfig};
use riftcast_dtls::{DtlsChannel, Role, SelfSignedIdentity};
use riftcast_nack::NackEmitter;
use riftcast_qos::{QosReporter, DEFAULT_INTERVAL};
use riftcast_wire::{
    classify, AudioPacketHeader, ClipAckPacket, ClipboardDirection, ClipboardFormat, ClipboardPacketHeader,
    ControllerPacket, InputPacketHeader, PacketType, QosFeedbackPacket, VideoPacketHeader,
};

use crate::errors::{SessionError, TransportError};
use crate::input_codec::{decode_input_event, encode_input_event};
use crate::stats::{state_label, SessionStats};
use crate::sync_primitives::{BoundedQueue, JitterSlot, SingleSlot};
use crate::traits::{AudioSink, Decoder, Renderer};

const RECEIVE_POLL: Duration = Duration::from_millis(100);
const DECODE_POLL: Duration = Duration::from_millis(5);
const RENDER_POLL: Duration = Duration::from_millis(16);
const AUDIO_POLL: Duration = Duration::from_millis(5);
const NACK_TICK: Duration = Duration::from_millis(5);
/// Sustained packet starvation (no video) for this long enters `Reconnecting`.
const STARVATION_THRESHOLD: Duration = Duration::from_secs(2);
/// Max datagram payload after decryption is 1400 bytes; leaves headroom.
const MAX_DATAGRAM: usize = 2048;
const AUDIO_QUEUE_CAPACITY: usize = 64;
/// Conservative baseline until an RTT probe mechanism exists: there is
/// no ping/pong exchange, so the NACK ticker's deadline math
/// (`rtt_estimate + jitter + 2ms`) uses a fixed baseline rather than a
/// measured round trip.
const BASELINE_RTT_ESTIMATE: Duration = Duration::from_millis(50);

enum AudioItem {
    Pcm(Bytes, u64),
    Loss,
}

fn spawn_named<F>(name: &str, f: F) -> JoinHandle<()>
where
F: FnOnce() + Send + 'static,
{
    thread::Builder::new()
    .name(name.to_string())
    .spawn(f)
    .expect("failed to spawn pipeline thread")
}

/// Owns one peer session's socket, DTLS channel, and every subsystem
/// involved, and runs the four pipeline worker threads plus the QoS
/// timer and NACK ticker.
pub struct Session {
    role: Role,
    config: Mutex<SessionConfig>,
    socket: UdpSocket,
    dtls: Mutex<Option<Arc<DtlsChannel>>>,
    running: AtomicBool,
    state: Mutex<ConnectionLifecycle>,
    threads: Mutex<Vec<JoinHandle<()>>>,

    jitter: Arc<JitterSlot>,
    nack: Mutex<NackEmitter>,
    qos_reporter: Mutex<QosReporter>,
    pending_nacks: Mutex<Vec<u16>>,

    decoder: Mutex<Box<dyn Decoder>>,
    renderer: Mutex<Box<dyn Renderer>>,
    audio_sink: Mutex<Box<dyn AudioSink>>,
    pending_frame: Arc<SingleSlot<DecodedFrame>>,
    audio_queue: Arc<BoundedQueue<AudioItem>>,
    last_audio_seq: Mutex<Option<u16>>,

    clipboard: Mutex<ClipboardSync>,

    on_input: Mutex<Option<Box<dyn Fn(InputEvent) + Send>>>,
    on_clipboard_chunk: Mutex<Option<Box<dyn Fn(ClipboardFormat, Bytes) + Send>>>,

    last_video_at: Mutex<Instant>,
    packets_received: AtomicU64,
    packets_lost: AtomicU64,
    last_feedback: Mutex<Option<QosFeedbackPacket>>,
}

impl Session {
    /// `socket` must already be connected to the single peer this session
    /// talks to (a pre-connected UDP socket). `clipboard_direction`
    /// fixes which way this side's outbound clipboard chunks are tagged.
    pub fn new(
        role: Role,
        config: SessionConfig,
        socket: UdpSocket,
        clipboard_direction: ClipboardDirection,
        decoder: Box<dyn Decoder>,
        renderer: Box<dyn Renderer>,
        audio_sink: Box<dyn AudioSink>) -> Result<Arc<Self>, SessionError> {
        config.validate()?;
        let target_depth_ms = config.target_depth_ms;

        Ok(Arc::new(Self {
                    role,
                    config: Mutex::new(config),
                    socket,
                    dtls: Mutex::new(None),
                    running: AtomicBool::new(false),
                    state: Mutex::new(ConnectionLifecycle::Idle),
                    threads: Mutex::new(Vec::new()),

                    jitter: Arc::new(JitterSlot::new(target_depth_ms)),
                    nack: Mutex::new(NackEmitter::new()),
                    qos_reporter: Mutex::new(QosReporter::new()),
                    pending_nacks: Mutex::new(Vec::new()),

                    decoder: Mutex::new(decoder),
                    renderer: Mutex::new(renderer),
                    audio_sink: Mutex::new(audio_sink),
                    pending_frame: Arc::new(SingleSlot::new()),
                    audio_queue: Arc::new(BoundedQueue::new(AUDIO_QUEUE_CAPACITY)),
                    last_audio_seq: Mutex::new(None),

                    clipboard: Mutex::new(ClipboardSync::new(clipboard_direction)),

                    on_input: Mutex::new(None),
                    on_clipboard_chunk: Mutex::new(None),

                    last_video_at: Mutex::new(Instant::now()),
                    packets_received: AtomicU64::new(0),
                    packets_lost: AtomicU64::new(0),
                    last_feedback: Mutex::new(None),
        }))
    }

    pub fn set_input_handler<F>(&self, handler: F)
    where
    F: Fn(InputEvent) + Send + 'static,
    {
        *self.on_input.lock().expect("on_input mutex poisoned") = Some(Box::new(handler));
    }

    pub fn set_clipboard_handler<F>(&self, handler: F)
    where
    F: Fn(ClipboardFormat, Bytes) + Send + 'static,
    {
        *self.on_clipboard_chunk.lock().expect("on_clipboard_chunk mutex poisoned") = Some(Box::new(handler));
    }

    /// Starts the pipeline in order: renderer, decoder, audio sink, then
    /// transport (NACK, QoS, receive). The local input-capture backend
    /// (mouse/keyboard source) is not one of the four external traits this
    /// crate defines; callers drive [`Session::send_input_event`] from
    /// whatever capture mechanism they wire up, rather than this
    /// coordinator owning an input thread itself.
    pub fn start(self: &Arc<Self>) -> Result<(), SessionError> {
        {
            let mut state = self.state.lock().expect("state mutex poisoned");
            if matches!(*state, ConnectionLifecycle::Streaming) {
                return Ok(());
            }
            *state = ConnectionLifecycle::Connecting;
        }

        let config = self.config.lock().expect("config mutex poisoned").clone();
        config.validate()?;

        self.socket.set_read_timeout(Some(RECEIVE_POLL)).map_err(TransportError::BindFailed)?;

        if config.use_dtls {
            let peer_socket = self.socket.try_clone().map_err(TransportError::BindFailed)?;
            let identity = SelfSignedIdentity::generate()?;
            let channel = DtlsChannel::handshake(self.role, peer_socket, &identity, &config.peer_fingerprint)?;
            *self.dtls.lock().expect("dtls mutex poisoned") = Some(Arc::new(channel));
        }

        self.running.store(true, Ordering::SeqCst);
        *self.last_video_at.lock().expect("last_video_at mutex poisoned") = Instant::now();

        let mut threads = self.threads.lock().expect("threads mutex poisoned");
        threads.push(spawn_named("riftcast-render", {
                    let session = Arc::clone(self);
                    move || run_render(&session)
        }));
        threads.push(spawn_named("riftcast-decode", {
                    let session = Arc::clone(self);
                    move || run_decode(&session)
        }));
        threads.push(spawn_named("riftcast-audio", {
                    let session = Arc::clone(self);
                    move || run_audio(&session)
        }));
        threads.push(spawn_named("riftcast-nack-ticker", {
                    let session = Arc::clone(self);
                    move || run_nack_ticker(&session)
        }));
        threads.push(spawn_named("riftcast-qos-timer", {
                    let session = Arc::clone(self);
                    move || run_qos_timer(&session)
        }));
        threads.push(spawn_named("riftcast-receive", {
                    let session = Arc::clone(self);
                    move || run_receive(&session)
        }));
        drop(threads);

        *self.state.lock().expect("state mutex poisoned") = ConnectionLifecycle::Streaming;
        Ok(())
    }

    /// Idempotent here: a second call is a no-op. Stop order is the
    /// reverse of start order; cancellation latency is bounded by each
    /// stage's own poll interval (Receive dominates at 100 ms, the
    /// narrower 16 ms bound applies only to the three condvar-based
    /// stages).
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }

        let channel = self.dtls.lock().expect("dtls mutex poisoned").clone();
        if let Some(channel) = channel {
            channel.shutdown();
        }

        self.jitter.cv.notify_all();
        self.pending_frame.notify_all();
        self.audio_queue.notify_all();

        let mut threads = self.threads.lock().expect("threads mutex poisoned");
        for handle in threads.drain(..).rev() {
            let _ = handle.join();
        }
        drop(threads);

        *self.state.lock().expect("state mutex poisoned") = ConnectionLifecycle::Stopped;
    }

    /// Flushes the local decoder, e.g. after a control-channel `force_idr`
    /// request — this session has no wire-level way to ask the peer for a
    /// fresh keyframe (that is the encoder side's `force_idr`), so this
    /// only discards locally buffered decode state ahead of the next one.
    pub fn force_idr(&self) {
        self.decoder.lock().expect("decoder mutex poisoned").flush();
    }

    pub fn reconfigure(&self, bitrate_kbps: u32, fps: u32) {
        let mut config = self.config.lock().expect("config mutex poisoned");
        config.bitrate_kbps = bitrate_kbps.clamp(config.min_bitrate_kbps, config.max_bitrate_kbps);
        config.fps = fps;
    }

    pub fn set_gaming_mode(&self, mode: GamingMode) {
        let depth = {
            let mut config = self.config.lock().expect("config mutex poisoned");
            config.gaming_mode = mode;
            config.target_depth_ms
        };
        self.jitter.buffer.lock().expect("jitter buffer mutex poisoned").set_target_depth_ms(depth);
    }

    pub fn get_stats(&self) -> SessionStats {
        let state = self.state.lock().expect("state mutex poisoned").clone();
        let bitrate_kbps = self.config.lock().expect("config mutex poisoned").bitrate_kbps;
        let avg_jitter_us = self
        .last_feedback
        .lock()
        .expect("last feedback mutex poisoned")
        .as_ref()
        .map(|f| f.avg_jitter_us as f64)
        .unwrap_or(0.0);

        SessionStats {
            state: state_label(&state),
            bitrate_kbps,
            packets_received: self.packets_received.load(Ordering::Relaxed),
            packets_lost: self.packets_lost.load(Ordering::Relaxed),
            avg_jitter_us,
        }
    }

    /// Encodes and sends one local input event to the peer. The caller
    /// supplies events from whatever OS capture mechanism it owns; this
    /// session only handles the wire framing.
    pub fn send_input_event(&self, event: &InputEvent) -> Result<(), SessionError> {
        let (input_type, payload) = encode_input_event(event);
        let header = InputPacketHeader { version: 1, input_type, payload_length: payload.len() as u16 };
        self.send_encrypted(&header.serialize(&payload))?;
        Ok(())
    }

    /// Begins sending a local clipboard change. Fails immediately
    /// if a previous chunk is still in flight; the caller should wait for
    /// the handler registered via [`Session::set_clipboard_handler`] or
    /// simply retry once the backlog clears.
    pub fn send_clipboard(&self, payload: Bytes, format: ClipboardFormat) -> Result<(), SessionError> {
        let header = {
            let mut sync = self.clipboard.lock().expect("clipboard mutex poisoned");
            sync.send(payload.clone(), format, Instant::now())
            .map_err(|e| TransportError::SendFailed(e.to_string()))?
        };
        self.send_encrypted(&header.serialize(&payload)?)?;
        Ok(())
    }

    fn recv_decrypted(&self, buf: &mut [u8]) -> Result<usize, TransportError> {
        let channel = self.dtls.lock().expect("dtls mutex poisoned").clone();
        if let Some(channel) = channel {
            channel.decrypt(buf).map_err(|e| TransportError::ReceiveFailed(e.to_string()))
        } else {
            match self.socket.recv(buf) {
                Ok(n) => Ok(n),
                Err(e) if matches!(e.kind(), std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut) => Ok(0),
                Err(e) => Err(TransportError::ReceiveFailed(e.to_string())),
            }
        }
    }

    fn send_encrypted(&self, data: &[u8]) -> Result<(), TransportError> {
        let channel = self.dtls.lock().expect("dtls mutex poisoned").clone();
        if let Some(channel) = channel {
            channel.encrypt(data).map(|_| ()).map_err(|e| TransportError::SendFailed(e.to_string()))
        } else {
            self.socket.send(data).map(|_| ()).map_err(|e| TransportError::SendFailed(e.to_string()))
        }
    }

    fn dispatch(&self, data: &[u8], now: Instant) {
        match classify(data) {
            Some(PacketType::Video) => self.handle_video(data, now),
            Some(PacketType::Audio) => self.handle_audio(data),
            Some(PacketType::Input) => self.handle_input(data),
            Some(PacketType::Controller) => self.handle_controller(data),
            Some(PacketType::Clipboard) => self.handle_clipboard(data),
            Some(PacketType::ClipAck) => self.handle_clip_ack(data),
            Some(PacketType::Fec) => {
                tracing::trace!("FEC packet received; recovery is a sender-side-only concern here")
            }
            Some(PacketType::QosFeedback) | Some(PacketType::Nack) => {
                tracing::trace!("QoS feedback / standalone NACK received on a receive-role session, ignoring")
            }
            None => tracing::debug!("unrecognized datagram dropped"),
        }
    }

    fn handle_video(&self, data: &[u8], now: Instant) {
        let (header, payload) = match VideoPacketHeader::deserialize(data) {
            Ok(pair) => pair,
            Err(e) => {
                tracing::debug!(error = %e, "dropping malformed video packet");
                return;
            }
        };

        self.packets_received.fetch_add(1, Ordering::Relaxed);
        *self.last_video_at.lock().expect("last_video_at mutex poisoned") = now;

        {
            let mut nack = self.nack.lock().expect("nack mutex poisoned");
            nack.on_packet_received(header.sequence_number, now);
        }
        {
            let mut qos = self.qos_reporter.lock().expect("qos reporter mutex poisoned");
            qos.on_packet_received(header.sequence_number, header.timestamp_us, payload.len(), now);
        }

        let pushed = {
            let mut buffer = self.jitter.buffer.lock().expect("jitter buffer mutex poisoned");
            buffer.push(&header, payload, now)
        };
        match pushed {
            Ok(()) => self.jitter.cv.notify_one(),
            Err(e) => tracing::trace!(error = %e, "jitter buffer rejected fragment"),
        }
    }

    fn handle_audio(&self, data: &[u8]) {
        let (header, payload) = match AudioPacketHeader::deserialize(data) {
            Ok(pair) => pair,
            Err(e) => {
                tracing::debug!(error = %e, "dropping malformed audio packet");
                return;
            }
        };

        let gap = {
            let mut last_seq = self.last_audio_seq.lock().expect("last_audio_seq mutex poisoned");
            let gap = last_seq.is_some_and(|prev| header.sequence_number != prev.wrapping_add(1));
            *last_seq = Some(header.sequence_number);
            gap
        };
        if gap {
            self.audio_queue.push(AudioItem::Loss);
        }
        self.audio_queue.push(AudioItem::Pcm(payload, header.timestamp_us as u64));
    }

    fn handle_input(&self, data: &[u8]) {
        let (header, payload) = match InputPacketHeader::deserialize(data) {
            Ok(pair) => pair,
            Err(e) => {
                tracing::debug!(error = %e, "dropping malformed input packet");
                return;
            }
        };
        let Some(event) = decode_input_event(header.input_type, &payload) else {
            tracing::debug!("dropping input packet with an unrecognized payload");
            return;
        };
        if let Some(handler) = self.on_input.lock().expect("on_input mutex poisoned").as_ref() {
            handler(event);
        }
    }

    fn handle_controller(&self, data: &[u8]) {
        match ControllerPacket::deserialize(data) {
            Ok(packet) => tracing::trace!(
                controller_id = packet.controller_id,
                sequence = packet.sequence,
                "controller packet received; no controller sink is wired for this session role"
            ),
            Err(e) => tracing::debug!(error = %e, "dropping malformed controller packet"),
        }
    }

    fn handle_clipboard(&self, data: &[u8]) {
        let (header, payload) = match ClipboardPacketHeader::deserialize(data) {
            Ok(pair) => pair,
            Err(e) => {
                tracing::debug!(error = %e, "dropping malformed clipboard packet");
                return;
            }
        };

        let ack = ClipAckPacket { direction: header.direction, sequence: header.sequence };
        if let Err(e) = self.send_encrypted(&ack.serialize()) {
            tracing::debug!(error = %e, "failed to send clipboard ack");
        }

        if let Some(handler) = self.on_clipboard_chunk.lock().expect("on_clipboard_chunk mutex poisoned").as_ref() {
            handler(header.format, payload);
        }
    }

    fn handle_clip_ack(&self, data: &[u8]) {
        match ClipAckPacket::deserialize(data) {
            Ok(ack) => self.clipboard.lock().expect("clipboard mutex poisoned").on_ack(ack.sequence),
            Err(e) => tracing::debug!(error = %e, "dropping malformed clip ack packet"),
        }
    }

    fn check_starvation(&self) {
        let elapsed = self.last_video_at.lock().expect("last_video_at mutex poisoned").elapsed();
        if elapsed <= STARVATION_THRESHOLD {
            return;
        }
        let mut state = self.state.lock().expect("state mutex poisoned");
        if matches!(*state, ConnectionLifecycle::Streaming) {
            tracing::warn!(elapsed_secs = elapsed.as_secs_f64(), "packet starvation, entering Reconnecting");
            *state = ConnectionLifecycle::Reconnecting { attempt: 1 };
        }
    }

    fn tick_clipboard(&self) {
        let retry = {
            let mut sync = self.clipboard.lock().expect("clipboard mutex poisoned");
            sync.tick(Instant::now())
        };
        match retry {
            Ok(Some((header, payload))) => match header.serialize(&payload) {
                Ok(wire) => {
                    if let Err(e) = self.send_encrypted(&wire) {
                        tracing::debug!(error = %e, "failed to retransmit clipboard chunk");
                    }
                }
                Err(e) => tracing::debug!(error = %e, "failed to re-serialize clipboard chunk"),
            },
            Ok(None) => {}
            Err(e) => tracing::debug!(error = %e, "clipboard chunk abandoned after max attempts"),
        }
    }

    /// `(rtt_estimate, jitter_estimate)` fed to the NACK emitter's deadline
    /// math. No RTT probe exists yet, so a fixed baseline stands in for
    /// measured RTT; jitter comes from the most recent QoS feedback this
    /// side produced.
    fn rtt_and_jitter_estimate(&self) -> (Duration, Duration) {
        let jitter_us = self
        .last_feedback
        .lock()
        .expect("last feedback mutex poisoned")
        .as_ref()
        .map(|f| f.avg_jitter_us as u64)
        .unwrap_or(0);
        (BASELINE_RTT_ESTIMATE, Duration::from_micros(jitter_us))
    }
}

fn run_receive(session: &Arc<Session>) {
    let mut buf = vec![0u8; MAX_DATAGRAM];
    while session.running.load(Ordering::Acquire) {
        match session.recv_decrypted(&mut buf) {
            Ok(0) => continue,
            Ok(n) => session.dispatch(&buf[..n], Instant::now()),
            Err(e) => tracing::debug!(error = %e, "receive error"),
        }
    }
}

fn run_decode(session: &Arc<Session>) {
    while session.running.load(Ordering::Acquire) {
        let frame = {
            let guard = session.jitter.buffer.lock().expect("jitter buffer mutex poisoned");
            let (mut guard, _) =
            session.jitter.cv.wait_timeout(guard, DECODE_POLL).expect("jitter condvar wait poisoned");
            guard.pop(Instant::now())
        };
        let Some(frame) = frame else { continue };

        let decoded = {
            let mut decoder = session.decoder.lock().expect("decoder mutex poisoned");
            decoder.decode(&frame.data, frame.timestamp_us, frame.is_keyframe)
        };
        match decoded {
            Ok(decoded) => session.pending_frame.set(decoded),
            Err(e) => tracing::debug!(error = %e, frame_number = frame.frame_number, "decode failed, dropping frame"),
        }
    }
}

fn run_render(session: &Arc<Session>) {
    while session.running.load(Ordering::Acquire) {
        if let Some(frame) = session.pending_frame.wait_take(RENDER_POLL) {
            let mut renderer = session.renderer.lock().expect("renderer mutex poisoned");
            renderer.enqueue_frame(frame);
            renderer.present();
        }
    }
}

fn run_audio(session: &Arc<Session>) {
    while session.running.load(Ordering::Acquire) {
        if let Some(item) = session.audio_queue.wait_pop(AUDIO_POLL) {
            let mut sink = session.audio_sink.lock().expect("audio sink mutex poisoned");
            match item {
                AudioItem::Pcm(pcm, timestamp_us) => sink.enqueue_pcm(pcm, timestamp_us),
                AudioItem::Loss => sink.conceal_loss(),
            }
        }
    }
}

fn run_nack_ticker(session: &Arc<Session>) {
    while session.running.load(Ordering::Acquire) {
        thread::sleep(NACK_TICK);
        if !session.running.load(Ordering::Acquire) {
            break;
        }
        let now = Instant::now();
        let (rtt_estimate, jitter_estimate) = session.rtt_and_jitter_estimate();
        let due = {
            let mut nack = session.nack.lock().expect("nack mutex poisoned");
            nack.tick(now, rtt_estimate, jitter_estimate)
        };
        if !due.is_empty() {
            session.pending_nacks.lock().expect("pending nacks mutex poisoned").extend(due);
        }
    }
}

fn run_qos_timer(session: &Arc<Session>) {
    let mut last_dropped = 0u64;
    while session.running.load(Ordering::Acquire) {
        thread::sleep(DEFAULT_INTERVAL);
        if !session.running.load(Ordering::Acquire) {
            break;
        }

        let pending_nacks: Vec<u16> = {
            let mut guard = session.pending_nacks.lock().expect("pending nacks mutex poisoned");
            std::mem::take(&mut *guard)
        };

        let dropped_now = session.nack.lock().expect("nack mutex poisoned").dropped_count();
        let packets_lost = dropped_now.saturating_sub(last_dropped) as u32;
        last_dropped = dropped_now;
        session.packets_lost.fetch_add(packets_lost as u64, Ordering::Relaxed);

        let feedback = {
            let mut qos = session.qos_reporter.lock().expect("qos reporter mutex poisoned");
            qos.tick(DEFAULT_INTERVAL, packets_lost, &pending_nacks)
        };

        *session.last_feedback.lock().expect("last feedback mutex poisoned") = Some(feedback.clone());

        if let Err(e) = session.send_encrypted(&feedback.serialize()) {
            tracing::debug!(error = %e, "failed to send QoS feedback");
        }

        session.check_starvation();
        session.tick_clipboard();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use riftcast_core::{MouseButton, PixelFormat};
    use riftcast_wire::ClipboardFormat;
    use std::sync::Mutex as StdMutex;

    struct StubDecoder;
    impl Decoder for StubDecoder {
        fn decode(&mut self, payload: &[u8], timestamp_us: u64, _is_keyframe: bool) -> Result<DecodedFrame, crate::traits::DecoderError> {
            Ok(DecodedFrame {
                    data: Bytes::copy_from_slice(payload),
                    width: 1,
                    height: 1,
                    timestamp_us,
                    format: PixelFormat::Rgba,
            })
        }
        fn flush(&mut self) {}
    }

    struct StubRenderer {
        presented: StdMutex<Vec<u64>>,
    }
    impl Renderer for StubRenderer {
        fn enqueue_frame(&self, frame: DecodedFrame) {
            self.presented.lock().unwrap().push(frame.timestamp_us);
        }
        fn present(&mut self) {}
    }

    struct StubAudioSink;
    impl AudioSink for StubAudioSink {
        fn enqueue_pcm(&self, _pcm: Bytes, _timestamp_us: u64) {}
        fn conceal_loss(&mut self) {}
    }

    fn make_session(use_dtls: bool) -> Arc<Session> {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        socket.connect("127.0.0.1:1").unwrap();
        let mut config = SessionConfig::default();
        config.use_dtls = use_dtls;
        Session::new(
            Role::Client,
            config,
            socket,
            ClipboardDirection::ViewerToHost,
            Box::new(StubDecoder),
            Box::new(StubRenderer { presented: StdMutex::new(Vec::new()) }),
            Box::new(StubAudioSink))
        .unwrap()
    }

    #[test]
    fn handle_video_feeds_the_jitter_buffer_and_updates_nack_cursor() {
        let session = make_session(false);
        let header = VideoPacketHeader {
            version: 1,
            frame_type: riftcast_core::FrameType::I,
            keyframe: true,
            codec: riftcast_core::VideoCodec::H264,
            sequence_number: 1,
            timestamp_us: 1_000_000,
            frame_number: 1,
            fragment_index: 0,
            fragment_total: 1,
            payload_length: 3,
        };
        let wire = header.serialize(b"abc").unwrap();
        session.handle_video(&wire, Instant::now());
        assert_eq!(session.packets_received.load(Ordering::Relaxed), 1);
        assert_eq!(session.jitter.buffer.lock().unwrap().depth(), 1);
    }

    #[test]
    fn handle_input_invokes_registered_handler() {
        let session = make_session(false);
        let seen = Arc::new(StdMutex::new(None));
        let seen_clone = Arc::clone(&seen);
        session.set_input_handler(move |event| *seen_clone.lock().unwrap() = Some(event));

        let event = InputEvent::MouseButton { button: MouseButton::Left, pressed: true };
        let (input_type, payload) = encode_input_event(&event);
        let header = InputPacketHeader { version: 1, input_type, payload_length: payload.len() as u16 };
        session.handle_input(&header.serialize(&payload));

        assert_eq!(*seen.lock().unwrap(), Some(event));
    }

    #[test]
    fn handle_clipboard_acks_and_invokes_handler() {
        let session = make_session(false);
        let seen = Arc::new(StdMutex::new(None));
        let seen_clone = Arc::clone(&seen);
        session.set_clipboard_handler(move |format, payload| *seen_clone.lock().unwrap() = Some((format, payload)));

        let header = ClipboardPacketHeader {
            direction: ClipboardDirection::HostToViewer,
            sequence: 3,
            format: ClipboardFormat::TextUtf8,
            length: 5,
        };
        session.handle_clipboard(&header.serialize(b"hello").unwrap());

        let captured = seen.lock().unwrap().clone().unwrap();
        assert_eq!(captured.0, ClipboardFormat::TextUtf8);
        assert_eq!(captured.1.as_ref(), b"hello");
    }

    #[test]
    fn handle_clip_ack_clears_in_flight_clipboard_send() {
        let session = make_session(false);
        session.send_clipboard(Bytes::from_static(b"x"), ClipboardFormat::TextUtf8).unwrap();
        assert!(session.clipboard.lock().unwrap().has_in_flight());

        let ack = ClipAckPacket { direction: ClipboardDirection::ViewerToHost, sequence: 0 };
        session.handle_clip_ack(&ack.serialize());
        assert!(!session.clipboard.lock().unwrap().has_in_flight());
    }

    #[test]
    fn handle_audio_flags_a_gap_as_loss() {
        let session = make_session(false);
        let header0 = AudioPacketHeader { version: 1, channel_id: 0, sequence_number: 0, timestamp_us: 0 };
        let header2 = AudioPacketHeader { version: 1, channel_id: 0, sequence_number: 2, timestamp_us: 100 };
        session.handle_audio(&header0.serialize(b"a"));
        session.handle_audio(&header2.serialize(b"b"));

        assert!(session.audio_queue.wait_pop(Duration::from_millis(1)).is_some()); // header0
        let gap = session.audio_queue.wait_pop(Duration::from_millis(1));
        assert!(matches!(gap, Some(AudioItem::Loss)));
    }

    #[test]
    fn stop_before_start_is_a_harmless_no_op() {
        let session = make_session(false);
        session.stop();
        session.stop();
    }

    #[test]
    fn malformed_video_packet_is_dropped_without_panicking() {
        let session = make_session(false);
        session.handle_video(&[0u8; 2], Instant::now());
        assert_eq!(session.packets_received.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn check_starvation_transitions_streaming_to_reconnecting() {
        let session = make_session(false);
        *session.state.lock().unwrap() = ConnectionLifecycle::Streaming;
        *session.last_video_at.lock().unwrap() = Instant::now() - Duration::from_secs(3);
        session.check_starvation();
        assert!(matches!(*session.state.lock().unwrap(), ConnectionLifecycle::Reconnecting { attempt: 1 }));
    }
}
