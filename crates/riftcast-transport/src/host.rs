//! Host-side send pipeline: the other half of the data-flow diagram that
//! [`crate::coordinator::Session`] deliberately leaves out — capture →
//! encode → fragment → packet cache → FEC → DTLS → UDP, plus the QoS
//! feedback / NACK consumer that drives the rate controller and replays
//! cached packets.
//!
//! This is a second, simpler `Session`-shaped type rather than a role flag
//! on the receiver-shaped one: the two pipelines share almost no state
//! (`PacketCache`/`FecEncoder`/`RateController` vs. `JitterBuffer`/
//! `NackEmitter`/`QosReporter`) and only names the receive/decode/
//! render/audio stages, so folding both directions into one struct would
//! mean half its fields are always unused depending on role.

use std::net::UdpSocket;
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use bytes::Bytes;
use riftcast_cache::{FecEncoder, PacketCache};
use riftcast_clipboard::ClipboardSync;
use riftcast_core::{ConnectionLifecycle, FrameType, InputEvent, SessionConfig};
use riftcast_dtls::{DtlsChannel, Role, SelfSignedIdentity};
use riftcast_qos::RateController;
use riftcast_wire::{
    classify, ClipAckPacket, ClipboardDirection, ClipboardFormat, ClipboardPacketHeader, ControllerPacket,
    FecPacketHeader, InputPacketHeader, NackPacket, PacketType, QosFeedbackPacket, VideoPacketHeader,
};

use crate::errors::{SessionError, TransportError};
use crate::input_codec::decode_input_event;
use crate::traits::Encoder;

/// Payload is sized to stay within 1400 bytes after DTLS overhead.
const MAX_VIDEO_PAYLOAD: usize = 1384;
/// Default group size for FEC (clamped to `[2, 48]` by `FecEncoder` anyway).
const DEFAULT_FEC_GROUP_SIZE: usize = 16;
/// FEC ships enabled by default at a modest redundancy ratio.
const DEFAULT_FEC_REDUNDANCY_RATIO: f32 = 0.2;
const ENCODE_POLL: Duration = Duration::from_millis(2);
const FEEDBACK_POLL: Duration = Duration::from_millis(100);
const MAX_DATAGRAM: usize = 2048;

struct PendingFecMember {
    payload: Bytes,
    frame_number: u16,
    timestamp_us: u32,
}

fn spawn_named<F>(name: &str, f: F) -> JoinHandle<()>
where
F: FnOnce() + Send + 'static,
{
    thread::Builder::new().name(name.to_string()).spawn(f).expect("failed to spawn pipeline thread")
}

/// Owns the host side of one session: the encoder, the fragmenter, the
/// packet cache, the FEC encoder, and the rate controller.
pub struct HostSession {
    role: Role,
    config: Mutex<SessionConfig>,
    socket: UdpSocket,
    dtls: Mutex<Option<Arc<DtlsChannel>>>,
    running: AtomicBool,
    state: Mutex<ConnectionLifecycle>,
    threads: Mutex<Vec<JoinHandle<()>>>,
    started_at: Mutex<Option<Instant>>,

    encoder: Mutex<Box<dyn Encoder>>,
    cache: PacketCache,
    fec: FecEncoder,
    fec_group: Mutex<Vec<PendingFecMember>>,
    fec_group_size: usize,
    fec_redundancy_ratio: f32,
    rate: Mutex<RateController>,

    next_sequence: AtomicU16,
    next_frame_number: AtomicU16,

    clipboard: Mutex<ClipboardSync>,
    on_input: Mutex<Option<Box<dyn Fn(InputEvent) + Send>>>,
    on_clipboard_chunk: Mutex<Option<Box<dyn Fn(ClipboardFormat, Bytes) + Send>>>,
}

impl HostSession {
    pub fn new(role: Role, config: SessionConfig, socket: UdpSocket, encoder: Box<dyn Encoder>) -> Result<Arc<Self>, SessionError> {
        config.validate()?;
        let rate = RateController::new(config.bitrate_kbps, config.min_bitrate_kbps, config.max_bitrate_kbps);

        Ok(Arc::new(Self {
                    role,
                    config: Mutex::new(config),
                    socket,
                    dtls: Mutex::new(None),
                    running: AtomicBool::new(false),
                    state: Mutex::new(ConnectionLifecycle::Idle),
                    threads: Mutex::new(Vec::new()),
                    started_at: Mutex::new(None),

                    encoder: Mutex::new(encoder),
                    cache: PacketCache::new(),
                    fec: FecEncoder::new(),
                    fec_group: Mutex::new(Vec::new()),
                    fec_group_size: DEFAULT_FEC_GROUP_SIZE,
                    fec_redundancy_ratio: DEFAULT_FEC_REDUNDANCY_RATIO,
                    rate: Mutex::new(rate),

                    next_sequence: AtomicU16::new(0),
                    next_frame_number: AtomicU16::new(0),

                    clipboard: Mutex::new(ClipboardSync::new(ClipboardDirection::HostToViewer)),
                    on_input: Mutex::new(None),
                    on_clipboard_chunk: Mutex::new(None),
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

        self.socket.set_read_timeout(Some(FEEDBACK_POLL)).map_err(TransportError::BindFailed)?;

        if config.use_dtls {
            let peer_socket = self.socket.try_clone().map_err(TransportError::BindFailed)?;
            let identity = SelfSignedIdentity::generate()?;
            let channel = DtlsChannel::handshake(self.role, peer_socket, &identity, &config.peer_fingerprint)?;
            *self.dtls.lock().expect("dtls mutex poisoned") = Some(Arc::new(channel));
        }

        *self.started_at.lock().expect("started_at mutex poisoned") = Some(Instant::now());
        self.running.store(true, Ordering::SeqCst);

        let mut threads = self.threads.lock().expect("threads mutex poisoned");
        threads.push(spawn_named("riftcast-send", {
                    let session = Arc::clone(self);
                    move || run_send(&session)
        }));
        threads.push(spawn_named("riftcast-feedback", {
                    let session = Arc::clone(self);
                    move || run_feedback(&session)
        }));
        drop(threads);

        *self.state.lock().expect("state mutex poisoned") = ConnectionLifecycle::Streaming;
        Ok(())
    }

    /// Idempotent, mirroring [`crate::coordinator::Session::stop`].
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }

        let channel = self.dtls.lock().expect("dtls mutex poisoned").clone();
        if let Some(channel) = channel {
            channel.shutdown();
        }

        let mut threads = self.threads.lock().expect("threads mutex poisoned");
        for handle in threads.drain(..).rev() {
            let _ = handle.join();
        }
        drop(threads);

        *self.state.lock().expect("state mutex poisoned") = ConnectionLifecycle::Stopped;
    }

    pub fn force_idr(&self) {
        self.encoder.lock().expect("encoder mutex poisoned").force_idr();
    }

    pub fn reconfigure(&self, bitrate_kbps: u32, fps: u32) {
        let mut config = self.config.lock().expect("config mutex poisoned");
        config.bitrate_kbps = bitrate_kbps.clamp(config.min_bitrate_kbps, config.max_bitrate_kbps);
        config.fps = fps;
        self.encoder.lock().expect("encoder mutex poisoned").reconfigure(config.bitrate_kbps, fps);
    }

    pub fn send_clipboard(&self, payload: Bytes, format: ClipboardFormat) -> Result<(), SessionError> {
        let header = {
            let mut sync = self.clipboard.lock().expect("clipboard mutex poisoned");
            sync.send(payload.clone(), format, Instant::now()).map_err(|e| TransportError::SendFailed(e.to_string()))?
        };
        self.send_encrypted(&header.serialize(&payload)?)?;
        Ok(())
    }

    fn send_encrypted(&self, data: &[u8]) -> Result<(), TransportError> {
        let channel = self.dtls.lock().expect("dtls mutex poisoned").clone();
        if let Some(channel) = channel {
            channel.encrypt(data).map(|_| ()).map_err(|e| TransportError::SendFailed(e.to_string()))
        } else {
            self.socket.send(data).map(|_| ()).map_err(|e| TransportError::SendFailed(e.to_string()))
        }
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

    fn capture_timestamp_us(&self) -> u32 {
        let started = self.started_at.lock().expect("started_at mutex poisoned").expect("set by start");
        started.elapsed().as_micros() as u32
    }

    fn next_sequence(&self) -> u16 {
        self.next_sequence.fetch_add(1, Ordering::Relaxed)
    }

    /// Fragments one encoded frame into `VideoPacketHeader`-framed packets
    /// (fragment any frame larger than 1400 - 16 bytes), storing each
    /// in the packet cache and folding its payload into the current FEC
    /// group before sending.
    fn send_encoded_frame(&self, data: Bytes, is_keyframe: bool) {
        let config = self.config.lock().expect("config mutex poisoned").clone();
        let frame_number = self.next_frame_number.fetch_add(1, Ordering::Relaxed);
        let timestamp_us = self.capture_timestamp_us();
        let frame_type = if is_keyframe { FrameType::I } else { FrameType::P };

        let chunks: Vec<&[u8]> = if data.is_empty() { vec![&[]] } else { data.chunks(MAX_VIDEO_PAYLOAD).collect() };
        let fragment_total = chunks.len().min(u8::MAX as usize) as u8;

        for (index, chunk) in chunks.iter().take(fragment_total as usize).enumerate() {
            let header = VideoPacketHeader {
                version: 1,
                frame_type,
                keyframe: is_keyframe && index == 0,
                codec: config.codec,
                sequence_number: self.next_sequence(),
                timestamp_us,
                frame_number,
                fragment_index: index as u8,
                fragment_total,
                payload_length: chunk.len() as u32,
            };
            let Ok(wire) = header.serialize(chunk) else { continue };
            self.cache.store(header.sequence_number, wire.clone());
            if let Err(e) = self.send_encrypted(&wire) {
                tracing::debug!(error = %e, "failed to send video fragment");
            }
            self.fold_into_fec_group(Bytes::copy_from_slice(chunk), frame_number, timestamp_us);
        }
    }

    fn fold_into_fec_group(&self, payload: Bytes, frame_number: u16, timestamp_us: u32) {
        let ready = {
            let mut group = self.fec_group.lock().expect("fec group mutex poisoned");
            group.push(PendingFecMember { payload, frame_number, timestamp_us });
            group.len() >= self.fec_group_size
        };
        if ready {
            self.flush_fec_group();
        }
    }

    fn flush_fec_group(&self) {
        let members = {
            let mut group = self.fec_group.lock().expect("fec group mutex poisoned");
            std::mem::take(&mut *group)
        };
        if members.len() < 2 {
            return;
        }
        let payloads: Vec<Bytes> = members.iter().map(|m| m.payload.clone()).collect();
        let fec_group = self.fec.encode_group(&payloads, self.fec_redundancy_ratio);

        for (i, repair) in fec_group.repair_payloads.iter().enumerate() {
            let first = &members[2 * i];
            let header = FecPacketHeader {
                version: 1,
                group_id: fec_group.group_id,
                sequence_number: self.next_sequence(),
                timestamp_us: first.timestamp_us,
                frame_number: first.frame_number,
                fragment_index: 0,
                fragment_total: 1,
                payload_length: repair.len() as u32,
            };
            let wire = header.serialize(repair);
            self.cache.store(header.sequence_number, wire.clone());
            if let Err(e) = self.send_encrypted(&wire) {
                tracing::debug!(error = %e, "failed to send FEC repair packet");
            }
        }
    }

    fn handle_feedback_datagram(&self, data: &[u8]) {
        match classify(data) {
            Some(PacketType::QosFeedback) => self.handle_qos_feedback(data),
            Some(PacketType::Nack) => self.handle_standalone_nack(data),
            Some(PacketType::Input) => self.handle_input(data),
            Some(PacketType::Controller) => self.handle_controller(data),
            Some(PacketType::Clipboard) => self.handle_clipboard(data),
            Some(PacketType::ClipAck) => self.handle_clip_ack(data),
            Some(PacketType::Video) | Some(PacketType::Audio) | Some(PacketType::Fec) => {
                tracing::trace!("media packet received on the host send path, ignoring")
            }
            None => tracing::debug!("unrecognized feedback-path datagram dropped"),
        }
    }

    fn handle_qos_feedback(&self, data: &[u8]) {
        let feedback = match QosFeedbackPacket::deserialize(data) {
            Ok(f) => f,
            Err(e) => {
                tracing::debug!(error = %e, "dropping malformed QoS feedback packet");
                return;
            }
        };

        let decision = self.rate.lock().expect("rate controller mutex poisoned").on_feedback(&feedback, &self.cache);

        let fps = self.config.lock().expect("config mutex poisoned").fps;
        {
            let mut config = self.config.lock().expect("config mutex poisoned");
            config.bitrate_kbps = decision.bitrate_kbps;
        }
        {
            let mut encoder = self.encoder.lock().expect("encoder mutex poisoned");
            encoder.reconfigure(decision.bitrate_kbps, fps);
            if decision.force_idr {
                encoder.force_idr();
            }
        }

        self.replay(decision.replay);
    }

    fn handle_standalone_nack(&self, data: &[u8]) {
        let Ok(packet) = NackPacket::deserialize(data) else {
            tracing::debug!("dropping malformed standalone NACK packet");
            return;
        };
        let replay: Vec<(u16, Bytes)> = packet.seqs.iter().filter_map(|&seq| self.cache.get(seq).map(|b| (seq, b))).collect();
        self.replay(replay);
    }

    fn replay(&self, replay: Vec<(u16, Bytes)>) {
        for (seq, bytes) in replay {
            if let Err(e) = self.send_encrypted(&bytes) {
                tracing::debug!(error = %e, seq, "failed to replay cached packet");
            }
        }
    }

    fn handle_input(&self, data: &[u8]) {
        let (header, payload) = match InputPacketHeader::deserialize(data) {
            Ok(pair) => pair,
            Err(e) => {
                tracing::debug!(error = %e, "dropping malformed input packet");
                return;
            }
        };
        let Some(event) = decode_input_event(header.input_type, &payload) else { return };
        if let Some(handler) = self.on_input.lock().expect("on_input mutex poisoned").as_ref() {
            handler(event);
        }
    }

    fn handle_controller(&self, data: &[u8]) {
        if let Err(e) = ControllerPacket::deserialize(data) {
            tracing::debug!(error = %e, "dropping malformed controller packet");
        }
        // Controller injection is handled by an external collaborator;
        // this session only frames/unframes the packet.
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

    fn tick_clipboard(&self) {
        let retry = self.clipboard.lock().expect("clipboard mutex poisoned").tick(Instant::now());
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
}

fn run_send(session: &Arc<HostSession>) {
    while session.running.load(Ordering::Acquire) {
        let encoded = session.encoder.lock().expect("encoder mutex poisoned").encode();
        match encoded {
            Some((data, is_keyframe)) => session.send_encoded_frame(data, is_keyframe),
            None => thread::sleep(ENCODE_POLL),
        }
    }
    session.flush_fec_group();
}

fn run_feedback(session: &Arc<HostSession>) {
    let mut buf = vec![0u8; MAX_DATAGRAM];
    while session.running.load(Ordering::Acquire) {
        match session.recv_decrypted(&mut buf) {
            Ok(0) => session.tick_clipboard(),
            Ok(n) => session.handle_feedback_datagram(&buf[..n]),
            Err(e) => tracing::debug!(error = %e, "feedback receive error"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use riftcast_core::VideoCodec;
    use std::sync::atomic::AtomicBool as StdAtomicBool;

    struct ScriptedEncoder {
        frames: Mutex<Vec<(Bytes, bool)>>,
        reconfigured: Arc<StdAtomicBool>,
    }

    impl Encoder for ScriptedEncoder {
        fn encode(&mut self) -> Option<(Bytes, bool)> {
            self.frames.lock().unwrap().pop()
        }
        fn reconfigure(&mut self, _bitrate_kbps: u32, _fps: u32) {
            self.reconfigured.store(true, Ordering::SeqCst);
        }
        fn force_idr(&mut self) {}
        fn flush(&mut self) {}
    }

    fn make_host(frames: Vec<(Bytes, bool)>) -> (Arc<HostSession>, Arc<StdAtomicBool>) {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        socket.connect("127.0.0.1:1").unwrap();
        let mut config = SessionConfig::default();
        config.use_dtls = false;
        config.codec = VideoCodec::H264;
        let reconfigured = Arc::new(StdAtomicBool::new(false));
        let encoder = ScriptedEncoder { frames: Mutex::new(frames), reconfigured: Arc::clone(&reconfigured) };
        let host = HostSession::new(Role::Client, config, socket, Box::new(encoder)).unwrap();
        *host.started_at.lock().unwrap() = Some(Instant::now());
        (host, reconfigured)
    }

    #[test]
    fn fragments_large_frames_and_stores_every_fragment_in_the_cache() {
        let (host, _) = make_host(vec![]);
        let big = Bytes::from(vec![0xABu8; MAX_VIDEO_PAYLOAD * 2 + 10]);
        host.send_encoded_frame(big, true);
        assert!(host.cache.get(0).is_some());
        assert!(host.cache.get(1).is_some());
        assert!(host.cache.get(2).is_some());
        assert!(host.cache.get(3).is_none());
    }

    #[test]
    fn only_the_first_fragment_of_a_keyframe_carries_the_keyframe_bit() {
        let (host, _) = make_host(vec![]);
        let big = Bytes::from(vec![0x01u8; MAX_VIDEO_PAYLOAD + 10]);
        host.send_encoded_frame(big, true);
        let (h0, _) = VideoPacketHeader::deserialize(&host.cache.get(0).unwrap()).unwrap();
        let (h1, _) = VideoPacketHeader::deserialize(&host.cache.get(1).unwrap()).unwrap();
        assert!(h0.keyframe);
        assert!(!h1.keyframe);
        assert_eq!(h0.frame_number, h1.frame_number);
    }

    #[test]
    fn fec_group_flushes_once_it_reaches_the_configured_size() {
        let (host, _) = make_host(vec![]);
        for _ in 0..DEFAULT_FEC_GROUP_SIZE {
            host.send_encoded_frame(Bytes::from_static(b"x"), false);
        }
        // group_size data packets occupy sequences [0, group_size); the
        // first FEC repair packet should have been assigned the next one.
        assert!(host.cache.get(DEFAULT_FEC_GROUP_SIZE as u16).is_some());
    }

    #[test]
    fn qos_feedback_reconfigures_the_encoder_and_replays_nacked_packets() {
        let (host, reconfigured) = make_host(vec![]);
        host.send_encoded_frame(Bytes::from_static(b"abc"), true);

        let feedback = QosFeedbackPacket {
            flags: 0,
            last_seq_received: 0,
            estimated_bw_kbps: 1_000,
            packet_loss_x100: 400,
            avg_jitter_us: 0,
            delay_gradient_us: 0,
            nack_seqs: vec![0],
        };
        host.handle_qos_feedback(&feedback.serialize());
        assert!(reconfigured.load(Ordering::SeqCst));
    }

    #[test]
    fn standalone_nack_replays_cached_packets_and_ignores_misses() {
        let (host, _) = make_host(vec![]);
        host.send_encoded_frame(Bytes::from_static(b"abc"), true);
        let nack = NackPacket { seqs: vec![0, 999] };
        host.handle_standalone_nack(&nack.serialize());
    }

    #[test]
    fn stop_before_start_is_a_harmless_no_op() {
        let (host, _) = make_host(vec![]);
        host.stop();
        host.stop();
    }
}
