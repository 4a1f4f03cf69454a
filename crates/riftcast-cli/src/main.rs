//! riftcast-cli — a two-role demo binary wiring a `Session` (viewer) or a
//! `HostSession` (host) to stub backends over a pre-connected UDP socket.

mod backends;

use std::net::{SocketAddr, UdpSocket};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use riftcast_core::{SessionConfig, VideoCodec};
use riftcast_dtls::Role;
use riftcast_transport::{HostSession, Session};
use riftcast_wire::ClipboardDirection;
use tracing::info;
use tracing_subscriber::EnvFilter;

use backends::{NullAudioSink, NullRenderer, PassthroughDecoder, SyntheticEncoder};

#[derive(Parser)]
#[command(name = "riftcast-cli", about = "riftcast host/viewer demo session")]
struct Cli {
    #[command(subcommand)]
    role: RoleArgs,
}

#[derive(Subcommand)]
enum RoleArgs {
    /// Run the sending side of a session: captures (synthetic) frames and
    /// streams them to the viewer.
    Host(SessionArgs),
    /// Run the receiving side of a session: decodes and "renders" whatever
    /// the host streams.
    Viewer(SessionArgs),
}

#[derive(clap::Args)]
struct SessionArgs {
    /// Local address to bind the session's UDP socket to.
    #[arg(long, default_value = "0.0.0.0:0")]
    listen: SocketAddr,

    /// The peer's address; the socket is `connect`-ed to it.
    #[arg(long)]
    peer: SocketAddr,

    /// Disable DTLS (plaintext UDP), for local testing only.
    #[arg(long)]
    no_dtls: bool,

    /// Hex-colon-separated SHA-256 fingerprint of the peer's certificate,
    /// required whenever DTLS is enabled.
    #[arg(long, default_value = "")]
    peer_fingerprint: String,

    #[arg(long, default_value_t = 8_000)]
    bitrate_kbps: u32,

    #[arg(long, default_value_t = 60)]
    fps: u32,

    #[arg(long, value_enum, default_value = "h264")]
    codec: CodecArg,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum CodecArg {
    H264,
    H265,
    Av1,
}

impl From<CodecArg> for VideoCodec {
    fn from(value: CodecArg) -> Self {
        match value {
            CodecArg::H264 => VideoCodec::H264,
            CodecArg::H265 => VideoCodec::H265,
            CodecArg::Av1 => VideoCodec::Av1,
        }
    }
}

impl SessionArgs {
    fn into_config(self) -> SessionConfig {
        let mut config = SessionConfig { fps: self.fps, bitrate_kbps: self.bitrate_kbps, codec: self.codec.into(), ..SessionConfig::default() };
        config.use_dtls = !self.no_dtls;
        config.peer_fingerprint = self.peer_fingerprint;
        config.max_bitrate_kbps = config.max_bitrate_kbps.max(config.bitrate_kbps);
        config.min_bitrate_kbps = config.min_bitrate_kbps.min(config.bitrate_kbps);
        config
    }

    fn connect_socket(&self) -> Result<UdpSocket> {
        let socket = UdpSocket::bind(self.listen).with_context(|| format!("binding to {}", self.listen))?;
        socket.connect(self.peer).with_context(|| format!("connecting to peer {}", self.peer))?;
        Ok(socket)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .with_thread_ids(false)
        .init();

    info!("riftcast-cli v{}", env!("CARGO_PKG_VERSION"));

    let cli = Cli::parse();
    match cli.role {
        RoleArgs::Host(args) => run_host(args),
        RoleArgs::Viewer(args) => run_viewer(args),
    }
}

fn run_host(args: SessionArgs) -> Result<()> {
    let peer = args.peer;
    let socket = args.connect_socket()?;
    let config = args.into_config();
    info!(%peer, bitrate_kbps = config.bitrate_kbps, "starting host session");

    let encoder = Box::new(SyntheticEncoder::new(config.fps));
    let session = HostSession::new(Role::Server, config, socket, encoder)?;
    session.set_input_handler(|event| info!(?event, "input event received from viewer"));
    session.start()?;

    run_forever(|| {});
}

fn run_viewer(args: SessionArgs) -> Result<()> {
    let peer = args.peer;
    let socket = args.connect_socket()?;
    let config = args.into_config();
    info!(%peer, "starting viewer session");

    let decoder = Box::new(PassthroughDecoder::new());
    let renderer = Box::new(NullRenderer::new());
    let audio_sink = Box::new(NullAudioSink::new());
    let session = Session::new(Role::Client, config, socket, ClipboardDirection::ViewerToHost, decoder, renderer, audio_sink)?;
    session.start()?;

    run_forever(|| {
        let stats = session.get_stats();
        info!(
            state = %stats.state,
            bitrate_kbps = stats.bitrate_kbps,
            received = stats.packets_received,
            lost = stats.packets_lost,
            jitter_us = stats.avg_jitter_us,
            "session stats"
        );
    });
}

/// Ticks `on_tick` once a second for the life of the process. There is no
/// signal-handling crate in the dependency stack, so graceful shutdown on
/// Ctrl-C is out of scope for this demo binary — the OS reclaims the
/// process (and its daemon-style pipeline threads) on SIGINT/SIGTERM.
fn run_forever<F: FnMut()>(mut on_tick: F) -> ! {
    loop {
        std::thread::sleep(Duration::from_secs(1));
        on_tick();
    }
}
