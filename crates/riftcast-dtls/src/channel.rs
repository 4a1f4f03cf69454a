//! DTLS channel — single-peer DTLS 1.2 session over a pre-connected
//! UDP socket. Cipher suite is pinned to `ECDHE-ECDSA-AES128-GCM-SHA256`
//! with an ephemeral P-256 key generated per session. CA verification
//! is disabled; peer identity is instead checked against a fingerprint
//! exchanged out-of-band via signaling.

use std::io::{self, Read, Write};
use std::net::UdpSocket;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use openssl::ssl::{Ssl, SslContext, SslMethod, SslStream, SslVerifyMode};

use crate::cert::{fingerprint_of, SelfSignedIdentity};
use crate::errors::DtlsError;

const HANDSHAKE_DEADLINE: Duration = Duration::from_secs(5);
const POLL_INTERVAL: Duration = Duration::from_millis(100);
const MTU_HINT: u32 = 1400;
const CIPHER_SUITE: &str = "ECDHE-ECDSA-AES128-GCM-SHA256";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Client,
    Server,
}

/// Adapts a connected `UdpSocket` to `Read`/`Write` so it can back an
/// `SslStream`. The socket is already `connect`-ed to the single peer
/// this session talks to, so `send`/`recv` (not `send_to`/`recv_from`) are
/// the right primitives.
struct ConnectedUdp {
    socket: UdpSocket,
}

impl Read for ConnectedUdp {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.socket.recv(buf)
    }
}

impl Write for ConnectedUdp {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.socket.send(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn build_context() -> Result<SslContext, DtlsError> {
    let mut builder = openssl::ssl::SslContextBuilder::new(SslMethod::dtls())
        .map_err(|e| DtlsError::ContextSetup(e.to_string()))?;
    builder
        .set_cipher_list(CIPHER_SUITE)
        .map_err(|e| DtlsError::ContextSetup(e.to_string()))?;
    // Peer identity is verified out-of-band via fingerprint, not CA
    // chains — disable OpenSSL's own verification.
    builder.set_verify(SslVerifyMode::NONE);
    Ok(builder.build())
}

/// A single-peer DTLS 1.2 session. Thread-safe: `encrypt`/`decrypt` take an
/// internal mutex, matching "no shared resource held across a DTLS
/// encrypt/decrypt call" discipline (the mutex is held only for the
/// duration of one OpenSSL call, never across a socket send elsewhere).
pub struct DtlsChannel {
    stream: Mutex<SslStream<ConnectedUdp>>,
}

impl DtlsChannel {
    /// Perform the one-shot DTLS 1.2 handshake, here: a 5-second
    /// deadline, retried in ~100 ms slices (the socket's read timeout).
    /// `peer_fingerprint` is the hex-colon-separated SHA-256 fingerprint
    /// exchanged via signaling; the handshake fails if the peer's actual
    /// certificate doesn't match it.
    pub fn handshake(
        role: Role,
        socket: UdpSocket,
        identity: &SelfSignedIdentity,
        peer_fingerprint: &str,
    ) -> Result<Self, DtlsError> {
        socket.set_read_timeout(Some(POLL_INTERVAL))?;
        socket.set_nonblocking(false)?;

        let ctx = build_context()?;
        let mut ssl = Ssl::new(&ctx).map_err(|e| DtlsError::ContextSetup(e.to_string()))?;
        ssl.set_private_key(&identity.key).map_err(|e| DtlsError::ContextSetup(e.to_string()))?;
        ssl.set_certificate(&identity.cert).map_err(|e| DtlsError::ContextSetup(e.to_string()))?;
        let _ = ssl.set_mtu(MTU_HINT);

        let adapter = ConnectedUdp { socket };
        let deadline = Instant::now() + HANDSHAKE_DEADLINE;

        let mut mid = match role {
            Role::Client => match ssl.connect(adapter) {
                Ok(stream) => return Self::finish(stream, peer_fingerprint),
                Err(openssl::ssl::HandshakeError::WouldBlock(mid)) => mid,
                Err(e) => return Err(DtlsError::HandshakeFailed(e.to_string())),
            },
            Role::Server => match ssl.accept(adapter) {
                Ok(stream) => return Self::finish(stream, peer_fingerprint),
                Err(openssl::ssl::HandshakeError::WouldBlock(mid)) => mid,
                Err(e) => return Err(DtlsError::HandshakeFailed(e.to_string())),
            },
        };

        loop {
            if Instant::now() >= deadline {
                return Err(DtlsError::HandshakeTimeout);
            }
            match mid.handshake() {
                Ok(stream) => return Self::finish(stream, peer_fingerprint),
                Err(openssl::ssl::HandshakeError::WouldBlock(next)) => {
                    mid = next;
                }
                Err(e) => return Err(DtlsError::HandshakeFailed(e.to_string())),
            }
        }
    }

    fn finish(stream: SslStream<ConnectedUdp>, peer_fingerprint: &str) -> Result<Self, DtlsError> {
        let peer_cert = stream.ssl().peer_certificate().ok_or(DtlsError::NoPeerCertificate)?;
        let actual = fingerprint_of(&peer_cert)?;
        if !actual.eq_ignore_ascii_case(peer_fingerprint) {
            return Err(DtlsError::FingerprintMismatch { expected: peer_fingerprint.to_string(), got: actual });
        }
        Ok(Self { stream: Mutex::new(stream) })
    }

    /// Encrypt and transmit `plaintext` as one or more DTLS application-data
    /// records over the underlying socket. Returns the number of plaintext
    /// bytes consumed (DTLS ties record transmission directly to the
    /// transport, so there is no separate "ciphertext buffer" to hand back —
    /// the datagram has already left the socket when this returns `Ok`).
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<usize, DtlsError> {
        let mut stream = self.stream.lock().expect("dtls stream mutex poisoned");
        stream.write_all(plaintext).map_err(|e| DtlsError::DecryptFailed(e.to_string()))?;
        Ok(plaintext.len())
    }

    /// Read one decrypted application-data record into `buf`. May
    /// legitimately return `Ok(0)` when the datagram consumed was a
    /// handshake or alert record rather than application data —
    /// callers should not treat a zero-length read as an error.
    pub fn decrypt(&self, buf: &mut [u8]) -> Result<usize, DtlsError> {
        let mut stream = self.stream.lock().expect("dtls stream mutex poisoned");
        match stream.read(buf) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock || e.kind() == io::ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(DtlsError::DecryptFailed(e.to_string())),
        }
    }

    /// Tear down the DTLS session. Fatal: the coordinator re-enters
    /// `Connecting` and redrives P2P rather than retrying in place.
    pub fn shutdown(&self) {
        let mut stream = self.stream.lock().expect("dtls stream mutex poisoned");
        let _ = stream.shutdown();
    }
}
