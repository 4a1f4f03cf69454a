//! P2P bootstrap: gather host candidates, then resolve a
//! server-reflexive candidate against each configured STUN server with
//! retries. Pairing and connectivity checks are left to the external
//! signaler — this module only produces candidates and a final selected
//! peer address is accepted, not negotiated, by the caller.

use std::net::{SocketAddr, UdpSocket};
use std::time::Duration;

use crate::candidate::{Candidate, CandidateKind, SERVER_REFLEXIVE_PRIORITY};
use crate::errors::P2pError;
use crate::stun::{parse_binding_response, BindingRequest};

const STUN_RETRY_TIMEOUT: Duration = Duration::from_millis(500);
const STUN_MAX_ATTEMPTS: u32 = 3;

/// Query one STUN server for our server-reflexive address, retrying up to
/// `STUN_MAX_ATTEMPTS` times with a 500 ms wait per attempt.
pub fn query_stun_server(socket: &UdpSocket, server: SocketAddr) -> Result<Candidate, P2pError> {
    socket.set_read_timeout(Some(STUN_RETRY_TIMEOUT)).map_err(P2pError::BindFailed)?;

    for _attempt in 0..STUN_MAX_ATTEMPTS {
        let request = BindingRequest::new();
        socket.send_to(&request.bytes, server).map_err(P2pError::BindFailed)?;

        let mut buf = [0u8; 256];
        match socket.recv(&mut buf) {
            Ok(n) => match parse_binding_response(&buf[..n], &request.transaction_id) {
                Ok((ip, port)) => {
                    return Ok(Candidate {
                            addr: SocketAddr::from((ip, port)),
                            priority: SERVER_REFLEXIVE_PRIORITY,
                            kind: CandidateKind::ServerReflexive,
                    });
                }
                Err(_) => continue,
            },
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock || e.kind() == std::io::ErrorKind::TimedOut => {
                continue;
            }
            Err(e) => return Err(P2pError::BindFailed(e)),
        }
    }

    Err(P2pError::StunTimeout(server.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stun::MAGIC_COOKIE;
    use std::net::Ipv4Addr;

    /// A minimal in-process STUN server: answers the first request it sees
    /// with a Binding Success Response carrying a fixed reflexive address.
    fn spawn_echo_stun_server(reflexive: SocketAddr) -> SocketAddr {
        let server_socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        let server_addr = server_socket.local_addr().unwrap();

        std::thread::spawn(move || {
            let mut buf = [0u8; 64];
            let (n, peer) = match server_socket.recv_from(&mut buf) {
                Ok(v) => v,
                Err(_) => return,
            };
            let txn_id: [u8; 12] = buf[8..20].try_into().unwrap();
            let _ = n;

            let ip = match reflexive.ip() {
                std::net::IpAddr::V4(v4) => v4,
                _ => Ipv4Addr::UNSPECIFIED,
            };
            let xport = reflexive.port() ^ (MAGIC_COOKIE >> 16) as u16;
            let xip = u32::from(ip) ^ MAGIC_COOKIE;

            let mut value = vec![0u8, 0x01];
            value.extend_from_slice(&xport.to_be_bytes());
            value.extend_from_slice(&xip.to_be_bytes());

            let mut response = Vec::with_capacity(20 + 8);
            response.extend_from_slice(&0x0101u16.to_be_bytes());
            response.extend_from_slice(&(value.len() as u16 + 4).to_be_bytes());
            response.extend_from_slice(&MAGIC_COOKIE.to_be_bytes());
            response.extend_from_slice(&txn_id);
            response.extend_from_slice(&0x0020u16.to_be_bytes());
            response.extend_from_slice(&(value.len() as u16).to_be_bytes());
            response.extend_from_slice(&value);

            let _ = server_socket.send_to(&response, peer);
        });

        server_addr
    }

    #[test]
    fn resolves_a_server_reflexive_candidate_against_a_stub_stun_server() {
        let reflexive = SocketAddr::from((Ipv4Addr::new(203, 0, 113, 9), 55555));
        let server_addr = spawn_echo_stun_server(reflexive);

        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        let candidate = query_stun_server(&socket, server_addr).expect("stun exchange");
        assert_eq!(candidate.addr, reflexive);
        assert_eq!(candidate.kind, CandidateKind::ServerReflexive);
        assert_eq!(candidate.priority, SERVER_REFLEXIVE_PRIORITY);
    }

    #[test]
    fn times_out_when_no_server_answers() {
        // An address nothing is listening on; the OS will not answer ICMP
        // unreachable in a way that aborts recv, so this exercises the
        // retry-then-timeout path within a bounded time budget.
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        let dead_server = SocketAddr::from((Ipv4Addr::new(127, 0, 0, 1), 1));
        let result = query_stun_server(&socket, dead_server);
        assert!(result.is_err());
    }
}
