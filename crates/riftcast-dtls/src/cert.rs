//! Ephemeral self-signed EC P-256 certificate generation: one key and
//! certificate per session, valid for 24 hours. Peer identity is
//! verified out-of-band via the SHA-256 fingerprint of the DER certificate,
//! not by a certificate authority — `handshake` disables CA verification
//! and checks the fingerprint manually after the handshake completes.

use std::fmt::Write as _;

use openssl::asn1::Asn1Time;
use openssl::bn::{BigNum, MsbOption};
use openssl::ec::{EcGroup, EcKey};
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::{PKey, Private};
use openssl::x509::{X509, X509NameBuilder};

use crate::errors::DtlsError;

/// A freshly generated identity: the EC keypair and its self-signed
/// certificate, valid for 24 hours from generation time.
pub struct SelfSignedIdentity {
    pub key: PKey<Private>,
    pub cert: X509,
}

impl SelfSignedIdentity {
    pub fn generate() -> Result<Self, DtlsError> {
        let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1)
            .map_err(|e| DtlsError::ContextSetup(e.to_string()))?;
        let ec_key = EcKey::generate(&group).map_err(|e| DtlsError::ContextSetup(e.to_string()))?;
        let key = PKey::from_ec_key(ec_key).map_err(|e| DtlsError::ContextSetup(e.to_string()))?;

        let mut builder = X509::builder().map_err(|e| DtlsError::ContextSetup(e.to_string()))?;
        builder.set_version(2).map_err(|e| DtlsError::ContextSetup(e.to_string()))?;

        let mut serial = BigNum::new().map_err(|e| DtlsError::ContextSetup(e.to_string()))?;
        serial
            .rand(64, MsbOption::MAYBE_ZERO, false)
            .map_err(|e| DtlsError::ContextSetup(e.to_string()))?;
        builder
            .set_serial_number(&serial.to_asn1_integer().map_err(|e| DtlsError::ContextSetup(e.to_string()))?)
            .map_err(|e| DtlsError::ContextSetup(e.to_string()))?;

        let mut name = X509NameBuilder::new().map_err(|e| DtlsError::ContextSetup(e.to_string()))?;
        name.append_entry_by_text("CN", "riftcast-session")
            .map_err(|e| DtlsError::ContextSetup(e.to_string()))?;
        let name = name.build();
        builder.set_subject_name(&name).map_err(|e| DtlsError::ContextSetup(e.to_string()))?;
        builder.set_issuer_name(&name).map_err(|e| DtlsError::ContextSetup(e.to_string()))?;

        let not_before = Asn1Time::days_from_now(0).map_err(|e| DtlsError::ContextSetup(e.to_string()))?;
        let not_after = Asn1Time::days_from_now(1).map_err(|e| DtlsError::ContextSetup(e.to_string()))?;
        builder.set_not_before(&not_before).map_err(|e| DtlsError::ContextSetup(e.to_string()))?;
        builder.set_not_after(&not_after).map_err(|e| DtlsError::ContextSetup(e.to_string()))?;

        builder.set_pubkey(&key).map_err(|e| DtlsError::ContextSetup(e.to_string()))?;
        builder
            .sign(&key, MessageDigest::sha256())
            .map_err(|e| DtlsError::ContextSetup(e.to_string()))?;
        let cert = builder.build();

        Ok(Self { key, cert })
    }

    /// Hex-colon-separated SHA-256 fingerprint of the DER certificate,
    /// matching the format exchanged out-of-band via signaling.
    pub fn fingerprint(&self) -> Result<String, DtlsError> {
        fingerprint_of(&self.cert)
    }
}

/// SHA-256 fingerprint of any DER-encoded certificate, formatted
/// hex-colon-separated (e.g. `AA:BB:CC:...`).
pub fn fingerprint_of(cert: &X509) -> Result<String, DtlsError> {
    let der = cert.to_der().map_err(|e| DtlsError::ContextSetup(e.to_string()))?;
    let digest = openssl::sha::sha256(&der);
    let mut out = String::with_capacity(digest.len() * 3);
    for (i, byte) in digest.iter().enumerate() {
        if i > 0 {
            out.push(':');
        }
        write!(out, "{byte:02X}").expect("writing into a String never fails");
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_a_valid_self_signed_identity() {
        let identity = SelfSignedIdentity::generate().expect("cert generation");
        let fp = identity.fingerprint().expect("fingerprint");
        assert_eq!(fp.len(), 32 * 2 + 31); // 32 bytes, hex pairs, colon-separated
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit() || c == ':'));
    }

    #[test]
    fn fingerprint_is_stable_for_the_same_certificate() {
        let identity = SelfSignedIdentity::generate().expect("cert generation");
        assert_eq!(identity.fingerprint().unwrap(), identity.fingerprint().unwrap());
    }
}
