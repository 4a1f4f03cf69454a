use serde::{Deserialize, Serialize};

use crate::types::{GamingMode, VideoCodec};

/// Session-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub session_id: String,
    pub codec: VideoCodec,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub bitrate_kbps: u32,
    pub min_bitrate_kbps: u32,
    pub max_bitrate_kbps: u32,
    pub gop_length: u32,
    pub gaming_mode: GamingMode,
    pub use_dtls: bool,
    pub peer_ip: String,
    pub peer_port: u16,
    /// Hex-colon-separated SHA-256 fingerprint of the peer's DER certificate,
    /// exchanged out-of-band via signaling.
    pub peer_fingerprint: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_id: String::new(),
            codec: VideoCodec::H264,
            width: 1920,
            height: 1080,
            fps: 60,
            bitrate_kbps: 8_000,
            min_bitrate_kbps: 1_000,
            max_bitrate_kbps: 40_000,
            gop_length: 120,
            gaming_mode: GamingMode::Balanced,
            use_dtls: true,
            peer_ip: String::new(),
            peer_port: 0,
            peer_fingerprint: String::new(),
        }
    }
}

impl SessionConfig {
    /// Validate the configuration, refused at `start` and never
    /// surfaced mid-session.
    pub fn validate(&self) -> Result<(), crate::errors::ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(crate::errors::ConfigError::InvalidResolution {
                    width: self.width,
                    height: self.height,
            });
        }
        if self.min_bitrate_kbps == 0 || self.min_bitrate_kbps > self.max_bitrate_kbps {
            return Err(crate::errors::ConfigError::InvalidBitrateBounds {
                    min: self.min_bitrate_kbps,
                    max: self.max_bitrate_kbps,
            });
        }
        if self.bitrate_kbps < self.min_bitrate_kbps || self.bitrate_kbps > self.max_bitrate_kbps {
            return Err(crate::errors::ConfigError::InvalidBitrateBounds {
                    min: self.min_bitrate_kbps,
                    max: self.max_bitrate_kbps,
            });
        }
        if self.use_dtls && self.peer_fingerprint.is_empty() {
            return Err(crate::errors::ConfigError::MissingFingerprint);
        }
        Ok(())
    }

    /// `target_depth_ms` implied by `gaming_mode` — advisory, the rate
    /// controller may override it within configured bounds.
    pub fn target_depth_ms(&self) -> u32 {
        self.gaming_mode.defaults().0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_defaults_for_missing_fields() {
        let json = r#"{"codec": "h264"}"#;
        let cfg: SessionConfig = serde_json::from_str(json).expect("valid partial config");
        assert_eq!(cfg.width, 1920);
        assert_eq!(cfg.gaming_mode, GamingMode::Balanced);
    }

    #[test]
    fn rejects_zero_resolution() {
        let mut cfg = SessionConfig::default();
        cfg.width = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_inverted_bitrate_bounds() {
        let mut cfg = SessionConfig::default();
        cfg.min_bitrate_kbps = 10_000;
        cfg.max_bitrate_kbps = 1_000;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn gaming_mode_defaults_are_stable() {
        assert_eq!(GamingMode::Competitive.defaults(), (1, 240));
        assert_eq!(GamingMode::Balanced.defaults(), (4, 120));
        assert_eq!(GamingMode::Cinematic.defaults(), (8, 60));
    }
}
