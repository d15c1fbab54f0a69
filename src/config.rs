//! Server configuration and SSH algorithm preferences.
//!
//! The emulated devices are dialed by automation tooling of very mixed
//! vintage, so the server advertises a broad algorithm set, including
//! legacy key exchanges and CBC ciphers that modern defaults would
//! exclude.

use std::borrow::Cow;
use std::path::PathBuf;

use russh::keys::{Algorithm, EcdsaCurve, HashAlg};
use russh::{Preferred, cipher, compression, kex, mac};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::ServerError;
use crate::plugins::PluginId;

/// Key exchange algorithms offered by the server, in order of preference.
///
/// Includes modern algorithms like Curve25519 as well as legacy
/// Diffie-Hellman variants for compatibility with older automation stacks.
pub const SERVER_KEX_ORDER: &[kex::Name] = &[
    kex::CURVE25519,
    kex::CURVE25519_PRE_RFC_8731,
    kex::DH_GEX_SHA256,
    kex::DH_GEX_SHA1,
    kex::DH_G14_SHA256,
    kex::DH_G14_SHA1,
    kex::DH_G1_SHA1,
    kex::DH_G15_SHA512,
    kex::DH_G16_SHA512,
    kex::ECDH_SHA2_NISTP256,
    kex::ECDH_SHA2_NISTP384,
    kex::ECDH_SHA2_NISTP521,
];

/// Cipher algorithms offered by the server.
///
/// Includes AES-GCM and ChaCha20-Poly1305 alongside legacy CTR and CBC
/// modes.
pub static SERVER_CIPHERS: &[cipher::Name] = &[
    cipher::CHACHA20_POLY1305,
    cipher::AES_256_GCM,
    cipher::AES_256_CTR,
    cipher::AES_192_CTR,
    cipher::AES_128_CTR,
    cipher::AES_256_CBC,
    cipher::AES_192_CBC,
    cipher::AES_128_CBC,
];

/// MAC algorithms offered by the server, ETM variants first.
pub const SERVER_MAC_ALGORITHMS: &[mac::Name] = &[
    mac::HMAC_SHA256_ETM,
    mac::HMAC_SHA512_ETM,
    mac::HMAC_SHA1_ETM,
    mac::HMAC_SHA256,
    mac::HMAC_SHA512,
    mac::HMAC_SHA1,
];

/// Compression algorithms offered by the server.
pub const SERVER_COMPRESSION_ALGORITHMS: &[compression::Name] = &[
    compression::NONE,
    compression::ZLIB,
    compression::ZLIB_LEGACY,
];

/// Host key algorithms the server may present.
pub const SERVER_KEY_TYPES: &[Algorithm] = &[
    Algorithm::Ed25519,
    Algorithm::Ecdsa {
        curve: EcdsaCurve::NistP256,
    },
    Algorithm::Ecdsa {
        curve: EcdsaCurve::NistP384,
    },
    Algorithm::Ecdsa {
        curve: EcdsaCurve::NistP521,
    },
    Algorithm::Rsa {
        hash: Some(HashAlg::Sha512),
    },
    Algorithm::Rsa {
        hash: Some(HashAlg::Sha256),
    },
    Algorithm::Rsa { hash: None },
    Algorithm::Dsa,
];

/// Builds the server-side algorithm preference table.
pub fn server_preferred() -> Preferred {
    Preferred {
        kex: Cow::Borrowed(SERVER_KEX_ORDER),
        key: Cow::Borrowed(SERVER_KEY_TYPES),
        cipher: Cow::Borrowed(SERVER_CIPHERS),
        mac: Cow::Borrowed(SERVER_MAC_ALGORITHMS),
        compression: Cow::Borrowed(SERVER_COMPRESSION_ALGORITHMS),
    }
}

/// Process-wide emulator configuration.
///
/// Validated once at startup and read-only afterwards; every session
/// shares the same instance.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ServerConfig {
    /// Path to the server-side SSH host key.
    pub host_key_path: PathBuf,

    /// First listening port; listener `i` binds `base_port + i`.
    pub base_port: u16,

    /// Number of listeners to spawn.
    pub server_count: u16,

    /// Root of the device/commands content tree (one directory per
    /// emulated hostname).
    pub directory: PathBuf,

    /// Required username, or `None` to accept any.
    pub username: Option<String>,

    /// Required password, or `None` to accept any.
    pub password: Option<String>,

    /// Enabled plugins, in registration order.
    pub plugins: Vec<PluginId>,
}

impl ServerConfig {
    /// Checks the configuration for startup-fatal inconsistencies.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::InvalidConfig`] when the listener count is
    /// zero or the port range overflows.
    pub fn validate(&self) -> Result<(), ServerError> {
        if self.server_count == 0 {
            return Err(ServerError::InvalidConfig(
                "server count must be at least 1".to_string(),
            ));
        }
        if self
            .base_port
            .checked_add(self.server_count - 1)
            .is_none()
        {
            return Err(ServerError::InvalidConfig(format!(
                "port range {}..{} exceeds the valid port space",
                self.base_port,
                u32::from(self.base_port) + u32::from(self.server_count) - 1
            )));
        }
        Ok(())
    }

    /// Iterates the ports this configuration listens on.
    pub fn ports(&self) -> impl Iterator<Item = u16> + '_ {
        (0..self.server_count).map(move |i| self.base_port + i)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> ServerConfig {
        ServerConfig {
            host_key_path: PathBuf::from("/tmp/host_key"),
            base_port: 2200,
            server_count: 3,
            directory: PathBuf::from("./configs"),
            username: None,
            password: None,
            plugins: vec![PluginId::Help, PluginId::Navigation],
        }
    }

    #[test]
    fn valid_config_passes_validation() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn zero_listener_count_is_rejected() {
        let mut config = base_config();
        config.server_count = 0;
        let err = match config.validate() {
            Ok(()) => panic!("zero listeners should fail validation"),
            Err(err) => err,
        };
        assert!(matches!(err, ServerError::InvalidConfig(_)));
    }

    #[test]
    fn overflowing_port_range_is_rejected() {
        let mut config = base_config();
        config.base_port = u16::MAX - 1;
        config.server_count = 5;
        assert!(matches!(
            config.validate(),
            Err(ServerError::InvalidConfig(_))
        ));
    }

    #[test]
    fn ports_enumerates_the_listener_range() {
        let config = base_config();
        let ports: Vec<u16> = config.ports().collect();
        assert_eq!(ports, vec![2200, 2201, 2202]);
    }

    #[test]
    fn server_preference_table_excludes_null_algorithms() {
        let preferred = server_preferred();
        assert!(preferred.kex.iter().all(|alg| *alg != kex::NONE));
        assert!(preferred.cipher.iter().all(|alg| *alg != cipher::NONE));
        assert!(preferred.cipher.iter().all(|alg| *alg != cipher::CLEAR));
        assert!(preferred.mac.iter().all(|alg| *alg != mac::NONE));
    }
}
