use crate::certificate::{self, TrustStore};
use crate::crypto::SigningKey;
use crate::diagnostics::DebugSink;
use crate::error::{ConfigError, CredentialKind};
use crate::transport_params::{TransportParams, MIN_UDP_PAYLOAD_SIZE};
use crate::utils::MAX_VARINT;
use crate::PROTOCOL_VERSION;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// A server's certificate chain (leaf first, DER) and the matching key.
pub struct Credentials {
    pub chain: Vec<Vec<u8>>,
    pub key: SigningKey,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("chain_len", &self.chain.len())
            .field("scheme", &self.key.scheme())
            .finish()
    }
}

/// Settings shared read-only by every connection created from it.
pub struct Config {
    version: u32,
    application_protocols: Vec<Vec<u8>>,
    credentials: Option<Arc<Credentials>>,
    trust_store: Option<Arc<TrustStore>>,
    verify_peer: bool,
    max_idle_timeout: u64,
    max_send_udp_payload_size: usize,
    initial_max_data: u64,
    initial_max_stream_data_bidi_local: u64,
    initial_max_stream_data_bidi_remote: u64,
    initial_max_stream_data_uni: u64,
    initial_max_streams_bidi: u64,
    initial_max_streams_uni: u64,
    disable_active_migration: bool,
    debug_sink: Option<Arc<dyn DebugSink>>,
}

impl Config {
    pub fn builder(version: u32) -> ConfigBuilder {
        ConfigBuilder::new(version)
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn application_protocols(&self) -> &[Vec<u8>] {
        &self.application_protocols
    }

    pub fn credentials(&self) -> Option<&Arc<Credentials>> {
        self.credentials.as_ref()
    }

    pub fn trust_store(&self) -> Option<&Arc<TrustStore>> {
        self.trust_store.as_ref()
    }

    pub fn verify_peer(&self) -> bool {
        self.verify_peer
    }

    pub fn max_send_udp_payload_size(&self) -> usize {
        self.max_send_udp_payload_size
    }

    pub fn debug_sink(&self) -> Option<&Arc<dyn DebugSink>> {
        self.debug_sink.as_ref()
    }

    /// Our transport parameters, without any connection ids.
    pub fn transport_params(&self) -> TransportParams {
        TransportParams {
            max_idle_timeout: self.max_idle_timeout,
            initial_max_data: self.initial_max_data,
            initial_max_stream_data_bidi_local: self.initial_max_stream_data_bidi_local,
            initial_max_stream_data_bidi_remote: self.initial_max_stream_data_bidi_remote,
            initial_max_stream_data_uni: self.initial_max_stream_data_uni,
            initial_max_streams_bidi: self.initial_max_streams_bidi,
            initial_max_streams_uni: self.initial_max_streams_uni,
            disable_active_migration: self.disable_active_migration,
            ..Default::default()
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("version", &format_args!("{:#010x}", self.version))
            .field("application_protocols", &self.application_protocols.len())
            .field("credentials", &self.credentials)
            .field("verify_peer", &self.verify_peer)
            .field("max_send_udp_payload_size", &self.max_send_udp_payload_size)
            .field("debug_sink", &self.debug_sink.is_some())
            .finish()
    }
}

pub struct ConfigBuilder {
    version: u32,
    application_protocols: std::result::Result<Vec<Vec<u8>>, ConfigError>,
    cert_chain_path: Option<PathBuf>,
    private_key_path: Option<PathBuf>,
    trust_anchors_path: Option<PathBuf>,
    verify_peer: bool,
    max_idle_timeout: u64,
    max_send_udp_payload_size: usize,
    initial_max_data: u64,
    initial_max_stream_data_bidi_local: u64,
    initial_max_stream_data_bidi_remote: u64,
    initial_max_stream_data_uni: u64,
    initial_max_streams_bidi: u64,
    initial_max_streams_uni: u64,
    disable_active_migration: bool,
    debug_sink: Option<Arc<dyn DebugSink>>,
}

impl ConfigBuilder {
    pub fn new(version: u32) -> Self {
        Self {
            version,
            application_protocols: Ok(Vec::new()),
            cert_chain_path: None,
            private_key_path: None,
            trust_anchors_path: None,
            verify_peer: false,
            max_idle_timeout: 0,
            max_send_udp_payload_size: MIN_UDP_PAYLOAD_SIZE as usize,
            initial_max_data: 30,
            initial_max_stream_data_bidi_local: 15,
            initial_max_stream_data_bidi_remote: 15,
            initial_max_stream_data_uni: 10,
            initial_max_streams_bidi: 3,
            initial_max_streams_uni: 3,
            disable_active_migration: false,
            debug_sink: None,
        }
    }

    pub fn load_cert_chain_from_pem_file(mut self, path: impl AsRef<Path>) -> Self {
        self.cert_chain_path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn load_priv_key_from_pem_file(mut self, path: impl AsRef<Path>) -> Self {
        self.private_key_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Anchors used to validate the peer's chain when `verify_peer` is on.
    pub fn load_trust_anchors_from_pem_file(mut self, path: impl AsRef<Path>) -> Self {
        self.trust_anchors_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Sets protocols from the wire format, e.g. `b"\x06proto1\x06proto2"`.
    pub fn set_application_protos(mut self, wire: &[u8]) -> Self {
        self.application_protocols = parse_protocol_list(wire);
        self
    }

    pub fn set_application_protos_list(mut self, protocols: &[&[u8]]) -> Self {
        self.application_protocols = protocols
            .iter()
            .map(|p| match p.len() {
                0 => Err(ConfigError::InvalidProtocolList("empty protocol name".to_string())),
                1..=255 => Ok(p.to_vec()),
                n => Err(ConfigError::InvalidProtocolList(format!(
                    "protocol name of {} bytes exceeds 255",
                    n
                ))),
            })
            .collect();
        self
    }

    pub fn verify_peer(mut self, verify: bool) -> Self {
        self.verify_peer = verify;
        self
    }

    /// Milliseconds beyond the varint range are clamped to its maximum.
    pub fn set_max_idle_timeout(mut self, timeout: Duration) -> Self {
        self.max_idle_timeout = u64::try_from(timeout.as_millis())
            .unwrap_or(u64::MAX)
            .min(MAX_VARINT);
        self
    }

    /// Values below the 1200 byte minimum are raised to it.
    pub fn set_max_send_udp_payload_size(mut self, size: usize) -> Self {
        self.max_send_udp_payload_size = size.max(MIN_UDP_PAYLOAD_SIZE as usize);
        self
    }

    pub fn set_initial_max_data(mut self, v: u64) -> Self {
        self.initial_max_data = v;
        self
    }

    pub fn set_initial_max_stream_data_bidi_local(mut self, v: u64) -> Self {
        self.initial_max_stream_data_bidi_local = v;
        self
    }

    pub fn set_initial_max_stream_data_bidi_remote(mut self, v: u64) -> Self {
        self.initial_max_stream_data_bidi_remote = v;
        self
    }

    pub fn set_initial_max_stream_data_uni(mut self, v: u64) -> Self {
        self.initial_max_stream_data_uni = v;
        self
    }

    pub fn set_initial_max_streams_bidi(mut self, v: u64) -> Self {
        self.initial_max_streams_bidi = v;
        self
    }

    pub fn set_initial_max_streams_uni(mut self, v: u64) -> Self {
        self.initial_max_streams_uni = v;
        self
    }

    pub fn disable_active_migration(mut self, disable: bool) -> Self {
        self.disable_active_migration = disable;
        self
    }

    pub fn enable_debug_logging(mut self, sink: Arc<dyn DebugSink>) -> Self {
        self.debug_sink = Some(sink);
        self
    }

    pub fn build(self) -> std::result::Result<Config, ConfigError> {
        if self.version != PROTOCOL_VERSION {
            return Err(ConfigError::UnsupportedVersion(self.version));
        }

        let application_protocols = self.application_protocols?;

        let chain = self
            .cert_chain_path
            .as_deref()
            .map(|path| load(CredentialKind::CertificateChain, path, certificate::load_certificate_chain))
            .transpose()?;
        let key = self
            .private_key_path
            .as_deref()
            .map(|path| load(CredentialKind::PrivateKey, path, certificate::load_private_key))
            .transpose()?;

        let credentials = match (chain, key) {
            (Some(chain), Some(key)) => Some(Arc::new(Credentials { chain, key })),
            (None, None) => None,
            (Some(_), None) => {
                log::warn!("Certificate chain configured without a private key");
                None
            }
            (None, Some(_)) => {
                log::warn!("Private key configured without a certificate chain");
                None
            }
        };

        let trust_store = match &self.trust_anchors_path {
            Some(path) => {
                let anchors = load(CredentialKind::TrustAnchors, path, certificate::load_trust_anchors)?;
                let store = TrustStore::from_der_list(&anchors).map_err(|e| {
                    ConfigError::CredentialLoadFailed {
                        kind: CredentialKind::TrustAnchors,
                        path: path.clone(),
                        reason: e.to_string(),
                    }
                })?;
                Some(Arc::new(store))
            }
            None => None,
        };

        log::debug!(
            "Config built: {} application protocols, credentials {}",
            application_protocols.len(),
            if credentials.is_some() { "loaded" } else { "absent" }
        );

        Ok(Config {
            version: self.version,
            application_protocols,
            credentials,
            trust_store,
            verify_peer: self.verify_peer,
            max_idle_timeout: self.max_idle_timeout,
            max_send_udp_payload_size: self.max_send_udp_payload_size,
            initial_max_data: self.initial_max_data,
            initial_max_stream_data_bidi_local: self.initial_max_stream_data_bidi_local,
            initial_max_stream_data_bidi_remote: self.initial_max_stream_data_bidi_remote,
            initial_max_stream_data_uni: self.initial_max_stream_data_uni,
            initial_max_streams_bidi: self.initial_max_streams_bidi,
            initial_max_streams_uni: self.initial_max_streams_uni,
            disable_active_migration: self.disable_active_migration,
            debug_sink: self.debug_sink,
        })
    }
}

fn load<T>(
    kind: CredentialKind,
    path: &Path,
    loader: fn(&Path) -> crate::error::Result<T>,
) -> std::result::Result<T, ConfigError> {
    loader(path).map_err(|e| ConfigError::CredentialLoadFailed {
        kind,
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Splits a length-prefixed protocol list. Duplicates are allowed.
pub fn parse_protocol_list(wire: &[u8]) -> std::result::Result<Vec<Vec<u8>>, ConfigError> {
    let mut protocols = Vec::new();
    let mut pos = 0;

    while pos < wire.len() {
        let len = wire[pos] as usize;
        pos += 1;
        if len == 0 {
            return Err(ConfigError::InvalidProtocolList(format!(
                "empty protocol name at offset {}",
                pos - 1
            )));
        }
        let end = pos + len;
        if end > wire.len() {
            return Err(ConfigError::InvalidProtocolList(format!(
                "length prefix {} runs past the end of the list",
                len
            )));
        }
        protocols.push(wire[pos..end].to_vec());
        pos = end;
    }

    Ok(protocols)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_protocol_list() {
        assert_eq!(
            parse_protocol_list(b"\x06proto1\x06proto2").unwrap(),
            vec![b"proto1".to_vec(), b"proto2".to_vec()]
        );
        assert_eq!(
            parse_protocol_list(b"\x02h3\x02h3").unwrap(),
            vec![b"h3".to_vec(), b"h3".to_vec()]
        );
        assert!(parse_protocol_list(b"").unwrap().is_empty());
        assert!(parse_protocol_list(b"\x07proto1").is_err());
        assert!(parse_protocol_list(b"\x02h3\x00").is_err());
    }

    #[test]
    fn test_defaults() {
        let config = Config::builder(PROTOCOL_VERSION).build().unwrap();
        let params = config.transport_params();

        assert_eq!(params.initial_max_data, 30);
        assert_eq!(params.initial_max_stream_data_bidi_local, 15);
        assert_eq!(params.initial_max_stream_data_bidi_remote, 15);
        assert_eq!(params.initial_max_stream_data_uni, 10);
        assert_eq!(params.initial_max_streams_bidi, 3);
        assert_eq!(params.initial_max_streams_uni, 3);
        assert_eq!(params.max_idle_timeout, 0);
        assert!(!config.verify_peer());
        assert!(config.credentials().is_none());
        assert_eq!(config.max_send_udp_payload_size(), 1200);
    }

    #[test]
    fn test_payload_size_floor() {
        let config = Config::builder(PROTOCOL_VERSION)
            .set_max_send_udp_payload_size(500)
            .build()
            .unwrap();
        assert_eq!(config.max_send_udp_payload_size(), 1200);
    }

    #[test]
    fn test_idle_timeout_clamped() {
        let config = Config::builder(PROTOCOL_VERSION)
            .set_max_idle_timeout(Duration::MAX)
            .build()
            .unwrap();
        assert_eq!(config.transport_params().max_idle_timeout, MAX_VARINT);

        let config = Config::builder(PROTOCOL_VERSION)
            .set_max_idle_timeout(Duration::from_secs(5))
            .build()
            .unwrap();
        assert_eq!(config.transport_params().max_idle_timeout, 5000);
    }

    #[test]
    fn test_long_protocol_name() {
        let long = vec![b'a'; 256];
        let result = Config::builder(PROTOCOL_VERSION)
            .set_application_protos_list(&[b"ok", &long])
            .build();
        assert!(matches!(result, Err(ConfigError::InvalidProtocolList(_))));
    }

    #[test]
    fn test_config_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Config>();
    }
}
