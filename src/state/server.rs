use super::{expect_level, unexpected, ConnectionState, HandshakeAction, StateHandler};
use crate::alert::AlertDescription;
use crate::config::Credentials;
use crate::crypto::{self, hkdf, HashAlgorithm, KeyPair, TranscriptHash};
use crate::error::{Error, Result};
use crate::handshake::extensions::alpn::ProtocolNameList;
use crate::handshake::extensions::supported_versions::SupportedVersions;
use crate::handshake::extensions::{key_share, signature_algorithms, Extension, ExtensionType};
use crate::handshake::{
    Certificate, CertificateVerify, CipherSuite, ClientHello, EncryptedExtensions, Finished,
    Handshake, HandshakeMessage, KeyShareEntry, NamedGroup, ServerHello, LEGACY_VERSION,
    TLS13_VERSION,
};
use crate::packet::EncryptionLevel;
use crate::transport_params::TransportParams;
use std::sync::Arc;
use zeroize::Zeroizing;

pub struct ServerParams {
    pub credentials: Arc<Credentials>,
    pub application_protocols: Vec<Vec<u8>>,
    /// Our parameters; the original destination id may be filled in later.
    pub transport_params: TransportParams,
}

pub struct ServerState {
    state: ConnectionState,
    params: ServerParams,
    transcript: TranscriptHash,
    selected_cipher_suite: Option<CipherSuite>,
    client_handshake_secret: Option<Zeroizing<Vec<u8>>>,
    application_protocol: Option<Vec<u8>>,
    peer_transport_params: Option<TransportParams>,
}

impl ServerState {
    pub fn new(params: ServerParams) -> Self {
        Self {
            state: ConnectionState::WaitClientHello,
            params,
            transcript: TranscriptHash::new(),
            selected_cipher_suite: None,
            client_handshake_secret: None,
            application_protocol: None,
            peer_transport_params: None,
        }
    }

    fn select_cipher_suite(client_hello: &ClientHello) -> Result<CipherSuite> {
        let supported = CipherSuite::supported();
        client_hello
            .cipher_suites
            .iter()
            .copied()
            .find(|suite| supported.contains(suite))
            .ok_or_else(|| Error::handshake(AlertDescription::HandshakeFailure, "No common cipher suite"))
    }

    fn check_client_hello(&mut self, client_hello: &ClientHello) -> Result<KeyShareEntry> {
        let versions = client_hello
            .get_extension(ExtensionType::SupportedVersions)
            .map(|ext| SupportedVersions::parse_client(&ext.data, &mut 0))
            .transpose()?;
        if !versions.map_or(false, |v| v.supports_tls13()) {
            return Err(Error::handshake(
                AlertDescription::ProtocolVersion,
                "Client does not offer TLS 1.3",
            ));
        }

        let shares_ext = client_hello
            .get_extension(ExtensionType::KeyShare)
            .ok_or_else(|| Error::handshake(AlertDescription::MissingExtension, "ClientHello lacks key_share"))?;
        let share = key_share::parse_client_extension(&shares_ext.data)?
            .into_iter()
            .find(|entry| entry.group == NamedGroup::X25519)
            .ok_or_else(|| Error::handshake(AlertDescription::HandshakeFailure, "No X25519 key share offered"))?;

        let offered = match client_hello.get_extension(ExtensionType::ApplicationLayerProtocolNegotiation) {
            Some(ext) => ProtocolNameList::parse(&ext.data)?,
            None => ProtocolNameList::new(Vec::new()),
        };
        let selected = ProtocolNameList::new(self.params.application_protocols.clone())
            .select(&offered)
            .map(|p| p.to_vec())
            .ok_or_else(|| {
                Error::handshake(AlertDescription::NoApplicationProtocol, "No common application protocol")
            })?;
        self.application_protocol = Some(selected);

        let params_ext = client_hello
            .get_extension(ExtensionType::QuicTransportParameters)
            .ok_or_else(|| {
                Error::handshake(AlertDescription::MissingExtension, "Client sent no transport parameters")
            })?;
        self.peer_transport_params = Some(TransportParams::decode(&params_ext.data, false)?);

        let our_scheme = self.params.credentials.key.scheme();
        let schemes = client_hello
            .get_extension(ExtensionType::SignatureAlgorithms)
            .map(|ext| signature_algorithms::parse(&ext.data))
            .transpose()?
            .unwrap_or_default();
        if !schemes.contains(&our_scheme) {
            return Err(Error::handshake(
                AlertDescription::HandshakeFailure,
                format!("Client does not accept {:?} signatures", our_scheme),
            ));
        }

        Ok(share)
    }

    fn handle_client_hello(&mut self, client_hello: &ClientHello, raw: &[u8]) -> Result<Vec<HandshakeAction>> {
        let suite = Self::select_cipher_suite(client_hello)?;
        let peer_share = self.check_client_hello(client_hello)?;

        let hash = HashAlgorithm::for_cipher_suite(suite);
        self.transcript.set_algorithm(hash);
        self.transcript.add_raw(raw)?;
        self.selected_cipher_suite = Some(suite);

        let mut key_pair = KeyPair::generate(NamedGroup::X25519)?;
        let shared_secret = key_pair.agree(&peer_share.key_exchange)?;

        let server_hello = ServerHello::new(
            LEGACY_VERSION,
            crypto::random_array::<32>()?,
            client_hello.legacy_session_id.clone(),
            suite,
            0,
            vec![
                SupportedVersions::create_server_extension(TLS13_VERSION),
                key_share::server_extension(&KeyShareEntry::new(
                    NamedGroup::X25519,
                    key_pair.public_key.clone(),
                ))?,
            ],
        );
        let server_hello_bytes = server_hello.to_bytes()?;
        self.transcript.add_raw(&server_hello_bytes)?;

        let early_secret = hkdf::extract_early_secret(hash);
        let handshake_secret =
            Zeroizing::new(hkdf::derive_handshake_secret(hash, &early_secret, &shared_secret)?);
        let handshake_secrets =
            hkdf::derive_traffic_secrets(hash, &handshake_secret, &self.transcript.current_hash())?;

        let flight = self.server_flight(hash, &handshake_secrets.server)?;

        let master_secret = Zeroizing::new(hkdf::derive_master_secret(hash, &handshake_secret)?);
        let application_secrets =
            hkdf::derive_application_secrets(hash, &master_secret, &self.transcript.current_hash())?;

        self.client_handshake_secret = Some(Zeroizing::new(handshake_secrets.client.clone()));
        self.state = ConnectionState::WaitFinished;

        log::debug!("Server negotiated {:?}", suite);

        Ok(vec![
            HandshakeAction::Send {
                level: EncryptionLevel::Initial,
                data: server_hello_bytes,
            },
            HandshakeAction::InstallKeys {
                level: EncryptionLevel::Handshake,
                cipher_suite: suite,
                secrets: handshake_secrets,
            },
            HandshakeAction::Send {
                level: EncryptionLevel::Handshake,
                data: flight,
            },
            HandshakeAction::InstallKeys {
                level: EncryptionLevel::OneRtt,
                cipher_suite: suite,
                secrets: application_secrets,
            },
        ])
    }

    /// EncryptedExtensions through Finished, appended to the transcript.
    fn server_flight(&mut self, hash: HashAlgorithm, server_secret: &[u8]) -> Result<Vec<u8>> {
        let mut extensions = Vec::new();
        if let Some(protocol) = &self.application_protocol {
            extensions.push(ProtocolNameList::new(vec![protocol.clone()]).create_extension()?);
        }
        extensions.push(Extension::new(
            ExtensionType::QuicTransportParameters,
            self.params.transport_params.encode(true)?,
        ));

        let mut flight = Vec::new();

        let encrypted_extensions = EncryptedExtensions::new(extensions).to_bytes()?;
        self.transcript.add_raw(&encrypted_extensions)?;
        flight.extend_from_slice(&encrypted_extensions);

        let certificate = Certificate::from_chain(&self.params.credentials.chain).to_bytes()?;
        self.transcript.add_raw(&certificate)?;
        flight.extend_from_slice(&certificate);

        let certificate_verify =
            CertificateVerify::sign(&self.params.credentials.key, &self.transcript.current_hash())?
                .to_bytes()?;
        self.transcript.add_raw(&certificate_verify)?;
        flight.extend_from_slice(&certificate_verify);

        let verify_data =
            hkdf::finished_verify_data(hash, server_secret, &self.transcript.current_hash())?;
        let finished = Finished::new(verify_data).to_bytes()?;
        self.transcript.add_raw(&finished)?;
        flight.extend_from_slice(&finished);

        Ok(flight)
    }

    fn handle_finished(&mut self, finished: &Finished, raw: &[u8]) -> Result<Vec<HandshakeAction>> {
        let client_secret = self
            .client_handshake_secret
            .as_ref()
            .ok_or_else(|| Error::InvalidState("Client handshake secret missing".to_string()))?;

        hkdf::verify_finished(
            self.transcript.algorithm(),
            client_secret,
            &self.transcript.current_hash(),
            &finished.verify_data,
        )
        .map_err(|e| Error::handshake(AlertDescription::DecryptError, e.to_string()))?;

        self.transcript.add_raw(raw)?;
        self.client_handshake_secret = None;
        self.state = ConnectionState::Connected;

        Ok(vec![HandshakeAction::Complete])
    }
}

impl StateHandler for ServerState {
    fn process_message(
        &mut self,
        level: EncryptionLevel,
        message: Handshake,
        raw: &[u8],
    ) -> Result<Vec<HandshakeAction>> {
        match (self.state, &message) {
            (ConnectionState::WaitClientHello, Handshake::ClientHello(client_hello)) => {
                expect_level(EncryptionLevel::Initial, level, &message)?;
                self.handle_client_hello(client_hello, raw)
            }
            (ConnectionState::WaitFinished, Handshake::Finished(finished)) => {
                expect_level(EncryptionLevel::Handshake, level, &message)?;
                self.handle_finished(finished, raw)
            }
            _ => Err(unexpected(&message, level)),
        }
    }

    fn get_state(&self) -> ConnectionState {
        self.state
    }

    fn get_selected_cipher_suite(&self) -> Option<CipherSuite> {
        self.selected_cipher_suite
    }

    fn application_protocol(&self) -> Option<&[u8]> {
        self.application_protocol.as_deref()
    }

    fn peer_transport_params(&self) -> Option<&TransportParams> {
        self.peer_transport_params.as_ref()
    }

    fn set_original_destination_connection_id(&mut self, odcid: &[u8]) {
        if self.params.transport_params.original_destination_connection_id.is_none() {
            self.params.transport_params.original_destination_connection_id = Some(odcid.to_vec());
        }
    }
}
