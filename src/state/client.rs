use super::{expect_level, unexpected, ConnectionState, HandshakeAction, StateHandler};
use crate::alert::AlertDescription;
use crate::certificate::{parse_certificate, TrustStore, ValidationOptions};
use crate::crypto::{self, hkdf, HashAlgorithm, KeyPair, SignatureScheme, TranscriptHash};
use crate::error::{Error, Result};
use crate::handshake::extensions::alpn::ProtocolNameList;
use crate::handshake::extensions::supported_versions::SupportedVersions;
use crate::handshake::extensions::{key_share, server_name, signature_algorithms, ExtensionType};
use crate::handshake::{
    Certificate, CertificateVerify, CipherSuite, ClientHello, EncryptedExtensions, Finished,
    Handshake, HandshakeMessage, KeyShareEntry, NamedGroup, ServerHello, LEGACY_VERSION,
    TLS13_VERSION,
};
use crate::packet::EncryptionLevel;
use crate::transport_params::TransportParams;
use std::sync::Arc;
use zeroize::Zeroizing;

pub struct ClientParams {
    pub server_name: Option<String>,
    pub application_protocols: Vec<Vec<u8>>,
    pub transport_params: Vec<u8>,
    pub verify_peer: bool,
    pub trust_store: Option<Arc<TrustStore>>,
}

pub struct ClientState {
    state: ConnectionState,
    params: ClientParams,
    key_pair: KeyPair,
    transcript: TranscriptHash,
    selected_cipher_suite: Option<CipherSuite>,
    handshake_secret: Option<Zeroizing<Vec<u8>>>,
    client_handshake_secret: Option<Zeroizing<Vec<u8>>>,
    server_handshake_secret: Option<Zeroizing<Vec<u8>>>,
    server_public_key: Option<Vec<u8>>,
    application_protocol: Option<Vec<u8>>,
    peer_transport_params: Option<TransportParams>,
}

impl ClientState {
    pub fn new(params: ClientParams) -> Result<Self> {
        Ok(Self {
            state: ConnectionState::Start,
            params,
            key_pair: KeyPair::generate(NamedGroup::X25519)?,
            transcript: TranscriptHash::new(),
            selected_cipher_suite: None,
            handshake_secret: None,
            client_handshake_secret: None,
            server_handshake_secret: None,
            server_public_key: None,
            application_protocol: None,
            peer_transport_params: None,
        })
    }

    fn hash_algorithm(&self) -> HashAlgorithm {
        self.transcript.algorithm()
    }

    fn client_hello(&self) -> Result<ClientHello> {
        let mut extensions = Vec::new();

        if let Some(name) = &self.params.server_name {
            extensions.push(server_name::create_extension(name)?);
        }
        extensions.push(key_share::supported_groups_extension(&[NamedGroup::X25519])?);
        extensions.push(signature_algorithms::create_extension(&SignatureScheme::supported())?);
        extensions.push(key_share::client_extension(&[KeyShareEntry::new(
            NamedGroup::X25519,
            self.key_pair.public_key.clone(),
        )])?);
        extensions.push(SupportedVersions::new(vec![TLS13_VERSION]).create_extension()?);
        if !self.params.application_protocols.is_empty() {
            extensions.push(
                ProtocolNameList::new(self.params.application_protocols.clone()).create_extension()?,
            );
        }
        extensions.push(crate::handshake::Extension::new(
            ExtensionType::QuicTransportParameters,
            self.params.transport_params.clone(),
        ));

        Ok(ClientHello::new(
            LEGACY_VERSION,
            crypto::random_array::<32>()?,
            Vec::new(),
            CipherSuite::supported(),
            vec![0x00],
            extensions,
        ))
    }

    fn handle_server_hello(&mut self, server_hello: &ServerHello, raw: &[u8]) -> Result<Vec<HandshakeAction>> {
        if server_hello.is_hello_retry_request() {
            return Err(Error::handshake(
                AlertDescription::HandshakeFailure,
                "HelloRetryRequest is not supported",
            ));
        }

        let version_ext = server_hello
            .get_extension(ExtensionType::SupportedVersions)
            .ok_or_else(|| Error::handshake(AlertDescription::MissingExtension, "ServerHello lacks supported_versions"))?;
        let mut pos = 0;
        let version = SupportedVersions::parse_server(&version_ext.data, &mut pos)?;
        if version != TLS13_VERSION {
            return Err(Error::handshake(
                AlertDescription::ProtocolVersion,
                format!("Server selected version {:#06x}", version),
            ));
        }

        if !CipherSuite::supported().contains(&server_hello.cipher_suite) {
            return Err(Error::handshake(
                AlertDescription::IllegalParameter,
                "Server selected a cipher suite that was not offered",
            ));
        }

        let share_ext = server_hello
            .get_extension(ExtensionType::KeyShare)
            .ok_or_else(|| Error::handshake(AlertDescription::MissingExtension, "ServerHello lacks key_share"))?;
        let share = key_share::parse_server_extension(&share_ext.data)?;
        if share.group != NamedGroup::X25519 {
            return Err(Error::handshake(
                AlertDescription::IllegalParameter,
                format!("Server key share uses {:?}", share.group),
            ));
        }

        let shared_secret = self.key_pair.agree(&share.key_exchange)?;

        let suite = server_hello.cipher_suite;
        let hash = HashAlgorithm::for_cipher_suite(suite);
        self.transcript.set_algorithm(hash);
        self.transcript.add_raw(raw)?;
        self.selected_cipher_suite = Some(suite);

        let early_secret = hkdf::extract_early_secret(hash);
        let handshake_secret = hkdf::derive_handshake_secret(hash, &early_secret, &shared_secret)?;
        let secrets =
            hkdf::derive_traffic_secrets(hash, &handshake_secret, &self.transcript.current_hash())?;

        self.handshake_secret = Some(Zeroizing::new(handshake_secret));
        self.client_handshake_secret = Some(Zeroizing::new(secrets.client.clone()));
        self.server_handshake_secret = Some(Zeroizing::new(secrets.server.clone()));
        self.state = ConnectionState::WaitEncryptedExtensions;

        log::debug!("Client negotiated {:?}", suite);

        Ok(vec![HandshakeAction::InstallKeys {
            level: EncryptionLevel::Handshake,
            cipher_suite: suite,
            secrets,
        }])
    }

    fn handle_encrypted_extensions(&mut self, message: &EncryptedExtensions, raw: &[u8]) -> Result<()> {
        match message.get_extension(ExtensionType::ApplicationLayerProtocolNegotiation) {
            Some(ext) => {
                let selected = ProtocolNameList::parse(&ext.data)?;
                if selected.protocols.len() != 1
                    || !self.params.application_protocols.contains(&selected.protocols[0])
                {
                    return Err(Error::handshake(
                        AlertDescription::IllegalParameter,
                        "Server selected an application protocol that was not offered",
                    ));
                }
                self.application_protocol = Some(selected.protocols[0].clone());
            }
            None if !self.params.application_protocols.is_empty() => {
                return Err(Error::handshake(
                    AlertDescription::NoApplicationProtocol,
                    "Server did not select an application protocol",
                ));
            }
            None => {}
        }

        let params_ext = message
            .get_extension(ExtensionType::QuicTransportParameters)
            .ok_or_else(|| {
                Error::handshake(AlertDescription::MissingExtension, "Server sent no transport parameters")
            })?;
        self.peer_transport_params = Some(TransportParams::decode(&params_ext.data, true)?);

        self.transcript.add_raw(raw)?;
        self.state = ConnectionState::WaitCertificate;
        Ok(())
    }

    fn handle_certificate(&mut self, certificate: &Certificate, raw: &[u8]) -> Result<()> {
        if !certificate.cert_request_context.is_empty() {
            return Err(Error::handshake(
                AlertDescription::DecodeError,
                "Non-empty certificate_request_context",
            ));
        }

        let chain: Vec<Vec<u8>> = certificate
            .certificate_list
            .iter()
            .map(|entry| entry.cert_data.clone())
            .collect();
        let leaf = certificate
            .leaf()
            .ok_or_else(|| Error::handshake(AlertDescription::DecodeError, "Empty certificate chain"))?;

        if self.params.verify_peer {
            let options = ValidationOptions {
                server_name: self.params.server_name.clone(),
                ..Default::default()
            };
            let status = match &self.params.trust_store {
                Some(store) => store.validate_chain(&chain, &options)?,
                None => TrustStore::new().validate_chain(&chain, &options)?,
            };
            if let Some(alert) = status.alert() {
                return Err(Error::handshake(alert, format!("Peer certificate rejected: {:?}", status)));
            }
        }

        let parsed = parse_certificate(leaf)
            .map_err(|e| Error::handshake(AlertDescription::BadCertificate, e.to_string()))?;
        log::debug!("Server certificate subject: {}", parsed.subject);

        self.server_public_key = Some(parsed.public_key);
        self.transcript.add_raw(raw)?;
        self.state = ConnectionState::WaitCertificateVerify;
        Ok(())
    }

    fn handle_certificate_verify(&mut self, message: &CertificateVerify, raw: &[u8]) -> Result<()> {
        if !SignatureScheme::supported().contains(&message.algorithm) {
            return Err(Error::handshake(
                AlertDescription::IllegalParameter,
                format!("Server signed with unoffered scheme {:?}", message.algorithm),
            ));
        }

        let public_key = self
            .server_public_key
            .as_deref()
            .ok_or_else(|| Error::InvalidState("No server public key".to_string()))?;

        message
            .verify(&self.transcript.current_hash(), public_key)
            .map_err(|e| Error::handshake(AlertDescription::DecryptError, e.to_string()))?;

        self.transcript.add_raw(raw)?;
        self.state = ConnectionState::WaitFinished;
        Ok(())
    }

    fn handle_finished(&mut self, finished: &Finished, raw: &[u8]) -> Result<Vec<HandshakeAction>> {
        let hash = self.hash_algorithm();
        let suite = self
            .selected_cipher_suite
            .ok_or_else(|| Error::InvalidState("No cipher suite selected".to_string()))?;
        let (Some(handshake_secret), Some(client_secret), Some(server_secret)) = (
            self.handshake_secret.as_ref(),
            self.client_handshake_secret.as_ref(),
            self.server_handshake_secret.as_ref(),
        ) else {
            return Err(Error::InvalidState("Handshake secrets missing".to_string()));
        };

        hkdf::verify_finished(hash, server_secret, &self.transcript.current_hash(), &finished.verify_data)
            .map_err(|e| Error::handshake(AlertDescription::DecryptError, e.to_string()))?;
        self.transcript.add_raw(raw)?;

        let server_finished_hash = self.transcript.current_hash();
        let master_secret = Zeroizing::new(hkdf::derive_master_secret(hash, handshake_secret)?);
        let application_secrets =
            hkdf::derive_application_secrets(hash, &master_secret, &server_finished_hash)?;

        let verify_data = hkdf::finished_verify_data(hash, client_secret, &server_finished_hash)?;
        let client_finished = Finished::new(verify_data);
        self.transcript.update(&client_finished)?;

        self.handshake_secret = None;
        self.state = ConnectionState::Connected;

        Ok(vec![
            HandshakeAction::Send {
                level: EncryptionLevel::Handshake,
                data: client_finished.to_bytes()?,
            },
            HandshakeAction::InstallKeys {
                level: EncryptionLevel::OneRtt,
                cipher_suite: suite,
                secrets: application_secrets,
            },
            HandshakeAction::Complete,
        ])
    }
}

impl StateHandler for ClientState {
    fn start(&mut self) -> Result<Vec<HandshakeAction>> {
        if self.state != ConnectionState::Start {
            return Err(Error::InvalidState("Client handshake already started".to_string()));
        }

        let client_hello = self.client_hello()?;
        let data = client_hello.to_bytes()?;
        self.transcript.add_raw(&data)?;
        self.state = ConnectionState::WaitServerHello;

        Ok(vec![HandshakeAction::Send {
            level: EncryptionLevel::Initial,
            data,
        }])
    }

    fn process_message(
        &mut self,
        level: EncryptionLevel,
        message: Handshake,
        raw: &[u8],
    ) -> Result<Vec<HandshakeAction>> {
        match (self.state, &message) {
            (ConnectionState::WaitServerHello, Handshake::ServerHello(server_hello)) => {
                expect_level(EncryptionLevel::Initial, level, &message)?;
                self.handle_server_hello(server_hello, raw)
            }
            (ConnectionState::WaitEncryptedExtensions, Handshake::EncryptedExtensions(ee)) => {
                expect_level(EncryptionLevel::Handshake, level, &message)?;
                self.handle_encrypted_extensions(ee, raw)?;
                Ok(Vec::new())
            }
            (ConnectionState::WaitCertificate, Handshake::Certificate(certificate)) => {
                expect_level(EncryptionLevel::Handshake, level, &message)?;
                self.handle_certificate(certificate, raw)?;
                Ok(Vec::new())
            }
            (ConnectionState::WaitCertificateVerify, Handshake::CertificateVerify(cv)) => {
                expect_level(EncryptionLevel::Handshake, level, &message)?;
                self.handle_certificate_verify(cv, raw)?;
                Ok(Vec::new())
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
}
