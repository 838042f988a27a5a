// HKDF and the TLS 1.3 / QUIC key schedule
use crate::error::{Error, Result};
use crate::handshake::CipherSuite;
use ring::{digest, hmac};
use zeroize::{Zeroize, ZeroizeOnDrop};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    Sha256,
    Sha384,
}

impl HashAlgorithm {
    pub fn output_size(&self) -> usize {
        match self {
            HashAlgorithm::Sha256 => 32,
            HashAlgorithm::Sha384 => 48,
        }
    }

    pub fn for_cipher_suite(cipher_suite: CipherSuite) -> Self {
        match cipher_suite {
            CipherSuite::TlsAes128GcmSha256 => HashAlgorithm::Sha256,
            CipherSuite::TlsAes256GcmSha384 => HashAlgorithm::Sha384,
            CipherSuite::TlsChacha20Poly1305Sha256 => HashAlgorithm::Sha256,
        }
    }

    fn hmac_algorithm(&self) -> hmac::Algorithm {
        match self {
            HashAlgorithm::Sha256 => hmac::HMAC_SHA256,
            HashAlgorithm::Sha384 => hmac::HMAC_SHA384,
        }
    }

    pub fn digest_algorithm(&self) -> &'static digest::Algorithm {
        match self {
            HashAlgorithm::Sha256 => &digest::SHA256,
            HashAlgorithm::Sha384 => &digest::SHA384,
        }
    }

    pub fn empty_hash(&self) -> Vec<u8> {
        digest::digest(self.digest_algorithm(), &[]).as_ref().to_vec()
    }
}

// RFC 9001 section 5.2
const QUIC_V1_INITIAL_SALT: [u8; 20] = [
    0x38, 0x76, 0x2c, 0xf7, 0xf5, 0x59, 0x34, 0xb3, 0x4d, 0x17, 0x9a, 0xe6, 0xa4, 0xc8, 0x0c, 0xad,
    0xcc, 0xbb, 0x7f, 0x0a,
];

const LABEL_DERIVED: &[u8] = b"derived";
const LABEL_C_HS_TRAFFIC: &[u8] = b"c hs traffic";
const LABEL_S_HS_TRAFFIC: &[u8] = b"s hs traffic";
const LABEL_C_AP_TRAFFIC: &[u8] = b"c ap traffic";
const LABEL_S_AP_TRAFFIC: &[u8] = b"s ap traffic";
const LABEL_FINISHED: &[u8] = b"finished";
const LABEL_CLIENT_IN: &[u8] = b"client in";
const LABEL_SERVER_IN: &[u8] = b"server in";
const LABEL_QUIC_KEY: &[u8] = b"quic key";
const LABEL_QUIC_IV: &[u8] = b"quic iv";

/// A pair of directional secrets, wiped on drop.
#[derive(Debug, Clone, Zeroize, ZeroizeOnDrop)]
pub struct TrafficSecrets {
    pub client: Vec<u8>,
    pub server: Vec<u8>,
}

pub fn extract(hash_algorithm: HashAlgorithm, salt: Option<&[u8]>, ikm: &[u8]) -> Vec<u8> {
    // RFC 5869: an absent salt is a string of HashLen zeros
    let zero_salt = vec![0u8; hash_algorithm.output_size()];
    let key = hmac::Key::new(hash_algorithm.hmac_algorithm(), salt.unwrap_or(&zero_salt));
    hmac::sign(&key, ikm).as_ref().to_vec()
}

pub fn expand(
    hash_algorithm: HashAlgorithm,
    prk: &[u8],
    info: &[u8],
    output_len: usize,
) -> Result<Vec<u8>> {
    let key = hmac::Key::new(hash_algorithm.hmac_algorithm(), prk);
    let hash_len = hash_algorithm.output_size();
    let n = output_len.div_ceil(hash_len);

    if n > 255 {
        return Err(Error::CryptoError("HKDF output length too large".to_string()));
    }

    let mut output = Vec::with_capacity(n * hash_len);
    let mut t: Vec<u8> = Vec::new();

    for i in 1..=n {
        let mut context = hmac::Context::with_key(&key);
        context.update(&t);
        context.update(info);
        context.update(&[i as u8]);
        t = context.sign().as_ref().to_vec();
        output.extend_from_slice(&t);
    }

    output.truncate(output_len);
    Ok(output)
}

pub struct HkdfLabel<'a> {
    pub length: u16,
    pub label: &'a [u8],
    pub context: &'a [u8],
}

impl<'a> HkdfLabel<'a> {
    pub fn new(length: u16, label: &'a [u8], context: &'a [u8]) -> Self {
        Self { length, label, context }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let tls13_label = [b"tls13 ", self.label].concat();
        if tls13_label.len() > 255 || self.context.len() > 255 {
            return Err(Error::CryptoError("HKDF label too long".to_string()));
        }

        let mut result = Vec::with_capacity(4 + tls13_label.len() + self.context.len());
        result.extend_from_slice(&self.length.to_be_bytes());
        result.push(tls13_label.len() as u8);
        result.extend_from_slice(&tls13_label);
        result.push(self.context.len() as u8);
        result.extend_from_slice(self.context);
        Ok(result)
    }
}

pub fn expand_label(
    hash_algorithm: HashAlgorithm,
    secret: &[u8],
    label: &[u8],
    context: &[u8],
    length: usize,
) -> Result<Vec<u8>> {
    let info = HkdfLabel::new(length as u16, label, context).encode()?;
    expand(hash_algorithm, secret, &info, length)
}

pub fn derive_secret(
    hash_algorithm: HashAlgorithm,
    secret: &[u8],
    label: &[u8],
    transcript_hash: &[u8],
) -> Result<Vec<u8>> {
    expand_label(
        hash_algorithm,
        secret,
        label,
        transcript_hash,
        hash_algorithm.output_size(),
    )
}

pub fn extract_early_secret(hash_algorithm: HashAlgorithm) -> Vec<u8> {
    let zero_psk = vec![0u8; hash_algorithm.output_size()];
    extract(hash_algorithm, None, &zero_psk)
}

pub fn derive_handshake_secret(
    hash_algorithm: HashAlgorithm,
    early_secret: &[u8],
    shared_key: &[u8],
) -> Result<Vec<u8>> {
    let derived = derive_secret(
        hash_algorithm,
        early_secret,
        LABEL_DERIVED,
        &hash_algorithm.empty_hash(),
    )?;
    Ok(extract(hash_algorithm, Some(&derived), shared_key))
}

pub fn derive_traffic_secrets(
    hash_algorithm: HashAlgorithm,
    handshake_secret: &[u8],
    transcript_hash: &[u8],
) -> Result<TrafficSecrets> {
    Ok(TrafficSecrets {
        client: derive_secret(hash_algorithm, handshake_secret, LABEL_C_HS_TRAFFIC, transcript_hash)?,
        server: derive_secret(hash_algorithm, handshake_secret, LABEL_S_HS_TRAFFIC, transcript_hash)?,
    })
}

pub fn derive_master_secret(hash_algorithm: HashAlgorithm, handshake_secret: &[u8]) -> Result<Vec<u8>> {
    let derived = derive_secret(
        hash_algorithm,
        handshake_secret,
        LABEL_DERIVED,
        &hash_algorithm.empty_hash(),
    )?;
    let zeroed_key = vec![0u8; hash_algorithm.output_size()];
    Ok(extract(hash_algorithm, Some(&derived), &zeroed_key))
}

pub fn derive_application_secrets(
    hash_algorithm: HashAlgorithm,
    master_secret: &[u8],
    transcript_hash: &[u8],
) -> Result<TrafficSecrets> {
    Ok(TrafficSecrets {
        client: derive_secret(hash_algorithm, master_secret, LABEL_C_AP_TRAFFIC, transcript_hash)?,
        server: derive_secret(hash_algorithm, master_secret, LABEL_S_AP_TRAFFIC, transcript_hash)?,
    })
}

/// Computes Finished verify_data for the given base traffic secret.
pub fn finished_verify_data(
    hash_algorithm: HashAlgorithm,
    base_secret: &[u8],
    transcript_hash: &[u8],
) -> Result<Vec<u8>> {
    let finished_key = expand_label(
        hash_algorithm,
        base_secret,
        LABEL_FINISHED,
        &[],
        hash_algorithm.output_size(),
    )?;
    let key = hmac::Key::new(hash_algorithm.hmac_algorithm(), &finished_key);
    Ok(hmac::sign(&key, transcript_hash).as_ref().to_vec())
}

/// Checks a peer's Finished verify_data in constant time.
pub fn verify_finished(
    hash_algorithm: HashAlgorithm,
    base_secret: &[u8],
    transcript_hash: &[u8],
    verify_data: &[u8],
) -> Result<()> {
    let finished_key = expand_label(
        hash_algorithm,
        base_secret,
        LABEL_FINISHED,
        &[],
        hash_algorithm.output_size(),
    )?;
    let key = hmac::Key::new(hash_algorithm.hmac_algorithm(), &finished_key);
    hmac::verify(&key, transcript_hash, verify_data)
        .map_err(|_| Error::CryptoError("Finished verify_data mismatch".to_string()))
}

/// Initial secrets are keyed by the client's first destination connection id.
pub fn initial_secrets(client_dcid: &[u8]) -> Result<TrafficSecrets> {
    let hash = HashAlgorithm::Sha256;
    let initial_secret = extract(hash, Some(&QUIC_V1_INITIAL_SALT), client_dcid);

    Ok(TrafficSecrets {
        client: expand_label(hash, &initial_secret, LABEL_CLIENT_IN, &[], hash.output_size())?,
        server: expand_label(hash, &initial_secret, LABEL_SERVER_IN, &[], hash.output_size())?,
    })
}

pub fn derive_packet_key_material(
    hash_algorithm: HashAlgorithm,
    traffic_secret: &[u8],
    key_size: usize,
    iv_size: usize,
) -> Result<(Vec<u8>, Vec<u8>)> {
    let key = expand_label(hash_algorithm, traffic_secret, LABEL_QUIC_KEY, &[], key_size)?;
    let iv = expand_label(hash_algorithm, traffic_secret, LABEL_QUIC_IV, &[], iv_size)?;
    Ok((key, iv))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hkdf_label_encoding() {
        let encoded = HkdfLabel::new(32, b"key", b"context").encode().unwrap();

        assert_eq!(encoded[0], 0);  // Length high byte
        assert_eq!(encoded[1], 32); // Length low byte
        assert_eq!(encoded[2], 9);  // "tls13 key"
        assert_eq!(&encoded[3..12], b"tls13 key");
        assert_eq!(encoded[12], 7);
        assert_eq!(&encoded[13..20], b"context");
    }

    #[test]
    fn test_rfc9001_initial_keys() {
        // RFC 9001 appendix A.1
        let dcid = hex::decode("8394c8f03e515708").unwrap();
        let secrets = initial_secrets(&dcid).unwrap();

        assert_eq!(
            hex::encode(&secrets.client),
            "c00cf151ca5be075ed0ebfb5c80323c42d6b7db67881289af4008f1f6c357aea"
        );
        assert_eq!(
            hex::encode(&secrets.server),
            "3c199828fd139efd216c155ad844cc81fb82fa8d7446fa7d78be803acdda951b"
        );

        let (key, iv) =
            derive_packet_key_material(HashAlgorithm::Sha256, &secrets.client, 16, 12).unwrap();
        assert_eq!(hex::encode(key), "1f369613dd76d5467730efcbe3b1a22d");
        assert_eq!(hex::encode(iv), "fa044b2f42a3fd3b46fb255c");

        let (key, iv) =
            derive_packet_key_material(HashAlgorithm::Sha256, &secrets.server, 16, 12).unwrap();
        assert_eq!(hex::encode(key), "cf3a5331653c364c88f0f379b6067e37");
        assert_eq!(hex::encode(iv), "0ac1493ca1905853b0bba03e");
    }

    #[test]
    fn test_derive_secrets() {
        let early_secret = extract_early_secret(HashAlgorithm::Sha256);
        assert_eq!(early_secret.len(), 32);

        let handshake_secret =
            derive_handshake_secret(HashAlgorithm::Sha256, &early_secret, &[0u8; 32]).unwrap();
        let transcript_hash = HashAlgorithm::Sha256.empty_hash();
        let hs = derive_traffic_secrets(HashAlgorithm::Sha256, &handshake_secret, &transcript_hash)
            .unwrap();
        assert_ne!(hs.client, hs.server);

        let master = derive_master_secret(HashAlgorithm::Sha384, &[0u8; 48]).unwrap();
        let app = derive_application_secrets(HashAlgorithm::Sha384, &master, &[0u8; 48]).unwrap();
        assert_eq!(app.client.len(), 48);
        assert_eq!(app.server.len(), 48);
    }

    #[test]
    fn test_finished_depends_on_transcript() {
        let secret = [7u8; 32];
        let a = finished_verify_data(HashAlgorithm::Sha256, &secret, &[1u8; 32]).unwrap();
        let b = finished_verify_data(HashAlgorithm::Sha256, &secret, &[2u8; 32]).unwrap();
        assert_eq!(a.len(), 32);
        assert_ne!(a, b);

        assert!(verify_finished(HashAlgorithm::Sha256, &secret, &[1u8; 32], &a).is_ok());
        assert!(verify_finished(HashAlgorithm::Sha256, &secret, &[1u8; 32], &b).is_err());
    }
}
