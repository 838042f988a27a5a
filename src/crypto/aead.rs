use crate::crypto::hkdf::{self, HashAlgorithm};
use crate::error::{Error, Result};
use crate::handshake::CipherSuite;
use ring::aead;
use zeroize::Zeroizing;

pub struct AeadAlgorithm {
    algorithm: &'static aead::Algorithm,
    key_len: usize,
    nonce_len: usize,
    tag_len: usize,
}

impl AeadAlgorithm {
    pub fn from_cipher_suite(cipher_suite: CipherSuite) -> Self {
        match cipher_suite {
            CipherSuite::TlsAes128GcmSha256 => Self {
                algorithm: &aead::AES_128_GCM,
                key_len: 16,
                nonce_len: 12,
                tag_len: 16,
            },
            CipherSuite::TlsAes256GcmSha384 => Self {
                algorithm: &aead::AES_256_GCM,
                key_len: 32,
                nonce_len: 12,
                tag_len: 16,
            },
            CipherSuite::TlsChacha20Poly1305Sha256 => Self {
                algorithm: &aead::CHACHA20_POLY1305,
                key_len: 32,
                nonce_len: 12,
                tag_len: 16,
            },
        }
    }

    pub fn key_len(&self) -> usize {
        self.key_len
    }

    pub fn nonce_len(&self) -> usize {
        self.nonce_len
    }

    pub fn tag_len(&self) -> usize {
        self.tag_len
    }
}

pub struct AeadKey {
    key: aead::LessSafeKey,
}

impl AeadKey {
    pub fn new(algorithm: &AeadAlgorithm, key_material: &[u8]) -> Result<Self> {
        if key_material.len() != algorithm.key_len {
            return Err(Error::CryptoError(format!(
                "Invalid key length {}, expected {}",
                key_material.len(),
                algorithm.key_len
            )));
        }

        let unbound_key = aead::UnboundKey::new(algorithm.algorithm, key_material)
            .map_err(|_| Error::CryptoError("Failed to create AEAD key".to_string()))?;

        Ok(Self {
            key: aead::LessSafeKey::new(unbound_key),
        })
    }

    pub fn seal(&self, nonce: &[u8], aad: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
        let nonce = aead::Nonce::try_assume_unique_for_key(nonce)
            .map_err(|_| Error::CryptoError("Invalid nonce".to_string()))?;

        let mut in_out = plaintext.to_vec();
        let tag = self
            .key
            .seal_in_place_separate_tag(nonce, aead::Aad::from(aad), &mut in_out)
            .map_err(|_| Error::CryptoError("AEAD encryption failed".to_string()))?;

        in_out.extend_from_slice(tag.as_ref());
        Ok(in_out)
    }

    pub fn open(&self, nonce: &[u8], aad: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
        let nonce = aead::Nonce::try_assume_unique_for_key(nonce)
            .map_err(|_| Error::CryptoError("Invalid nonce".to_string()))?;

        let mut in_out = ciphertext.to_vec();
        let plaintext_len = self
            .key
            .open_in_place(nonce, aead::Aad::from(aad), &mut in_out)
            .map_err(|_| Error::CryptoError("AEAD decryption failed".to_string()))?
            .len();

        in_out.truncate(plaintext_len);
        Ok(in_out)
    }
}

/// Packet protection key for one direction of one encryption level.
/// The per-packet nonce is the static IV XORed with the packet number.
pub struct PacketKey {
    key: AeadKey,
    iv: Zeroizing<Vec<u8>>,
    tag_len: usize,
}

impl PacketKey {
    pub fn new(cipher_suite: CipherSuite, traffic_secret: &[u8]) -> Result<Self> {
        let algorithm = AeadAlgorithm::from_cipher_suite(cipher_suite);
        let hash = HashAlgorithm::for_cipher_suite(cipher_suite);
        let (key, iv) = hkdf::derive_packet_key_material(
            hash,
            traffic_secret,
            algorithm.key_len(),
            algorithm.nonce_len(),
        )?;
        let key = Zeroizing::new(key);

        Ok(Self {
            key: AeadKey::new(&algorithm, &key)?,
            iv: Zeroizing::new(iv),
            tag_len: algorithm.tag_len(),
        })
    }

    pub fn tag_len(&self) -> usize {
        self.tag_len
    }

    fn nonce(&self, packet_number: u64) -> Vec<u8> {
        let mut nonce = self.iv.to_vec();
        let pn = packet_number.to_be_bytes();
        let offset = nonce.len() - pn.len();
        for (i, byte) in pn.iter().enumerate() {
            nonce[offset + i] ^= byte;
        }
        nonce
    }

    pub fn seal(&self, packet_number: u64, header: &[u8], payload: &[u8]) -> Result<Vec<u8>> {
        self.key.seal(&self.nonce(packet_number), header, payload)
    }

    pub fn open(&self, packet_number: u64, header: &[u8], payload: &[u8]) -> Result<Vec<u8>> {
        self.key.open(&self.nonce(packet_number), header, payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aead_key_length_checked() {
        let algorithm = AeadAlgorithm::from_cipher_suite(CipherSuite::TlsAes128GcmSha256);
        assert!(AeadKey::new(&algorithm, &[0u8; 15]).is_err());
        assert!(AeadKey::new(&algorithm, &[0u8; 16]).is_ok());
    }

    #[test]
    fn test_packet_key_nonce_xor() {
        let key = PacketKey::new(CipherSuite::TlsAes128GcmSha256, &[0x11; 32]).unwrap();
        let n0 = key.nonce(0);
        let n1 = key.nonce(1);

        assert_eq!(n0.len(), 12);
        assert_eq!(n0[..11], n1[..11]);
        assert_eq!(n0[11] ^ n1[11], 1);
    }

    #[test]
    fn test_packet_key_rejects_wrong_packet_number() {
        for suite in [
            CipherSuite::TlsAes128GcmSha256,
            CipherSuite::TlsAes256GcmSha384,
            CipherSuite::TlsChacha20Poly1305Sha256,
        ] {
            let secret = vec![0x42; HashAlgorithm::for_cipher_suite(suite).output_size()];
            let sender = PacketKey::new(suite, &secret).unwrap();
            let receiver = PacketKey::new(suite, &secret).unwrap();

            let sealed = sender.seal(7, b"header", b"payload").unwrap();
            assert_eq!(sealed.len(), 7 + sender.tag_len());
            assert_eq!(receiver.open(7, b"header", &sealed).unwrap(), b"payload");
            assert!(receiver.open(8, b"header", &sealed).is_err());
            assert!(receiver.open(7, b"tampered", &sealed).is_err());
        }
    }
}
