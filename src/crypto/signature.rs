// Signatures used by CertificateVerify
use crate::error::{Error, Result};
use ring::{rand, signature};
use std::convert::TryFrom;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureScheme {
    RsaPkcs1Sha256 = 0x0401,
    RsaPkcs1Sha384 = 0x0501,
    RsaPkcs1Sha512 = 0x0601,
    EcdsaSecp256r1Sha256 = 0x0403,
    EcdsaSecp384r1Sha384 = 0x0503,
    EcdsaSecp521r1Sha512 = 0x0603,
    RsaPssRsaeSha256 = 0x0804,
    RsaPssRsaeSha384 = 0x0805,
    RsaPssRsaeSha512 = 0x0806,
    Ed25519 = 0x0807,
    Ed448 = 0x0808,
}

impl TryFrom<u16> for SignatureScheme {
    type Error = Error;

    fn try_from(value: u16) -> Result<Self> {
        match value {
            0x0401 => Ok(SignatureScheme::RsaPkcs1Sha256),
            0x0501 => Ok(SignatureScheme::RsaPkcs1Sha384),
            0x0601 => Ok(SignatureScheme::RsaPkcs1Sha512),
            0x0403 => Ok(SignatureScheme::EcdsaSecp256r1Sha256),
            0x0503 => Ok(SignatureScheme::EcdsaSecp384r1Sha384),
            0x0603 => Ok(SignatureScheme::EcdsaSecp521r1Sha512),
            0x0804 => Ok(SignatureScheme::RsaPssRsaeSha256),
            0x0805 => Ok(SignatureScheme::RsaPssRsaeSha384),
            0x0806 => Ok(SignatureScheme::RsaPssRsaeSha512),
            0x0807 => Ok(SignatureScheme::Ed25519),
            0x0808 => Ok(SignatureScheme::Ed448),
            _ => Err(Error::ParseError(format!(
                "Unsupported signature algorithm: {:#06x}",
                value
            ))),
        }
    }
}

impl SignatureScheme {
    /// Schemes this endpoint can verify, in preference order.
    pub fn supported() -> Vec<SignatureScheme> {
        vec![
            SignatureScheme::EcdsaSecp256r1Sha256,
            SignatureScheme::EcdsaSecp384r1Sha384,
            SignatureScheme::Ed25519,
            SignatureScheme::RsaPssRsaeSha256,
            SignatureScheme::RsaPssRsaeSha384,
            SignatureScheme::RsaPssRsaeSha512,
        ]
    }

    fn verification_algorithm(&self) -> Result<&'static dyn signature::VerificationAlgorithm> {
        match self {
            SignatureScheme::RsaPkcs1Sha256 => Ok(&signature::RSA_PKCS1_2048_8192_SHA256),
            SignatureScheme::RsaPkcs1Sha384 => Ok(&signature::RSA_PKCS1_2048_8192_SHA384),
            SignatureScheme::RsaPkcs1Sha512 => Ok(&signature::RSA_PKCS1_2048_8192_SHA512),
            SignatureScheme::RsaPssRsaeSha256 => Ok(&signature::RSA_PSS_2048_8192_SHA256),
            SignatureScheme::RsaPssRsaeSha384 => Ok(&signature::RSA_PSS_2048_8192_SHA384),
            SignatureScheme::RsaPssRsaeSha512 => Ok(&signature::RSA_PSS_2048_8192_SHA512),
            SignatureScheme::EcdsaSecp256r1Sha256 => Ok(&signature::ECDSA_P256_SHA256_ASN1),
            SignatureScheme::EcdsaSecp384r1Sha384 => Ok(&signature::ECDSA_P384_SHA384_ASN1),
            SignatureScheme::Ed25519 => Ok(&signature::ED25519),
            _ => Err(Error::CryptoError(format!("Signature scheme {:?} not supported", self))),
        }
    }
}

pub fn verify_signature(
    signature_scheme: SignatureScheme,
    public_key: &[u8],
    message: &[u8],
    signature: &[u8],
) -> Result<()> {
    let algorithm = signature_scheme.verification_algorithm()?;

    let public_key = signature::UnparsedPublicKey::new(algorithm, public_key);

    public_key
        .verify(message, signature)
        .map_err(|_| Error::CryptoError("Signature verification failed".to_string()))?;

    Ok(())
}

const SERVER_CONTEXT: &[u8] = b"TLS 1.3, server CertificateVerify";
const CLIENT_CONTEXT: &[u8] = b"TLS 1.3, client CertificateVerify";

/// Builds the content covered by a CertificateVerify signature (RFC 8446 section 4.4.3).
pub fn certificate_verify_message(transcript_hash: &[u8], is_server: bool) -> Vec<u8> {
    let context = if is_server { SERVER_CONTEXT } else { CLIENT_CONTEXT };

    let mut message = Vec::with_capacity(64 + context.len() + 1 + transcript_hash.len());
    message.extend_from_slice(&[0x20; 64]);
    message.extend_from_slice(context);
    message.push(0x00);
    message.extend_from_slice(transcript_hash);
    message
}

pub fn verify_certificate_verify(
    signature_scheme: SignatureScheme,
    public_key: &[u8],
    signature: &[u8],
    transcript_hash: &[u8],
    is_server: bool,
) -> Result<()> {
    let message = certificate_verify_message(transcript_hash, is_server);
    verify_signature(signature_scheme, public_key, &message, signature)
}

/// A private key able to produce CertificateVerify signatures.
pub enum SigningKey {
    Ecdsa {
        key_pair: signature::EcdsaKeyPair,
        scheme: SignatureScheme,
    },
    Ed25519(signature::Ed25519KeyPair),
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SigningKey({:?})", self.scheme())
    }
}

impl SigningKey {
    /// Loads a PKCS#8 key, trying P-256, then P-384, then Ed25519.
    pub fn from_pkcs8(der: &[u8]) -> Result<Self> {
        let rng = rand::SystemRandom::new();

        if let Ok(key_pair) = signature::EcdsaKeyPair::from_pkcs8(
            &signature::ECDSA_P256_SHA256_ASN1_SIGNING,
            der,
            &rng,
        ) {
            return Ok(SigningKey::Ecdsa {
                key_pair,
                scheme: SignatureScheme::EcdsaSecp256r1Sha256,
            });
        }

        if let Ok(key_pair) = signature::EcdsaKeyPair::from_pkcs8(
            &signature::ECDSA_P384_SHA384_ASN1_SIGNING,
            der,
            &rng,
        ) {
            return Ok(SigningKey::Ecdsa {
                key_pair,
                scheme: SignatureScheme::EcdsaSecp384r1Sha384,
            });
        }

        signature::Ed25519KeyPair::from_pkcs8_maybe_unchecked(der)
            .map(SigningKey::Ed25519)
            .map_err(|_| {
                Error::CertificateError("Unsupported or malformed PKCS#8 private key".to_string())
            })
    }

    pub fn scheme(&self) -> SignatureScheme {
        match self {
            SigningKey::Ecdsa { scheme, .. } => *scheme,
            SigningKey::Ed25519(_) => SignatureScheme::Ed25519,
        }
    }

    pub fn public_key(&self) -> &[u8] {
        use ring::signature::KeyPair;

        match self {
            SigningKey::Ecdsa { key_pair, .. } => key_pair.public_key().as_ref(),
            SigningKey::Ed25519(key_pair) => key_pair.public_key().as_ref(),
        }
    }

    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        match self {
            SigningKey::Ecdsa { key_pair, .. } => {
                let rng = rand::SystemRandom::new();
                key_pair
                    .sign(&rng, message)
                    .map(|sig| sig.as_ref().to_vec())
                    .map_err(|_| Error::CryptoError("ECDSA signing failed".to_string()))
            }
            SigningKey::Ed25519(key_pair) => Ok(key_pair.sign(message).as_ref().to_vec()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ed25519_key() -> SigningKey {
        let rng = rand::SystemRandom::new();
        let pkcs8 = signature::Ed25519KeyPair::generate_pkcs8(&rng).unwrap();
        SigningKey::from_pkcs8(pkcs8.as_ref()).unwrap()
    }

    #[test]
    fn test_certificate_verify_message_layout() {
        let hash = [0xAB; 32];
        let message = certificate_verify_message(&hash, true);

        assert_eq!(&message[..64], &[0x20; 64][..]);
        assert_eq!(&message[64..64 + SERVER_CONTEXT.len()], SERVER_CONTEXT);
        assert_eq!(message[64 + SERVER_CONTEXT.len()], 0x00);
        assert_eq!(&message[message.len() - 32..], &hash);
    }

    #[test]
    fn test_ed25519_sign_and_verify() {
        let key = ed25519_key();
        assert_eq!(key.scheme(), SignatureScheme::Ed25519);

        let hash = [0x01; 32];
        let sig = key.sign(&certificate_verify_message(&hash, true)).unwrap();

        assert!(verify_certificate_verify(key.scheme(), key.public_key(), &sig, &hash, true).is_ok());
        // Client and server contexts are not interchangeable.
        assert!(verify_certificate_verify(key.scheme(), key.public_key(), &sig, &hash, false).is_err());
    }

    #[test]
    fn test_ecdsa_sign_and_verify() {
        let rng = rand::SystemRandom::new();
        let pkcs8 = signature::EcdsaKeyPair::generate_pkcs8(
            &signature::ECDSA_P256_SHA256_ASN1_SIGNING,
            &rng,
        )
        .unwrap();
        let key = SigningKey::from_pkcs8(pkcs8.as_ref()).unwrap();
        assert_eq!(key.scheme(), SignatureScheme::EcdsaSecp256r1Sha256);

        let sig = key.sign(b"message").unwrap();
        assert!(verify_signature(key.scheme(), key.public_key(), b"message", &sig).is_ok());
        assert!(verify_signature(key.scheme(), key.public_key(), b"other", &sig).is_err());
    }

    #[test]
    fn test_garbage_key_rejected() {
        assert!(SigningKey::from_pkcs8(&[0x30, 0x03, 0x02, 0x01, 0x00]).is_err());
    }

    #[test]
    fn test_scheme_try_from() {
        assert_eq!(SignatureScheme::try_from(0x0807).unwrap(), SignatureScheme::Ed25519);
        assert!(SignatureScheme::try_from(0xFFFF).is_err());
    }
}
