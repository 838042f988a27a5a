// PEM credential loading
use crate::crypto::SigningKey;
use crate::error::{Error, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

pub fn read_certificate_chain(reader: &mut dyn BufRead) -> Result<Vec<Vec<u8>>> {
    let certs = rustls_pemfile::certs(reader)?;
    if certs.is_empty() {
        return Err(Error::CertificateError("No CERTIFICATE block found".to_string()));
    }
    Ok(certs)
}

/// Reads the first PKCS#8 key in the stream.
pub fn read_private_key(reader: &mut dyn BufRead) -> Result<SigningKey> {
    let keys = rustls_pemfile::pkcs8_private_keys(reader)?;
    let der = keys
        .first()
        .ok_or_else(|| Error::CertificateError("No PRIVATE KEY block found".to_string()))?;
    SigningKey::from_pkcs8(der)
}

pub fn load_certificate_chain(path: &Path) -> Result<Vec<Vec<u8>>> {
    let mut reader = BufReader::new(File::open(path)?);
    read_certificate_chain(&mut reader)
}

pub fn load_private_key(path: &Path) -> Result<SigningKey> {
    let mut reader = BufReader::new(File::open(path)?);
    read_private_key(&mut reader)
}

pub fn load_trust_anchors(path: &Path) -> Result<Vec<Vec<u8>>> {
    load_certificate_chain(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CERT_PATH: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/data/cert.crt");
    const KEY_PATH: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/data/cert.key");

    #[test]
    fn test_load_fixture_credentials() {
        let chain = load_certificate_chain(Path::new(CERT_PATH)).unwrap();
        assert_eq!(chain.len(), 1);

        let key = load_private_key(Path::new(KEY_PATH)).unwrap();
        assert_eq!(key.scheme(), crate::crypto::SignatureScheme::EcdsaSecp256r1Sha256);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = load_certificate_chain(Path::new("does/not/exist.crt"));
        assert!(matches!(result, Err(Error::IoError(_))));
    }

    #[test]
    fn test_key_file_has_no_certificate() {
        let result = load_certificate_chain(Path::new(KEY_PATH));
        assert!(matches!(result, Err(Error::CertificateError(_))));
    }

    #[test]
    fn test_cert_file_has_no_key() {
        let result = load_private_key(Path::new(CERT_PATH));
        assert!(matches!(result, Err(Error::CertificateError(_))));
    }
}
