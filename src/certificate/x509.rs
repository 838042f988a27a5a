use crate::error::{Error, Result};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use x509_parser::prelude::*;

/// The fields of a certificate the handshake needs.
#[derive(Debug, Clone)]
pub struct ParsedCertificate {
    pub subject: String,
    pub issuer: String,
    pub not_before: SystemTime,
    pub not_after: SystemTime,
    pub public_key: Vec<u8>,
    pub public_key_algorithm: String,
    /// DER of the signed TBSCertificate.
    pub tbs: Vec<u8>,
    pub signature_algorithm: String,
    pub signature: Vec<u8>,
    pub is_ca: bool,
    pub dns_names: Vec<String>,
    pub common_name: Option<String>,
}

fn asn1_time_to_system_time(time: &ASN1Time) -> SystemTime {
    let unix_time = time.timestamp();
    if unix_time >= 0 {
        UNIX_EPOCH + Duration::from_secs(unix_time as u64)
    } else {
        UNIX_EPOCH - Duration::from_secs(unix_time.unsigned_abs())
    }
}

fn parse_dns_names(cert: &X509Certificate) -> Vec<String> {
    match cert.subject_alternative_name() {
        Ok(Some(san)) => san
            .value
            .general_names
            .iter()
            .filter_map(|gn| match gn {
                GeneralName::DNSName(name) => Some(name.to_string()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

pub fn parse_certificate(cert_der: &[u8]) -> Result<ParsedCertificate> {
    let (_, cert) = X509Certificate::from_der(cert_der)
        .map_err(|e| Error::CertificateError(format!("Failed to parse X.509 certificate: {}", e)))?;

    let is_ca = cert
        .basic_constraints()
        .ok()
        .flatten()
        .map(|bc| bc.value.ca)
        .unwrap_or(false);

    let common_name = cert
        .subject()
        .iter_common_name()
        .next()
        .and_then(|cn| cn.as_str().ok())
        .map(|cn| cn.to_string());

    Ok(ParsedCertificate {
        subject: cert.subject().to_string(),
        issuer: cert.issuer().to_string(),
        not_before: asn1_time_to_system_time(&cert.validity().not_before),
        not_after: asn1_time_to_system_time(&cert.validity().not_after),
        public_key: cert.public_key().subject_public_key.data.to_vec(),
        public_key_algorithm: cert.public_key().algorithm.algorithm.to_id_string(),
        tbs: cert.tbs_certificate.as_ref().to_vec(),
        signature_algorithm: cert.signature_algorithm.algorithm.to_id_string(),
        signature: cert.signature_value.data.to_vec(),
        is_ca,
        dns_names: parse_dns_names(&cert),
        common_name,
    })
}

pub fn parse_certificate_chain(cert_chain: &[Vec<u8>]) -> Result<Vec<ParsedCertificate>> {
    cert_chain.iter().map(|der| parse_certificate(der)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::certificate::pem;
    use std::path::Path;

    fn fixture() -> ParsedCertificate {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/data/cert.crt");
        let chain = pem::load_certificate_chain(Path::new(path)).unwrap();
        parse_certificate(&chain[0]).unwrap()
    }

    #[test]
    fn test_parse_fixture() {
        let cert = fixture();

        assert_eq!(cert.common_name.as_deref(), Some("quic.tech"));
        assert!(cert.dns_names.contains(&"quic.tech".to_string()));
        assert!(cert.dns_names.contains(&"localhost".to_string()));
        // Uncompressed P-256 point
        assert_eq!(cert.public_key.len(), 65);
        assert_eq!(cert.public_key[0], 0x04);
        assert!(cert.not_before < cert.not_after);
        // ecdsa-with-SHA256
        assert_eq!(cert.signature_algorithm, "1.2.840.10045.4.3.2");
        assert!(!cert.tbs.is_empty());
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(matches!(
            parse_certificate(&[0x30, 0x03, 0x01, 0x02, 0x03]),
            Err(Error::CertificateError(_))
        ));
    }
}
