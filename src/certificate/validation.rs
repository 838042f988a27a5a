use super::x509::{parse_certificate, parse_certificate_chain, ParsedCertificate};
use crate::alert::AlertDescription;
use crate::error::{Error, Result};
use ring::signature;
use std::time::SystemTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationStatus {
    Valid,
    Expired,
    NotYetValid,
    UnknownIssuer,
    BadSignature,
    NameMismatch,
}

impl ValidationStatus {
    /// Alert sent to the peer when validation fails with this status.
    pub fn alert(&self) -> Option<AlertDescription> {
        match self {
            ValidationStatus::Valid => None,
            ValidationStatus::Expired | ValidationStatus::NotYetValid => {
                Some(AlertDescription::CertificateExpired)
            }
            ValidationStatus::UnknownIssuer => Some(AlertDescription::UnknownCa),
            ValidationStatus::BadSignature | ValidationStatus::NameMismatch => {
                Some(AlertDescription::BadCertificate)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct ValidationOptions {
    pub check_expiration: bool,
    pub time_override: Option<SystemTime>,
    pub server_name: Option<String>,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            check_expiration: true,
            time_override: None,
            server_name: None,
        }
    }
}

struct TrustAnchor {
    der: Vec<u8>,
    parsed: ParsedCertificate,
}

/// Trust anchors for peer verification. An empty store trusts nothing.
#[derive(Default)]
pub struct TrustStore {
    anchors: Vec<TrustAnchor>,
}

impl TrustStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_der_list(certs: &[Vec<u8>]) -> Result<Self> {
        let mut store = Self::new();
        for der in certs {
            store.add_trust_anchor(der.clone())?;
        }
        Ok(store)
    }

    pub fn add_trust_anchor(&mut self, der: Vec<u8>) -> Result<()> {
        let parsed = parse_certificate(&der)?;
        self.anchors.push(TrustAnchor { der, parsed });
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    /// Validates a DER chain, leaf first.
    pub fn validate_chain(
        &self,
        chain: &[Vec<u8>],
        options: &ValidationOptions,
    ) -> Result<ValidationStatus> {
        if chain.is_empty() {
            return Err(Error::CertificateError("Empty certificate chain".to_string()));
        }

        let parsed_chain = parse_certificate_chain(chain)?;
        let leaf = &parsed_chain[0];

        if options.check_expiration {
            let now = options.time_override.unwrap_or_else(SystemTime::now);
            let status = check_validity(leaf, now);
            if status != ValidationStatus::Valid {
                return Ok(status);
            }
        }

        if let Some(name) = &options.server_name {
            if !matches_server_name(leaf, name) {
                return Ok(ValidationStatus::NameMismatch);
            }
        }

        for pair in parsed_chain.windows(2) {
            if pair[0].issuer != pair[1].subject {
                return Ok(ValidationStatus::UnknownIssuer);
            }
            if !is_signed_by(&pair[0], &pair[1]) {
                return Ok(ValidationStatus::BadSignature);
            }
        }

        Ok(self.anchor_status(chain, &parsed_chain))
    }

    fn anchor_status(&self, chain: &[Vec<u8>], parsed_chain: &[ParsedCertificate]) -> ValidationStatus {
        if chain
            .iter()
            .any(|der| self.anchors.iter().any(|anchor| &anchor.der == der))
        {
            return ValidationStatus::Valid;
        }

        // The top of the chain may be issued directly by an anchor
        let top = match parsed_chain.last() {
            Some(top) => top,
            None => return ValidationStatus::UnknownIssuer,
        };
        let mut issuers = self
            .anchors
            .iter()
            .filter(|anchor| anchor.parsed.is_ca && anchor.parsed.subject == top.issuer)
            .peekable();
        if issuers.peek().is_none() {
            return ValidationStatus::UnknownIssuer;
        }
        if issuers.any(|anchor| is_signed_by(top, &anchor.parsed)) {
            ValidationStatus::Valid
        } else {
            ValidationStatus::BadSignature
        }
    }
}

fn verification_algorithm(
    signature_algorithm: &str,
    issuer_key_len: usize,
) -> Option<&'static dyn signature::VerificationAlgorithm> {
    // Uncompressed P-384 points are 97 bytes, P-256 points 65
    let p384 = issuer_key_len == 97;
    let algorithm: &'static dyn signature::VerificationAlgorithm = match signature_algorithm {
        "1.2.840.10045.4.3.2" if p384 => &signature::ECDSA_P384_SHA256_ASN1,
        "1.2.840.10045.4.3.2" => &signature::ECDSA_P256_SHA256_ASN1,
        "1.2.840.10045.4.3.3" if p384 => &signature::ECDSA_P384_SHA384_ASN1,
        "1.2.840.10045.4.3.3" => &signature::ECDSA_P256_SHA384_ASN1,
        "1.3.101.112" => &signature::ED25519,
        "1.2.840.113549.1.1.11" => &signature::RSA_PKCS1_2048_8192_SHA256,
        "1.2.840.113549.1.1.12" => &signature::RSA_PKCS1_2048_8192_SHA384,
        "1.2.840.113549.1.1.13" => &signature::RSA_PKCS1_2048_8192_SHA512,
        _ => return None,
    };
    Some(algorithm)
}

/// Checks `cert`'s signature with `issuer`'s public key.
pub fn is_signed_by(cert: &ParsedCertificate, issuer: &ParsedCertificate) -> bool {
    match verification_algorithm(&cert.signature_algorithm, issuer.public_key.len()) {
        Some(algorithm) => signature::UnparsedPublicKey::new(algorithm, &issuer.public_key)
            .verify(&cert.tbs, &cert.signature)
            .is_ok(),
        None => {
            log::debug!("unsupported certificate signature algorithm {}", cert.signature_algorithm);
            false
        }
    }
}

pub fn check_validity(cert: &ParsedCertificate, now: SystemTime) -> ValidationStatus {
    if now < cert.not_before {
        return ValidationStatus::NotYetValid;
    }
    if now > cert.not_after {
        return ValidationStatus::Expired;
    }
    ValidationStatus::Valid
}

/// Matches against the DNS SANs, falling back to the common name when the
/// certificate carries none. A leading `*.` matches exactly one label.
pub fn matches_server_name(cert: &ParsedCertificate, server_name: &str) -> bool {
    let server_name = server_name.trim_end_matches('.').to_ascii_lowercase();

    let candidates: Vec<&str> = if cert.dns_names.is_empty() {
        cert.common_name.iter().map(|cn| cn.as_str()).collect()
    } else {
        cert.dns_names.iter().map(|n| n.as_str()).collect()
    };

    candidates
        .iter()
        .any(|pattern| dns_name_matches(&pattern.to_ascii_lowercase(), &server_name))
}

fn dns_name_matches(pattern: &str, name: &str) -> bool {
    match pattern.strip_prefix("*.") {
        Some(suffix) => match name.split_once('.') {
            Some((label, rest)) => !label.is_empty() && rest == suffix,
            None => false,
        },
        None => pattern == name,
    }
}
