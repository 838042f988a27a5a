pub mod pem;
pub mod validation;
pub mod x509;

pub use pem::{load_certificate_chain, load_private_key, load_trust_anchors};
pub use validation::{TrustStore, ValidationOptions, ValidationStatus};
pub use x509::{parse_certificate, parse_certificate_chain, ParsedCertificate};
