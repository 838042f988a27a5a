#![allow(dead_code)]

use quic_loopback::{Config, ConfigBuilder, PROTOCOL_VERSION};
use std::path::PathBuf;

pub const CLIENT_ID: [u8; 4] = [1, 0, 0, 0];
pub const SERVER_ID: [u8; 4] = [2, 0, 0, 0];
pub const PROTOCOLS: &[u8] = b"\x06proto1\x06proto2";

pub fn data_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/data").join(name)
}

/// The harness defaults: test credentials, two protocols, no peer verification.
pub fn default_builder() -> ConfigBuilder {
    quic_loopback::init_logging();

    Config::builder(PROTOCOL_VERSION)
        .load_cert_chain_from_pem_file(data_path("cert.crt"))
        .load_priv_key_from_pem_file(data_path("cert.key"))
        .set_application_protos(PROTOCOLS)
        .set_initial_max_data(30)
        .set_initial_max_stream_data_bidi_local(15)
        .set_initial_max_stream_data_bidi_remote(15)
        .set_initial_max_stream_data_uni(10)
        .set_initial_max_streams_bidi(3)
        .set_initial_max_streams_uni(3)
        .verify_peer(false)
}

pub fn default_config() -> Config {
    default_builder().build().expect("default config builds")
}
