// QUIC transport parameters (RFC 9000 section 18), carried in TLS extension 57
use crate::error::{Error, Result};
use crate::utils;
use std::collections::HashSet;

const ORIGINAL_DESTINATION_CONNECTION_ID: u64 = 0x00;
const MAX_IDLE_TIMEOUT: u64 = 0x01;
const MAX_UDP_PAYLOAD_SIZE: u64 = 0x03;
const INITIAL_MAX_DATA: u64 = 0x04;
const INITIAL_MAX_STREAM_DATA_BIDI_LOCAL: u64 = 0x05;
const INITIAL_MAX_STREAM_DATA_BIDI_REMOTE: u64 = 0x06;
const INITIAL_MAX_STREAM_DATA_UNI: u64 = 0x07;
const INITIAL_MAX_STREAMS_BIDI: u64 = 0x08;
const INITIAL_MAX_STREAMS_UNI: u64 = 0x09;
const DISABLE_ACTIVE_MIGRATION: u64 = 0x0c;
const INITIAL_SOURCE_CONNECTION_ID: u64 = 0x0f;

pub const DEFAULT_MAX_UDP_PAYLOAD_SIZE: u64 = 65527;
pub const MIN_UDP_PAYLOAD_SIZE: u64 = 1200;

/// Streams are counted up to 2^60.
const MAX_STREAMS: u64 = 1 << 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportParams {
    pub original_destination_connection_id: Option<Vec<u8>>,
    pub max_idle_timeout: u64,
    pub max_udp_payload_size: u64,
    pub initial_max_data: u64,
    pub initial_max_stream_data_bidi_local: u64,
    pub initial_max_stream_data_bidi_remote: u64,
    pub initial_max_stream_data_uni: u64,
    pub initial_max_streams_bidi: u64,
    pub initial_max_streams_uni: u64,
    pub disable_active_migration: bool,
    pub initial_source_connection_id: Option<Vec<u8>>,
}

impl Default for TransportParams {
    fn default() -> Self {
        Self {
            original_destination_connection_id: None,
            max_idle_timeout: 0,
            max_udp_payload_size: DEFAULT_MAX_UDP_PAYLOAD_SIZE,
            initial_max_data: 0,
            initial_max_stream_data_bidi_local: 0,
            initial_max_stream_data_bidi_remote: 0,
            initial_max_stream_data_uni: 0,
            initial_max_streams_bidi: 0,
            initial_max_streams_uni: 0,
            disable_active_migration: false,
            initial_source_connection_id: None,
        }
    }
}

fn write_param(out: &mut Vec<u8>, id: u64, value: &[u8]) -> Result<()> {
    utils::write_varint(out, id)?;
    utils::write_vector_varint(out, value)
}

fn write_integer_param(out: &mut Vec<u8>, id: u64, value: u64) -> Result<()> {
    let mut encoded = Vec::with_capacity(utils::varint_len(value));
    utils::write_varint(&mut encoded, value)?;
    write_param(out, id, &encoded)
}

fn read_integer_param(id: u64, value: &[u8]) -> Result<u64> {
    let mut pos = 0;
    let v = utils::read_varint(value, &mut pos)
        .map_err(|_| Error::InvalidTransportParam(format!("Parameter {:#x} is not a varint", id)))?;
    if pos != value.len() {
        return Err(Error::InvalidTransportParam(format!(
            "Parameter {:#x} has trailing bytes",
            id
        )));
    }
    Ok(v)
}

impl TransportParams {
    /// Encodes the parameters. Only a server may send the original
    /// destination connection id.
    pub fn encode(&self, is_server: bool) -> Result<Vec<u8>> {
        let mut out = Vec::new();

        if is_server {
            if let Some(odcid) = &self.original_destination_connection_id {
                write_param(&mut out, ORIGINAL_DESTINATION_CONNECTION_ID, odcid)?;
            }
        }

        if self.max_idle_timeout != 0 {
            write_integer_param(&mut out, MAX_IDLE_TIMEOUT, self.max_idle_timeout)?;
        }
        if self.max_udp_payload_size != DEFAULT_MAX_UDP_PAYLOAD_SIZE {
            write_integer_param(&mut out, MAX_UDP_PAYLOAD_SIZE, self.max_udp_payload_size)?;
        }

        write_integer_param(&mut out, INITIAL_MAX_DATA, self.initial_max_data)?;
        write_integer_param(
            &mut out,
            INITIAL_MAX_STREAM_DATA_BIDI_LOCAL,
            self.initial_max_stream_data_bidi_local,
        )?;
        write_integer_param(
            &mut out,
            INITIAL_MAX_STREAM_DATA_BIDI_REMOTE,
            self.initial_max_stream_data_bidi_remote,
        )?;
        write_integer_param(&mut out, INITIAL_MAX_STREAM_DATA_UNI, self.initial_max_stream_data_uni)?;
        write_integer_param(&mut out, INITIAL_MAX_STREAMS_BIDI, self.initial_max_streams_bidi)?;
        write_integer_param(&mut out, INITIAL_MAX_STREAMS_UNI, self.initial_max_streams_uni)?;

        if self.disable_active_migration {
            write_param(&mut out, DISABLE_ACTIVE_MIGRATION, &[])?;
        }

        if let Some(scid) = &self.initial_source_connection_id {
            write_param(&mut out, INITIAL_SOURCE_CONNECTION_ID, scid)?;
        }

        Ok(out)
    }

    /// Decodes parameters sent by the peer. `from_server` says who sent them.
    pub fn decode(data: &[u8], from_server: bool) -> Result<Self> {
        let mut params = TransportParams::default();
        let mut seen = HashSet::new();
        let mut pos = 0;

        while pos < data.len() {
            let id = utils::read_varint(data, &mut pos)?;
            let value = utils::read_vector_varint(data, &mut pos)?;

            if !seen.insert(id) {
                return Err(Error::InvalidTransportParam(format!(
                    "Duplicate parameter {:#x}",
                    id
                )));
            }

            match id {
                ORIGINAL_DESTINATION_CONNECTION_ID => {
                    if !from_server {
                        return Err(Error::InvalidTransportParam(
                            "Client sent original_destination_connection_id".to_string(),
                        ));
                    }
                    params.original_destination_connection_id = Some(value.to_vec());
                }
                MAX_IDLE_TIMEOUT => params.max_idle_timeout = read_integer_param(id, value)?,
                MAX_UDP_PAYLOAD_SIZE => {
                    let size = read_integer_param(id, value)?;
                    if size < MIN_UDP_PAYLOAD_SIZE {
                        return Err(Error::InvalidTransportParam(format!(
                            "max_udp_payload_size {} below {}",
                            size, MIN_UDP_PAYLOAD_SIZE
                        )));
                    }
                    params.max_udp_payload_size = size;
                }
                INITIAL_MAX_DATA => params.initial_max_data = read_integer_param(id, value)?,
                INITIAL_MAX_STREAM_DATA_BIDI_LOCAL => {
                    params.initial_max_stream_data_bidi_local = read_integer_param(id, value)?
                }
                INITIAL_MAX_STREAM_DATA_BIDI_REMOTE => {
                    params.initial_max_stream_data_bidi_remote = read_integer_param(id, value)?
                }
                INITIAL_MAX_STREAM_DATA_UNI => {
                    params.initial_max_stream_data_uni = read_integer_param(id, value)?
                }
                INITIAL_MAX_STREAMS_BIDI | INITIAL_MAX_STREAMS_UNI => {
                    let count = read_integer_param(id, value)?;
                    if count > MAX_STREAMS {
                        return Err(Error::InvalidTransportParam(format!(
                            "Stream limit {} too large",
                            count
                        )));
                    }
                    if id == INITIAL_MAX_STREAMS_BIDI {
                        params.initial_max_streams_bidi = count;
                    } else {
                        params.initial_max_streams_uni = count;
                    }
                }
                DISABLE_ACTIVE_MIGRATION => {
                    if !value.is_empty() {
                        return Err(Error::InvalidTransportParam(
                            "disable_active_migration must be empty".to_string(),
                        ));
                    }
                    params.disable_active_migration = true;
                }
                INITIAL_SOURCE_CONNECTION_ID => {
                    params.initial_source_connection_id = Some(value.to_vec());
                }
                // Unknown parameters are ignored
                _ => log::trace!("Skipping unknown transport parameter {:#x}", id),
            }
        }

        Ok(params)
    }
}
