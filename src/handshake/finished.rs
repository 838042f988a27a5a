use crate::error::Result;
use crate::handshake::{HandshakeMessage, HandshakeType};

#[derive(Debug)]
pub struct Finished {
    pub verify_data: Vec<u8>,
}

impl Finished {
    pub fn new(verify_data: Vec<u8>) -> Self {
        Self { verify_data }
    }

    // The body is the verify_data alone; its length is implied by the hash
    pub fn parse(data: &[u8], pos: &mut usize) -> Result<Self> {
        let verify_data = data[(*pos).min(data.len())..].to_vec();
        *pos = data.len();

        Ok(Self { verify_data })
    }
}

impl HandshakeMessage for Finished {
    fn message_type(&self) -> HandshakeType {
        HandshakeType::Finished
    }

    fn serialize(&self) -> Result<Vec<u8>> {
        Ok(self.verify_data.clone())
    }
}
