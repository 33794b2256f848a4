//! Simulated packets

use std::fmt;

use bytes::Bytes;

use crate::TopicMessage;

/// An opaque payload travelling over the simulated network
#[derive(Clone, PartialEq, Eq)]
pub struct Packet {
    payload: Bytes,
}

impl Packet {
    pub fn new(payload: Bytes) -> Self {
        Packet { payload }
    }

    /// Packet carrying an encoded topic message
    pub fn from_message(message: &TopicMessage) -> Self {
        Packet::new(message.encode())
    }

    /// Payload size in bytes
    #[inline]
    pub fn size(&self) -> usize {
        self.payload.len()
    }

    #[inline]
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn into_payload(self) -> Bytes {
        self.payload
    }
}

impl From<Bytes> for Packet {
    fn from(payload: Bytes) -> Self {
        Packet::new(payload)
    }
}

impl From<&'static [u8]> for Packet {
    fn from(payload: &'static [u8]) -> Self {
        Packet::new(Bytes::from_static(payload))
    }
}

impl fmt::Debug for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Packet").field("size", &self.size()).finish()
    }
}
