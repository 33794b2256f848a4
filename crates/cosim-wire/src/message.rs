//! Topic/value messages
//!
//! Wire form: `topic` bytes, one `=` byte, `value` bytes. No length prefix,
//! no escaping, no trailing delimiter. A topic containing `=` cannot be
//! represented: decoding splits on the first `=`, so the tail of such a
//! topic ends up in the value.

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};

use cosim_core::{CosimError, CosimResult};

/// Delimiter between topic and value
pub const TOPIC_DELIMITER: u8 = b'=';

/// A named data update exchanged with the federate
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct TopicMessage {
    pub topic: String,
    pub value: String,
}

impl TopicMessage {
    pub fn new(topic: impl Into<String>, value: impl Into<String>) -> Self {
        TopicMessage {
            topic: topic.into(),
            value: value.into(),
        }
    }

    /// Size of the encoded payload
    #[inline]
    pub fn encoded_len(&self) -> usize {
        self.topic.len() + 1 + self.value.len()
    }

    /// Encode as `topic=value`
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        buf.put_slice(self.topic.as_bytes());
        buf.put_u8(TOPIC_DELIMITER);
        buf.put_slice(self.value.as_bytes());
        buf.freeze()
    }

    /// Decode a `topic=value` payload, splitting on the first `=`
    pub fn decode(buf: &[u8]) -> CosimResult<Self> {
        let text = std::str::from_utf8(buf)
            .map_err(|e| CosimError::MalformedMessage(format!("payload is not UTF-8: {e}")))?;

        let (topic, value) = text.split_once(char::from(TOPIC_DELIMITER)).ok_or_else(|| {
            CosimError::MalformedMessage(format!(
                "could not locate '=' to split topic=value in {text:?}"
            ))
        })?;

        Ok(TopicMessage::new(topic, value))
    }
}

impl fmt::Debug for TopicMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.topic, self.value)
    }
}

impl fmt::Display for TopicMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.topic, self.value)
    }
}
