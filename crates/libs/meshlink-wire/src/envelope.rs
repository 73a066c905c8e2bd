//! Envelope encode/decode.
//!
//! The decoder is strict: a payload must match its declared kind's schema
//! exactly. Length mismatches, unknown discriminants and invalid UTF-8 are
//! all rejected as malformed rather than reinterpreted.

use std::fmt;

use crate::{HEADER_SIZE, NODE_ID_SIZE, TIMESTAMP_SIZE};

/// Errors from envelope encode/decode.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("message too short: {0} bytes (minimum {HEADER_SIZE})")]
    TooShort(usize),

    #[error("unknown source service: 0x{0:02x}")]
    UnknownService(u8),

    #[error("unknown payload kind: 0x{0:02x}")]
    UnknownPayloadKind(u8),

    #[error("payload length {got} does not match schema for {kind:?} (expected {expected})")]
    PayloadLength {
        kind: PayloadKind,
        expected: usize,
        got: usize,
    },

    #[error("trailing bytes after payload: {0}")]
    TrailingBytes(usize),

    #[error("description is not valid utf-8")]
    InvalidDescription(#[from] std::string::FromUtf8Error),

    #[error("description too long: {0} bytes (maximum {max})", max = u16::MAX)]
    DescriptionTooLong(usize),
}

/// Originating service of an envelope.
///
/// The core transport stamps `Core` on everything it sends; higher-level
/// services registered on top of the router claim the other values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ServiceKind {
    Core = 0x00,
    Account = 0x01,
    Realm = 0x02,
}

impl ServiceKind {
    /// Convert from raw byte value.
    pub fn from_byte(b: u8) -> Result<Self, WireError> {
        match b {
            0x00 => Ok(Self::Core),
            0x01 => Ok(Self::Account),
            0x02 => Ok(Self::Realm),
            _ => Err(WireError::UnknownService(b)),
        }
    }
}

/// Payload discriminant carried in the envelope header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PayloadKind {
    Ping = 0x01,
    Pong = 0x02,
    Hello = 0x03,
}

impl PayloadKind {
    /// Convert from raw byte value.
    pub fn from_byte(b: u8) -> Result<Self, WireError> {
        match b {
            0x01 => Ok(Self::Ping),
            0x02 => Ok(Self::Pong),
            0x03 => Ok(Self::Hello),
            _ => Err(WireError::UnknownPayloadKind(b)),
        }
    }
}

impl fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Decoded payload variant. The variant always matches the kind byte the
/// envelope was decoded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Liveness probe. `timestamp` is milliseconds on the sender's
    /// monotonic clock; only the sender ever interprets it.
    Ping { timestamp: u64 },
    /// Reply to a Ping, echoing its timestamp verbatim.
    Pong { timestamp: u64 },
    /// Session handshake: the sending node's identity.
    Hello {
        id: [u8; NODE_ID_SIZE],
        description: String,
    },
}

impl Payload {
    pub fn kind(&self) -> PayloadKind {
        match self {
            Payload::Ping { .. } => PayloadKind::Ping,
            Payload::Pong { .. } => PayloadKind::Pong,
            Payload::Hello { .. } => PayloadKind::Hello,
        }
    }
}

/// A framed wire message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Service that produced this message.
    pub source_service: ServiceKind,
    /// Reserved, always 0.
    pub opcode: u16,
    /// Reserved, always 0.
    pub correlation: u16,
    pub payload: Payload,
}

impl Envelope {
    /// Create an envelope with reserved fields zeroed.
    pub fn new(source_service: ServiceKind, payload: Payload) -> Self {
        Self {
            source_service,
            opcode: 0,
            correlation: 0,
            payload,
        }
    }

    /// Encode to wire format bytes.
    ///
    /// Fails only for a Hello description longer than the length prefix
    /// can carry; a truncated prefix would produce a corrupt frame.
    pub fn encode(&self) -> Result<Vec<u8>, WireError> {
        let mut buf = Vec::with_capacity(HEADER_SIZE + TIMESTAMP_SIZE);
        buf.push(self.source_service as u8);
        buf.extend_from_slice(&self.opcode.to_be_bytes());
        buf.extend_from_slice(&self.correlation.to_be_bytes());
        buf.push(self.payload.kind() as u8);

        match &self.payload {
            Payload::Ping { timestamp } | Payload::Pong { timestamp } => {
                buf.extend_from_slice(&timestamp.to_be_bytes());
            }
            Payload::Hello { id, description } => {
                buf.extend_from_slice(id);
                let desc = description.as_bytes();
                let desc_len = u16::try_from(desc.len())
                    .map_err(|_| WireError::DescriptionTooLong(desc.len()))?;
                buf.extend_from_slice(&desc_len.to_be_bytes());
                buf.extend_from_slice(desc);
            }
        }

        Ok(buf)
    }

    /// Decode from wire format bytes.
    pub fn decode(data: &[u8]) -> Result<Self, WireError> {
        if data.len() < HEADER_SIZE {
            return Err(WireError::TooShort(data.len()));
        }

        let source_service = ServiceKind::from_byte(data[0])?;
        let opcode = u16::from_be_bytes([data[1], data[2]]);
        let correlation = u16::from_be_bytes([data[3], data[4]]);
        let kind = PayloadKind::from_byte(data[5])?;
        let body = &data[HEADER_SIZE..];

        let payload = match kind {
            PayloadKind::Ping | PayloadKind::Pong => {
                if body.len() != TIMESTAMP_SIZE {
                    return Err(WireError::PayloadLength {
                        kind,
                        expected: TIMESTAMP_SIZE,
                        got: body.len(),
                    });
                }
                let mut raw = [0u8; TIMESTAMP_SIZE];
                raw.copy_from_slice(body);
                let timestamp = u64::from_be_bytes(raw);
                match kind {
                    PayloadKind::Ping => Payload::Ping { timestamp },
                    _ => Payload::Pong { timestamp },
                }
            }
            PayloadKind::Hello => {
                // id + description length prefix
                let min = NODE_ID_SIZE + 2;
                if body.len() < min {
                    return Err(WireError::PayloadLength {
                        kind,
                        expected: min,
                        got: body.len(),
                    });
                }
                let mut id = [0u8; NODE_ID_SIZE];
                id.copy_from_slice(&body[..NODE_ID_SIZE]);
                let desc_len =
                    u16::from_be_bytes([body[NODE_ID_SIZE], body[NODE_ID_SIZE + 1]]) as usize;
                let desc_bytes = &body[min..];
                if desc_bytes.len() < desc_len {
                    return Err(WireError::PayloadLength {
                        kind,
                        expected: min + desc_len,
                        got: body.len(),
                    });
                }
                if desc_bytes.len() > desc_len {
                    return Err(WireError::TrailingBytes(desc_bytes.len() - desc_len));
                }
                let description = String::from_utf8(desc_bytes.to_vec())?;
                Payload::Hello { id, description }
            }
        };

        Ok(Self {
            source_service,
            opcode,
            correlation,
            payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_ping_timestamps() {
        for timestamp in [0u64, 1, u64::MAX] {
            let env = Envelope::new(ServiceKind::Core, Payload::Ping { timestamp });
            let decoded = Envelope::decode(&env.encode().expect("encode")).expect("decode failed");
            assert_eq!(decoded.payload, Payload::Ping { timestamp });
            assert_eq!(decoded.source_service, ServiceKind::Core);
            assert_eq!(decoded.opcode, 0);
            assert_eq!(decoded.correlation, 0);
        }
    }

    #[test]
    fn roundtrip_pong() {
        let env = Envelope::new(ServiceKind::Core, Payload::Pong { timestamp: 77 });
        let decoded = Envelope::decode(&env.encode().expect("encode")).expect("decode failed");
        assert_eq!(decoded.payload, Payload::Pong { timestamp: 77 });
    }

    #[test]
    fn roundtrip_hello() {
        let env = Envelope::new(
            ServiceKind::Core,
            Payload::Hello {
                id: [7u8; NODE_ID_SIZE],
                description: "gateway-01".into(),
            },
        );
        let decoded = Envelope::decode(&env.encode().expect("encode")).expect("decode failed");
        assert_eq!(decoded.payload, env.payload);
    }

    #[test]
    fn ping_is_header_plus_timestamp() {
        let env = Envelope::new(ServiceKind::Core, Payload::Ping { timestamp: 1 });
        assert_eq!(env.encode().expect("encode").len(), HEADER_SIZE + TIMESTAMP_SIZE);
    }

    #[test]
    fn rejects_short_message() {
        assert!(matches!(
            Envelope::decode(&[0; 3]),
            Err(WireError::TooShort(3))
        ));
    }

    #[test]
    fn rejects_unknown_payload_kind() {
        let mut data = Envelope::new(ServiceKind::Core, Payload::Ping { timestamp: 0 }).encode().expect("encode");
        data[5] = 99;
        assert!(matches!(
            Envelope::decode(&data),
            Err(WireError::UnknownPayloadKind(99))
        ));
    }

    #[test]
    fn rejects_unknown_service() {
        let mut data = Envelope::new(ServiceKind::Core, Payload::Ping { timestamp: 0 }).encode().expect("encode");
        data[0] = 0xEE;
        assert!(matches!(
            Envelope::decode(&data),
            Err(WireError::UnknownService(0xEE))
        ));
    }

    #[test]
    fn rejects_truncated_ping_payload() {
        let mut data = Envelope::new(ServiceKind::Core, Payload::Ping { timestamp: 5 }).encode().expect("encode");
        data.truncate(data.len() - 1);
        assert!(matches!(
            Envelope::decode(&data),
            Err(WireError::PayloadLength { .. })
        ));
    }

    #[test]
    fn rejects_trailing_bytes() {
        let mut data = Envelope::new(ServiceKind::Core, Payload::Pong { timestamp: 5 }).encode().expect("encode");
        data.push(0);
        assert!(Envelope::decode(&data).is_err());
    }

    #[test]
    fn rejects_kind_payload_mismatch() {
        // A Hello body declared as a Ping must not decode as either.
        let hello = Envelope::new(
            ServiceKind::Core,
            Payload::Hello {
                id: [1u8; NODE_ID_SIZE],
                description: "node".into(),
            },
        );
        let mut data = hello.encode().expect("encode");
        data[5] = PayloadKind::Ping as u8;
        assert!(matches!(
            Envelope::decode(&data),
            Err(WireError::PayloadLength { .. })
        ));
    }

    #[test]
    fn rejects_invalid_utf8_description() {
        let hello = Envelope::new(
            ServiceKind::Core,
            Payload::Hello {
                id: [1u8; NODE_ID_SIZE],
                description: "ab".into(),
            },
        );
        let mut data = hello.encode().expect("encode");
        let len = data.len();
        data[len - 2] = 0xFF;
        data[len - 1] = 0xFE;
        assert!(matches!(
            Envelope::decode(&data),
            Err(WireError::InvalidDescription(_))
        ));
    }

    #[test]
    fn rejects_description_exceeding_length_prefix() {
        let env = Envelope::new(
            ServiceKind::Core,
            Payload::Hello {
                id: [1u8; NODE_ID_SIZE],
                description: "x".repeat(u16::MAX as usize + 1),
            },
        );
        assert!(matches!(
            env.encode(),
            Err(WireError::DescriptionTooLong(n)) if n == u16::MAX as usize + 1
        ));

        // The maximum representable length still encodes.
        let env = Envelope::new(
            ServiceKind::Core,
            Payload::Hello {
                id: [1u8; NODE_ID_SIZE],
                description: "x".repeat(u16::MAX as usize),
            },
        );
        assert!(env.encode().is_ok());
    }

    #[test]
    fn reserved_fields_roundtrip() {
        let mut env = Envelope::new(ServiceKind::Realm, Payload::Ping { timestamp: 9 });
        env.opcode = 0x1234;
        env.correlation = 0x5678;
        let decoded = Envelope::decode(&env.encode().expect("encode")).expect("decode failed");
        assert_eq!(decoded.opcode, 0x1234);
        assert_eq!(decoded.correlation, 0x5678);
        assert_eq!(decoded.source_service, ServiceKind::Realm);
    }
}
