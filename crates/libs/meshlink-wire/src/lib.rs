//! # meshlink-wire
//!
//! Binary envelope format exchanged between meshlink nodes.
//!
//! Every message on a peer link is one envelope. All multi-byte integers
//! are big-endian.
//!
//! ```text
//! [service:1][opcode:2][correlation:2][kind:1][payload:variable]
//!   enum       reserved  reserved       enum    schema fixed by kind
//! ```
//!
//! `opcode` and `correlation` are reserved for request/response layering
//! above the core and are always zero today.
//!
//! ## Example
//!
//! ```rust
//! use meshlink_wire::{Envelope, Payload, ServiceKind};
//!
//! let env = Envelope::new(ServiceKind::Core, Payload::Ping { timestamp: 42 });
//! let bytes = env.encode().unwrap();
//! let decoded = Envelope::decode(&bytes).unwrap();
//! assert_eq!(decoded.payload, Payload::Ping { timestamp: 42 });
//! ```

pub mod envelope;

pub use envelope::{Envelope, Payload, PayloadKind, ServiceKind, WireError};

/// Envelope header size: 1 (service) + 2 (opcode) + 2 (correlation) + 1 (kind).
pub const HEADER_SIZE: usize = 6;

/// Fixed size of a Ping/Pong payload (one u64 timestamp).
pub const TIMESTAMP_SIZE: usize = 8;

/// Node identifier width used by Hello payloads.
pub const NODE_ID_SIZE: usize = 16;
