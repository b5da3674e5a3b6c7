//! MTProto session, transport, and dispatch.
//!
//! This crate handles:
//! * Message framing (sequence numbers, message IDs)
//! * Plaintext transport (for the initial handshake / key exchange)
//! * The encrypted session (MTProto 2.0 envelope) once an auth key exists
//! * Intermediate-mode frame transport over a `tokio::net::TcpStream`
//! * The concurrent dispatcher tying all of the above into a running session

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod authentication;
pub mod dispatcher;
pub mod encrypted;
pub mod message;
pub mod session;
pub mod transport;

pub use message::{Message, MessageId};
pub use session::Session;
pub use encrypted::EncryptedSession;
pub use authentication::{Finished, PublicKeys, StaticKeyRing, step1, step2, step3, finish};
pub use dispatcher::{Dispatcher, DcList, StaticDcList, SessionStore, UpdateHandler};
pub use transport::{FrameReader, FrameWriter};
