//! Hand-authored Telegram MTProto TL types: the handshake constructors and
//! the session-control objects a dispatcher must recognize on its own.
//!
//! Unlike a schema-driven client, this crate does not attempt to cover the
//! full Telegram API surface — generating and maintaining thousands of
//! request/response wrapper types is left to callers who need them. What's
//! here is the closed set the transport layer itself depends on.
//!
//! # Overview
//!
//! | Module        | Contents                                                      |
//! |---------------|----------------------------------------------------------------|
//! | [`types`]     | Concrete constructors (bare types) used by the handshake        |
//! | [`functions`] | RPC functions as `struct`s implementing [`RemoteCall`]          |
//! | [`enums`]     | Boxed handshake types as `enum`s implementing [`Deserializable`] |
//! | [`object`]    | Dynamic session objects + the [`object::Object`] root sum type  |

#![deny(unsafe_code)]
#![allow(clippy::large_enum_variant)]

pub mod deserialize;
pub mod enums;
pub mod functions;
pub mod object;
pub mod serialize;
pub mod types;

pub use deserialize::{Cursor, Deserializable};
pub use object::Object;
pub use serialize::Serializable;

/// Bare vector — `vector` (lowercase) as opposed to the boxed `Vector`.
///
/// Used in rare cases where Telegram sends a length-prefixed list without
/// the usual `0x1cb5c415` constructor ID header.
#[derive(Clone, Debug, PartialEq)]
pub struct RawVec<T>(pub Vec<T>);

// ─── Core traits ──────────────────────────────────────────────────────────────

/// Every generated type has a unique 32-bit constructor ID.
pub trait Identifiable {
    /// The constructor ID as specified in the TL schema.
    const CONSTRUCTOR_ID: u32;
}

/// Marks a function type that can be sent to Telegram as an RPC call.
///
/// `Return` is the type Telegram will respond with.
pub trait RemoteCall: Serializable {
    /// The deserialized response type.
    type Return: Deserializable;
}
