//! Dynamic top-level objects: the session-control messages a dispatcher
//! must recognize without the caller telling it what to expect, plus the
//! catch-all [`Object::Unknown`] variant for everything else.
//!
//! Application responses never flow through here — a caller that knows
//! which [`crate::RemoteCall`] it sent decodes `T::Return` directly. This
//! module exists for the handful of constructors that arrive unsolicited
//! (`new_session_created`, `bad_server_salt`, …) or that wrap another
//! object recursively (`msg_container`, `gzip_packed`, `rpc_result`).

use crate::deserialize::{Buffer, Deserializable, Error};
use crate::serialize::Serializable;
use crate::{Cursor, Identifiable};

/// `rpc_result#f35c6d01 req_msg_id:long result:Object = RpcResult`
///
/// `result` is left undecoded: its schema depends on which request
/// `req_msg_id` correlates to, which only the dispatcher's correlation
/// table knows.
#[derive(Clone, Debug, PartialEq)]
pub struct RpcResult {
    pub req_msg_id: i64,
    pub result: Vec<u8>,
}

impl Identifiable for RpcResult {
    const CONSTRUCTOR_ID: u32 = 0xf35c6d01;
}

impl Deserializable for RpcResult {
    fn deserialize(buf: Buffer) -> Result<Self, Error> {
        let req_msg_id = i64::deserialize(buf)?;
        let mut result = Vec::with_capacity(buf.remaining());
        buf.read_to_end(&mut result);
        Ok(Self { req_msg_id, result })
    }
}

/// `rpc_error#2144ca19 error_code:int error_message:string = RpcError`
#[derive(Clone, Debug, PartialEq)]
pub struct RpcError {
    pub error_code: i32,
    pub error_message: String,
}

impl Identifiable for RpcError {
    const CONSTRUCTOR_ID: u32 = 0x2144ca19;
}

impl Serializable for RpcError {
    fn serialize(&self, buf: &mut impl Extend<u8>) {
        self.error_code.serialize(buf);
        self.error_message.serialize(buf);
    }
}

impl Deserializable for RpcError {
    fn deserialize(buf: Buffer) -> Result<Self, Error> {
        Ok(Self {
            error_code: Deserializable::deserialize(buf)?,
            error_message: Deserializable::deserialize(buf)?,
        })
    }
}

/// One message inside a [`MsgContainer`]. Unlike top-level frames, a
/// contained message's body is a raw length-prefixed blob, not a TL string
/// (no padding, no size cap).
#[derive(Clone, Debug, PartialEq)]
pub struct ContainerMessage {
    pub msg_id: i64,
    pub seq_no: i32,
    pub body: Vec<u8>,
}

/// `msg_container#73f1f8dc messages:vector<%Message> = MessageContainer`
#[derive(Clone, Debug, PartialEq)]
pub struct MsgContainer {
    pub messages: Vec<ContainerMessage>,
}

impl Identifiable for MsgContainer {
    const CONSTRUCTOR_ID: u32 = 0x73f1f8dc;
}

impl Deserializable for MsgContainer {
    fn deserialize(buf: Buffer) -> Result<Self, Error> {
        let count = i32::deserialize(buf)? as usize;
        let mut messages = Vec::with_capacity(count);
        for _ in 0..count {
            let msg_id = i64::deserialize(buf)?;
            let seq_no = i32::deserialize(buf)?;
            let len = i32::deserialize(buf)? as usize;
            let mut body = vec![0u8; len];
            buf.read_exact(&mut body)?;
            messages.push(ContainerMessage { msg_id, seq_no, body });
        }
        Ok(Self { messages })
    }
}

impl Serializable for MsgContainer {
    fn serialize(&self, buf: &mut impl Extend<u8>) {
        (self.messages.len() as i32).serialize(buf);
        for m in &self.messages {
            m.msg_id.serialize(buf);
            m.seq_no.serialize(buf);
            (m.body.len() as i32).serialize(buf);
            buf.extend(m.body.iter().copied());
        }
    }
}

/// `gzip_packed#3072cfa1 packed_data:string = Object`
#[derive(Clone, Debug, PartialEq)]
pub struct GzipPacked {
    pub packed_data: Vec<u8>,
}

impl Identifiable for GzipPacked {
    const CONSTRUCTOR_ID: u32 = 0x3072cfa1;
}

impl Serializable for GzipPacked {
    fn serialize(&self, buf: &mut impl Extend<u8>) {
        self.packed_data.serialize(buf);
    }
}

impl Deserializable for GzipPacked {
    fn deserialize(buf: Buffer) -> Result<Self, Error> {
        Ok(Self { packed_data: Deserializable::deserialize(buf)? })
    }
}

/// `pong#347773c5 msg_id:long ping_id:long = Pong`
#[derive(Clone, Debug, PartialEq)]
pub struct Pong {
    pub msg_id: i64,
    pub ping_id: i64,
}

impl Identifiable for Pong {
    const CONSTRUCTOR_ID: u32 = 0x347773c5;
}

impl Deserializable for Pong {
    fn deserialize(buf: Buffer) -> Result<Self, Error> {
        Ok(Self {
            msg_id: Deserializable::deserialize(buf)?,
            ping_id: Deserializable::deserialize(buf)?,
        })
    }
}

/// `bad_server_salt#edab447b bad_msg_id:long bad_msg_seqno:int error_code:int new_server_salt:long = BadMsgNotification`
#[derive(Clone, Debug, PartialEq)]
pub struct BadServerSalt {
    pub bad_msg_id: i64,
    pub bad_msg_seqno: i32,
    pub error_code: i32,
    pub new_server_salt: i64,
}

impl Identifiable for BadServerSalt {
    const CONSTRUCTOR_ID: u32 = 0xedab447b;
}

impl Deserializable for BadServerSalt {
    fn deserialize(buf: Buffer) -> Result<Self, Error> {
        Ok(Self {
            bad_msg_id: Deserializable::deserialize(buf)?,
            bad_msg_seqno: Deserializable::deserialize(buf)?,
            error_code: Deserializable::deserialize(buf)?,
            new_server_salt: Deserializable::deserialize(buf)?,
        })
    }
}

/// `bad_msg_notification#a7eff811 bad_msg_id:long bad_msg_seqno:int error_code:int = BadMsgNotification`
#[derive(Clone, Debug, PartialEq)]
pub struct BadMsgNotification {
    pub bad_msg_id: i64,
    pub bad_msg_seqno: i32,
    pub error_code: i32,
}

impl Identifiable for BadMsgNotification {
    const CONSTRUCTOR_ID: u32 = 0xa7eff811;
}

impl Deserializable for BadMsgNotification {
    fn deserialize(buf: Buffer) -> Result<Self, Error> {
        Ok(Self {
            bad_msg_id: Deserializable::deserialize(buf)?,
            bad_msg_seqno: Deserializable::deserialize(buf)?,
            error_code: Deserializable::deserialize(buf)?,
        })
    }
}

/// `new_session_created#9ec20908 first_msg_id:long unique_id:long server_salt:long = NewSession`
#[derive(Clone, Debug, PartialEq)]
pub struct NewSessionCreated {
    pub first_msg_id: i64,
    pub unique_id: i64,
    pub server_salt: i64,
}

impl Identifiable for NewSessionCreated {
    const CONSTRUCTOR_ID: u32 = 0x9ec20908;
}

impl Deserializable for NewSessionCreated {
    fn deserialize(buf: Buffer) -> Result<Self, Error> {
        Ok(Self {
            first_msg_id: Deserializable::deserialize(buf)?,
            unique_id: Deserializable::deserialize(buf)?,
            server_salt: Deserializable::deserialize(buf)?,
        })
    }
}

// ─── Root sum type ──────────────────────────────────────────────────────────

/// Anything that can arrive as a decrypted message body, decoded without
/// foreknowledge of its type.
#[derive(Clone, Debug, PartialEq)]
pub enum Object {
    RpcResult(RpcResult),
    RpcError(RpcError),
    MsgContainer(MsgContainer),
    GzipPacked(GzipPacked),
    Pong(Pong),
    MsgsAck(crate::functions::MsgsAck),
    BadServerSalt(BadServerSalt),
    BadMsgNotification(BadMsgNotification),
    NewSessionCreated(NewSessionCreated),
    /// A constructor not in the registry above. Carries the raw tag and the
    /// bytes that followed it so a caller-supplied handler can still act on
    /// it (spec-external response/update types fall here).
    Unknown { tag: u32, raw: Vec<u8> },
}

/// Controls how [`decode_any_hinted`] treats a buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObjectHint {
    /// Attempt full registry resolution (same as [`decode_any`]).
    Any,
    /// Skip resolution entirely; return `Unknown { tag, raw }` regardless of
    /// whether the tag is registered. Used by the dispatcher when the
    /// correlation table already names the concrete `RemoteCall::Return`
    /// the caller will decode itself.
    RawBytes,
}

/// Decode one object, consulting the constructor registry.
pub fn decode_any(buf: &mut Cursor<'_>) -> Result<Object, Error> {
    decode_any_hinted(buf, ObjectHint::Any)
}

/// Decode one object, optionally bypassing registry resolution.
pub fn decode_any_hinted(buf: &mut Cursor<'_>, hint: ObjectHint) -> Result<Object, Error> {
    let tag = u32::deserialize(buf)?;

    if hint == ObjectHint::RawBytes {
        let mut raw = Vec::with_capacity(buf.remaining());
        buf.read_to_end(&mut raw);
        return Ok(Object::Unknown { tag, raw });
    }

    macro_rules! body {
        ($ty:ty, $variant:expr) => {{
            let value = <$ty as Deserializable>::deserialize(buf)?;
            return Ok($variant(value));
        }};
    }

    match tag {
        RpcResult::CONSTRUCTOR_ID => body!(RpcResult, Object::RpcResult),
        RpcError::CONSTRUCTOR_ID => body!(RpcError, Object::RpcError),
        MsgContainer::CONSTRUCTOR_ID => body!(MsgContainer, Object::MsgContainer),
        GzipPacked::CONSTRUCTOR_ID => body!(GzipPacked, Object::GzipPacked),
        Pong::CONSTRUCTOR_ID => body!(Pong, Object::Pong),
        <crate::functions::MsgsAck as Identifiable>::CONSTRUCTOR_ID => {
            let msg_ids = Deserializable::deserialize(buf)?;
            Ok(Object::MsgsAck(crate::functions::MsgsAck { msg_ids }))
        }
        BadServerSalt::CONSTRUCTOR_ID => body!(BadServerSalt, Object::BadServerSalt),
        BadMsgNotification::CONSTRUCTOR_ID => body!(BadMsgNotification, Object::BadMsgNotification),
        NewSessionCreated::CONSTRUCTOR_ID => body!(NewSessionCreated, Object::NewSessionCreated),
        other => {
            let mut raw = Vec::with_capacity(buf.remaining());
            buf.read_to_end(&mut raw);
            Ok(Object::Unknown { tag: other, raw })
        }
    }
}
