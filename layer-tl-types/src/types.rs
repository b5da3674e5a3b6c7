//! Concrete (bare) TL constructors used during key exchange.
//!
//! These mirror the `resPQ` / `p_q_inner_data` / `server_DH_params_*` /
//! `server_DH_inner_data` / `client_DH_inner_data` / `dh_gen_*` constructors
//! of the MTProto schema. Each is `Identifiable` (carries the constructor's
//! 32-bit tag) and implements `Serializable` + `Deserializable` directly —
//! there is no schema file or code generator behind them, they're written
//! by hand against the handful of constructors the handshake actually uses.

use crate::deserialize::{Buffer, Deserializable, Error};
use crate::serialize::Serializable;
use crate::Identifiable;

/// `resPQ#05162463 nonce:int128 server_nonce:int128 pq:string server_public_key_fingerprints:Vector<long> = ResPQ`
#[derive(Clone, Debug, PartialEq)]
pub struct ResPq {
    pub nonce: [u8; 16],
    pub server_nonce: [u8; 16],
    pub pq: Vec<u8>,
    pub server_public_key_fingerprints: Vec<i64>,
}

impl Identifiable for ResPq {
    const CONSTRUCTOR_ID: u32 = 0x05162463;
}

impl Serializable for ResPq {
    fn serialize(&self, buf: &mut impl Extend<u8>) {
        self.nonce.serialize(buf);
        self.server_nonce.serialize(buf);
        self.pq.serialize(buf);
        self.server_public_key_fingerprints.serialize(buf);
    }
}

impl Deserializable for ResPq {
    fn deserialize(buf: Buffer) -> Result<Self, Error> {
        Ok(Self {
            nonce: Deserializable::deserialize(buf)?,
            server_nonce: Deserializable::deserialize(buf)?,
            pq: Deserializable::deserialize(buf)?,
            server_public_key_fingerprints: Deserializable::deserialize(buf)?,
        })
    }
}

/// `p_q_inner_data#83c95aec pq:string p:string q:string nonce:int128 server_nonce:int128 new_nonce:int256 = P_Q_inner_data`
#[derive(Clone, Debug, PartialEq)]
pub struct PqInnerData {
    pub pq: Vec<u8>,
    pub p: Vec<u8>,
    pub q: Vec<u8>,
    pub nonce: [u8; 16],
    pub server_nonce: [u8; 16],
    pub new_nonce: [u8; 32],
}

impl Identifiable for PqInnerData {
    const CONSTRUCTOR_ID: u32 = 0x83c95aec;
}

impl Serializable for PqInnerData {
    fn serialize(&self, buf: &mut impl Extend<u8>) {
        self.pq.serialize(buf);
        self.p.serialize(buf);
        self.q.serialize(buf);
        self.nonce.serialize(buf);
        self.server_nonce.serialize(buf);
        self.new_nonce.serialize(buf);
    }
}

impl Deserializable for PqInnerData {
    fn deserialize(buf: Buffer) -> Result<Self, Error> {
        Ok(Self {
            pq: Deserializable::deserialize(buf)?,
            p: Deserializable::deserialize(buf)?,
            q: Deserializable::deserialize(buf)?,
            nonce: Deserializable::deserialize(buf)?,
            server_nonce: Deserializable::deserialize(buf)?,
            new_nonce: Deserializable::deserialize(buf)?,
        })
    }
}

/// `server_DH_params_fail#79cb045d nonce:int128 server_nonce:int128 new_nonce_hash:int128 = Server_DH_Params`
#[derive(Clone, Debug, PartialEq)]
pub struct ServerDhParamsFail {
    pub nonce: [u8; 16],
    pub server_nonce: [u8; 16],
    pub new_nonce_hash: [u8; 16],
}

impl Identifiable for ServerDhParamsFail {
    const CONSTRUCTOR_ID: u32 = 0x79cb045d;
}

impl Serializable for ServerDhParamsFail {
    fn serialize(&self, buf: &mut impl Extend<u8>) {
        self.nonce.serialize(buf);
        self.server_nonce.serialize(buf);
        self.new_nonce_hash.serialize(buf);
    }
}

impl Deserializable for ServerDhParamsFail {
    fn deserialize(buf: Buffer) -> Result<Self, Error> {
        Ok(Self {
            nonce: Deserializable::deserialize(buf)?,
            server_nonce: Deserializable::deserialize(buf)?,
            new_nonce_hash: Deserializable::deserialize(buf)?,
        })
    }
}

/// `server_DH_params_ok#d0e8075c nonce:int128 server_nonce:int128 encrypted_answer:string = Server_DH_Params`
#[derive(Clone, Debug, PartialEq)]
pub struct ServerDhParamsOk {
    pub nonce: [u8; 16],
    pub server_nonce: [u8; 16],
    pub encrypted_answer: Vec<u8>,
}

impl Identifiable for ServerDhParamsOk {
    const CONSTRUCTOR_ID: u32 = 0xd0e8075c;
}

impl Serializable for ServerDhParamsOk {
    fn serialize(&self, buf: &mut impl Extend<u8>) {
        self.nonce.serialize(buf);
        self.server_nonce.serialize(buf);
        self.encrypted_answer.serialize(buf);
    }
}

impl Deserializable for ServerDhParamsOk {
    fn deserialize(buf: Buffer) -> Result<Self, Error> {
        Ok(Self {
            nonce: Deserializable::deserialize(buf)?,
            server_nonce: Deserializable::deserialize(buf)?,
            encrypted_answer: Deserializable::deserialize(buf)?,
        })
    }
}

/// `server_DH_inner_data#b5890dba nonce:int128 server_nonce:int128 g:int dh_prime:string g_a:string server_time:int = Server_DH_inner_data`
#[derive(Clone, Debug, PartialEq)]
pub struct ServerDhInnerData {
    pub nonce: [u8; 16],
    pub server_nonce: [u8; 16],
    pub g: i32,
    pub dh_prime: Vec<u8>,
    pub g_a: Vec<u8>,
    pub server_time: i32,
}

impl Identifiable for ServerDhInnerData {
    const CONSTRUCTOR_ID: u32 = 0xb5890dba;
}

impl Serializable for ServerDhInnerData {
    fn serialize(&self, buf: &mut impl Extend<u8>) {
        self.nonce.serialize(buf);
        self.server_nonce.serialize(buf);
        self.g.serialize(buf);
        self.dh_prime.serialize(buf);
        self.g_a.serialize(buf);
        self.server_time.serialize(buf);
    }
}

impl Deserializable for ServerDhInnerData {
    fn deserialize(buf: Buffer) -> Result<Self, Error> {
        Ok(Self {
            nonce: Deserializable::deserialize(buf)?,
            server_nonce: Deserializable::deserialize(buf)?,
            g: Deserializable::deserialize(buf)?,
            dh_prime: Deserializable::deserialize(buf)?,
            g_a: Deserializable::deserialize(buf)?,
            server_time: Deserializable::deserialize(buf)?,
        })
    }
}

/// `client_DH_inner_data#6643b654 nonce:int128 server_nonce:int128 retry_id:long g_b:string = Client_DH_Inner_Data`
#[derive(Clone, Debug, PartialEq)]
pub struct ClientDhInnerData {
    pub nonce: [u8; 16],
    pub server_nonce: [u8; 16],
    pub retry_id: i64,
    pub g_b: Vec<u8>,
}

impl Identifiable for ClientDhInnerData {
    const CONSTRUCTOR_ID: u32 = 0x6643b654;
}

impl Serializable for ClientDhInnerData {
    fn serialize(&self, buf: &mut impl Extend<u8>) {
        self.nonce.serialize(buf);
        self.server_nonce.serialize(buf);
        self.retry_id.serialize(buf);
        self.g_b.serialize(buf);
    }
}

impl Deserializable for ClientDhInnerData {
    fn deserialize(buf: Buffer) -> Result<Self, Error> {
        Ok(Self {
            nonce: Deserializable::deserialize(buf)?,
            server_nonce: Deserializable::deserialize(buf)?,
            retry_id: Deserializable::deserialize(buf)?,
            g_b: Deserializable::deserialize(buf)?,
        })
    }
}

/// Shared shape of the three `dh_gen_*` answers — only the tag and the hash
/// field number differ.
macro_rules! dh_gen_answer {
    ($name:ident, $tag:expr, $hash_field:ident) => {
        #[derive(Clone, Debug, PartialEq)]
        pub struct $name {
            pub nonce: [u8; 16],
            pub server_nonce: [u8; 16],
            pub $hash_field: [u8; 16],
        }

        impl Identifiable for $name {
            const CONSTRUCTOR_ID: u32 = $tag;
        }

        impl Serializable for $name {
            fn serialize(&self, buf: &mut impl Extend<u8>) {
                self.nonce.serialize(buf);
                self.server_nonce.serialize(buf);
                self.$hash_field.serialize(buf);
            }
        }

        impl Deserializable for $name {
            fn deserialize(buf: Buffer) -> Result<Self, Error> {
                Ok(Self {
                    nonce: Deserializable::deserialize(buf)?,
                    server_nonce: Deserializable::deserialize(buf)?,
                    $hash_field: Deserializable::deserialize(buf)?,
                })
            }
        }
    };
}

dh_gen_answer!(DhGenOk, 0x3bcbf734, new_nonce_hash1);
dh_gen_answer!(DhGenRetry, 0x46dc1fb9, new_nonce_hash2);
dh_gen_answer!(DhGenFail, 0xa69dae02, new_nonce_hash3);

/// `dcOption#18b7a10d flags:# ipv6:flags.0?true media_only:flags.1?true
/// tcpo_only:flags.2?true cdn:flags.3?true static:flags.4?true
/// this_port_only:flags.5?true id:int ip_address:string port:int
/// secret:flags.10?bytes = DcOption`
///
/// One entry of a data-center address table, as `help.getConfig` would
/// hand back. `flags` itself carries no data once decoded — every bit it
/// sets is mirrored into one of the fields below, so the struct doesn't
/// keep the raw word around.
///
/// This is the one constructor in this crate that mixes scalar-boolean
/// flags (no body, presence *is* the bit) with a non-bool optional
/// (`secret`, whose body follows the flags field only if bit 10 is set).
#[derive(Clone, Debug, PartialEq)]
pub struct DcOption {
    pub ipv6: bool,
    pub media_only: bool,
    pub tcpo_only: bool,
    pub cdn: bool,
    pub is_static: bool,
    pub this_port_only: bool,
    pub id: i32,
    pub ip_address: String,
    pub port: i32,
    pub secret: Option<Vec<u8>>,
}

impl Identifiable for DcOption {
    const CONSTRUCTOR_ID: u32 = 0x18b7a10d;
}

impl Serializable for DcOption {
    fn serialize(&self, buf: &mut impl Extend<u8>) {
        let mut flags: u32 = 0;
        if self.ipv6 { flags |= 1 << 0; }
        if self.media_only { flags |= 1 << 1; }
        if self.tcpo_only { flags |= 1 << 2; }
        if self.cdn { flags |= 1 << 3; }
        if self.is_static { flags |= 1 << 4; }
        if self.this_port_only { flags |= 1 << 5; }
        if self.secret.is_some() { flags |= 1 << 10; }

        Self::CONSTRUCTOR_ID.serialize(buf);
        flags.serialize(buf);
        self.id.serialize(buf);
        self.ip_address.serialize(buf);
        self.port.serialize(buf);
        if let Some(ref secret) = self.secret {
            secret.serialize(buf);
        }
    }
}

impl Deserializable for DcOption {
    fn deserialize(buf: Buffer) -> Result<Self, Error> {
        let tag = u32::deserialize(buf)?;
        if tag != Self::CONSTRUCTOR_ID {
            return Err(Error::UnexpectedConstructor { id: tag });
        }
        let flags = u32::deserialize(buf)?;
        let id = i32::deserialize(buf)?;
        let ip_address = String::deserialize(buf)?;
        let port = i32::deserialize(buf)?;
        let secret = if flags & (1 << 10) != 0 {
            Some(Vec::<u8>::deserialize(buf)?)
        } else {
            None
        };
        Ok(Self {
            ipv6: flags & (1 << 0) != 0,
            media_only: flags & (1 << 1) != 0,
            tcpo_only: flags & (1 << 2) != 0,
            cdn: flags & (1 << 3) != 0,
            is_static: flags & (1 << 4) != 0,
            this_port_only: flags & (1 << 5) != 0,
            id,
            ip_address,
            port,
            secret,
        })
    }
}
