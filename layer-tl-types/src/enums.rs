//! Boxed (tagged) sum types used during key exchange.
//!
//! Each of these reads/writes its own 4-byte constructor tag ahead of the
//! bare fields defined in [`crate::types`]. Most only have one constructor
//! in this crate's scope — they are still modeled as enums, matching how a
//! boxed TL type is represented, rather than collapsed to a struct, so a
//! future constructor can be added without breaking callers.

use crate::deserialize::{Buffer, Deserializable, Error};
use crate::serialize::Serializable;
use crate::types;
use crate::Identifiable;

macro_rules! single_variant_enum {
    ($enum_name:ident, $variant:ident, $inner:ty) => {
        #[derive(Clone, Debug, PartialEq)]
        pub enum $enum_name {
            $variant($inner),
        }

        impl Serializable for $enum_name {
            fn serialize(&self, buf: &mut impl Extend<u8>) {
                let Self::$variant(inner) = self;
                <$inner as Identifiable>::CONSTRUCTOR_ID.serialize(buf);
                inner.serialize(buf);
            }
        }

        impl Deserializable for $enum_name {
            fn deserialize(buf: Buffer) -> Result<Self, Error> {
                let id = u32::deserialize(buf)?;
                match id {
                    <$inner as Identifiable>::CONSTRUCTOR_ID => {
                        Ok(Self::$variant(<$inner as Deserializable>::deserialize(buf)?))
                    }
                    other => Err(Error::UnexpectedConstructor { id: other }),
                }
            }
        }
    };
}

single_variant_enum!(ResPq, ResPq, types::ResPq);
single_variant_enum!(PqInnerData, PqInnerData, types::PqInnerData);
single_variant_enum!(ServerDhInnerData, ServerDhInnerData, types::ServerDhInnerData);
single_variant_enum!(ClientDhInnerData, ClientDhInnerData, types::ClientDhInnerData);

/// `Server_DH_Params` — either `server_DH_params_ok` or `server_DH_params_fail`.
#[derive(Clone, Debug, PartialEq)]
pub enum ServerDhParams {
    Ok(types::ServerDhParamsOk),
    Fail(types::ServerDhParamsFail),
}

impl Serializable for ServerDhParams {
    fn serialize(&self, buf: &mut impl Extend<u8>) {
        match self {
            Self::Ok(x) => {
                types::ServerDhParamsOk::CONSTRUCTOR_ID.serialize(buf);
                x.serialize(buf);
            }
            Self::Fail(x) => {
                types::ServerDhParamsFail::CONSTRUCTOR_ID.serialize(buf);
                x.serialize(buf);
            }
        }
    }
}

impl Deserializable for ServerDhParams {
    fn deserialize(buf: Buffer) -> Result<Self, Error> {
        let id = u32::deserialize(buf)?;
        match id {
            types::ServerDhParamsOk::CONSTRUCTOR_ID => {
                Ok(Self::Ok(types::ServerDhParamsOk::deserialize(buf)?))
            }
            types::ServerDhParamsFail::CONSTRUCTOR_ID => {
                Ok(Self::Fail(types::ServerDhParamsFail::deserialize(buf)?))
            }
            other => Err(Error::UnexpectedConstructor { id: other }),
        }
    }
}

/// `Set_client_DH_params_answer` — `dh_gen_ok` / `dh_gen_retry` / `dh_gen_fail`.
#[derive(Clone, Debug, PartialEq)]
pub enum SetClientDhParamsAnswer {
    DhGenOk(types::DhGenOk),
    DhGenRetry(types::DhGenRetry),
    DhGenFail(types::DhGenFail),
}

impl Serializable for SetClientDhParamsAnswer {
    fn serialize(&self, buf: &mut impl Extend<u8>) {
        match self {
            Self::DhGenOk(x) => {
                types::DhGenOk::CONSTRUCTOR_ID.serialize(buf);
                x.serialize(buf);
            }
            Self::DhGenRetry(x) => {
                types::DhGenRetry::CONSTRUCTOR_ID.serialize(buf);
                x.serialize(buf);
            }
            Self::DhGenFail(x) => {
                types::DhGenFail::CONSTRUCTOR_ID.serialize(buf);
                x.serialize(buf);
            }
        }
    }
}

impl Deserializable for SetClientDhParamsAnswer {
    fn deserialize(buf: Buffer) -> Result<Self, Error> {
        let id = u32::deserialize(buf)?;
        match id {
            types::DhGenOk::CONSTRUCTOR_ID => {
                Ok(Self::DhGenOk(types::DhGenOk::deserialize(buf)?))
            }
            types::DhGenRetry::CONSTRUCTOR_ID => {
                Ok(Self::DhGenRetry(types::DhGenRetry::deserialize(buf)?))
            }
            types::DhGenFail::CONSTRUCTOR_ID => {
                Ok(Self::DhGenFail(types::DhGenFail::deserialize(buf)?))
            }
            other => Err(Error::UnexpectedConstructor { id: other }),
        }
    }
}
