//! Store RPC frames, carried over length-prefixed TCP
use std::net::IpAddr;

use bincode::{Decode, Encode};

#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub enum StoreOp {
    Keys,
    Get {
        key: IpAddr,
    },
    InsertIfAbsent {
        key: IpAddr,
        value: String,
        ttl_ms: u64,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct StoreRequest {
    /// Name of the store the caller expects to reach
    pub store: String,
    pub op: StoreOp,
}

#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub enum StoreResponse {
    Keys(Vec<IpAddr>),
    Value(String),
    NotFound,
    Inserted(bool),
    Error(String),
}

impl StoreRequest {
    pub fn new(store: impl Into<String>, op: StoreOp) -> Self {
        Self {
            store: store.into(),
            op,
        }
    }

    pub fn serialize(&self) -> Result<Vec<u8>, bincode::error::EncodeError> {
        let config = bincode::config::standard().with_big_endian();
        bincode::encode_to_vec(self, config)
    }

    pub fn deserialize(data: &[u8]) -> Result<Self, bincode::error::DecodeError> {
        let config = bincode::config::standard().with_big_endian();
        let (result, _) = bincode::decode_from_slice(data, config)?;
        Ok(result)
    }
}

impl StoreResponse {
    pub fn serialize(&self) -> Result<Vec<u8>, bincode::error::EncodeError> {
        let config = bincode::config::standard().with_big_endian();
        bincode::encode_to_vec(self, config)
    }

    pub fn deserialize(data: &[u8]) -> Result<Self, bincode::error::DecodeError> {
        let config = bincode::config::standard().with_big_endian();
        let (result, _) = bincode::decode_from_slice(data, config)?;
        Ok(result)
    }
}
