use super::entry::CacheRecord;
use crate::utils::CodecError;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// On-wire encoding of a `CacheRecord`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordCodec {
    /// Compact binary encoding.
    #[default]
    Bincode,
    /// UTF-8 JSON, readable with any redis-cli style tooling.
    Json,
}

impl RecordCodec {
    pub fn encode<T: Serialize>(&self, record: &CacheRecord<T>) -> Result<Vec<u8>, CodecError> {
        let bytes = match self {
            RecordCodec::Bincode => bincode::serialize(record)?,
            RecordCodec::Json => serde_json::to_vec(record)?,
        };
        Ok(bytes)
    }

    pub fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<CacheRecord<T>, CodecError> {
        let record = match self {
            RecordCodec::Bincode => bincode::deserialize(bytes)?,
            RecordCodec::Json => serde_json::from_slice(bytes)?,
        };
        Ok(record)
    }
}
