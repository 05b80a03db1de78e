//! CBOR encoding of ledger records.
//!
//! Thin wrappers over [`ciborium`] that map failures into [`StoreError`].

use serde::{de::DeserializeOwned, Serialize};

use crate::{Result, StoreError};

/// Serialize a value to CBOR bytes.
///
/// # Errors
///
/// Returns [`StoreError::Serialization`] if the value cannot be serialized.
pub fn to_vec<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf)
        .map_err(|e| StoreError::Serialization(format!("CBOR serialization failed: {e}")))?;
    Ok(buf)
}

/// Deserialize a value from CBOR bytes.
///
/// # Errors
///
/// Returns [`StoreError::Deserialization`] if the bytes do not decode into `T`.
pub fn from_slice<T: DeserializeOwned>(data: &[u8]) -> Result<T> {
    ciborium::from_reader(data)
        .map_err(|e| StoreError::Deserialization(format!("CBOR deserialization failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Record {
        period: u64,
        ratio: String,
    }

    #[test]
    fn test_decode_encoded_record() {
        let record = Record {
            period: 7,
            ratio: "0.25".to_string(),
        };
        let bytes = to_vec(&record).expect("serialize");
        let restored: Record = from_slice(&bytes).expect("deserialize");
        assert_eq!(restored, record);
    }

    #[test]
    fn test_invalid_data_returns_error() {
        let result: Result<Record> = from_slice(&[0xFF, 0xFF, 0xFF]);
        assert!(matches!(result, Err(StoreError::Deserialization(_))));
    }

    #[test]
    fn test_cbor_is_compact() {
        let record = Record {
            period: 1,
            ratio: String::new(),
        };
        let cbor = to_vec(&record).expect("serialize");
        let json = serde_json::to_vec(&record).expect("serialize json");
        assert!(cbor.len() <= json.len());
    }
}
