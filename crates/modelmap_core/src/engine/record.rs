//! Commit log records and CBOR helpers.

use crate::entity::EntityKey;
use crate::error::{CoreError, CoreResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Magic bytes opening every commit log frame.
pub const LOG_MAGIC: [u8; 4] = *b"MMCL";

/// A single write staged by a session flush.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    /// Insert or replace the payload of an entity.
    Put {
        /// Entity being written.
        key: EntityKey,
        /// Encoded entity.
        payload: Vec<u8>,
    },
    /// Remove an entity.
    Delete {
        /// Entity being removed.
        key: EntityKey,
    },
}

impl WriteOp {
    /// Key the operation applies to.
    #[must_use]
    pub fn key(&self) -> &EntityKey {
        match self {
            Self::Put { key, .. } | Self::Delete { key } => key,
        }
    }
}

/// A record in the commit log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogRecord {
    /// Start of a committed batch.
    Begin {
        /// Transaction ID.
        txid: u64,
    },
    /// Entity written by the batch.
    Put {
        /// Transaction ID.
        txid: u64,
        /// Entity key.
        key: EntityKey,
        /// Encoded entity.
        payload: Vec<u8>,
    },
    /// Entity removed by the batch.
    Delete {
        /// Transaction ID.
        txid: u64,
        /// Entity key.
        key: EntityKey,
    },
    /// End of a batch; everything since `Begin` is durable.
    Commit {
        /// Transaction ID.
        txid: u64,
        /// Sequence number assigned to the batch.
        sequence: u64,
    },
}

impl LogRecord {
    /// Transaction the record belongs to.
    #[must_use]
    pub fn txid(&self) -> u64 {
        match self {
            Self::Begin { txid }
            | Self::Put { txid, .. }
            | Self::Delete { txid, .. }
            | Self::Commit { txid, .. } => *txid,
        }
    }

    /// Builds the log record for a staged write.
    #[must_use]
    pub fn from_write(txid: u64, op: &WriteOp) -> Self {
        match op {
            WriteOp::Put { key, payload } => Self::Put {
                txid,
                key: key.clone(),
                payload: payload.clone(),
            },
            WriteOp::Delete { key } => Self::Delete {
                txid,
                key: key.clone(),
            },
        }
    }
}

/// Encodes a value as CBOR.
///
/// # Errors
///
/// Returns [`CoreError::Codec`] if serialization fails.
pub fn encode_cbor<T: Serialize + ?Sized>(value: &T) -> CoreResult<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf).map_err(|e| CoreError::codec(e.to_string()))?;
    Ok(buf)
}

/// Decodes a CBOR value.
///
/// # Errors
///
/// Returns [`CoreError::Codec`] if the bytes are not a valid encoding of `T`.
pub fn decode_cbor<T: DeserializeOwned>(bytes: &[u8]) -> CoreResult<T> {
    ciborium::from_reader(bytes).map_err(|e| CoreError::codec(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityId;

    #[test]
    fn txid_of_every_variant() {
        let key = EntityKey::new("User", EntityId::new());
        let records = [
            LogRecord::Begin { txid: 4 },
            LogRecord::Put {
                txid: 4,
                key: key.clone(),
                payload: vec![1],
            },
            LogRecord::Delete { txid: 4, key },
            LogRecord::Commit {
                txid: 4,
                sequence: 1,
            },
        ];
        assert!(records.iter().all(|r| r.txid() == 4));
    }

    #[test]
    fn from_write_keeps_payload() {
        let key = EntityKey::new("User", EntityId::new());
        let op = WriteOp::Put {
            key: key.clone(),
            payload: vec![9, 9],
        };
        assert_eq!(op.key(), &key);
        assert_eq!(
            LogRecord::from_write(2, &op),
            LogRecord::Put {
                txid: 2,
                key,
                payload: vec![9, 9]
            }
        );
    }

    #[test]
    fn record_survives_cbor() {
        let record = LogRecord::Commit {
            txid: 11,
            sequence: 3,
        };
        let bytes = encode_cbor(&record).unwrap();
        assert_eq!(decode_cbor::<LogRecord>(&bytes).unwrap(), record);
    }

    #[test]
    fn garbage_fails_to_decode() {
        assert!(matches!(
            decode_cbor::<LogRecord>(&[0xff, 0x00, 0x13]),
            Err(CoreError::Codec { .. })
        ));
    }
}
