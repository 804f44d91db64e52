use crate::errors::{ErrorKind, NestError, NestResult};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Encodes a record for storage.
pub(crate) fn encode<T: Serialize>(value: &T) -> NestResult<Vec<u8>> {
    bincode::serde::encode_to_vec(value, bincode::config::legacy()).map_err(|e| {
        log::error!("Failed to encode record: {}", e);
        NestError::new(
            &format!("Failed to encode record: {}", e),
            ErrorKind::EncodingError,
        )
    })
}

/// Decodes a record read back from storage.
pub(crate) fn decode<T: DeserializeOwned>(bytes: &[u8]) -> NestResult<T> {
    bincode::serde::decode_from_slice(bytes, bincode::config::legacy())
        .map(|(value, _)| value)
        .map_err(|e| {
            log::error!("Failed to decode record: {}", e);
            NestError::new(
                &format!("Failed to decode record: {}", e),
                ErrorKind::EncodingError,
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::{Document, NestId};
    use crate::doc;
    use chrono::{TimeZone, Utc};

    #[test]
    fn documents_survive_storage_encoding() {
        let date = Utc.with_ymd_and_hms(2024, 2, 29, 12, 0, 0).unwrap();
        let mut doc = doc! {
            name: "Ada",
            age: 36u8,
            scores: [1.5, 2, "x"],
            nested: { flag: true, raw: (vec![0u8, 255].as_slice()) },
            born: date,
        };
        doc.put("_id", NestId::from(42)).unwrap();

        let bytes = encode(&doc).unwrap();
        let decoded: Document = decode(&bytes).unwrap();
        assert_eq!(decoded, doc);
        assert_eq!(decoded.fields(), doc.fields());
        assert!(matches!(decoded.field("age"), Some(crate::common::Value::U8(36))));
    }

    #[test]
    fn corrupt_bytes_fail_with_encoding_error() {
        let err = decode::<Document>(&[0xFF, 0xFF, 0xFF]).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::EncodingError);
    }
}
