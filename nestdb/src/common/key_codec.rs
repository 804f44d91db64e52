//! Order-preserving binary encoding of [`Value`]s.
//!
//! Storage engines order keys by raw bytes. Encoding a value with
//! [`encode_value`] yields bytes whose lexicographic order equals the [`Value`]
//! order, so range scans over a map walk values in their natural order.
//! Every encoding is self-delimiting, which keeps arrays and documents
//! comparable element by element.

use crate::collection::{Document, NestId};
use crate::common::value::sortable_f64;
use crate::common::Value;
use crate::errors::{ErrorKind, NestError, NestResult};

const TAG_ABSENT: u8 = 0x01;
const TAG_NULL: u8 = 0x02;
const TAG_BOOL: u8 = 0x03;
const TAG_NUMBER: u8 = 0x04;
const TAG_CHAR: u8 = 0x05;
const TAG_STRING: u8 = 0x06;
const TAG_DATE_TIME: u8 = 0x07;
const TAG_BYTES: u8 = 0x08;
const TAG_NEST_ID: u8 = 0x09;
const TAG_ARRAY: u8 = 0x0A;
const TAG_DOCUMENT: u8 = 0x0B;

const FIELD_MARKER: u8 = 0x01;
const END_MARKER: u8 = 0x00;

const ESCAPE: u8 = 0x00;
const ESCAPED_ZERO: u8 = 0xFF;
const TERMINATOR: u8 = 0x00;

/// Encodes a value into its order-preserving key form.
pub fn encode_value(value: &Value) -> Vec<u8> {
    let mut buf = Vec::with_capacity(16);
    write_value(&mut buf, value);
    buf
}

/// Key that sorts below every encoded value; marks a missing field.
#[inline]
pub fn encode_absent() -> Vec<u8> {
    vec![TAG_ABSENT]
}

/// Bounds spanning every encoding of values of the same type as `value`:
/// the first is at or below all of them, the second is above all of them.
pub fn type_span(value: &Value) -> (Vec<u8>, Vec<u8>) {
    let tag = type_tag(value);
    (vec![tag], vec![tag + 1])
}

fn type_tag(value: &Value) -> u8 {
    match value {
        Value::Null => TAG_NULL,
        Value::Bool(_) => TAG_BOOL,
        Value::Char(_) => TAG_CHAR,
        Value::String(_) => TAG_STRING,
        Value::DateTime(_) => TAG_DATE_TIME,
        Value::Bytes(_) => TAG_BYTES,
        Value::NestId(_) => TAG_NEST_ID,
        Value::Array(_) => TAG_ARRAY,
        Value::Document(_) => TAG_DOCUMENT,
        _ => TAG_NUMBER,
    }
}

#[inline]
pub fn is_absent_key(key: &[u8]) -> bool {
    key == [TAG_ABSENT]
}

#[inline]
pub fn is_null_key(key: &[u8]) -> bool {
    key == [TAG_NULL]
}

/// Collection map keys are plain big-endian ids, so documents iterate in id order.
#[inline]
pub fn encode_id(id: &NestId) -> Vec<u8> {
    id.value().to_be_bytes().to_vec()
}

pub fn decode_id(bytes: &[u8]) -> NestResult<NestId> {
    let raw: [u8; 8] = bytes.try_into().map_err(|_| {
        log::error!("Invalid id key of length {}", bytes.len());
        NestError::new(
            &format!("Invalid id key of length {}", bytes.len()),
            ErrorKind::EncodingError,
        )
    })?;
    Ok(NestId::from(u64::from_be_bytes(raw)))
}

fn write_value(buf: &mut Vec<u8>, value: &Value) {
    match value {
        Value::Null => buf.push(TAG_NULL),
        Value::Bool(v) => {
            buf.push(TAG_BOOL);
            buf.push(*v as u8);
        }
        Value::Char(v) => {
            buf.push(TAG_CHAR);
            buf.extend_from_slice(&(*v as u32).to_be_bytes());
        }
        Value::String(v) => {
            buf.push(TAG_STRING);
            write_escaped(buf, v.as_bytes());
        }
        Value::DateTime(v) => {
            buf.push(TAG_DATE_TIME);
            let seconds = (v.timestamp() as u64) ^ (1 << 63);
            buf.extend_from_slice(&seconds.to_be_bytes());
            buf.extend_from_slice(&v.timestamp_subsec_nanos().to_be_bytes());
        }
        Value::Bytes(v) => {
            buf.push(TAG_BYTES);
            write_escaped(buf, v);
        }
        Value::NestId(v) => {
            buf.push(TAG_NEST_ID);
            buf.extend_from_slice(&v.value().to_be_bytes());
        }
        Value::Array(items) => {
            buf.push(TAG_ARRAY);
            for item in items {
                write_value(buf, item);
            }
            buf.push(END_MARKER);
        }
        Value::Document(doc) => {
            buf.push(TAG_DOCUMENT);
            write_document(buf, doc);
        }
        number => {
            // only numbers remain
            let (approx, remainder) = number.numeric_key().unwrap_or((sortable_f64(f64::NAN), 0));
            buf.push(TAG_NUMBER);
            buf.extend_from_slice(&approx.to_be_bytes());
            buf.extend_from_slice(&((remainder as u64) ^ (1 << 63)).to_be_bytes());
        }
    }
}

fn write_document(buf: &mut Vec<u8>, doc: &Document) {
    for (key, value) in doc.sorted_entries() {
        buf.push(FIELD_MARKER);
        write_escaped(buf, key.as_bytes());
        write_value(buf, value);
    }
    buf.push(END_MARKER);
}

fn write_escaped(buf: &mut Vec<u8>, bytes: &[u8]) {
    for byte in bytes {
        if *byte == ESCAPE {
            buf.push(ESCAPE);
            buf.push(ESCAPED_ZERO);
        } else {
            buf.push(*byte);
        }
    }
    buf.push(ESCAPE);
    buf.push(TERMINATOR);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{doc, val};
    use chrono::{TimeZone, Utc};

    fn assert_ordered(values: &[Value]) {
        for pair in values.windows(2) {
            assert!(pair[0] < pair[1], "{:?} < {:?}", pair[0], pair[1]);
            assert!(
                encode_value(&pair[0]) < encode_value(&pair[1]),
                "encoding of {:?} should sort below {:?}",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn numbers_encode_in_numeric_order() {
        assert_ordered(&[
            Value::F64(f64::NEG_INFINITY),
            Value::I64(i64::MIN),
            Value::I32(-1000),
            Value::F32(-1.5),
            Value::I8(-1),
            Value::U8(0),
            Value::F64(0.25),
            Value::U16(1),
            Value::F64(1.5),
            Value::I32(2),
            Value::U64((1 << 60) + 1),
            Value::U64(u64::MAX),
            Value::F64(f64::INFINITY),
            Value::F64(f64::NAN),
        ]);
    }

    #[test]
    fn equal_numbers_share_one_encoding() {
        assert_eq!(encode_value(&Value::I32(5)), encode_value(&Value::F64(5.0)));
        assert_eq!(encode_value(&Value::U8(5)), encode_value(&Value::I64(5)));
        assert_eq!(encode_value(&Value::F64(-0.0)), encode_value(&Value::U32(0)));
    }

    #[test]
    fn strings_with_embedded_zero_bytes_keep_order() {
        assert_ordered(&[
            val!(""),
            val!("a"),
            val!("a\0"),
            val!("a\0b"),
            val!("a\u{1}"),
            val!("ab"),
            val!("b"),
        ]);
    }

    #[test]
    fn types_encode_in_rank_order() {
        let date = Utc.with_ymd_and_hms(1969, 7, 20, 20, 17, 0).unwrap();
        assert_ordered(&[
            Value::Null,
            Value::Bool(false),
            Value::Bool(true),
            Value::I64(i64::MAX),
            Value::Char('z'),
            val!("zzz"),
            Value::DateTime(date),
            Value::Bytes(vec![0, 1]),
            Value::NestId(NestId::from(3)),
            val!(vec![1]),
            Value::Document(doc! { "a": 1 }),
        ]);
        assert!(encode_absent() < encode_value(&Value::Null));
    }

    #[test]
    fn dates_before_epoch_sort_first() {
        let before = Utc.with_ymd_and_hms(1960, 1, 1, 0, 0, 0).unwrap();
        let after = Utc.with_ymd_and_hms(1990, 1, 1, 0, 0, 0).unwrap();
        assert_ordered(&[Value::DateTime(before), Value::DateTime(after)]);
    }

    #[test]
    fn composite_values_encode_elementwise() {
        assert_ordered(&[
            val!(Vec::<i32>::new()),
            val!(vec![1]),
            val!(vec![1, 2]),
            val!(vec![2]),
        ]);
        assert_ordered(&[
            Value::Document(doc! {}),
            Value::Document(doc! { "a": 1 }),
            Value::Document(doc! { "a": 1, "b": 0 }),
            Value::Document(doc! { "a": 2 }),
            Value::Document(doc! { "b": 0 }),
        ]);
    }

    #[test]
    fn document_encoding_ignores_field_order() {
        let first = doc! { "x": 1, "y": "two" };
        let second = doc! { "y": "two", "x": 1 };
        assert_eq!(
            encode_value(&Value::Document(first)),
            encode_value(&Value::Document(second))
        );
    }

    #[test]
    fn type_span_encloses_its_type_only() {
        let (floor, ceiling) = type_span(&val!(7));
        for number in [val!(i64::MIN), val!(0u8), val!(f64::MAX), val!(f64::NEG_INFINITY)] {
            let key = encode_value(&number);
            assert!(floor <= key && key < ceiling);
        }
        for other in [Value::Null, val!(true), val!("1"), val!(vec![1])] {
            let key = encode_value(&other);
            assert!(key < floor || key >= ceiling);
        }

        // a null is its own smallest and largest value
        let (floor, ceiling) = type_span(&Value::Null);
        assert!(floor <= encode_value(&Value::Null) && encode_value(&Value::Null) < ceiling);
    }

    #[test]
    fn id_keys_round_trip_and_sort() {
        let small = NestId::from(10);
        let large = NestId::from(1 << 40);
        assert!(encode_id(&small) < encode_id(&large));
        assert_eq!(decode_id(&encode_id(&large)).unwrap(), large);
        assert_eq!(
            decode_id(&[1, 2, 3]).unwrap_err().kind(),
            &ErrorKind::EncodingError
        );
    }
}
