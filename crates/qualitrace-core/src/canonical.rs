//! Canonical CBOR encoding for deterministic hashing.
//!
//! This module implements RFC 8949 Core Deterministic Encoding:
//! - Records and block preimages are maps with text keys
//! - Map keys sorted by their encoded bytes: shorter keys first, then
//!   bytewise lexicographic. This is the fixed field order for every kind.
//! - Integers use the smallest valid encoding, big-endian
//! - Definite lengths only
//! - No floats, no tags (timestamps are i64 milliseconds)
//!
//! The canonical encoding is what makes a block hash reproducible: the same
//! record yields identical bytes regardless of how it was constructed or on
//! which platform it was encoded.

use ciborium::value::Value;

use crate::digest::Digest;
use crate::error::EncodingError;
use crate::record::{
    Label, ProductRegistration, QualityInspection, Record, RecordKind, VerificationQuery,
};

/// Domain separation prefix for block preimages.
pub const BLOCK_DOMAIN: &[u8] = b"qualitrace/block/v1";

/// CBOR map key names.
mod keys {
    pub const KIND: &str = "kind";
    pub const PRODUCT_ID: &str = "product_id";

    pub const NAME: &str = "name";
    pub const MANUFACTURER: &str = "manufacturer";
    pub const CATEGORY: &str = "category";
    pub const BATCH_NUMBER: &str = "batch_number";
    pub const MANUFACTURE_DATE: &str = "manufacture_date";

    pub const INSPECTION_ID: &str = "inspection_id";
    pub const INSPECTOR: &str = "inspector";
    pub const SCORE: &str = "score";
    pub const PASSED: &str = "passed";
    pub const LABELS: &str = "labels";
    pub const LABEL: &str = "label";
    pub const CONFIDENCE: &str = "confidence";

    pub const QUERIED_AT: &str = "queried_at";
    pub const RESULT_SUMMARY: &str = "result_summary";

    pub const SEQ: &str = "seq";
    pub const TIMESTAMP: &str = "timestamp";
    pub const RECORD: &str = "record";
    pub const PREVIOUS_HASH: &str = "previous_hash";
}

/// Encode a record to canonical CBOR bytes.
pub fn canonical_record_bytes(record: &Record) -> Result<Vec<u8>, EncodingError> {
    let value = record_to_value(record)?;
    encode_canonical(&value)
}

/// Encode a block preimage (everything except the hash).
///
/// Format: `BLOCK_DOMAIN || {seq, timestamp, record, previous_hash}`
pub fn canonical_block_bytes(
    seq: u64,
    timestamp: i64,
    record: &Record,
    previous_hash: &Digest,
) -> Result<Vec<u8>, EncodingError> {
    let entries = vec![
        (text(keys::SEQ), Value::Integer(seq.into())),
        (text(keys::TIMESTAMP), Value::Integer(timestamp.into())),
        (text(keys::RECORD), record_to_value(record)?),
        (
            text(keys::PREVIOUS_HASH),
            Value::Bytes(previous_hash.0.to_vec()),
        ),
    ];

    let mut buf = BLOCK_DOMAIN.to_vec();
    encode_value(&mut buf, &Value::Map(entries))?;
    Ok(buf)
}

/// Decode a record from canonical CBOR bytes.
///
/// Rejects unknown kinds, missing or mistyped fields, out-of-range numbers
/// and any input that is not byte-for-byte canonical (extra keys, trailing
/// bytes, non-minimal integers).
pub fn decode_record(bytes: &[u8]) -> Result<Record, EncodingError> {
    let value: Value =
        ciborium::from_reader(bytes).map_err(|e| EncodingError::Malformed(e.to_string()))?;

    let record = value_to_record(&value)?;

    if canonical_record_bytes(&record)? != bytes {
        return Err(EncodingError::Malformed("not canonically encoded".into()));
    }

    Ok(record)
}

/// Convert a record to a CBOR value (map with text keys).
///
/// Validates the record first; encoding never degrades to a partial map.
pub fn record_to_value(record: &Record) -> Result<Value, EncodingError> {
    record.validate()?;

    let kind = (text(keys::KIND), text(record.kind().as_str()));

    let entries = match record {
        Record::ProductRegistration(r) => vec![
            kind,
            (text(keys::PRODUCT_ID), text(&r.product_id)),
            (text(keys::NAME), text(&r.name)),
            (text(keys::MANUFACTURER), text(&r.manufacturer)),
            (text(keys::CATEGORY), text(&r.category)),
            (text(keys::BATCH_NUMBER), text(&r.batch_number)),
            (text(keys::MANUFACTURE_DATE), text(&r.manufacture_date)),
        ],
        Record::QualityInspection(r) => vec![
            kind,
            (text(keys::INSPECTION_ID), text(&r.inspection_id)),
            (text(keys::PRODUCT_ID), text(&r.product_id)),
            (text(keys::INSPECTOR), text(&r.inspector)),
            (text(keys::SCORE), Value::Integer(r.score.into())),
            (text(keys::PASSED), Value::Bool(r.passed)),
            (
                text(keys::LABELS),
                Value::Array(r.labels.iter().map(label_to_value).collect()),
            ),
        ],
        Record::VerificationQuery(r) => vec![
            kind,
            (text(keys::PRODUCT_ID), text(&r.product_id)),
            (text(keys::QUERIED_AT), Value::Integer(r.queried_at.into())),
            (text(keys::RESULT_SUMMARY), text(&r.result_summary)),
        ],
    };

    Ok(Value::Map(entries))
}

fn label_to_value(label: &Label) -> Value {
    Value::Map(vec![
        (text(keys::LABEL), text(&label.label)),
        (
            text(keys::CONFIDENCE),
            Value::Integer(label.confidence.into()),
        ),
    ])
}

fn text(s: &str) -> Value {
    Value::Text(s.to_string())
}

/// Convert a CBOR value (map) back to a record.
fn value_to_record(value: &Value) -> Result<Record, EncodingError> {
    let map = as_map(value, "record")?;

    let kind_name = get_text(map, keys::KIND)?;
    let kind =
        RecordKind::parse(&kind_name).ok_or_else(|| EncodingError::UnknownKind(kind_name))?;

    let record = match kind {
        RecordKind::ProductRegistration => Record::ProductRegistration(ProductRegistration {
            product_id: get_text(map, keys::PRODUCT_ID)?,
            name: get_text(map, keys::NAME)?,
            manufacturer: get_text(map, keys::MANUFACTURER)?,
            category: get_text(map, keys::CATEGORY)?,
            batch_number: get_text(map, keys::BATCH_NUMBER)?,
            manufacture_date: get_text(map, keys::MANUFACTURE_DATE)?,
        }),
        RecordKind::QualityInspection => {
            let labels = match get(map, keys::LABELS)? {
                Value::Array(items) => items
                    .iter()
                    .map(|item| {
                        let label = as_map(item, keys::LABEL)?;
                        Ok(Label {
                            label: get_text(label, keys::LABEL)?,
                            confidence: get_u8(label, keys::CONFIDENCE)?,
                        })
                    })
                    .collect::<Result<Vec<_>, EncodingError>>()?,
                _ => return Err(EncodingError::Malformed("labels must be an array".into())),
            };

            Record::QualityInspection(QualityInspection {
                inspection_id: get_text(map, keys::INSPECTION_ID)?,
                product_id: get_text(map, keys::PRODUCT_ID)?,
                inspector: get_text(map, keys::INSPECTOR)?,
                score: get_u8(map, keys::SCORE)?,
                passed: match get(map, keys::PASSED)? {
                    Value::Bool(b) => *b,
                    _ => return Err(EncodingError::Malformed("passed must be a bool".into())),
                },
                labels,
            })
        }
        RecordKind::VerificationQuery => Record::VerificationQuery(VerificationQuery {
            product_id: get_text(map, keys::PRODUCT_ID)?,
            queried_at: get_i64(map, keys::QUERIED_AT)?,
            result_summary: get_text(map, keys::RESULT_SUMMARY)?,
        }),
    };

    record.validate()?;
    Ok(record)
}

fn as_map<'a>(value: &'a Value, what: &str) -> Result<&'a [(Value, Value)], EncodingError> {
    match value {
        Value::Map(entries) => Ok(entries),
        _ => Err(EncodingError::Malformed(format!("{} must be a map", what))),
    }
}

fn get<'a>(map: &'a [(Value, Value)], key: &'static str) -> Result<&'a Value, EncodingError> {
    map.iter()
        .find(|(k, _)| matches!(k, Value::Text(s) if s == key))
        .map(|(_, v)| v)
        .ok_or(EncodingError::MissingField(key))
}

fn get_text(map: &[(Value, Value)], key: &'static str) -> Result<String, EncodingError> {
    match get(map, key)? {
        Value::Text(s) => Ok(s.clone()),
        _ => Err(EncodingError::Malformed(format!("{} must be text", key))),
    }
}

fn get_integer(map: &[(Value, Value)], key: &'static str) -> Result<i128, EncodingError> {
    match get(map, key)? {
        Value::Integer(i) => Ok((*i).into()),
        _ => Err(EncodingError::Malformed(format!("{} must be an integer", key))),
    }
}

fn get_u8(map: &[(Value, Value)], key: &'static str) -> Result<u8, EncodingError> {
    let n = get_integer(map, key)?;
    if n < 0 {
        return Err(EncodingError::Malformed(format!("{} must not be negative", key)));
    }
    u8::try_from(n).map_err(|_| EncodingError::OutOfRange {
        field: key,
        value: u64::try_from(n).unwrap_or(u64::MAX),
        max: crate::record::MAX_SCORE.into(),
    })
}

fn get_i64(map: &[(Value, Value)], key: &'static str) -> Result<i64, EncodingError> {
    let n = get_integer(map, key)?;
    i64::try_from(n).map_err(|_| EncodingError::Malformed(format!("{} overflows i64", key)))
}

/// Encode a CBOR value to canonical bytes.
pub fn encode_canonical(value: &Value) -> Result<Vec<u8>, EncodingError> {
    let mut buf = Vec::new();
    encode_value(&mut buf, value)?;
    Ok(buf)
}

/// Recursively encode a CBOR value.
fn encode_value(buf: &mut Vec<u8>, value: &Value) -> Result<(), EncodingError> {
    match value {
        Value::Integer(i) => encode_integer(buf, *i),
        Value::Bytes(b) => encode_bytes(buf, b),
        Value::Text(s) => encode_text(buf, s),
        Value::Array(arr) => encode_array(buf, arr)?,
        Value::Map(entries) => encode_map(buf, entries)?,
        Value::Bool(b) => buf.push(if *b { 0xf5 } else { 0xf4 }),
        Value::Null => buf.push(0xf6),
        Value::Float(_) => {
            return Err(EncodingError::UnsupportedValue("float".into()));
        }
        other => {
            return Err(EncodingError::UnsupportedValue(format!("{:?}", other)));
        }
    }
    Ok(())
}

/// Encode a CBOR integer (major types 0 and 1).
fn encode_integer(buf: &mut Vec<u8>, i: ciborium::value::Integer) {
    let n: i128 = i.into();

    if n >= 0 {
        encode_uint(buf, 0, n as u64);
    } else {
        // CBOR encodes -1 as 0, -2 as 1, etc.
        encode_uint(buf, 1, (-1 - n) as u64);
    }
}

/// Encode an unsigned integer with the given major type.
fn encode_uint(buf: &mut Vec<u8>, major: u8, n: u64) {
    let mt = major << 5;
    if n < 24 {
        buf.push(mt | (n as u8));
    } else if n <= 0xff {
        buf.push(mt | 24);
        buf.push(n as u8);
    } else if n <= 0xffff {
        buf.push(mt | 25);
        buf.extend_from_slice(&(n as u16).to_be_bytes());
    } else if n <= 0xffff_ffff {
        buf.push(mt | 26);
        buf.extend_from_slice(&(n as u32).to_be_bytes());
    } else {
        buf.push(mt | 27);
        buf.extend_from_slice(&n.to_be_bytes());
    }
}

fn encode_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    encode_uint(buf, 2, bytes.len() as u64);
    buf.extend_from_slice(bytes);
}

fn encode_text(buf: &mut Vec<u8>, s: &str) {
    encode_uint(buf, 3, s.len() as u64);
    buf.extend_from_slice(s.as_bytes());
}

fn encode_array(buf: &mut Vec<u8>, arr: &[Value]) -> Result<(), EncodingError> {
    encode_uint(buf, 4, arr.len() as u64);
    for item in arr {
        encode_value(buf, item)?;
    }
    Ok(())
}

/// Encode a map canonically (major type 5).
///
/// Keys are sorted by their encoded byte comparison. Duplicate keys are
/// rejected since they would make the field set ambiguous.
fn encode_map(buf: &mut Vec<u8>, entries: &[(Value, Value)]) -> Result<(), EncodingError> {
    let mut sorted = entries
        .iter()
        .map(|(k, v)| {
            let mut key_bytes = Vec::new();
            encode_value(&mut key_bytes, k)?;
            Ok((key_bytes, v))
        })
        .collect::<Result<Vec<_>, EncodingError>>()?;

    sorted.sort_by(|a, b| a.0.cmp(&b.0));

    if sorted.windows(2).any(|w| w[0].0 == w[1].0) {
        return Err(EncodingError::Malformed("duplicate map key".into()));
    }

    encode_uint(buf, 5, sorted.len() as u64);
    for (key_bytes, value) in sorted {
        buf.extend_from_slice(&key_bytes);
        encode_value(buf, value)?;
    }
    Ok(())
}
