//! Fixed-width record decoding and encoding

use crate::cursor::ByteCursor;
use crate::error::{Result, StreamError};
use crate::pointer::PointerRef;
use crate::record::{Record, Value};
use crate::spec::{FieldKind, FieldSpec, RecordSpec};

/// Decode one record at the cursor position
///
/// Consumes exactly `spec.width()` bytes. If fewer remain, fails with
/// `OutOfBounds` without consuming anything.
pub fn decode_record(cursor: &mut ByteCursor<'_>, spec: &RecordSpec) -> Result<Record> {
    let origin = cursor.position();
    if cursor.remaining() < spec.width() {
        return Err(StreamError::OutOfBounds {
            offset: origin,
            len: spec.width(),
            buffer_len: cursor.len(),
        });
    }

    let mut record = Record::new();
    for field in spec.fields() {
        let value = match field.kind() {
            FieldKind::Unsigned(width) => {
                let raw = cursor.read_uint(width)?;
                if field.is_offset() {
                    record.push_pointer(PointerRef::new(
                        field.name(),
                        origin,
                        raw,
                        field.target().cloned(),
                    ));
                }
                Value::Unsigned(raw)
            }
            FieldKind::Signed(width) => Value::Signed(sign_extend(cursor.read_uint(width)?, width)),
            FieldKind::Bytes(len) => Value::Bytes(cursor.read(len)?.to_vec()),
        };
        record.set(field.name(), value);
    }
    Ok(record)
}

/// Encode one record into a fresh buffer
pub fn encode_record(record: &Record, spec: &RecordSpec) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(spec.width());
    write_record(&mut out, record, spec)?;
    Ok(out)
}

/// Append one encoded record to `out`
///
/// On error nothing is appended.
pub fn write_record(out: &mut Vec<u8>, record: &Record, spec: &RecordSpec) -> Result<()> {
    let start = out.len();
    let result = spec
        .fields()
        .iter()
        .try_for_each(|field| write_field(out, record, field));
    if result.is_err() {
        out.truncate(start);
    }
    result
}

fn write_field(out: &mut Vec<u8>, record: &Record, field: &FieldSpec) -> Result<()> {
    let value = record
        .get(field.name())
        .ok_or_else(|| StreamError::MissingField {
            field: field.name().to_string(),
        })?;

    match (field.kind(), value) {
        (FieldKind::Unsigned(width), _) => {
            let v = match *value {
                Value::Unsigned(v) => v,
                Value::Signed(v) => u64::try_from(v).map_err(|_| overflow(field, v))?,
                Value::Bytes(_) => return Err(type_mismatch(field)),
            };
            if width < 8 && v >> (width * 8) != 0 {
                return Err(overflow(field, v));
            }
            out.extend_from_slice(&v.to_le_bytes()[..width]);
        }
        (FieldKind::Signed(width), _) => {
            let v = match *value {
                Value::Signed(v) => v,
                Value::Unsigned(v) => i64::try_from(v).map_err(|_| overflow(field, v))?,
                Value::Bytes(_) => return Err(type_mismatch(field)),
            };
            let bits = width * 8;
            if bits < 64 {
                let min = -(1i64 << (bits - 1));
                let max = (1i64 << (bits - 1)) - 1;
                if v < min || v > max {
                    return Err(overflow(field, v));
                }
            }
            out.extend_from_slice(&v.to_le_bytes()[..width]);
        }
        (FieldKind::Bytes(len), Value::Bytes(bytes)) if bytes.len() == len => {
            out.extend_from_slice(bytes);
        }
        (FieldKind::Bytes(_), _) => return Err(type_mismatch(field)),
    }
    Ok(())
}

/// Sign-extend the low `width` bytes of `raw`
fn sign_extend(raw: u64, width: usize) -> i64 {
    let shift = 64 - width * 8;
    ((raw << shift) as i64) >> shift
}

fn overflow(field: &FieldSpec, value: impl ToString) -> StreamError {
    StreamError::FieldOverflow {
        field: field.name().to_string(),
        value: value.to_string(),
    }
}

fn type_mismatch(field: &FieldSpec) -> StreamError {
    StreamError::FieldType {
        field: field.name().to_string(),
    }
}
