//! Small, reusable wire-shape helpers layered on top of [`crate::record`]
//! and [`crate::value`], in the spirit of the teacher's `codecs.rs`:
//! rather than growing the core encode/decode engine to understand every
//! shape a caller might want, a handful of named helper functions compose
//! the primitives for common cases. The teacher's `optional_index`
//! module encodes an absent index as a sentinel `0`; the same idea
//! carries over to embedded record pointers below, with typeid `0`
//! (reserved, never assignable to a real user type) standing in for the
//! absent-value sentinel.

use std::any::Any;

use crate::buffer::Buffer;
use crate::error::{Error, Result};
use crate::record;
use crate::registry::Registry;
use crate::value;

/// Reserved typeid meaning "no record here" on the wire.
pub const NULL_RECORD_TYPEID: i64 = 0;

/// Encodes an optional, embedded record pointer. `None` is written as
/// the sentinel typeid with no following fields; `Some` is written as
/// the real typeid followed by the record's fields.
pub fn encode_optional_record<T>(
    buf: &mut Buffer,
    typeid: i64,
    value: Option<&T>,
    fields: &[record::FieldSpec<T>],
) -> Result<()> {
    match value {
        None => buf.write_varint_signed(NULL_RECORD_TYPEID).map(|_| ()),
        Some(v) => record::encode_record(buf, typeid, v, fields),
    }
}

/// Decodes what [`encode_optional_record`] wrote.
pub fn decode_optional_record<T: Default>(
    buf: &mut Buffer,
    fields: &[record::FieldSpec<T>],
) -> Result<Option<T>> {
    if peek_signed_typeid(buf)? == NULL_RECORD_TYPEID {
        buf.read_varint_signed()?;
        return Ok(None);
    }
    let (_typeid, v) = record::decode_record(buf, fields)?;
    Ok(Some(v))
}

fn peek_signed_typeid(buf: &mut Buffer) -> Result<i64> {
    let before = buf.read_position();
    let v = buf.read_varint_signed()?;
    buf.pushback(buf.read_position() - before);
    Ok(v)
}

/// Decodes an optional record pointer via the registry when the caller
/// has no static `T` in hand: `None` on the null sentinel, `Some(Box)`
/// otherwise.
pub fn decode_optional_record_ptr(
    buf: &mut Buffer,
    registry: &Registry,
) -> Result<Option<Box<dyn Any>>> {
    if peek_signed_typeid(buf)? == NULL_RECORD_TYPEID {
        buf.read_varint_signed()?;
        return Ok(None);
    }
    let typeid = buf.read_varint_signed()?;
    let spec = registry.find(typeid).ok_or(Error::NoDecoder(typeid))?;
    let decoded = (spec.decode())(buf)?;
    Ok(Some(decoded))
}

/// Writes a length-prefixed blob of opaque bytes, tolerant of either
/// the string or vector tag on decode -- the shape a caller reaches
/// for to embed an already-encoded sub-message without re-parsing it.
pub fn encode_opaque(buf: &mut Buffer, bytes: &[u8]) -> Result<()> {
    value::write_tagged_vector(buf, bytes)
}

pub fn decode_opaque(buf: &mut Buffer) -> Result<Vec<u8>> {
    value::read_tagged_vector(buf)
}
