//! The typed value layer (§4.3): tagged and untagged encode/decode for
//! the built-in base types, byte vectors and strings, and arrays.
//!
//! Every base-typed value is prefixed by a one-byte tag computed as
//! `type_id << 1` (§6). The "value" form used inside arrays and record
//! field payloads skips that tag, since the surrounding context already
//! establishes the expected type.

use crate::buffer::Buffer;
use crate::error::{Error, Result};
use crate::varint;

/// Type identifiers reserved for the built-in categories (§3). User
/// record types start at [`FIRST_USER_TYPE`].
pub mod type_id {
    pub const ANY: i64 = 0;
    pub const BOOL: i64 = 1;
    pub const INT: i64 = 2;
    pub const UINT: i64 = 3;
    pub const FLOAT: i64 = 4;
    pub const VECTOR: i64 = 5;
    pub const STRING: i64 = 6;
    pub const COMPLEX: i64 = 7;
    pub const ARRAY: i64 = 10;
}

pub const FIRST_USER_TYPE: i64 = 16;

/// Computes the one-byte tag for a built-in type id (`id << 1`, kept
/// under a byte for every id in `1..15`). The low bit is reserved and
/// never set at this layer (see the REDESIGN note in the glossary).
const fn tag_of(builtin_id: i64) -> u8 {
    (builtin_id << 1) as u8
}

pub const TAG_BOOL: u8 = tag_of(type_id::BOOL);
pub const TAG_INT: u8 = tag_of(type_id::INT);
pub const TAG_UINT: u8 = tag_of(type_id::UINT);
pub const TAG_FLOAT: u8 = tag_of(type_id::FLOAT);
pub const TAG_VECTOR: u8 = tag_of(type_id::VECTOR);
pub const TAG_STRING: u8 = tag_of(type_id::STRING);
pub const TAG_COMPLEX: u8 = tag_of(type_id::COMPLEX);
pub const TAG_ARRAY: u8 = tag_of(type_id::ARRAY);

fn expect_tag(found: u8, expected: u8, name: &'static str) -> Result<()> {
    if found == expected {
        Ok(())
    } else {
        Err(Error::TypeMismatch { expected: name, found })
    }
}

// ---- bool ----

pub fn write_value_bool(buf: &mut Buffer, v: bool) -> Result<()> {
    buf.write_uvarint(v as u64).map(|_| ())
}

pub fn read_value_bool(buf: &mut Buffer) -> Result<bool> {
    Ok(buf.read_uvarint()? != 0)
}

pub fn write_tagged_bool(buf: &mut Buffer, v: bool) -> Result<()> {
    buf.write_byte(TAG_BOOL)?;
    write_value_bool(buf, v)
}

pub fn read_tagged_bool(buf: &mut Buffer) -> Result<bool> {
    let tag = buf.read_byte()?;
    expect_tag(tag, TAG_BOOL, "bool")?;
    read_value_bool(buf)
}

// ---- int ----

pub fn write_value_int(buf: &mut Buffer, v: i64) -> Result<()> {
    buf.write_varint_signed(v).map(|_| ())
}

pub fn read_value_int(buf: &mut Buffer) -> Result<i64> {
    buf.read_varint_signed()
}

pub fn write_tagged_int(buf: &mut Buffer, v: i64) -> Result<()> {
    buf.write_byte(TAG_INT)?;
    write_value_int(buf, v)
}

pub fn read_tagged_int(buf: &mut Buffer) -> Result<i64> {
    let tag = buf.read_byte()?;
    expect_tag(tag, TAG_INT, "int")?;
    read_value_int(buf)
}

// ---- uint ----

pub fn write_value_uint(buf: &mut Buffer, v: u64) -> Result<()> {
    buf.write_uvarint(v).map(|_| ())
}

pub fn read_value_uint(buf: &mut Buffer) -> Result<u64> {
    buf.read_uvarint()
}

pub fn write_tagged_uint(buf: &mut Buffer, v: u64) -> Result<()> {
    buf.write_byte(TAG_UINT)?;
    write_value_uint(buf, v)
}

pub fn read_tagged_uint(buf: &mut Buffer) -> Result<u64> {
    let tag = buf.read_byte()?;
    expect_tag(tag, TAG_UINT, "uint")?;
    read_value_uint(buf)
}

// ---- float / double ----

pub fn write_value_float(buf: &mut Buffer, v: f64) -> Result<()> {
    buf.write_uvarint(varint::byte_reverse_double(v)).map(|_| ())
}

pub fn read_value_float(buf: &mut Buffer) -> Result<f64> {
    Ok(varint::un_byte_reverse_double(buf.read_uvarint()?))
}

pub fn write_tagged_float(buf: &mut Buffer, v: f64) -> Result<()> {
    buf.write_byte(TAG_FLOAT)?;
    write_value_float(buf, v)
}

pub fn read_tagged_float(buf: &mut Buffer) -> Result<f64> {
    let tag = buf.read_byte()?;
    expect_tag(tag, TAG_FLOAT, "float")?;
    read_value_float(buf)
}

/// A 32-bit float encodes by widening to double (§4.1); there is no
/// narrower wire form.
pub fn write_value_float32(buf: &mut Buffer, v: f32) -> Result<()> {
    write_value_float(buf, v as f64)
}

pub fn read_value_float32(buf: &mut Buffer) -> Result<f32> {
    Ok(read_value_float(buf)? as f32)
}

// ---- complex ----

pub fn write_value_complex(buf: &mut Buffer, re: f64, im: f64) -> Result<()> {
    write_value_float(buf, re)?;
    write_value_float(buf, im)
}

pub fn read_value_complex(buf: &mut Buffer) -> Result<(f64, f64)> {
    let re = read_value_float(buf)?;
    let im = read_value_float(buf)?;
    Ok((re, im))
}

pub fn write_tagged_complex(buf: &mut Buffer, re: f64, im: f64) -> Result<()> {
    buf.write_byte(TAG_COMPLEX)?;
    write_value_complex(buf, re, im)
}

pub fn read_tagged_complex(buf: &mut Buffer) -> Result<(f64, f64)> {
    let tag = buf.read_byte()?;
    expect_tag(tag, TAG_COMPLEX, "complex")?;
    read_value_complex(buf)
}

// ---- vector / string ----

pub fn write_value_vector(buf: &mut Buffer, data: &[u8]) -> Result<()> {
    buf.write_uvarint(data.len() as u64)?;
    buf.write_raw(data)
}

pub fn read_value_vector(buf: &mut Buffer) -> Result<Vec<u8>> {
    let len = buf.read_uvarint()? as usize;
    Ok(buf.read_raw(len)?.to_vec())
}

/// Decodes a vector into a fixed-size destination, per §4.3: copies
/// `min(len, dst.len())` bytes and zero-fills the remainder of `dst`.
/// Returns the on-wire length, which may exceed `dst.len()`.
pub fn read_value_vector_into(buf: &mut Buffer, dst: &mut [u8]) -> Result<usize> {
    let len = buf.read_uvarint()? as usize;
    let bytes = buf.read_raw(len)?;
    let copy_len = len.min(dst.len());
    dst[..copy_len].copy_from_slice(&bytes[..copy_len]);
    for slot in &mut dst[copy_len..] {
        *slot = 0;
    }
    Ok(len)
}

pub fn write_tagged_vector(buf: &mut Buffer, data: &[u8]) -> Result<()> {
    buf.write_byte(TAG_VECTOR)?;
    write_value_vector(buf, data)
}

/// Tolerates a string tag as well as a vector tag, for compatibility
/// (§4.3).
pub fn read_tagged_vector(buf: &mut Buffer) -> Result<Vec<u8>> {
    let tag = buf.read_byte()?;
    if tag != TAG_VECTOR && tag != TAG_STRING {
        return Err(Error::TypeMismatch { expected: "vector", found: tag });
    }
    read_value_vector(buf)
}

pub fn write_value_string(buf: &mut Buffer, s: &str) -> Result<()> {
    write_value_vector(buf, s.as_bytes())
}

pub fn read_value_string(buf: &mut Buffer) -> Result<String> {
    let bytes = read_value_vector(buf)?;
    String::from_utf8(bytes).map_err(|e| Error::Invalid(format!("string field is not valid UTF-8: {e}")))
}

pub fn write_tagged_string(buf: &mut Buffer, s: &str) -> Result<()> {
    buf.write_byte(TAG_STRING)?;
    write_value_string(buf, s)
}

/// Tolerates a vector tag as well as a string tag, for compatibility
/// (§4.3).
pub fn read_tagged_string(buf: &mut Buffer) -> Result<String> {
    let tag = buf.read_byte()?;
    if tag != TAG_STRING && tag != TAG_VECTOR {
        return Err(Error::TypeMismatch { expected: "string", found: tag });
    }
    read_value_string(buf)
}

// ---- array ----

/// Writes an array's tag, element type id, count, and then each
/// element via `encode_elem`, which should write only the *value* form
/// of the element (no per-element tag, unless the element kind itself
/// expects one, e.g. nested arrays).
pub fn write_tagged_array<T>(
    buf: &mut Buffer,
    element_typeid: i64,
    elems: &[T],
    mut encode_elem: impl FnMut(&mut Buffer, &T) -> Result<()>,
) -> Result<()> {
    buf.write_byte(TAG_ARRAY)?;
    buf.write_varint_signed(element_typeid)?;
    buf.write_uvarint(elems.len() as u64)?;
    for elem in elems {
        encode_elem(buf, elem)?;
    }
    Ok(())
}

/// Reads an array, validating the on-wire element type id against
/// `expected_typeid` when given.
pub fn read_tagged_array<T>(
    buf: &mut Buffer,
    expected_typeid: Option<i64>,
    mut decode_elem: impl FnMut(&mut Buffer) -> Result<T>,
) -> Result<Vec<T>> {
    let tag = buf.read_byte()?;
    expect_tag(tag, TAG_ARRAY, "array")?;

    let elem_typeid = buf.read_varint_signed()?;
    if let Some(expected) = expected_typeid {
        if expected != elem_typeid {
            return Err(Error::Invalid(format!(
                "array element type mismatch: expected {expected}, found {elem_typeid}"
            )));
        }
    }

    let count = buf.read_uvarint()? as usize;
    let mut out = Vec::with_capacity(count.min(1 << 20));
    for _ in 0..count {
        out.push(decode_elem(buf)?);
    }
    Ok(out)
}
