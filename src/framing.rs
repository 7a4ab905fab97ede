//! Stream framing (§4.6): a single length-prefixed message written to
//! or read from an external I/O handle. The core only assumes that
//! handle offers blocking "read up to N bytes" / "write N bytes" --
//! i.e. plain `std::io::Read`/`std::io::Write` -- matching the external
//! collaborators the spec calls out (event-loop sockets, files) as
//! being outside the core's concern.

use std::io::{Read, Write};

use crate::buffer::Buffer;
use crate::error::{Error, Result};
use crate::varint;

/// Writes the buffer's filled length as an unsigned varint, then that
/// many payload bytes, to `sink`. Returns the total bytes written.
pub fn writem<W: Write>(buf: &Buffer, sink: &mut W) -> Result<usize> {
    let payload = buf.filled();
    let mut len_bytes = [0u8; 9];
    let len_size = varint::encode_uvarint(&mut len_bytes, payload.len() as u64)?;

    sink.write_all(&len_bytes[..len_size])?;
    sink.write_all(payload)?;
    log::trace!("writem: {} byte prefix + {} byte payload", len_size, payload.len());
    Ok(len_size + payload.len())
}

/// Reads one length-prefixed message from `source` into `buf`,
/// growing `buf` as needed. Returns the total bytes read (prefix +
/// payload), `0` on an orderly EOF before any byte was read, or an
/// error otherwise. If `max` is non-zero and the decoded length
/// exceeds it, fails without consuming the payload.
pub fn readm<R: Read>(buf: &mut Buffer, source: &mut R, max: usize) -> Result<usize> {
    buf.clear();

    let mut prefix = Vec::with_capacity(9);
    let mut one = [0u8; 1];

    loop {
        let n = source.read(&mut one)?;
        if n == 0 {
            if prefix.is_empty() {
                return Ok(0); // orderly EOF between messages
            }
            return Err(Error::Io("stream closed mid length-prefix".into()));
        }
        prefix.push(one[0]);

        match varint::decode_uvarint(&prefix) {
            Ok((len, consumed)) => {
                debug_assert_eq!(consumed, prefix.len());
                let len = len as usize;
                if max != 0 && len > max {
                    return Err(Error::Invalid(format!(
                        "message length {len} exceeds configured maximum {max}"
                    )));
                }

                if buf.capacity() < len {
                    buf.resize(len - buf.capacity());
                    if buf.capacity() < len {
                        return Err(Error::NoMemory(len - buf.capacity()));
                    }
                }

                read_payload(buf, source, len)?;
                return Ok(prefix.len() + len);
            }
            Err(Error::Underflow { .. }) => continue,
            Err(e) => return Err(e),
        }
    }
}

fn read_payload<R: Read>(buf: &mut Buffer, source: &mut R, len: usize) -> Result<()> {
    let mut remaining = len;
    let mut scratch = vec![0u8; len];
    while remaining > 0 {
        let start = len - remaining;
        let n = source.read(&mut scratch[start..len])?;
        if n == 0 {
            return Err(Error::Io("stream closed mid payload".into()));
        }
        remaining -= n;
    }
    buf.write_raw(&scratch)
}
