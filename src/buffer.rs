//! The growable byte buffer (§4.2): a write cursor, a read cursor, and
//! an ownership flag distinguishing memory this crate allocated (and
//! will grow and free) from memory a caller lent us for the duration of
//! a decode.
//!
//! The shape mirrors how the teacher hand-rolls `MsfStream` as a manual
//! `io::Read`/`io::Seek` implementation in `msf.rs` rather than reaching
//! for a generic cursor type: the record layer needs non-consuming
//! peeks and a pushback operation that `std::io::Cursor` doesn't offer,
//! so the cursor bookkeeping is implemented here directly.

use std::any::Any;
use std::fmt;

use crate::error::{Error, Result};
use crate::registry::Registry;
use crate::varint;

/// Buffers grow by at least this many bytes per reallocation, per the
/// growth policy in §4.2.
const MIN_GROWTH: usize = 1024;

enum Storage<'a> {
    Owned(Vec<u8>),
    Borrowed(&'a mut [u8]),
}

impl<'a> Storage<'a> {
    fn as_slice(&self) -> &[u8] {
        match self {
            Storage::Owned(v) => v,
            Storage::Borrowed(s) => s,
        }
    }

    fn as_mut_slice(&mut self) -> &mut [u8] {
        match self {
            Storage::Owned(v) => v,
            Storage::Borrowed(s) => s,
        }
    }

    fn capacity(&self) -> usize {
        self.as_slice().len()
    }
}

/// A growable byte region with independent read/write cursors.
///
/// `Buffer` either owns its storage (created with [`Buffer::init`],
/// resizable, freed on [`Buffer::close`]) or borrows an external region
/// (created with [`Buffer::make`], never reallocated -- an attempt to
/// grow it reports [`Error::Overflow`]).
pub struct Buffer<'a> {
    storage: Storage<'a>,
    owned: bool,
    write_pos: usize,
    read_pos: usize,
    registry: Option<&'a Registry<'a>>,
    context: Option<Box<dyn Any>>,
    last_error: Option<Error>,
}

impl<'a> fmt::Debug for Buffer<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("capacity", &self.capacity())
            .field("write_pos", &self.write_pos)
            .field("read_pos", &self.read_pos)
            .field("owned", &self.owned)
            .field("last_error", &self.last_error)
            .finish()
    }
}

impl<'a> Buffer<'a> {
    /// Allocates `cap` owned bytes, resettable and resizable.
    pub fn init(cap: usize) -> Self {
        Buffer {
            storage: Storage::Owned(vec![0; cap]),
            owned: true,
            write_pos: 0,
            read_pos: 0,
            registry: None,
            context: None,
            last_error: None,
        }
    }

    /// Wraps an external byte region. The first `filled` bytes are
    /// treated as already-written data (the write cursor starts there);
    /// the rest of the region is spare capacity for further writes.
    pub fn make(region: &'a mut [u8], filled: usize) -> Self {
        let filled = filled.min(region.len());
        Buffer {
            storage: Storage::Borrowed(region),
            owned: false,
            write_pos: filled,
            read_pos: 0,
            registry: None,
            context: None,
            last_error: None,
        }
    }

    pub fn with_registry(mut self, registry: &'a Registry<'a>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn registry(&self) -> Option<&'a Registry<'a>> {
        self.registry
    }

    pub fn set_context<T: 'static>(&mut self, ctx: T) {
        self.context = Some(Box::new(ctx));
    }

    pub fn context<T: 'static>(&self) -> Option<&T> {
        self.context.as_ref().and_then(|c| c.downcast_ref())
    }

    pub fn context_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.context.as_mut().and_then(|c| c.downcast_mut())
    }

    pub fn capacity(&self) -> usize {
        self.storage.capacity()
    }

    /// Length of the filled (written) region -- the "W" cursor.
    pub fn len(&self) -> usize {
        self.write_pos
    }

    pub fn is_empty(&self) -> bool {
        self.write_pos == 0
    }

    pub fn read_position(&self) -> usize {
        self.read_pos
    }

    pub fn is_owned(&self) -> bool {
        self.owned
    }

    pub fn last_error(&self) -> Option<&Error> {
        self.last_error.as_ref()
    }

    pub fn clear_last_error(&mut self) {
        self.last_error = None;
    }

    /// All bytes written so far.
    pub fn filled(&self) -> &[u8] {
        &self.storage.as_slice()[..self.write_pos]
    }

    /// Bytes not yet consumed by a read.
    pub fn unread(&self) -> &[u8] {
        &self.storage.as_slice()[self.read_pos..self.write_pos]
    }

    /// Sets the read cursor back to the start of the filled region.
    pub fn reset(&mut self) {
        self.read_pos = 0;
    }

    /// Sets the read cursor to `min(p, W)`.
    pub fn seek(&mut self, p: usize) {
        self.read_pos = p.min(self.write_pos);
    }

    /// Moves the read cursor back by `min(n, R)`.
    pub fn pushback(&mut self, n: usize) {
        self.read_pos -= n.min(self.read_pos);
    }

    /// Resets both cursors to zero, retaining capacity.
    pub fn clear(&mut self) {
        self.read_pos = 0;
        self.write_pos = 0;
    }

    /// Marks the buffer as no longer responsible for growing or
    /// releasing its storage -- a borrowed buffer in all but name.
    pub fn disown(&mut self) {
        self.owned = false;
    }

    /// Reinstates growth/release responsibility.
    pub fn own(&mut self) {
        self.owned = true;
    }

    /// Releases storage iff owned, and resets both cursors.
    pub fn close(&mut self) {
        if self.owned {
            self.storage = Storage::Owned(Vec::new());
        }
        self.write_pos = 0;
        self.read_pos = 0;
    }

    /// Attempts to grow capacity by `delta` bytes. Returns the number
    /// of bytes actually added (0 on failure, recording a `NoMemory`
    /// error). A non-empty borrowed buffer always fails.
    pub fn resize(&mut self, delta: usize) -> usize {
        if delta == 0 {
            return 0;
        }
        if !self.owned && self.capacity() > 0 {
            log::debug!("refusing to resize a borrowed buffer by {delta} byte(s)");
            self.last_error = Some(Error::NoMemory(delta));
            return 0;
        }

        match &mut self.storage {
            Storage::Owned(v) => {
                if v.try_reserve_exact(delta).is_err() {
                    self.last_error = Some(Error::NoMemory(delta));
                    return 0;
                }
                let new_len = v.len() + delta;
                v.resize(new_len, 0);
                delta
            }
            Storage::Borrowed(_) => {
                // Only reachable for an empty borrowed buffer: there is
                // no existing data to preserve, so we can switch it to
                // owned storage outright.
                self.storage = Storage::Owned(vec![0; delta]);
                self.owned = true;
                delta
            }
        }
    }

    fn grow_for(&mut self, needed_total: usize) -> Result<()> {
        let grow_by = self.capacity().max(MIN_GROWTH).max(needed_total - self.capacity());
        if self.resize(grow_by) == 0 {
            let err = Error::Overflow { needed: needed_total - self.capacity() };
            self.last_error = Some(err.clone());
            return Err(err);
        }
        Ok(())
    }

    /// Runs `f` against the writable tail of the buffer, growing and
    /// retrying once on overflow, per the §4.2 growth policy.
    fn write_with(&mut self, f: impl Fn(&mut [u8]) -> Result<usize>) -> Result<usize> {
        let mut retried = false;
        loop {
            let dst = &mut self.storage.as_mut_slice()[self.write_pos..];
            match f(dst) {
                Ok(n) => {
                    self.write_pos += n;
                    return Ok(n);
                }
                Err(Error::Overflow { needed }) if !retried => {
                    retried = true;
                    self.grow_for(self.write_pos + needed)?;
                }
                Err(e) => {
                    self.last_error = Some(e.clone());
                    return Err(e);
                }
            }
        }
    }

    pub fn write_byte(&mut self, b: u8) -> Result<()> {
        self.write_with(|dst| {
            if dst.is_empty() {
                Err(Error::Overflow { needed: 1 })
            } else {
                dst[0] = b;
                Ok(1)
            }
        })
        .map(|_| ())
    }

    pub fn write_raw(&mut self, data: &[u8]) -> Result<()> {
        self.write_with(|dst| {
            if dst.len() < data.len() {
                Err(Error::Overflow { needed: data.len() })
            } else {
                dst[..data.len()].copy_from_slice(data);
                Ok(data.len())
            }
        })
        .map(|_| ())
    }

    pub fn write_uvarint(&mut self, v: u64) -> Result<usize> {
        self.write_with(|dst| varint::encode_uvarint(dst, v))
    }

    pub fn write_varint_signed(&mut self, v: i64) -> Result<usize> {
        self.write_uvarint(varint::zigzag_encode(v))
    }

    fn read_bounds_check(&self, n: usize) -> Result<()> {
        if self.read_pos + n > self.write_pos {
            return Err(Error::Underflow { needed: self.read_pos + n - self.write_pos });
        }
        Ok(())
    }

    pub fn read_byte(&mut self) -> Result<u8> {
        self.read_bounds_check(1).map_err(|e| {
            self.last_error = Some(e.clone());
            e
        })?;
        let b = self.storage.as_slice()[self.read_pos];
        self.read_pos += 1;
        Ok(b)
    }

    /// Reads the next byte without consuming it.
    pub fn peek_byte(&mut self) -> Result<u8> {
        let b = self.read_byte()?;
        self.pushback(1);
        Ok(b)
    }

    pub fn read_raw(&mut self, n: usize) -> Result<&[u8]> {
        if let Err(e) = self.read_bounds_check(n) {
            self.last_error = Some(e.clone());
            return Err(e);
        }
        let start = self.read_pos;
        self.read_pos += n;
        Ok(&self.storage.as_slice()[start..start + n])
    }

    pub fn read_uvarint(&mut self) -> Result<u64> {
        let src = &self.storage.as_slice()[self.read_pos..self.write_pos];
        match varint::decode_uvarint(src) {
            Ok((v, n)) => {
                self.read_pos += n;
                Ok(v)
            }
            Err(e) => {
                self.last_error = Some(e.clone());
                Err(e)
            }
        }
    }

    /// Reads an unsigned varint without consuming it.
    pub fn peek_uvarint(&mut self) -> Result<u64> {
        let before = self.read_pos;
        let v = self.read_uvarint()?;
        let consumed = self.read_pos - before;
        self.pushback(consumed);
        Ok(v)
    }

    pub fn read_varint_signed(&mut self) -> Result<i64> {
        Ok(varint::zigzag_decode(self.read_uvarint()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn b1_exact_capacity_needs_no_resize() {
        let mut buf = Buffer::init(3);
        buf.write_raw(&[1, 2, 3]).unwrap();
        assert_eq!(buf.capacity(), 3);
        assert_eq!(buf.filled(), &[1, 2, 3]);
    }

    #[test]
    fn owned_buffer_grows_past_capacity() {
        let mut buf = Buffer::init(1);
        buf.write_raw(&[1, 2, 3, 4, 5]).unwrap();
        assert!(buf.capacity() >= 5);
        assert_eq!(buf.filled(), &[1, 2, 3, 4, 5]);
    }

    #[test]
    fn b4_borrowed_buffer_refuses_resize() {
        let mut region = [0u8; 2];
        let mut buf = Buffer::make(&mut region, 0);
        let err = buf.write_raw(&[1, 2, 3]).unwrap_err();
        assert_eq!(err, Error::Overflow { needed: 1 });
    }

    #[test]
    fn empty_borrowed_buffer_can_grow_once() {
        let mut region: [u8; 0] = [];
        let mut buf = Buffer::make(&mut region, 0);
        buf.write_raw(&[1, 2, 3]).unwrap();
        assert_eq!(buf.filled(), &[1, 2, 3]);
    }

    #[test]
    fn pushback_and_seek_are_bounded() {
        let mut buf = Buffer::init(4);
        buf.write_raw(&[1, 2, 3, 4]).unwrap();
        buf.read_raw(4).unwrap();
        buf.pushback(100);
        assert_eq!(buf.read_position(), 0);
        buf.seek(100);
        assert_eq!(buf.read_position(), 4);
    }

    #[test]
    fn peek_does_not_advance() {
        let mut buf = Buffer::init(4);
        buf.write_uvarint(300).unwrap();
        let peeked = buf.peek_uvarint().unwrap();
        assert_eq!(peeked, 300);
        assert_eq!(buf.read_position(), 0);
        assert_eq!(buf.read_uvarint().unwrap(), 300);
    }

    #[test]
    fn clear_resets_both_cursors_but_keeps_capacity() {
        let mut buf = Buffer::init(4);
        buf.write_raw(&[1, 2, 3, 4]).unwrap();
        buf.read_raw(2).unwrap();
        buf.clear();
        assert_eq!(buf.len(), 0);
        assert_eq!(buf.read_position(), 0);
        assert_eq!(buf.capacity(), 4);
    }

    #[test]
    fn close_releases_owned_storage() {
        let mut buf = Buffer::init(1024);
        buf.close();
        assert_eq!(buf.capacity(), 0);
    }

    #[test]
    fn disown_then_write_reports_overflow() {
        let mut buf = Buffer::init(2);
        buf.disown();
        let err = buf.write_raw(&[1, 2, 3]).unwrap_err();
        assert_eq!(err, Error::Overflow { needed: 1 });
    }
}
