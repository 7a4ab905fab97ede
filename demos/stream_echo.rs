//! Writes a framed message into an in-memory pipe and reads it back,
//! the shape a socket-based client/server would share.

use std::io::Cursor;

use anyhow::{Context, Result};
use gob_codec::{framing, Buffer};

fn main() -> Result<()> {
    let mut outgoing = Buffer::init(32);
    outgoing.write_raw(b"hello, gob").context("writing the demo payload into the outgoing buffer")?;

    let mut wire = Vec::new();
    let written = framing::writem(&outgoing, &mut wire).context("framing the outgoing message")?;
    println!("wrote {written} bytes onto the wire: {wire:02x?}");

    let mut incoming = Buffer::init(0);
    let mut source = Cursor::new(wire);
    let read = framing::readm(&mut incoming, &mut source, 1024).context("reading the framed message back")?;
    println!("read {read} bytes back: {:?}", String::from_utf8_lossy(incoming.filled()));

    assert_eq!(incoming.filled(), outgoing.filled());
    Ok(())
}
