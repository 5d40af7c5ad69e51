//! MCCP stream compression splice.
//!
//! Once an `IAC SB MCCP2 IAC SE` (or MCCP3) marker passes, one direction of
//! the stream becomes an RFC 1950 zlib stream until connection end. The
//! driver owns one [`Decompressor`] for the inbound path and one
//! [`Compressor`] for the outbound path and splices them between the
//! transport and the engine.

use flate2::{Compress, Compression, Decompress, FlushCompress, FlushDecompress, Status};
use tokio_util::bytes::{Bytes, BytesMut};

use crate::error::ErrorKind;
use crate::Result;

/// Which half of the stream a compression change applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Peer-to-engine bytes.
    Inbound,
    /// Engine-to-peer bytes.
    Outbound,
}

/// Stateful inbound zlib decompressor.
pub(crate) struct Decompressor {
    inner: Decompress,
    scratch: Vec<u8>,
}

impl Decompressor {
    pub(crate) fn new() -> Self {
        Self {
            // zlib header per RFC 1950, as MCCP requires.
            inner: Decompress::new(true),
            scratch: vec![0; SCRATCH_SIZE],
        }
    }

    /// Decompress `input`, returning the recovered plaintext bytes.
    ///
    /// Compressed MUD text rarely expands more than 8x, but the loop keeps
    /// draining until the whole input is consumed regardless.
    pub(crate) fn feed(&mut self, input: &[u8]) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        let mut consumed = 0usize;
        while consumed < input.len() {
            let before_in = self.inner.total_in();
            let before_out = self.inner.total_out();
            let status = self
                .inner
                .decompress(&input[consumed..], &mut self.scratch, FlushDecompress::None)
                .map_err(|err| ErrorKind::Compression(err.to_string()))?;
            consumed += usize::try_from(self.inner.total_in() - before_in)
                .map_err(|err| ErrorKind::Compression(err.to_string()))?;
            let produced = usize::try_from(self.inner.total_out() - before_out)
                .map_err(|err| ErrorKind::Compression(err.to_string()))?;
            out.extend_from_slice(&self.scratch[..produced]);

            match status {
                Status::Ok => {}
                // The peer closed the zlib stream; anything after it is
                // uncompressed again. MCCP ends compression only at
                // connection end, so surface the tail as-is.
                Status::StreamEnd => {
                    out.extend_from_slice(&input[consumed..]);
                    break;
                }
                Status::BufError if produced == 0 && consumed < input.len() => {
                    return Err(ErrorKind::Compression(
                        "decompressor stalled without progress".to_string(),
                    )
                    .into());
                }
                Status::BufError => {}
            }
        }
        Ok(out)
    }
}

/// Stateful outbound zlib compressor.
pub(crate) struct Compressor {
    inner: Compress,
    scratch: Vec<u8>,
}

impl Compressor {
    pub(crate) fn new() -> Self {
        Self {
            inner: Compress::new(Compression::default(), true),
            scratch: vec![0; SCRATCH_SIZE],
        }
    }

    /// Compress one outbound message, sync-flushed so the peer can decode it
    /// without waiting for more data.
    pub(crate) fn push(&mut self, input: &[u8]) -> Result<Bytes> {
        let mut out = BytesMut::new();
        let mut consumed = 0usize;
        loop {
            let before_in = self.inner.total_in();
            let before_out = self.inner.total_out();
            let status = self
                .inner
                .compress(&input[consumed..], &mut self.scratch, FlushCompress::Sync)
                .map_err(|err| ErrorKind::Compression(err.to_string()))?;
            consumed += usize::try_from(self.inner.total_in() - before_in)
                .map_err(|err| ErrorKind::Compression(err.to_string()))?;
            let produced = usize::try_from(self.inner.total_out() - before_out)
                .map_err(|err| ErrorKind::Compression(err.to_string()))?;
            out.extend_from_slice(&self.scratch[..produced]);

            if consumed >= input.len() && produced < self.scratch.len() {
                return Ok(out.freeze());
            }
            if matches!(status, Status::StreamEnd) {
                return Ok(out.freeze());
            }
        }
    }
}

const SCRATCH_SIZE: usize = 16 * 1024;

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn compress_decompress_round_trip() {
        let mut compressor = Compressor::new();
        let mut decompressor = Decompressor::new();

        let first = compressor.push(b"You see a small corridor.\r\n").unwrap();
        let second = compressor.push(b"Exits: north, east.\r\n").unwrap();

        let mut recovered = decompressor.feed(&first).unwrap();
        recovered.extend(decompressor.feed(&second).unwrap());
        assert_eq!(
            recovered,
            b"You see a small corridor.\r\nExits: north, east.\r\n"
        );
    }

    #[test]
    fn split_input_decompresses_incrementally() {
        let mut compressor = Compressor::new();
        let mut decompressor = Decompressor::new();

        let wire = compressor.push(b"chunked delivery test").unwrap();
        let mut recovered = Vec::new();
        for chunk in wire.chunks(3) {
            recovered.extend(decompressor.feed(chunk).unwrap());
        }
        assert_eq!(recovered, b"chunked delivery test");
    }

    #[test]
    fn garbage_input_is_an_error() {
        let mut decompressor = Decompressor::new();
        assert!(decompressor.feed(&[0x00, 0x12, 0x34, 0x56]).is_err());
    }
}
