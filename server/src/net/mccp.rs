//! MCCP output compression (telnet options 85/86).
//!
//! Once the client acknowledges, every outgoing byte runs through a
//! zlib stream flushed at each pulse so the client never waits on
//! buffered data. Teardown finishes the stream cleanly; v1 and v2
//! differ only in the start-of-stream marker.

use core::telnet::{IAC, SB, SE, TELOPT_COMPRESS, TELOPT_COMPRESS2, WILL};

use flate2::{Compress, Compression, FlushCompress, Status};

/// Bytes announcing the start of the compressed stream. Everything
/// after this marker is zlib data.
pub fn start_marker(version: u8) -> Vec<u8> {
    match version {
        1 => vec![IAC, SB, TELOPT_COMPRESS, WILL, SE],
        _ => vec![IAC, SB, TELOPT_COMPRESS2, IAC, SE],
    }
}

/// Offer both MCCP versions; v2 is preferred by ordering.
pub fn offers() -> Vec<u8> {
    let mut out = Vec::with_capacity(6);
    out.extend(core::telnet::negotiate(WILL, TELOPT_COMPRESS2));
    out.extend(core::telnet::negotiate(WILL, TELOPT_COMPRESS));
    out
}

pub struct MccpStream {
    compress: Compress,
    pub version: u8,
}

impl MccpStream {
    pub fn new(version: u8) -> Self {
        MccpStream {
            compress: Compress::new(Compression::default(), true),
            version,
        }
    }

    /// Compress a chunk with a sync flush so it is immediately sendable.
    pub fn compress(&mut self, input: &[u8], out: &mut Vec<u8>) {
        let mut offset = 0;
        loop {
            let before = self.compress.total_in();
            let status = self
                .compress
                .compress_vec(&input[offset..], out, FlushCompress::Sync)
                .unwrap_or(Status::BufError);
            offset += (self.compress.total_in() - before) as usize;

            match status {
                Status::Ok | Status::StreamEnd if offset >= input.len() => break,
                Status::Ok => continue,
                Status::BufError => {
                    out.reserve(1024);
                    continue;
                }
                Status::StreamEnd => break,
            }
        }
    }

    /// Finish the stream for clean teardown; returns the trailing bytes.
    pub fn finish(mut self) -> Vec<u8> {
        let mut out = Vec::with_capacity(32);
        loop {
            match self
                .compress
                .compress_vec(&[], &mut out, FlushCompress::Finish)
            {
                Ok(Status::StreamEnd) => break,
                Ok(_) => {
                    out.reserve(256);
                }
                Err(e) => {
                    log::warn!("mccp finish failed: {e}");
                    break;
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn decompress(bytes: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        let mut decoder = flate2::read::ZlibDecoder::new(bytes);
        // Sync-flushed streams have no terminator until finish; read
        // what is available.
        let _ = decoder.read_to_end(&mut out);
        out
    }

    #[test]
    fn round_trips_through_zlib() {
        let mut stream = MccpStream::new(2);
        let mut compressed = Vec::new();
        stream.compress(b"You see a vast plain stretching east.\r\n", &mut compressed);
        compressed.extend(stream.finish());
        assert_eq!(
            decompress(&compressed),
            b"You see a vast plain stretching east.\r\n"
        );
    }

    #[test]
    fn chunked_writes_concatenate() {
        let mut stream = MccpStream::new(2);
        let mut compressed = Vec::new();
        stream.compress(b"first ", &mut compressed);
        stream.compress(b"second", &mut compressed);
        compressed.extend(stream.finish());
        assert_eq!(decompress(&compressed), b"first second");
    }

    #[test]
    fn version_markers_differ() {
        assert_ne!(start_marker(1), start_marker(2));
        assert_eq!(start_marker(2), vec![IAC, SB, TELOPT_COMPRESS2, IAC, SE]);
    }
}
