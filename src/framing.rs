//! DLE/ETX byte-stuffed packet framing (C2), L000 in Garmin's own numbering.
//!
//! A frame on the wire looks like:
//!
//! ```text
//! DLE id [DLE] size [DLE] data[0..size] [DLE]* checksum [DLE] DLE ETX
//! ```
//!
//! Every occurrence of `DLE` inside `id`, `size`, `data` or `checksum` is
//! doubled; the framer transparently stuffs on encode and unstuffs on
//! decode. The trailing `DLE ETX` is never stuffed - it is the sentinel that
//! terminates the frame.

use log::trace;

use crate::constants::{DLE, ETX, READ_BUFFER_CAPACITY};
use crate::error::FramingError;
use crate::transport::Transport;

/// One decoded link-layer packet: an 8-bit id and up to 255 bytes of payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub id: u8,
    pub data: Vec<u8>,
}

impl Packet {
    pub fn new(id: u8, data: Vec<u8>) -> Self {
        Self { id, data }
    }

    pub fn empty(id: u8) -> Self {
        Self { id, data: Vec::new() }
    }

    pub fn size(&self) -> u8 {
        self.data.len() as u8
    }
}

/// Read-ahead byte source sitting on top of a [`Transport`], mirroring the
/// source's `garmin_t.buf[1024]` staging buffer. Framing code consumes one
/// byte at a time through [`ByteReader::get_byte`]; a timed-out read with no
/// data yields `None` rather than blocking.
pub struct ByteReader<T: Transport> {
    transport: T,
    buf: [u8; READ_BUFFER_CAPACITY],
    pos: usize,
    len: usize,
}

impl<T: Transport> ByteReader<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            buf: [0u8; READ_BUFFER_CAPACITY],
            pos: 0,
            len: 0,
        }
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Returns the next byte, refilling from the transport when the
    /// read-ahead buffer is empty. `Ok(None)` means the transport's wait
    /// timed out with no data available - a clean "nothing here yet", not an
    /// error.
    fn get_byte(&mut self) -> Result<Option<u8>, FramingError> {
        if self.pos == self.len {
            self.len = self.transport.read_ready(&mut self.buf)?;
            self.pos = 0;
            if self.len == 0 {
                return Ok(None);
            }
        }
        let b = self.buf[self.pos];
        self.pos += 1;
        Ok(Some(b))
    }

    /// Reads one byte through the doubled-DLE unstuffing rule: a `DLE` is
    /// only valid here when immediately followed by a second `DLE`; any
    /// other byte following a `DLE` is malformed framing.
    fn get_dle_byte(&mut self, device: &str) -> Result<u8, FramingError> {
        let b = self.require_byte(device)?;
        if b == DLE {
            let b2 = self.require_byte(device)?;
            if b2 != DLE {
                return Err(FramingError::ExpectedDle {
                    device: device.to_string(),
                });
            }
        }
        Ok(b)
    }

    /// Like `get_byte`, but a timeout here means "incomplete packet" - the
    /// caller is already inside a frame and expects more bytes to follow.
    fn require_byte(&mut self, device: &str) -> Result<u8, FramingError> {
        self.get_byte()?.ok_or_else(|| FramingError::Incomplete {
            device: device.to_string(),
        })
    }

    /// Decodes one frame, or returns `Ok(None)` on a clean, between-frames
    /// EOF (a read timeout at the very top of a frame, with nothing
    /// partially consumed).
    pub fn read_packet(&mut self, device: &str) -> Result<Option<Packet>, FramingError> {
        let Some(lead) = self.get_byte()? else {
            return Ok(None);
        };
        if lead != DLE {
            return Err(FramingError::ExpectedDle {
                device: device.to_string(),
            });
        }

        let id = self.get_dle_byte(device)?;
        let size = self.get_dle_byte(device)?;

        let mut data = Vec::with_capacity(size as usize);
        for _ in 0..size {
            data.push(self.get_dle_byte(device)?);
        }

        let checksum = self.get_dle_byte(device)?;

        let trailer_dle = self.require_byte(device)?;
        let trailer_etx = self.require_byte(device)?;
        if trailer_dle != DLE || trailer_etx != ETX {
            return Err(FramingError::ExpectedEtx {
                device: device.to_string(),
            });
        }

        let sum = (id as u32) + (size as u32) + data.iter().map(|&b| b as u32).sum::<u32>();
        if ((sum + checksum as u32) & 0xff) != 0 {
            return Err(FramingError::ChecksumFailed {
                device: device.to_string(),
            });
        }

        trace!("< {{ id: {id}, size: {size} }}");
        Ok(Some(Packet { id, data }))
    }
}

fn push_stuffed(out: &mut Vec<u8>, b: u8) {
    out.push(b);
    if b == DLE {
        out.push(DLE);
    }
}

/// Encodes `pkt` as a complete DLE-stuffed frame ready for one transport
/// write.
pub fn encode_packet(pkt: &Packet) -> Vec<u8> {
    let mut out = Vec::with_capacity(pkt.data.len() + 8);
    out.push(DLE);
    push_stuffed(&mut out, pkt.id);
    push_stuffed(&mut out, pkt.size());

    let mut sum = (pkt.id as u32) + (pkt.size() as u32);
    for &b in &pkt.data {
        push_stuffed(&mut out, b);
        sum += b as u32;
    }

    let checksum = ((!sum).wrapping_add(1)) as u8;
    push_stuffed(&mut out, checksum);

    out.push(DLE);
    out.push(ETX);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::tests::MockTransport;

    fn checksum(id: u8, data: &[u8]) -> u8 {
        let sum = (id as u32) + (data.len() as u32) + data.iter().map(|&b| b as u32).sum::<u32>();
        ((!sum).wrapping_add(1)) as u8
    }

    #[test]
    fn encode_then_decode_roundtrips() {
        let pkt = Packet::new(16, vec![0x41]);
        let wire = encode_packet(&pkt);
        let mut reader = ByteReader::new(MockTransport::new(wire));
        let decoded = reader.read_packet("test").unwrap().unwrap();
        assert_eq!(decoded, pkt);
    }

    #[test]
    fn decode_short_frame_matches_worked_example() {
        // DLE 16 [no stuff] size=1 data='A' checksum DLE DLE ETX
        let cs = checksum(16, &[0x41]);
        let wire = vec![DLE, 16, 1, 0x41, cs, DLE, ETX];
        let mut reader = ByteReader::new(MockTransport::new(wire));
        let pkt = reader.read_packet("test").unwrap().unwrap();
        assert_eq!(pkt.id, 16);
        assert_eq!(pkt.data, vec![0x41]);
    }

    #[test]
    fn decode_rejects_bad_checksum() {
        let cs = checksum(16, &[0x41]).wrapping_add(1);
        let wire = vec![DLE, 16, 1, 0x41, cs, DLE, ETX];
        let mut reader = ByteReader::new(MockTransport::new(wire));
        let err = reader.read_packet("test").unwrap_err();
        assert!(matches!(err, FramingError::ChecksumFailed { .. }));
    }

    #[test]
    fn decode_stuffs_dle_payload_byte() {
        let pkt = Packet::new(1, vec![DLE, 2, DLE]);
        let wire = encode_packet(&pkt);
        // three DLE-valued payload bytes must each appear doubled on the wire
        assert_eq!(wire.iter().filter(|&&b| b == DLE).count(), 2 * 3 + 2);
        let mut reader = ByteReader::new(MockTransport::new(wire));
        let decoded = reader.read_packet("test").unwrap().unwrap();
        assert_eq!(decoded, pkt);
    }

    #[test]
    fn decode_clean_eof_before_any_byte() {
        let mut reader = ByteReader::new(MockTransport::new(vec![]));
        assert!(reader.read_packet("test").unwrap().is_none());
    }

    #[test]
    fn decode_incomplete_frame_is_fatal() {
        let mut reader = ByteReader::new(MockTransport::new(vec![DLE, 16, 1]));
        let err = reader.read_packet("test").unwrap_err();
        assert!(matches!(err, FramingError::Incomplete { .. }));
    }

    #[test]
    fn decode_lone_dle_in_payload_position_is_fatal() {
        // id byte is DLE but not doubled
        let wire = vec![DLE, DLE, 0x00, DLE, ETX];
        let mut reader = ByteReader::new(MockTransport::new(wire));
        let err = reader.read_packet("test").unwrap_err();
        assert!(matches!(err, FramingError::ExpectedDle { .. }));
    }
}
