//! Transfer engine (C5): issues a device command and streams the records the
//! device replies with, one ack'd packet at a time.

use crate::capability::TrackCapabilities;
use crate::constants::{
    CMND_TRANSFER_TRK, PID_COMMAND_DATA, PID_RECORDS, PID_TRK_DATA, PID_TRK_HDR, PID_XFER_CMPLT,
};
use crate::error::{CapabilityError, GarminError};
use crate::framing::Packet;
use crate::link::LinkSession;
use crate::records::TrackPoint;
use crate::transport::Transport;

/// One record yielded by a transfer. Headers (D310-D312) are acked like any
/// other record but carry no output; only `Point` contributes to the
/// assembled track.
#[derive(Debug)]
pub enum TransferItem {
    Point(TrackPoint),
    Header,
}

/// A finite, restartable stream of decoded records with a known total
/// count, replacing the source's `garmin_each(i, N, packet)` callback with
/// an ordinary iterator a progress bar or the track assembler can consume
/// directly.
pub struct TrackTransfer<'a, T: Transport> {
    session: &'a mut LinkSession<T>,
    caps: TrackCapabilities,
    total: u16,
    index: u16,
    completed: bool,
}

impl<'a, T: Transport> TrackTransfer<'a, T> {
    /// Issues `Cmnd_Transfer_Trk` and reads the device's record count,
    /// returning a stream over exactly that many records.
    pub fn start(
        session: &'a mut LinkSession<T>,
        caps: TrackCapabilities,
    ) -> Result<Self, GarminError> {
        session.write_packet_ack(&Packet::new(
            PID_COMMAND_DATA,
            (CMND_TRANSFER_TRK as u16).to_le_bytes().to_vec(),
        ))?;

        let records_pkt = session.expect_packet_ack(PID_RECORDS)?;
        let total = u16::from_le_bytes([records_pkt.data[0], records_pkt.data[1]]);

        Ok(Self {
            session,
            caps,
            total,
            index: 0,
            completed: false,
        })
    }

    /// The device-advertised total record count, known up front.
    pub fn total(&self) -> u16 {
        self.total
    }

    fn device(&self) -> String {
        self.session.device().to_string()
    }

    fn finish(&mut self) -> Result<(), GarminError> {
        if !self.completed {
            self.session.expect_packet_ack(PID_XFER_CMPLT)?;
            self.completed = true;
        }
        Ok(())
    }
}

impl<'a, T: Transport> Iterator for TrackTransfer<'a, T> {
    type Item = Result<TransferItem, GarminError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.total {
            if let Err(e) = self.finish() {
                return Some(Err(e));
            }
            return None;
        }

        let device = self.device();
        let pkt = match self.session.read_packet_ack() {
            Ok(Some(pkt)) => pkt,
            Ok(None) => {
                return Some(Err(GarminError::message(format!(
                    "{device}: incomplete transfer, expected {} more record(s)",
                    self.total - self.index
                ))));
            }
            Err(e) => return Some(Err(e.into())),
        };
        self.index += 1;

        match pkt.id {
            PID_TRK_DATA => match self.caps.track_point.decode(&pkt.data, &device) {
                Ok(point) => Some(Ok(TransferItem::Point(point))),
                Err(e) => Some(Err(e.into())),
            },
            PID_TRK_HDR => Some(Ok(TransferItem::Header)),
            _ => Some(Err(CapabilityError::Unsupported { device }.into())),
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.total - self.index) as usize;
        (remaining, Some(remaining))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::TrackCapabilities;
    use crate::constants::PID_ACK_BYTE;
    use crate::framing::encode_packet;
    use crate::link::LinkSession;
    use crate::records::TrackPointFormat;
    use crate::transport::tests::MockTransport;

    fn d301_payload(lat: i32, lon: i32, time: u32, alt: f32) -> Vec<u8> {
        let mut v = Vec::new();
        v.extend_from_slice(&lat.to_le_bytes());
        v.extend_from_slice(&lon.to_le_bytes());
        v.extend_from_slice(&time.to_le_bytes());
        v.extend_from_slice(&alt.to_le_bytes());
        v.extend_from_slice(&0f32.to_le_bytes());
        v.push(0);
        v
    }

    fn ack(id: u8) -> Vec<u8> {
        encode_packet(&Packet::new(PID_ACK_BYTE, (id as u16).to_le_bytes().to_vec()))
    }

    fn stub_session(wire: Vec<u8>) -> LinkSession<MockTransport> {
        // Build a minimal handshake wire ahead of `wire` so LinkSession::handshake succeeds,
        // then hand the transfer-phase bytes after it.
        let mut full = Vec::new();
        full.extend(ack(254));
        let mut product = Vec::new();
        product.extend_from_slice(&50u16.to_le_bytes());
        product.extend_from_slice(&250i16.to_le_bytes());
        product.extend_from_slice(b"GPS 12 XL\0");
        full.extend(encode_packet(&Packet::new(255, product)));
        let mut protocols = Vec::new();
        protocols.extend_from_slice(&[b'L', 1, 0]);
        protocols.extend_from_slice(&[b'A', 10, 0]);
        protocols.extend_from_slice(&[b'A', 44, 1]);
        protocols.extend_from_slice(&[b'D', 44, 1]);
        full.extend(encode_packet(&Packet::new(253, protocols)));
        full.extend(wire);
        LinkSession::handshake(MockTransport::new(full), "test").unwrap()
    }

    #[test]
    fn transfer_yields_exactly_n_records_then_completes() {
        let mut wire = Vec::new();
        wire.extend(ack(PID_COMMAND_DATA));
        wire.extend(encode_packet(&Packet::new(PID_RECORDS, 2u16.to_le_bytes().to_vec())));
        wire.extend(encode_packet(&Packet::new(
            PID_TRK_DATA,
            d301_payload(1_000_000, 2_000_000, 0, 100.0),
        )));
        wire.extend(encode_packet(&Packet::new(
            PID_TRK_DATA,
            d301_payload(1_000_001, 2_000_001, 60, 110.0),
        )));
        wire.extend(encode_packet(&Packet::new(PID_XFER_CMPLT, vec![])));

        let mut session = stub_session(wire);
        let caps = TrackCapabilities {
            track_header: None,
            track_point: TrackPointFormat::D301,
        };
        let transfer = TrackTransfer::start(&mut session, caps).unwrap();
        assert_eq!(transfer.total(), 2);
        let items: Vec<_> = transfer.collect::<Result<_, _>>().unwrap();
        assert_eq!(items.len(), 2);
        assert!(matches!(items[0], TransferItem::Point(_)));
        assert!(matches!(items[1], TransferItem::Point(_)));
    }

    #[test]
    fn transfer_acks_and_skips_headers() {
        let mut wire = Vec::new();
        wire.extend(ack(PID_COMMAND_DATA));
        wire.extend(encode_packet(&Packet::new(PID_RECORDS, 1u16.to_le_bytes().to_vec())));
        wire.extend(encode_packet(&Packet::new(PID_TRK_HDR, vec![0, 0, 0])));
        wire.extend(encode_packet(&Packet::new(PID_XFER_CMPLT, vec![])));

        let mut session = stub_session(wire);
        let caps = TrackCapabilities {
            track_header: None,
            track_point: TrackPointFormat::D301,
        };
        let transfer = TrackTransfer::start(&mut session, caps).unwrap();
        let items: Vec<_> = transfer.collect::<Result<_, _>>().unwrap();
        assert_eq!(items.len(), 1);
        assert!(matches!(items[0], TransferItem::Header));
    }
}
