//! L001 link-layer packet acknowledgement and the A001/A010 handshake (C3).

use std::io::Write as IoWrite;

use log::warn;

use crate::constants::{
    PID_ACK_BYTE, PID_EXT_PRODUCT_DATA, PID_PRODUCT_DATA, PID_PRODUCT_RQST, PID_PROTOCOL_ARRAY,
    TAG_APPL_PROT_ID, TAG_LINK_PROT_ID,
};
use crate::error::LinkError;
use crate::escape::escape_bytes;
use crate::framing::{ByteReader, Packet, encode_packet};
use crate::transport::Transport;

/// Product identification returned by the device in response to
/// `Pid_Product_Rqst`.
#[derive(Debug, Clone)]
pub struct ProductData {
    pub product_id: u16,
    pub software_version: i16,
    pub product_description: String,
}

/// One entry of the device's advertised A001 protocol array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolEntry {
    pub tag: u8,
    pub data: u16,
}

impl ProtocolEntry {
    fn decode(raw: &[u8]) -> Self {
        Self {
            tag: raw[0],
            data: u16::from_le_bytes([raw[1], raw[2]]),
        }
    }
}

/// A live link session over a framed transport: product data and the
/// protocol array negotiated at handshake time, owned for the life of the
/// session.
pub struct LinkSession<T: Transport> {
    reader: ByteReader<T>,
    device: String,
    pub product: ProductData,
    pub protocols: Vec<ProtocolEntry>,
    trace_sink: Option<Box<dyn IoWrite>>,
}

impl<T: Transport> LinkSession<T> {
    /// Opens a session over an already-configured transport and performs the
    /// Product_Rqst/Product_Data/[Ext_Product_Data]/[Protocol_Array]
    /// handshake.
    pub fn handshake(transport: T, device: impl Into<String>) -> Result<Self, LinkError> {
        let device = device.into();
        let mut reader = ByteReader::new(transport);

        write_packet_ack(&mut reader, &device, &Packet::empty(PID_PRODUCT_RQST))?;

        let product_pkt = expect_packet_ack(&mut reader, &device, PID_PRODUCT_DATA)?;
        let product = decode_product_data(&product_pkt);

        let mut next = read_packet_ack(&mut reader, &device)?;

        if let Some(pkt) = &next {
            if pkt.id == PID_EXT_PRODUCT_DATA {
                next = read_packet_ack(&mut reader, &device)?;
            }
        }

        let protocols = match &next {
            Some(pkt) if pkt.id == PID_PROTOCOL_ARRAY => decode_protocol_array(&pkt.data),
            _ => Vec::new(),
        };

        let mut session = Self {
            reader,
            device,
            product,
            protocols,
            trace_sink: None,
        };
        session.verify_required_protocols()?;
        Ok(session)
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    /// Installs the `-l/--log` human-readable packet trace sink. Every
    /// packet read or written after this call produces one `< { ... }` or
    /// `> { ... }` line, matching the source's `garmin_log_packet`.
    pub fn set_trace_sink(&mut self, sink: Box<dyn IoWrite>) {
        self.trace_sink = Some(sink);
    }

    fn trace(&mut self, direction: char, pkt: &Packet) {
        if let Some(sink) = &mut self.trace_sink {
            let _ = writeln!(
                sink,
                "{direction}{{ id: {}, \"{}\" }}",
                pkt.id,
                escape_bytes(&pkt.data)
            );
        }
    }

    fn verify_required_protocols(&self) -> Result<(), LinkError> {
        let has_link = self
            .protocols
            .iter()
            .any(|p| p.tag == TAG_LINK_PROT_ID && p.data == 1);
        if !has_link {
            return Err(LinkError::MissingLinkProtocol {
                device: self.device.clone(),
            });
        }
        let has_appl = self
            .protocols
            .iter()
            .any(|p| p.tag == TAG_APPL_PROT_ID && p.data == 10);
        if !has_appl {
            return Err(LinkError::MissingApplicationProtocol {
                device: self.device.clone(),
            });
        }
        Ok(())
    }

    pub fn write_packet(&mut self, pkt: &Packet) -> Result<(), LinkError> {
        write_packet(&mut self.reader, &self.device, pkt)?;
        self.trace('>', pkt);
        Ok(())
    }

    pub fn write_packet_ack(&mut self, pkt: &Packet) -> Result<(), LinkError> {
        write_packet_ack(&mut self.reader, &self.device, pkt)?;
        self.trace('>', pkt);
        Ok(())
    }

    pub fn read_packet_ack(&mut self) -> Result<Option<Packet>, LinkError> {
        let pkt = read_packet_ack(&mut self.reader, &self.device)?;
        if let Some(pkt) = &pkt {
            self.trace('<', pkt);
        }
        Ok(pkt)
    }

    pub fn expect_packet_ack(&mut self, id: u8) -> Result<Packet, LinkError> {
        let pkt = expect_packet_ack(&mut self.reader, &self.device, id)?;
        self.trace('<', &pkt);
        Ok(pkt)
    }
}

fn write_packet<T: Transport>(
    reader: &mut ByteReader<T>,
    device: &str,
    pkt: &Packet,
) -> Result<(), LinkError> {
    let wire = encode_packet(pkt);
    log::trace!("> {{ id: {}, size: {} }}", pkt.id, pkt.size());
    reader
        .transport_mut()
        .write_all(&wire)
        .map_err(|e| LinkError::Framing(e.into()))
}

fn ack_packet(id: u8) -> Packet {
    Packet::new(PID_ACK_BYTE, (id as u16).to_le_bytes().to_vec())
}

/// Reads one packet and immediately acks it with the received id.
fn read_packet_ack<T: Transport>(
    reader: &mut ByteReader<T>,
    device: &str,
) -> Result<Option<Packet>, LinkError> {
    let Some(pkt) = reader.read_packet(device)? else {
        return Ok(None);
    };
    write_packet(reader, device, &ack_packet(pkt.id))?;
    Ok(Some(pkt))
}

/// Repeatedly reads+acks until a packet with `id` arrives; unexpected
/// packets in between are warned and skipped, tolerating the optional
/// handshake packets appearing out of order.
fn expect_packet_ack<T: Transport>(
    reader: &mut ByteReader<T>,
    device: &str,
    id: u8,
) -> Result<Packet, LinkError> {
    loop {
        let pkt = read_packet_ack(reader, device)?.ok_or_else(|| LinkError::ExpectedAck {
            device: device.to_string(),
        })?;
        if pkt.id == id {
            return Ok(pkt);
        }
        warn!("{device}: expected packet {id}, got {}; skipping", pkt.id);
    }
}

/// Sends `pkt`, then reads and validates the device's ack: a 1 or 2 byte
/// payload that, if present, must name `pkt.id`.
fn write_packet_ack<T: Transport>(
    reader: &mut ByteReader<T>,
    device: &str,
    pkt: &Packet,
) -> Result<(), LinkError> {
    write_packet(reader, device, pkt)?;

    let ack = reader
        .read_packet(device)?
        .ok_or_else(|| LinkError::ExpectedAck {
            device: device.to_string(),
        })?;

    if ack.id != PID_ACK_BYTE {
        return Err(LinkError::UnexpectedPacket {
            device: device.to_string(),
            id: ack.id,
        });
    }

    let target = match ack.data.len() {
        0 => None,
        1 => Some(ack.data[0] as u16),
        _ => Some(u16::from_le_bytes([ack.data[0], ack.data[1]])),
    };

    match target {
        None => Ok(()),
        Some(t) if t == pkt.id as u16 => Ok(()),
        Some(_) => Err(LinkError::AckMismatch {
            device: device.to_string(),
        }),
    }
}

fn decode_product_data(pkt: &Packet) -> ProductData {
    let product_id = u16::from_le_bytes([pkt.data[0], pkt.data[1]]);
    let software_version = i16::from_le_bytes([pkt.data[2], pkt.data[3]]);
    let desc_bytes = &pkt.data[4..];
    let nul = desc_bytes.iter().position(|&b| b == 0).unwrap_or(desc_bytes.len());
    let product_description = String::from_utf8_lossy(&desc_bytes[..nul]).into_owned();

    ProductData {
        product_id,
        software_version,
        product_description,
    }
}

fn decode_protocol_array(data: &[u8]) -> Vec<ProtocolEntry> {
    data.chunks_exact(3).map(ProtocolEntry::decode).collect()
}
