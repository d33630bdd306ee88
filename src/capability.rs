//! Capability resolver (C4): scans the A001 protocol array to pick the
//! track-point and optional track-header data-protocol ids the device
//! actually supports.

use num_enum::TryFromPrimitive;

use crate::constants::{LEGACY_D300_PRODUCT_IDS, TAG_APPL_PROT_ID, TAG_DATA_PROT_ID};
use crate::error::CapabilityError;
use crate::link::ProtocolEntry;
use crate::records::TrackPointFormat;

/// The track-header data-protocol id, recognised for validation but never
/// decoded by this core (D310/D311/D312 payloads are opaque and simply
/// acked).
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u16)]
pub enum TrackHeaderFormat {
    D310 = 310,
    D311 = 311,
    D312 = 312,
}

impl TrackHeaderFormat {
    fn from_data_id(id: u16) -> Option<Self> {
        Self::try_from(id).ok()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TrackCapabilities {
    pub track_header: Option<TrackHeaderFormat>,
    pub track_point: TrackPointFormat,
}

/// Scans `protocols` in device-advertised order, implementing the A300/A301
/// /A302 dispatch: an A300 application entry names one following data
/// protocol (the track point format); A301/A302 name two (track header,
/// then track point).
pub fn resolve(
    protocols: &[ProtocolEntry],
    product_id: u16,
    device: &str,
) -> Result<TrackCapabilities, CapabilityError> {
    let mut track_header_id: Option<u16> = None;
    let mut track_point_id: Option<u16> = None;

    let mut i = 0;
    while i < protocols.len() {
        let entry = protocols[i];
        i += 1;

        if entry.tag != TAG_APPL_PROT_ID {
            continue;
        }

        match entry.data {
            300 => {
                let d = next_data_entry(protocols, &mut i, device)?;
                track_point_id = Some(d);
            }
            301 | 302 => {
                let hdr = next_data_entry(protocols, &mut i, device)?;
                let pt = next_data_entry(protocols, &mut i, device)?;
                track_header_id = Some(hdr);
                track_point_id = Some(pt);
            }
            _ => {}
        }
    }

    if track_point_id.is_none() && LEGACY_D300_PRODUCT_IDS.binary_search(&product_id).is_ok() {
        track_point_id = Some(300);
    }

    let track_point_id = track_point_id.ok_or_else(|| CapabilityError::Unsupported {
        device: device.to_string(),
    })?;
    let track_point = TrackPointFormat::from_data_id(track_point_id).ok_or_else(|| {
        CapabilityError::Unsupported {
            device: device.to_string(),
        }
    })?;

    let track_header = match track_header_id {
        None => None,
        Some(id) => Some(TrackHeaderFormat::from_data_id(id).ok_or_else(|| {
            CapabilityError::Unsupported {
                device: device.to_string(),
            }
        })?),
    };

    Ok(TrackCapabilities {
        track_header,
        track_point,
    })
}

fn next_data_entry(
    protocols: &[ProtocolEntry],
    i: &mut usize,
    device: &str,
) -> Result<u16, CapabilityError> {
    let entry = protocols.get(*i).ok_or_else(|| CapabilityError::Unsupported {
        device: device.to_string(),
    })?;
    if entry.tag != TAG_DATA_PROT_ID {
        return Err(CapabilityError::Unsupported {
            device: device.to_string(),
        });
    }
    *i += 1;
    Ok(entry.data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{TAG_APPL_PROT_ID, TAG_DATA_PROT_ID, TAG_LINK_PROT_ID, TAG_PHYS_PROT_ID};

    fn entry(tag: u8, data: u16) -> ProtocolEntry {
        ProtocolEntry { tag, data }
    }

    #[test]
    fn a300_picks_single_track_point_protocol() {
        let protocols = vec![
            entry(TAG_PHYS_PROT_ID, 0),
            entry(TAG_LINK_PROT_ID, 1),
            entry(TAG_APPL_PROT_ID, 10),
            entry(TAG_APPL_PROT_ID, 300),
            entry(TAG_DATA_PROT_ID, 300),
        ];
        let caps = resolve(&protocols, 9999, "test").unwrap();
        assert_eq!(caps.track_point, TrackPointFormat::D300);
        assert!(caps.track_header.is_none());
    }

    #[test]
    fn a301_picks_header_and_point_protocols() {
        let protocols = vec![
            entry(TAG_APPL_PROT_ID, 301),
            entry(TAG_DATA_PROT_ID, 310),
            entry(TAG_DATA_PROT_ID, 301),
        ];
        let caps = resolve(&protocols, 9999, "test").unwrap();
        assert_eq!(caps.track_point, TrackPointFormat::D301);
        assert_eq!(caps.track_header, Some(TrackHeaderFormat::D310));
    }

    #[test]
    fn legacy_product_id_falls_back_to_d300() {
        let caps = resolve(&[], 13, "test").unwrap();
        assert_eq!(caps.track_point, TrackPointFormat::D300);
    }

    #[test]
    fn unknown_product_with_no_protocols_is_unsupported() {
        let err = resolve(&[], 1, "test").unwrap_err();
        assert!(matches!(err, CapabilityError::Unsupported { .. }));
    }

    #[test]
    fn truncated_a301_entry_is_unsupported() {
        let protocols = vec![entry(TAG_APPL_PROT_ID, 301), entry(TAG_DATA_PROT_ID, 310)];
        let err = resolve(&protocols, 9999, "test").unwrap_err();
        assert!(matches!(err, CapabilityError::Unsupported { .. }));
    }
}
