//! Garmin serial link stack: framing, handshake, capability resolution,
//! track transfer, and IGC rendering for Garmin GPS receivers' on-device
//! track log.

pub mod capability;
pub mod config;
pub mod constants;
pub mod error;
pub mod escape;
pub mod flight;
pub mod framing;
pub mod igc;
pub mod link;
pub mod orchestrator;
pub mod records;
pub mod track;
pub mod transfer;
pub mod transport;
