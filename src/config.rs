//! Immutable configuration record (ambient stack), built once by the CLI
//! layer from parsed arguments and environment lookups and threaded into
//! the session/operation constructors - the Design Notes' resolution of the
//! source's file-scope mutable globals.

use crate::flight::FlightSplitConfig;

/// Which of the three operations the CLI selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Id,
    Igc,
    Download,
}

#[derive(Debug, Clone, Default)]
pub struct IgcFields {
    pub manufacturer: String,
    pub serial_number: u32,
    pub pilot: Option<String>,
    pub glider_type: Option<String>,
    pub glider_id: Option<String>,
    pub competition_id: Option<String>,
    pub competition_class: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub device: String,
    pub operation: Operation,
    pub output_directory: Option<String>,
    pub log_path: Option<String>,
    pub power_off: bool,
    pub quiet: bool,
    /// `None` means "probe from the device's product description" (see
    /// [`crate::orchestrator::probe_barometric_altimeter`]).
    pub barometric_altimeter: Option<bool>,
    pub igc: IgcFields,
    pub flight_split: FlightSplitConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device: "/dev/ttyS0".to_string(),
            operation: Operation::Download,
            output_directory: None,
            log_path: None,
            power_off: false,
            quiet: false,
            barometric_altimeter: None,
            igc: IgcFields {
                manufacturer: "XXX".to_string(),
                serial_number: 0,
                ..Default::default()
            },
            flight_split: FlightSplitConfig::default(),
        }
    }
}
