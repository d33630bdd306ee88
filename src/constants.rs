//! Wire-level constants for the Garmin link protocol stack (L000/L001/A001/A010).

/// Data-Link Escape: marks the start of a frame and introduces byte-stuffing.
pub const DLE: u8 = 0x10;
/// End of TeXt: terminates a frame, always preceded by a final `DLE`.
pub const ETX: u8 = 0x03;

/// L000 / L001 packet ids.
pub const PID_ACK_BYTE: u8 = 6;
#[allow(dead_code)]
pub const PID_NAK_BYTE: u8 = 21;
pub const PID_PROTOCOL_ARRAY: u8 = 253;
pub const PID_PRODUCT_RQST: u8 = 254;
pub const PID_PRODUCT_DATA: u8 = 255;
pub const PID_EXT_PRODUCT_DATA: u8 = 248;
pub const PID_COMMAND_DATA: u8 = 10;
pub const PID_XFER_CMPLT: u8 = 12;
pub const PID_RECORDS: u8 = 27;
pub const PID_TRK_DATA: u8 = 34;
pub const PID_TRK_HDR: u8 = 99;

/// A001 protocol-array tag bytes.
pub const TAG_PHYS_PROT_ID: u8 = b'P';
pub const TAG_LINK_PROT_ID: u8 = b'L';
pub const TAG_APPL_PROT_ID: u8 = b'A';
pub const TAG_DATA_PROT_ID: u8 = b'D';

/// A010 device commands.
#[allow(dead_code)]
pub const CMND_ABORT_TRANSFER: u16 = 0;
pub const CMND_TRANSFER_TRK: u16 = 6;
pub const CMND_TURN_OFF_PWR: u16 = 8;

/// Converts the Garmin device epoch (1989-12-31 00:00:00 UTC) to POSIX time.
pub const GARMIN_TIME_OFFSET: i64 = 631_065_600;

/// Sentinel "no position fix" value for both `lat` and `lon`.
pub const INVALID_SEMICIRCLE: i32 = 0x7FFF_FFFF;

/// Sentinel "no altitude" value carried by D301-D304 records lacking a fix.
pub const INVALID_ALTITUDE: f32 = 1.0e25;

/// Read-ahead buffer capacity, mirroring the source's `garmin_t.buf[1024]`.
pub const READ_BUFFER_CAPACITY: usize = 1024;

/// Microseconds the transport waits for readable data before treating the
/// line as idle.
pub const READ_TIMEOUT_US: u32 = 10_000;

/// Initial capacity of a freshly created track buffer.
pub const TRACK_INITIAL_CAPACITY: usize = 16384;

/// Product ids that predate the A300/A301/A302 protocol-array advertisement
/// and must be assumed to speak D300 track points.
pub const LEGACY_D300_PRODUCT_IDS: &[u16] = &[
    13, 18, 22, 23, 24, 25, 29, 31, 35, 36, 39, 41, 42, 44, 45, 47, 48, 49, 50, 53, 55, 56, 59,
    61, 62, 71, 72, 73, 74, 76, 77, 87, 88, 95, 96, 97, 100, 105, 106, 112,
];
