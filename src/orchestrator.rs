//! Orchestrator (C8): composes the capability resolver, transfer engine,
//! track buffer and IGC emitter into the three user-facing operations, plus
//! the optional power-off command every operation may end with.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use indicatif::{ProgressBar, ProgressStyle};

use crate::capability::{self, TrackCapabilities};
use crate::config::Config;
use crate::constants::{CMND_TURN_OFF_PWR, PID_COMMAND_DATA};
use crate::error::{GarminError, IgcError};
use crate::escape::escape_bytes;
use crate::flight;
use crate::framing::Packet;
use crate::igc::{self, IgcMetadata};
use crate::link::LinkSession;
use crate::track::Track;
use crate::transfer::{TrackTransfer, TransferItem};
use crate::transport::Transport;

/// Decides whether the device has a barometric altimeter when the user
/// didn't override it with `-b`. Ports `garmin_has_barometric_altimeter`
/// (`original_source/garmini.c`): skip past the leading non-digit text, skip
/// the model number digits that follow, then scan the remaining run of the
/// same whitespace-delimited token for an `S`/`s` (Garmin suffixes
/// barometric-altimeter models with `S`, e.g. "GPSMAP 76CS", "eTrex 60CSx").
/// A description with no digit at all (e.g. "eTrex Vista") never matches.
pub fn probe_barometric_altimeter(product_description: &str) -> bool {
    let bytes = product_description.as_bytes();
    let mut i = 0;
    while i < bytes.len() && !bytes[i].is_ascii_digit() {
        i += 1;
    }
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    while i < bytes.len() && !bytes[i].is_ascii_whitespace() {
        if bytes[i] == b'S' || bytes[i] == b's' {
            return true;
        }
        i += 1;
    }
    false
}

fn resolve_barometric_altimeter(config: &Config, description: &str) -> bool {
    config
        .barometric_altimeter
        .unwrap_or_else(|| probe_barometric_altimeter(description))
}

/// Prints the `id` operation's output: product id, software version,
/// escaped product description, and a comma-joined protocol list.
pub fn run_id<T: Transport>(session: &LinkSession<T>, out: &mut dyn Write) -> std::io::Result<()> {
    writeln!(out, "Product ID: {}", session.product.product_id)?;
    writeln!(
        out,
        "Software version: {}.{:02}",
        session.product.software_version / 100,
        session.product.software_version.rem_euclid(100)
    )?;
    writeln!(
        out,
        "Product description: {}",
        escape_bytes(session.product.product_description.as_bytes())
    )?;
    let protocols = session
        .protocols
        .iter()
        .map(|p| format!("{}{:03}", p.tag as char, p.data))
        .collect::<Vec<_>>()
        .join(",");
    writeln!(out, "Protocols: {protocols}")?;
    Ok(())
}

/// Downloads the full track, optionally reporting progress via a progress
/// bar sized to the device-advertised record count.
pub fn download_track<T: Transport>(
    session: &mut LinkSession<T>,
    caps: TrackCapabilities,
    quiet: bool,
) -> Result<Track, GarminError> {
    let transfer = TrackTransfer::start(session, caps)?;
    let total = transfer.total();

    let progress = if quiet {
        None
    } else {
        let bar = ProgressBar::new(total as u64);
        bar.set_style(
            ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} records")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        Some(bar)
    };

    let mut track = Track::with_capacity(total as usize);
    for item in transfer {
        if let Some(bar) = &progress {
            bar.inc(1);
        }
        match item? {
            TransferItem::Point(point) => track.push(point),
            TransferItem::Header => {}
        }
    }
    if let Some(bar) = progress {
        bar.finish_and_clear();
    }

    Ok(track)
}

/// Resolves the device's advertised capabilities against the product id.
pub fn resolve_capabilities<T: Transport>(
    session: &LinkSession<T>,
) -> Result<TrackCapabilities, GarminError> {
    Ok(capability::resolve(
        &session.protocols,
        session.product.product_id,
        session.device(),
    )?)
}

fn igc_metadata(config: &Config, description: &str) -> IgcMetadata {
    IgcMetadata {
        manufacturer: config.igc.manufacturer.clone(),
        serial_number: config.igc.serial_number,
        pilot: config.igc.pilot.clone(),
        glider_type: config.igc.glider_type.clone(),
        glider_id: config.igc.glider_id.clone(),
        competition_id: config.igc.competition_id.clone(),
        competition_class: config.igc.competition_class.clone(),
        barometric_altimeter: resolve_barometric_altimeter(config, description),
    }
}

/// The `igc` operation: download the full track and emit it as a single IGC
/// stream.
pub fn run_igc<T: Transport>(
    session: &mut LinkSession<T>,
    config: &Config,
    out: &mut dyn Write,
) -> Result<(), GarminError> {
    let caps = resolve_capabilities(session)?;
    let track = download_track(session, caps, config.quiet)?;
    let meta = igc_metadata(config, &session.product.product_description);
    igc::emit(out, "<stream>", &session.product, &meta, &track)?;
    Ok(())
}

/// The `download` operation: download the full track, split it into
/// flights, and emit one IGC file per accepted flight into the configured
/// directory.
pub fn run_download<T: Transport>(
    session: &mut LinkSession<T>,
    config: &Config,
) -> Result<Vec<String>, GarminError> {
    let caps = resolve_capabilities(session)?;
    let track = download_track(session, caps, config.quiet)?;
    let meta = igc_metadata(config, &session.product.product_description);

    let directory = config.output_directory.as_deref().unwrap_or(".");
    let flights = flight::split(track.as_slice(), &config.flight_split);

    let mut written = Vec::new();
    let mut flight_number_by_day: std::collections::HashMap<(i32, u32, u32), u32> =
        std::collections::HashMap::new();

    for points in flights {
        let flight_track: Track = points.iter().copied().collect();
        let first = flight_track
            .iter()
            .find(|p| p.is_valid_fix())
            .ok_or_else(|| {
                GarminError::message(format!(
                    "{}: flight has no valid fixes to date-stamp",
                    session.device()
                ))
            })?;

        let dt = chrono::DateTime::from_timestamp(first.time, 0)
            .expect("garmin timestamps fit in i64 seconds");
        use chrono::Datelike;
        let day_key = (dt.year(), dt.month(), dt.day());
        let counter = flight_number_by_day.entry(day_key).or_insert(0);
        *counter += 1;

        let filename = format!(
            "{:04}-{:02}-{:02}-{}-{}-{:02}.IGC",
            dt.year(),
            dt.month(),
            dt.day(),
            meta.manufacturer,
            meta.serial_number,
            counter
        );
        let path = Path::new(directory).join(&filename);
        let path_str = path.display().to_string();

        let mut file = File::create(&path).map_err(|source| IgcError::Io {
            path: path_str.clone(),
            source,
        })?;
        igc::emit(&mut file, &path_str, &session.product, &meta, &flight_track)?;
        file.flush().map_err(|source| IgcError::Io {
            path: path_str.clone(),
            source,
        })?;

        written.push(path_str);
    }

    Ok(written)
}

/// Sends `Cmnd_Turn_Off_Pwr` with no ack expected - the device powers off
/// immediately upon receipt.
pub fn send_power_off<T: Transport>(session: &mut LinkSession<T>) -> Result<(), GarminError> {
    session.write_packet(&Packet::new(
        PID_COMMAND_DATA,
        (CMND_TURN_OFF_PWR as u16).to_le_bytes().to_vec(),
    ))?;
    Ok(())
}
