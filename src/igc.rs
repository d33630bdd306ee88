//! IGC emitter (C7): formats track points and headers as CRLF-terminated IGC
//! records, filtering sentinel-invalid points and tracking date rollovers.

use std::io::Write;

use chrono::{DateTime, Datelike, Timelike, Utc};

use crate::error::IgcError;
use crate::link::ProductData;
use crate::track::Track;

/// IGC header metadata supplied by the CLI layer; only the `Some` fields
/// produce an output line.
#[derive(Debug, Clone, Default)]
pub struct IgcMetadata {
    pub manufacturer: String,
    pub serial_number: u32,
    pub pilot: Option<String>,
    pub glider_type: Option<String>,
    pub glider_id: Option<String>,
    pub competition_id: Option<String>,
    pub competition_class: Option<String>,
    pub barometric_altimeter: bool,
}

fn posix_to_utc(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).expect("garmin timestamps fit in i64 seconds")
}

fn round_half_up(x: f32) -> i32 {
    if x <= 0.0 { 0 } else { (x + 0.5).floor() as i32 }
}

struct Semicircle {
    deg_whole: u32,
    min_thou: u32,
    positive: bool,
}

fn semicircle_to_parts(value: i32) -> Semicircle {
    let deg = (value.unsigned_abs() as f64) * 180.0 / 2f64.powi(31) + 0.5 / 60000.0;
    let deg_whole = deg.trunc() as u32;
    let min_thou = (60000.0 * (deg - deg_whole as f64)).trunc() as u32;
    Semicircle {
        deg_whole,
        min_thou,
        positive: value > 0,
    }
}

fn write_record(out: &mut dyn Write, line: &str, path: &str) -> Result<(), IgcError> {
    write!(out, "{line}\r\n").map_err(|source| IgcError::Io {
        path: path.to_string(),
        source,
    })
}

/// Writes a complete IGC stream (headers + B-records) for `track` to `out`.
pub fn emit(
    out: &mut dyn Write,
    path: &str,
    product: &ProductData,
    meta: &IgcMetadata,
    track: &Track,
) -> Result<(), IgcError> {
    write_record(
        out,
        &format!("A{}{:03}", meta.manufacturer, meta.serial_number),
        path,
    )?;

    let first_valid = track.iter().find(|p| p.is_valid_fix());
    let (mut date_day, mut date_month, mut date_year) = match first_valid {
        Some(p) => {
            let dt = posix_to_utc(p.time);
            (dt.day(), dt.month(), dt.year())
        }
        None => (0, 0, 0),
    };
    write_record(out, &hfdte_line(date_day, date_month, date_year), path)?;

    write_record(out, "HFFXA100", path)?;
    if let Some(pilot) = &meta.pilot {
        write_record(out, &format!("HPPLTPILOT:{pilot}"), path)?;
    }
    if let Some(glider_type) = &meta.glider_type {
        write_record(out, &format!("HPGTYGLIDERTYPE:{glider_type}"), path)?;
    }
    if let Some(glider_id) = &meta.glider_id {
        write_record(out, &format!("HPGIDGLIDERID:{glider_id}"), path)?;
    }
    write_record(out, "HDTM100GPSDATUM:WGS-1984", path)?;
    write_record(
        out,
        &format!(
            "HFRFWFIRMWAREREVISION:{}.{:02}",
            product.software_version / 100,
            product.software_version.rem_euclid(100)
        ),
        path,
    )?;
    write_record(
        out,
        &format!("HFFTYFRTYPE:GARMIN,{}", product.product_description),
        path,
    )?;
    if let Some(id) = &meta.competition_id {
        write_record(out, &format!("HPCIDCOMPETITIONID:{id}"), path)?;
    }
    if let Some(class) = &meta.competition_class {
        write_record(out, &format!("HPCCLCOMPETITIONCLASS:{class}"), path)?;
    }

    for point in track.iter().filter(|p| p.is_valid_fix()) {
        let dt = posix_to_utc(point.time);
        let (day, month, year) = (dt.day(), dt.month(), dt.year());
        if (day, month, year) != (date_day, date_month, date_year) {
            date_day = day;
            date_month = month;
            date_year = year;
            write_record(out, &hfdte_line(date_day, date_month, date_year), path)?;
        }

        let lat = semicircle_to_parts(point.posn.lat);
        let lon = semicircle_to_parts(point.posn.lon);
        let ns = if lat.positive { 'N' } else { 'S' };
        let ew = if lon.positive { 'E' } else { 'W' };

        let int_alt = round_half_up(point.alt);
        let (pressure_alt, gnss_alt) = if meta.barometric_altimeter {
            (int_alt, 0)
        } else {
            (0, int_alt)
        };

        write_record(
            out,
            &format!(
                "B{:02}{:02}{:02}{:02}{:05}{}{:03}{:05}{}{}{:05}{:05}",
                dt.hour(),
                dt.minute(),
                dt.second(),
                lat.deg_whole,
                lat.min_thou,
                ns,
                lon.deg_whole,
                lon.min_thou,
                ew,
                point.validity.as_char(),
                pressure_alt,
                gnss_alt,
            ),
            path,
        )?;
    }

    Ok(())
}

fn hfdte_line(day: u32, month: u32, year: i32) -> String {
    format!("HFDTE{day:02}{month:02}{:02}", (year % 100 + 100) % 100)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{Position, TrackPoint, Validity};

    fn product(desc: &str, sw: i16) -> ProductData {
        ProductData {
            product_id: 50,
            software_version: sw,
            product_description: desc.to_string(),
        }
    }

    #[test]
    fn b_record_matches_worked_example() {
        let meta = IgcMetadata {
            manufacturer: "XYZ".to_string(),
            serial_number: 42,
            barometric_altimeter: false,
            ..Default::default()
        };
        let mut track = Track::new();
        track.push(TrackPoint {
            time: 0,
            posn: Position {
                lat: 536_870_912,
                lon: 536_870_912,
            },
            alt: 100.0,
            validity: Validity::Fix3D,
        });

        let mut buf = Vec::new();
        emit(&mut buf, "test.igc", &product("GPS 12", 250), &meta, &track).unwrap();
        let text = String::from_utf8(buf).unwrap();

        assert!(text.starts_with("AXYZ042\r\n"));
        let b_line = text.lines().find(|l| l.starts_with('B')).unwrap();
        assert_eq!(b_line, "B0000004500000N04500000EA0000000100");
    }

    #[test]
    fn sentinel_points_produce_no_b_record() {
        let meta = IgcMetadata::default();
        let mut track = Track::new();
        track.push(TrackPoint {
            time: 0,
            posn: Position::INVALID,
            alt: 0.0,
            validity: Validity::Fix3D,
        });
        track.push(TrackPoint {
            time: 0,
            posn: Position { lat: 0, lon: 0 },
            alt: 1.0e25,
            validity: Validity::Fix3D,
        });

        let mut buf = Vec::new();
        emit(&mut buf, "test.igc", &product("GPS", 100), &meta, &track).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(!text.lines().any(|l| l.starts_with('B')));
    }

    #[test]
    fn date_rollover_emits_exactly_one_extra_hfdte() {
        let meta = IgcMetadata::default();
        let mut track = Track::new();
        // one point just before UTC midnight, one just after
        track.push(TrackPoint {
            time: 10 * 86_400 - 1,
            posn: Position { lat: 1_000_000, lon: 1_000_000 },
            alt: 10.0,
            validity: Validity::Fix3D,
        });
        track.push(TrackPoint {
            time: 10 * 86_400 + 10,
            posn: Position { lat: 1_000_000, lon: 1_000_000 },
            alt: 10.0,
            validity: Validity::Fix3D,
        });

        let mut buf = Vec::new();
        emit(&mut buf, "test.igc", &product("GPS", 100), &meta, &track).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let hfdte_count = text.lines().filter(|l| l.starts_with("HFDTE")).count();
        assert_eq!(hfdte_count, 2);
    }

    #[test]
    fn empty_track_emits_zeroed_hfdte() {
        let meta = IgcMetadata::default();
        let track = Track::new();
        let mut buf = Vec::new();
        emit(&mut buf, "test.igc", &product("GPS", 100), &meta, &track).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("HFDTE000000\r\n"));
    }
}
