//! CLI entry point (ambient stack): a hand-rolled argument scanner (no
//! `clap` - the teacher carries none either, and the spec scopes a fancy
//! argument parser out) that builds a [`Config`], opens the serial device,
//! and dispatches to the orchestrator.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::process::ExitCode;

use nix::fcntl::OFlag;
use nix::sys::stat::Mode;

use garmini::config::{Config, Operation};
use garmini::error::GarminError;
use garmini::link::LinkSession;
use garmini::orchestrator;
use garmini::transport::SerialTransport;

const PROGRAM_NAME: &str = "garmini";

fn usage() -> String {
    format!(
        "usage: {PROGRAM_NAME} [id|do|download|ig|igc] [options]\n\n\
         Downloads the track log from a Garmin GPS receiver and renders it as IGC.\n\n\
         Commands:\n\
         \x20\x20id                  print product id/version/description and exit\n\
         \x20\x20do, download        download track, split into flights (default)\n\
         \x20\x20ig, igc             download track, emit as a single IGC stream\n\n\
         Options:\n\
         \x20\x20-d, --device PATH              serial device (env GARMINI_DEVICE, default /dev/ttyS0)\n\
         \x20\x20-D, --directory DIR            output directory for `download`\n\
         \x20\x20-l, --log PATH                 packet trace log (`-` for stdout)\n\
         \x20\x20-o, --power-off                power off the device after the operation\n\
         \x20\x20-m, --manufacturer STR         IGC manufacturer code (default XXX)\n\
         \x20\x20-s, --serial-number N          IGC serial number (default 0)\n\
         \x20\x20-p, --pilot NAME               IGC pilot name\n\
         \x20\x20-t, --glider-type TYPE         IGC glider type\n\
         \x20\x20-g, --glider-id ID             IGC glider id\n\
         \x20\x20-c, --competition-class CLASS  IGC competition class\n\
         \x20\x20-i, --competition-id ID        IGC competition id\n\
         \x20\x20-b, --barometric-altimeter 0|1 override altimeter probe\n\
         \x20\x20-q, --quiet                    suppress the progress bar\n\
         \x20\x20-h, --help                     print this message"
    )
}

#[derive(Debug)]
struct ArgError(String);

impl std::fmt::Display for ArgError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Scans `std::env::args()` into a [`Config`], producing `getopt`-style
/// diagnostics on malformed input.
fn parse_args(args: Vec<String>) -> Result<Config, ArgError> {
    let mut config = Config::default();
    if let Ok(device) = std::env::var("GARMINI_DEVICE") {
        config.device = device;
    }

    let mut iter = args.into_iter().peekable();

    if let Some(first) = iter.peek() {
        match first.as_str() {
            "id" => {
                config.operation = Operation::Id;
                iter.next();
            }
            "do" | "download" => {
                config.operation = Operation::Download;
                iter.next();
            }
            "ig" | "igc" => {
                config.operation = Operation::Igc;
                iter.next();
            }
            _ => {}
        }
    }

    let mut take_value = |iter: &mut std::iter::Peekable<std::vec::IntoIter<String>>,
                           flag: &str|
     -> Result<String, ArgError> {
        iter.next()
            .ok_or_else(|| ArgError(format!("option '{flag}' requires an argument")))
    };

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-d" | "--device" => config.device = take_value(&mut iter, &arg)?,
            "-D" | "--directory" => config.output_directory = Some(take_value(&mut iter, &arg)?),
            "-l" | "--log" => config.log_path = Some(take_value(&mut iter, &arg)?),
            "-o" | "--power-off" => config.power_off = true,
            "-m" | "--manufacturer" => config.igc.manufacturer = take_value(&mut iter, &arg)?,
            "-s" | "--serial-number" => {
                let v = take_value(&mut iter, &arg)?;
                config.igc.serial_number = v
                    .parse()
                    .map_err(|_| ArgError(format!("invalid serial number '{v}'")))?;
            }
            "-p" | "--pilot" => config.igc.pilot = Some(take_value(&mut iter, &arg)?),
            "-t" | "--glider-type" => config.igc.glider_type = Some(take_value(&mut iter, &arg)?),
            "-g" | "--glider-id" => config.igc.glider_id = Some(take_value(&mut iter, &arg)?),
            "-c" | "--competition-class" => {
                config.igc.competition_class = Some(take_value(&mut iter, &arg)?)
            }
            "-i" | "--competition-id" => {
                config.igc.competition_id = Some(take_value(&mut iter, &arg)?)
            }
            "-b" | "--barometric-altimeter" => {
                let v = take_value(&mut iter, &arg)?;
                config.barometric_altimeter = Some(match v.as_str() {
                    "0" => false,
                    "1" => true,
                    _ => return Err(ArgError(format!("invalid value '{v}' for '{arg}'"))),
                });
            }
            "-q" | "--quiet" => config.quiet = true,
            "-h" | "--help" => {
                println!("{}", usage());
                std::process::exit(0);
            }
            other => return Err(ArgError(format!("invalid option '{other}'"))),
        }
    }

    Ok(config)
}

fn open_device(path: &str) -> Result<SerialTransport, GarminError> {
    let fd = nix::fcntl::open(path, OFlag::O_RDWR | OFlag::O_NOCTTY, Mode::empty())
        .map_err(|errno| GarminError::message(format!("{path}: open: {}", io::Error::from(errno))))?;

    SerialTransport::new(fd, path).map_err(GarminError::from)
}

fn open_trace_sink(path: &str) -> Result<Box<dyn Write>, GarminError> {
    if path == "-" {
        Ok(Box::new(io::stdout()))
    } else {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)
            .map_err(|source| GarminError::message(format!("{path}: {source}")))?;
        Ok(Box::new(file))
    }
}

fn run(config: Config) -> Result<(), GarminError> {
    let transport = open_device(&config.device)?;
    let mut session = LinkSession::handshake(transport, config.device.clone())?;

    if let Some(log_path) = &config.log_path {
        session.set_trace_sink(open_trace_sink(log_path)?);
    }

    match config.operation {
        Operation::Id => {
            orchestrator::run_id(&session, &mut io::stdout())
                .map_err(|source| GarminError::message(format!("{}: {source}", config.device)))?;
        }
        Operation::Igc => {
            orchestrator::run_igc(&mut session, &config, &mut io::stdout())?;
        }
        Operation::Download => {
            let written = orchestrator::run_download(&mut session, &config)?;
            if !config.quiet {
                for path in &written {
                    println!("wrote {path}");
                }
            }
        }
    }

    if config.power_off {
        orchestrator::send_power_off(&mut session)?;
    }

    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let config = match parse_args(args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{PROGRAM_NAME}: {e}");
            eprintln!("{}", usage());
            return ExitCode::FAILURE;
        }
    };

    match run(config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{PROGRAM_NAME}: {e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_args_defaults_to_download() {
        let config = parse_args(vec![]).unwrap();
        assert_eq!(config.operation, Operation::Download);
        assert_eq!(config.device, "/dev/ttyS0");
    }

    #[test]
    fn parse_args_recognizes_commands_and_options() {
        let config = parse_args(vec![
            "igc".to_string(),
            "-d".to_string(),
            "/dev/ttyUSB0".to_string(),
            "--serial-number".to_string(),
            "42".to_string(),
            "-b".to_string(),
            "1".to_string(),
        ])
        .unwrap();
        assert_eq!(config.operation, Operation::Igc);
        assert_eq!(config.device, "/dev/ttyUSB0");
        assert_eq!(config.igc.serial_number, 42);
        assert_eq!(config.barometric_altimeter, Some(true));
    }

    #[test]
    fn parse_args_rejects_unknown_option() {
        let err = parse_args(vec!["--nope".to_string()]).unwrap_err();
        assert!(err.0.contains("invalid option"));
    }

    #[test]
    fn parse_args_rejects_missing_value() {
        let err = parse_args(vec!["-d".to_string()]).unwrap_err();
        assert!(err.0.contains("requires an argument"));
    }
}
