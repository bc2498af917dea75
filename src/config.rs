use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use time::UtcOffset;

use crate::discovery::PortFinder;

pub const DEFAULT_BAUD_RATE: u32 = 9600;
/// Most Arduinos reset when the port is opened, and print nothing useful
/// until the bootloader has handed over.
pub const DEFAULT_SETTLE: Duration = Duration::from_secs(2);
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Clone, Debug)]
pub struct LoggerConfig {
    /// Port to open. None means the port is discovered at run time.
    pub port: Option<String>,
    pub baud_rate: u32,
    pub settle: Duration,
    /// Bounds how long an interrupt can go unnoticed while the device is
    /// silent.
    pub read_timeout: Duration,
    pub output_dir: PathBuf,
    /// Offset used for the timestamp in the output file name.
    pub utc_offset: UtcOffset,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        LoggerConfig {
            port: None,
            baud_rate: DEFAULT_BAUD_RATE,
            settle: DEFAULT_SETTLE,
            read_timeout: DEFAULT_READ_TIMEOUT,
            output_dir: PathBuf::from("."),
            utc_offset: UtcOffset::UTC,
        }
    }
}

impl LoggerConfig {
    pub fn with_port(mut self, port: &str) -> Self {
        self.port = Some(port.to_string());
        self
    }

    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = output_dir.into();
        self
    }

    pub fn with_utc_offset(mut self, utc_offset: UtcOffset) -> Self {
        self.utc_offset = utc_offset;
        self
    }
}

/// Log every line an Arduino prints to a timestamped file.
///
/// Without any flags the port is auto-detected (or picked interactively),
/// opened at 9600 baud, and logged to ./gantry_scan_<timestamp>.json.
#[derive(Parser, Debug)]
#[command(version, about)]
pub struct Cli {
    /// Serial port to open instead of auto-detecting one.
    #[arg(short, long)]
    pub port: Option<String>,

    #[arg(short, long, default_value_t = DEFAULT_BAUD_RATE)]
    pub baud: u32,

    /// Directory the session file is created in.
    #[arg(short, long, default_value = ".")]
    pub output_dir: PathBuf,

    /// Delay after opening the port before reading, in milliseconds.
    #[arg(long, default_value_t = DEFAULT_SETTLE.as_millis() as u64)]
    pub settle_ms: u64,

    /// Extra substring identifying the board during auto-detection.
    /// May be repeated.
    #[arg(short, long = "identifier")]
    pub identifiers: Vec<String>,

    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    pub fn logger_config(&self) -> LoggerConfig {
        let config = LoggerConfig::default()
            .with_baud_rate(self.baud)
            .with_settle(Duration::from_millis(self.settle_ms))
            .with_output_dir(&self.output_dir);
        match &self.port {
            Some(port) => config.with_port(port),
            None => config,
        }
    }

    pub fn port_finder(&self) -> PortFinder {
        self.identifiers
            .iter()
            .fold(PortFinder::default(), |finder, identifier| {
                finder.with_identifier(identifier)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_original_behaviour() {
        let cli = Cli::try_parse_from(["gantry-logger"]).unwrap();
        let config = cli.logger_config();
        assert_eq!(config.port, None);
        assert_eq!(config.baud_rate, 9600);
        assert_eq!(config.settle, Duration::from_secs(2));
        assert_eq!(config.read_timeout, Duration::from_secs(1));
        assert_eq!(config.output_dir, PathBuf::from("."));
        assert_eq!(
            cli.port_finder().identifiers(),
            PortFinder::default().identifiers()
        );
    }

    #[test]
    fn test_flags() {
        let cli = Cli::try_parse_from([
            "gantry-logger",
            "--port",
            "/dev/ttyACM0",
            "--baud",
            "115200",
            "--output-dir",
            "/tmp/scans",
            "--settle-ms",
            "0",
            "-i",
            "1a86:",
            "--identifier",
            "ESP32",
        ])
        .unwrap();
        let config = cli.logger_config();
        assert_eq!(config.port.as_deref(), Some("/dev/ttyACM0"));
        assert_eq!(config.baud_rate, 115200);
        assert_eq!(config.settle, Duration::ZERO);
        assert_eq!(config.output_dir, PathBuf::from("/tmp/scans"));

        let finder = cli.port_finder();
        let identifiers = finder.identifiers();
        assert_eq!(&identifiers[identifiers.len() - 2..], ["1a86:", "ESP32"]);
    }

    #[test]
    fn test_invalid_baud_rejected() {
        assert!(Cli::try_parse_from(["gantry-logger", "--baud", "fast"]).is_err());
    }
}
