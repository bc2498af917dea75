use std::io::{BufRead, BufReader, Read, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use time::OffsetDateTime;
use tracing::{debug, error, info};

use crate::config::LoggerConfig;
use crate::error::Result;
use crate::session::{session_file_name, SessionFile};

const SETTLE_POLL: Duration = Duration::from_millis(50);

/// Opens the connection a session reads from. The returned handle is owned
/// by the session and dropped (closing the port) when the session ends.
pub trait Connector {
    type Port: Read;

    fn connect(&mut self, device: &str, config: &LoggerConfig) -> serialport::Result<Self::Port>;
}

/// Connects to real serial ports, 8N1 without flow control.
pub struct SerialConnector;

impl Connector for SerialConnector {
    type Port = Box<dyn serialport::SerialPort>;

    fn connect(&mut self, device: &str, config: &LoggerConfig) -> serialport::Result<Self::Port> {
        serialport::new(device, config.baud_rate)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .flow_control(serialport::FlowControl::None)
            // Reads block for at most this long, which is also how often the
            // stop flag gets checked while the device is quiet.
            .timeout(config.read_timeout)
            .open()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// The stop flag was raised (Ctrl+C, or an FFI caller).
    Interrupted,
    /// The device side closed the stream.
    EndOfStream,
    SerialFault(String),
}

#[derive(Debug)]
pub struct SessionReport {
    pub output_path: PathBuf,
    /// False if the session ended (connect failure or stop) before the file
    /// was created.
    pub file_created: bool,
    pub lines_logged: usize,
    pub stop_reason: StopReason,
}

/// Decodes one raw line and strips surrounding whitespace (including the
/// CR of CRLF line endings). Returns None for lines that are blank.
pub fn normalize_line(raw: &[u8]) -> Option<String> {
    let line = String::from_utf8_lossy(raw);
    let line = line.trim();
    if line.is_empty() {
        None
    } else {
        Some(line.to_string())
    }
}

pub struct DataLogger {
    config: LoggerConfig,
    stop: Arc<AtomicBool>,
}

impl DataLogger {
    pub fn new(config: LoggerConfig) -> DataLogger {
        DataLogger {
            config,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Setting the returned flag ends the session after the current read.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Output path for a session starting now.
    pub fn output_path(&self) -> Result<PathBuf> {
        let now = OffsetDateTime::now_utc().to_offset(self.config.utc_offset);
        Ok(self.config.output_dir.join(session_file_name(now)?))
    }

    /// Sleeps for the settle period, returning early if a stop is requested.
    fn settle(&self) {
        let deadline = Instant::now() + self.config.settle;
        while !self.stop_requested() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return;
            }
            std::thread::sleep(remaining.min(SETTLE_POLL));
        }
    }

    /// Runs a complete session: resolve the port (via `discover` unless one
    /// is configured), connect, settle, then log until interrupted or the
    /// connection fails.
    ///
    /// Returns Ok(None) if no port could be determined; no file is created
    /// in that case. A stop requested before the settle period is over also
    /// ends the session without creating the file. Serial faults are not
    /// errors, they end the session and are described by the report's
    /// stop_reason. Only failures to write the output file (or echo) are
    /// returned as errors.
    pub fn run<C: Connector>(
        &self,
        discover: impl FnOnce() -> Option<String>,
        connector: &mut C,
        echo: &mut impl Write,
    ) -> Result<Option<SessionReport>> {
        let Some(device) = self.config.port.clone().or_else(discover) else {
            return Ok(None);
        };

        let output_path = self.output_path()?;
        let without_file = |stop_reason| SessionReport {
            output_path: output_path.clone(),
            file_created: false,
            lines_logged: 0,
            stop_reason,
        };

        if self.stop_requested() {
            info!("Data collection stopped before connecting");
            return Ok(Some(without_file(StopReason::Interrupted)));
        }

        let port = match connector.connect(&device, &self.config) {
            Ok(port) => port,
            Err(e) => {
                error!("Serial error: {e}");
                return Ok(Some(without_file(StopReason::SerialFault(e.to_string()))));
            }
        };
        info!("Connected to {device}");
        self.settle();
        if self.stop_requested() {
            info!("Data collection stopped");
            return Ok(Some(without_file(StopReason::Interrupted)));
        }

        let mut file = SessionFile::create(&output_path)?;
        info!("Collecting data... (Press Ctrl+C to stop)");

        // `port` moves into record() and is closed when it returns, on every
        // path out of the loop.
        let stop_reason = self.record(port, &mut file, echo)?;
        match &stop_reason {
            StopReason::Interrupted => info!("Data collection stopped"),
            StopReason::EndOfStream => info!("Device closed the connection"),
            StopReason::SerialFault(message) => error!("Serial error: {message}"),
        }

        Ok(Some(SessionReport {
            output_path,
            file_created: true,
            lines_logged: file.lines_written(),
            stop_reason,
        }))
    }

    /// Copies lines from `source` into `file`, echoing each one, until the
    /// stop flag is raised or `source` fails or ends.
    ///
    /// A read timeout is the idle state: any partial line read so far is
    /// kept, and the stop flag is checked again before the next read. A
    /// partial line still pending when the session ends is logged as is.
    pub fn record<R: Read>(
        &self,
        source: R,
        file: &mut SessionFile,
        echo: &mut impl Write,
    ) -> Result<StopReason> {
        let mut reader = BufReader::new(source);
        let mut pending = Vec::new();
        let stop_reason = loop {
            if self.stop_requested() {
                break StopReason::Interrupted;
            }

            match reader.read_until(b'\n', &mut pending) {
                Ok(0) => break StopReason::EndOfStream,
                Ok(_) => {
                    log_line(&pending, file, echo)?;
                    pending.clear();
                }
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {
                    debug!("idle, {} bytes pending", pending.len());
                }
                Err(e) => break StopReason::SerialFault(e.to_string()),
            }
        };

        log_line(&pending, file, echo)?;
        Ok(stop_reason)
    }
}

fn log_line(raw: &[u8], file: &mut SessionFile, echo: &mut impl Write) -> Result<()> {
    if let Some(line) = normalize_line(raw) {
        file.append_line(&line)?;
        writeln!(echo, "{line}")?;
    }
    Ok(())
}
