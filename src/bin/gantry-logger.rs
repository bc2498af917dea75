use std::process::ExitCode;
use std::sync::atomic::Ordering;

use clap::Parser;
use time::UtcOffset;
use tracing::{error, info, warn};

use gantry_logger::{Cli, ConsoleSelector, DataLogger, SerialConnector, StopReason};

fn main() -> ExitCode {
    let cli = Cli::parse();
    gantry_logger::logging::init(cli.verbose);
    info!("Gantry scan logger (v{})", env!("CARGO_PKG_VERSION"));

    // Must happen before ctrlc starts its thread: the local offset can only
    // be determined while the process is single-threaded.
    let utc_offset = UtcOffset::current_local_offset().unwrap_or_else(|_| {
        warn!("Unable to determine local time offset, naming the session file in UTC");
        UtcOffset::UTC
    });

    let logger = DataLogger::new(cli.logger_config().with_utc_offset(utc_offset));
    let finder = cli.port_finder();

    let stop = logger.stop_handle();
    if let Err(e) = ctrlc::set_handler(move || {
        stop.store(true, Ordering::SeqCst);
    }) {
        error!("Failed to install Ctrl+C handler: {e}");
        return ExitCode::FAILURE;
    }

    let result = logger.run(
        || finder.discover(&mut ConsoleSelector::stdio()),
        &mut SerialConnector,
        &mut std::io::stdout(),
    );
    match result {
        Ok(Some(report)) => {
            info!("Arduino data saved to: {}", report.output_path.display());
            match report.stop_reason {
                StopReason::SerialFault(_) => ExitCode::FAILURE,
                StopReason::Interrupted | StopReason::EndOfStream => ExitCode::SUCCESS,
            }
        }
        Ok(None) => {
            error!("No serial port selected, nothing was logged");
            ExitCode::FAILURE
        }
        Err(e) => {
            error!("Logging failed: {e}");
            ExitCode::FAILURE
        }
    }
}
