extern crate libc;

use std::ffi::{CStr, CString};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use time::UtcOffset;
use tracing::{error, info};

use crate::config::LoggerConfig;
use crate::discovery::{NoSelection, PortFinder};
use crate::error::Result;
use crate::logger::{DataLogger, SerialConnector, SessionReport};

/// A logging session running on its own thread on behalf of a C caller.
/// Must be released with gantry_session_stop.
pub struct GantrySession {
    stop: Arc<AtomicBool>,
    worker: thread::JoinHandle<Result<Option<SessionReport>>>,
}

fn string_from_c(raw: *const libc::c_char) -> Option<String> {
    if raw.is_null() {
        return None;
    }
    let cstr = unsafe { CStr::from_ptr(raw) };
    Some(String::from_utf8_lossy(cstr.to_bytes()).to_string())
}

/// Returns the path of the first recognised board, or NULL. Never prompts.
/// Non-rust callers must release the result with gantry_string_free.
#[export_name = "gantry_find_port"]
pub extern "C" fn find_port() -> *mut libc::c_char {
    PortFinder::default()
        .discover(&mut NoSelection)
        .and_then(|device| CString::new(device).ok())
        .map_or(std::ptr::null_mut(), CString::into_raw)
}

#[export_name = "gantry_string_free"]
pub extern "C" fn string_free(raw: *mut libc::c_char) {
    if raw.is_null() {
        return;
    }
    unsafe {
        drop(CString::from_raw(raw));
    }
}

impl GantrySession {
    /// Starts logging `port` (or the first recognised board if `port` is
    /// NULL) into `output_dir` (or the working directory if NULL).
    /// Returns NULL if no port could be found.
    #[export_name = "gantry_session_start"]
    pub extern "C" fn start(
        port: *const libc::c_char,
        baud_rate: u32,
        output_dir: *const libc::c_char,
    ) -> *mut GantrySession {
        let Some(device) =
            string_from_c(port).or_else(|| PortFinder::default().discover(&mut NoSelection))
        else {
            return std::ptr::null_mut();
        };

        let mut config = LoggerConfig::default()
            .with_port(&device)
            .with_baud_rate(baud_rate)
            // The host process is almost certainly multi-threaded, in which
            // case the local offset can't be determined and we log in UTC.
            .with_utc_offset(UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC));
        if let Some(output_dir) = string_from_c(output_dir) {
            config = config.with_output_dir(output_dir);
        }

        let logger = DataLogger::new(config);
        let stop = logger.stop_handle();
        let worker = thread::spawn(move || {
            logger.run(|| None, &mut SerialConnector, &mut std::io::sink())
        });
        Box::into_raw(Box::new(GantrySession { stop, worker }))
    }

    /// Stops the session, waits for the file to be closed, and frees the
    /// session. Returns the number of lines logged, or -1 on failure
    /// (including a port that could not be opened).
    #[export_name = "gantry_session_stop"]
    pub extern "C" fn stop(&mut self) -> i64 {
        let session = unsafe { Box::from_raw(self) };
        session.stop.store(true, Ordering::SeqCst);
        match session.worker.join() {
            Ok(Ok(Some(report))) if !report.file_created => {
                error!("Session never started logging: {:?}", report.stop_reason);
                -1
            }
            Ok(Ok(Some(report))) => {
                info!(
                    "Session saved to {} ({} lines)",
                    report.output_path.display(),
                    report.lines_logged
                );
                report.lines_logged as i64
            }
            Ok(Ok(None)) => -1,
            Ok(Err(e)) => {
                error!("Session failed: {e}");
                -1
            }
            Err(_) => {
                error!("Session thread panicked");
                -1
            }
        }
    }
}
