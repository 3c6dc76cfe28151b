//! Driver that wraps `cec-client --monitor`.
//!
//! libCEC's `cec-client` prints every frame it sees as a traffic line:
//!
//! ```text
//! TRAFFIC: [  130873] >> 4f:36
//! ```
//!
//! Stdout lines are parsed with [`cec_core::parse_traffic_line`]; stderr is
//! forwarded to the error log on a helper thread.

use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::thread;

use cec_core::{parse_traffic_line, FrameError};
use tracing::{debug, error, info, trace, warn};

use super::{BusDriver, BusError, BusPublisher};

/// Program name looked up on `PATH` when none is configured.
pub const DEFAULT_CEC_CLIENT: &str = "cec-client";

/// Why a line pump stopped without an I/O error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PumpEnd {
    /// The source reached end of file
    Eof,
    /// The listener is gone
    ListenerClosed,
}

/// Bus driver backed by a `cec-client` child process.
#[derive(Debug, Clone)]
pub struct CecClientDriver {
    program: PathBuf,
    args: Vec<String>,
    name: String,
}

impl CecClientDriver {
    /// Runs `<program> --monitor`.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        let program = program.into();
        let name = program.display().to_string();
        Self {
            program,
            args: vec!["--monitor".to_string()],
            name,
        }
    }

    /// Replaces the argument list passed to the program.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    fn spawn(&self) -> io::Result<Child> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        #[cfg(target_os = "linux")]
        {
            use std::os::unix::process::CommandExt;

            // SAFETY: prctl is async-signal-safe and touches no Rust state.
            // The child gets SIGTERM if the monitor dies, so no orphaned
            // cec-client keeps the adapter busy.
            unsafe {
                command.pre_exec(|| {
                    if libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGTERM) == -1 {
                        return Err(io::Error::last_os_error());
                    }
                    Ok(())
                });
            }
        }

        command.spawn()
    }
}

impl BusDriver for CecClientDriver {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(self: Box<Self>, publisher: BusPublisher) -> Result<(), BusError> {
        let mut child = self.spawn().map_err(|source| BusError::Open {
            driver: self.name.clone(),
            source,
        })?;

        info!(pid = child.id(), program = %self.name, "CEC monitor process started");

        let Some(stdout) = child.stdout.take() else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(BusError::Open {
                driver: self.name.clone(),
                source: io::Error::new(io::ErrorKind::Other, "stdout was not captured"),
            });
        };

        if let Some(stderr) = child.stderr.take() {
            let spawned = thread::Builder::new()
                .name("cec-client-stderr".to_string())
                .spawn(move || forward_stderr(BufReader::new(stderr)));
            if let Err(e) = spawned {
                warn!(error = %e, "Failed to start stderr forwarder");
            }
        }

        let outcome = pump_lines(BufReader::new(stdout), &publisher);

        // Stop the child whatever ended the pump
        let _ = child.kill();
        let status = child.wait();

        match outcome {
            Ok(PumpEnd::ListenerClosed) => {
                debug!(program = %self.name, "Listener closed, CEC monitor stopped");
                Ok(())
            }
            Ok(PumpEnd::Eof) => {
                let reason = match status {
                    Ok(status) => format!("output ended ({status})"),
                    Err(e) => format!("output ended, wait failed: {e}"),
                };
                Err(BusError::DriverExited {
                    driver: self.name.clone(),
                    reason,
                })
            }
            Err(e) => Err(BusError::Read(e)),
        }
    }
}

/// Feeds every traffic line from `reader` to the publisher.
///
/// Lines that are not traffic lines are skipped. Malformed traffic lines
/// are logged and skipped.
pub(crate) fn pump_lines<R: BufRead>(
    mut reader: R,
    publisher: &BusPublisher,
) -> io::Result<PumpEnd> {
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            return Ok(PumpEnd::Eof);
        }

        let line = String::from_utf8_lossy(&buf);
        let line = line.trim_end();
        trace!(line = %line, "cec-client");

        match parse_traffic_line(line) {
            Ok(Some(event)) => {
                debug!(event = %event, "CEC frame");
                if publisher.publish(event).is_err() {
                    return Ok(PumpEnd::ListenerClosed);
                }
            }
            Ok(None) => {}
            Err(e @ FrameError::Poll { .. }) => {
                trace!(error = %e, "Skipping polling frame");
            }
            Err(e) => {
                warn!(line = %line, error = %e, "Ignoring malformed CEC traffic line");
            }
        }
    }
}

fn forward_stderr<R: BufRead>(reader: R) {
    for line in reader.lines().map_while(Result::ok) {
        if !line.trim().is_empty() {
            error!(line = %line, "cec-client stderr");
        }
    }
}
