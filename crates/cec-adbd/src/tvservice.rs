//! Raspberry Pi HDMI output control.
//!
//! On a Pi the monitor can switch its own HDMI output off at startup with
//! `tvservice --off`, so the Pi itself does not show up as an active source.

use std::io;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use thiserror::Error;
use tracing::{debug, info};

/// Program used when none is configured.
pub const DEFAULT_TVSERVICE: &str = "tvservice";

#[derive(Debug, Error)]
pub enum TvServiceError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("{program} --off exited with {status}: {output}")]
    Failed {
        program: String,
        status: String,
        output: String,
    },
}

/// Wrapper around the `tvservice` command.
#[derive(Debug, Clone)]
pub struct TvService {
    program: PathBuf,
}

impl TvService {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Runs `<program> --off` and waits for it.
    ///
    /// This performs blocking I/O and should be called before the runtime
    /// starts or via `spawn_blocking`.
    ///
    /// # Errors
    ///
    /// - `TvServiceError::Spawn` if the program cannot be started
    /// - `TvServiceError::Failed` if it exits non-zero
    pub fn power_off(&self) -> Result<String, TvServiceError> {
        let program = self.program.display().to_string();
        debug!(program = %program, "Turning off HDMI output");

        let output = Command::new(&self.program)
            .arg("--off")
            .stdin(Stdio::null())
            .output()
            .map_err(|source| TvServiceError::Spawn {
                program: program.clone(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(TvServiceError::Failed {
                program,
                status: output.status.to_string(),
                output: if stderr.is_empty() { stdout } else { stderr },
            });
        }

        info!(program = %program, output = %stdout, "HDMI output turned off");
        Ok(stdout)
    }
}

impl Default for TvService {
    fn default() -> Self {
        Self::new(DEFAULT_TVSERVICE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success() {
        assert!(TvService::new("true").power_off().is_ok());
    }

    #[test]
    fn test_non_zero_exit_is_error() {
        let err = TvService::new("false").power_off().unwrap_err();
        assert!(matches!(err, TvServiceError::Failed { .. }));
    }

    #[test]
    fn test_missing_program() {
        let err = TvService::new("/nonexistent/tvservice").power_off().unwrap_err();
        assert!(matches!(err, TvServiceError::Spawn { .. }));
    }
}
