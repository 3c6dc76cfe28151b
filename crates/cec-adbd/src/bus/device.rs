//! Driver that reads raw frames from a Linux CEC character device.
//!
//! The adapter is put into passive monitor mode: the monitor never claims a
//! logical address and never transmits.

use std::io;
use std::path::PathBuf;

use cec_core::{BusEvent, FrameError};
use cec_linux::{CecDevice, CecModeFollower, CecModeInitiator, PollFlags};
use tracing::{debug, info, trace, warn};

use super::{BusDriver, BusError, BusPublisher};

/// How long one poll waits before re-checking the listener, in milliseconds.
const POLL_INTERVAL_MS: i32 = 1000;

/// Bus driver backed by `/dev/cecN`.
#[derive(Debug, Clone)]
pub struct CecDeviceDriver {
    path: PathBuf,
    name: String,
}

impl CecDeviceDriver {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path.display().to_string();
        Self { path, name }
    }

    fn open(&self) -> io::Result<CecDevice> {
        let device = CecDevice::open(&self.path)?;
        device.set_mode(CecModeInitiator::None, CecModeFollower::Monitor)?;
        Ok(device)
    }
}

impl BusDriver for CecDeviceDriver {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(self: Box<Self>, publisher: BusPublisher) -> Result<(), BusError> {
        let device = self.open().map_err(|source| BusError::Open {
            driver: self.name.clone(),
            source,
        })?;

        info!(device = %self.name, "CEC device opened in monitor mode");

        while !publisher.is_closed() {
            let flags = device.poll(PollFlags::POLLIN | PollFlags::POLLRDNORM, POLL_INTERVAL_MS)?;
            if !flags.intersects(PollFlags::POLLIN | PollFlags::POLLRDNORM) {
                continue;
            }

            let msg = device.rec()?;
            if !msg.is_ok() {
                trace!(msg = ?msg, "Skipping failed CEC transfer");
                continue;
            }

            let len = usize::try_from(msg.len).unwrap_or(usize::MAX);
            let Some(frame) = msg.msg.get(..len) else {
                warn!(len, "CEC device reported an impossible frame length");
                continue;
            };

            match BusEvent::from_frame(frame) {
                Ok(event) => {
                    debug!(event = %event, "CEC frame");
                    if publisher.publish(event).is_err() {
                        break;
                    }
                }
                Err(e @ FrameError::Poll { .. }) => {
                    trace!(error = %e, "Skipping polling frame");
                }
                Err(e) => {
                    warn!(frame = ?frame, error = %e, "Ignoring malformed CEC frame");
                }
            }
        }

        debug!(device = %self.name, "Listener closed, CEC device released");
        Ok(())
    }
}
