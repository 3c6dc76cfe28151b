//! CEC bus drivers.
//!
//! A driver owns the connection to the HDMI-CEC adapter and runs on its own
//! OS thread. Every frame it decodes is handed to the listener through a
//! [`BusPublisher`]. Drivers never make decisions about frames; filtering
//! lives in the listener.
//!
//! Two drivers exist:
//! - [`CecClientDriver`] wraps `cec-client --monitor` and parses its
//!   traffic log (always available)
//! - `CecDeviceDriver` reads raw frames from `/dev/cecN` in monitor mode
//!   (behind the `cec-device` feature)

mod cec_client;
#[cfg(feature = "cec-device")]
mod device;

pub use cec_client::{CecClientDriver, DEFAULT_CEC_CLIENT};
#[cfg(feature = "cec-device")]
pub use device::CecDeviceDriver;

use std::io;

use cec_core::BusEvent;
use thiserror::Error;
use tokio::sync::mpsc;

/// Device node read by the device driver when none is configured.
pub const DEFAULT_CEC_DEVICE: &str = "/dev/cec0";

/// Errors from bus drivers and the listener registration.
#[derive(Debug, Error)]
pub enum BusError {
    /// The adapter could not be opened or configured
    #[error("failed to open CEC bus via {driver}: {source}")]
    Open {
        driver: String,
        #[source]
        source: io::Error,
    },

    /// Reading from an open adapter failed
    #[error("CEC bus read failed: {0}")]
    Read(#[from] io::Error),

    /// The driver's event source ended on its own
    #[error("CEC bus driver {driver} exited: {reason}")]
    DriverExited { driver: String, reason: String },

    /// The listener side of the channel is gone
    #[error("event listener closed")]
    ListenerClosed,

    /// The bus stopped without reporting an error
    #[error("CEC bus closed")]
    Closed,
}

/// Sending half handed to a driver.
///
/// `publish` blocks the driver thread while the listener's queue is full,
/// so frames are never dropped silently.
#[derive(Debug, Clone)]
pub struct BusPublisher {
    tx: mpsc::Sender<BusEvent>,
}

impl BusPublisher {
    pub fn new(tx: mpsc::Sender<BusEvent>) -> Self {
        Self { tx }
    }

    /// Hands one decoded frame to the listener.
    ///
    /// Must be called from a non-async thread.
    ///
    /// # Errors
    ///
    /// Returns `BusError::ListenerClosed` once the listener has gone away;
    /// drivers should stop when they see it.
    pub fn publish(&self, event: BusEvent) -> Result<(), BusError> {
        self.tx
            .blocking_send(event)
            .map_err(|_| BusError::ListenerClosed)
    }

    /// True once the listener has dropped its receiver.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// A source of CEC frames.
///
/// `run` blocks the calling thread until the source ends or the listener
/// closes. Returning `Ok(())` means the driver stopped because nobody is
/// listening any more.
pub trait BusDriver: Send + 'static {
    /// Short name used in logs and thread names.
    fn name(&self) -> &str;

    /// Runs the driver until its source ends or the publisher closes.
    fn run(self: Box<Self>, publisher: BusPublisher) -> Result<(), BusError>;
}
