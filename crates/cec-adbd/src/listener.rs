//! Standby listener.
//!
//! Receives every frame a bus driver publishes, ignores everything except
//! a standby broadcast, and runs one control session per standby broadcast.
//!
//! ```text
//! driver thread ──publish──▶ mpsc(32) ──▶ consumer task ──▶ dispatch()
//!                                                              │
//!                                         is_standby_broadcast? ──no──▶ Ignored
//!                                                              │yes
//!                                                     PowerController::power_off
//! ```
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - A control session runs in its own task; a failure or panic in it is
//!   logged and the listener keeps going
//! - Channel closure ends the consumer loop cleanly

use std::sync::Arc;
use std::thread;

use cec_core::BusEvent;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::bus::{BusDriver, BusError, BusPublisher};
use crate::control::{ControlError, PowerController};

/// Capacity of the queue between the driver thread and the consumer.
pub const EVENT_CHANNEL_CAPACITY: usize = 32;

/// Errors from handling one bus event.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// The control session reported a failure
    #[error("control session failed: {0}")]
    Control(#[from] ControlError),

    /// The control session task panicked or was aborted
    #[error("control session aborted: {0}")]
    Fault(String),
}

impl ListenerError {
    /// Short label used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Control(e) => e.kind(),
            Self::Fault(_) => "fault",
        }
    }
}

/// Outcome of dispatching one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Not a standby broadcast; nothing was done
    Ignored,
    /// The device acknowledged the power keypress
    PoweredOff { response: String },
}

/// Listener that turns standby broadcasts into power-off requests.
pub struct EventBusListener {
    controller: Arc<dyn PowerController>,
    capacity: usize,
}

impl EventBusListener {
    pub fn new(controller: Arc<dyn PowerController>) -> Self {
        Self {
            controller,
            capacity: EVENT_CHANNEL_CAPACITY,
        }
    }

    /// Overrides the event queue capacity (minimum 1).
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    /// Handles one event.
    ///
    /// Only a standby opcode addressed to the broadcast address triggers a
    /// control session. Every other frame, including a standby sent to one
    /// device, is ignored.
    ///
    /// # Errors
    ///
    /// - `ListenerError::Control` if the session failed
    /// - `ListenerError::Fault` if the session task panicked
    pub async fn dispatch(&self, event: &BusEvent) -> Result<Dispatch, ListenerError> {
        if !event.is_standby_broadcast() {
            debug!(event = %event, "Ignoring CEC frame");
            return Ok(Dispatch::Ignored);
        }

        info!(source = %event.source(), "Standby broadcast received, powering off device");

        let controller = Arc::clone(&self.controller);
        match tokio::spawn(async move { controller.power_off().await }).await {
            Ok(Ok(response)) => Ok(Dispatch::PoweredOff { response }),
            Ok(Err(e)) => Err(ListenerError::Control(e)),
            Err(e) => Err(ListenerError::Fault(e.to_string())),
        }
    }

    /// Starts `driver` on its own thread and consumes its frames until the
    /// bus closes or `cancel` fires.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `BusError::Open` if the driver thread cannot be spawned.
    pub fn register(
        self,
        driver: Box<dyn BusDriver>,
        cancel: CancellationToken,
    ) -> Result<ListenerHandle, BusError> {
        let (tx, rx) = mpsc::channel(self.capacity);
        let publisher = BusPublisher::new(tx);
        let driver_name = driver.name().to_string();

        let driver_thread = thread::Builder::new()
            .name("cec-bus".to_string())
            .spawn(move || driver.run(publisher))
            .map_err(|source| BusError::Open {
                driver: driver_name.clone(),
                source,
            })?;

        info!(driver = %driver_name, "Listening for CEC standby broadcasts");

        let consumer = tokio::spawn(self.consume(rx, cancel.clone()));

        Ok(ListenerHandle {
            driver_name,
            driver_thread,
            consumer,
            cancel,
        })
    }

    async fn consume(
        self,
        mut rx: mpsc::Receiver<BusEvent>,
        cancel: CancellationToken,
    ) -> ConsumerEnd {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Listener cancelled");
                    return ConsumerEnd::Cancelled;
                }
                event = rx.recv() => {
                    let Some(event) = event else {
                        return ConsumerEnd::BusClosed;
                    };
                    // An in-flight session is abandoned on shutdown
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            debug!("Listener cancelled during dispatch");
                            return ConsumerEnd::Cancelled;
                        }
                        _ = self.handle(&event) => {}
                    }
                }
            }
        }
    }

    async fn handle(&self, event: &BusEvent) {
        match self.dispatch(event).await {
            Ok(Dispatch::Ignored) => {}
            Ok(Dispatch::PoweredOff { response }) => {
                debug!(response = %response.trim(), "Standby broadcast handled");
            }
            Err(e) => {
                error!(error = %e, kind = e.kind(), "Failed to power off device");
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConsumerEnd {
    Cancelled,
    BusClosed,
}

/// Handle to a registered listener.
pub struct ListenerHandle {
    driver_name: String,
    driver_thread: thread::JoinHandle<Result<(), BusError>>,
    consumer: JoinHandle<ConsumerEnd>,
    cancel: CancellationToken,
}

impl ListenerHandle {
    pub fn driver_name(&self) -> &str {
        &self.driver_name
    }

    /// Asks the listener to stop; `wait` then returns `Ok(())`.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Waits until the listener stops.
    ///
    /// # Errors
    ///
    /// Returns the driver's error if the bus went away on its own, or
    /// `BusError::Closed` if the driver stopped without one. Cancellation
    /// is not an error.
    pub async fn wait(self) -> Result<(), BusError> {
        let end = self.consumer.await.map_err(|e| {
            error!(error = %e, "Listener task failed");
            BusError::ListenerClosed
        })?;

        if end == ConsumerEnd::Cancelled {
            info!(driver = %self.driver_name, "Listener stopped");
            return Ok(());
        }

        let driver_name = self.driver_name;
        let driver_thread = self.driver_thread;
        let joined = tokio::task::spawn_blocking(move || driver_thread.join()).await;

        match joined {
            Ok(Ok(Ok(()))) => Err(BusError::Closed),
            Ok(Ok(Err(e))) => Err(e),
            Ok(Err(_)) | Err(_) => Err(BusError::DriverExited {
                driver: driver_name,
                reason: "driver thread panicked".to_string(),
            }),
        }
    }
}
