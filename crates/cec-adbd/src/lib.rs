//! CEC-ADB Daemon - Standby monitor for HDMI-CEC buses
//!
//! This crate provides the moving parts of the monitor:
//! - `config` - Validated, immutable monitor configuration
//! - `credential` - Per-session loading of the ADB key pair
//! - `control` - ADB control client that sends the power keypress
//! - `bus` - Bus drivers that publish decoded CEC frames
//! - `listener` - Standby filter and dispatch to the control client
//! - `guard` - Single-instance lock
//! - `heartbeat` - Periodic liveness logging
//! - `logging` - Stderr and optional disk log setup
//! - `tvservice` - Raspberry Pi HDMI output switch
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐  BusEvent   ┌──────────────────┐  power_off  ┌──────────────────┐
//! │    BusDriver    │────────────▶│ EventBusListener │────────────▶│ AdbControlClient │
//! │ (driver thread) │ bounded mpsc│ (consumer task)  │             │  (one session)   │
//! └─────────────────┘             └──────────────────┘             └──────────────────┘
//!                                                                          │ TCP
//!                                                                          ▼
//!                                                                   ADB device :5555
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All production code in this crate follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations return `Result` or `Option`
//! - Channel operations handle closure gracefully

pub mod bus;
pub mod config;
pub mod control;
pub mod credential;
pub mod guard;
pub mod heartbeat;
pub mod listener;
pub mod logging;
pub mod tvservice;
