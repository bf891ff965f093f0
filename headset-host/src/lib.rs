//! # Headset Host Runtime
//!
//! Hosts the `headset-control` core in a std process. The two execution
//! contexts of the firmware map onto tokio tasks:
//!
//! ```text
//!  stdin ──► run_host_reader ──┐
//!                              ├──► run_control (HeadsetControl) ──► run_event_writer ──► stdout
//!  HostRuntime::handle_event ──┘            │
//!                                           ▼
//!                                    HostRelay ──► run_audio ──► SCO sink
//! ```
//!
//! NVRAM is a JSON file (`FileNvram`); configuration comes from
//! `HostConfig`.

pub mod config;
pub mod error;
pub mod nvram;
pub mod runtime;
pub mod services;

pub use config::HostConfig;
pub use error::{HostError, HostResult};
pub use nvram::FileNvram;
pub use runtime::{HostRelay, HostRuntime, Inbound};
pub use services::{HostServices, PairingFlags};
