//! # Headset Control Core
//!
//! Control-plane glue of a Bluetooth audio headset:
//!
//! - **Management Event Dispatcher**: stack notifications in, security
//!   verdicts out, with identity key persistence as a side effect
//! - **Identity Key Store**: cached local identity key mirrored to NVRAM
//! - **Mic Audio Relay Buffer**: locked ring between the host link and the
//!   SCO uplink, drop-on-full and zero-pad-on-underrun
//! - **Command Router**: host opcodes to mic data, button emulation and
//!   stack bring-up
//!
//! ## Architecture
//!
//! ```text
//!  host UART ──► read_frame ──► route_command ──┬──► MicRelayBuffer ◄── drain (SCO path)
//!                                              ├──► ButtonEmulator
//!                                              └──► StackBringup + IdentityKeyStore::restore
//!
//!  stack ──► handle_event ──┬──► Verdict
//!                           ├──► IdentityKeyStore::update
//!                           └──► MicRelayBuffer::reset (SCO down)
//! ```
//!
//! ## Execution Contexts
//!
//! Stack events and host commands are delivered on one run-to-completion
//! context and go through `HeadsetControl`. The audio context only ever
//! touches the `MicRelayBuffer`, which is the single structure shared
//! between the two.

#![cfg_attr(not(feature = "std"), no_std)]

#[macro_use]
mod fmt;

pub mod buffer;
pub mod control;
pub mod dispatcher;
pub mod event;
pub mod key_store;
pub mod protocol;
pub mod router;
pub mod traits;

// Re-export main types for convenience
pub use buffer::{MicRelayBuffer, RelayStats, MIC_BUFFER_LEN};
pub use control::HeadsetControl;
pub use event::{BdAddr, ManagementEvent, ScoEvent, Verdict};
pub use key_store::{IdentityKeyStore, LocalIdentityKey, PersistResult, LOCAL_KEY_LEN};
pub use protocol::{ButtonEvent, Command, Frame, FrameError, HostEvent, Opcode};
pub use traits::{BringupError, KeyValueStore, StackServices, StorageError};

/// Library version reported to the host
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
