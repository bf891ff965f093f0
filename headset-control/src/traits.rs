//! # Collaborator Traits
//!
//! Everything this crate does not own (the protocol stack, NVRAM driver,
//! hands-free SCO handler, button manager, host link) is reached through
//! the traits below. Each trait covers one concern so tests and ports only
//! implement what they exercise; `StackServices` bundles the ones the
//! dispatcher and router need.
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                        HeadsetControl                          │
//! │                                                                │
//! │  KeyValueStore ◄── IdentityKeyStore                            │
//! │                                                                │
//! │  StackServices ─┬─ SecurityPolicy     (pairing flags)          │
//! │                 ├─ LinkKeyStore       (bonded peer keys)       │
//! │                 ├─ ConnectionEvents   (encryption, sniff, LE)  │
//! │                 ├─ ScoHandler         (hands-free SCO)         │
//! │                 ├─ ButtonEmulator     (host button presses)    │
//! │                 ├─ StackBringup       (stack/audio bring-up)   │
//! │                 └─ HostLink           (events to the host)     │
//! └───────────────────────────────────────────────────────────────┘
//! ```

use core::fmt;

use crate::event::{
    BdAddr, ConnParamRequest, EncryptionStatus, PairedDeviceLinkKeys, PowerManagementStatus,
    ScoEvent,
};
use crate::protocol::{ButtonEvent, HostEvent};

/// Errors reported by the non-volatile storage driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StorageError {
    /// No record stored under the identifier
    NotFound,
    /// Record length differs from what the caller expects
    LengthMismatch { expected: usize, actual: usize },
    /// Driver-level read/write failure
    Io,
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::NotFound => f.write_str("record not found"),
            StorageError::LengthMismatch { expected, actual } => {
                write!(f, "record length {} (expected {})", actual, expected)
            }
            StorageError::Io => f.write_str("storage i/o failure"),
        }
    }
}

/// Errors from bringing the stack or its buffers up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BringupError {
    /// Stack init call returned an error code
    StackInit(u8),
    /// Audio frame size does not fit the relay
    AudioBuffers { frame_len: usize },
}

impl fmt::Display for BringupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BringupError::StackInit(code) => write!(f, "stack init failed ({:#x})", code),
            BringupError::AudioBuffers { frame_len } => {
                write!(f, "audio frame of {} bytes does not fit the relay", frame_len)
            }
        }
    }
}

/// Key-value access to non-volatile storage, addressed by record id
pub trait KeyValueStore {
    /// Read record `id` into `buf`, returning the number of bytes read
    fn read(&mut self, id: u16, buf: &mut [u8]) -> Result<usize, StorageError>;

    /// Write `data` as record `id`, returning the number of bytes persisted
    fn write(&mut self, id: u16, data: &[u8]) -> Result<usize, StorageError>;
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for &mut T {
    fn read(&mut self, id: u16, buf: &mut [u8]) -> Result<usize, StorageError> {
        (**self).read(id, buf)
    }

    fn write(&mut self, id: u16, data: &[u8]) -> Result<usize, StorageError> {
        (**self).write(id, data)
    }
}

/// Process-wide pairing state owned outside this crate
pub trait SecurityPolicy {
    /// Whether new pairings may currently be granted
    fn pairing_allowed(&self) -> bool;

    /// Whether a fast-pair seeker is driving the current pairing
    fn fast_pair_active(&self) -> bool {
        false
    }

    /// Hand a numeric-comparison value to the fast-pair provider
    fn set_fast_pair_passkey(&mut self, _passkey: u32) {}

    /// Reply to a user confirmation request
    fn confirm_pairing(&mut self, peer: BdAddr, accept: bool);
}

/// Persistence of bonded peers' link keys
pub trait LinkKeyStore {
    /// Store updated keys; `true` on success
    fn update_link_keys(&mut self, keys: &PairedDeviceLinkKeys) -> bool;

    /// Fill `keys` for `keys.peer`; `true` if found
    fn request_link_keys(&mut self, keys: &mut PairedDeviceLinkKeys) -> bool;
}

/// Connection-level notifications handled by the connection manager
pub trait ConnectionEvents {
    fn encryption_status(&mut self, status: &EncryptionStatus);

    fn power_management_status(&mut self, status: &PowerManagementStatus);

    /// Decide on a peer's LE connection parameter proposal; `true` accepts
    fn remote_conn_param_request(&mut self, request: &ConnParamRequest) -> bool;
}

/// Hands-free SCO management
pub trait ScoHandler {
    fn sco_event(&mut self, event: &ScoEvent);
}

/// Feeds synthetic button presses into the button manager
pub trait ButtonEmulator {
    fn emulate_button(&mut self, button: ButtonEvent, timestamp: u32);
}

/// Protocol stack bring-up, in the order the router drives it
pub trait StackBringup {
    /// Create the stack heap and initialise the stack
    fn start_stack(&mut self) -> Result<(), BringupError>;

    /// Configure the audio buffer pools
    fn init_audio_buffers(&mut self) -> Result<(), BringupError>;

    /// Runs once the stack reports it is enabled
    fn post_stack_init(&mut self) -> Result<(), BringupError>;
}

/// Outbound notifications to the host MCU
pub trait HostLink {
    fn send_event(&mut self, event: &HostEvent);
}

/// Every external collaborator the dispatcher and router talk to
pub trait StackServices:
    SecurityPolicy + LinkKeyStore + ConnectionEvents + ScoHandler + ButtonEmulator + StackBringup + HostLink
{
}

impl<T> StackServices for T where
    T: SecurityPolicy
        + LinkKeyStore
        + ConnectionEvents
        + ScoHandler
        + ButtonEmulator
        + StackBringup
        + HostLink
{
}
