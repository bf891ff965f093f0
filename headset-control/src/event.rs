//! # Management Event Definitions
//!
//! Notifications delivered by the Bluetooth stack's management callback,
//! modelled as one sum type with a payload per kind. Request kinds carry
//! response fields that the dispatcher fills in before returning.

use core::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::key_store::LocalIdentityKey;

/// Bluetooth device address, stored little-endian as on the wire
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BdAddr(pub [u8; 6]);

impl fmt::Display for BdAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            b[5], b[4], b[3], b[2], b[1], b[0]
        )
    }
}

/// Answer returned to the stack for a management event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Verdict {
    /// Event handled, request granted
    Accept,
    /// Request refused
    Reject,
    /// Requested material is unavailable; the stack regenerates it
    NoResources,
    /// Event not handled here; the stack applies its default policy
    UseDefaultSecurity,
}

impl Verdict {
    /// Map a collaborator's success flag onto a verdict
    pub fn from_success(success: bool) -> Self {
        if success {
            Verdict::Accept
        } else {
            Verdict::Reject
        }
    }
}

/// Transport a pairing ran over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Transport {
    BrEdr,
    Le,
}

/// Local or peer IO capability as exchanged during pairing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum IoCapability {
    DisplayOnly = 0x00,
    DisplayYesNo = 0x01,
    KeyboardOnly = 0x02,
    NoInputNoOutput = 0x03,
    KeyboardDisplay = 0x04,
}

impl TryFrom<u8> for IoCapability {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(Self::DisplayOnly),
            0x01 => Ok(Self::DisplayYesNo),
            0x02 => Ok(Self::KeyboardOnly),
            0x03 => Ok(Self::NoInputNoOutput),
            0x04 => Ok(Self::KeyboardDisplay),
            _ => Err(()),
        }
    }
}

/// BR/EDR authentication requirement (HCI encoding)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum BrEdrAuthReq {
    NoBonding = 0x00,
    NoBondingMitm = 0x01,
    DedicatedBonding = 0x02,
    DedicatedBondingMitm = 0x03,
    GeneralBonding = 0x04,
    GeneralBondingMitm = 0x05,
}

bitflags! {
    /// LE authentication requirement flags (SMP AuthReq)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct LeAuthReq: u8 {
        const BOND = 0x01;
        const MITM = 0x04;
        const SECURE_CONNECTIONS = 0x08;
    }
}

bitflags! {
    /// LE key distribution mask
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct LeKeyDistribution: u8 {
        /// Peer encryption key
        const ENC = 0x01;
        /// Identity key
        const ID = 0x02;
        /// Signing key
        const SIGN = 0x04;
        /// Link encryption key
        const LINK_ENC = 0x08;
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for LeAuthReq {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "LeAuthReq({=u8:#x})", self.bits())
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for LeKeyDistribution {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "LeKeyDistribution({=u8:#x})", self.bits())
    }
}

/// BR/EDR IO capability request; the response fields are filled locally
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BrEdrIoCapRequest {
    pub peer: BdAddr,
    pub local_io_cap: IoCapability,
    pub auth_req: BrEdrAuthReq,
    pub oob_data: bool,
}

impl BrEdrIoCapRequest {
    /// Request as delivered by the stack, before local policy is applied
    pub fn new(peer: BdAddr) -> Self {
        Self {
            peer,
            local_io_cap: IoCapability::NoInputNoOutput,
            auth_req: BrEdrAuthReq::NoBonding,
            oob_data: false,
        }
    }
}

/// LE IO capability request; the response fields are filled locally
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LeIoCapRequest {
    pub peer: BdAddr,
    pub local_io_cap: IoCapability,
    pub oob_data: bool,
    pub auth_req: LeAuthReq,
    pub max_key_size: u8,
    pub init_keys: LeKeyDistribution,
    pub resp_keys: LeKeyDistribution,
}

impl LeIoCapRequest {
    /// Request as delivered by the stack, before local policy is applied
    pub fn new(peer: BdAddr) -> Self {
        Self {
            peer,
            local_io_cap: IoCapability::NoInputNoOutput,
            oob_data: false,
            auth_req: LeAuthReq::empty(),
            max_key_size: 7,
            init_keys: LeKeyDistribution::empty(),
            resp_keys: LeKeyDistribution::empty(),
        }
    }
}

/// Outcome of a finished pairing, per transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PairingResult {
    /// HCI status of a BR/EDR pairing
    BrEdr { status: u8 },
    /// SMP reason of an LE pairing
    Le { reason: u8 },
}

impl PairingResult {
    pub fn transport(&self) -> Transport {
        match self {
            PairingResult::BrEdr { .. } => Transport::BrEdr,
            PairingResult::Le { .. } => Transport::Le,
        }
    }

    /// Raw result code regardless of transport
    pub fn code(&self) -> u8 {
        match *self {
            PairingResult::BrEdr { status } => status,
            PairingResult::Le { reason } => reason,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EncryptionStatus {
    pub peer: BdAddr,
    pub transport: Transport,
    pub result: u8,
}

/// Link keys of a bonded peer, owned by the link-key collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PairedDeviceLinkKeys {
    pub peer: BdAddr,
    pub link_key: [u8; 16],
    pub key_type: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PowerManagementStatus {
    pub peer: BdAddr,
    pub status: u8,
    pub hci_status: u8,
}

/// LE connection parameters proposed by a peer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConnParamRequest {
    pub peer: BdAddr,
    pub min_interval: u16,
    pub max_interval: u16,
    pub latency: u16,
    pub timeout: u16,
}

/// SCO lifecycle notifications, handed to the hands-free SCO handler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ScoEvent {
    Connected { sco_index: u16 },
    Disconnected { sco_index: u16, reason: u8 },
    ConnectionRequest { sco_index: u16, peer: BdAddr, link_type: u8 },
    ConnectionChange { sco_index: u16, peer: BdAddr, tx_interval: u8, retrans_window: u8 },
}

/// Local identity key slot the dispatcher answers from the key store
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct IdentityKeyRequest {
    pub key: Option<LocalIdentityKey>,
}

/// Advertising mode reported by the stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AdvertMode {
    Off,
    DirectedHigh,
    DirectedLow,
    UndirectedHigh,
    UndirectedLow,
    NonConnectableHigh,
    NonConnectableLow,
    DiscoverableHigh,
    DiscoverableLow,
}

/// Stack management notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ManagementEvent {
    /// Stack came up; `success` is false if enabling failed
    Enabled { success: bool },
    /// Stack went down
    Disabled { reason: u8 },
    PinRequest { peer: BdAddr },
    UserConfirmationRequest { peer: BdAddr, just_works: bool, numeric_value: u32 },
    PasskeyNotification { peer: BdAddr, passkey: u32 },
    BrEdrIoCapabilityRequest(BrEdrIoCapRequest),
    BrEdrIoCapabilityResponse { peer: BdAddr, io_cap: IoCapability },
    LeIoCapabilityRequest(LeIoCapRequest),
    PairingComplete { peer: BdAddr, result: PairingResult },
    EncryptionStatus(EncryptionStatus),
    SecurityRequest { peer: BdAddr },
    LinkKeysUpdate(PairedDeviceLinkKeys),
    LinkKeysRequest(PairedDeviceLinkKeys),
    LocalIdentityKeysUpdate(LocalIdentityKey),
    LocalIdentityKeysRequest(IdentityKeyRequest),
    AdvertStateChanged(AdvertMode),
    PowerManagementStatus(PowerManagementStatus),
    Sco(ScoEvent),
    ConnectionParamUpdate { peer: BdAddr, status: u8, interval: u16, latency: u16, timeout: u16 },
    PhyUpdate { peer: BdAddr, tx_phy: u8, rx_phy: u8 },
    RemoteConnParamRequest(ConnParamRequest),
    /// Any kind this layer has no policy for, by raw stack code
    Other(u8),
}

impl ManagementEvent {
    /// Short name used in traces
    pub fn kind(&self) -> &'static str {
        match self {
            ManagementEvent::Enabled { .. } => "enabled",
            ManagementEvent::Disabled { .. } => "disabled",
            ManagementEvent::PinRequest { .. } => "pin-request",
            ManagementEvent::UserConfirmationRequest { .. } => "user-confirmation-request",
            ManagementEvent::PasskeyNotification { .. } => "passkey-notification",
            ManagementEvent::BrEdrIoCapabilityRequest(_) => "br-edr-io-cap-request",
            ManagementEvent::BrEdrIoCapabilityResponse { .. } => "br-edr-io-cap-response",
            ManagementEvent::LeIoCapabilityRequest(_) => "le-io-cap-request",
            ManagementEvent::PairingComplete { .. } => "pairing-complete",
            ManagementEvent::EncryptionStatus(_) => "encryption-status",
            ManagementEvent::SecurityRequest { .. } => "security-request",
            ManagementEvent::LinkKeysUpdate(_) => "link-keys-update",
            ManagementEvent::LinkKeysRequest(_) => "link-keys-request",
            ManagementEvent::LocalIdentityKeysUpdate(_) => "local-identity-keys-update",
            ManagementEvent::LocalIdentityKeysRequest(_) => "local-identity-keys-request",
            ManagementEvent::AdvertStateChanged(_) => "advert-state-changed",
            ManagementEvent::PowerManagementStatus(_) => "power-management-status",
            ManagementEvent::Sco(ScoEvent::Connected { .. }) => "sco-connected",
            ManagementEvent::Sco(ScoEvent::Disconnected { .. }) => "sco-disconnected",
            ManagementEvent::Sco(ScoEvent::ConnectionRequest { .. }) => "sco-connection-request",
            ManagementEvent::Sco(ScoEvent::ConnectionChange { .. }) => "sco-connection-change",
            ManagementEvent::ConnectionParamUpdate { .. } => "connection-param-update",
            ManagementEvent::PhyUpdate { .. } => "phy-update",
            ManagementEvent::RemoteConnParamRequest(_) => "remote-conn-param-request",
            ManagementEvent::Other(_) => "other",
        }
    }
}
