//! Stack collaborators for the hosted runtime
//!
//! There is no radio here: the stack-facing hooks keep the state a real
//! stack integration would (pairing flags, bonded link keys) and log the
//! rest. With `loopback_stack` enabled, bring-up answers itself by queueing
//! the events a real stack would send after enabling.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use headset_control::event::{
    ConnParamRequest, EncryptionStatus, IdentityKeyRequest, PairedDeviceLinkKeys,
    PowerManagementStatus,
};
use headset_control::key_store::NVRAM_ID_LINK_KEYS;
use headset_control::traits::{
    ButtonEmulator, ConnectionEvents, HostLink, LinkKeyStore, ScoHandler, SecurityPolicy,
    StackBringup,
};
use headset_control::{
    BdAddr, BringupError, ButtonEvent, HostEvent, KeyValueStore, ManagementEvent, ScoEvent,
    MIC_BUFFER_LEN,
};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;

use crate::nvram::FileNvram;
use crate::runtime::Inbound;

/// Largest link-key table kept in NVRAM
pub const MAX_BONDED_DEVICES: usize = 8;

/// Pairing flags shared with whoever owns the pairing UX
#[derive(Debug, Default)]
pub struct PairingFlags {
    pub pairing_allowed: AtomicBool,
    pub fast_pair: AtomicBool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct StoredLinkKey {
    peer: BdAddr,
    link_key: [u8; 16],
    key_type: u8,
}

/// `StackServices` implementation backed by tokio channels and `FileNvram`
pub struct HostServices {
    flags: Arc<PairingFlags>,
    nvram: FileNvram,
    host_events: UnboundedSender<HostEvent>,
    loopback: Option<UnboundedSender<Inbound>>,
    mic_frame_len: usize,
}

impl HostServices {
    pub fn new(
        flags: Arc<PairingFlags>,
        nvram: FileNvram,
        host_events: UnboundedSender<HostEvent>,
        loopback: Option<UnboundedSender<Inbound>>,
        mic_frame_len: usize,
    ) -> Self {
        Self {
            flags,
            nvram,
            host_events,
            loopback,
            mic_frame_len,
        }
    }

    fn load_link_keys(&self) -> Vec<StoredLinkKey> {
        self.nvram
            .get(NVRAM_ID_LINK_KEYS)
            .and_then(|bytes| serde_json::from_slice(&bytes).ok())
            .unwrap_or_default()
    }

    fn store_link_keys(&mut self, keys: &[StoredLinkKey]) -> bool {
        let bytes = match serde_json::to_vec(keys) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("link key table not serializable: {}", e);
                return false;
            }
        };
        self.nvram.write(NVRAM_ID_LINK_KEYS, &bytes).is_ok()
    }

    fn post(&self, event: ManagementEvent) {
        if let Some(tx) = &self.loopback {
            if tx.send(Inbound::stack(event)).is_err() {
                warn!("loopback event dropped, control context is gone");
            }
        }
    }
}

impl SecurityPolicy for HostServices {
    fn pairing_allowed(&self) -> bool {
        self.flags.pairing_allowed.load(Ordering::Acquire)
    }

    fn fast_pair_active(&self) -> bool {
        self.flags.fast_pair.load(Ordering::Acquire)
    }

    fn set_fast_pair_passkey(&mut self, passkey: u32) {
        if self.fast_pair_active() {
            info!("fast pair passkey {:06}", passkey);
        }
    }

    fn confirm_pairing(&mut self, peer: BdAddr, accept: bool) {
        info!("pairing confirmation for {}: {}", peer, accept);
    }
}

impl LinkKeyStore for HostServices {
    fn update_link_keys(&mut self, keys: &PairedDeviceLinkKeys) -> bool {
        let mut table = self.load_link_keys();
        table.retain(|k| k.peer != keys.peer);
        table.insert(
            0,
            StoredLinkKey {
                peer: keys.peer,
                link_key: keys.link_key,
                key_type: keys.key_type,
            },
        );
        // most recently bonded first; the oldest bond falls off
        table.truncate(MAX_BONDED_DEVICES);
        let stored = self.store_link_keys(&table);
        info!("link keys for {} stored: {}", keys.peer, stored);
        stored
    }

    fn request_link_keys(&mut self, keys: &mut PairedDeviceLinkKeys) -> bool {
        match self.load_link_keys().into_iter().find(|k| k.peer == keys.peer) {
            Some(found) => {
                keys.link_key = found.link_key;
                keys.key_type = found.key_type;
                true
            }
            None => {
                debug!("no link keys for {}", keys.peer);
                false
            }
        }
    }
}

impl ConnectionEvents for HostServices {
    fn encryption_status(&mut self, status: &EncryptionStatus) {
        info!("encryption {} on {:?}: {}", status.peer, status.transport, status.result);
    }

    fn power_management_status(&mut self, status: &PowerManagementStatus) {
        debug!("power mode {} for {}", status.status, status.peer);
    }

    fn remote_conn_param_request(&mut self, request: &ConnParamRequest) -> bool {
        // interval in 1.25ms units; 7.5ms..4s is the valid range
        request.min_interval >= 6
            && request.min_interval <= request.max_interval
            && request.max_interval <= 3200
    }
}

impl ScoHandler for HostServices {
    fn sco_event(&mut self, event: &ScoEvent) {
        info!("SCO: {:?}", event);
    }
}

impl ButtonEmulator for HostServices {
    fn emulate_button(&mut self, button: ButtonEvent, timestamp: u32) {
        info!(
            "button {} event {} state {} at {}",
            button.button_id, button.event, button.state, timestamp
        );
    }
}

impl StackBringup for HostServices {
    fn start_stack(&mut self) -> Result<(), BringupError> {
        info!("starting stack");
        // the enabled event arrives after bring-up completes, as with a real stack
        self.post(ManagementEvent::Enabled { success: true });
        self.post(ManagementEvent::LocalIdentityKeysRequest(IdentityKeyRequest::default()));
        Ok(())
    }

    fn init_audio_buffers(&mut self) -> Result<(), BringupError> {
        // one SCO frame must fit in the relay
        if self.mic_frame_len == 0 || self.mic_frame_len > MIC_BUFFER_LEN {
            return Err(BringupError::AudioBuffers {
                frame_len: self.mic_frame_len,
            });
        }
        debug!("audio buffers configured, {} byte frames", self.mic_frame_len);
        Ok(())
    }

    fn post_stack_init(&mut self) -> Result<(), BringupError> {
        info!("stack enabled, SCO mic path registered");
        Ok(())
    }
}

impl HostLink for HostServices {
    fn send_event(&mut self, event: &HostEvent) {
        if self.host_events.send(*event).is_err() {
            warn!("host link closed, dropping {:?}", event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    const PEER: BdAddr = BdAddr([1, 2, 3, 4, 5, 6]);

    fn services(dir: &tempfile::TempDir) -> (HostServices, mpsc::UnboundedReceiver<HostEvent>) {
        let nvram = FileNvram::open(dir.path().join("nvram.json")).unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        let flags = Arc::new(PairingFlags::default());
        (HostServices::new(flags, nvram, tx, None, 60), rx)
    }

    #[test]
    fn test_audio_frame_must_fit_relay() {
        let dir = tempfile::tempdir().unwrap();
        let (mut services, _rx) = services(&dir);
        assert_eq!(services.init_audio_buffers(), Ok(()));

        services.mic_frame_len = MIC_BUFFER_LEN + 1;
        assert_eq!(
            services.init_audio_buffers(),
            Err(BringupError::AudioBuffers {
                frame_len: MIC_BUFFER_LEN + 1
            })
        );
        services.mic_frame_len = 0;
        assert!(services.init_audio_buffers().is_err());
    }

    #[test]
    fn test_link_keys_round_trip_through_nvram() {
        let dir = tempfile::tempdir().unwrap();
        let (mut services, _rx) = services(&dir);

        let keys = PairedDeviceLinkKeys {
            peer: PEER,
            link_key: [0x3C; 16],
            key_type: 5,
        };
        assert!(services.update_link_keys(&keys));

        let mut wanted = PairedDeviceLinkKeys {
            peer: PEER,
            link_key: [0; 16],
            key_type: 0,
        };
        assert!(services.request_link_keys(&mut wanted));
        assert_eq!(wanted, keys);

        wanted.peer = BdAddr([9; 6]);
        assert!(!services.request_link_keys(&mut wanted));
    }

    #[test]
    fn test_link_key_table_is_bounded() {
        let dir = tempfile::tempdir().unwrap();
        let (mut services, _rx) = services(&dir);

        for i in 0..=MAX_BONDED_DEVICES as u8 {
            services.update_link_keys(&PairedDeviceLinkKeys {
                peer: BdAddr([i; 6]),
                link_key: [i; 16],
                key_type: 4,
            });
        }
        assert_eq!(services.load_link_keys().len(), MAX_BONDED_DEVICES);

        let mut oldest = PairedDeviceLinkKeys {
            peer: BdAddr([0; 6]),
            link_key: [0; 16],
            key_type: 0,
        };
        assert!(!services.request_link_keys(&mut oldest));
    }

    #[test]
    fn test_flags_drive_security_policy() {
        let dir = tempfile::tempdir().unwrap();
        let (services, _rx) = services(&dir);
        assert!(!services.pairing_allowed());

        services.flags.pairing_allowed.store(true, Ordering::Release);
        assert!(services.pairing_allowed());
    }

    #[test]
    fn test_conn_param_bounds() {
        let dir = tempfile::tempdir().unwrap();
        let (mut services, _rx) = services(&dir);
        let mut request = ConnParamRequest {
            peer: PEER,
            min_interval: 6,
            max_interval: 24,
            latency: 0,
            timeout: 400,
        };
        assert!(services.remote_conn_param_request(&request));
        request.min_interval = 4;
        assert!(!services.remote_conn_param_request(&request));
    }

    #[test]
    fn test_host_events_are_forwarded() {
        let dir = tempfile::tempdir().unwrap();
        let (mut services, mut rx) = services(&dir);
        services.send_event(&HostEvent::DeviceError { reason: 2 });
        assert_eq!(rx.try_recv().unwrap(), HostEvent::DeviceError { reason: 2 });
    }
}
