//! # Headset Control Context
//!
//! Owns the state of the run-to-completion context: the identity key store
//! and the stack collaborators, plus a shared reference to the mic relay
//! that the audio context drains independently.
//!
//! Stack events are handled in `dispatcher.rs`, host commands in
//! `router.rs`; both are `impl` blocks on this type.

use embassy_sync::blocking_mutex::raw::RawMutex;

use crate::buffer::{MicRelayBuffer, MIC_BUFFER_LEN};
use crate::key_store::IdentityKeyStore;
use crate::traits::{KeyValueStore, StackServices};

/// Control plane for one headset instance
pub struct HeadsetControl<'a, M, S, P, const N: usize = MIC_BUFFER_LEN>
where
    M: RawMutex,
    S: KeyValueStore,
    P: StackServices,
{
    pub(crate) mic: &'a MicRelayBuffer<M, N>,
    pub(crate) keys: IdentityKeyStore<S>,
    pub(crate) services: P,
}

impl<'a, M, S, P, const N: usize> HeadsetControl<'a, M, S, P, N>
where
    M: RawMutex,
    S: KeyValueStore,
    P: StackServices,
{
    pub fn new(mic: &'a MicRelayBuffer<M, N>, storage: S, services: P) -> Self {
        Self {
            mic,
            keys: IdentityKeyStore::new(storage),
            services,
        }
    }

    pub fn mic(&self) -> &'a MicRelayBuffer<M, N> {
        self.mic
    }

    pub fn key_store(&self) -> &IdentityKeyStore<S> {
        &self.keys
    }

    pub fn services(&self) -> &P {
        &self.services
    }

    pub fn services_mut(&mut self) -> &mut P {
        &mut self.services
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Collaborator doubles shared by the dispatcher and router tests

    use std::vec::Vec;

    use embassy_sync::blocking_mutex::raw::NoopRawMutex;

    use crate::buffer::MicRelayBuffer;
    use crate::event::{
        BdAddr, ConnParamRequest, EncryptionStatus, PairedDeviceLinkKeys, PowerManagementStatus,
        ScoEvent,
    };
    use crate::protocol::{ButtonEvent, HostEvent};
    use crate::traits::{
        BringupError, ButtonEmulator, ConnectionEvents, HostLink, KeyValueStore, LinkKeyStore,
        ScoHandler, SecurityPolicy, StackBringup, StorageError,
    };

    pub type Relay = MicRelayBuffer<NoopRawMutex, 16>;

    #[derive(Default)]
    pub struct MemoryNvram {
        pub records: Vec<(u16, Vec<u8>)>,
        pub writes: usize,
    }

    impl MemoryNvram {
        pub fn with_record(id: u16, data: &[u8]) -> Self {
            Self {
                records: std::vec![(id, data.to_vec())],
                writes: 0,
            }
        }
    }

    impl KeyValueStore for MemoryNvram {
        fn read(&mut self, id: u16, buf: &mut [u8]) -> Result<usize, StorageError> {
            let (_, data) = self
                .records
                .iter()
                .find(|(rid, _)| *rid == id)
                .ok_or(StorageError::NotFound)?;
            let n = data.len().min(buf.len());
            buf[..n].copy_from_slice(&data[..n]);
            Ok(n)
        }

        fn write(&mut self, id: u16, data: &[u8]) -> Result<usize, StorageError> {
            self.writes += 1;
            self.records.retain(|(rid, _)| *rid != id);
            self.records.push((id, data.to_vec()));
            Ok(data.len())
        }
    }

    #[derive(Default)]
    pub struct MockServices {
        pub pairing_allowed: bool,
        pub fast_pair: bool,
        pub passkey: Option<u32>,
        pub confirmations: Vec<(BdAddr, bool)>,
        pub link_keys: Vec<PairedDeviceLinkKeys>,
        pub link_keys_fail: bool,
        pub encryption_events: usize,
        pub reject_conn_params: bool,
        pub sco_events: Vec<ScoEvent>,
        pub buttons: Vec<(ButtonEvent, u32)>,
        pub fail_stack_start: bool,
        pub stack_starts: usize,
        pub audio_inits: usize,
        pub post_inits: usize,
        pub host_events: Vec<HostEvent>,
    }

    impl SecurityPolicy for MockServices {
        fn pairing_allowed(&self) -> bool {
            self.pairing_allowed
        }

        fn fast_pair_active(&self) -> bool {
            self.fast_pair
        }

        fn set_fast_pair_passkey(&mut self, passkey: u32) {
            self.passkey = Some(passkey);
        }

        fn confirm_pairing(&mut self, peer: BdAddr, accept: bool) {
            self.confirmations.push((peer, accept));
        }
    }

    impl LinkKeyStore for MockServices {
        fn update_link_keys(&mut self, keys: &PairedDeviceLinkKeys) -> bool {
            if self.link_keys_fail {
                return false;
            }
            self.link_keys.retain(|k| k.peer != keys.peer);
            self.link_keys.push(*keys);
            true
        }

        fn request_link_keys(&mut self, keys: &mut PairedDeviceLinkKeys) -> bool {
            match self.link_keys.iter().find(|k| k.peer == keys.peer) {
                Some(found) => {
                    *keys = *found;
                    true
                }
                None => false,
            }
        }
    }

    impl ConnectionEvents for MockServices {
        fn encryption_status(&mut self, _status: &EncryptionStatus) {
            self.encryption_events += 1;
        }

        fn power_management_status(&mut self, _status: &PowerManagementStatus) {}

        fn remote_conn_param_request(&mut self, _request: &ConnParamRequest) -> bool {
            !self.reject_conn_params
        }
    }

    impl ScoHandler for MockServices {
        fn sco_event(&mut self, event: &ScoEvent) {
            self.sco_events.push(*event);
        }
    }

    impl ButtonEmulator for MockServices {
        fn emulate_button(&mut self, button: ButtonEvent, timestamp: u32) {
            self.buttons.push((button, timestamp));
        }
    }

    impl StackBringup for MockServices {
        fn start_stack(&mut self) -> Result<(), BringupError> {
            if self.fail_stack_start {
                return Err(BringupError::StackInit(1));
            }
            self.stack_starts += 1;
            Ok(())
        }

        fn init_audio_buffers(&mut self) -> Result<(), BringupError> {
            self.audio_inits += 1;
            Ok(())
        }

        fn post_stack_init(&mut self) -> Result<(), BringupError> {
            self.post_inits += 1;
            Ok(())
        }
    }

    impl HostLink for MockServices {
        fn send_event(&mut self, event: &HostEvent) {
            self.host_events.push(*event);
        }
    }
}
