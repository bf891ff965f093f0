//! # Management Event Dispatcher
//!
//! Turns stack notifications into security verdicts. The only local side
//! effects are identity key writes and the mic relay reset on SCO
//! teardown; everything else is answered from policy or handed to a
//! collaborator. Never blocks.

use embassy_sync::blocking_mutex::raw::RawMutex;

use crate::control::HeadsetControl;
use crate::event::{
    BrEdrAuthReq, BrEdrIoCapRequest, IoCapability, LeAuthReq, LeIoCapRequest, LeKeyDistribution,
    ManagementEvent, ScoEvent, Verdict,
};
use crate::key_store::LOCAL_KEY_LEN;
use crate::protocol::HostEvent;
use crate::traits::{KeyValueStore, StackServices};

/// Keys requested from and granted to an LE peer
pub const LE_KEY_SET: LeKeyDistribution = LeKeyDistribution::ENC
    .union(LeKeyDistribution::ID)
    .union(LeKeyDistribution::SIGN)
    .union(LeKeyDistribution::LINK_ENC);

impl<'a, M, S, P, const N: usize> HeadsetControl<'a, M, S, P, N>
where
    M: RawMutex,
    S: KeyValueStore,
    P: StackServices,
{
    /// Handle one management event from the stack
    ///
    /// Request kinds get their response fields written in place.
    pub fn handle_event(&mut self, event: &mut ManagementEvent) -> Verdict {
        debug!("management event: {}", event.kind());

        match event {
            ManagementEvent::Enabled { success } => {
                if !*success {
                    error!("stack enable arrived with failure");
                } else if let Err(e) = self.services.post_stack_init() {
                    error!("post-enable init failed: {:?}", e);
                }
                Verdict::Accept
            }

            ManagementEvent::Disabled { reason } => {
                warn!("stack disabled (reason {})", *reason);
                self.services.send_event(&HostEvent::DeviceError { reason: *reason });
                Verdict::Accept
            }

            ManagementEvent::PinRequest { peer } => {
                info!("pin request from {:?}", peer);
                Verdict::Accept
            }

            ManagementEvent::UserConfirmationRequest {
                peer,
                just_works,
                numeric_value,
            } => {
                if !*just_works {
                    info!("numeric comparison {} for {:?}", *numeric_value, peer);
                    self.services.set_fast_pair_passkey(*numeric_value);
                }
                self.services.confirm_pairing(*peer, true);
                Verdict::Accept
            }

            ManagementEvent::PasskeyNotification { peer, passkey } => {
                info!("passkey {} for {:?}", *passkey, peer);
                Verdict::Accept
            }

            ManagementEvent::BrEdrIoCapabilityRequest(req) => {
                self.fill_br_edr_io_caps(req);
                Verdict::Accept
            }

            ManagementEvent::BrEdrIoCapabilityResponse { peer, io_cap } => {
                debug!("peer {:?} io capability {:?}", peer, io_cap);
                // Would fall back to just-works; left to the fast-pair provider.
                if self.services.fast_pair_active() && *io_cap == IoCapability::NoInputNoOutput {
                    warn!("fast pair seeker {:?} reports no io, pairing should be terminated", peer);
                }
                Verdict::Accept
            }

            ManagementEvent::LeIoCapabilityRequest(req) => {
                fill_le_io_caps(req);
                Verdict::Accept
            }

            ManagementEvent::PairingComplete { peer, result } => {
                info!(
                    "{:?} pairing with {:?} finished: {:#x}",
                    result.transport(),
                    peer,
                    result.code()
                );
                self.services.send_event(&HostEvent::PairingComplete {
                    peer: *peer,
                    transport: result.transport(),
                    status: result.code(),
                });
                Verdict::Accept
            }

            ManagementEvent::EncryptionStatus(status) => {
                debug!("encryption status {:?}: {}", status.peer, status.result);
                self.services.encryption_status(status);
                Verdict::Accept
            }

            ManagementEvent::SecurityRequest { peer } => {
                let allowed = self.services.pairing_allowed();
                info!("security request from {:?}, pairing allowed: {}", peer, allowed);
                Verdict::from_success(allowed)
            }

            ManagementEvent::LinkKeysUpdate(keys) => {
                Verdict::from_success(self.services.update_link_keys(keys))
            }

            ManagementEvent::LinkKeysRequest(keys) => {
                Verdict::from_success(self.services.request_link_keys(keys))
            }

            ManagementEvent::LocalIdentityKeysUpdate(key) => {
                self.keys.update(key);
                Verdict::Accept
            }

            ManagementEvent::LocalIdentityKeysRequest(request) => match self.keys.key() {
                Some(key) => {
                    request.key = Some(*key);
                    Verdict::Accept
                }
                None => {
                    info!(
                        "no stored local identity key ({:?}), stack will generate one",
                        self.keys.last_result()
                    );
                    Verdict::NoResources
                }
            },

            ManagementEvent::AdvertStateChanged(mode) => {
                info!("advertising state: {:?}", mode);
                Verdict::Accept
            }

            ManagementEvent::PowerManagementStatus(status) => {
                self.services.power_management_status(status);
                Verdict::Accept
            }

            ManagementEvent::Sco(sco) => {
                self.services.sco_event(sco);
                if let ScoEvent::Disconnected { .. } = sco {
                    // stale uplink audio must not leak into the next call
                    self.mic.reset();
                }
                Verdict::Accept
            }

            ManagementEvent::ConnectionParamUpdate {
                peer,
                status,
                interval,
                latency,
                timeout,
            } => {
                info!(
                    "connection params {:?}: status {} interval {} latency {} timeout {}",
                    peer, *status, *interval, *latency, *timeout
                );
                Verdict::Accept
            }

            ManagementEvent::PhyUpdate { peer, tx_phy, rx_phy } => {
                info!("phy {:?}: tx {}M rx {}M", peer, *tx_phy, *rx_phy);
                Verdict::Accept
            }

            ManagementEvent::RemoteConnParamRequest(request) => {
                Verdict::from_success(self.services.remote_conn_param_request(request))
            }

            ManagementEvent::Other(code) => {
                trace!("unhandled management event {}", *code);
                Verdict::UseDefaultSecurity
            }
        }
    }

    fn fill_br_edr_io_caps(&self, req: &mut BrEdrIoCapRequest) {
        // A fast-pair seeker aborts if we look like a MITM-less relay.
        req.local_io_cap = if self.services.fast_pair_active() {
            IoCapability::DisplayYesNo
        } else {
            IoCapability::NoInputNoOutput
        };
        req.auth_req = BrEdrAuthReq::GeneralBonding;
        req.oob_data = false;
    }
}

fn fill_le_io_caps(req: &mut LeIoCapRequest) {
    req.local_io_cap = IoCapability::NoInputNoOutput;
    req.oob_data = false;
    req.auth_req = LeAuthReq::SECURE_CONNECTIONS | LeAuthReq::MITM | LeAuthReq::BOND;
    req.max_key_size = LOCAL_KEY_LEN as u8;
    req.init_keys = LE_KEY_SET;
    req.resp_keys = LE_KEY_SET;
}
