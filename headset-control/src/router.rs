//! # Host Command Router
//!
//! Demultiplexes host commands. Unknown opcodes and payloads of the wrong
//! length are dropped without a reply to the host.

use embassy_sync::blocking_mutex::raw::RawMutex;

use crate::control::HeadsetControl;
use crate::protocol::{ButtonEvent, Command, Opcode};
use crate::traits::{BringupError, KeyValueStore, StackServices};

impl<'a, M, S, P, const N: usize> HeadsetControl<'a, M, S, P, N>
where
    M: RawMutex,
    S: KeyValueStore,
    P: StackServices,
{
    /// Route one host command
    pub fn route_command(&mut self, command: Command<'_>) {
        let Ok(opcode) = Opcode::try_from(command.opcode) else {
            debug!("dropping unknown opcode {:#x}", command.opcode);
            return;
        };

        match opcode {
            Opcode::MicData => {
                self.mic.append(command.payload);
            }
            Opcode::BtStart => {
                if !command.payload.is_empty() {
                    debug!("dropping bt-start with {} byte payload", command.payload.len());
                    return;
                }
                if let Err(e) = self.start() {
                    error!("bring-up aborted: {:?}", e);
                }
            }
            Opcode::Button => match ButtonEvent::decode(command.payload) {
                Some(button) => self.services.emulate_button(button, 0),
                None => debug!("dropping button command of {} bytes", command.payload.len()),
            },
        }
    }

    /// Stack bring-up: stack, audio buffers, then the local identity key
    ///
    /// A failed step aborts the ones after it. A key restore failure is not
    /// a bring-up failure; the stack regenerates the key when asked.
    pub fn start(&mut self) -> Result<(), BringupError> {
        self.services.start_stack()?;
        self.services.init_audio_buffers()?;
        let _ = self.keys.restore();
        info!("stack bring-up complete");
        Ok(())
    }
}
