//! # Host Link Protocol
//!
//! Framing for the UART link between the host MCU and the headset. Every
//! transmission in either direction is a little-endian header followed by
//! the payload.
//!
//! ## Frame Format
//!
//! ```text
//! ┌──────────┬───────────────┬──────────────────────┐
//! │  Opcode  │  Payload len  │       Payload        │
//! │ 2 bytes  │    2 bytes    │  `payload_len` bytes │
//! └──────────┴───────────────┴──────────────────────┘
//! ```
//!
//! ## Inbound Commands (group 0x29, HCI audio)
//!
//! - **Button** (`0x2901`): 3 bytes, button id / event / state
//! - **Mic data** (`0x2902`): raw PCM bytes for the SCO uplink
//! - **BT start** (`0x2903`): empty, brings the stack up
//!
//! ## Outbound Events
//!
//! Encoded with `postcard` after the same header.

use core::fmt;

use heapless::Vec;
use serde::{Deserialize, Serialize};

use crate::event::{BdAddr, Transport};

/// Size of the opcode + length header
pub const HEADER_LEN: usize = 4;

/// Largest payload accepted from the host
pub const MAX_FRAME_PAYLOAD: usize = 1024;

/// Command group carrying the audio/control commands
pub const GROUP_HCI_AUDIO: u8 = 0x29;

/// Inbound command opcodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u16)]
pub enum Opcode {
    /// Emulated button press from the host
    Button = 0x2901,
    /// Microphone PCM for the SCO uplink
    MicData = 0x2902,
    /// Bring the Bluetooth stack up
    BtStart = 0x2903,
}

impl TryFrom<u16> for Opcode {
    type Error = ();

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            0x2901 => Ok(Self::Button),
            0x2902 => Ok(Self::MicData),
            0x2903 => Ok(Self::BtStart),
            _ => Err(()),
        }
    }
}

/// Frame header as found on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FrameHeader {
    pub opcode: u16,
    pub payload_len: u16,
}

impl FrameHeader {
    pub fn new(opcode: u16, payload_len: u16) -> Self {
        Self { opcode, payload_len }
    }

    /// Parse the first `HEADER_LEN` bytes of `data`
    pub fn parse(data: &[u8]) -> Result<Self, FrameError> {
        if data.len() < HEADER_LEN {
            return Err(FrameError::TooShort);
        }
        Ok(Self {
            opcode: u16::from_le_bytes([data[0], data[1]]),
            payload_len: u16::from_le_bytes([data[2], data[3]]),
        })
    }

    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let op = self.opcode.to_le_bytes();
        let len = self.payload_len.to_le_bytes();
        [op[0], op[1], len[0], len[1]]
    }
}

/// Errors during frame building/parsing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    /// Buffer too small for frame
    BufferTooSmall,
    /// Frame data shorter than its header claims
    TooShort,
    /// Declared payload exceeds `MAX_FRAME_PAYLOAD`; the payload was skipped
    PayloadTooLarge(u16),
    /// Stream ended mid-frame
    UnexpectedEof,
    /// Underlying transport error
    Io,
    /// Serialization failed
    SerializationError,
    /// Deserialization failed
    DeserializationError,
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::BufferTooSmall => f.write_str("buffer too small for frame"),
            FrameError::TooShort => f.write_str("frame shorter than declared"),
            FrameError::PayloadTooLarge(len) => write!(f, "payload of {} bytes too large", len),
            FrameError::UnexpectedEof => f.write_str("stream ended mid-frame"),
            FrameError::Io => f.write_str("transport error"),
            FrameError::SerializationError => f.write_str("event serialization failed"),
            FrameError::DeserializationError => f.write_str("event deserialization failed"),
        }
    }
}

impl<E> From<embedded_io::ReadExactError<E>> for FrameError {
    fn from(e: embedded_io::ReadExactError<E>) -> Self {
        match e {
            embedded_io::ReadExactError::UnexpectedEof => FrameError::UnexpectedEof,
            embedded_io::ReadExactError::Other(_) => FrameError::Io,
        }
    }
}

/// Borrowed view of one inbound host command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Command<'a> {
    pub opcode: u16,
    pub payload: &'a [u8],
}

impl<'a> Command<'a> {
    pub fn new(opcode: u16, payload: &'a [u8]) -> Self {
        Self { opcode, payload }
    }

    /// Parse a complete frame held in `data`
    ///
    /// Bytes past the declared payload are ignored.
    pub fn parse(data: &'a [u8]) -> Result<Self, FrameError> {
        let header = FrameHeader::parse(data)?;
        let end = HEADER_LEN + header.payload_len as usize;
        if data.len() < end {
            return Err(FrameError::TooShort);
        }
        Ok(Self {
            opcode: header.opcode,
            payload: &data[HEADER_LEN..end],
        })
    }
}

/// Owned inbound frame, as read from a byte stream
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Frame {
    pub opcode: u16,
    pub payload: Vec<u8, MAX_FRAME_PAYLOAD>,
}

impl Frame {
    pub fn command(&self) -> Command<'_> {
        Command::new(self.opcode, &self.payload)
    }
}

/// Payload buffer for a header that passed the length check
fn payload_for(header: &FrameHeader) -> Vec<u8, MAX_FRAME_PAYLOAD> {
    let mut payload = Vec::new();
    // payload_len <= MAX_FRAME_PAYLOAD, cannot fail
    let _ = payload.resize(header.payload_len as usize, 0);
    payload
}

/// Read one frame from a blocking byte stream (UART)
///
/// Returns `Ok(None)` when the stream ends cleanly between frames; an end
/// of stream anywhere inside a frame is `UnexpectedEof`. Oversized payloads
/// are consumed before `PayloadTooLarge` is returned, so the next call
/// starts on a frame boundary.
pub fn read_frame<R: embedded_io::Read>(reader: &mut R) -> Result<Option<Frame>, FrameError> {
    let mut header = [0u8; HEADER_LEN];
    let mut filled = 0;
    while filled < HEADER_LEN {
        match reader.read(&mut header[filled..]).map_err(|_| FrameError::Io)? {
            0 if filled == 0 => return Ok(None),
            0 => return Err(FrameError::UnexpectedEof),
            n => filled += n,
        }
    }
    let header = FrameHeader::parse(&header)?;

    if header.payload_len as usize > MAX_FRAME_PAYLOAD {
        let mut scratch = [0u8; 64];
        let mut remaining = header.payload_len as usize;
        while remaining > 0 {
            let chunk = remaining.min(scratch.len());
            reader.read_exact(&mut scratch[..chunk])?;
            remaining -= chunk;
        }
        return Err(FrameError::PayloadTooLarge(header.payload_len));
    }

    let mut payload = payload_for(&header);
    reader.read_exact(&mut payload)?;
    Ok(Some(Frame {
        opcode: header.opcode,
        payload,
    }))
}

/// Read one frame from an async byte stream
///
/// Same end-of-stream and oversize handling as [`read_frame`].
pub async fn read_frame_async<R: embedded_io_async::Read>(
    reader: &mut R,
) -> Result<Option<Frame>, FrameError> {
    let mut header = [0u8; HEADER_LEN];
    let mut filled = 0;
    while filled < HEADER_LEN {
        match reader
            .read(&mut header[filled..])
            .await
            .map_err(|_| FrameError::Io)?
        {
            0 if filled == 0 => return Ok(None),
            0 => return Err(FrameError::UnexpectedEof),
            n => filled += n,
        }
    }
    let header = FrameHeader::parse(&header)?;

    if header.payload_len as usize > MAX_FRAME_PAYLOAD {
        let mut scratch = [0u8; 64];
        let mut remaining = header.payload_len as usize;
        while remaining > 0 {
            let chunk = remaining.min(scratch.len());
            reader.read_exact(&mut scratch[..chunk]).await?;
            remaining -= chunk;
        }
        return Err(FrameError::PayloadTooLarge(header.payload_len));
    }

    let mut payload = payload_for(&header);
    reader.read_exact(&mut payload).await?;
    Ok(Some(Frame {
        opcode: header.opcode,
        payload,
    }))
}

/// Emulated button press: `| BUTTON_ID | BUTTON_EVENT | BUTTON_STATE |`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ButtonEvent {
    pub button_id: u8,
    pub event: u8,
    pub state: u8,
}

impl ButtonEvent {
    pub const WIRE_LEN: usize = 3;

    /// Decode a button payload; anything but exactly 3 bytes is rejected
    pub fn decode(payload: &[u8]) -> Option<Self> {
        match *payload {
            [button_id, event, state] => Some(Self {
                button_id,
                event,
                state,
            }),
            _ => None,
        }
    }
}

/// Notifications sent to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HostEvent {
    /// Host transport is up and commands will be processed
    DeviceStarted,
    /// Stack reported it went down
    DeviceError { reason: u8 },
    /// A pairing finished, successfully or not
    PairingComplete {
        peer: BdAddr,
        transport: Transport,
        status: u8,
    },
}

impl HostEvent {
    pub fn opcode(&self) -> u16 {
        match self {
            HostEvent::DeviceStarted => 0x0005,
            HostEvent::DeviceError { .. } => 0x0006,
            HostEvent::PairingComplete { .. } => 0x0306,
        }
    }

    /// Build a complete frame into `buffer`
    ///
    /// Returns the number of bytes written.
    pub fn encode_frame(&self, buffer: &mut [u8]) -> Result<usize, FrameError> {
        if buffer.len() < HEADER_LEN {
            return Err(FrameError::BufferTooSmall);
        }

        let payload_len = postcard::to_slice(self, &mut buffer[HEADER_LEN..])
            .map_err(|_| FrameError::SerializationError)?
            .len();

        let header = FrameHeader::new(self.opcode(), payload_len as u16);
        buffer[..HEADER_LEN].copy_from_slice(&header.to_bytes());
        Ok(HEADER_LEN + payload_len)
    }

    /// Parse a frame produced by `encode_frame`
    pub fn decode_frame(data: &[u8]) -> Result<Self, FrameError> {
        let command = Command::parse(data)?;
        let event: HostEvent =
            postcard::from_bytes(command.payload).map_err(|_| FrameError::DeserializationError)?;
        if event.opcode() != command.opcode {
            return Err(FrameError::DeserializationError);
        }
        Ok(event)
    }
}
