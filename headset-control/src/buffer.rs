//! # Microphone Audio Relay Buffer
//!
//! Fixed-capacity circular byte buffer that decouples the host-supplied PCM
//! stream (producer, command context) from the SCO frame consumer (audio
//! context).
//!
//! ## Locking
//!
//! All state (storage, cursors, length) lives in a single
//! `embassy_sync::blocking_mutex::Mutex`, so it can only be touched inside a
//! lock scope. Critical sections cover the cursor update and the memory copy
//! and nothing else; no operation waits for data or space.
//!
//! ## Memory Layout
//!
//! ```text
//! ┌──────────┬───────────────────────┬──────────────────────────┐
//! │   free   │   pending mic bytes   │           free           │
//! └──────────┴───────────────────────┴──────────────────────────┘
//!            ▲                       ▲
//!         read_idx               write_idx
//! ```
//!
//! Cursors may coincide both when empty and when full; `len` disambiguates.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;

/// Relay capacity: 1024 bytes of 16-bit PCM is ~64ms of narrowband audio
pub const MIC_BUFFER_LEN: usize = 1024;

/// Counters kept alongside the ring, read under the same lock
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RelayStats {
    /// Bytes accepted by `append`
    pub bytes_accepted: u64,
    /// Bytes dropped by `append` because the ring was full
    pub bytes_dropped: u64,
    /// Successful `drain` calls
    pub frames_drained: u64,
    /// Silence bytes written by `drain` on underrun
    pub bytes_padded: u64,
}

/// Ring state guarded by the relay lock
struct RingState<const N: usize> {
    data: [u8; N],
    len: usize,
    read_idx: usize,
    write_idx: usize,
    stats: RelayStats,
}

impl<const N: usize> RingState<N> {
    const fn new() -> Self {
        Self {
            data: [0u8; N],
            len: 0,
            read_idx: 0,
            write_idx: 0,
            stats: RelayStats {
                bytes_accepted: 0,
                bytes_dropped: 0,
                frames_drained: 0,
                bytes_padded: 0,
            },
        }
    }

    fn push(&mut self, data: &[u8]) -> usize {
        if self.len == N {
            self.stats.bytes_dropped += data.len() as u64;
            return 0;
        }

        let fill = data.len().min(N - self.len);
        let write_idx = self.write_idx;

        if write_idx + fill <= N {
            self.data[write_idx..write_idx + fill].copy_from_slice(&data[..fill]);
        } else {
            let first_len = N - write_idx;
            self.data[write_idx..N].copy_from_slice(&data[..first_len]);
            self.data[..fill - first_len].copy_from_slice(&data[first_len..fill]);
        }

        self.write_idx = (write_idx + fill) % N;
        self.len += fill;
        self.stats.bytes_accepted += fill as u64;
        self.stats.bytes_dropped += (data.len() - fill) as u64;
        fill
    }

    fn pop(&mut self, out: &mut [u8]) -> bool {
        if self.len == 0 {
            out.fill(0);
            return false;
        }

        let take = out.len().min(self.len);
        let read_idx = self.read_idx;

        if read_idx + take <= N {
            out[..take].copy_from_slice(&self.data[read_idx..read_idx + take]);
        } else {
            let first_len = N - read_idx;
            out[..first_len].copy_from_slice(&self.data[read_idx..N]);
            out[first_len..take].copy_from_slice(&self.data[..take - first_len]);
        }

        // Short frame: pad with silence so the SCO path always gets a full frame
        out[take..].fill(0);

        self.read_idx = (read_idx + take) % N;
        self.len -= take;
        self.stats.frames_drained += 1;
        self.stats.bytes_padded += (out.len() - take) as u64;
        true
    }

    fn clear(&mut self) {
        self.data.fill(0);
        self.len = 0;
        self.read_idx = 0;
        self.write_idx = 0;
    }
}

/// Lock-guarded microphone relay between the host link and the SCO path
///
/// `M` selects the raw mutex: `CriticalSectionRawMutex` when the two
/// contexts run on different priorities or threads, `NoopRawMutex` when
/// everything runs on one executor.
///
/// # Example
///
/// ```rust
/// use embassy_sync::blocking_mutex::raw::NoopRawMutex;
/// use headset_control::buffer::MicRelayBuffer;
///
/// let relay: MicRelayBuffer<NoopRawMutex, 8> = MicRelayBuffer::new();
///
/// relay.append(&[1, 2, 3]);
///
/// let mut frame = [0xFFu8; 4];
/// assert!(relay.drain(&mut frame));
/// assert_eq!(frame, [1, 2, 3, 0]);
/// ```
pub struct MicRelayBuffer<M: RawMutex, const N: usize = MIC_BUFFER_LEN> {
    state: Mutex<M, RefCell<RingState<N>>>,
}

impl<M: RawMutex, const N: usize> MicRelayBuffer<M, N> {
    /// Create an empty, zero-filled relay
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(RefCell::new(RingState::new())),
        }
    }

    /// Total capacity in bytes
    #[inline]
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Number of bytes waiting to be drained
    pub fn len(&self) -> usize {
        self.state.lock(|s| s.borrow().len)
    }

    /// Check if nothing is waiting to be drained
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check if the next `append` will be dropped entirely
    pub fn is_full(&self) -> bool {
        self.len() == N
    }

    /// Producer side: queue host mic bytes
    ///
    /// Copies as much of `data` as fits and silently discards the rest.
    /// Unread data is never overwritten. Returns the number of bytes
    /// accepted, which is zero when the ring is already full.
    pub fn append(&self, data: &[u8]) -> usize {
        let accepted = self.state.lock(|s| s.borrow_mut().push(data));
        if accepted < data.len() {
            trace!("mic relay dropped {} of {} bytes", data.len() - accepted, data.len());
        }
        accepted
    }

    /// Consumer side: fill one outgoing audio frame
    ///
    /// Copies up to `out.len()` pending bytes into `out` and zero-pads the
    /// remainder. Returns `false` only when nothing was pending; `out` is
    /// then a silent frame.
    pub fn drain(&self, out: &mut [u8]) -> bool {
        self.state.lock(|s| s.borrow_mut().pop(out))
    }

    /// Discard everything pending and rewind both cursors
    ///
    /// Idempotent. Data appended just before a reset is lost.
    pub fn reset(&self) {
        self.state.lock(|s| s.borrow_mut().clear());
    }

    /// Snapshot of the relay counters
    pub fn stats(&self) -> RelayStats {
        self.state.lock(|s| s.borrow().stats)
    }
}

impl<M: RawMutex, const N: usize> Default for MicRelayBuffer<M, N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_sync::blocking_mutex::raw::{CriticalSectionRawMutex, NoopRawMutex};

    type Relay8 = MicRelayBuffer<NoopRawMutex, 8>;

    #[test]
    fn test_new_buffer_is_empty() {
        let relay = Relay8::new();
        assert!(relay.is_empty());
        assert!(!relay.is_full());
        assert_eq!(relay.len(), 0);
        assert_eq!(relay.capacity(), 8);
    }

    #[test]
    fn test_append_beyond_capacity_keeps_oldest() {
        let relay = Relay8::new();

        assert_eq!(relay.append(&[1, 2, 3, 4, 5]), 5);
        assert_eq!(relay.append(&[6, 7, 8, 9, 10]), 3);
        assert_eq!(relay.len(), 8);
        assert!(relay.is_full());

        let mut out = [0u8; 8];
        assert!(relay.drain(&mut out));
        assert_eq!(out, [1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn test_drain_pads_short_frame_with_silence() {
        let relay = Relay8::new();
        relay.append(&[1, 2, 3, 4, 5]);
        relay.append(&[6, 7, 8, 9, 10]);

        let mut out = [0xEEu8; 6];
        assert!(relay.drain(&mut out));
        assert_eq!(out, [1, 2, 3, 4, 5, 6]);
        assert_eq!(relay.len(), 2);

        let mut out = [0xEEu8; 6];
        assert!(relay.drain(&mut out));
        assert_eq!(out, [7, 8, 0, 0, 0, 0]);
        assert_eq!(relay.len(), 0);
    }

    #[test]
    fn test_drain_when_empty_yields_silence() {
        let relay = Relay8::new();
        let mut out = [0xAAu8; 4];
        assert!(!relay.drain(&mut out));
        assert_eq!(out, [0; 4]);
        assert_eq!(relay.stats().frames_drained, 0);
    }

    #[test]
    fn test_append_when_full_is_a_noop() {
        let relay = Relay8::new();
        relay.append(&[1, 2, 3, 4, 5, 6, 7, 8]);

        assert_eq!(relay.append(&[9, 9, 9]), 0);
        assert_eq!(relay.len(), 8);

        let mut out = [0u8; 8];
        relay.drain(&mut out);
        assert_eq!(out, [1, 2, 3, 4, 5, 6, 7, 8]);

        let stats = relay.stats();
        assert_eq!(stats.bytes_accepted, 8);
        assert_eq!(stats.bytes_dropped, 3);
    }

    #[test]
    fn test_wrap_around_preserves_order() {
        let relay = Relay8::new();
        relay.append(&[1, 2, 3, 4, 5, 6]);

        let mut out = [0u8; 5];
        relay.drain(&mut out);
        assert_eq!(out, [1, 2, 3, 4, 5]);

        // write cursor is at 6; this append wraps past the end
        assert_eq!(relay.append(&[7, 8, 9, 10, 11, 12]), 6);
        assert_eq!(relay.len(), 7);

        let mut out = [0u8; 7];
        assert!(relay.drain(&mut out));
        assert_eq!(out, [6, 7, 8, 9, 10, 11, 12]);
        assert!(relay.is_empty());
    }

    #[test]
    fn test_reset_discards_pending_audio() {
        let relay = Relay8::new();
        relay.append(&[1, 2, 3]);
        relay.reset();
        relay.reset();

        let mut out = [0xAAu8; 4];
        assert!(!relay.drain(&mut out));
        assert_eq!(out, [0; 4]);
        assert!(relay.is_empty());

        // cursors rewound: a fresh append starts at the front again
        relay.append(&[4, 5]);
        let mut out = [0xFFu8; 3];
        assert!(relay.drain(&mut out));
        assert_eq!(out, [4, 5, 0]);
    }

    #[test]
    fn test_stats_track_padding() {
        let relay = Relay8::new();
        relay.append(&[1]);
        let mut out = [0u8; 4];
        relay.drain(&mut out);

        let stats = relay.stats();
        assert_eq!(stats.frames_drained, 1);
        assert_eq!(stats.bytes_padded, 3);
    }

    #[test]
    fn test_drain_counter_outlives_u32() {
        let relay = Relay8::new();
        relay
            .state
            .lock(|s| s.borrow_mut().stats.frames_drained = u32::MAX as u64);
        relay.append(&[1]);
        let mut out = [0u8; 1];
        assert!(relay.drain(&mut out));
        assert_eq!(relay.stats().frames_drained, u32::MAX as u64 + 1);
    }

    #[test]
    fn test_length_stays_in_bounds_under_mixed_traffic() {
        let relay = Relay8::new();
        let mut next = 0u8;
        let mut expected = std::collections::VecDeque::new();

        for round in 0..64usize {
            let chunk: std::vec::Vec<u8> = (0..(round % 7))
                .map(|_| {
                    next = next.wrapping_add(1);
                    next
                })
                .collect();
            let accepted = relay.append(&chunk);
            expected.extend(chunk[..accepted].iter().copied());
            assert!(relay.len() <= relay.capacity());

            let had_pending = !expected.is_empty();
            let mut out = [0u8; 3];
            assert_eq!(relay.drain(&mut out), had_pending);
            for byte in out.iter() {
                if let Some(want) = expected.pop_front() {
                    assert_eq!(*byte, want);
                } else {
                    assert_eq!(*byte, 0);
                }
            }
            assert_eq!(relay.len(), expected.len());
        }
    }

    static SHARED: MicRelayBuffer<CriticalSectionRawMutex, 64> = MicRelayBuffer::new();

    #[test]
    fn test_concurrent_producer_and_consumer() {
        let producer = std::thread::spawn(|| {
            let mut sent = 0usize;
            for i in 0..2000u32 {
                let byte = (i % 251) as u8 + 1;
                sent += SHARED.append(&[byte]);
            }
            sent
        });

        let mut received = 0usize;
        let mut out = [0u8; 5];
        for _ in 0..4000 {
            if SHARED.drain(&mut out) {
                received += out.iter().filter(|b| **b != 0).count();
            }
        }

        let sent = producer.join().unwrap();
        let mut rest = [0u8; 64];
        while SHARED.drain(&mut rest) {
            received += rest.iter().filter(|b| **b != 0).count();
        }
        assert_eq!(sent, received);
        assert!(SHARED.is_empty());
    }
}
