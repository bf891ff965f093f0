//! Logging shim.
//!
//! Routes the crate's log statements to `defmt` on target, to the `log`
//! facade when hosted, and compiles them away otherwise.

#![allow(unused_macros)]

#[cfg(feature = "defmt")]
macro_rules! trace { ($($arg:tt)*) => { ::defmt::trace!($($arg)*) }; }
#[cfg(feature = "defmt")]
macro_rules! debug { ($($arg:tt)*) => { ::defmt::debug!($($arg)*) }; }
#[cfg(feature = "defmt")]
macro_rules! info { ($($arg:tt)*) => { ::defmt::info!($($arg)*) }; }
#[cfg(feature = "defmt")]
macro_rules! warn { ($($arg:tt)*) => { ::defmt::warn!($($arg)*) }; }
#[cfg(feature = "defmt")]
macro_rules! error { ($($arg:tt)*) => { ::defmt::error!($($arg)*) }; }

#[cfg(all(not(feature = "defmt"), feature = "log"))]
macro_rules! trace { ($($arg:tt)*) => { ::log::trace!($($arg)*) }; }
#[cfg(all(not(feature = "defmt"), feature = "log"))]
macro_rules! debug { ($($arg:tt)*) => { ::log::debug!($($arg)*) }; }
#[cfg(all(not(feature = "defmt"), feature = "log"))]
macro_rules! info { ($($arg:tt)*) => { ::log::info!($($arg)*) }; }
#[cfg(all(not(feature = "defmt"), feature = "log"))]
macro_rules! warn { ($($arg:tt)*) => { ::log::warn!($($arg)*) }; }
#[cfg(all(not(feature = "defmt"), feature = "log"))]
macro_rules! error { ($($arg:tt)*) => { ::log::error!($($arg)*) }; }

#[cfg(all(not(feature = "defmt"), not(feature = "log")))]
macro_rules! trace { ($($arg:tt)*) => { { let _ = ::core::format_args!($($arg)*); } }; }
#[cfg(all(not(feature = "defmt"), not(feature = "log")))]
macro_rules! debug { ($($arg:tt)*) => { { let _ = ::core::format_args!($($arg)*); } }; }
#[cfg(all(not(feature = "defmt"), not(feature = "log")))]
macro_rules! info { ($($arg:tt)*) => { { let _ = ::core::format_args!($($arg)*); } }; }
#[cfg(all(not(feature = "defmt"), not(feature = "log")))]
macro_rules! warn { ($($arg:tt)*) => { { let _ = ::core::format_args!($($arg)*); } }; }
#[cfg(all(not(feature = "defmt"), not(feature = "log")))]
macro_rules! error { ($($arg:tt)*) => { { let _ = ::core::format_args!($($arg)*); } }; }
