//! Bootloader core primitives
//!
//! - [`crc`]: CRC-64-WE engine used to verify the application image and other
//!   persistent data, with the generic [`checksum`] interface on top
//! - [`sync`]: scoped mutex and critical section guards
//! - [`error`]: error codes and the negated return value convention
//! - [`halt`]: fatal halt path and [`assert_always!`]
//! - [`image`]: application descriptor and image integrity check

#![no_std]

// Use std when running tests, see: https://stackoverflow.com/a/28186509
// Make sure to use different target when testing, e.g.
//   cargo test --target x86_64-unknown-linux-gnu
#[cfg(test)]
#[macro_use]
extern crate std;

pub mod checksum;
pub mod config;
pub mod crc;
pub mod error;
pub mod halt;
pub mod image;
pub mod sync;
