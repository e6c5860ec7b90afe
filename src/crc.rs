//! CRC-64-WE
//!
//! Used to verify integrity of the application image and other persistent data.
//! Parameters (see the CRC catalogue, "CRC-64/WE"):
//!
//! | width | poly                 | init                 | refin | refout | xorout               | check                |
//! |-------|----------------------|----------------------|-------|--------|----------------------|----------------------|
//! | 64    | `0x42F0E1EBA9EA3693` | `0xFFFFFFFFFFFFFFFF` | false | false  | `0xFFFFFFFFFFFFFFFF` | `0x62EC59E3F1A4F00A` |
//!
//! Stored checksums depend on these values, they must never change.

use crate::checksum::ChecksumGen;

pub const POLY: u64 = 0x42F0_E1EB_A9EA_3693;
pub const INIT: u64 = 0xFFFF_FFFF_FFFF_FFFF;
pub const XOR_OUT: u64 = 0xFFFF_FFFF_FFFF_FFFF;
/// Checksum of ASCII `"123456789"`
pub const CHECK: u64 = 0x62EC_59E3_F1A4_F00A;

const TOP_BIT: u64 = 1 << 63;

/// Incremental CRC-64-WE calculator
///
/// Data can be fed byte by byte or in slices of any size, the result only
/// depends on the sequence of bytes. [`Crc64We::get`] does not modify the
/// state so it can be used to read intermediate results.
#[derive(Clone, Debug)]
pub struct Crc64We {
    crc: u64,
}

impl Crc64We {
    pub const fn new() -> Self {
        Self { crc: INIT }
    }

    /// Feed a single byte, MSB first
    #[inline]
    pub fn add(&mut self, byte: u8) {
        self.crc ^= (byte as u64) << 56;
        for _ in 0..8 {
            self.crc = if self.crc & TOP_BIT != 0 {
                (self.crc << 1) ^ POLY
            } else {
                self.crc << 1
            };
        }
    }

    /// Feed all bytes from the slice in order
    pub fn add_bytes(&mut self, data: &[u8]) {
        for &byte in data {
            self.add(byte);
        }
    }

    /// Feed `len` bytes starting at `data`
    ///
    /// With `len == 0` the pointer is never dereferenced, so it may be null or
    /// dangling. A null pointer with non-zero length halts the system.
    ///
    /// # Safety
    ///
    /// When `len > 0`, `data` must point to `len` bytes readable for the duration
    /// of the call.
    pub unsafe fn add_raw(&mut self, data: *const u8, len: usize) {
        if len == 0 {
            return;
        }
        crate::assert_always!(!data.is_null());
        self.add_bytes(core::slice::from_raw_parts(data, len));
    }

    /// Checksum of all the data fed so far
    #[inline]
    pub const fn get(&self) -> u64 {
        self.crc ^ XOR_OUT
    }
}

impl Default for Crc64We {
    fn default() -> Self {
        Self::new()
    }
}

impl ChecksumGen for Crc64We {
    type Output = u64;

    fn reset(&mut self) {
        self.crc = INIT;
    }

    fn push(&mut self, data: &[u8]) {
        self.add_bytes(data);
    }

    fn get(&self) -> Self::Output {
        Crc64We::get(self)
    }
}
