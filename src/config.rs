//! Flash layout and tuning constants
//!
//! All values are fixed at compile time. The layout targets STM32F072 with
//! 128 kB of flash in 2 kB pages:
//!
//! ```text
//! 0x0800_0000 ┌──────────────────────┐
//!             │ bootloader (16 kB)   │
//! 0x0800_4000 ├──────────────────────┤
//!             │ app descriptor page  │
//! 0x0800_4800 ├──────────────────────┤
//!             │ application image    │
//! 0x0802_0000 └──────────────────────┘
//! ```

use static_assertions as sa;

pub const FLASH_START: u32 = 0x0800_0000;
pub const FLASH_SIZE: u32 = 128 * 1024;
pub const FLASH_END: u32 = FLASH_START + FLASH_SIZE;
pub const FLASH_PAGE_SIZE: u32 = 2 * 1024;

/// Must match FLASH length in memory.x
pub const BOOTLOADER_SIZE: u32 = 16 * 1024;

/// Descriptor gets a page of its own so that it can be erased independently
pub const DESCRIPTOR_ADDR: u32 = FLASH_START + BOOTLOADER_SIZE;
pub const DESCRIPTOR_REGION_SIZE: usize = 64;

pub const APP_START: u32 = DESCRIPTOR_ADDR + FLASH_PAGE_SIZE;
pub const APP_MAX_SIZE: usize = (FLASH_END - APP_START) as usize;

/// Number of bytes read from image storage at once during verification.
/// Bounds stack usage of the check.
pub const VERIFY_CHUNK_SIZE: usize = 256;

sa::const_assert_eq!(BOOTLOADER_SIZE % FLASH_PAGE_SIZE, 0);
sa::const_assert!(DESCRIPTOR_REGION_SIZE as u32 <= FLASH_PAGE_SIZE);
sa::const_assert!(APP_START < FLASH_END);
sa::const_assert!(VERIFY_CHUNK_SIZE > 0);
