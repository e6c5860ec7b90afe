//! Fatal system halt
//!
//! Violated preconditions are not reported as error codes: continuing to run a
//! bootloader after memory-safety assumptions broke is worse than stopping.
//! [`halt`] logs the reason, notifies the [`HaltHook`] installed during
//! initialization and panics. On target the panic handler stops the MCU.

use core::cell::Cell;
use core::fmt;

use critical_section::Mutex;

use crate::error::{ErrorCode, Result};

/// Application callback invoked right before the system halts
///
/// Runs in whatever context the failure happened in, possibly an interrupt
/// handler, so it must not block.
pub trait HaltHook: Sync {
    fn on_halt(&self, reason: &HaltReason);
}

static HOOK: Mutex<Cell<Option<&'static dyn HaltHook>>> = Mutex::new(Cell::new(None));

/// Install the halt hook
///
/// Can be done only once. Any later call fails with [`ErrorCode::InvalidState`]
/// and leaves the first hook in place.
pub fn install_hook(hook: &'static dyn HaltHook) -> Result {
    critical_section::with(|cs| {
        let slot = HOOK.borrow(cs);
        if slot.get().is_some() {
            return Err(ErrorCode::InvalidState);
        }
        slot.set(Some(hook));
        Ok(())
    })
}

/// Why the system is being halted
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HaltReason {
    file: Option<&'static str>,
    line: Option<u32>,
    message: &'static str,
}

impl HaltReason {
    /// Failed assertion; file name is only kept in debug builds to save flash
    pub const fn assertion(file: &'static str, line: u32, condition: &'static str) -> Self {
        let file = if cfg!(debug_assertions) { Some(file) } else { None };
        Self { file, line: Some(line), message: condition }
    }

    /// Halt with a plain message
    pub const fn message(message: &'static str) -> Self {
        Self { file: None, line: None, message }
    }

    pub fn file(&self) -> Option<&'static str> {
        self.file
    }

    pub fn line(&self) -> Option<u32> {
        self.line
    }

    /// Failing condition or message
    pub fn as_str(&self) -> &'static str {
        self.message
    }
}

impl fmt::Display for HaltReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(file) = self.file {
            write!(f, "{}:", file)?;
        }
        if let Some(line) = self.line {
            write!(f, "{}:", line)?;
        }
        f.write_str(self.message)
    }
}

impl defmt::Format for HaltReason {
    fn format(&self, f: defmt::Formatter) {
        match (self.file, self.line) {
            (Some(file), Some(line)) => defmt::write!(f, "{=str}:{=u32}:{=str}", file, line, self.message),
            (None, Some(line)) => defmt::write!(f, "{=u32}:{=str}", line, self.message),
            _ => defmt::write!(f, "{=str}", self.message),
        }
    }
}

/// Stop the system
pub fn halt(reason: &HaltReason) -> ! {
    defmt::error!("HALT {}", reason);
    if let Some(hook) = critical_section::with(|cs| HOOK.borrow(cs).get()) {
        hook.on_halt(reason);
    }
    panic!("{}", reason)
}

/// Assertion that is checked in all build profiles and halts the system on failure
#[macro_export]
macro_rules! assert_always {
    ($cond:expr) => {
        if !($cond) {
            $crate::halt::halt(&$crate::halt::HaltReason::assertion(
                file!(),
                line!(),
                stringify!($cond),
            ))
        }
    };
}
