#![no_main]
#![no_std]

use panic_probe as _;
use defmt_rtt as _;
use bootcore as lib;

use cortex_m_rt::entry;
use lib::{config, error, halt, image, sync};

mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

/// Leaves a breadcrumb for the debugger before panic-probe stops the core
struct BreakpointOnHalt;

impl halt::HaltHook for BreakpointOnHalt {
    fn on_halt(&self, reason: &halt::HaltReason) {
        defmt::error!("Halt hook: {}", reason);
        if cortex_m::peripheral::DCB::is_debugger_attached() {
            cortex_m::asm::bkpt();
        }
    }
}

static HALT_HOOK: BreakpointOnHalt = BreakpointOnHalt;

#[entry]
fn main() -> ! {
    defmt::info!("bootcore {=str} ({=str})", built_info::PKG_VERSION, built_info::PROFILE);

    if halt::install_hook(&HALT_HOOK).is_err() {
        defmt::warn!("Halt hook already installed");
    }

    // NOTE(safety): both regions are inside memory-mapped internal flash and are not
    // written while the bootloader runs
    let (descriptor_region, app_region) = unsafe {
        (
            core::slice::from_raw_parts(config::DESCRIPTOR_ADDR as *const u8, config::DESCRIPTOR_REGION_SIZE),
            core::slice::from_raw_parts(config::APP_START as *const u8, config::APP_MAX_SIZE),
        )
    };

    let result = image::check(descriptor_region, &mut image::MemoryImage::new(app_region));
    let status = error::into_retval(result.map(|_| ()));
    match result {
        Ok(descriptor) => defmt::info!("Application valid: {}", descriptor),
        Err(e) => defmt::error!("Application invalid: {} (status {=i16})", e, status),
    }

    loop {
        // Wait for the debugger or a reset; keep the sleep entry atomic w.r.t. interrupts
        sync::critical(cortex_m::asm::wfi);
    }
}
