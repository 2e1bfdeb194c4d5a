#![no_std]
#![no_main]
#![deny(unsafe_op_in_unsafe_fn)]

use crate::{
    disk::Int13Disk,
    fail::{fail, halt, UnwrapOrFail},
    teletype::Teletype,
    unreal_mode::{enter_unreal_mode, UnrealMemory},
    vga::VgaProgress,
};
use core::fmt::Write as _;
use kernel_loader_common::{loader, KernelLoadError, LoadSummary, LoaderConfig};

mod disk;
mod fail;
mod logger;
mod teletype;
mod unreal_mode;
mod vga;

// The values of these symbols are their addresses. They are defined at link
// time, e.g. through the `--defsym` arguments generated by the disk image builder.
extern "C" {
    static _kernel_dest_addr: u8;
    static _kernel_sector_count: u8;
    static _max_batch_size: u8;
    static _kernel_start_lba: u8;
}

fn symbol_value(symbol: &u8) -> u32 {
    symbol as *const u8 as usize as u32
}

fn loader_config() -> LoaderConfig {
    let (dest_addr, sector_count, max_batch_size, start_lba) = unsafe {
        (
            symbol_value(&_kernel_dest_addr),
            symbol_value(&_kernel_sector_count),
            symbol_value(&_max_batch_size),
            symbol_value(&_kernel_start_lba),
        )
    };

    let mut config = LoaderConfig::new(u16::try_from(sector_count).unwrap_or_fail(b'k'));
    config.kernel_dest_addr = dest_addr;
    config.max_batch_size = u16::try_from(max_batch_size).unwrap_or_fail(b'm');
    config.kernel_start_lba = start_lba.into();
    config
}

#[no_mangle]
#[link_section = ".start"]
pub extern "C" fn _start(disk_number: u16) -> ! {
    start(disk_number)
}

fn start(disk_number: u16) -> ! {
    let _ = Teletype.write_str(" -> SECOND STAGE\n");

    enter_unreal_mode();

    let config = loader_config();
    logger::init(config.log_level);

    // the BIOS passes the boot drive in `dl`
    let drive = (disk_number & 0xff) as u8;
    match run(drive, config) {
        Ok(summary) => {
            let _ = writeln!(
                Teletype,
                "kernel loaded at {:#x} ({} bytes)",
                config.kernel_dest_addr,
                summary.bytes
            );
            // entering the kernel is the job of the next stage
            halt()
        }
        Err(err) => {
            log::error!("{err}");
            fail(err.fail_code())
        }
    }
}

/// Loads the kernel described by the linker-provided configuration from `drive_number`.
///
/// Entry point for callers written in assembly: must be called in real mode with
/// `ds = ss = 0`. Returns whether the whole kernel was loaded.
#[no_mangle]
pub extern "C" fn load_kernel(drive_number: u8) -> bool {
    enter_unreal_mode();
    run(drive_number, loader_config()).is_ok()
}

fn run(drive: u8, config: LoaderConfig) -> Result<LoadSummary, KernelLoadError> {
    // SAFETY: unreal mode is active and the loader is the only user of the
    // staging buffer, the kernel destination and the VGA text buffer
    let (memory, console) = unsafe { (UnrealMemory::new(), UnrealMemory::new()) };
    loader::load_kernel(drive, config, Int13Disk, memory, VgaProgress::new(console))
}
