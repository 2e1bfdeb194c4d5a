use core::{arch::asm, mem::size_of};
use kernel_loader_common::bios::PhysicalMemory;

/// Null descriptor followed by a flat 4GiB read/write data segment.
static GDT: [u64; 2] = [0, flat_data_segment()];

/// Selector of the data segment in [`GDT`].
const DATA_SELECTOR: u16 = 0x08;

const fn flat_data_segment() -> u64 {
    let limit = 0xf << 48 | 0xffff;
    let present = 1 << 47;
    let data_segment = 1 << 44;
    let writable = 1 << 41;
    let big = 1 << 54;
    let page_granular = 1 << 55;
    limit | present | data_segment | writable | big | page_granular
}

#[repr(C, packed(2))]
struct GdtPointer {
    limit: u16,
    base: *const [u64; 2],
}

fn load_gdt() {
    let pointer = GdtPointer {
        limit: (size_of::<[u64; 2]>() - 1) as u16,
        base: &GDT,
    };
    unsafe {
        asm!("cli", "lgdt [{}]", in(reg) &pointer, options(readonly, nostack, preserves_flags));
    }
}

/// Loads a 4GiB data segment limit into `ds` and returns to real mode.
///
/// Afterwards, 32-bit offsets relative to `ds` reach all of physical memory while
/// BIOS calls keep working.
pub fn enter_unreal_mode() {
    let ds: u16;
    unsafe {
        asm!("mov {0:x}, ds", out(reg) ds, options(nomem, nostack, preserves_flags));
    }

    load_gdt();

    // the descriptor limit is cached in `ds` until it is reloaded in protected mode
    let cr0 = read_cr0();
    write_cr0(cr0 | 1);
    unsafe {
        asm!("mov ds, {0:x}", in(reg) DATA_SELECTOR, options(nostack, preserves_flags));
    }
    write_cr0(cr0);

    unsafe {
        asm!("mov ds, {0:x}", in(reg) ds, options(nostack, preserves_flags));
        asm!("sti");
    }
}

fn read_cr0() -> u32 {
    let cr0: u32;
    unsafe {
        asm!("mov {:e}, cr0", out(reg) cr0, options(nomem, nostack, preserves_flags));
    }
    cr0
}

fn write_cr0(val: u32) {
    unsafe { asm!("mov cr0, {:e}", in(reg) val, options(nostack, preserves_flags)) };
}

/// Physical memory accessed through 32-bit offsets in unreal mode.
///
/// Only valid after [`enter_unreal_mode`].
pub struct UnrealMemory(());

impl UnrealMemory {
    /// # Safety
    ///
    /// Unreal mode must be active and the caller must own every address it
    /// accesses through the returned value.
    pub unsafe fn new() -> Self {
        Self(())
    }
}

impl PhysicalMemory for UnrealMemory {
    fn read_byte(&self, addr: u32) -> u8 {
        let res;
        // we need to do the read in inline assembly because the compiler
        // seems to truncate the address
        unsafe {
            asm!("mov {}, [{:e}]", out(reg_byte) res, in(reg) addr, options(readonly, nostack, preserves_flags))
        };
        res
    }

    fn write_byte(&mut self, addr: u32, value: u8) {
        unsafe {
            asm!("mov [{:e}], {}", in(reg) addr, in(reg_byte) value, options(nostack, preserves_flags))
        };
    }
}
