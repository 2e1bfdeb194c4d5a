use crate::unreal_mode::UnrealMemory;
use kernel_loader_common::bios::{PhysicalMemory, ProgressConsole};

const VGA_BUFFER: u32 = 0xb8000;

/// Writes progress glyphs straight into the VGA text buffer, leaving the attribute bytes alone.
pub struct VgaProgress {
    memory: UnrealMemory,
}

impl VgaProgress {
    pub fn new(memory: UnrealMemory) -> Self {
        Self { memory }
    }
}

impl ProgressConsole for VgaProgress {
    fn put_glyph(&mut self, cell: u16, glyph: u8) {
        self.memory
            .write_byte(VGA_BUFFER + 2 * u32::from(cell), glyph);
    }
}
