//! The services the loader needs from the machine it runs on.
//!
//! The second stage implements these traits with BIOS calls and direct memory
//! access; the tests implement them with an in-memory disk.

use crate::dap::DiskAddressPacket;
use core::fmt;

/// Disk services of `int 0x13`.
pub trait BiosDisk {
    /// Extended read (`ah = 0x42`) of the sectors described by `dap`.
    ///
    /// Returns the status byte from `ah` if the BIOS set the carry flag.
    fn extended_read(&mut self, drive: u8, dap: &DiskAddressPacket) -> Result<(), DiskStatus>;

    /// Resets the disk system (`ah = 0x00`).
    fn reset(&mut self, drive: u8) -> Result<(), DiskStatus>;
}

/// Byte-granular access to physical memory.
pub trait PhysicalMemory {
    fn read_byte(&self, addr: u32) -> u8;
    fn write_byte(&mut self, addr: u32, value: u8);
}

/// Single-glyph progress output.
///
/// Cell `n` corresponds to byte `2 * n` of the VGA text buffer.
pub trait ProgressConsole {
    fn put_glyph(&mut self, cell: u16, glyph: u8);
}

/// Status code returned by the BIOS disk services in `ah`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskStatus(pub u8);

impl DiskStatus {
    pub const INVALID_COMMAND: DiskStatus = DiskStatus(0x01);
    pub const SECTOR_NOT_FOUND: DiskStatus = DiskStatus(0x04);
    pub const DMA_BOUNDARY: DiskStatus = DiskStatus(0x09);
    pub const TIMEOUT: DiskStatus = DiskStatus(0x80);
}

impl fmt::Display for DiskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let description = match *self {
            DiskStatus::INVALID_COMMAND => "invalid command",
            DiskStatus::SECTOR_NOT_FOUND => "sector not found",
            DiskStatus::DMA_BOUNDARY => "DMA crossed 64KiB boundary",
            DiskStatus::TIMEOUT => "drive timed out",
            _ => "disk error",
        };
        write!(f, "{description} ({:#04x})", self.0)
    }
}

impl<T: BiosDisk + ?Sized> BiosDisk for &mut T {
    fn extended_read(&mut self, drive: u8, dap: &DiskAddressPacket) -> Result<(), DiskStatus> {
        (**self).extended_read(drive, dap)
    }

    fn reset(&mut self, drive: u8) -> Result<(), DiskStatus> {
        (**self).reset(drive)
    }
}

impl<T: PhysicalMemory + ?Sized> PhysicalMemory for &mut T {
    fn read_byte(&self, addr: u32) -> u8 {
        (**self).read_byte(addr)
    }

    fn write_byte(&mut self, addr: u32, value: u8) {
        (**self).write_byte(addr, value)
    }
}

impl<T: ProgressConsole + ?Sized> ProgressConsole for &mut T {
    fn put_glyph(&mut self, cell: u16, glyph: u8) {
        (**self).put_glyph(cell, glyph)
    }
}
