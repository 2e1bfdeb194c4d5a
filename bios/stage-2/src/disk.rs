use core::arch::asm;
use kernel_loader_common::{
    bios::{BiosDisk, DiskStatus},
    dap::DiskAddressPacket,
};

/// The BIOS disk services behind `int 0x13`.
///
/// Assumes `ds` and `ss` are zero so that the stack address of a packet is a
/// valid `ds:si` pointer.
pub struct Int13Disk;

impl BiosDisk for Int13Disk {
    fn extended_read(&mut self, drive: u8, dap: &DiskAddressPacket) -> Result<(), DiskStatus> {
        let dap_addr = dap as *const DiskAddressPacket as u16;
        let ax: u16;
        let failed: u8;
        unsafe {
            asm!(
                "mov {backup:x}, si", // backup the `si` register, whose contents are required by LLVM
                "mov si, {dap:x}",
                "int 0x13",
                "setc {failed}", // carry is set on fail
                "mov si, {backup:x}", // restore the `si` register to its prior state
                dap = in(reg) dap_addr,
                backup = out(reg) _,
                failed = out(reg_byte) failed,
                inout("ax") 0x4200u16 => ax,
                in("dx") u16::from(drive),
            );
        }
        status(failed, ax)
    }

    fn reset(&mut self, drive: u8) -> Result<(), DiskStatus> {
        let ax: u16;
        let failed: u8;
        unsafe {
            asm!(
                "int 0x13",
                "setc {failed}",
                failed = out(reg_byte) failed,
                inout("ax") 0x0000u16 => ax,
                in("dx") u16::from(drive),
            );
        }
        status(failed, ax)
    }
}

fn status(failed: u8, ax: u16) -> Result<(), DiskStatus> {
    match failed {
        0 => Ok(()),
        _ => Err(DiskStatus((ax >> 8) as u8)),
    }
}
