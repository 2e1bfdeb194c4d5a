use crate::fail::fail;
use core::{arch::asm, fmt};

/// Prints a byte at the cursor through `int 0x10`, `ah = 0x0e`.
pub fn print_byte(byte: u8) {
    let ax = u16::from(byte) | 0x0e00;
    unsafe {
        asm!("push bx", "mov bx, 0", "int 0x10", "pop bx", in("ax") ax);
    }
}

/// `fmt::Write` adapter for the BIOS teletype service.
///
/// Translates `\n` to `\r\n`; non-ASCII characters are printed as `?`.
pub struct Teletype;

impl fmt::Write for Teletype {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for c in s.chars() {
            match c {
                '\n' => {
                    print_byte(b'\r');
                    print_byte(b'\n');
                }
                c if c.is_ascii() => print_byte(c as u8),
                _ => print_byte(b'?'),
            }
        }
        Ok(())
    }
}

#[cfg(all(not(test), target_os = "none"))]
#[panic_handler]
pub fn panic(info: &core::panic::PanicInfo) -> ! {
    use core::fmt::Write;

    let _ = writeln!(Teletype, "\nPANIC: {info}");
    fail(b'P')
}
