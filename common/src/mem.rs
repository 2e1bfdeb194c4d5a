use crate::bios::PhysicalMemory;

/// Copies `length` bytes from physical address `src` to `dst`, one byte at a time.
///
/// Bytes are copied in ascending order. The regions must not overlap.
pub fn copy_mem<M: PhysicalMemory + ?Sized>(memory: &mut M, src: u32, dst: u32, length: u32) {
    for i in 0..length {
        let byte = memory.read_byte(src + i);
        memory.write_byte(dst + i, byte);
    }
}

/// Returns the smaller of two sector counts.
pub fn min(a: u16, b: u16) -> u16 {
    if a < b {
        a
    } else {
        b
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_machine::TestMemory;

    #[test]
    fn copy_preserves_content_and_order() {
        let mut memory = TestMemory::new(0x2000);
        let data: Vec<u8> = (0..0x400).map(|_| rand::random()).collect();
        memory.write_slice(0x100, &data);

        copy_mem(&mut memory, 0x100, 0x1000, data.len() as u32);

        assert_eq!(memory.slice(0x1000, data.len()), &data[..]);
        // source untouched
        assert_eq!(memory.slice(0x100, data.len()), &data[..]);
        // nothing written past the end
        assert_eq!(memory.slice(0x1000 + data.len() as u32, 1), &[0]);
    }

    #[test]
    fn zero_length_copy_is_noop() {
        let mut memory = TestMemory::new(0x100);
        memory.write_slice(0, &[1, 2, 3]);
        copy_mem(&mut memory, 0, 0x10, 0);
        assert_eq!(memory.slice(0x10, 3), &[0, 0, 0]);
        assert_eq!(memory.writes(), 0);
    }

    #[test]
    fn min_returns_smaller() {
        assert_eq!(min(4, 10), 4);
        assert_eq!(min(10, 4), 4);
        assert_eq!(min(2, 2), 2);
        assert_eq!(min(0, u16::MAX), 0);
    }
}
