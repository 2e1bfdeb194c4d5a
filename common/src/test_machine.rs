use crate::{
    bios::{BiosDisk, DiskStatus, PhysicalMemory, ProgressConsole},
    dap::DiskAddressPacket,
};
use kernel_loader_config::SECTOR_SIZE;
use std::{cell::RefCell, collections::BTreeMap, rc::Rc};

/// Physical memory shared between the test disk (which DMAs into it) and the loader.
#[derive(Clone)]
pub struct TestMemory {
    inner: Rc<RefCell<MemoryInner>>,
}

struct MemoryInner {
    bytes: Vec<u8>,
    writes: usize,
}

impl TestMemory {
    pub fn new(len: usize) -> Self {
        Self {
            inner: Rc::new(RefCell::new(MemoryInner {
                bytes: vec![0; len],
                writes: 0,
            })),
        }
    }

    /// Writes without counting as a loader write.
    pub fn write_slice(&self, addr: u32, data: &[u8]) {
        let start = addr as usize;
        self.inner.borrow_mut().bytes[start..][..data.len()].copy_from_slice(data);
    }

    pub fn slice(&self, addr: u32, len: usize) -> Vec<u8> {
        let start = addr as usize;
        self.inner.borrow().bytes[start..][..len].to_vec()
    }

    /// Number of bytes written through [`PhysicalMemory::write_byte`].
    pub fn writes(&self) -> usize {
        self.inner.borrow().writes
    }
}

impl PhysicalMemory for TestMemory {
    fn read_byte(&self, addr: u32) -> u8 {
        self.inner.borrow().bytes[addr as usize]
    }

    fn write_byte(&mut self, addr: u32, value: u8) {
        let mut inner = self.inner.borrow_mut();
        inner.bytes[addr as usize] = value;
        inner.writes += 1;
    }
}

/// A disk backed by an in-memory image with scripted read failures.
pub struct TestDisk {
    image: Vec<u8>,
    memory: TestMemory,
    failures: BTreeMap<u64, u32>,
    /// LBAs of all read attempts, in order.
    pub reads: Vec<u64>,
    pub resets: usize,
}

impl TestDisk {
    pub fn new(image: Vec<u8>, memory: TestMemory) -> Self {
        Self {
            image,
            memory,
            failures: BTreeMap::new(),
            reads: Vec::new(),
            resets: 0,
        }
    }

    /// Lets the next `count` reads of `lba` fail.
    pub fn fail_reads(&mut self, lba: u64, count: u32) {
        self.failures.insert(lba, count);
    }

    /// Lets every read of `lba` fail.
    pub fn fail_always(&mut self, lba: u64) {
        self.fail_reads(lba, u32::MAX);
    }
}

impl BiosDisk for TestDisk {
    fn extended_read(&mut self, drive: u8, dap: &DiskAddressPacket) -> Result<(), DiskStatus> {
        assert_eq!(drive, 0x80);
        assert_eq!(dap.packet_size(), 0x10);
        assert_eq!(dap.reserved(), 0);
        assert_eq!(dap.number_of_sectors(), 1);

        let lba = dap.start_lba();
        self.reads.push(lba);

        if let Some(remaining) = self.failures.get_mut(&lba) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(DiskStatus::TIMEOUT);
            }
        }

        let start = usize::try_from(lba).unwrap() * SECTOR_SIZE as usize;
        let sector = self
            .image
            .get(start..start + SECTOR_SIZE as usize)
            .ok_or(DiskStatus::SECTOR_NOT_FOUND)?;
        self.memory.write_slice(dap.target_addr(), sector);
        Ok(())
    }

    fn reset(&mut self, drive: u8) -> Result<(), DiskStatus> {
        assert_eq!(drive, 0x80);
        self.resets += 1;
        Ok(())
    }
}

#[derive(Default)]
pub struct TestConsole {
    pub glyphs: Vec<(u16, u8)>,
}

impl ProgressConsole for TestConsole {
    fn put_glyph(&mut self, cell: u16, glyph: u8) {
        self.glyphs.push((cell, glyph));
    }
}

/// A disk image whose sector `n` is filled with the byte `n as u8` (plus position noise).
pub fn numbered_image(sectors: u64) -> Vec<u8> {
    let mut image = Vec::new();
    for lba in 0..sectors {
        for i in 0..SECTOR_SIZE {
            image.push((lba as u8).wrapping_mul(31) ^ (i as u8));
        }
    }
    image
}
