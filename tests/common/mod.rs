#![allow(dead_code)]

use kernel_loader_common::{
    bios::{BiosDisk, DiskStatus, PhysicalMemory, ProgressConsole},
    dap::DiskAddressPacket,
};
use std::{
    cell::RefCell,
    fs::{self, File},
    io::{Read, Seek, SeekFrom},
    path::{Path, PathBuf},
    rc::Rc,
};

pub const DRIVE: u8 = 0x80;

/// Input binaries for the disk image builder.
pub struct Inputs {
    pub boot_sector: PathBuf,
    pub stage_2: PathBuf,
    pub kernel: PathBuf,
}

pub fn write_inputs(dir: &Path, stage_2_len: usize, kernel: &[u8]) -> Inputs {
    let mut boot_sector = vec![0xb0; 512];
    boot_sector[510] = 0x55;
    boot_sector[511] = 0xaa;

    let inputs = Inputs {
        boot_sector: dir.join("boot-sector.bin"),
        stage_2: dir.join("stage-2.bin"),
        kernel: dir.join("kernel.bin"),
    };
    fs::write(&inputs.boot_sector, boot_sector).unwrap();
    fs::write(&inputs.stage_2, vec![0x52; stage_2_len]).unwrap();
    fs::write(&inputs.kernel, kernel).unwrap();
    inputs
}

pub fn random_kernel(len: usize) -> Vec<u8> {
    (0..len).map(|_| rand::random()).collect()
}

/// Physical memory shared between the disk and the loader.
#[derive(Clone)]
pub struct SharedMemory(Rc<RefCell<Vec<u8>>>);

impl SharedMemory {
    pub fn new(len: usize) -> Self {
        Self(Rc::new(RefCell::new(vec![0; len])))
    }

    pub fn slice(&self, addr: u32, len: usize) -> Vec<u8> {
        self.0.borrow()[addr as usize..][..len].to_vec()
    }
}

impl PhysicalMemory for SharedMemory {
    fn read_byte(&self, addr: u32) -> u8 {
        self.0.borrow()[addr as usize]
    }

    fn write_byte(&mut self, addr: u32, value: u8) {
        self.0.borrow_mut()[addr as usize] = value;
    }
}

/// Serves extended reads from a disk image file.
pub struct ImageDisk {
    image: File,
    memory: SharedMemory,
    pub fail_lba: Option<u64>,
    pub reads: Vec<u64>,
}

impl ImageDisk {
    pub fn open(path: &Path, memory: SharedMemory) -> Self {
        Self {
            image: File::open(path).unwrap(),
            memory,
            fail_lba: None,
            reads: Vec::new(),
        }
    }
}

impl BiosDisk for ImageDisk {
    fn extended_read(&mut self, _drive: u8, dap: &DiskAddressPacket) -> Result<(), DiskStatus> {
        let lba = dap.start_lba();
        self.reads.push(lba);
        if self.fail_lba == Some(lba) {
            return Err(DiskStatus::TIMEOUT);
        }

        let mut sector = [0; 512];
        self.image.seek(SeekFrom::Start(lba * 512)).unwrap();
        self.image
            .read_exact(&mut sector)
            .map_err(|_| DiskStatus::SECTOR_NOT_FOUND)?;

        let target = dap.target_addr();
        for (i, byte) in sector.iter().enumerate() {
            self.memory.write_byte(target + i as u32, *byte);
        }
        Ok(())
    }

    fn reset(&mut self, _drive: u8) -> Result<(), DiskStatus> {
        Ok(())
    }
}

pub struct NullConsole;

impl ProgressConsole for NullConsole {
    fn put_glyph(&mut self, _cell: u16, _glyph: u8) {}
}
