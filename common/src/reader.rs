use crate::{
    bios::{BiosDisk, DiskStatus, ProgressConsole},
    dap::{DiskAddressPacket, PARAGRAPHS_PER_SECTOR},
};
use core::fmt;

/// Glyph written to the console for every sector that is read.
pub const SECTOR_GLYPH: u8 = b'.';

/// Reads sectors one at a time through the BIOS, resetting the disk after failed attempts.
pub struct SectorReader<D, C> {
    disk: D,
    console: C,
    max_attempts: u8,
}

impl<D: BiosDisk, C: ProgressConsole> SectorReader<D, C> {
    pub fn new(disk: D, console: C, max_attempts: u8) -> Self {
        Self {
            disk,
            console,
            max_attempts,
        }
    }

    /// Reads `count` sectors starting at `start_sector` to `buffer_segment:buffer_offset`.
    ///
    /// Every sector is read with its own single-sector request. On success, the
    /// returned packet points behind the last sector read, both on disk and in
    /// memory.
    ///
    /// Fails before any BIOS call if the buffer segment would wrap around while
    /// advancing over `count` sectors.
    pub fn read_sectors(
        &mut self,
        count: u16,
        buffer_segment: u16,
        buffer_offset: u16,
        start_sector: u64,
        drive: u8,
    ) -> Result<DiskAddressPacket, SectorReadError> {
        let end_segment = u32::from(buffer_segment)
            + u32::from(count) * u32::from(PARAGRAPHS_PER_SECTOR);
        if end_segment > u32::from(u16::MAX) {
            log::error!("buffer at segment {buffer_segment:#x} cannot hold {count} sectors");
            return Err(SectorReadError {
                lba: start_sector,
                attempts: 0,
                status: DiskStatus::DMA_BOUNDARY,
            });
        }

        let mut dap = DiskAddressPacket::from_lba(start_sector, buffer_offset, buffer_segment);

        for i in 0..count {
            self.console.put_glyph(i, SECTOR_GLYPH);
            self.read_sector(&dap, drive)?;
            let next_lba = dap.start_lba() + 1;
            dap.advance().map_err(|err| {
                log::error!("{err}");
                SectorReadError {
                    lba: next_lba,
                    attempts: 0,
                    status: DiskStatus::DMA_BOUNDARY,
                }
            })?;
        }

        Ok(dap)
    }

    fn read_sector(&mut self, dap: &DiskAddressPacket, drive: u8) -> Result<(), SectorReadError> {
        let lba = dap.start_lba();
        let mut status = DiskStatus(0);

        for attempt in 1..=self.max_attempts {
            match self.disk.extended_read(drive, dap) {
                Ok(()) => {
                    log::trace!("read sector {lba} to {:#x}", dap.target_addr());
                    return Ok(());
                }
                Err(err) => {
                    status = err;
                    log::warn!("reading sector {lba} failed: {err} (attempt {attempt})");
                }
            }
            // a failed final attempt is not followed by a reset
            if attempt < self.max_attempts {
                if let Err(err) = self.disk.reset(drive) {
                    log::warn!("disk reset failed: {err}");
                }
            }
        }

        log::error!("giving up on sector {lba} after {} attempts", self.max_attempts);
        Err(SectorReadError {
            lba,
            attempts: self.max_attempts,
            status,
        })
    }

    pub fn disk(&mut self) -> &mut D {
        &mut self.disk
    }

    pub fn console(&mut self) -> &mut C {
        &mut self.console
    }
}

/// A sector could not be read within the attempt budget.
///
/// `attempts` is zero if the target buffer was rejected before reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectorReadError {
    pub lba: u64,
    pub attempts: u8,
    /// Status of the last failed attempt.
    pub status: DiskStatus,
}

impl SectorReadError {
    pub fn fail_code(&self) -> u8 {
        b'r'
    }
}

impl fmt::Display for SectorReadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "failed to read sector {} after {} attempts: {}",
            self.lba, self.attempts, self.status
        )
    }
}
