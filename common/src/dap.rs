use core::{fmt, mem::size_of};
use kernel_loader_config::{REAL_MODE_LIMIT, SECTOR_SIZE};

/// Number of 16-byte paragraphs in one sector, i.e. the segment increment per sector.
pub const PARAGRAPHS_PER_SECTOR: u16 = (SECTOR_SIZE / 16) as u16;

/// Parameter block of the BIOS extended read service (`int 0x13`, `ah = 0x42`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C, packed)]
pub struct DiskAddressPacket {
    /// Size of the DAP structure
    packet_size: u8,
    /// always zero
    zero: u8,
    /// Number of sectors to transfer
    number_of_sectors: u16,
    /// Offset to memory buffer
    offset: u16,
    /// Segment of memory buffer
    segment: u16,
    /// Start logical block address
    start_lba: u64,
}

const _: () = assert!(size_of::<DiskAddressPacket>() == 0x10);

impl DiskAddressPacket {
    /// Creates a packet that reads a single sector to `target_segment:target_offset`.
    ///
    /// Reads are always one sector long so that no transfer crosses a 64KiB DMA boundary.
    pub fn from_lba(start_lba: u64, target_offset: u16, target_segment: u16) -> Self {
        Self {
            packet_size: size_of::<Self>() as u8,
            zero: 0,
            number_of_sectors: 1,
            offset: target_offset,
            segment: target_segment,
            start_lba,
        }
    }

    /// Creates a packet for the linear real-mode address `target_addr`.
    pub fn from_addr(start_lba: u64, target_addr: u32) -> Result<Self, DapError> {
        if target_addr >= REAL_MODE_LIMIT {
            return Err(DapError::AddressOutOfRange(target_addr));
        }
        let segment = (target_addr >> 4) as u16;
        let offset = (target_addr & 0b1111) as u16;
        Ok(Self::from_lba(start_lba, offset, segment))
    }

    /// Moves the packet to the next sector, one sector further in memory.
    ///
    /// Fails without modifying the packet if the next target segment does not
    /// fit into 16 bits.
    pub fn advance(&mut self) -> Result<(), DapError> {
        // fields are packed, so read them by value instead of using `+=`
        let (start_lba, segment) = (self.start_lba, self.segment);
        self.segment = segment
            .checked_add(PARAGRAPHS_PER_SECTOR)
            .ok_or(DapError::SegmentOverflow(segment))?;
        self.start_lba = start_lba + 1;
        Ok(())
    }

    pub fn packet_size(&self) -> u8 {
        self.packet_size
    }

    pub fn reserved(&self) -> u8 {
        self.zero
    }

    pub fn number_of_sectors(&self) -> u16 {
        self.number_of_sectors
    }

    pub fn offset(&self) -> u16 {
        self.offset
    }

    pub fn segment(&self) -> u16 {
        self.segment
    }

    pub fn start_lba(&self) -> u64 {
        self.start_lba
    }

    /// The physical address `segment * 16 + offset` the next sector is read to.
    pub fn target_addr(&self) -> u32 {
        (u32::from(self.segment) << 4) + u32::from(self.offset)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DapError {
    /// The address cannot be expressed as `segment:offset`.
    AddressOutOfRange(u32),
    /// Advancing from this segment would wrap around to address zero.
    SegmentOverflow(u16),
}

impl DapError {
    pub fn fail_code(&self) -> u8 {
        b'a'
    }
}

impl fmt::Display for DapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DapError::AddressOutOfRange(addr) => {
                write!(f, "address {addr:#x} is not reachable in real mode")
            }
            DapError::SegmentOverflow(segment) => {
                write!(f, "segment {segment:#x} cannot be advanced by a sector")
            }
        }
    }
}
