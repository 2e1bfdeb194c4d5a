use crate::{
    bios::{BiosDisk, PhysicalMemory, ProgressConsole},
    dap::{DapError, DiskAddressPacket},
    mem::{copy_mem, min},
    reader::{SectorReadError, SectorReader},
};
use core::fmt;
use kernel_loader_config::{ConfigError, LoaderConfig, SECTOR_SIZE};

/// Glyph written to the first console cell whenever a new batch is started.
pub const BATCH_GLYPH: u8 = b't';

/// Loads the kernel described by `config` from `drive`.
///
/// Convenience wrapper that runs a [`KernelLoader`] to completion.
pub fn load_kernel<D, M, C>(
    drive: u8,
    config: LoaderConfig,
    disk: D,
    memory: M,
    console: C,
) -> Result<LoadSummary, KernelLoadError>
where
    D: BiosDisk,
    M: PhysicalMemory,
    C: ProgressConsole,
{
    KernelLoader::new(config, drive, disk, memory, console).run()
}

/// One chunk of the kernel that passes through the staging buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Batch {
    /// First sector on disk.
    pub start_lba: u64,
    /// Number of sectors, at most `max_batch_size`.
    pub sectors: u16,
    /// Where the batch is copied to.
    pub dest_addr: u32,
}

impl Batch {
    pub fn len_bytes(&self) -> u32 {
        u32::from(self.sectors) * SECTOR_SIZE
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Idle,
    ReadingBatch(Batch),
    CopyingBatch(Batch),
    Done,
    Failed(KernelLoadError),
}

impl LoadState {
    pub fn is_finished(&self) -> bool {
        matches!(self, LoadState::Done | LoadState::Failed(_))
    }
}

/// Statistics of a completed load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadSummary {
    pub sectors: u16,
    pub bytes: u32,
    pub batches: u16,
}

/// Moves the kernel from disk to its destination through the low-memory staging buffer.
pub struct KernelLoader<D, M, C> {
    config: LoaderConfig,
    drive: u8,
    reader: SectorReader<D, C>,
    memory: M,
    state: LoadState,
    /// Sectors already copied to the destination.
    loaded: u16,
    batches: u16,
}

impl<D, M, C> KernelLoader<D, M, C>
where
    D: BiosDisk,
    M: PhysicalMemory,
    C: ProgressConsole,
{
    pub fn new(config: LoaderConfig, drive: u8, disk: D, memory: M, console: C) -> Self {
        Self {
            config,
            drive,
            reader: SectorReader::new(disk, console, config.max_attempts),
            memory,
            state: LoadState::Idle,
            loaded: 0,
            batches: 0,
        }
    }

    pub fn state(&self) -> LoadState {
        self.state
    }

    /// Number of sectors already copied to their destination.
    pub fn loaded(&self) -> u16 {
        self.loaded
    }

    pub fn remaining(&self) -> u16 {
        self.config.kernel_sector_count - self.loaded
    }

    /// Steps until the load is done or failed.
    pub fn run(&mut self) -> Result<LoadSummary, KernelLoadError> {
        loop {
            match self.step() {
                LoadState::Done => return Ok(self.summary()),
                LoadState::Failed(err) => return Err(err),
                _ => {}
            }
        }
    }

    /// Performs a single state transition and returns the new state.
    ///
    /// `Done` and `Failed` are final; stepping them does nothing.
    pub fn step(&mut self) -> LoadState {
        self.state = match self.state {
            LoadState::Idle => self.start(),
            LoadState::ReadingBatch(batch) => match self.read_batch(batch) {
                Ok(()) => LoadState::CopyingBatch(batch),
                Err(err) => LoadState::Failed(err),
            },
            LoadState::CopyingBatch(batch) => {
                self.copy_batch(batch);
                self.next_batch()
            }
            finished @ (LoadState::Done | LoadState::Failed(_)) => finished,
        };
        self.state
    }

    pub fn summary(&self) -> LoadSummary {
        LoadSummary {
            sectors: self.loaded,
            bytes: u32::from(self.loaded) * SECTOR_SIZE,
            batches: self.batches,
        }
    }

    fn start(&mut self) -> LoadState {
        if let Err(err) = self.config.validate() {
            log::error!("invalid loader config: {err}");
            return LoadState::Failed(err.into());
        }

        log::info!(
            "loading {} kernel sectors from drive {:#x} to {:#x}",
            self.config.kernel_sector_count,
            self.drive,
            self.config.kernel_dest_addr
        );
        self.next_batch()
    }

    fn next_batch(&mut self) -> LoadState {
        let remaining = self.remaining();
        if remaining == 0 {
            log::info!(
                "kernel loaded: {} sectors in {} batches",
                self.loaded,
                self.batches
            );
            return LoadState::Done;
        }

        LoadState::ReadingBatch(Batch {
            start_lba: self.config.kernel_start_lba + u64::from(self.loaded),
            sectors: min(self.config.max_batch_size, remaining),
            dest_addr: self.config.kernel_dest_addr + u32::from(self.loaded) * SECTOR_SIZE,
        })
    }

    fn read_batch(&mut self, batch: Batch) -> Result<(), KernelLoadError> {
        log::debug!(
            "reading {} sectors from lba {} for {:#x}",
            batch.sectors,
            batch.start_lba,
            batch.dest_addr
        );
        self.reader.console().put_glyph(0, BATCH_GLYPH);

        let staging =
            DiskAddressPacket::from_addr(batch.start_lba, self.config.staging_buffer_addr)?;
        self.reader.read_sectors(
            batch.sectors,
            staging.segment(),
            staging.offset(),
            staging.start_lba(),
            self.drive,
        )?;
        Ok(())
    }

    fn copy_batch(&mut self, batch: Batch) {
        copy_mem(
            &mut self.memory,
            self.config.staging_buffer_addr,
            batch.dest_addr,
            batch.len_bytes(),
        );
        self.loaded += batch.sectors;
        self.batches += 1;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelLoadError {
    SectorRead(SectorReadError),
    InvalidConfig(ConfigError),
    StagingBuffer(DapError),
}

impl KernelLoadError {
    /// Error code passed to the second stage's `fail` routine.
    pub fn fail_code(&self) -> u8 {
        match self {
            KernelLoadError::SectorRead(err) => err.fail_code(),
            KernelLoadError::InvalidConfig(_) => b'c',
            KernelLoadError::StagingBuffer(err) => err.fail_code(),
        }
    }
}

impl From<SectorReadError> for KernelLoadError {
    fn from(err: SectorReadError) -> Self {
        KernelLoadError::SectorRead(err)
    }
}

impl From<ConfigError> for KernelLoadError {
    fn from(err: ConfigError) -> Self {
        KernelLoadError::InvalidConfig(err)
    }
}

impl From<DapError> for KernelLoadError {
    fn from(err: DapError) -> Self {
        KernelLoadError::StagingBuffer(err)
    }
}

impl fmt::Display for KernelLoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KernelLoadError::SectorRead(err) => write!(f, "kernel load failed: {err}"),
            KernelLoadError::InvalidConfig(err) => write!(f, "invalid loader config: {err}"),
            KernelLoadError::StagingBuffer(err) => write!(f, "invalid staging buffer: {err}"),
        }
    }
}
