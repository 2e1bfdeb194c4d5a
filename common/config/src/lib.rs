#![no_std]

use core::fmt;
use serde::{Deserialize, Serialize};

/// Size of a disk sector in bytes.
pub const SECTOR_SIZE: u32 = 512;

/// Highest physical address (exclusive) reachable with real-mode `segment:offset` addressing.
pub const REAL_MODE_LIMIT: u32 = 0x10_0000;

/// Configures where the kernel lives on disk and where it is loaded to.
///
/// The second stage receives these values from linker-provided symbols. The
/// disk image builder derives them from the kernel it places on the image.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
#[non_exhaustive]
pub struct LoaderConfig {
    /// Physical address the kernel is copied to.
    ///
    /// The default is `0x10_0000` (1 MiB).
    pub kernel_dest_addr: u32,

    /// Number of 512-byte sectors occupied by the kernel.
    pub kernel_sector_count: u16,

    /// Maximum number of sectors read into the staging buffer before it is
    /// copied out.
    ///
    /// The default is 4.
    pub max_batch_size: u16,

    /// Logical block address of the first kernel sector.
    ///
    /// The default is 4, i.e. the kernel starts behind the boot sector and the
    /// three sectors of the second stage.
    pub kernel_start_lba: u64,

    /// Physical address of the low-memory buffer the BIOS reads into.
    ///
    /// Must be sector aligned and reachable in real mode together with
    /// `max_batch_size` sectors.
    pub staging_buffer_addr: u32,

    /// How often a single sector read is attempted before giving up.
    ///
    /// The disk is reset between attempts. The default is 5.
    pub max_attempts: u8,

    /// The minimum log level that is printed during loading.
    ///
    /// The default is [`LevelFilter::Info`].
    pub log_level: LevelFilter,
}

impl LoaderConfig {
    /// Creates the default configuration for a kernel of the given size.
    pub const fn new(kernel_sector_count: u16) -> Self {
        Self {
            kernel_dest_addr: 0x10_0000,
            kernel_sector_count,
            max_batch_size: 4,
            kernel_start_lba: 4,
            staging_buffer_addr: 0x1_0000,
            max_attempts: 5,
            log_level: LevelFilter::Info,
        }
    }

    /// Number of bytes the kernel occupies after loading.
    pub fn kernel_len(&self) -> u32 {
        u32::from(self.kernel_sector_count) * SECTOR_SIZE
    }

    /// Size of the staging buffer in bytes.
    pub fn staging_buffer_len(&self) -> u32 {
        u32::from(self.max_batch_size) * SECTOR_SIZE
    }

    /// Checks the invariants the loader relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_batch_size == 0 {
            return Err(ConfigError::ZeroBatchSize);
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::ZeroAttempts);
        }

        // sector aligned reads never straddle a 64KiB DMA boundary
        if self.staging_buffer_addr % SECTOR_SIZE != 0 {
            return Err(ConfigError::StagingBufferMisaligned {
                addr: self.staging_buffer_addr,
            });
        }
        // the packet must still be representable after the last sector
        let staging_start = u64::from(self.staging_buffer_addr);
        let staging_end = staging_start + u64::from(self.staging_buffer_len());
        if staging_end >= u64::from(REAL_MODE_LIMIT) {
            return Err(ConfigError::StagingBufferUnreachable {
                addr: self.staging_buffer_addr,
                len: self.staging_buffer_len(),
            });
        }

        let dest_start = u64::from(self.kernel_dest_addr);
        let dest_end = dest_start + u64::from(self.kernel_len());
        if dest_end > u64::from(u32::MAX) + 1 {
            return Err(ConfigError::DestinationOutOfRange {
                addr: self.kernel_dest_addr,
                len: self.kernel_len(),
            });
        }
        if self.kernel_sector_count != 0 && dest_start < staging_end && staging_start < dest_end
        {
            return Err(ConfigError::Overlap);
        }

        Ok(())
    }
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self::new(0)
    }
}

/// A [`LoaderConfig`] that cannot be used for loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// `max_batch_size` is zero, so no progress could ever be made.
    ZeroBatchSize,
    /// `max_attempts` is zero, so no sector could ever be read.
    ZeroAttempts,
    /// The staging buffer does not start on a sector boundary.
    StagingBufferMisaligned { addr: u32 },
    /// The staging buffer does not fit below the real-mode limit.
    StagingBufferUnreachable { addr: u32, len: u32 },
    /// The kernel does not fit into the 32-bit physical address space.
    DestinationOutOfRange { addr: u32, len: u32 },
    /// The kernel destination overlaps the staging buffer.
    Overlap,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ZeroBatchSize => f.write_str("max batch size must not be zero"),
            ConfigError::ZeroAttempts => f.write_str("max attempts must not be zero"),
            ConfigError::StagingBufferMisaligned { addr } => write!(
                f,
                "staging buffer at {addr:#x} is not aligned to {SECTOR_SIZE} bytes"
            ),
            ConfigError::StagingBufferUnreachable { addr, len } => write!(
                f,
                "staging buffer at {addr:#x} with {len:#x} bytes is not reachable in real mode"
            ),
            ConfigError::DestinationOutOfRange { addr, len } => write!(
                f,
                "kernel destination at {addr:#x} with {len:#x} bytes exceeds 4GiB"
            ),
            ConfigError::Overlap => f.write_str("kernel destination overlaps the staging buffer"),
        }
    }
}

/// An enum representing the available verbosity level filters of the logger.
///
/// Based on
/// <https://github.com/rust-lang/log/blob/dc32ab999f52805d5ce579b526bd9d9684c38d1a/src/lib.rs#L552-565>
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LevelFilter {
    /// A level lower than all log levels.
    Off,
    /// Corresponds to the `Error` log level.
    Error,
    /// Corresponds to the `Warn` log level.
    Warn,
    /// Corresponds to the `Info` log level.
    Info,
    /// Corresponds to the `Debug` log level.
    Debug,
    /// Corresponds to the `Trace` log level.
    Trace,
}

impl Default for LevelFilter {
    fn default() -> Self {
        Self::Info
    }
}

impl From<LevelFilter> for log::LevelFilter {
    fn from(level: LevelFilter) -> Self {
        match level {
            LevelFilter::Off => log::LevelFilter::Off,
            LevelFilter::Error => log::LevelFilter::Error,
            LevelFilter::Warn => log::LevelFilter::Warn,
            LevelFilter::Info => log::LevelFilter::Info,
            LevelFilter::Debug => log::LevelFilter::Debug,
            LevelFilter::Trace => log::LevelFilter::Trace,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(LoaderConfig::new(10).validate(), Ok(()));
        assert_eq!(LoaderConfig::default().validate(), Ok(()));
    }

    #[test]
    fn missing_fields_use_defaults() {
        let config: LoaderConfig =
            serde_json::from_str(r#"{ "kernel_sector_count": 10, "max_batch_size": 8 }"#).unwrap();
        assert_eq!(config.kernel_sector_count, 10);
        assert_eq!(config.max_batch_size, 8);
        assert_eq!(config.kernel_dest_addr, 0x10_0000);
        assert_eq!(config.kernel_start_lba, 4);
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.log_level, LevelFilter::Info);
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let mut config = LoaderConfig::new(10);
        config.max_batch_size = 0;
        assert_eq!(config.validate(), Err(ConfigError::ZeroBatchSize));
    }

    #[test]
    fn zero_attempts_are_rejected() {
        let mut config = LoaderConfig::new(10);
        config.max_attempts = 0;
        assert_eq!(config.validate(), Err(ConfigError::ZeroAttempts));
    }

    #[test]
    fn staging_buffer_must_stay_below_one_mib() {
        let mut config = LoaderConfig::new(10);
        config.staging_buffer_addr = 0xf_f000;
        config.max_batch_size = 9;
        assert_eq!(
            config.validate(),
            Err(ConfigError::StagingBufferUnreachable {
                addr: 0xf_f000,
                len: 0x1200
            })
        );

        // ends exactly at the limit, so the packet behind it would wrap
        config.max_batch_size = 2;
        config.staging_buffer_addr = 0xf_fc00;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::StagingBufferUnreachable { .. })
        ));

        config.staging_buffer_addr = 0xf_fa00;
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn staging_buffer_must_be_sector_aligned() {
        let mut config = LoaderConfig::new(2);
        config.max_batch_size = 2;
        // the first sector would span 0xff00..0x100ff
        config.staging_buffer_addr = 0xff00;
        assert_eq!(
            config.validate(),
            Err(ConfigError::StagingBufferMisaligned { addr: 0xff00 })
        );

        config.staging_buffer_addr = 0x7e08;
        assert!(config.validate().is_err());

        config.staging_buffer_addr = 0xfe00;
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn destination_must_not_overlap_staging_buffer() {
        let mut config = LoaderConfig::new(16);
        config.kernel_dest_addr = 0x8000;
        config.staging_buffer_addr = 0x9000;
        assert_eq!(config.validate(), Err(ConfigError::Overlap));

        // adjacent is fine
        config.kernel_dest_addr = 0x9000 + config.staging_buffer_len();
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn destination_must_fit_into_32_bits() {
        let mut config = LoaderConfig::new(2);
        config.kernel_dest_addr = 0xffff_fe00;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DestinationOutOfRange { .. })
        ));
    }

    #[test]
    fn level_filter_converts_to_log() {
        assert_eq!(
            log::LevelFilter::from(LevelFilter::Trace),
            log::LevelFilter::Trace
        );
        assert!(LevelFilter::Warn < LevelFilter::Info);
    }
}
