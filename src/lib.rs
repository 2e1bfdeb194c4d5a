/*!
Creates raw disk images for the real-mode kernel loader.

The image has a fixed layout: the boot sector at LBA 0, the second stage
starting at LBA 1, and the kernel starting at `LoaderConfig::kernel_start_lba`
(never before LBA 4). The second stage learns where the kernel is through
linker symbols; use [`linker_args`] to pass the values of the returned
[`LoaderConfig`] to its link step.
*/

#![warn(missing_docs)]

use anyhow::Context;
use std::{fs, path::Path};

pub use disk_image::DiskImageBuilder;
pub use kernel_loader_config::{ConfigError, LevelFilter, LoaderConfig};

mod disk_image;

/// Writes the given config as JSON to `out_path`.
pub fn write_config(config: &LoaderConfig, out_path: &Path) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(config).context("failed to serialize loader config")?;
    fs::write(out_path, json).with_context(|| {
        format!(
            "failed to write loader config to `{}`",
            out_path.display()
        )
    })
}

/// Reads a config previously written by [`write_config`].
pub fn read_config(path: &Path) -> anyhow::Result<LoaderConfig> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("failed to read loader config `{}`", path.display()))?;
    serde_json::from_str(&json).context("failed to parse loader config")
}

/// Linker arguments that define the symbols the second stage reads its config from.
pub fn linker_args(config: &LoaderConfig) -> Vec<String> {
    [
        ("_kernel_dest_addr", u64::from(config.kernel_dest_addr)),
        ("_kernel_sector_count", u64::from(config.kernel_sector_count)),
        ("_max_batch_size", u64::from(config.max_batch_size)),
        ("_kernel_start_lba", config.kernel_start_lba),
    ]
    .iter()
    .map(|(symbol, value)| format!("--defsym={symbol}={value:#x}"))
    .collect()
}
