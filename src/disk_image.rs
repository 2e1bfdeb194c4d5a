use anyhow::{anyhow, bail, Context};
use kernel_loader_config::{LoaderConfig, SECTOR_SIZE};
use std::{
    fs::{self, File},
    io::{self, Read, Write},
    path::{Path, PathBuf},
};
use tempfile::NamedTempFile;

const SECTOR_LEN: u64 = SECTOR_SIZE as u64;
/// The kernel never starts before this sector, even for tiny second stages.
const MIN_KERNEL_START_LBA: u64 = 4;
const BOOT_SIGNATURE: [u8; 2] = [0x55, 0xaa];

/// Create disk images for booting on legacy BIOS systems.
#[derive(Debug, Clone)]
pub struct DiskImageBuilder {
    boot_sector: PathBuf,
    stage_2: PathBuf,
    kernel: PathBuf,
    kernel_dest_addr: Option<u32>,
    max_batch_size: Option<u16>,
}

impl DiskImageBuilder {
    /// Start creating a disk image from the given flat binaries.
    pub fn new(boot_sector: &Path, stage_2: &Path, kernel: &Path) -> Self {
        Self {
            boot_sector: boot_sector.to_owned(),
            stage_2: stage_2.to_owned(),
            kernel: kernel.to_owned(),
            kernel_dest_addr: None,
            max_batch_size: None,
        }
    }

    /// Physical address the kernel is loaded to.
    pub fn kernel_dest_addr(&mut self, addr: u32) -> &mut Self {
        self.kernel_dest_addr = Some(addr);
        self
    }

    /// Maximum number of sectors read into the staging buffer at once.
    pub fn max_batch_size(&mut self, sectors: u16) -> &mut Self {
        self.max_batch_size = Some(sectors);
        self
    }

    /// Computes the loader config for the current inputs without writing anything.
    pub fn loader_config(&self) -> anyhow::Result<LoaderConfig> {
        let stage_2_len = file_len(&self.stage_2, "second stage")?;
        let kernel_len = file_len(&self.kernel, "kernel")?;
        if stage_2_len == 0 {
            bail!("second stage `{}` is empty", self.stage_2.display());
        }
        if kernel_len == 0 {
            bail!("kernel `{}` is empty", self.kernel.display());
        }

        let kernel_sectors = u16::try_from(sectors(kernel_len)).with_context(|| {
            format!("kernel needs more than {} sectors", u16::MAX)
        })?;
        let mut config = LoaderConfig::new(kernel_sectors);
        config.kernel_start_lba = u64::max(MIN_KERNEL_START_LBA, 1 + sectors(stage_2_len));
        if let Some(addr) = self.kernel_dest_addr {
            config.kernel_dest_addr = addr;
        }
        if let Some(max_batch_size) = self.max_batch_size {
            config.max_batch_size = max_batch_size;
        }
        config
            .validate()
            .map_err(|err| anyhow!("invalid loader config: {err}"))?;
        Ok(config)
    }

    /// Create a BIOS-bootable disk image at the given path and return the matching config.
    pub fn create_disk_image(&self, out_path: &Path) -> anyhow::Result<LoaderConfig> {
        let config = self.loader_config()?;

        let boot_sector = fs::read(&self.boot_sector).context("failed to read boot sector")?;
        check_boot_sector(&boot_sector)?;

        let out_dir = match out_path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        let mut image = NamedTempFile::new_in(out_dir)
            .context("failed to create temporary disk image file")?;

        image
            .write_all(&boot_sector)
            .context("failed to write boot sector to disk image")?;
        let mut stage_2 = File::open(&self.stage_2).context("failed to open second stage")?;
        io::copy(&mut stage_2, &mut image)
            .context("failed to copy second stage to disk image")?;
        pad_to(&mut image, config.kernel_start_lba * SECTOR_LEN)
            .context("failed to pad second stage")?;

        let mut kernel = File::open(&self.kernel).context("failed to open kernel")?;
        let copied =
            io::copy(&mut kernel, &mut image).context("failed to copy kernel to disk image")?;
        let image_len = (config.kernel_start_lba + sectors(copied)) * SECTOR_LEN;
        pad_to(&mut image, image_len).context("failed to pad kernel to whole sectors")?;

        image.flush().context("failed to flush disk image")?;
        image.persist(out_path).with_context(|| {
            format!("failed to create disk image at `{}`", out_path.display())
        })?;

        Ok(config)
    }
}

fn check_boot_sector(boot_sector: &[u8]) -> anyhow::Result<()> {
    if boot_sector.len() as u64 != SECTOR_LEN {
        bail!(
            "boot sector must be exactly {SECTOR_LEN} bytes long (is {})",
            boot_sector.len()
        );
    }
    if boot_sector[510..] != BOOT_SIGNATURE {
        bail!("boot sector does not end with the 0x55 0xaa boot signature");
    }
    Ok(())
}

fn file_len(path: &Path, what: &str) -> anyhow::Result<u64> {
    Ok(fs::metadata(path)
        .with_context(|| format!("failed to read file metadata of {what} `{}`", path.display()))?
        .len())
}

fn sectors(len: u64) -> u64 {
    len.div_ceil(SECTOR_LEN)
}

/// Appends zeros until the file is `len` bytes long.
fn pad_to(file: &mut NamedTempFile, len: u64) -> io::Result<()> {
    let current = file.as_file().metadata()?.len();
    if current < len {
        io::copy(&mut io::repeat(0).take(len - current), file)?;
    }
    Ok(())
}
