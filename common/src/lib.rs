//! Hardware-independent core of the kernel loader.
//!
//! [`loader::KernelLoader`] moves the kernel sector by sector from the boot disk
//! to its destination. All machine access goes through the traits in [`bios`],
//! which the real-mode second stage implements with BIOS calls.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_op_in_unsafe_fn)]

pub use kernel_loader_config::{LoaderConfig, SECTOR_SIZE};
pub use loader::{load_kernel, KernelLoadError, KernelLoader, LoadState, LoadSummary};

/// The machine services the loader relies on.
pub mod bios;
/// Provides the BIOS disk address packet.
pub mod dap;
/// Drives the sector reader over the whole kernel.
pub mod loader;
/// Byte-wise copies between physical addresses.
pub mod mem;
/// Reads single sectors with retries.
pub mod reader;

#[cfg(test)]
mod test_machine;
