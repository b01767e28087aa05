use super::{AddrRange, AddrUnit, BusMap};
use thiserror::Error;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Error, Debug)]
pub enum BiosError {
    #[error("failed to load BIOS: {0}")]
    IoError(#[from] io::Error),

    #[error("invalid BIOS file: must be 512 kb, is {0} bytes")]
    InvalidSize(usize),
}

/// The BIOS ROM. It's read only and must be exactly 512 kb.
pub struct Bios {
    data: Box<[u8]>,
    path: PathBuf,
    name: String,
}

impl Bios {
    pub const SIZE: usize = 512 * 1024;

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn from_file(path: &Path) -> Result<Self, BiosError> {
        let data = fs::read(path)?;

        let name = path
            .file_name()
            .unwrap_or(path.as_os_str())
            .to_string_lossy()
            .to_string();

        Self::from_bytes(data, path, name)
    }

    /// Create a BIOS from an image in memory. Fails if the image isn't exactly [`Bios::SIZE`]
    /// bytes.
    pub fn from_bytes(data: Vec<u8>, path: &Path, name: String) -> Result<Self, BiosError> {
        if data.len() != Self::SIZE {
            return Err(BiosError::InvalidSize(data.len()));
        }
        Ok(Self {
            data: data.into_boxed_slice(),
            path: path.to_path_buf(),
            name,
        })
    }

    /// Build an image with `code` placed at the physical address `base`. The rest is zero,
    /// which decodes as NOP.
    #[cfg(test)]
    pub fn from_code(base: u32, code: &[u8]) -> Self {
        let offset = Self::RANGE
            .offset(base)
            .expect("base address outside of the BIOS") as usize;

        assert!(offset + code.len() <= Self::SIZE, "code doesn't fit in BIOS");

        let mut data = vec![0x0; Self::SIZE];
        data[offset..offset + code.len()].copy_from_slice(code);

        Self {
            data: data.into_boxed_slice(),
            path: PathBuf::new(),
            name: "custom".to_string(),
        }
    }

    pub fn load<T: AddrUnit>(&self, offset: u32) -> u32 {
        let offset = offset as usize;
        (0..T::WIDTH).fold(0, |value, byte| {
            value | (self.data[offset + byte] as u32) << (8 * byte)
        })
    }
}

impl BusMap for Bios {
    const RANGE: AddrRange = AddrRange::new(0x1fc0_0000, Self::SIZE as u32);
}
