use std::{
    fs::{File, OpenOptions},
    io,
    os::unix::fs::FileExt,
};

use libc::EIO;

use crate::disk::{Disk, Result, SECTOR_SIZE, Sector, SectorAddr};

/// Disk backed by an image file on the host.
pub struct ImageDisk {
    file: File,
    sector_count: u32,
}

impl ImageDisk {
    /// Opens an image file to be used as a disk.
    /// If the file's size is not a multiple of `SECTOR_SIZE` the remaining
    /// bytes are not addressable.
    pub fn open(path: &str) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .into_errno()?;
        let size = file.metadata().into_errno()?.len();
        let sector_count = (size / SECTOR_SIZE as u64) as u32;
        Ok(Self { file, sector_count })
    }

    /// Creates an image file to be used as a disk.
    /// The file's size is `sector_count * SECTOR_SIZE` bytes.
    pub fn create(path: &str, sector_count: u32) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .into_errno()?;
        file.set_len(sector_count as u64 * SECTOR_SIZE as u64)
            .into_errno()?;
        Ok(Self { file, sector_count })
    }
}

impl Disk for ImageDisk {
    fn read_sector(&self, sector: &mut Sector, addr: SectorAddr) -> Result<()> {
        self.file
            .read_at(&mut sector.data, addr as u64 * SECTOR_SIZE as u64)
            .into_errno()
            .and_then(|b| if b != SECTOR_SIZE { Err(EIO) } else { Ok(()) })
    }

    fn write_sector(&mut self, sector: &Sector, addr: SectorAddr) -> Result<()> {
        self.file
            .write_at(&sector.data, addr as u64 * SECTOR_SIZE as u64)
            .into_errno()
            .and_then(|b| if b != SECTOR_SIZE { Err(EIO) } else { Ok(()) })
    }

    fn sector_count(&self) -> u32 {
        self.sector_count
    }
}

trait IntoErrno {
    type T;

    fn into_errno(self) -> Result<Self::T>;
}

impl<T> IntoErrno for io::Result<T> {
    type T = T;

    fn into_errno(self) -> Result<Self::T> {
        match self {
            Ok(v) => Ok(v),
            Err(e) => Err(e.raw_os_error().unwrap_or(EIO)),
        }
    }
}
