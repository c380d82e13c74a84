use libc::EIO;

use crate::disk::{Disk, NUM_SECTORS, Result, Sector, SectorAddr};

/// A model of a physical disk backed by host memory.
pub struct RamDisk {
    sectors: Box<[Sector]>,
}

impl RamDisk {
    /// Constructs a zero-initialized disk of `sector_count` sectors.
    pub fn new(sector_count: usize) -> Self {
        let sectors = vec![Sector::default(); sector_count].into_boxed_slice();
        Self { sectors }
    }
}

impl Default for RamDisk {
    fn default() -> Self {
        Self::new(NUM_SECTORS)
    }
}

impl Disk for RamDisk {
    fn read_sector(&self, sector: &mut Sector, addr: SectorAddr) -> Result<()> {
        let src = self.sectors.get(addr as usize).ok_or(EIO)?;
        *sector = *src;
        Ok(())
    }

    fn write_sector(&mut self, sector: &Sector, addr: SectorAddr) -> Result<()> {
        let dst = self.sectors.get_mut(addr as usize).ok_or(EIO)?;
        *dst = *sector;
        Ok(())
    }

    fn sector_count(&self) -> u32 {
        self.sectors.len() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let mut disk = RamDisk::new(4);
        let written = Sector::new(b"vaka");
        disk.write_sector(&written, 2).unwrap();

        let mut read = Sector::default();
        disk.read_sector(&mut read, 2).unwrap();
        assert_eq!(read.data, written.data);
    }

    #[test]
    fn test_out_of_bounds() {
        let mut disk = RamDisk::new(4);
        let mut sector = Sector::default();
        assert_eq!(disk.read_sector(&mut sector, 4), Err(EIO));
        assert_eq!(disk.write_sector(&sector, 7), Err(EIO));
    }
}
