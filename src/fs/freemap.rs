use bitvec::prelude::*;

use crate::{
    disk::{Disk, NUM_SECTORS, SectorAddr},
    fs::{error::Result, open_file::OpenFile},
};

/// Size of the bitmap file's contents: one bit per sector.
pub const FREE_MAP_FILE_SIZE: usize = NUM_SECTORS / 8;

/// The free-sector bitmap. A set bit means the sector is allocated.
///
/// The map is persisted as a regular file whose header lives at a well-known
/// sector; every mutating filesystem operation fetches it, updates it and
/// writes it through.
#[derive(Clone)]
pub struct FreeMap {
    bits: BitBox<u8, Lsb0>,
}

impl FreeMap {
    /// Constructs a map with every sector free.
    pub fn new() -> Self {
        Self {
            bits: bitbox![u8, Lsb0; 0; NUM_SECTORS],
        }
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        self.bits.as_raw_slice()
    }

    pub(crate) fn from_bytes(bytes: &[u8]) -> Self {
        let bits: BitVec<u8, Lsb0> = BitVec::from_slice(bytes);
        Self {
            bits: bits.into_boxed_bitslice(),
        }
    }

    /// Reads the map out of its backing file.
    pub fn fetch_from(disk: &impl Disk, file: &OpenFile) -> Result<Self> {
        let mut bytes = [0u8; FREE_MAP_FILE_SIZE];
        file.read_at(disk, &mut bytes, 0)?;
        Ok(Self::from_bytes(&bytes))
    }

    /// Writes the map through to its backing file.
    pub fn write_back(&self, disk: &mut impl Disk, file: &OpenFile) -> Result<()> {
        file.write_at(disk, self.as_bytes(), 0)?;
        Ok(())
    }

    /// Marks a sector allocated.
    pub fn mark(&mut self, sector: SectorAddr) {
        self.bits.set(sector as usize, true);
    }

    /// Marks a sector free.
    ///
    /// # Panics
    /// Panics if the sector was not allocated.
    pub fn clear(&mut self, sector: SectorAddr) {
        assert!(self.bits[sector as usize], "sector {sector} is not allocated");
        self.bits.set(sector as usize, false);
    }

    /// Checks whether a sector is allocated.
    pub fn test(&self, sector: SectorAddr) -> bool {
        self.bits[sector as usize]
    }

    /// Claims the lowest free sector, returning its address.
    /// Returns `None` if every sector is allocated.
    pub fn find_and_set(&mut self) -> Option<SectorAddr> {
        let sector = self.bits.iter_zeros().next()?;
        self.bits.set(sector, true);
        Some(sector as SectorAddr)
    }

    /// Returns the number of free sectors.
    pub fn count_clear(&self) -> usize {
        self.bits.count_zeros()
    }
}

impl Default for FreeMap {
    fn default() -> Self {
        Self::new()
    }
}
