pub mod image;
pub mod ram;

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// Sector size in bytes.
pub const SECTOR_SIZE: usize = 128;

/// Disk geometry: 32 tracks of 32 sectors.
pub const NUM_SECTORS: usize = 32 * 32;

/// An address of a sector.
pub type SectorAddr = u32;

/// Fixed-sized byte sequence, the unit of disk transfer.
#[repr(C)]
#[derive(Clone, Copy)]
#[derive(FromBytes, IntoBytes, Immutable, Unaligned, KnownLayout)]
pub struct Sector {
    pub data: [u8; SECTOR_SIZE],
}

impl Sector {
    /// Constructs a `Sector` with given data.
    /// Length of `data` must be smaller or equal to `SECTOR_SIZE`.
    ///
    /// # Panics
    /// Panics if:
    /// - `data` is larger than `SECTOR_SIZE`
    pub fn new(data: &[u8]) -> Self {
        let mut sector = Self::default();
        sector.data[..data.len()].copy_from_slice(data);
        sector
    }
}

impl Default for Sector {
    fn default() -> Self {
        Self {
            data: [0u8; SECTOR_SIZE],
        }
    }
}

/// An implementation of `Disk` services synchronous sector transfers, as well
/// as reporting the sector capacity. Reads and writes block until the whole
/// sector has moved; there are no partial operations.
pub trait Disk {
    /// Reads the sector at `addr` into `sector`.
    fn read_sector(&self, sector: &mut Sector, addr: SectorAddr) -> Result<()>;

    /// Writes `sector` into the sector at `addr`.
    fn write_sector(&mut self, sector: &Sector, addr: SectorAddr) -> Result<()>;

    /// Returns the number of sectors the disk can hold.
    fn sector_count(&self) -> u32;
}

pub type Result<T> = core::result::Result<T, libc::c_int>;
