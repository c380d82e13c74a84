use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned, little_endian::I32};

use crate::{
    disk::{Disk, SECTOR_SIZE, Sector, SectorAddr},
    fs::{
        error::{Error, Result},
        freemap::FreeMap,
    },
};

/// How many sector pointers fit in a header next to the two length fields.
pub const NUM_DIRECT: usize = (SECTOR_SIZE - 2 * size_of::<i32>()) / size_of::<i32>();

/// Byte capacity of a header whose pointers address data directly.
pub const LEVEL2: i32 = (NUM_DIRECT * SECTOR_SIZE) as i32;
/// Byte capacity with one layer of sub-headers.
pub const LEVEL3: i32 = LEVEL2 * NUM_DIRECT as i32;
/// Byte capacity with two layers of sub-headers.
pub const LEVEL4: i32 = LEVEL3 * NUM_DIRECT as i32;

/// The on-disk file header, sized to exactly one sector.
///
/// A header is *direct* when the file fits `NUM_DIRECT` sectors: each pointer
/// addresses a data sector. Larger files are *indirect*: each pointer
/// addresses a sector holding another `FileHeader` spanning `bound` bytes,
/// where `bound` is the next-lower level's capacity. The level is never
/// stored; it is re-derived from `num_bytes` at every interpretation.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
#[derive(FromBytes, IntoBytes, Immutable, Unaligned, KnownLayout)]
pub struct FileHeader {
    num_bytes: I32,
    num_sectors: I32,
    data_sectors: [I32; NUM_DIRECT],
}

impl FileHeader {
    /// Constructs an uninitialised header; every field holds −1 until
    /// `allocate` or `fetch_from` fills it in.
    pub fn new() -> Self {
        Self {
            num_bytes: I32::new(-1),
            num_sectors: I32::new(-1),
            data_sectors: [I32::new(-1); NUM_DIRECT],
        }
    }

    /// Returns the file length in bytes.
    pub fn len(&self) -> usize {
        self.num_bytes.get().max(0) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the number of data sectors backing the file.
    pub fn sectors(&self) -> usize {
        self.num_sectors.get().max(0) as usize
    }

    /// Selects the sub-header span for a file of `num_bytes`, or `None` when
    /// the header is direct.
    fn indirect_bound(num_bytes: i32) -> Option<i32> {
        if num_bytes > LEVEL4 {
            Some(LEVEL4)
        } else if num_bytes > LEVEL3 {
            Some(LEVEL3)
        } else if num_bytes > LEVEL2 {
            Some(LEVEL2)
        } else {
            None
        }
    }

    /// Initialises a fresh header for a file of `file_size` bytes, claiming
    /// data sectors (and sub-header sectors for indirect files) out of
    /// `free_map`.
    ///
    /// On failure the header and map are mid-mutation; the caller discards
    /// both in-memory copies and must not write either back.
    pub fn allocate(
        &mut self,
        free_map: &mut FreeMap,
        disk: &mut impl Disk,
        file_size: i32,
    ) -> Result<()> {
        let num_sectors = (file_size as usize).div_ceil(SECTOR_SIZE);
        self.num_bytes = I32::new(file_size);
        self.num_sectors = I32::new(num_sectors as i32);

        if free_map.count_clear() < num_sectors {
            return Err(Error::NoSpace);
        }

        match Self::indirect_bound(file_size) {
            None => {
                for slot in &mut self.data_sectors[..num_sectors] {
                    let sector = free_map.find_and_set().ok_or(Error::NoSpace)?;
                    *slot = I32::new(sector as i32);
                }
            }

            Some(bound) => {
                let mut remaining = file_size;
                let mut slot = 0;
                while remaining > 0 {
                    let own = free_map.find_and_set().ok_or(Error::NoSpace)?;
                    let mut sub = FileHeader::new();
                    sub.allocate(free_map, disk, remaining.min(bound))?;
                    sub.write_back(disk, own)?;
                    self.data_sectors[slot] = I32::new(own as i32);
                    // The tail chunk is shorter than `bound`; the subtraction
                    // still drives `remaining` past zero and ends the loop.
                    remaining -= bound;
                    slot += 1;
                }
            }
        }

        Ok(())
    }

    /// Releases every sector the header references back into `free_map`,
    /// including the sub-header sectors themselves. The header's own sector
    /// is cleared by the caller.
    pub fn deallocate(&self, free_map: &mut FreeMap, disk: &impl Disk) -> Result<()> {
        match Self::indirect_bound(self.num_bytes.get()) {
            None => {
                for slot in &self.data_sectors[..self.sectors()] {
                    free_map.clear(slot.get() as SectorAddr);
                }
            }

            Some(bound) => {
                let mut remaining = self.num_bytes.get();
                let mut slot = 0;
                while remaining > 0 {
                    let sector = self.data_sectors[slot].get() as SectorAddr;
                    let sub = FileHeader::fetch_from(disk, sector)?;
                    sub.deallocate(free_map, disk)?;
                    free_map.clear(sector);
                    remaining -= bound;
                    slot += 1;
                }
            }
        }

        Ok(())
    }

    /// Translates a byte offset within the file to the sector holding it.
    pub fn byte_to_sector(&self, disk: &impl Disk, offset: i32) -> Result<SectorAddr> {
        match Self::indirect_bound(self.num_bytes.get()) {
            None => {
                let sector = self.data_sectors[offset as usize / SECTOR_SIZE];
                Ok(sector.get() as SectorAddr)
            }

            Some(bound) => {
                let which = (offset / bound) as usize;
                let rest = offset % bound;
                let sub =
                    FileHeader::fetch_from(disk, self.data_sectors[which].get() as SectorAddr)?;
                sub.byte_to_sector(disk, rest)
            }
        }
    }

    /// Reads a header out of the sector at `addr`.
    pub fn fetch_from(disk: &impl Disk, addr: SectorAddr) -> Result<Self> {
        let mut sector = Sector::default();
        disk.read_sector(&mut sector, addr)?;
        let header = FileHeader::read_from_bytes(&sector.data)
            .expect("a file header is exactly one sector");
        Ok(header)
    }

    /// Writes the header into the sector at `addr`.
    pub fn write_back(&self, disk: &mut impl Disk, addr: SectorAddr) -> Result<()> {
        let sector = Sector::new(self.as_bytes());
        disk.write_sector(&sector, addr)?;
        Ok(())
    }
}

impl Default for FileHeader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use crate::disk::{NUM_SECTORS, ram::RamDisk};

    use super::*;

    #[test]
    fn test_header_fills_one_sector() {
        assert_eq!(size_of::<FileHeader>(), SECTOR_SIZE);
    }

    #[test]
    fn test_direct_allocate() {
        let mut disk = RamDisk::default();
        let mut map = FreeMap::new();

        let mut header = FileHeader::new();
        header.allocate(&mut map, &mut disk, 500).unwrap();

        assert_eq!(header.len(), 500);
        assert_eq!(header.sectors(), 4);
        assert_eq!(map.count_clear(), NUM_SECTORS - 4);

        for offset in [0, 127, 128, 300, 499] {
            let sector = header.byte_to_sector(&disk, offset).unwrap();
            assert!(map.test(sector));
        }
    }

    #[test]
    fn test_indirect_allocate_level3() {
        let mut disk = RamDisk::default();
        let mut map = FreeMap::new();

        // 10_000 bytes exceed the direct capacity but fit one layer of
        // sub-headers.
        let mut header = FileHeader::new();
        header.allocate(&mut map, &mut disk, 10_000).unwrap();

        let a = header.byte_to_sector(&disk, 0).unwrap();
        let b = header.byte_to_sector(&disk, LEVEL2 + 256).unwrap();
        let c = header.byte_to_sector(&disk, 9_999).unwrap();
        assert_ne!(a, b);
        assert_ne!(b, c);
        assert_ne!(a, c);
        for sector in [a, b, c] {
            assert!(map.test(sector));
        }

        // 79 data sectors plus 3 sub-header sectors.
        assert_eq!(map.count_clear(), NUM_SECTORS - 82);

        header.deallocate(&mut map, &disk).unwrap();
        assert_eq!(map.count_clear(), NUM_SECTORS);
    }

    #[test]
    fn test_every_offset_maps_to_a_claimed_sector() {
        let mut disk = RamDisk::default();
        let mut map = FreeMap::new();

        let mut header = FileHeader::new();
        header.allocate(&mut map, &mut disk, 5_000).unwrap();

        for offset in (0..5_000).step_by(64) {
            let sector = header.byte_to_sector(&disk, offset).unwrap();
            assert!(map.test(sector), "offset {offset} maps to a free sector");
        }
    }

    #[test]
    fn test_allocate_without_space() {
        let mut disk = RamDisk::default();
        let mut map = FreeMap::new();
        while map.count_clear() > 3 {
            map.find_and_set().unwrap();
        }

        let mut header = FileHeader::new();
        let err = header.allocate(&mut map, &mut disk, 1_000).unwrap_err();
        assert_eq!(err, Error::NoSpace);
    }

    #[test]
    fn test_serde() {
        let mut disk = RamDisk::default();
        let mut map = FreeMap::new();

        let mut original = FileHeader::new();
        original.allocate(&mut map, &mut disk, 321).unwrap();
        original.write_back(&mut disk, 17).unwrap();

        let restored = FileHeader::fetch_from(&disk, 17).unwrap();
        assert_eq!(restored.as_bytes(), original.as_bytes());
    }
}
