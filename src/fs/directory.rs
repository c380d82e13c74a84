use zerocopy::{
    FromBytes, FromZeros, Immutable, IntoBytes, KnownLayout, Unaligned, little_endian::I32,
};

use crate::{
    disk::{Disk, SectorAddr},
    fs::{
        error::{Error, Result},
        open_file::OpenFile,
    },
};

/// How long a file name can be.
pub const FILE_NAME_MAX_LEN: usize = 9;

/// How many entries a directory holds. Directories do not grow.
pub const NUM_DIR_ENTRIES: usize = 64;

/// Size of a directory's contents.
pub const DIRECTORY_FILE_SIZE: usize = size_of::<DirEntry>() * NUM_DIR_ENTRIES;

/// One slot of a directory table.
#[repr(C)]
#[derive(Clone, Copy)]
#[derive(FromBytes, IntoBytes, Immutable, Unaligned, KnownLayout)]
pub struct DirEntry {
    in_use: u8,
    is_directory: u8,
    sector: I32,
    name: [u8; FILE_NAME_MAX_LEN + 1],
}

impl DirEntry {
    pub fn is_in_use(&self) -> bool {
        self.in_use != 0
    }

    pub fn is_directory(&self) -> bool {
        self.is_directory != 0
    }

    /// Returns the sector holding the entry's file header.
    pub fn sector(&self) -> SectorAddr {
        self.sector.get() as SectorAddr
    }

    /// Returns the stored name, up to the first NUL.
    pub fn name(&self) -> &str {
        let end = self
            .name
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(self.name.len());
        str::from_utf8(&self.name[..end]).expect("entry names are validated ASCII")
    }

    fn name_matches(&self, name: &str) -> bool {
        self.name().as_bytes() == name.as_bytes()
    }
}

/// A directory: a fixed table of entries persisted as a regular file.
/// Paths are slash-separated; the tree is implemented by entries flagged as
/// directories pointing at further directory files.
#[repr(C)]
#[derive(FromBytes, IntoBytes, Immutable, Unaligned, KnownLayout)]
pub struct Directory {
    table: [DirEntry; NUM_DIR_ENTRIES],
}

impl Directory {
    /// Constructs an empty directory.
    pub fn new() -> Self {
        Self::new_zeroed()
    }

    /// Reads the table out of its backing file.
    pub fn fetch_from(disk: &impl Disk, file: &OpenFile) -> Result<Self> {
        let mut bytes = [0u8; DIRECTORY_FILE_SIZE];
        file.read_at(disk, &mut bytes, 0)?;
        let directory =
            Directory::read_from_bytes(&bytes).expect("a directory table is a fixed-size record");
        Ok(directory)
    }

    /// Writes the table through to its backing file.
    pub fn write_back(&self, disk: &mut impl Disk, file: &OpenFile) -> Result<()> {
        file.write_at(disk, self.as_bytes(), 0)?;
        Ok(())
    }

    /// Looks a name up, returning the sector of its file header.
    pub fn find(&self, name: &str) -> Option<SectorAddr> {
        self.entries()
            .find(|e| e.name_matches(name))
            .map(|e| e.sector())
    }

    /// Checks whether `name` names a sub-directory.
    pub fn is_directory(&self, name: &str) -> bool {
        self.entries()
            .find(|e| e.name_matches(name))
            .is_some_and(|e| e.is_directory())
    }

    /// Stores (name, sector, is_directory) in a free slot.
    pub fn add(&mut self, name: &str, sector: SectorAddr, is_directory: bool) -> Result<()> {
        validate_name(name)?;

        if self.find(name).is_some() {
            return Err(Error::AlreadyExists);
        }

        let slot = self
            .table
            .iter_mut()
            .find(|e| !e.is_in_use())
            .ok_or(Error::DirectoryFull)?;

        *slot = DirEntry::new_zeroed();
        slot.in_use = 1;
        slot.is_directory = is_directory as u8;
        slot.sector = I32::new(sector as i32);
        slot.name[..name.len()].copy_from_slice(name.as_bytes());

        Ok(())
    }

    /// Clears the slot holding `name`. The table is not compacted.
    pub fn remove(&mut self, name: &str) -> Result<()> {
        let slot = self
            .table
            .iter_mut()
            .find(|e| e.is_in_use() && e.name_matches(name))
            .ok_or(Error::NotFound)?;
        slot.in_use = 0;
        Ok(())
    }

    /// Iterates the in-use entries in table order.
    pub fn entries(&self) -> impl Iterator<Item = &DirEntry> {
        self.table.iter().filter(|e| e.is_in_use())
    }
}

impl Default for Directory {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > FILE_NAME_MAX_LEN {
        return Err(Error::InvalidName);
    }

    if !name.is_ascii() || name.contains(['/', '\0']) {
        return Err(Error::InvalidName);
    }

    Ok(())
}
