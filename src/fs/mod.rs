pub mod error;
use error::*;
pub mod directory;
pub mod freemap;
pub mod header;
pub mod open_file;

use log::debug;

use crate::{
    disk::{Disk, SectorAddr},
    fs::{
        directory::{DIRECTORY_FILE_SIZE, Directory},
        freemap::{FREE_MAP_FILE_SIZE, FreeMap},
        header::FileHeader,
        open_file::OpenFile,
    },
};

/// Sector of the free-map file's header, fixed so it can be found on boot.
pub const FREE_MAP_SECTOR: SectorAddr = 0;

/// Sector of the root directory file's header.
pub const DIRECTORY_SECTOR: SectorAddr = 1;

/// An in-memory view of the filesystem.
///
/// The free map and the root directory are regular files; both are held open
/// from format/mount until the filesystem is dropped, and every mutating
/// operation writes them through. There is no crash consistency: an abort
/// between two write-backs may leave orphan sectors on the image.
pub struct FileSystem<D: Disk> {
    disk: D,
    free_map_file: OpenFile,
    directory_file: OpenFile,
}

impl<D: Disk> FileSystem<D> {
    /// Formats a disk with an empty filesystem.
    pub fn format(mut disk: D) -> Result<Self> {
        debug!("formatting the file system");

        let mut free_map = FreeMap::new();
        let mut map_header = FileHeader::new();
        let mut dir_header = FileHeader::new();

        // The two well-known header sectors go first, so neither allocation
        // below can grab them.
        free_map.mark(FREE_MAP_SECTOR);
        free_map.mark(DIRECTORY_SECTOR);

        map_header.allocate(&mut free_map, &mut disk, FREE_MAP_FILE_SIZE as i32)?;
        dir_header.allocate(&mut free_map, &mut disk, DIRECTORY_FILE_SIZE as i32)?;

        // The headers must land on disk before the files can be opened,
        // since open reads them back.
        map_header.write_back(&mut disk, FREE_MAP_SECTOR)?;
        dir_header.write_back(&mut disk, DIRECTORY_SECTOR)?;

        let free_map_file = OpenFile::open(&disk, FREE_MAP_SECTOR)?;
        let directory_file = OpenFile::open(&disk, DIRECTORY_SECTOR)?;
        let mut fs = Self {
            disk,
            free_map_file,
            directory_file,
        };

        free_map.write_back(&mut fs.disk, &fs.free_map_file)?;
        Directory::new().write_back(&mut fs.disk, &fs.directory_file)?;

        Ok(fs)
    }

    /// Mounts a previously formatted disk.
    pub fn mount(disk: D) -> Result<Self> {
        let free_map_file = OpenFile::open(&disk, FREE_MAP_SECTOR)?;
        let directory_file = OpenFile::open(&disk, DIRECTORY_SECTOR)?;
        Ok(Self {
            disk,
            free_map_file,
            directory_file,
        })
    }

    pub fn disk(&self) -> &D {
        &self.disk
    }

    /// Fetches the current free map out of its backing file.
    pub fn free_map(&self) -> Result<FreeMap> {
        FreeMap::fetch_from(&self.disk, &self.free_map_file)
    }

    /// Creates a file of `initial_size` bytes. Files do not grow, so the
    /// size is final.
    ///
    /// On failure nothing is written back; the discarded in-memory copies
    /// are the whole rollback.
    pub fn create(&mut self, path: &str, initial_size: i32) -> Result<()> {
        let (dir_file, mut directory, leaf) = self.resolve(path)?;

        if directory.find(leaf).is_some() {
            return Err(Error::AlreadyExists);
        }

        let mut free_map = self.free_map()?;
        let header_sector = free_map.find_and_set().ok_or(Error::NoSpace)?;
        directory.add(leaf, header_sector, false)?;

        let mut header = FileHeader::new();
        header.allocate(&mut free_map, &mut self.disk, initial_size)?;

        header.write_back(&mut self.disk, header_sector)?;
        directory.write_back(&mut self.disk, &dir_file)?;
        free_map.write_back(&mut self.disk, &self.free_map_file)?;

        debug!("created {path}, {initial_size} bytes, header at sector {header_sector}");
        Ok(())
    }

    /// Creates an empty sub-directory.
    pub fn create_dir(&mut self, path: &str) -> Result<()> {
        let (dir_file, mut directory, leaf) = self.resolve(path)?;

        if directory.find(leaf).is_some() {
            return Err(Error::AlreadyExists);
        }

        let mut free_map = self.free_map()?;
        let header_sector = free_map.find_and_set().ok_or(Error::NoSpace)?;
        directory.add(leaf, header_sector, true)?;

        let mut header = FileHeader::new();
        header.allocate(&mut free_map, &mut self.disk, DIRECTORY_FILE_SIZE as i32)?;
        header.write_back(&mut self.disk, header_sector)?;

        // The fresh table has to reach its data sectors before anyone walks
        // into it.
        let sub_file = OpenFile::open(&self.disk, header_sector)?;
        Directory::new().write_back(&mut self.disk, &sub_file)?;

        directory.write_back(&mut self.disk, &dir_file)?;
        free_map.write_back(&mut self.disk, &self.free_map_file)?;

        debug!("created directory {path}, header at sector {header_sector}");
        Ok(())
    }

    /// Opens the file at `path`.
    pub fn open(&self, path: &str) -> Result<OpenFile> {
        let (_, directory, leaf) = self.resolve(path)?;
        let sector = directory.find(leaf).ok_or(Error::NotFound)?;
        OpenFile::open(&self.disk, sector)
    }

    /// Reads from an open file at its cursor.
    pub fn read(&self, file: &mut OpenFile, buf: &mut [u8]) -> Result<usize> {
        file.read(&self.disk, buf)
    }

    /// Writes to an open file at its cursor.
    pub fn write(&mut self, file: &mut OpenFile, buf: &[u8]) -> Result<usize> {
        file.write(&mut self.disk, buf)
    }

    /// Removes the file or (empty or not) directory entry at `path`,
    /// releasing its data sectors and its header sector.
    pub fn remove(&mut self, path: &str) -> Result<()> {
        let (dir_file, mut directory, leaf) = self.resolve(path)?;
        let sector = directory.find(leaf).ok_or(Error::NotFound)?;

        let header = FileHeader::fetch_from(&self.disk, sector)?;
        let mut free_map = self.free_map()?;
        header.deallocate(&mut free_map, &self.disk)?;
        free_map.clear(sector);
        directory.remove(leaf)?;

        free_map.write_back(&mut self.disk, &self.free_map_file)?;
        directory.write_back(&mut self.disk, &dir_file)?;

        debug!("removed {path}, header sector {sector} freed");
        Ok(())
    }

    /// Removes `path`; a directory is emptied first, depth-first.
    pub fn remove_recursive(&mut self, path: &str) -> Result<()> {
        let (_, directory, leaf) = self.resolve(path)?;

        if directory.is_directory(leaf) {
            let sector = directory.find(leaf).expect("is_directory implies present");
            let dir_file = OpenFile::open(&self.disk, sector)?;
            let table = Directory::fetch_from(&self.disk, &dir_file)?;

            for entry in table.entries() {
                let child = format!("{}/{}", path.trim_end_matches('/'), entry.name());
                if entry.is_directory() {
                    self.remove_recursive(&child)?;
                } else {
                    self.remove(&child)?;
                }
            }
        }

        self.remove(path)
    }

    /// Lists the names in the directory at `path` (`""` or `"/"` for the
    /// root).
    pub fn list(&self, path: &str) -> Result<Vec<String>> {
        let table = self.open_directory(path)?;
        Ok(table.entries().map(|e| e.name().to_string()).collect())
    }

    /// Lists the whole tree under `path`, as slash-joined names relative to
    /// it, depth-first.
    pub fn list_recursive(&self, path: &str) -> Result<Vec<String>> {
        let table = self.open_directory(path)?;
        let mut names = Vec::new();
        self.collect_tree(&table, "", &mut names)?;
        Ok(names)
    }

    fn collect_tree(
        &self,
        table: &Directory,
        prefix: &str,
        names: &mut Vec<String>,
    ) -> Result<()> {
        for entry in table.entries() {
            let name = if prefix.is_empty() {
                entry.name().to_string()
            } else {
                format!("{prefix}/{}", entry.name())
            };

            if entry.is_directory() {
                let file = OpenFile::open(&self.disk, entry.sector())?;
                let sub = Directory::fetch_from(&self.disk, &file)?;
                names.push(name.clone());
                self.collect_tree(&sub, &name, names)?;
            } else {
                names.push(name);
            }
        }
        Ok(())
    }

    fn open_directory(&self, path: &str) -> Result<Directory> {
        if path.split('/').all(|t| t.is_empty()) {
            return Directory::fetch_from(&self.disk, &self.directory_file);
        }

        let (_, directory, leaf) = self.resolve(path)?;
        let sector = directory.find(leaf).ok_or(Error::NotFound)?;
        if !directory.is_directory(leaf) {
            return Err(Error::NotDirectory);
        }

        let file = OpenFile::open(&self.disk, sector)?;
        Directory::fetch_from(&self.disk, &file)
    }

    /// Walks `path` down the directory tree.
    ///
    /// Descends through every token that names a sub-directory; the first
    /// missing or non-directory token is the terminal name, returned with
    /// the directory reached so far (its open file and loaded table).
    fn resolve<'a>(&self, path: &'a str) -> Result<(OpenFile, Directory, &'a str)> {
        let mut tokens = path.split('/').filter(|t| !t.is_empty());
        let mut leaf = tokens.next().ok_or(Error::InvalidName)?;

        let mut dir_file = self.directory_file.clone();
        let mut directory = Directory::fetch_from(&self.disk, &dir_file)?;

        for next in tokens {
            if !directory.is_directory(leaf) {
                break;
            }
            let sector = directory.find(leaf).expect("is_directory implies present");
            dir_file = OpenFile::open(&self.disk, sector)?;
            directory = Directory::fetch_from(&self.disk, &dir_file)?;
            leaf = next;
        }

        Ok((dir_file, directory, leaf))
    }
}
