use crate::{
    disk::{Disk, SECTOR_SIZE, Sector, SectorAddr},
    fs::{error::Result, header::FileHeader},
};

/// A cursor over a file: the header (read into memory at open) plus a byte
/// position. Files have a fixed size, so writes past the end are clamped
/// rather than extending the file.
#[derive(Clone, Debug)]
pub struct OpenFile {
    header: FileHeader,
    pos: usize,
}

impl OpenFile {
    /// Opens the file whose header lives in the sector at `addr`.
    pub fn open(disk: &impl Disk, addr: SectorAddr) -> Result<Self> {
        let header = FileHeader::fetch_from(disk, addr)?;
        Ok(Self { header, pos: 0 })
    }

    /// Returns the file length in bytes.
    pub fn length(&self) -> usize {
        self.header.len()
    }

    /// Moves the cursor to `pos`.
    pub fn seek(&mut self, pos: usize) {
        self.pos = pos;
    }

    /// Reads from the cursor, advancing it. Returns how many bytes were read.
    pub fn read(&mut self, disk: &impl Disk, buf: &mut [u8]) -> Result<usize> {
        let read = self.read_at(disk, buf, self.pos)?;
        self.pos += read;
        Ok(read)
    }

    /// Writes at the cursor, advancing it. Returns how many bytes were
    /// written.
    pub fn write(&mut self, disk: &mut impl Disk, buf: &[u8]) -> Result<usize> {
        let written = self.write_at(disk, buf, self.pos)?;
        self.pos += written;
        Ok(written)
    }

    /// Reads up to `buf.len()` bytes starting at byte `offset`, without
    /// touching the cursor. Reads past the end of the file are truncated.
    pub fn read_at(&self, disk: &impl Disk, buf: &mut [u8], offset: usize) -> Result<usize> {
        let length = self.length();
        if offset >= length {
            return Ok(0);
        }

        let to_read = (length - offset).min(buf.len());
        let mut buf = &mut buf[..to_read];
        let mut offset = offset;
        let mut read = 0;
        let mut sector = Sector::default();

        while !buf.is_empty() {
            let offset_in_sector = offset % SECTOR_SIZE;
            let remain_in_sector = SECTOR_SIZE - offset_in_sector;
            let chunk = remain_in_sector.min(buf.len());

            let addr = self.header.byte_to_sector(disk, offset as i32)?;
            disk.read_sector(&mut sector, addr)?;

            let (dst, remain) = buf.split_at_mut(chunk);
            dst.copy_from_slice(&sector.data[offset_in_sector..offset_in_sector + chunk]);

            buf = remain;
            read += chunk;
            offset += chunk;
        }

        Ok(read)
    }

    /// Writes up to `buf.len()` bytes starting at byte `offset`, without
    /// touching the cursor. Writes past the fixed end of the file are
    /// truncated. Partial sectors are read, patched and written back.
    pub fn write_at(&self, disk: &mut impl Disk, buf: &[u8], offset: usize) -> Result<usize> {
        let length = self.length();
        if offset >= length {
            return Ok(0);
        }

        let to_write = (length - offset).min(buf.len());
        let mut buf = &buf[..to_write];
        let mut offset = offset;
        let mut written = 0;
        let mut sector = Sector::default();

        while !buf.is_empty() {
            let offset_in_sector = offset % SECTOR_SIZE;
            let remain_in_sector = SECTOR_SIZE - offset_in_sector;
            let chunk = remain_in_sector.min(buf.len());

            let addr = self.header.byte_to_sector(disk, offset as i32)?;
            if chunk != SECTOR_SIZE {
                disk.read_sector(&mut sector, addr)?;
            }

            let (src, remain) = buf.split_at(chunk);
            sector.data[offset_in_sector..offset_in_sector + chunk].copy_from_slice(src);
            disk.write_sector(&sector, addr)?;

            buf = remain;
            written += chunk;
            offset += chunk;
        }

        Ok(written)
    }
}
