use log::debug;

use crate::{
    disk::Disk,
    fs::error::{Error, Result},
    kernel::{Kernel, file::FileDescriptor},
    sched::machine::Machine,
};

/// The user-visible file surface. Recoverable failures come back as typed
/// errors from create/open/close and as −1 from read/write, matching the
/// trap interface.
impl<D: Disk, M: Machine> Kernel<D, M> {
    /// Creates a file of `size` bytes.
    pub fn sys_create(&mut self, path: &str, size: i32) -> Result<()> {
        self.fs.create(path, size)
    }

    /// Opens a file, returning a fresh descriptor. Descriptors are never
    /// reused within a boot.
    pub fn sys_open(&mut self, path: &str) -> Result<FileDescriptor> {
        let file = self.fs.open(path)?;
        let descriptor = self.next_descriptor;
        self.next_descriptor += 1;
        self.open_files.insert(descriptor, file);
        debug!("opened {path} as descriptor {descriptor}");
        Ok(descriptor)
    }

    /// Reads from an open file at its cursor; −1 when the descriptor is
    /// stale or the transfer fails.
    pub fn sys_read(&mut self, buf: &mut [u8], descriptor: FileDescriptor) -> isize {
        let Some(file) = self.open_files.get_mut(&descriptor) else {
            return -1;
        };
        match self.fs.read(file, buf) {
            Ok(read) => read as isize,
            Err(_) => -1,
        }
    }

    /// Writes to an open file at its cursor; −1 when the descriptor is
    /// stale or the transfer fails.
    pub fn sys_write(&mut self, buf: &[u8], descriptor: FileDescriptor) -> isize {
        let Some(file) = self.open_files.get_mut(&descriptor) else {
            return -1;
        };
        match self.fs.write(file, buf) {
            Ok(written) => written as isize,
            Err(_) => -1,
        }
    }

    /// Closes a descriptor.
    pub fn sys_close(&mut self, descriptor: FileDescriptor) -> Result<()> {
        self.open_files
            .remove(&descriptor)
            .map(|_| ())
            .ok_or(Error::NotFound)
    }

    /// Stops the machine.
    pub fn sys_halt(&mut self) {
        debug!("machine halting");
        self.halted = true;
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }
}
