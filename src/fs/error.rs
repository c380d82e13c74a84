pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    Disk(libc::c_int),

    // Allocation
    NoSpace,

    // Directory
    NotFound,
    AlreadyExists,
    DirectoryFull,
    InvalidName,
    NotDirectory,
}

impl From<libc::c_int> for Error {
    fn from(errno: libc::c_int) -> Self {
        Self::Disk(errno)
    }
}

impl From<Error> for libc::c_int {
    fn from(err: Error) -> Self {
        match err {
            Error::Disk(errno) => errno,
            Error::NoSpace => libc::ENOSPC,
            Error::NotFound => libc::ENOENT,
            Error::AlreadyExists => libc::EEXIST,
            Error::DirectoryFull => libc::ENOSPC,
            Error::InvalidName => libc::ENAMETOOLONG,
            Error::NotDirectory => libc::ENOTDIR,
        }
    }
}
