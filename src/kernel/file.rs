use std::collections::BTreeMap;

use crate::fs::open_file::OpenFile;

/// Tracks opened files, indexed by descriptor.
pub type OpenFileTable = BTreeMap<FileDescriptor, OpenFile>;

/// A unique id used to track opened files.
pub type FileDescriptor = usize;
