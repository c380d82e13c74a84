use vaka::{
    disk::{NUM_SECTORS, SECTOR_SIZE, image::ImageDisk, ram::RamDisk},
    fs::{DIRECTORY_SECTOR, FREE_MAP_SECTOR, FileSystem, error::Error},
    kernel::Kernel,
    sched::machine::SimMachine,
};

/// Sectors a fresh filesystem occupies: the two well-known header sectors,
/// one sector of bitmap data and eight sectors of root directory data.
const BASELINE_SECTORS: usize = 11;

fn fresh_fs() -> FileSystem<RamDisk> {
    FileSystem::format(RamDisk::default()).expect("failed to format")
}

fn used_sectors(fs: &FileSystem<RamDisk>) -> usize {
    NUM_SECTORS - fs.free_map().unwrap().count_clear()
}

#[test]
fn test_format_baseline() {
    let fs = fresh_fs();

    let map = fs.free_map().unwrap();
    assert!(map.test(FREE_MAP_SECTOR));
    assert!(map.test(DIRECTORY_SECTOR));
    assert_eq!(used_sectors(&fs), BASELINE_SECTORS);
    assert_eq!(fs.list("/").unwrap(), Vec::<String>::new());
}

#[test]
fn test_create_write_read_roundtrip() {
    let mut fs = fresh_fs();
    fs.create("x", 500).unwrap();

    let mut file = fs.open("x").unwrap();
    assert_eq!(file.length(), 500);

    let data = [b'A'; 500];
    assert_eq!(fs.write(&mut file, &data).unwrap(), 500);
    drop(file);

    let mut file = fs.open("x").unwrap();
    let mut buf = [0u8; 500];
    assert_eq!(fs.read(&mut file, &mut buf).unwrap(), 500);
    assert_eq!(buf, data);

    // Data sectors plus the header sector.
    let expected = 500usize.div_ceil(SECTOR_SIZE) + 1;
    assert_eq!(used_sectors(&fs) - BASELINE_SECTORS, expected);
}

#[test]
fn test_create_duplicate() {
    let mut fs = fresh_fs();
    fs.create("twin", 10).unwrap();
    assert_eq!(fs.create("twin", 10), Err(Error::AlreadyExists));
}

#[test]
fn test_failed_create_leaves_the_map_untouched() {
    let mut fs = fresh_fs();

    // More bytes than the disk has sectors for.
    let oversized = (NUM_SECTORS * SECTOR_SIZE) as i32;
    assert_eq!(fs.create("big", oversized), Err(Error::NoSpace));

    assert_eq!(used_sectors(&fs), BASELINE_SECTORS);
    assert_eq!(fs.open("big").unwrap_err(), Error::NotFound);
}

#[test]
fn test_multi_level_file() {
    let mut fs = fresh_fs();

    // 10_000 bytes force one layer of sub-headers.
    fs.create("big", 10_000).unwrap();

    let mut file = fs.open("big").unwrap();
    let mut data = vec![0u8; 10_000];
    for (i, byte) in data.iter_mut().enumerate() {
        *byte = (i % 251) as u8;
    }
    assert_eq!(fs.write(&mut file, &data).unwrap(), 10_000);

    let mut file = fs.open("big").unwrap();
    let mut buf = vec![0u8; 10_000];
    assert_eq!(fs.read(&mut file, &mut buf).unwrap(), 10_000);
    assert_eq!(buf, data);

    fs.remove("big").unwrap();
    assert_eq!(used_sectors(&fs), BASELINE_SECTORS);
}

#[test]
fn test_remove_frees_every_sector() {
    let mut fs = fresh_fs();

    fs.create("x", 500).unwrap();
    assert!(used_sectors(&fs) > BASELINE_SECTORS);

    fs.remove("x").unwrap();
    assert_eq!(used_sectors(&fs), BASELINE_SECTORS);
    assert_eq!(fs.open("x").unwrap_err(), Error::NotFound);
    assert_eq!(fs.remove("x"), Err(Error::NotFound));
}

#[test]
fn test_directory_tree() {
    let mut fs = fresh_fs();

    fs.create_dir("a").unwrap();
    fs.create_dir("a/b").unwrap();
    fs.create("a/b/f", 200).unwrap();
    fs.create("a/top", 10).unwrap();

    assert_eq!(fs.list("/").unwrap(), ["a"]);
    assert_eq!(fs.list("a").unwrap(), ["b", "top"]);
    assert_eq!(fs.list("a/b").unwrap(), ["f"]);
    assert_eq!(
        fs.list_recursive("/").unwrap(),
        ["a", "a/b", "a/b/f", "a/top"]
    );

    let file = fs.open("a/b/f").unwrap();
    assert_eq!(file.length(), 200);

    assert_eq!(fs.list("a/b/f").unwrap_err(), Error::NotDirectory);
}

#[test]
fn test_recursive_remove() {
    let mut fs = fresh_fs();

    fs.create_dir("a").unwrap();
    fs.create_dir("a/b").unwrap();
    fs.create("a/b/f", 500).unwrap();

    fs.remove_recursive("a").unwrap();

    assert_eq!(fs.open("a/b/f").unwrap_err(), Error::NotFound);
    assert_eq!(fs.open("a").unwrap_err(), Error::NotFound);
    assert_eq!(used_sectors(&fs), BASELINE_SECTORS);
}

#[test]
fn test_image_survives_remount() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("disk.img");
    let path = path.to_str().unwrap();

    {
        let disk = ImageDisk::create(path, NUM_SECTORS as u32).unwrap();
        let mut fs = FileSystem::format(disk).unwrap();
        fs.create("keep", 300).unwrap();
        let mut file = fs.open("keep").unwrap();
        fs.write(&mut file, &[b'K'; 300]).unwrap();
    }

    let disk = ImageDisk::open(path).unwrap();
    let fs = FileSystem::mount(disk).unwrap();
    assert_eq!(fs.list("/").unwrap(), ["keep"]);

    let mut file = fs.open("keep").unwrap();
    let mut buf = [0u8; 300];
    assert_eq!(fs.read(&mut file, &mut buf).unwrap(), 300);
    assert!(buf.iter().all(|&b| b == b'K'));
}

#[test]
fn test_syscall_surface() {
    let mut kernel = Kernel::new(RamDisk::default(), SimMachine::new(), true).unwrap();

    kernel.sys_create("notes", 64).unwrap();

    let fd = kernel.sys_open("notes").unwrap();
    assert_eq!(kernel.sys_write(b"written via trap", fd), 16);

    // The cursor is per descriptor.
    let fd2 = kernel.sys_open("notes").unwrap();
    assert_ne!(fd, fd2);
    let mut buf = [0u8; 16];
    assert_eq!(kernel.sys_read(&mut buf, fd2), 16);
    assert_eq!(&buf, b"written via trap");

    kernel.sys_close(fd).unwrap();
    kernel.sys_close(fd2).unwrap();

    // A stale descriptor fails with -1, not a typed error.
    assert_eq!(kernel.sys_read(&mut buf, fd), -1);
    assert_eq!(kernel.sys_write(b"x", fd), -1);
    assert_eq!(kernel.sys_open("absent").unwrap_err(), Error::NotFound);

    kernel.sys_halt();
    assert!(kernel.is_halted());
}
