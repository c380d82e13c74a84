use vaka::{
    disk::{NUM_SECTORS, image::ImageDisk},
    fs::FileSystem,
};

fn usage() -> ! {
    eprintln!("mkfs.vaka image");
    std::process::exit(1);
}

fn main() {
    env_logger::init();

    let mut image_path = None;
    let args = std::env::args().skip(1);
    for arg in args {
        if image_path.is_none() {
            image_path = Some(arg);
        } else {
            eprintln!("mkfs.vaka: too many arguments");
            usage();
        }
    }

    let image_path = if let Some(path) = image_path {
        path
    } else {
        eprintln!("mkfs.vaka: no image specified");
        std::process::exit(1);
    };

    let disk = match ImageDisk::create(&image_path, NUM_SECTORS as u32) {
        Ok(disk) => disk,
        Err(e) => {
            eprintln!(
                "mkfs.vaka: failed to create image {}: {}",
                image_path,
                std::io::Error::from_raw_os_error(e)
            );
            std::process::exit(1);
        }
    };

    match FileSystem::format(disk) {
        Ok(fs) => {
            let free = fs.free_map().map(|m| m.count_clear()).unwrap_or(0);
            eprintln!(
                "mkfs.vaka: created filesystem on {} with {} sectors ({} free)",
                image_path, NUM_SECTORS, free
            );
        }
        Err(e) => {
            eprintln!(
                "mkfs.vaka: failed to create filesystem on {}: {}",
                image_path,
                std::io::Error::from_raw_os_error(e.into())
            );
            std::process::exit(1);
        }
    }
}
