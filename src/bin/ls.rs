use vaka::{disk::image::ImageDisk, fs::FileSystem};

fn usage() -> ! {
    eprintln!("ls.vaka image [path]");
    std::process::exit(1);
}

fn main() {
    env_logger::init();

    let mut image_path = None;
    let mut list_path = None;
    let args = std::env::args().skip(1);
    for arg in args {
        if image_path.is_none() {
            image_path = Some(arg);
        } else if list_path.is_none() {
            list_path = Some(arg);
        } else {
            eprintln!("ls.vaka: too many arguments");
            usage();
        }
    }

    let image_path = if let Some(path) = image_path {
        path
    } else {
        eprintln!("ls.vaka: no image specified");
        std::process::exit(1);
    };
    let list_path = list_path.unwrap_or_else(|| "/".to_string());

    let disk = match ImageDisk::open(&image_path) {
        Ok(disk) => disk,
        Err(e) => {
            eprintln!(
                "ls.vaka: failed to open image {}: {}",
                image_path,
                std::io::Error::from_raw_os_error(e)
            );
            std::process::exit(1);
        }
    };

    let fs = match FileSystem::mount(disk) {
        Ok(fs) => fs,
        Err(e) => {
            eprintln!(
                "ls.vaka: failed to read filesystem from image {}: {}",
                image_path,
                std::io::Error::from_raw_os_error(e.into())
            );
            std::process::exit(1);
        }
    };

    match fs.list_recursive(&list_path) {
        Ok(names) => {
            for name in names {
                println!("{name}");
            }
        }
        Err(e) => {
            eprintln!(
                "ls.vaka: failed to list {}: {}",
                list_path,
                std::io::Error::from_raw_os_error(e.into())
            );
            std::process::exit(1);
        }
    }
}
