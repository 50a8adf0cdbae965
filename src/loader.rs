use std::{
    fs::File,
    io::{self, Read, Seek, SeekFrom},
    path::{Path, PathBuf},
};

use log::info;
use thiserror::Error;

use crate::mem::Region;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("could not read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{path} holds {size} bytes, cannot read {count} bytes at offset {off:#x}")]
    Truncated {
        path: PathBuf,
        size: u64,
        off: u64,
        count: usize,
    },
    #[error("{count} bytes at {pos:#06x} do not fit in region {base:#06x}+{byte_cnt:#x}")]
    Overflow {
        pos: u16,
        count: usize,
        base: u16,
        byte_cnt: usize,
    },
}

/// Copies `count` bytes from file offset `off` into `region` at bus address
/// `pos`. Nothing is written unless the whole copy fits on both ends.
pub fn load_image(
    region: &mut Region,
    pos: u16,
    path: impl AsRef<Path>,
    off: u64,
    count: usize,
) -> Result<(), LoadError> {
    let path = path.as_ref();
    let io_err = |source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    };

    let region_end = region.base() as usize + region.get_byte_count();
    let fits = (pos as usize)
        .checked_add(count)
        .is_some_and(|end| end <= region_end);
    if !region.contains(pos) || !fits {
        return Err(LoadError::Overflow {
            pos,
            count,
            base: region.base(),
            byte_cnt: region.get_byte_count(),
        });
    }

    let mut file = File::open(path).map_err(io_err)?;
    let size = file.metadata().map_err(io_err)?.len();
    let in_file = off
        .checked_add(count as u64)
        .is_some_and(|end| end <= size);
    if !in_file {
        return Err(LoadError::Truncated {
            path: path.to_path_buf(),
            size,
            off,
            count,
        });
    }

    let mut bytes = vec![0; count];
    file.seek(SeekFrom::Start(off)).map_err(io_err)?;
    file.read_exact(&mut bytes).map_err(io_err)?;

    region.load(pos, &bytes).map_err(|_| LoadError::Overflow {
        pos,
        count,
        base: region.base(),
        byte_cnt: region.get_byte_count(),
    })?;

    info!(
        "Loaded {count:#x} bytes from {} (offset {off:#x}) at {pos:#06x}",
        path.display()
    );
    Ok(())
}

/// Size of the image file in bytes.
pub fn image_len(path: impl AsRef<Path>) -> Result<u64, LoadError> {
    let path = path.as_ref();
    let meta = std::fs::metadata(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(meta.len())
}

/// Loads a whole file so that it ends at the top of `region`, the usual
/// layout for ROM images carrying their own vectors.
pub fn load_rom_image(region: &mut Region, path: impl AsRef<Path>) -> Result<u16, LoadError> {
    let path = path.as_ref();
    let size = image_len(path)? as usize;

    let region_end = region.base() as usize + region.get_byte_count();
    let pos = region_end.checked_sub(size).filter(|p| *p >= region.base() as usize);
    let Some(pos) = pos else {
        return Err(LoadError::Overflow {
            pos: region.base(),
            count: size,
            base: region.base(),
            byte_cnt: region.get_byte_count(),
        });
    };

    load_image(region, pos as u16, path, 0, size)?;
    Ok(pos as u16)
}
