//! The `.iodl` library container (spec.md §6).

use std::{
    collections::HashMap,
    fs::File,
    io::{BufReader, BufWriter},
    path::Path,
};

use super::primitives::{read_bytes, read_string, read_u32, read_u64, read_u8, write_bytes, write_string, write_u32, write_u64, write_u8};
use crate::common::error::IodeError;

const MAGIC: u32 = 0x4C444F49; // 'IODL', little-endian
const VERSION: u8 = 0x01;

/// The contents of a loaded `.iodl` library: code + constants (same shape
/// as an executable's) plus the export table (spec.md §6).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LibraryChunk {
    pub constants: Vec<String>,
    pub code:      Vec<u8>,
    pub exports:   HashMap<String, u64>,
}

pub fn write_library(library: &LibraryChunk, path: &Path) -> Result<(), IodeError> {
    let file = File::create(path).map_err(IodeError::Io)?;
    let mut w = BufWriter::new(file);

    write_u32(&mut w, MAGIC).map_err(IodeError::Io)?;
    write_u8(&mut w, VERSION).map_err(IodeError::Io)?;

    // Lexicographic export order keeps builds reproducible (spec.md §5).
    let mut exports: Vec<_> = library.exports.iter().collect();
    exports.sort_by(|a, b| a.0.cmp(b.0));

    write_u32(&mut w, exports.len() as u32).map_err(IodeError::Io)?;
    for (name, entry_ip) in exports {
        write_string(&mut w, name).map_err(IodeError::Io)?;
        write_u64(&mut w, *entry_ip).map_err(IodeError::Io)?;
    }

    write_u32(&mut w, library.constants.len() as u32).map_err(IodeError::Io)?;
    for constant in &library.constants {
        write_string(&mut w, constant).map_err(IodeError::Io)?;
    }

    write_bytes(&mut w, &library.code).map_err(IodeError::Io)?;
    Ok(())
}

pub fn read_library(path: &Path) -> Result<LibraryChunk, IodeError> {
    let file = File::open(path).map_err(IodeError::Io)?;
    let mut r = BufReader::new(file);

    let magic = read_u32(&mut r).map_err(IodeError::Io)?;
    if magic != MAGIC {
        return Err(IodeError::object_io(format!(
            "'{}' is not a valid .iodl library: bad magic number",
            path.display()
        )));
    }
    let version = read_u8(&mut r).map_err(IodeError::Io)?;
    if version != VERSION {
        return Err(IodeError::object_io(format!("unsupported .iodl version {version}")));
    }

    let truncated = |e: std::io::Error| IodeError::object_io(format!("truncated .iodl file: {e}"));

    let export_count = read_u32(&mut r).map_err(truncated)?;
    let mut exports = HashMap::with_capacity(export_count as usize);
    for _ in 0..export_count {
        let name = read_string(&mut r).map_err(truncated)?;
        let entry_ip = read_u64(&mut r).map_err(truncated)?;
        exports.insert(name, entry_ip);
    }

    let constant_count = read_u32(&mut r).map_err(truncated)?;
    let mut constants = Vec::with_capacity(constant_count as usize);
    for _ in 0..constant_count {
        constants.push(read_string(&mut r).map_err(truncated)?);
    }

    let code = read_bytes(&mut r).map_err(truncated)?;

    Ok(LibraryChunk { constants, code, exports })
}
