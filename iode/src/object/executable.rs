//! The `.iode` executable container (spec.md §6).

use std::{
    fs::File,
    io::{BufReader, BufWriter},
    path::Path,
};

use super::primitives::{read_bytes, read_string, read_u32, read_u8, write_bytes, write_string, write_u32, write_u8};
use crate::common::{chunk::Chunk, error::IodeError};

const MAGIC: u32 = 0x45444F49; // 'IODE', little-endian
const VERSION: u8 = 0x01;

pub fn write_executable(chunk: &Chunk, path: &Path) -> Result<(), IodeError> {
    let file = File::create(path).map_err(IodeError::Io)?;
    let mut w = BufWriter::new(file);

    write_u32(&mut w, MAGIC).map_err(IodeError::Io)?;
    write_u8(&mut w, VERSION).map_err(IodeError::Io)?;

    write_u32(&mut w, chunk.imports.len() as u32).map_err(IodeError::Io)?;
    for path in &chunk.imports {
        write_string(&mut w, path).map_err(IodeError::Io)?;
    }

    write_u32(&mut w, chunk.constants.len() as u32).map_err(IodeError::Io)?;
    for constant in &chunk.constants {
        write_string(&mut w, constant).map_err(IodeError::Io)?;
    }

    write_bytes(&mut w, &chunk.code).map_err(IodeError::Io)?;
    Ok(())
}

pub fn read_executable(path: &Path) -> Result<Chunk, IodeError> {
    let file = File::open(path).map_err(IodeError::Io)?;
    let mut r = BufReader::new(file);

    let magic = read_u32(&mut r).map_err(IodeError::Io)?;
    if magic != MAGIC {
        return Err(IodeError::object_io(format!(
            "'{}' is not a valid .iode executable: bad magic number",
            path.display()
        )));
    }
    let version = read_u8(&mut r).map_err(IodeError::Io)?;
    if version != VERSION {
        return Err(IodeError::object_io(format!("unsupported .iode version {version}")));
    }

    let truncated = |e: std::io::Error| IodeError::object_io(format!("truncated .iode file: {e}"));

    let import_count = read_u32(&mut r).map_err(truncated)?;
    let mut imports = Vec::with_capacity(import_count as usize);
    for _ in 0..import_count {
        imports.push(read_string(&mut r).map_err(truncated)?);
    }

    let constant_count = read_u32(&mut r).map_err(truncated)?;
    let mut constants = Vec::with_capacity(constant_count as usize);
    for _ in 0..constant_count {
        constants.push(read_string(&mut r).map_err(truncated)?);
    }

    let code = read_bytes(&mut r).map_err(truncated)?;

    Ok(Chunk { code, constants, imports, exports: Default::default() })
}
