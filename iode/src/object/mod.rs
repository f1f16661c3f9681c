//! Binary container read/write (spec.md §6 "Executable container" /
//! "Library container").
//!
//! Grounded on the original source's `executable/ioe_{reader,writer}` and
//! `executable/iodl_{reader,writer}` pair — this module keeps that same
//! reader/writer split, one submodule per container kind, but folds the
//! shared length-prefixed string/constants-table encoding into the
//! `primitives` helpers below rather than duplicating it per format.

mod executable;
mod library;
mod primitives;

pub use executable::{read_executable, write_executable};
pub use library::{read_library, write_library, LibraryChunk};

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use tempfile::tempdir;

    use super::*;
    use crate::common::chunk::Chunk;

    #[test]
    fn executable_round_trips() {
        let mut chunk = Chunk::empty();
        chunk.intern("hello").unwrap();
        chunk.imports.push("util.iodc".to_string());
        chunk.code = vec![0x02, 0x00, 0x00];

        let dir = tempdir().unwrap();
        let path = dir.path().join("a.iode");
        write_executable(&chunk, &path).unwrap();
        let read_back = read_executable(&path).unwrap();

        assert_eq!(read_back.code, chunk.code);
        assert_eq!(read_back.constants, chunk.constants);
        assert_eq!(read_back.imports, chunk.imports);
    }

    #[test]
    fn library_round_trips() {
        let mut exports = HashMap::new();
        exports.insert("greet".to_string(), 7u64);
        let library = LibraryChunk { constants: vec!["hi".to_string()], code: vec![0x00], exports };

        let dir = tempdir().unwrap();
        let path = dir.path().join("a.iodl");
        write_library(&library, &path).unwrap();
        let read_back = read_library(&path).unwrap();

        assert_eq!(read_back.code, library.code);
        assert_eq!(read_back.constants, library.constants);
        assert_eq!(read_back.exports, library.exports);
    }

    #[test]
    fn wrong_magic_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.iode");
        std::fs::write(&path, b"not an iode file at all").unwrap();
        assert!(read_executable(&path).is_err());
    }
}
