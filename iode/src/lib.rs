//! The Iode toolchain core: front end, semantic analyzer, bytecode
//! generator, object container I/O, and the stack virtual machine
//! (spec.md §2 "System overview").
//!
//! Grounded on the teacher's `passerine` crate root, which re-exports its
//! stages (`compiler`, `construct`, `vm`) and exposes one driver function
//! per pipeline shape (`compile`, `run`). This crate keeps that shape: one
//! public module per stage, plus the two top-level driver functions below
//! that compose them the way `passerine-aspen`'s `build.rs` composes
//! `passerine::compile` and `passerine::run`.

pub mod analyzer;
pub mod common;
pub mod generator;
pub mod lexer;
pub mod object;
pub mod parser;
pub mod vm;

use std::path::{Path, PathBuf};

use tracing::debug;

pub use common::{
    ast::{Expr, Param, Stmt},
    chunk::Chunk,
    error::{IodeError, Location},
};

/// Concatenates the ASTs of a multi-file project's source list before
/// semantic analysis (spec.md §2 "A linker composes the first four stages
/// over a list of source files by concatenating their ASTs"). Statements
/// are kept in file order, files in list order, so forward references
/// across file boundaries within a single project resolve exactly like
/// forward references within one file.
pub fn link(sources: &[PathBuf]) -> Result<Vec<Stmt>, IodeError> {
    let mut statements = Vec::new();
    for source in sources {
        debug!(file = %source.display(), "linker: reading source");
        let text = std::fs::read_to_string(source).map_err(IodeError::Io)?;
        let tokens = lexer::lex(&text)?;
        statements.extend(parser::parse(tokens)?);
    }
    Ok(statements)
}

/// Runs the full compile pipeline (lex+parse → link → analyze →
/// generate) over a project's source file list and returns the resulting
/// chunk, with its `exports` table populated when any top-level function
/// is exported. `base_path` is the directory imports in this project
/// resolve against (the manifest's directory, per spec.md §6 "Project
/// manifest").
pub fn compile_project(sources: &[PathBuf], base_path: &Path, obfuscate: bool) -> Result<Chunk, IodeError> {
    debug!(file_count = sources.len(), ?base_path, obfuscate, "compile: linking sources");
    let statements = link(sources)?;

    debug!("compile: analyzing");
    let analysis = analyzer::analyze(&statements, base_path)?;

    debug!(import_count = analysis.imports.len(), "compile: generating bytecode");
    let chunk = generator::compile(&statements, analysis.imports, obfuscate)?;

    debug!(code_len = chunk.code.len(), constant_count = chunk.constants.len(), "compile: done");
    Ok(chunk)
}

/// Writes `chunk` to `path` as an executable container, discarding any
/// export table (spec.md §6 "Executable container" has no export
/// section).
pub fn write_executable(chunk: &Chunk, path: &Path) -> Result<(), IodeError> { object::write_executable(chunk, path) }

/// Writes `chunk` to `path` as a library container, keeping its export
/// table (spec.md §6 "Library container").
pub fn write_library(chunk: &Chunk, path: &Path) -> Result<(), IodeError> {
    let library = object::LibraryChunk {
        constants: chunk.constants.clone(),
        code:      chunk.code.clone(),
        exports:   chunk.exports.clone(),
    };
    object::write_library(&library, path)
}

/// Reads an executable container and runs it to completion (spec.md §2
/// "either compile ... or run: read a container, hand it to the VM").
pub fn run_file(path: &Path, memory_limit: Option<u64>) -> Result<(), IodeError> {
    debug!(file = %path.display(), ?memory_limit, "run: reading container");
    let chunk = object::read_executable(path)?;

    debug!("run: starting vm");
    let mut machine = vm::VirtualMachine::new(memory_limit);
    machine.run(&chunk)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn write_source(dir: &tempfile::TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn linker_concatenates_sources_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_source(&dir, "a.iodc", "def f(): String { return \"ok\" }\n");
        let b = write_source(&dir, "b.iodc", "writeOut(f())\nflush()\n");
        let statements = link(&[a, b]).unwrap();
        assert_eq!(statements.len(), 3);
    }

    #[test]
    fn compile_and_run_round_trips_through_an_executable_container() {
        let dir = tempfile::tempdir().unwrap();
        let src = write_source(&dir, "main.iodc", "writeOut(\"hi\")\nflush()\n");
        let chunk = compile_project(&[src], dir.path(), false).unwrap();
        let out = dir.path().join("main.iode");
        write_executable(&chunk, &out).unwrap();
        assert!(run_file(&out, None).is_ok());
    }

    #[test]
    fn library_export_table_survives_a_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let src = write_source(&dir, "lib.iodc", "@export\ndef greet(name: String): String { return name }\n");
        let chunk = compile_project(&[src], dir.path(), false).unwrap();
        assert!(chunk.exports.contains_key("greet"));
        let out = dir.path().join("lib.iodl");
        write_library(&chunk, &out).unwrap();
        let read_back = object::read_library(&out).unwrap();
        assert!(read_back.exports.contains_key("greet"));
    }
}
