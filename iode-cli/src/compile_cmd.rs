//! `iode compile` (spec.md §6 "CLI surface").

use std::path::PathBuf;

use iode::{compile_project, write_executable, write_library};

use crate::{
    cli::CompileArgs,
    manifest::{Kind, Manifest},
    status::Status,
};

pub fn compile(args: CompileArgs) -> Result<(), String> {
    let (manifest, manifest_dir) = Manifest::discover(&args.project)?;
    let sources = manifest.source_paths(&manifest_dir);

    let chunk = compile_project(&sources, &manifest_dir, args.obfuscate).map_err(|e| e.to_string())?;

    let out = match manifest.kind {
        Kind::Executable => {
            let out = PathBuf::from(format!("{}.iode", manifest.name));
            write_executable(&chunk, &out).map_err(|e| e.to_string())?;
            out
        },
        Kind::Library => {
            let out = PathBuf::from(format!("{}.iodl", manifest.name));
            write_library(&chunk, &out).map_err(|e| e.to_string())?;
            out
        },
    };

    Status::success().log(&format!("wrote '{}'", out.display()));
    Ok(())
}
