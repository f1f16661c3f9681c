//! `iode run` (spec.md §6 "CLI surface").

use iode::run_file;

use crate::{cli::RunArgs, memsize::parse_memory_size};

pub fn run(args: RunArgs) -> Result<(), String> {
    let memory_limit = args.memory.as_deref().map(parse_memory_size).transpose()?;
    run_file(&args.file, memory_limit).map_err(|e| e.to_string())
}
