//! Argument parsing (spec.md §6 "CLI surface").
//!
//! Grounded on `passerine-aspen`'s `structopt`-derived `Aspen` enum
//! (`cli.rs`), generalized from one flat enum of subcommands into a
//! top-level `Opts` struct so the `-v/--version` and `-d/--debug` flags
//! (spec.md §6) can be parsed before, or alongside, a subcommand.

use std::path::PathBuf;

use structopt::StructOpt;

#[derive(StructOpt, Debug)]
#[structopt(name = "iode", bin_name = "iode", about = "Compiler and virtual machine for the Iode language")]
pub struct Opts {
    /// Print the version and exit without running a subcommand
    #[structopt(short = "v", long = "version")]
    pub version: bool,

    /// Raise the logger to debug level
    #[structopt(short, long, global = true)]
    pub debug: bool,

    #[structopt(subcommand)]
    pub command: Option<Command>,
}

#[derive(StructOpt, Debug)]
pub enum Command {
    /// Reads a project manifest and writes an executable or library container
    Compile(CompileArgs),
    /// Reads an executable container and runs it
    Run(RunArgs),
}

#[derive(StructOpt, Debug)]
pub struct CompileArgs {
    /// Project directory containing the manifest (spec.md §6 "Project manifest")
    #[structopt(default_value = ".", parse(from_os_str))]
    pub project: PathBuf,

    /// Obfuscate emitted global/local names (spec.md §4.4 "identifier-obfuscation map")
    #[structopt(short, long)]
    pub obfuscate: bool,
}

#[derive(StructOpt, Debug)]
pub struct RunArgs {
    /// Path to an `.iode` executable container
    #[structopt(parse(from_os_str))]
    pub file: PathBuf,

    /// Memory limit hint, e.g. `64M` (spec.md §6 "Memory string parsing")
    #[structopt(long)]
    pub memory: Option<String>,
}
