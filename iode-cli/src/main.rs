use structopt::StructOpt;

pub mod cli;
pub mod compile_cmd;
pub mod manifest;
pub mod memsize;
pub mod run_cmd;
pub mod status;

use crate::{cli::Opts, status::Status};

pub const PKG_NAME: &str = "iode";
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

fn init_tracing(debug: bool) {
    let level = if debug { "debug" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).without_time().init();
}

fn main() {
    let opts = Opts::from_args();

    if opts.version {
        println!("{PKG_NAME}");
        println!("{PKG_VERSION}");
        return;
    }

    init_tracing(opts.debug);

    let result = match opts.command {
        Some(cli::Command::Compile(args)) => compile_cmd::compile(args),
        Some(cli::Command::Run(args)) => run_cmd::run(args),
        None => {
            Status::fatal().log("no subcommand given; run 'iode --help' for usage");
            std::process::exit(1);
        },
    };

    if let Err(message) = result {
        Status::fatal().log(&message);
        std::process::exit(1);
    }
}
