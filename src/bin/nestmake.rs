//! CLI nestmake tool

extern crate die;
extern crate getopts;
extern crate nestmake;

use die::{Die, die};
use nestmake::gnumake::{GnuMake, execution_directory};
use nestmake::pipeline::PipelineMode;
use nestmake::storage::{DirectoryMapping, load_directory_mapping};
use nestmake::{Makefile, PipelineError};
use std::env;
use std::fs;
use std::path;
use std::process::ExitStatus;

/// CLI entrypoint
fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let brief: String = format!(
        "Usage: {} <OPTIONS> (gnumake <make-args> | targetlisting <dir> <makefile> | nestedrules <dir>)",
        env!("CARGO_PKG_NAME")
    );

    let mut opts: getopts::Options = getopts::Options::new();
    opts.optopt(
        "",
        "make-executable",
        "path to the make executable (default: make)",
        "<make-path>",
    );
    opts.optopt(
        "",
        "config-file",
        "path to a custom configuration file",
        "<config-file>",
    );
    opts.optopt(
        "",
        "optimize",
        "pipeline optimization: balanced, memory, or time (default: balanced)",
        "<optimization>",
    );
    opts.optflag("h", "help", "print usage info");
    opts.optflag("v", "version", "print version info");

    let usage: String = opts.usage(&brief);
    let arguments: Vec<String> = env::args().collect();
    let optmatches: getopts::Matches = opts.parse(&arguments[1..]).die(&usage);

    if optmatches.opt_present("h") {
        die!(0; usage);
    }

    if optmatches.opt_present("v") {
        die!(0; format!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")));
    }

    let executable: String = optmatches
        .opt_str("make-executable")
        .unwrap_or_else(|| "make".to_string());
    let optimization: String = optmatches
        .opt_str("optimize")
        .unwrap_or_else(|| "balanced".to_string());
    let mode: PipelineMode = PipelineMode::from_optimization(&optimization).die(&usage);

    let config_file: Option<String> = optmatches.opt_str("config-file");
    let storage: DirectoryMapping =
        load_directory_mapping(config_file.as_deref().map(path::Path::new))
            .die("unable to load configuration");

    let free: Vec<String> = optmatches.free;

    if free.is_empty() {
        die!(1; usage);
    }

    let gnu: GnuMake = GnuMake::new(&executable, mode, storage);
    let command: &str = &free[0];
    let rest: &[String] = &free[1..];

    match command {
        "gnumake" => {
            let make_args: Vec<String> = rest.to_vec();
            let directory: path::PathBuf =
                execution_directory(&make_args).die("unable to resolve execution directory");
            let rule_file: path::PathBuf = gnu
                .update_nested_rule_file(&directory)
                .die("unable to update nested rule file");
            let status: ExitStatus = gnu
                .run_make(&make_args, &rule_file)
                .die("unable to run make");
            std::process::exit(status.code().unwrap_or(1));
        }
        "targetlisting" => {
            if rest.len() != 2 {
                die!(1; usage);
            }

            let directory: path::PathBuf =
                fs::canonicalize(&rest[0]).die("unable to access directory");
            let makefile: Makefile = Makefile::new(directory, &rest[1]);

            if let Err(err) = gnu.update_target_listing_file(&makefile) {
                report(err);
            }
        }
        "nestedrules" => {
            if rest.len() != 1 {
                die!(1; usage);
            }

            let directory: path::PathBuf =
                fs::canonicalize(&rest[0]).die("unable to access directory");

            if let Err(err) = gnu.update_nested_rule_file(&directory) {
                report(err);
            }
        }
        _ => {
            die!(1; usage);
        }
    }
}

/// report prints a pipeline failure and exits unsuccessfully.
fn report(err: PipelineError) -> ! {
    die!(format!("error: {}", err));
}
