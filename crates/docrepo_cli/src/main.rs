//! Inspection CLI for a document store file.
//!
//! Usage: `docrepo_cli [db-path]`
//!
//! Prints the core version and, given a path, every collection with its
//! document count. Set `DOCREPO_LOG_DIR` to an absolute path to enable file
//! logging.

use docrepo_core::{core_version, default_log_level, init_logging, Repository, Store, StoreConfig};
use log::error;
use std::process::ExitCode;

fn main() -> ExitCode {
    if let Ok(log_dir) = std::env::var("DOCREPO_LOG_DIR") {
        if let Err(err) = init_logging(default_log_level(), &log_dir) {
            eprintln!("logging disabled: {err}");
        }
    }

    println!("docrepo_core version={}", core_version());

    let Some(path) = std::env::args().nth(1) else {
        return ExitCode::SUCCESS;
    };

    match print_collections(&path) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("event=cli_inspect module=cli status=error error={err}");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn print_collections(path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let store = Store::open(path, StoreConfig::default())?;
    for name in store.collection_names()? {
        let repo = Repository::try_new(&store, &name)?;
        println!("{name} count={}", repo.count()?);
    }
    Ok(())
}
