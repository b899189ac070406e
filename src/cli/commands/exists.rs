//! Exists command - membership test for scripts

use crate::cli::args::ExistsArgs;
use crate::config::Config;
use crate::digest::Digest;
use crate::error::FerryResult;
use crate::store::ContentStore;
use std::process::ExitCode;

/// Execute the exists command
///
/// Prints the entry path and exits 0 when present, exits 1 silently otherwise.
pub async fn execute(args: ExistsArgs, config: &Config) -> FerryResult<ExitCode> {
    let digest: Digest = args.digest.parse()?;
    let store = ContentStore::open(config.store.root()).await?;

    if store.exists(&digest).await? {
        println!("{}", store.entry_path(&digest).display());
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}
