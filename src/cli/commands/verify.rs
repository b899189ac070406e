//! Verify command - audit committed entries

use crate::cli::args::VerifyArgs;
use crate::config::Config;
use crate::digest::Digest;
use crate::error::{FerryError, FerryResult};
use crate::store::ContentStore;
use console::style;
use std::process::ExitCode;
use tracing::warn;

/// Execute the verify command
pub async fn execute(args: VerifyArgs, config: &Config) -> FerryResult<ExitCode> {
    let store = ContentStore::open(config.store.root()).await?;

    let digests = if args.digests.is_empty() {
        store.list().await?
    } else {
        args.digests
            .iter()
            .map(|s| s.parse::<Digest>())
            .collect::<FerryResult<Vec<_>>>()?
    };

    let mut bad = 0usize;
    for digest in &digests {
        if !store.exists(digest).await? {
            println!("{} {}", style("[MISSING]").yellow(), digest);
            bad += 1;
            continue;
        }

        match store.verify_entry(digest).await {
            Ok(()) => println!("{} {}", style("[OK]").green(), digest),
            // A committed entry whose manifest cannot be read is as broken as
            // one that hashes wrong
            Err(e @ (FerryError::DigestMismatch { .. } | FerryError::Io { .. })) => {
                warn!("Corrupt store entry: {}", e);
                println!("{} {}: {}", style("[CORRUPT]").red(), digest, e);
                bad += 1;
            }
            Err(e) => return Err(e),
        }
    }

    println!();
    println!("{} checked, {} problem(s)", digests.len(), bad);

    if bad == 0 {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}
