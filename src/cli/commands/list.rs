//! List command - show committed store entries

use crate::cli::args::{ListArgs, OutputFormat};
use crate::config::Config;
use crate::digest::Digest;
use crate::error::FerryResult;
use crate::store::ContentStore;
use console::style;
use std::process::ExitCode;

/// Execute the list command
pub async fn execute(args: ListArgs, config: &Config) -> FerryResult<ExitCode> {
    let store = ContentStore::open(config.store.root()).await?;
    let digests = store.list().await?;

    if digests.is_empty() {
        match args.format {
            OutputFormat::Json => println!("[]"),
            OutputFormat::Plain => {}
            OutputFormat::Table => println!("No cached artifacts in {}", store.root().display()),
        }
        return Ok(ExitCode::SUCCESS);
    }

    match args.format {
        OutputFormat::Table => print_table(&store, &digests),
        OutputFormat::Json => print_json(&store, &digests)?,
        OutputFormat::Plain => print_plain(&digests),
    }

    Ok(ExitCode::SUCCESS)
}

fn print_table(store: &ContentStore, digests: &[Digest]) {
    println!(
        "{:<10} {:<66}",
        style("ALGORITHM").bold(),
        style("HASH").bold()
    );
    println!("{}", "-".repeat(77));

    for digest in digests {
        println!("{:<10} {:<66}", digest.algorithm(), digest.hex());
    }

    println!();
    println!("{} entr(ies) in {}", digests.len(), store.root().display());
}

fn print_json(store: &ContentStore, digests: &[Digest]) -> FerryResult<()> {
    #[derive(serde::Serialize)]
    struct EntryJson {
        digest: String,
        path: String,
    }

    let entries: Vec<EntryJson> = digests
        .iter()
        .map(|d| EntryJson {
            digest: d.to_string(),
            path: store.entry_path(d).display().to_string(),
        })
        .collect();

    println!("{}", serde_json::to_string_pretty(&entries)?);
    Ok(())
}

fn print_plain(digests: &[Digest]) {
    for digest in digests {
        println!("{}", digest);
    }
}
