//! Fetch command - populate the store from a request file

use crate::audit::AuditLog;
use crate::cli::args::{FetchArgs, OutputFormat};
use crate::config::Config;
use crate::descriptor::{load_requests, RequestSet};
use crate::digest::Digest;
use crate::error::FerryResult;
use crate::fetch::{FetchCoordinator, FetchReport, Outcome};
use crate::retrieve::{RetrieverRegistry, SkopeoRetriever};
use crate::store::ContentStore;
use console::style;
use std::collections::BTreeMap;
use std::process::ExitCode;
use std::time::Duration;
use tracing::debug;

/// Execute the fetch command
pub async fn execute(args: FetchArgs, config: &Config) -> FerryResult<ExitCode> {
    let requests = load_requests(&args.requests).await?;
    debug!(
        "Loaded {} request(s) from {}",
        requests.len(),
        args.requests.display()
    );

    let coordinator = coordinator(&args, config).await?;
    let names = request_names(&requests);
    let report = coordinator.fetch(requests).await;

    match args.format {
        OutputFormat::Table => print_table(&report, &names),
        OutputFormat::Json => print_json(&report, &names)?,
        OutputFormat::Plain => print_plain(&report),
    }

    report.into_result()?;
    Ok(ExitCode::SUCCESS)
}

async fn coordinator(args: &FetchArgs, config: &Config) -> FerryResult<FetchCoordinator> {
    let store = ContentStore::open(config.store.root()).await?;
    let retrievers =
        RetrieverRegistry::with_skopeo(SkopeoRetriever::new(config.retriever.skopeo.clone()));

    let mut options = config.fetch.options();
    if let Some(workers) = args.workers {
        options = options.with_workers(workers);
    }
    if let Some(secs) = args.timeout {
        options = options.with_retrieval_timeout(Duration::from_secs(secs));
    }

    Ok(FetchCoordinator::new(store, retrievers)
        .with_options(options)
        .with_audit(AuditLog::new(config)))
}

fn request_names(requests: &RequestSet) -> BTreeMap<Digest, String> {
    requests
        .iter()
        .map(|(d, r)| (d.clone(), r.name().to_string()))
        .collect()
}

fn print_table(report: &FetchReport, names: &BTreeMap<Digest, String>) {
    println!(
        "{:<22} {:<16} {:<40}",
        style("DIGEST").bold(),
        style("STATUS").bold(),
        style("NAME").bold()
    );
    println!("{}", "-".repeat(78));

    for (digest, outcome) in report.iter() {
        let status = match outcome {
            Outcome::Cached => style(outcome.label()).dim(),
            Outcome::Fetched(_) => style(outcome.label()).green(),
            Outcome::Failed(_) => style(outcome.label()).red(),
        };
        let name = names.get(digest).map(String::as_str).unwrap_or("");
        println!("{:<22} {:<16} {:<40}", digest.short(), status, name);
    }

    println!();
    println!(
        "{} fetched, {} cached, {} failed",
        report.fetched().len(),
        report.cached().len(),
        report.failures().count()
    );
}

fn print_json(
    report: &FetchReport,
    names: &BTreeMap<Digest, String>,
) -> FerryResult<()> {
    #[derive(serde::Serialize)]
    struct OutcomeJson {
        digest: String,
        name: String,
        status: &'static str,
        error: Option<String>,
    }

    let entries: Vec<OutcomeJson> = report
        .iter()
        .map(|(digest, outcome)| OutcomeJson {
            digest: digest.to_string(),
            name: names.get(digest).cloned().unwrap_or_default(),
            status: outcome.label(),
            error: match outcome {
                Outcome::Failed(e) => Some(e.to_string()),
                _ => None,
            },
        })
        .collect();

    println!("{}", serde_json::to_string_pretty(&entries)?);
    Ok(())
}

fn print_plain(report: &FetchReport) {
    for (digest, outcome) in report.iter() {
        println!("{} {}", digest, outcome.label());
    }
}
