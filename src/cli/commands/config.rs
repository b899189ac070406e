//! Config command - show or edit configuration

use crate::cli::args::{ConfigAction, ConfigArgs};
use crate::config::{Config, ConfigManager};
use crate::error::{FerryError, FerryResult};
use console::style;
use std::path::PathBuf;

/// Keys accepted by `config set`
const VALID_KEYS: &[&str] = &[
    "general.log_format",
    "general.audit_log",
    "store.root",
    "fetch.workers",
    "fetch.retrieval_timeout_secs",
    "retriever.skopeo",
];

/// Execute the config command
pub async fn execute(args: ConfigArgs, manager: &ConfigManager, config: &Config) -> FerryResult<()> {
    match args.action {
        None | Some(ConfigAction::Show) => show_config(config),
        Some(ConfigAction::Path) => show_path(manager),
        Some(ConfigAction::Init { force }) => init_config(manager, force).await?,
        Some(ConfigAction::Set { key, value }) => set_value(manager, &key, &value).await?,
    }

    Ok(())
}

fn show_config(config: &Config) {
    let toml =
        toml::to_string_pretty(config).unwrap_or_else(|_| "Error serializing config".to_string());
    println!("{}", toml);
}

fn show_path(manager: &ConfigManager) {
    println!("{}", manager.path().display());
}

async fn init_config(manager: &ConfigManager, force: bool) -> FerryResult<()> {
    let path = manager.path();

    if path.exists() && !force {
        println!(
            "{} Config already exists at {} (use --force to overwrite)",
            style("[WARN]").yellow(),
            path.display()
        );
        return Ok(());
    }

    manager.save(&Config::default()).await?;
    println!(
        "{} Configuration initialized at {}",
        style("[OK]").green(),
        path.display()
    );

    Ok(())
}

async fn set_value(manager: &ConfigManager, key: &str, value: &str) -> FerryResult<()> {
    // Start from the file, not the merged view, so CLI overrides are not persisted
    let mut config = manager.load().await?;
    apply(&mut config, key, value)?;

    manager.save(&config).await?;
    println!("{} Set {} = {}", style("[OK]").green(), key, value);

    Ok(())
}

/// Apply a dot-separated key to a configuration
fn apply(config: &mut Config, key: &str, value: &str) -> FerryResult<()> {
    let parts: Vec<&str> = key.split('.').collect();

    match parts.as_slice() {
        ["general", "log_format"] => match value {
            "text" | "json" => config.general.log_format = value.to_string(),
            _ => {
                return Err(FerryError::User(format!(
                    "Invalid log format: {}. Use text/json",
                    value
                )))
            }
        },
        ["general", "audit_log"] => config.general.audit_log = parse_bool(value)?,

        ["store", "root"] => config.store.root = Some(PathBuf::from(value)),

        ["fetch", "workers"] => config.fetch.workers = Some(parse_number(value)?),
        ["fetch", "retrieval_timeout_secs"] => {
            config.fetch.retrieval_timeout_secs = parse_number(value)?
        }

        ["retriever", "skopeo"] => config.retriever.skopeo = PathBuf::from(value),

        _ => {
            return Err(FerryError::User(format!(
                "Unknown config key: {}. Valid keys: {}",
                key,
                VALID_KEYS.join(", ")
            )))
        }
    }

    Ok(())
}

fn parse_bool(value: &str) -> FerryResult<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(FerryError::User(format!(
            "Invalid boolean value: {}. Use true/false",
            value
        ))),
    }
}

fn parse_number<T: std::str::FromStr>(value: &str) -> FerryResult<T> {
    value
        .parse()
        .map_err(|_| FerryError::User(format!("Invalid number: {}", value)))
}
