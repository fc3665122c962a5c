//! 命令行入口：批量翻译条目文件、检测服务连通性、生成配置模板

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use feed_translate::env::{self, EnvVar};
use feed_translate::translation::{
    BatchSummary, ConfigManager, Item, ItemReport, ItemStore, MemoryItemStore, ProcessMode,
    ServiceKind, TranslationService,
};

#[derive(Parser, Debug)]
#[command(name = "feed-translate", version, about = "Idempotent translation for feed items")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Translate a JSON array of items
    Run {
        /// Items to process (JSON array)
        #[arg(short, long)]
        input: PathBuf,
        /// Previously stored copies of the items, consulted in update mode
        #[arg(short, long)]
        previous: Option<PathBuf>,
        /// Processing mode: add, update or force
        #[arg(short, long, default_value = "add")]
        mode: ProcessMode,
        /// Configuration file (overrides the search path)
        #[arg(short, long)]
        config: Option<String>,
        /// Write processed items here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Check backend connectivity
    Probe {
        /// Service to probe; all services when omitted
        #[arg(short, long)]
        service: Option<ServiceKind>,
        /// Target language used for the probe request
        #[arg(short, long)]
        target: Option<String>,
        #[arg(short, long)]
        config: Option<String>,
    },
    /// Write an example configuration file
    InitConfig { path: PathBuf },
    /// Print the supported environment variables
    EnvDocs,
}

#[derive(Serialize)]
struct RunReport<'a> {
    summary: BatchSummary,
    reports: &'a [ItemReport],
    #[serde(skip_serializing_if = "Option::is_none")]
    items: Option<&'a [Item]>,
}

fn init_logging() {
    let level = env::core::LogLevel::get().unwrap_or_else(|e| {
        eprintln!("Warning: {}", e);
        "info".to_string()
    });
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&str>) -> Result<ConfigManager, Box<dyn std::error::Error>> {
    Ok(match path {
        Some(path) => ConfigManager::from_file(path)?,
        None => ConfigManager::new()?,
    })
}

fn read_items(path: &PathBuf) -> Result<Vec<Item>, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("无法读取 {}: {}", path.display(), e))?;
    Ok(serde_json::from_str(&content)?)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::EnvDocs => {
            print!("{}", env::generate_env_docs());
        }
        Command::InitConfig { path } => {
            ConfigManager::generate_example_config(&path.to_string_lossy())?;
            println!("Example configuration written to {}", path.display());
        }
        Command::Probe { service, target, config } => {
            init_logging();
            let manager = load_config(config.as_deref())?;
            let translation = TranslationService::from_settings(manager.settings(), None)?;
            let target = target.unwrap_or_else(|| translation.pipeline().config().target_lang.clone());

            let services = match service {
                Some(service) => vec![service],
                None => ServiceKind::ALL.to_vec(),
            };

            let mut all_ok = true;
            for service in services {
                let Some(report) = translation.probe(service, &target).await else {
                    continue;
                };
                all_ok &= report.ok;
                println!(
                    "{:<8} {:<4} {:>6}ms  {}",
                    report.service.as_str(),
                    if report.ok { "ok" } else { "fail" },
                    report.elapsed.as_millis(),
                    report.message
                );
            }

            if !all_ok {
                std::process::exit(1);
            }
        }
        Command::Run { input, previous, mode, config, output } => {
            init_logging();
            let manager = load_config(config.as_deref())?;

            let store: Option<Arc<dyn ItemStore>> = match &previous {
                Some(path) => Some(Arc::new(MemoryItemStore::from_items(read_items(path)?))),
                None => None,
            };
            let translation = TranslationService::from_settings(manager.settings(), store)?;

            let items = read_items(&input)?;
            let result = translation.process_batch(items, mode).await;

            match &output {
                Some(path) => {
                    std::fs::write(path, serde_json::to_string_pretty(&result.items)?)?;
                    let report = RunReport {
                        summary: result.summary,
                        reports: &result.reports,
                        items: None,
                    };
                    println!("{}", serde_json::to_string_pretty(&report)?);
                }
                None => {
                    let report = RunReport {
                        summary: result.summary,
                        reports: &result.reports,
                        items: Some(&result.items),
                    };
                    println!("{}", serde_json::to_string_pretty(&report)?);
                }
            }
        }
    }

    Ok(())
}
