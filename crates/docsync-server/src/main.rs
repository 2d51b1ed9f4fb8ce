use clap::{value_parser, Arg, ArgAction, Command};
use docsync_core::logging::init_tracing;
use docsync_core::Document;
use docsync_server::{demo, load_config, spawn_event_logger, TickScheduler};
use std::path::PathBuf;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_arg = Arg::new("config")
        .long("config")
        .value_parser(value_parser!(PathBuf))
        .help("Path to a TOML configuration file");

    let cli = Command::new("docsync-server")
        .version(docsync_server::VERSION)
        .about("Drive document session callbacks on a tick loop")
        .subcommand_required(true)
        .subcommand(
            Command::new("run")
                .about("Run the demo document for a number of ticks")
                .arg(config_arg.clone())
                .arg(
                    Arg::new("ticks")
                        .long("ticks")
                        .default_value("20")
                        .value_parser(value_parser!(u64))
                        .help("Number of ticks to run"),
                )
                .arg(
                    Arg::new("log-filter")
                        .long("log-filter")
                        .help("Override the configured tracing filter"),
                )
                .arg(
                    Arg::new("json-logs")
                        .long("json-logs")
                        .action(ArgAction::SetTrue)
                        .help("Emit logs as JSON lines"),
                ),
        )
        .subcommand(
            Command::new("check-config")
                .about("Validate a configuration file and print the effective settings")
                .arg(config_arg),
        );

    let matches = cli.get_matches();

    match matches.subcommand() {
        Some(("run", sub)) => {
            let mut config = load_config(sub.get_one::<PathBuf>("config").map(PathBuf::as_path))?;
            if let Some(filter) = sub.get_one::<String>("log-filter") {
                config.logging.filter.clone_from(filter);
            }
            if sub.get_flag("json-logs") {
                config.logging.json = true;
            }
            init_tracing(&config.logging)?;

            let ticks = *sub.get_one::<u64>("ticks").unwrap_or(&20);
            let doc = Document::with_config(&config.document);
            let event_log = spawn_event_logger(&doc);
            demo::install(&doc)?;

            let mut scheduler = TickScheduler::new(doc.clone(), config.scheduler);
            let stats = scheduler.run_ticks(ticks).await;
            drop(scheduler);

            let snapshot = doc.lock().await.to_json()?;
            drop(doc);
            let events = event_log.await?;

            let summary = serde_json::json!({ "stats": stats, "events": events, "document": snapshot });
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Some(("check-config", sub)) => {
            let config = load_config(sub.get_one::<PathBuf>("config").map(PathBuf::as_path))?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        _ => unreachable!("subcommand_required"),
    }

    Ok(())
}
