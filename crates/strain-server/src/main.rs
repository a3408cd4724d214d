//! `strain` binary: HTTP server and in-process contention runs

use anyhow::{anyhow, Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use futures::future::join_all;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use strain_core::{ContentionRequest, Lab, LabConfig, LabError};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    Command::new("strain")
        .version(strain_core::VERSION)
        .about("Lock contention and resource load lab")
        .subcommand(
            Command::new("serve")
                .about("Run the HTTP API")
                .arg(
                    Arg::new("config")
                        .long("config")
                        .value_parser(value_parser!(PathBuf))
                        .help("TOML configuration file"),
                )
                .arg(
                    Arg::new("bind")
                        .long("bind")
                        .value_parser(value_parser!(SocketAddr))
                        .help("Listen address, overrides the config file"),
                )
                .arg(
                    Arg::new("log-json")
                        .long("log-json")
                        .action(ArgAction::SetTrue)
                        .help("Emit logs as JSON lines"),
                ),
        )
        .subcommand(
            Command::new("contend")
                .about("Run concurrent contention invocations in-process")
                .arg(
                    Arg::new("workers")
                        .long("workers")
                        .default_value("4")
                        .value_parser(value_parser!(usize))
                        .help("Concurrent invocations"),
                )
                .arg(
                    Arg::new("hold-ms")
                        .long("hold-ms")
                        .default_value("50")
                        .allow_negative_numbers(true)
                        .value_parser(value_parser!(i64))
                        .help("Hold time per operation, clamped"),
                )
                .arg(
                    Arg::new("ops")
                        .long("ops")
                        .default_value("20")
                        .allow_negative_numbers(true)
                        .value_parser(value_parser!(i64))
                        .help("Operations per invocation, clamped"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output as JSON"),
                ),
        )
        .subcommand(
            Command::new("report")
                .about("Print the default configuration")
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output as JSON instead of TOML"),
                ),
        )
}

fn init_tracing(json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let installed = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| anyhow!("failed to install tracing subscriber: {e}"))
}

async fn serve(args: &ArgMatches) -> Result<()> {
    init_tracing(args.get_flag("log-json"))?;

    let mut config = match args.get_one::<PathBuf>("config") {
        Some(path) => LabConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => LabConfig::default(),
    };
    if let Some(bind) = args.get_one::<SocketAddr>("bind") {
        config.server.bind = *bind;
    }

    strain_core::telemetry::describe();
    let addr = config.server.bind;
    let lab = Arc::new(Lab::new(config).map_err(LabError::from)?);
    let (bound, server) = strain_server::bind(Arc::clone(&lab), addr)?;
    info!(addr = %bound, "strain listening");

    let signal = {
        let lab = Arc::clone(&lab);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                lab.shutdown();
            }
        })
    };

    server.await;
    signal.abort();
    info!("strain stopped");
    Ok(())
}

async fn contend(args: &ArgMatches) -> Result<()> {
    init_tracing(false)?;

    let workers = *args.get_one::<usize>("workers").context("missing --workers")?;
    let hold_ms = *args.get_one::<i64>("hold-ms").context("missing --hold-ms")?;
    let ops = *args.get_one::<i64>("ops").context("missing --ops")?;

    let lab = Arc::new(Lab::default());
    let invocations = (0..workers).map(|_| {
        let lab = Arc::clone(&lab);
        async move {
            lab.run_contention(ContentionRequest::new(hold_ms, ops))
                .await
        }
    });
    let reports = join_all(invocations).await;
    let snapshot = lab.contention_metrics();

    if args.get_flag("json") {
        let body = serde_json::json!({ "reports": reports, "metrics": snapshot });
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    println!("Contention run: {workers} workers");
    for report in &reports {
        println!(
            "  {}: {}/{} ops, {}ms total, {}ms waiting, ratio {:.2}",
            report.worker_id,
            report.operations_completed,
            report.operations_requested,
            report.duration_ms,
            report.wait_time_ms,
            report.contention_ratio,
        );
    }
    println!("Totals:");
    println!("  Operations: {}", snapshot.total_operations);
    println!("  Wait Time: {}ms", snapshot.total_wait_time_ms);
    println!("  Avg Wait / Op: {}ms", snapshot.avg_wait_time_per_operation);
    println!("  Shared Map: {}", snapshot.shared_map_size);
    println!("  Shared List: {}", snapshot.shared_list_size);
    Ok(())
}

fn report(args: &ArgMatches) -> Result<()> {
    let config = LabConfig::default();
    if args.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&config)?);
    } else {
        println!("{}", toml::to_string_pretty(&config)?);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();

    match matches.subcommand() {
        Some(("serve", args)) => serve(args).await,
        Some(("contend", args)) => contend(args).await,
        Some(("report", args)) => report(args),
        _ => {
            cli().print_help()?;
            Ok(())
        }
    }
}
