use clap::Parser;
use entrance::{register_nginx, try_create_entrance, EntranceConfig, EntranceOptions, EtcdStore, Registry};
use slog::Drain;
use std::error::Error;
use std::sync::Arc;
use tokio::time::Duration;

#[derive(Parser)]
#[command(name = "entrance")]
#[command(about = "Load balancer control plane", long_about = None)]
struct Args {
    /// etcd v3 endpoints, comma separated.
    #[arg(long, env = "ENTRANCE_ETCD_ENDPOINTS", value_delimiter = ',', default_value = "http://127.0.0.1:2379")]
    etcd_endpoints: Vec<String>,

    /// Name recorded in every envelope this instance writes.
    #[arg(long, env = "ENTRANCE_INSTANCE_NAME", default_value = "entrance")]
    instance_name: String,

    #[arg(long, env = "ENTRANCE_KEY_PREFIX")]
    key_prefix: Option<String>,

    #[arg(long, env = "ENTRANCE_DEFAULT_PLUGIN", default_value = "nginx")]
    default_plugin: String,

    /// Default plugin option as key=value. Repeatable.
    #[arg(long = "plugin-opt", value_parser = parse_key_val)]
    plugin_opts: Vec<(String, String)>,

    #[arg(long, env = "DEFAULT_HTTPS_PORT")]
    https_port: Option<u16>,

    #[arg(long, env = "ENTRANCE_STATUS_INTERVAL_SECS", default_value_t = 30)]
    status_interval_secs: u64,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let logger = create_root_logger();

    if let Err(e) = run(args, logger.clone()).await {
        slog::crit!(logger, "Entrance failed: {}", e);
        drop(logger);
        std::process::exit(1);
    }
}

async fn run(args: Args, logger: slog::Logger) -> Result<(), Box<dyn Error>> {
    let etcd = EtcdStore::connect(logger.new(slog::o!("Component" => "Etcd")), &args.etcd_endpoints)?;

    let mut registry = Registry::new(logger.new(slog::o!("Component" => "Registry")));
    register_nginx(&mut registry);
    registry.set_default(&args.default_plugin, args.plugin_opts.into_iter().collect());

    let entrance = try_create_entrance(EntranceConfig {
        instance_name: args.instance_name,
        coordination: Arc::new(etcd),
        registry,
        event_log: None,
        info_logger: logger.clone(),
        options: EntranceOptions {
            key_prefix: args.key_prefix,
            https_listen_port: args.https_port,
            ..EntranceOptions::default()
        },
    })
    .await?;
    slog::info!(logger, "Entrance started");

    let mut status_interval = tokio::time::interval(Duration::from_secs(args.status_interval_secs.max(1)));
    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal?;
                break;
            }
            _ = status_interval.tick() => {
                entrance.report_plugin_status().await;
            }
        }
    }

    slog::info!(logger, "Shutting down");
    entrance.shutdown().await;
    Ok(())
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", s))?;
    Ok((key.to_string(), value.to_string()))
}

fn create_root_logger() -> slog::Logger {
    let decorator = slog_term::TermDecorator::new().build();
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();

    slog::Logger::root(drain, slog::o!())
}
