use anyhow::Result;
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};

use nacos_naming::address::Address;
use nacos_naming::balancer::weighted_round_robin::NAME as WEIGHTED_ROUND_ROBIN;
use nacos_naming::balancer::{
    Balancer, PickInfo, PickerBuilder, ReadySubConn, SubConn, WeightedRoundRobinBuilder,
};
use nacos_naming::config::{NamingConfig, TargetConfig, TargetMode};
use nacos_naming::error::{ErrorSeverity, NamingError};
use nacos_naming::registry;
use nacos_naming::resolver::{ClientConn, NacosResolverBuilder, ResolveError, ResolvedState};
use nacos_naming::target::Target;

#[derive(Parser)]
#[command(name = "nacos-naming")]
#[command(about = "Resolve services from a Nacos registry and balance across them by weight")]
struct Args {
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the connection string for a service
    Target(TargetArgs),
    /// Resolve a target and log every membership change until Ctrl-C
    Watch(WatchArgs),
}

#[derive(ClapArgs)]
struct TargetArgs {
    /// Registry address, host:port or http(s)://host:port
    #[arg(short, long)]
    registry: String,

    #[arg(short, long)]
    service: String,

    #[arg(long)]
    cluster: Option<String>,

    #[arg(short, long)]
    group: Option<String>,

    #[arg(short, long)]
    namespace: Option<String>,

    /// Subscribe to pushes instead of polling
    #[arg(long)]
    subscribe: bool,

    /// Poll interval in milliseconds
    #[arg(long)]
    interval_ms: Option<u64>,
}

#[derive(ClapArgs)]
struct WatchArgs {
    /// Connection string to resolve; overrides --config
    #[arg(short, long)]
    target: Option<String>,

    #[arg(short, long, default_value = "config/naming.toml")]
    config: String,

    /// Configured target to watch; defaults to the first one
    #[arg(long)]
    name: Option<String>,

    /// Sample picks taken after every update
    #[arg(long, default_value_t = 1000)]
    picks: usize,
}

impl From<TargetArgs> for TargetConfig {
    fn from(args: TargetArgs) -> Self {
        TargetConfig {
            name: None,
            registry: args.registry,
            service: args.service,
            cluster: args.cluster,
            group: args.group,
            namespace: args.namespace,
            mode: if args.subscribe {
                TargetMode::Subscribe
            } else {
                TargetMode::Poll
            },
            interval_ms: args.interval_ms,
        }
    }
}

#[derive(Debug)]
struct DemoConn(u64);

impl SubConn for DemoConn {
    fn id(&self) -> u64 {
        self.0
    }
}

/// Feeds resolver output into a balancer and logs a pick sample
struct WatchConn {
    balancer: Balancer,
    picks: usize,
    next_id: AtomicU64,
    conns: Mutex<HashMap<Address, Arc<DemoConn>>>,
}

impl WatchConn {
    fn new(picks: usize) -> Self {
        let builder = registry::get_balancer(WEIGHTED_ROUND_ROBIN).unwrap_or_else(|| {
            Arc::new(WeightedRoundRobinBuilder::new()) as Arc<dyn PickerBuilder>
        });
        Self {
            balancer: Balancer::new(builder),
            picks,
            next_id: AtomicU64::new(1),
            conns: Mutex::new(HashMap::new()),
        }
    }

    fn sample(&self, ready: &[ReadySubConn]) {
        let names: HashMap<u64, &Address> = ready
            .iter()
            .map(|r| (r.sub_conn.id(), &r.address))
            .collect();
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for _ in 0..self.picks {
            match self.balancer.pick(&PickInfo::default()) {
                Ok(result) => {
                    let addr = names
                        .get(&result.sub_conn.id())
                        .map(|a| format!("{} (weight {})", a, a.weight()))
                        .unwrap_or_else(|| format!("conn#{}", result.sub_conn.id()));
                    *counts.entry(addr).or_default() += 1;
                }
                Err(e) => {
                    warn!("Pick failed: {}", NamingError::from(e));
                    return;
                }
            }
        }
        for (addr, count) in counts {
            info!("  {} <- {} of {} picks", addr, count, self.picks);
        }
    }
}

impl ClientConn for WatchConn {
    fn update_state(&self, state: ResolvedState) {
        info!("Resolved {} addresses", state.addresses.len());

        let ready: Vec<ReadySubConn> = {
            let mut conns = self.conns.lock().unwrap_or_else(|p| p.into_inner());
            conns.retain(|addr, _| state.addresses.contains(addr));
            state
                .addresses
                .iter()
                .map(|address| {
                    let conn = conns
                        .entry(address.clone())
                        .or_insert_with(|| {
                            Arc::new(DemoConn(self.next_id.fetch_add(1, Ordering::Relaxed)))
                        })
                        .clone();
                    ReadySubConn::new(conn, address.clone())
                })
                .collect()
        };

        self.balancer.update_ready(ready.clone());
        self.sample(&ready);
    }

    fn report_error(&self, err: ResolveError) {
        let err = NamingError::from(err);
        match err.severity() {
            ErrorSeverity::Critical | ErrorSeverity::High => error!("Resolver error: {}", err),
            _ => warn!("Resolver error: {}", err),
        }
    }
}

async fn load_target_uri(args: &WatchArgs) -> Result<(String, NamingConfig)> {
    if let Some(uri) = &args.target {
        return Ok((uri.clone(), NamingConfig::default()));
    }

    let config = NamingConfig::from_file_with_env(&args.config).await?;
    let target = match &args.name {
        Some(name) => config
            .target(name)
            .ok_or_else(|| anyhow::anyhow!("No target named {} in {}", name, args.config))?,
        None => config
            .targets
            .first()
            .ok_or_else(|| anyhow::anyhow!("No targets configured in {}", args.config))?,
    };
    let uri = target.to_target_uri();
    Ok((uri, config))
}

async fn watch(args: WatchArgs) -> Result<()> {
    let (uri, config) = load_target_uri(&args).await?;
    let target = Target::decode(&uri)?;
    info!("Watching {}", target);

    let builder = NacosResolverBuilder::with_registry_config(target.scheme, config.registry)
        .with_resolver_config(config.resolver);
    let conn = Arc::new(WatchConn::new(args.picks));
    let resolver = builder
        .build_resolver(&uri, conn)
        .map_err(NamingError::from)?;

    signal::ctrl_c().await?;
    warn!("Received CTRL+C, shutting down gracefully...");

    tokio::time::timeout(Duration::from_secs(5), resolver.shutdown())
        .await
        .unwrap_or_else(|_| warn!("Resolver did not stop within 5s"));
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(format!("nacos_naming={}", level))
        .init();

    registry::init();

    match args.command {
        Command::Target(target_args) => {
            let config = TargetConfig::from(target_args);
            config.validate()?;
            println!("{}", config.to_target_uri());
        }
        Command::Watch(watch_args) => watch(watch_args).await?,
    }

    info!("nacos-naming done");
    Ok(())
}
