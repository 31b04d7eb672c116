use std::str::FromStr;
use std::time::Duration;

use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use nodelist_api::NodeQueryResolver;
use nodelist_core::NodeLister;
use nodelist_kubehub::KubeNodeLister;
use nodelist_nomad::{ClientConfig, NomadLister};
use nodelist_schema::{nodes_schema, ResourceData};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "nodelistctl", version, about = "Read cluster nodes the way a data source does")]
struct Cli {
    /// Output format
    #[arg(short = 'o', long = "output", value_enum, global = true, default_value_t = Output::Human)]
    output: Output,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Output { Human, Json }

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Backend { Nomad, Kube }

#[derive(Subcommand, Debug)]
enum Commands {
    /// List nodes, optionally narrowed by name prefix and filter expression
    Nodes {
        /// Name prefix matched by the control plane
        #[arg(long = "prefix", default_value = "")]
        prefix: String,
        /// Server-side filter expression (label selector for the kube backend)
        #[arg(long = "filter", default_value = "")]
        filter: String,
        #[command(flatten)]
        conn: ConnArgs,
    },
    /// Print the data source schema
    Schema,
}

#[derive(Args, Debug)]
struct ConnArgs {
    /// Control plane backend
    #[arg(long = "backend", value_enum, env = "NODELIST_BACKEND", default_value_t = Backend::Nomad)]
    backend: Backend,
    /// HTTP API address (nomad backend)
    #[arg(long = "addr", env = "NOMAD_ADDR")]
    address: Option<String>,
    #[arg(long = "region", env = "NOMAD_REGION")]
    region: Option<String>,
    /// ACL token (nomad backend)
    #[arg(long = "token", env = "NOMAD_TOKEN", hide_env_values = true)]
    token: Option<String>,
    /// Request timeout in seconds (nomad backend)
    #[arg(long = "timeout-secs", default_value_t = 30)]
    timeout_secs: u64,
    /// Node pool label keys, checked in order (kube backend)
    #[arg(long = "pool-label")]
    pool_labels: Vec<String>,
}

impl ConnArgs {
    fn client_config(&self) -> ClientConfig {
        let mut cfg = ClientConfig::default().with_timeout(Duration::from_secs(self.timeout_secs));
        if let Some(addr) = self.address.as_deref().filter(|s| !s.is_empty()) {
            cfg = cfg.with_address(addr);
        }
        if let Some(region) = self.region.as_deref().filter(|s| !s.is_empty()) {
            cfg = cfg.with_region(region);
        }
        if let Some(token) = self.token.as_deref().filter(|s| !s.is_empty()) {
            cfg = cfg.with_token(token);
        }
        cfg
    }

    async fn lister(&self) -> Result<Box<dyn NodeLister>> {
        match self.backend {
            Backend::Nomad => {
                let cfg = self.client_config();
                info!(addr = %cfg.address, region = ?cfg.region, "using http backend");
                Ok(Box::new(NomadLister::new(cfg)?))
            }
            Backend::Kube => {
                let mut lister = KubeNodeLister::try_default().await?;
                if !self.pool_labels.is_empty() {
                    lister = lister.with_pool_labels(self.pool_labels.clone());
                }
                Ok(Box::new(lister))
            }
        }
    }
}

fn init_tracing() {
    let env = std::env::var("NODELIST_LOG").unwrap_or_else(|_| "info".to_string());
    let filter = tracing_subscriber::EnvFilter::from_str(&env).unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).with_writer(std::io::stderr).init();
}

fn init_metrics() {
    if let Ok(addr) = std::env::var("NODELIST_METRICS_ADDR") {
        if let Ok(sock) = addr.parse::<std::net::SocketAddr>() {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            match builder.with_http_listener(sock).install() {
                Ok(_) => tracing::info!(addr = %addr, "Prometheus metrics exporter listening"),
                Err(e) => tracing::warn!(error = %e, "failed to install metrics exporter"),
            }
        } else {
            tracing::warn!(addr = %addr, "invalid NODELIST_METRICS_ADDR; expected host:port");
        }
    }
}

fn render_human(rd: &ResourceData) {
    if rd.is_absent() {
        println!("(no nodes: scope not found)");
        return;
    }
    println!("query id: {}", rd.id());
    println!("{:<38} {:<24} {:<12} {:<12} {:<12} ADDRESS", "ID", "NAME", "DATACENTER", "CLASS", "POOL");
    let nodes = rd.get_state("nodes").and_then(|v| v.as_array()).cloned().unwrap_or_default();
    for n in nodes.iter() {
        let f = |k: &str| n.get(k).and_then(|v| v.as_str()).unwrap_or("-").to_string();
        let class = f("node_class");
        println!(
            "{:<38} {:<24} {:<12} {:<12} {:<12} {}",
            f("id"),
            f("name"),
            f("datacenter"),
            if class.is_empty() { "-".to_string() } else { class },
            f("node_pool"),
            f("address"),
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    init_metrics();
    let cli = Cli::parse();

    match cli.command {
        Commands::Schema => {
            println!("{}", serde_json::to_string_pretty(&nodes_schema())?);
        }
        Commands::Nodes { prefix, filter, conn } => {
            info!(backend = ?conn.backend, "nodes invoked");
            let mut rd = ResourceData::new(nodes_schema());
            if !prefix.is_empty() {
                rd = rd.with_config("prefix", prefix)?;
            }
            if !filter.is_empty() {
                rd = rd.with_config("filter", filter)?;
            }
            let resolver = NodeQueryResolver::new(conn.lister().await?);
            let config = rd.clone();
            if let Err(e) = resolver.read(&config, &mut rd).await {
                error!(error = %e, "nodes read failed");
                return Err(e.into());
            }
            match cli.output {
                Output::Human => render_human(&rd),
                Output::Json => println!("{}", serde_json::to_string_pretty(&rd.to_state())?),
            }
        }
    }
    Ok(())
}
