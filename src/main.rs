//! Kong chaos extension CLI.

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use kong_chaos::discovery::DiscoveryKind;
use kong_chaos::{AttackState, Config, KongExtension, Selector, TerminationConfig};
use std::collections::HashMap;
use std::io::Read;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "kong-chaos")]
#[command(about = "Chaos Engineering for Kong - inject failures via request-termination")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "kong-chaos.yaml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'L', long, default_value = "info")]
    log_level: String,

    /// Print example configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Validate configuration and exit
    #[arg(long)]
    validate: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List discovered targets as JSON
    Discover {
        #[arg(value_enum)]
        kind: Kind,
        /// Keep refreshing on the configured interval
        #[arg(long)]
        watch: bool,
    },
    /// Create a disabled request-termination plugin and print the attack state
    Prepare {
        #[command(flatten)]
        target: TargetArgs,
        #[command(flatten)]
        fault: FaultArgs,
    },
    /// Enable the plugins of an attack state
    Start {
        /// Attack state as JSON, `@path` or `-` for stdin
        #[arg(long)]
        state: String,
    },
    /// Delete the plugins of an attack state
    Stop {
        /// Attack state as JSON, `@path` or `-` for stdin
        #[arg(long)]
        state: String,
    },
    /// Print attribute labels, target tables and attack parameters as JSON
    Describe,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Kind {
    Services,
    Routes,
}

impl From<Kind> for DiscoveryKind {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Services => DiscoveryKind::Services,
            Kind::Routes => DiscoveryKind::Routes,
        }
    }
}

#[derive(clap::Args, Debug)]
struct TargetArgs {
    /// Target attributes as a JSON object of string lists
    #[arg(long, conflicts_with_all = ["instance", "service", "route"])]
    attributes: Option<String>,
    /// Configured instance name
    #[arg(long)]
    instance: Option<String>,
    /// Service id or name
    #[arg(long)]
    service: Option<String>,
    /// Route id or name (route-level attack)
    #[arg(long)]
    route: Option<String>,
}

impl TargetArgs {
    fn selector(&self) -> Result<Selector> {
        if let Some(raw) = &self.attributes {
            let attributes: HashMap<String, Vec<String>> =
                serde_json::from_str(raw).context("Invalid target attributes")?;
            return Ok(Selector::from_attributes(&attributes)?);
        }

        let instance = self
            .instance
            .as_deref()
            .ok_or_else(|| anyhow!("--instance is required"))?;
        let service = self
            .service
            .as_deref()
            .ok_or_else(|| anyhow!("--service is required"))?;
        let selector = Selector::service(instance, service);
        Ok(match &self.route {
            Some(route) => selector.with_route(route.as_str()),
            None => selector,
        })
    }
}

#[derive(clap::Args, Debug)]
struct FaultArgs {
    /// HTTP status returned to clients
    #[arg(long, default_value_t = kong_chaos::faults::DEFAULT_STATUS)]
    status: u16,
    /// Raw response body (wins over --message)
    #[arg(long)]
    body: Option<String>,
    /// Message wrapped into Kong's default error body
    #[arg(long, default_value = kong_chaos::faults::DEFAULT_MESSAGE)]
    message: String,
    /// Content-Type of the body
    #[arg(long)]
    content_type: Option<String>,
    /// Header or query parameter that activates the fault
    #[arg(long)]
    trigger: Option<String>,
    /// Consumer username or id to restrict the fault to
    #[arg(long)]
    consumer: Option<String>,
}

impl From<FaultArgs> for TerminationConfig {
    fn from(args: FaultArgs) -> Self {
        let non_empty = |v: Option<String>| v.filter(|s| !s.is_empty());
        Self {
            status: args.status,
            body: non_empty(args.body),
            message: non_empty(Some(args.message)),
            content_type: non_empty(args.content_type),
            trigger: non_empty(args.trigger),
            consumer: non_empty(args.consumer),
        }
    }
}

fn print_example_config() {
    let example = r#"# Kong Chaos Extension Configuration

# Kong deployments the extension may act on
instances:
  - name: "test-local"
    base_url: "http://localhost:8001"
  - name: "production"
    base_url: "https://kong-admin.internal:8444"
    header_key: "Kong-Admin-Token"   # Sent with every Admin API request
    header_value: "change-me"

# Additional instances can be supplied via the environment:
#   KONG_INSTANCE_0_NAME, KONG_INSTANCE_0_ORIGIN,
#   KONG_INSTANCE_0_HEADER_KEY, KONG_INSTANCE_0_HEADER_VALUE, ...

discovery:
  services_interval_secs: 150
  routes_interval_secs: 300
  attributes_excludes_service:     # Keys dropped from service targets
    - "kong.service.tag"
  attributes_excludes_route:       # `*` matches any run of characters
    - "kong.route.host"

http:
  timeout_secs: 30
  user_agent: "kong-chaos"
"#;
    println!("{}", example);
}

fn read_state(raw: &str) -> Result<AttackState> {
    let json = if raw == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read attack state from stdin")?;
        buf
    } else if let Some(path) = raw.strip_prefix('@') {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read attack state from {}", path))?
    } else {
        raw.to_string()
    };
    Ok(AttackState::from_json(&json)?)
}

async fn discover(extension: &KongExtension, kind: DiscoveryKind, watch: bool) -> Result<()> {
    let cache = extension.cache(kind);
    if !watch {
        let snapshot = cache.refresh_now().await;
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    info!(kind = %kind, interval_secs = cache.interval().as_secs(), "Watching targets");
    let mut ticker = tokio::time::interval(cache.interval());
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let snapshot = cache.refresh_now().await;
                println!("{}", serde_json::to_string(&snapshot)?);
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                return Ok(());
            }
        }
    }
}

fn print_catalog() -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&kong_chaos::describe::catalog())?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Handle --print-config
    if args.print_config {
        print_example_config();
        return Ok(());
    }

    // Handle describe; needs no configuration
    if let Some(Command::Describe) = args.command {
        return print_catalog();
    }

    // Initialize logging; stdout carries command output
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Load configuration
    let mut config = if args.config.exists() {
        info!(config = %args.config.display(), "Loading configuration");
        Config::from_file(&args.config)?
    } else {
        warn!(config = %args.config.display(), "Configuration file not found, using defaults");
        Config::default()
    };
    config.apply_env();
    config.validate()?;

    for instance in &config.instances {
        info!(
            instance = %instance.name,
            base_url = %instance.base_url,
            auth_header = instance.auth_header().map(|(key, _)| key).unwrap_or("-"),
            "Configured Kong instance"
        );
    }

    // Handle --validate
    if args.validate {
        info!("Configuration is valid");
        return Ok(());
    }

    let extension = KongExtension::from_config(&config)?;

    match args.command {
        Some(Command::Discover { kind, watch }) => discover(&extension, kind.into(), watch).await?,
        Some(Command::Prepare { target, fault }) => {
            let selector = target.selector()?;
            let state = extension.prepare(&selector, &fault.into()).await?;
            println!("{}", state.to_json()?);
        }
        Some(Command::Start { state }) => {
            let state = extension.start(&read_state(&state)?).await?;
            println!("{}", state.to_json()?);
        }
        Some(Command::Stop { state }) => {
            extension.stop(&read_state(&state)?).await?;
            info!("Attack stopped");
        }
        Some(Command::Describe) => print_catalog()?,
        None => {
            info!(
                instances = extension.directory().len(),
                "Starting discovery, press Ctrl-C to stop"
            );
            let handles = extension.spawn_discovery();
            tokio::signal::ctrl_c().await?;
            for handle in handles {
                handle.abort();
            }
            let stats = extension.stats();
            info!(
                discovery_cycles = stats.discovery_cycles,
                "Shutting down"
            );
        }
    }

    Ok(())
}
