use clap::{Parser, Subcommand};
use hostforge::deploy::DeployPlan;
use hostforge::{
    render_all, standard_sequence, DeployConfig, HealthProbe, LoadTest, SequenceRunner,
    StepContext,
};
use hostops::{RemoteHost, ServiceManager};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

#[derive(Parser)]
#[command(name = "hostforge")]
#[command(about = "Provisioning and deployment sequencer for small service stacks")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the provisioning sequence on this host
    Provision {
        /// Path to the deployment config (built-in defaults when omitted)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Probe preconditions and report, without mutating anything
        #[arg(long)]
        dry_run: bool,
        /// Skip the post-start health verification step
        #[arg(long)]
        no_verify: bool,
        /// Write the run report as JSON to this path
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Show the step sequence and what each would do
    Plan {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Render the deployment artifacts into a directory for inspection
    Render {
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Output directory
        #[arg(short, long)]
        out: PathBuf,
    },
    /// Report the activity state of every managed service
    Status {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Poll a health endpoint within a bounded window
    Health {
        /// URL to probe; defaults to the configured health endpoint
        #[arg(short, long)]
        url: Option<String>,
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Polling window in seconds
        #[arg(long, default_value = "30")]
        window: u64,
        /// Interval between attempts in seconds
        #[arg(long, default_value = "2")]
        interval: u64,
    },
    /// Deploy to a remote host over ssh: copy the bundle, provision, verify
    Deploy {
        /// Target host name or address
        #[arg(long)]
        host: String,
        /// ssh user
        #[arg(short, long)]
        user: Option<String>,
        /// ssh port
        #[arg(short, long, default_value = "22")]
        port: u16,
        /// Deployment config shipped to the target
        #[arg(short, long)]
        config: PathBuf,
        /// Payload directory shipped alongside the config
        #[arg(long)]
        payload: Option<PathBuf>,
        /// Staging directory on the target
        #[arg(long, default_value = "/opt/stack/payload")]
        remote_root: String,
        /// Skip the post-deploy health check
        #[arg(long)]
        no_verify: bool,
    },
    /// Fire a burst of requests at an endpoint and report latencies
    LoadTest {
        #[arg(short, long)]
        url: String,
        #[arg(short, long, default_value = "20")]
        requests: u32,
        #[arg(long, default_value = "5")]
        concurrency: u32,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Provision {
            config,
            dry_run,
            no_verify,
            report,
        } => {
            provision(config, dry_run, no_verify, report).await?;
        }
        Commands::Plan { config } => {
            plan(config).await?;
        }
        Commands::Render { config, out } => {
            render(config, out)?;
        }
        Commands::Status { config } => {
            status(config)?;
        }
        Commands::Health {
            url,
            config,
            window,
            interval,
        } => {
            health(url, config, window, interval).await?;
        }
        Commands::Deploy {
            host,
            user,
            port,
            config,
            payload,
            remote_root,
            no_verify,
        } => {
            deploy(host, user, port, config, payload, remote_root, no_verify).await?;
        }
        Commands::LoadTest {
            url,
            requests,
            concurrency,
        } => {
            load_test(url, requests, concurrency).await?;
        }
    }

    Ok(())
}

fn load_config(path: Option<PathBuf>) -> Result<DeployConfig, Box<dyn std::error::Error>> {
    match path {
        Some(path) => Ok(DeployConfig::from_path(&path)?),
        None => {
            let config = DeployConfig::default();
            config.validate()?;
            Ok(config)
        }
    }
}

async fn provision(
    config_path: Option<PathBuf>,
    dry_run: bool,
    no_verify: bool,
    report_path: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path)?;
    let runner = SequenceRunner::new(standard_sequence(&config, !no_verify));

    let mut ctx = StepContext::new(config);
    if dry_run {
        ctx = ctx.dry_run();
    }

    let run_report = runner.run(&ctx).await;
    print!("{}", run_report.render_text());

    if let Some(path) = report_path {
        std::fs::write(&path, run_report.to_json()?)?;
        info!(path = %path.display(), "Run report written");
    }

    if !run_report.succeeded() {
        return Err(run_report
            .failure
            .unwrap_or_else(|| "provisioning failed".to_string())
            .into());
    }

    Ok(())
}

async fn plan(config_path: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path)?;
    let runner = SequenceRunner::new(standard_sequence(&config, true));

    println!("Provisioning plan for '{}':", config.environment);
    let ctx = StepContext::new(config).dry_run();
    let report = runner.run(&ctx).await;
    print!("{}", report.render_text());

    Ok(())
}

fn render(
    config_path: Option<PathBuf>,
    out: PathBuf,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path)?;
    std::fs::create_dir_all(&out)?;

    for (name, contents) in render_all(&config)? {
        let path = out.join(&name);
        std::fs::write(&path, contents)?;
        println!("Wrote {}", path.display());
    }

    Ok(())
}

fn status(config_path: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path)?;
    let manager = ServiceManager::new();

    println!("Managed services:");
    for state in manager.unit_states(&config.managed_units())? {
        println!("  {:<28} {}", state.unit, state.activity);
    }

    Ok(())
}

async fn health(
    url: Option<String>,
    config_path: Option<PathBuf>,
    window: u64,
    interval: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    let url = match url {
        Some(url) => url,
        None => load_config(config_path)?.health_url(),
    };

    let probe = HealthProbe::new(&url)
        .with_window(Duration::from_secs(window))
        .with_interval(Duration::from_secs(interval));

    let report = probe.wait_healthy().await?;
    if report.healthy {
        println!(
            "✓ {} healthy after {} attempts in {:.1}s",
            url,
            report.attempts,
            report.elapsed.as_secs_f64()
        );
        Ok(())
    } else {
        println!(
            "✗ {} not healthy after {} attempts in {:.1}s: {}",
            url,
            report.attempts,
            report.elapsed.as_secs_f64(),
            report.last_error.as_deref().unwrap_or("no response")
        );
        Err(format!("health check failed for {url}").into())
    }
}

async fn deploy(
    host: String,
    user: Option<String>,
    port: u16,
    config_path: PathBuf,
    payload: Option<PathBuf>,
    remote_root: String,
    no_verify: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    // The shipped config is also what the controller verifies against.
    let config = DeployConfig::from_path(&config_path)?;

    let mut target = RemoteHost::new(host).with_port(port);
    if let Some(user) = user {
        target = target.with_user(user);
    }

    let plan = DeployPlan {
        target,
        config_path,
        payload_dir: payload,
        remote_root,
        verify: !no_verify,
    };

    plan.execute(&config).await?;
    println!("Deployment succeeded");
    Ok(())
}

async fn load_test(
    url: String,
    requests: u32,
    concurrency: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let test = LoadTest::new(url)
        .with_requests(requests)
        .with_concurrency(concurrency);

    let report = test.run().await?;
    println!("{}", report.render_text());
    Ok(())
}
