//! Domain Sweep - random live web host discovery
//!
//! Command line front end: collects parameters, shows progress and found
//! hosts, and maps Ctrl-C to a graceful stop.

use std::net::IpAddr;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use domain_sweep::{
    ChannelObserver, RunConfig, ScanEvent, ScanPhase, ScanReport, Scanner, SweepError,
};
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

/// Discover live web hosts by sampling random short domain names
#[derive(Parser, Debug)]
#[command(name = "domain-sweep", version, about)]
struct Cli {
    /// JSON file with a run configuration; flags override its values
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Minimum name length (1-5)
    #[arg(long, env = "SWEEP_MIN_LENGTH")]
    min_length: Option<usize>,

    /// Maximum name length (1-5)
    #[arg(long, env = "SWEEP_MAX_LENGTH")]
    max_length: Option<usize>,

    /// File that reachable domains are appended to
    #[arg(short, long, env = "SWEEP_OUTPUT")]
    output: Option<PathBuf>,

    /// Suffixes to sample from, e.g. .com,.org
    #[arg(long, env = "SWEEP_SUFFIXES", value_delimiter = ',')]
    suffixes: Vec<String>,

    /// Batches processed concurrently
    #[arg(short, long, env = "SWEEP_CONCURRENCY")]
    concurrency: Option<usize>,

    /// Candidates per batch
    #[arg(short, long, env = "SWEEP_BATCH_SIZE")]
    batch_size: Option<usize>,

    /// Per-request timeout in milliseconds
    #[arg(long, env = "SWEEP_TIMEOUT_MS")]
    timeout_ms: Option<u64>,

    /// Pause in milliseconds inserted every --delay-every candidates
    #[arg(long, env = "SWEEP_DELAY_MS")]
    delay_ms: Option<u64>,

    #[arg(long, env = "SWEEP_DELAY_EVERY")]
    delay_every: Option<usize>,

    /// DNS servers to query; empty uses the system configuration
    #[arg(long = "nameserver", env = "SWEEP_NAMESERVERS", value_delimiter = ',')]
    nameservers: Vec<IpAddr>,

    /// Use the system DNS configuration instead of the built-in public servers
    #[arg(long, conflicts_with = "nameservers")]
    system_dns: bool,

    /// Reference host checked before scanning
    #[arg(long, env = "SWEEP_CANARY")]
    canary: Option<String>,

    /// Milliseconds to wait for running batches after a stop
    #[arg(long, env = "SWEEP_GRACE_MS")]
    grace_ms: Option<u64>,

    /// Print every probe log line
    #[arg(short, long)]
    verbose: bool,

    /// Print the final report as JSON
    #[arg(long)]
    json: bool,
}

impl Cli {
    fn build_config(&self) -> anyhow::Result<RunConfig> {
        let mut config = match &self.config {
            Some(path) => RunConfig::load(path)
                .with_context(|| format!("failed to load {}", path.display()))?,
            None => RunConfig::default(),
        };

        if let Some(v) = self.min_length {
            config.min_length = v;
        }
        if let Some(v) = self.max_length {
            config.max_length = v;
        }
        if let Some(v) = &self.output {
            config.output = v.clone();
        }
        if !self.suffixes.is_empty() {
            config.suffixes = self
                .suffixes
                .iter()
                .map(|s| {
                    let s = s.trim().to_lowercase();
                    if s.starts_with('.') { s } else { format!(".{}", s) }
                })
                .collect();
        }
        if let Some(v) = self.concurrency {
            config.max_concurrency = v;
        }
        if let Some(v) = self.batch_size {
            config.batch_size = v;
        }
        if let Some(v) = self.timeout_ms {
            config.request_timeout_ms = v;
        }
        if let Some(v) = self.delay_ms {
            config.delay_ms = v;
        }
        if let Some(v) = self.delay_every {
            config.delay_every = v;
        }
        if self.system_dns {
            config.nameservers.clear();
        } else if !self.nameservers.is_empty() {
            config.nameservers = self.nameservers.clone();
        }
        if let Some(v) = &self.canary {
            config.canary_host = v.clone();
        }
        if let Some(v) = self.grace_ms {
            config.stop_grace_ms = v;
        }

        Ok(config)
    }
}

#[tokio::main]
async fn main() {
    // Initialize the library
    if let Err(e) = domain_sweep::init() {
        eprintln!("❌ Failed to initialize: {}", e);
        process::exit(1);
    }

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(code) => process::exit(code),
        Err(e) => {
            match e.downcast_ref::<SweepError>() {
                Some(sweep) => eprintln!("{}", sweep.user_message()),
                None => eprintln!("❌ Error: {:#}", e),
            }
            process::exit(1);
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "domain_sweep=debug"
    } else {
        "domain_sweep=warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Main sweep workflow; returns the process exit code
async fn run(cli: Cli) -> anyhow::Result<i32> {
    let config = cli.build_config()?;
    if let Err(e) = config.validate() {
        eprintln!("{}", e.user_message());
        eprintln!("{}", e);
        return Ok(2);
    }

    println!("🔎 Domain Sweep - random live host discovery");
    println!("═══════════════════════════════════════════");
    println!(
        "   Lengths: {}-{}   Suffixes: {}   Output: {}",
        config.min_length,
        config.max_length,
        config.suffixes.join(", "),
        config.output.display()
    );
    println!();

    let (observer, mut events) = ChannelObserver::channel();
    let scanner = Scanner::new(config, Arc::new(observer)).context("failed to set up scanner")?;
    let handle = scanner.start();
    let progress = progress_bar(handle.snapshot().total_space);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Some(ScanEvent::Finished) | None => break,
                    Some(event) => render(&progress, event, cli.verbose),
                }
            }
            _ = &mut ctrl_c, if !handle.is_stop_requested() => {
                progress.println("⏹️  Stopping, waiting for running batches...");
                handle.stop();
            }
        }
    }

    let report = handle.join().await?;
    progress.finish_and_clear();

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&report);
    }

    Ok(exit_code(report.fatal.as_ref()))
}

fn exit_code(fatal: Option<&SweepError>) -> i32 {
    match fatal {
        Some(SweepError::Config { .. }) => 2,
        Some(e) if e.is_fatal() => 1,
        _ => 0,
    }
}

fn progress_bar(total: u64) -> ProgressBar {
    let bar = ProgressBar::new(total);
    let style = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("=>-");
    bar.set_style(style);
    bar
}

fn render(progress: &ProgressBar, event: ScanEvent, verbose: bool) {
    match event {
        ScanEvent::Progress { checked, .. } => progress.set_position(checked),
        ScanEvent::Stats(stats) => progress.set_message(stats.to_string()),
        ScanEvent::Found(domain) => progress.println(format!("✅ Live site: {}", domain)),
        ScanEvent::Log(line) if verbose => progress.println(line),
        ScanEvent::Phase(phase @ (ScanPhase::Warmup | ScanPhase::Draining)) => {
            progress.set_message(format!("{}...", phase));
        }
        _ => {}
    }
}

fn print_summary(report: &ScanReport) {
    println!();
    println!("📈 Summary:");
    println!("   🏁 Result: {}", report.phase);
    println!("   📊 Checked: {} / {}", report.checked, report.total_space);
    println!("   🌐 Resolved: {}", report.resolved);
    println!("   ✅ Live sites: {}", report.found);
    if report.errors > 0 {
        println!("   ⚠️  Transient errors: {}", report.errors);
    }
    if report.persist_failures > 0 {
        println!("   💾 Lost discoveries (write failures): {}", report.persist_failures);
    }
    if report.abandoned_batches > 0 {
        println!("   ⏹️  Abandoned batches: {}", report.abandoned_batches);
    }
    println!(
        "   ⏱️  Total time: {:.2}s",
        report.elapsed().num_milliseconds() as f64 / 1000.0
    );
    if let Some(error) = &report.fatal {
        println!();
        println!("{}", error.user_message());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(exit_code(None), 0);
        assert_eq!(exit_code(Some(&SweepError::config("bad range"))), 2);
        assert_eq!(exit_code(Some(&SweepError::connectivity("canary down"))), 1);
        assert_eq!(exit_code(Some(&SweepError::Cancelled)), 0);
    }

    #[test]
    fn test_flags_override_defaults() {
        let cli = Cli::parse_from([
            "domain-sweep",
            "--min-length",
            "2",
            "--suffixes",
            "io,.dev",
            "--system-dns",
        ]);
        let config = cli.build_config().unwrap();
        assert_eq!(config.min_length, 2);
        assert_eq!(config.suffixes, vec![".io".to_string(), ".dev".to_string()]);
        assert!(config.nameservers.is_empty());
    }
}
