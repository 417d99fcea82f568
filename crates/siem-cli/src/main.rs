//! Binary front end: `run` replays a file of `(event, directive)` pairs
//! through the dispatcher, `status` dumps the resulting backlog snapshot,
//! `validate` resolves every directive's back-references ahead of time.

mod assets;

use std::collections::{BTreeMap, HashMap};
use std::io::BufRead;
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;

use siem_alarm::FileAlarmSink;
use siem_config::{ConfigLoader, Settings};
use siem_directives::{load_dir, SimpleMatcher};
use siem_kernel::{resolve_directive, AssetLookup, SystemClock};
use siem_runtime::{Collaborators, Engine};
use siem_types::{BacklogSnapshot, Directive, NormalizedEvent};

use assets::FileAssetLookup;

#[derive(Parser)]
#[command(name = "siem", version, about = "SIEM correlation core replay driver")]
struct Cli {
    /// Directory expected to contain `logs/`, `directives/`, and an
    /// optional `assets.json`.
    #[arg(long, default_value = ".")]
    base_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replay a JSON-Lines file of `{"event": ..., "directive_id": N}`
    /// entries through the dispatcher, as they would arrive in production.
    Run { events_file: PathBuf },
    /// Print the backlog snapshot captured by the last `run`.
    Status,
    /// Resolve every loaded directive's `:N` back-references and report any
    /// `BadReference` without creating backlogs.
    Validate,
}

#[derive(Deserialize)]
struct ReplayEntry {
    event: NormalizedEvent,
    directive_id: u64,
}

struct NullAssets;
impl AssetLookup for NullAssets {
    fn asset_name(&self, _ip: IpAddr) -> Option<String> {
        None
    }
    fn asset_value(&self, _ip: IpAddr) -> i64 {
        0
    }
}

fn init_tracing(filter: &str) {
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
}

fn parse_home_net(cidrs: &[String]) -> Vec<(Ipv4Addr, u8)> {
    cidrs
        .iter()
        .filter_map(|s| {
            let (addr, prefix) = s.split_once('/')?;
            Some((addr.parse().ok()?, prefix.parse().ok()?))
        })
        .collect()
}

fn status_path(base_dir: &Path) -> PathBuf {
    base_dir.join("logs").join("siem_status.json")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = ConfigLoader::new(&cli.base_dir).load().context("loading configuration")?;
    init_tracing(&settings.log_filter);

    match cli.command {
        Command::Run { events_file } => run(&cli.base_dir, &settings, &events_file).await,
        Command::Status => status(&cli.base_dir),
        Command::Validate => validate(&settings),
    }
}

async fn run(base_dir: &Path, settings: &Settings, events_file: &Path) -> Result<()> {
    let directives = load_dir(&settings.directives_dir).context("loading directives")?;
    let directives_by_id: HashMap<u64, Directive> = directives.into_iter().map(|d| (d.id, d)).collect();

    let collaborators = Collaborators {
        matcher: Arc::new(SimpleMatcher::new(parse_home_net(&settings.home_net))),
        assets: Arc::new(FileAssetLookup::load(&base_dir.join("assets.json"))?),
        alarm: Arc::new(FileAlarmSink::open(base_dir).context("opening alarm journal")?),
        clock: Arc::new(SystemClock),
    };
    let engine = Engine::init(collaborators, settings.id_seed);

    let file = std::fs::File::open(events_file).with_context(|| format!("opening {}", events_file.display()))?;
    for (line_no, line) in std::io::BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let entry: ReplayEntry = serde_json::from_str(&line)
            .with_context(|| format!("{}:{}: invalid replay entry", events_file.display(), line_no + 1))?;
        let Some(directive) = directives_by_id.get(&entry.directive_id) else {
            tracing::warn!(directive_id = entry.directive_id, "unknown directive, skipping entry");
            continue;
        };
        engine.process(&entry.event, directive);
    }

    let snapshot = serde_json::to_vec_pretty(&BacklogSnapshots {
        backlogs: engine.snapshots(),
    })?;
    std::fs::create_dir_all(base_dir.join("logs"))?;
    std::fs::write(status_path(base_dir), snapshot)?;

    engine.shutdown().await;
    Ok(())
}

#[derive(serde::Serialize, serde::Deserialize)]
struct BacklogSnapshots {
    backlogs: Vec<BacklogSnapshot>,
}

fn status(base_dir: &Path) -> Result<()> {
    let path = status_path(base_dir);
    if !path.exists() {
        println!("no status recorded yet; run `siem run <events-file>` first");
        return Ok(());
    }
    let contents = std::fs::read_to_string(&path)?;
    println!("{contents}");
    Ok(())
}

fn validate(settings: &Settings) -> Result<()> {
    let directives = load_dir(&settings.directives_dir).context("loading directives")?;
    let probe_event = NormalizedEvent {
        event_id: "validate".into(),
        src_ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        dst_ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        src_port: 0,
        dst_port: 0,
        conn_id: "validate".into(),
        attributes: BTreeMap::new(),
    };

    let mut failures = 0usize;
    for directive in &directives {
        match resolve_directive(directive, &probe_event, &NullAssets) {
            Ok(_) => println!("directive {} ({}): OK", directive.id, directive.name),
            Err(err) => {
                failures += 1;
                println!("directive {} ({}): {err}", directive.id, directive.name);
            }
        }
    }

    println!("{} directive(s) checked, {} failure(s)", directives.len(), failures);
    if failures > 0 {
        anyhow::bail!("{failures} directive(s) failed resolution");
    }
    Ok(())
}
