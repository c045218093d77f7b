use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use oli_labeler::batch::{Batcher, BatcherConfig};
use oli_labeler::engine::{ContractJoinEngine, EngineConfig, RecordScan};
use oli_labeler::infra::{CheckpointStore, ShutdownCoordinator};
use oli_labeler::metrics::RunMetrics;
use oli_labeler::submit::{
    DeliveryMode, EasLabelPlatform, PlatformConfig, SubmissionDriver, SubmitterConfig,
};
use oli_labeler::telemetry::{init_telemetry, TelemetryConfig};
use oli_labeler::{LabelerError, Result};

fn print_help() {
    eprintln!(
        "\
oli-labeler

USAGE:
  labeler <command> [options]

COMMANDS:
  inspect     Show table counts, join counts, and chain distribution
  run         Join the export and submit labels

COMMON OPTIONS:
  --data-dir <path>       Export directory (defaults to env LABELER_DATA_DIR)
  --chain-id <n>          Restrict to one chain (defaults to env LABELER_CHAIN_ID)

run OPTIONS:
  --batch-size <n>        Labels per batch (default 1000)
  --delay <seconds>       Delay between submissions (default 1.0)
  --max-workers <n>       Offchain worker pool size (default 10, max 20)
  --onchain               Submit onchain attestations (costs gas)
  --limit <n>             Stop after this many records
  --offset <n>            Resume offset (overrides the checkpoint)
  --state-dir <path>      Checkpoint directory (default ./labeler_state)
  --no-resume             Ignore any existing checkpoint

Environment: LABELER_PRIVATE_KEY (required for run), LABELER_PRODUCTION,
LABELER_RPC_URL, LABELER_API_URL, LABELER_LOG, LABELER_LOG_JSON
"
    );
}

#[derive(Debug)]
struct Options {
    data_dir: Option<PathBuf>,
    chain_id: Option<u64>,
    batch_size: Option<usize>,
    delay: Option<f64>,
    max_workers: Option<usize>,
    onchain: bool,
    limit: Option<usize>,
    offset: Option<u64>,
    state_dir: PathBuf,
    no_resume: bool,
}

impl Options {
    fn parse(args: &[String]) -> Result<Self> {
        let mut options = Options {
            data_dir: std::env::var("LABELER_DATA_DIR").ok().map(PathBuf::from),
            chain_id: std::env::var("LABELER_CHAIN_ID")
                .ok()
                .and_then(|s| s.parse().ok()),
            batch_size: None,
            delay: None,
            max_workers: None,
            onchain: false,
            limit: None,
            offset: None,
            state_dir: PathBuf::from("./labeler_state"),
            no_resume: false,
        };

        let mut queue: VecDeque<&String> = args.iter().collect();
        while let Some(flag) = queue.pop_front() {
            match flag.as_str() {
                "--data-dir" => options.data_dir = Some(PathBuf::from(required(&mut queue, flag)?)),
                "--chain-id" => options.chain_id = Some(parse_number(&mut queue, flag)?),
                "--batch-size" => options.batch_size = Some(parse_number(&mut queue, flag)?),
                "--delay" => options.delay = Some(parse_number(&mut queue, flag)?),
                "--max-workers" => options.max_workers = Some(parse_number(&mut queue, flag)?),
                "--onchain" => options.onchain = true,
                "--limit" => options.limit = Some(parse_number(&mut queue, flag)?),
                "--offset" => options.offset = Some(parse_number(&mut queue, flag)?),
                "--state-dir" => {
                    options.state_dir = PathBuf::from(required(&mut queue, flag)?)
                }
                "--no-resume" => options.no_resume = true,
                other => {
                    return Err(LabelerError::Configuration(format!(
                        "unknown option: {other}"
                    )))
                }
            }
        }

        Ok(options)
    }

    fn engine_config(&self) -> Result<EngineConfig> {
        match &self.data_dir {
            Some(dir) => Ok(EngineConfig::new(dir.clone())),
            None => Err(LabelerError::Configuration(
                "no data directory: pass --data-dir or set LABELER_DATA_DIR".to_string(),
            )),
        }
    }
}

fn required<'a>(queue: &mut VecDeque<&'a String>, flag: &str) -> Result<&'a String> {
    queue
        .pop_front()
        .ok_or_else(|| LabelerError::Configuration(format!("{flag} requires a value")))
}

fn parse_number<T: std::str::FromStr>(queue: &mut VecDeque<&String>, flag: &str) -> Result<T> {
    required(queue, flag)?
        .parse()
        .map_err(|_| LabelerError::Configuration(format!("{flag} requires a numeric value")))
}

async fn cmd_inspect(args: &[String]) -> Result<()> {
    let options = Options::parse(args)?;
    let engine = ContractJoinEngine::open(options.engine_config()?).await?;

    let counts = engine.table_counts().await?;
    println!("Source tables:");
    println!("  verified_contracts:   {}", counts.verified_contracts);
    println!("  contract_deployments: {}", counts.contract_deployments);
    println!("  compiled_contracts:   {}", counts.compiled_contracts);

    let scan = RecordScan {
        chain_id: options.chain_id,
        ..RecordScan::default()
    };
    let joinable = engine.count_joined(&scan).await?;
    match options.chain_id {
        Some(chain) => println!("\nJoinable contracts on chain {chain}: {joinable}"),
        None => println!("\nJoinable contracts (all chains): {joinable}"),
    }

    println!("\nChain distribution (top 10):");
    for entry in engine.chain_distribution(10).await? {
        println!("  chain {:>10}: {} contracts", entry.chain_id, entry.contracts);
    }

    Ok(())
}

async fn cmd_run(args: &[String]) -> Result<()> {
    let options = Options::parse(args)?;

    let engine = ContractJoinEngine::open(options.engine_config()?).await?;

    let batcher_config = match options.batch_size {
        Some(batch_size) => BatcherConfig { batch_size },
        None => BatcherConfig::from_env(),
    };

    let mut submitter_config = SubmitterConfig::from_env();
    if options.onchain {
        submitter_config.mode = DeliveryMode::OnChain;
    }
    if let Some(delay) = options.delay {
        submitter_config.delay = Duration::from_secs_f64(delay);
    }
    if let Some(max_workers) = options.max_workers {
        submitter_config.max_workers = max_workers;
    }
    submitter_config = submitter_config.clamped();

    let checkpoint_store = CheckpointStore::new(&options.state_dir)?;
    let resume_offset = match options.offset {
        Some(offset) => offset,
        None if options.no_resume => 0,
        None => match checkpoint_store.load() {
            Some(checkpoint) => {
                println!(
                    "Resuming from checkpoint: batch {} at offset {}",
                    checkpoint.batch_index, checkpoint.offset
                );
                checkpoint.offset
            }
            None => 0,
        },
    };

    let scan = RecordScan {
        chain_id: options.chain_id,
        limit: options.limit,
        offset: resume_offset as usize,
    };

    let total = engine.count_joined(&scan).await?;
    let remaining = total.saturating_sub(resume_offset);
    println!(
        "Submitting up to {remaining} labels ({} mode, batch size {}, delay {:?})",
        match submitter_config.mode {
            DeliveryMode::OnChain => "onchain",
            DeliveryMode::OffChain => "offchain",
        },
        batcher_config.batch_size,
        submitter_config.delay,
    );

    let platform = Arc::new(EasLabelPlatform::new(PlatformConfig::from_env()?));
    let metrics = Arc::new(RunMetrics::new());
    let driver = SubmissionDriver::new(platform, submitter_config, metrics);

    let coordinator = Arc::new(ShutdownCoordinator::new());
    let signal = coordinator.signal();
    oli_labeler::infra::spawn_signal_listener(coordinator);

    let records = engine.records(&scan).await?;
    let mut batcher = Batcher::new(records, resume_offset, batcher_config);

    let summary = driver
        .run(&mut batcher, &signal, Some(&checkpoint_store))
        .await?;

    println!();
    println!(
        "{}: {} batches, {}/{} successful, {} failed, {} skipped, {} excluded",
        if summary.completed {
            "Run complete"
        } else {
            "Run stopped early"
        },
        summary.batches_completed,
        summary.successful,
        summary.total,
        summary.failed,
        summary.skipped,
        summary.records_excluded,
    );
    if !summary.completed {
        println!("Resume with: labeler run --offset {}", summary.next_offset);
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    init_telemetry(&TelemetryConfig::from_env());

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first() else {
        print_help();
        std::process::exit(2);
    };

    let result = match command.as_str() {
        "inspect" => cmd_inspect(&args[1..]).await,
        "run" => cmd_run(&args[1..]).await,
        "help" | "--help" | "-h" => {
            print_help();
            return;
        }
        other => {
            eprintln!("Unknown command: {other}\n");
            print_help();
            std::process::exit(2);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
