//! Lateral planner replay
//!
//! Feeds recorded `PlannerInput` JSON lines through the planner and writes
//! one `LateralPlanOutput` JSON line per tick.
//!
//! Usage: lateral-replay [--config FILE] [--tuning FILE] [--json-logs] [--verbose] [INPUT]

use anyhow::{bail, Context, Result};
use lateral_planner::{
    init_logging, FileTuning, LateralPlanner, PlannerConfig, PlannerInput, TuningSource,
};
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;
use tracing::{info, warn, Level};

#[derive(Debug, Default)]
struct Args {
    config: Option<PathBuf>,
    tuning: Option<PathBuf>,
    input: Option<PathBuf>,
    json_logs: bool,
    verbose: bool,
}

fn parse_args() -> Result<Args> {
    let mut args = Args::default();
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--config" => args.config = Some(it.next().context("--config needs a path")?.into()),
            "--tuning" => args.tuning = Some(it.next().context("--tuning needs a path")?.into()),
            "--json-logs" => args.json_logs = true,
            "--verbose" => args.verbose = true,
            flag if flag.starts_with("--") => bail!("unknown flag {}", flag),
            path => args.input = Some(path.into()),
        }
    }
    Ok(args)
}

fn replay<S: TuningSource>(
    mut planner: LateralPlanner<S>,
    reader: impl BufRead,
    mut writer: impl Write,
) -> Result<()> {
    let mut ticks = 0u64;
    let mut skipped = 0u64;
    for (number, line) in reader.lines().enumerate() {
        let line = line.context("reading input")?;
        if line.trim().is_empty() {
            continue;
        }
        let input: PlannerInput = match serde_json::from_str(&line) {
            Ok(input) => input,
            Err(e) => {
                warn!("Skipping line {}: {}", number + 1, e);
                skipped += 1;
                continue;
            }
        };
        let output = planner.update(&input);
        serde_json::to_writer(&mut writer, &output)?;
        writer.write_all(b"\n")?;
        ticks += 1;
    }
    writer.flush()?;
    info!("Replay done: {} ticks, {} lines skipped", ticks, skipped);
    Ok(())
}

fn main() -> Result<()> {
    let args = parse_args()?;
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    init_logging(args.json_logs, level)?;

    info!("=== Lateral replay v{} ===", env!("CARGO_PKG_VERSION"));
    let config = PlannerConfig::load(args.config.as_deref())
        .with_context(|| format!("loading config {:?}", args.config))?;

    let reader: Box<dyn BufRead> = match &args.input {
        Some(path) => Box::new(BufReader::new(
            File::open(path).with_context(|| format!("opening {}", path.display()))?,
        )),
        None => Box::new(BufReader::new(io::stdin())),
    };
    let writer = BufWriter::new(io::stdout().lock());

    match args.tuning {
        Some(path) => {
            info!("Tuning from {}", path.display());
            let planner = LateralPlanner::with_tuning(config, FileTuning::new(path));
            replay(planner, reader, writer)
        }
        None => replay(LateralPlanner::new(config), reader, writer),
    }
}
