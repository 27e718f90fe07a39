//! Evaluate a [`SpeculativePredictor`] against one or more traces.
//!
//! Conditional branches are predicted and committed in order. With
//! `--wrong-path N`, every misprediction is followed by N predictions down
//! the wrong path, which are discarded (youngest first) before history is
//! repaired and the branch is committed.

use clap::{ Arg, ArgAction, Command };
use std::error::Error;
use std::fs;
use std::time::Instant;

use arbor::*;
use arbor::stats::*;

/// Size of an instruction, used to make up wrong-path addresses.
const ILEN: usize = 4;

fn run_trace(
    cfg: &PredictorConfig,
    records: &[BranchRecord],
    wrong_path: usize,
) -> Result<(BranchStats, PredictorStats), Box<dyn Error>>
{
    let mut bp = cfg.clone().build()?;
    let mut stats = BranchStats::new();
    let ctx = ContextId(0);

    for record in records {
        if record.is_unconditional() {
            bp.unconditional(ctx, record.pc, Outcome::T)?;
            continue;
        }

        let (prediction, session) = bp.predict(ctx, record.pc)?;
        stats.update(record, prediction);

        if prediction != record.outcome {
            // Fetch continues on the predicted path until the branch
            // resolves.
            let wrong_pc = match prediction {
                Outcome::T => record.tgt,
                Outcome::N => record.pc + ILEN,
            };
            let mut wrong = Vec::with_capacity(wrong_path);
            for i in 0..wrong_path {
                let (_, s) = bp.predict(ctx, wrong_pc + i * ILEN)?;
                wrong.push(s);
            }
            for s in wrong.into_iter().rev() {
                bp.discard(Some(s));
            }
            bp.repair(&session, record.outcome);
        }
        bp.commit(Some(session), record.outcome);
    }
    Ok((stats, bp.stat))
}

fn main() -> Result<(), Box<dyn Error>> {
    let matches = Command::new("evaluate-perceptron")
        .version("0.1")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Predictor configuration (TOML)")
                .num_args(1),
        )
        .arg(
            Arg::new("wrong-path")
                .short('w')
                .long("wrong-path")
                .value_name("N")
                .help("Number of wrong-path predictions after each misprediction")
                .value_parser(clap::value_parser!(usize))
                .default_value("0"),
        )
        .arg(
            Arg::new("limit")
                .short('n')
                .long("limit")
                .value_name("RECORDS")
                .help("Only evaluate the first RECORDS records of each trace")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("TRACES")
                .help("Trace files")
                .required(true)
                .action(ArgAction::Append),
        )
        .get_matches();

    env_logger::builder().format_timestamp(None).init();

    let cfg = match matches.get_one::<String>("config") {
        Some(path) => PredictorConfig::from_toml_str(&fs::read_to_string(path)?)?,
        None => PredictorConfig::default(),
    };
    let wrong_path = *matches.get_one::<usize>("wrong-path").unwrap_or(&0);
    let limit = matches.get_one::<usize>("limit").copied();
    let files: Vec<String> = matches.get_many::<String>("TRACES")
        .map(|v| v.cloned().collect())
        .unwrap_or_default();

    println!("[*] Predictor configuration:");
    println!("      {:?}", cfg);
    let storage_bits = cfg.storage_bits()?;
    println!("      Storage bits: {}b, {:.2}KiB",
        storage_bits, storage_bits as f64 / 1024.0 / 8.0
    );

    for trace in BinaryTraceSet::new_from_slice(&files) {
        let trace = trace?;
        let records = match limit {
            Some(n) => trace.as_slice_trunc(n),
            None => trace.as_slice(),
        };
        println!("[*] {} ({} records)", trace.name(), records.len());

        let start = Instant::now();
        let (stats, pstat) = run_trace(&cfg, records, wrong_path)?;
        log::info!("simulated in {:.3?}", start.elapsed());

        println!("      Unique branches: {}", stats.num_unique_branches());
        println!("      Global hit rate: {}/{} ({:.2}% correct) ({} misses)",
            stats.global_hits(),
            stats.global_brns(),
            stats.hit_rate() * 100.0,
            stats.global_miss()
        );
        println!("      {} trained commits, {} repairs, {} discards, {} unconditional",
            pstat.trained, pstat.repairs, pstat.discards, pstat.unconditional
        );
        println!("      Low hit-rate branches:");
        for (pc, data) in stats.get_low_rate_branches(8, 100, 0.55) {
            println!("        {:016x} {:8}/{:8} {:.4}",
                pc, data.hits, data.occ, data.hit_rate()
            );
        }
    }
    Ok(())
}
