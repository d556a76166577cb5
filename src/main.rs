use anyhow::Result;
use clap::Parser;
use env_logger::Env;
use log::info;
use std::time::Instant;

use dotsweep::coord_index::index_for_dot;
use dotsweep::filter_stream::StreamingFilter;
use dotsweep::query_index::{decide_alignments_to_keep, QueryIndex};
use dotsweep::stats::write_assembly_stats;

/// Parse a number that may have metric suffix (k/K=1000, m/M=1e6, g/G=1e9)
fn parse_metric_number(s: &str) -> Result<u64, String> {
    if s.is_empty() {
        return Err("Empty string".to_string());
    }

    let (num_part, suffix) = if s.ends_with(|c: char| c.is_ascii_alphabetic()) {
        let last_char = s.chars().last().unwrap();
        (&s[..s.len() - last_char.len_utf8()], Some(last_char))
    } else {
        (s, None)
    };

    let base: f64 = num_part
        .parse()
        .map_err(|e| format!("Invalid number: {e}"))?;

    let multiplier = match suffix {
        Some('k') | Some('K') => 1000.0,
        Some('m') | Some('M') => 1_000_000.0,
        Some('g') | Some('G') => 1_000_000_000.0,
        Some(c) => {
            return Err(format!(
                "Unknown suffix '{c}'. Use k/K (1000), m/M (1e6), or g/G (1e9)"
            ))
        }
        None => 1.0,
    };

    let result = base * multiplier;

    if result < 0.0 || result > u64::MAX as f64 {
        return Err(format!("Value {result} out of range"));
    }

    Ok(result as u64)
}

/// dotsweep - unique anchor filtering and Dot input preparation
///
/// Applies per-query plane-sweep uniqueness filtering to a delta alignment
/// file and writes the coordinate and index files consumed by the Dot dot
/// plot viewer.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Input delta file (gzip auto-detected)
    #[clap(short = 'd', long = "delta")]
    delta: String,

    /// Prefix for all output files
    #[clap(short = 'o', long = "out", default_value = "output")]
    out: String,

    /// Total unique query-side length an alignment must anchor to be kept
    #[clap(short = 'u', long = "unique-length", default_value = "10k", value_parser = parse_metric_number)]
    unique_length: u64,

    /// Number of threads for per-query classification
    #[clap(short = 't', long = "threads", default_value = "8")]
    threads: usize,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    rayon::ThreadPoolBuilder::new()
        .num_threads(args.threads)
        .build_global()?;

    // Small alignments that are the sole occupants of their query span are
    // kept even below the length threshold.
    let keep_small_uniques = true;

    let scan_start = Instant::now();
    let index = QueryIndex::scan(&args.delta)?;
    info!(
        "first pass: {} alignments across {} queries in {:.1?}",
        index.total_alignments(),
        index.queries.len(),
        scan_start.elapsed()
    );

    let classify_start = Instant::now();
    let keep = decide_alignments_to_keep(&index, args.unique_length, keep_small_uniques);
    let kept_total: usize = keep.values().map(|k| k.ordinals.len()).sum();
    info!(
        "kept {kept_total} alignments with unique length >= {} in {:.1?}",
        args.unique_length,
        classify_start.elapsed()
    );

    let filter_start = Instant::now();
    let filter = StreamingFilter::new(&index, &keep);
    let (outputs, lengths) = filter.filter_delta(&args.delta, &args.out, args.unique_length)?;
    info!(
        "second pass wrote {} in {:.1?}",
        outputs.filtered_delta.display(),
        filter_start.elapsed()
    );

    write_assembly_stats(
        format!("{}.assembly_stats.txt", args.out),
        &lengths.preamble,
        lengths.ref_lengths.values().copied().collect(),
        lengths.query_lengths.values().copied().collect(),
    )?;

    index_for_dot(&outputs.coords_csv, &args.out)?;
    info!("coordinate indexing complete");

    Ok(())
}
