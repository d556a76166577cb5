/// deltastats - Assembly statistics for delta alignment files
///
/// Prints count, total length, mean, min, max, and N50 for the reference and
/// query sequence sets declared in a delta file's headers.
use anyhow::Result;
use clap::Parser;
use indexmap::IndexMap;
use std::io::{BufRead, Write};

use dotsweep::delta;
use dotsweep::stats::{sequence_set_labels, write_section};

#[derive(Parser)]
#[clap(
    name = "deltastats",
    about = "Assembly statistics for delta alignment files"
)]
struct Args {
    /// Delta file (gzip auto-detected)
    file: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut reader = delta::open_delta_input(&args.file)?;
    let (first, _second) = delta::read_preamble(&mut reader)?;

    let mut ref_lengths: IndexMap<String, u64> = IndexMap::new();
    let mut query_lengths: IndexMap<String, u64> = IndexMap::new();

    let mut line = String::new();
    let mut line_number = 2u64;
    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            break;
        }
        line_number += 1;
        if delta::is_header(&line) {
            let header = delta::parse_header(line.trim(), line_number)?;
            ref_lengths.entry(header.ref_name).or_insert(header.ref_len);
            query_lengths
                .entry(header.query_name)
                .or_insert(header.query_len);
        }
    }

    let (ref_label, query_label) = sequence_set_labels(first.trim());
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    write_section(
        &mut out,
        "Reference",
        ref_label,
        ref_lengths.values().copied().collect(),
    )?;
    writeln!(out)?;
    write_section(
        &mut out,
        "Query",
        query_label,
        query_lengths.values().copied().collect(),
    )?;

    Ok(())
}
