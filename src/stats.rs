/// Assembly summary statistics for the sequence sets declared in delta
/// headers.
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// N50: the largest length such that sequences at least that long cover half
/// of the total. Expects lengths sorted ascending; 0 for an empty set.
pub fn n50(sorted_lengths: &[u64]) -> u64 {
    let total: u64 = sorted_lengths.iter().sum();
    let mut cumulative = 0u64;
    for &length in sorted_lengths.iter().rev() {
        cumulative += length;
        if cumulative >= total / 2 {
            return length;
        }
    }
    0
}

/// Format a base-pair quantity with Gbp/Mbp/Kbp units, two decimal places
/// above one Kbp.
pub fn format_bp(value: f64) -> String {
    const GIG: f64 = 1_000_000_000.0;
    const MEG: f64 = 1_000_000.0;
    const KIL: f64 = 1_000.0;
    if value > GIG {
        format!("{:.2} Gbp", value / GIG)
    } else if value > MEG {
        format!("{:.2} Mbp", value / MEG)
    } else if value > KIL {
        format!("{:.2} Kbp", value / KIL)
    } else if value.fract() == 0.0 {
        format!("{} bp", value as u64)
    } else {
        format!("{value:.2} bp")
    }
}

/// Thousands-separated integer, e.g. 1234567 -> "1,234,567".
pub fn format_number(n: usize) -> String {
    let digits = n.to_string();
    let mut result = String::new();
    for (i, c) in digits.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

/// Write one side (reference or query) of the summary: count, total, mean,
/// min, max, N50.
pub fn write_section(
    out: &mut dyn Write,
    label: &str,
    name: &str,
    mut lengths: Vec<u64>,
) -> Result<()> {
    lengths.sort_unstable();
    let count = lengths.len();
    let total: u64 = lengths.iter().sum();
    let mean = if count > 0 {
        total as f64 / count as f64
    } else {
        0.0
    };
    let min = lengths.first().copied().unwrap_or(0);
    let max = lengths.last().copied().unwrap_or(0);

    writeln!(out, "{label}: {name}")?;
    writeln!(out, "Number of sequences: {}", format_number(count))?;
    writeln!(out, "Total sequence length: {}", format_bp(total as f64))?;
    writeln!(out, "Mean: {}", format_bp(mean))?;
    writeln!(out, "Min: {}", format_bp(min as f64))?;
    writeln!(out, "Max: {}", format_bp(max as f64))?;
    writeln!(out, "N50: {}", format_bp(n50(&lengths) as f64))?;
    Ok(())
}

/// The reference and query set labels come from the two path tokens of the
/// delta preamble's first line.
pub fn sequence_set_labels(preamble: &str) -> (&str, &str) {
    let mut tokens = preamble.split_whitespace();
    let reference = basename(tokens.next().unwrap_or(""));
    let query = basename(tokens.next().unwrap_or(""));
    (reference, query)
}

fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Write the assembly statistics report for the first-seen reference and
/// query lengths collected by the streaming filter.
pub fn write_assembly_stats<P: AsRef<Path>>(
    path: P,
    preamble: &str,
    ref_lengths: Vec<u64>,
    query_lengths: Vec<u64>,
) -> Result<()> {
    let path = path.as_ref();
    let file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    let mut out = BufWriter::new(file);

    let (ref_label, query_label) = sequence_set_labels(preamble);
    write_section(&mut out, "Reference", ref_label, ref_lengths)?;
    writeln!(out)?;
    writeln!(out)?;
    write_section(&mut out, "Query", query_label, query_lengths)?;
    out.flush()?;
    Ok(())
}
