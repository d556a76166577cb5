/// Third stage: index the full coordinate table for the visualization.
///
/// Consumes the CSV coordinate table written by the streaming filter and
/// derives reference/query ordering, per-query strand orientation, and the
/// oriented, size-partitioned coordinate outputs.
use anyhow::{bail, Context, Result};
use indexmap::IndexMap;
use log::info;
use ordered_float::OrderedFloat;
use std::cmp::Reverse;
use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::natural_sort::natural_cmp;

/// Repetitive records beyond this count overflow to a separate file instead
/// of being inlined into the oriented coordinate output.
const MAX_INLINE_REPETITIVE: usize = 100_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    Unique,
    Repetitive,
}

impl Tag {
    fn parse(text: &str, line_number: u64) -> Result<Tag> {
        match text {
            "unique" => Ok(Tag::Unique),
            "repetitive" => Ok(Tag::Repetitive),
            other => bail!("unknown tag {other:?} in coordinate table at line {line_number}"),
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Tag::Unique => "unique",
            Tag::Repetitive => "repetitive",
        }
    }
}

/// One row of the coordinate CSV.
#[derive(Debug, Clone)]
pub struct CoordRecord {
    pub ref_start: u64,
    pub ref_end: u64,
    pub query_start: u64,
    pub query_end: u64,
    pub ref_len: u64,
    pub query_len: u64,
    pub ref_name: String,
    pub query_name: String,
    pub tag: Tag,
}

/// The coordinate table with its header row.
pub struct CoordTable {
    pub header: String,
    pub records: Vec<CoordRecord>,
}

/// Read the full coordinate CSV into memory (bounded by the total alignment
/// count, never the raw input text).
pub fn read_coords<P: AsRef<Path>>(path: P) -> Result<CoordTable> {
    let path = path.as_ref();
    let file =
        File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let mut reader = BufReader::new(file);

    let mut header = String::new();
    if reader.read_line(&mut header)? == 0 {
        bail!("empty coordinate table {}", path.display());
    }
    let header = header.trim().to_string();

    let mut records = Vec::new();
    let mut line = String::new();
    let mut line_number = 1u64;
    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            break;
        }
        line_number += 1;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        records.push(parse_coord_line(trimmed, line_number)?);
    }

    Ok(CoordTable { header, records })
}

fn parse_coord_line(line: &str, line_number: u64) -> Result<CoordRecord> {
    let fields: Vec<&str> = line.split(',').collect();
    if fields.len() < 9 {
        bail!("coordinate row at line {line_number} has {} fields, expected 9", fields.len());
    }
    let number = |index: usize| -> Result<u64> {
        fields[index].parse().with_context(|| {
            format!("non-numeric field {:?} in coordinate row at line {line_number}", fields[index])
        })
    };
    Ok(CoordRecord {
        ref_start: number(0)?,
        ref_end: number(1)?,
        query_start: number(2)?,
        query_end: number(3)?,
        ref_len: number(4)?,
        query_len: number(5)?,
        ref_name: fields[6].to_string(),
        query_name: fields[7].to_string(),
        tag: Tag::parse(fields[8], line_number)?,
    })
}

/// Median of integer position scores; the mean of the two middle values when
/// the count is even.
fn median(values: &mut [u64]) -> f64 {
    values.sort_unstable();
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        values[mid] as f64
    } else {
        (values[mid - 1] as f64 + values[mid] as f64) / 2.0
    }
}

fn join_tilde(names: &BTreeSet<&str>) -> String {
    names.iter().copied().collect::<Vec<_>>().join("~")
}

/// Build all index and oriented-coordinate outputs from the coordinate CSV.
pub fn index_for_dot<P: AsRef<Path>>(coords_csv: P, out_prefix: &str) -> Result<()> {
    let table = read_coords(coords_csv)?;

    // Group rows by query in first-seen order; record each reference's
    // declared length at its first occurrence.
    let mut records_by_query: IndexMap<&str, Vec<&CoordRecord>> = IndexMap::new();
    let mut query_lengths: HashMap<&str, u64> = HashMap::new();
    let mut reference_lengths: IndexMap<&str, u64> = IndexMap::new();
    for record in &table.records {
        records_by_query
            .entry(record.query_name.as_str())
            .or_default()
            .push(record);
        query_lengths.insert(record.query_name.as_str(), record.query_len);
        reference_lengths
            .entry(record.ref_name.as_str())
            .or_insert(record.ref_len);
    }

    // Chromosome-style reference order.
    let mut references: Vec<(&str, u64)> =
        reference_lengths.iter().map(|(name, &len)| (*name, len)).collect();
    references.sort_by(|a, b| natural_cmp(a.0, b.0));

    // Cumulative offsets merge all references into one linear coordinate
    // space, used only for cross-reference query ordering.
    let mut ref_offsets: HashMap<&str, u64> = HashMap::new();
    let mut cumulative = 0u64;
    for &(name, len) in &references {
        ref_offsets.insert(name, cumulative);
        cumulative += len;
    }

    // Orientation, matching-partner sets, and ordering score per query, from
    // unique-tagged rows only.
    let mut flip_by_query: HashMap<&str, bool> = HashMap::new();
    let mut refs_by_query: HashMap<&str, BTreeSet<&str>> = HashMap::new();
    let mut queries_by_reference: HashMap<&str, BTreeSet<&str>> = HashMap::new();
    let mut score_by_query: Vec<(&str, f64)> = Vec::new();

    for (&query, rows) in &records_by_query {
        let mut sum_forward = 0u64;
        let mut sum_reverse = 0u64;
        let mut position_scores: Vec<u64> = Vec::new();
        let matched = refs_by_query.entry(query).or_default();
        for record in rows.iter().filter(|record| record.tag == Tag::Unique) {
            let aligned = record.query_end.abs_diff(record.query_start);
            matched.insert(record.ref_name.as_str());
            queries_by_reference
                .entry(record.ref_name.as_str())
                .or_default()
                .insert(query);
            position_scores
                .push(ref_offsets[record.ref_name.as_str()] + (record.ref_start + record.ref_end) / 2);
            if record.query_end < record.query_start {
                sum_reverse += aligned;
            } else {
                sum_forward += aligned;
            }
        }
        flip_by_query.insert(query, sum_reverse > sum_forward);
        let score = if position_scores.is_empty() {
            0.0
        } else {
            median(&mut position_scores)
        };
        score_by_query.push((query, score));
    }

    // Visualization query order: ascending score, ties in first-seen order.
    score_by_query.sort_by_key(|&(_, score)| OrderedFloat(score));

    let ref_index_path = format!("{out_prefix}.ref.index");
    let mut ref_index = BufWriter::new(
        File::create(&ref_index_path)
            .with_context(|| format!("failed to create {ref_index_path}"))?,
    );
    writeln!(ref_index, "ref,ref_length,matching_queries")?;
    for (name, len) in &references {
        let queries = queries_by_reference
            .get(name)
            .map(join_tilde)
            .unwrap_or_default();
        writeln!(ref_index, "{name},{len},{queries}")?;
    }
    ref_index.flush()?;

    let query_index_path = format!("{out_prefix}.query.index");
    let mut query_index = BufWriter::new(
        File::create(&query_index_path)
            .with_context(|| format!("failed to create {query_index_path}"))?,
    );
    writeln!(query_index, "query,query_length,matching_refs")?;
    for (query, _score) in &score_by_query {
        let refs = refs_by_query.get(query).map(join_tilde).unwrap_or_default();
        writeln!(query_index, "{query},{},{refs}", query_lengths[query])?;
    }
    query_index.flush()?;

    // Orientation pass: flipped queries get their query coordinates
    // mirrored. Flipped rows measure alignment_length against the reference
    // end field; unflipped rows use the query span.
    let mut uniques: Vec<(CoordRecord, u64)> = Vec::new();
    let mut repetitives: Vec<(CoordRecord, u64)> = Vec::new();
    for record in &table.records {
        let mut row = record.clone();
        let alignment_length;
        if flip_by_query.get(row.query_name.as_str()).copied().unwrap_or(false) {
            let query_len = row.query_len;
            let mirror = |coordinate: u64| {
                query_len.checked_sub(coordinate).with_context(|| {
                    format!(
                        "query coordinate {coordinate} exceeds declared length {query_len} for {}",
                        record.query_name
                    )
                })
            };
            row.query_start = mirror(record.query_start)?;
            row.query_end = mirror(record.query_end)?;
            alignment_length = row.query_start.abs_diff(row.ref_end);
        } else {
            alignment_length = row.query_end.abs_diff(row.query_start);
        }
        match row.tag {
            Tag::Unique => uniques.push((row, alignment_length)),
            Tag::Repetitive => repetitives.push((row, alignment_length)),
        }
    }

    uniques.sort_by_key(|&(_, len)| Reverse(len));
    repetitives.sort_by_key(|&(_, len)| Reverse(len));

    let oriented_path = format!("{out_prefix}.oriented_coords.csv");
    let mut oriented = BufWriter::new(
        File::create(&oriented_path).with_context(|| format!("failed to create {oriented_path}"))?,
    );
    writeln!(oriented, "{},alignment_length", table.header)?;

    let info_path = format!("{out_prefix}.info.csv");
    let mut info_out = BufWriter::new(
        File::create(&info_path).with_context(|| format!("failed to create {info_path}"))?,
    );
    writeln!(info_out, "key,value")?;
    writeln!(info_out, "unique alignments,{}", uniques.len())?;
    writeln!(info_out, "repetitive alignments,{}", repetitives.len())?;

    for (row, len) in &uniques {
        write_oriented_row(&mut oriented, row, *len)?;
    }

    if repetitives.len() < MAX_INLINE_REPETITIVE {
        for (row, len) in &repetitives {
            write_oriented_row(&mut oriented, row, *len)?;
        }
        writeln!(info_out, "showing repetitive alignments,True")?;
    } else {
        let overflow_path = format!("{out_prefix}.oriented_coords.repetitive.csv");
        let mut overflow = BufWriter::new(
            File::create(&overflow_path)
                .with_context(|| format!("failed to create {overflow_path}"))?,
        );
        writeln!(overflow, "{},alignment_length", table.header)?;
        for (row, len) in &repetitives {
            write_oriented_row(&mut overflow, row, *len)?;
        }
        overflow.flush()?;
        writeln!(info_out, "showing repetitive alignments,False: Too many")?;
        info!(
            "{} repetitive alignments overflowed to {overflow_path}",
            repetitives.len()
        );
    }

    oriented.flush()?;
    info_out.flush()?;

    Ok(())
}

fn write_oriented_row(out: &mut impl Write, row: &CoordRecord, alignment_length: u64) -> Result<()> {
    writeln!(
        out,
        "{},{},{},{},{},{},{},{},{},{}",
        row.ref_start,
        row.ref_end,
        row.query_start,
        row.query_end,
        row.ref_len,
        row.query_len,
        row.ref_name,
        row.query_name,
        row.tag.as_str(),
        alignment_length
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn median_of_odd_and_even_counts() {
        assert_eq!(median(&mut [7]), 7.0);
        assert_eq!(median(&mut [3, 9, 5]), 5.0);
        assert_eq!(median(&mut [4, 10]), 7.0);
        assert_eq!(median(&mut [1, 2, 3, 100]), 2.5);
    }

    #[test]
    fn parses_coordinate_row() {
        let row = parse_coord_line("101,15200,201,15300,100000,60000,chr1,tigA,unique", 2).unwrap();
        assert_eq!(row.ref_start, 101);
        assert_eq!(row.query_len, 60000);
        assert_eq!(row.tag, Tag::Unique);
    }

    #[test]
    fn rejects_bad_tag_and_short_rows() {
        assert!(parse_coord_line("1,2,3,4,5,6,chr1,tigA,oops", 2).is_err());
        assert!(parse_coord_line("1,2,3", 2).is_err());
    }
}
