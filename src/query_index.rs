/// First pass over the delta file: group query intervals by query name, then
/// classify each query's alignments with the plane sweep.
///
/// The whole file is scanned once purely to group intervals; the keep-set it
/// produces is the only state the second pass needs. Ordinals count every
/// alignment record of a query across all of its headers, in file order.
use anyhow::{bail, Result};
use indexmap::{IndexMap, IndexSet};
use log::info;
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::delta;
use crate::plane_sweep::{summarize_plane_sweep, QueryInterval};

/// Per-query records collected during the scan, in ordinal order.
#[derive(Debug, Default)]
pub struct QueryAlignments {
    pub intervals: Vec<QueryInterval>,
    /// Interned id of the header line each ordinal appeared under.
    pub header_ids: Vec<u32>,
}

/// Everything the first pass learns about the file.
#[derive(Debug, Default)]
pub struct QueryIndex {
    /// Queries in first-seen order. A query that only ever appears in headers
    /// still gets an (empty) entry, and therefore an empty keep-set.
    pub queries: IndexMap<String, QueryAlignments>,
    /// Distinct header line texts (trimmed), interned in first-seen order.
    pub headers: IndexSet<String>,
}

impl QueryIndex {
    /// Scan the whole file once, grouping query intervals by query name.
    pub fn scan<P: AsRef<Path>>(path: P) -> Result<QueryIndex> {
        let mut reader = delta::open_delta_input(&path)?;
        delta::read_preamble(&mut reader)?;

        let mut index = QueryIndex::default();
        let mut current_query: Option<String> = None;
        let mut current_header_id: u32 = 0;

        let mut line = String::new();
        let mut line_number = 2u64;
        loop {
            line.clear();
            if reader.read_line(&mut line)? == 0 {
                break;
            }
            line_number += 1;

            if delta::is_header(&line) {
                let trimmed = line.trim();
                let header = delta::parse_header(trimmed, line_number)?;
                let (id, _) = index.headers.insert_full(trimmed.to_string());
                current_header_id = id as u32;
                index.queries.entry(header.query_name.clone()).or_default();
                current_query = Some(header.query_name);
            } else if let Some(coords) = delta::parse_record(&line, line_number)? {
                let Some(query) = current_query.as_deref() else {
                    bail!("alignment record before any header at line {line_number}");
                };
                let Some(entry) = index.queries.get_mut(query) else {
                    bail!("alignment record at line {line_number} references unknown query {query:?}");
                };
                entry
                    .intervals
                    .push(QueryInterval::from_raw(coords.query_start, coords.query_end));
                entry.header_ids.push(current_header_id);
            }
        }

        Ok(index)
    }

    pub fn total_alignments(&self) -> usize {
        self.queries.values().map(|q| q.intervals.len()).sum()
    }
}

/// Kept ordinals for one query, plus the headers those ordinals appeared
/// under.
#[derive(Debug, Default)]
pub struct KeepSet {
    pub ordinals: HashSet<u32>,
    pub header_ids: HashSet<u32>,
}

pub type KeepSets = HashMap<String, KeepSet>;

/// Run the classifier once per query. Queries are independent, so they are
/// classified in parallel; results are re-keyed by query name, which makes
/// the outcome deterministic regardless of scheduling.
pub fn decide_alignments_to_keep(
    index: &QueryIndex,
    unique_length: u64,
    keep_small_uniques: bool,
) -> KeepSets {
    let num_queries = index.queries.len();
    info!("filtering alignments of {num_queries} queries");
    let step = progress_step(num_queries);
    let classified = AtomicUsize::new(0);

    let entries: Vec<(&String, &QueryAlignments)> = index.queries.iter().collect();
    entries
        .par_iter()
        .map(|(name, alignments)| {
            let kept = summarize_plane_sweep(&alignments.intervals, unique_length, keep_small_uniques);
            let mut keep = KeepSet::default();
            for ordinal in kept {
                keep.ordinals.insert(ordinal as u32);
                keep.header_ids.insert(alignments.header_ids[ordinal]);
            }
            let finished = classified.fetch_add(1, Ordering::Relaxed) + 1;
            if finished % step == 0 {
                info!("classification progress: {}%", finished * 100 / num_queries);
            }
            ((*name).clone(), keep)
        })
        .collect()
}

/// Coarse checkpoint spacing: every 1% of queries, every 10% for small
/// inputs, every query for tiny ones.
fn progress_step(num_queries: usize) -> usize {
    if num_queries >= 100 {
        num_queries / 100
    } else if num_queries >= 10 {
        num_queries / 10
    } else {
        1
    }
}
