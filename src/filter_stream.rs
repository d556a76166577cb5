/// Second pass: re-read the input in original order and copy exactly the
/// header/alignment blocks whose ordinals were kept, while emitting the
/// coordinate tables.
///
/// The pass keeps only O(keep-set) state: the current header, a per-query
/// ordinal counter persisted across headers (matching the first pass's
/// numbering), and a flag deciding whether continuation lines ride along with
/// the most recent record.
use anyhow::{bail, Context, Result};
use flate2::write::GzEncoder;
use flate2::Compression;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::delta;
use crate::query_index::{KeepSet, KeepSets, QueryIndex};

/// Header row of the full coordinate CSV.
pub const COORDS_CSV_HEADER: &str =
    "ref_start,ref_end,query_start,query_end,ref_length,query_length,ref,query,tag";

/// First-seen sequence names with their declared lengths, plus the first
/// preamble line, collected for the assembly statistics report.
#[derive(Debug, Default)]
pub struct SequenceLengths {
    pub ref_lengths: IndexMap<String, u64>,
    pub query_lengths: IndexMap<String, u64>,
    pub preamble: String,
}

/// Paths of the files written by the streaming filter.
#[derive(Debug)]
pub struct FilterOutputs {
    pub filtered_delta: PathBuf,
    pub coords_tab: PathBuf,
    pub coords_csv: PathBuf,
}

pub struct StreamingFilter<'a> {
    index: &'a QueryIndex,
    keep: &'a KeepSets,
}

impl<'a> StreamingFilter<'a> {
    pub fn new(index: &'a QueryIndex, keep: &'a KeepSets) -> Self {
        StreamingFilter { index, keep }
    }

    /// Copy kept blocks to `{prefix}.unique_length_filtered_l{T}.delta.gz`,
    /// kept coordinates to `{prefix}.coords.tab`, and all coordinates (tagged
    /// unique/repetitive) to `{prefix}.coords.csv`.
    pub fn filter_delta<P: AsRef<Path>>(
        &self,
        input: P,
        out_prefix: &str,
        unique_length: u64,
    ) -> Result<(FilterOutputs, SequenceLengths)> {
        let mut reader = delta::open_delta_input(&input)?;

        let outputs = FilterOutputs {
            filtered_delta: PathBuf::from(format!(
                "{out_prefix}.unique_length_filtered_l{unique_length}.delta.gz"
            )),
            coords_tab: PathBuf::from(format!("{out_prefix}.coords.tab")),
            coords_csv: PathBuf::from(format!("{out_prefix}.coords.csv")),
        };

        let delta_file = File::create(&outputs.filtered_delta).with_context(|| {
            format!("failed to create {}", outputs.filtered_delta.display())
        })?;
        let mut delta_out = GzEncoder::new(BufWriter::new(delta_file), Compression::default());
        let mut tab_out = BufWriter::new(
            File::create(&outputs.coords_tab)
                .with_context(|| format!("failed to create {}", outputs.coords_tab.display()))?,
        );
        let mut csv_out = BufWriter::new(
            File::create(&outputs.coords_csv)
                .with_context(|| format!("failed to create {}", outputs.coords_csv.display()))?,
        );
        writeln!(csv_out, "{COORDS_CSV_HEADER}")?;

        // The two preamble lines pass through unchanged.
        let (first, second) = delta::read_preamble(&mut reader)?;
        delta_out.write_all(first.as_bytes())?;
        delta_out.write_all(second.as_bytes())?;

        let mut lengths = SequenceLengths {
            preamble: first.trim().to_string(),
            ..Default::default()
        };

        let mut current_header: Option<delta::DeltaHeader> = None;
        let mut current_keep: Option<&KeepSet> = None;
        let mut counters: HashMap<String, u32> = HashMap::new();
        let mut keep_printing = false;

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

                let Some(keep) = self.keep.get(&header.query_name) else {
                    bail!(
                        "query {:?} at line {line_number} was not seen in the first pass",
                        header.query_name
                    );
                };

                // Emit the header only when a kept ordinal of this query
                // appeared under this exact header text.
                let header_needed = self
                    .index
                    .headers
                    .get_index_of(trimmed)
                    .is_some_and(|id| keep.header_ids.contains(&(id as u32)));
                if header_needed {
                    delta_out.write_all(line.as_bytes())?;
                }

                lengths
                    .ref_lengths
                    .entry(header.ref_name.clone())
                    .or_insert(header.ref_len);
                lengths
                    .query_lengths
                    .entry(header.query_name.clone())
                    .or_insert(header.query_len);

                counters.entry(header.query_name.clone()).or_insert(0);
                current_keep = Some(keep);
                current_header = Some(header);
            } else if let Some(coords) = delta::parse_record(&line, line_number)? {
                let (Some(header), Some(keep)) = (current_header.as_ref(), current_keep) else {
                    bail!("alignment record before any header at line {line_number}");
                };

                let Some(counter) = counters.get_mut(&header.query_name) else {
                    bail!(
                        "alignment record at line {line_number} references unknown query {:?}",
                        header.query_name
                    );
                };
                let ordinal = *counter;
                *counter += 1;

                let mut tag = "repetitive";
                if keep.ordinals.contains(&ordinal) {
                    delta_out.write_all(line.as_bytes())?;
                    writeln!(
                        tab_out,
                        "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
                        coords.ref_start,
                        coords.ref_end,
                        coords.query_start,
                        coords.query_end,
                        header.ref_len,
                        header.query_len,
                        header.ref_name,
                        header.query_name
                    )?;
                    tag = "unique";
                    keep_printing = true;
                } else {
                    keep_printing = false;
                }
                writeln!(
                    csv_out,
                    "{},{},{},{},{},{},{},{},{}",
                    coords.ref_start,
                    coords.ref_end,
                    coords.query_start,
                    coords.query_end,
                    header.ref_len,
                    header.query_len,
                    header.ref_name.replace(',', "_"),
                    header.query_name.replace(',', "_"),
                    tag
                )?;
            } else if keep_printing {
                // Continuation lines inherit the most recent record's
                // decision and never advance the ordinal.
                delta_out.write_all(line.as_bytes())?;
            }
        }

        delta_out.finish()?.flush()?;
        tab_out.flush()?;
        csv_out.flush()?;

        Ok((outputs, lengths))
    }
}
