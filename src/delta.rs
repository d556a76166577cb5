/// Delta alignment file I/O.
///
/// A delta file begins with two preamble lines (the paths of the aligned
/// sequence files, then the aligner name), followed by blocks introduced by a
/// `>ref query ref_len query_len` header. Each block holds zero or more
/// alignment record lines of at least five whitespace-separated numeric
/// fields; a record may be followed by continuation lines (fewer than five
/// fields) carrying its indel deltas, terminated by a lone `0`.
use anyhow::{bail, Context, Result};
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Open a delta file, auto-detecting gzip compression from the magic bytes.
pub fn open_delta_input<P: AsRef<Path>>(path: P) -> Result<Box<dyn BufRead>> {
    let path = path.as_ref();
    let mut file =
        File::open(path).with_context(|| format!("failed to open {}", path.display()))?;

    let mut magic = [0u8; 2];
    let bytes_read = file.read(&mut magic)?;
    file.seek(SeekFrom::Start(0))?;

    if bytes_read == 2 && magic == GZIP_MAGIC {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Read the two preamble lines. Line terminators are retained so the lines
/// can be copied through to a filtered output unchanged.
pub fn read_preamble<R: BufRead>(reader: &mut R) -> Result<(String, String)> {
    let mut first = String::new();
    if reader.read_line(&mut first)? == 0 {
        bail!("empty delta file: missing preamble");
    }
    let mut second = String::new();
    if reader.read_line(&mut second)? == 0 {
        bail!("truncated delta file: missing second preamble line");
    }
    Ok((first, second))
}

/// One `>ref query ref_len query_len` block introducer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeltaHeader {
    pub ref_name: String,
    pub query_name: String,
    pub ref_len: u64,
    pub query_len: u64,
}

/// Header lines are recognized by their leading `>`.
pub fn is_header(line: &str) -> bool {
    line.starts_with('>')
}

/// Parse a header line (expected to start with `>`).
pub fn parse_header(line: &str, line_number: u64) -> Result<DeltaHeader> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 4 {
        bail!(
            "malformed header at line {line_number}: expected '>ref query ref_len query_len', got {line:?}"
        );
    }
    let ref_len = fields[2].parse().with_context(|| {
        format!("invalid reference length {:?} at line {line_number}", fields[2])
    })?;
    let query_len = fields[3]
        .parse()
        .with_context(|| format!("invalid query length {:?} at line {line_number}", fields[3]))?;
    Ok(DeltaHeader {
        ref_name: fields[0][1..].to_string(),
        query_name: fields[1].to_string(),
        ref_len,
        query_len,
    })
}

/// The four coordinate fields of an alignment record line. Query coordinates
/// are raw: start and end may be swapped relative to strand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordCoords {
    pub ref_start: u64,
    pub ref_end: u64,
    pub query_start: u64,
    pub query_end: u64,
}

/// Parse an alignment record line. Returns `None` for continuation lines
/// (fewer than five fields), which carry the trailing payload of the most
/// recent record and are never parsed numerically.
pub fn parse_record(line: &str, line_number: u64) -> Result<Option<RecordCoords>> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 5 {
        return Ok(None);
    }
    let number = |index: usize| -> Result<u64> {
        fields[index].parse().with_context(|| {
            format!(
                "non-numeric field {:?} in alignment record at line {line_number}",
                fields[index]
            )
        })
    };
    Ok(Some(RecordCoords {
        ref_start: number(0)?,
        ref_end: number(1)?,
        query_start: number(2)?,
        query_end: number(3)?,
    }))
}
