// End-to-end tests for the two-pass streaming filter
use anyhow::Result;
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use pretty_assertions::assert_eq;
use std::fs;
use std::io::{Read, Write};
use std::path::Path;
use tempfile::TempDir;

use dotsweep::filter_stream::StreamingFilter;
use dotsweep::query_index::{decide_alignments_to_keep, QueryIndex};

/// A small delta file exercising multi-record headers, continuation lines,
/// and one query (contigC) split across two references.
const FIXTURE: &str = "\
/data/ref.fa /data/qry.fa
NUCMER
>chr1 contigA 100000 60000
101 15200 201 15300 12 12 0
5
-3
0
90000 90500 59000 59500 4 4 0
0
>chr2 contigB 80000 50000
500 800 100 400 1 1 0
0
>chr1 contigC 100000 30000
1000 21000 1 20000 9 9 0
0
>chr2 contigC 80000 30000
2000 9000 5000 12000 3 3 0
0
";

fn write_fixture(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("input.delta");
    fs::write(&path, FIXTURE).unwrap();
    path
}

fn read_gz(path: &Path) -> String {
    let mut decoder = MultiGzDecoder::new(fs::File::open(path).unwrap());
    let mut text = String::new();
    decoder.read_to_string(&mut text).unwrap();
    text
}

fn run_filter(input: &Path, out_prefix: &str, unique_length: u64) -> Result<(usize, usize)> {
    let index = QueryIndex::scan(input)?;
    let keep = decide_alignments_to_keep(&index, unique_length, true);
    let filter = StreamingFilter::new(&index, &keep);
    let (outputs, lengths) = filter.filter_delta(input, out_prefix, unique_length)?;

    // Round-trip: header-declared names and lengths survive collection.
    assert_eq!(lengths.ref_lengths.get("chr1"), Some(&100000));
    assert_eq!(lengths.ref_lengths.get("chr2"), Some(&80000));
    assert_eq!(lengths.query_lengths.get("contigC"), Some(&30000));
    assert_eq!(lengths.preamble, "/data/ref.fa /data/qry.fa");

    let tab = fs::read_to_string(&outputs.coords_tab)?;
    let csv = fs::read_to_string(&outputs.coords_csv)?;
    Ok((tab.lines().count(), csv.lines().count()))
}

#[test]
fn test_counts_and_outputs() -> Result<()> {
    let dir = TempDir::new()?;
    let input = write_fixture(dir.path());
    let prefix = dir.path().join("out").to_str().unwrap().to_string();

    let (tab_rows, csv_rows) = run_filter(&input, &prefix, 10000)?;

    // contigA keeps both records (one by coverage, one as an exact small
    // unique), contigB keeps its lone record, contigC keeps the chr1 record
    // and drops the contained chr2 record.
    assert_eq!(tab_rows, 4, "coords.tab holds kept records only");
    assert_eq!(csv_rows, 1 + 5, "coords.csv holds header plus every record");

    let csv = fs::read_to_string(format!("{prefix}.coords.csv"))?;
    let repetitive: Vec<&str> = csv.lines().filter(|l| l.ends_with(",repetitive")).collect();
    assert_eq!(
        repetitive,
        vec!["2000,9000,5000,12000,80000,30000,chr2,contigC,repetitive"]
    );

    let tab = fs::read_to_string(format!("{prefix}.coords.tab"))?;
    assert_eq!(
        tab.lines().next().unwrap(),
        "101\t15200\t201\t15300\t100000\t60000\tchr1\tcontigA"
    );
    Ok(())
}

#[test]
fn test_filtered_delta_drops_whole_blocks() -> Result<()> {
    let dir = TempDir::new()?;
    let input = write_fixture(dir.path());
    let prefix = dir.path().join("out").to_str().unwrap().to_string();

    run_filter(&input, &prefix, 10000)?;

    let filtered = read_gz(Path::new(&format!(
        "{prefix}.unique_length_filtered_l10000.delta.gz"
    )));

    // The dropped record's header and continuation payload vanish wholesale;
    // everything kept is copied byte-for-byte.
    let expected = "\
/data/ref.fa /data/qry.fa
NUCMER
>chr1 contigA 100000 60000
101 15200 201 15300 12 12 0
5
-3
0
90000 90500 59000 59500 4 4 0
0
>chr2 contigB 80000 50000
500 800 100 400 1 1 0
0
>chr1 contigC 100000 30000
1000 21000 1 20000 9 9 0
0
";
    assert_eq!(filtered, expected);
    Ok(())
}

#[test]
fn test_higher_threshold_drops_small_exact_uniques_only_without_keep_small() -> Result<()> {
    let dir = TempDir::new()?;
    let input = write_fixture(dir.path());

    let index = QueryIndex::scan(&input)?;
    let with_small = decide_alignments_to_keep(&index, 10000, true);
    let without_small = decide_alignments_to_keep(&index, 10000, false);

    // contigA's 500 bp second record and contigB's lone 300 bp record only
    // survive through keep_small_uniques.
    assert_eq!(with_small["contigA"].ordinals.len(), 2);
    assert_eq!(without_small["contigA"].ordinals.len(), 1);
    assert_eq!(with_small["contigB"].ordinals.len(), 1);
    assert_eq!(without_small["contigB"].ordinals.len(), 0);
    Ok(())
}

#[test]
fn test_ordinals_count_across_headers() -> Result<()> {
    let dir = TempDir::new()?;
    let input = write_fixture(dir.path());

    let index = QueryIndex::scan(&input)?;
    let alignments = &index.queries["contigC"];
    assert_eq!(
        alignments.intervals.len(),
        2,
        "contigC's ordinals span both of its headers"
    );
    assert_ne!(
        alignments.header_ids[0], alignments.header_ids[1],
        "the two ordinals belong to different headers"
    );

    let keep = decide_alignments_to_keep(&index, 10000, true);
    assert!(keep["contigC"].ordinals.contains(&0));
    assert!(!keep["contigC"].ordinals.contains(&1));
    Ok(())
}

#[test]
fn test_gzip_input_matches_plain_input() -> Result<()> {
    let dir = TempDir::new()?;
    let plain = write_fixture(dir.path());
    let gz_path = dir.path().join("input.delta.gz");
    let mut encoder = GzEncoder::new(fs::File::create(&gz_path)?, Compression::default());
    encoder.write_all(FIXTURE.as_bytes())?;
    encoder.finish()?;

    let from_plain = QueryIndex::scan(&plain)?;
    let from_gz = QueryIndex::scan(&gz_path)?;
    assert_eq!(from_plain.queries.len(), from_gz.queries.len());
    assert_eq!(from_plain.total_alignments(), from_gz.total_alignments());
    Ok(())
}

#[test]
fn test_filter_is_idempotent() -> Result<()> {
    let dir = TempDir::new()?;
    let input = write_fixture(dir.path());
    let prefix = dir.path().join("first").to_str().unwrap().to_string();

    run_filter(&input, &prefix, 10000)?;
    let filtered = format!("{prefix}.unique_length_filtered_l10000.delta.gz");

    // Every retained alignment is the sole occupant of its unique span, so a
    // second run with the same threshold keeps everything.
    let index = QueryIndex::scan(&filtered)?;
    let keep = decide_alignments_to_keep(&index, 10000, true);
    let kept: usize = keep.values().map(|k| k.ordinals.len()).sum();
    assert_eq!(kept, index.total_alignments());
    assert_eq!(kept, 4);
    Ok(())
}
