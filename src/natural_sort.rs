/// Natural ordering for sequence names: digit runs compare as integers and
/// other runs compare lexically, so "chr2" sorts before "chr10".
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Chunk<'a> {
    /// A run of ASCII digits, compared as an integer of arbitrary size.
    Number(&'a str),
    Text(&'a str),
}

fn chunks(name: &str) -> Vec<Chunk<'_>> {
    let bytes = name.as_bytes();
    let mut out = Vec::new();
    let mut start = 0;
    while start < bytes.len() {
        let digits = bytes[start].is_ascii_digit();
        let mut end = start;
        while end < bytes.len() && bytes[end].is_ascii_digit() == digits {
            end += 1;
        }
        let piece = &name[start..end];
        out.push(if digits {
            Chunk::Number(piece)
        } else {
            Chunk::Text(piece)
        });
        start = end;
    }
    out
}

/// Leading zeros are insignificant: "007" and "7" compare equal.
fn cmp_digit_runs(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// Compare two names by natural key. When chunk kinds differ, numeric chunks
/// order before text chunks; a name that is a prefix of another orders first.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let chunks_a = chunks(a);
    let chunks_b = chunks(b);
    for (chunk_a, chunk_b) in chunks_a.iter().zip(chunks_b.iter()) {
        let ordering = match (chunk_a, chunk_b) {
            (Chunk::Number(x), Chunk::Number(y)) => cmp_digit_runs(x, y),
            (Chunk::Text(x), Chunk::Text(y)) => x.cmp(y),
            (Chunk::Number(_), Chunk::Text(_)) => Ordering::Less,
            (Chunk::Text(_), Chunk::Number(_)) => Ordering::Greater,
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    chunks_a.len().cmp(&chunks_b.len())
}
