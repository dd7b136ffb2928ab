//! MSA pairing
//!
//! Builds one alignment block covering every chain copy of a complex from
//! the per-sequence blocks returned by the alignment search.
//!
//! * pad: each block's rows cover only their own chain copy, gaps elsewhere
//! * pair: rows with the same index are glued side by side across chains
//!
use crate::error::{FeatureError, Result};
use itertools::Itertools;

/// `(header, sequence)` records of an A3M block, in order.
fn records(block: &str) -> Result<Vec<(&str, String)>> {
    let mut out: Vec<(&str, String)> = Vec::new();
    for (line_no, line) in block.lines().enumerate() {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if line.starts_with('>') {
            out.push((line, String::new()));
            continue;
        }
        match out.last_mut() {
            Some((_, seq)) => seq.push_str(line),
            None => return Err(FeatureError::MissingHeader { line: line_no + 1 }),
        }
    }
    Ok(out)
}

fn check_blocks<S: AsRef<str>>(
    blocks: &[S],
    sequences: &[String],
    cardinality: &[usize],
) -> Result<()> {
    if cardinality.len() != sequences.len() {
        return Err(FeatureError::BlockCount {
            expected: sequences.len(),
            found: cardinality.len(),
        });
    }
    if blocks.len() < sequences.len() {
        return Err(FeatureError::BlockCount {
            expected: sequences.len(),
            found: blocks.len(),
        });
    }
    Ok(())
}

/// Gap-pad every block out to the full complex.
///
/// Rows are emitted per chain copy: all rows of copy 0 of sequence 0, then
/// copy 1, ..., then sequence 1. Only that copy's columns are populated.
pub fn pad_sequences<S: AsRef<str>>(
    blocks: &[S],
    sequences: &[String],
    cardinality: &[usize],
) -> Result<String> {
    check_blocks(blocks, sequences, cardinality)?;
    let blanks: Vec<String> = sequences
        .iter()
        .zip(cardinality)
        .flat_map(|(seq, &count)| std::iter::repeat("-".repeat(seq.chars().count())).take(count))
        .collect();

    let mut lines = Vec::new();
    let mut pos = 0;
    for (block, &count) in blocks[..sequences.len()].iter().zip(cardinality) {
        let rows = records(block.as_ref())?;
        for _ in 0..count {
            for (header, seq) in &rows {
                lines.push(header.to_string());
                let mut line = blanks[..pos].concat();
                line.push_str(seq);
                line.push_str(&blanks[pos + 1..].concat());
                lines.push(line);
            }
            pos += 1;
        }
    }
    Ok(lines.join("\n"))
}

/// Glue rows sharing an index across the per-chain paired blocks.
///
/// The first chain keeps its header, later headers are demoted to a tab
/// separator. A sequence's row is repeated once per copy. The result holds
/// as many rows as the shortest block.
pub fn pair_sequences<S: AsRef<str>>(
    blocks: &[S],
    sequences: &[String],
    cardinality: &[usize],
) -> Result<String> {
    check_blocks(blocks, sequences, cardinality)?;
    let per_chain: Vec<Vec<(&str, String)>> = blocks[..sequences.len()]
        .iter()
        .map(|b| records(b.as_ref()))
        .collect::<Result<_>>()?;
    let num_rows = per_chain.iter().map(Vec::len).min().unwrap_or(0);

    let mut lines = Vec::with_capacity(num_rows * 2);
    for row in 0..num_rows {
        let mut header = String::new();
        let mut aligned = String::new();
        for (n, rows) in per_chain.iter().enumerate() {
            let (chain_header, seq) = &rows[row];
            if n == 0 {
                header.push_str(chain_header);
            } else {
                header.push_str(&chain_header.replacen('>', "\t", 1));
            }
            aligned.push_str(&seq.repeat(cardinality[n]));
        }
        lines.push(header);
        lines.push(aligned);
    }
    Ok(lines.join("\n"))
}

/// Combine paired and unpaired blocks into one block for the complex.
///
/// Paired rows come first when both are present.
pub fn pair_msa<S: AsRef<str>>(
    sequences: &[String],
    cardinality: &[usize],
    paired: Option<&[S]>,
    unpaired: Option<&[S]>,
) -> Result<String> {
    match (paired, unpaired) {
        (None, Some(unpaired)) => pad_sequences(unpaired, sequences, cardinality),
        (Some(paired), Some(unpaired)) => Ok(format!(
            "{}\n{}",
            pair_sequences(paired, sequences, cardinality)?,
            pad_sequences(unpaired, sequences, cardinality)?
        )),
        (Some(paired), None) => pair_sequences(paired, sequences, cardinality),
        (None, None) => Err(FeatureError::InvalidPairing),
    }
}

/// Serialize the alignments of a request into a single A3M.
///
/// The first line records chain lengths and cardinalities
/// (`#len1,len2\tcard1,card2`); the block itself is built with every
/// cardinality set to one.
pub fn msa_to_str<S: AsRef<str>>(
    unpaired: Option<&[S]>,
    paired: Option<&[S]>,
    sequences: &[String],
    cardinality: &[usize],
) -> Result<String> {
    let lengths = sequences.iter().map(|s| s.chars().count()).join(",");
    let counts = cardinality.iter().join(",");
    let ones = vec![1; cardinality.len()];
    let block = pair_msa(sequences, &ones, paired, unpaired)?;
    Ok(format!("#{lengths}\t{counts}\n{block}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seqs(s: &[&str]) -> Vec<String> {
        s.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_pad_single_sequence_is_verbatim() {
        let block = ">101\nMKT\n>hit\nM-T";
        let out = pad_sequences(&[block], &seqs(&["MKT"]), &[1]).unwrap();
        assert_eq!(out, block);
    }

    #[test]
    fn test_pad_homodimer_replicates_rows_per_copy() {
        let out = pad_sequences(&[">101\nMKT\n>hit\nMaK-"], &seqs(&["MKT"]), &[2]).unwrap();
        let expected = [
            ">101", "MKT---", ">hit", "MaK----", ">101", "---MKT", ">hit", "---MaK-",
        ]
        .join("\n");
        assert_eq!(out, expected);
    }

    #[test]
    fn test_pad_heterodimer() {
        let blocks = [">101\nMK\n>h1\nM-", ">102\nGSS\n"];
        let out = pad_sequences(&blocks, &seqs(&["MK", "GSS"]), &[1, 1]).unwrap();
        assert_eq!(out, ">101\nMK---\n>h1\nM----\n>102\n--GSS");
    }

    #[test]
    fn test_pair_rows_bounded_by_shortest_block() {
        let blocks = [">101\nMK\n>a1\nMR\n>a2\nLK", ">102\nGSS\n>b1\nGAS"];
        let out = pair_sequences(&blocks, &seqs(&["MK", "GSS"]), &[1, 1]).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], ">101\t102");
        assert_eq!(lines[1], "MKGSS");
        assert_eq!(lines[2], ">a1\tb1");
        assert_eq!(lines[3].len(), 2 + 3);
    }

    #[test]
    fn test_pair_repeats_rows_by_cardinality() {
        let blocks = [">101\nMK", ">102\nGSS"];
        let out = pair_sequences(&blocks, &seqs(&["MK", "GSS"]), &[2, 1]).unwrap();
        assert_eq!(out, ">101\t102\nMKMKGSS");
    }

    #[test]
    fn test_combined_puts_pairs_first() {
        let paired = [">101\nMK", ">102\nGS"];
        let unpaired = [">101\nMK", ">102\nGS"];
        let out = pair_msa(&seqs(&["MK", "GS"]), &[1, 1], Some(&paired[..]), Some(&unpaired[..]))
            .unwrap();
        assert_eq!(out, ">101\t102\nMKGS\n>101\nMK--\n>102\n--GS");
    }

    #[test]
    fn test_no_alignment_is_a_configuration_error() {
        let err = pair_msa::<&str>(&seqs(&["MK"]), &[1], None, None).unwrap_err();
        assert!(matches!(err, FeatureError::InvalidPairing));
    }

    #[test]
    fn test_missing_blocks() {
        let err = pad_sequences(&[">101\nMK"], &seqs(&["MK", "GS"]), &[1, 1]).unwrap_err();
        assert!(matches!(err, FeatureError::BlockCount { expected: 2, found: 1 }));
    }

    #[test]
    fn test_cardinality_must_match_sequences() {
        let blocks = [">101\nMK", ">102\nGS"];
        let err = pad_sequences(&blocks, &seqs(&["MK"]), &[1, 1]).unwrap_err();
        assert!(matches!(err, FeatureError::BlockCount { expected: 1, found: 2 }));
        let err = pair_sequences(&blocks, &seqs(&["MK", "GS"]), &[1]).unwrap_err();
        assert!(matches!(err, FeatureError::BlockCount { expected: 2, found: 1 }));
    }

    #[test]
    fn test_msa_to_str_header() {
        let unpaired = [">101\nMK", ">102\nGSS"];
        let out = msa_to_str(Some(&unpaired[..]), None, &seqs(&["MK", "GSS"]), &[2, 1]).unwrap();
        assert_eq!(out, "#2,3\t2,1\n>101\nMK---\n>102\n--GSS");
    }
}
