//! A3M / FASTA reading
//!
//! A3M rows are aligned to the query: uppercase letters and `-` occupy a
//! column, lowercase letters are insertions relative to the query and are
//! counted into the deletion matrix instead.
use crate::error::{FeatureError, Result};
use regex::Regex;
use std::sync::OnceLock;

static UNIPROT_PATTERN: OnceLock<Option<Regex>> = OnceLock::new();

fn uniprot_pattern() -> Option<&'static Regex> {
    UNIPROT_PATTERN
        .get_or_init(|| {
            // tr|A0A146SKV9|A0A146SKV9_FUNHE  or  sp|P0C2L1|A3X1_LOXLA
            Regex::new(
                r"^(?:tr|sp)\|[A-Za-z0-9]{6,10}(?:_\d)?\|[A-Za-z0-9]+_(?P<species>[A-Za-z0-9]{1,5})(?:_\d+)?$",
            )
            .ok()
        })
        .as_ref()
}

/// Species mnemonic of a UniProt-style description, if it has one.
pub fn species_identifier(description: &str) -> Option<String> {
    let identifier = description.split_whitespace().next()?;
    let identifier = identifier.split('/').next().unwrap_or(identifier);
    uniprot_pattern()?
        .captures(identifier.trim())
        .and_then(|caps| caps.name("species"))
        .map(|m| m.as_str().to_string())
}

/// Split FASTA-formatted text into `(sequences, descriptions)`.
///
/// Blank lines and `#` comment lines are skipped; multi-line sequences are joined.
pub fn parse_fasta(text: &str) -> Result<(Vec<String>, Vec<String>)> {
    let mut sequences: Vec<String> = Vec::new();
    let mut descriptions = Vec::new();
    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some(description) = line.strip_prefix('>') {
            descriptions.push(description.to_string());
            sequences.push(String::new());
            continue;
        }
        match sequences.last_mut() {
            Some(seq) => seq.push_str(line),
            None => return Err(FeatureError::MissingHeader { line: line_no + 1 }),
        }
    }
    Ok((sequences, descriptions))
}

/// Chains of the first FASTA record; chains are separated by `:`.
pub fn parse_query_sequences(text: &str) -> Result<Vec<String>> {
    let (sequences, _) = parse_fasta(text)?;
    let record = sequences.into_iter().next().ok_or(FeatureError::NoQuery)?;
    Ok(record
        .split(':')
        .map(|chain| chain.trim().to_uppercase())
        .filter(|chain| !chain.is_empty())
        .collect())
}

/// A parsed alignment block.
#[derive(Debug, Clone, PartialEq)]
pub struct Msa {
    /// Aligned rows with insertions removed; all rows share the query's width.
    pub sequences: Vec<String>,
    /// Per row and column, the number of insertions preceding that column.
    pub deletion_matrix: Vec<Vec<i64>>,
    pub descriptions: Vec<String>,
}

impl Msa {
    pub fn parse(a3m: &str) -> Result<Self> {
        let (raw, descriptions) = parse_fasta(a3m)?;
        let mut sequences = Vec::with_capacity(raw.len());
        let mut deletion_matrix = Vec::with_capacity(raw.len());

        for row in raw {
            let mut aligned = String::with_capacity(row.len());
            let mut deletions = Vec::with_capacity(row.len());
            let mut count = 0;
            for c in row.chars() {
                if c.is_ascii_lowercase() {
                    count += 1;
                } else {
                    aligned.push(c);
                    deletions.push(count);
                    count = 0;
                }
            }
            sequences.push(aligned);
            deletion_matrix.push(deletions);
        }

        Ok(Self {
            sequences,
            deletion_matrix,
            descriptions,
        })
    }

    /// Single-row alignment holding only the query.
    pub fn single(description: &str, sequence: &str) -> Self {
        Self {
            sequences: vec![sequence.to_string()],
            deletion_matrix: vec![vec![0; sequence.chars().count()]],
            descriptions: vec![description.to_string()],
        }
    }

    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }

    /// Width of the alignment, taken from the first row.
    pub fn width(&self) -> usize {
        self.sequences.first().map_or(0, |s| s.chars().count())
    }

    pub fn species_identifiers(&self) -> Vec<Option<String>> {
        self.descriptions
            .iter()
            .map(|d| species_identifier(d))
            .collect()
    }
}
