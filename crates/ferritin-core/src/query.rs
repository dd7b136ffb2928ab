//! Query deduplication
//!
//! A query set may repeat sequences (homo-oligomers). Alignment searches and
//! per-chain features are only computed once per unique sequence; the
//! cardinality keeps track of how many copies of it the complex holds.
use std::collections::HashMap;

/// Unique sequences of a query set together with their copy counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniqueQueries {
    sequences: Vec<String>,
    cardinality: Vec<usize>,
    query_index: Vec<usize>,
}

impl UniqueQueries {
    /// Deduplicate `queries`, keeping first-occurrence order.
    pub fn new<S: AsRef<str>>(queries: &[S]) -> Self {
        let mut lookup: HashMap<&str, usize> = HashMap::with_capacity(queries.len());
        let mut sequences = Vec::new();
        let mut cardinality = Vec::new();
        let mut query_index = Vec::with_capacity(queries.len());

        for query in queries {
            let query = query.as_ref();
            let idx = *lookup.entry(query).or_insert_with(|| {
                sequences.push(query.to_string());
                cardinality.push(0);
                sequences.len() - 1
            });
            cardinality[idx] += 1;
            query_index.push(idx);
        }

        Self {
            sequences,
            cardinality,
            query_index,
        }
    }

    pub fn sequences(&self) -> &[String] {
        &self.sequences
    }

    pub fn cardinality(&self) -> &[usize] {
        &self.cardinality
    }

    /// Unique index of every query, in the order they were supplied.
    pub fn query_index(&self) -> &[usize] {
        &self.query_index
    }

    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }

    /// Total number of chains, i.e. the size of the original query set.
    pub fn num_chains(&self) -> usize {
        self.query_index.len()
    }

    /// `(unique index, copy number)` for every chain, grouped by unique sequence.
    pub fn copies(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.cardinality
            .iter()
            .enumerate()
            .flat_map(|(idx, &count)| (0..count).map(move |copy| (idx, copy)))
    }

    /// Length of every chain copy, grouped by unique sequence.
    pub fn chain_lengths(&self) -> Vec<usize> {
        self.copies()
            .map(|(idx, _)| self.sequences[idx].chars().count())
            .collect()
    }

    /// All chain copies concatenated, grouped by unique sequence.
    pub fn full_sequence(&self) -> String {
        self.copies()
            .map(|(idx, _)| self.sequences[idx].as_str())
            .collect()
    }
}
