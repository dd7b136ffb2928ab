//! ferritin-test-data
//!
//! Test files embedded in the crate for use in testing: query FASTA files,
//! precomputed A3M alignments and a tiny template database.
//!
//! Single files are represented as `TestFile` objects which package the raw
//! bytes and create temporary files for programs to operate on.
//! [`precomputed_alignments`] lays a whole alignment directory out on disk.
use std::fs;
use std::io;
use tempfile::{Builder, NamedTempFile, TempDir};

#[derive(Debug)]
/// Test File
///
/// Example usage:
///
/// ```ignore
/// // returns (filepath, _tempfile_handle).
/// // _handle ensures the tempfile remains in scope
/// use ferritin_test_data::TestFile;
/// let (fasta, _temp) = TestFile::heterodimer().create_temp().unwrap();
/// ```
pub struct TestFile {
    filebinary: &'static [u8],
    suffix: &'static str,
}

impl TestFile {
    /// One chain, `MKTAYIAKQR`.
    pub fn monomer() -> Self {
        Self {
            filebinary: include_bytes!("../data/msas/monomer.fasta"),
            suffix: "fasta",
        }
    }
    /// Two copies of the monomer chain.
    pub fn homodimer() -> Self {
        Self {
            filebinary: include_bytes!("../data/msas/homodimer.fasta"),
            suffix: "fasta",
        }
    }
    /// `MKTAYIAKQR:PEPTIDE`
    pub fn heterodimer() -> Self {
        Self {
            filebinary: include_bytes!("../data/msas/heterodimer.fasta"),
            suffix: "fasta",
        }
    }
    /// Unpaired alignment of `MKTAYIAKQR`, with one insertion.
    pub fn msa_01() -> Self {
        Self {
            filebinary: include_bytes!("../data/msas/msa_0.a3m"),
            suffix: "a3m",
        }
    }
    /// Unpaired alignment of `PEPTIDE`.
    pub fn msa_02() -> Self {
        Self {
            filebinary: include_bytes!("../data/msas/msa_1.a3m"),
            suffix: "a3m",
        }
    }
    /// 4-residue chain A (`MKTA`) with backbone and CB atoms.
    pub fn template_01() -> Self {
        Self {
            filebinary: include_bytes!("../data/templates/1abc.pdb"),
            suffix: "pdb",
        }
    }
    /// Search hits against the template database: one usable, one without a
    /// structure and one released too late.
    pub fn template_hits() -> Self {
        Self {
            filebinary: include_bytes!("../data/templates/hits.json"),
            suffix: "json",
        }
    }

    pub fn bytes(&self) -> &'static [u8] {
        self.filebinary
    }

    pub fn create_temp(&self) -> io::Result<(String, NamedTempFile)> {
        let temp = Builder::new()
            .suffix(&format!(".{}", self.suffix))
            .tempfile()?;
        fs::write(temp.path(), self.filebinary)?;
        Ok((temp.path().to_string_lossy().into_owned(), temp))
    }
}

const ALIGNMENTS: [(&str, &[u8]); 4] = [
    ("msa_0.a3m", include_bytes!("../data/msas/msa_0.a3m")),
    ("msa_1.a3m", include_bytes!("../data/msas/msa_1.a3m")),
    ("pair_0.a3m", include_bytes!("../data/msas/pair_0.a3m")),
    ("pair_1.a3m", include_bytes!("../data/msas/pair_1.a3m")),
];

/// A directory of alignments for the heterodimer query.
///
/// ```text
/// msa_0.a3m  msa_1.a3m  pair_0.a3m  pair_1.a3m
/// templates_0/1abc.pdb  templates_0/hits.json
/// ```
pub fn precomputed_alignments() -> io::Result<TempDir> {
    let dir = TempDir::new()?;
    for (name, bytes) in ALIGNMENTS {
        fs::write(dir.path().join(name), bytes)?;
    }
    let templates = dir.path().join("templates_0");
    fs::create_dir(&templates)?;
    fs::write(templates.join("1abc.pdb"), TestFile::template_01().bytes())?;
    fs::write(templates.join("hits.json"), TestFile::template_hits().bytes())?;
    Ok(dir)
}
