use super::commands;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use ferritin_featurizers::{ModelType, MsaMode, PairMode};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build model input features for the chains of a FASTA record
    Featurize {
        /// FASTA file; chains of the first record are separated by `:`
        #[arg(short, long)]
        input: PathBuf,
        /// Directory of precomputed `msa_{i}.a3m` / `pair_{i}.a3m` alignments
        #[arg(long)]
        msa_dir: Option<PathBuf>,
        /// Output safetensors file
        #[arg(short, long)]
        output: PathBuf,
        #[arg(long, default_value = "unpaired_paired")]
        pair_mode: PairMode,
        #[arg(long, default_value = "mmseqs2_uniref_env")]
        msa_mode: MsaMode,
        #[arg(long, default_value = "alphafold2_ptm")]
        model_type: ModelType,
        /// Look up templates for every sequence
        #[arg(long)]
        templates: bool,
        /// Template directory used instead of the search results
        #[arg(long)]
        custom_template_path: Option<PathBuf>,
        #[arg(long)]
        max_template_date: Option<NaiveDate>,
        /// Pad residue axes to this length
        #[arg(long)]
        pad_len: Option<usize>,
        /// Write the template names found per chain as JSON
        #[arg(long)]
        domain_names: Option<PathBuf>,
        /// Write the combined alignment as A3M
        #[arg(long)]
        a3m: Option<PathBuf>,
    },
    /// Plot the sequence coverage of an A3M alignment as SVG
    Coverage {
        #[arg(short, long)]
        a3m: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Plot predicted aligned error of one or more models as SVG
    Pae {
        /// Safetensors model outputs; each becomes a panel named after the file
        #[arg(short, long, required = true, num_args = 1..)]
        input: Vec<PathBuf>,
        #[arg(long, default_value = "predicted_aligned_error")]
        key: String,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Plot per-residue pLDDT of one or more models as SVG
    Plddt {
        #[arg(short, long, required = true, num_args = 1..)]
        input: Vec<PathBuf>,
        #[arg(long, default_value = "plddt")]
        key: String,
        /// Residues per chain, e.g. `10,7`
        #[arg(long, value_delimiter = ',')]
        chain_lengths: Vec<usize>,
        #[arg(short, long)]
        output: PathBuf,
    },
}

impl Cli {
    pub fn execute(self) -> anyhow::Result<()> {
        match self.command {
            Commands::Featurize {
                input,
                msa_dir,
                output,
                pair_mode,
                msa_mode,
                model_type,
                templates,
                custom_template_path,
                max_template_date,
                pad_len,
                domain_names,
                a3m,
            } => commands::featurize::execute(commands::featurize::FeaturizeArgs {
                input,
                msa_dir,
                output,
                pair_mode,
                msa_mode,
                model_type,
                templates,
                custom_template_path,
                max_template_date,
                pad_len,
                domain_names,
                a3m,
            }),
            Commands::Coverage { a3m, output } => commands::coverage::execute(a3m, output),
            Commands::Pae { input, key, output } => commands::confidence::pae(&input, &key, output),
            Commands::Plddt {
                input,
                key,
                chain_lengths,
                output,
            } => commands::confidence::plddt(&input, &key, &chain_lengths, output),
        }
    }
}
