use std::path::PathBuf;

use anyhow::Result;
use listing_processor::ProcessingParams;

/// Household listing processing CLI
#[derive(clap::Parser, Debug)]
#[command(name = "listing-processor", version, about, propagate_version = true)]
pub struct Cli {
    /// Increase log verbosity (-v, -vv); RUST_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Processing parameters (JSON); defaults when omitted
    #[arg(short, long, global = true, value_hint = clap::ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn params(&self) -> Result<ProcessingParams> {
        match &self.config {
            Some(path) => ProcessingParams::from_json_file(path),
            None => Ok(ProcessingParams::default()),
        }
    }
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Run a raw district listing through to the ward boundaries
    Process(ProcessArgs),

    /// Write household and POI tables from a merged listing
    Extract(ExtractArgs),

    /// Cut province point files down to each ward and update its boundary
    UpdateWards(UpdateWardsArgs),

    /// Merge tab-delimited survey exports into one listing CSV
    Ingest(IngestArgs),

    /// Write the default parameters as JSON
    Params(ParamsArgs),
}

#[derive(clap::Args, Debug)]
pub struct ProcessArgs {
    /// Raw district listing (CSV)
    #[arg(value_hint = clap::ValueHint::FilePath)]
    pub raw_csv: PathBuf,

    /// District directory holding one subdirectory per ward
    #[arg(value_hint = clap::ValueHint::DirPath)]
    pub district_dir: PathBuf,

    /// District name for intermediate files, defaults to the directory name
    #[arg(short, long)]
    pub district: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct ExtractArgs {
    /// Merged listing (CSV)
    #[arg(value_hint = clap::ValueHint::FilePath)]
    pub csv: PathBuf,

    /// Output directory for HH.csv and POI.csv
    #[arg(value_hint = clap::ValueHint::DirPath)]
    pub out_dir: PathBuf,
}

#[derive(clap::Args, Debug)]
pub struct UpdateWardsArgs {
    /// Province directory: <province>/<district>/<ward>
    #[arg(value_hint = clap::ValueHint::DirPath)]
    pub province_dir: PathBuf,

    /// Province household points (shapefile)
    #[arg(long, value_hint = clap::ValueHint::FilePath)]
    pub households: PathBuf,

    /// Province POI points (shapefile)
    #[arg(long, value_hint = clap::ValueHint::FilePath)]
    pub pois: PathBuf,
}

#[derive(clap::Args, Debug)]
pub struct IngestArgs {
    /// Directory of tab-delimited survey exports
    #[arg(value_hint = clap::ValueHint::DirPath)]
    pub tab_dir: PathBuf,

    /// Output listing CSV
    #[arg(value_hint = clap::ValueHint::FilePath)]
    pub out_csv: PathBuf,
}

#[derive(clap::Args, Debug)]
pub struct ParamsArgs {
    /// Output JSON file
    #[arg(value_hint = clap::ValueHint::FilePath)]
    pub output: PathBuf,
}
