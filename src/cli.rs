//! Command-line definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use fileforge_core::types::Category;

use crate::output::OutputFormat;

/// FileForge: batch file conversion
#[derive(Debug, Parser)]
#[command(name = "fileforge", version, about, long_about = None)]
pub struct Cli {
    /// Configuration environment (loads `config/{env}.toml` over the defaults)
    #[arg(short, long, env = "FILEFORGE_ENV", default_value = "development")]
    pub env: String,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Convert files
    Convert(ConvertArgs),
    /// List the output formats offered per category
    Formats,
}

/// Arguments for `fileforge convert`
#[derive(Debug, Args)]
pub struct ConvertArgs {
    /// Category the files belong to
    #[arg(short, long, value_parser = parse_category)]
    pub category: Category,

    /// Output format (e.g. `png`, `mp4`, `wav`, `pdf`, `extract`)
    #[arg(short, long)]
    pub to: String,

    /// Quality, 1-100 (defaults to `image.default_quality`)
    #[arg(short, long, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub quality: Option<u8>,

    /// Image transform options as JSON, e.g. `{"rotate": 90, "flip": {"horizontal": true}}`
    #[arg(long)]
    pub options: Option<String>,

    /// Directory for converted files
    #[arg(short, long, default_value = "converted")]
    pub out_dir: PathBuf,

    /// Number of execution slots (overrides `pool.max_workers`)
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Convert serially without a worker pool
    #[arg(long)]
    pub inline: bool,

    /// Files to convert
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
}

fn parse_category(value: &str) -> Result<Category, String> {
    value.parse::<Category>().map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_convert() {
        let cli = Cli::try_parse_from([
            "fileforge",
            "convert",
            "--category",
            "image",
            "--to",
            "webp",
            "-q",
            "80",
            "a.png",
            "b.jpg",
        ])
        .expect("parse");

        let Commands::Convert(args) = cli.command else {
            panic!("expected convert");
        };
        assert_eq!(args.category, Category::Image);
        assert_eq!(args.quality, Some(80));
        assert_eq!(args.files.len(), 2);
        assert!(!args.inline);
    }

    #[test]
    fn test_rejects_unknown_category_and_quality() {
        assert!(
            Cli::try_parse_from(["fileforge", "convert", "-c", "spreadsheet", "-t", "csv", "a"])
                .is_err()
        );
        assert!(
            Cli::try_parse_from(["fileforge", "convert", "-c", "image", "-t", "png", "-q", "0", "a"])
                .is_err()
        );
    }

    #[test]
    fn test_files_required() {
        assert!(Cli::try_parse_from(["fileforge", "convert", "-c", "audio", "-t", "wav"]).is_err());
    }
}
