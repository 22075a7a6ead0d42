//! Command-line arguments.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use uuid::Uuid;

use taxon_core::defaults::{DATABASE_URL, DB_MAX_CONNECTIONS};
use taxon_dedup::{Decision, DedupConfig};
use taxon_import::{parse_delimiter, EntityKind, ImportConfig};

#[derive(Parser, Debug)]
#[command(name = "taxon")]
#[command(author, version, about = "Taxonomy import and tag unification console")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print a blank template (header and example rows) for an entity type
    Template {
        /// taxonomy, lexicon, regional, concepts or relations
        kind: EntityKind,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Column delimiter (single character, or "tab")
        #[arg(short, long)]
        delimiter: Option<String>,
    },

    /// Validate a file and count valid and invalid rows without writing
    Preview {
        kind: EntityKind,

        /// Tabular input file
        file: PathBuf,

        #[arg(short, long)]
        delimiter: Option<String>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Import a file
    Import {
        kind: EntityKind,

        /// Tabular input file
        file: PathBuf,

        #[command(flatten)]
        tuning: ImportTuning,

        /// Run against an empty in-memory store instead of the database
        #[arg(long)]
        dry_run: bool,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        db: DbArgs,
    },

    /// List merge and adopt suggestions for the tag graph
    Suggest {
        #[command(flatten)]
        tuning: DedupTuning,

        /// Print suggestions as JSON
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        db: DbArgs,
    },

    /// Confirm or dismiss a suggestion by id
    Apply {
        /// Suggestion id, as printed by `suggest`
        id: Uuid,

        /// confirm or dismiss
        #[arg(long)]
        decision: Decision,

        /// Scope of the merge rule written on confirm
        #[arg(long)]
        context: Option<String>,

        /// Name recorded in the audit log and merge rule
        #[arg(long, env = "TAXON_ACTOR", default_value = "taxon")]
        actor: String,

        #[command(flatten)]
        tuning: DedupTuning,

        #[command(flatten)]
        db: DbArgs,
    },

    /// Run pending database migrations
    Migrate {
        #[command(flatten)]
        db: DbArgs,
    },
}

/// Database connection flags.
#[derive(Args, Debug, Clone)]
pub struct DbArgs {
    /// PostgreSQL connection URL
    #[arg(long, env = "DATABASE_URL", default_value = DATABASE_URL)]
    pub database_url: String,

    /// Maximum pool connections
    #[arg(long, env = "DB_MAX_CONNECTIONS", default_value_t = DB_MAX_CONNECTIONS)]
    pub max_connections: u32,
}

/// Import flags; unset flags fall back to `IMPORT_*` environment variables.
#[derive(Args, Debug, Clone, Default)]
pub struct ImportTuning {
    /// Rows per upsert call
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Chunks of one level in flight at once
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Column delimiter (single character, or "tab")
    #[arg(short, long)]
    pub delimiter: Option<String>,
}

impl ImportTuning {
    pub fn resolve(&self) -> taxon_core::Result<ImportConfig> {
        let mut config = ImportConfig::from_env()?;
        if let Some(n) = self.chunk_size {
            config = config.with_chunk_size(n);
        }
        if let Some(n) = self.concurrency {
            config = config.with_concurrency(n);
        }
        if let Some(raw) = &self.delimiter {
            config = config.with_delimiter(parse_delimiter(raw)?);
        }
        config.validate()?;
        Ok(config)
    }
}

/// Threshold flags; unset flags fall back to `DEDUP_*` environment variables.
#[derive(Args, Debug, Clone, Default)]
pub struct DedupTuning {
    /// Fallback similarity threshold between root tags
    #[arg(long)]
    pub root_threshold: Option<f64>,

    /// Fallback similarity threshold between siblings
    #[arg(long)]
    pub sibling_threshold: Option<f64>,

    /// Minimum confidence for adopting an orphan
    #[arg(long)]
    pub adopt_threshold: Option<f64>,
}

impl DedupTuning {
    pub fn resolve(&self) -> taxon_core::Result<DedupConfig> {
        let mut config = DedupConfig::from_env()?;
        if let Some(t) = self.root_threshold {
            config = config.with_root_threshold(t);
        }
        if let Some(t) = self.sibling_threshold {
            config = config.with_sibling_threshold(t);
        }
        if let Some(t) = self.adopt_threshold {
            config = config.with_adopt_threshold(t);
        }
        config.validate()?;
        Ok(config)
    }
}

/// Delimiter flag or the `IMPORT_DELIMITER` default.
pub fn delimiter_or_default(raw: Option<&str>) -> taxon_core::Result<u8> {
    match raw {
        Some(raw) => parse_delimiter(raw),
        None => Ok(ImportConfig::from_env()?.delimiter),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_import_flags() {
        let cli = Cli::try_parse_from([
            "taxon",
            "import",
            "taxonomy",
            "nodes.csv",
            "--chunk-size",
            "10",
            "--delimiter",
            ";",
            "--dry-run",
        ])
        .unwrap();
        match cli.command {
            Commands::Import {
                kind,
                tuning,
                dry_run,
                ..
            } => {
                assert_eq!(kind, EntityKind::Taxonomy);
                assert!(dry_run);
                let config = tuning.resolve().unwrap();
                assert_eq!(config.chunk_size, 10);
                assert_eq!(config.delimiter, b';');
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_unknown_kind_rejected() {
        assert!(Cli::try_parse_from(["taxon", "template", "widgets"]).is_err());
    }

    #[test]
    fn test_parse_apply_decision() {
        let id = Uuid::new_v4().to_string();
        let cli = Cli::try_parse_from([
            "taxon",
            "apply",
            &id,
            "--decision",
            "dismiss",
            "--context",
            "pediatria",
        ])
        .unwrap();
        match cli.command {
            Commands::Apply {
                decision, context, ..
            } => {
                assert_eq!(decision, Decision::Dismiss);
                assert_eq!(context.as_deref(), Some("pediatria"));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_zero_chunk_size_rejected_on_resolve() {
        let tuning = ImportTuning {
            chunk_size: Some(0),
            ..Default::default()
        };
        assert!(tuning.resolve().is_err());
    }

    #[test]
    fn test_threshold_override() {
        let tuning = DedupTuning {
            sibling_threshold: Some(0.8),
            ..Default::default()
        };
        assert_eq!(tuning.resolve().unwrap().sibling_threshold, 0.8);
        let bad = DedupTuning {
            adopt_threshold: Some(1.5),
            ..Default::default()
        };
        assert!(bad.resolve().is_err());
    }
}
