//! Subcommand handlers.
//!
//! Handlers write their report to `out` and return whether the run was
//! clean; `main` maps that to the exit code.

use std::io::Write;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use uuid::Uuid;

use taxon_core::{ImportReport, PreviewReport, TagStore};
use taxon_db::{Database, MemoryStore};
use taxon_dedup::{
    ApplyOptions, Decision, DedupConfig, Suggestion, SuggestionKind, SuggestionSession,
};
use taxon_import::{
    template as render_template, EntityKind, ImportConfig, ImportService, ImportStores,
};

/// Whether a command finished without reportable errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Clean,
    HasErrors,
}

impl From<Status> for ExitCode {
    fn from(status: Status) -> Self {
        match status {
            Status::Clean => ExitCode::SUCCESS,
            Status::HasErrors => ExitCode::from(2),
        }
    }
}

/// Import stores backed by the database repositories.
pub fn database_stores(db: &Database) -> ImportStores {
    ImportStores {
        taxonomy: Arc::new(db.taxonomy.clone()),
        lexicon: Arc::new(db.lexicon.clone()),
        regions: Arc::new(db.regions.clone()),
        concepts: Arc::new(db.concepts.clone()),
        relations: Arc::new(db.relations.clone()),
    }
}

fn read_input(file: &Path) -> Result<String> {
    std::fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))
}

pub fn template(
    kind: EntityKind,
    output: Option<&Path>,
    delimiter: u8,
    out: &mut dyn Write,
) -> Result<Status> {
    let text = render_template(kind, delimiter)?;
    match output {
        Some(path) => {
            std::fs::write(path, &text).with_context(|| format!("writing {}", path.display()))?;
            writeln!(out, "Wrote {} template to {}", kind, path.display())?;
        }
        None => out.write_all(text.as_bytes())?,
    }
    Ok(Status::Clean)
}

pub fn preview(
    kind: EntityKind,
    file: &Path,
    config: ImportConfig,
    json: bool,
    out: &mut dyn Write,
) -> Result<Status> {
    let text = read_input(file)?;
    // Preview never touches the store.
    let stores = ImportStores::from_shared(Arc::new(MemoryStore::new()));
    let report = ImportService::new(stores, config).preview(kind, &text)?;

    if json {
        writeln!(out, "{}", serde_json::to_string_pretty(&report)?)?;
    } else {
        write_preview(kind, &report, out)?;
    }
    Ok(if report.invalid_rows == 0 {
        Status::Clean
    } else {
        Status::HasErrors
    })
}

pub async fn import(
    kind: EntityKind,
    file: &Path,
    stores: ImportStores,
    config: ImportConfig,
    json: bool,
    out: &mut dyn Write,
) -> Result<Status> {
    let text = read_input(file)?;
    let report = ImportService::new(stores, config)
        .import(kind, &text)
        .await
        .with_context(|| format!("importing {} from {}", kind, file.display()))?;

    if json {
        writeln!(out, "{}", serde_json::to_string_pretty(&report)?)?;
    } else {
        write_import(kind, &report, out)?;
    }
    Ok(if report.is_clean() {
        Status::Clean
    } else {
        Status::HasErrors
    })
}

pub async fn suggest(
    store: &dyn TagStore,
    config: &DedupConfig,
    json: bool,
    out: &mut dyn Write,
) -> Result<Status> {
    let session = SuggestionSession::load(store, config).await?;
    let pending = session.pending();

    if json {
        writeln!(out, "{}", serde_json::to_string_pretty(&pending)?)?;
    } else if pending.is_empty() {
        writeln!(out, "No suggestions")?;
    } else {
        for suggestion in &pending {
            writeln!(out, "{}", describe(suggestion))?;
        }
    }
    Ok(Status::Clean)
}

pub async fn apply(
    store: &dyn TagStore,
    config: &DedupConfig,
    id: Uuid,
    decision: Decision,
    options: &ApplyOptions,
    out: &mut dyn Write,
) -> Result<Status> {
    let mut session = SuggestionSession::load(store, config).await?;
    let suggestion = session
        .get(id)
        .cloned()
        .with_context(|| format!("suggestion {} is not proposed for the current tag graph", id))?;

    let outcome = session.apply(id, decision, options).await?;
    match decision {
        Decision::Dismiss => {
            writeln!(
                out,
                "Dismissed {} for this run; dismissals are not stored and it will be proposed again",
                id
            )?;
        }
        Decision::Confirm => {
            writeln!(out, "Applied {}", describe(&suggestion))?;
            if suggestion.kind == SuggestionKind::Merge {
                writeln!(
                    out,
                    "  {} children moved, {} documents retagged, {} audit entries",
                    outcome.children_moved, outcome.documents_retagged, outcome.audit_entries
                )?;
            }
            if let Some(rule) = &outcome.merge_rule {
                writeln!(
                    out,
                    "  merge rule: '{}' -> '{}'{}",
                    rule.source_label,
                    rule.canonical_tag_name,
                    rule.context
                        .as_deref()
                        .map(|c| format!(" (context {})", c))
                        .unwrap_or_default()
                )?;
            }
        }
    }
    Ok(Status::Clean)
}

pub async fn migrate(db: &Database) -> Result<Status> {
    db.migrate().await.context("running migrations")?;
    info!(subsystem = "cli", op = "migrate", "Migrations applied");
    Ok(Status::Clean)
}

fn write_preview(kind: EntityKind, report: &PreviewReport, out: &mut dyn Write) -> Result<()> {
    writeln!(
        out,
        "{}: {} rows, {} valid, {} invalid",
        kind, report.total_rows, report.valid_rows, report.invalid_rows
    )?;
    for error in &report.errors {
        writeln!(out, "  {}", error)?;
    }
    Ok(())
}

fn write_import(kind: EntityKind, report: &ImportReport, out: &mut dyn Write) -> Result<()> {
    writeln!(
        out,
        "{}: {} rows imported, {} errors",
        kind,
        report.success_count,
        report.errors.len()
    )?;
    for error in &report.errors {
        writeln!(out, "  {}", error)?;
    }
    Ok(())
}

fn describe(s: &Suggestion) -> String {
    let reasons: Vec<&str> = s.reasons.iter().map(|r| r.as_str()).collect();
    let action = match s.kind {
        SuggestionKind::Merge => format!("'{}' into '{}'", s.source.name, s.target.name),
        SuggestionKind::Adopt => format!("'{}' under '{}'", s.source.name, s.target.name),
    };
    format!(
        "{}  {:<5}  {:.2}  {}  [{}]",
        s.id,
        s.kind.as_str(),
        s.confidence,
        action,
        reasons.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use taxon_core::{Tag, Taxonomy};
    use taxon_dedup::propose_suggestions;

    fn output(buf: Vec<u8>) -> String {
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_template_file_previews_clean() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("taxonomy.csv");

        let mut out = Vec::new();
        template(EntityKind::Taxonomy, Some(&path), b',', &mut out).unwrap();
        assert!(output(out).contains("taxonomy.csv"));

        let mut out = Vec::new();
        let status = preview(
            EntityKind::Taxonomy,
            &path,
            ImportConfig::default(),
            false,
            &mut out,
        )
        .unwrap();
        assert_eq!(status, Status::Clean);
        assert!(output(out).starts_with("taxonomy: 2 rows, 2 valid, 0 invalid"));
    }

    #[test]
    fn test_preview_with_invalid_rows_reports_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "term,definition\nok,fine\n,missing\n").unwrap();

        let mut out = Vec::new();
        let status = preview(
            EntityKind::Lexicon,
            file.path(),
            ImportConfig::default(),
            true,
            &mut out,
        )
        .unwrap();
        assert_eq!(status, Status::HasErrors);
        let json: serde_json::Value = serde_json::from_str(&output(out)).unwrap();
        assert_eq!(json["invalidRows"], 1);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut out = Vec::new();
        let err = preview(
            EntityKind::Lexicon,
            &dir.path().join("absent.csv"),
            ImportConfig::default(),
            false,
            &mut out,
        )
        .unwrap_err();
        assert!(err.to_string().contains("absent.csv"));
    }

    #[tokio::test]
    async fn test_import_exit_status_follows_report() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "code,name,level,parent_code\npwa,PWA,1,\npwa.world,World,2,pwa\nlost,Lost,2,nowhere\n"
        )
        .unwrap();
        let store = Arc::new(MemoryStore::new());

        let mut out = Vec::new();
        let status = import(
            EntityKind::Taxonomy,
            file.path(),
            ImportStores::from_shared(store.clone()),
            ImportConfig::default(),
            false,
            &mut out,
        )
        .await
        .unwrap();

        assert_eq!(status, Status::HasErrors);
        let text = output(out);
        assert!(text.starts_with("taxonomy: 2 rows imported, 1 errors"), "{}", text);
        assert!(text.contains("parent 'nowhere' not found"));
        assert_eq!(store.count::<Taxonomy>(), 2);
    }

    #[tokio::test]
    async fn test_suggest_and_apply_by_id() {
        let tags = vec![Tag::new("Cardiologia", None), Tag::new("cardiologia", None)];
        let store = MemoryStore::new().with_tags(tags.clone());
        let config = DedupConfig::default();

        let mut out = Vec::new();
        suggest(&store, &config, false, &mut out).await.unwrap();
        let listing = output(out);
        assert!(listing.contains("merge"));
        assert!(listing.contains("[case]"));

        let id = propose_suggestions(&tags, &config)[0].id;
        let mut out = Vec::new();
        let options = ApplyOptions {
            actor: "tester".to_string(),
            context: Some("cardio".to_string()),
        };
        apply(&store, &config, id, Decision::Confirm, &options, &mut out)
            .await
            .unwrap();
        assert!(output(out).contains("(context cardio)"));
        assert_eq!(store.tags().len(), 1);

        let mut out = Vec::new();
        let err = apply(&store, &config, id, Decision::Confirm, &options, &mut out)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not proposed"));
    }

    #[tokio::test]
    async fn test_dismiss_leaves_graph_untouched() {
        let tags = vec![Tag::new("Saúde", None), Tag::new("Saude", None)];
        let store = MemoryStore::new().with_tags(tags.clone());
        let config = DedupConfig::default();
        let id = propose_suggestions(&tags, &config)[0].id;

        let mut out = Vec::new();
        apply(
            &store,
            &config,
            id,
            Decision::Dismiss,
            &ApplyOptions::default(),
            &mut out,
        )
        .await
        .unwrap();
        assert!(output(out).starts_with("Dismissed"));
        assert_eq!(store.tags().len(), 2);
    }
}
