//! Preview-and-commit facade over the importers.

use std::sync::Arc;

use tracing::info;

use taxon_core::{
    Concepts, EntityStore, ImportReport, Lexicon, PreviewReport, Regions, Relations, Result,
    Taxonomy,
};

use crate::config::ImportConfig;
use crate::hierarchy::HierarchyResolver;
use crate::lexicon::import_lexicon;
use crate::ontology::{import_concepts, import_relations};
use crate::parser::{parse_rows, RawRow};
use crate::progress::{ImportProgress, NoProgress};
use crate::regional::import_regional;
use crate::schema::EntityKind;
use crate::validate::{
    decode_concept, decode_lexicon, decode_regional, decode_relation, decode_taxonomy,
    relation_cross_fields, taxonomy_cross_fields, validate_rows, Validated,
};

/// The stores an import writes to.
#[derive(Clone)]
pub struct ImportStores {
    pub taxonomy: Arc<dyn EntityStore<Taxonomy>>,
    pub lexicon: Arc<dyn EntityStore<Lexicon>>,
    pub regions: Arc<dyn EntityStore<Regions>>,
    pub concepts: Arc<dyn EntityStore<Concepts>>,
    pub relations: Arc<dyn EntityStore<Relations>>,
}

impl ImportStores {
    /// Use one backend for every entity kind.
    pub fn from_shared<S>(store: Arc<S>) -> Self
    where
        S: EntityStore<Taxonomy>
            + EntityStore<Lexicon>
            + EntityStore<Regions>
            + EntityStore<Concepts>
            + EntityStore<Relations>
            + 'static,
    {
        Self {
            taxonomy: store.clone(),
            lexicon: store.clone(),
            regions: store.clone(),
            concepts: store.clone(),
            relations: store,
        }
    }
}

/// Parses, validates and persists tabular input.
pub struct ImportService {
    stores: ImportStores,
    config: ImportConfig,
    progress: Arc<dyn ImportProgress>,
}

impl ImportService {
    pub fn new(stores: ImportStores, config: ImportConfig) -> Self {
        Self {
            stores,
            config,
            progress: Arc::new(NoProgress),
        }
    }

    /// Attach a progress observer.
    pub fn with_progress(mut self, progress: Arc<dyn ImportProgress>) -> Self {
        self.progress = progress;
        self
    }

    pub fn config(&self) -> &ImportConfig {
        &self.config
    }

    /// Count valid and invalid rows without touching the store.
    ///
    /// Store-dependent checks (unknown parents, regions, concepts) only
    /// surface on [`import`](Self::import).
    pub fn preview(&self, kind: EntityKind, text: &str) -> Result<PreviewReport> {
        self.config.validate()?;
        let rows = parse_rows(text, kind.schema(), self.config.delimiter)?;
        let report = match kind {
            EntityKind::Taxonomy => to_preview(self.validate_taxonomy(&rows)),
            EntityKind::Lexicon => to_preview(validate_rows(&rows, decode_lexicon, None)),
            EntityKind::Regional => to_preview(validate_rows(&rows, decode_regional, None)),
            EntityKind::Concepts => to_preview(validate_rows(&rows, decode_concept, None)),
            EntityKind::Relations => to_preview(validate_rows(
                &rows,
                decode_relation,
                Some(&relation_cross_fields),
            )),
        };

        info!(
            subsystem = "import",
            component = "service",
            op = "preview",
            entity = %kind,
            row_count = report.total_rows,
            valid_rows = report.valid_rows,
            invalid_rows = report.invalid_rows,
            "Preview complete"
        );
        Ok(report)
    }

    /// Parse, validate and persist. Invalid rows are reported and skipped.
    pub async fn import(&self, kind: EntityKind, text: &str) -> Result<ImportReport> {
        self.config.validate()?;
        let rows = parse_rows(text, kind.schema(), self.config.delimiter)?;
        let progress = self.progress.as_ref();

        info!(
            subsystem = "import",
            component = "service",
            op = "import",
            entity = %kind,
            row_count = rows.len(),
            chunk_size = self.config.chunk_size,
            concurrency = self.config.concurrency,
            "Import started"
        );

        let report = match kind {
            EntityKind::Taxonomy => {
                let validated = self.validate_taxonomy(&rows);
                let mut report = rejected(&validated);
                let resolver =
                    HierarchyResolver::new(self.stores.taxonomy.as_ref(), &self.config, progress);
                report.absorb(resolver.import(validated.rows).await?);
                report
            }
            EntityKind::Lexicon => {
                let validated = validate_rows(&rows, decode_lexicon, None);
                let mut report = rejected(&validated);
                report.absorb(
                    import_lexicon(
                        self.stores.lexicon.as_ref(),
                        validated.rows,
                        &self.config,
                        progress,
                    )
                    .await,
                );
                report
            }
            EntityKind::Regional => {
                let validated = validate_rows(&rows, decode_regional, None);
                let mut report = rejected(&validated);
                report.absorb(
                    import_regional(
                        self.stores.regions.as_ref(),
                        validated.rows,
                        &self.config,
                        progress,
                    )
                    .await?,
                );
                report
            }
            EntityKind::Concepts => {
                let validated = validate_rows(&rows, decode_concept, None);
                let mut report = rejected(&validated);
                report.absorb(
                    import_concepts(
                        self.stores.concepts.as_ref(),
                        self.stores.taxonomy.as_ref(),
                        validated.rows,
                        &self.config,
                        progress,
                    )
                    .await?,
                );
                report
            }
            EntityKind::Relations => {
                let validated =
                    validate_rows(&rows, decode_relation, Some(&relation_cross_fields));
                let mut report = rejected(&validated);
                report.absorb(
                    import_relations(
                        self.stores.relations.as_ref(),
                        self.stores.concepts.as_ref(),
                        validated.rows,
                        &self.config,
                        progress,
                    )
                    .await?,
                );
                report
            }
        };

        progress.import_finished(kind.as_str(), &report);
        info!(
            subsystem = "import",
            component = "service",
            op = "import",
            entity = %kind,
            success_count = report.success_count,
            error_count = report.errors.len(),
            "Import finished"
        );
        Ok(report)
    }

    fn validate_taxonomy(&self, rows: &[RawRow]) -> Validated<taxon_core::TaxonomyRecord> {
        let max_level = self.config.max_level;
        validate_rows(
            rows,
            |row| decode_taxonomy(row, max_level),
            Some(&taxonomy_cross_fields),
        )
    }
}

fn rejected<T>(validated: &Validated<T>) -> ImportReport {
    ImportReport {
        success_count: 0,
        errors: validated.errors.clone(),
    }
}

fn to_preview<T>(validated: Validated<T>) -> PreviewReport {
    PreviewReport {
        total_rows: validated.total_rows,
        valid_rows: validated.valid_rows(),
        invalid_rows: validated.invalid_rows,
        errors: validated.errors,
    }
}
