//! Row retrieval: chunk candidates become row scores, query-driven expansion
//! recovers rows that vector search misses, and the merged ranking is rendered.
//!
//! Pipeline per query:
//! 1. fetch a broad candidate pool from [`SemanticSearch`];
//! 2. aggregate candidate scores per `(file, row)`: a cell adds its whole score, a
//!    window spreads its score evenly over its rows;
//! 3. keep the top `max(2k, 20)` rows and load their datasets;
//! 4. expand: rows of the anchor entity (the top row's name-like value), optionally
//!    narrowed by the date, month or year in the query, plus rows of any cached
//!    dataset paid on the query's exact date;
//! 5. merge expansions ahead of the preliminary ranking, without duplicates;
//! 6. render the first `k` rows as `column: value` lines.
//!
//! All state lives for one call; concurrent queries share nothing but the
//! read-only collaborators.

use crate::chunker::ChunkMetadata;
use crate::dataset::{Dataset, DatasetCache, DatasetSource};
use crate::query_terms::{self, TimeTerm};
use crate::schema::SchemaCatalog;
use crate::search::{Candidate, SemanticSearch};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

/// `(source_file, row_index)`
pub type RowKey = (String, usize);

/// Score given to an expansion row that vector search never scored.
pub const EXPANSION_SCORE: f64 = 1e6;

const MIN_CANDIDATES: usize = 10;
const MIN_ROW_PREFETCH: usize = 50;
const MIN_PRELIMINARY: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultRow {
    #[serde(rename = "file")]
    pub source_file: String,
    pub row_index: usize,
    #[serde(rename = "value")]
    pub formatted_value: String,
    pub score: f64,
}

/// Outcome of a best-effort heuristic: it either ran, or says why it did not.
#[derive(Debug, Clone, PartialEq)]
pub enum Heuristic<T> {
    Applied(T),
    Skipped(SkipReason),
}

impl<T> Heuristic<T> {
    pub fn applied(&self) -> Option<&T> {
        match self {
            Heuristic::Applied(t) => Some(t),
            Heuristic::Skipped(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Nothing scored, so there is no anchor row.
    NoRankedRows,
    /// The anchor's dataset could not be loaded.
    AnchorUnavailable,
    /// The anchor row index is past the end of its dataset.
    AnchorOutOfBounds,
    /// The anchor's dataset has no entity-name column.
    NoEntityColumn,
    /// The anchor row's entity value is missing or blank.
    BlankEntity,
    /// The query carries no exact date.
    NoDate,
    /// The exact date already narrowed the entity expansion.
    DateUsedByEntity,
}

/// How entity expansion narrowed the entity's rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowFilter {
    All,
    ExactDate { column: String, date: String },
    PeriodPrefix { column: String, prefix: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct EntityExpansion {
    pub source_file: String,
    pub entity: String,
    pub filter: RowFilter,
    /// Row indices in final order.
    pub rows: Vec<usize>,
}

/// Everything one row query decided, for callers that want more than the rows.
#[derive(Debug, Clone)]
pub struct RowRetrieval {
    pub rows: Vec<ResultRow>,
    pub time_term: Option<TimeTerm>,
    pub entity_expansion: Heuristic<EntityExpansion>,
    pub date_expansion: Heuristic<Vec<RowKey>>,
}

impl RowRetrieval {
    /// The result for a query that had nothing to search.
    pub fn empty() -> Self {
        Self {
            rows: Vec::new(),
            time_term: None,
            entity_expansion: Heuristic::Skipped(SkipReason::NoRankedRows),
            date_expansion: Heuristic::Skipped(SkipReason::NoDate),
        }
    }
}

/// Accumulated score per source row, built fresh for every query.
#[derive(Debug, Default, Clone)]
pub struct RowScores {
    scores: HashMap<RowKey, f64>,
}

impl RowScores {
    pub fn from_candidates(candidates: &[Candidate]) -> Self {
        let mut out = Self::default();
        for c in candidates {
            let score = f64::from(c.score);
            match &c.metadata {
                ChunkMetadata::Cell {
                    source_file,
                    row_index,
                    ..
                } => out.add(source_file, *row_index, score),
                ChunkMetadata::RowWindow {
                    source_file,
                    row_start,
                    row_end,
                } => {
                    if row_end < row_start {
                        continue;
                    }
                    let len = (row_end - row_start + 1) as f64;
                    let share = score / len;
                    for row in *row_start..=*row_end {
                        out.add(source_file, row, share);
                    }
                }
            }
        }
        out
    }

    pub fn add(&mut self, source_file: &str, row: usize, score: f64) {
        *self
            .scores
            .entry((source_file.to_string(), row))
            .or_insert(0.0) += score;
    }

    pub fn get(&self, source_file: &str, row: usize) -> Option<f64> {
        self.scores.get(&(source_file.to_string(), row)).copied()
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Highest score first; ties fall back to file name then row index.
    pub fn ranked(&self, limit: usize) -> Vec<(RowKey, f64)> {
        let mut ranked: Vec<(RowKey, f64)> =
            self.scores.iter().map(|(k, v)| (k.clone(), *v)).collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(limit);
        ranked
    }
}

/// The row-retrieval stage with its collaborators.
#[derive(Clone)]
pub struct RowRetriever {
    search: SemanticSearch,
    source: Arc<dyn DatasetSource>,
    catalog: SchemaCatalog,
    collection: String,
}

impl RowRetriever {
    pub fn new(
        search: SemanticSearch,
        source: Arc<dyn DatasetSource>,
        catalog: SchemaCatalog,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            search,
            source,
            catalog,
            collection: collection.into(),
        }
    }

    pub async fn find_rows(
        &self,
        query: &str,
        k: usize,
        prefetch: usize,
    ) -> anyhow::Result<Vec<ResultRow>> {
        Ok(self.retrieve(query, k, prefetch).await?.rows)
    }

    pub async fn retrieve(
        &self,
        query: &str,
        k: usize,
        prefetch: usize,
    ) -> anyhow::Result<RowRetrieval> {
        let candidates = self
            .search
            .search(
                query,
                k.max(MIN_CANDIDATES),
                &self.collection,
                prefetch.max(MIN_ROW_PREFETCH),
            )
            .await?;
        let mut cache = DatasetCache::new(self.source.as_ref());
        Ok(rank_rows(query, k, &candidates, &mut cache, &self.catalog))
    }
}

/// Steps 2 to 6 over an already-fetched candidate pool.
pub fn rank_rows(
    query: &str,
    k: usize,
    candidates: &[Candidate],
    cache: &mut DatasetCache<'_>,
    catalog: &SchemaCatalog,
) -> RowRetrieval {
    let scores = RowScores::from_candidates(candidates);
    let preliminary = scores.ranked((2 * k).max(MIN_PRELIMINARY));
    for ((file, _), _) in &preliminary {
        cache.get(file);
    }

    let time_term = query_terms::extract(query);
    let entity_expansion = expand_entity(&preliminary, time_term.as_ref(), cache, catalog);
    if let Heuristic::Skipped(reason) = &entity_expansion {
        debug!(?reason, "entity expansion skipped");
    }
    let date_expansion = expand_date(time_term.as_ref(), &entity_expansion, cache, catalog);
    if let Heuristic::Skipped(reason) = &date_expansion {
        debug!(?reason, "date expansion skipped");
    }

    let mut expanded: Vec<RowKey> = Vec::new();
    if let Heuristic::Applied(e) = &entity_expansion {
        expanded.extend(e.rows.iter().map(|r| (e.source_file.clone(), *r)));
    }
    if let Heuristic::Applied(rows) = &date_expansion {
        expanded.extend(rows.iter().cloned());
    }

    let merged = merge(&expanded, &preliminary, &scores);
    let rows = merged
        .into_iter()
        .take(k)
        .filter_map(|((file, row), score)| {
            let dataset = cache.get(&file)?;
            let formatted_value = dataset.format_row(row)?;
            Some(ResultRow {
                source_file: file,
                row_index: row,
                formatted_value,
                score,
            })
        })
        .collect();

    RowRetrieval {
        rows,
        time_term,
        entity_expansion,
        date_expansion,
    }
}

/// All rows sharing the anchor row's entity value, narrowed by the query's time term.
fn expand_entity(
    preliminary: &[(RowKey, f64)],
    time_term: Option<&TimeTerm>,
    cache: &mut DatasetCache<'_>,
    catalog: &SchemaCatalog,
) -> Heuristic<EntityExpansion> {
    let Some(((file, anchor_row), _)) = preliminary.first() else {
        return Heuristic::Skipped(SkipReason::NoRankedRows);
    };
    let Some(dataset) = cache.get(file) else {
        return Heuristic::Skipped(SkipReason::AnchorUnavailable);
    };
    if *anchor_row >= dataset.len() {
        return Heuristic::Skipped(SkipReason::AnchorOutOfBounds);
    }
    let schema = catalog.schema_for(&dataset);
    let Some(entity_column) = schema
        .entity_column
        .as_deref()
        .filter(|c| dataset.column_index(c).is_some())
    else {
        return Heuristic::Skipped(SkipReason::NoEntityColumn);
    };
    let entity = match dataset.value(*anchor_row, entity_column).and_then(|v| v.text()) {
        Some(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => return Heuristic::Skipped(SkipReason::BlankEntity),
    };

    let period_column = schema
        .period_column
        .as_deref()
        .filter(|c| dataset.column_index(c).is_some());
    let date_column = schema
        .date_column
        .as_deref()
        .filter(|c| dataset.column_index(c).is_some());

    let filter = match (time_term, date_column, period_column) {
        (Some(TimeTerm::Date(d)), Some(col), _) => RowFilter::ExactDate {
            column: col.to_string(),
            date: d.clone(),
        },
        (Some(TimeTerm::Month(p)), _, Some(col)) | (Some(TimeTerm::Year(p)), _, Some(col)) => {
            RowFilter::PeriodPrefix {
                column: col.to_string(),
                prefix: p.clone(),
            }
        }
        _ => RowFilter::All,
    };

    let mut rows: Vec<usize> = (0..dataset.len())
        .filter(|&row| {
            dataset
                .value(row, entity_column)
                .and_then(|v| v.text())
                .is_some_and(|v| v.trim() == entity)
        })
        .filter(|&row| row_passes(&dataset, row, &filter))
        .collect();

    if let Some(col) = period_column {
        rows.sort_by_cached_key(|&row| {
            dataset
                .value(row, col)
                .and_then(|v| v.text())
                .unwrap_or_default()
        });
    }

    Heuristic::Applied(EntityExpansion {
        source_file: file.clone(),
        entity,
        filter,
        rows,
    })
}

fn row_passes(dataset: &Dataset, row: usize, filter: &RowFilter) -> bool {
    match filter {
        RowFilter::All => true,
        RowFilter::ExactDate { column, date } => dataset
            .value(row, column)
            .is_some_and(|v| v.text_eq(date)),
        RowFilter::PeriodPrefix { column, prefix } => dataset
            .value(row, column)
            .and_then(|v| v.text())
            .is_some_and(|v| v.starts_with(prefix.as_str())),
    }
}

/// Rows of every loaded dataset whose date column equals the query's exact date.
fn expand_date(
    time_term: Option<&TimeTerm>,
    entity: &Heuristic<EntityExpansion>,
    cache: &DatasetCache<'_>,
    catalog: &SchemaCatalog,
) -> Heuristic<Vec<RowKey>> {
    let Some(TimeTerm::Date(date)) = time_term else {
        return Heuristic::Skipped(SkipReason::NoDate);
    };
    if let Heuristic::Applied(EntityExpansion {
        filter: RowFilter::ExactDate { .. },
        ..
    }) = entity
    {
        return Heuristic::Skipped(SkipReason::DateUsedByEntity);
    }
    let mut rows = Vec::new();
    for (file, dataset) in cache.loaded() {
        let schema = catalog.schema_for(dataset);
        let Some(col) = schema.date_column.as_deref() else {
            continue;
        };
        for row in 0..dataset.len() {
            if dataset.value(row, col).is_some_and(|v| v.text_eq(date)) {
                rows.push((file.to_string(), row));
            }
        }
    }
    Heuristic::Applied(rows)
}

/// Expansion rows first (first occurrence wins), then the preliminary ranking.
fn merge(
    expanded: &[RowKey],
    preliminary: &[(RowKey, f64)],
    scores: &RowScores,
) -> Vec<(RowKey, f64)> {
    let mut seen: HashSet<RowKey> = HashSet::new();
    let mut merged = Vec::with_capacity(expanded.len() + preliminary.len());
    for key in expanded {
        if seen.insert(key.clone()) {
            let score = scores.get(&key.0, key.1).unwrap_or(EXPANSION_SCORE);
            merged.push((key.clone(), score));
        }
    }
    for (key, score) in preliminary {
        if seen.insert(key.clone()) {
            merged.push((key.clone(), *score));
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::ChunkKind;
    use crate::config::SchemaConfig;
    use crate::dataset::{CellValue, LoadError};

    struct Fixed(Vec<Dataset>);

    impl DatasetSource for Fixed {
        fn load(&self, source_file: &str) -> Result<Dataset, LoadError> {
            self.0
                .iter()
                .find(|d| d.name == source_file)
                .cloned()
                .ok_or_else(|| LoadError::MissingHeader(source_file.to_string()))
        }
    }

    fn text(s: &str) -> CellValue {
        CellValue::parse(s)
    }

    fn payroll() -> Dataset {
        let columns = ["employee_id", "name", "competency", "bonus", "payment_date"]
            .iter()
            .map(|c| c.to_string())
            .collect();
        let rows = [
            ["E001", "Ana Souza", "2025-05", "100", "2025-05-30"],
            ["E002", "Bruno Lima", "2025-06", "300", "2025-06-28"],
            ["E002", "Bruno Lima", "2025-04", "150", "2025-04-29"],
            ["E003", "Carla Dias", "2025-06", "200", "2025-06-28"],
            ["E002", "Bruno Lima", "2024-12", "90", "2024-12-20"],
            ["E001", "Ana Souza", "2025-06", "120", "2025-06-27"],
        ]
        .iter()
        .map(|r| r.iter().map(|v| text(v)).collect())
        .collect();
        Dataset::new("payroll.csv", columns, rows)
    }

    fn products() -> Dataset {
        Dataset::new(
            "products.csv",
            vec!["id".into(), "product".into(), "price".into()],
            vec![
                vec![text("1"), text("Phone"), text("999")],
                vec![text("2"), text("Laptop"), text("4999")],
            ],
        )
    }

    fn cell(file: &str, row: usize, score: f32) -> Candidate {
        Candidate {
            source_file: file.into(),
            score,
            kind: ChunkKind::Cell,
            metadata: ChunkMetadata::Cell {
                source_file: file.into(),
                row_id: row.to_string(),
                column_name: "name".into(),
                row_index: row,
                original_value: None,
            },
            index: row as u64,
        }
    }

    fn window(file: &str, start: usize, end: usize, score: f32) -> Candidate {
        Candidate {
            source_file: file.into(),
            score,
            kind: ChunkKind::RowWindow,
            metadata: ChunkMetadata::RowWindow {
                source_file: file.into(),
                row_start: start,
                row_end: end,
            },
            index: 1000 + start as u64,
        }
    }

    fn run(query: &str, k: usize, candidates: &[Candidate]) -> RowRetrieval {
        let source = Fixed(vec![payroll(), products()]);
        let mut cache = DatasetCache::new(&source);
        let catalog = SchemaCatalog::new(SchemaConfig::default());
        rank_rows(query, k, candidates, &mut cache, &catalog)
    }

    fn keys(r: &RowRetrieval) -> Vec<(String, usize)> {
        r.rows
            .iter()
            .map(|x| (x.source_file.clone(), x.row_index))
            .collect()
    }

    #[test]
    fn window_score_is_split_evenly() {
        let scores = RowScores::from_candidates(&[window("payroll.csv", 2, 5, 0.8)]);
        assert_eq!(scores.len(), 4);
        let total: f64 = (2..=5).map(|r| scores.get("payroll.csv", r).unwrap()).sum();
        assert!((scores.get("payroll.csv", 3).unwrap() - 0.2).abs() < 1e-6);
        assert!((total - 0.8).abs() < 1e-6);
    }

    #[test]
    fn cells_accumulate_per_row() {
        let scores = RowScores::from_candidates(&[
            cell("payroll.csv", 1, 0.5),
            cell("payroll.csv", 1, 0.25),
            window("payroll.csv", 0, 1, 0.5),
        ]);
        assert!((scores.get("payroll.csv", 1).unwrap() - 1.0).abs() < 1e-6);
        assert!((scores.get("payroll.csv", 0).unwrap() - 0.25).abs() < 1e-6);
    }

    #[test]
    fn ranked_ties_are_deterministic() {
        let scores = RowScores::from_candidates(&[
            cell("b.csv", 0, 0.5),
            cell("a.csv", 3, 0.5),
            cell("a.csv", 1, 0.5),
        ]);
        let order: Vec<RowKey> = scores.ranked(10).into_iter().map(|(k, _)| k).collect();
        assert_eq!(
            order,
            vec![
                ("a.csv".to_string(), 1),
                ("a.csv".to_string(), 3),
                ("b.csv".to_string(), 0)
            ]
        );
    }

    #[test]
    fn exact_date_narrows_entity_rows() {
        let r = run(
            "bônus do Bruno Lima no dia 2025-06-28",
            5,
            &[cell("payroll.csv", 2, 0.9), cell("payroll.csv", 3, 0.5)],
        );
        let e = r.entity_expansion.applied().unwrap();
        assert_eq!(e.entity, "Bruno Lima");
        assert_eq!(e.rows, vec![1]);
        assert_eq!(r.date_expansion, Heuristic::Skipped(SkipReason::DateUsedByEntity));
        assert_eq!(r.rows[0].row_index, 1);
        assert_eq!(r.rows[0].score, EXPANSION_SCORE);
        assert!(r.rows[0].formatted_value.contains("name: Bruno Lima"));
        assert!(r.rows[0].formatted_value.contains("payment_date: 2025-06-28"));
        assert!(r.rows[0].formatted_value.contains("bonus: 300"));
        // Remaining preliminary rows follow in score order.
        assert_eq!(
            keys(&r)[1..].to_vec(),
            vec![("payroll.csv".to_string(), 2), ("payroll.csv".to_string(), 3)]
        );
    }

    #[test]
    fn date_wins_over_year_in_the_same_query() {
        let r = run(
            "Bruno Lima 2024 2025-06-28",
            5,
            &[cell("payroll.csv", 4, 0.9)],
        );
        assert_eq!(r.time_term, Some(TimeTerm::Date("2025-06-28".into())));
        let e = r.entity_expansion.applied().unwrap();
        assert!(matches!(e.filter, RowFilter::ExactDate { .. }));
        assert_eq!(e.rows, vec![1]);
    }

    #[test]
    fn year_filters_by_period_prefix_in_chronological_order() {
        let r = run("pagamentos do Bruno Lima em 2025", 10, &[cell("payroll.csv", 4, 0.9)]);
        let e = r.entity_expansion.applied().unwrap();
        assert_eq!(
            e.filter,
            RowFilter::PeriodPrefix {
                column: "competency".into(),
                prefix: "2025".into()
            }
        );
        // 2025-04 before 2025-06.
        assert_eq!(e.rows, vec![2, 1]);
        assert_eq!(
            keys(&r),
            vec![
                ("payroll.csv".to_string(), 2),
                ("payroll.csv".to_string(), 1),
                ("payroll.csv".to_string(), 4)
            ]
        );
        // The anchor kept its aggregated score.
        assert!((r.rows[2].score - 0.9).abs() < 1e-6);
    }

    #[test]
    fn month_filter_and_no_time_term() {
        let r = run("Bruno Lima 2025-04", 10, &[cell("payroll.csv", 1, 0.9)]);
        assert_eq!(r.entity_expansion.applied().unwrap().rows, vec![2]);

        let r = run("tudo do Bruno Lima", 10, &[cell("payroll.csv", 1, 0.9)]);
        let e = r.entity_expansion.applied().unwrap();
        assert_eq!(e.filter, RowFilter::All);
        assert_eq!(e.rows, vec![4, 2, 1]);
    }

    #[test]
    fn date_expansion_runs_when_anchor_has_no_entity() {
        let r = run(
            "who was paid on 2025-06-28",
            5,
            &[cell("products.csv", 0, 0.9), cell("payroll.csv", 0, 0.2)],
        );
        assert_eq!(
            r.entity_expansion,
            Heuristic::Skipped(SkipReason::NoEntityColumn)
        );
        assert_eq!(
            r.date_expansion,
            Heuristic::Applied(vec![
                ("payroll.csv".to_string(), 1),
                ("payroll.csv".to_string(), 3)
            ])
        );
        assert_eq!(
            keys(&r),
            vec![
                ("payroll.csv".to_string(), 1),
                ("payroll.csv".to_string(), 3),
                ("products.csv".to_string(), 0),
                ("payroll.csv".to_string(), 0)
            ]
        );
    }

    #[test]
    fn exact_date_scans_files_when_anchor_has_no_date_column() {
        let staff = Dataset::new(
            "staff.csv",
            vec!["name".into(), "role".into()],
            vec![vec![text("Ana Souza"), text("dev")]],
        );
        let source = Fixed(vec![staff, payroll()]);
        let mut cache = DatasetCache::new(&source);
        let catalog = SchemaCatalog::new(SchemaConfig::default());
        let r = rank_rows(
            "Ana Souza 2025-06-28",
            5,
            &[cell("staff.csv", 0, 0.9), cell("payroll.csv", 0, 0.2)],
            &mut cache,
            &catalog,
        );
        let e = r.entity_expansion.applied().unwrap();
        assert_eq!(e.source_file, "staff.csv");
        assert_eq!(e.filter, RowFilter::All);
        assert_eq!(e.rows, vec![0]);
        assert_eq!(
            r.date_expansion,
            Heuristic::Applied(vec![
                ("payroll.csv".to_string(), 1),
                ("payroll.csv".to_string(), 3)
            ])
        );
        let k = keys(&r);
        assert!(k.contains(&("payroll.csv".to_string(), 1)));
        assert!(k.contains(&("payroll.csv".to_string(), 3)));
    }

    #[test]
    fn merged_rows_are_unique_and_truncated() {
        let r = run(
            "Bruno Lima",
            2,
            &[
                cell("payroll.csv", 1, 0.9),
                cell("payroll.csv", 2, 0.8),
                cell("payroll.csv", 4, 0.7),
                cell("payroll.csv", 0, 0.6),
            ],
        );
        let k = keys(&r);
        assert_eq!(k.len(), 2);
        let unique: HashSet<_> = k.iter().collect();
        assert_eq!(unique.len(), k.len());
    }

    #[test]
    fn no_candidates_means_no_rows() {
        let r = run("2025-06-28", 5, &[]);
        assert!(r.rows.is_empty());
        assert_eq!(r.entity_expansion, Heuristic::Skipped(SkipReason::NoRankedRows));
        // Nothing was loaded, so the date scan has nothing to read.
        assert_eq!(r.date_expansion, Heuristic::Applied(vec![]));
    }

    #[test]
    fn stale_rows_and_missing_files_are_skipped() {
        let r = run(
            "x",
            5,
            &[
                cell("payroll.csv", 99, 0.9),
                cell("gone.csv", 0, 0.8),
                cell("products.csv", 1, 0.1),
            ],
        );
        assert_eq!(
            r.entity_expansion,
            Heuristic::Skipped(SkipReason::AnchorOutOfBounds)
        );
        assert_eq!(keys(&r), vec![("products.csv".to_string(), 1)]);
    }

    #[test]
    fn blank_entity_skips_expansion() {
        let ds = Dataset::new(
            "people.csv",
            vec!["name".into(), "city".into()],
            vec![vec![CellValue::Missing, text("Recife")]],
        );
        let source = Fixed(vec![ds]);
        let mut cache = DatasetCache::new(&source);
        let catalog = SchemaCatalog::new(SchemaConfig::default());
        let r = rank_rows("x", 3, &[cell("people.csv", 0, 0.4)], &mut cache, &catalog);
        assert_eq!(r.entity_expansion, Heuristic::Skipped(SkipReason::BlankEntity));
        assert_eq!(r.rows.len(), 1);
    }

    #[test]
    fn ranking_is_repeatable() {
        let candidates = [
            cell("payroll.csv", 3, 0.4),
            window("payroll.csv", 0, 5, 0.6),
            cell("products.csv", 1, 0.4),
        ];
        let a = run("Carla Dias", 5, &candidates);
        let b = run("Carla Dias", 5, &candidates);
        assert_eq!(a.rows, b.rows);
    }
}
