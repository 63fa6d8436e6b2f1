//! The populator: row-major batch generation with uniqueness enforcement.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

use datasmith_core::metadata::{ColumnMetadata, TableMetadata};
use datasmith_core::packet::{ErrorPacket, TablePacket};
use datasmith_core::spec::{ColumnSpec, GeneratorKind, TableSpec};
use datasmith_db::{Driver, inspect};

use crate::progress::{JobStatus, SharedProgress, report};
use crate::registry::{self, GenError, RowContext, ValueStream};

/// Candidate pulls per column per row before giving up on the column.
const RETRY_BUDGET: usize = 10;

/// Per-job lookup caches: existing column values and FK sample sets.
///
/// These belong to one generation job and are discarded with it; they are
/// never shared across jobs.
#[derive(Default)]
struct JobCache {
    existing: HashMap<(String, String), Arc<HashSet<String>>>,
    fk_values: HashMap<(String, String), Arc<Vec<String>>>,
}

impl JobCache {
    fn existing(
        &mut self,
        driver: &mut dyn Driver,
        table: &str,
        column: &str,
    ) -> Result<Arc<HashSet<String>>, GenError> {
        let key = (table.to_string(), column.to_string());
        if let Some(values) = self.existing.get(&key) {
            return Ok(Arc::clone(values));
        }
        let values: HashSet<String> =
            driver.existing_values(table, column)?.into_iter().collect();
        let values = Arc::new(values);
        self.existing.insert(key, Arc::clone(&values));
        Ok(values)
    }

    fn fk_values(
        &mut self,
        driver: &mut dyn Driver,
        table: &str,
        column: &str,
    ) -> Result<Arc<Vec<String>>, GenError> {
        let key = (table.to_string(), column.to_string());
        if let Some(values) = self.fk_values.get(&key) {
            return Ok(Arc::clone(values));
        }
        let values = Arc::new(driver.existing_values(table, column)?);
        self.fk_values.insert(key, Arc::clone(&values));
        Ok(values)
    }
}

/// One column taking part in the ordered generation run.
struct ActiveColumn {
    spec: ColumnSpec,
    meta: ColumnMetadata,
    stream: Box<dyn ValueStream>,
}

/// Generates a full batch for `spec` against the live database.
///
/// Returns the spec (with whatever `db_id` the caller assigned) plus a
/// single-page [`TablePacket`]. Per-column failures become warning/error
/// packets on the result; only cancellation and unreachable-database
/// conditions fail the whole call.
pub fn build_packets(
    driver: &mut dyn Driver,
    spec: &TableSpec,
    progress: &SharedProgress,
    cancel: &AtomicBool,
) -> Result<(TableSpec, TablePacket), GenError> {
    let metadata = inspect::table_metadata(driver, &spec.name)?;
    let total = spec.no_of_entries;
    let mut errors: Vec<ErrorPacket> = Vec::new();
    let mut cache = JobCache::default();

    report(progress, JobStatus::Running, 0, total, "");

    // Validation and ordering: ordinary generators keep input order, script
    // generators follow sorted by their order hint (collisions bump up).
    let mut ordinary: Vec<ColumnSpec> = Vec::new();
    let mut scripted: BTreeMap<i64, ColumnSpec> = BTreeMap::new();
    for col_spec in &spec.columns {
        if col_spec.kind.is_passive() {
            continue;
        }
        let meta = match metadata.column(&col_spec.name) {
            Ok(meta) => meta,
            Err(e) => {
                errors.push(ErrorPacket::error(&col_spec.name, e.to_string()));
                continue;
            }
        };
        if let Err(e) = registry::validate(col_spec, meta) {
            errors.push(ErrorPacket::error(
                &col_spec.name,
                format!("Error in column '{}': {e}", col_spec.name),
            ));
            continue;
        }
        if col_spec.kind == GeneratorKind::Script {
            let mut order = col_spec.order.unwrap_or(0);
            while scripted.contains_key(&order) {
                order += 1;
            }
            scripted.insert(order, col_spec.clone());
        } else {
            ordinary.push(col_spec.clone());
        }
    }
    let ordered: Vec<ColumnSpec> = ordinary.into_iter().chain(scripted.into_values()).collect();

    // Every spec column gets a pre-sized NULL column; passive and dropped
    // columns simply stay NULL.
    let mut entries: HashMap<String, Vec<Option<String>>> = spec
        .columns
        .iter()
        .map(|c| (c.name.clone(), vec![None; total]))
        .collect();

    // Instantiate streams; foreign sources are resolved here so an empty
    // source drops the column before the fill loop starts.
    let mut active: Vec<ActiveColumn> = Vec::new();
    for col_spec in ordered {
        let meta = match metadata.column(&col_spec.name) {
            Ok(meta) => meta.clone(),
            Err(_) => continue,
        };
        let fk_values = if col_spec.kind == GeneratorKind::Foreign {
            let fk = &meta.foreign_keys;
            let values = cache.fk_values(driver, &fk.table, &fk.column)?;
            if values.is_empty() {
                let msg = format!(
                    "foreign key source '{}.{}' has no values to sample",
                    fk.table, fk.column
                );
                errors.push(if meta.nullable {
                    ErrorPacket::warning(&col_spec.name, msg)
                } else {
                    ErrorPacket::error(&col_spec.name, msg)
                });
                continue;
            }
            Some(values)
        } else {
            None
        };
        match registry::make_stream(&col_spec, &meta, fk_values) {
            Ok(stream) => active.push(ActiveColumn {
                spec: col_spec,
                meta,
                stream,
            }),
            Err(e) => errors.push(ErrorPacket::error(
                &col_spec.name,
                format!("Error in column '{}': {e}", col_spec.name),
            )),
        }
    }

    // Row-major fill loop.
    for row_idx in 0..total {
        if cancel.load(Ordering::Relaxed) {
            report(progress, JobStatus::Idle, row_idx, total, "");
            return Err(GenError::Cancelled);
        }

        let mut row_values: HashMap<String, Option<String>> = spec
            .columns
            .iter()
            .map(|c| (c.name.clone(), None))
            .collect();
        let mut filled: HashSet<String> = HashSet::new();
        let mut dead: Vec<usize> = Vec::new();

        for (gen_idx, generator) in active.iter_mut().enumerate() {
            report(
                progress,
                JobStatus::Running,
                row_idx,
                total,
                &generator.spec.name,
            );

            let mut accepted = false;
            let mut failure: Option<GenError> = None;

            for _ in 0..RETRY_BUDGET {
                let candidate = match generator
                    .stream
                    .next_value(&RowContext { columns: &row_values })
                {
                    Ok(candidate) => candidate,
                    Err(e) => {
                        failure = Some(e);
                        break;
                    }
                };
                let valid = match is_valid(
                    driver,
                    &mut cache,
                    &metadata,
                    &generator.meta,
                    &entries,
                    row_idx,
                    &filled,
                    candidate.as_deref(),
                ) {
                    Ok(valid) => valid,
                    Err(e) => {
                        failure = Some(e);
                        break;
                    }
                };
                if valid {
                    let name = &generator.spec.name;
                    if let Some(slot) = entries.get_mut(name) {
                        slot[row_idx] = candidate.clone();
                    }
                    row_values.insert(name.clone(), candidate);
                    filled.insert(name.clone());
                    accepted = true;
                    break;
                }
            }

            if let Some(e) = failure {
                // A stream exception kills the generator for the rest of
                // the batch.
                errors.push(ErrorPacket::error(
                    &generator.spec.name,
                    format!(
                        "generator for column '{}' failed at row {}: {e}",
                        generator.spec.name, row_idx
                    ),
                ));
                dead.push(gen_idx);
            } else if !accepted {
                let msg = format!(
                    "Failed to populate column '{}' in table '{}': retry budget exhausted at row {}.",
                    generator.spec.name, spec.name, row_idx
                );
                errors.push(if generator.meta.nullable {
                    ErrorPacket::warning(&generator.spec.name, msg)
                } else {
                    ErrorPacket::error(&generator.spec.name, msg)
                });
                dead.push(gen_idx);
            }
        }

        for idx in dead.into_iter().rev() {
            let dropped = active.remove(idx);
            debug!(column = %dropped.spec.name, row = row_idx, "dropped generator");
        }

        report(progress, JobStatus::Running, row_idx + 1, total, "");
    }

    // Generator order cannot guarantee the last sibling of a multi-unique
    // group fills last, so a post-pass re-checks every group over the
    // finished batch.
    multi_unique_post_pass(&metadata, spec, &active, &mut entries, &mut errors);

    let columns: Vec<String> = spec.columns.iter().map(|c| c.name.clone()).collect();
    let rows: Vec<Vec<Option<String>>> = (0..total)
        .map(|row_idx| {
            columns
                .iter()
                .map(|name| entries[name][row_idx].clone())
                .collect()
        })
        .collect();

    report(progress, JobStatus::Done, total, total, "");

    let packet = TablePacket::new(&spec.name, columns, rows, errors, spec.page_size);
    Ok((spec.clone(), packet))
}

/// The uniqueness predicate for one candidate value.
#[allow(clippy::too_many_arguments)]
fn is_valid(
    driver: &mut dyn Driver,
    cache: &mut JobCache,
    table: &TableMetadata,
    column: &ColumnMetadata,
    entries: &HashMap<String, Vec<Option<String>>>,
    row_idx: usize,
    filled: &HashSet<String>,
    candidate: Option<&str>,
) -> Result<bool, GenError> {
    // NULL is always acceptable to the uniqueness checks.
    let Some(value) = candidate else {
        return Ok(true);
    };

    if column.unique {
        let prior = &entries[&column.name][..row_idx];
        if prior.iter().any(|v| v.as_deref() == Some(value)) {
            return Ok(false);
        }
        let existing = cache.existing(driver, &table.name, &column.name)?;
        if existing.contains(value) {
            return Ok(false);
        }
    }

    if let Some(group) = &column.multi_unique {
        // Build the current-row tuple with the candidate standing in for
        // this column. Unfilled siblings defer the check to whichever
        // sibling fills last; tuples containing NULL are skipped.
        let mut tuple: Vec<&str> = Vec::with_capacity(group.len());
        for sibling in group {
            if sibling == &column.name {
                tuple.push(value);
                continue;
            }
            if !filled.contains(sibling) {
                return Ok(true);
            }
            match entries.get(sibling).and_then(|col| col[row_idx].as_deref()) {
                Some(text) => tuple.push(text),
                None => return Ok(true),
            }
        }

        for prior_idx in 0..row_idx {
            let mut prior: Vec<&str> = Vec::with_capacity(group.len());
            let mut has_null = false;
            for sibling in group {
                match entries.get(sibling).and_then(|col| col[prior_idx].as_deref()) {
                    Some(text) => prior.push(text),
                    None => {
                        has_null = true;
                        break;
                    }
                }
            }
            if !has_null && prior == tuple {
                return Ok(false);
            }
        }

        for (sibling, component) in group.iter().zip(&tuple) {
            let existing = cache.existing(driver, &table.name, sibling)?;
            if existing.contains(*component) {
                return Ok(false);
            }
        }
    }

    Ok(true)
}

/// Re-validates multi-unique tuples across the completed batch.
///
/// A row repeating an earlier tuple has the group's last-run nullable
/// column cleared to NULL (with one warning per group); when no group
/// member is nullable an error packet is attached instead.
fn multi_unique_post_pass(
    metadata: &TableMetadata,
    spec: &TableSpec,
    active: &[ActiveColumn],
    entries: &mut HashMap<String, Vec<Option<String>>>,
    errors: &mut Vec<ErrorPacket>,
) {
    let groups: BTreeSet<Vec<String>> = spec
        .columns
        .iter()
        .filter_map(|c| metadata.column(&c.name).ok())
        .filter_map(|m| m.multi_unique.clone())
        .collect();

    for group in groups {
        if !group.iter().all(|name| entries.contains_key(name)) {
            continue;
        }

        let total = spec.no_of_entries;
        let mut seen: HashSet<Vec<String>> = HashSet::new();
        let mut offending: Vec<usize> = Vec::new();
        for row_idx in 0..total {
            let tuple: Option<Vec<String>> = group
                .iter()
                .map(|name| entries[name][row_idx].clone())
                .collect();
            let Some(tuple) = tuple else {
                continue;
            };
            if !seen.insert(tuple) {
                offending.push(row_idx);
            }
        }
        if offending.is_empty() {
            continue;
        }

        // Prefer the group member that ran last and can hold NULL.
        let fix_column = active
            .iter()
            .rev()
            .find(|a| group.contains(&a.spec.name) && a.meta.nullable)
            .map(|a| a.spec.name.clone())
            .or_else(|| {
                group
                    .iter()
                    .rev()
                    .find(|name| {
                        metadata
                            .column(name)
                            .map(|m| m.nullable)
                            .unwrap_or(false)
                    })
                    .cloned()
            });

        match fix_column {
            Some(name) => {
                let count = offending.len();
                if let Some(slot) = entries.get_mut(&name) {
                    for row_idx in offending {
                        slot[row_idx] = None;
                    }
                }
                errors.push(ErrorPacket::warning(
                    &name,
                    format!(
                        "{count} duplicate ({}) tuple(s); cleared '{name}' on the offending rows",
                        group.join(", ")
                    ),
                ));
            }
            None => {
                errors.push(ErrorPacket::error(
                    group.join(", "),
                    format!(
                        "{} duplicate ({}) tuple(s) and no nullable column to clear",
                        offending.len(),
                        group.join(", ")
                    ),
                ));
            }
        }
    }
}
