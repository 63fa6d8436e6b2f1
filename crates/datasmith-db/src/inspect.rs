//! Schema inspection: raw driver output to typed [`TableMetadata`].

use std::collections::{BTreeSet, HashMap};

use datasmith_core::graph::{DependencyGraph, edge_score};
use datasmith_core::metadata::{ColumnMetadata, ForeignKeyRef, TableMetadata};

use crate::driver::{Driver, RawColumn, RawForeignKey};
use crate::error::{DbError, Result};

/// Parses `length` / `precision` / `scale` out of a declared type text.
///
/// Numeric types (`DECIMAL(10,2)`, `NUMERIC(6)`) yield precision and scale;
/// everything else with a single parameter (`VARCHAR(40)`) yields a length.
pub fn parse_type_params(sql_type: &str) -> (Option<u32>, Option<u32>, Option<u32>) {
    let Some(open) = sql_type.find('(') else {
        return (None, None, None);
    };
    let Some(close) = sql_type[open..].find(')') else {
        return (None, None, None);
    };
    let base = sql_type[..open].trim().to_uppercase();
    let params: Vec<Option<u32>> = sql_type[open + 1..open + close]
        .split(',')
        .map(|p| p.trim().parse().ok())
        .collect();

    let numeric = matches!(
        base.as_str(),
        "DECIMAL" | "NUMERIC" | "DEC" | "FIXED" | "FLOAT" | "DOUBLE" | "REAL"
    );
    if numeric {
        let precision = params.first().copied().flatten();
        let scale = params.get(1).copied().flatten();
        (None, precision, scale)
    } else {
        (params.first().copied().flatten(), None, None)
    }
}

/// Builds the full [`TableMetadata`] contract for one table.
///
/// Unique groups are gathered from declared unique constraints, unique
/// indexes and the primary key, normalized to sorted column-name tuples. A
/// column is `unique` iff it appears in a single-column group; its
/// `multi_unique` is the first (smallest, deterministically) group of size
/// greater than one containing it.
pub fn table_metadata(driver: &mut dyn Driver, table: &str) -> Result<TableMetadata> {
    let names = driver.table_names()?;
    if !names.iter().any(|n| n == table) {
        return Err(DbError::UnknownTable {
            name: table.to_string(),
        });
    }

    let raw_columns = driver.columns(table)?;
    let pk = driver.primary_key(table)?;
    let fks = driver.foreign_keys(table)?;

    let mut groups: BTreeSet<Vec<String>> = driver
        .unique_groups(table)?
        .into_iter()
        .map(|mut group| {
            group.sort();
            group
        })
        .collect();
    if !pk.is_empty() {
        let mut pk_group = pk.clone();
        pk_group.sort();
        groups.insert(pk_group);
    }

    let singles: BTreeSet<&String> = groups
        .iter()
        .filter(|g| g.len() == 1)
        .map(|g| &g[0])
        .collect();

    let fk_map: HashMap<&str, &RawForeignKey> =
        fks.iter().map(|fk| (fk.column.as_str(), fk)).collect();

    let columns = raw_columns
        .into_iter()
        .map(|raw| {
            let multi_unique = groups
                .iter()
                .find(|g| g.len() > 1 && g.contains(&raw.name))
                .cloned();
            let foreign_keys = fk_map
                .get(raw.name.as_str())
                .map(|fk| ForeignKeyRef::new(fk.ref_table.clone(), fk.ref_column.clone()))
                .unwrap_or_default();
            ColumnMetadata {
                unique: singles.contains(&raw.name),
                multi_unique,
                primary_key: pk.contains(&raw.name),
                foreign_keys,
                name: raw.name,
                sql_type: raw.sql_type,
                nullable: raw.nullable,
                default: raw.default,
                autoincrement: raw.autoincrement,
                computed: raw.computed,
                length: raw.length,
                precision: raw.precision,
                scale: raw.scale,
            }
        })
        .collect();

    let parents: BTreeSet<String> = fks.iter().map(|fk| fk.ref_table.clone()).collect();

    Ok(TableMetadata {
        name: table.to_string(),
        parents: parents.into_iter().collect(),
        columns,
    })
}

/// FK and column data for a set of tables, prefetched so the dependency
/// sorter can run off-thread without touching the connection.
#[derive(Debug, Clone, Default)]
pub struct RelationData {
    pub tables: Vec<String>,
    pub foreign_keys: HashMap<String, Vec<RawForeignKey>>,
    pub columns: HashMap<String, Vec<RawColumn>>,
}

/// Fetches table names plus the FK/column data needed for sorting and
/// fan-in counts.
pub fn prefetch_relations(driver: &mut dyn Driver) -> Result<RelationData> {
    let tables = driver.table_names()?;
    let mut foreign_keys = HashMap::new();
    let mut columns = HashMap::new();
    for table in &tables {
        foreign_keys.insert(table.clone(), driver.foreign_keys(table)?);
        columns.insert(table.clone(), driver.columns(table)?);
    }
    Ok(RelationData {
        tables,
        foreign_keys,
        columns,
    })
}

impl RelationData {
    /// Number of distinct parent tables a table references.
    pub fn parent_count(&self, table: &str) -> usize {
        self.foreign_keys
            .get(table)
            .map(|fks| {
                fks.iter()
                    .map(|fk| fk.ref_table.as_str())
                    .collect::<BTreeSet<_>>()
                    .len()
            })
            .unwrap_or(0)
    }
}

/// Topologically sorts tables by FK dependencies with scored cycle-breaking.
///
/// `subset` restricts the sort to the named tables (defaulting to all);
/// edges whose parent falls outside the set are ignored.
pub fn sort_from_relations(data: &RelationData, subset: Option<&[String]>) -> Vec<String> {
    let tables: Vec<&String> = match subset {
        Some(subset) => subset.iter().collect(),
        None => data.tables.iter().collect(),
    };
    let in_set: BTreeSet<&str> = tables.iter().map(|t| t.as_str()).collect();

    let mut graph = DependencyGraph::new();
    for table in &tables {
        graph.add_node(table);
    }
    for table in &tables {
        let Some(fks) = data.foreign_keys.get(*table) else {
            continue;
        };
        for fk in fks {
            if !in_set.contains(fk.ref_table.as_str()) {
                continue;
            }
            let score = data
                .columns
                .get(*table)
                .and_then(|cols| cols.iter().find(|c| c.name == fk.column))
                .map(|c| edge_score(c.nullable, c.default.is_some()))
                .unwrap_or(datasmith_core::graph::INFINITE_SCORE);
            graph.add_edge(&fk.ref_table, table, score);
        }
    }
    graph.sort()
}

/// Convenience wrapper: prefetch then sort on the calling thread.
pub fn sort_tables(driver: &mut dyn Driver, subset: Option<&[String]>) -> Result<Vec<String>> {
    let data = prefetch_relations(driver)?;
    Ok(sort_from_relations(&data, subset))
}

#[cfg(test)]
mod tests {
    use super::*;
    use datasmith_core::creds::{DbCreds, Dialect};
    use pretty_assertions::assert_eq;

    use crate::sqlite_driver::SqliteDriver;

    #[test]
    fn type_param_parsing() {
        assert_eq!(parse_type_params("VARCHAR(40)"), (Some(40), None, None));
        assert_eq!(parse_type_params("DECIMAL(10,2)"), (None, Some(10), Some(2)));
        assert_eq!(parse_type_params("decimal(6)"), (None, Some(6), None));
        assert_eq!(parse_type_params("INTEGER"), (None, None, None));
        assert_eq!(parse_type_params("TEXT"), (None, None, None));
    }

    fn open_fixture(ddl: &str) -> (tempfile::TempDir, SqliteDriver) {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("fixture.db");
        rusqlite::Connection::open(&path)
            .unwrap()
            .execute_batch(ddl)
            .unwrap();
        let creds = DbCreds {
            id: None,
            name: path.to_string_lossy().into_owned(),
            host: String::new(),
            port: String::new(),
            user: String::new(),
            password: String::new(),
            dialect: Dialect::Sqlite,
        };
        let driver = SqliteDriver::connect(&creds, None).unwrap();
        (tmp, driver)
    }

    #[test]
    fn metadata_for_unknown_table_fails() {
        let (_tmp, mut driver) = open_fixture("CREATE TABLE t (x INTEGER)");
        let err = table_metadata(&mut driver, "ghost").unwrap_err();
        assert!(matches!(err, DbError::UnknownTable { .. }));
    }

    #[test]
    fn metadata_normalizes_uniqueness() {
        let (_tmp, mut driver) = open_fixture(
            r#"
            CREATE TABLE enrollments (
                enrollment_id INTEGER PRIMARY KEY,
                student_id    INTEGER NOT NULL,
                class_id      INTEGER NOT NULL,
                seat          TEXT UNIQUE,
                UNIQUE(student_id, class_id)
            );
            "#,
        );
        let meta = table_metadata(&mut driver, "enrollments").unwrap();

        let id = meta.column("enrollment_id").unwrap();
        assert!(id.primary_key);
        // Single-column PK counts as single-column uniqueness.
        assert!(id.unique);
        assert!(id.autoincrement);

        let seat = meta.column("seat").unwrap();
        assert!(seat.unique);
        assert_eq!(seat.multi_unique, None);

        let student = meta.column("student_id").unwrap();
        assert!(!student.unique);
        assert_eq!(
            student.multi_unique,
            Some(vec!["class_id".to_string(), "student_id".to_string()])
        );
        let class = meta.column("class_id").unwrap();
        assert_eq!(class.multi_unique, student.multi_unique);
    }

    #[test]
    fn metadata_records_foreign_keys_and_parents() {
        let (_tmp, mut driver) = open_fixture(
            r#"
            CREATE TABLE teachers (teacher_id INTEGER PRIMARY KEY);
            CREATE TABLE rooms (room_id INTEGER PRIMARY KEY);
            CREATE TABLE classes (
                class_id   INTEGER PRIMARY KEY,
                teacher_id INTEGER REFERENCES teachers(teacher_id),
                room_id    INTEGER REFERENCES rooms(room_id)
            );
            "#,
        );
        let meta = table_metadata(&mut driver, "classes").unwrap();
        assert_eq!(meta.parents, vec!["rooms", "teachers"]);

        let fk = &meta.column("teacher_id").unwrap().foreign_keys;
        assert_eq!(fk.table, "teachers");
        assert_eq!(fk.column, "teacher_id");
        assert!(meta.column("class_id").unwrap().foreign_keys.is_empty());
    }

    #[test]
    fn sorting_breaks_cycles_by_score() {
        // a.b_id is nullable (edge b->a scores 1); b.a_id is NOT NULL
        // (edge a->b is infinite). Breaking removes b->a, so a comes first.
        let (_tmp, mut driver) = open_fixture(
            r#"
            CREATE TABLE a (
                id   INTEGER PRIMARY KEY,
                b_id INTEGER REFERENCES b(id)
            );
            CREATE TABLE b (
                id   INTEGER PRIMARY KEY,
                a_id INTEGER NOT NULL REFERENCES a(id)
            );
            "#,
        );
        let order = sort_tables(&mut driver, None).unwrap();
        assert_eq!(order, vec!["a", "b"]);
    }

    #[test]
    fn sorting_respects_subset() {
        let (_tmp, mut driver) = open_fixture(
            r#"
            CREATE TABLE parents (id INTEGER PRIMARY KEY);
            CREATE TABLE children (
                id        INTEGER PRIMARY KEY,
                parent_id INTEGER NOT NULL REFERENCES parents(id)
            );
            CREATE TABLE loners (id INTEGER PRIMARY KEY);
            "#,
        );
        let data = prefetch_relations(&mut driver).unwrap();

        let all = sort_from_relations(&data, None);
        let parents_pos = all.iter().position(|t| t == "parents").unwrap();
        let children_pos = all.iter().position(|t| t == "children").unwrap();
        assert!(parents_pos < children_pos);

        // With the parent outside the subset, its edge is ignored.
        let subset = vec!["children".to_string(), "loners".to_string()];
        let order = sort_from_relations(&data, Some(&subset));
        assert_eq!(order, vec!["children", "loners"]);

        assert_eq!(data.parent_count("children"), 1);
        assert_eq!(data.parent_count("loners"), 0);
    }
}
