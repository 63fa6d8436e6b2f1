//! The generator registry: per-kind validation and value streams.

use std::collections::HashMap;
use std::sync::Arc;

use rand::Rng;
use rand::distr::Distribution;

use datasmith_core::metadata::ColumnMetadata;
use datasmith_core::spec::{ColumnSpec, GeneratorKind};
use datasmith_db::DbError;
use datasmith_script::{EvalContext, Program, ScriptError};

use crate::caps::{cap_numeric, cap_string, format_numeric};
use crate::provider::{FakeProvider, FakeValue};

/// Errors raised while validating specs or generating values.
#[derive(Debug, thiserror::Error)]
pub enum GenError {
    #[error("unknown fake-value method '{0}'")]
    UnknownMethod(String),

    #[error("invalid regex pattern: {0}")]
    BadPattern(String),

    #[error(transparent)]
    Script(#[from] ScriptError),

    #[error("column '{column}' has no foreign key to sample from")]
    MissingForeignKey { column: String },

    #[error("invalid SQL definition: scale ({scale}) > precision ({precision})")]
    ScaleExceedsPrecision { scale: u32, precision: u32 },

    #[error("column '{column}' not found in table metadata")]
    UnknownColumn { column: String },

    #[error("generator kind '{0}' does not produce values")]
    Passive(GeneratorKind),

    #[error(transparent)]
    Db(#[from] DbError),

    #[error("generation cancelled")]
    Cancelled,

    #[error("no generated packet is cached")]
    NoCache,

    #[error("no cached packet with id '{0}'")]
    PacketMismatch(String),

    #[error("page {page} out of range (total {total})")]
    PageOutOfRange { page: usize, total: usize },
}

/// The per-row view a stream may read: previously filled columns of the
/// current row.
pub struct RowContext<'a> {
    pub columns: &'a HashMap<String, Option<String>>,
}

/// An infinite per-column value producer, pulled once per candidate.
pub trait ValueStream: Send {
    fn next_value(&mut self, row: &RowContext<'_>) -> Result<Option<String>, GenError>;
}

/// Syntactically checks a generator spec against its column metadata.
///
/// Passive kinds are not validated (they never run); callers skip them
/// before getting here.
pub fn validate(spec: &ColumnSpec, meta: &ColumnMetadata) -> Result<(), GenError> {
    if let (Some(precision), Some(scale)) = (meta.precision, meta.scale) {
        if scale > precision {
            return Err(GenError::ScaleExceedsPrecision { scale, precision });
        }
    }
    match spec.kind {
        GeneratorKind::Faker => {
            let method = spec.generator.trim();
            if !FakeProvider::is_method(method) {
                return Err(GenError::UnknownMethod(method.to_string()));
            }
            Ok(())
        }
        GeneratorKind::Regex => {
            compile_sampler(&spec.generator)?;
            Ok(())
        }
        GeneratorKind::Script => {
            datasmith_script::parse(&spec.generator)?;
            Ok(())
        }
        GeneratorKind::Foreign => {
            if meta.foreign_keys.is_empty() {
                return Err(GenError::MissingForeignKey {
                    column: spec.name.clone(),
                });
            }
            Ok(())
        }
        GeneratorKind::Constant => Ok(()),
        kind => Err(GenError::Passive(kind)),
    }
}

/// Builds the value stream for a validated spec.
///
/// `foreign` streams need their sampled value set handed in (it comes from
/// the per-job cache, which the populator owns).
pub fn make_stream(
    spec: &ColumnSpec,
    meta: &ColumnMetadata,
    fk_values: Option<Arc<Vec<String>>>,
) -> Result<Box<dyn ValueStream>, GenError> {
    Ok(match spec.kind {
        GeneratorKind::Faker => Box::new(FakerStream {
            method: spec.generator.trim().to_string(),
            length: meta.length,
            precision: meta.precision,
            scale: meta.scale,
        }),
        GeneratorKind::Regex => Box::new(RegexStream {
            sampler: compile_sampler(&spec.generator)?,
        }),
        GeneratorKind::Foreign => Box::new(ForeignStream {
            values: fk_values.unwrap_or_default(),
        }),
        GeneratorKind::Constant => Box::new(ConstantStream {
            value: spec.generator.clone(),
        }),
        GeneratorKind::Script => Box::new(ScriptStream {
            program: datasmith_script::parse(&spec.generator)?,
        }),
        kind => return Err(GenError::Passive(kind)),
    })
}

/// Maximum expansion of unbounded repetitions (`*`, `+`) when sampling.
const MAX_REPEAT: u32 = 20;

/// Compiles a user pattern into a sampler.
///
/// The pattern is first checked with the regex crate proper, then handed to
/// the sampler with the `^`/`$` anchors stripped (anchors constrain
/// matching, not sampling).
fn compile_sampler(pattern: &str) -> Result<rand_regex::Regex, GenError> {
    regex::Regex::new(pattern).map_err(|e| GenError::BadPattern(e.to_string()))?;
    let mut stripped = pattern;
    if let Some(rest) = stripped.strip_prefix('^') {
        stripped = rest;
    }
    if let Some(rest) = stripped.strip_suffix('$') {
        if !rest.ends_with('\\') {
            stripped = rest;
        }
    }
    rand_regex::Regex::compile(stripped, MAX_REPEAT)
        .map_err(|e| GenError::BadPattern(e.to_string()))
}

// ---------------------------------------------------------------------------
// Streams
// ---------------------------------------------------------------------------

struct FakerStream {
    method: String,
    length: Option<u32>,
    precision: Option<u32>,
    scale: Option<u32>,
}

impl ValueStream for FakerStream {
    fn next_value(&mut self, _row: &RowContext<'_>) -> Result<Option<String>, GenError> {
        let value = FakeProvider::call(&self.method)
            .ok_or_else(|| GenError::UnknownMethod(self.method.clone()))?;
        Ok(Some(match value {
            FakeValue::Str(s) => cap_string(s, self.length),
            FakeValue::Int(n) => {
                format_numeric(cap_numeric(n as f64, self.precision, self.scale))
            }
            FakeValue::Float(f) => format_numeric(cap_numeric(f, self.precision, self.scale)),
        }))
    }
}

struct RegexStream {
    sampler: rand_regex::Regex,
}

impl ValueStream for RegexStream {
    fn next_value(&mut self, _row: &RowContext<'_>) -> Result<Option<String>, GenError> {
        let sample: String = self.sampler.sample(&mut rand::rng());
        Ok(Some(sample))
    }
}

struct ForeignStream {
    values: Arc<Vec<String>>,
}

impl ValueStream for ForeignStream {
    fn next_value(&mut self, _row: &RowContext<'_>) -> Result<Option<String>, GenError> {
        if self.values.is_empty() {
            return Ok(None);
        }
        let idx = rand::rng().random_range(0..self.values.len());
        Ok(Some(self.values[idx].clone()))
    }
}

struct ConstantStream {
    value: String,
}

impl ValueStream for ConstantStream {
    fn next_value(&mut self, _row: &RowContext<'_>) -> Result<Option<String>, GenError> {
        Ok(Some(self.value.clone()))
    }
}

struct ScriptStream {
    program: Program,
}

impl ValueStream for ScriptStream {
    fn next_value(&mut self, row: &RowContext<'_>) -> Result<Option<String>, GenError> {
        let mut fake = |method: &str| FakeProvider::call(method).map(FakeValue::into_script_value);
        let mut ctx = EvalContext {
            columns: row.columns,
            fake: &mut fake,
        };
        let value = self.program.eval(&mut ctx)?;
        Ok(value.into_output())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datasmith_core::metadata::ForeignKeyRef;

    fn meta(name: &str) -> ColumnMetadata {
        ColumnMetadata::text(name)
    }

    fn row<'a>(columns: &'a HashMap<String, Option<String>>) -> RowContext<'a> {
        RowContext { columns }
    }

    #[test]
    fn validate_rejects_unknown_faker_method() {
        let spec = ColumnSpec::new("x", GeneratorKind::Faker, "flux_capacitor");
        let err = validate(&spec, &meta("x")).unwrap_err();
        assert!(matches!(err, GenError::UnknownMethod(_)));

        let ok = ColumnSpec::new("x", GeneratorKind::Faker, "name");
        validate(&ok, &meta("x")).unwrap();
    }

    #[test]
    fn validate_rejects_bad_regex_and_scale() {
        let spec = ColumnSpec::new("x", GeneratorKind::Regex, "[unclosed");
        assert!(matches!(
            validate(&spec, &meta("x")).unwrap_err(),
            GenError::BadPattern(_)
        ));

        let mut bad_meta = meta("x");
        bad_meta.precision = Some(2);
        bad_meta.scale = Some(5);
        let spec = ColumnSpec::new("x", GeneratorKind::Faker, "random_int");
        assert!(matches!(
            validate(&spec, &bad_meta).unwrap_err(),
            GenError::ScaleExceedsPrecision { .. }
        ));
    }

    #[test]
    fn validate_foreign_requires_fk_metadata() {
        let spec = ColumnSpec::new("teacher_id", GeneratorKind::Foreign, "");
        assert!(matches!(
            validate(&spec, &meta("teacher_id")).unwrap_err(),
            GenError::MissingForeignKey { .. }
        ));

        let mut fk_meta = meta("teacher_id");
        fk_meta.foreign_keys = ForeignKeyRef::new("teachers", "teacher_id");
        validate(&spec, &fk_meta).unwrap();
    }

    #[test]
    fn regex_stream_matches_its_pattern() {
        let pattern = "^(CS|MECH|CIVIL|IT)$";
        let spec = ColumnSpec::new("dept", GeneratorKind::Regex, pattern);
        let mut stream = make_stream(&spec, &meta("dept"), None).unwrap();
        let matcher = regex::Regex::new(pattern).unwrap();

        let columns = HashMap::new();
        for _ in 0..30 {
            let value = stream.next_value(&row(&columns)).unwrap().unwrap();
            assert!(matcher.is_match(&value), "'{value}' escaped the pattern");
        }
    }

    #[test]
    fn faker_stream_caps_by_length() {
        let spec = ColumnSpec::new("nick", GeneratorKind::Faker, "name");
        let mut short = meta("nick");
        short.length = Some(3);
        let mut stream = make_stream(&spec, &short, None).unwrap();
        let columns = HashMap::new();
        let value = stream.next_value(&row(&columns)).unwrap().unwrap();
        assert!(value.chars().count() <= 3);
    }

    #[test]
    fn foreign_stream_samples_from_given_values() {
        let spec = ColumnSpec::new("teacher_id", GeneratorKind::Foreign, "");
        let values = Arc::new(vec!["1".to_string(), "2".to_string(), "3".to_string()]);
        let mut stream = make_stream(&spec, &meta("teacher_id"), Some(values)).unwrap();
        let columns = HashMap::new();
        for _ in 0..20 {
            let value = stream.next_value(&row(&columns)).unwrap().unwrap();
            assert!(["1", "2", "3"].contains(&value.as_str()));
        }
    }

    #[test]
    fn constant_stream_is_verbatim() {
        let spec = ColumnSpec::new("status", GeneratorKind::Constant, "active");
        let mut stream = make_stream(&spec, &meta("status"), None).unwrap();
        let columns = HashMap::new();
        assert_eq!(
            stream.next_value(&row(&columns)).unwrap().as_deref(),
            Some("active")
        );
    }

    #[test]
    fn script_stream_reads_row_and_fake() {
        let spec = ColumnSpec::new(
            "badge",
            GeneratorKind::Script,
            "concat(columns['dept'], '-', fake('random_digit'))",
        );
        let mut stream = make_stream(&spec, &meta("badge"), None).unwrap();
        let mut columns = HashMap::new();
        columns.insert("dept".to_string(), Some("CS".to_string()));
        let value = stream.next_value(&row(&columns)).unwrap().unwrap();
        assert!(value.starts_with("CS-"));
    }
}
