//! The fake-value provider: a fixed registry of named value generators.
//!
//! Each method produces one deterministic-but-random value per call from
//! the bundled word tables. The registry backs the `faker` generator kind,
//! the `fake('method')` script builtin and the `get_gen_methods` command.

use chrono::{Datelike, Days, Local};
use rand::Rng;
use uuid::Uuid;

use crate::datasets;

/// A raw provider value, before stringification and capping.
#[derive(Debug, Clone, PartialEq)]
pub enum FakeValue {
    Str(String),
    Int(i64),
    Float(f64),
}

impl FakeValue {
    pub fn into_string(self) -> String {
        match self {
            Self::Str(s) => s,
            Self::Int(n) => n.to_string(),
            Self::Float(f) => crate::caps::format_numeric(f),
        }
    }

    /// Bridges provider output into the script engine's value space.
    pub fn into_script_value(self) -> datasmith_script::Value {
        match self {
            Self::Str(s) => datasmith_script::Value::Str(s),
            Self::Int(n) => datasmith_script::Value::Int(n),
            Self::Float(f) => datasmith_script::Value::Float(f),
        }
    }
}

type MethodFn = fn() -> FakeValue;

/// Name -> generator table, kept sorted so `methods()` needs no extra work.
const METHODS: &[(&str, MethodFn)] = &[
    ("address", address),
    ("boolean", boolean),
    ("city", city),
    ("color_name", color_name),
    ("company", company),
    ("country", country),
    ("date", date),
    ("date_of_birth", date_of_birth),
    ("date_time", date_time),
    ("email", email),
    ("first_name", first_name),
    ("job", job),
    ("last_name", last_name),
    ("name", full_name),
    ("paragraph", paragraph),
    ("phone_number", phone_number),
    ("postcode", postcode),
    ("random_digit", random_digit),
    ("random_int", random_int),
    ("random_number", random_number),
    ("sentence", sentence),
    ("text", text),
    ("time", time),
    ("url", url),
    ("user_name", user_name),
    ("uuid4", uuid4),
    ("word", word),
    ("year", year),
];

/// Stateless facade over the method registry.
pub struct FakeProvider;

impl FakeProvider {
    /// Sorted names of every callable method.
    pub fn methods() -> Vec<&'static str> {
        METHODS.iter().map(|(name, _)| *name).collect()
    }

    /// Returns `true` if `method` names a registered generator.
    pub fn is_method(method: &str) -> bool {
        METHODS.binary_search_by(|(name, _)| name.cmp(&method)).is_ok()
    }

    /// Invokes a method by name.
    pub fn call(method: &str) -> Option<FakeValue> {
        METHODS
            .binary_search_by(|(name, _)| name.cmp(&method))
            .ok()
            .map(|idx| (METHODS[idx].1)())
    }
}

// ---------------------------------------------------------------------------
// Method implementations
// ---------------------------------------------------------------------------

fn pick(table: &'static [&'static str]) -> &'static str {
    table[rand::rng().random_range(0..table.len())]
}

fn first_name() -> FakeValue {
    FakeValue::Str(pick(datasets::FIRST_NAMES).to_string())
}

fn last_name() -> FakeValue {
    FakeValue::Str(pick(datasets::LAST_NAMES).to_string())
}

fn full_name() -> FakeValue {
    FakeValue::Str(format!(
        "{} {}",
        pick(datasets::FIRST_NAMES),
        pick(datasets::LAST_NAMES)
    ))
}

fn email() -> FakeValue {
    let mut rng = rand::rng();
    FakeValue::Str(format!(
        "{}.{}{}@{}",
        pick(datasets::FIRST_NAMES).to_lowercase(),
        pick(datasets::LAST_NAMES).to_lowercase(),
        rng.random_range(1..1000),
        pick(datasets::EMAIL_DOMAINS),
    ))
}

fn user_name() -> FakeValue {
    let mut rng = rand::rng();
    FakeValue::Str(format!(
        "{}{}",
        pick(datasets::FIRST_NAMES).to_lowercase(),
        rng.random_range(10..10_000),
    ))
}

fn phone_number() -> FakeValue {
    let mut rng = rand::rng();
    FakeValue::Str(format!(
        "({}) {}-{:04}",
        rng.random_range(200..1000),
        rng.random_range(200..1000),
        rng.random_range(0..10_000),
    ))
}

fn address() -> FakeValue {
    let mut rng = rand::rng();
    FakeValue::Str(format!(
        "{} {} {}",
        rng.random_range(1..10_000),
        pick(datasets::LAST_NAMES),
        pick(datasets::STREET_SUFFIXES),
    ))
}

fn city() -> FakeValue {
    FakeValue::Str(pick(datasets::CITIES).to_string())
}

fn country() -> FakeValue {
    FakeValue::Str(pick(datasets::COUNTRIES).to_string())
}

fn postcode() -> FakeValue {
    FakeValue::Str(format!("{:05}", rand::rng().random_range(0..100_000)))
}

fn company() -> FakeValue {
    FakeValue::Str(format!(
        "{} {}",
        pick(datasets::COMPANY_WORDS),
        pick(datasets::COMPANY_SUFFIXES)
    ))
}

fn job() -> FakeValue {
    FakeValue::Str(pick(datasets::JOB_TITLES).to_string())
}

fn color_name() -> FakeValue {
    FakeValue::Str(pick(datasets::COLORS).to_string())
}

fn url() -> FakeValue {
    FakeValue::Str(format!(
        "https://{}.{}/{}",
        pick(datasets::COMPANY_WORDS).to_lowercase(),
        pick(datasets::SITE_TLDS),
        pick(datasets::WORDS),
    ))
}

fn word() -> FakeValue {
    FakeValue::Str(pick(datasets::WORDS).to_string())
}

fn sentence() -> FakeValue {
    let mut rng = rand::rng();
    let count = rng.random_range(6..=12);
    let mut words: Vec<&str> = (0..count).map(|_| pick(datasets::WORDS)).collect();
    let mut first = words[0].to_string();
    if let Some(c) = first.get_mut(0..1) {
        c.make_ascii_uppercase();
    }
    let rest = words.split_off(1).join(" ");
    FakeValue::Str(format!("{first} {rest}."))
}

fn paragraph() -> FakeValue {
    let sentences: Vec<String> = (0..3)
        .map(|_| match sentence() {
            FakeValue::Str(s) => s,
            _ => unreachable!("sentence() yields strings"),
        })
        .collect();
    FakeValue::Str(sentences.join(" "))
}

fn text() -> FakeValue {
    paragraph()
}

fn boolean() -> FakeValue {
    FakeValue::Str(rand::rng().random_bool(0.5).to_string())
}

fn random_digit() -> FakeValue {
    FakeValue::Int(rand::rng().random_range(0..10))
}

fn random_int() -> FakeValue {
    FakeValue::Int(rand::rng().random_range(0..10_000))
}

fn random_number() -> FakeValue {
    FakeValue::Int(rand::rng().random_range(0..1_000_000_000))
}

fn uuid4() -> FakeValue {
    FakeValue::Str(Uuid::new_v4().to_string())
}

fn date() -> FakeValue {
    let days = rand::rng().random_range(0..10_950);
    let day = Local::now().date_naive() - Days::new(days);
    FakeValue::Str(day.format("%Y-%m-%d").to_string())
}

fn date_of_birth() -> FakeValue {
    let days = rand::rng().random_range(6_570..29_200);
    let day = Local::now().date_naive() - Days::new(days);
    FakeValue::Str(day.format("%Y-%m-%d").to_string())
}

fn time() -> FakeValue {
    let mut rng = rand::rng();
    FakeValue::Str(format!(
        "{:02}:{:02}:{:02}",
        rng.random_range(0..24),
        rng.random_range(0..60),
        rng.random_range(0..60),
    ))
}

fn date_time() -> FakeValue {
    let date = match date() {
        FakeValue::Str(s) => s,
        _ => unreachable!("date() yields strings"),
    };
    let time = match time() {
        FakeValue::Str(s) => s,
        _ => unreachable!("time() yields strings"),
    };
    FakeValue::Str(format!("{date} {time}"))
}

fn year() -> FakeValue {
    let current = Local::now().year() as i64;
    FakeValue::Int(rand::rng().random_range(1970..=current))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_is_sorted_and_searchable() {
        let names = FakeProvider::methods();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted, "method table must stay sorted for binary search");

        for name in names {
            assert!(FakeProvider::is_method(name));
            assert!(FakeProvider::call(name).is_some());
        }
        assert!(!FakeProvider::is_method("flux_capacitor"));
        assert!(FakeProvider::call("flux_capacitor").is_none());
    }

    #[test]
    fn values_stringify() {
        let name = FakeProvider::call("name").unwrap().into_string();
        assert!(name.contains(' '));

        let digit = FakeProvider::call("random_digit").unwrap().into_string();
        let parsed: i64 = digit.parse().unwrap();
        assert!((0..10).contains(&parsed));
    }

    #[test]
    fn date_shapes() {
        let date = FakeProvider::call("date").unwrap().into_string();
        assert_eq!(date.len(), 10);
        assert_eq!(&date[4..5], "-");

        let dt = FakeProvider::call("date_time").unwrap().into_string();
        assert_eq!(dt.len(), 19);
    }
}
