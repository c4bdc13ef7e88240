//! Ordered key/value selections and expansion of their value specifications.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::{Days, NaiveDate};

use crate::error::ConfigurationError;

const RANGE_TO: &str = "to";
const RANGE_BY: &str = "by";
const DATE_KEY: &str = "date";

/// An ordered mapping from key to one or more values.
///
/// Insertion order is preserved; it is also the order of keys in every [`Selection`] produced by
/// [`Part::resolve`](crate::part::Part::resolve).
///
/// Values are held as strings. A value list may be a range specification
/// (`["0", "to", "18", "by", "6"]`), which [`Selection::expand`] turns into explicit values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Selection {
    entries: Vec<(String, Vec<String>)>,
}

impl Selection {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the values of `key`, replacing any previous values but keeping its position.
    #[must_use]
    pub fn with<K, I, V>(mut self, key: K, values: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = V>,
        V: ToString,
    {
        self.insert(key, values);
        self
    }

    /// Set the values of `key` from a `/`-separated specification such as `"0/to/18/by/6"`.
    #[must_use]
    pub fn with_spec(self, key: impl Into<String>, spec: &str) -> Self {
        self.with(key, spec.split('/').map(str::trim))
    }

    /// Set the values of `key`, replacing any previous values but keeping its position.
    pub fn insert<K, I, V>(&mut self, key: K, values: I)
    where
        K: Into<String>,
        I: IntoIterator<Item = V>,
        V: ToString,
    {
        let key = key.into();
        let values = values.into_iter().map(|v| v.to_string()).collect();
        if let Some(entry) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            entry.1 = values;
        } else {
            self.entries.push((key, values));
        }
    }

    /// Parse a request string of comma-separated `key=value[/value...]` entries.
    ///
    /// Keys are lower-cased and surrounding whitespace is trimmed from keys and values.
    ///
    /// # Errors
    /// Returns [`ConfigurationError::MalformedRequest`] for empty entries (e.g. a trailing comma),
    /// entries without exactly one `=` (e.g. a missing comma), empty keys or values, and keys that
    /// appear more than once.
    pub fn from_request(request: &str) -> Result<Self, ConfigurationError> {
        let malformed = |reason: String| ConfigurationError::MalformedRequest {
            request: request.to_string(),
            reason,
        };
        if request.trim().is_empty() {
            return Err(malformed("request is empty".into()));
        }

        let mut selection = Self::new();
        for (position, entry) in request.split(',').enumerate() {
            let entry = entry.trim();
            if entry.is_empty() {
                return Err(malformed(format!("entry {position} is empty")));
            }
            let mut split = entry.split('=');
            let (Some(key), Some(value), None) = (split.next(), split.next(), split.next()) else {
                return Err(malformed(format!(
                    "entry {entry:?} is not of the form key=value"
                )));
            };
            let key = key.trim().to_lowercase();
            let value = value.trim();
            if key.is_empty() || value.is_empty() {
                return Err(malformed(format!("entry {entry:?} has an empty key or value")));
            }
            if selection.contains_key(&key) {
                return Err(malformed(format!("key {key} is given more than once")));
            }
            selection = selection.with_spec(key, value);
        }
        Ok(selection)
    }

    /// The values of `key`, if present.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_slice())
    }

    /// The single value of `key`, if present and single-valued.
    #[must_use]
    pub fn value(&self, key: &str) -> Option<&str> {
        match self.get(key)? {
            [value] => Some(value.as_str()),
            _ => None,
        }
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether every key carries exactly one value.
    #[must_use]
    pub fn is_single_valued(&self) -> bool {
        self.entries.iter().all(|(_, v)| v.len() == 1)
    }

    /// Expand every value specification into an explicit, ordered list of values.
    ///
    /// # Errors
    /// Returns a [`ConfigurationError`] if a key has no values, a range is malformed, or a key
    /// lists the same value twice.
    pub fn expand(&self) -> Result<Self, ConfigurationError> {
        let entries = self
            .entries
            .iter()
            .map(|(key, values)| Ok((key.clone(), expand_values(key, values)?)))
            .collect::<Result<_, ConfigurationError>>()?;
        Ok(Self { entries })
    }

    /// A rendering independent of key order, suitable as a lookup key.
    #[must_use]
    pub fn canonical(&self) -> String {
        let mut entries: Vec<_> = self.entries.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        render(entries.into_iter())
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&render(self.entries.iter()))
    }
}

impl FromStr for Selection {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_request(s)
    }
}

fn render<'a>(entries: impl Iterator<Item = &'a (String, Vec<String>)>) -> String {
    entries
        .map(|(k, v)| format!("{k}={}", v.join("/")))
        .collect::<Vec<_>>()
        .join(",")
}

/// Expand one key's value list.
fn expand_values(key: &str, values: &[String]) -> Result<Vec<String>, ConfigurationError> {
    if values.is_empty() {
        return Err(ConfigurationError::EmptyValues { key: key.into() });
    }
    let malformed = |reason: &str| ConfigurationError::MalformedRange {
        key: key.into(),
        spec: values.join("/"),
        reason: reason.into(),
    };
    let is_keyword = |v: &String, keyword: &str| v.eq_ignore_ascii_case(keyword);

    let expanded = if values.iter().any(|v| is_keyword(v, RANGE_TO)) {
        let (first, last, step) = match values {
            [first, to, last] if is_keyword(to, RANGE_TO) => (first, last, None),
            [first, to, last, by, step] if is_keyword(to, RANGE_TO) && is_keyword(by, RANGE_BY) => {
                (first, last, Some(step))
            }
            _ => return Err(malformed("expected first/to/last[/by/step]")),
        };
        let step = match step {
            None => 1,
            Some(step) => match step.parse::<u64>() {
                Ok(0) | Err(_) => return Err(malformed("step must be a positive integer")),
                Ok(step) => step,
            },
        };
        expand_range(key, first, last, step).map_err(malformed)?
    } else if values.iter().any(|v| is_keyword(v, RANGE_BY)) {
        return Err(malformed("`by` is only valid in a first/to/last/by/step range"));
    } else {
        values.iter().map(|value| normalize_date(key, value)).collect()
    };

    let mut seen = HashSet::with_capacity(expanded.len());
    for value in &expanded {
        if value.is_empty() {
            return Err(ConfigurationError::EmptyValues { key: key.into() });
        }
        if !seen.insert(value.as_str()) {
            return Err(ConfigurationError::DuplicateValue {
                key: key.into(),
                value: value.clone(),
            });
        }
    }
    Ok(expanded)
}

/// Dates are always passed on as `YYYYMMDD`.
fn normalize_date(key: &str, value: &str) -> String {
    match parse_date(key, value) {
        Some(date) => format_date(date),
        None => value.to_string(),
    }
}

fn format_date(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}

fn expand_range(key: &str, first: &str, last: &str, step: u64) -> Result<Vec<String>, &'static str> {
    if let (Some(first), Some(last)) = (parse_date(key, first), parse_date(key, last)) {
        if first > last {
            return Err("range bounds are descending");
        }
        let mut out = Vec::new();
        let mut date = first;
        while date <= last {
            out.push(format_date(date));
            date = match date.checked_add_days(Days::new(step)) {
                Some(next) => next,
                None => break,
            };
        }
        return Ok(out);
    }

    let (Ok(lo), Ok(hi)) = (first.parse::<i64>(), last.parse::<i64>()) else {
        return Err("range bounds must be integers or dates");
    };
    if lo > hi {
        return Err("range bounds are descending");
    }
    let width = zero_padded_width(first);
    let step = i64::try_from(step).map_err(|_| "step is too large")?;
    let mut out = Vec::new();
    let mut value = lo;
    while value <= hi {
        out.push(format!("{value:0width$}"));
        value = match value.checked_add(step) {
            Some(next) => next,
            None => break,
        };
    }
    Ok(out)
}

/// Dates are `YYYY-MM-DD` anywhere, or `YYYYMMDD` for the `date` key.
fn parse_date(key: &str, value: &str) -> Option<NaiveDate> {
    if value.len() == 10 && value.as_bytes()[4] == b'-' {
        NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
    } else if key == DATE_KEY && value.len() == 8 && value.bytes().all(|b| b.is_ascii_digit()) {
        NaiveDate::parse_from_str(value, "%Y%m%d").ok()
    } else {
        None
    }
}

fn zero_padded_width(bound: &str) -> usize {
    if bound.len() > 1 && bound.starts_with('0') {
        bound.len()
    } else {
        0
    }
}
