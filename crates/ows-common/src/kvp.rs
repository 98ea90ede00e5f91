//! Key-value-pair (query string) request parameters.
//!
//! OGC KVP keys are case-insensitive, values may repeat, and empty values
//! count as absent. Multi-query parameters use the `(a,b)(c)` list-of-lists
//! syntax.

use std::collections::BTreeMap;
use std::str::FromStr;

use crate::error::{OwsError, OwsResult};

/// Decoded KVP parameters keyed by upper-cased name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KvpMap {
    params: BTreeMap<String, Vec<String>>,
}

impl KvpMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a raw, percent-encoded query string.
    pub fn parse(query: &str) -> OwsResult<Self> {
        let query = query.trim_start_matches('?');
        let pairs: Vec<(String, String)> = serde_urlencoded::from_str(query)
            .map_err(|e| OwsError::MalformedRequest(format!("Invalid query string: {}", e)))?;
        Ok(Self::from_pairs(pairs))
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut map = Self::new();
        for (key, value) in pairs {
            map.insert(key.as_ref(), value);
        }
        map
    }

    /// Append a value. Empty values are dropped.
    pub fn insert(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        if value.is_empty() {
            return;
        }
        self.params.entry(normalize(key)).or_default().push(value);
    }

    /// Replace all values of `key`.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let key = normalize(key);
        self.params.remove(&key);
        self.insert(&key, value);
    }

    /// Insert `value` only when `key` is absent. Returns whether it was inserted.
    pub fn set_default(&mut self, key: &str, value: impl Into<String>) -> bool {
        if self.contains(key) {
            return false;
        }
        self.insert(key, value);
        self.contains(key)
    }

    /// First value of `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.get_all(key).first().map(String::as_str)
    }

    pub fn get_all(&self, key: &str) -> &[String] {
        self.params
            .get(&normalize(key))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn contains(&self, key: &str) -> bool {
        !self.get_all(key).is_empty()
    }

    pub fn require(&self, key: &str) -> OwsResult<&str> {
        self.get(key).ok_or_else(|| OwsError::missing(key))
    }

    /// Parse the first value of `key`, reporting failures against `key`.
    pub fn parse_value<T: FromStr>(&self, key: &str) -> OwsResult<Option<T>> {
        self.get(key)
            .map(|raw| {
                raw.trim().parse::<T>().map_err(|_| {
                    OwsError::invalid_value(key, format!("'{}' cannot be parsed", raw))
                })
            })
            .transpose()
    }

    pub fn require_value<T: FromStr>(&self, key: &str) -> OwsResult<T> {
        self.parse_value(key)?.ok_or_else(|| OwsError::missing(key))
    }

    /// All values of `key`, each split on commas.
    pub fn list(&self, key: &str) -> Vec<String> {
        self.get_all(key)
            .iter()
            .flat_map(|v| split_list(v))
            .collect()
    }

    /// `(a,b)(c)` style list of lists; a value without parentheses is one list.
    pub fn lists(&self, key: &str) -> Vec<Vec<String>> {
        self.get(key).map(split_lists).unwrap_or_default()
    }

    /// Parenthesised groups without splitting on commas, for values such as
    /// filter documents that contain commas themselves.
    pub fn groups(&self, key: &str) -> Vec<String> {
        self.get(key).map(split_groups).unwrap_or_default()
    }

    /// Case-insensitive boolean flag (`true`/`false`).
    pub fn flag(&self, key: &str) -> OwsResult<Option<bool>> {
        self.get(key)
            .map(|raw| match raw.trim().to_ascii_lowercase().as_str() {
                "true" => Ok(true),
                "false" => Ok(false),
                _ => Err(OwsError::invalid_value(
                    key,
                    format!("'{}' is not a boolean", raw),
                )),
            })
            .transpose()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params
            .iter()
            .flat_map(|(k, vs)| vs.iter().map(move |v| (k.as_str(), v.as_str())))
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Percent-encoded query string, keys in sorted order.
    pub fn to_query_string(&self) -> OwsResult<String> {
        let pairs: Vec<(&str, &str)> = self.iter().collect();
        serde_urlencoded::to_string(pairs)
            .map_err(|e| OwsError::Internal(format!("Cannot encode query string: {}", e)))
    }
}

fn normalize(key: &str) -> String {
    key.trim().to_ascii_uppercase()
}

/// Split a comma separated value, trimming items and dropping empty ones.
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Split `(a,b)(c)` into `[[a, b], [c]]`. `a,b` yields `[[a, b]]`.
pub fn split_lists(value: &str) -> Vec<Vec<String>> {
    split_groups(value)
        .iter()
        .map(|group| split_list(group))
        .collect()
}

/// Split `(x)(y)` into `[x, y]` honouring nested parentheses. A value that
/// does not start with `(` is a single group.
pub fn split_groups(value: &str) -> Vec<String> {
    let value = value.trim();
    if !value.starts_with('(') {
        return vec![value.to_string()];
    }

    let mut groups = Vec::new();
    let mut depth = 0usize;
    let mut current = String::new();
    for c in value.chars() {
        match c {
            '(' => {
                if depth > 0 {
                    current.push(c);
                }
                depth += 1;
            }
            ')' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    groups.push(std::mem::take(&mut current));
                } else {
                    current.push(c);
                }
            }
            _ if depth > 0 => current.push(c),
            _ => {}
        }
    }
    if depth > 0 && !current.is_empty() {
        groups.push(current);
    }
    groups
}
