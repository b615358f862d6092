use std::fmt;

use itertools::Itertools;

/// Named measurement results, in the order the events were requested.
///
/// # Examples
///
/// ```rust
/// use perf_counters::result::CounterResult;
///
/// let mut result = CounterResult::default();
/// result.push("instructions", 2000.0);
/// result.push("cycles", 1000.0);
///
/// assert_eq!(result.get("cycles"), Some(1000.0));
/// assert_eq!(result.to_csv(',', false), "instructions,2000\ncycles,1000");
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CounterResult {
    results: Vec<(String, f64)>,
}

impl CounterResult {
    pub fn new(results: Vec<(String, f64)>) -> Self {
        Self { results }
    }

    pub fn push(&mut self, name: impl Into<String>, value: f64) {
        self.results.push((name.into(), value));
    }

    /// Value of the first entry named `name`.
    pub fn get(&self, name: &str) -> Option<f64> {
        self.results
            .iter()
            .find(|(it, _)| it == name)
            .map(|(_, value)| *value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.results.iter().any(|(it, _)| it == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.results.iter().map(|(name, value)| (name.as_str(), *value))
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn into_inner(self) -> Vec<(String, f64)> {
        self.results
    }

    /// `{"name": value, ...}`, non-finite values are written as `null`.
    pub fn to_json(&self) -> String {
        let body = self
            .results
            .iter()
            .map(|(name, value)| format!("\"{}\": {}", escape_json(name), json_number(*value)))
            .join(", ");
        format!("{{{body}}}")
    }

    pub fn to_csv(&self, delimiter: char, header: bool) -> String {
        let mut rows = self
            .results
            .iter()
            .map(|(name, value)| format!("{name}{delimiter}{value}"));
        if header {
            std::iter::once(format!("counter{delimiter}value"))
                .chain(rows)
                .join("\n")
        } else {
            rows.join("\n")
        }
    }

    /// Two-column table with a header row.
    pub fn to_table(&self) -> String {
        let rows: Vec<_> = self
            .results
            .iter()
            .map(|(name, value)| (name.as_str(), format_value(*value)))
            .collect();

        let name_width = rows
            .iter()
            .map(|(name, _)| name.chars().count())
            .chain(Some("counter".len()))
            .max()
            .unwrap_or_default();
        let value_width = rows
            .iter()
            .map(|(_, value)| value.len())
            .chain(Some("value".len()))
            .max()
            .unwrap_or_default();

        let rule = format!(
            "+-{}-+-{}-+",
            "-".repeat(name_width),
            "-".repeat(value_width)
        );
        let line = |name: &str, value: &str| format!("| {name:<name_width$} | {value:>value_width$} |");

        std::iter::once(rule.clone())
            .chain(Some(line("counter", "value")))
            .chain(Some(rule.clone()))
            .chain(rows.iter().map(|(name, value)| line(name, value)))
            .chain(Some(rule))
            .join("\n")
    }
}

impl fmt::Display for CounterResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_table())
    }
}

impl FromIterator<(String, f64)> for CounterResult {
    fn from_iter<T: IntoIterator<Item = (String, f64)>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl IntoIterator for CounterResult {
    type Item = (String, f64);
    type IntoIter = std::vec::IntoIter<(String, f64)>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.into_iter()
    }
}

fn format_value(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.0}")
    } else {
        format!("{value:.3}")
    }
}

fn json_number(value: f64) -> String {
    if value.is_finite() {
        value.to_string()
    } else {
        "null".to_string()
    }
}

fn escape_json(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out
}
