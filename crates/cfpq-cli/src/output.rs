//! Output formatting utilities

use std::collections::{BTreeMap, BTreeSet};

use cfpq_core::{Algorithm, QueryStats};
use serde::Serialize;

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    Csv,
}

impl From<&str> for OutputFormat {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => Self::Json,
            "csv" => Self::Csv,
            _ => Self::Table,
        }
    }
}

#[derive(Serialize)]
struct PairRow<'a> {
    source: &'a str,
    target: &'a str,
}

#[derive(Serialize)]
struct PairsReport<'a> {
    algorithm: Algorithm,
    pairs: Vec<PairRow<'a>>,
    stats: &'a QueryStats,
}

/// Render a pair answer, sorted by source then target
pub fn format_pairs(
    pairs: &BTreeSet<(String, String)>,
    algorithm: Algorithm,
    stats: &QueryStats,
    format: OutputFormat,
) -> String {
    match format {
        OutputFormat::Json => {
            let report = PairsReport {
                algorithm,
                pairs: pairs
                    .iter()
                    .map(|(s, t)| PairRow { source: s, target: t })
                    .collect(),
                stats,
            };
            format_json(&report)
        }
        OutputFormat::Csv => {
            let mut out = String::from("source,target\n");
            for (s, t) in pairs {
                out.push_str(&format!("{},{}\n", csv_field(s), csv_field(t)));
            }
            out
        }
        OutputFormat::Table => {
            let rows: Vec<[&str; 2]> = pairs.iter().map(|(s, t)| [s.as_str(), t.as_str()]).collect();
            table(["SOURCE", "TARGET"], &rows)
        }
    }
}

/// One-line summary printed under a table
pub fn summary(pairs: usize, algorithm: Algorithm, stats: &QueryStats) -> String {
    format!(
        "{} pairs ({}, {} iterations, {}ms)",
        pairs, algorithm, stats.iterations, stats.elapsed_ms
    )
}

/// Render a per-source answer
pub fn format_per_source(grouped: &BTreeMap<String, BTreeSet<String>>, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => format_json(grouped),
        OutputFormat::Csv => {
            let mut out = String::from("source,target\n");
            for (s, targets) in grouped {
                for t in targets {
                    out.push_str(&format!("{},{}\n", csv_field(s), csv_field(t)));
                }
            }
            out
        }
        OutputFormat::Table => {
            let rows: Vec<[String; 2]> = grouped
                .iter()
                .map(|(s, targets)| {
                    let joined = targets.iter().map(String::as_str).collect::<Vec<_>>().join(", ");
                    [s.clone(), joined]
                })
                .collect();
            let borrowed: Vec<[&str; 2]> = rows.iter().map(|[s, t]| [s.as_str(), t.as_str()]).collect();
            table(["SOURCE", "REACHABLE"], &borrowed)
        }
    }
}

pub fn format_json<T: Serialize + ?Sized>(data: &T) -> String {
    serde_json::to_string_pretty(data).unwrap_or_else(|_| "{}".to_string())
}

fn table(header: [&str; 2], rows: &[[&str; 2]]) -> String {
    let width = rows
        .iter()
        .map(|r| r[0].chars().count())
        .chain(std::iter::once(header[0].len()))
        .max()
        .unwrap_or(0);

    let mut out = format!("{:<width$}  {}\n", header[0], header[1], width = width);
    for [a, b] in rows {
        out.push_str(&format!("{:<width$}  {}\n", a, b, width = width));
    }
    out
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> BTreeSet<(String, String)> {
        [("a", "b"), ("long,name", "c")]
            .into_iter()
            .map(|(s, t)| (s.to_string(), t.to_string()))
            .collect()
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!(OutputFormat::from("JSON"), OutputFormat::Json);
        assert_eq!(OutputFormat::from("csv"), OutputFormat::Csv);
        assert_eq!(OutputFormat::from("whatever"), OutputFormat::Table);
    }

    #[test]
    fn test_csv_escaping() {
        let out = format_pairs(&sample(), Algorithm::Tensor, &QueryStats::default(), OutputFormat::Csv);
        assert_eq!(out, "source,target\na,b\n\"long,name\",c\n");
    }

    #[test]
    fn test_json_report() {
        let out = format_pairs(&sample(), Algorithm::Gll, &QueryStats::default(), OutputFormat::Json);
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["algorithm"], "gll");
        assert_eq!(value["pairs"][0]["source"], "a");
        assert_eq!(value["pairs"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_table_alignment() {
        let out = format_pairs(&sample(), Algorithm::Tensor, &QueryStats::default(), OutputFormat::Table);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "SOURCE     TARGET");
        assert_eq!(lines[1], "a          b");
        assert_eq!(lines[2], "long,name  c");
        assert_eq!(lines.len(), 3);
        assert!(summary(2, Algorithm::Tensor, &QueryStats::default()).starts_with("2 pairs (tensor, 0 iterations"));
    }
}
