//! Metrics Line Extraction
//!
//! Every solver prints one summary line on stdout:
//!
//! ```text
//! NQUEENS_METRICS [tokens...] n=<int> [tokens...] solutions=<decimal> [tokens...] nodes=<int>
//! ```
//!
//! The three fields must appear in that order, each as its own
//! whitespace-separated token. Anything else on the line is ignored. When
//! several lines qualify the last one wins, so solvers may print progress
//! lines before their final summary.

use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

/// Marker token that introduces a metrics line
pub const METRICS_MARKER: &str = "NQUEENS_METRICS";

/// Values recovered from a metrics line
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricsTriple {
    /// Board size the solver reports having solved
    pub size: u32,
    /// Solution count (printed as a decimal by some solvers)
    pub solutions: f64,
    /// Internal node/operation count
    pub nodes: u64,
}

/// Errors raised while extracting metrics
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MetricsError {
    #[error("Failed to parse NQUEENS_METRICS from program output")]
    MissingLine,
}

fn metrics_regex() -> &'static Regex {
    static METRICS_RE: OnceLock<Regex> = OnceLock::new();
    // Safety: this regex literal is guaranteed to compile
    METRICS_RE.get_or_init(|| {
        Regex::new(concat!(
            r"(?:^|\s)NQUEENS_METRICS",
            r"(?:\s.*?)?\sn=(?P<size>\d+)",
            r"(?:\s.*?)?\ssolutions=(?P<solutions>\d+(?:\.\d*)?(?:[eE][+-]?\d+)?|\.\d+)",
            r"(?:\s.*?)?\snodes=(?P<nodes>\d+)",
            r"(?:\s|$)",
        ))
        .unwrap()
    })
}

/// Parse a single line; `None` if it is not a well-formed metrics line.
pub fn parse_metrics_line(line: &str) -> Option<MetricsTriple> {
    let caps = metrics_regex().captures(line)?;
    let size: u32 = caps["size"].parse().ok()?;
    let solutions: f64 = caps["solutions"].parse().ok()?;
    let nodes: u64 = caps["nodes"].parse().ok()?;
    if size == 0 {
        return None;
    }
    Some(MetricsTriple {
        size,
        solutions,
        nodes,
    })
}

/// Extract the metrics triple from a program's full standard output.
///
/// Returns the triple from the last qualifying line. Never falls back to
/// defaults: no qualifying line is [`MetricsError::MissingLine`].
pub fn extract_metrics(stdout: &str) -> Result<MetricsTriple, MetricsError> {
    stdout
        .lines()
        .filter_map(parse_metrics_line)
        .last()
        .ok_or(MetricsError::MissingLine)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_line() {
        let triple = extract_metrics("NQUEENS_METRICS n=8 solutions=92 nodes=2057\n").unwrap();
        assert_eq!(
            triple,
            MetricsTriple {
                size: 8,
                solutions: 92.0,
                nodes: 2057
            }
        );
    }

    #[test]
    fn test_interleaved_tokens_and_surrounding_output() {
        let stdout = "\
Building BDD for 10 queens...
[info] NQUEENS_METRICS impl=sylvan n=10 workers=4 solutions=724.000000 time=0.31s nodes=88231 peak=12
done
";
        let triple = extract_metrics(stdout).unwrap();
        assert_eq!(triple.size, 10);
        assert_eq!(triple.solutions, 724.0);
        assert_eq!(triple.nodes, 88231);
    }

    #[test]
    fn test_last_line_wins() {
        let stdout = "\
NQUEENS_METRICS n=4 solutions=0 nodes=1
NQUEENS_METRICS n=4 solutions=1 nodes=5
progress 90%
NQUEENS_METRICS n=4 solutions=2 nodes=10
";
        let triple = extract_metrics(stdout).unwrap();
        assert_eq!(triple.solutions, 2.0);
        assert_eq!(triple.nodes, 10);
    }

    #[test]
    fn test_malformed_later_line_does_not_shadow_valid_one() {
        let stdout = "\
NQUEENS_METRICS n=6 solutions=4 nodes=99
NQUEENS_METRICS n=6 nodes=99
";
        assert_eq!(extract_metrics(stdout).unwrap().nodes, 99);
    }

    #[test]
    fn test_no_line_fails() {
        assert_eq!(extract_metrics("hello world\n"), Err(MetricsError::MissingLine));
        assert_eq!(extract_metrics(""), Err(MetricsError::MissingLine));
    }

    #[test]
    fn test_fields_out_of_order_rejected() {
        assert_eq!(
            extract_metrics("NQUEENS_METRICS solutions=2 n=4 nodes=10"),
            Err(MetricsError::MissingLine)
        );
        assert_eq!(
            extract_metrics("NQUEENS_METRICS n=4 nodes=10 solutions=2"),
            Err(MetricsError::MissingLine)
        );
    }

    #[test]
    fn test_marker_required() {
        assert_eq!(
            extract_metrics("METRICS n=4 solutions=2 nodes=10"),
            Err(MetricsError::MissingLine)
        );
        assert_eq!(
            extract_metrics("XNQUEENS_METRICS n=4 solutions=2 nodes=10"),
            Err(MetricsError::MissingLine)
        );
    }

    #[test]
    fn test_field_tokens_must_be_whole() {
        // `nn=` / `n=4x` are not the n field.
        assert_eq!(
            extract_metrics("NQUEENS_METRICS nn=4 solutions=2 nodes=10"),
            Err(MetricsError::MissingLine)
        );
        assert_eq!(
            extract_metrics("NQUEENS_METRICS n=4x solutions=2 nodes=10"),
            Err(MetricsError::MissingLine)
        );
        assert_eq!(
            extract_metrics("NQUEENS_METRICS n=4 solutions=2 nodes=10kb"),
            Err(MetricsError::MissingLine)
        );
    }

    #[test]
    fn test_decimal_solution_forms() {
        let parse = |s: &str| parse_metrics_line(s).map(|t| t.solutions);
        assert_eq!(parse("NQUEENS_METRICS n=12 solutions=14200 nodes=1"), Some(14200.0));
        assert_eq!(parse("NQUEENS_METRICS n=12 solutions=14200. nodes=1"), Some(14200.0));
        assert_eq!(parse("NQUEENS_METRICS n=12 solutions=1.42e4 nodes=1"), Some(14200.0));
        assert_eq!(parse("NQUEENS_METRICS n=12 solutions=-3 nodes=1"), None);
    }

    #[test]
    fn test_zero_size_and_overflow_rejected() {
        assert_eq!(parse_metrics_line("NQUEENS_METRICS n=0 solutions=1 nodes=1"), None);
        assert_eq!(
            parse_metrics_line("NQUEENS_METRICS n=99999999999 solutions=1 nodes=1"),
            None
        );
    }

    #[test]
    fn test_tabs_and_crlf() {
        let triple = extract_metrics("NQUEENS_METRICS\tn=5\tsolutions=10\tnodes=50\r\n").unwrap();
        assert_eq!(triple.size, 5);
        assert_eq!(triple.nodes, 50);
    }
}
