//! Helpers shared by the Sources that poll a remote platform.

use ctfront_types::ChallengeRow;

/// Cut a URL down to the instance root.
///
/// Everything from the first occurrence of any `markers` path in the part
/// after the scheme is dropped, then any trailing slash.
pub fn instance_root(url: &str, markers: &[&str]) -> String {
    let url = url.trim();
    let (scheme, rest) = url.split_once("://").unwrap_or(("", url));

    let mut path = rest;
    for marker in markers {
        if let Some(at) = path.find(marker) {
            path = path.get(..at).unwrap_or(path);
        }
    }
    let path = path.trim_end_matches('/');

    if scheme.is_empty() {
        path.to_owned()
    } else {
        format!("{scheme}://{path}")
    }
}

/// Keep the leading rows whose solvers are known.
///
/// Solves are fetched one challenge at a time in row order and the first
/// failure ends that cycle's fetching, so everything from the first row
/// without solves onward is dropped. A challenge stored without its solvers
/// would have its whole history announced as fresh solves on the next
/// cycle, first blood included.
pub fn fetched_rows(rows: Vec<ChallengeRow>) -> Vec<ChallengeRow> {
    rows.into_iter()
        .take_while(|row| row.solves.is_some())
        .collect()
}
