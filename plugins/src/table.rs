//! Helpers for whitespace-separated kernel tables under `/proc/net`.

use std::path::Path;

use lookout_common::DiscoveryError;

/// Fails with `DependencyUnmet` unless `path` can be opened for reading.
pub(crate) async fn ensure_readable(path: &Path) -> Result<(), DiscoveryError> {
    tokio::fs::File::open(path)
        .await
        .map(drop)
        .map_err(|e| DiscoveryError::dependency(format!("{} is not readable: {e}", path.display())))
}

/// Reads the whole table. The handle is closed before returning.
pub(crate) async fn read(path: &Path) -> Result<String, DiscoveryError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| DiscoveryError::probe(format!("reading {}: {e}", path.display())))
}

/// Data rows of a table: header skipped, blank lines dropped, split on
/// whitespace.
pub(crate) fn rows(table: &str) -> impl Iterator<Item = Vec<&str>> {
    table
        .lines()
        .skip(1)
        .map(|line| line.split_whitespace().collect::<Vec<&str>>())
        .filter(|tokens| !tokens.is_empty())
}

/// Parses `0x1f` or `1f`.
pub(crate) fn hex(token: &str) -> Option<u32> {
    let digits = token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
        .unwrap_or(token);
    u32::from_str_radix(digits, 16).ok()
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_skip_header_and_blanks() {
        let table = "A B C\n1 2 3\n\n4 5 6\n";
        let rows: Vec<Vec<&str>> = rows(table).collect();
        assert_eq!(rows, vec![vec!["1", "2", "3"], vec!["4", "5", "6"]]);
    }

    #[test]
    fn hex_accepts_both_forms() {
        assert_eq!(hex("0x2"), Some(2));
        assert_eq!(hex("0001A8C0"), Some(0x0001_a8c0));
        assert_eq!(hex("zz"), None);
    }

    #[tokio::test]
    async fn missing_table_is_an_unmet_dependency() {
        let err = ensure_readable(Path::new("/definitely/not/here")).await.unwrap_err();
        assert!(matches!(err, DiscoveryError::DependencyUnmet(_)));
    }
}
