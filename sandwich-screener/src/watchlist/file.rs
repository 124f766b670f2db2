//! CSV file watchlist.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::WatchlistSource;
use crate::data::ProviderError;

/// Reads a CSV file whose first record is a header.
///
/// Records may have any number of fields.
pub struct FileWatchlist {
    path: PathBuf,
}

impl FileWatchlist {
    /// Create the source.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl WatchlistSource for FileWatchlist {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn get_rows(&self) -> Result<Vec<Vec<String>>, ProviderError> {
        let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ProviderError::DataNotAvailable(format!("{}: not found", self.path.display()))
            } else {
                ProviderError::Internal(format!("{}: {}", self.path.display(), e))
            }
        })?;

        let rows = parse_csv(&content)?;
        debug!(rows = rows.len(), path = %self.path.display(), "Watchlist file read");
        Ok(rows)
    }
}

fn parse_csv(content: &str) -> Result<Vec<Vec<String>>, ProviderError> {
    // Spreadsheet exports often start with a byte-order mark
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    reader
        .records()
        .map(|record| {
            record
                .map(|r| r.iter().map(str::to_string).collect())
                .map_err(|e| ProviderError::Internal(format!("Invalid CSV: {}", e)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::watchlist::parse_rows;
    use std::io::Write;

    #[tokio::test]
    async fn test_reads_flexible_records() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "\u{feff}name,theme1,theme2,theme3\n삼성전자,반도체,,AI\nNAVER,플랫폼\n\"Acme, Inc\",Tech,Cloud,SaaS\n"
        )
        .unwrap();

        let rows = FileWatchlist::new(file.path()).get_rows().await.unwrap();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0][0], "name");
        assert_eq!(rows[2], vec!["NAVER", "플랫폼"]);

        let entries = parse_rows(rows);
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[2].name, "Acme, Inc");
        assert_eq!(entries[1].theme2, "");
    }

    #[tokio::test]
    async fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = FileWatchlist::new(dir.path().join("absent.csv"))
            .get_rows()
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::DataNotAvailable(_)));
    }
}
