//! Built-in datasets.

use crate::data::Dataset;
use crate::error::{Error, Result};
use std::path::Path;
use tracing::debug;

const IRIS_CSV: &str = include_str!("../data/iris.csv");
const CORONAVIRUS_CSV: &str = include_str!("../data/coronavirus.csv");

/// Columns every case table must provide.
pub const CORONAVIRUS_COLUMNS: [&str; 4] = ["date", "country", "type", "cases"];

/// Fisher's iris measurements: 150 rows, three species.
pub fn iris() -> Result<Dataset> {
    Dataset::from_csv_reader(IRIS_CSV.as_bytes())
}

/// Daily case counts per country and case type (`confirmed`, `death`,
/// `recovered`). The embedded table is a sample; [`load_coronavirus`] reads a
/// full export with the same columns.
pub fn coronavirus() -> Result<Dataset> {
    Dataset::from_csv_reader(CORONAVIRUS_CSV.as_bytes())
}

/// Load any CSV file with type inference.
pub fn load_csv<P: AsRef<Path>>(path: P) -> Result<Dataset> {
    let data = Dataset::from_csv_path(path.as_ref())?;
    debug!(path = %path.as_ref().display(), rows = data.len(), "loaded dataset");
    Ok(data)
}

/// Load a case table from disk, checking it has the expected columns.
/// Extra columns are kept.
pub fn load_coronavirus<P: AsRef<Path>>(path: P) -> Result<Dataset> {
    let data = load_csv(path)?;
    for column in CORONAVIRUS_COLUMNS {
        data.column_index(column)?;
    }
    Ok(data)
}

/// The datasets recipes draw from.
#[derive(Debug, Clone)]
pub struct Sources {
    pub iris: Dataset,
    pub coronavirus: Dataset,
}

impl Sources {
    /// Both embedded datasets.
    pub fn builtin() -> Result<Self> {
        Ok(Self {
            iris: iris()?,
            coronavirus: coronavirus()?,
        })
    }

    /// Swap in a case table read from disk.
    pub fn with_coronavirus<P: AsRef<Path>>(mut self, path: P) -> Result<Self> {
        self.coronavirus = load_coronavirus(path)?;
        Ok(self)
    }

    /// Look a dataset up by name: `iris`, `coronavirus`, or a CSV path.
    pub fn resolve(&self, name: &str) -> Result<Dataset> {
        match name {
            "iris" => Ok(self.iris.clone()),
            "coronavirus" => Ok(self.coronavirus.clone()),
            path if path.ends_with(".csv") => load_csv(path),
            other => Err(Error::Dataset(format!(
                "unknown dataset '{}' (expected iris, coronavirus or a .csv path)",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ColumnType;

    #[test]
    fn test_iris_shape() {
        let data = iris().unwrap();
        assert_eq!(data.len(), 150);
        assert_eq!(data.columns().len(), 5);
        assert_eq!(data.column_type("species").unwrap(), ColumnType::Categorical);
        assert_eq!(data.column_type("petal_width").unwrap(), ColumnType::Numeric);
    }

    #[test]
    fn test_coronavirus_columns() {
        let data = coronavirus().unwrap();
        assert!(!data.is_empty());
        assert_eq!(data.column_type("date").unwrap(), ColumnType::Date);
        assert_eq!(data.column_type("cases").unwrap(), ColumnType::Numeric);
    }

    #[test]
    fn test_load_coronavirus_requires_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cases.csv");
        std::fs::write(&path, "date,country,cases\n2020-03-01,US,1\n").unwrap();
        assert!(matches!(load_coronavirus(&path), Err(Error::SchemaMismatch { .. })));
    }

    #[test]
    fn test_resolve_unknown_name() {
        let sources = Sources::builtin().unwrap();
        assert!(matches!(sources.resolve("penguins"), Err(Error::Dataset(_))));
    }
}
