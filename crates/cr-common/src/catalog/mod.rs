pub mod defaults;

use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

pub use defaults::default_careers;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CareerRecord {
    pub nombre: String,
    pub universidad: String,
    pub descripcion: String,
    pub ubicacion: String,
}

impl CareerRecord {
    pub fn new(
        nombre: impl Into<String>,
        universidad: impl Into<String>,
        descripcion: impl Into<String>,
        ubicacion: impl Into<String>,
    ) -> Self {
        Self {
            nombre: nombre.into(),
            universidad: universidad.into(),
            descripcion: descripcion.into(),
            ubicacion: ubicacion.into(),
        }
    }

    /// Composite identity: the same program name can be offered by several universities.
    pub fn key(&self) -> CareerKey {
        CareerKey::new(&self.nombre, &self.universidad)
    }

    /// Case-insensitive substring match on `ubicacion`.
    pub fn in_location(&self, location: &str) -> bool {
        self.ubicacion
            .to_lowercase()
            .contains(&location.trim().to_lowercase())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CareerKey {
    pub nombre: String,
    pub universidad: String,
}

impl CareerKey {
    pub fn new(nombre: &str, universidad: &str) -> Self {
        Self {
            nombre: nombre.to_string(),
            universidad: universidad.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read or write catalog at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse catalog at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("catalog is empty")]
    Empty,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub added: usize,
    pub skipped: usize,
}

/// Ordered, de-duplicated set of career records. Read-only once shared.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CareerCatalog {
    records: Vec<CareerRecord>,
}

impl CareerCatalog {
    /// Keeps the first occurrence of each (nombre, universidad) pair.
    pub fn new(records: Vec<CareerRecord>) -> Self {
        let mut catalog = Self::default();
        catalog.import(records);
        catalog
    }

    pub fn with_defaults() -> Self {
        Self::new(default_careers())
    }

    /// Reads a JSON array of records.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let records: Vec<CareerRecord> =
            serde_json::from_str(&raw).map_err(|source| CatalogError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        let catalog = Self::new(records);
        info!(path = %path.display(), careers = catalog.len(), "loaded career catalog");
        Ok(catalog)
    }

    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<(), CatalogError> {
        let path = path.as_ref();
        let io_err = |source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        };

        let body = serde_json::to_string_pretty(&self.records).map_err(|source| {
            CatalogError::Parse {
                path: path.to_path_buf(),
                source,
            }
        })?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        std::fs::write(path, body).map_err(io_err)
    }

    /// Append-only merge; records whose key already exists are skipped.
    pub fn import(&mut self, records: impl IntoIterator<Item = CareerRecord>) -> ImportSummary {
        let mut known: HashSet<CareerKey> = self.records.iter().map(CareerRecord::key).collect();
        let mut summary = ImportSummary::default();

        for record in records {
            if known.insert(record.key()) {
                self.records.push(record);
                summary.added += 1;
            } else {
                debug!(nombre = %record.nombre, universidad = %record.universidad, "skipping duplicate career");
                summary.skipped += 1;
            }
        }

        summary
    }

    /// Fails with [`CatalogError::Empty`] when there is nothing to recommend.
    pub fn ensure_not_empty(&self) -> Result<(), CatalogError> {
        if self.is_empty() {
            Err(CatalogError::Empty)
        } else {
            Ok(())
        }
    }

    pub fn records(&self) -> &[CareerRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// First record with this exact name. Ambiguous when several universities
    /// offer the same program; prefer [`CareerCatalog::get`] when the university is known.
    pub fn find_by_name(&self, nombre: &str) -> Option<&CareerRecord> {
        self.records.iter().find(|record| record.nombre == nombre)
    }

    pub fn get(&self, nombre: &str, universidad: &str) -> Option<&CareerRecord> {
        self.records
            .iter()
            .find(|record| record.nombre == nombre && record.universidad == universidad)
    }

    /// Distinct names in catalog order. This is the label set of trained classifiers.
    pub fn career_names(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.records
            .iter()
            .filter(|record| seen.insert(record.nombre.as_str()))
            .map(|record| record.nombre.clone())
            .collect()
    }

    pub fn distinct_locations(&self) -> Vec<String> {
        sorted_distinct(self.records.iter().map(|r| r.ubicacion.as_str()))
    }

    pub fn distinct_universities(&self) -> Vec<String> {
        sorted_distinct(self.records.iter().map(|r| r.universidad.as_str()))
    }

    pub fn distinct_names(&self) -> Vec<String> {
        sorted_distinct(self.records.iter().map(|r| r.nombre.as_str()))
    }

    /// Records located in `location`, or all of them when none are.
    pub fn filter_location_or_all<'a>(&'a self, location: Option<&str>) -> Vec<&'a CareerRecord> {
        let Some(location) = location.map(str::trim).filter(|l| !l.is_empty()) else {
            return self.records.iter().collect();
        };

        let matching: Vec<_> = self
            .records
            .iter()
            .filter(|record| record.in_location(location))
            .collect();
        if matching.is_empty() {
            debug!(location, "no career matches location; ignoring filter");
            self.records.iter().collect()
        } else {
            matching
        }
    }
}

fn sorted_distinct<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    values
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}
