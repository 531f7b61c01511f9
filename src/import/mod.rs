use std::fs;
use std::path::Path;
use tracing::info;

use crate::error::{ImportError, Result};
use crate::models::ActivityDocument;

pub mod tcx;

/// Trait for reading activity documents from different file formats
pub trait ImportFormat {
    /// Check if this importer can handle the given file
    fn can_import(&self, file_path: &Path) -> bool;

    /// Read the activity document from the file
    fn import_file(&self, file_path: &Path) -> Result<ActivityDocument>;

    /// Parse an already loaded document
    fn parse_source(&self, content: &str) -> Result<ActivityDocument>;

    /// Get the format name for this importer
    fn get_format_name(&self) -> &'static str;
}

/// A parsed document together with the text it was parsed from
#[derive(Debug, Clone)]
pub struct ImportedFile {
    pub source: String,
    pub document: ActivityDocument,
}

/// Dispatches a file to the first importer that accepts it
pub struct ImportManager {
    importers: Vec<Box<dyn ImportFormat>>,
}

impl ImportManager {
    /// Create a new import manager with all available importers
    pub fn new() -> Self {
        let importers: Vec<Box<dyn ImportFormat>> = vec![Box::new(tcx::TcxImporter::new())];

        Self { importers }
    }

    /// Import a single file, detecting the format from its extension
    pub fn import_file(&self, file_path: &Path) -> Result<ActivityDocument> {
        let importer = self.importer_for(file_path)?;
        info!(
            file = %file_path.display(),
            format = importer.get_format_name(),
            "Importing activity"
        );
        importer.import_file(file_path)
    }

    /// Import a file and keep its text, for writers that rewrite the
    /// original document in place
    pub fn import_with_source(&self, file_path: &Path) -> Result<ImportedFile> {
        let importer = self.importer_for(file_path)?;
        info!(
            file = %file_path.display(),
            format = importer.get_format_name(),
            "Importing activity with source"
        );
        let source = fs::read_to_string(file_path)?;
        let document = importer.parse_source(&source)?;
        Ok(ImportedFile { source, document })
    }

    fn importer_for(&self, file_path: &Path) -> Result<&dyn ImportFormat> {
        if !file_path.is_file() {
            return Err(ImportError::FileNotFound {
                path: file_path.to_path_buf(),
            }
            .into());
        }

        let importer = self
            .importers
            .iter()
            .find(|importer| importer.can_import(file_path))
            .ok_or_else(|| ImportError::UnsupportedFormat {
                format: file_path
                    .extension()
                    .map(|ext| ext.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "<none>".to_string()),
            })?;
        Ok(importer.as_ref())
    }

    /// Check if this manager can import a given file
    pub fn can_import_file(&self, file_path: &Path) -> bool {
        self.importers.iter().any(|importer| importer.can_import(file_path))
    }
}

impl Default for ImportManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LapfixError;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_format_detection() {
        let manager = ImportManager::new();
        assert!(manager.can_import_file(Path::new("run.tcx")));
        assert!(manager.can_import_file(Path::new("RUN.TCX")));
        assert!(!manager.can_import_file(Path::new("run.gpx")));
    }

    #[test]
    fn test_missing_and_unsupported_files() {
        let manager = ImportManager::new();
        let result = manager.import_file(Path::new("/definitely/not/here.tcx"));
        assert!(matches!(
            result,
            Err(LapfixError::Import(ImportError::FileNotFound { .. }))
        ));

        let dir = tempdir().unwrap();
        let path = dir.path().join("ride.gpx");
        fs::write(&path, "<gpx/>").unwrap();
        assert!(matches!(
            manager.import_file(&path),
            Err(LapfixError::Import(ImportError::UnsupportedFormat { .. }))
        ));
        assert!(matches!(
            manager.import_with_source(&path),
            Err(LapfixError::Import(ImportError::UnsupportedFormat { .. }))
        ));
        assert!(matches!(
            manager.import_with_source(Path::new("/definitely/not/here.tcx")),
            Err(LapfixError::Import(ImportError::FileNotFound { .. }))
        ));
    }

    #[test]
    fn test_import_with_source_keeps_text() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run.tcx");
        let xml = r#"<Lap StartTime="2024-01-01T00:00:00Z"><TotalTimeSeconds>60</TotalTimeSeconds><DistanceMeters>200</DistanceMeters></Lap>"#;
        fs::write(&path, xml).unwrap();

        let imported = ImportManager::new().import_with_source(&path).unwrap();
        assert_eq!(imported.source, xml);
        assert_eq!(imported.document.laps.len(), 1);
        assert_eq!(imported.document.laps[0].distance_meters, Some(200.0));
    }
}
