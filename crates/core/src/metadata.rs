use crate::error::IngestError;
use crate::models::PropertyBag;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadataRecord {
    pub size_kb: String,
    pub creation_time: DateTime<Utc>,
    pub modified_time: DateTime<Utc>,
    pub access_time: DateTime<Utc>,
}

impl FileMetadataRecord {
    /// Writes `date_created`, `date_modified` and `file_size` into a collection record.
    pub fn write_into(&self, properties: &mut PropertyBag) {
        properties.insert(
            "date_created".to_string(),
            Value::String(self.creation_time.to_rfc3339_opts(SecondsFormat::Secs, false)),
        );
        properties.insert(
            "date_modified".to_string(),
            Value::String(self.modified_time.to_rfc3339_opts(SecondsFormat::Secs, false)),
        );
        properties.insert("file_size".to_string(), Value::String(self.size_kb.clone()));
    }
}

pub fn size_format(bytes: u64) -> String {
    format!("{:.2} KB", bytes as f64 / 1024.0)
}

pub fn file_metadata(path: &Path) -> Result<FileMetadataRecord, IngestError> {
    let stats = fs::metadata(path)?;

    let modified: DateTime<Utc> = stats.modified()?.into();
    // Birth time is not recorded on every filesystem.
    let created = stats.created().map(DateTime::<Utc>::from).unwrap_or(modified);
    let accessed = stats.accessed().map(DateTime::<Utc>::from).unwrap_or(modified);

    Ok(FileMetadataRecord {
        size_kb: size_format(stats.len()),
        creation_time: created,
        modified_time: modified,
        access_time: accessed,
    })
}

#[cfg(test)]
mod tests {
    use super::{file_metadata, size_format};
    use crate::IngestError;
    use crate::models::PropertyBag;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn size_is_formatted_in_kilobytes() {
        assert_eq!(size_format(2048), "2.00 KB");
        assert_eq!(size_format(0), "0.00 KB");
        assert_eq!(size_format(1536), "1.50 KB");
    }

    #[test]
    fn metadata_reads_size_and_timestamps() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("clip.mp4");
        fs::write(&path, vec![0u8; 2048])?;

        let record = file_metadata(&path)?;
        assert_eq!(record.size_kb, "2.00 KB");
        assert!(record.modified_time <= chrono::Utc::now());

        let mut properties = PropertyBag::new();
        record.write_into(&mut properties);
        assert_eq!(properties["file_size"], "2.00 KB");
        assert!(properties.contains_key("date_modified"));
        assert!(properties.contains_key("date_created"));
        Ok(())
    }

    #[test]
    fn missing_file_is_an_io_error() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let result = file_metadata(&dir.path().join("missing.pdf"));
        assert!(matches!(result, Err(IngestError::Io(_))));
        Ok(())
    }
}
