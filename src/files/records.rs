// Copyright 2025 Webmobix Solutions AG
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUTHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Loading candidate records from JSON files.
//!
//! The file holds an array of objects, one per record. Scalar values are
//! taken as-is. Two object forms mark file-typed fields:
//!
//! * `{"$file": "photos/alice.png"}` reads the bytes of a file relative to
//!   the records file
//! * `{"$image_url": "https://..."}` references an image by URL
//!
//! Either form accepts an optional `"name"` overriding the file name.

use crate::sheets::records::{FieldMap, FieldValue, FileUpload};
use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

const FILE_KEY: &str = "$file";
const IMAGE_URL_KEY: &str = "$image_url";

#[derive(Debug, Default)]
pub struct RecordReader;

impl RecordReader {
    pub fn new() -> Self {
        Self
    }

    /// Reads every record in `file_path`.
    ///
    /// # Errors
    ///
    /// * If the file cannot be read or is not valid JSON
    /// * If the top level is not an array of objects
    /// * If a `$file` reference cannot be read
    pub fn read_records<P: AsRef<Path>>(&self, file_path: P) -> Result<Vec<FieldMap>> {
        let file_path = file_path.as_ref();
        info!("📄 Loading records from: {:?}", file_path);

        let content = fs::read_to_string(file_path)
            .with_context(|| format!("Failed to read records file: {:?}", file_path))?;
        let json: Value = serde_json::from_str(&content)
            .with_context(|| format!("Invalid JSON in records file: {:?}", file_path))?;

        let Value::Array(items) = json else {
            anyhow::bail!("Records file must contain a JSON array: {:?}", file_path);
        };

        let base_dir = file_path.parent().unwrap_or_else(|| Path::new("."));
        let records = items
            .into_iter()
            .enumerate()
            .map(|(index, item)| match item {
                Value::Object(fields) => self.parse_record(base_dir, fields).with_context(|| {
                    format!("Invalid record #{} in {:?}", index + 1, file_path)
                }),
                other => anyhow::bail!(
                    "Record #{} in {:?} is not an object: {}",
                    index + 1,
                    file_path,
                    other
                ),
            })
            .collect::<Result<Vec<_>>>()?;

        info!("📊 Loaded {} records", records.len());
        Ok(records)
    }

    fn parse_record(&self, base_dir: &Path, fields: Map<String, Value>) -> Result<FieldMap> {
        fields
            .into_iter()
            .map(|(name, value)| {
                let parsed = self
                    .parse_value(base_dir, value)
                    .with_context(|| format!("Field '{}'", name))?;
                Ok((name, parsed))
            })
            .collect()
    }

    fn parse_value(&self, base_dir: &Path, value: Value) -> Result<FieldValue> {
        let Value::Object(object) = value else {
            return Ok(FieldValue::Scalar(value));
        };

        let name = object.get("name").and_then(Value::as_str);

        if let Some(relative) = object.get(FILE_KEY).and_then(Value::as_str) {
            let path = base_dir.join(relative);
            let bytes =
                fs::read(&path).with_context(|| format!("Failed to read file: {:?}", path))?;
            let file_name = name
                .map(str::to_string)
                .or_else(|| {
                    path.file_name()
                        .and_then(|n| n.to_str())
                        .map(str::to_string)
                })
                .unwrap_or_else(|| relative.to_string());
            debug!("📎 Attached {} ({} bytes)", file_name, bytes.len());
            return Ok(FileUpload::bytes(file_name, bytes).into());
        }

        if let Some(url) = object.get(IMAGE_URL_KEY).and_then(Value::as_str) {
            let file_name = name
                .or_else(|| url.rsplit('/').next().filter(|s| !s.is_empty()))
                .unwrap_or(url);
            return Ok(FileUpload::url(file_name, url).into());
        }

        // Any other object goes to the sheet as its JSON text.
        Ok(FieldValue::Scalar(Value::String(Value::Object(object).to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheets::records::FileContent;
    use serde_json::json;
    use tempfile::TempDir;

    /// Helper function to create a temporary directory for testing
    fn create_temp_dir() -> TempDir {
        TempDir::new().expect("Failed to create temporary directory")
    }

    #[test]
    fn test_read_scalar_records() {
        let temp_dir = create_temp_dir();
        let path = temp_dir.path().join("records.json");
        fs::write(
            &path,
            r#"[{"Name": "Alice", "Age": 30, "Active": true}, {"Name": "Bob", "Age": null}]"#,
        )
        .unwrap();

        let records = RecordReader::new().read_records(&path).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["Name"], FieldValue::from("Alice"));
        assert_eq!(records[0]["Age"], FieldValue::Scalar(json!(30)));
        assert_eq!(records[1]["Age"], FieldValue::Scalar(Value::Null));
    }

    #[test]
    fn test_read_file_references() {
        let temp_dir = create_temp_dir();
        fs::create_dir_all(temp_dir.path().join("photos")).unwrap();
        fs::write(temp_dir.path().join("photos/alice.png"), [1u8, 2, 3]).unwrap();
        let path = temp_dir.path().join("records.json");
        fs::write(
            &path,
            r#"[{
                "Name": "Alice",
                "Photo": {"$file": "photos/alice.png"},
                "Badge": {"$image_url": "https://example.com/img/badge.png"},
                "Logo": {"$image_url": "https://example.com/l", "name": "logo.svg"}
            }]"#,
        )
        .unwrap();

        let records = RecordReader::new().read_records(&path).unwrap();
        let record = &records[0];

        assert_eq!(
            record["Photo"],
            FieldValue::File(FileUpload::bytes("alice.png", vec![1, 2, 3]))
        );
        let FieldValue::File(badge) = &record["Badge"] else {
            panic!("badge should be a file");
        };
        assert_eq!(badge.file_name, "badge.png");
        assert_eq!(
            badge.content,
            FileContent::Url("https://example.com/img/badge.png".to_string())
        );
        let FieldValue::File(logo) = &record["Logo"] else {
            panic!("logo should be a file");
        };
        assert_eq!(logo.file_name, "logo.svg");
    }

    #[test]
    fn test_plain_objects_become_json_text() {
        let temp_dir = create_temp_dir();
        let path = temp_dir.path().join("records.json");
        fs::write(&path, r#"[{"Meta": {"a": 1}}]"#).unwrap();

        let records = RecordReader::new().read_records(&path).unwrap();

        assert_eq!(records[0]["Meta"], FieldValue::from(r#"{"a":1}"#));
    }

    #[test]
    fn test_missing_referenced_file_fails() {
        let temp_dir = create_temp_dir();
        let path = temp_dir.path().join("records.json");
        fs::write(&path, r#"[{"Photo": {"$file": "missing.png"}}]"#).unwrap();

        let err = RecordReader::new().read_records(&path).unwrap_err();

        assert!(format!("{:#}", err).contains("Failed to read file"));
        assert!(format!("{:#}", err).contains("Field 'Photo'"));
    }

    #[test]
    fn test_rejects_non_array_and_non_object_records() {
        let temp_dir = create_temp_dir();
        let path = temp_dir.path().join("records.json");

        fs::write(&path, r#"{"Name": "Alice"}"#).unwrap();
        let err = RecordReader::new().read_records(&path).unwrap_err();
        assert!(err.to_string().contains("JSON array"));

        fs::write(&path, r#"[{"Name": "Alice"}, 42]"#).unwrap();
        let err = RecordReader::new().read_records(&path).unwrap_err();
        assert!(err.to_string().contains("Record #2"));
    }

    #[test]
    fn test_invalid_json() {
        let temp_dir = create_temp_dir();
        let path = temp_dir.path().join("records.json");
        fs::write(&path, "[{").unwrap();

        let err = RecordReader::new().read_records(&path).unwrap_err();
        assert!(err.to_string().contains("Invalid JSON"));
    }
}
