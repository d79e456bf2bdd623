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

//! Bidirectional mapping between field names and sheet columns, resolved
//! from the title row.

use crate::sheets::columns::{index_to_letters, letters_to_index};
use crate::sheets::grid::LogicalRow;
use crate::sheets::records::value_text;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use tracing::warn;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldPositionMap {
    columns: BTreeMap<usize, String>,
    fields: HashMap<String, usize>,
    categories: BTreeMap<usize, String>,
}

impl FieldPositionMap {
    /// Builds the map from title row cells, indexed by zero-based column.
    ///
    /// Titles are trimmed and blank titles are skipped. When two columns
    /// carry the same title the leftmost one owns the field in both
    /// directions.
    pub fn from_titles(titles: &[Option<Value>]) -> Self {
        let mut map = Self::default();

        for (col, title) in titles.iter().enumerate() {
            let Some(name) = title.as_ref().and_then(header_text) else {
                continue;
            };

            if let Some(existing) = map.fields.get(&name) {
                warn!(
                    "⚠️  Duplicate title '{}' in column {}; keeping column {}",
                    name,
                    index_to_letters(col),
                    index_to_letters(*existing)
                );
                continue;
            }

            map.fields.insert(name.clone(), col);
            map.columns.insert(col, name);
        }

        map
    }

    /// Attaches category labels from the row above the title row. Categories
    /// only group fields; they never affect name resolution.
    pub fn with_categories(mut self, categories: &[Option<Value>]) -> Self {
        self.categories = categories
            .iter()
            .enumerate()
            .filter_map(|(col, value)| {
                value
                    .as_ref()
                    .and_then(header_text)
                    .map(|label| (col, label))
            })
            .collect();
        self
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn field_for_column(&self, col: usize) -> Option<&str> {
        self.columns.get(&col).map(String::as_str)
    }

    pub fn field_for_letters(&self, letters: &str) -> Option<&str> {
        letters_to_index(letters).and_then(|col| self.field_for_column(col))
    }

    pub fn column_for_field(&self, field: &str) -> Option<usize> {
        self.fields.get(field).copied()
    }

    pub fn letters_for_field(&self, field: &str) -> Option<String> {
        self.column_for_field(field).map(index_to_letters)
    }

    pub fn category_for_field(&self, field: &str) -> Option<&str> {
        self.column_for_field(field)
            .and_then(|col| self.categories.get(&col))
            .map(String::as_str)
    }

    /// Field names grouped under their category label, in column order.
    pub fn fields_by_category(&self) -> BTreeMap<String, Vec<String>> {
        let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (col, field) in &self.columns {
            if let Some(category) = self.categories.get(col) {
                groups.entry(category.clone()).or_default().push(field.clone());
            }
        }
        groups
    }

    /// Field names in column order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.columns.values().map(String::as_str)
    }

    /// Translates a logical row into field name → value. Blank mapped cells
    /// come back as `null`; unmapped columns are dropped.
    pub fn record_fields(&self, row: &LogicalRow) -> BTreeMap<String, Value> {
        self.columns
            .iter()
            .map(|(col, field)| {
                let value = row.value_at(*col).cloned().unwrap_or(Value::Null);
                (field.clone(), value)
            })
            .collect()
    }
}

fn header_text(value: &Value) -> Option<String> {
    value_text(value)
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheets::grid::reconstruct;
    use serde_json::json;

    fn titles(values: &[Value]) -> Vec<Option<Value>> {
        values
            .iter()
            .map(|v| if v.is_null() { None } else { Some(v.clone()) })
            .collect()
    }

    #[test]
    fn test_maps_trimmed_titles_both_ways() {
        let map =
            FieldPositionMap::from_titles(&titles(&[json!(" Name "), Value::Null, json!("Age")]));

        assert_eq!(map.len(), 2);
        assert_eq!(map.field_for_letters("A"), Some("Name"));
        assert_eq!(map.field_for_letters("B"), None);
        assert_eq!(map.field_for_column(2), Some("Age"));
        assert_eq!(map.letters_for_field("Age"), Some("C".to_string()));
        assert_eq!(map.column_for_field("Name"), Some(0));
        assert_eq!(map.column_for_field("Missing"), None);
    }

    #[test]
    fn test_whitespace_titles_are_skipped() {
        let map = FieldPositionMap::from_titles(&titles(&[json!("   "), json!(""), json!("Id")]));

        assert_eq!(map.field_names().collect::<Vec<_>>(), vec!["Id"]);
        assert_eq!(map.letters_for_field("Id"), Some("C".to_string()));
    }

    #[test]
    fn test_duplicate_titles_resolve_to_the_first_column() {
        let map = FieldPositionMap::from_titles(&titles(&[
            json!("Name"),
            json!("Age"),
            json!("Name "),
        ]));

        assert_eq!(map.letters_for_field("Name"), Some("A".to_string()));
        assert_eq!(map.field_for_letters("C"), None);
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_categories_group_fields_without_renaming_them() {
        let map = FieldPositionMap::from_titles(&titles(&[
            json!("Name"),
            json!("Street"),
            json!("City"),
        ]))
        .with_categories(&titles(&[Value::Null, json!("Address"), json!("Address")]));

        assert_eq!(map.category_for_field("Street"), Some("Address"));
        assert_eq!(map.category_for_field("Name"), None);
        assert_eq!(map.letters_for_field("City"), Some("C".to_string()));
        assert_eq!(
            map.fields_by_category(),
            BTreeMap::from([(
                "Address".to_string(),
                vec!["Street".to_string(), "City".to_string()]
            )])
        );
    }

    #[test]
    fn test_record_fields_follow_title_columns() {
        let map = FieldPositionMap::from_titles(&titles(&[json!("Name"), Value::Null, json!("Age")]));
        let rows = reconstruct(vec![vec![json!("Alice"), json!("note"), Value::Null]], &[], 1);

        let fields = map.record_fields(&rows[0]);

        assert_eq!(
            fields,
            BTreeMap::from([
                ("Age".to_string(), Value::Null),
                ("Name".to_string(), json!("Alice")),
            ])
        );
    }
}
