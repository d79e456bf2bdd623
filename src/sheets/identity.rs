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

//! Content-hash identity of table rows.
//!
//! A row's identity is the SHA-256 of a canonical JSON payload built from its
//! field values. With unique key fields configured the payload is the list of
//! key values in sorted key-name order; otherwise it is the object of every
//! non-blank field minus the ignored ones. Values are compared by their text
//! form, so `30` and `"30"` hash alike.
//!
//! Two distinct rows that produce the same hash (for example because the key
//! fields are too coarse) collapse to one entry in [`IdentityIndex`]; the row
//! inserted last wins.

use crate::config::TableConfig;
use crate::sheets::records::value_text;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::{BTreeSet, HashMap};
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowIdentity {
    pub hash: String,
    /// One-based sheet row.
    pub source_row_number: usize,
}

/// How identity hashes are derived from field values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityRule {
    unique_keys: BTreeSet<String>,
    ignored: BTreeSet<String>,
}

impl IdentityRule {
    pub fn from_config(config: &TableConfig) -> Self {
        Self {
            unique_keys: config.unique_key_field_names.clone(),
            ignored: config.ignored_field_names.clone(),
        }
    }

    pub fn whole_record() -> Self {
        Self {
            unique_keys: BTreeSet::new(),
            ignored: BTreeSet::new(),
        }
    }

    pub fn is_keyed(&self) -> bool {
        !self.unique_keys.is_empty()
    }

    /// Hashes `(field name, value)` pairs. Absent and blank values are
    /// equivalent.
    pub fn hash<'a, I>(&self, fields: I) -> String
    where
        I: IntoIterator<Item = (&'a str, Option<&'a Value>)>,
    {
        let texts: HashMap<&str, String> = fields
            .into_iter()
            .filter_map(|(name, value)| value.and_then(value_text).map(|text| (name, text)))
            .collect();

        let payload = if self.is_keyed() {
            // BTreeSet iteration is sorted, which keeps the list order stable.
            Value::Array(
                self.unique_keys
                    .iter()
                    .map(|key| {
                        texts
                            .get(key.as_str())
                            .map(|text| Value::String(text.clone()))
                            .unwrap_or(Value::Null)
                    })
                    .collect(),
            )
        } else {
            let object: Map<String, Value> = texts
                .into_iter()
                .filter(|(name, _)| !self.ignored.contains(*name))
                .map(|(name, text)| (name.to_string(), Value::String(text)))
                .collect();
            Value::Object(object)
        };

        sha256_hex(payload.to_string().as_bytes())
    }

    pub fn identify<'a, I>(&self, fields: I, source_row_number: usize) -> RowIdentity
    where
        I: IntoIterator<Item = (&'a str, Option<&'a Value>)>,
    {
        RowIdentity {
            hash: self.hash(fields),
            source_row_number,
        }
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Identity hash → zero-based sheet row index of existing rows.
#[derive(Debug, Clone, Default)]
pub struct IdentityIndex {
    rows: HashMap<String, usize>,
    last_row_index: Option<usize>,
    collisions: usize,
}

impl IdentityIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn build<I>(identities: I) -> Self
    where
        I: IntoIterator<Item = RowIdentity>,
    {
        let mut index = Self::new();
        for identity in identities {
            index.insert(&identity);
        }
        index
    }

    /// Records a row. A hash already present is re-pointed at this row and
    /// the previous row index is returned.
    pub fn insert(&mut self, identity: &RowIdentity) -> Option<usize> {
        let row_index = identity.source_row_number.saturating_sub(1);
        self.last_row_index = Some(self.last_row_index.map_or(row_index, |last| last.max(row_index)));

        let previous = self.rows.insert(identity.hash.clone(), row_index);
        if let Some(previous_index) = previous
            && previous_index != row_index
        {
            self.collisions += 1;
            warn!(
                "⚠️  Rows {} and {} share identity {}; only row {} will be matched",
                previous_index + 1,
                row_index + 1,
                &identity.hash[..identity.hash.len().min(12)],
                row_index + 1
            );
        }
        previous
    }

    pub fn row_index(&self, hash: &str) -> Option<usize> {
        self.rows.get(hash).copied()
    }

    /// Highest zero-based row index recorded, including rows whose hash was
    /// later taken over by another row.
    pub fn last_row_index(&self) -> Option<usize> {
        self.last_row_index
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn collisions(&self) -> usize {
        self.collisions
    }
}
