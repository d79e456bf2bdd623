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

//! Record types exchanged with callers, plus an explicit field registry for
//! binding typed structs to sheet field names.

use serde::Serialize;
use serde_json::{Number, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Where the bytes of a file-typed cell come from.
#[derive(Debug, Clone, PartialEq)]
pub enum FileContent {
    Bytes(Vec<u8>),
    Url(String),
}

/// A file or image destined for a single cell.
#[derive(Debug, Clone, PartialEq)]
pub struct FileUpload {
    pub file_name: String,
    pub content: FileContent,
}

impl FileUpload {
    pub fn bytes(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content: FileContent::Bytes(bytes),
        }
    }

    pub fn url(file_name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            content: FileContent::Url(url.into()),
        }
    }
}

/// Value of one field in a candidate record.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Scalar(Value),
    File(FileUpload),
}

impl FieldValue {
    pub fn as_scalar(&self) -> Option<&Value> {
        match self {
            FieldValue::Scalar(value) => Some(value),
            FieldValue::File(_) => None,
        }
    }
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        FieldValue::Scalar(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Scalar(Value::String(value.to_string()))
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Scalar(Value::String(value))
    }
}

impl From<FileUpload> for FieldValue {
    fn from(upload: FileUpload) -> Self {
        FieldValue::File(upload)
    }
}

/// Candidate record: field name to value.
pub type FieldMap = BTreeMap<String, FieldValue>;

/// A row read back from the sheet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub fields: BTreeMap<String, Value>,
    pub row_number: usize,
    pub identity: String,
}

impl Record {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Converts the record back into a candidate for [`upsert`](crate::sheets::TableSynchronizer::upsert).
    pub fn to_field_map(&self) -> FieldMap {
        self.fields
            .iter()
            .map(|(name, value)| (name.clone(), FieldValue::Scalar(value.clone())))
            .collect()
    }
}

/// Canonical text of a scalar cell value, `None` when blank.
pub fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(num) => Some(number_text(num)),
        Value::Bool(flag) => Some(if *flag { "TRUE" } else { "FALSE" }.to_string()),
        other => Some(other.to_string()),
    }
}

/// Integral floats print without a fraction, as the sheet displays them.
fn number_text(num: &Number) -> String {
    match num.as_f64() {
        Some(float)
            if !num.is_i64() && !num.is_u64() && float.fract() == 0.0 && float.abs() < 1e15 =>
        {
            (float as i64).to_string()
        }
        _ => num.to_string(),
    }
}

/// Supplies the allowed values of a list-typed field, resolved at call time.
pub trait OptionSource: Send + Sync {
    fn resolve(&self) -> Vec<String>;
}

impl<F> OptionSource for F
where
    F: Fn() -> Vec<String> + Send + Sync,
{
    fn resolve(&self) -> Vec<String> {
        self()
    }
}

/// A fixed list of options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticOptions(pub Vec<String>);

impl StaticOptions {
    pub fn new<I, S>(options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(options.into_iter().map(Into::into).collect())
    }
}

impl OptionSource for StaticOptions {
    fn resolve(&self) -> Vec<String> {
        self.0.clone()
    }
}

/// A field value outside its field's option list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionViolation {
    pub field: String,
    pub value: String,
    pub allowed: Vec<String>,
}

type Getter<T> = Box<dyn Fn(&T) -> FieldValue + Send + Sync>;
type Setter<T> = Box<dyn Fn(&mut T, &Value) + Send + Sync>;

struct FieldBinding<T> {
    name: String,
    getter: Getter<T>,
    setter: Option<Setter<T>>,
    options: Option<Box<dyn OptionSource>>,
}

/// Maps logical field names to accessor/mutator pairs for one record type.
///
/// Built once per type with [`FieldRegistry::builder`]; no runtime reflection.
pub struct FieldRegistry<T> {
    bindings: Vec<FieldBinding<T>>,
}

impl<T> FieldRegistry<T> {
    pub fn builder() -> FieldRegistryBuilder<T> {
        FieldRegistryBuilder {
            bindings: Vec::new(),
        }
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.bindings.iter().map(|binding| binding.name.as_str())
    }

    /// Allowed values of `field`, if it has an option source.
    pub fn options_for(&self, field: &str) -> Option<Vec<String>> {
        self.bindings
            .iter()
            .find(|binding| binding.name == field)
            .and_then(|binding| binding.options.as_ref())
            .map(|source| source.resolve())
    }

    /// Checks every optioned field of `item`. Blank values always pass.
    pub fn check_options(&self, item: &T) -> Vec<OptionViolation> {
        self.bindings
            .iter()
            .filter_map(|binding| {
                let source = binding.options.as_ref()?;
                let text = (binding.getter)(item).as_scalar().and_then(value_text)?;
                let allowed = source.resolve();
                if allowed.contains(&text) {
                    return None;
                }
                Some(OptionViolation {
                    field: binding.name.clone(),
                    value: text,
                    allowed,
                })
            })
            .collect()
    }

    pub fn to_field_map(&self, item: &T) -> FieldMap {
        self.bindings
            .iter()
            .map(|binding| (binding.name.clone(), (binding.getter)(item)))
            .collect()
    }

    /// Writes every bound field present in `record` onto `target`.
    pub fn apply(&self, target: &mut T, record: &Record) {
        for binding in &self.bindings {
            if let Some(setter) = &binding.setter
                && let Some(value) = record.get(&binding.name)
            {
                setter(target, value);
            }
        }
    }

    pub fn from_record(&self, record: &Record) -> T
    where
        T: Default,
    {
        let mut item = T::default();
        self.apply(&mut item, record);
        item
    }
}

impl<T> fmt::Debug for FieldRegistry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldRegistry")
            .field("fields", &self.field_names().collect::<Vec<_>>())
            .finish()
    }
}

pub struct FieldRegistryBuilder<T> {
    bindings: Vec<FieldBinding<T>>,
}

impl<T> FieldRegistryBuilder<T> {
    pub fn field<G, S>(mut self, name: impl Into<String>, getter: G, setter: S) -> Self
    where
        G: Fn(&T) -> FieldValue + Send + Sync + 'static,
        S: Fn(&mut T, &Value) + Send + Sync + 'static,
    {
        self.bindings.push(FieldBinding {
            name: name.into(),
            getter: Box::new(getter),
            setter: Some(Box::new(setter)),
            options: None,
        });
        self
    }

    /// A field that is written to the sheet but never read back, such as an
    /// image column.
    pub fn write_only<G>(mut self, name: impl Into<String>, getter: G) -> Self
    where
        G: Fn(&T) -> FieldValue + Send + Sync + 'static,
    {
        self.bindings.push(FieldBinding {
            name: name.into(),
            getter: Box::new(getter),
            setter: None,
            options: None,
        });
        self
    }

    /// Restricts the most recently bound field to the values of `source`.
    pub fn with_options(mut self, source: impl OptionSource + 'static) -> Self {
        if let Some(binding) = self.bindings.last_mut() {
            binding.options = Some(Box::new(source));
        }
        self
    }

    pub fn build(self) -> FieldRegistry<T> {
        FieldRegistry {
            bindings: self.bindings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Default, PartialEq)]
    struct Person {
        name: String,
        age: Option<u32>,
        avatar: Option<String>,
    }

    fn registry() -> FieldRegistry<Person> {
        FieldRegistry::<Person>::builder()
            .field(
                "Name",
                |p: &Person| FieldValue::from(p.name.as_str()),
                |p, v| p.name = value_text(v).unwrap_or_default(),
            )
            .field(
                "Age",
                |p: &Person| FieldValue::Scalar(p.age.map(Value::from).unwrap_or(Value::Null)),
                |p, v| p.age = value_text(v).and_then(|s| s.parse().ok()),
            )
            .write_only("Avatar", |p: &Person| match &p.avatar {
                Some(url) => FileUpload::url("avatar.png", url.clone()).into(),
                None => FieldValue::Scalar(Value::Null),
            })
            .build()
    }

    #[test]
    fn test_registry_converts_structs_to_field_maps() {
        let person = Person {
            name: "Alice".to_string(),
            age: Some(30),
            avatar: Some("https://example.com/a.png".to_string()),
        };

        let map = registry().to_field_map(&person);

        assert_eq!(map["Name"], FieldValue::from("Alice"));
        assert_eq!(map["Age"], FieldValue::Scalar(json!(30)));
        assert!(matches!(map["Avatar"], FieldValue::File(_)));
        assert_eq!(
            registry().field_names().collect::<Vec<_>>(),
            vec!["Name", "Age", "Avatar"]
        );
    }

    #[test]
    fn test_registry_reads_records_back_into_structs() {
        let record = Record {
            fields: BTreeMap::from([
                ("Name".to_string(), json!("Bob")),
                ("Age".to_string(), json!("25")),
                ("Avatar".to_string(), json!("ignored")),
            ]),
            row_number: 4,
            identity: "abc".to_string(),
        };

        let person = registry().from_record(&record);

        assert_eq!(
            person,
            Person {
                name: "Bob".to_string(),
                age: Some(25),
                avatar: None,
            }
        );
    }

    #[derive(Debug, Default)]
    struct Ticket {
        status: String,
        priority: String,
    }

    fn ticket_registry() -> FieldRegistry<Ticket> {
        FieldRegistry::<Ticket>::builder()
            .field(
                "Status",
                |t: &Ticket| FieldValue::from(t.status.as_str()),
                |t, v| t.status = value_text(v).unwrap_or_default(),
            )
            .with_options(StaticOptions::new(["Open", "Closed"]))
            .field(
                "Priority",
                |t: &Ticket| FieldValue::from(t.priority.as_str()),
                |t, v| t.priority = value_text(v).unwrap_or_default(),
            )
            .with_options(|| vec!["Low".to_string(), "High".to_string()])
            .build()
    }

    #[test]
    fn test_option_sources_resolve_per_field() {
        let registry = ticket_registry();

        assert_eq!(
            registry.options_for("Status"),
            Some(vec!["Open".to_string(), "Closed".to_string()])
        );
        assert_eq!(
            registry.options_for("Priority"),
            Some(vec!["Low".to_string(), "High".to_string()])
        );
        assert_eq!(registry.options_for("Missing"), None);
        assert_eq!(registry.options_for("Name"), None);
    }

    #[test]
    fn test_check_options_reports_values_outside_the_list() {
        let registry = ticket_registry();
        let ticket = Ticket {
            status: "Pending".to_string(),
            priority: String::new(),
        };

        let violations = registry.check_options(&ticket);

        assert_eq!(
            violations,
            vec![OptionViolation {
                field: "Status".to_string(),
                value: "Pending".to_string(),
                allowed: vec!["Open".to_string(), "Closed".to_string()],
            }]
        );
        assert!(
            registry
                .check_options(&Ticket {
                    status: "Open".to_string(),
                    priority: "High".to_string(),
                })
                .is_empty()
        );
    }

    #[test]
    fn test_value_text_normalizes_scalars() {
        assert_eq!(value_text(&json!("30")), Some("30".to_string()));
        assert_eq!(value_text(&json!(30)), Some("30".to_string()));
        assert_eq!(value_text(&json!(true)), Some("TRUE".to_string()));
        assert_eq!(value_text(&json!(1.0)), Some("1".to_string()));
        assert_eq!(value_text(&json!(-42.0)), Some("-42".to_string()));
        assert_eq!(value_text(&json!(2.5)), Some("2.5".to_string()));
        assert_eq!(value_text(&json!("")), None);
        assert_eq!(value_text(&Value::Null), None);
    }
}
