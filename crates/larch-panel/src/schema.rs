//! Fields and form schema export
//!
//! Content types describe their rows with a JSON Schema plus a UI schema.
//! [`FieldSets::from_schemas`] turns the pair into list, form, detail and
//! filter field sets; [`FormSchema`] goes the other way for form renderers.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    #[default]
    Text,
    Textarea,
    RichText,
    Number,
    Integer,
    Boolean,
    Date,
    DateTime,
    Select,
    Media,
    Json,
}

impl FieldType {
    fn json_type(&self) -> &'static str {
        match self {
            FieldType::Number => "number",
            FieldType::Integer => "integer",
            FieldType::Boolean => "boolean",
            FieldType::Json => "object",
            _ => "string",
        }
    }

    fn json_format(&self) -> Option<&'static str> {
        match self {
            FieldType::Date => Some("date"),
            FieldType::DateTime => Some("date-time"),
            _ => None,
        }
    }

    fn is_scalar(&self) -> bool {
        !matches!(self, FieldType::Json | FieldType::RichText | FieldType::Media)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub label: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl Field {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        let name = name.into();
        Self {
            label: humanize(&name),
            name,
            field_type,
            ..Default::default()
        }
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = options.into_iter().map(Into::into).collect();
        self
    }
}

/// `"published_at"` -> `"Published At"`
fn humanize(name: &str) -> String {
    name.split(|c| c == '_' || c == '-')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Field sets a panel displays
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldSets {
    pub list: Vec<Field>,
    pub form: Vec<Field>,
    pub detail: Vec<Field>,
    pub filters: Vec<Field>,
}

const DEFAULT_LIST_COLUMNS: usize = 5;

fn ui_flag(ui: Option<&Value>, keys: &[&str]) -> bool {
    ui.map(|ui| keys.iter().any(|k| ui.get(*k).and_then(Value::as_bool).unwrap_or(false)))
        .unwrap_or(false)
}

fn ui_str<'a>(ui: Option<&'a Value>, key: &str) -> Option<&'a str> {
    ui.and_then(|ui| ui.get(key)).and_then(Value::as_str)
}

fn field_type_of(property: &Value, ui: Option<&Value>) -> FieldType {
    match ui_str(ui, "ui:widget") {
        Some("textarea") => return FieldType::Textarea,
        Some("rich-text") | Some("richtext") | Some("wysiwyg") => return FieldType::RichText,
        Some("media") | Some("image") | Some("file") => return FieldType::Media,
        Some("select") => return FieldType::Select,
        _ => {}
    }
    if property.get("enum").is_some() {
        return FieldType::Select;
    }
    match property.get("type").and_then(Value::as_str) {
        Some("integer") => FieldType::Integer,
        Some("number") => FieldType::Number,
        Some("boolean") => FieldType::Boolean,
        Some("object") | Some("array") => FieldType::Json,
        _ => match property.get("format").and_then(Value::as_str) {
            Some("date") => FieldType::Date,
            Some("date-time") => FieldType::DateTime,
            _ => FieldType::Text,
        },
    }
}

impl FieldSets {
    /// Derive field sets from a JSON Schema and a UI schema.
    ///
    /// `ui:order` in the UI schema fixes field order; otherwise properties
    /// keep their map order. `ui:list` marks list columns; without any marks
    /// the first scalar fields become columns.
    pub fn from_schemas(schema: &Value, ui_schema: &Value) -> Self {
        let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
            return Self::default();
        };
        let required: Vec<&str> = schema
            .get("required")
            .and_then(Value::as_array)
            .map(|r| r.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();

        let mut names: Vec<&str> = ui_schema
            .get("ui:order")
            .and_then(Value::as_array)
            .map(|o| o.iter().filter_map(Value::as_str).filter(|n| properties.contains_key(*n)).collect())
            .unwrap_or_default();
        for name in properties.keys() {
            if !names.contains(&name.as_str()) {
                names.push(name.as_str());
            }
        }

        let mut sets = FieldSets::default();
        let mut flagged_columns = Vec::new();
        for name in names {
            let property = &properties[name];
            let ui = ui_schema.get(name);
            let field_type = field_type_of(property, ui);
            let field = Field {
                name: name.to_string(),
                label: property
                    .get("title")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| humanize(name)),
                field_type,
                required: required.contains(&name),
                read_only: property.get("readOnly").and_then(Value::as_bool).unwrap_or(false)
                    || ui_flag(ui, &["ui:readonly", "readOnly"]),
                hidden: ui_flag(ui, &["ui:hidden"]) || ui_str(ui, "ui:widget") == Some("hidden"),
                options: property
                    .get("enum")
                    .and_then(Value::as_array)
                    .map(|e| e.iter().filter_map(Value::as_str).map(str::to_string).collect())
                    .unwrap_or_default(),
                default: property.get("default").cloned(),
            };
            if field.hidden {
                continue;
            }
            if ui_flag(ui, &["ui:list"]) {
                flagged_columns.push(field.clone());
            }
            if matches!(field.field_type, FieldType::Select | FieldType::Boolean) || ui_flag(ui, &["ui:filter"]) {
                sets.filters.push(field.clone());
            }
            sets.form.push(field.clone());
            sets.detail.push(field);
        }

        sets.list = if flagged_columns.is_empty() {
            sets.detail
                .iter()
                .filter(|f| f.field_type.is_scalar())
                .take(DEFAULT_LIST_COLUMNS)
                .cloned()
                .collect()
        } else {
            flagged_columns
        };
        sets
    }

    /// Translation columns and the `incomplete` filter for editorial content.
    pub fn apply_editorial_overlay(&mut self) {
        let status = Field::new("translation_status", FieldType::Text).read_only();
        let locales = Field::new("available_locales", FieldType::Json)
            .label("Locales")
            .read_only();
        for field in [status, locales] {
            if !self.list.iter().any(|f| f.name == field.name) {
                self.list.push(field.clone());
            }
            if !self.detail.iter().any(|f| f.name == field.name) {
                self.detail.push(field);
            }
        }
        if !self.filters.iter().any(|f| f.name == "incomplete") {
            self.filters
                .push(Field::new("incomplete", FieldType::Boolean).label("Missing translations"));
        }
    }
}

/// JSON-Schema shaped form description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormSchema(pub Value);

impl FormSchema {
    /// Merge declared form fields over an optional content-type schema.
    ///
    /// Boolean hints are emitted as `readOnly` and mirrored as `read_only`
    /// for renderers that have not migrated yet.
    pub fn build(fields: &[Field], content_schema: Option<&Value>) -> Self {
        let mut properties = content_schema
            .and_then(|s| s.get("properties"))
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        let mut required: Vec<String> = content_schema
            .and_then(|s| s.get("required"))
            .and_then(Value::as_array)
            .map(|r| r.iter().filter_map(Value::as_str).map(str::to_string).collect())
            .unwrap_or_default();

        for field in fields {
            let mut property = match properties.remove(&field.name) {
                Some(Value::Object(existing)) => existing,
                _ => Map::new(),
            };
            property.insert("type".into(), json!(field.field_type.json_type()));
            property.insert("title".into(), json!(field.label));
            if let Some(format) = field.field_type.json_format() {
                property.insert("format".into(), json!(format));
            }
            if !field.options.is_empty() {
                property.insert("enum".into(), json!(field.options));
            }
            if let Some(default) = &field.default {
                property.insert("default".into(), default.clone());
            }
            property.insert("x-field-type".into(), json!(field.field_type));
            properties.insert(field.name.clone(), Value::Object(property));
            if field.required && !required.contains(&field.name) {
                required.push(field.name.clone());
            }
        }

        for (name, property) in properties.iter_mut() {
            if let Value::Object(property) = property {
                let read_only = property
                    .get("readOnly")
                    .and_then(Value::as_bool)
                    .unwrap_or(false)
                    || property.get("read_only").and_then(Value::as_bool).unwrap_or(false)
                    || fields.iter().any(|f| &f.name == name && f.read_only);
                property.insert("readOnly".into(), json!(read_only));
                property.insert("read_only".into(), json!(read_only));
            }
        }

        FormSchema(json!({
            "type": "object",
            "properties": properties,
            "required": required,
        }))
    }

    pub fn into_value(self) -> Value {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page_schema() -> Value {
        json!({
            "type": "object",
            "required": ["title"],
            "properties": {
                "title": { "type": "string", "title": "Title" },
                "body": { "type": "string" },
                "status": { "type": "string", "enum": ["draft", "published"] },
                "featured": { "type": "boolean" },
                "published_at": { "type": "string", "format": "date-time", "readOnly": true },
                "internal_ref": { "type": "string" }
            }
        })
    }

    fn page_ui() -> Value {
        json!({
            "ui:order": ["title", "status"],
            "body": { "ui:widget": "rich-text" },
            "internal_ref": { "ui:hidden": true }
        })
    }

    #[test]
    fn test_field_sets_from_schemas() {
        let sets = FieldSets::from_schemas(&page_schema(), &page_ui());
        let form: Vec<&str> = sets.form.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(form[..2], ["title", "status"]);
        assert!(!form.contains(&"internal_ref"));

        let title = &sets.form[0];
        assert!(title.required);
        assert_eq!(title.label, "Title");

        let body = sets.form.iter().find(|f| f.name == "body").unwrap();
        assert_eq!(body.field_type, FieldType::RichText);
        assert!(!sets.list.iter().any(|f| f.name == "body"));

        let published = sets.form.iter().find(|f| f.name == "published_at").unwrap();
        assert_eq!(published.field_type, FieldType::DateTime);
        assert!(published.read_only);
        assert_eq!(published.label, "Published At");

        let filters: Vec<&str> = sets.filters.iter().map(|f| f.name.as_str()).collect();
        assert!(filters.contains(&"status") && filters.contains(&"featured"));
    }

    #[test]
    fn test_editorial_overlay_is_idempotent() {
        let mut sets = FieldSets::from_schemas(&page_schema(), &page_ui());
        sets.apply_editorial_overlay();
        sets.apply_editorial_overlay();
        assert_eq!(sets.list.iter().filter(|f| f.name == "translation_status").count(), 1);
        assert_eq!(sets.filters.iter().filter(|f| f.name == "incomplete").count(), 1);
    }

    #[test]
    fn test_form_schema_emits_both_read_only_forms() {
        let fields = vec![
            Field::new("slug", FieldType::Text).read_only(),
            Field::new("title", FieldType::Text).required(),
        ];
        let schema = FormSchema::build(&fields, Some(&page_schema())).into_value();
        assert_eq!(schema["properties"]["slug"]["readOnly"], true);
        assert_eq!(schema["properties"]["slug"]["read_only"], true);
        assert_eq!(schema["properties"]["published_at"]["readOnly"], true);
        assert_eq!(schema["properties"]["published_at"]["read_only"], true);
        assert_eq!(schema["properties"]["body"]["readOnly"], false);
        assert_eq!(schema["required"], json!(["title"]));
    }
}
