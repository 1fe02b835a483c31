//! Per-type metadata schemas and draft validation.
//!
//! Each [`AssetType`] has one [`Schema`] listing the fields a form shows and
//! which of them are required. The built-in set can be replaced at runtime
//! through [`SchemaRegistry::update`].

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::CatalogError;
use crate::models::{AssetDraft, AssetType};

const INDUSTRIES: &[&str] = &["ENERGY", "TELCO", "FINANCE", "HEALTH", "X-SECTOR"];
const REGIONS: &[&str] = &["AMER", "EMEA", "APAC", "GLOBAL"];
const DEAL_STAGES: &[&str] = &["won", "delivered", "lost"];
const CATEGORIES: &[&str] = &["technical", "sales"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FieldKind {
    Text,
    Textarea,
    Select,
    CreatableSelect,
    Multiselect,
    Tags,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaField {
    pub name: String,
    pub label: String,
    #[serde(rename = "type")]
    pub kind: FieldKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl SchemaField {
    fn new(name: &str, label: &str, kind: FieldKind) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            kind,
            required: false,
            options: Vec::new(),
            description: None,
        }
    }

    fn required(mut self) -> Self {
        self.required = true;
        self
    }

    fn options(mut self, opts: &[&str]) -> Self {
        self.options = opts.iter().map(|o| o.to_string()).collect();
        self
    }

    fn describe(mut self, text: &str) -> Self {
        self.description = Some(text.to_string());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    pub id: AssetType,
    pub label: String,
    pub fields: Vec<SchemaField>,
}

impl Schema {
    /// Checks a draft against this schema. Reports every missing required
    /// field at once.
    pub fn validate(&self, draft: &AssetDraft) -> Result<(), CatalogError> {
        let mut missing = Vec::new();
        for field in &self.fields {
            let value = draft_field(draft, &field.name);
            if field.required && value.is_blank() {
                missing.push(field.name.as_str());
                continue;
            }
            if field.kind == FieldKind::Select && !field.options.is_empty() {
                if let FieldValue::Text(v) = value {
                    if !v.trim().is_empty() && !field.options.iter().any(|o| o == v) {
                        return Err(CatalogError::Invalid(format!(
                            "{} must be one of: {}",
                            field.name,
                            field.options.join(", ")
                        )));
                    }
                }
            }
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(CatalogError::Invalid(format!(
                "missing required fields: {}",
                missing.join(", ")
            )))
        }
    }

    fn check_shape(&self) -> Result<(), CatalogError> {
        if self.label.trim().is_empty() {
            return Err(CatalogError::Invalid("schema label must not be empty".into()));
        }
        let mut seen = HashSet::new();
        for field in &self.fields {
            if !is_known_field(&field.name) {
                return Err(CatalogError::Invalid(format!(
                    "unknown schema field '{}'",
                    field.name
                )));
            }
            if !seen.insert(field.name.as_str()) {
                return Err(CatalogError::Invalid(format!(
                    "duplicate schema field '{}'",
                    field.name
                )));
            }
        }
        Ok(())
    }
}

/// The active schema per asset type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaRegistry {
    schemas: BTreeMap<AssetType, Schema>,
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl SchemaRegistry {
    pub fn builtin() -> Self {
        let schemas = AssetType::ALL
            .into_iter()
            .map(|t| (t, builtin_schema(t)))
            .collect();
        Self { schemas }
    }

    /// Built-ins overlaid with `overrides`. Invalid overrides are rejected.
    pub fn with_overrides(overrides: Vec<Schema>) -> Result<Self, CatalogError> {
        let mut reg = Self::builtin();
        for s in overrides {
            reg.update(s)?;
        }
        Ok(reg)
    }

    pub fn get(&self, t: AssetType) -> &Schema {
        // Every type is populated at construction and update only replaces.
        &self.schemas[&t]
    }

    pub fn all(&self) -> Vec<Schema> {
        self.schemas.values().cloned().collect()
    }

    pub fn update(&mut self, schema: Schema) -> Result<(), CatalogError> {
        schema.check_shape()?;
        self.schemas.insert(schema.id, schema);
        Ok(())
    }

    /// Validates against the schema of the draft's type.
    pub fn validate(&self, draft: &AssetDraft) -> Result<(), CatalogError> {
        let t = draft
            .asset_type
            .ok_or_else(|| CatalogError::Invalid("missing required fields: type".into()))?;
        self.get(t).validate(draft)
    }
}

fn common_fields() -> Vec<SchemaField> {
    vec![
        SchemaField::new("author", "Author / Creator", FieldKind::Text).required(),
        SchemaField::new(
            "related_technologies",
            "Related Technologies",
            FieldKind::Multiselect,
        )
        .describe("Specific tools/libs used (e.g. React, Terraform, Kafka)"),
    ]
}

fn head(title_label: &str, summary_label: &str, summary_required: bool) -> Vec<SchemaField> {
    let summary = SchemaField::new("summary", summary_label, FieldKind::Textarea);
    vec![
        SchemaField::new("title", title_label, FieldKind::Text).required(),
        SchemaField::new("category", "Category", FieldKind::Select)
            .options(CATEGORIES)
            .required(),
        if summary_required {
            summary.required()
        } else {
            summary
        },
    ]
}

fn builtin_schema(t: AssetType) -> Schema {
    let tags = SchemaField::new("tags", "Tags", FieldKind::Multiselect);
    let (label, fields) = match t {
        AssetType::WinStory => {
            let mut f = head("Title", "Executive Summary", true);
            f.extend([
                SchemaField::new("industry", "Industry", FieldKind::Select)
                    .options(INDUSTRIES)
                    .required(),
                SchemaField::new("region", "Region", FieldKind::Select)
                    .options(REGIONS)
                    .required(),
                SchemaField::new("stage", "Deal Stage", FieldKind::Select)
                    .options(DEAL_STAGES)
                    .required(),
                SchemaField::new("offering", "Primary Offering", FieldKind::CreatableSelect)
                    .required(),
            ]);
            f.extend(common_fields());
            f.extend([
                SchemaField::new("customer_real", "Customer Name (Internal)", FieldKind::Text)
                    .required(),
                SchemaField::new(
                    "customer_anonymized",
                    "Customer Alias (Public)",
                    FieldKind::Text,
                )
                .required(),
                tags,
            ]);
            ("Win Story", f)
        }
        AssetType::Play => {
            let mut f = head("Title", "Description", true);
            f.extend([
                SchemaField::new("industry", "Target Industry", FieldKind::Select)
                    .options(INDUSTRIES),
                SchemaField::new("offering", "Technology", FieldKind::CreatableSelect).required(),
            ]);
            f.extend(common_fields());
            f.push(tags);
            ("Play / Solution", f)
        }
        AssetType::Template => {
            let mut f = head("Title", "Usage Instructions", false);
            f.extend(common_fields());
            f.push(tags);
            ("Template", f)
        }
        AssetType::CodeRef => {
            let mut f = head("Repo/Module Name", "Description", false);
            f.push(SchemaField::new(
                "offering",
                "Tech Stack",
                FieldKind::CreatableSelect,
            ));
            f.extend(common_fields());
            f.push(tags);
            ("Code Reference", f)
        }
    };
    Schema {
        id: t,
        label: label.to_string(),
        fields,
    }
}

enum FieldValue<'a> {
    Missing,
    Text(&'a str),
    List(&'a [String]),
}

impl FieldValue<'_> {
    fn is_blank(&self) -> bool {
        match self {
            FieldValue::Missing => true,
            FieldValue::Text(s) => s.trim().is_empty(),
            FieldValue::List(l) => l.iter().all(|s| s.trim().is_empty()),
        }
    }
}

const KNOWN_FIELDS: &[&str] = &[
    "title",
    "summary",
    "category",
    "type",
    "confidentiality",
    "industry",
    "region",
    "offering",
    "stage",
    "author",
    "customer_real",
    "customer_anonymized",
    "tags",
    "related_technologies",
    "owners",
];

fn is_known_field(name: &str) -> bool {
    KNOWN_FIELDS.contains(&name)
        || name
            .strip_prefix("custom.")
            .is_some_and(|rest| !rest.is_empty())
}

fn draft_field<'a>(draft: &'a AssetDraft, name: &str) -> FieldValue<'a> {
    fn text(v: &Option<String>) -> FieldValue<'_> {
        v.as_deref().map_or(FieldValue::Missing, FieldValue::Text)
    }
    fn list(v: &Option<Vec<String>>) -> FieldValue<'_> {
        v.as_deref().map_or(FieldValue::Missing, FieldValue::List)
    }

    match name {
        "title" => text(&draft.title),
        "summary" => text(&draft.summary),
        "category" => draft
            .category
            .map_or(FieldValue::Missing, |c| FieldValue::Text(c.as_str())),
        "type" => draft
            .asset_type
            .map_or(FieldValue::Missing, |t| FieldValue::Text(t.as_str())),
        "confidentiality" => draft
            .confidentiality
            .map_or(FieldValue::Missing, |c| FieldValue::Text(c.as_str())),
        "industry" => text(&draft.industry),
        "region" => text(&draft.region),
        "offering" => text(&draft.offering),
        "stage" => text(&draft.stage),
        "author" => text(&draft.author),
        "customer_real" => text(&draft.customer_real),
        "customer_anonymized" => text(&draft.customer_anonymized),
        "tags" => list(&draft.tags),
        "related_technologies" => list(&draft.related_technologies),
        "owners" => list(&draft.owners),
        other => match other.strip_prefix("custom.") {
            Some(key) => draft
                .custom
                .get(key)
                .map_or(FieldValue::Missing, |v| FieldValue::Text(v.as_str())),
            None => FieldValue::Missing,
        },
    }
}
