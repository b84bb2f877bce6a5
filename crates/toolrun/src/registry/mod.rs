//! Tool registry
//!
//! A tool is a system prompt plus a user-prompt template and the input
//! fields a caller fills in. The registry is built once at startup and is
//! read-only while serving requests.

mod builtin;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

use crate::classifier::ErrorCategory;
use crate::template::placeholders;

/// How an input field is presented and validated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Text,
    Textarea,
    Select,
}

/// A declared input field of a tool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputField {
    /// Key used in the request's `inputs` map and in template placeholders
    pub name: String,
    /// Human-readable label, used in validation messages
    pub label: String,
    #[serde(default = "default_field_kind")]
    pub kind: FieldKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    /// Allowed values when `kind` is `select`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
}

fn default_field_kind() -> FieldKind {
    FieldKind::Text
}

/// A runnable tool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub system_prompt: String,
    /// User-prompt template with `{field}` placeholders
    pub template: String,
    #[serde(default)]
    pub fields: Vec<InputField>,
}

/// Why a tool request was rejected before reaching the upstream
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Missing tool slug")]
    MissingSlug,

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("{label} is required")]
    RequiredField { field: String, label: String },

    #[error("{label} must be one of: {}", .allowed.join(", "))]
    InvalidOption {
        field: String,
        label: String,
        allowed: Vec<String>,
    },
}

/// Why a tool definition cannot be served
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DefinitionError {
    #[error("Tool has an empty slug")]
    EmptySlug,

    #[error("Tool '{slug}' has an empty system prompt")]
    EmptySystemPrompt { slug: String },

    #[error("Tool '{slug}' declares field '{field}' more than once")]
    DuplicateField { slug: String, field: String },

    #[error("Tool '{slug}' template uses {{{name}}} but declares no such field")]
    UndeclaredPlaceholder { slug: String, name: String },

    #[error("Tool '{slug}' select field '{field}' has no options")]
    SelectWithoutOptions { slug: String, field: String },
}

impl ValidationError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ValidationError::UnknownTool(_) => ErrorCategory::NotFound,
            _ => ErrorCategory::InvalidRequest,
        }
    }
}

impl ToolDefinition {
    /// Check that the definition itself is servable: every template
    /// placeholder is a declared field and every select field has options.
    pub fn check(&self) -> Result<(), DefinitionError> {
        let slug = self.slug.trim();
        if slug.is_empty() {
            return Err(DefinitionError::EmptySlug);
        }
        if self.system_prompt.trim().is_empty() {
            return Err(DefinitionError::EmptySystemPrompt {
                slug: slug.to_string(),
            });
        }

        for (i, field) in self.fields.iter().enumerate() {
            if self.fields[..i].iter().any(|f| f.name == field.name) {
                return Err(DefinitionError::DuplicateField {
                    slug: slug.to_string(),
                    field: field.name.clone(),
                });
            }
            if field.kind == FieldKind::Select && field.options.is_empty() {
                return Err(DefinitionError::SelectWithoutOptions {
                    slug: slug.to_string(),
                    field: field.name.clone(),
                });
            }
        }

        if let Some(name) = placeholders(&self.template)
            .into_iter()
            .find(|name| !self.fields.iter().any(|f| f.name == *name))
        {
            return Err(DefinitionError::UndeclaredPlaceholder {
                slug: slug.to_string(),
                name: name.to_string(),
            });
        }

        Ok(())
    }

    /// Check caller inputs against the declared fields.
    ///
    /// Fields are checked in declaration order and the first failure is
    /// returned. Inputs with no matching field are ignored.
    pub fn validate(&self, inputs: &HashMap<String, String>) -> Result<(), ValidationError> {
        for field in &self.fields {
            let value = inputs.get(&field.name).map(|v| v.trim()).unwrap_or("");

            if value.is_empty() {
                if field.required {
                    return Err(ValidationError::RequiredField {
                        field: field.name.clone(),
                        label: field.label.clone(),
                    });
                }
                continue;
            }

            if field.kind == FieldKind::Select
                && !field.options.is_empty()
                && !field.options.iter().any(|o| o == value)
            {
                return Err(ValidationError::InvalidOption {
                    field: field.name.clone(),
                    label: field.label.clone(),
                    allowed: field.options.clone(),
                });
            }
        }

        Ok(())
    }

    pub fn summary(&self) -> ToolSummary<'_> {
        ToolSummary {
            slug: &self.slug,
            name: &self.name,
            description: &self.description,
        }
    }

    /// Public view with fields but without prompts
    pub fn info(&self) -> ToolInfo<'_> {
        ToolInfo {
            slug: &self.slug,
            name: &self.name,
            description: &self.description,
            fields: &self.fields,
        }
    }
}

/// Listing entry for a tool
#[derive(Debug, Serialize)]
pub struct ToolSummary<'a> {
    pub slug: &'a str,
    pub name: &'a str,
    pub description: &'a str,
}

/// Everything a form needs to render a tool
#[derive(Debug, Serialize)]
pub struct ToolInfo<'a> {
    pub slug: &'a str,
    pub name: &'a str,
    pub description: &'a str,
    pub fields: &'a [InputField],
}

/// Slug-indexed tool catalog
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, ToolDefinition>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the built-in tool catalog
    pub fn with_builtin_tools() -> Self {
        let mut registry = Self::new();
        for tool in builtin::tools() {
            registry.insert(tool);
        }
        registry
    }

    /// Add a tool, replacing any existing tool with the same slug
    pub fn insert(&mut self, tool: ToolDefinition) {
        if self.tools.contains_key(&tool.slug) {
            tracing::info!(slug = %tool.slug, "Replacing registered tool");
        }
        self.tools.insert(tool.slug.clone(), tool);
    }

    pub fn lookup(&self, slug: &str) -> Option<&ToolDefinition> {
        self.tools.get(slug)
    }

    /// All tools in slug order
    pub fn list(&self) -> impl Iterator<Item = &ToolDefinition> {
        self.tools.values()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
