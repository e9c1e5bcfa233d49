//! Source registry: which fields of which external record types are mirrored
//! into the reference store.
//!
//! The registry is an explicit handle constructed once at startup and passed
//! by reference to every component that needs it; it is never global state.
//! Mutation after initial load happens only through the explicit
//! register/reregister/unregister/add_fields calls.

pub mod discovery;
pub mod schedule;

pub use discovery::{DiscoveryError, DiscoveryProvider, DiscoveryReport};

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::schema::SchemaIntrospect;

/// Name of the shared cell store every declaration writes into by default.
pub const DEFAULT_STORE: &str = "reference_cells";

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Source already registered: {0}")]
    AlreadyRegistered(String),

    #[error("Source not registered: {0}")]
    NotRegistered(String),

    #[error("Duplicate field '{field}' declared for '{source_name}'")]
    DuplicateField { source_name: String, field: String },

    #[error("Field '{field}' already added for '{source_name}'")]
    FieldAlreadyAdded { source_name: String, field: String },

    #[error("No fields declared for '{0}'")]
    NoFieldsDeclared(String),
}

/// Declaration of one mirrored source: its name, the fields it mirrors and
/// the store it writes into.
///
/// Names are lower-cased on construction. CRF and visit sources use the bare
/// `"app.model"` form; requisition sources are panel-scoped as
/// `"app.model.panel"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    source_name: String,
    field_names: Vec<String>,
    store_name: String,
}

impl SourceConfig {
    pub fn new(source_name: &str, fields: &[&str]) -> Result<Self, RegistryError> {
        let source_name = source_name.to_lowercase();
        if fields.is_empty() {
            return Err(RegistryError::NoFieldsDeclared(source_name));
        }
        let field_names = dedup_sorted(&source_name, fields)?;
        Ok(Self {
            source_name,
            field_names,
            store_name: DEFAULT_STORE.to_string(),
        })
    }

    /// Point this declaration at a different backing store.
    pub fn with_store(mut self, store_name: &str) -> Self {
        self.store_name = store_name.to_string();
        self
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    pub fn field_names(&self) -> &[String] {
        &self.field_names
    }

    pub fn store_name(&self) -> &str {
        &self.store_name
    }

    pub fn contains_field(&self, field_name: &str) -> bool {
        self.field_names.iter().any(|f| f == field_name)
    }

    /// The bare `"app.model"` this declaration mirrors; for panel-scoped
    /// names the panel segment is stripped.
    pub fn model_name(&self) -> String {
        self.source_name
            .split('.')
            .take(2)
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Extend the declaration. A field already present is an error.
    pub fn add_fields(&mut self, fields: &[&str]) -> Result<(), RegistryError> {
        for field_name in fields {
            if self.contains_field(field_name) {
                return Err(RegistryError::FieldAlreadyAdded {
                    source_name: self.source_name.clone(),
                    field: field_name.to_string(),
                });
            }
        }
        self.field_names.extend(fields.iter().map(|f| f.to_string()));
        self.field_names.sort();
        self.field_names.dedup();
        Ok(())
    }

    /// Merge in only the fields not already present. Idempotent; used by
    /// schedule derivation where re-declaring is expected.
    pub(crate) fn merge_fields(&mut self, fields: &[&str]) {
        for field_name in fields {
            if !self.contains_field(field_name) {
                self.field_names.push(field_name.to_string());
            }
        }
        self.field_names.sort();
    }
}

fn dedup_sorted(source_name: &str, fields: &[&str]) -> Result<Vec<String>, RegistryError> {
    let mut seen = BTreeSet::new();
    for field_name in fields {
        if !seen.insert(*field_name) {
            return Err(RegistryError::DuplicateField {
                source_name: source_name.to_string(),
                field: field_name.to_string(),
            });
        }
    }
    Ok(seen.into_iter().map(String::from).collect())
}

/// Process-wide table of source declarations.
#[derive(Debug, Default)]
pub struct Registry {
    registry: BTreeMap<String, SourceConfig>,
    loaded: bool,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, config: SourceConfig) -> Result<(), RegistryError> {
        let name = config.source_name().to_string();
        if self.registry.contains_key(&name) {
            return Err(RegistryError::AlreadyRegistered(name));
        }
        self.registry.insert(name, config);
        self.loaded = true;
        Ok(())
    }

    /// Replace an existing declaration.
    pub fn reregister(&mut self, config: SourceConfig) -> Result<(), RegistryError> {
        let name = config.source_name().to_string();
        if !self.registry.contains_key(&name) {
            return Err(RegistryError::NotRegistered(name));
        }
        self.registry.insert(name, config);
        Ok(())
    }

    pub fn unregister(&mut self, source_name: &str) -> Result<SourceConfig, RegistryError> {
        self.registry
            .remove(source_name)
            .ok_or_else(|| RegistryError::NotRegistered(source_name.to_string()))
    }

    pub fn get(&self, source_name: &str) -> Result<&SourceConfig, RegistryError> {
        self.registry
            .get(source_name)
            .ok_or_else(|| RegistryError::NotRegistered(source_name.to_string()))
    }

    pub fn fields(&self, source_name: &str) -> Result<&[String], RegistryError> {
        Ok(self.get(source_name)?.field_names())
    }

    pub fn store_name(&self, source_name: &str) -> Result<&str, RegistryError> {
        Ok(self.get(source_name)?.store_name())
    }

    pub fn add_fields(&mut self, source_name: &str, fields: &[&str]) -> Result<(), RegistryError> {
        let config = self
            .registry
            .get_mut(source_name)
            .ok_or_else(|| RegistryError::NotRegistered(source_name.to_string()))?;
        config.add_fields(fields)
    }

    pub fn contains(&self, source_name: &str) -> bool {
        self.registry.contains_key(source_name)
    }

    pub fn source_names(&self) -> Vec<String> {
        self.registry.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    pub fn loaded(&self) -> bool {
        self.loaded
    }

    /// A copy of the current state, for test harnesses and discovery
    /// rollback.
    pub fn snapshot(&self) -> BTreeMap<String, SourceConfig> {
        self.registry.clone()
    }

    pub fn restore(&mut self, snapshot: BTreeMap<String, SourceConfig>) {
        self.loaded = !snapshot.is_empty();
        self.registry = snapshot;
    }

    pub fn reset(&mut self) {
        self.registry.clear();
        self.loaded = false;
    }

    /// Validate every declaration against the external schemas.
    ///
    /// Collects rather than short-circuits: the result maps each failing
    /// source name to an error message so the caller sees every problem at
    /// once. Duplicate field names cannot occur here; they are rejected when
    /// a [`SourceConfig`] is constructed.
    pub fn check(&self, introspect: &dyn SchemaIntrospect) -> BTreeMap<String, String> {
        let mut results = BTreeMap::new();
        for (source_name, config) in &self.registry {
            if let Some(message) = check_config(config, introspect) {
                tracing::warn!(source = %source_name, %message, "reference config check failed");
                results.insert(source_name.clone(), message);
            }
        }
        results
    }
}

fn check_config(config: &SourceConfig, introspect: &dyn SchemaIntrospect) -> Option<String> {
    let model_name = config.model_name();
    let schema = match introspect.source_schema(&model_name) {
        Some(schema) => schema,
        None => {
            return Some(format!(
                "Invalid source. '{model_name}' cannot be resolved. See '{}'",
                config.source_name()
            ))
        }
    };
    for field_name in config.field_names() {
        if !schema.has_field(field_name) {
            return Some(format!(
                "Invalid reference field. '{field_name}' not found on '{model_name}'. See '{}'",
                config.source_name()
            ));
        }
    }
    if !schema.has_sync_hooks {
        return Some(format!(
            "'{model_name}' is not wired to the reference synchronizer. See '{}'",
            config.source_name()
        ));
    }
    None
}
