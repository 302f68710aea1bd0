//! Model catalog.
//!
//! A [`ModelCatalog`] maps model names to the entity types that implement
//! them. It is built from an ordered list of [`ModelModule`]s; each module
//! lists the types it exposes, including re-exports, and only the types a
//! module declares itself are taken from it.

use crate::error::{CoreError, CoreResult};
use std::any::{type_name, TypeId};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Index;

/// A registered entity type.
#[derive(Clone, PartialEq, Eq)]
pub struct ModelType {
    name: String,
    module: String,
    type_id: TypeId,
    type_name: &'static str,
}

impl ModelType {
    /// Describes `T`, exposed as `name` and declared by `module`.
    #[must_use]
    pub fn of<T: 'static>(name: impl Into<String>, module: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            module: module.into(),
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
        }
    }

    /// The model name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The module declaring the type.
    #[must_use]
    pub fn module(&self) -> &str {
        &self.module
    }

    /// The Rust type name, for diagnostics.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Whether this model is implemented by `T`.
    #[must_use]
    pub fn is<T: 'static>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }
}

impl fmt::Debug for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{} ({})", self.module, self.name, self.type_name)
    }
}

/// The types one module exposes.
#[derive(Debug, Clone)]
pub struct ModelModule {
    name: String,
    models: Vec<ModelType>,
}

impl ModelModule {
    /// Creates a module with no types.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            models: Vec::new(),
        }
    }

    /// Adds a type declared by this module.
    #[must_use]
    pub fn declare<T: 'static>(mut self, name: impl Into<String>) -> Self {
        let model = ModelType::of::<T>(name, self.name.clone());
        self.models.push(model);
        self
    }

    /// Lists an already described type.
    ///
    /// Types whose declaring module is not this one are re-exports: they
    /// are listed but never contribute to a catalog.
    #[must_use]
    pub fn reexport(mut self, model: ModelType) -> Self {
        self.models.push(model);
        self
    }

    /// The module name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Every listed type, re-exports included.
    #[must_use]
    pub fn models(&self) -> &[ModelType] {
        &self.models
    }

    fn declared(&self) -> impl Iterator<Item = &ModelType> {
        self.models.iter().filter(move |m| m.module == self.name)
    }
}

/// Immutable name to type mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelCatalog {
    models: BTreeMap<String, ModelType>,
}

impl ModelCatalog {
    /// Builds a catalog from `modules`, in order.
    ///
    /// When two modules declare the same name the later one wins.
    #[must_use]
    pub fn build(modules: &[ModelModule]) -> Self {
        let mut models = BTreeMap::new();
        for module in modules {
            for model in module.declared() {
                models.insert(model.name.clone(), model.clone());
            }
        }
        Self { models }
    }

    /// Looks up a model by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ModelType> {
        self.models.get(name)
    }

    /// Looks up a model that must be present.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::MissingModel`] if `name` is not registered.
    pub fn require(&self, name: &str) -> CoreResult<&ModelType> {
        self.get(name).ok_or_else(|| CoreError::MissingModel {
            name: name.to_string(),
        })
    }

    /// Whether `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.models.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }

    /// Registered models, sorted by name.
    pub fn iter(&self) -> impl Iterator<Item = &ModelType> {
        self.models.values()
    }

    /// Number of registered models.
    #[must_use]
    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// Whether nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

impl Index<&str> for ModelCatalog {
    type Output = ModelType;

    /// # Panics
    ///
    /// Panics if `name` is not registered.
    fn index(&self, name: &str) -> &ModelType {
        match self.models.get(name) {
            Some(model) => model,
            None => panic!("model {name} is not registered"),
        }
    }
}
