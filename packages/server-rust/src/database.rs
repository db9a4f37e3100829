//! Database registry: resolves container names to container capabilities
//! and carries the database-wide configuration, schema, and customization
//! hooks.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;

use synchub_core::tasks::crud::{CreateEntities, DeleteEntities, MergeEntities, UpsertEntities};
use synchub_core::{EntityKey, TaskError};

use crate::service::context::ExecutionContext;
use crate::storage::container::Container;
use crate::storage::filter::FilterEngine;
use crate::storage::memory::MemoryContainer;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Database-wide behavior knobs.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Payload field entity keys are derived from when a write omits them.
    pub key_name: String,
    /// Whether write payloads pass through the canonical formatting pass
    /// (key field injected) before reaching the container.
    pub format_entities: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            key_name: "id".to_string(),
            format_entities: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Collaborator traits
// ---------------------------------------------------------------------------

/// Produces container capabilities on first use.
///
/// Returning `None` means the container cannot exist in this database; the
/// pipeline reports it as a `databaseError` ("container not found").
pub trait ContainerFactory: Send + Sync + 'static {
    fn create(&self, name: &str) -> Option<Arc<dyn Container>>;
}

/// Per-entity schema validation hook.
pub trait SchemaValidator: Send + Sync + 'static {
    /// Validate one payload against the container's schema.
    ///
    /// # Errors
    ///
    /// Returns the violation description; the pipeline records it as an
    /// entity-scoped validation error.
    fn validate(&self, container: &str, key: &EntityKey, payload: &Value) -> Result<(), String>;
}

/// Write-path interception hooks, invoked before validation.
///
/// All hooks default to no-ops; a custom service may rewrite the task or
/// reject it with a task error.
#[async_trait]
pub trait DatabaseService: Send + Sync + 'static {
    async fn customize_create(
        &self,
        task: &mut CreateEntities,
        ctx: &ExecutionContext,
    ) -> Result<(), TaskError> {
        let _ = (task, ctx);
        Ok(())
    }

    async fn customize_upsert(
        &self,
        task: &mut UpsertEntities,
        ctx: &ExecutionContext,
    ) -> Result<(), TaskError> {
        let _ = (task, ctx);
        Ok(())
    }

    async fn customize_merge(
        &self,
        task: &mut MergeEntities,
        ctx: &ExecutionContext,
    ) -> Result<(), TaskError> {
        let _ = (task, ctx);
        Ok(())
    }

    async fn customize_delete(
        &self,
        task: &mut DeleteEntities,
        ctx: &ExecutionContext,
    ) -> Result<(), TaskError> {
        let _ = (task, ctx);
        Ok(())
    }
}

/// The default, hook-free database service.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultDatabaseService;

#[async_trait]
impl DatabaseService for DefaultDatabaseService {}

// ---------------------------------------------------------------------------
// Memory factory
// ---------------------------------------------------------------------------

/// Factory producing [`MemoryContainer`]s, optionally restricted to a fixed
/// container set.
#[derive(Default)]
pub struct MemoryContainerFactory {
    allowed: Option<HashSet<String>>,
    filter_engine: Option<Arc<dyn FilterEngine>>,
}

impl MemoryContainerFactory {
    /// A factory that materializes any requested container.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict the factory to a fixed set of container names.
    #[must_use]
    pub fn with_containers<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed = Some(names.into_iter().map(Into::into).collect());
        self
    }

    /// Attach the filter compiler handed to every new container.
    #[must_use]
    pub fn with_filter_engine(mut self, engine: Arc<dyn FilterEngine>) -> Self {
        self.filter_engine = Some(engine);
        self
    }
}

impl ContainerFactory for MemoryContainerFactory {
    fn create(&self, name: &str) -> Option<Arc<dyn Container>> {
        if let Some(allowed) = &self.allowed {
            if !allowed.contains(name) {
                return None;
            }
        }
        let mut container = MemoryContainer::new(name);
        if let Some(engine) = &self.filter_engine {
            container = container.with_filter_engine(engine.clone());
        }
        Some(Arc::new(container))
    }
}

// ---------------------------------------------------------------------------
// Database
// ---------------------------------------------------------------------------

/// Registry of containers plus database-wide collaborators.
pub struct Database {
    config: DatabaseConfig,
    containers: DashMap<String, Arc<dyn Container>>,
    factory: Box<dyn ContainerFactory>,
    schema: Option<Arc<dyn SchemaValidator>>,
    service: Arc<dyn DatabaseService>,
}

impl Database {
    /// A database over the given factory.
    pub fn new(config: DatabaseConfig, factory: Box<dyn ContainerFactory>) -> Self {
        Self {
            config,
            containers: DashMap::new(),
            factory,
            schema: None,
            service: Arc::new(DefaultDatabaseService),
        }
    }

    /// An in-memory database with default configuration.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(
            DatabaseConfig::default(),
            Box::new(MemoryContainerFactory::new()),
        )
    }

    /// Attach a schema validator.
    #[must_use]
    pub fn with_schema(mut self, schema: Arc<dyn SchemaValidator>) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Replace the database service hooks.
    #[must_use]
    pub fn with_service(mut self, service: Arc<dyn DatabaseService>) -> Self {
        self.service = service;
        self
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    pub fn schema(&self) -> Option<&Arc<dyn SchemaValidator>> {
        self.schema.as_ref()
    }

    pub fn service(&self) -> Arc<dyn DatabaseService> {
        self.service.clone()
    }

    /// Look up an already-materialized container. Side-effect free; used by
    /// the executor's classification.
    #[must_use]
    pub fn lookup_container(&self, name: &str) -> Option<Arc<dyn Container>> {
        self.containers.get(name).map(|entry| entry.value().clone())
    }

    /// Resolve a container, materializing it through the factory on first
    /// use. `None` means the container cannot exist in this database.
    #[must_use]
    pub fn get_or_create_container(&self, name: &str) -> Option<Arc<dyn Container>> {
        if let Some(existing) = self.lookup_container(name) {
            return Some(existing);
        }
        let created = self.factory.create(name)?;
        let entry = self
            .containers
            .entry(name.to_string())
            .or_insert(created)
            .clone();
        Some(entry)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
