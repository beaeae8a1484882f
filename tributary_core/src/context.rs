//! Per-job sync context assembly.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::instrument;
use tributary_graph::{NodeType, SyncDagDefinition, SyncDagRouter, ValidatedDag};
use uuid::Uuid;

use crate::connectors::{Destination, EmbeddingModel, EntityDefinition, Source, TransformerFn};
use crate::factory::ConnectorFactory;
use crate::models::{Actor, Sync, SyncJob, WhiteLabel};
use crate::progress::{DEFAULT_PUBLISH_THRESHOLD, ProgressPublisher, SyncProgress};
use crate::{Error, Result};

/// Everything one sync job needs to run. Read-only once assembled; only the
/// progress counters change.
pub struct SyncContext {
    source: Arc<dyn Source>,
    destination: Arc<dyn Destination>,
    embedding_model: Arc<dyn EmbeddingModel>,
    transformers: HashMap<String, TransformerFn>,
    entity_definitions: HashMap<Uuid, Arc<EntityDefinition>>,
    sync: Sync,
    sync_job: SyncJob,
    dag: ValidatedDag,
    progress: Arc<SyncProgress>,
    router: SyncDagRouter,
    white_label: Option<WhiteLabel>,
}

impl SyncContext {
    pub fn source(&self) -> &Arc<dyn Source> {
        &self.source
    }

    pub fn destination(&self) -> &Arc<dyn Destination> {
        &self.destination
    }

    pub fn embedding_model(&self) -> &Arc<dyn EmbeddingModel> {
        &self.embedding_model
    }

    /// Transformer callables keyed by method name.
    pub fn transformers(&self) -> &HashMap<String, TransformerFn> {
        &self.transformers
    }

    pub fn transformer(&self, name: &str) -> Option<&TransformerFn> {
        self.transformers.get(name)
    }

    /// Entity schemas keyed by entity-definition id.
    pub fn entity_definitions(&self) -> &HashMap<Uuid, Arc<EntityDefinition>> {
        &self.entity_definitions
    }

    pub fn sync(&self) -> &Sync {
        &self.sync
    }

    pub fn sync_job(&self) -> &SyncJob {
        &self.sync_job
    }

    pub fn dag(&self) -> &ValidatedDag {
        &self.dag
    }

    pub fn progress(&self) -> &Arc<SyncProgress> {
        &self.progress
    }

    pub fn router(&self) -> &SyncDagRouter {
        &self.router
    }

    pub fn white_label(&self) -> Option<&WhiteLabel> {
        self.white_label.as_ref()
    }
}

impl std::fmt::Debug for SyncContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut transformers: Vec<&String> = self.transformers.keys().collect();
        transformers.sort();
        f.debug_struct("SyncContext")
            .field("sync_id", &self.sync.id)
            .field("sync_job_id", &self.sync_job.id)
            .field("source", &self.source.short_name())
            .field("destination", &self.destination.short_name())
            .field("embedding_model", &self.embedding_model.model_name())
            .field("transformers", &transformers)
            .field("entity_definitions", &self.entity_definitions.len())
            .field("white_label", &self.white_label.as_ref().map(|w| &w.name))
            .finish()
    }
}

/// The DAG must be the sync's own and read from the sync's source connection.
/// Checked before any credential is touched.
fn check_dag_matches_sync(dag_definition: &SyncDagDefinition, sync: &Sync) -> Result<()> {
    if dag_definition.sync_id != sync.id {
        return Err(Error::InvalidInput(format!(
            "dag '{}' belongs to sync '{}', not '{}'",
            dag_definition.id, dag_definition.sync_id, sync.id
        )));
    }
    for node in dag_definition
        .nodes
        .iter()
        .filter(|n| n.node_type == NodeType::Source)
    {
        if node.connection_id != Some(sync.source_connection_id) {
            return Err(Error::InvalidInput(format!(
                "source node '{}' does not read from the sync's source connection '{}'",
                node.id, sync.source_connection_id
            )));
        }
    }
    Ok(())
}

/// Builds a `SyncContext` per sync job.
#[derive(Clone)]
pub struct SyncContextAssembler {
    factory: ConnectorFactory,
    publisher: Arc<dyn ProgressPublisher>,
    publish_threshold: u64,
}

impl SyncContextAssembler {
    pub fn new(factory: ConnectorFactory, publisher: Arc<dyn ProgressPublisher>) -> Self {
        Self {
            factory,
            publisher,
            publish_threshold: DEFAULT_PUBLISH_THRESHOLD,
        }
    }

    pub fn with_publish_threshold(mut self, threshold: u64) -> Self {
        self.publish_threshold = threshold;
        self
    }

    pub fn factory(&self) -> &ConnectorFactory {
        &self.factory
    }

    /// Assemble the context for `sync_job`. The first failing step aborts the
    /// assembly; no partial context is returned.
    #[instrument(
        level = "info",
        skip_all,
        fields(sync_id = %sync.id, sync_job_id = %sync_job.id, org_id = %actor.org_id)
    )]
    pub async fn assemble(
        &self,
        sync: Sync,
        sync_job: SyncJob,
        dag_definition: &SyncDagDefinition,
        actor: &Actor,
        white_label: Option<WhiteLabel>,
    ) -> Result<SyncContext> {
        if sync_job.sync_id != sync.id {
            return Err(Error::InvalidInput(format!(
                "sync job '{}' belongs to sync '{}', not '{}'",
                sync_job.id, sync_job.sync_id, sync.id
            )));
        }
        check_dag_matches_sync(dag_definition, &sync)?;

        let source = self
            .factory
            .create_source(sync.source_connection_id, actor)
            .await?;
        let embedding_model = self.factory.create_embedding_model(&sync, actor).await?;
        let destination = self
            .factory
            .create_destination(&sync, embedding_model.clone(), actor)
            .await?;

        let transformers = self.load_transformers(&sync, actor).await?;
        let entity_definitions = self.load_entity_definitions(&sync, actor).await?;

        let dag = tributary_graph::validate(dag_definition)?;
        let progress = Arc::new(
            SyncProgress::new(sync_job.id, self.publisher.clone())
                .with_publish_threshold(self.publish_threshold),
        );
        let router = SyncDagRouter::new(&dag);

        tracing::info!(
            source = source.short_name(),
            destination = destination.short_name(),
            embedding_model = embedding_model.model_name(),
            transformers = transformers.len(),
            entity_definitions = entity_definitions.len(),
            nodes = dag.topological_order().len(),
            "sync context assembled"
        );

        Ok(SyncContext {
            source,
            destination,
            embedding_model,
            transformers,
            entity_definitions,
            sync,
            sync_job,
            dag,
            progress,
            router,
            white_label,
        })
    }

    async fn load_transformers(
        &self,
        sync: &Sync,
        actor: &Actor,
    ) -> Result<HashMap<String, TransformerFn>> {
        let descriptors = self.factory.store().list_transformers(sync.id, actor).await?;
        let mut out = HashMap::with_capacity(descriptors.len());
        for descriptor in descriptors {
            let callable = self
                .factory
                .registry()
                .resolve_transformer(&descriptor.module_name, &descriptor.method_name)?;
            out.insert(descriptor.method_name, callable);
        }
        Ok(out)
    }

    async fn load_entity_definitions(
        &self,
        sync: &Sync,
        actor: &Actor,
    ) -> Result<HashMap<Uuid, Arc<EntityDefinition>>> {
        let descriptors = self
            .factory
            .store()
            .list_entity_definitions(sync.id, actor)
            .await?;
        let mut out = HashMap::with_capacity(descriptors.len());
        for descriptor in descriptors {
            let definition = self
                .factory
                .registry()
                .resolve_entity_definition(&descriptor.module_name, &descriptor.class_name)?;
            out.insert(descriptor.id, definition);
        }
        Ok(out)
    }
}
