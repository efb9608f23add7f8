//! Dispatch from manifest sections to their reconciliation logic.
//!
//! Handlers are registered explicitly at process start against the section
//! id they consume; there is no global registry and no registration-order
//! dependency. Sections absent from the manifest are simply not run.

use async_trait::async_trait;
use log::info;

use crate::error::Result;
use crate::gocd::GoCdClient;
use crate::manifest::Manifest;
use crate::reconcile::Reconciler;
use crate::spec::PipelineSpec;

/// Per-invocation overrides applied to each section before it runs.
#[derive(Debug, Clone, Default)]
pub struct RunContext {
    pub branch: Option<String>,
    pub purge: bool,
}

#[async_trait]
pub trait SectionHandler {
    async fn run(&self, section: &Manifest) -> Result<()>;
}

/// Explicit mapping from manifest section id to handler, built once and
/// passed to whoever dispatches a manifest. Handlers run in registration
/// order.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: Vec<(&'static str, Box<dyn SectionHandler + Send + Sync>)>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        mut self,
        id: &'static str,
        handler: impl SectionHandler + Send + Sync + 'static,
    ) -> Self {
        self.handlers.push((id, Box::new(handler)));
        self
    }

    /// Run every registered handler whose section appears in the manifest.
    /// Returns how many sections ran; the first failure aborts the pass.
    pub async fn run_all(&self, manifest: &Manifest, ctx: &RunContext) -> Result<usize> {
        let mut ran = 0;
        for (id, handler) in &self.handlers {
            let Some(mut section) = manifest.section(id) else {
                continue;
            };

            if let Some(branch) = &ctx.branch {
                section.set("branch", serde_json::json!(branch));
            }
            if ctx.purge {
                section.set("purge", serde_json::json!(true));
            }

            info!("running manifest section {id}");
            handler.run(&section).await?;
            ran += 1;
        }
        Ok(ran)
    }
}

/// Handler for `gocd.pipeline.create`: reconciles one pipeline and its
/// group membership.
pub struct PipelineCreateHandler {
    client: GoCdClient,
}

impl PipelineCreateHandler {
    pub fn new(client: GoCdClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SectionHandler for PipelineCreateHandler {
    async fn run(&self, section: &Manifest) -> Result<()> {
        let spec = PipelineSpec::from_section(section)?;
        let outcome = Reconciler::new(&self.client).reconcile(&spec).await?;
        info!("pipeline {}: {outcome:?}", spec.name);
        Ok(())
    }
}
