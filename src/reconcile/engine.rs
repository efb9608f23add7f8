//! The reconciliation state machine.
//!
//! One run is a strictly sequential chain of conditional remote calls:
//! gate check, then purge or probe, then one of the create/update/migrate
//! flows. Migration is two independent conditional writes (remove from the
//! owning group, add to the target group), not a transaction; a failure in
//! between leaves the pipeline temporarily group-less and the next run
//! converges. The first error aborts the flow with nothing rolled back.

use log::info;
use serde_json::Value;

use crate::error::Result;
use crate::gocd::client::GoCdClient;
use crate::gocd::types::Fetched;
use crate::spec::PipelineSpec;

use super::gate::BranchGate;
use super::resolver::locate_group;
use super::transform::transform;

/// Terminal state of a successful run.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Branch not in the allow-list; no remote call was made.
    Skipped,
    Created,
    Updated,
    Migrated { from: String },
    Deleted,
}

pub struct Reconciler<'a> {
    client: &'a GoCdClient,
}

impl<'a> Reconciler<'a> {
    pub fn new(client: &'a GoCdClient) -> Self {
        Self { client }
    }

    /// Drive the remote platform toward `spec`. Stateless and idempotent:
    /// re-running with an unchanged spec and unchanged remote state lands in
    /// the same terminal state.
    pub async fn reconcile(&self, spec: &PipelineSpec) -> Result<Outcome> {
        let gate = BranchGate::new(&spec.branch_allow_list);
        if !gate.allows(&spec.branch) {
            info!(
                "branch {} not in allow-list, skipping pipeline {}",
                spec.branch, spec.name
            );
            return Ok(Outcome::Skipped);
        }

        if spec.purge {
            return self.delete_flow(spec).await;
        }

        match self.client.fetch_pipeline(&spec.name).await? {
            None => self.create_flow(spec).await,
            Some(current) => self.update_flow(spec, current).await,
        }
    }

    async fn create_flow(&self, spec: &PipelineSpec) -> Result<Outcome> {
        info!("creating pipeline {}", spec.name);
        self.client
            .create_pipeline(&spec.name, &spec.document)
            .await?;
        self.add_to_group(&spec.target_group, &spec.name).await?;
        self.client.unpause(&spec.name).await?;
        Ok(Outcome::Created)
    }

    async fn update_flow(&self, spec: &PipelineSpec, current: Fetched<Value>) -> Result<Outcome> {
        info!("updating pipeline {}", spec.name);
        self.client
            .update_pipeline(&spec.name, &spec.document, &current.etag)
            .await?;

        let groups = self.client.fetch_groups().await?;
        let owner = locate_group(&groups, &spec.name, &spec.dependency_names())?;

        let outcome = match owner {
            Some(owner) if owner.name != spec.target_group => {
                let from = owner.name.clone();
                info!(
                    "migrating pipeline {} from group {from} to {}",
                    spec.name, spec.target_group
                );
                self.remove_from_group(&from, &spec.name).await?;
                self.add_to_group(&spec.target_group, &spec.name).await?;
                Outcome::Migrated { from }
            }
            // no owning group yet, or already in the target: re-assert
            // membership with an idempotent add
            _ => {
                self.add_to_group(&spec.target_group, &spec.name).await?;
                Outcome::Updated
            }
        };

        self.client.unpause(&spec.name).await?;
        Ok(outcome)
    }

    async fn delete_flow(&self, spec: &PipelineSpec) -> Result<Outcome> {
        info!("purging pipeline {}", spec.name);
        let groups = self.client.fetch_groups().await?;
        if let Some(owner) = locate_group(&groups, &spec.name, &[])? {
            let owner_name = owner.name.clone();
            self.remove_from_group(&owner_name, &spec.name).await?;
        }

        let existed = self.client.delete_pipeline(&spec.name).await?;
        if !existed {
            info!("pipeline {} already absent", spec.name);
        }
        Ok(Outcome::Deleted)
    }

    /// Conditional read-modify-write adding `pipeline` to `group`. The group
    /// is shared with other pipelines; only the membership list changes.
    async fn add_to_group(&self, group: &str, pipeline: &str) -> Result<()> {
        let fetched = self.client.fetch_group(group).await?;
        let updated = transform(&fetched.document, Some(pipeline), None);
        self.client.update_group(&updated, &fetched.etag).await
    }

    async fn remove_from_group(&self, group: &str, pipeline: &str) -> Result<()> {
        let fetched = self.client.fetch_group(group).await?;
        let updated = transform(&fetched.document, None, Some(pipeline));
        self.client.update_group(&updated, &fetched.etag).await
    }
}
