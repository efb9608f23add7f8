use log::warn;

use crate::error::{ReconcileError, Result};
use crate::gocd::types::GroupDocument;

/// Locate the group that currently owns `pipeline`, and verify that every
/// required upstream dependency is co-located in it.
///
/// Returns `Ok(None)` when no group contains the pipeline (a new pipeline
/// has no prior membership; dependencies are not checked in that case).
/// Groups partition membership, so a pipeline showing up in more than one
/// group is a consistency violation on the platform side; it is logged and
/// the first owner wins.
pub fn locate_group<'a>(
    groups: &'a [GroupDocument],
    pipeline: &str,
    required: &[String],
) -> Result<Option<&'a GroupDocument>> {
    let mut owner: Option<&GroupDocument> = None;

    for group in groups {
        if !group.contains(pipeline) {
            continue;
        }
        match owner {
            None => owner = Some(group),
            Some(first) => warn!(
                "pipeline {pipeline} found in both {} and {}, keeping {}",
                first.name, group.name, first.name
            ),
        }
    }

    let Some(owner) = owner else {
        return Ok(None);
    };

    let missing: Vec<String> = required
        .iter()
        .filter(|dep| !owner.contains(dep))
        .cloned()
        .collect();

    if !missing.is_empty() {
        return Err(ReconcileError::DependencyMissing(missing));
    }

    Ok(Some(owner))
}
