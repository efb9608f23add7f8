use crate::gocd::types::{GroupDocument, GroupMember};

/// Produce a group document with the membership list rewritten.
///
/// `remove` is dropped from the list, `add` is appended when absent; `name`
/// and every pass-through field are copied verbatim. Pure and total: a
/// no-op add or remove is silently absorbed, and passing both performs a
/// migration-style rewrite in one call.
pub fn transform(doc: &GroupDocument, add: Option<&str>, remove: Option<&str>) -> GroupDocument {
    let mut pipelines: Vec<GroupMember> = doc
        .pipelines
        .iter()
        .filter(|m| remove != Some(m.name.as_str()))
        .map(|m| GroupMember::new(&m.name))
        .collect();

    if let Some(add) = add {
        if !pipelines.iter().any(|m| m.name == add) {
            pipelines.push(GroupMember::new(add));
        }
    }

    GroupDocument {
        name: doc.name.clone(),
        pipelines,
        extra: doc.extra.clone(),
    }
}
