//! Grouping of a certification's domains under their top-level parents.

use std::collections::BTreeMap;

use prep_core::model::{Domain, DomainId};

/// A top-level domain plus every domain nested beneath it (itself included).
#[derive(Debug, Clone, PartialEq)]
pub struct DomainGroup {
    pub domain: Domain,
    pub member_ids: Vec<DomainId>,
}

/// Fold nested domains into their top-level ancestor, keeping input order.
///
/// A domain whose parent is missing from `domains` is treated as top-level.
#[must_use]
pub fn top_level_groups(domains: &[Domain]) -> Vec<DomainGroup> {
    let parents: BTreeMap<DomainId, Option<DomainId>> =
        domains.iter().map(|d| (d.id, d.parent_id)).collect();

    let mut groups: Vec<DomainGroup> = Vec::new();
    let mut index: BTreeMap<DomainId, usize> = BTreeMap::new();
    for domain in domains {
        if root_of(domain.id, &parents) == domain.id {
            index.insert(domain.id, groups.len());
            groups.push(DomainGroup {
                domain: domain.clone(),
                member_ids: vec![domain.id],
            });
        }
    }

    for domain in domains {
        let root = root_of(domain.id, &parents);
        if root == domain.id {
            continue;
        }
        if let Some(&slot) = index.get(&root) {
            groups[slot].member_ids.push(domain.id);
        }
    }

    groups
}

fn root_of(id: DomainId, parents: &BTreeMap<DomainId, Option<DomainId>>) -> DomainId {
    let mut current = id;
    // Bounded walk; a parent cycle stops at the step limit.
    for _ in 0..parents.len() {
        match parents.get(&current).copied().flatten() {
            Some(parent) if parents.contains_key(&parent) => current = parent,
            _ => break,
        }
    }
    current
}
