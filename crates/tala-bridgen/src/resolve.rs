//! Peer graph resolver
//!
//! Runs purely in memory over the scanned catalogue: links activation
//! constructor ancestors, resolves base JNI names, and groups peers that
//! share one JNI name into alias sets. Nothing here hard-fails; every
//! fallback is recorded as a diagnostic.

use rustc_hash::FxHashMap;
use tracing::{debug, warn};

use crate::diagnostics::Diagnostics;
use crate::names;
use crate::peer::{AliasGroup, PeerCatalog};

/// Resolve the catalogue in place.
pub fn resolve(catalog: &mut PeerCatalog, diags: &mut Diagnostics) {
    let by_managed: FxHashMap<String, usize> = catalog
        .peers
        .iter()
        .enumerate()
        .map(|(i, p)| (p.managed_name.clone(), i))
        .collect();

    resolve_activation_ancestors(catalog, &by_managed, diags);
    resolve_base_jni_names(catalog, &by_managed, diags);
    group_aliases(catalog);
}

/// Walk each base chain until an ancestor with its own activation
/// constructor is found. A chain that leaves the catalogue ends with the
/// assumption that the last known base declares one.
fn resolve_activation_ancestors(
    catalog: &mut PeerCatalog,
    by_managed: &FxHashMap<String, usize>,
    diags: &mut Diagnostics,
) {
    for index in 0..catalog.peers.len() {
        let peer = &catalog.peers[index];
        if peer.has_activation_ctor || peer.is_interface {
            continue;
        }
        let Some(mut current) = peer.base_managed.clone() else {
            continue;
        };
        let peer_name = peer.managed_name.clone();

        let ancestor = loop {
            match by_managed.get(&current.0) {
                Some(&base_index) => {
                    let base = &catalog.peers[base_index];
                    if base.has_activation_ctor {
                        break Some((base.managed_name.clone(), base.module.clone()));
                    }
                    match &base.base_managed {
                        Some(next) => current = next.clone(),
                        None => break None,
                    }
                }
                None => {
                    // The chain left the catalogue; assume the last known
                    // base declares an activation constructor
                    diags.note(format!(
                        "{peer_name}: assuming out-of-catalogue base {} declares an \
                         activation constructor",
                        current.0
                    ));
                    break Some(current);
                }
            }
        };

        if let Some(ancestor) = &ancestor {
            debug!("{peer_name}: activation constructor from {}", ancestor.0);
        }
        catalog.peers[index].activation_ancestor = ancestor;
    }
}

/// Look each base's JNI name up in the catalogue; a base outside the
/// catalogue defaults to the universal native root.
fn resolve_base_jni_names(
    catalog: &mut PeerCatalog,
    by_managed: &FxHashMap<String, usize>,
    diags: &mut Diagnostics,
) {
    for index in 0..catalog.peers.len() {
        let peer = &catalog.peers[index];
        if peer.is_interface {
            continue;
        }
        let Some((base_name, _)) = peer.base_managed.clone() else {
            continue;
        };

        let resolved = match by_managed.get(&base_name) {
            Some(&base_index) => catalog.peers[base_index].jni_name.clone(),
            None => {
                warn!(
                    "{}: base type {} not in catalogue, defaulting to {}",
                    peer.managed_name,
                    base_name,
                    names::JAVA_OBJECT
                );
                diags.warn(format!(
                    "{}: base type {} not in catalogue, defaulting to {}",
                    peer.managed_name,
                    base_name,
                    names::JAVA_OBJECT
                ));
                names::JAVA_OBJECT.to_string()
            }
        };
        catalog.peers[index].base_jni_name = Some(resolved);
    }
}

/// Group peers sharing one JNI name. Invoker companions are excluded; they
/// intentionally share their interface's name.
fn group_aliases(catalog: &mut PeerCatalog) {
    let mut order: Vec<String> = Vec::new();
    let mut groups: FxHashMap<String, Vec<usize>> = FxHashMap::default();

    for (index, peer) in catalog.peers.iter().enumerate() {
        if peer.is_invoker() {
            continue;
        }
        let members = groups.entry(peer.jni_name.clone()).or_default();
        if members.is_empty() {
            order.push(peer.jni_name.clone());
        }
        members.push(index);
    }

    catalog.alias_groups = order
        .into_iter()
        .filter_map(|jni_name| {
            let members = groups.remove(&jni_name)?;
            if members.len() < 2 {
                return None;
            }
            let marker_type_name = format!(
                "{}_Aliases",
                catalog.peers[members[0]].managed_name.replace(['.', '+'], "_")
            );
            Some(AliasGroup {
                jni_name,
                members,
                marker_type_name,
            })
        })
        .collect();
}
