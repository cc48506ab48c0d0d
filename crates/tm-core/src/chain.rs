//! Snapshot chain resolution.
//!
//! Every unit folder carries a snapshot document with its own `id` and the
//! `prevId` of the unit it was generated after. Those parent pointers form a
//! forest rooted at units whose `prevId` is the ROOT sentinel. The chain is the
//! pre-order walk of that forest, visiting siblings (branch points) in
//! ascending timestamp order.
//!
//! Resolution is lenient: unparsable snapshots are skipped, and units whose
//! `prevId` points at a missing unit are left out together with everything
//! chained after them. Both conditions are logged, and the unreachable units
//! are available from [`Chain::orphans`].

use crate::snapshot::{is_root_id, SnapshotHeader, SNAPSHOT_FILE};
use crate::unit::parse_created_at;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// One unit's position in the snapshot graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainLink {
    /// Unit identifier
    pub id: String,

    /// Parent identifier (or the ROOT sentinel)
    pub prev_id: String,

    /// Unit folder name
    pub folder: String,

    /// Timestamp prefix of the folder name, if it has one
    pub created_at_millis: Option<i64>,
}

impl ChainLink {
    /// Sibling ordering: timestamp first, untimestamped folders last, folder name as tie-break.
    fn sort_key(&self) -> (bool, i64, &str) {
        (
            self.created_at_millis.is_none(),
            self.created_at_millis.unwrap_or_default(),
            &self.folder,
        )
    }
}

/// The resolved total order of units in one migrations directory
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Chain {
    links: Vec<ChainLink>,
    orphans: Vec<ChainLink>,
}

impl Chain {
    /// Unit identifiers in application order.
    pub fn ids(&self) -> Vec<String> {
        self.links.iter().map(|l| l.id.clone()).collect()
    }

    /// Chained units in application order.
    pub fn links(&self) -> &[ChainLink] {
        &self.links
    }

    /// Units that were found on disk but are not reachable from any root.
    pub fn orphans(&self) -> &[ChainLink] {
        &self.orphans
    }

    /// The most recent unit of the chain.
    pub fn last(&self) -> Option<&ChainLink> {
        self.links.last()
    }

    /// Whether a unit with this id is part of the chain.
    pub fn contains(&self, id: &str) -> bool {
        self.links.iter().any(|l| l.id == id)
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}

/// Resolve the application order of the units stored under `dir`.
///
/// A missing or empty directory resolves to an empty chain.
pub fn resolve_chain(dir: &Path) -> Chain {
    let candidates = scan_links(dir);
    if candidates.is_empty() {
        log::debug!("No migration units found in {}", dir.display());
        return Chain::default();
    }

    let mut graph: DiGraph<usize, ()> =
        DiGraph::with_capacity(candidates.len(), candidates.len());
    let mut node_map: HashMap<&str, NodeIndex> = HashMap::with_capacity(candidates.len());
    for (i, link) in candidates.iter().enumerate() {
        let idx = graph.add_node(i);
        node_map.insert(link.id.as_str(), idx);
    }

    let mut roots = Vec::new();
    for link in &candidates {
        let child = node_map[link.id.as_str()];
        if is_root_id(&link.prev_id) {
            roots.push(child);
        } else if let Some(&parent) = node_map.get(link.prev_id.as_str()) {
            graph.add_edge(parent, child, ());
        }
    }

    if roots.is_empty() {
        log::warn!(
            "No root migration (prevId = {}) found in {}; resolved chain is empty",
            crate::snapshot::ROOT_ID,
            dir.display()
        );
        return Chain {
            links: Vec::new(),
            orphans: candidates,
        };
    }

    let by_key = |a: &NodeIndex, b: &NodeIndex| {
        candidates[graph[*a]]
            .sort_key()
            .cmp(&candidates[graph[*b]].sort_key())
    };
    roots.sort_by(by_key);

    // Explicit work stack: children are pushed in reverse so the earliest
    // sibling is popped (and fully walked) first.
    let mut order = Vec::with_capacity(candidates.len());
    let mut visited = HashSet::with_capacity(candidates.len());
    let mut stack: Vec<NodeIndex> = roots.into_iter().rev().collect();
    while let Some(node) = stack.pop() {
        if !visited.insert(node) {
            continue;
        }
        order.push(graph[node]);

        let mut children: Vec<NodeIndex> = graph
            .neighbors_directed(node, Direction::Outgoing)
            .collect();
        children.sort_by(by_key);
        stack.extend(children.into_iter().rev());
    }

    let reached: HashSet<usize> = order.iter().copied().collect();
    let orphans: Vec<ChainLink> = candidates
        .iter()
        .enumerate()
        .filter(|(i, _)| !reached.contains(i))
        .map(|(_, l)| l.clone())
        .collect();

    if !orphans.is_empty() {
        let detail: Vec<String> = orphans
            .iter()
            .map(|l| format!("{} (prevId {})", l.folder, l.prev_id))
            .collect();
        log::warn!(
            "Broken migration chain in {}: {} unit(s) not reachable from a root were skipped: {}",
            dir.display(),
            orphans.len(),
            detail.join(", ")
        );
    }

    let links = order.into_iter().map(|i| candidates[i].clone()).collect();
    Chain { links, orphans }
}

/// Collect a link for every subdirectory holding a parseable snapshot document.
///
/// Results are sorted by folder name; of two folders claiming the same id,
/// the first one wins.
fn scan_links(dir: &Path) -> Vec<ChainLink> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                log::warn!("Cannot read migrations directory {}: {}", dir.display(), e);
            }
            return Vec::new();
        }
    };

    let mut folders: Vec<String> = entries
        .filter_map(Result::ok)
        .filter(|e| e.path().join(SNAPSHOT_FILE).is_file())
        .filter_map(|e| e.file_name().to_str().map(str::to_string))
        .collect();
    folders.sort();

    let mut seen = HashSet::new();
    let mut links = Vec::with_capacity(folders.len());
    for folder in folders {
        let path = dir.join(&folder).join(SNAPSHOT_FILE);
        let header = match SnapshotHeader::read(&path) {
            Ok(h) => h,
            Err(e) => {
                log::warn!("Skipping migration {}: {}", folder, e);
                continue;
            }
        };
        if !seen.insert(header.id.clone()) {
            log::warn!(
                "Skipping migration {}: id {} is already used by another folder",
                folder,
                header.id
            );
            continue;
        }
        links.push(ChainLink {
            created_at_millis: parse_created_at(&folder),
            id: header.id,
            prev_id: header.prev_id,
            folder,
        });
    }
    links
}

#[cfg(test)]
#[path = "chain_test.rs"]
mod tests;
