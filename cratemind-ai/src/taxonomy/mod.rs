//! Hierarchical genre taxonomy
//!
//! Nodes carry tempo and energy ranges; a child without its own bounds
//! inherits its parent's. The tree is built with a two-pass load (insert all
//! nodes, then link parents) so declaration order does not matter.
//!
//! `classify` returns every node whose ranges contain the track's tempo and
//! energy, deepest first, then narrowest, then by slug. An empty list means
//! unclassified, which is not an error.
//!
//! The tree is read-mostly: classification takes the read side of
//! [`SharedTaxonomy`], administrative edits take the write side.

pub mod node;
pub mod seed;

pub use node::{GenreDefinition, GenreNode, GenreTree, Range};

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Taxonomy shared between the orchestrator and the API
pub type SharedTaxonomy = Arc<RwLock<GenreTaxonomy>>;

pub fn shared(taxonomy: GenreTaxonomy) -> SharedTaxonomy {
    Arc::new(RwLock::new(taxonomy))
}

#[derive(Debug, Error)]
pub enum TaxonomyError {
    #[error("Genre slug must not be empty (name '{0}')")]
    InvalidSlug(String),

    #[error("Genre already exists: {0}")]
    DuplicateSlug(String),

    #[error("Unknown genre: {0}")]
    UnknownSlug(String),

    #[error("Unknown parent genre '{parent}' for '{slug}'")]
    UnknownParent { slug: String, parent: String },

    #[error("Genre hierarchy would contain a cycle at '{0}'")]
    Cycle(String),

    #[error("Genre '{slug}' has no {field} range and no parent to inherit one from")]
    MissingRange { slug: String, field: &'static str },

    #[error("Genre '{slug}' has invalid {field} range [{min}, {max}]")]
    InvalidRange {
        slug: String,
        field: &'static str,
        min: f64,
        max: f64,
    },

    #[error("Invalid genre seed: {0}")]
    Seed(String),
}

/// The genre tree
#[derive(Debug, Clone, Default)]
pub struct GenreTaxonomy {
    nodes: HashMap<String, GenreNode>,
    /// Declaration order, used for deterministic listings
    order: Vec<String>,
}

impl GenreTaxonomy {
    /// Build the tree from an ordered definition list
    ///
    /// Later duplicates of a slug are skipped and a parent that does not exist
    /// makes the node a root; both are logged. A parent cycle is an error.
    pub fn from_definitions(definitions: Vec<GenreDefinition>) -> Result<Self, TaxonomyError> {
        // Pass 1: insert
        let mut pending: HashMap<String, GenreDefinition> = HashMap::new();
        let mut order = Vec::new();
        for def in definitions {
            if def.slug.trim().is_empty() {
                return Err(TaxonomyError::InvalidSlug(def.name));
            }
            if pending.contains_key(&def.slug) {
                warn!(slug = %def.slug, "Duplicate genre slug, keeping first definition");
                continue;
            }
            order.push(def.slug.clone());
            pending.insert(def.slug.clone(), def);
        }

        // Pass 2: link
        let mut parents: HashMap<String, Option<String>> = HashMap::new();
        for slug in &order {
            let parent = match pending[slug].parent_slug.as_deref() {
                Some(p) if p == slug || !pending.contains_key(p) => {
                    warn!(slug = %slug, parent = %p, "Unknown parent genre, treating as root");
                    None
                }
                other => other.map(str::to_string),
            };
            parents.insert(slug.clone(), parent);
        }

        for slug in &order {
            let mut seen = HashSet::new();
            let mut current = Some(slug);
            while let Some(s) = current {
                if !seen.insert(s) {
                    return Err(TaxonomyError::Cycle(slug.clone()));
                }
                current = parents.get(s).and_then(|p| p.as_ref());
            }
        }

        let mut children: HashMap<String, Vec<String>> = HashMap::new();
        for slug in &order {
            if let Some(parent) = &parents[slug] {
                children.entry(parent.clone()).or_default().push(slug.clone());
            }
        }

        // Resolve ranges top-down so inheritance sees resolved parents
        let mut nodes: HashMap<String, GenreNode> = HashMap::new();
        let mut queue: VecDeque<String> = order
            .iter()
            .filter(|s| parents[*s].is_none())
            .cloned()
            .collect();
        while let Some(slug) = queue.pop_front() {
            let Some(def) = pending.remove(&slug) else {
                continue;
            };
            let node = {
                let parent = parents[&slug].as_ref().and_then(|p| nodes.get(p));
                GenreNode::resolve(def, parent, children.remove(&slug).unwrap_or_default())?
            };
            queue.extend(node.children.iter().cloned());
            nodes.insert(slug, node);
        }

        Ok(Self { nodes, order })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, slug: &str) -> Option<&GenreNode> {
        self.nodes.get(slug)
    }

    fn require(&self, slug: &str) -> Result<&GenreNode, TaxonomyError> {
        self.nodes
            .get(slug)
            .ok_or_else(|| TaxonomyError::UnknownSlug(slug.to_string()))
    }

    /// All nodes in declaration order
    pub fn iter(&self) -> impl Iterator<Item = &GenreNode> {
        self.order.iter().filter_map(|s| self.nodes.get(s))
    }

    pub fn roots(&self) -> Vec<&GenreNode> {
        self.iter().filter(|n| n.parent_slug.is_none()).collect()
    }

    pub fn children(&self, slug: &str) -> Result<Vec<&GenreNode>, TaxonomyError> {
        let node = self.require(slug)?;
        Ok(node.children.iter().filter_map(|c| self.nodes.get(c)).collect())
    }

    /// Path from the root down to `slug`, inclusive
    pub fn lineage(&self, slug: &str) -> Result<Vec<&GenreNode>, TaxonomyError> {
        let mut current = self.require(slug)?;
        let mut path = vec![current];
        while let Some(parent) = current
            .parent_slug
            .as_deref()
            .and_then(|p| self.nodes.get(p))
        {
            path.push(parent);
            current = parent;
        }
        path.reverse();
        Ok(path)
    }

    /// Every node below `slug`, breadth-first
    pub fn descendants(&self, slug: &str) -> Result<Vec<&GenreNode>, TaxonomyError> {
        let root = self.require(slug)?;
        let mut out = Vec::new();
        let mut queue: VecDeque<&str> = root.children.iter().map(String::as_str).collect();
        while let Some(s) = queue.pop_front() {
            if let Some(node) = self.nodes.get(s) {
                queue.extend(node.children.iter().map(String::as_str));
                out.push(node);
            }
        }
        Ok(out)
    }

    /// Nested view of the whole forest
    pub fn tree(&self) -> Vec<GenreTree> {
        self.roots().into_iter().map(|n| self.subtree(n)).collect()
    }

    fn subtree(&self, node: &GenreNode) -> GenreTree {
        GenreTree {
            slug: node.slug.clone(),
            name: node.name.clone(),
            tempo: node.tempo,
            energy: node.energy,
            children: node
                .children
                .iter()
                .filter_map(|c| self.nodes.get(c))
                .map(|c| self.subtree(c))
                .collect(),
        }
    }

    /// Candidate genres for a tempo/energy pair, best first
    pub fn classify(&self, tempo: f64, energy: f64) -> Vec<&GenreNode> {
        let mut candidates: Vec<&GenreNode> =
            self.nodes.values().filter(|n| n.matches(tempo, energy)).collect();

        candidates.sort_by(|a, b| {
            b.depth
                .cmp(&a.depth)
                .then_with(|| a.span().partial_cmp(&b.span()).unwrap_or(Ordering::Equal))
                .then_with(|| a.slug.cmp(&b.slug))
        });
        candidates
    }

    /// Best match, or `None` when unclassified or energy is unknown
    pub fn best_match(&self, tempo: f64, energy: Option<f64>) -> Option<&GenreNode> {
        let energy = energy?;
        self.classify(tempo, energy).into_iter().next()
    }

    /// Add a node under an existing parent (or as a root)
    pub fn insert(&mut self, def: GenreDefinition) -> Result<&GenreNode, TaxonomyError> {
        if def.slug.trim().is_empty() {
            return Err(TaxonomyError::InvalidSlug(def.name));
        }
        if self.nodes.contains_key(&def.slug) {
            return Err(TaxonomyError::DuplicateSlug(def.slug));
        }

        let parent = match def.parent_slug.as_deref() {
            Some(p) => Some(self.nodes.get(p).ok_or_else(|| TaxonomyError::UnknownParent {
                slug: def.slug.clone(),
                parent: p.to_string(),
            })?),
            None => None,
        };

        let node = GenreNode::resolve(def, parent, Vec::new())?;
        let slug = node.slug.clone();
        if let Some(parent) = node.parent_slug.as_ref().and_then(|p| self.nodes.get_mut(p)) {
            parent.children.push(slug.clone());
        }

        info!(slug = %slug, parent = ?node.parent_slug, "Genre inserted");
        self.order.push(slug.clone());
        self.nodes.insert(slug.clone(), node);
        self.require(&slug)
    }

    /// Move a node (with its subtree) under a new parent, or make it a root
    ///
    /// The node keeps its own ranges.
    pub fn reparent(&mut self, slug: &str, new_parent: Option<&str>) -> Result<(), TaxonomyError> {
        let old_parent = self.require(slug)?.parent_slug.clone();

        let new_depth = match new_parent {
            Some(p) => {
                let parent = self.nodes.get(p).ok_or_else(|| TaxonomyError::UnknownParent {
                    slug: slug.to_string(),
                    parent: p.to_string(),
                })?;
                if p == slug || self.descendants(slug)?.iter().any(|d| d.slug == p) {
                    return Err(TaxonomyError::Cycle(slug.to_string()));
                }
                parent.depth + 1
            }
            None => 0,
        };

        if let Some(old) = old_parent.as_ref().and_then(|p| self.nodes.get_mut(p)) {
            old.children.retain(|c| c != slug);
        }
        if let Some(new) = new_parent.and_then(|p| self.nodes.get_mut(p)) {
            new.children.push(slug.to_string());
        }
        if let Some(node) = self.nodes.get_mut(slug) {
            node.parent_slug = new_parent.map(str::to_string);
        }

        // Refresh depths below the moved node
        let mut queue = VecDeque::from([(slug.to_string(), new_depth)]);
        while let Some((s, depth)) = queue.pop_front() {
            if let Some(node) = self.nodes.get_mut(&s) {
                node.depth = depth;
                queue.extend(node.children.iter().map(|c| (c.clone(), depth + 1)));
            }
        }

        info!(slug = %slug, from = ?old_parent, to = ?new_parent, "Genre reparented");
        Ok(())
    }
}
