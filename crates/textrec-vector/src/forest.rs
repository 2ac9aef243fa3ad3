//! Random-projection forest (Annoy-style) over dense vectors.
//!
//! Each tree recursively splits the items with a hyperplane chosen by a short
//! two-means run on a random pair of items, until a node holds at most
//! `leaf_size` items. Every item lands in exactly one leaf of every tree.
//!
//! Queries walk all trees at once, best-first by hyperplane margin, collect
//! distinct candidates until the budget is met, then re-rank them exactly.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::path::Path;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use textrec_core::error::{Error, Result};
use textrec_core::persist::{read_artifact, write_artifact, ArtifactKind};
use textrec_core::traits::VectorIndex;
use textrec_core::types::{Metric, Neighbor};
use tracing::{debug, info};

use crate::distance::{distance, dot, normalized};

const TWO_MEANS_ITERATIONS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForestOptions {
    pub n_trees: usize,
    pub metric: Metric,
    /// Largest number of items a leaf may hold.
    pub leaf_size: usize,
    pub seed: u64,
}

impl Default for ForestOptions {
    fn default() -> Self { Self { n_trees: 20, metric: Metric::Angular, leaf_size: 32, seed: 42 } }
}

impl ForestOptions {
    pub fn new(n_trees: usize, metric: Metric) -> Self { Self { n_trees, metric, ..Self::default() } }

    pub fn with_leaf_size(mut self, leaf_size: usize) -> Self {
        self.leaf_size = leaf_size;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Node {
    Leaf(Vec<u32>),
    /// Items with `normal·x + offset > 0` go right.
    Split { normal: Vec<f32>, offset: f32, left: u32, right: u32 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnoyIndex {
    dim: usize,
    metric: Metric,
    leaf_size: usize,
    /// Row-major, `len × dim`; row `i` is item `i`.
    vectors: Vec<f32>,
    nodes: Vec<Node>,
    roots: Vec<u32>,
}

/// Heap entry; larger priority is explored first.
struct Pending {
    priority: f32,
    node: u32,
}

impl PartialEq for Pending {
    fn eq(&self, other: &Self) -> bool { self.cmp(other) == Ordering::Equal }
}
impl Eq for Pending {}
impl PartialOrd for Pending {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> { Some(self.cmp(other)) }
}
impl Ord for Pending {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority.total_cmp(&other.priority).then_with(|| other.node.cmp(&self.node))
    }
}

impl AnnoyIndex {
    /// Build a forest over `vectors`; item `i` is `vectors[i]`.
    pub fn build(vectors: &[Vec<f32>], options: ForestOptions) -> Result<Self> {
        Self::build_with_progress(vectors, options, |_| {})
    }

    /// Like [`build`](Self::build), calling `on_tree` with the number of
    /// finished trees after each one.
    pub fn build_with_progress<F>(vectors: &[Vec<f32>], options: ForestOptions, mut on_tree: F) -> Result<Self>
    where
        F: FnMut(usize),
    {
        if options.n_trees == 0 {
            return Err(Error::config("n_trees must be >= 1"));
        }
        if options.leaf_size < 2 {
            return Err(Error::config("leaf_size must be >= 2"));
        }
        let Some(first) = vectors.first() else {
            return Err(Error::data("cannot build an index without vectors"));
        };
        let dim = first.len();
        if dim == 0 {
            return Err(Error::data("cannot index zero-dimensional vectors"));
        }
        if u32::try_from(vectors.len()).is_err() {
            return Err(Error::data(format!("too many items for one index: {}", vectors.len())));
        }
        let mut flat = Vec::with_capacity(vectors.len() * dim);
        for (i, v) in vectors.iter().enumerate() {
            if v.len() != dim {
                return Err(Error::data(format!("vector {i} has {} dimensions, expected {dim}", v.len())));
            }
            if v.iter().any(|x| !x.is_finite()) {
                return Err(Error::data(format!("vector {i} contains a non-finite value")));
            }
            flat.extend_from_slice(v);
        }

        let mut index = Self {
            dim,
            metric: options.metric,
            leaf_size: options.leaf_size,
            vectors: flat,
            nodes: Vec::new(),
            roots: Vec::with_capacity(options.n_trees),
        };
        for tree in 0..options.n_trees {
            let mut rng = StdRng::seed_from_u64(options.seed.wrapping_add(tree as u64));
            let root = index.grow_tree(&mut rng);
            index.roots.push(root);
            on_tree(tree + 1);
        }

        info!(
            items = index.len(),
            dim,
            trees = options.n_trees,
            nodes = index.nodes.len(),
            metric = %options.metric,
            "Built ANN forest"
        );
        Ok(index)
    }

    fn item(&self, i: u32) -> &[f32] {
        let start = i as usize * self.dim;
        &self.vectors[start..start + self.dim]
    }

    fn grow_tree(&mut self, rng: &mut StdRng) -> u32 {
        let all: Vec<u32> = (0..self.len() as u32).collect();
        let root = self.reserve_node();
        let mut stack = vec![(root, all)];

        while let Some((slot, items)) = stack.pop() {
            if items.len() <= self.leaf_size {
                self.nodes[slot as usize] = Node::Leaf(items);
                continue;
            }
            let (normal, offset) = self.choose_split(&items, rng);
            let (mut left, mut right) = (Vec::new(), Vec::new());
            for &i in &items {
                let m = margin(&normal, offset, self.item(i));
                let go_right = if m == 0.0 { rng.gen_bool(0.5) } else { m > 0.0 };
                if go_right { right.push(i) } else { left.push(i) }
            }

            let (normal, offset) = if left.is_empty() || right.is_empty() {
                // degenerate hyperplane (e.g. duplicate vectors): split at random
                let mut shuffled = items;
                shuffled.shuffle(rng);
                right = shuffled.split_off(shuffled.len() / 2);
                left = shuffled;
                (vec![0.0; self.dim], 0.0)
            } else {
                (normal, offset)
            };

            let l = self.reserve_node();
            let r = self.reserve_node();
            self.nodes[slot as usize] = Node::Split { normal, offset, left: l, right: r };
            stack.push((l, left));
            stack.push((r, right));
        }
        root
    }

    fn reserve_node(&mut self) -> u32 {
        self.nodes.push(Node::Leaf(Vec::new()));
        (self.nodes.len() - 1) as u32
    }

    /// Hyperplane separating two centroids found by online two-means.
    fn choose_split(&self, items: &[u32], rng: &mut StdRng) -> (Vec<f32>, f32) {
        let angular = matches!(self.metric, Metric::Angular | Metric::Dot);
        let prepare = |v: &[f32]| if angular { normalized(v) } else { v.to_vec() };

        let a = rng.gen_range(0..items.len());
        let mut b = rng.gen_range(0..items.len() - 1);
        if b >= a {
            b += 1;
        }
        let mut p = prepare(self.item(items[a]));
        let mut q = prepare(self.item(items[b]));
        let (mut pc, mut qc) = (1.0f32, 1.0f32);

        for _ in 0..TWO_MEANS_ITERATIONS {
            let x = prepare(self.item(items[rng.gen_range(0..items.len())]));
            let dp = pc * squared_l2(&p, &x);
            let dq = qc * squared_l2(&q, &x);
            if dp < dq {
                update_centroid(&mut p, &x, pc);
                pc += 1.0;
            } else if dq < dp {
                update_centroid(&mut q, &x, qc);
                qc += 1.0;
            }
        }

        let mut normal: Vec<f32> = p.iter().zip(&q).map(|(pi, qi)| pi - qi).collect();
        normal = normalized(&normal);
        let offset = if angular {
            0.0
        } else {
            let mid: Vec<f32> = p.iter().zip(&q).map(|(pi, qi)| (pi + qi) / 2.0).collect();
            -dot(&normal, &mid)
        };
        (normal, offset)
    }

    /// Up to `k` neighbors, examining about `search_k` distinct candidates.
    /// The budget never drops below `k`, so `min(k, len)` results come back.
    fn search(&self, query: &[f32], k: usize, search_k: usize) -> Result<Vec<Neighbor>> {
        if query.len() != self.dim {
            return Err(Error::artifact(format!(
                "query has {} dimensions but the index was built with {}",
                query.len(),
                self.dim
            )));
        }
        let k = k.min(self.len());
        if k == 0 {
            return Ok(Vec::new());
        }
        let budget = search_k.max(k);

        let mut heap: BinaryHeap<Pending> =
            self.roots.iter().map(|&node| Pending { priority: f32::INFINITY, node }).collect();
        let mut seen = vec![false; self.len()];
        let mut candidates: Vec<u32> = Vec::with_capacity(budget);

        while candidates.len() < budget {
            let Some(Pending { priority, node }) = heap.pop() else { break };
            match &self.nodes[node as usize] {
                Node::Leaf(items) => {
                    for &i in items {
                        if !seen[i as usize] {
                            seen[i as usize] = true;
                            candidates.push(i);
                        }
                    }
                }
                Node::Split { normal, offset, left, right } => {
                    let m = margin(normal, *offset, query);
                    heap.push(Pending { priority: priority.min(m), node: *right });
                    heap.push(Pending { priority: priority.min(-m), node: *left });
                }
            }
        }

        let mut scored: Vec<Neighbor> = candidates
            .into_iter()
            .map(|i| Neighbor { id: i as usize, distance: distance(self.metric, query, self.item(i)) })
            .collect();
        scored.sort_by(|a, b| a.distance.total_cmp(&b.distance).then(a.id.cmp(&b.id)));
        scored.truncate(k);
        debug!(k, budget, examined = seen.iter().filter(|s| **s).count(), "ANN query");
        Ok(scored)
    }

    /// Default candidate budget for `k` results: `k * n_trees`.
    pub fn default_search_k(&self, k: usize) -> usize { k.saturating_mul(self.n_trees()) }

    pub fn n_trees(&self) -> usize { self.roots.len() }
    pub fn leaf_size(&self) -> usize { self.leaf_size }

    /// Stored vector of item `id`.
    pub fn vector(&self, id: usize) -> Option<&[f32]> {
        (id < self.len()).then(|| self.item(id as u32))
    }

    /// Write the index to a single artifact file tagged with `build_id`.
    pub fn save(&self, path: &Path, build_id: &str) -> Result<u64> {
        write_artifact(path, ArtifactKind::Index, build_id, self)
    }

    /// Open an index file, checking it was built with `expected_dim` and
    /// `expected_metric`. Returns the embedded build id with the index.
    pub fn load(path: &Path, expected_dim: usize, expected_metric: Metric) -> Result<(String, Self)> {
        let (build_id, index): (String, Self) = read_artifact(path, ArtifactKind::Index)?;
        if index.dim != expected_dim {
            return Err(Error::artifact(format!(
                "{}: index has {} dimensions, expected {expected_dim}",
                path.display(),
                index.dim
            )));
        }
        if index.metric != expected_metric {
            return Err(Error::artifact(format!(
                "{}: index metric is {}, expected {expected_metric}",
                path.display(),
                index.metric
            )));
        }
        index.check_structure().map_err(|e| Error::artifact(format!("{}: {e}", path.display())))?;
        Ok((build_id, index))
    }

    fn check_structure(&self) -> std::result::Result<(), String> {
        if self.dim == 0 || self.vectors.len() % self.dim != 0 {
            return Err("vector storage does not match the dimensionality".to_string());
        }
        if self.roots.is_empty() {
            return Err("index has no trees".to_string());
        }
        let n_nodes = self.nodes.len() as u32;
        if self.roots.iter().any(|&r| r >= n_nodes) {
            return Err("root points outside the node table".to_string());
        }
        let n_items = self.len() as u32;
        for node in &self.nodes {
            match node {
                Node::Leaf(items) if items.iter().any(|&i| i >= n_items) => {
                    return Err("leaf references an unknown item".to_string());
                }
                Node::Split { normal, left, right, .. } if normal.len() != self.dim || *left >= n_nodes || *right >= n_nodes => {
                    return Err("malformed split node".to_string());
                }
                _ => {}
            }
        }
        Ok(())
    }
}

impl VectorIndex for AnnoyIndex {
    fn dim(&self) -> usize { self.dim }
    fn len(&self) -> usize { self.vectors.len() / self.dim.max(1) }
    fn metric(&self) -> Metric { self.metric }

    fn nearest(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        self.search(query, k, self.default_search_k(k))
    }

    fn nearest_with_budget(&self, query: &[f32], k: usize, search_k: usize) -> Result<Vec<Neighbor>> {
        self.search(query, k, search_k)
    }
}

fn margin(normal: &[f32], offset: f32, x: &[f32]) -> f32 { dot(normal, x) + offset }

fn squared_l2(a: &[f32], b: &[f32]) -> f32 { a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum() }

fn update_centroid(c: &mut [f32], x: &[f32], count: f32) {
    for (ci, xi) in c.iter_mut().zip(x) {
        *ci = (*ci * count + xi) / (count + 1.0);
    }
}
