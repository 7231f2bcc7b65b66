use std::collections::{BinaryHeap, HashMap, HashSet};

use crate::error::VecError;
use crate::index::{Match, VecIndex};
use crate::similarity::ip_distance;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// HnswConfig configures a new HNSW index.
///
/// Defaults follow the production identification service: M=32,
/// efConstruction=200, efSearch=128 over 512-dim embeddings.
#[derive(Debug, Clone)]
pub struct HnswConfig {
    /// Vector dimension. Required; must be positive.
    pub dim: usize,
    /// Max connections per node per layer (except layer 0 which allows 2*M).
    /// Default: 32.
    pub m: usize,
    /// Size of the dynamic candidate list during index building.
    /// Default: 200.
    pub ef_construction: usize,
    /// Default size of the dynamic candidate list during search.
    /// Default: 128.
    pub ef_search: usize,
}

impl HnswConfig {
    /// Config with default graph parameters for the given dimension.
    pub fn new(dim: usize) -> Self {
        let mut cfg = Self {
            dim,
            m: 0,
            ef_construction: 0,
            ef_search: 0,
        };
        cfg.set_defaults();
        cfg
    }

    pub(crate) fn set_defaults(&mut self) {
        if self.m < 2 {
            self.m = 32;
        }
        if self.ef_construction == 0 {
            self.ef_construction = 200;
        }
        if self.ef_search == 0 {
            self.ef_search = 128;
        }
    }

    fn max_conns(&self, layer: usize) -> usize {
        if layer == 0 {
            self.m * 2
        } else {
            self.m
        }
    }
}

// ---------------------------------------------------------------------------
// Internal priority-queue types
// ---------------------------------------------------------------------------

#[derive(Clone)]
struct DistItem {
    slot: u32,
    dist: f32,
}

/// Min-heap: closest first.
impl Ord for DistItem {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        other
            .dist
            .partial_cmp(&self.dist)
            .unwrap_or(std::cmp::Ordering::Equal)
    }
}
impl PartialOrd for DistItem {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl PartialEq for DistItem {
    fn eq(&self, other: &Self) -> bool {
        self.dist == other.dist && self.slot == other.slot
    }
}
impl Eq for DistItem {}

/// Reversed for max-heap usage: farthest first.
#[derive(Clone)]
struct MaxDistItem {
    slot: u32,
    dist: f32,
}

impl Ord for MaxDistItem {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.dist
            .partial_cmp(&other.dist)
            .unwrap_or(std::cmp::Ordering::Equal)
    }
}
impl PartialOrd for MaxDistItem {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl PartialEq for MaxDistItem {
    fn eq(&self, other: &Self) -> bool {
        self.dist == other.dist && self.slot == other.slot
    }
}
impl Eq for MaxDistItem {}

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

pub(crate) struct HnswNode {
    pub(crate) id: i64,
    pub(crate) vector: Vec<f32>,
    pub(crate) level: usize,
    pub(crate) friends: Vec<Vec<u32>>, // friends[layer] = neighbor slot indices
}

// ---------------------------------------------------------------------------
// Hnsw
// ---------------------------------------------------------------------------

/// Hnsw is a Hierarchical Navigable Small World index implementing
/// [VecIndex] with inner-product similarity over unit-norm vectors.
///
/// The structure is a recall-oriented candidate generator: the scores it
/// reports are approximate, and re-inserting an id unlinks the old node
/// before inserting the new one so the graph never answers with a vector
/// the caller has overwritten.
///
/// No internal locking; the owner serializes writes against reads.
pub struct Hnsw {
    pub(crate) cfg: HnswConfig,
    pub(crate) nodes: Vec<Option<HnswNode>>,
    pub(crate) id_map: HashMap<i64, u32>,
    pub(crate) entry_slot: i32,
    pub(crate) max_level: usize,
    pub(crate) count: usize,
    pub(crate) free: Vec<u32>,
    pub(crate) level_mul: f64,
}

impl Hnsw {
    /// Create an empty HNSW index with the given configuration.
    /// Panics if `cfg.dim` is not positive.
    pub fn new(mut cfg: HnswConfig) -> Self {
        assert!(cfg.dim > 0, "vecstore: HnswConfig.dim must be positive");
        cfg.set_defaults();
        let level_mul = 1.0 / (cfg.m as f64).ln();
        Self {
            cfg,
            nodes: Vec::new(),
            id_map: HashMap::new(),
            entry_slot: -1,
            max_level: 0,
            count: 0,
            free: Vec::new(),
            level_mul,
        }
    }

    /// Vector dimension this index was built for.
    pub fn dim(&self) -> usize {
        self.cfg.dim
    }

    /// Adjust the search-time candidate list size.
    pub fn set_ef_search(&mut self, ef: usize) {
        self.cfg.ef_search = ef;
    }

    /// True if the index holds a vector for this id.
    pub fn contains(&self, id: i64) -> bool {
        self.id_map.contains_key(&id)
    }

    /// Iterate over (id, vector) for every live entry. Used to rebuild
    /// derived stores after deserialization.
    pub fn entries(&self) -> impl Iterator<Item = (i64, &[f32])> {
        self.nodes
            .iter()
            .filter_map(|nd| nd.as_ref().map(|nd| (nd.id, nd.vector.as_slice())))
    }

    fn random_level(&self) -> usize {
        let mut rng = rand::thread_rng();
        let r: f64 = rand::Rng::r#gen::<f64>(&mut rng).max(f64::MIN_POSITIVE);
        let level = (-r.ln() * self.level_mul) as usize;
        level.min(31)
    }

    fn search_layer(&self, query: &[f32], entry_points: &[u32], ef: usize, layer: usize) -> Vec<u32> {
        let mut visited = HashSet::with_capacity(ef * 2);
        let mut candidates: BinaryHeap<DistItem> = BinaryHeap::new();
        let mut results: BinaryHeap<MaxDistItem> = BinaryHeap::new();

        for &ep in entry_points {
            if let Some(nd) = &self.nodes[ep as usize] {
                visited.insert(ep);
                let d = ip_distance(query, &nd.vector);
                candidates.push(DistItem { slot: ep, dist: d });
                results.push(MaxDistItem { slot: ep, dist: d });
            }
        }

        while let Some(closest) = candidates.pop() {
            if results.len() >= ef {
                if let Some(farthest) = results.peek() {
                    if closest.dist > farthest.dist {
                        break;
                    }
                }
            }

            if let Some(nd) = &self.nodes[closest.slot as usize] {
                if layer < nd.friends.len() {
                    for &f_slot in &nd.friends[layer] {
                        if visited.contains(&f_slot) {
                            continue;
                        }
                        visited.insert(f_slot);

                        if let Some(fn_node) = &self.nodes[f_slot as usize] {
                            let d = ip_distance(query, &fn_node.vector);
                            let should_add = results.len() < ef
                                || results.peek().map_or(true, |far| d < far.dist);
                            if should_add {
                                candidates.push(DistItem { slot: f_slot, dist: d });
                                results.push(MaxDistItem { slot: f_slot, dist: d });
                                if results.len() > ef {
                                    results.pop();
                                }
                            }
                        }
                    }
                }
            }
        }

        results.into_iter().map(|item| item.slot).collect()
    }

    fn select_closest(&self, query: &[f32], candidates: &[u32], max_n: usize) -> Vec<u32> {
        if candidates.len() <= max_n {
            return candidates.to_vec();
        }

        let mut items: Vec<(u32, f32)> = candidates
            .iter()
            .filter_map(|&c_slot| {
                self.nodes[c_slot as usize]
                    .as_ref()
                    .map(|nd| (c_slot, ip_distance(query, &nd.vector)))
            })
            .collect();

        items.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        if items.len() > max_n {
            items.truncate(max_n);
        }
        items.into_iter().map(|(slot, _)| slot).collect()
    }

    /// Unlink a node from the graph and return its slot to the free list.
    /// Only reachable through upsert (re-inserting an existing id) and
    /// reset; entries are never individually deleted from outside.
    fn remove_slot(&mut self, slot: u32) {
        let nd = match self.nodes[slot as usize].take() {
            Some(nd) => nd,
            None => return,
        };

        // Disconnect from all neighbors at every layer.
        for lev in 0..=nd.level {
            if lev < nd.friends.len() {
                for &f_slot in &nd.friends[lev] {
                    if let Some(fn_node) = &mut self.nodes[f_slot as usize] {
                        if lev < fn_node.friends.len() {
                            fn_node.friends[lev].retain(|&x| x != slot);
                        }
                    }
                }
            }
        }

        self.id_map.remove(&nd.id);
        self.free.push(slot);
        self.count -= 1;

        if self.entry_slot == slot as i32 {
            self.find_new_entry();
        }
    }

    fn find_new_entry(&mut self) {
        if self.count == 0 {
            self.entry_slot = -1;
            self.max_level = 0;
            return;
        }
        let mut best: i32 = -1;
        let mut best_level: i32 = -1;
        for (i, nd) in self.nodes.iter().enumerate() {
            if let Some(nd) = nd {
                if nd.level as i32 > best_level {
                    best = i as i32;
                    best_level = nd.level as i32;
                }
            }
        }
        if best < 0 {
            self.entry_slot = -1;
            self.max_level = 0;
            self.count = 0;
            return;
        }
        self.entry_slot = best;
        self.max_level = best_level as usize;
    }
}

impl VecIndex for Hnsw {
    fn insert(&mut self, id: i64, vector: &[f32]) -> Result<(), VecError> {
        if vector.len() != self.cfg.dim {
            return Err(VecError::DimensionMismatch {
                got: vector.len(),
                want: self.cfg.dim,
            });
        }

        let vec = vector.to_vec();

        // Upsert: unlink the stale node first.
        if let Some(&old_slot) = self.id_map.get(&id) {
            self.remove_slot(old_slot);
        }

        // Allocate internal slot.
        let slot = if let Some(free_slot) = self.free.pop() {
            free_slot
        } else {
            let slot = self.nodes.len() as u32;
            self.nodes.push(None);
            slot
        };

        let level = self.random_level();
        let nd = HnswNode {
            id,
            vector: vec.clone(),
            level,
            friends: vec![Vec::new(); level + 1],
        };
        self.nodes[slot as usize] = Some(nd);
        self.id_map.insert(id, slot);
        self.count += 1;

        // First node becomes the entry point.
        if self.entry_slot < 0 {
            self.entry_slot = slot as i32;
            self.max_level = level;
            return Ok(());
        }

        // Phase 1: Greedy descent from top layer to level+1.
        let mut cur = self.entry_slot as u32;
        let mut cur_dist = ip_distance(&vec, &self.nodes[cur as usize].as_ref().unwrap().vector);

        let top = self.max_level;
        for lev in (level + 1..=top).rev() {
            let mut changed = true;
            while changed {
                changed = false;
                if let Some(cur_node) = &self.nodes[cur as usize] {
                    if lev < cur_node.friends.len() {
                        for &f_slot in &cur_node.friends[lev] {
                            if let Some(fn_node) = &self.nodes[f_slot as usize] {
                                let d = ip_distance(&vec, &fn_node.vector);
                                if d < cur_dist {
                                    cur = f_slot;
                                    cur_dist = d;
                                    changed = true;
                                }
                            }
                        }
                    }
                } else {
                    break;
                }
            }
        }

        // Phase 2: Beam search + connect at each layer.
        let top_insert = level.min(self.max_level);
        let ef_construction = self.cfg.ef_construction;

        let mut ep = vec![cur];
        for lev in (0..=top_insert).rev() {
            let candidates = self.search_layer(&vec, &ep, ef_construction, lev);
            let max_c = self.cfg.max_conns(lev);
            let neighbors = self.select_closest(&vec, &candidates, max_c);

            // Set friends for new node.
            if let Some(nd) = &mut self.nodes[slot as usize] {
                nd.friends[lev] = neighbors.clone();
            }

            // Bidirectional connections + pruning.
            for &n_slot in &neighbors {
                // First, add the connection.
                let needs_prune = if let Some(nn) = &mut self.nodes[n_slot as usize] {
                    if lev < nn.friends.len() {
                        nn.friends[lev].push(slot);
                        nn.friends[lev].len() > max_c
                    } else {
                        false
                    }
                } else {
                    false
                };
                // Prune in a separate scope to avoid simultaneous borrows.
                if needs_prune {
                    if let Some(nn) = &self.nodes[n_slot as usize] {
                        let nn_vec = nn.vector.clone();
                        let nn_friends = nn.friends[lev].clone();
                        let pruned = self.select_closest(&nn_vec, &nn_friends, max_c);
                        if let Some(nn) = &mut self.nodes[n_slot as usize] {
                            nn.friends[lev] = pruned;
                        }
                    }
                }
            }

            ep = candidates;
        }

        // Update entry point if new node is higher.
        if level > self.max_level {
            self.entry_slot = slot as i32;
            self.max_level = level;
        }

        Ok(())
    }

    fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<Match>, VecError> {
        if query.len() != self.cfg.dim {
            return Err(VecError::DimensionMismatch {
                got: query.len(),
                want: self.cfg.dim,
            });
        }
        if self.count == 0 || top_k == 0 {
            return Ok(vec![]);
        }

        let ef = self.cfg.ef_search.max(top_k);

        // Phase 1: Greedy descent from top layer to layer 1.
        let mut cur = self.entry_slot as u32;
        if self.nodes[cur as usize].is_none() {
            return Ok(vec![]);
        }
        let mut cur_dist = ip_distance(query, &self.nodes[cur as usize].as_ref().unwrap().vector);

        for lev in (1..=self.max_level).rev() {
            let mut changed = true;
            while changed {
                changed = false;
                if let Some(nd) = &self.nodes[cur as usize] {
                    if lev < nd.friends.len() {
                        for &f_slot in &nd.friends[lev] {
                            if let Some(fn_node) = &self.nodes[f_slot as usize] {
                                let d = ip_distance(query, &fn_node.vector);
                                if d < cur_dist {
                                    cur = f_slot;
                                    cur_dist = d;
                                    changed = true;
                                }
                            }
                        }
                    }
                } else {
                    break;
                }
            }
        }

        // Phase 2: Beam search at layer 0.
        let candidate_slots = self.search_layer(query, &[cur], ef, 0);

        let mut results: Vec<(i64, f32)> = candidate_slots
            .iter()
            .filter_map(|&c_slot| {
                self.nodes[c_slot as usize]
                    .as_ref()
                    .map(|nd| (nd.id, ip_distance(query, &nd.vector)))
            })
            .collect();

        // Sort by ascending distance, tie-break by ascending id so that
        // repeated searches against an unmodified index are reproducible.
        results.sort_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        if results.len() > top_k {
            results.truncate(top_k);
        }

        Ok(results
            .into_iter()
            .map(|(id, distance)| Match {
                id,
                score: 1.0 - distance,
            })
            .collect())
    }

    fn len(&self) -> usize {
        self.count
    }

    fn reset(&mut self) {
        self.nodes.clear();
        self.id_map.clear();
        self.free.clear();
        self.entry_slot = -1;
        self.max_level = 0;
        self.count = 0;
    }
}
