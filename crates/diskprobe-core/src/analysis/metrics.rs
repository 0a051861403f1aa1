/// Percent-of-parent and large-item computation.
///
/// Runs once the walk has settled, and again whenever the basis metric
/// changes. Two passes over the tree:
///
/// 1. **Percentages.** Every node gets its metric relative to its parent, in
///    tenths of a percent, and loses its large flag. Siblings are independent,
///    so each level fans out over rayon.
/// 2. **Large items.** A node is large when its metric is at least
///    [`LARGE_ITEM_PERCENT`] of the root's. Children of a small node are
///    smaller still, so the pass only descends under large nodes.
///
/// Both passes are idempotent: running them twice with the same basis leaves
/// the tree unchanged.
use crate::model::{BasisMetric, FileTree, NodeIndex, MAX_PERCENT};
use rayon::prelude::*;
use std::cmp::Ordering;

/// Share of the root's metric at which a node is flagged as large.
pub const LARGE_ITEM_PERCENT: u64 = 15;

/// Recompute `percent_of_parent` and `is_large` for every node under `basis`.
pub fn recompute(tree: &FileTree, basis: BasisMetric) {
    let Some(root) = tree.root() else {
        return;
    };

    let root_metric = {
        let node = tree.get(root);
        let mut state = node.lock();
        state.percent_of_parent = MAX_PERCENT;
        state.is_large = true;
        state.stats.metric(basis)
    };

    stamp_percentages(tree, root, basis);

    // An empty root has nothing that could be a share of it.
    if root_metric > 0 {
        flag_large_items(tree, root, root_metric, basis);
    }
    tree.set_ranked_by(basis);
}

/// Tenths of a percent of `part` in `whole`, rounded half to even. Zero when
/// the whole is zero.
pub fn percent_of(part: u64, whole: u64) -> u16 {
    if whole == 0 {
        return 0;
    }
    let whole = u128::from(whole);
    let scaled = u128::from(part) * u128::from(MAX_PERCENT);
    let (quotient, remainder) = (scaled / whole, scaled % whole);
    let round_up = match (remainder * 2).cmp(&whole) {
        Ordering::Greater => true,
        Ordering::Equal => quotient % 2 == 1,
        Ordering::Less => false,
    };
    let per_mille = quotient + u128::from(round_up);
    per_mille.min(u128::from(MAX_PERCENT)) as u16
}

/// `metric >= 15% of root_metric`, without floating point.
pub fn is_large_item(metric: u64, root_metric: u64) -> bool {
    u128::from(metric) * 100 >= u128::from(LARGE_ITEM_PERCENT) * u128::from(root_metric)
}

/// Stamp one level at a time so tree depth never turns into stack depth.
fn stamp_percentages(tree: &FileTree, root: NodeIndex, basis: BasisMetric) {
    let mut level = vec![root];
    while !level.is_empty() {
        level = level
            .par_iter()
            .flat_map_iter(|&parent| {
                let (parent_metric, children) = {
                    let node = tree.get(parent);
                    let state = node.lock();
                    (state.stats.metric(basis), state.children.clone())
                };
                for &child in &children {
                    let node = tree.get(child);
                    let mut state = node.lock();
                    state.percent_of_parent = percent_of(state.stats.metric(basis), parent_metric);
                    state.is_large = false;
                }
                children
            })
            .collect();
    }
}

fn flag_large_items(tree: &FileTree, root: NodeIndex, root_metric: u64, basis: BasisMetric) {
    let mut pending = tree.children(root);
    while let Some(child) = pending.pop() {
        let node = tree.get(child);
        let mut state = node.lock();
        state.is_large = is_large_item(state.stats.metric(basis), root_metric);
        if state.is_large {
            pending.extend_from_slice(&state.children);
        }
    }
}
