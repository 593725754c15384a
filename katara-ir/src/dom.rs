//! Dominator tree construction with the Lengauer-Tarjan algorithm.

use std::collections::{BTreeMap, BTreeSet};

use crate::{BlockNum, DomError, Func};

/// The dominator tree of a func, keyed by block number. The entry block
/// is its own immediate dominator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomTree {
    idom: BTreeMap<BlockNum, BlockNum>,
    children: BTreeMap<BlockNum, BTreeSet<BlockNum>>,
    entry: BlockNum,
}

impl DomTree {
    /// The root of the tree.
    pub fn entry(&self) -> BlockNum {
        self.entry
    }

    /// The immediate dominator of `block`, or `None` for the entry block
    /// and blocks unreachable from it.
    pub fn idom(&self, block: BlockNum) -> Option<BlockNum> {
        if block == self.entry {
            return None;
        }
        self.idom.get(&block).copied()
    }

    /// The blocks immediately dominated by `block`.
    pub fn children(&self, block: BlockNum) -> impl Iterator<Item = BlockNum> + '_ {
        self.children
            .get(&block)
            .into_iter()
            .flat_map(|set| set.iter().copied())
    }

    /// Whether `a` dominates `b`. Every block dominates itself.
    pub fn dominates(&self, a: BlockNum, b: BlockNum) -> bool {
        let mut current = b;
        loop {
            if current == a {
                return true;
            }
            match self.idom(current) {
                Some(next) => current = next,
                None => return false,
            }
        }
    }
}

// State of one Lengauer-Tarjan run, indexed by DFS number.
struct Context {
    vertex: Vec<BlockNum>,
    parent: Vec<usize>,
    sdom: Vec<usize>,
    idom: Vec<usize>,
    bucket: Vec<Vec<usize>>,
    ancestor: Vec<Option<usize>>,
    label: Vec<usize>,
    dfs_num: BTreeMap<BlockNum, usize>,
}

pub(crate) fn compute(func: &Func) -> Result<DomTree, DomError> {
    let entry = func.entry().ok_or(DomError::NoEntryBlock)?;
    let mut ctx = find_dfs_tree(func, entry);
    find_implicit_idoms(func, &mut ctx);
    find_explicit_idoms(&mut ctx);

    let mut idom = BTreeMap::new();
    let mut children: BTreeMap<BlockNum, BTreeSet<BlockNum>> = BTreeMap::new();
    for w in 1..ctx.vertex.len() {
        let dominee = ctx.vertex[w];
        let dominator = ctx.vertex[ctx.idom[w]];
        idom.insert(dominee, dominator);
        children.entry(dominator).or_default().insert(dominee);
    }
    Ok(DomTree {
        idom,
        children,
        entry,
    })
}

// Step 1: number the reachable blocks in DFS preorder and record the
// spanning-tree parent of each.
fn find_dfs_tree(func: &Func, entry: BlockNum) -> Context {
    let mut vertex = Vec::new();
    let mut parent = Vec::new();
    let mut dfs_num = BTreeMap::new();
    // (block, dfs number of the discovering vertex)
    let mut stack = vec![(entry, 0usize)];

    while let Some((v, p)) = stack.pop() {
        if dfs_num.contains_key(&v) {
            continue;
        }
        let num = vertex.len();
        dfs_num.insert(v, num);
        vertex.push(v);
        parent.push(p);
        let block = func.block(v).expect("edge to unknown block");
        for &child in block.children().iter().rev() {
            if !dfs_num.contains_key(&child) {
                stack.push((child, num));
            }
        }
    }

    let n = vertex.len();
    Context {
        vertex,
        parent,
        sdom: (0..n).collect(),
        idom: vec![0; n],
        bucket: vec![Vec::new(); n],
        ancestor: vec![None; n],
        label: (0..n).collect(),
        dfs_num,
    }
}

fn link(ctx: &mut Context, v: usize, w: usize) {
    ctx.ancestor[w] = Some(v);
}

// Path compression: after eval(v), label[v] holds the vertex with the
// minimal semidominator on the ancestor path.
fn compress(ctx: &mut Context, v: usize) {
    let mut path = Vec::new();
    let mut current = v;
    while let Some(anc) = ctx.ancestor[current] {
        if ctx.ancestor[anc].is_none() {
            break;
        }
        path.push(current);
        current = anc;
    }
    for &u in path.iter().rev() {
        let anc = ctx.ancestor[u].expect("compressed vertex has ancestor");
        if ctx.sdom[ctx.label[anc]] < ctx.sdom[ctx.label[u]] {
            ctx.label[u] = ctx.label[anc];
        }
        ctx.ancestor[u] = ctx.ancestor[anc];
    }
}

fn eval(ctx: &mut Context, v: usize) -> usize {
    if ctx.ancestor[v].is_none() {
        return v;
    }
    compress(ctx, v);
    ctx.label[v]
}

// Steps 2 and 3: semidominators in reverse DFS order, with buckets
// resolving implicit immediate dominators.
fn find_implicit_idoms(func: &Func, ctx: &mut Context) {
    for w in (1..ctx.vertex.len()).rev() {
        let block = func.block(ctx.vertex[w]).expect("numbered block exists");
        let preds: Vec<usize> = block
            .parents()
            .iter()
            .filter_map(|p| ctx.dfs_num.get(p).copied())
            .collect();
        for v in preds {
            let u = eval(ctx, v);
            if ctx.sdom[u] < ctx.sdom[w] {
                ctx.sdom[w] = ctx.sdom[u];
            }
        }

        let sdom_vertex = ctx.sdom[w];
        ctx.bucket[sdom_vertex].push(w);
        let parent = ctx.parent[w];
        link(ctx, parent, w);

        let bucket = std::mem::take(&mut ctx.bucket[parent]);
        for v in bucket {
            let u = eval(ctx, v);
            ctx.idom[v] = if ctx.sdom[u] < ctx.sdom[v] { u } else { parent };
        }
    }
}

// Step 4: finalize immediate dominators that were deferred.
fn find_explicit_idoms(ctx: &mut Context) {
    for w in 1..ctx.vertex.len() {
        if ctx.idom[w] != ctx.sdom[w] {
            ctx.idom[w] = ctx.idom[ctx.idom[w]];
        }
    }
}
