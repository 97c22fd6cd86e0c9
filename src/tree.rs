//! Doubling the task tree
//!
//! Every task is drawn as two segments, so every [Label] becomes two
//! [Segment]s: an outer one for the time the task waited and an inner one for
//! the time it was worked on.
//!
//! ```text
//! Outer(p) ── Inner(p) ─┬─ Outer(c1) ── Inner(c1) ...
//!                       └─ Outer(c2) ── Inner(c2) ...
//! ```
use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use enum_kinds::EnumKind;
use petgraph::dot::{Config, Dot};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use tracing::{event, instrument, Level};

use crate::error::{Error, Inconsistency};
use crate::parser::Label;
use crate::trace::EdgeRecord;

/// One drawn piece of a task.
#[derive(Clone, Debug, EnumKind, Eq, Hash, PartialEq)]
#[enum_kind(SegmentKind)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Segment {
    Outer(Label),
    Inner(Label),
}

impl Segment {
    pub fn label(&self) -> &Label {
        match self {
            Segment::Outer(l) | Segment::Inner(l) => l,
        }
    }

    pub fn kind(&self) -> SegmentKind {
        SegmentKind::from(self)
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Outer(l) => write!(f, "outer {l}"),
            Segment::Inner(l) => write!(f, "inner {l}"),
        }
    }
}

/// Child ordinals: 0 for the only or first child, 1 for the second.
pub type Slot = usize;

/// Ordered children of `ix`.
pub(crate) fn children<N>(graph: &DiGraph<N, Slot>, ix: NodeIndex) -> Vec<NodeIndex> {
    let mut edges = graph
        .edges(ix)
        .map(|er| (*er.weight(), er.target()))
        .collect::<Vec<_>>();
    edges.sort();
    edges.into_iter().map(|(_, wx)| wx).collect()
}

/// The doubled tree, before durations are known.
#[derive(Clone, Debug)]
pub struct Skeleton {
    /// Ownership edges, weighted by child [Slot].
    pub graph: DiGraph<Segment, Slot>,
    /// The root label's outer segment.
    pub root: NodeIndex,
    /// (outer, inner) segments of every label.
    pub segments: BTreeMap<Label, (NodeIndex, NodeIndex)>,
    /// Labels in the order they were placed.
    pub order: Vec<Label>,
}

impl Skeleton {
    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn children(&self, ix: NodeIndex) -> Vec<NodeIndex> {
        children(&self.graph, ix)
    }

    pub fn outer(&self, label: &Label) -> Option<NodeIndex> {
        self.segments.get(label).map(|(outer, _)| *outer)
    }

    pub fn inner(&self, label: &Label) -> Option<NodeIndex> {
        self.segments.get(label).map(|(_, inner)| *inner)
    }

    /// Add the two segments of `label`, outer owning inner.
    fn place(&mut self, label: &Label) -> Result<(NodeIndex, NodeIndex), Error> {
        if self.segments.contains_key(label) {
            return Err(Error::StructuralInconsistency{label: label.clone(), reason: Inconsistency::Revisited});
        }
        let outer = self.graph.add_node(Segment::Outer(label.clone()));
        let inner = self.graph.add_node(Segment::Inner(label.clone()));
        self.graph.add_edge(outer, inner, 0);
        self.segments.insert(label.clone(), (outer, inner));
        self.order.push(label.clone());
        Ok((outer, inner))
    }
}

/// Expand `root` into a [Skeleton] using the splits in `edges`.
///
/// Expansion is depth-first with `child1` before `child2`, driven by an explicit
/// stack so that deep traces do not exhaust the call stack.
#[instrument(skip(edges), fields(edges = edges.len()))]
pub fn build(root: &Label, edges: &[EdgeRecord]) -> Result<Skeleton, Error> {
    let mut splits = HashMap::<&Label, &EdgeRecord>::new();
    for e in edges {
        match splits.entry(&e.parent) {
            Entry::Vacant(ve) => { ve.insert(e); },
            Entry::Occupied(oe) => if *oe.get() != e {
                return Err(Error::StructuralInconsistency{label: e.parent.clone(), reason: Inconsistency::ConflictingSplit});
            },
        }
    }

    let mut skeleton = Skeleton{
        graph: DiGraph::new(),
        root: NodeIndex::end(),
        segments: BTreeMap::new(),
        order: vec![],
    };
    let (root_ix, _) = skeleton.place(root)?;
    skeleton.root = root_ix;

    let mut stack = vec![root];
    while let Some(label) = stack.pop() {
        let record = match splits.get(label) {
            Some(record) => *record,
            None => continue,
        };
        let (_, inner) = skeleton.segments[label];
        for (slot, child) in [&record.child1, &record.child2].into_iter().enumerate() {
            let (outer, _) = skeleton.place(child)?;
            skeleton.graph.add_edge(inner, outer, slot);
        }
        stack.push(&record.child2);
        stack.push(&record.child1);
    }

    if let Some(e) = edges.iter().find(|e| !skeleton.segments.contains_key(&e.parent)) {
        return Err(Error::StructuralInconsistency{label: e.parent.clone(), reason: Inconsistency::Unreachable});
    }

    let dot = Dot::with_config(&skeleton.graph, &[Config::EdgeNoLabel]);
    event!(Level::DEBUG, ?dot, "SKELETON");

    Ok(skeleton)
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::parser::parse_label;
    use crate::ErrorKind;

    fn l(s: &str) -> Label {
        parse_label(s).unwrap()
    }

    fn edge(p: &str, c1: &str, c2: &str) -> EdgeRecord {
        EdgeRecord{parent: l(p), child1: l(c1), child2: l(c2)}
    }

    /// A complete binary tree with `k` splits, labelled heap-style.
    fn heap(k: i64) -> Vec<EdgeRecord> {
        (0..k)
            .map(|i| EdgeRecord{
                parent: Label::Int(i),
                child1: Label::Int(2 * i + 1),
                child2: Label::Int(2 * i + 2),
            })
            .collect()
    }

    #[test]
    fn counts_two_segments_per_label() {
        for k in 0..20 {
            let skeleton = build(&Label::Int(0), &heap(k)).unwrap();
            assert_eq!(skeleton.len(), 2 * (2 * k as usize + 1), "k = {k}");
        }
    }

    #[test]
    fn links_outer_inner_and_children() {
        let skeleton = build(&l("(0,)"), &[edge("(0,)", "(1,)", "(2,)")]).unwrap();
        let root = skeleton.root;
        assert_eq!(skeleton.graph[root], Segment::Outer(l("(0,)")));
        assert_eq!(skeleton.graph[root].kind(), SegmentKind::Outer);

        let inner = skeleton.inner(&l("(0,)")).unwrap();
        assert_eq!(skeleton.children(root), vec![inner]);
        assert_eq!(
            skeleton.children(inner),
            vec![skeleton.outer(&l("(1,)")).unwrap(), skeleton.outer(&l("(2,)")).unwrap()]
        );
        let leaf = skeleton.inner(&l("(2,)")).unwrap();
        assert_eq!(skeleton.children(leaf), Vec::<NodeIndex>::new());
        assert_eq!(skeleton.children(skeleton.outer(&l("(2,)")).unwrap()), vec![leaf]);
    }

    #[test]
    fn expands_first_child_first() {
        let edges = vec![
            edge("(0,)", "(1,)", "(2,)"),
            edge("(2,)", "(5,)", "(6,)"),
            edge("(1,)", "(3,)", "(4,)"),
        ];
        let skeleton = build(&l("(0,)"), &edges).unwrap();
        let order = skeleton.order.iter().map(|l| l.to_string()).collect::<Vec<_>>();
        assert_eq!(order, vec!["(0,)", "(1,)", "(2,)", "(3,)", "(4,)", "(5,)", "(6,)"]);
    }

    #[test]
    fn handles_deep_traces() {
        let edges = (0..100_000)
            .map(|i| EdgeRecord{parent: Label::Int(i), child1: Label::Int(-i - 1), child2: Label::Int(i + 1)})
            .collect::<Vec<_>>();
        let skeleton = build(&Label::Int(0), &edges).unwrap();
        assert_eq!(skeleton.len(), 2 * (2 * 100_000 + 1));
    }

    #[test]
    fn rejects_reused_labels() {
        let edges = vec![edge("(0,)", "(1,)", "(2,)"), edge("(1,)", "(2,)", "(3,)")];
        let err = build(&l("(0,)"), &edges).unwrap_err();
        match err {
            Error::StructuralInconsistency{label, reason} => {
                assert_eq!(label, l("(2,)"));
                assert_eq!(reason, Inconsistency::Revisited);
            },
            err => panic!("unexpected {err:?}"),
        }

        let twins = vec![edge("(0,)", "(1,)", "(1,)")];
        assert_eq!(build(&l("(0,)"), &twins).unwrap_err().kind(), ErrorKind::StructuralInconsistency);
    }

    #[test]
    fn rejects_conflicting_and_unreachable_splits() {
        let conflicting = vec![edge("(0,)", "(1,)", "(2,)"), edge("(0,)", "(3,)", "(4,)")];
        match build(&l("(0,)"), &conflicting).unwrap_err() {
            Error::StructuralInconsistency{reason, ..} => assert_eq!(reason, Inconsistency::ConflictingSplit),
            err => panic!("unexpected {err:?}"),
        }

        // (5,) splits into itself and is never reached from (0,)
        let island = vec![edge("(0,)", "(1,)", "(2,)"), edge("(5,)", "(5,)", "(6,)")];
        match build(&l("(0,)"), &island).unwrap_err() {
            Error::StructuralInconsistency{label, reason} => {
                assert_eq!(label, l("(5,)"));
                assert_eq!(reason, Inconsistency::Unreachable);
            },
            err => panic!("unexpected {err:?}"),
        }
    }
}
