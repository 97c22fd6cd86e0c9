//! Waiting and active durations
use std::collections::BTreeMap;
use std::fmt;

use derive_more::Display;
use petgraph::graph::{DiGraph, NodeIndex};
use tracing::{event, instrument, Level};

use crate::error::{Error, OrErrExt};
use crate::parser::Label;
use crate::trace::TimestampTriple;
use crate::tree::{self, Segment, SegmentKind, Skeleton, Slot};

/// What a task was doing during a segment; also the segment's style tag.
#[derive(Clone, Copy, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Phase {
    #[display(fmt = "waiting")]
    Waiting,
    #[display(fmt = "active")]
    Active,
}

impl From<SegmentKind> for Phase {
    fn from(kind: SegmentKind) -> Self {
        match kind {
            SegmentKind::Outer => Phase::Waiting,
            SegmentKind::Inner => Phase::Active,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct DurationPair {
    pub waiting: f64,
    pub active: f64,
}

impl DurationPair {
    /// `waiting = t2 - t1`, `active = t3 - t2`.
    pub fn from_triple(label: &Label, triple: &TimestampTriple) -> Result<Self, Error> {
        let [t1, t2, t3] = triple.times();
        Self::new(label, t2 - t1, t3 - t2)
    }

    /// Negative durations mean corrupted timestamps and are never clamped;
    /// durations too long to represent are rejected as well.
    pub fn new(label: &Label, waiting: f64, active: f64) -> Result<Self, Error> {
        let pair = DurationPair{waiting, active};
        for phase in [Phase::Waiting, Phase::Active] {
            let value = pair.get(phase);
            if !value.is_finite() {
                return Err(Error::NonFiniteDuration{label: label.clone(), phase, value});
            }
            if value < 0.0 {
                return Err(Error::NegativeDuration{label: label.clone(), phase, value});
            }
        }
        Ok(pair)
    }

    pub fn get(&self, phase: Phase) -> f64 {
        match phase {
            Phase::Waiting => self.waiting,
            Phase::Active => self.active,
        }
    }
}

/// A styled segment with its branch length.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Branch {
    pub segment: Segment,
    pub phase: Phase,
    pub length: f64,
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.segment.label(), self.phase, self.length)
    }
}

/// The skeleton with every segment styled and measured.
///
/// Node indices are those of the [Skeleton] it was derived from.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct TimedTree {
    pub graph: DiGraph<Branch, Slot>,
    pub root: NodeIndex,
    #[cfg_attr(feature = "serde", serde(skip))]
    pub durations: BTreeMap<Label, DurationPair>,
    pub order: Vec<Label>,
}

impl TimedTree {
    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn children(&self, ix: NodeIndex) -> Vec<NodeIndex> {
        tree::children(&self.graph, ix)
    }
}

/// Attach durations from `timestamps` to every segment of `skeleton`.
#[instrument(skip(skeleton, timestamps), fields(labels = skeleton.order.len()))]
pub fn derive(skeleton: Skeleton, timestamps: &BTreeMap<Label, TimestampTriple>) -> Result<TimedTree, Error> {
    let mut durations = BTreeMap::new();
    for label in skeleton.order.iter() {
        let triple = timestamps
            .get(label)
            .or_err(Error::MissingTimestamps{label: label.clone()})?;
        durations.insert(label.clone(), DurationPair::from_triple(label, triple)?);
    }
    event!(Level::DEBUG, ?durations, "DURATIONS");

    let Skeleton{graph, root, order, ..} = skeleton;
    let graph = graph.map(
        |_vx, segment| {
            let phase = Phase::from(segment.kind());
            let length = durations[segment.label()].get(phase);
            Branch{segment: segment.clone(), phase, length}
        },
        |_ex, slot| *slot,
    );

    let tree = TimedTree{graph, root, durations, order};
    check_extent(&tree)?;
    Ok(tree)
}

/// Every segment must end at a finite time after the root's creation.
fn check_extent(tree: &TimedTree) -> Result<(), Error> {
    let mut stack = vec![(tree.root, 0.0)];
    while let Some((ix, start)) = stack.pop() {
        let branch = &tree.graph[ix];
        let end = start + branch.length;
        if !end.is_finite() {
            return Err(Error::NonFiniteDuration{label: branch.segment.label().clone(), phase: branch.phase, value: end});
        }
        stack.extend(tree.children(ix).into_iter().map(|wx| (wx, end)));
    }
    Ok(())
}
