//! Reading solver traces
//!
//! A trace interleaves two kinds of lines with the solver's ordinary output:
//!
//! ```text
//! PARENT CHILD1 CHILD2     (a split)
//! LABEL TIME               (a state change of LABEL at TIME)
//! ```
//!
//! Only lines that begin with `(` are trace lines; everything else is kept
//! as pass-through text. Every label on a trace line must be a tuple, so a
//! label's timestamp lines are recognized the same way as its splits.
use std::collections::{BTreeMap, BTreeSet, HashSet};

use ordered_float::OrderedFloat;
use sorted_vec::SortedVec;
use tracing::{event, instrument, Level};

use crate::error::Error;
use crate::parser::{parse_label, Label};

/// A task that split into two children.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct EdgeRecord {
    pub parent: Label,
    pub child1: Label,
    pub child2: Label,
}

/// The creation, start and completion times of one task, in ascending order.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimestampTriple([f64; 3]);

impl TimestampTriple {
    pub fn new(times: [f64; 3]) -> Self {
        let sorted = SortedVec::from_unsorted(times.iter().copied().map(OrderedFloat).collect::<Vec<_>>());
        Self([sorted[0].0, sorted[1].0, sorted[2].0])
    }

    pub fn times(&self) -> [f64; 3] {
        self.0
    }
}

#[derive(Clone, Debug)]
pub struct Trace<'s> {
    /// Splits, in order of first appearance.
    pub edges: Vec<EdgeRecord>,
    pub timestamps: BTreeMap<Label, TimestampTriple>,
    /// Lines that are not trace lines.
    pub passthrough: Vec<&'s str>,
}

impl<'s> Trace<'s> {
    /// The label of the first task.
    ///
    /// A trace without splits has a root only if exactly one label was timed.
    pub fn root(&self) -> Result<Label, Error> {
        if self.edges.is_empty() {
            let mut labels = self.timestamps.keys();
            return match (labels.next(), labels.next()) {
                (Some(label), None) => Ok(label.clone()),
                _ => Err(Error::NoRoot),
            };
        }
        infer_root(&self.edges)
    }
}

/// Find the unique parent that is nobody's child.
#[instrument(skip(edges), fields(edges = edges.len()))]
pub fn infer_root(edges: &[EdgeRecord]) -> Result<Label, Error> {
    let children = edges
        .iter()
        .flat_map(|e| [&e.child1, &e.child2])
        .collect::<HashSet<_>>();
    let mut candidates = edges
        .iter()
        .map(|e| &e.parent)
        .filter(|p| !children.contains(p))
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect::<Vec<_>>();
    event!(Level::DEBUG, ?candidates, "ROOTS");
    match candidates.len() {
        0 => Err(Error::NoRoot),
        1 => Ok(candidates.remove(0)),
        _ => Err(Error::AmbiguousRoot{candidates}),
    }
}

fn parse_time(s: &str) -> Option<f64> {
    s.parse::<f64>().ok().filter(|t| t.is_finite())
}

/// Parse a whole trace.
#[instrument(skip(text), fields(bytes = text.len()))]
pub fn read(text: &str) -> Result<Trace<'_>, Error> {
    let mut edges = vec![];
    let mut seen = HashSet::new();
    let mut observations = BTreeMap::<Label, Vec<f64>>::new();
    let mut passthrough = vec![];

    let mut offset = 0;
    for (n, raw) in text.split_inclusive('\n').enumerate() {
        let start = offset;
        offset += raw.len();
        let line = raw.trim_end_matches(|c: char| c == '\n' || c == '\r');

        if !line.starts_with('(') {
            passthrough.push(line);
            continue;
        }

        let malformed = |reason: String| Error::MalformedLine{
            line: n + 1,
            span: start..start + line.len(),
            text: line.to_string(),
            reason,
        };
        let label = |token: &str| match parse_label(token) {
            Ok(l @ Label::Tuple(_)) => Ok(l),
            Ok(l) => Err(malformed(format!("label {l} is not a tuple"))),
            Err(e) => Err(malformed(e.to_string())),
        };

        let tokens = line.split_whitespace().collect::<Vec<_>>();
        match tokens[..] {
            [l, t] => {
                let l = label(l)?;
                let t = parse_time(t).ok_or_else(|| malformed(format!("invalid time {t:?}")))?;
                observations.entry(l).or_default().push(t);
            },
            [p, c1, c2] => {
                let record = EdgeRecord{parent: label(p)?, child1: label(c1)?, child2: label(c2)?};
                if seen.insert(record.clone()) {
                    edges.push(record);
                }
            },
            _ => {
                return Err(malformed(format!("expected 2 or 3 tokens, found {}", tokens.len())));
            }
        }
    }

    let timestamps = observations
        .into_iter()
        .map(|(label, times)| match <[f64; 3]>::try_from(times) {
            Ok(times) => Ok((label, TimestampTriple::new(times))),
            Err(times) => Err(Error::IncompleteTimestamps{label, count: times.len()}),
        })
        .collect::<Result<BTreeMap<_, _>, _>>()?;

    event!(Level::DEBUG, edges = edges.len(), labels = timestamps.len(), passthrough = passthrough.len(), "READ");

    Ok(Trace{edges, timestamps, passthrough})
}
