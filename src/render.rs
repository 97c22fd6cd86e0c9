//! Drawing timed trees
//!
//! Layout is fixed rather than solved: x is elapsed time since the root was
//! created, leaves take consecutive rows in child1-first order, and every
//! other segment sits halfway between its first and last child.
use std::path::Path;

use petgraph::dot::{Config, Dot};
use petgraph::graph::NodeIndex;
use svg::node::element::{Group, Line, Rectangle, Text};
use svg::Document;
use tracing::{event, instrument, Level};

use crate::duration::{Phase, TimedTree};
use crate::error::Error;

pub const CONNECTOR_COLOR: &str = "#444444";

#[derive(Clone, Debug, PartialEq)]
pub struct Style {
    pub color: String,
    pub width: f64,
}

/// Stroke for segments in `phase`: waiting is thinner and muted.
pub fn style(phase: Phase, options: &RenderOptions) -> Style {
    match phase {
        Phase::Waiting => Style{
            color: format!("#{:x}", colorous::REDS.eval_continuous(0.4)),
            width: options.line_width * 2.0 / 3.0,
        },
        Phase::Active => Style{
            color: format!("#{:x}", colorous::CATEGORY10[2]),
            width: options.line_width,
        },
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RenderOptions {
    /// Drawing width used to fit the tree when `scale` is unset.
    pub width: f64,
    /// Pixels per second.
    pub scale: Option<f64>,
    pub row_height: f64,
    pub line_width: f64,
    pub padding: f64,
    /// Caption leaves with their labels.
    pub labels: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self{
            width: 800.0,
            scale: None,
            row_height: 12.0,
            line_width: 1.5,
            padding: 10.0,
            labels: false,
        }
    }
}

/// One positioned drawing primitive.
#[derive(Clone, Debug, PartialEq)]
pub enum Mark {
    Segment { ix: NodeIndex, x0: f64, x1: f64, y: f64, phase: Phase },
    Connector { ix: NodeIndex, x: f64, y0: f64, y1: f64 },
    Caption { ix: NodeIndex, x: f64, y: f64, text: String },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Layout {
    pub marks: Vec<Mark>,
    pub width: f64,
    pub height: f64,
}

/// Position every segment of `tree`.
#[instrument(skip(tree, options), fields(segments = tree.len()))]
pub fn layout(tree: &TimedTree, options: &RenderOptions) -> Layout {
    let n = tree.len();
    let mut x0 = vec![0.0; n];
    let mut x1 = vec![0.0; n];
    let mut row = vec![0.0; n];
    let mut children = vec![vec![]; n];
    let mut preorder = Vec::with_capacity(n);
    let mut rows = 0usize;

    let mut stack = vec![(tree.root, 0.0)];
    while let Some((ix, start)) = stack.pop() {
        let i = ix.index();
        x0[i] = start;
        x1[i] = start + tree.graph[ix].length;
        children[i] = tree.children(ix);
        if children[i].is_empty() {
            row[i] = rows as f64;
            rows += 1;
        }
        for wx in children[i].iter().rev() {
            stack.push((*wx, x1[i]));
        }
        preorder.push(ix);
    }
    for ix in preorder.iter().rev() {
        let i = ix.index();
        if let (Some(first), Some(last)) = (children[i].first(), children[i].last()) {
            row[i] = (row[first.index()] + row[last.index()]) / 2.0;
        }
    }

    let extent = x1.iter().copied().fold(0.0, f64::max);
    let scale = match options.scale {
        Some(scale) => scale,
        None if extent > 0.0 => (options.width - 2.0 * options.padding).max(1.0) / extent,
        None => 1.0,
    };
    event!(Level::DEBUG, %extent, %scale, %rows, "EXTENT");

    let px = |x: f64| options.padding + x * scale;
    let py = |r: f64| options.padding + (r + 0.5) * options.row_height;

    let mut marks = vec![];
    for ix in preorder.iter() {
        let i = ix.index();
        let y = py(row[i]);
        marks.push(Mark::Segment{ix: *ix, x0: px(x0[i]), x1: px(x1[i]), y, phase: tree.graph[*ix].phase});
        match &children[i][..] {
            [] if options.labels => {
                let text = tree.graph[*ix].segment.label().to_string();
                marks.push(Mark::Caption{ix: *ix, x: px(x1[i]) + 4.0, y, text});
            },
            [first, .., last] => {
                let (y0, y1) = (py(row[first.index()]), py(row[last.index()]));
                marks.push(Mark::Connector{ix: *ix, x: px(x1[i]), y0, y1});
            },
            _ => {},
        }
    }

    let captions = if options.labels { 160.0 } else { 0.0 };
    Layout{
        marks,
        width: px(extent) + options.padding + captions,
        height: 2.0 * options.padding + rows as f64 * options.row_height,
    }
}

/// Draw `tree` as an SVG document.
pub fn to_svg(tree: &TimedTree, options: &RenderOptions) -> Document {
    let Layout{marks, width, height} = layout(tree, options);
    let waiting = style(Phase::Waiting, options);
    let active = style(Phase::Active, options);

    let mut connectors = Group::new()
        .set("stroke", CONNECTOR_COLOR)
        .set("stroke-width", options.line_width / 2.0);
    let mut segments = Group::new()
        .set("stroke-linecap", "butt");
    let mut captions = Group::new()
        .set("font-family", "monospace")
        .set("font-size", options.row_height * 0.75)
        .set("dominant-baseline", "middle");

    for mark in marks {
        match mark {
            Mark::Segment{x0, x1, y, phase, ..} => {
                let Style{color, width: stroke} = if phase == Phase::Waiting { &waiting } else { &active };
                segments = segments.add(Line::new()
                    .set("x1", x0)
                    .set("y1", y)
                    .set("x2", x1)
                    .set("y2", y)
                    .set("stroke", color.as_str())
                    .set("stroke-width", *stroke));
            },
            Mark::Connector{x, y0, y1, ..} => {
                connectors = connectors.add(Line::new()
                    .set("x1", x)
                    .set("y1", y0)
                    .set("x2", x)
                    .set("y2", y1));
            },
            Mark::Caption{x, y, text, ..} => {
                captions = captions.add(Text::new()
                    .set("x", x)
                    .set("y", y)
                    .add(svg::node::Text::new(text)));
            },
        }
    }

    Document::new()
        .set("viewBox", (0, 0, width, height))
        .set("width", width)
        .set("height", height)
        .add(Rectangle::new()
            .set("width", "100%")
            .set("height", "100%")
            .set("fill", "white"))
        .add(connectors)
        .add(segments)
        .add(captions)
}

/// Graphviz rendering of the styled graph.
pub fn to_dot(tree: &TimedTree) -> String {
    format!("{}", Dot::with_config(&tree.graph, &[Config::EdgeNoLabel]))
}

#[cfg(feature = "serde")]
pub fn to_json(tree: &TimedTree) -> Result<String, Error> {
    serde_json::to_string_pretty(tree).map_err(|e| Error::Render{source: e.into()})
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Format {
    Svg,
    Dot,
    Json,
}

impl Format {
    /// Pick a format from the extension of `path`; SVG unless told otherwise.
    pub fn from_path(path: &Path) -> Self {
        let ext = path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("dot") | Some("gv") => Format::Dot,
            Some("json") => Format::Json,
            _ => Format::Svg,
        }
    }
}

#[cfg(feature = "serde")]
fn write_json(tree: &TimedTree, path: &Path) -> Result<(), Error> {
    std::fs::write(path, to_json(tree)?).map_err(|source| Error::Render{source})
}

#[cfg(not(feature = "serde"))]
fn write_json(_tree: &TimedTree, _path: &Path) -> Result<(), Error> {
    let source = std::io::Error::new(std::io::ErrorKind::Unsupported, "json output requires the serde feature");
    Err(Error::Render{source})
}

/// Write `tree` to `path` in the format its extension names.
#[instrument(skip(tree, options))]
pub fn render(tree: &TimedTree, path: &Path, options: &RenderOptions) -> Result<(), Error> {
    let format = Format::from_path(path);
    event!(Level::DEBUG, ?format, "FORMAT");
    match format {
        Format::Svg => svg::save(path, &to_svg(tree, options)).map_err(|source| Error::Render{source}),
        Format::Dot => std::fs::write(path, to_dot(tree)).map_err(|source| Error::Render{source}),
        Format::Json => write_json(tree, path),
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{reconstruct, trace, ErrorKind};

    const EXAMPLE: &str = "\
(0,) (1,) (2,)
(1,) 1.0
(1,) 2.0
(1,) 3.0
(2,) 5.0
(2,) 6.0
(2,) 9.0
(0,) 0.0
(0,) 10.0
(0,) 20.0
";

    fn example() -> TimedTree {
        reconstruct(&trace::read(EXAMPLE).unwrap()).unwrap()
    }

    fn options() -> RenderOptions {
        RenderOptions{scale: Some(10.0), padding: 0.0, row_height: 10.0, ..Default::default()}
    }

    #[test]
    fn styles_follow_phase() {
        let opts = RenderOptions::default();
        let waiting = style(Phase::Waiting, &opts);
        let active = style(Phase::Active, &opts);
        assert_eq!(active, Style{color: "#2ca02c".into(), width: 1.5});
        assert_eq!(waiting.width, 1.0);
        assert_ne!(waiting.color, active.color);
        assert_eq!(waiting.color, format!("#{:x}", colorous::REDS.eval_continuous(0.4)));

        let wide = RenderOptions{line_width: 3.0, ..Default::default()};
        assert!(style(Phase::Waiting, &wide).width < style(Phase::Active, &wide).width);
    }

    #[test]
    fn lays_out_by_time_and_row() {
        let tree = example();
        let Layout{marks, width, height} = layout(&tree, &options());
        assert_eq!((width, height), (240.0, 20.0));

        let segments = marks
            .iter()
            .filter_map(|m| match m {
                Mark::Segment{x0, x1, y, phase, ..} => Some((*x0, *x1, *y, *phase)),
                _ => None,
            })
            .collect::<Vec<_>>();
        assert_eq!(segments, vec![
            (0.0, 100.0, 10.0, Phase::Waiting),
            (100.0, 200.0, 10.0, Phase::Active),
            (200.0, 210.0, 5.0, Phase::Waiting),
            (210.0, 220.0, 5.0, Phase::Active),
            (200.0, 210.0, 15.0, Phase::Waiting),
            (210.0, 240.0, 15.0, Phase::Active),
        ]);

        let connectors = marks
            .iter()
            .filter(|m| matches!(m, Mark::Connector{..}))
            .collect::<Vec<_>>();
        assert_eq!(connectors.len(), 1);
        match connectors[0] {
            Mark::Connector{x, y0, y1, ..} => assert_eq!((*x, *y0, *y1), (200.0, 5.0, 15.0)),
            _ => unreachable!(),
        }
    }

    #[test]
    fn captions_leaves_on_request() {
        let tree = example();
        let opts = RenderOptions{labels: true, ..options()};
        let captions = layout(&tree, &opts)
            .marks
            .into_iter()
            .filter_map(|m| match m {
                Mark::Caption{text, ..} => Some(text),
                _ => None,
            })
            .collect::<Vec<_>>();
        assert_eq!(captions, vec!["(1,)", "(2,)"]);
    }

    #[test]
    fn fits_width_without_scale() {
        let tree = example();
        let opts = RenderOptions{width: 500.0, padding: 10.0, ..Default::default()};
        let Layout{width, ..} = layout(&tree, &opts);
        assert_eq!(width, 500.0);
    }

    #[test]
    fn svg_is_deterministic_and_styled() {
        let a = to_svg(&example(), &options()).to_string();
        let b = to_svg(&example(), &options()).to_string();
        assert_eq!(a, b);
        assert!(a.contains(&style(Phase::Waiting, &options()).color));
        assert!(a.contains(&style(Phase::Active, &options()).color));
        assert!(a.contains(CONNECTOR_COLOR));
        assert_eq!(a.matches("<line").count(), 7);
    }

    #[test]
    fn dot_names_every_segment() {
        let dot = to_dot(&example());
        assert!(dot.starts_with("digraph"));
        assert!(dot.contains("(0,) waiting 10"));
        assert!(dot.contains("(2,) active 3"));
    }

    #[test]
    fn picks_format_by_extension() {
        assert_eq!(Format::from_path(Path::new("a/tree.svg")), Format::Svg);
        assert_eq!(Format::from_path(Path::new("tree.DOT")), Format::Dot);
        assert_eq!(Format::from_path(Path::new("tree.json")), Format::Json);
        assert_eq!(Format::from_path(Path::new("tree.png")), Format::Svg);
        assert_eq!(Format::from_path(Path::new("tree")), Format::Svg);
    }

    #[test]
    fn writes_files_and_reports_failures() {
        let path = std::env::temp_dir().join(format!("tasktree-render-{}.dot", std::process::id()));
        render(&example(), &path, &options()).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(written, to_dot(&example()));

        let missing = Path::new("/nonexistent/tasktree/tree.svg");
        assert_eq!(render(&example(), missing, &options()).unwrap_err().kind(), ErrorKind::Render);
    }

    #[cfg(not(feature = "serde"))]
    #[test]
    fn json_needs_serde() {
        let path = std::env::temp_dir().join(format!("tasktree-render-{}.json", std::process::id()));
        match render(&example(), &path, &options()).unwrap_err() {
            Error::Render{source} => assert_eq!(source.kind(), std::io::ErrorKind::Unsupported),
            err => panic!("unexpected {err:?}"),
        }
        assert!(!path.exists());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn json_lists_branches() {
        let json = to_json(&example()).unwrap();
        assert!(json.contains("\"Waiting\""));
        assert!(json.contains("\"Active\""));
    }
}
