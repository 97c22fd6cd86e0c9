//! Solve times by problem size
//!
//! Runs are grouped by worker count and plotted on a log-time scatter plot,
//! one color per worker count, with the mean for each size drawn over the
//! individual runs.
use std::collections::BTreeMap;
use std::path::Path;

use svg::node::element::{Circle, Group, Line, Text};
use svg::Document;
use tracing::{event, instrument, Level};

use crate::error::Error;
use crate::metadata::RunMetadata;

/// Every timed run with one worker count.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Series {
    pub workers: u32,
    pub times_by_size: BTreeMap<u32, Vec<f64>>,
}

impl Series {
    /// Mean time per size, by ascending size.
    pub fn means(&self) -> Vec<(u32, f64)> {
        self.times_by_size
            .iter()
            .filter(|(_, times)| !times.is_empty())
            .map(|(size, times)| (*size, times.iter().sum::<f64>() / times.len() as f64))
            .collect()
    }

    pub fn points(&self) -> Vec<(u32, f64)> {
        self.times_by_size
            .iter()
            .flat_map(|(size, times)| times.iter().map(move |t| (*size, *t)))
            .collect()
    }

    pub fn legend(&self) -> String {
        let plural = if self.workers == 1 { "" } else { "s" };
        format!("{} Worker{}", self.workers, plural)
    }
}

/// Group runs that know their worker count, size and time, by worker count.
#[instrument(skip(runs), fields(runs = runs.len()))]
pub fn collect(runs: &[RunMetadata]) -> Vec<Series> {
    let mut by_workers = BTreeMap::<u32, Series>::new();
    for run in runs {
        let (workers, size, time) = match (run.workers, run.size, run.time) {
            (Some(workers), Some(size), Some(time)) => (workers, size, time),
            _ => continue,
        };
        if time.is_nan() || time <= 0.0 {
            event!(Level::DEBUG, ?run.filename, %time, "SKIP");
            continue;
        }
        by_workers
            .entry(workers)
            .or_insert_with(|| Series{workers, ..Default::default()})
            .times_by_size
            .entry(size)
            .or_default()
            .push(time);
    }
    by_workers.into_values().collect()
}

#[derive(Clone, Debug, PartialEq)]
pub struct PlotOptions {
    pub width: f64,
    pub height: f64,
    /// Space around the plot area for axes and their labels.
    pub margin: f64,
}

impl Default for PlotOptions {
    fn default() -> Self {
        Self{width: 640.0, height: 480.0, margin: 60.0}
    }
}

/// Linear map from `[lo, hi]` onto `[a, b]`.
fn lerp(v: f64, (lo, hi): (f64, f64), (a, b): (f64, f64)) -> f64 {
    a + (v - lo) / (hi - lo) * (b - a)
}

/// Scatter `series` as an SVG document.
pub fn plot(series: &[Series], options: &PlotOptions) -> Document {
    let points = series.iter().flat_map(Series::points).collect::<Vec<_>>();
    let (mut x_lo, mut x_hi) = points
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), (s, _)| (lo.min(*s as f64), hi.max(*s as f64)));
    let (mut y_lo, mut y_hi) = points
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), (_, t)| (lo.min(t.log10()), hi.max(t.log10())));
    if points.is_empty() {
        (x_lo, x_hi, y_lo, y_hi) = (0.0, 1.0, 0.0, 1.0);
    }
    if x_hi <= x_lo {
        (x_lo, x_hi) = (x_lo - 1.0, x_hi + 1.0);
    }
    let (y_lo, y_hi) = (y_lo.floor(), y_hi.ceil().max(y_lo.floor() + 1.0));
    event!(Level::DEBUG, %x_lo, %x_hi, %y_lo, %y_hi, "AXES");

    let PlotOptions{width, height, margin} = *options;
    let xs = (margin, width - margin / 2.0);
    let ys = (height - margin, margin / 2.0);
    let px = |size: u32| lerp(size as f64, (x_lo, x_hi), xs);
    let py = |time: f64| lerp(time.log10(), (y_lo, y_hi), ys);

    let mut grid = Group::new()
        .set("stroke", "black")
        .set("stroke-opacity", 0.3);
    let mut ticks = Group::new()
        .set("font-family", "sans-serif")
        .set("font-size", 11);
    for decade in (y_lo as i32)..=(y_hi as i32) {
        let y = lerp(decade as f64, (y_lo, y_hi), ys);
        grid = grid.add(Line::new().set("x1", xs.0).set("y1", y).set("x2", xs.1).set("y2", y));
        ticks = ticks.add(Text::new()
            .set("x", xs.0 - 6.0)
            .set("y", y)
            .set("text-anchor", "end")
            .set("dominant-baseline", "middle")
            .add(svg::node::Text::new(format!("1e{decade}"))));
    }
    for i in 0..=4 {
        let size = x_lo + (x_hi - x_lo) * i as f64 / 4.0;
        let x = lerp(size, (x_lo, x_hi), xs);
        grid = grid.add(Line::new().set("x1", x).set("y1", ys.0).set("x2", x).set("y2", ys.1));
        ticks = ticks.add(Text::new()
            .set("x", x)
            .set("y", ys.0 + 16.0)
            .set("text-anchor", "middle")
            .add(svg::node::Text::new(format!("{}", size.round()))));
    }

    let axes = Group::new()
        .set("stroke", "black")
        .add(Line::new().set("x1", xs.0).set("y1", ys.0).set("x2", xs.1).set("y2", ys.0))
        .add(Line::new().set("x1", xs.0).set("y1", ys.0).set("x2", xs.0).set("y2", ys.1));
    let titles = Group::new()
        .set("font-family", "sans-serif")
        .set("font-size", 13)
        .set("text-anchor", "middle")
        .add(Text::new()
            .set("x", (xs.0 + xs.1) / 2.0)
            .set("y", height - margin / 4.0)
            .add(svg::node::Text::new("Problem Size (Graph Vertices)")))
        .add(Text::new()
            .set("transform", format!("translate({}, {}) rotate(-90)", margin / 4.0, (ys.0 + ys.1) / 2.0))
            .add(svg::node::Text::new("Time (Seconds)")));

    let mut runs = Group::new();
    let mut means = Group::new();
    let mut legend = Group::new()
        .set("font-family", "sans-serif")
        .set("font-size", 11);
    for (i, s) in series.iter().enumerate() {
        let color = format!("#{:x}", colorous::CATEGORY10[i % colorous::CATEGORY10.len()]);
        for (size, time) in s.points() {
            runs = runs.add(Circle::new()
                .set("cx", px(size))
                .set("cy", py(time))
                .set("r", 1.5)
                .set("fill", color.as_str())
                .set("fill-opacity", 0.2));
        }
        for (size, time) in s.means() {
            means = means.add(Circle::new()
                .set("cx", px(size))
                .set("cy", py(time))
                .set("r", 3)
                .set("fill", color.as_str()));
        }
        let y = ys.1 + 10.0 + 16.0 * i as f64;
        legend = legend
            .add(Circle::new().set("cx", xs.0 + 14.0).set("cy", y).set("r", 3).set("fill", color.as_str()))
            .add(Text::new()
                .set("x", xs.0 + 22.0)
                .set("y", y)
                .set("dominant-baseline", "middle")
                .add(svg::node::Text::new(s.legend())));
    }

    Document::new()
        .set("viewBox", (0, 0, width, height))
        .set("width", width)
        .set("height", height)
        .add(grid)
        .add(axes)
        .add(ticks)
        .add(titles)
        .add(runs)
        .add(means)
        .add(legend)
}

/// Write the plot of `series` to `path` as SVG.
#[instrument(skip(series, options), fields(series = series.len()))]
pub fn render(series: &[Series], path: &Path, options: &PlotOptions) -> Result<(), Error> {
    svg::save(path, &plot(series, options)).map_err(|source| Error::Render{source})
}
