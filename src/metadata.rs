//! Run metadata from solver logs
//!
//! Solver logs carry `KEY=VALUE` lines alongside the trace:
//!
//! ```text
//! FILENAME=/data/er__30__7.json
//! WORKERS=4
//! TIME=1.5
//! ```
//!
//! The problem size and seed are encoded in the input file name as
//! `<kind>__<size>__<seed>.json`.
use std::path::Path;
use std::str::FromStr;

use tracing::{event, instrument, Level};

use crate::error::{Error, OrErrExt};

#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct RunMetadata {
    pub workers: Option<u32>,
    pub inequalities: Option<u64>,
    /// Wall-clock seconds.
    pub time: Option<f64>,
    pub size: Option<u32>,
    pub seed: Option<u64>,
    pub filename: Option<String>,
}

fn value<T: FromStr>(key: &str, value: &str) -> Result<T, Error> {
    value
        .parse::<T>()
        .ok()
        .or_err(Error::Metadata{key: key.to_string(), value: value.to_string()})
}

/// Split `.../<kind>__<size>__<seed>.<ext>` into size and seed.
fn size_and_seed(filename: &str) -> Result<(u32, u64), Error> {
    let bad = || Error::Metadata{key: "FILENAME".into(), value: filename.to_string()};
    let base = filename.rsplit('/').next().unwrap_or(filename);
    let parts = base.split("__").collect::<Vec<_>>();
    match parts[..] {
        [.., size, seed] => {
            let seed = seed.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(seed);
            let size = size.parse().map_err(|_| bad())?;
            let seed = seed.parse().map_err(|_| bad())?;
            Ok((size, seed))
        },
        _ => Err(bad()),
    }
}

/// Collect the recognized `KEY=VALUE` lines of `text`.
pub fn parse(text: &str) -> Result<RunMetadata, Error> {
    let mut meta = RunMetadata::default();
    for line in text.lines() {
        let (key, raw) = match line.split_once('=') {
            Some((key, raw)) => (key.trim(), raw.trim()),
            None => continue,
        };
        match key {
            "WORKERS" => meta.workers = Some(value(key, raw)?),
            "INEQUALITIES" => meta.inequalities = Some(value(key, raw)?),
            "TIME" => meta.time = Some(value(key, raw)?),
            "FILENAME" => {
                let (size, seed) = size_and_seed(raw)?;
                meta.size = Some(size);
                meta.seed = Some(seed);
                meta.filename = Some(raw.to_string());
            },
            _ => {},
        }
    }
    Ok(meta)
}

/// Read and parse the log at `path`.
#[instrument]
pub fn load(path: &Path) -> Result<RunMetadata, Error> {
    let text = std::fs::read_to_string(path)?;
    let meta = parse(&text)?;
    event!(Level::DEBUG, ?meta, "METADATA");
    Ok(meta)
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::ErrorKind;

    #[test]
    fn reads_known_keys() {
        let text = "\
Solving...
FILENAME=/a/b/er__30__7.json
WORKERS=4
INEQUALITIES=120
TIME=1.5
COLOR=blue
";
        assert_eq!(parse(text).unwrap(), RunMetadata{
            workers: Some(4),
            inequalities: Some(120),
            time: Some(1.5),
            size: Some(30),
            seed: Some(7),
            filename: Some("/a/b/er__30__7.json".into()),
        });
    }

    #[test]
    fn missing_keys_stay_unset() {
        assert_eq!(parse("nothing to see\n").unwrap(), RunMetadata::default());
        assert_eq!(parse("TIME = 2\n").unwrap().time, Some(2.0));
    }

    #[test]
    fn rejects_bad_values() {
        match parse("WORKERS=many\n").unwrap_err() {
            Error::Metadata{key, value} => {
                assert_eq!(key, "WORKERS");
                assert_eq!(value, "many");
            },
            err => panic!("unexpected {err:?}"),
        }
        assert_eq!(parse("FILENAME=plain.json\n").unwrap_err().kind(), ErrorKind::Metadata);
        assert_eq!(parse("FILENAME=er__x__7.json\n").unwrap_err().kind(), ErrorKind::Metadata);
    }

    #[test]
    fn reports_missing_logs() {
        let err = load(Path::new("/nonexistent/tasktree.log")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}
