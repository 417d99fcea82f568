//! Loads a directory of TOML directive files into `Directive` values. Not
//! part of the hard core — swappable, and deliberately dumb: one file per
//! directive, no includes, no schema validation beyond what `toml` and the
//! field types give us for free.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use siem_types::{Directive, Rule};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DirectiveError {
    #[error("failed to read directive directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read directive file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse directive file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: Box<toml::de::Error>,
    },
}

#[derive(Debug, Deserialize)]
struct RawDirective {
    id: u64,
    name: String,
    priority: u8,
    kingdom: String,
    category: String,
    rules: Vec<RawRule>,
}

#[derive(Debug, Deserialize)]
struct RawRule {
    from: String,
    to: String,
    port_from: String,
    port_to: String,
    occurrence: u32,
    timeout: i64,
    reliability: u8,
    #[serde(default)]
    attributes: BTreeMap<String, String>,
}

impl From<RawDirective> for Directive {
    fn from(raw: RawDirective) -> Self {
        Directive {
            id: raw.id,
            name: raw.name,
            priority: raw.priority,
            kingdom: raw.kingdom,
            category: raw.category,
            rules: raw.rules.into_iter().map(Rule::from).collect(),
        }
    }
}

impl From<RawRule> for Rule {
    fn from(raw: RawRule) -> Self {
        Rule {
            // Infallible: `AddrSpec`/`PortSpec` fall back to `Literal` for
            // anything that isn't a recognized wildcard or back-reference.
            from: raw.from.parse().unwrap_or_else(|e: std::convert::Infallible| match e {}),
            to: raw.to.parse().unwrap_or_else(|e: std::convert::Infallible| match e {}),
            port_from: raw
                .port_from
                .parse()
                .unwrap_or_else(|e: std::convert::Infallible| match e {}),
            port_to: raw.port_to.parse().unwrap_or_else(|e: std::convert::Infallible| match e {}),
            occurrence: raw.occurrence,
            timeout: raw.timeout,
            reliability: raw.reliability,
            attributes: raw.attributes,
        }
    }
}

/// Parses every `*.toml` file directly under `dir` as one directive each,
/// sorted by directive id for a deterministic load order.
pub fn load_dir(dir: &Path) -> Result<Vec<Directive>, DirectiveError> {
    let entries = std::fs::read_dir(dir).map_err(|source| DirectiveError::ReadDir {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut directives = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| DirectiveError::ReadDir {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("toml") {
            continue;
        }
        let contents = std::fs::read_to_string(&path).map_err(|source| DirectiveError::ReadFile {
            path: path.clone(),
            source,
        })?;
        let raw: RawDirective = toml::from_str(&contents).map_err(|source| DirectiveError::Parse {
            path: path.clone(),
            source: Box::new(source),
        })?;
        directives.push(Directive::from(raw));
    }

    directives.sort_by_key(|d| d.id);
    Ok(directives)
}
