//! A minimal file-backed asset inventory lookup. Asset inventory is an
//! external collaborator the core only consumes (`SPEC_FULL.md` §1) — this
//! is the CLI's own stand-in so `run` has something real to call.

use std::collections::HashMap;
use std::net::IpAddr;
use std::path::Path;

use serde::Deserialize;
use siem_kernel::AssetLookup;

#[derive(Debug, Deserialize)]
struct AssetRecord {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    value: i64,
}

/// Loaded once from `<base_dir>/assets.json`: `{"1.1.1.1": {"name": "web01",
/// "value": 5}}`. Absent entries fall back to empty name / zero value, per
/// §6's `LookupMiss` contract.
pub struct FileAssetLookup(HashMap<IpAddr, AssetRecord>);

impl FileAssetLookup {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self(HashMap::new()));
        }
        let contents = std::fs::read_to_string(path)?;
        let raw: HashMap<String, AssetRecord> = serde_json::from_str(&contents)?;
        let map = raw
            .into_iter()
            .filter_map(|(ip, record)| ip.parse::<IpAddr>().ok().map(|ip| (ip, record)))
            .collect();
        Ok(Self(map))
    }
}

impl AssetLookup for FileAssetLookup {
    fn asset_name(&self, ip: IpAddr) -> Option<String> {
        self.0.get(&ip).and_then(|r| r.name.clone())
    }

    fn asset_value(&self, ip: IpAddr) -> i64 {
        self.0.get(&ip).map_or(0, |r| r.value)
    }
}
