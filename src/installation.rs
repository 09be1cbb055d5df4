use std::{collections::BTreeMap, path::Path};

use color_eyre::Result;
use eyre::WrapErr;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ControllerConfig {
    /// Host, `host:port`, `host/prefix` or a full `http://` base URL
    pub ip: String,
    pub name: String,
    pub segments: u16,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct TargetConfig {
    pub controller: String,
    pub segment: u16,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct FeatureConfig {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub controller: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub segment: Option<u16>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub multi_segment: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub targets: Option<Vec<TargetConfig>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,

    /// Default UI color, `#RRGGBB`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct NamedId {
    pub id: u16,
    pub name: String,
}

fn default_name() -> String {
    "Pumpkin".to_string()
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Installation {
    #[serde(default = "default_name")]
    pub name: String,
    pub controllers: BTreeMap<String, ControllerConfig>,
    /// Kept in file order, which is the order the UI lists them in
    pub features: IndexMap<String, FeatureConfig>,

    #[serde(default)]
    pub effects: Vec<NamedId>,

    #[serde(default)]
    pub palettes: Vec<NamedId>,
}

pub fn parse_installation(bytes: &[u8]) -> Result<Installation> {
    let de = &mut serde_json::Deserializer::from_slice(bytes);
    let installation: Installation = serde_path_to_error::deserialize(de)?;

    Ok(installation)
}

pub fn read_installation(path: impl AsRef<Path>) -> Result<Installation> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)
        .wrap_err_with(|| format!("Failed to read installation file {}", path.display()))?;

    parse_installation(&bytes)
        .wrap_err_with(|| format!("Invalid installation file {}", path.display()))
}
