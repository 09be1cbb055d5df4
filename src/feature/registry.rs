use std::collections::BTreeMap;

use log::warn;

use super::payload::{parse_hex_color, Rgb};
use crate::{
    dispatch::error::DispatchError,
    installation::{FeatureConfig, Installation},
};

/// A resolved (controller, segment) address
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SegmentTarget {
    pub controller: String,
    pub segment: u16,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FeatureAddress {
    Single(SegmentTarget),
    Multi(Vec<SegmentTarget>),
}

#[derive(Clone, Debug)]
pub struct Feature {
    pub key: String,
    pub name: String,
    pub group: Option<String>,
    pub color: Option<Rgb>,
    pub address: FeatureAddress,
}

impl Feature {
    pub fn is_multi_segment(&self) -> bool {
        matches!(self.address, FeatureAddress::Multi(_))
    }

    /// Targets in declaration order
    pub fn targets(&self) -> &[SegmentTarget] {
        match &self.address {
            FeatureAddress::Single(target) => std::slice::from_ref(target),
            FeatureAddress::Multi(targets) => targets,
        }
    }
}

fn feature_address(key: &str, config: &FeatureConfig) -> Option<FeatureAddress> {
    let targets = config.targets.as_deref().unwrap_or_default();

    // An explicit `multiSegment: false` wins over a leftover target list
    let multi_segment = config.multi_segment.unwrap_or(!targets.is_empty());

    if multi_segment {
        if targets.is_empty() {
            warn!("Feature '{}' is multi-segment but lists no targets, skipping", key);
            return None;
        }

        let targets = targets
            .iter()
            .map(|target| SegmentTarget {
                controller: target.controller.clone(),
                segment: target.segment,
            })
            .collect();

        return Some(FeatureAddress::Multi(targets));
    }

    match (&config.controller, config.segment) {
        (Some(controller), Some(segment)) => Some(FeatureAddress::Single(SegmentTarget {
            controller: controller.clone(),
            segment,
        })),
        _ => {
            warn!("Feature '{}' has no controller/segment address, skipping", key);
            None
        }
    }
}

/// Read-only lookup from feature key to hardware targets.
#[derive(Clone, Debug, Default)]
pub struct FeatureRegistry {
    features: BTreeMap<String, Feature>,
}

impl FeatureRegistry {
    /// Builds the registry, logging (not rejecting) references that look
    /// wrong. Unknown controllers surface at dispatch time instead.
    pub fn from_installation(installation: &Installation) -> FeatureRegistry {
        let mut features = BTreeMap::new();

        for (key, config) in &installation.features {
            let Some(address) = feature_address(key, config) else {
                continue;
            };

            let color = config.color.as_deref().and_then(|color| {
                let rgb = parse_hex_color(color);
                if rgb.is_none() {
                    warn!("Feature '{}' has invalid default color '{}'", key, color);
                }
                rgb
            });

            let feature = Feature {
                key: key.clone(),
                name: config.name.clone(),
                group: config.group.clone(),
                color,
                address,
            };

            for target in feature.targets() {
                match installation.controllers.get(&target.controller) {
                    None => warn!(
                        "Feature '{}' references unknown controller '{}'",
                        key, target.controller
                    ),
                    Some(controller) if target.segment >= controller.segments => warn!(
                        "Feature '{}' targets segment {} but controller '{}' declares {} segments",
                        key, target.segment, target.controller, controller.segments
                    ),
                    Some(_) => {}
                }
            }

            features.insert(key.clone(), feature);
        }

        FeatureRegistry { features }
    }

    /// Looks up a feature; its `targets()` are the resolved addresses.
    pub fn resolve(&self, key: &str) -> Result<&Feature, DispatchError> {
        self.features
            .get(key)
            .ok_or_else(|| DispatchError::FeatureNotFound {
                feature: key.to_string(),
            })
    }

    pub fn features(&self) -> impl Iterator<Item = &Feature> {
        self.features.values()
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}
