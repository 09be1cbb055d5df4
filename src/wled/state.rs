use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::feature::payload::CommandPayload;

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct SegmentUpdate {
    pub id: u16,

    #[serde(flatten)]
    pub payload: CommandPayload,
}

impl SegmentUpdate {
    pub fn new(id: u16, payload: &CommandPayload) -> SegmentUpdate {
        SegmentUpdate {
            id,
            payload: payload.clone(),
        }
    }
}

/// `seg` accepts either one segment object or a list applied in one frame
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum SegmentField {
    One(SegmentUpdate),
    Many(Vec<SegmentUpdate>),
}

/// Body of `POST /json/state`
#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub struct StateRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub bri: Option<u8>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ps: Option<u16>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub seg: Option<SegmentField>,
}

/// The subset of `GET /json/info` used for liveness
#[derive(Deserialize, Debug, Clone)]
pub struct InfoResponse {
    pub ver: Option<String>,
    pub name: Option<String>,
}

impl InfoResponse {
    pub fn from_value(value: &Value) -> Option<InfoResponse> {
        serde_json::from_value(value.clone()).ok()
    }
}
