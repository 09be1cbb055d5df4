use std::time::Duration;

use color_eyre::Result;
use hyper::Uri;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::state::{InfoResponse, SegmentField, SegmentUpdate, StateRequest};
use crate::{
    feature::payload::CommandPayload,
    installation::ControllerConfig,
    protocols::http::{mk_get_request, mk_post_request, HyperHttpClient},
};

/// Uniform outcome of one controller call.
///
/// `controller` carries the controller key and is only set on failure.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ControllerResponse {
    pub success: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub controller: Option<String>,
}

impl ControllerResponse {
    pub fn ok(data: Value) -> ControllerResponse {
        ControllerResponse {
            success: true,
            data: Some(data),
            error: None,
            controller: None,
        }
    }

    pub fn failed(controller: &str, error: impl Into<String>) -> ControllerResponse {
        ControllerResponse {
            success: false,
            data: None,
            error: Some(error.into()),
            controller: Some(controller.to_string()),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PingStatus {
    pub online: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Builds the base URL of a controller from its configured address.
fn base_url(ip: &str) -> String {
    let ip = ip.trim_end_matches('/');

    if ip.starts_with("http://") || ip.starts_with("https://") {
        ip.to_string()
    } else {
        format!("http://{}", ip)
    }
}

/// Client for one physical controller.
///
/// Immutable after construction and cheap to clone; the underlying hyper
/// client shares its connection pool. No call ever returns an error, every
/// transport failure is folded into a [`ControllerResponse`].
#[derive(Clone, Debug)]
pub struct ControllerClient {
    pub key: String,
    pub name: String,
    pub segments: u16,
    base_url: String,
    http: HyperHttpClient,
    timeout: Duration,
}

impl ControllerClient {
    pub fn new(
        key: &str,
        config: &ControllerConfig,
        http: &HyperHttpClient,
        timeout: Duration,
    ) -> ControllerClient {
        ControllerClient {
            key: key.to_string(),
            name: config.name.clone(),
            segments: config.segments,
            base_url: base_url(&config.ip),
            http: http.clone(),
            timeout,
        }
    }

    fn uri(&self, path: &str) -> Result<Uri> {
        Ok(format!("{}{}", self.base_url, path).parse()?)
    }

    fn normalize(&self, result: Result<Value>) -> ControllerResponse {
        match result {
            Ok(data) => ControllerResponse::ok(data),
            Err(e) => ControllerResponse::failed(&self.key, e.to_string()),
        }
    }

    async fn post_json(&self, path: &str, body: &StateRequest) -> Result<Value> {
        let uri = self.uri(path)?;
        mk_post_request(&self.http, &uri, body, self.timeout).await
    }

    async fn post_state(&self, body: &StateRequest) -> ControllerResponse {
        let result = self.post_json("/json/state", body).await;
        self.normalize(result)
    }

    async fn get_json(&self, path: &str) -> Result<Value> {
        let uri = self.uri(path)?;
        mk_get_request(&self.http, &uri, self.timeout).await
    }

    pub async fn set_segment(&self, segment: u16, payload: &CommandPayload) -> ControllerResponse {
        self.post_state(&StateRequest {
            seg: Some(SegmentField::One(SegmentUpdate::new(segment, payload))),
            ..Default::default()
        })
        .await
    }

    /// Applies every update in one request, so the controller changes them
    /// in the same frame. List order is preserved.
    pub async fn set_segments(&self, segments: &[SegmentUpdate]) -> ControllerResponse {
        self.post_state(&StateRequest {
            seg: Some(SegmentField::Many(segments.to_vec())),
            ..Default::default()
        })
        .await
    }

    pub async fn get_state(&self) -> ControllerResponse {
        let result = self.get_json("/json/state").await;
        self.normalize(result)
    }

    pub async fn get_info(&self) -> ControllerResponse {
        let result = self.get_json("/json/info").await;
        self.normalize(result)
    }

    pub async fn set_power(&self, on: bool) -> ControllerResponse {
        self.post_state(&StateRequest {
            on: Some(on),
            ..Default::default()
        })
        .await
    }

    pub async fn set_brightness(&self, level: i64) -> ControllerResponse {
        let bri = level.clamp(0, 255) as u8;

        self.post_state(&StateRequest {
            bri: Some(bri),
            ..Default::default()
        })
        .await
    }

    pub async fn load_preset(&self, preset: u16) -> ControllerResponse {
        self.post_state(&StateRequest {
            ps: Some(preset),
            ..Default::default()
        })
        .await
    }

    pub async fn ping(&self) -> PingStatus {
        match self.get_json("/json/info").await {
            Ok(data) => {
                let info = InfoResponse::from_value(&data);

                PingStatus {
                    online: true,
                    version: info.as_ref().and_then(|info| info.ver.clone()),
                    name: info.and_then(|info| info.name),
                    error: None,
                }
            }
            Err(e) => PingStatus {
                online: false,
                version: None,
                name: None,
                error: Some(e.to_string()),
            },
        }
    }
}
