use std::{collections::BTreeMap, time::Duration};

use futures::future::join_all;
use log::warn;
use serde::Serialize;

use self::{error::DispatchError, monitor::ControllerSet};
use crate::{
    feature::{
        payload::CommandPayload,
        registry::{Feature, FeatureRegistry},
    },
    installation::Installation,
    protocols::http::HyperHttpClient,
    wled::{
        client::{ControllerClient, ControllerResponse},
        state::SegmentUpdate,
    },
};

pub mod error;
pub mod monitor;

/// Aggregated outcome of one feature dispatch.
///
/// `results` always holds every contacted controller, successes included,
/// so a partial failure still shows which segments did change.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct DispatchResult {
    pub success: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub results: BTreeMap<String, ControllerResponse>,
}

impl DispatchResult {
    /// `outcomes` are expected in partition order, which is also the order
    /// failures are joined into `error`.
    pub fn aggregate(outcomes: impl IntoIterator<Item = (String, ControllerResponse)>) -> Self {
        let mut errors = vec![];
        let mut results = BTreeMap::new();

        for (key, response) in outcomes {
            if !response.success {
                let message = response.error.as_deref().unwrap_or("unknown error");
                warn!("Controller '{}' failed: {}", key, message);
                errors.push(format!("{}: {}", key, message));
            }

            results.insert(key, response);
        }

        DispatchResult {
            success: errors.is_empty(),
            error: (!errors.is_empty()).then(|| errors.join("; ")),
            results,
        }
    }
}

/// All segment updates of one dispatch that go to the same controller.
struct ControllerBatch<'a> {
    client: &'a ControllerClient,
    segments: Vec<SegmentUpdate>,
}

/// Resolves features to hardware targets and fans commands out to the
/// controllers involved.
///
/// Holds no mutable state, so any number of dispatches may run at once.
#[derive(Clone, Debug)]
pub struct Dispatcher {
    registry: FeatureRegistry,
    controllers: ControllerSet,
}

impl Dispatcher {
    pub fn new(registry: FeatureRegistry, controllers: ControllerSet) -> Dispatcher {
        Dispatcher {
            registry,
            controllers,
        }
    }

    pub fn from_installation(
        installation: &Installation,
        http: &HyperHttpClient,
        timeout: Duration,
    ) -> Dispatcher {
        Dispatcher::new(
            FeatureRegistry::from_installation(installation),
            ControllerSet::from_installation(installation, http, timeout),
        )
    }

    pub fn registry(&self) -> &FeatureRegistry {
        &self.registry
    }

    pub fn controllers(&self) -> &ControllerSet {
        &self.controllers
    }

    /// Groups the feature's targets by controller, keeping target order
    /// within each controller and ordering controllers by first appearance.
    /// Fails on the first unknown controller, before anything is sent.
    fn partition<'a>(
        &'a self,
        feature: &Feature,
        payload: &CommandPayload,
    ) -> Result<Vec<ControllerBatch<'a>>, DispatchError> {
        let mut batches: Vec<ControllerBatch<'a>> = vec![];

        for target in feature.targets() {
            let client = self.controllers.get(&target.controller).ok_or_else(|| {
                DispatchError::ControllerNotFound {
                    controller: target.controller.clone(),
                    feature: feature.key.clone(),
                }
            })?;

            let update = SegmentUpdate::new(target.segment, payload);

            match batches.iter_mut().find(|batch| batch.client.key == client.key) {
                Some(batch) => batch.segments.push(update),
                None => batches.push(ControllerBatch {
                    client,
                    segments: vec![update],
                }),
            }
        }

        Ok(batches)
    }

    /// Applies `payload` to every segment of a feature.
    ///
    /// Batches for different controllers are sent concurrently. There is no
    /// rollback: controllers that acknowledged keep their new state even if
    /// a sibling failed.
    pub async fn set_feature(
        &self,
        feature_key: &str,
        payload: &CommandPayload,
    ) -> Result<DispatchResult, DispatchError> {
        let feature = self.registry.resolve(feature_key)?;
        self.apply(feature, payload).await
    }

    /// Like `set_feature`, for a feature already resolved from `registry()`.
    pub async fn apply(
        &self,
        feature: &Feature,
        payload: &CommandPayload,
    ) -> Result<DispatchResult, DispatchError> {
        let batches = self.partition(feature, payload)?;

        if !feature.is_multi_segment() {
            if let [batch] = batches.as_slice() {
                if let [update] = batch.segments.as_slice() {
                    let response = batch.client.set_segment(update.id, payload).await;
                    return Ok(DispatchResult::aggregate([(batch.client.key.clone(), response)]));
                }
            }
        }

        let responses = join_all(
            batches
                .iter()
                .map(|batch| batch.client.set_segments(&batch.segments)),
        )
        .await;

        let keys = batches.iter().map(|batch| batch.client.key.clone());

        Ok(DispatchResult::aggregate(keys.zip(responses)))
    }
}
