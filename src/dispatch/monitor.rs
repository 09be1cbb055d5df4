use std::{collections::BTreeMap, future::Future, time::Duration};

use futures::future::join_all;

use crate::{
    installation::Installation,
    protocols::http::HyperHttpClient,
    wled::client::{ControllerClient, ControllerResponse, PingStatus},
};

/// Every configured controller, keyed by controller key.
///
/// Whole-installation operations contact all controllers concurrently and
/// report each one individually, never as a single pass/fail.
#[derive(Clone, Debug, Default)]
pub struct ControllerSet {
    clients: BTreeMap<String, ControllerClient>,
}

impl ControllerSet {
    pub fn from_installation(
        installation: &Installation,
        http: &HyperHttpClient,
        timeout: Duration,
    ) -> ControllerSet {
        let clients = installation
            .controllers
            .iter()
            .map(|(key, config)| (key.clone(), ControllerClient::new(key, config, http, timeout)))
            .collect();

        ControllerSet { clients }
    }

    pub fn get(&self, key: &str) -> Option<&ControllerClient> {
        self.clients.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ControllerClient> {
        self.clients.values()
    }

    async fn for_each<'a, F, Fut, T>(&'a self, f: F) -> BTreeMap<String, T>
    where
        F: Fn(&'a ControllerClient) -> Fut,
        Fut: Future<Output = T>,
    {
        let results = join_all(self.clients.values().map(f)).await;

        self.clients.keys().cloned().zip(results).collect()
    }

    /// Single liveness probe per controller, no retries.
    pub async fn ping_all(&self) -> BTreeMap<String, PingStatus> {
        self.for_each(|client| client.ping()).await
    }

    pub async fn set_all_power(&self, on: bool) -> BTreeMap<String, ControllerResponse> {
        self.for_each(|client| client.set_power(on)).await
    }

    pub async fn set_all_brightness(&self, level: i64) -> BTreeMap<String, ControllerResponse> {
        self.for_each(|client| client.set_brightness(level)).await
    }

    pub async fn load_preset_all(&self, preset: u16) -> BTreeMap<String, ControllerResponse> {
        self.for_each(|client| client.load_preset(preset)).await
    }

    pub async fn get_all_states(&self) -> BTreeMap<String, ControllerResponse> {
        self.for_each(|client| client.get_state()).await
    }

    pub async fn get_all_info(&self) -> BTreeMap<String, ControllerResponse> {
        self.for_each(|client| client.get_info()).await
    }
}
