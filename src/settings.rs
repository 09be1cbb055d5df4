use serde::Deserialize;

#[derive(Clone, Deserialize, Debug)]
pub struct ServerSettings {
    pub bind: String,
    pub port: u16,
    pub log_level: Option<String>,
}

#[derive(Clone, Deserialize, Debug)]
pub struct InstallationSettings {
    pub path: String,
    pub request_timeout_ms: u64,
}

#[derive(Clone, Deserialize, Debug)]
pub struct Settings {
    pub server: ServerSettings,
    pub installation: InstallationSettings,
}

pub fn read_settings() -> Result<Settings, config::ConfigError> {
    config::Config::builder()
        .set_default("server.bind", "0.0.0.0")?
        .set_default("server.port", 3000)?
        .set_default("installation.path", "pumpkin.json")?
        .set_default("installation.request_timeout_ms", 5000)?
        .add_source(config::File::with_name("Settings").required(false))
        .add_source(config::Environment::with_prefix("PUMPKIN").separator("__"))
        .build()?
        .try_deserialize::<Settings>()
}
