use thiserror::Error;

/// Caller-input errors raised before any controller is contacted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("Feature '{feature}' not found")]
    FeatureNotFound { feature: String },

    #[error("Controller '{controller}' not found (referenced by feature '{feature}')")]
    ControllerNotFound { controller: String, feature: String },
}
