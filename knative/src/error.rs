use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// The object has no `spec.template` to project a binding into
    #[error("{0} does not expose a pod template")]
    NotPodSpecable(String),
    /// Converting between an object and one of its duck types failed
    #[error("unable to convert duck type: {0}")]
    Duck(#[from] serde_json::Error),
}
