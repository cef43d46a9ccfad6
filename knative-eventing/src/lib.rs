//! Knative eventing custom resources.
pub mod apis;
