pub mod sinkbinding;

pub use sinkbinding::{SinkBinding, SinkBindingSpec, SinkBindingStatus, K_SINK};
