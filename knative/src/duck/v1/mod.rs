pub mod binding_types;
pub mod knative_reference;
pub mod podspec_types;
pub mod source_types;
pub mod status_types;
