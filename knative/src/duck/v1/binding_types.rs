use k8s_openapi::{
    api::core::v1::ObjectReference,
    apimachinery::pkg::apis::meta::v1::LabelSelector,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The part of a Binding spec that names the workload being bound.
#[derive(Serialize, Deserialize, Clone, Default, Debug, JsonSchema, PartialEq)]
pub struct BindingSpec {
    // We diverge from knative go for the binding spec.
    // The Binding relies heavily of ducktyping, as described
    // in the docs: https://knative.dev/docs/reference/concepts/duck-typing/#binding
    pub subject: Reference,
}

// Found in knative.dev/pkg/tracker
/// Reference is modeled after corev1.ObjectReference, but omits fields
/// unsupported by the tracker, and permits us to extend things in
/// divergent ways.
#[derive(Serialize, Deserialize, Clone, Default, Debug, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Reference {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(flatten)]
    pub subject: Subject
}

/// Selects the referent either by name or by the labels of a set of objects.
#[derive(Serialize, Deserialize, Clone, Debug, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum Subject {
    Name(String),
    Selector(LabelSelector)
}

impl Default for Subject {
    fn default() -> Self {
        Subject::Name("".into())
    }
}

impl Reference {
    pub fn by_name(api_version: &str, kind: &str, name: &str) -> Self {
        Reference {
            kind: Some(kind.into()),
            api_version: Some(api_version.into()),
            namespace: None,
            subject: Subject::Name(name.into()),
        }
    }

    pub fn by_selector(api_version: &str, kind: &str, selector: LabelSelector) -> Self {
        Reference {
            kind: Some(kind.into()),
            api_version: Some(api_version.into()),
            namespace: None,
            subject: Subject::Selector(selector),
        }
    }

    pub fn in_namespace(self, namespace: &str) -> Self {
        Reference {
            namespace: Some(namespace.into()),
            ..self
        }
    }

    /// The referent's name, if it is not addressed by selector.
    pub fn name(&self) -> Option<&str> {
        match &self.subject {
            Subject::Name(name) => Some(name),
            Subject::Selector(..) => None,
        }
    }
}

impl From<Reference> for ObjectReference {
    fn from(reference: Reference) -> ObjectReference {
        let Reference { api_version, kind, namespace, subject } = reference;
        ObjectReference {
            api_version,
            kind,
            namespace,
            name: match subject {
                Subject::Name(name) => Some(name),
                Subject::Selector(..) => None
            },
            ..Default::default()
        }
    }
}

/// The status of a Binding, driven by the reconciler that projects the binding into its subject.
pub trait BindableStatus {
    /// Populate every condition of the status as Unknown, leaving conditions that are already set.
    fn initialize_conditions(&mut self);

    /// The binding can be satisfied and has been applied to the subject.
    fn mark_binding_available(&mut self);

    /// The binding cannot be satisfied, for the given reason.
    fn mark_binding_unavailable(&mut self, reason: &str, message: Option<String>);

    fn set_observed_generation(&mut self, generation: i64);
}

/// Resources with a [`BindableStatus`].
pub trait HasBindableStatus {
    type Status: BindableStatus;

    fn binding_status(&mut self) -> &mut Self::Status;
}
