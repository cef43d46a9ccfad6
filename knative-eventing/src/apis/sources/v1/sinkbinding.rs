use kube::CustomResource;
use k8s_openapi::api::core::v1::EnvVar;
use knative::{
    binding_types::{BindableStatus, BindingSpec, HasBindableStatus, Reference},
    conditions::{ConditionAccessor, Conditions},
    podspec_types::ExposesPodTemplate,
    source_types::{SinkManager, SourceCondition, SourceSpec, SourceStatus},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};
use url::Url;

/// The environment variable that carries the resolved sink URI into the subject's containers.
pub const K_SINK: &str = "K_SINK";

/// Reasons reported on the `Ready` condition of a [`SinkBinding`].
pub mod reason {
    /// No URI could be resolved for the sink.
    pub const SINK_NOT_FOUND: &str = "SinkNotFound";
    /// The sink has neither a `ref` nor a `uri`.
    pub const SINK_EMPTY: &str = "SinkEmpty";
}

/// SinkBinding describes a Binding that is also a Source.
/// The `sink` is resolved to a URL and then projected into
/// the `subject` by augmenting the definition of the
/// referenced containers to have a `K_SINK` environment
/// variable holding the endpoint to which to send cloud events.
#[derive(CustomResource, Serialize, Deserialize, Debug, Clone, JsonSchema, PartialEq)]
#[kube(
    kind = "SinkBinding",
    group = "sources.knative.dev",
    status = "SinkBindingStatus",
    version = "v1",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct SinkBindingSpec {
    /// Sink and CloudEventOverrides
    #[serde(flatten)]
    pub source_spec: SourceSpec,
    /// Subject
    #[serde(flatten)]
    pub binding_spec: BindingSpec,
}

/// Communicates the observed state of the [`SinkBinding`] (from the controller).
///
/// `Ready` is rolled up from the single dependent `SinkProvided` condition, which tracks
/// whether the binding can currently be satisfied.
#[derive(Serialize, Deserialize, Debug, Clone, Default, JsonSchema, PartialEq)]
pub struct SinkBindingStatus {
    /// inherits [`SourceStatus`], which currently provides:
    /// * observed_generation
    /// * conditions
    /// * sink_uri
    #[serde(flatten)]
    pub source_status: SourceStatus<SourceCondition>,
}

impl ConditionAccessor<SourceCondition> for SinkBindingStatus {
    fn conditions(&mut self) -> &mut Conditions<SourceCondition> {
        self.source_status.conditions()
    }
}

impl SinkManager<SourceCondition> for SinkBindingStatus {
    fn source_status(&mut self) -> &mut SourceStatus<SourceCondition> {
        &mut self.source_status
    }
}

impl BindableStatus for SinkBindingStatus {
    fn initialize_conditions(&mut self) {
        self.manager().initialize_conditions();
    }

    fn mark_binding_available(&mut self) {
        self.manager().mark_true(SourceCondition::SinkProvided);
    }

    fn mark_binding_unavailable(&mut self, reason: &str, message: Option<String>) {
        self.manager().mark_false(SourceCondition::SinkProvided, reason, message);
    }

    fn set_observed_generation(&mut self, generation: i64) {
        self.source_status.status.set_observed_generation(generation);
    }
}

impl HasBindableStatus for SinkBinding {
    type Status = SinkBindingStatus;

    fn binding_status(&mut self) -> &mut SinkBindingStatus {
        self.status.get_or_insert_with(SinkBindingStatus::default)
    }
}

impl SinkBinding {
    /// The workload this binding projects its sink into.
    pub fn subject(&self) -> &Reference {
        &self.spec.binding_spec.subject
    }

    fn has_sink(&self) -> bool {
        self.spec.source_spec.sink.as_ref().map_or(false, |sink| !sink.is_empty())
    }

    /// Project `sink` into every container and init container of `ps` as [`K_SINK`].
    ///
    /// Any previous projection is removed first, so repeated calls leave a single entry per
    /// container. The sink is recorded on the status and the binding marked available. Without
    /// a sink the projection is only removed, the recorded sink is cleared and the binding is
    /// marked unavailable with [`reason::SINK_NOT_FOUND`].
    pub fn do_binding<P: ExposesPodTemplate>(&mut self, ps: &mut P, sink: Option<&Url>) {
        // First undo so that we can just unconditionally append below.
        self.undo_binding(ps);

        let uri = match sink {
            Some(uri) => uri,
            None => {
                error!(
                    binding = ?self.metadata.name,
                    namespace = ?self.metadata.namespace,
                    "no sink URI to project into subject"
                );
                let message = format!(
                    "no sink URI associated with SinkBinding {}",
                    self.metadata.name.as_deref().unwrap_or_default()
                );
                self.binding_status().mark_no_sink(reason::SINK_NOT_FOUND, Some(message));
                return;
            }
        };

        ps.append_env(&EnvVar {
            name: K_SINK.to_string(),
            value: Some(uri.to_string()),
            ..Default::default()
        });
        self.binding_status().mark_sink(uri.clone());
        debug!(binding = ?self.metadata.name, sink = %uri, "projected sink into subject");
    }

    /// Remove the [`K_SINK`] projection from every container and init container of `ps`.
    ///
    /// At most one entry is removed per container.
    pub fn undo_binding<P: ExposesPodTemplate>(&self, ps: &mut P) {
        ps.remove_env(K_SINK);
    }

    /// A full pass over the binding: initialize the status, record the observed generation,
    /// then project `sink` into `ps` and record whether that succeeded.
    pub fn reconcile_binding<P: ExposesPodTemplate>(&mut self, ps: &mut P, sink: Option<&Url>) {
        let generation = self.metadata.generation;
        let has_sink = self.has_sink();

        let status = self.binding_status();
        status.initialize_conditions();
        if let Some(generation) = generation {
            status.set_observed_generation(generation);
        }

        if !has_sink {
            self.undo_binding(ps);
            self.binding_status().mark_no_sink(
                reason::SINK_EMPTY,
                Some("sink has neither a ref nor a uri".to_string()),
            );
            return;
        }

        self.do_binding(ps, sink);
    }
}
