use super::{
    knative_reference::KReference,
    status_types::Status,
};
use crate::derive::ConditionType;
use knative_conditions::{ConditionAccessor, Conditions};
use enumset::EnumSetType;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Serialize, Deserialize, Default, Clone, Debug, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SourceSpec {
    /// Sink is a reference to an object that will resolve to a uri to use as the sink.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sink: Option<Destination>,
    /// CloudEventOverrides defines overrides to control the output format and
    /// modifications of the event sent to the sink.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ce_overrides: Option<CloudEventOverrides>,
}

/// Destination represents a target of an invocation over HTTP.
///
/// Resolving a destination into a concrete URI is left to the reconciler.
#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema, PartialEq)]
pub struct Destination {
    /// Ref points to an Addressable.
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    ref_: Option<KReference>,
    /// URI can be an absolute URL(non-empty scheme and non-empty host) pointing to the target or a relative URI.
    /// Relative URIs will be resolved using the base URI retrieved from Ref.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<url::Url>,
}

impl From<KReference> for Destination {
    fn from(reference: KReference) -> Self {
        Destination {
            ref_: Some(reference.with_group_folded()),
            uri: None,
        }
    }
}

impl From<url::Url> for Destination {
    fn from(uri: url::Url) -> Self {
        Destination {
            ref_: None,
            uri: Some(uri),
        }
    }
}

impl Destination {
    pub fn reference(&self) -> Option<&KReference> {
        self.ref_.as_ref()
    }

    /// Neither a Ref nor a URI was given.
    pub fn is_empty(&self) -> bool {
        self.ref_.is_none() && self.uri.is_none()
    }
}

/// CloudEventOverrides defines arguments for a Source that control the output
/// format of the CloudEvents produced by the Source.
#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CloudEventOverrides {
    /// Extensions specify what attribute are added or overridden on the
    /// outbound event. Each `Extensions` key-value pair are set on the event as
    /// an attribute extension independently.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<BTreeMap<String, String>>,
}

/// CloudEventAttributes specifies the attributes that a Source
/// uses as part of its CloudEvents.
#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CloudEventAttributes {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// A baseline [`ConditionType`] for [`SourceStatus`].
///
/// Custom conditions should implement [`SourceConditionType`] in order to be used by
/// [`SourceStatus`].
#[derive(ConditionType, EnumSetType, Deserialize, Serialize, Debug, JsonSchema)]
pub enum SourceCondition {
    Ready,
    /// A [`sink_uri`] has been set on the resource.
    ///
    /// [`sink_uri`]:./struct.SourceStatus.html#structfield.sink_uri
    #[dependent]
    SinkProvided
}

/// SourceStatus shows how we expect folks to embed Addressable in
/// their Status field.
#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SourceStatus<S: SourceConditionType> {
    /// inherits Status, which currently provides:
    /// * ObservedGeneration - the 'Generation' of the Service that was last
    ///   processed by the controller.
    /// * Conditions - the latest available observations of a resource's current
    ///   state.
    #[serde(flatten)]
    pub status: Status<S>,
    /// SinkURI is the current active sink URI that has been configured for the
    /// Source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sink_uri: Option<url::Url>,
    /// CloudEventAttributes are the specific attributes that the Source uses
    /// as part of its CloudEvents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_event_attributes: Option<Vec<CloudEventAttributes>>,
}

impl<S: SourceConditionType> ConditionAccessor<S> for SourceStatus<S> {
    fn conditions(&mut self) -> &mut Conditions<S> {
        self.status.conditions()
    }
}

/// Provides management `sink_uri` on [`SourceStatus`].
///
/// This traits helps to discourage use of the `*sinkprovided()` methods from
/// [`SourceConditionManager`], which must be disambiguated when using a custom [`ConditionType`]
/// that also has `*sinkprovided()` methods.
pub trait SinkManager<S: SourceConditionType>: SourceConditionManager<S> {
    /// Return the [`SourceStatus`] of your CRD Status type.
    fn source_status(&mut self) -> &mut SourceStatus<S>;

    /// Set the condition that the source has a sink configured
    fn mark_sink(&mut self, uri: url::Url) {
        self.source_status().sink_uri = Some(uri);
        self.manager().mark_true(S::sinkprovided());
    }

    /// Set the condition that the source has no sink configured
    fn mark_no_sink(&mut self, reason: &str, message: Option<String>) {
        self.source_status().sink_uri = None;
        self.manager().mark_false(S::sinkprovided(), reason, message);
    }
}

impl<S: SourceConditionType> SinkManager<S> for SourceStatus<S> {
    fn source_status(&mut self) -> &mut SourceStatus<S> {
        self
    }
}
