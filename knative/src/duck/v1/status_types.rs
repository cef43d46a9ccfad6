use knative_conditions::{ConditionAccessor, ConditionType, Conditions};
use schemars::JsonSchema;
use serde::{Serialize, Deserialize};
use std::collections::BTreeMap;

/// The base status every Knative resource embeds, conditioned on the [`ConditionType`] `C`.
#[derive(Serialize, Deserialize, Clone, Debug, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Status<C: ConditionType> {
    /// ObservedGeneration is the 'Generation' of the Service that
    /// was last processed by the controller.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
    /// Conditions the latest available observations of a resource's current state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<Conditions<C>>,
    /// Annotations is additional Status fields for the Resource to save some
    /// additional State as well as convey more information to the user. This is
    /// roughly akin to Annotations on any k8s resource, just the reconciler conveying
    /// richer information outwards.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<BTreeMap<String, String>>,
}

impl<C: ConditionType> Default for Status<C> {
    fn default() -> Status<C> {
        Status {
            observed_generation: Some(0i64),
            conditions: Some(Conditions::default()),
            annotations: None
        }
    }
}

impl<C: ConditionType> ConditionAccessor<C> for Status<C> {
    /// Conditions missing from a deserialized status start out as the initialized set.
    fn conditions(&mut self) -> &mut Conditions<C> {
        self.conditions.get_or_insert_with(Conditions::default)
    }
}

impl<C: ConditionType> Status<C> {
    pub fn set_observed_generation(&mut self, generation: i64) {
        self.observed_generation = Some(generation);
    }

    pub fn get_annotation(&self, key: &str) -> Option<&str> {
        self.annotations.as_ref()?.get(key).map(String::as_str)
    }

    pub fn set_annotation(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.annotations
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
    }
}
