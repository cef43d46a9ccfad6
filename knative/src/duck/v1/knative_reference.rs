use k8s_openapi::api::core::v1::ObjectReference;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// KReference contains enough information to refer to another object.
/// It's a trimmed down version of corev1.ObjectReference.
#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct KReference {
    /// Kind of the referent.
    pub kind: String,
    /// Namespace of the referent, defaulted to the namespace of the object holding it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Name of the referent.
    pub name: String,
    /// API version of the referent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    /// Group of the API, without the version of the group. This can be used as an alternative
    /// to the APIVersion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

impl KReference {
    /// Fold `group` into `api_version`, handling the case that this was done already.
    pub fn with_group_folded(self) -> KReference {
        let api_version = match (self.api_version, self.group) {
            (Some(api_version), _) if api_version.contains('/') => Some(api_version),
            (Some(api_version), Some(group)) => Some(group + "/" + &api_version),
            (api_version, _) => api_version,
        };
        KReference {
            api_version,
            group: None,
            ..self
        }
    }
}

impl From<KReference> for ObjectReference {
    fn from(reference: KReference) -> ObjectReference {
        let reference = reference.with_group_folded();
        ObjectReference {
            name: Some(reference.name),
            namespace: reference.namespace,
            api_version: reference.api_version,
            kind: Some(reference.kind),
            ..Default::default()
        }
    }
}
