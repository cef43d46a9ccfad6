use crate::error::Error;
use k8s_openapi::{
    api::{
        apps::v1::{DaemonSet, Deployment, StatefulSet},
        batch::v1::{CronJob, Job},
        core::v1::{Container, EnvVar, PodSpec, PodTemplateSpec},
    },
    apimachinery::pkg::apis::meta::v1::ObjectMeta,
};
use kube::api::DynamicObject;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Workloads that carry a pod template a Binding can be projected into.
pub trait ExposesPodTemplate {
    fn pod_template_mut(&mut self) -> Option<&mut PodTemplateSpec>;

    fn pod_spec_mut(&mut self) -> Option<&mut PodSpec> {
        self.pod_template_mut().and_then(|template| template.spec.as_mut())
    }

    /// Visit init containers, then regular containers, in order.
    fn for_each_container<F>(&mut self, mut f: F)
    where
        F: FnMut(&mut Container),
        Self: Sized,
    {
        if let Some(spec) = self.pod_spec_mut() {
            spec.init_containers
                .iter_mut()
                .flatten()
                .chain(spec.containers.iter_mut())
                .for_each(|container| f(container));
        }
    }

    /// Remove the first variable called `name` from each container.
    fn remove_env(&mut self, name: &str)
    where
        Self: Sized,
    {
        self.for_each_container(|container| {
            let filtered = container.env
                .as_deref()
                .and_then(|env| without_first_env(env, name));
            if let Some(env) = filtered {
                container.env = if env.is_empty() { None } else { Some(env) };
            }
        });
    }

    /// Append `var` to the end of each container's environment.
    fn append_env(&mut self, var: &EnvVar)
    where
        Self: Sized,
    {
        self.for_each_container(|container| {
            container.env.get_or_insert_with(Vec::new).push(var.clone());
        });
    }
}

/// Returns `env` without its first variable called `name`, or `None` if there is no such
/// variable. Later duplicates are kept.
pub fn without_first_env(env: &[EnvVar], name: &str) -> Option<Vec<EnvVar>> {
    let index = env.iter().position(|var| var.name == name)?;
    Some(
        env[..index].iter()
            .chain(&env[index + 1..])
            .cloned()
            .collect()
    )
}

impl ExposesPodTemplate for PodTemplateSpec {
    fn pod_template_mut(&mut self) -> Option<&mut PodTemplateSpec> {
        Some(self)
    }
}

impl ExposesPodTemplate for Deployment {
    fn pod_template_mut(&mut self) -> Option<&mut PodTemplateSpec> {
        self.spec.as_mut().map(|spec| &mut spec.template)
    }
}

impl ExposesPodTemplate for StatefulSet {
    fn pod_template_mut(&mut self) -> Option<&mut PodTemplateSpec> {
        self.spec.as_mut().map(|spec| &mut spec.template)
    }
}

impl ExposesPodTemplate for DaemonSet {
    fn pod_template_mut(&mut self) -> Option<&mut PodTemplateSpec> {
        self.spec.as_mut().map(|spec| &mut spec.template)
    }
}

impl ExposesPodTemplate for Job {
    fn pod_template_mut(&mut self) -> Option<&mut PodTemplateSpec> {
        self.spec.as_mut().map(|spec| &mut spec.template)
    }
}

impl ExposesPodTemplate for CronJob {
    fn pod_template_mut(&mut self) -> Option<&mut PodTemplateSpec> {
        self.spec
            .as_mut()
            .and_then(|spec| spec.job_template.spec.as_mut())
            .map(|job| &mut job.template)
    }
}

/// WithPod is the shell that demonstrates how PodSpecable types wrap a PodSpec.
///
/// Any workload shaped `{ metadata, spec: { template } }` duck types to it.
#[derive(Serialize, Deserialize, Clone, Debug, Default, JsonSchema, PartialEq)]
pub struct WithPod {
    #[serde(default)]
    pub metadata: ObjectMeta,
    pub spec: WithPodSpec,
}

/// The shell around the pod template of a [`WithPod`].
#[derive(Serialize, Deserialize, Clone, Debug, Default, JsonSchema, PartialEq)]
pub struct WithPodSpec {
    pub template: PodTemplateSpec,
}

impl ExposesPodTemplate for WithPod {
    fn pod_template_mut(&mut self) -> Option<&mut PodTemplateSpec> {
        Some(&mut self.spec.template)
    }
}

fn display_name(obj: &DynamicObject) -> String {
    let kind = obj.types.as_ref().map(|t| t.kind.as_str()).unwrap_or("unknown");
    let name = obj.metadata.name.as_deref().unwrap_or("");
    format!("{kind} {name}")
}

impl TryFrom<&DynamicObject> for WithPod {
    type Error = Error;

    fn try_from(obj: &DynamicObject) -> Result<Self, Self::Error> {
        let spec = obj.data
            .get("spec")
            .filter(|spec| spec.get("template").is_some())
            .ok_or_else(|| Error::NotPodSpecable(display_name(obj)))?;

        Ok(WithPod {
            metadata: obj.metadata.clone(),
            spec: serde_json::from_value(spec.clone())?,
        })
    }
}

impl WithPod {
    /// Write the pod template back onto `obj`. The rest of its spec is left untouched.
    pub fn write_template(&self, obj: &mut DynamicObject) -> Result<(), Error> {
        let template = serde_json::to_value(&self.spec.template)?;
        let name = display_name(obj);
        let spec = obj.data
            .get_mut("spec")
            .and_then(Value::as_object_mut)
            .ok_or(Error::NotPodSpecable(name))?;
        spec.insert("template".to_string(), template);
        Ok(())
    }
}
