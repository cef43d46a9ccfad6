use serde::{Serialize, Deserialize};
use schemars::JsonSchema;
use std::fmt::Debug;

pub use enumset::{EnumSet, EnumSetType};

/// Defines how the variants of a [`ConditionType`]
/// depend on one another.
///
/// A set is built once from the [`ConditionType`] declaration of a status and
/// held by every [`ConditionManager`] for that status.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConditionSet<C: ConditionType> {
    happy: C,
    dependents: EnumSet<C>,
}

impl<C: ConditionType> ConditionSet<C> {
    /// Build the set declared by `C`. The happy condition is never one of its own dependents.
    pub fn new() -> Self {
        let happy = C::happy();
        let mut dependents = C::dependents();
        dependents.remove(happy);

        ConditionSet { happy, dependents }
    }

    pub fn happy(&self) -> C {
        self.happy
    }

    /// Dependents in declaration order.
    pub fn dependents(&self) -> impl Iterator<Item = C> {
        self.dependents.iter()
    }

    pub fn is_dependent(&self, condition_type: C) -> bool {
        self.dependents.contains(condition_type)
    }

    /// Whether the [`ConditionType`] determines happiness.
    pub fn is_terminal(&self, condition_type: C) -> bool {
        self.is_dependent(condition_type) || self.happy == condition_type
    }

    pub fn severity(&self, condition_type: C) -> ConditionSeverity {
        if self.is_terminal(condition_type) {
            ConditionSeverity::Error
        } else {
            ConditionSeverity::Info
        }
    }
}

impl<C: ConditionType> Default for ConditionSet<C> {
    fn default() -> Self {
        ConditionSet::new()
    }
}

/// Enums that implement [`ConditionType`] can be used to differentiate [`Condition`]
/// and describe the state of the resource.
pub trait ConditionType: EnumSetType + Default + Debug {
    /// The top-level variant that determines overall readiness of the resource.
    fn happy() -> Self;
    /// Variants that must be true to consider the happy condition true.
    fn dependents() -> EnumSet<Self>;
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, JsonSchema, PartialEq)]
#[non_exhaustive]
/// The importance of a conditions status.
pub enum ConditionSeverity {
    Error,
    Warning,
    Info,
}

impl ConditionSeverity {
    pub fn is_err(&self) -> bool {
        *self == ConditionSeverity::Error
    }
}

impl Default for ConditionSeverity {
    fn default() -> Self {
        ConditionSeverity::Error
    }
}

/// A [`Vec`] of [`Condition`] that maintains transition times.
#[derive(Serialize, Deserialize, Clone, Debug, JsonSchema, PartialEq)]
pub struct Conditions<C>(Vec<Condition<C>>)
    where C: ConditionType;

impl<C> Default for Conditions<C>
where C: ConditionType {
    fn default() -> Self {
        let mut conditions = Conditions(Vec::new());
        conditions.initialize(&ConditionSet::new());
        conditions
    }
}

impl<C: ConditionType> From<Vec<Condition<C>>> for Conditions<C> {
    fn from(conditions: Vec<Condition<C>>) -> Self {
        Conditions(conditions)
    }
}

impl<C: ConditionType> Conditions<C> {
    pub fn get(&self, type_: C) -> Option<&Condition<C>> {
        self.0.iter().find(|c| c.type_ == type_)
    }

    fn get_mut(&mut self, type_: C) -> Option<&mut Condition<C>> {
        self.0.iter_mut().find(|c| c.type_ == type_)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Condition<C>> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Add every terminal condition of `set` that is not present yet.
    /// Conditions that already hold a value are left alone.
    ///
    /// A true happy condition implies true dependents, so missing dependents start out true in
    /// that case and unknown otherwise.
    fn initialize(&mut self, set: &ConditionSet<C>) {
        if self.get(set.happy()).is_none() {
            self.0.push(Condition {
                severity: set.severity(set.happy()),
                ..Condition::new(set.happy())
            });
        }

        let status = match self.get(set.happy()) {
            Some(happy) if happy.is_true() => ConditionStatus::True,
            _ => ConditionStatus::Unknown,
        };
        for type_ in set.dependents() {
            if self.get(type_).is_none() {
                self.0.push(Condition {
                    status,
                    severity: set.severity(type_),
                    ..Condition::new(type_)
                });
            }
        }
    }

    fn set_cond(&mut self, condition: Condition<C>) {
        match self.get_mut(condition.type_) {
            Some(cond) => {
                // Only the time would change, keep the original transition.
                let test_cond = Condition {
                    last_transition_time: condition.last_transition_time,
                    ..cond.clone()
                };
                if test_cond != condition {
                    *cond = Condition {
                        last_transition_time: Some(chrono::Utc::now()),
                        ..condition
                    }
                }
            }
            None => {
                self.0.push(Condition {
                    last_transition_time: Some(chrono::Utc::now()),
                    ..condition
                });
            }
        }
    }
}

/// A custom resource status condition.
#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Condition<C: ConditionType> {
    #[serde(rename = "type")]
    pub type_: C,
    pub status: ConditionStatus,
    /// ConditionSeverityError specifies that a failure of a condition type
    /// should be viewed as an error.  As "Error" is the default for conditions
    /// we omit it when serializing to avoid confusion in the case where the
    /// condition is in state "True" (aka nothing is wrong).
    #[serde(default)]
    #[serde(skip_serializing_if = "ConditionSeverity::is_err")]
    pub severity: ConditionSeverity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<C: ConditionType> Default for Condition<C> {
    fn default() -> Condition<C> {
        Condition {
            type_: C::default(),
            status: ConditionStatus::default(),
            severity: ConditionSeverity::default(),
            last_transition_time: Some(chrono::Utc::now()),
            reason: None,
            message: None
        }
    }
}

/// The state of a [`Condition`].
#[derive(Deserialize, Serialize, Clone, Copy, Debug, JsonSchema, PartialEq, Eq)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

impl Default for ConditionStatus {
    fn default() -> Self {
        ConditionStatus::Unknown
    }
}

impl<C: ConditionType> Condition<C> {
    pub fn new(type_: C) -> Self {
        Condition {
            type_,
            ..Default::default()
        }
    }

    pub fn is_true(&self) -> bool {
        self.status == ConditionStatus::True
    }

    pub fn is_false(&self) -> bool {
        self.status == ConditionStatus::False
    }

    pub fn is_unknown(&self) -> bool {
        self.status == ConditionStatus::Unknown
    }
}

/// Provides [`ConditionManager`] access to the [`Conditions`],
/// and exposes control of the top-level [`Condition`].
pub trait ConditionAccessor<C: ConditionType> {
    /// Return the conditions of your CR status type.
    fn conditions(&mut self) -> &mut Conditions<C>;

    /// Returns a [`ConditionManager`] for more fine-grained control of [`Conditions`].
    fn manager(&mut self) -> ConditionManager<C> {
        ConditionManager::new(self.conditions())
    }

    /// Returns true if the resource is ready overall.
    fn is_ready(&mut self) -> bool {
        self.manager().is_happy()
    }

    /// The status of the top level condition, Unknown if it was never set.
    fn aggregate(&mut self) -> ConditionStatus {
        self.manager().aggregate()
    }

    fn top_level_condition(&mut self) -> Option<&Condition<C>> {
        self.conditions().get(C::happy())
    }

    /// Set the status of the top level condition type to false
    fn mark_false(&mut self, reason: &str, message: Option<String>) {
        self.manager().mark_false(C::happy(), reason, message);
    }

    /// Set the status of the top level condition to unknown. Typically used when beginning the
    /// reconciliation of a new generation.
    fn mark_unknown(&mut self) {
        self.manager().mark_unknown(
            C::happy(),
            "NewObservedGenFailure",
            Some("unsuccessfully observed a new generation".into())
        );
    }

    fn mark_unknown_with_message(&mut self, reason: &str, message: Option<String>) {
        self.manager().mark_unknown(C::happy(), reason, message);
    }
}

/// Mutates [`Conditions`] in accordance with the condition dependency chain defined by a
/// [`ConditionType`]
pub struct ConditionManager<'a, C>
where C: ConditionType {
    set: ConditionSet<C>,
    conditions: &'a mut Conditions<C>,
}

impl<'a, C> ConditionManager<'a, C>
where C: ConditionType {
    pub fn new(conditions: &'a mut Conditions<C>) -> Self {
        Self::with_set(ConditionSet::new(), conditions)
    }

    pub fn with_set(set: ConditionSet<C>, conditions: &'a mut Conditions<C>) -> Self {
        ConditionManager { set, conditions }
    }

    pub fn set(&self) -> &ConditionSet<C> {
        &self.set
    }

    /// Add the happy condition and every dependent as Unknown, skipping any that are already set.
    pub fn initialize_conditions(&mut self) {
        self.conditions.initialize(&self.set);
    }

    pub fn get_condition(&self, condition_type: C) -> Option<&Condition<C>> {
        self.conditions.get(condition_type)
    }

    /// Returns the happy [`Condition`], if the [`Conditions`] have been initialized.
    pub fn get_top_level_condition(&self) -> Option<&Condition<C>> {
        self.get_condition(self.set.happy)
    }

    pub fn is_happy(&self) -> bool {
        self.get_top_level_condition().map_or(false, Condition::is_true)
    }

    pub fn aggregate(&self) -> ConditionStatus {
        self.get_top_level_condition()
            .map(|c| c.status)
            .unwrap_or_default()
    }

    /// The dependent that keeps the happy condition from being true.
    ///
    /// The first False dependent in declaration order wins, then the first
    /// dependent that is Unknown or missing.
    fn find_unhappy_dependent(&self) -> Option<Condition<C>> {
        let mut unknown = None;
        for type_ in self.set.dependents() {
            match self.conditions.get(type_) {
                Some(cond) if cond.is_true() => {}
                Some(cond) if cond.is_false() => return Some(cond.clone()),
                Some(cond) => {
                    unknown.get_or_insert_with(|| cond.clone());
                }
                None => {
                    unknown.get_or_insert_with(|| Condition::new(type_));
                }
            }
        }
        unknown
    }

    /// Roll the dependents up into the happy condition.
    fn recompute_happiness(&mut self) {
        let type_ = self.set.happy;
        let severity = self.set.severity(type_);

        let cond = match self.find_unhappy_dependent() {
            Some(dependent) => Condition {
                type_,
                status: dependent.status,
                reason: dependent.reason,
                message: dependent.message,
                severity,
                ..Default::default()
            },
            None => Condition {
                type_,
                status: ConditionStatus::True,
                severity,
                ..Default::default()
            },
        };

        self.conditions.set_cond(cond);
    }

    fn set_and_recompute(&mut self, condition: Condition<C>) {
        let type_ = condition.type_;
        self.conditions.set_cond(Condition {
            severity: self.set.severity(type_),
            ..condition
        });
        if self.set.is_dependent(type_) {
            self.recompute_happiness();
        }
    }

    pub fn mark_true(&mut self, condition_type: C) {
        self.set_and_recompute(Condition {
            type_: condition_type,
            status: ConditionStatus::True,
            ..Default::default()
        });
    }

    pub fn mark_true_with_reason(&mut self, condition_type: C, reason: &str, message: Option<String>) {
        self.set_and_recompute(Condition {
            type_: condition_type,
            status: ConditionStatus::True,
            reason: Some(reason.to_string()),
            message,
            ..Default::default()
        });
    }

    /// Set the status of the condition type to false, as well as the happy condition if this
    /// condition is a dependent.
    pub fn mark_false(&mut self, condition_type: C, reason: &str, message: Option<String>) {
        self.set_and_recompute(Condition {
            type_: condition_type,
            status: ConditionStatus::False,
            reason: Some(reason.to_string()),
            message,
            ..Default::default()
        });
    }

    /// Set the status to unknown. When this condition is a dependent the happy condition becomes
    /// unknown too, unless another dependent is false.
    pub fn mark_unknown(&mut self, condition_type: C, reason: &str, message: Option<String>) {
        self.set_and_recompute(Condition {
            type_: condition_type,
            status: ConditionStatus::Unknown,
            reason: Some(reason.to_string()),
            message,
            ..Default::default()
        });
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::TimeZone;

    #[derive(EnumSetType, Deserialize, Serialize, Debug)]
    enum TestCondition {
        Ready,
        SinkProvided,
        Deployed,
        Informational,
    }

    impl ConditionType for TestCondition {
        fn happy() -> Self {
            TestCondition::Ready
        }

        fn dependents() -> EnumSet<Self> {
            TestCondition::SinkProvided | TestCondition::Deployed
        }
    }

    impl Default for TestCondition {
        fn default() -> Self {
            TestCondition::Ready
        }
    }

    struct TestStatus {
        conditions: Conditions<TestCondition>,
    }

    impl ConditionAccessor<TestCondition> for TestStatus {
        fn conditions(&mut self) -> &mut Conditions<TestCondition> {
            &mut self.conditions
        }
    }

    fn status_of(s: &TestStatus, type_: TestCondition) -> Option<ConditionStatus> {
        s.conditions.get(type_).map(|c| c.status)
    }

    #[test]
    fn default_conditions_are_unknown() {
        let conditions = Conditions::<TestCondition>::default();
        let types = conditions.iter().map(|c| c.type_).collect::<Vec<_>>();
        assert_eq!(types, vec![TestCondition::Ready, TestCondition::SinkProvided, TestCondition::Deployed]);
        assert!(conditions.iter().all(|c| c.is_unknown() && c.reason.is_none() && c.message.is_none()));
    }

    #[test]
    fn initialize_is_additive() {
        let mut conditions = Conditions::from(vec![]);
        let mut manager = ConditionManager::new(&mut conditions);
        manager.initialize_conditions();
        manager.mark_true(TestCondition::SinkProvided);
        manager.initialize_conditions();

        assert_eq!(manager.get_condition(TestCondition::SinkProvided).map(|c| c.status), Some(ConditionStatus::True));
        assert_eq!(manager.aggregate(), ConditionStatus::Unknown);
        assert_eq!(conditions.len(), 3);
    }

    #[test]
    fn initialize_fills_missing_conditions_only() {
        let mut conditions = Conditions::from(vec![Condition {
            type_: TestCondition::Deployed,
            status: ConditionStatus::False,
            reason: Some("Crashing".into()),
            ..Default::default()
        }]);
        ConditionManager::new(&mut conditions).initialize_conditions();

        let deployed = conditions.get(TestCondition::Deployed).unwrap();
        assert!(deployed.is_false());
        assert_eq!(deployed.reason.as_deref(), Some("Crashing"));
        assert!(conditions.get(TestCondition::Ready).unwrap().is_unknown());
        assert!(conditions.get(TestCondition::SinkProvided).unwrap().is_unknown());
        assert!(conditions.get(TestCondition::Informational).is_none());
    }

    #[test]
    fn initialize_under_true_happy_condition_keeps_it_consistent() {
        let mut status: TestStatus = TestStatus {
            conditions: serde_json::from_value(serde_json::json!([
                { "type": "Ready", "status": "True" }
            ])).unwrap(),
        };
        status.manager().initialize_conditions();

        assert_eq!(status.aggregate(), ConditionStatus::True);
        assert_eq!(status_of(&status, TestCondition::SinkProvided), Some(ConditionStatus::True));
        assert_eq!(status_of(&status, TestCondition::Deployed), Some(ConditionStatus::True));
        assert_eq!(status.conditions.len(), 3);

        status.manager().mark_false(TestCondition::Deployed, "Crashing", None);
        assert_eq!(status.aggregate(), ConditionStatus::False);
    }

    #[test]
    fn aggregate_requires_all_dependents() {
        let mut status = TestStatus { conditions: Conditions::default() };
        assert_eq!(status.aggregate(), ConditionStatus::Unknown);

        status.manager().mark_true(TestCondition::SinkProvided);
        assert_eq!(status.aggregate(), ConditionStatus::Unknown);

        status.manager().mark_true(TestCondition::Deployed);
        assert_eq!(status.aggregate(), ConditionStatus::True);
        assert!(status.is_ready());

        status.manager().mark_false(TestCondition::Deployed, "Crashing", Some("back-off".into()));
        assert_eq!(status.aggregate(), ConditionStatus::False);
        let ready = status.top_level_condition().unwrap();
        assert_eq!(ready.reason.as_deref(), Some("Crashing"));
        assert_eq!(ready.message.as_deref(), Some("back-off"));

        status.manager().mark_true(TestCondition::Deployed);
        assert!(status.is_ready());
    }

    #[test]
    fn first_false_dependent_wins() {
        let dt = chrono::Utc.ymd(2022, 1, 1);
        let mut status = TestStatus {
            conditions: Conditions::from(vec![
                Condition {
                    type_: TestCondition::Ready,
                    status: ConditionStatus::Unknown,
                    last_transition_time: Some(dt.and_hms(0, 0, 0)),
                    ..Default::default()
                },
                Condition {
                    type_: TestCondition::Deployed,
                    status: ConditionStatus::False,
                    reason: Some("Crashing".into()),
                    last_transition_time: Some(dt.and_hms(3, 0, 0)),
                    ..Default::default()
                },
                Condition {
                    type_: TestCondition::SinkProvided,
                    status: ConditionStatus::False,
                    reason: Some("SinkNotFound".into()),
                    last_transition_time: Some(dt.and_hms(1, 0, 0)),
                    ..Default::default()
                },
            ])
        };

        let unhappy = status.manager().find_unhappy_dependent().unwrap();
        // Declaration order, not list order or recency
        assert_eq!(unhappy.type_, TestCondition::SinkProvided);
        assert_eq!(unhappy.reason.as_deref(), Some("SinkNotFound"));

        // Maintains order
        let types = status.conditions.iter().map(|c| c.type_).collect::<Vec<_>>();
        assert_eq!(types, vec![TestCondition::Ready, TestCondition::Deployed, TestCondition::SinkProvided]);

        status.manager().mark_true(TestCondition::SinkProvided);
        let ready = status.top_level_condition().unwrap();
        assert!(ready.is_false());
        assert_eq!(ready.reason.as_deref(), Some("Crashing"));
    }

    #[test]
    fn false_dependent_outranks_unknown() {
        let mut status = TestStatus { conditions: Conditions::default() };
        status.manager().mark_false(TestCondition::Deployed, "Crashing", None);
        status.manager().mark_unknown(TestCondition::SinkProvided, "Resolving", None);

        assert_eq!(status.aggregate(), ConditionStatus::False);
        assert_eq!(status.top_level_condition().unwrap().reason.as_deref(), Some("Crashing"));
    }

    #[test]
    fn non_terminal_conditions_do_not_affect_happiness() {
        let mut status = TestStatus { conditions: Conditions::default() };
        status.manager().mark_true(TestCondition::SinkProvided);
        status.manager().mark_true(TestCondition::Deployed);
        status.manager().mark_false(TestCondition::Informational, "Noisy", None);

        assert!(status.is_ready());
        assert_eq!(
            status.conditions.get(TestCondition::Informational).map(|c| c.severity),
            Some(ConditionSeverity::Info)
        );
        assert_eq!(status_of(&status, TestCondition::Informational), Some(ConditionStatus::False));
    }

    #[test]
    fn marking_the_top_level_condition_is_direct() {
        let mut status = TestStatus { conditions: Conditions::default() };
        status.manager().mark_true(TestCondition::SinkProvided);
        status.manager().mark_true(TestCondition::Deployed);
        status.mark_false("Stopped", None);
        assert_eq!(status.aggregate(), ConditionStatus::False);
        assert_eq!(status_of(&status, TestCondition::Deployed), Some(ConditionStatus::True));

        status.mark_unknown();
        let ready = status.top_level_condition().unwrap();
        assert!(ready.is_unknown());
        assert_eq!(ready.reason.as_deref(), Some("NewObservedGenFailure"));
    }

    #[test]
    fn unchanged_condition_keeps_transition_time() {
        let dt = chrono::Utc.ymd(2022, 1, 1).and_hms(0, 0, 0);
        let mut status = TestStatus {
            conditions: Conditions::from(vec![Condition {
                type_: TestCondition::SinkProvided,
                status: ConditionStatus::True,
                severity: ConditionSeverity::Error,
                last_transition_time: Some(dt),
                reason: None,
                message: None,
            }])
        };

        status.manager().mark_true(TestCondition::SinkProvided);
        assert_eq!(status.conditions.get(TestCondition::SinkProvided).unwrap().last_transition_time, Some(dt));

        status.manager().mark_false(TestCondition::SinkProvided, "SinkNotFound", None);
        assert_ne!(status.conditions.get(TestCondition::SinkProvided).unwrap().last_transition_time, Some(dt));
    }

    #[test]
    fn top_level_condition_may_be_missing() {
        let mut status = TestStatus { conditions: Conditions::from(vec![]) };
        assert!(status.top_level_condition().is_none());
        assert_eq!(status.aggregate(), ConditionStatus::Unknown);
        assert!(!status.is_ready());
    }

    #[test]
    fn condition_set_excludes_happy_from_dependents() {
        let set = ConditionSet::<TestCondition>::new();
        assert_eq!(set.happy(), TestCondition::Ready);
        assert_eq!(set.dependents().collect::<Vec<_>>(), vec![TestCondition::SinkProvided, TestCondition::Deployed]);
        assert_eq!(set.severity(TestCondition::Ready), ConditionSeverity::Error);
        assert_eq!(set.severity(TestCondition::Informational), ConditionSeverity::Info);
    }

    #[test]
    fn condition_type_deserializes() {
        let condition_type: TestCondition = serde_json::from_value(serde_json::json!(
            "SinkProvided"
        )).unwrap();
        assert_eq!(condition_type, TestCondition::SinkProvided);
        let condition_type: TestCondition = serde_json::from_value(serde_json::json!(
            "Ready"
        )).unwrap();
        assert_eq!(condition_type, TestCondition::Ready);
        let condition_type: Result<TestCondition, _> = serde_json::from_value(serde_json::json!(
            "Succeeded"
        ));
        assert!(condition_type.is_err());
    }

    #[test]
    fn condition_serializes_in_camel_case() {
        let condition = Condition {
            type_: TestCondition::Ready,
            status: ConditionStatus::False,
            severity: ConditionSeverity::Error,
            last_transition_time: None,
            reason: Some("SinkNotFound".into()),
            message: Some("sink missing".into()),
        };
        assert_eq!(serde_json::to_value(&condition).unwrap(), serde_json::json!({
            "type": "Ready",
            "status": "False",
            "reason": "SinkNotFound",
            "message": "sink missing"
        }));
    }
}
