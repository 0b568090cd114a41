//! Plan executor for applying deployment plans.
//!
//! Steps run strictly in plan order, one provider call at a time. Every
//! completed step is folded into a working checkpoint, which is returned even
//! when a step fails so the caller can persist what actually happened.

use std::collections::HashMap;
use tracing::{debug, error, info, warn};

use crate::error::{ApplyError, ProviderError, StratumError};
use crate::provider::{ProviderRegistry, ProviderResult};
use crate::resource::{ResourceId, ResourceState, Snapshot, Urn};

use super::diff::ObjectDiff;
use super::plan::{Plan, Step, StepOp};
use super::progress::{ApplyProgress, StepObserver};

/// Executor for deployment plans.
#[derive(Debug)]
pub struct PlanExecutor<'a> {
    /// Providers serving the plan's resource types.
    providers: &'a ProviderRegistry,
    /// Whether to keep applying steps after a failure.
    continue_on_error: bool,
}

/// Result of applying a plan.
#[derive(Debug)]
pub struct ApplyOutcome {
    /// Snapshot reflecting exactly the steps that completed.
    pub checkpoint: Snapshot,
    /// Counters and per-step states.
    pub progress: ApplyProgress,
    /// The first step failure, if any.
    pub error: Option<StratumError>,
}

/// Resource states as they evolve while steps complete.
struct Checkpoint {
    environment: String,
    base_order: Vec<Urn>,
    desired_order: Vec<Urn>,
    live: HashMap<Urn, ResourceState>,
}

impl<'a> PlanExecutor<'a> {
    /// Creates a new plan executor.
    #[must_use]
    pub const fn new(providers: &'a ProviderRegistry) -> Self {
        Self {
            providers,
            continue_on_error: false,
        }
    }

    /// Sets whether to continue on errors.
    #[must_use]
    pub const fn with_continue_on_error(mut self, continue_on_error: bool) -> Self {
        self.continue_on_error = continue_on_error;
        self
    }

    /// Applies a plan.
    ///
    /// Never fails as a whole: a step failure is reported in
    /// [`ApplyOutcome::error`] next to the checkpoint accumulated so far.
    pub async fn execute<O: StepObserver>(
        &self,
        plan: &Plan,
        mut progress: ApplyProgress,
        observer: &mut O,
    ) -> ApplyOutcome {
        info!(
            "Applying {} step(s) to environment '{}'",
            plan.len(),
            plan.environment()
        );

        let mut checkpoint = Checkpoint::new(plan);
        let mut first_error = None;

        for (index, step) in plan.steps().iter().enumerate() {
            progress.begin(index);
            observer.before(index, step);
            let result = self.apply_step(step, &mut checkpoint).await;
            observer.after(index, step, result.as_ref().map(|_| ()));

            match result {
                Ok(()) => progress.succeed(index, step.op),
                Err(e) => {
                    error!("Step #{} [{}] for {} failed: {e}", index + 1, step.op, step.urn);
                    progress.fail(index, e.status);
                    if first_error.is_none() {
                        first_error = Some(StratumError::from(ApplyError::StepFailed {
                            step: index + 1,
                            op: step.op,
                            urn: step.urn.clone(),
                            status: e.status,
                            message: e.message,
                        }));
                    }
                    if !self.continue_on_error {
                        warn!("Halting after failed step #{}", index + 1);
                        break;
                    }
                }
            }
        }

        ApplyOutcome {
            checkpoint: checkpoint.into_snapshot(),
            progress,
            error: first_error,
        }
    }

    /// Performs the provider call for one step and folds its result.
    async fn apply_step(&self, step: &Step, checkpoint: &mut Checkpoint) -> ProviderResult<()> {
        let provider = self
            .providers
            .provider_for(&step.type_token)
            .map_err(|e| ProviderError::recoverable(e.to_string()))?;

        match step.op {
            StepOp::Same => Ok(()),
            StepOp::Create | StepOp::ReplaceCreate => {
                let new = Self::desired(step)?;
                let id = provider.create(&step.type_token, &new.properties).await?;
                // The resource exists from here on, even if the read-back fails.
                checkpoint.put(new.clone().with_id(id.clone()));
                let outputs = provider
                    .get(&step.type_token, &id)
                    .await
                    .map_err(|e| Self::read_back_failed(step, &id, &e))?;
                checkpoint.put(ResourceState {
                    properties: outputs,
                    ..new.clone().with_id(id)
                });
                Ok(())
            }
            StepOp::Update => {
                let new = Self::desired(step)?;
                let old = step
                    .old
                    .as_ref()
                    .ok_or_else(|| ProviderError::recoverable("update step without prior state"))?;
                let id = Self::physical_id(step)?;
                let empty = ObjectDiff::default();
                let diff = step.diff.as_ref().unwrap_or(&empty);
                provider
                    .update(&step.type_token, id, &old.properties, &new.properties, diff)
                    .await?;
                checkpoint.put(new.clone().with_id(id.clone()));
                let outputs = provider
                    .get(&step.type_token, id)
                    .await
                    .map_err(|e| Self::read_back_failed(step, id, &e))?;
                checkpoint.put(ResourceState {
                    properties: outputs,
                    ..new.clone().with_id(id.clone())
                });
                Ok(())
            }
            StepOp::Delete | StepOp::ReplaceDelete => {
                let Some(id) = step.old.as_ref().and_then(|o| o.id.as_ref()) else {
                    debug!("No resource ID recorded for {}, considering delete successful", step.urn);
                    checkpoint.remove(&step.urn, None);
                    return Ok(());
                };
                provider.delete(&step.type_token, id).await.map_err(|e| {
                    warn!("{} ({id}) may still exist after failed {}", step.urn, step.op);
                    ProviderError {
                        message: format!("{} (resource ID {id})", e.message),
                        status: e.status,
                    }
                })?;
                checkpoint.remove(&step.urn, Some(id));
                Ok(())
            }
        }
    }

    /// The provider call itself succeeded, so the resource is in the state
    /// it asked for. Only the fresh outputs are missing.
    fn read_back_failed(step: &Step, id: &ResourceId, e: &ProviderError) -> ProviderError {
        warn!("Read-back of {} ({id}) failed: {}", step.urn, e.message);
        ProviderError::recoverable(format!("read-back of {id} failed: {}", e.message))
    }

    fn desired(step: &Step) -> ProviderResult<&ResourceState> {
        step.new
            .as_ref()
            .ok_or_else(|| ProviderError::recoverable(format!("{} step without desired state", step.op)))
    }

    fn physical_id(step: &Step) -> ProviderResult<&ResourceId> {
        step.old
            .as_ref()
            .and_then(|o| o.id.as_ref())
            .ok_or_else(|| ProviderError::recoverable(format!("no resource ID recorded for {}", step.urn)))
    }
}

impl Checkpoint {
    fn new(plan: &Plan) -> Self {
        let base = plan.base();
        Self {
            environment: plan.environment().to_string(),
            base_order: base.resources.iter().map(|r| r.urn.clone()).collect(),
            desired_order: plan.desired_order().to_vec(),
            live: base
                .resources
                .iter()
                .map(|r| (r.urn.clone(), r.clone()))
                .collect(),
        }
    }

    fn put(&mut self, state: ResourceState) {
        self.live.insert(state.urn.clone(), state);
    }

    /// Drops a resource. With an ID, only the entry carrying that ID is
    /// dropped, so deleting the old half of a replacement keeps the new one.
    fn remove(&mut self, urn: &Urn, id: Option<&ResourceId>) {
        let matches = self
            .live
            .get(urn)
            .is_some_and(|r| id.is_none() || r.id.as_ref() == id);
        if matches {
            self.live.remove(urn);
        }
    }

    /// Desired resources first, in dependency order, then any old resource
    /// that is still live.
    fn into_snapshot(mut self) -> Snapshot {
        let mut resources = Vec::with_capacity(self.live.len());
        for urn in self.desired_order.iter().chain(self.base_order.iter()) {
            if let Some(state) = self.live.remove(urn) {
                resources.push(state);
            }
        }
        Snapshot::new(self.environment, resources)
    }
}

impl ApplyOutcome {
    /// Returns true if every executed step succeeded.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

impl std::fmt::Display for ApplyOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Applied {} step(s), {} failed",
            self.progress.steps(),
            self.progress.failed()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CheckFailure, ResourceStatus};
    use crate::planner::{PlanBuilder, StepState};
    use crate::provider::{LocalProvider, Provider};
    use crate::resource::{PropertyKey, PropertyMap, PropertyValue, TypeToken};
    use async_trait::async_trait;
    use std::sync::Arc;

    const DISK: &str = "local:disk:Disk";

    /// Local provider that fails creates and updates whose `fail` property
    /// names a status, and adds a computed `status` output on read.
    struct ScriptedProvider {
        inner: LocalProvider,
        fail_reads: bool,
        fail_deletes: bool,
    }

    #[async_trait]
    impl Provider for ScriptedProvider {
        async fn check(&self, t: &TypeToken, p: &PropertyMap) -> ProviderResult<Vec<CheckFailure>> {
            self.inner.check(t, p).await
        }

        async fn create(&self, t: &TypeToken, p: &PropertyMap) -> ProviderResult<ResourceId> {
            scripted_failure(p)?;
            self.inner.create(t, p).await
        }

        async fn get(&self, t: &TypeToken, id: &ResourceId) -> ProviderResult<PropertyMap> {
            if self.fail_reads {
                return Err(ProviderError::catastrophic("read timed out"));
            }
            let mut props = self.inner.get(t, id).await?;
            props.insert("status", PropertyValue::from("ready"));
            Ok(props)
        }

        async fn inspect_change(
            &self,
            t: &TypeToken,
            id: &ResourceId,
            old: &PropertyMap,
            new: &PropertyMap,
            diff: &ObjectDiff,
        ) -> ProviderResult<Vec<PropertyKey>> {
            self.inner.inspect_change(t, id, old, new, diff).await
        }

        async fn update(
            &self,
            t: &TypeToken,
            id: &ResourceId,
            old: &PropertyMap,
            new: &PropertyMap,
            diff: &ObjectDiff,
        ) -> ProviderResult<()> {
            scripted_failure(new)?;
            self.inner.update(t, id, old, new, diff).await
        }

        async fn delete(&self, t: &TypeToken, id: &ResourceId) -> ProviderResult<()> {
            if self.fail_deletes {
                return Err(ProviderError::recoverable("volume is attached"));
            }
            self.inner.delete(t, id).await
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn scripted_failure(props: &PropertyMap) -> ProviderResult<()> {
        match props.get("fail") {
            Some(PropertyValue::String(s)) if s == "unknown" => {
                Err(ProviderError::catastrophic("connection lost mid-call"))
            }
            Some(PropertyValue::String(s)) if s == "ok" => Err(ProviderError::recoverable("quota exceeded")),
            _ => Ok(()),
        }
    }

    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
    }

    impl StepObserver for Recorder {
        fn before(&mut self, index: usize, step: &Step) {
            self.events.push(format!("before {index} {}", step.urn.name()));
        }

        fn after(&mut self, index: usize, _step: &Step, result: Result<(), &ProviderError>) {
            let status = result.map_or_else(|e| e.status.to_string(), |()| String::from("done"));
            self.events.push(format!("after {index} {status}"));
        }
    }

    fn registry() -> ProviderRegistry {
        scripted_registry(false, false)
    }

    fn scripted_registry(fail_reads: bool, fail_deletes: bool) -> ProviderRegistry {
        let inner = LocalProvider::new().with_immutable(DISK, &["zone"]);
        let provider = ScriptedProvider {
            inner,
            fail_reads,
            fail_deletes,
        };
        ProviderRegistry::new().with_provider("local", Arc::new(provider))
    }

    fn disk(name: &str, props: Vec<(&str, PropertyValue)>) -> ResourceState {
        let map = props.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
        ResourceState::new(Urn::new("dev", DISK, name), TypeToken::new(DISK), map)
    }

    fn names(snapshot: &Snapshot) -> Vec<&str> {
        snapshot.resources.iter().map(|r| r.urn.name()).collect()
    }

    async fn plan(registry: &ProviderRegistry, old: Option<&Snapshot>, new: Option<&Snapshot>) -> Plan {
        PlanBuilder::new(registry).build(old, new).await.expect("plan")
    }

    fn five_creates(third: &str) -> Snapshot {
        Snapshot::new(
            "dev",
            vec![
                disk("s1", vec![]),
                disk("s2", vec![]),
                disk("s3", vec![("fail", third.into())]),
                disk("s4", vec![]),
                disk("s5", vec![]),
            ],
        )
    }

    #[tokio::test]
    async fn test_create_records_ids_and_outputs() {
        let registry = registry();
        let new = Snapshot::new("dev", vec![disk("a", vec![("size", 10.into())])]);
        let plan = plan(&registry, None, Some(&new)).await;

        let outcome = PlanExecutor::new(&registry)
            .execute(&plan, ApplyProgress::new(plan.len()), &mut ())
            .await;

        assert!(outcome.is_success());
        let res = &outcome.checkpoint.resources[0];
        assert!(res.id.is_some());
        assert_eq!(res.properties.get("status"), Some(&PropertyValue::from("ready")));
        assert_eq!(outcome.progress.ops().get(StepOp::Create), 1);
    }

    #[tokio::test]
    async fn test_unknown_failure_halts_and_marks_corrupt() {
        let registry = registry();
        let plan = plan(&registry, None, Some(&five_creates("unknown"))).await;

        let outcome = PlanExecutor::new(&registry)
            .execute(&plan, ApplyProgress::new(plan.len()), &mut ())
            .await;

        assert!(outcome.progress.maybe_corrupt());
        assert_eq!(names(&outcome.checkpoint), vec!["s1", "s2"]);
        assert_eq!(outcome.progress.steps(), 2);
        assert_eq!(
            outcome.progress.state(2),
            Some(StepState::Failed(ResourceStatus::Unknown))
        );
        assert_eq!(outcome.progress.state(3), Some(StepState::Pending));
        assert_eq!(outcome.progress.state(4), Some(StepState::Pending));
        let err = outcome.error.expect("step 3 failed");
        assert!(err.is_catastrophic());
        assert!(err.to_string().contains("Step #3"));
    }

    #[tokio::test]
    async fn test_continue_on_error_runs_remaining_steps() {
        let registry = registry();
        let plan = plan(&registry, None, Some(&five_creates("ok"))).await;

        let outcome = PlanExecutor::new(&registry)
            .with_continue_on_error(true)
            .execute(&plan, ApplyProgress::new(plan.len()), &mut ())
            .await;

        assert!(!outcome.progress.maybe_corrupt());
        assert_eq!(names(&outcome.checkpoint), vec!["s1", "s2", "s4", "s5"]);
        assert_eq!(outcome.progress.failed(), 1);
        assert!(!outcome.is_success());
    }

    #[tokio::test]
    async fn test_observer_brackets_each_step() {
        let registry = registry();
        let new = Snapshot::new(
            "dev",
            vec![disk("a", vec![]), disk("b", vec![("fail", "ok".into())])],
        );
        let plan = plan(&registry, None, Some(&new)).await;

        let mut recorder = Recorder::default();
        let _ = PlanExecutor::new(&registry)
            .execute(&plan, ApplyProgress::new(plan.len()), &mut recorder)
            .await;

        assert_eq!(
            recorder.events,
            vec!["before 0 a", "after 0 done", "before 1 b", "after 1 ok"]
        );
    }

    #[tokio::test]
    async fn test_update_replace_and_delete_fold_into_checkpoint() {
        let registry = registry();
        let first = Snapshot::new(
            "dev",
            vec![
                disk("keep", vec![("size", 1.into())]),
                disk("move", vec![("zone", "a".into())]),
                disk("drop", vec![]),
            ],
        );
        let initial = plan(&registry, None, Some(&first)).await;
        let deployed = PlanExecutor::new(&registry)
            .execute(&initial, ApplyProgress::new(initial.len()), &mut ())
            .await
            .checkpoint;
        let id_of = |snap: &Snapshot, name: &str| {
            snap.resources
                .iter()
                .find(|r| r.urn.name() == name)
                .and_then(|r| r.id.clone())
        };

        let second = Snapshot::new(
            "dev",
            vec![
                disk("keep", vec![("size", 2.into())]),
                disk("move", vec![("zone", "b".into())]),
            ],
        );
        let change = plan(&registry, Some(&deployed), Some(&second)).await;
        let outcome = PlanExecutor::new(&registry)
            .execute(&change, ApplyProgress::new(change.len()), &mut ())
            .await;

        assert!(outcome.is_success());
        let checkpoint = &outcome.checkpoint;
        assert_eq!(names(checkpoint), vec!["keep", "move"]);
        assert_eq!(id_of(checkpoint, "keep"), id_of(&deployed, "keep"));
        assert_ne!(id_of(checkpoint, "move"), id_of(&deployed, "move"));
        assert_eq!(
            checkpoint.resources[0].properties.get("size"),
            Some(&PropertyValue::from(2))
        );
        assert_eq!(outcome.progress.ops().get(StepOp::ReplaceDelete), 1);
        assert_eq!(outcome.progress.ops().get(StepOp::Delete), 1);
    }

    #[tokio::test]
    async fn test_failed_update_keeps_prior_state() {
        let registry = registry();
        let deployed = Snapshot::new(
            "dev",
            vec![disk("a", vec![("size", 1.into())]).with_id(ResourceId::new("disk-1"))],
        );
        let new = Snapshot::new("dev", vec![disk("a", vec![("size", 2.into()), ("fail", "ok".into())])]);
        let change = plan(&registry, Some(&deployed), Some(&new)).await;

        let outcome = PlanExecutor::new(&registry)
            .execute(&change, ApplyProgress::new(change.len()), &mut ())
            .await;

        assert!(!outcome.is_success());
        assert!(!outcome.progress.maybe_corrupt());
        assert_eq!(outcome.checkpoint, deployed);
    }

    #[tokio::test]
    async fn test_failed_read_back_keeps_created_resource() {
        let registry = scripted_registry(true, false);
        let new = Snapshot::new("dev", vec![disk("a", vec![("size", 10.into())])]);
        let plan = plan(&registry, None, Some(&new)).await;

        let outcome = PlanExecutor::new(&registry)
            .execute(&plan, ApplyProgress::new(plan.len()), &mut ())
            .await;

        assert_eq!(outcome.progress.state(0), Some(StepState::Failed(ResourceStatus::Ok)));
        assert!(!outcome.progress.maybe_corrupt());
        let res = &outcome.checkpoint.resources[0];
        assert!(res.id.is_some());
        assert_eq!(res.properties.get("size"), Some(&PropertyValue::from(10)));
        let err = outcome.error.expect("read-back failed");
        assert!(!err.is_catastrophic());
        assert!(err.to_string().contains("read-back"));
    }

    #[tokio::test]
    async fn test_failed_delete_names_the_resource_id() {
        let registry = scripted_registry(false, true);
        let deployed = Snapshot::new(
            "dev",
            vec![disk("old", vec![]).with_id(ResourceId::new("disk-7"))],
        );
        let change = plan(&registry, Some(&deployed), Some(&Snapshot::new("dev", vec![]))).await;

        let outcome = PlanExecutor::new(&registry)
            .execute(&change, ApplyProgress::new(change.len()), &mut ())
            .await;

        assert_eq!(outcome.checkpoint, deployed);
        let err = outcome.error.expect("delete failed");
        assert!(err.to_string().contains("disk-7"));
    }
}
