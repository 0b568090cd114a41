//! Deployment plan types and construction.
//!
//! This module defines the ordered step sequence that turns an old snapshot
//! into a new one, and the [`PlanBuilder`] that derives it from per-resource
//! diffs and provider callbacks.

use chrono::{DateTime, Utc};
use colored::Color;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use tracing::{debug, error, info};

use crate::error::{PlanError, Result, StratumError};
use crate::provider::ProviderRegistry;
use crate::resource::{PropertyKey, PropertyMap, ResourceState, Snapshot, TypeToken, Urn};

use super::diff::{DiffEngine, ObjectDiff};

/// Property whose change always forces a replacement.
pub const NAME_PROPERTY: &str = "name";

/// Kind of change a step performs.
///
/// The declaration order is the canonical order used for summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StepOp {
    /// Nothing changes. Only used to render unchanged resources.
    Same,
    /// A new resource is created.
    Create,
    /// A resource is updated in place.
    Update,
    /// A resource is deleted.
    Delete,
    /// The new copy of a replaced resource is created.
    ReplaceCreate,
    /// The old copy of a replaced resource is deleted.
    ReplaceDelete,
}

/// One planned change to a single resource.
#[derive(Debug, Clone)]
pub struct Step {
    /// Operation performed.
    pub op: StepOp,
    /// Resource identity.
    pub urn: Urn,
    /// Resource type.
    pub type_token: TypeToken,
    /// Recorded state before the step, if the resource existed.
    pub old: Option<ResourceState>,
    /// Desired state after the step, if the resource should exist.
    pub new: Option<ResourceState>,
    /// Property diff between old and new, for updates and replacements.
    pub diff: Option<ObjectDiff>,
}

/// An ordered sequence of steps transforming one snapshot into another.
#[derive(Debug, Clone)]
pub struct Plan {
    environment: String,
    created_at: DateTime<Utc>,
    steps: Vec<Step>,
    unchanged: Vec<ResourceState>,
    replaces: BTreeMap<Urn, Vec<PropertyKey>>,
    base: Snapshot,
    desired_order: Vec<Urn>,
}

/// Number of steps per operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpCounts {
    counts: BTreeMap<StepOp, usize>,
}

/// Builds plans by diffing snapshots and consulting providers.
#[derive(Debug)]
pub struct PlanBuilder<'a> {
    providers: &'a ProviderRegistry,
    engine: DiffEngine,
}

impl StepOp {
    /// All operations in canonical order.
    pub const ALL: [Self; 6] = [
        Self::Same,
        Self::Create,
        Self::Update,
        Self::Delete,
        Self::ReplaceCreate,
        Self::ReplaceDelete,
    ];

    /// Returns true for the two halves of a replacement.
    #[must_use]
    pub const fn is_replacement(self) -> bool {
        matches!(self, Self::ReplaceCreate | Self::ReplaceDelete)
    }

    /// Two-character leader printed before a resource or property.
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Same => "  ",
            Self::Create => "+ ",
            Self::Update => "~ ",
            Self::Delete => "- ",
            Self::ReplaceCreate => "++",
            Self::ReplaceDelete => "--",
        }
    }

    /// Text appended after a step's header line.
    #[must_use]
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::ReplaceCreate => " (replacement)",
            Self::ReplaceDelete => " (replaced)",
            _ => "",
        }
    }

    /// Display colour, or `None` for plain text.
    #[must_use]
    pub const fn color(self) -> Option<Color> {
        match self {
            Self::Same => None,
            Self::Create => Some(Color::Green),
            Self::Update => Some(Color::Yellow),
            Self::Delete => Some(Color::Red),
            Self::ReplaceCreate => Some(Color::BrightGreen),
            Self::ReplaceDelete => Some(Color::BrightRed),
        }
    }

    /// Past-tense verb used in summaries.
    #[must_use]
    pub const fn past_tense(self) -> &'static str {
        match self {
            Self::Same => "unchanged",
            Self::Create => "created",
            Self::Update => "updated",
            Self::Delete => "deleted",
            Self::ReplaceCreate => "replace-created",
            Self::ReplaceDelete => "replace-deleted",
        }
    }
}

impl fmt::Display for StepOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Same => "same",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::ReplaceCreate => "replace-create",
            Self::ReplaceDelete => "replace-delete",
        };
        write!(f, "{s}")
    }
}

impl Step {
    fn create(new: ResourceState) -> Self {
        Self {
            op: StepOp::Create,
            urn: new.urn.clone(),
            type_token: new.type_token.clone(),
            old: None,
            new: Some(new),
            diff: None,
        }
    }

    fn update(op: StepOp, old: ResourceState, new: ResourceState, diff: ObjectDiff) -> Self {
        Self {
            op,
            urn: new.urn.clone(),
            type_token: new.type_token.clone(),
            old: Some(old),
            new: Some(new),
            diff: Some(diff),
        }
    }

    fn delete(op: StepOp, old: ResourceState) -> Self {
        Self {
            op,
            urn: old.urn.clone(),
            type_token: old.type_token.clone(),
            old: Some(old),
            new: None,
            diff: None,
        }
    }

    /// The properties to show for this step: new ones if any, else old ones.
    #[must_use]
    pub fn properties(&self) -> Option<&PropertyMap> {
        self.new
            .as_ref()
            .or(self.old.as_ref())
            .map(|r| &r.properties)
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}{}", self.op, self.urn, self.op.suffix())
    }
}

impl Plan {
    /// Environment the plan deploys to.
    #[must_use]
    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// When the plan was built.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Steps in execution order.
    #[must_use]
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Resources that need no change, in desired order.
    #[must_use]
    pub fn unchanged(&self) -> &[ResourceState] {
        &self.unchanged
    }

    /// Properties that forced the given resource to be replaced.
    #[must_use]
    pub fn replaces(&self, urn: &Urn) -> &[PropertyKey] {
        self.replaces.get(urn).map(Vec::as_slice).unwrap_or_default()
    }

    /// The snapshot the plan starts from.
    #[must_use]
    pub const fn base(&self) -> &Snapshot {
        &self.base
    }

    /// URNs of the desired snapshot, in dependency order.
    #[must_use]
    pub fn desired_order(&self) -> &[Urn] {
        &self.desired_order
    }

    /// Returns true if nothing would change.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Number of steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Counts the planned steps per operation.
    #[must_use]
    pub fn op_counts(&self) -> OpCounts {
        let mut counts = OpCounts::default();
        for step in &self.steps {
            counts.record(step.op);
        }
        counts
    }

    /// Builds the snapshot that applying every step would produce.
    ///
    /// Resources created by the plan have no ID yet.
    #[must_use]
    pub fn desired_snapshot(&self) -> Snapshot {
        let resources = self
            .desired_order
            .iter()
            .filter_map(|urn| {
                self.steps
                    .iter()
                    .find(|s| &s.urn == urn && s.new.is_some())
                    .and_then(|s| {
                        s.new.clone().map(|mut new| {
                            if new.id.is_none() && s.op == StepOp::Update {
                                new.id = s.old.as_ref().and_then(|o| o.id.clone());
                            }
                            new
                        })
                    })
                    .or_else(|| self.unchanged.iter().find(|r| &r.urn == urn).cloned())
            })
            .collect();
        Snapshot::new(self.environment.clone(), resources)
    }
}

impl OpCounts {
    /// Counts one more step of the given operation.
    pub fn record(&mut self, op: StepOp) {
        *self.counts.entry(op).or_insert(0) += 1;
    }

    /// Count for one operation.
    #[must_use]
    pub fn get(&self, op: StepOp) -> usize {
        self.counts.get(&op).copied().unwrap_or(0)
    }

    /// Summary lines as `(label, count)` in canonical order.
    ///
    /// Unless `show_replace_steps` is set, a replacement pair is reported
    /// once as `replace` and its delete half is left out.
    #[must_use]
    pub fn lines(&self, show_replace_steps: bool) -> Vec<(StepOp, usize)> {
        StepOp::ALL
            .iter()
            .copied()
            .filter(|op| show_replace_steps || *op != StepOp::ReplaceDelete)
            .map(|op| (op, self.get(op)))
            .filter(|(_, n)| *n > 0)
            .collect()
    }

    /// Total number of changes, consistent with [`OpCounts::lines`].
    #[must_use]
    pub fn total(&self, show_replace_steps: bool) -> usize {
        self.lines(show_replace_steps).iter().map(|(_, n)| n).sum()
    }
}

impl<'a> PlanBuilder<'a> {
    /// Creates a builder backed by the given providers.
    #[must_use]
    pub const fn new(providers: &'a ProviderRegistry) -> Self {
        Self {
            providers,
            engine: DiffEngine::new(),
        }
    }

    /// Builds a plan from an old and a new snapshot.
    ///
    /// A missing old snapshot means a first deployment; a missing new one
    /// means everything is destroyed.
    ///
    /// # Errors
    ///
    /// Returns an error if a snapshot repeats a URN, a type has no provider,
    /// a provider rejects the desired properties, or a provider call fails.
    pub async fn build(&self, old: Option<&Snapshot>, new: Option<&Snapshot>) -> Result<Plan> {
        let environment = new
            .or(old)
            .map(|s| s.environment.clone())
            .ok_or_else(|| StratumError::internal("a plan needs an old or a new snapshot"))?;
        let base = old.cloned().unwrap_or_else(|| Snapshot::empty(&environment));
        let desired = new.cloned().unwrap_or_else(|| Snapshot::empty(&environment));
        base.ensure_unique()?;
        desired.ensure_unique()?;

        self.check(&desired).await?;

        let mut steps = Vec::new();
        let mut unchanged = Vec::new();
        let mut replaces = BTreeMap::new();

        for res in &desired.resources {
            let Some(prior) = base.get(&res.urn) else {
                debug!("{} is new", res.urn);
                steps.push(Step::create(res.clone()));
                continue;
            };

            let Some(diff) = self.engine.diff(&prior.properties, &res.properties) else {
                debug!("{} is unchanged", res.urn);
                unchanged.push(prior.clone());
                continue;
            };

            let causes = self.replacement_causes(prior, res, &diff).await?;
            if causes.is_empty() {
                debug!("{} will be updated", res.urn);
                steps.push(Step::update(StepOp::Update, prior.clone(), res.clone(), diff));
            } else {
                debug!("{} will be replaced because of {}", res.urn, causes.join(", "));
                steps.push(Step::update(StepOp::ReplaceCreate, prior.clone(), res.clone(), diff));
                steps.push(Step::delete(StepOp::ReplaceDelete, prior.clone()));
                replaces.insert(res.urn.clone(), causes);
            }
        }

        let kept: HashSet<&Urn> = desired.resources.iter().map(|r| &r.urn).collect();
        for res in base.resources.iter().rev() {
            if !kept.contains(&res.urn) {
                debug!("{} will be deleted", res.urn);
                steps.push(Step::delete(StepOp::Delete, res.clone()));
            }
        }

        info!(
            "Planned {} step(s) for environment '{environment}' ({} unchanged)",
            steps.len(),
            unchanged.len()
        );

        Ok(Plan {
            desired_order: desired.resources.iter().map(|r| r.urn.clone()).collect(),
            environment,
            created_at: Utc::now(),
            steps,
            unchanged,
            replaces,
            base,
        })
    }

    /// Runs provider validation over every desired resource.
    async fn check(&self, desired: &Snapshot) -> Result<()> {
        for res in &desired.resources {
            let provider = self.providers.provider_for(&res.type_token)?;
            let failures = provider
                .check(&res.type_token, &res.properties)
                .await
                .map_err(|source| PlanError::ProviderFailed {
                    urn: res.urn.clone(),
                    source,
                })?;
            if !failures.is_empty() {
                for failure in &failures {
                    error!("{}: {} {}", res.urn, failure.property, failure.reason);
                }
                return Err(PlanError::CheckFailed {
                    urn: res.urn.clone(),
                    failures,
                }
                .into());
            }
        }
        Ok(())
    }

    /// Collects the keys that force a replacement: a changed name, plus
    /// whatever the provider declares.
    async fn replacement_causes(
        &self,
        old: &ResourceState,
        new: &ResourceState,
        diff: &ObjectDiff,
    ) -> Result<Vec<PropertyKey>> {
        let mut causes = Vec::new();
        if diff.changed(NAME_PROPERTY) {
            causes.push(PropertyKey::from(NAME_PROPERTY));
        }

        // Without an ID the provider has nothing to inspect.
        let Some(id) = &old.id else {
            return Ok(causes);
        };

        let provider = self.providers.provider_for(&new.type_token)?;
        let declared = provider
            .inspect_change(&new.type_token, id, &old.properties, &new.properties, diff)
            .await
            .map_err(|source| PlanError::ProviderFailed {
                urn: new.urn.clone(),
                source,
            })?;
        for key in declared {
            if !causes.contains(&key) {
                causes.push(key);
            }
        }
        Ok(causes)
    }
}
