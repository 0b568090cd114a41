//! Output formatting for CLI commands.
//!
//! This module renders plans, apply progress and summaries, and the
//! environment listings, either as coloured text or as JSON.

use chrono::{DateTime, Utc};
use colored::Colorize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{self, Write};
use std::io;
use std::time::Duration;
use tabled::{Table, Tabled};

use crate::error::{ProviderError, ResourceStatus};
use crate::planner::{
    ApplyOutcome, ArrayDiff, ObjectDiff, OpCounts, Plan, Step, StepObserver, StepOp, ValueDiff,
};
use crate::resource::{PropertyKey, PropertyMap, PropertyValue, ResourceState};

use super::commands::OutputFormat;

/// Indentation of one nesting level below a step header.
const INDENT: &str = "    ";

/// Warning printed when a step failed with an unknown resource status.
pub const CORRUPT_WARNING: &str = "A catastrophic error occurred; resources states may be unknown";

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
    /// Whether unchanged resources and properties are shown.
    show_sames: bool,
    /// Whether both halves of a replacement are counted.
    show_replace_steps: bool,
}

/// One environment as shown by `env ls`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct EnvSummary {
    /// Environment name.
    pub name: String,
    /// Whether it is the selected environment.
    pub current: bool,
    /// Number of resources in its latest deployment.
    pub resources: usize,
    /// When it was last deployed.
    pub deployed_at: Option<DateTime<Utc>>,
}

/// Environment row for table display.
#[derive(Tabled)]
struct EnvRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Resources")]
    resources: usize,
    #[tabled(rename = "Last Deployed")]
    deployed_at: String,
}

/// Configuration variable row for table display.
#[derive(Tabled)]
struct ConfigRow {
    #[tabled(rename = "Key")]
    key: String,
    #[tabled(rename = "Value")]
    value: String,
}

/// The four partitions of an object or array diff, keyed by property name
/// or element index.
struct Entries<'a, K> {
    adds: &'a BTreeMap<K, PropertyValue>,
    deletes: &'a BTreeMap<K, PropertyValue>,
    updates: &'a BTreeMap<K, ValueDiff>,
    sames: &'a BTreeMap<K, PropertyValue>,
    label: fn(&K) -> String,
}

impl<'a> From<&'a ObjectDiff> for Entries<'a, PropertyKey> {
    fn from(diff: &'a ObjectDiff) -> Self {
        Self {
            adds: &diff.adds,
            deletes: &diff.deletes,
            updates: &diff.updates,
            sames: &diff.sames,
            label: |key| format!("{key}: "),
        }
    }
}

impl<'a> From<&'a ArrayDiff> for Entries<'a, usize> {
    fn from(diff: &'a ArrayDiff) -> Self {
        Self {
            adds: &diff.adds,
            deletes: &diff.deletes,
            updates: &diff.updates,
            sames: &diff.sames,
            label: |i| format!("[{i}]: "),
        }
    }
}

/// Wraps text in the colour of an operation.
fn paint(op: StepOp, text: &str) -> String {
    match op.color() {
        Some(color) => text.color(color).to_string(),
        None => text.to_string(),
    }
}

fn line(output: &mut String, op: StepOp, text: &str) {
    let _ = writeln!(output, "{}", paint(op, text));
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

/// Formats a duration the way summaries show it, e.g. `1.25s`.
#[must_use]
pub fn format_duration(elapsed: Duration) -> String {
    format!("{:.2}s", elapsed.as_secs_f64())
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self {
            format,
            show_sames: false,
            show_replace_steps: false,
        }
    }

    /// Shows unchanged resources and properties.
    #[must_use]
    pub const fn with_show_sames(mut self, show_sames: bool) -> Self {
        self.show_sames = show_sames;
        self
    }

    /// Counts both halves of each replacement in summaries.
    #[must_use]
    pub const fn with_show_replace_steps(mut self, show_replace_steps: bool) -> Self {
        self.show_replace_steps = show_replace_steps;
        self
    }

    /// Selected output format.
    #[must_use]
    pub const fn format(&self) -> OutputFormat {
        self.format
    }

    /// Formats a deployment plan for display.
    #[must_use]
    pub fn format_plan(&self, plan: &Plan) -> String {
        match self.format {
            OutputFormat::Json => {
                serde_json::to_string_pretty(&PlanJson::new(plan, self.show_replace_steps)).unwrap_or_default()
            }
            OutputFormat::Text => self.format_plan_text(plan),
        }
    }

    fn format_plan_text(&self, plan: &Plan) -> String {
        let mut output = String::new();

        if self.show_sames {
            for resource in plan.unchanged() {
                output.push_str(&self.format_resource(StepOp::Same, resource));
            }
        }

        if plan.is_empty() {
            let _ = writeln!(
                output,
                "{} No changes required - environment '{}' is up to date.",
                "✓".green(),
                plan.environment()
            );
            return output;
        }

        for step in plan.steps() {
            output.push_str(&self.format_step(plan, step));
        }
        output.push('\n');
        output.push_str(&self.format_summary(&plan.op_counts(), true, None, false));
        output
    }

    /// Renders one step: a coloured header, the resource's pseudo-properties
    /// and either its property diff or its full property map.
    #[must_use]
    pub fn format_step(&self, plan: &Plan, step: &Step) -> String {
        let mut output = String::new();
        let op = step.op;

        line(
            &mut output,
            op,
            &format!("{}{}: ({}){}", op.prefix(), step.type_token, op, op.suffix()),
        );
        line(&mut output, op, &format!("{}{INDENT}[urn={}]", op.prefix(), step.urn.name()));

        // A create has no physical ID yet; the old ID is being superseded.
        if !matches!(op, StepOp::Create | StepOp::ReplaceCreate) {
            if let Some(id) = step.old.as_ref().and_then(|old| old.id.as_ref()) {
                line(&mut output, op, &format!("{}{INDENT}[id={id}]", op.prefix()));
            }
        }

        match (&step.diff, op) {
            (Some(diff), StepOp::Update | StepOp::ReplaceCreate) => {
                self.write_entries(&mut output, Entries::from(diff), plan.replaces(&step.urn), 1);
            }
            _ => {
                if let Some(properties) = step.properties() {
                    Self::write_properties(&mut output, op, properties, 1);
                }
            }
        }

        output
    }

    /// Renders a resource that is not part of any step.
    fn format_resource(&self, op: StepOp, resource: &ResourceState) -> String {
        let mut output = String::new();
        line(&mut output, op, &format!("{}{}: ({op})", op.prefix(), resource.type_token));
        line(&mut output, op, &format!("{}{INDENT}[urn={}]", op.prefix(), resource.urn.name()));
        if let Some(id) = &resource.id {
            line(&mut output, op, &format!("{}{INDENT}[id={id}]", op.prefix()));
        }
        if self.show_sames {
            Self::write_properties(&mut output, op, &resource.properties, 1);
        }
        output
    }

    fn write_properties(output: &mut String, op: StepOp, properties: &PropertyMap, depth: usize) {
        for (key, value) in properties {
            if value.has_value() {
                Self::write_value(output, op, &format!("{key}: "), value, depth);
            }
        }
    }

    fn write_value(output: &mut String, op: StepOp, label: &str, value: &PropertyValue, depth: usize) {
        let lead = format!("{}{}", op.prefix(), INDENT.repeat(depth));
        match value {
            PropertyValue::Object(map) if !map.is_empty() => {
                line(output, op, &format!("{lead}{label}{{"));
                Self::write_properties(output, op, map, depth + 1);
                line(output, op, &format!("{lead}}}"));
            }
            PropertyValue::Array(items) if !items.is_empty() => {
                line(output, op, &format!("{lead}{label}["));
                for (i, item) in items.iter().enumerate() {
                    Self::write_value(output, op, &format!("[{i}]: "), item, depth + 1);
                }
                line(output, op, &format!("{lead}]"));
            }
            _ => line(output, op, &format!("{lead}{label}{value}")),
        }
    }

    /// Writes the entries of a diff in key order: additions and deletions
    /// that carry a value, every update, and sames only when asked to.
    fn write_entries<K: Ord + fmt::Display>(
        &self,
        output: &mut String,
        entries: Entries<'_, K>,
        replaces: &[PropertyKey],
        depth: usize,
    ) {
        let keys: BTreeSet<&K> = entries
            .adds
            .keys()
            .chain(entries.deletes.keys())
            .chain(entries.updates.keys())
            .chain(entries.sames.keys())
            .collect();

        for key in keys {
            let label = (entries.label)(key);
            if let Some(value) = entries.adds.get(key) {
                if value.has_value() {
                    Self::write_value(output, StepOp::Create, &label, value, depth);
                }
            } else if let Some(value) = entries.deletes.get(key) {
                if value.has_value() {
                    Self::write_value(output, StepOp::Delete, &label, value, depth);
                }
            } else if let Some(update) = entries.updates.get(key) {
                let name = key.to_string();
                let forces_replacement = replaces.iter().any(|r| *r == name);
                self.write_update(output, &label, update, forces_replacement, depth);
            } else if let Some(value) = entries.sames.get(key) {
                if self.show_sames && value.has_value() {
                    Self::write_value(output, StepOp::Same, &label, value, depth);
                }
            }
        }
    }

    fn write_update(&self, output: &mut String, label: &str, update: &ValueDiff, forces_replacement: bool, depth: usize) {
        let (op, marker) = if forces_replacement {
            (StepOp::ReplaceCreate, " (forces replacement)")
        } else {
            (StepOp::Update, "")
        };
        let lead = format!("{}{}", op.prefix(), INDENT.repeat(depth));

        if let Some(array) = &update.array {
            line(output, op, &format!("{lead}{label}[{marker}"));
            self.write_entries(output, Entries::from(array), &[], depth + 1);
            line(output, op, &format!("{lead}]"));
        } else if let Some(object) = &update.object {
            line(output, op, &format!("{lead}{label}{{{marker}"));
            self.write_entries(output, Entries::from(object), &[], depth + 1);
            line(output, op, &format!("{lead}}}"));
        } else {
            line(output, op, &format!("{lead}{label}{} => {}{marker}", update.old, update.new));
        }
    }

    /// Formats a change summary.
    ///
    /// `planned` selects future ("to create") over past ("created") wording.
    /// A replacement pair is one change unless replace steps are shown.
    #[must_use]
    pub fn format_summary(
        &self,
        counts: &OpCounts,
        planned: bool,
        elapsed: Option<Duration>,
        maybe_corrupt: bool,
    ) -> String {
        let mut output = String::new();
        let total = counts.total(self.show_replace_steps);
        let kind = if planned { "planned change" } else { "change" };
        let _ = writeln!(output, "{}:", plural(total, kind).replacen(' ', " total ", 1));

        for (op, n) in counts.lines(self.show_replace_steps) {
            let verb = match (op, self.show_replace_steps, planned) {
                (StepOp::ReplaceCreate, false, true) => String::from("to replace"),
                (StepOp::ReplaceCreate, false, false) => String::from("replaced"),
                (_, _, true) => format!("to {op}"),
                (_, _, false) => op.past_tense().to_string(),
            };
            line(
                &mut output,
                op,
                &format!("{INDENT}{}{} {verb}", op.prefix(), plural(n, "resource")),
            );
        }

        if let Some(elapsed) = elapsed {
            let _ = writeln!(output, "Deployment duration: {}", format_duration(elapsed));
        }
        if maybe_corrupt {
            let _ = writeln!(output, "{} {}", "⚠".red(), CORRUPT_WARNING.red());
        }
        output
    }

    /// Formats the result of applying a plan.
    #[must_use]
    pub fn format_outcome(&self, outcome: &ApplyOutcome, elapsed: Duration) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(&OutcomeJson::new(outcome, elapsed, self.show_replace_steps))
                .unwrap_or_default(),
            OutputFormat::Text => {
                let mut output = String::new();
                if let Some(err) = &outcome.error {
                    let _ = writeln!(output, "{} {err}", "✗".red());
                }
                output.push_str(&self.format_summary(
                    outcome.progress.ops(),
                    false,
                    Some(elapsed),
                    outcome.progress.maybe_corrupt(),
                ));
                output
            }
        }
    }

    /// Formats the environment listing.
    #[must_use]
    pub fn format_envs(&self, envs: &[EnvSummary]) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(envs).unwrap_or_default(),
            OutputFormat::Text => {
                if envs.is_empty() {
                    return String::from("No environments. Run 'stratum env init <name>' to create one.\n");
                }
                let rows: Vec<EnvRow> = envs
                    .iter()
                    .map(|env| EnvRow {
                        name: if env.current {
                            format!("{}*", env.name)
                        } else {
                            env.name.clone()
                        },
                        resources: env.resources,
                        deployed_at: env
                            .deployed_at
                            .map_or_else(|| String::from("n/a"), |t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string()),
                    })
                    .collect();
                let mut output = Table::new(rows).to_string();
                output.push('\n');
                output
            }
        }
    }

    /// Formats an environment's configuration variables.
    #[must_use]
    pub fn format_config(&self, config: &BTreeMap<String, String>) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(config).unwrap_or_default(),
            OutputFormat::Text => {
                if config.is_empty() {
                    return String::from("No configuration variables set.\n");
                }
                let rows: Vec<ConfigRow> = config
                    .iter()
                    .map(|(key, value)| ConfigRow {
                        key: key.clone(),
                        value: value.clone(),
                    })
                    .collect();
                let mut output = Table::new(rows).to_string();
                output.push('\n');
                output
            }
        }
    }
}

/// Prints apply progress as steps run.
#[derive(Debug)]
pub struct ConsoleObserver<W> {
    out: W,
}

impl<W: io::Write> ConsoleObserver<W> {
    /// Creates an observer writing to `out`.
    #[must_use]
    pub const fn new(out: W) -> Self {
        Self { out }
    }

    /// Returns the underlying writer.
    #[must_use]
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: io::Write> StepObserver for ConsoleObserver<W> {
    fn before(&mut self, index: usize, step: &Step) {
        let op = step.op;
        let part = if op.is_replacement() {
            " (part of a replacement change)"
        } else {
            ""
        };
        let _ = writeln!(
            self.out,
            "{}",
            paint(op, &format!("Applying step #{} [{op}]{part}", index + 1))
        );
        let _ = writeln!(
            self.out,
            "{}",
            paint(op, &format!("{}{}: [urn={}]", op.prefix(), step.type_token, step.urn.name()))
        );
    }

    fn after(&mut self, index: usize, step: &Step, result: Result<(), &ProviderError>) {
        if let Err(err) = result {
            let reason = match err.status {
                ResourceStatus::Ok => "provider successfully recovered from this failure",
                ResourceStatus::Unknown => {
                    "this failure was catastrophic and the provider cannot guarantee recovery"
                }
            };
            let _ = writeln!(
                self.out,
                "{}",
                format!("Step #{} failed [{}]: {reason}", index + 1, step.op).red()
            );
            let _ = writeln!(self.out, "{INDENT}error: {err}");
        }
    }
}

// JSON serialization helpers

#[derive(serde::Serialize)]
struct PlanJson {
    environment: String,
    created_at: DateTime<Utc>,
    total: usize,
    summary: BTreeMap<String, usize>,
    unchanged: usize,
    steps: Vec<StepJson>,
}

#[derive(serde::Serialize)]
struct StepJson {
    op: String,
    urn: String,
    #[serde(rename = "type")]
    type_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    changed: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    replaces: Vec<String>,
}

#[derive(serde::Serialize)]
struct OutcomeJson {
    success: bool,
    steps: usize,
    failed: usize,
    maybe_corrupt: bool,
    elapsed_secs: f64,
    summary: BTreeMap<String, usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn summary_json(counts: &OpCounts, show_replace_steps: bool) -> BTreeMap<String, usize> {
    counts
        .lines(show_replace_steps)
        .into_iter()
        .map(|(op, n)| (op.to_string(), n))
        .collect()
}

impl PlanJson {
    fn new(plan: &Plan, show_replace_steps: bool) -> Self {
        let counts = plan.op_counts();
        Self {
            environment: plan.environment().to_string(),
            created_at: plan.created_at(),
            total: counts.total(show_replace_steps),
            summary: summary_json(&counts, show_replace_steps),
            unchanged: plan.unchanged().len(),
            steps: plan
                .steps()
                .iter()
                .map(|step| StepJson {
                    op: step.op.to_string(),
                    urn: step.urn.to_string(),
                    type_token: step.type_token.to_string(),
                    id: step
                        .old
                        .as_ref()
                        .and_then(|old| old.id.as_ref())
                        .map(ToString::to_string),
                    changed: step
                        .diff
                        .as_ref()
                        .map(|d| d.changed_keys().into_iter().cloned().collect())
                        .unwrap_or_default(),
                    replaces: plan.replaces(&step.urn).to_vec(),
                })
                .collect(),
        }
    }
}

impl OutcomeJson {
    fn new(outcome: &ApplyOutcome, elapsed: Duration, show_replace_steps: bool) -> Self {
        Self {
            success: outcome.is_success(),
            steps: outcome.progress.steps(),
            failed: outcome.progress.failed(),
            maybe_corrupt: outcome.progress.maybe_corrupt(),
            elapsed_secs: elapsed.as_secs_f64(),
            summary: summary_json(outcome.progress.ops(), show_replace_steps),
            error: outcome.error.as_ref().map(ToString::to_string),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::{ApplyProgress, PlanBuilder};
    use crate::provider::{LocalProvider, ProviderRegistry};
    use crate::resource::{ResourceId, Snapshot, TypeToken, Urn};
    use std::sync::Arc;

    const DISK: &str = "local:disk:Disk";

    fn registry() -> ProviderRegistry {
        let provider = LocalProvider::new().with_immutable(DISK, &["zone"]);
        ProviderRegistry::new().with_provider("local", Arc::new(provider))
    }

    fn disk(name: &str, props: Vec<(&str, PropertyValue)>) -> ResourceState {
        let map: PropertyMap = props.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
        ResourceState::new(Urn::new("dev", DISK, name), TypeToken::new(DISK), map)
    }

    fn deployed(name: &str, props: Vec<(&str, PropertyValue)>) -> ResourceState {
        disk(name, props).with_id(ResourceId::new(format!("id-{name}")))
    }

    async fn plan(old: Vec<ResourceState>, new: Vec<ResourceState>) -> Plan {
        let registry = registry();
        let old = Snapshot::new("dev", old);
        let new = Snapshot::new("dev", new);
        PlanBuilder::new(&registry)
            .build(Some(&old), Some(&new))
            .await
            .expect("plan")
    }

    fn text() -> OutputFormatter {
        colored::control::set_override(false);
        OutputFormatter::new(OutputFormat::Text)
    }

    #[tokio::test]
    async fn test_create_step_lists_properties() {
        let plan = plan(vec![], vec![disk("data", vec![("size", 40.into()), ("gone", PropertyValue::Null)])]).await;
        let rendered = text().format_step(&plan, &plan.steps()[0]);

        assert!(rendered.contains("+ local:disk:Disk: (create)"));
        assert!(rendered.contains("[urn=data]"));
        assert!(rendered.contains("size: 40"));
        assert!(!rendered.contains("gone"));
        assert!(!rendered.contains("[id="));
    }

    #[tokio::test]
    async fn test_update_marks_only_changes() {
        let plan = plan(
            vec![deployed("data", vec![("size", 10.into()), ("label", "a".into()), ("old", "x".into())])],
            vec![disk("data", vec![("size", 20.into()), ("label", "a".into()), ("new", "y".into())])],
        )
        .await;
        let rendered = text().format_step(&plan, &plan.steps()[0]);

        assert!(rendered.contains("[id=id-data]"));
        assert!(rendered.contains("~     size: 10 => 20"));
        assert!(rendered.contains("+     new: \"y\""));
        assert!(rendered.contains("-     old: \"x\""));
        assert!(!rendered.contains("label"));

        let verbose = text().with_show_sames(true).format_step(&plan, &plan.steps()[0]);
        assert!(verbose.contains("label: \"a\""));
    }

    #[tokio::test]
    async fn test_replacement_cause_is_marked() {
        let plan = plan(
            vec![deployed("data", vec![("zone", "a".into()), ("size", 1.into())])],
            vec![disk("data", vec![("zone", "b".into()), ("size", 2.into())])],
        )
        .await;
        let rendered = text().format_step(&plan, &plan.steps()[0]);

        assert!(rendered.contains("++local:disk:Disk: (replace-create) (replacement)"));
        assert!(rendered.contains("zone: \"a\" => \"b\" (forces replacement)"));
        assert!(rendered.contains("~     size: 1 => 2"));
    }

    #[tokio::test]
    async fn test_array_updates_render_by_index() {
        let plan = plan(
            vec![deployed("data", vec![("tags", vec!["a", "b"].into())])],
            vec![disk("data", vec![("tags", vec!["a", "c", "d"].into())])],
        )
        .await;
        let rendered = text().format_step(&plan, &plan.steps()[0]);

        assert!(rendered.contains("tags: ["));
        assert!(rendered.contains("[1]: \"b\" => \"c\""));
        assert!(rendered.contains("+         [2]: \"d\""));
        assert!(!rendered.contains("[0]"));
    }

    #[tokio::test]
    async fn test_plan_summary_counts_replacements_once() {
        let plan = plan(
            vec![deployed("a", vec![("zone", "x".into())]), deployed("b", vec![])],
            vec![disk("a", vec![("zone", "y".into())]), disk("c", vec![])],
        )
        .await;

        let summary = text().format_summary(&plan.op_counts(), true, None, false);
        assert!(summary.starts_with("3 total planned changes:"));
        assert!(summary.contains("+ 1 resource to create"));
        assert!(summary.contains("- 1 resource to delete"));
        assert!(summary.contains("++1 resource to replace"));
        assert!(!summary.contains("replace-delete"));

        let detailed = text()
            .with_show_replace_steps(true)
            .format_summary(&plan.op_counts(), true, None, false);
        assert!(detailed.starts_with("4 total planned changes:"));
        assert!(detailed.contains("--1 resource to replace-delete"));
    }

    #[test]
    fn test_apply_summary_has_duration_and_warning() {
        let mut progress = ApplyProgress::new(2);
        progress.succeed(0, StepOp::Create);
        progress.fail(1, ResourceStatus::Unknown);

        let summary = text().format_summary(progress.ops(), false, Some(Duration::from_millis(1500)), true);
        assert!(summary.starts_with("1 total change:"));
        assert!(summary.contains("+ 1 resource created"));
        assert!(summary.contains("Deployment duration: 1.50s"));
        assert!(summary.contains(CORRUPT_WARNING));
    }

    #[tokio::test]
    async fn test_empty_plan_is_up_to_date() {
        let plan = plan(vec![deployed("a", vec![])], vec![disk("a", vec![])]).await;
        let rendered = text().format_plan(&plan);
        assert!(rendered.contains("up to date"));

        let verbose = text().with_show_sames(true).format_plan(&plan);
        assert!(verbose.contains("(same)"));
    }

    #[tokio::test]
    async fn test_plan_json() {
        let plan = plan(vec![], vec![disk("a", vec![("size", 1.into())])]).await;
        let json = OutputFormatter::new(OutputFormat::Json).format_plan(&plan);
        let value: serde_json::Value = serde_json::from_str(&json).expect("json");

        assert_eq!(value["environment"], "dev");
        assert_eq!(value["total"], 1);
        assert_eq!(value["steps"][0]["op"], "create");
        assert_eq!(value["summary"]["create"], 1);
    }

    #[tokio::test]
    async fn test_console_observer_classifies_failures() {
        let plan = plan(
            vec![deployed("a", vec![("zone", "x".into())])],
            vec![disk("a", vec![("zone", "y".into())])],
        )
        .await;
        colored::control::set_override(false);
        let mut observer = ConsoleObserver::new(Vec::new());
        let step = &plan.steps()[0];

        observer.before(0, step);
        observer.after(0, step, Err(&ProviderError::recoverable("quota exceeded")));
        observer.before(1, &plan.steps()[1]);
        observer.after(1, &plan.steps()[1], Err(&ProviderError::catastrophic("timeout")));

        let printed = String::from_utf8(observer.into_inner()).expect("utf8");
        assert!(printed.contains("Applying step #1 [replace-create] (part of a replacement change)"));
        assert!(printed.contains("provider successfully recovered from this failure"));
        assert!(printed.contains("quota exceeded"));
        assert!(printed.contains("Applying step #2 [replace-delete]"));
        assert!(printed.contains("cannot guarantee recovery"));
    }

    #[test]
    fn test_env_listing() {
        let envs = vec![
            EnvSummary {
                name: String::from("dev"),
                current: true,
                resources: 3,
                deployed_at: None,
            },
            EnvSummary {
                name: String::from("prod"),
                current: false,
                resources: 0,
                deployed_at: None,
            },
        ];
        let table = text().format_envs(&envs);
        assert!(table.contains("dev*"));
        assert!(table.contains("prod"));

        assert!(text().format_envs(&[]).contains("env init"));
    }
}
