// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![forbid(unsafe_code)]               // Unsafe code is forbidden
#![warn(missing_docs)]                // Public items should be documented
#![warn(dead_code)]                   // Unused code is reported
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![warn(unused_imports)]              // Unused imports are reported
#![warn(unused_variables)]            // Unused variables are reported
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::module_inception)]    // Module with same name as crate warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::shadow_unrelated)]    // Shadowing unrelated variables warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # Stratum Deploy
//!
//! Plans, applies and checkpoints deployments of resource environments.
//!
//! ## Overview
//!
//! An environment's last known state is a [`resource::Snapshot`]: an ordered
//! list of resources, each with a URN, a type, an optional provider-assigned
//! ID and a tree of properties. Deploying a desired-state document means:
//!
//! 1. **Diff**: compare old and new property maps per resource
//! 2. **Plan**: turn the diffs into an ordered list of create, update,
//!    replace and delete steps
//! 3. **Apply**: run the steps one at a time against resource providers,
//!    tracking progress and folding every completed step into a checkpoint
//! 4. **Persist**: save the checkpoint as the environment's envfile, with
//!    the previous file kept as a `.bak` backup
//!
//! ## Modules
//!
//! - [`resource`]: Property values, URNs and snapshots
//! - [`planner`]: Diff engine, plan model, executor and progress tracking
//! - [`provider`]: Provider callbacks and the in-process `local` provider
//! - [`state`]: Envfile encoding and checkpoint storage
//! - [`config`]: Desired-state documents, validation and workspace settings
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! resources:
//!   - name: net
//!     type: local:net:Vpc
//!     properties:
//!       cidr: 10.0.0.0/16
//!   - name: web
//!     type: local:compute:Instance
//!     properties:
//!       vpc: { $ref: net }
//!       size: small
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod cli;
pub mod config;
pub mod error;
pub mod planner;
pub mod provider;
pub mod resource;
pub mod state;

// ============================================================================
// Re-exports
// ============================================================================

pub use cli::{Cli, Commands, OutputFormatter};
pub use config::{ConfigParser, ConfigValidator, DesiredState, Workspace};
pub use error::{Result, StratumError};
pub use planner::{ApplyOutcome, ApplyProgress, DiffEngine, ObjectDiff, Plan, PlanBuilder, PlanExecutor, StepOp};
pub use provider::{LocalProvider, Provider, ProviderRegistry};
pub use resource::{PropertyMap, PropertyValue, ResourceState, Snapshot, Urn};
pub use state::{CheckpointStore, Envfile, LocalCheckpointStore};
