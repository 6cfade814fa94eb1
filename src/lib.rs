// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(warnings)]                    // All warnings are treated as errors
#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![deny(missing_docs)]                // All public items must be documented
#![deny(dead_code)]                   // Unused code is forbidden
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![deny(unused_imports)]              // Unused imports are forbidden
#![deny(unused_variables)]            // Unused variables are forbidden
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

//! # Broker Access
//!
//! A declarative, idempotent reconciler for the service plan access of a
//! Cloud Foundry service broker.
//!
//! ## Overview
//!
//! Users describe which organizations may use which plans of a broker's
//! catalog. Each pass compares that description with the plan visibilities
//! and public flags currently set on the platform and issues the minimal
//! set of grants, revokes and public flag changes.
//!
//! ## Architecture
//!
//! 1. **Desired access**: declarations from `broker-access.yaml`
//! 2. **Observed access**: visibilities and public flags, normalized back
//!    into compact declarations
//! 3. **Expansion**: both sides become concrete `(service, plan, org)` tuples
//! 4. **Diff and apply**: set difference, then public flags, grants, revokes
//!
//! ## Modules
//!
//! - [`config`]: Configuration parsing and validation
//! - [`platform`]: Cloud Controller client and collaborator traits
//! - [`access`]: Declarations, expansion and normalization
//! - [`planner`]: Diff computation, planning and apply
//! - [`reconciler`]: Reconciliation passes
//! - [`registrar`]: Broker registration
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! platform:
//!   api: https://api.sys.example.com
//! broker:
//!   name: my-broker
//! service_access:
//!   - service: db
//!     plan: small
//!     org_id: 4b2f6d0e-1c1a-4e7e-9a52-0f1c2d3e4f5a
//!   - service: cache
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod access;
pub mod cli;
pub mod config;
pub mod error;
pub mod planner;
pub mod platform;
pub mod reconciler;
pub mod registrar;

// ============================================================================
// Re-exports
// ============================================================================

pub use access::{AccessDeclaration, AccessTuple, Expander, Normalizer};
pub use cli::{Cli, Commands, OutputFormatter};
pub use config::{AccessConfig, ConfigHasher, ConfigParser, ConfigValidator};
pub use error::{AccessError, Result};
pub use planner::{AccessDiff, AccessPlan, DiffEngine, PlanExecutor};
pub use platform::{CatalogSnapshot, CloudControllerClient, Platform};
pub use reconciler::{DriftReport, ReconciliationResult, Reconciler};
pub use registrar::{BrokerRegistrar, RegistrationOutcome};
