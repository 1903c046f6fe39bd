#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Administrative action runner.
//!
//! An action name plus a parameter mapping becomes exactly one [`Action`];
//! [`ActionRunner::execute`] performs its single remote operation, optionally
//! verifies the result with a follow-up read, and returns an [`ActionReport`].
//!
//! Layout: `params.rs` (parameter mapping), `values.rs` (value coercion),
//! `scope.rs` (tenant scoping), `action.rs` (action catalogue and parsing),
//! `report.rs` (structured results), `runner.rs` (execution and verification).

pub mod action;
pub mod error;
pub mod params;
pub mod report;
pub mod runner;
pub mod scope;
pub mod values;

pub use action::{Action, ActionName};
pub use error::{RunnerError, RunnerResult};
pub use params::ActionParams;
pub use report::{ActionReport, FailureReport, Outcome, Verification};
pub use runner::{ActionRunner, Backend, RunnerOptions};
pub use scope::TenantScope;
pub use values::{coerce_value, parse_assignment};
