//! Boot specification model for the apploader orchestrator.
//!
//! The boot specification is a YAML document listing assistant tasks and at most one
//! application task. This crate owns parsing, validation and the load-time conversion of
//! user supplied environment values; it performs no I/O beyond reading the boot spec file.

mod error;
pub use error::ModelError;

mod domain;
pub use domain::*;

mod kind;
pub use kind::TaskKind;

mod boot;
pub use boot::{BootSequence, Task, TlsRequest, workdir_of};
