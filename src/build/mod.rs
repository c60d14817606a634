// src/build/mod.rs

//! Build pipeline: output model, the external Builder boundary, and the
//! orchestrator that sequences classification, grouping, compilation and
//! manifest assembly.

pub mod backend;
pub mod orchestrator;
pub mod output;

pub use backend::{BuilderBackend, CommandBuilder};
pub use orchestrator::{internal_build, rebuild, BuildResult};
pub use output::{BuildOutput, BuildStepOutput, OutputFile};
