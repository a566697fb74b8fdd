//! vSphere Automation sample programs.
//!
//! Each sample is a [`vas_core::pipeline::SamplePipeline`]: log in, do one
//! thing against the server, optionally undo it, log out.

pub mod cli;
pub mod logging;
pub mod samples;

pub use samples::run;
