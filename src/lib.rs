//! Tailors a markdown resume to a specific job posting with a language model
//! and renders the result to PDF.

pub mod ai;
pub mod assistant;
pub mod config;
pub mod db;
pub mod error;
pub mod fetcher;
pub mod models;
pub mod optimizer;
pub mod render;

#[cfg(test)]
mod testing;

pub use error::{Result, TailorError};
pub use optimizer::{OptimizationSummary, OptimizeRequest, ResumeOptimizer, prepare_output_dir};
