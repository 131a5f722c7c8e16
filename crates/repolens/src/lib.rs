// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! repolens: repository context extraction
//!
//! This library crate runs the analysis pipeline: it obtains a working copy,
//! reads recent history, extracts the newest change-set, scans the tree and
//! synthesizes a bounded Markdown digest for a downstream summarizer.

#![warn(missing_docs)]

pub mod config;
pub mod context;
pub mod pipeline;

pub use context::{DigestLimits, RepositoryContext, SynthesisInput, render_digest, synthesize};
pub use pipeline::{
    Analysis, AnalysisError, AnalysisRequest, AnalysisWarning, Analyzer, Cancellation, Stage,
};
