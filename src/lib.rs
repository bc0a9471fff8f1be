//! # Trueno-Flow
//!
//! Demand-driven execution pipeline and cycle-collected object model for
//! scientific visualization.
//!
//! Stages declare typed input and output ports and implement one handler per
//! pass of the request protocol. The [`executive::Pipeline`] drives the passes
//! over every stage feeding the one being updated, negotiates extents, time
//! and pieces between consumers and producers, and caches outputs until
//! something upstream changes.
//!
//! Objects shared between stages live behind counted [`object::Ref`] handles.
//! Objects that can form reference cycles report their outgoing references to
//! the collector in [`gc`], which finds and breaks unreachable cycles.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use trueno_flow::prelude::*;
//!
//! let mut pipeline = Pipeline::new();
//! let reader = pipeline.add_stage(MyReader::new("field.bin"));
//! let smooth = pipeline.add_stage(MySmoother::default());
//! pipeline.connect(reader, 0, smooth, 0)?;
//!
//! // Stream the first hundred samples.
//! pipeline.update_with(smooth, &UpdateRequest::new().with_extent(Extent::new_1d(0, 100)))?;
//! let data = pipeline.output(smooth, 0).expect("smoothed output");
//! ```
//!
//! ## Feature Flags
//!
//! - `parallel`: Run independent stages of one data pass on rayon workers
//! - `full`: All features enabled

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
// Allow unwrap() in tests only
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Object Model
// ============================================================================

/// Modification timestamps.
pub mod timestamp;

/// Reference-counted objects and observers.
pub mod object;

/// Cycle collector for reference-counted objects.
pub mod gc;

// ============================================================================
// Metadata
// ============================================================================

/// Typed keyed property bags and the standard pipeline keys.
pub mod information;

/// Pass requests and cooperative cancellation.
pub mod request;

/// Structured extents.
pub mod extent;

/// Data objects exchanged between stages.
pub mod data;

// ============================================================================
// Pipeline
// ============================================================================

/// The pipeline stage contract.
pub mod algorithm;

/// Demand-driven executive over an arena of stages.
pub mod executive;

// ============================================================================
// Configuration and Errors
// ============================================================================

/// YAML configuration.
pub mod config;

/// Error types for trueno-flow operations.
pub mod error;

pub use error::{Error, Result};

// ============================================================================
// Prelude
// ============================================================================

/// Commonly used types and traits for convenient imports.
///
/// ```rust
/// use trueno_flow::prelude::*;
/// ```
pub mod prelude {
    pub use crate::algorithm::{ensure_output_object, input_data, output_data, pass_through, Algorithm};
    pub use crate::config::Config;
    pub use crate::data::DataObject;
    pub use crate::error::{Error, Result};
    pub use crate::executive::{Pipeline, StageId, StageState, UpdateRequest};
    pub use crate::extent::Extent;
    pub use crate::gc::{DeferredCollection, GarbageCollector};
    pub use crate::information::{keys, Information, InformationVector, Key};
    pub use crate::object::{Event, Object, Ref};
    pub use crate::request::{AbortHandle, Pass, Request};
}
