//! Standard keys shared by the executive and pipeline stages.
//!
//! Output port information carries what a producer offers (`WHOLE_EXTENT`,
//! `TIME_STEPS`, ...); input connection information carries what a consumer
//! asks for (`UPDATE_EXTENT`, `UPDATE_TIME_STEP`, ...); data object
//! information records what was actually produced (`DATA_EXTENT`,
//! `DATA_TIME_STEP`).

use super::Key;
use crate::data::DataObject;
use crate::extent::Extent;
use crate::object::Ref;
use crate::request::Pass;

/// The data object produced on an output port.
pub static DATA_OBJECT: Key<Option<Ref<DataObject>>> = Key::new("DATA_OBJECT", "DataObject");

/// Type name of the data object an output port produces.
pub static DATA_TYPE_NAME: Key<String> = Key::new("DATA_TYPE_NAME", "DataObject");

/// Extent actually held by a data object.
pub static DATA_EXTENT: Key<Extent> = Key::new("DATA_EXTENT", "DataObject");

/// Time value actually held by a data object.
pub static DATA_TIME_STEP: Key<f64> = Key::new("DATA_TIME_STEP", "DataObject");

/// Type name an input port accepts. Absent means any type.
pub static INPUT_REQUIRED_DATA_TYPE: Key<String> = Key::new("INPUT_REQUIRED_DATA_TYPE", "Algorithm");

/// Non-zero if an input port may be left unconnected.
pub static INPUT_IS_OPTIONAL: Key<i32> = Key::new("INPUT_IS_OPTIONAL", "Algorithm");

/// Non-zero if an input port accepts more than one connection.
pub static INPUT_IS_REPEATABLE: Key<i32> = Key::new("INPUT_IS_REPEATABLE", "Algorithm");

/// Largest extent a producer can provide.
pub static WHOLE_EXTENT: Key<Extent> = Key::new("WHOLE_EXTENT", "StreamingPipeline");

/// Extent a consumer requests.
pub static UPDATE_EXTENT: Key<Extent> = Key::new("UPDATE_EXTENT", "StreamingPipeline");

/// Discrete time values a producer can provide.
pub static TIME_STEPS: Key<Vec<f64>> = Key::new("TIME_STEPS", "StreamingPipeline");

/// `[min, max]` of the time values a producer can provide.
pub static TIME_RANGE: Key<Vec<f64>> = Key::new("TIME_RANGE", "StreamingPipeline");

/// Time value a consumer requests.
pub static UPDATE_TIME_STEP: Key<f64> = Key::new("UPDATE_TIME_STEP", "StreamingPipeline");

/// Piece a consumer requests.
pub static UPDATE_PIECE_NUMBER: Key<i32> = Key::new("UPDATE_PIECE_NUMBER", "StreamingPipeline");

/// Number of pieces the consumer splits the data into.
pub static UPDATE_NUMBER_OF_PIECES: Key<i32> = Key::new("UPDATE_NUMBER_OF_PIECES", "StreamingPipeline");

/// Names of the field arrays a producer will populate.
pub static FIELD_NAMES: Key<Vec<String>> = Key::new("FIELD_NAMES", "DataObject");

/// Pass a request belongs to.
pub static REQUEST: Key<Pass> = Key::new("REQUEST", "Executive");

/// Output port a request is addressed to.
pub static FROM_OUTPUT_PORT: Key<i32> = Key::new("FROM_OUTPUT_PORT", "Executive");
