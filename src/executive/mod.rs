//! Demand-driven pipeline execution.
//!
//! A [`Pipeline`] owns its stages in an arena and addresses them by
//! [`StageId`]. Connections are index pairs, so topology never forms
//! reference cycles. Updating a stage runs the request protocol over the stage
//! and everything feeding it:
//!
//! 1. data-object and information passes, producers first, for stages whose
//!    metadata is out of date;
//! 2. the update-extent pass, consumers first, negotiating what each producer
//!    must deliver;
//! 3. the data pass, producers first, executing only the stages whose cached
//!    output no longer satisfies the negotiated request.
//!
//! # Example
//!
//! ```
//! use trueno_flow::prelude::*;
//!
//! struct Ramp;
//!
//! impl Algorithm for Ramp {
//!     fn number_of_input_ports(&self) -> usize {
//!         0
//!     }
//!
//!     fn request_information(
//!         &mut self,
//!         _request: &Request,
//!         _inputs: &mut [InformationVector],
//!         outputs: &mut InformationVector,
//!     ) -> Result<()> {
//!         keys::WHOLE_EXTENT.set(&mut outputs[0], Extent::new_1d(0, 100));
//!         Ok(())
//!     }
//!
//!     fn request_data(
//!         &mut self,
//!         _request: &Request,
//!         _inputs: &mut [InformationVector],
//!         outputs: &mut InformationVector,
//!     ) -> Result<()> {
//!         let extent = keys::UPDATE_EXTENT.get(&outputs[0]);
//!         if let Some(data) = output_data(outputs, 0) {
//!             data.set_extent(extent);
//!             data.set_array("x", (extent.min[0]..extent.max[0]).map(|i| i as f64).collect());
//!         }
//!         Ok(())
//!     }
//! }
//!
//! let mut pipeline = Pipeline::new();
//! let ramp = pipeline.add_stage(Ramp);
//! pipeline.update_with(ramp, &UpdateRequest::new().with_extent(Extent::new_1d(0, 10)))?;
//! let data = pipeline.output(ramp, 0).expect("ramp output");
//! assert_eq!(data.extent(), Extent::new_1d(0, 10));
//! # Ok::<(), trueno_flow::Error>(())
//! ```

mod graph;
mod passes;
mod stage;

use std::fmt;

use tracing::{debug, trace};

use crate::algorithm::Algorithm;
use crate::config::Config;
use crate::data::DataObject;
use crate::error::{Error, Result};
use crate::extent::Extent;
use crate::gc::DeferredCollection;
use crate::information::{keys, Information};
use crate::object::Ref;
use crate::request::{AbortHandle, Pass};

use stage::{Link, Stage};

/// Stable index of a stage in its pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StageId(usize);

impl StageId {
    /// Wrap an arena index.
    #[must_use]
    pub const fn from_index(index: usize) -> Self {
        Self(index)
    }

    /// The arena index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Progress of a stage through the request protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StageState {
    /// Metadata must be recomputed before anything else.
    Idle,
    /// Output metadata is current.
    InformationValid,
    /// Requests for the next data pass are negotiated.
    ExtentDetermined,
    /// Output data satisfies the last negotiated request.
    DataValid,
}

impl fmt::Display for StageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StageState::Idle => "idle",
            StageState::InformationValid => "information-valid",
            StageState::ExtentDetermined => "extent-determined",
            StageState::DataValid => "data-valid",
        };
        f.write_str(name)
    }
}

/// What the caller of [`Pipeline::update_with`] asks of the target stage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UpdateRequest {
    /// Requested extent; `None` asks for the whole extent.
    pub extent: Option<Extent>,
    /// Requested time value.
    pub time: Option<f64>,
    /// Requested piece.
    pub piece: i32,
    /// Number of pieces the data is split into.
    pub number_of_pieces: i32,
}

impl Default for UpdateRequest {
    fn default() -> Self {
        Self { extent: None, time: None, piece: 0, number_of_pieces: 1 }
    }
}

impl UpdateRequest {
    /// Ask for everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask for `extent`.
    #[must_use]
    pub fn with_extent(mut self, extent: Extent) -> Self {
        self.extent = Some(extent);
        self
    }

    /// Ask for the data at `time`.
    #[must_use]
    pub fn with_time(mut self, time: f64) -> Self {
        self.time = Some(time);
        self
    }

    /// Ask for piece `piece` of `number_of_pieces`.
    #[must_use]
    pub fn with_piece(mut self, piece: i32, number_of_pieces: i32) -> Self {
        self.piece = piece;
        self.number_of_pieces = number_of_pieces;
        self
    }

    fn to_information(self) -> Information {
        let mut info = Information::new();
        if let Some(extent) = self.extent {
            keys::UPDATE_EXTENT.set(&mut info, extent);
        }
        if let Some(time) = self.time {
            keys::UPDATE_TIME_STEP.set(&mut info, time);
        }
        keys::UPDATE_PIECE_NUMBER.set(&mut info, self.piece);
        keys::UPDATE_NUMBER_OF_PIECES.set(&mut info, self.number_of_pieces);
        info
    }
}

/// An arena of connected stages and the executive that drives them.
pub struct Pipeline {
    stages: Vec<Stage>,
    config: Config,
    abort: AbortHandle,
    #[cfg(feature = "parallel")]
    pool: Option<rayon::ThreadPool>,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Pipeline {
    /// Create an empty pipeline with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Create an empty pipeline.
    ///
    /// The collector section is process-wide and is not applied here; call
    /// [`CollectorConfig::apply`](crate::config::CollectorConfig::apply) for that.
    #[must_use]
    pub fn with_config(config: Config) -> Self {
        #[cfg(feature = "parallel")]
        let pool = build_pool(&config);
        Self {
            stages: Vec::new(),
            config,
            abort: AbortHandle::new(),
            #[cfg(feature = "parallel")]
            pool,
        }
    }

    /// The pipeline's configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Number of stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Returns true if the pipeline has no stages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Add a stage and return its id.
    pub fn add_stage<A: Algorithm + 'static>(&mut self, algorithm: A) -> StageId {
        let id = StageId::from_index(self.stages.len());
        let stage = Stage::new(Box::new(algorithm), self.config.executive.release_data_by_default);
        debug!(stage = %id, name = stage.name, "stage.add");
        self.stages.push(stage);
        id
    }

    fn check(&self, id: StageId) -> Result<()> {
        if id.index() < self.stages.len() {
            Ok(())
        } else {
            Err(Error::UnknownStage(id))
        }
    }

    /// Feed output `out_port` of `producer` into input `in_port` of `consumer`.
    ///
    /// # Errors
    ///
    /// Rejects unknown stages, ports out of range, edges that would close a
    /// cycle, and a second connection on a port that is not repeatable.
    pub fn connect(&mut self, producer: StageId, out_port: usize, consumer: StageId, in_port: usize) -> Result<()> {
        self.check(producer)?;
        self.check(consumer)?;
        if out_port >= self.stages[producer.index()].outputs.len() {
            return Err(Error::PortOutOfRange { stage: producer, direction: "output", port: out_port });
        }
        if in_port >= self.stages[consumer.index()].links.len() {
            return Err(Error::PortOutOfRange { stage: consumer, direction: "input", port: in_port });
        }
        if producer == consumer || self.reaches(consumer, producer) {
            return Err(Error::CycleDetected { producer, consumer });
        }
        let stage = &self.stages[consumer.index()];
        if !stage.links[in_port].is_empty() && !stage.input_is_repeatable(in_port) {
            return Err(Error::InvalidConnection(format!(
                "input port {in_port} of stage {consumer} ({}) already has a connection",
                stage.name
            )));
        }

        let stage = &mut self.stages[consumer.index()];
        stage.links[in_port].push(Link { producer, port: out_port });
        stage.inputs[in_port].push(Information::new());
        debug!(%producer, out_port, %consumer, in_port, "stage.connect");
        self.modified(consumer)
    }

    /// Remove every connection on input `in_port` of `consumer`.
    ///
    /// # Errors
    ///
    /// Rejects unknown stages and ports out of range.
    pub fn disconnect(&mut self, consumer: StageId, in_port: usize) -> Result<()> {
        self.check(consumer)?;
        let stage = &mut self.stages[consumer.index()];
        if in_port >= stage.links.len() {
            return Err(Error::PortOutOfRange { stage: consumer, direction: "input", port: in_port });
        }
        stage.links[in_port].clear();
        stage.inputs[in_port] = Default::default();
        debug!(%consumer, in_port, "stage.disconnect");
        self.modified(consumer)
    }

    /// Borrow a stage's algorithm as its concrete type.
    #[must_use]
    pub fn algorithm<T: Algorithm + 'static>(&self, id: StageId) -> Option<&T> {
        let stage = self.stages.get(id.index())?;
        (*stage.algorithm).as_any().downcast_ref::<T>()
    }

    /// Change a stage's algorithm and mark the stage modified.
    ///
    /// # Errors
    ///
    /// Fails for unknown stages or when the algorithm is not a `T`.
    pub fn modify_algorithm<T, R>(&mut self, id: StageId, f: impl FnOnce(&mut T) -> R) -> Result<R>
    where
        T: Algorithm + 'static,
    {
        self.check(id)?;
        let algorithm = (*self.stages[id.index()].algorithm)
            .as_any_mut()
            .downcast_mut::<T>()
            .ok_or(Error::AlgorithmType { stage: id, expected: std::any::type_name::<T>() })?;
        let out = f(algorithm);
        self.modified(id)?;
        Ok(out)
    }

    /// Mark a stage changed: it and everything downstream must run again.
    ///
    /// # Errors
    ///
    /// Fails for unknown stages.
    pub fn modified(&mut self, id: StageId) -> Result<()> {
        self.check(id)?;
        self.stages[id.index()].mtime.modified();
        self.reset_downstream(id);
        Ok(())
    }

    fn reset_downstream(&mut self, id: StageId) {
        for stage in self.downstream_closure(id) {
            let slot = &mut self.stages[stage.index()];
            if slot.state != StageState::Idle {
                trace!(stage = %stage, name = slot.name, "stage.reset");
            }
            slot.state = StageState::Idle;
        }
    }

    /// Set whether a stage frees its output once all its consumers ran.
    ///
    /// # Errors
    ///
    /// Fails for unknown stages.
    pub fn set_release_data_flag(&mut self, id: StageId, release: bool) -> Result<()> {
        self.check(id)?;
        self.stages[id.index()].release_data = release;
        Ok(())
    }

    /// Current release-data flag of a stage.
    #[must_use]
    pub fn release_data_flag(&self, id: StageId) -> bool {
        self.stages.get(id.index()).is_some_and(|s| s.release_data)
    }

    /// Handle that aborts the running update at the next stage boundary.
    ///
    /// Every update clears the flag when it starts.
    #[must_use]
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    // ========================================================================
    // Updates
    // ========================================================================

    /// Bring `id` up to date for its whole extent.
    ///
    /// # Errors
    ///
    /// Returns the first pass failure, an abort, or a topology error.
    pub fn update(&mut self, id: StageId) -> Result<()> {
        self.update_with(id, &UpdateRequest::default())
    }

    /// Bring `id` up to date for `request`.
    ///
    /// Stages that finished before a failure keep their results; the failing
    /// stage and everything downstream of it go back to [`StageState::Idle`].
    ///
    /// # Errors
    ///
    /// Returns the first pass failure, an abort, or a topology error.
    pub fn update_with(&mut self, id: StageId, request: &UpdateRequest) -> Result<()> {
        self.check(id)?;
        let _scope = self.config.executive.defer_collection.then(DeferredCollection::new);
        self.abort.reset();
        let plan = self.plan(id)?;
        debug!(target_stage = %id, stages = plan.order.len(), "update.start");

        let result = self
            .run_information(&plan)
            .and_then(|()| self.run_update_extent(&plan, request))
            .and_then(|()| self.run_data(&plan));
        if let Err(err) = &result {
            self.unwind(&plan, err);
            debug!(target_stage = %id, error = %err, "update.failed");
        }
        result
    }

    /// Run only the data-object and information passes for `id`.
    ///
    /// # Errors
    ///
    /// Returns the first pass failure, an abort, or a topology error.
    pub fn update_information(&mut self, id: StageId) -> Result<()> {
        self.check(id)?;
        let _scope = self.config.executive.defer_collection.then(DeferredCollection::new);
        self.abort.reset();
        let plan = self.plan(id)?;
        let result = self.run_information(&plan);
        if let Err(err) = &result {
            self.unwind(&plan, err);
        }
        result
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Protocol state of a stage.
    #[must_use]
    pub fn state(&self, id: StageId) -> Option<StageState> {
        self.stages.get(id.index()).map(|s| s.state)
    }

    /// Data object on an output port.
    #[must_use]
    pub fn output(&self, id: StageId, port: usize) -> Option<Ref<DataObject>> {
        self.stages.get(id.index())?.output_data(port)
    }

    /// Information of an output port.
    #[must_use]
    pub fn output_information(&self, id: StageId, port: usize) -> Option<&Information> {
        self.stages.get(id.index())?.outputs.get(port)
    }

    /// Information of one input connection.
    #[must_use]
    pub fn input_information(&self, id: StageId, port: usize, connection: usize) -> Option<&Information> {
        self.stages.get(id.index())?.inputs.get(port)?.get(connection)
    }

    /// How many times a stage's handler for `pass` has been called.
    #[must_use]
    pub fn execution_count(&self, id: StageId, pass: Pass) -> usize {
        self.stages.get(id.index()).map_or(0, |s| s.count(pass))
    }

    /// Class name of a stage's algorithm.
    #[must_use]
    pub fn name(&self, id: StageId) -> Option<&'static str> {
        self.stages.get(id.index()).map(|s| s.name)
    }

    /// Producers feeding input `port` of `id`, as `(stage, output port)`.
    #[must_use]
    pub fn producers(&self, id: StageId, port: usize) -> Vec<(StageId, usize)> {
        self.stages
            .get(id.index())
            .and_then(|s| s.links.get(port))
            .map(|links| links.iter().map(|l| (l.producer, l.port)).collect())
            .unwrap_or_default()
    }

    /// Stages consuming any output of `id`.
    #[must_use]
    pub fn consumers(&self, id: StageId) -> Vec<StageId> {
        if self.check(id).is_err() {
            return Vec::new();
        }
        self.direct_consumers(id)
    }

    /// Every stage id, in insertion order.
    pub fn stage_ids(&self) -> impl Iterator<Item = StageId> + '_ {
        (0..self.stages.len()).map(StageId::from_index)
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut list = f.debug_list();
        for (i, stage) in self.stages.iter().enumerate() {
            list.entry(&format_args!("{} {} ({})", StageId::from_index(i), stage.name, stage.state));
        }
        list.finish()
    }
}

#[cfg(feature = "parallel")]
fn build_pool(config: &Config) -> Option<rayon::ThreadPool> {
    let threads = config.executive.worker_threads;
    if !config.executive.parallel || threads == 0 {
        return None;
    }
    match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
        Ok(pool) => Some(pool),
        Err(err) => {
            tracing::warn!(threads, error = %err, "worker pool unavailable, using the global pool");
            None
        }
    }
}
