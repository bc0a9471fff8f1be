//! The request protocol: data-object, information, update-extent and data
//! passes over one [`Plan`].

use tracing::{debug, trace};

use super::graph::Plan;
use super::stage::RequestSnapshot;
use super::{Pipeline, StageId, StageState, UpdateRequest};
use crate::error::{Error, Result};
use crate::extent::Extent;
use crate::information::{keys, Information};
use crate::request::Pass;

impl Pipeline {
    pub(super) fn check_abort(&self, id: StageId) -> Result<()> {
        if self.abort.is_requested() {
            return Err(Error::Aborted { stage: id });
        }
        Ok(())
    }

    /// Run a handler; on failure the stage and everything downstream of it
    /// fall back to `Idle`.
    fn invoke(&mut self, id: StageId, pass: Pass) -> Result<()> {
        let abort = self.abort.clone();
        let result = self.stages[id.index()].invoke(id, pass, &abort);
        if result.is_err() {
            self.invalidate(id);
        }
        result
    }

    /// Mark `id` and its downstream `Idle` and forget what `id` produced.
    fn invalidate(&mut self, id: StageId) {
        self.stages[id.index()].satisfied = None;
        self.stages[id.index()].negotiated = None;
        self.reset_downstream(id);
    }

    /// Leave stages that finished this update alone; everything in flight
    /// goes back to `Idle`.
    pub(super) fn unwind(&mut self, plan: &Plan, error: &Error) {
        if !error.is_aborted() {
            return;
        }
        for &id in &plan.order {
            let stage = &mut self.stages[id.index()];
            if stage.state != StageState::DataValid {
                stage.state = StageState::Idle;
            }
        }
        debug!(target_stage = %plan.target, "update.aborted");
    }

    // ========================================================================
    // Data-object and information passes (upstream first)
    // ========================================================================

    pub(super) fn run_information(&mut self, plan: &Plan) -> Result<()> {
        for &id in &plan.order {
            if self.stages[id.index()].state != StageState::Idle {
                continue;
            }
            self.check_abort(id)?;
            self.pull_information(id)?;
            self.invoke(id, Pass::DataObject)?;
            self.copy_information_defaults(id);
            self.invoke(id, Pass::Information)?;
            self.stages[id.index()].state = StageState::InformationValid;
        }
        Ok(())
    }

    /// Refresh every input connection with the producer's output information.
    fn pull_information(&mut self, id: StageId) -> Result<()> {
        let links = self.stages[id.index()].links.clone();
        for (port, port_links) in links.iter().enumerate() {
            let required = keys::INPUT_REQUIRED_DATA_TYPE.get_opt(&self.stages[id.index()].input_ports[port]);
            for (connection, link) in port_links.iter().enumerate() {
                let offered = self.stages[link.producer.index()].outputs[link.port].clone();
                if let Some(expected) = &required {
                    let actual = keys::DATA_TYPE_NAME.get(&offered);
                    if &actual != expected {
                        self.invalidate(id);
                        return Err(Error::InputTypeMismatch {
                            stage: id,
                            port,
                            expected: expected.clone(),
                            actual,
                        });
                    }
                }
                self.stages[id.index()].inputs[port][connection] = offered;
            }
        }
        Ok(())
    }

    /// Forward the first input's metadata to every output.
    fn copy_information_defaults(&mut self, id: StageId) {
        let stage = &mut self.stages[id.index()];
        let Some(first) = stage.inputs.first().and_then(|v| v.get(0)).cloned() else {
            return;
        };
        for output in stage.outputs.iter_mut() {
            keys::WHOLE_EXTENT.shallow_copy(&first, output);
            keys::TIME_STEPS.shallow_copy(&first, output);
            keys::TIME_RANGE.shallow_copy(&first, output);
            keys::FIELD_NAMES.shallow_copy(&first, output);
        }
    }

    // ========================================================================
    // Update-extent pass (downstream first)
    // ========================================================================

    pub(super) fn run_update_extent(&mut self, plan: &Plan, request: &UpdateRequest) -> Result<()> {
        let target_request = request.to_information();
        for &id in plan.order.iter().rev() {
            self.check_abort(id)?;
            if id == plan.target {
                self.apply_target_request(id, request);
            } else {
                self.merge_consumer_requests(plan, id);
            }

            let stage = &self.stages[id.index()];
            let incoming = if stage.outputs.is_empty() {
                RequestSnapshot::capture(std::iter::once(&target_request))
            } else {
                RequestSnapshot::capture(stage.outputs.iter())
            };
            if stage.negotiation_current(&incoming) {
                // Inputs still hold what the handler asked for last time.
                trace!(stage = %id, name = stage.name, "update_extent.cached");
                continue;
            }

            if id == plan.target {
                self.copy_update_defaults(id, &target_request);
            } else {
                let source = self.stages[id.index()].outputs.get(0).cloned().unwrap_or_default();
                self.copy_update_defaults(id, &source);
            }
            self.invoke(id, Pass::UpdateExtent)?;
            let stage = &mut self.stages[id.index()];
            stage.negotiated = Some(incoming);
            stage.state = StageState::ExtentDetermined;
        }
        Ok(())
    }

    /// Write the caller's request into every output of the target stage.
    fn apply_target_request(&mut self, id: StageId, request: &UpdateRequest) {
        for output in self.stages[id.index()].outputs.iter_mut() {
            match request.extent.or_else(|| keys::WHOLE_EXTENT.get_opt(output)) {
                Some(extent) => keys::UPDATE_EXTENT.set(output, extent),
                None => keys::UPDATE_EXTENT.remove(output),
            };
            match request.time {
                Some(time) => keys::UPDATE_TIME_STEP.set(output, time),
                None => keys::UPDATE_TIME_STEP.remove(output),
            };
            keys::UPDATE_PIECE_NUMBER.set(output, request.piece);
            keys::UPDATE_NUMBER_OF_PIECES.set(output, request.number_of_pieces);
        }
    }

    /// Combine what the plan's consumers asked of each output: extents by
    /// union, time and piece from the first consumer.
    fn merge_consumer_requests(&mut self, plan: &Plan, id: StageId) {
        let n_outputs = self.stages[id.index()].outputs.len();
        for port in 0..n_outputs {
            let mut merged = Information::new();
            let mut extent: Option<Extent> = None;
            for (i, consumer) in plan.consumers(id, port).iter().enumerate() {
                let asked = &self.stages[consumer.stage.index()].inputs[consumer.port][consumer.connection];
                if let Some(e) = keys::UPDATE_EXTENT.get_opt(asked) {
                    extent = Some(extent.map_or(e, |acc| acc.union(&e)));
                }
                if i == 0 {
                    merged.copy_from(asked);
                }
            }

            let output = &mut self.stages[id.index()].outputs[port];
            match extent {
                Some(e) => keys::UPDATE_EXTENT.set(output, e),
                None => keys::UPDATE_EXTENT.remove(output),
            };
            keys::UPDATE_TIME_STEP.shallow_copy(&merged, output);
            keys::UPDATE_PIECE_NUMBER.shallow_copy(&merged, output);
            keys::UPDATE_NUMBER_OF_PIECES.shallow_copy(&merged, output);
        }
    }

    /// Ask every input for `source`'s extent clipped to what the input offers,
    /// and forward time and piece.
    fn copy_update_defaults(&mut self, id: StageId, source: &Information) {
        let wanted = keys::UPDATE_EXTENT.get_opt(source);
        let stage = &mut self.stages[id.index()];
        for connection in stage.inputs.iter_mut().flat_map(|v| v.iter_mut()) {
            let whole = keys::WHOLE_EXTENT.get_opt(connection);
            let extent = match (wanted, whole) {
                (Some(w), Some(whole)) => Some(w.intersection(&whole)),
                (Some(w), None) => Some(w),
                (None, whole) => whole,
            };
            match extent {
                Some(e) => keys::UPDATE_EXTENT.set(connection, e),
                None => keys::UPDATE_EXTENT.remove(connection),
            };
            keys::UPDATE_TIME_STEP.shallow_copy(source, connection);
            keys::UPDATE_PIECE_NUMBER.shallow_copy(source, connection);
            keys::UPDATE_NUMBER_OF_PIECES.shallow_copy(source, connection);
        }
    }

    // ========================================================================
    // Data pass (upstream first)
    // ========================================================================

    /// Decide, per plan position, whether the stage has to execute.
    ///
    /// A stage is stale when it never ran, was modified since, was negotiated a
    /// different request, or depends on a stale producer or on producer output
    /// that changed after it ran. A stale stage runs; a released one runs only
    /// when something consuming it runs. Returns `(run, stale)`.
    fn execution_plan(&self, plan: &Plan) -> (Vec<bool>, Vec<bool>) {
        let mut stale = vec![false; plan.order.len()];
        for (pos, &id) in plan.order.iter().enumerate() {
            let stage = &self.stages[id.index()];
            let executed = stage.executed.get();
            let mut is_stale = stage.mtime.get() > executed
                || stage.satisfied.as_ref().map_or(true, |s| !s.matches(&stage.snapshot()));
            for link in stage.links.iter().flatten() {
                let producer_stale = plan.position(link.producer).is_some_and(|p| stale[p]);
                if producer_stale || self.stages[link.producer.index()].content.get() > executed {
                    is_stale = true;
                }
            }
            stale[pos] = is_stale;
        }

        let mut run = stale.clone();
        for pos in (0..plan.order.len()).rev() {
            let id = plan.order[pos];
            if run[pos] || !self.stages[id.index()].output_released() {
                continue;
            }
            let needed = id == plan.target
                || (0..self.stages[id.index()].outputs.len()).any(|port| {
                    plan.consumers(id, port).iter().any(|c| plan.position(c.stage).is_some_and(|p| run[p]))
                });
            run[pos] = needed;
        }
        (run, stale)
    }

    /// Point every input connection of `id` at its producer's data object.
    fn wire_inputs(&mut self, id: StageId) {
        let links = self.stages[id.index()].links.clone();
        for (port, port_links) in links.iter().enumerate() {
            for (connection, link) in port_links.iter().enumerate() {
                let data = self.stages[link.producer.index()].output_data(link.port);
                keys::DATA_OBJECT.set(&mut self.stages[id.index()].inputs[port][connection], data);
            }
        }
    }

    /// Release producers whose last consumer in the plan sits at `pos`.
    fn release_consumed(&mut self, plan: &Plan, pos: usize) {
        for &producer in &plan.order[..pos] {
            if self.stages[producer.index()].release_data && plan.last_consumer(producer) == Some(pos) {
                self.stages[producer.index()].release_outputs(producer);
            }
        }
    }

    pub(super) fn run_data(&mut self, plan: &Plan) -> Result<()> {
        let (run, stale) = self.execution_plan(plan);
        for (pos, &id) in plan.order.iter().enumerate() {
            if run[pos] {
                self.stages[id.index()].state = StageState::ExtentDetermined;
            }
        }

        #[cfg(feature = "parallel")]
        if self.config.executive.parallel {
            return self.run_data_levels(plan, &run, &stale);
        }

        for (pos, &id) in plan.order.iter().enumerate() {
            self.check_abort(id)?;
            if run[pos] {
                self.wire_inputs(id);
                let abort = self.abort.clone();
                if let Err(err) = self.stages[id.index()].execute_data(id, &abort, stale[pos]) {
                    self.invalidate(id);
                    return Err(err);
                }
            } else {
                trace!(stage = %id, name = self.stages[id.index()].name, "data.cached");
                self.stages[id.index()].state = StageState::DataValid;
            }
            self.release_consumed(plan, pos);
        }
        Ok(())
    }

    /// Data pass with each topological level dispatched on the worker pool.
    #[cfg(feature = "parallel")]
    fn run_data_levels(&mut self, plan: &Plan, run: &[bool], stale: &[bool]) -> Result<()> {
        use rayon::prelude::*;

        for level in plan.levels(self) {
            for &pos in &level {
                self.check_abort(plan.order[pos])?;
            }
            let mut running = vec![false; self.stages.len()];
            let mut refresh = vec![false; self.stages.len()];
            for &pos in &level {
                let id = plan.order[pos];
                if run[pos] {
                    self.wire_inputs(id);
                    running[id.index()] = true;
                    refresh[id.index()] = stale[pos];
                } else {
                    trace!(stage = %id, name = self.stages[id.index()].name, "data.cached");
                    self.stages[id.index()].state = StageState::DataValid;
                }
            }

            let abort = self.abort.clone();
            let pool = self.pool.as_ref();
            let slots: Vec<_> = self
                .stages
                .iter_mut()
                .enumerate()
                .filter(|(i, _)| running[*i])
                .map(|(i, stage)| (StageId::from_index(i), refresh[i], stage))
                .collect();
            trace!(stages = slots.len(), "data.level");
            let work = move || {
                slots
                    .into_par_iter()
                    .map(|(id, refresh, stage)| (id, stage.execute_data(id, &abort, refresh)))
                    .collect::<Vec<_>>()
            };
            let results = match pool {
                Some(pool) => pool.install(work),
                None => work(),
            };

            let mut first_error = None;
            for (id, result) in results {
                if let Err(err) = result {
                    self.invalidate(id);
                    first_error.get_or_insert(err);
                }
            }
            if let Some(err) = first_error {
                return Err(err);
            }
            for &pos in &level {
                self.release_consumed(plan, pos);
            }
        }
        Ok(())
    }
}
