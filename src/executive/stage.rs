//! One slot of the stage arena.

use tracing::{debug, trace, warn};

use super::{StageId, StageState};
use crate::algorithm::{ensure_output_object, Algorithm};
use crate::data::DataObject;
use crate::error::{Error, Result};
use crate::information::{keys, Information, InformationVector, KeyId, Value};
use crate::object::Ref;
use crate::request::{AbortHandle, Pass, Request};
use crate::timestamp::TimeStamp;

/// Producer end of one input connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct Link {
    pub(super) producer: StageId,
    pub(super) port: usize,
}

/// Keys that make up a negotiated request.
fn request_keys() -> [KeyId; 4] {
    [
        keys::UPDATE_EXTENT.id(),
        keys::UPDATE_TIME_STEP.id(),
        keys::UPDATE_PIECE_NUMBER.id(),
        keys::UPDATE_NUMBER_OF_PIECES.id(),
    ]
}

/// The request values an output was produced for.
#[derive(Debug, Clone)]
pub(super) struct RequestSnapshot(Vec<Option<Value>>);

impl RequestSnapshot {
    pub(super) fn capture<'a>(infos: impl Iterator<Item = &'a Information>) -> Self {
        let ids = request_keys();
        let mut values = Vec::new();
        for info in infos {
            values.extend(ids.iter().map(|&id| info.value(id).cloned()));
        }
        Self(values)
    }

    pub(super) fn matches(&self, other: &RequestSnapshot) -> bool {
        self.0.len() == other.0.len()
            && self.0.iter().zip(&other.0).all(|(a, b)| match (a, b) {
                (Some(a), Some(b)) => a.same_as(b),
                (None, None) => true,
                _ => false,
            })
    }
}

pub(super) struct Stage {
    pub(super) algorithm: Box<dyn Algorithm>,
    pub(super) name: &'static str,
    /// Port descriptions from `fill_input_port_information`.
    pub(super) input_ports: Vec<Information>,
    /// `links[port][connection]`, parallel to `inputs`.
    pub(super) links: Vec<Vec<Link>>,
    pub(super) inputs: Vec<InformationVector>,
    pub(super) outputs: InformationVector,
    pub(super) state: StageState,
    pub(super) mtime: TimeStamp,
    /// Stamp taken when the outputs were last produced (0 = never).
    pub(super) executed: TimeStamp,
    /// Stamp taken when the outputs last changed. Re-running only to restore
    /// released data for an unchanged request leaves it alone.
    pub(super) content: TimeStamp,
    pub(super) satisfied: Option<RequestSnapshot>,
    /// Request the update-extent handler last ran for.
    pub(super) negotiated: Option<RequestSnapshot>,
    pub(super) release_data: bool,
    counts: [usize; 4],
}

impl Stage {
    pub(super) fn new(algorithm: Box<dyn Algorithm>, release_data: bool) -> Self {
        let name = algorithm.class_name();
        let n_in = algorithm.number_of_input_ports();
        let n_out = algorithm.number_of_output_ports();

        let mut input_ports = vec![Information::new(); n_in];
        for (port, info) in input_ports.iter_mut().enumerate() {
            if let Err(err) = algorithm.fill_input_port_information(port, info) {
                warn!(stage = name, port, error = %err, "fill_input_port_information failed");
            }
        }
        let mut outputs = InformationVector::new(n_out);
        for (port, info) in outputs.iter_mut().enumerate() {
            if let Err(err) = algorithm.fill_output_port_information(port, info) {
                warn!(stage = name, port, error = %err, "fill_output_port_information failed");
            }
        }

        Self {
            algorithm,
            name,
            input_ports,
            links: vec![Vec::new(); n_in],
            inputs: vec![InformationVector::default(); n_in],
            outputs,
            state: StageState::Idle,
            mtime: TimeStamp::modified_now(),
            executed: TimeStamp::new(),
            content: TimeStamp::new(),
            satisfied: None,
            negotiated: None,
            release_data,
            counts: [0; 4],
        }
    }

    pub(super) fn count(&self, pass: Pass) -> usize {
        self.counts[pass_index(pass)]
    }

    pub(super) fn input_is_optional(&self, port: usize) -> bool {
        self.input_ports.get(port).is_some_and(|info| keys::INPUT_IS_OPTIONAL.get(info) != 0)
    }

    pub(super) fn input_is_repeatable(&self, port: usize) -> bool {
        self.input_ports.get(port).is_some_and(|info| keys::INPUT_IS_REPEATABLE.get(info) != 0)
    }

    pub(super) fn output_data(&self, port: usize) -> Option<Ref<DataObject>> {
        self.outputs.get(port).and_then(|info| keys::DATA_OBJECT.get(info))
    }

    pub(super) fn output_released(&self) -> bool {
        (0..self.outputs.len()).any(|port| self.output_data(port).is_some_and(|d| d.data_released()))
    }

    /// Request values of every output port and input connection.
    pub(super) fn snapshot(&self) -> RequestSnapshot {
        RequestSnapshot::capture(self.outputs.iter().chain(self.inputs.iter().flat_map(|v| v.iter())))
    }

    /// True when the cached outputs already answer `incoming` and the
    /// update-extent handler does not need to run again.
    pub(super) fn negotiation_current(&self, incoming: &RequestSnapshot) -> bool {
        self.state == StageState::DataValid
            && self.satisfied.is_some()
            && self.negotiated.as_ref().is_some_and(|n| n.matches(incoming))
    }

    /// Run one pass handler, counting the invocation.
    pub(super) fn invoke(&mut self, id: StageId, pass: Pass, abort: &AbortHandle) -> Result<()> {
        self.counts[pass_index(pass)] += 1;
        trace!(stage = %id, name = self.name, pass = %pass, "stage.invoke");
        let request = Request::with_abort(pass, abort.clone());
        self.algorithm
            .process_request(&request, &mut self.inputs, &mut self.outputs)
            .map_err(|source| Error::PassFailed {
                stage: id,
                name: self.name.to_string(),
                pass,
                source: Box::new(source),
            })
    }

    /// True when every input connection asks for an empty extent.
    fn all_inputs_empty(&self) -> bool {
        let mut any = false;
        for info in self.inputs.iter().flat_map(|v| v.iter()) {
            any = true;
            match keys::UPDATE_EXTENT.get_opt(info) {
                Some(extent) if extent.is_empty() => {}
                _ => return false,
            }
        }
        any
    }

    /// Produce this stage's outputs for the negotiated request. `refresh` is
    /// false when the run only restores released data.
    ///
    /// Touches nothing outside the slot, so stages of one level can run on
    /// separate threads.
    pub(super) fn execute_data(&mut self, id: StageId, abort: &AbortHandle, refresh: bool) -> Result<()> {
        if self.all_inputs_empty() {
            debug!(stage = %id, name = self.name, "data.empty_request");
            for info in self.outputs.iter_mut() {
                ensure_output_object(info).initialize();
            }
        } else {
            self.invoke(id, Pass::Data, abort)?;
        }
        self.executed.modified();
        if refresh {
            self.content.modified();
        }
        self.satisfied = Some(self.snapshot());
        self.state = StageState::DataValid;
        Ok(())
    }

    /// Free every output's arrays.
    pub(super) fn release_outputs(&mut self, id: StageId) {
        for port in 0..self.outputs.len() {
            if let Some(data) = self.output_data(port) {
                data.release_data();
            }
        }
        self.state = StageState::InformationValid;
        debug!(stage = %id, name = self.name, "data.released");
    }
}

fn pass_index(pass: Pass) -> usize {
    match pass {
        Pass::DataObject => 0,
        Pass::Information => 1,
        Pass::UpdateExtent => 2,
        Pass::Data => 3,
    }
}
