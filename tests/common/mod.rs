//! Stub stages and participants shared by the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use trueno_flow::prelude::*;

/// Source over `[0, size)` producing `x[i] = i + time`.
pub struct RampSource {
    pub size: i64,
    pub time_steps: Vec<f64>,
}

impl RampSource {
    pub fn new(size: i64) -> Self {
        Self { size, time_steps: vec![0.0, 1.0, 2.0] }
    }
}

impl Algorithm for RampSource {
    fn number_of_input_ports(&self) -> usize {
        0
    }

    fn fill_output_port_information(&self, _port: usize, info: &mut Information) -> Result<()> {
        keys::DATA_TYPE_NAME.set(info, "ImageData".to_string());
        Ok(())
    }

    fn request_information(
        &mut self,
        _request: &Request,
        _inputs: &mut [InformationVector],
        outputs: &mut InformationVector,
    ) -> Result<()> {
        let out = &mut outputs[0];
        keys::WHOLE_EXTENT.set(out, Extent::new_1d(0, self.size));
        keys::TIME_STEPS.set(out, self.time_steps.clone());
        if let (Some(first), Some(last)) = (self.time_steps.first(), self.time_steps.last()) {
            keys::TIME_RANGE.set(out, vec![*first, *last]);
        }
        keys::FIELD_NAMES.set(out, vec!["x".to_string()]);
        Ok(())
    }

    fn request_data(
        &mut self,
        _request: &Request,
        _inputs: &mut [InformationVector],
        outputs: &mut InformationVector,
    ) -> Result<()> {
        let extent = keys::UPDATE_EXTENT.get(&outputs[0]);
        let time = keys::UPDATE_TIME_STEP.get_opt(&outputs[0]);
        let data = ensure_output_object(&mut outputs[0]);
        data.set_extent(extent);
        data.set_time(time);
        let offset = time.unwrap_or(0.0);
        data.set_array("x", (extent.min[0]..extent.max[0]).map(|i| i as f64 + offset).collect());
        Ok(())
    }
}

/// Multiplies every array of its input by `factor`.
pub struct Scale {
    pub factor: f64,
}

impl Algorithm for Scale {
    fn fill_input_port_information(&self, _port: usize, info: &mut Information) -> Result<()> {
        keys::INPUT_REQUIRED_DATA_TYPE.set(info, "ImageData".to_string());
        Ok(())
    }

    fn fill_output_port_information(&self, _port: usize, info: &mut Information) -> Result<()> {
        keys::DATA_TYPE_NAME.set(info, "ImageData".to_string());
        Ok(())
    }

    fn request_data(
        &mut self,
        _request: &Request,
        inputs: &mut [InformationVector],
        outputs: &mut InformationVector,
    ) -> Result<()> {
        let input = input_data(inputs, 0, 0).ok_or_else(|| Error::declined(Pass::Data, "no input"))?;
        let output = output_data(outputs, 0).ok_or_else(|| Error::declined(Pass::Data, "no output"))?;
        output.initialize();
        output.set_extent(input.extent());
        output.set_time(input.time());
        for name in input.array_names() {
            if let Some(values) = input.array(&name) {
                output.set_array(name, values.iter().map(|v| v * self.factor).collect());
            }
        }
        Ok(())
    }
}

/// Pass-through filter.
pub struct Identity;

impl Algorithm for Identity {
    fn request_data(
        &mut self,
        _request: &Request,
        inputs: &mut [InformationVector],
        outputs: &mut InformationVector,
    ) -> Result<()> {
        pass_through(inputs, outputs)
    }
}

/// Sink recording what reached it.
#[derive(Default)]
pub struct Recorder {
    pub extents: Vec<Extent>,
    pub values: Vec<f64>,
}

impl Algorithm for Recorder {
    fn number_of_output_ports(&self) -> usize {
        0
    }

    fn fill_input_port_information(&self, _port: usize, info: &mut Information) -> Result<()> {
        keys::INPUT_IS_REPEATABLE.set(info, 1);
        Ok(())
    }

    fn request_data(
        &mut self,
        _request: &Request,
        inputs: &mut [InformationVector],
        _outputs: &mut InformationVector,
    ) -> Result<()> {
        self.values.clear();
        for connection in 0..inputs[0].len() {
            if let Some(data) = input_data(inputs, 0, connection) {
                self.extents.push(data.extent());
                if let Some(x) = data.array("x") {
                    self.values.extend(x.iter().copied());
                }
            }
        }
        Ok(())
    }
}

/// A collection participant holding strong references to peers.
pub struct Node {
    pub edges: Mutex<Vec<Ref<Node>>>,
}

impl Node {
    pub fn new() -> Ref<Node> {
        Ref::new(Node { edges: Mutex::new(Vec::new()) })
    }

    pub fn link(from: &Ref<Node>, to: &Ref<Node>) {
        from.edges.lock().push(to.clone());
    }
}

impl Object for Node {
    fn uses_garbage_collector(&self) -> bool {
        true
    }

    fn report_references(&self, collector: &mut GarbageCollector) {
        for edge in self.edges.lock().iter() {
            collector.report(edge, "Edge");
        }
    }

    fn remove_references(&self) {
        let taken = std::mem::take(&mut *self.edges.lock());
        drop(taken);
    }
}

/// Count delete notifications for `node`.
pub fn watch(node: &Ref<Node>) -> Arc<AtomicUsize> {
    let counter = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&counter);
    node.add_observer(Event::Delete, move |_| {
        seen.fetch_add(1, Ordering::SeqCst);
    });
    counter
}

pub fn deletes(counter: &Arc<AtomicUsize>) -> usize {
    counter.load(Ordering::SeqCst)
}
