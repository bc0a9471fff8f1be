//! The pipeline stage contract.
//!
//! An [`Algorithm`] declares its ports and implements one handler per pass.
//! The executive calls the handlers with the stage's input and output
//! information:
//!
//! - `inputs[port][connection]` is the information of one input connection.
//!   During the information pass it holds a copy of the producer's output
//!   information; during the update-extent pass the stage writes what it needs
//!   into it; during the data pass its [`keys::DATA_OBJECT`] is the
//!   producer's output.
//! - `outputs[port]` is the information of one output port.
//!
//! Handlers return `Ok(())` to continue or an error to decline the pass.

use std::any::Any;

use crate::data::DataObject;
use crate::error::Result;
use crate::information::{keys, Information, InformationVector};
use crate::object::Ref;
use crate::request::{Pass, Request};

/// Type name used when an output port does not declare one.
pub const DEFAULT_DATA_TYPE: &str = "DataObject";

/// Downcasting support for boxed algorithms.
pub trait AsAny {
    /// View as [`Any`].
    fn as_any(&self) -> &dyn Any;
    /// Mutable view as [`Any`].
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A pipeline stage.
///
/// Every method has a default, so a source only needs
/// [`Algorithm::number_of_input_ports`], [`Algorithm::request_information`]
/// and [`Algorithm::request_data`].
pub trait Algorithm: AsAny + Send {
    /// Short name used in logs and errors.
    fn class_name(&self) -> &'static str {
        let full = std::any::type_name::<Self>();
        let base = full.split('<').next().unwrap_or(full);
        base.rsplit("::").next().unwrap_or(base)
    }

    /// Number of input ports.
    fn number_of_input_ports(&self) -> usize {
        1
    }

    /// Number of output ports.
    fn number_of_output_ports(&self) -> usize {
        1
    }

    /// Describe input `port`: [`keys::INPUT_REQUIRED_DATA_TYPE`],
    /// [`keys::INPUT_IS_OPTIONAL`], [`keys::INPUT_IS_REPEATABLE`].
    fn fill_input_port_information(&self, _port: usize, _info: &mut Information) -> Result<()> {
        Ok(())
    }

    /// Describe output `port`: [`keys::DATA_TYPE_NAME`].
    fn fill_output_port_information(&self, _port: usize, info: &mut Information) -> Result<()> {
        keys::DATA_TYPE_NAME.set(info, DEFAULT_DATA_TYPE.to_string());
        Ok(())
    }

    /// Make sure every output port holds a data object of the declared type.
    fn request_data_object(
        &mut self,
        _request: &Request,
        _inputs: &mut [InformationVector],
        outputs: &mut InformationVector,
    ) -> Result<()> {
        for info in outputs.iter_mut() {
            ensure_output_object(info);
        }
        Ok(())
    }

    /// Publish output metadata. The executive has already copied the first
    /// input's whole extent, time steps and field names to every output.
    fn request_information(
        &mut self,
        _request: &Request,
        _inputs: &mut [InformationVector],
        _outputs: &mut InformationVector,
    ) -> Result<()> {
        Ok(())
    }

    /// Declare what each input needs. The executive has already requested the
    /// output's update extent (clipped to each input's whole extent) and
    /// forwarded the time and piece requests.
    fn request_update_extent(
        &mut self,
        _request: &Request,
        _inputs: &mut [InformationVector],
        _outputs: &mut InformationVector,
    ) -> Result<()> {
        Ok(())
    }

    /// Fill the output data objects from the inputs.
    fn request_data(
        &mut self,
        _request: &Request,
        _inputs: &mut [InformationVector],
        _outputs: &mut InformationVector,
    ) -> Result<()> {
        Ok(())
    }

    /// Dispatch `request` to the handler for its pass.
    fn process_request(
        &mut self,
        request: &Request,
        inputs: &mut [InformationVector],
        outputs: &mut InformationVector,
    ) -> Result<()> {
        match request.pass() {
            Pass::DataObject => self.request_data_object(request, inputs, outputs),
            Pass::Information => self.request_information(request, inputs, outputs),
            Pass::UpdateExtent => self.request_update_extent(request, inputs, outputs),
            Pass::Data => self.request_data(request, inputs, outputs),
        }
    }
}

/// Install a data object of the port's declared type if the port has none or
/// holds one of another type.
pub fn ensure_output_object(info: &mut Information) -> Ref<DataObject> {
    let wanted = keys::DATA_TYPE_NAME.get_opt(info).unwrap_or_else(|| DEFAULT_DATA_TYPE.to_string());
    if let Some(existing) = keys::DATA_OBJECT.get(info) {
        if existing.type_name() == wanted {
            return existing;
        }
    }
    let created = Ref::new(DataObject::new(wanted));
    keys::DATA_OBJECT.set(info, Some(created.clone()));
    created
}

/// Data object of one input connection.
#[must_use]
pub fn input_data(inputs: &[InformationVector], port: usize, connection: usize) -> Option<Ref<DataObject>> {
    inputs.get(port)?.get(connection).and_then(|info| keys::DATA_OBJECT.get(info))
}

/// Data object of one output port.
#[must_use]
pub fn output_data(outputs: &InformationVector, port: usize) -> Option<Ref<DataObject>> {
    outputs.get(port).and_then(|info| keys::DATA_OBJECT.get(info))
}

/// Shallow-copy the first input connection's data into every output port.
pub fn pass_through(inputs: &[InformationVector], outputs: &InformationVector) -> Result<()> {
    let Some(input) = input_data(inputs, 0, 0) else {
        return Err(crate::Error::declined(Pass::Data, "no input data to pass through"));
    };
    for port in 0..outputs.len() {
        if let Some(output) = output_data(outputs, port) {
            output.shallow_copy(&input);
        }
    }
    Ok(())
}
