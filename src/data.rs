//! Data objects produced on output ports.
//!
//! A [`DataObject`] is a typed container of named `f64` field arrays over an
//! [`Extent`], optionally tagged with a time value. It lives behind a
//! [`Ref`](crate::object::Ref) so that consumers can share a producer's output
//! without copying; all mutation goes through an internal lock.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::extent::Extent;
use crate::information::{keys, Information};
use crate::object::Object;
use crate::timestamp::TimeStamp;

#[derive(Default)]
struct DataState {
    extent: Extent,
    time: Option<f64>,
    arrays: Vec<(String, Arc<[f64]>)>,
    released: bool,
}

/// Output of a pipeline stage.
pub struct DataObject {
    type_name: String,
    state: RwLock<DataState>,
    mtime: TimeStamp,
}

impl DataObject {
    /// Create an empty data object of the given type.
    #[must_use]
    pub fn new(type_name: impl Into<String>) -> Self {
        Self { type_name: type_name.into(), state: RwLock::default(), mtime: TimeStamp::modified_now() }
    }

    /// Type name, matched against input port requirements.
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Stamp of the last change to the contents.
    #[must_use]
    pub fn data_mtime(&self) -> u64 {
        self.mtime.get()
    }

    /// Empty the object: no extent, no arrays, no time.
    pub fn initialize(&self) {
        *self.state.write() = DataState::default();
        self.mtime.modified();
    }

    /// Extent the arrays cover.
    #[must_use]
    pub fn extent(&self) -> Extent {
        self.state.read().extent
    }

    /// Set the covered extent.
    pub fn set_extent(&self, extent: Extent) {
        let mut state = self.state.write();
        state.extent = extent;
        state.released = false;
        drop(state);
        self.mtime.modified();
    }

    /// Time value the data belongs to, if any.
    #[must_use]
    pub fn time(&self) -> Option<f64> {
        self.state.read().time
    }

    /// Tag the data with a time value.
    pub fn set_time(&self, time: Option<f64>) {
        self.state.write().time = time;
        self.mtime.modified();
    }

    /// Store a field array, replacing any array of the same name.
    pub fn set_array(&self, name: impl Into<String>, values: Vec<f64>) {
        let name = name.into();
        let values: Arc<[f64]> = values.into();
        let mut state = self.state.write();
        match state.arrays.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = values,
            None => state.arrays.push((name, values)),
        }
        state.released = false;
        drop(state);
        self.mtime.modified();
    }

    /// Field array by name. The returned slice is shared, not copied.
    #[must_use]
    pub fn array(&self, name: &str) -> Option<Arc<[f64]>> {
        self.state.read().arrays.iter().find(|(n, _)| n == name).map(|(_, a)| Arc::clone(a))
    }

    /// Remove a field array. Returns true if it existed.
    pub fn remove_array(&self, name: &str) -> bool {
        let mut state = self.state.write();
        let before = state.arrays.len();
        state.arrays.retain(|(n, _)| n != name);
        let removed = state.arrays.len() != before;
        drop(state);
        if removed {
            self.mtime.modified();
        }
        removed
    }

    /// Names of all field arrays, in insertion order.
    #[must_use]
    pub fn array_names(&self) -> Vec<String> {
        self.state.read().arrays.iter().map(|(n, _)| n.clone()).collect()
    }

    /// Number of samples covered by the extent.
    #[must_use]
    pub fn number_of_points(&self) -> u64 {
        self.extent().len()
    }

    /// Approximate heap size of the field arrays in bytes.
    #[must_use]
    pub fn memory_size(&self) -> usize {
        self.state.read().arrays.iter().map(|(_, a)| a.len() * std::mem::size_of::<f64>()).sum()
    }

    /// Share `source`'s contents: extent, time and arrays (by reference).
    pub fn shallow_copy(&self, source: &DataObject) {
        if std::ptr::eq(self, source) {
            return;
        }
        let (extent, time, arrays) = {
            let src = source.state.read();
            (src.extent, src.time, src.arrays.clone())
        };
        *self.state.write() = DataState { extent, time, arrays, released: false };
        self.mtime.modified();
    }

    /// Free the arrays while keeping the object itself.
    pub fn release_data(&self) {
        let mut state = self.state.write();
        state.arrays.clear();
        state.extent = Extent::EMPTY;
        state.released = true;
        drop(state);
        self.mtime.modified();
    }

    /// Returns true if [`DataObject::release_data`] ran since the last fill.
    #[must_use]
    pub fn data_released(&self) -> bool {
        self.state.read().released
    }

    /// Describe the contents with the standard data keys.
    #[must_use]
    pub fn information(&self) -> Information {
        let state = self.state.read();
        let mut info = Information::new();
        keys::DATA_TYPE_NAME.set(&mut info, self.type_name.clone());
        keys::DATA_EXTENT.set(&mut info, state.extent);
        if let Some(time) = state.time {
            keys::DATA_TIME_STEP.set(&mut info, time);
        }
        keys::FIELD_NAMES.set(&mut info, state.arrays.iter().map(|(n, _)| n.clone()).collect());
        info
    }
}

impl Object for DataObject {}

impl fmt::Debug for DataObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("DataObject")
            .field("type_name", &self.type_name)
            .field("extent", &state.extent)
            .field("time", &state.time)
            .field("arrays", &state.arrays.iter().map(|(n, _)| n.as_str()).collect::<Vec<_>>())
            .field("released", &state.released)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::Ref;
    use approx::assert_relative_eq;

    fn ramp(n: usize) -> Vec<f64> {
        (0..n).map(|i| i as f64).collect()
    }

    #[test]
    fn test_new_is_empty() {
        let data = DataObject::new("ImageData");
        assert_eq!(data.type_name(), "ImageData");
        assert!(data.extent().is_empty());
        assert!(data.array_names().is_empty());
        assert!(data.time().is_none());
        assert!(!data.data_released());
    }

    #[test]
    fn test_arrays_replace_by_name() {
        let data = DataObject::new("ImageData");
        data.set_extent(Extent::new_1d(0, 4));
        data.set_array("u", ramp(4));
        data.set_array("v", ramp(4));
        data.set_array("u", vec![9.0; 4]);
        assert_eq!(data.array_names(), vec!["u", "v"]);
        assert_relative_eq!(data.array("u").unwrap()[0], 9.0);
        assert_eq!(data.number_of_points(), 4);
        assert_eq!(data.memory_size(), 64);
        assert!(data.remove_array("v"));
        assert!(!data.remove_array("v"));
    }

    #[test]
    fn test_shallow_copy_shares_arrays() {
        let source = DataObject::new("ImageData");
        source.set_extent(Extent::new_1d(0, 3));
        source.set_array("u", ramp(3));
        source.set_time(Some(0.5));

        let target = DataObject::new("ImageData");
        target.shallow_copy(&source);
        assert_eq!(target.extent(), Extent::new_1d(0, 3));
        assert_eq!(target.time(), Some(0.5));
        let a = source.array("u").unwrap();
        let b = target.array("u").unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        target.shallow_copy(&target);
        assert_eq!(target.array_names(), vec!["u"]);
    }

    #[test]
    fn test_release_and_refill() {
        let data = DataObject::new("ImageData");
        data.set_extent(Extent::new_1d(0, 2));
        data.set_array("u", ramp(2));
        data.release_data();
        assert!(data.data_released());
        assert!(data.array_names().is_empty());
        assert!(data.extent().is_empty());

        data.set_extent(Extent::new_1d(0, 2));
        assert!(!data.data_released());
    }

    #[test]
    fn test_mutation_bumps_stamp() {
        let data = DataObject::new("ImageData");
        let before = data.data_mtime();
        data.set_array("u", ramp(1));
        assert!(data.data_mtime() > before);
    }

    #[test]
    fn test_information_describes_contents() {
        let data = DataObject::new("PolyData");
        data.set_extent(Extent::new_1d(2, 5));
        data.set_array("p", ramp(3));
        let info = data.information();
        assert_eq!(keys::DATA_TYPE_NAME.get(&info), "PolyData");
        assert_eq!(keys::DATA_EXTENT.get(&info), Extent::new_1d(2, 5));
        assert_eq!(keys::FIELD_NAMES.get(&info), vec!["p".to_string()]);
        assert!(!keys::DATA_TIME_STEP.has(&info));
    }

    #[test]
    fn test_lives_behind_ref() {
        let data = Ref::new(DataObject::new("ImageData"));
        assert_eq!(data.class_name(), "DataObject");
        data.set_extent(Extent::new_1d(0, 1));
        assert_eq!(data.extent().len(), 1);
    }
}
