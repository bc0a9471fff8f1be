//! Pipeline Scenario Tests
//!
//! End-to-end runs of the request protocol over small graphs of stub stages.
//! Each test names the behavior it pins down. Data objects take part in the
//! process-wide collector, so every test runs serially.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use approx::assert_relative_eq;
use common::{Identity, RampSource, Recorder, Scale};
use serial_test::serial;
use trueno_flow::prelude::*;

/// Source, doubling filter and recording sink wired in a chain.
fn chain(size: i64) -> (Pipeline, StageId, StageId, StageId) {
    let mut pipeline = Pipeline::new();
    let a = pipeline.add_stage(RampSource::new(size));
    let b = pipeline.add_stage(Scale { factor: 2.0 });
    let c = pipeline.add_stage(Recorder::default());
    pipeline.connect(a, 0, b, 0).unwrap();
    pipeline.connect(b, 0, c, 0).unwrap();
    (pipeline, a, b, c)
}

fn data_runs(pipeline: &Pipeline, ids: &[StageId]) -> Vec<usize> {
    ids.iter().map(|&id| pipeline.execution_count(id, Pass::Data)).collect()
}

fn extent_runs(pipeline: &Pipeline, ids: &[StageId]) -> Vec<usize> {
    ids.iter().map(|&id| pipeline.execution_count(id, Pass::UpdateExtent)).collect()
}

fn recorded(pipeline: &Pipeline, sink: StageId) -> Vec<f64> {
    pipeline.algorithm::<Recorder>(sink).unwrap().values.clone()
}

// ============================================================================
// SECTION 1: Request Negotiation
// ============================================================================

/// A sink asking for `[0, 10)` receives exactly that window, transformed.
#[test]
#[serial]
fn sink_receives_requested_window() {
    let (mut pipeline, a, b, c) = chain(100);
    pipeline.update_with(c, &UpdateRequest::new().with_extent(Extent::new_1d(0, 10))).unwrap();

    let values = recorded(&pipeline, c);
    assert_eq!(values.len(), 10);
    for (i, v) in values.iter().enumerate() {
        assert_relative_eq!(*v, 2.0 * i as f64);
    }
    assert_eq!(pipeline.output(a, 0).unwrap().extent(), Extent::new_1d(0, 10));
    assert_eq!(data_runs(&pipeline, &[a, b, c]), vec![1, 1, 1]);
    assert_eq!(pipeline.state(b), Some(StageState::DataValid));
}

/// A request reaching past the whole extent is clipped at the source.
#[test]
#[serial]
fn oversized_request_is_clipped() {
    let (mut pipeline, a, _b, c) = chain(20);
    pipeline.update_with(c, &UpdateRequest::new().with_extent(Extent::new_1d(10, 50))).unwrap();

    assert_eq!(pipeline.output(a, 0).unwrap().extent(), Extent::new_1d(10, 20));
    assert_eq!(recorded(&pipeline, c).len(), 10);
}

/// Without an explicit extent, the whole extent flows through.
#[test]
#[serial]
fn default_update_delivers_whole_extent() {
    let (mut pipeline, _a, _b, c) = chain(32);
    pipeline.update(c).unwrap();
    assert_eq!(recorded(&pipeline, c).len(), 32);
}

/// Metadata published by the source reaches every downstream port.
#[test]
#[serial]
fn information_flows_downstream() {
    let (mut pipeline, _a, b, c) = chain(64);
    pipeline.update_information(c).unwrap();

    let info = pipeline.output_information(b, 0).unwrap();
    assert_eq!(keys::WHOLE_EXTENT.get(info), Extent::new_1d(0, 64));
    assert_eq!(keys::TIME_STEPS.get(info), vec![0.0, 1.0, 2.0]);
    assert_eq!(keys::FIELD_NAMES.get(info), vec!["x".to_string()]);
    assert_eq!(pipeline.execution_count(c, Pass::Data), 0);
    assert_eq!(pipeline.state(c), Some(StageState::InformationValid));
}

/// A requested time step travels upstream and selects the source data.
#[test]
#[serial]
fn time_request_selects_time_step() {
    let (mut pipeline, a, _b, c) = chain(4);
    pipeline.update_with(c, &UpdateRequest::new().with_time(2.0)).unwrap();

    assert_eq!(pipeline.output(a, 0).unwrap().time(), Some(2.0));
    assert_eq!(recorded(&pipeline, c), vec![4.0, 6.0, 8.0, 10.0]);
}

// ============================================================================
// SECTION 2: Caching and Staleness
// ============================================================================

/// Repeating an identical request executes nothing.
#[test]
#[serial]
fn identical_request_is_cached() {
    let (mut pipeline, a, b, c) = chain(100);
    let request = UpdateRequest::new().with_extent(Extent::new_1d(0, 10));
    pipeline.update_with(c, &request).unwrap();
    pipeline.update_with(c, &request).unwrap();

    assert_eq!(data_runs(&pipeline, &[a, b, c]), vec![1, 1, 1]);
}

/// Repeating an identical request does not renegotiate extents either.
#[test]
#[serial]
fn identical_request_skips_update_extent() {
    let mut pipeline = Pipeline::new();
    let a = pipeline.add_stage(RampSource::new(100));
    let b = pipeline.add_stage(Identity);
    let c = pipeline.add_stage(Recorder::default());
    pipeline.connect(a, 0, b, 0).unwrap();
    pipeline.connect(b, 0, c, 0).unwrap();
    let request = UpdateRequest::new().with_extent(Extent::new_1d(0, 10));

    pipeline.update_with(c, &request).unwrap();
    assert_eq!(extent_runs(&pipeline, &[a, b, c]), vec![1, 1, 1]);
    pipeline.update_with(c, &request).unwrap();
    assert_eq!(extent_runs(&pipeline, &[a, b, c]), vec![1, 1, 1]);
    assert_eq!(recorded(&pipeline, c).len(), 10);

    pipeline.update_with(c, &UpdateRequest::new().with_extent(Extent::new_1d(0, 5))).unwrap();
    assert_eq!(extent_runs(&pipeline, &[a, b, c]), vec![2, 2, 2]);
    assert_eq!(recorded(&pipeline, c).len(), 5);
}

/// A different window re-executes every stage on the path.
#[test]
#[serial]
fn new_window_re_executes_chain() {
    let (mut pipeline, a, b, c) = chain(100);
    pipeline.update_with(c, &UpdateRequest::new().with_extent(Extent::new_1d(0, 10))).unwrap();
    pipeline.update_with(c, &UpdateRequest::new().with_extent(Extent::new_1d(0, 5))).unwrap();

    assert_eq!(data_runs(&pipeline, &[a, b, c]), vec![2, 2, 2]);
    assert_eq!(recorded(&pipeline, c).len(), 5);
}

/// Changing a filter re-executes it and its consumers, never its producer.
#[test]
#[serial]
fn modified_filter_re_executes_downstream_only() {
    let (mut pipeline, a, b, c) = chain(8);
    pipeline.update(c).unwrap();
    pipeline.modify_algorithm::<Scale, _>(b, |scale| scale.factor = 3.0).unwrap();
    assert_eq!(pipeline.state(c), Some(StageState::Idle));

    pipeline.update(c).unwrap();
    assert_eq!(data_runs(&pipeline, &[a, b, c]), vec![1, 2, 2]);
    assert_relative_eq!(recorded(&pipeline, c)[7], 21.0);
}

/// Modifying the source invalidates everything after it.
#[test]
#[serial]
fn modified_source_re_executes_everything() {
    let (mut pipeline, a, b, c) = chain(8);
    pipeline.update(c).unwrap();
    pipeline.modified(a).unwrap();
    pipeline.update(c).unwrap();
    assert_eq!(data_runs(&pipeline, &[a, b, c]), vec![2, 2, 2]);
}

// ============================================================================
// SECTION 3: Topology
// ============================================================================

/// One source feeding two branches executes once per shared request.
#[test]
#[serial]
fn shared_producer_runs_once() {
    let mut pipeline = Pipeline::new();
    let source = pipeline.add_stage(RampSource::new(10));
    let left = pipeline.add_stage(Identity);
    let right = pipeline.add_stage(Scale { factor: -1.0 });
    let sink = pipeline.add_stage(Recorder::default());
    pipeline.connect(source, 0, left, 0).unwrap();
    pipeline.connect(source, 0, right, 0).unwrap();
    pipeline.connect(left, 0, sink, 0).unwrap();
    pipeline.connect(right, 0, sink, 0).unwrap();

    pipeline.update(sink).unwrap();

    assert_eq!(pipeline.execution_count(source, Pass::Data), 1);
    let values = recorded(&pipeline, sink);
    assert_eq!(values.len(), 20);
    assert_relative_eq!(values.iter().sum::<f64>(), 0.0);
    assert_eq!(pipeline.consumers(source), vec![left, right]);
    assert_eq!(pipeline.producers(sink, 0), vec![(left, 0), (right, 0)]);
}

/// Updating one branch leaves an unrelated branch untouched.
#[test]
#[serial]
fn sibling_branch_is_not_executed() {
    let mut pipeline = Pipeline::new();
    let source = pipeline.add_stage(RampSource::new(10));
    let used = pipeline.add_stage(Identity);
    let unused = pipeline.add_stage(Identity);
    pipeline.connect(source, 0, used, 0).unwrap();
    pipeline.connect(source, 0, unused, 0).unwrap();

    pipeline.update(used).unwrap();
    assert_eq!(pipeline.execution_count(unused, Pass::Data), 0);
    assert_eq!(pipeline.state(unused), Some(StageState::Idle));
}

/// Connecting a stage to itself through a loop is refused.
#[test]
#[serial]
fn feedback_loop_is_rejected() {
    let mut pipeline = Pipeline::new();
    let a = pipeline.add_stage(Identity);
    let b = pipeline.add_stage(Identity);
    pipeline.connect(a, 0, b, 0).unwrap();
    assert!(pipeline.connect(b, 0, a, 0).is_err());
}

// ============================================================================
// SECTION 4: Releasing Data
// ============================================================================

/// A releasing producer frees its output after the consumer ran, and is not
/// re-executed while the consumer stays cached.
#[test]
#[serial]
fn released_producer_reruns_only_on_demand() {
    let (mut pipeline, a, b, c) = chain(16);
    pipeline.set_release_data_flag(a, true).unwrap();
    let request = UpdateRequest::new().with_extent(Extent::new_1d(0, 8));

    pipeline.update_with(c, &request).unwrap();
    assert!(pipeline.output(a, 0).unwrap().data_released());
    assert_eq!(recorded(&pipeline, c).len(), 8);

    pipeline.update_with(c, &request).unwrap();
    assert_eq!(data_runs(&pipeline, &[a, b, c]), vec![1, 1, 1]);

    pipeline.update_with(c, &UpdateRequest::new().with_extent(Extent::new_1d(4, 12))).unwrap();
    assert_eq!(data_runs(&pipeline, &[a, b, c]), vec![2, 2, 2]);
    assert_relative_eq!(recorded(&pipeline, c)[0], 8.0);
}

/// Restoring a released shared producer for one branch leaves the other
/// branch cached, and a repeated update afterwards runs nothing.
#[test]
#[serial]
fn restored_producer_keeps_sibling_branch_cached() {
    let mut pipeline = Pipeline::new();
    let source = pipeline.add_stage(RampSource::new(10));
    let left = pipeline.add_stage(Identity);
    let right = pipeline.add_stage(Identity);
    let sink = pipeline.add_stage(Recorder::default());
    pipeline.connect(source, 0, left, 0).unwrap();
    pipeline.connect(source, 0, right, 0).unwrap();
    pipeline.connect(left, 0, sink, 0).unwrap();
    pipeline.connect(right, 0, sink, 0).unwrap();
    pipeline.set_release_data_flag(source, true).unwrap();

    pipeline.update(sink).unwrap();
    assert!(pipeline.output(source, 0).unwrap().data_released());

    pipeline.modified(left).unwrap();
    pipeline.update(sink).unwrap();
    assert_eq!(data_runs(&pipeline, &[source, left, right, sink]), vec![2, 2, 1, 2]);
    assert_eq!(recorded(&pipeline, sink).len(), 20);

    pipeline.update(sink).unwrap();
    assert_eq!(data_runs(&pipeline, &[source, left, right, sink]), vec![2, 2, 1, 2]);
}
