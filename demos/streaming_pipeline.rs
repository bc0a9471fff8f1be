#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Streaming Pipeline Demo
//!
//! Streams a large synthetic field through a smoothing filter one piece at a
//! time, so no stage ever holds more than one window of samples.
//!
//! Run with: `RUST_LOG=trueno_flow=debug cargo run --example streaming_pipeline`

use tracing_subscriber::EnvFilter;
use trueno_flow::prelude::*;

/// Synthetic signal over `[0, samples)`.
struct Signal {
    samples: i64,
}

impl Algorithm for Signal {
    fn class_name(&self) -> &'static str {
        "Signal"
    }

    fn number_of_input_ports(&self) -> usize {
        0
    }

    fn request_information(
        &mut self,
        _request: &Request,
        _inputs: &mut [InformationVector],
        outputs: &mut InformationVector,
    ) -> Result<()> {
        keys::WHOLE_EXTENT.set(&mut outputs[0], Extent::new_1d(0, self.samples));
        keys::FIELD_NAMES.set(&mut outputs[0], vec!["signal".to_string()]);
        Ok(())
    }

    fn request_data(
        &mut self,
        _request: &Request,
        _inputs: &mut [InformationVector],
        outputs: &mut InformationVector,
    ) -> Result<()> {
        let extent = keys::UPDATE_EXTENT.get(&outputs[0]);
        let data = ensure_output_object(&mut outputs[0]);
        data.set_extent(extent);
        data.set_array(
            "signal",
            (extent.min[0]..extent.max[0]).map(|i| (i as f64 * 0.01).sin() + ((i * 7919) % 13) as f64 * 0.05).collect(),
        );
        Ok(())
    }
}

/// Moving average over `radius` samples on either side, within the window.
struct Smooth {
    radius: usize,
}

impl Algorithm for Smooth {
    fn class_name(&self) -> &'static str {
        "Smooth"
    }

    fn request_data(
        &mut self,
        _request: &Request,
        inputs: &mut [InformationVector],
        outputs: &mut InformationVector,
    ) -> Result<()> {
        let input = input_data(inputs, 0, 0).ok_or_else(|| Error::declined(Pass::Data, "no input"))?;
        let signal = input.array("signal").ok_or_else(|| Error::declined(Pass::Data, "no signal array"))?;
        let output = ensure_output_object(&mut outputs[0]);
        output.set_extent(input.extent());

        let smoothed = (0..signal.len())
            .map(|i| {
                let lo = i.saturating_sub(self.radius);
                let hi = (i + self.radius + 1).min(signal.len());
                signal[lo..hi].iter().sum::<f64>() / (hi - lo) as f64
            })
            .collect();
        output.set_array("signal", smoothed);
        Ok(())
    }
}

/// Tracks the peak of everything streamed through it.
#[derive(Default)]
struct Peak {
    peak: f64,
    at: i64,
}

impl Algorithm for Peak {
    fn class_name(&self) -> &'static str {
        "Peak"
    }

    fn number_of_output_ports(&self) -> usize {
        0
    }

    fn request_data(
        &mut self,
        _request: &Request,
        inputs: &mut [InformationVector],
        _outputs: &mut InformationVector,
    ) -> Result<()> {
        let Some(data) = input_data(inputs, 0, 0) else {
            return Ok(());
        };
        let start = data.extent().min[0];
        if let Some(signal) = data.array("signal") {
            for (i, &v) in signal.iter().enumerate() {
                if v > self.peak {
                    self.peak = v;
                    self.at = start + i as i64;
                }
            }
        }
        Ok(())
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    println!("Trueno-Flow Streaming Demo");
    println!("==========================\n");

    let config = Config::load_or_default(Config::default_path().unwrap_or_default());
    config.collector.apply();
    let mut pipeline = Pipeline::with_config(config);
    let source = pipeline.add_stage(Signal { samples: 1_000_000 });
    let smooth = pipeline.add_stage(Smooth { radius: 4 });
    let peak = pipeline.add_stage(Peak::default());
    pipeline.connect(source, 0, smooth, 0)?;
    pipeline.connect(smooth, 0, peak, 0)?;
    pipeline.set_release_data_flag(source, true)?;

    pipeline.update_information(peak)?;
    let whole = pipeline
        .output_information(smooth, 0)
        .and_then(|info| keys::WHOLE_EXTENT.get_opt(info))
        .expect("source publishes a whole extent");
    println!("Whole extent: {whole}");

    let pieces = 8;
    let step = whole.len() as i64 / pieces;
    for piece in 0..pieces {
        let window = Extent::new_1d(piece * step, (piece + 1) * step);
        let request = UpdateRequest::new().with_extent(window).with_piece(piece as i32, pieces as i32);
        pipeline.update_with(peak, &request)?;
        println!("  piece {piece}: {window}");
    }

    let result = pipeline.algorithm::<Peak>(peak).expect("peak stage");
    println!("\nPeak {:.4} at sample {}", result.peak, result.at);
    println!(
        "Executions: source {}, smooth {}, peak {}",
        pipeline.execution_count(source, Pass::Data),
        pipeline.execution_count(smooth, Pass::Data),
        pipeline.execution_count(peak, Pass::Data),
    );
    println!("\nPipeline: {pipeline:?}");
    Ok(())
}
