//! Prints the input and output tensor details of a TensorFlow Lite model.
//!
//! Usage: `tflite-details [MODEL_PATH]`. Without an argument, the model is read from `../assets/badminton_model.tflite`.

use std::{env, io, path::PathBuf};

use tflite_inspect::{Interpreter, logging::default_log_level};
use tracing_subscriber::EnvFilter;

const DEFAULT_MODEL_PATH: &str = "../assets/badminton_model.tflite";

fn main() -> tflite_inspect::Result<()> {
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_log_level().as_directive()));
	tracing_subscriber::fmt().with_env_filter(filter).with_writer(io::stderr).init();

	let model_path = env::args_os().nth(1).map_or_else(|| PathBuf::from(DEFAULT_MODEL_PATH), PathBuf::from);

	let mut interpreter = Interpreter::new(&model_path)?;
	interpreter.allocate_tensors()?;

	println!("Input details:\n{}", interpreter.input_details()?);
	println!("Output details:\n{}", interpreter.output_details()?);

	Ok(())
}
