#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(clippy::tabs_in_doc_comments)]
#![warn(clippy::unwrap_used)]

//! `tflite-inspect` loads [TensorFlow Lite](https://ai.google.dev/edge/litert) models, allocates their tensors, and
//! reports the shape, element type and quantization of each input and output.
//!
//! Models are read and prepared with [`tract`](https://github.com/sonos/tract), a pure-Rust inference runtime, so no
//! TensorFlow Lite installation is needed.
//!
//! ```no_run
//! use tflite_inspect::Interpreter;
//!
//! fn main() -> tflite_inspect::Result<()> {
//! 	let mut interpreter = Interpreter::new("model.tflite")?;
//! 	interpreter.allocate_tensors()?;
//! 	println!("Input details:\n{}", interpreter.input_details()?);
//! 	println!("Output details:\n{}", interpreter.output_details()?);
//! 	Ok(())
//! }
//! ```

pub(crate) mod private {
	pub struct PrivateTraitMarker;

	macro_rules! private_trait {
		() => {
			#[doc(hidden)]
			fn _private() -> crate::private::PrivateTraitMarker;
		};
	}
	macro_rules! private_impl {
		() => {
			fn _private() -> crate::private::PrivateTraitMarker {
				crate::private::PrivateTraitMarker
			}
		};
	}
	pub(crate) use {private_impl, private_trait};
}

pub mod error;
pub mod interpreter;
pub mod logging;
pub mod memory;
pub mod model;
pub mod tensor;

pub(crate) use self::{
	logging::{debug, error, info, trace, warning as warn},
	private::{private_impl, private_trait}
};
pub use self::{
	error::{Error, ErrorCode, Result},
	interpreter::{Interpreter, InterpreterBuilder},
	model::{Model, SignatureDef},
	tensor::{PrimitiveTensorElementType, Shape, TensorDetails, TensorDetailsList, TensorElementType}
};
