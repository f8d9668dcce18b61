//! Graph preparation through `tract`.

use std::collections::HashMap;

use tract_core::prelude::{Framework, OutletId, TypedFact, TypedModel};
use tract_tflite::Tflite;

use crate::{
	error::{Error, ErrorCode, Result},
	model::Model,
	tensor::Shape
};

/// Translates the primary subgraph into a tract graph, pins the input shapes to `shapes`, and plans it for execution.
///
/// Returns the shape the runtime infers for each tensor it can attribute back to a model tensor: every output, plus
/// any intermediate tensor whose outlet still carries its name after optimization. Tensors the runtime fused away are
/// `None`.
pub(super) fn prepare(model: &Model, shapes: &[Shape]) -> Result<Vec<Option<Shape>>> {
	let tflite = Tflite::default();
	let mut data = model.as_bytes();
	let proto = tflite
		.proto_model_for_read(&mut data)
		.map_err(|e| Error::from_tract(ErrorCode::InvalidModel, "Model flatbuffer failed verification", e))?;
	let mut graph = tflite
		.model_for_proto_model(&proto)
		.map_err(|e| Error::from_tract(ErrorCode::UnsupportedOperator, "Model uses operators the runtime cannot translate", e))?;

	let subgraph = model.primary_subgraph();
	for (slot, &tensor) in subgraph.inputs.iter().enumerate() {
		let shape = &shapes[tensor];
		if *shape == subgraph.tensors[tensor].shape {
			continue;
		}
		let datum_type = graph
			.input_fact(slot)
			.map_err(|e| Error::from_tract(ErrorCode::AllocationFailed, "Model input is missing from the translated graph", e))?
			.datum_type;
		// resizing rejects negative dimensions
		let dims: Vec<usize> = shape.iter().map(|&d| d as usize).collect();
		graph
			.set_input_fact(slot, TypedFact::dt_shape(datum_type, dims))
			.map_err(|e| Error::from_tract(ErrorCode::AllocationFailed, "Could not apply the resized input shape", e))?;
		crate::trace!(input = slot, tensor, shape = %shape, "Pinned input shape");
	}

	let plan = graph
		.into_optimized()
		.and_then(TypedModel::into_runnable)
		.map_err(|e| Error::from_tract(ErrorCode::AllocationFailed, "Runtime could not prepare the model", e))?;
	let prepared = plan.model();
	crate::debug!(nodes = prepared.nodes().len(), "Prepared runtime plan");

	let mut inferred = vec![None; subgraph.tensors.len()];

	let by_name: HashMap<&str, usize> = subgraph.tensors.iter().enumerate().map(|(i, t)| (t.name.as_str(), i)).collect();
	let labelled = prepared
		.nodes()
		.iter()
		.map(|node| (node.name.as_str(), OutletId::new(node.id, 0)))
		.chain(prepared.outlet_labels.iter().map(|(outlet, label)| (label.as_str(), *outlet)));
	for (name, outlet) in labelled {
		if let (Some(&tensor), Ok(fact)) = (by_name.get(name), prepared.outlet_fact(outlet)) {
			inferred[tensor] = concrete_shape(fact)?;
		}
	}

	for (slot, &tensor) in subgraph.outputs.iter().enumerate() {
		let fact = prepared
			.output_fact(slot)
			.map_err(|e| Error::from_tract(ErrorCode::AllocationFailed, "Model output is missing from the prepared plan", e))?;
		inferred[tensor] = concrete_shape(fact)?;
	}
	Ok(inferred)
}

fn concrete_shape(fact: &TypedFact) -> Result<Option<Shape>> {
	let Some(dims) = fact.shape.as_concrete() else {
		return Ok(None);
	};
	dims.iter()
		.map(|&d| i32::try_from(d).map_err(|_| Error::new_with_code(ErrorCode::AllocationFailed, format!("Inferred dimension {d} does not fit a tensor shape"))))
		.collect::<Result<Vec<_>>>()
		.map(|dims| Some(Shape::new(dims)))
}
