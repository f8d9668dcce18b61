//! Writes small TensorFlow Lite models in memory so tests don't depend on model files checked into the repository.

#![allow(dead_code)]

use flatbuffers::{FlatBufferBuilder, TableFinishedWIPOffset, WIPOffset};
use tflite_inspect::TensorElementType;

type Table = WIPOffset<TableFinishedWIPOffset>;

pub const BUILTIN_LOGISTIC: i32 = 14;
pub const BUILTIN_LSH_PROJECTION: i32 = 15;
pub const BUILTIN_TANH: i32 = 28;
const BUILTIN_CUSTOM: i32 = 32;
const BUILTIN_PLACEHOLDER_FOR_GREATER_OP_CODES: i32 = 127;

#[derive(Debug, Clone)]
pub struct TestTensor {
	name: String,
	dtype: i8,
	shape: Vec<i32>,
	shape_signature: Option<Vec<i32>>,
	buffer: u32,
	scales: Vec<f32>,
	zero_points: Vec<i64>,
	quantized_dimension: i32
}

impl TestTensor {
	pub fn new(name: &str, dtype: TensorElementType, shape: &[i32]) -> Self {
		Self::with_type_code(name, dtype.code(), shape)
	}

	/// A tensor with a raw type code, which may be one the crate doesn't know.
	pub fn with_type_code(name: &str, dtype: i8, shape: &[i32]) -> Self {
		Self {
			name: name.to_string(),
			dtype,
			shape: shape.to_vec(),
			shape_signature: None,
			buffer: 0,
			scales: Vec::new(),
			zero_points: Vec::new(),
			quantized_dimension: 0
		}
	}

	pub fn signature(mut self, signature: &[i32]) -> Self {
		self.shape_signature = Some(signature.to_vec());
		self
	}

	pub fn quantized(mut self, scales: &[f32], zero_points: &[i64], quantized_dimension: i32) -> Self {
		self.scales = scales.to_vec();
		self.zero_points = zero_points.to_vec();
		self.quantized_dimension = quantized_dimension;
		self
	}

	pub fn buffer(mut self, buffer: u32) -> Self {
		self.buffer = buffer;
		self
	}
}

#[derive(Debug, Clone)]
pub struct TestSignature {
	pub key: String,
	pub inputs: Vec<(String, u32)>,
	pub outputs: Vec<(String, u32)>
}

/// Builder for a single-subgraph model. Buffer `0` is always the empty sentinel.
#[derive(Debug, Clone)]
pub struct TestModel {
	version: u32,
	description: Option<String>,
	tensors: Vec<TestTensor>,
	inputs: Vec<i32>,
	outputs: Vec<i32>,
	buffers: Vec<Vec<u8>>,
	operator_codes: Vec<(i32, Option<String>)>,
	operators: Vec<(u32, Vec<i32>, Vec<i32>)>,
	metadata: Vec<(String, u32)>,
	signatures: Vec<TestSignature>
}

impl Default for TestModel {
	fn default() -> Self {
		Self::new()
	}
}

impl TestModel {
	pub fn new() -> Self {
		Self {
			version: 3,
			description: Some(String::from("MLIR Converted.")),
			tensors: Vec::new(),
			inputs: Vec::new(),
			outputs: Vec::new(),
			buffers: vec![Vec::new()],
			operator_codes: Vec::new(),
			operators: Vec::new(),
			metadata: Vec::new(),
			signatures: Vec::new()
		}
	}

	pub fn tensor(mut self, tensor: TestTensor) -> Self {
		self.tensors.push(tensor);
		self
	}

	pub fn inputs(mut self, inputs: &[i32]) -> Self {
		self.inputs = inputs.to_vec();
		self
	}

	pub fn outputs(mut self, outputs: &[i32]) -> Self {
		self.outputs = outputs.to_vec();
		self
	}

	/// Appends a buffer; its index is the number of buffers added before it, plus one.
	pub fn buffer(mut self, data: &[u8]) -> Self {
		self.buffers.push(data.to_vec());
		self
	}

	pub fn builtin_op(mut self, code: i32) -> Self {
		self.operator_codes.push((code, None));
		self
	}

	pub fn custom_op(mut self, name: &str) -> Self {
		self.operator_codes.push((BUILTIN_CUSTOM, Some(name.to_string())));
		self
	}

	pub fn operator(mut self, opcode_index: u32, inputs: &[i32], outputs: &[i32]) -> Self {
		self.operators.push((opcode_index, inputs.to_vec(), outputs.to_vec()));
		self
	}

	pub fn metadata(mut self, name: &str, buffer: u32) -> Self {
		self.metadata.push((name.to_string(), buffer));
		self
	}

	pub fn signature(mut self, key: &str, inputs: &[(&str, u32)], outputs: &[(&str, u32)]) -> Self {
		let map = |list: &[(&str, u32)]| list.iter().map(|(n, i)| (n.to_string(), *i)).collect();
		self.signatures.push(TestSignature {
			key: key.to_string(),
			inputs: map(inputs),
			outputs: map(outputs)
		});
		self
	}

	pub fn version(mut self, version: u32) -> Self {
		self.version = version;
		self
	}

	pub fn build(&self) -> Vec<u8> {
		let mut fbb = FlatBufferBuilder::new();

		let operator_codes: Vec<Table> = self
			.operator_codes
			.iter()
			.map(|(code, custom)| {
				let custom = custom.as_deref().map(|name| fbb.create_string(name));
				let start = fbb.start_table();
				let deprecated = (*code).min(BUILTIN_PLACEHOLDER_FOR_GREATER_OP_CODES) as i8;
				fbb.push_slot_always::<i8>(4, deprecated);
				if let Some(custom) = custom {
					fbb.push_slot_always(6, custom);
				}
				fbb.push_slot::<i32>(8, 1, 1);
				fbb.push_slot_always::<i32>(10, *code);
				fbb.end_table(start)
			})
			.collect();

		let tensors: Vec<Table> = self.tensors.iter().map(|t| write_tensor(&mut fbb, t)).collect();

		let operators: Vec<Table> = self
			.operators
			.iter()
			.map(|(opcode_index, inputs, outputs)| {
				let inputs = fbb.create_vector(inputs);
				let outputs = fbb.create_vector(outputs);
				let start = fbb.start_table();
				fbb.push_slot_always::<u32>(4, *opcode_index);
				fbb.push_slot_always(6, inputs);
				fbb.push_slot_always(8, outputs);
				fbb.end_table(start)
			})
			.collect();

		let subgraph = {
			let tensors = fbb.create_vector(&tensors);
			let inputs = fbb.create_vector(&self.inputs);
			let outputs = fbb.create_vector(&self.outputs);
			let operators = fbb.create_vector(&operators);
			let name = fbb.create_string("main");
			let start = fbb.start_table();
			fbb.push_slot_always(4, tensors);
			fbb.push_slot_always(6, inputs);
			fbb.push_slot_always(8, outputs);
			fbb.push_slot_always(10, operators);
			fbb.push_slot_always(12, name);
			fbb.end_table(start)
		};

		let buffers: Vec<Table> = self
			.buffers
			.iter()
			.map(|data| {
				let data = (!data.is_empty()).then(|| fbb.create_vector(data));
				let start = fbb.start_table();
				if let Some(data) = data {
					fbb.push_slot_always(4, data);
				}
				fbb.end_table(start)
			})
			.collect();

		let metadata: Vec<Table> = self
			.metadata
			.iter()
			.map(|(name, buffer)| {
				let name = fbb.create_string(name);
				let start = fbb.start_table();
				fbb.push_slot_always(4, name);
				fbb.push_slot_always::<u32>(6, *buffer);
				fbb.end_table(start)
			})
			.collect();

		let signatures: Vec<Table> = self
			.signatures
			.iter()
			.map(|signature| {
				let inputs: Vec<Table> = signature.inputs.iter().map(|(n, i)| write_tensor_map(&mut fbb, n, *i)).collect();
				let outputs: Vec<Table> = signature.outputs.iter().map(|(n, i)| write_tensor_map(&mut fbb, n, *i)).collect();
				let inputs = fbb.create_vector(&inputs);
				let outputs = fbb.create_vector(&outputs);
				let key = fbb.create_string(&signature.key);
				let start = fbb.start_table();
				fbb.push_slot_always(4, inputs);
				fbb.push_slot_always(6, outputs);
				fbb.push_slot_always(8, key);
				fbb.push_slot_always::<u32>(12, 0);
				fbb.end_table(start)
			})
			.collect();

		let operator_codes = fbb.create_vector(&operator_codes);
		let subgraphs = fbb.create_vector(&[subgraph]);
		let description = self.description.as_deref().map(|d| fbb.create_string(d));
		let buffers = fbb.create_vector(&buffers);
		let metadata = fbb.create_vector(&metadata);
		let signatures = fbb.create_vector(&signatures);

		let start = fbb.start_table();
		fbb.push_slot_always::<u32>(4, self.version);
		fbb.push_slot_always(6, operator_codes);
		fbb.push_slot_always(8, subgraphs);
		if let Some(description) = description {
			fbb.push_slot_always(10, description);
		}
		fbb.push_slot_always(12, buffers);
		fbb.push_slot_always(16, metadata);
		fbb.push_slot_always(18, signatures);
		let root = fbb.end_table(start);
		fbb.finish(root, Some("TFL3"));
		fbb.finished_data().to_vec()
	}
}

fn write_tensor(fbb: &mut FlatBufferBuilder<'_>, tensor: &TestTensor) -> Table {
	let shape = fbb.create_vector(&tensor.shape);
	let shape_signature = tensor.shape_signature.as_ref().map(|s| fbb.create_vector(s));
	let name = fbb.create_string(&tensor.name);
	let quantization = (!tensor.scales.is_empty()).then(|| {
		let scales = fbb.create_vector(&tensor.scales);
		let zero_points = fbb.create_vector(&tensor.zero_points);
		let start = fbb.start_table();
		fbb.push_slot_always(8, scales);
		fbb.push_slot_always(10, zero_points);
		fbb.push_slot::<i32>(16, tensor.quantized_dimension, 0);
		fbb.end_table(start)
	});

	let start = fbb.start_table();
	fbb.push_slot_always(4, shape);
	fbb.push_slot::<i8>(6, tensor.dtype, 0);
	fbb.push_slot::<u32>(8, tensor.buffer, 0);
	fbb.push_slot_always(10, name);
	if let Some(quantization) = quantization {
		fbb.push_slot_always(12, quantization);
	}
	if let Some(shape_signature) = shape_signature {
		fbb.push_slot_always(18, shape_signature);
	}
	fbb.end_table(start)
}

fn write_tensor_map(fbb: &mut FlatBufferBuilder<'_>, name: &str, tensor_index: u32) -> Table {
	let name = fbb.create_string(name);
	let start = fbb.start_table();
	fbb.push_slot_always(4, name);
	fbb.push_slot_always::<u32>(6, tensor_index);
	fbb.end_table(start)
}

pub fn f32_bytes(values: &[f32]) -> Vec<u8> {
	values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// A small float model shaped like a motion classifier: a `(dyn, 30, 6)` window of sensor readings squashed through
/// a sigmoid and a tanh activation. Two constant normalization vectors ride along unused by any operator.
///
/// Tensors: `0` input, `1` sigmoid activations, `2` mean (constant), `3` variance (constant), `4` output.
pub fn classifier() -> TestModel {
	let mean = f32_bytes(&[0.5, -0.5, 1.0, 0.0, 0.25, 2.0]);
	let variance = f32_bytes(&[1.0; 6]);
	TestModel::new()
		.buffer(&mean)
		.buffer(&variance)
		.tensor(TestTensor::new("serving_default_input:0", TensorElementType::Float32, &[1, 30, 6]).signature(&[-1, 30, 6]))
		.tensor(TestTensor::new("sequential/dense/Sigmoid", TensorElementType::Float32, &[1, 30, 6]).signature(&[-1, 30, 6]))
		.tensor(TestTensor::new("sequential/norm/mean", TensorElementType::Float32, &[6]).buffer(1))
		.tensor(TestTensor::new("sequential/norm/variance", TensorElementType::Float32, &[6]).buffer(2))
		.tensor(TestTensor::new("StatefulPartitionedCall:0", TensorElementType::Float32, &[1, 30, 6]).signature(&[-1, 30, 6]))
		.inputs(&[0])
		.outputs(&[4])
		.builtin_op(BUILTIN_LOGISTIC)
		.builtin_op(BUILTIN_TANH)
		.operator(0, &[0], &[1])
		.operator(1, &[1], &[4])
		.signature("serving_default", &[("input", 0)], &[("output_0", 4)])
}

/// A quantized model that passes its per-tensor quantized `u8` input straight through to its output, next to a
/// per-channel quantized constant filter.
///
/// Tensors: `0` input and output, `1` filter (constant).
pub fn quantized_classifier() -> TestModel {
	let filter = vec![1u8; 8 * 3 * 3 * 3];
	TestModel::new()
		.buffer(&filter)
		.tensor(TestTensor::new("input", TensorElementType::Uint8, &[1, 224, 224, 3]).quantized(&[0.0078125], &[128], 0))
		.tensor(
			TestTensor::new("conv/filter", TensorElementType::Int8, &[8, 3, 3, 3])
				.quantized(&[0.01, 0.02, 0.03, 0.04, 0.05, 0.06, 0.07, 0.08], &[0; 8], 0)
				.buffer(1)
		)
		.inputs(&[0])
		.outputs(&[0])
}
