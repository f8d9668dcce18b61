//! Owned, validated view of a TensorFlow Lite model, read through the `tract-tflite` schema.

use core::fmt;

use tract_core::prelude::Framework;
use tract_tflite::{Tflite, tflite};

use crate::{
	error::{Error, ErrorCode, Result},
	memory::AlignedBuffer,
	tensor::{QuantizationParameters, Shape, SparsityParameters, TensorElementType}
};

/// File identifier stored at bytes 4..8 of every TensorFlow Lite model.
pub const FILE_IDENTIFIER: &str = "TFL3";
/// Schema version written by current converters.
pub const SCHEMA_VERSION: u32 = 3;

/// A tensor as declared in the model.
#[derive(Debug, Clone, PartialEq)]
pub struct TensorInfo {
	pub name: String,
	pub dtype: TensorElementType,
	pub shape: Shape,
	/// Declared shape with `-1` for dynamic dimensions; equal to `shape` when the model does not record one.
	pub shape_signature: Shape,
	/// Index into the model's buffers. Buffer `0` is the empty sentinel.
	pub buffer: usize,
	pub is_variable: bool,
	pub quantization: QuantizationParameters,
	pub sparsity: Option<SparsityParameters>
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operator {
	pub opcode_index: usize,
	/// Tensor indices; `-1` marks an omitted optional input.
	pub inputs: Vec<i32>,
	pub outputs: Vec<i32>
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperatorKind {
	Builtin(i32),
	Custom(String)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatorCode {
	pub kind: OperatorKind,
	pub version: i32
}

impl OperatorCode {
	/// Schema name of the operator, e.g. `FULLY_CONNECTED`, or the custom operator's name.
	pub fn name(&self) -> String {
		match &self.kind {
			OperatorKind::Builtin(code) => match tflite::BuiltinOperator(*code).variant_name() {
				Some(name) => name.to_string(),
				None => format!("BUILTIN_{code}")
			},
			OperatorKind::Custom(name) => name.clone()
		}
	}
}

impl fmt::Display for OperatorCode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{} version {}", self.name(), self.version)
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubGraph {
	pub name: Option<String>,
	pub tensors: Vec<TensorInfo>,
	pub inputs: Vec<usize>,
	pub outputs: Vec<usize>,
	pub operators: Vec<Operator>
}

/// A named metadata entry, e.g. `min_runtime_version` or `TFLITE_METADATA`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataEntry {
	pub name: String,
	pub buffer: usize
}

/// A named entry point into the model, mapping signature names to tensor indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureDef {
	pub key: String,
	pub subgraph_index: usize,
	pub inputs: Vec<(String, usize)>,
	pub outputs: Vec<(String, usize)>
}

/// A decoded TensorFlow Lite model.
///
/// The raw file bytes are kept so the runtime can translate the graph when tensors are allocated. Constant buffers are
/// copied into aligned storage so they can be viewed as typed data.
#[derive(Debug)]
pub struct Model {
	data: Vec<u8>,
	version: u32,
	description: Option<String>,
	subgraphs: Vec<SubGraph>,
	buffers: Vec<AlignedBuffer>,
	operator_codes: Vec<OperatorCode>,
	metadata: Vec<MetadataEntry>,
	signatures: Vec<SignatureDef>
}

impl Model {
	/// Verifies and decodes a model from its raw bytes.
	pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
		if !flatbuffers::buffer_has_identifier(&data, FILE_IDENTIFIER, false) {
			return Err(invalid(format!("Not a TensorFlow Lite model (missing `{FILE_IDENTIFIER}` file identifier)")));
		}

		let proto = Tflite::default()
			.proto_model_for_read(&mut data.as_slice())
			.map_err(|e| Error::from_tract(ErrorCode::InvalidModel, "Model flatbuffer failed verification", e))?;
		let decoded = decode(proto.root())?;
		crate::debug!(
			version = decoded.version,
			subgraphs = decoded.subgraphs.len(),
			buffers = decoded.buffers.len(),
			operator_codes = decoded.operator_codes.len(),
			"Decoded model"
		);
		if decoded.version != SCHEMA_VERSION {
			crate::warn!("Model was written with schema version {}, expected {SCHEMA_VERSION}", decoded.version);
		}
		Ok(Self { data, ..decoded })
	}

	/// Schema version the model was written with.
	pub fn version(&self) -> u32 {
		self.version
	}

	pub fn description(&self) -> Option<&str> {
		self.description.as_deref()
	}

	pub fn subgraphs(&self) -> &[SubGraph] {
		&self.subgraphs
	}

	/// The subgraph that [`Interpreter`](crate::Interpreter) operates on.
	pub fn primary_subgraph(&self) -> &SubGraph {
		// decoding rejects models without subgraphs
		&self.subgraphs[0]
	}

	pub fn operator_codes(&self) -> &[OperatorCode] {
		&self.operator_codes
	}

	pub fn metadata(&self) -> &[MetadataEntry] {
		&self.metadata
	}

	/// Returns the contents of the metadata entry called `name`.
	pub fn metadata_buffer(&self, name: &str) -> Option<&[u8]> {
		self.metadata.iter().find(|m| m.name == name).and_then(|m| self.buffer_data(m.buffer))
	}

	pub fn signatures(&self) -> &[SignatureDef] {
		&self.signatures
	}

	/// Returns the bytes of buffer `index`; empty for the sentinel buffer and for buffers without data.
	pub fn buffer_data(&self, index: usize) -> Option<&[u8]> {
		self.buffers.get(index).map(AlignedBuffer::as_bytes)
	}

	/// Returns `true` if `tensor` is backed by constant data stored in the model.
	pub fn is_constant(&self, tensor: &TensorInfo) -> bool {
		self.buffer_data(tensor.buffer).is_some_and(|d| !d.is_empty())
	}

	/// Size of the raw model file in bytes.
	pub fn size(&self) -> usize {
		self.data.len()
	}

	pub(crate) fn as_bytes(&self) -> &[u8] {
		&self.data
	}
}

fn invalid(message: impl Into<String>) -> Error {
	Error::new_with_code(ErrorCode::InvalidModel, message)
}

fn index_in(value: i64, len: usize, what: &str) -> Result<usize> {
	usize::try_from(value)
		.ok()
		.filter(|&i| i < len)
		.ok_or_else(|| invalid(format!("{what} {value} is out of range (have {len})")))
}

fn tensor_list(list: Option<impl Iterator<Item = i32>>, n_tensors: usize, what: &str) -> Result<Vec<usize>> {
	list.map(|v| v.map(|i| index_in(i.into(), n_tensors, what)).collect::<Result<Vec<_>>>())
		.transpose()
		.map(Option::unwrap_or_default)
}

fn operands(list: Option<impl Iterator<Item = i32>>, n_tensors: usize) -> Result<Vec<i32>> {
	let operands: Vec<i32> = list.map(Iterator::collect).unwrap_or_default();
	for &i in &operands {
		if i != -1 {
			index_in(i.into(), n_tensors, "Operator tensor index")?;
		}
	}
	Ok(operands)
}

fn decode(root: tflite::Model<'_>) -> Result<Model> {
	let buffers = root
		.buffers()
		.map(|v| {
			v.iter()
				.map(|b| AlignedBuffer::from_bytes(b.data().map(|d| d.bytes()).unwrap_or_default()))
				.collect::<Result<Vec<_>>>()
		})
		.transpose()?
		.unwrap_or_default();

	let operator_codes: Vec<OperatorCode> = root
		.operator_codes()
		.map(|v| v.iter().map(decode_operator_code).collect::<Result<Vec<_>>>())
		.transpose()?
		.unwrap_or_default();

	let subgraphs = root
		.subgraphs()
		.map(|v| {
			v.iter()
				.enumerate()
				.map(|(i, s)| decode_subgraph(i, s, buffers.len(), operator_codes.len()))
				.collect::<Result<Vec<_>>>()
		})
		.transpose()?
		.unwrap_or_default();
	if subgraphs.is_empty() {
		return Err(invalid("Model has no subgraphs"));
	}

	let metadata = root
		.metadata()
		.map(|v| {
			v.iter()
				.map(|m| {
					Ok(MetadataEntry {
						name: m.name().unwrap_or_default().to_string(),
						buffer: index_in(m.buffer().into(), buffers.len(), "Metadata buffer index")?
					})
				})
				.collect::<Result<Vec<_>>>()
		})
		.transpose()?
		.unwrap_or_default();

	let signatures = root
		.signature_defs()
		.map(|v| v.iter().map(|s| decode_signature(s, &subgraphs)).collect::<Result<Vec<_>>>())
		.transpose()?
		.unwrap_or_default();

	Ok(Model {
		data: Vec::new(),
		version: root.version(),
		description: root.description().map(str::to_string),
		subgraphs,
		buffers,
		operator_codes,
		metadata,
		signatures
	})
}

fn decode_operator_code(code: tflite::OperatorCode<'_>) -> Result<OperatorCode> {
	let builtin = i32::from(code.deprecated_builtin_code()).max(code.builtin_code().0);
	let kind = if builtin == tflite::BuiltinOperator::CUSTOM.0 {
		let name = code.custom_code().ok_or_else(|| invalid("Operator code is CUSTOM but has no custom name"))?;
		OperatorKind::Custom(name.to_string())
	} else {
		OperatorKind::Builtin(builtin)
	};
	Ok(OperatorCode { kind, version: code.version() })
}

fn decode_subgraph(index: usize, subgraph: tflite::SubGraph<'_>, n_buffers: usize, n_opcodes: usize) -> Result<SubGraph> {
	let tensors = subgraph
		.tensors()
		.map(|v| v.iter().map(|t| decode_tensor(t, n_buffers)).collect::<Result<Vec<_>>>())
		.transpose()?
		.unwrap_or_default();
	let n_tensors = tensors.len();

	let inputs = tensor_list(subgraph.inputs().map(|v| v.iter()), n_tensors, "Subgraph input tensor index")?;
	let outputs = tensor_list(subgraph.outputs().map(|v| v.iter()), n_tensors, "Subgraph output tensor index")?;

	let operators = subgraph
		.operators()
		.map(|v| {
			v.iter()
				.map(|op| {
					Ok(Operator {
						opcode_index: index_in(op.opcode_index().into(), n_opcodes, "Operator code index")?,
						inputs: operands(op.inputs().map(|v| v.iter()), n_tensors)?,
						outputs: operands(op.outputs().map(|v| v.iter()), n_tensors)?
					})
				})
				.collect::<Result<Vec<_>>>()
		})
		.transpose()?
		.unwrap_or_default();

	crate::trace!(subgraph = index, tensors = n_tensors, operators = operators.len(), "Decoded subgraph");
	Ok(SubGraph {
		name: subgraph.name().map(str::to_string),
		tensors,
		inputs,
		outputs,
		operators
	})
}

fn decode_tensor(tensor: tflite::Tensor<'_>, n_buffers: usize) -> Result<TensorInfo> {
	let name = tensor.name().unwrap_or_default().to_string();
	let dtype = TensorElementType::from_code(tensor.type_().0).map_err(|e| invalid(format!("Tensor `{name}`: {}", e.message())))?;
	let shape = Shape::new(tensor.shape().map(|v| v.iter().collect::<Vec<_>>()).unwrap_or_default());
	let shape_signature = tensor.shape_signature().map(|v| Shape::new(v.iter())).unwrap_or_else(|| shape.clone());
	let buffer = index_in(tensor.buffer().into(), n_buffers.max(1), "Tensor buffer index")?;
	Ok(TensorInfo {
		dtype,
		shape,
		shape_signature,
		buffer,
		is_variable: tensor.is_variable(),
		quantization: QuantizationParameters::from_tflite(tensor.quantization()),
		sparsity: tensor.sparsity().map(SparsityParameters::from_tflite),
		name
	})
}

fn decode_signature(signature: tflite::SignatureDef<'_>, subgraphs: &[SubGraph]) -> Result<SignatureDef> {
	let key = signature.signature_key().unwrap_or_default().to_string();
	let subgraph_index = index_in(signature.subgraph_index().into(), subgraphs.len(), "Signature subgraph index")?;
	let n_tensors = subgraphs[subgraph_index].tensors.len();
	let tensor_map = |m: tflite::TensorMap<'_>| -> Result<(String, usize)> {
		Ok((m.name().unwrap_or_default().to_string(), index_in(m.tensor_index().into(), n_tensors, "Signature tensor index")?))
	};
	Ok(SignatureDef {
		inputs: signature.inputs().map(|v| v.iter().map(tensor_map).collect::<Result<Vec<_>>>()).transpose()?.unwrap_or_default(),
		outputs: signature.outputs().map(|v| v.iter().map(tensor_map).collect::<Result<Vec<_>>>()).transpose()?.unwrap_or_default(),
		key,
		subgraph_index
	})
}
