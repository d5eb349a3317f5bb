//! Call Batch Protocol
//!
//! A batch of calls travels as three index-aligned sequences:
//! `[[moduleIds], [methodIds], [argLists]]`. Inside the crate a batch is a
//! plain ordered list of [`CallRecord`]s; the parallel-array form only exists
//! at the wire boundary.

use crate::core::{ProtocolError, ProtocolResult};
use crate::modules::{MethodId, ModuleId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Script-side object that receives batches
pub const BATCHED_BRIDGE: &str = "__fbBatchedBridge";
/// Global holding the injected module table
pub const CONFIG_GLOBAL: &str = "__bridgeConfig";
/// Runs a whole batch and returns the script's queued native calls
pub const CALL_FUNCTIONS: &str = "callFunctionsReturnFlushedQueue";
/// Runs a single call and returns the script's queued native calls
pub const CALL_FUNCTION: &str = "callFunctionReturnFlushedQueue";
/// Resolves a callback code and returns the script's queued native calls
pub const INVOKE_CALLBACK: &str = "invokeCallbackAndReturnFlushedQueue";
/// Returns the script's queued native calls
pub const FLUSHED_QUEUE: &str = "flushedQueue";

/// A call addressed by name, waiting for the bridge to become ready
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingCall {
    pub module: String,
    pub method: String,
    pub args: Vec<Value>,
}

impl PendingCall {
    pub fn new(module: impl Into<String>, method: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            module: module.into(),
            method: method.into(),
            args,
        }
    }
}

/// A call addressed by ID
#[derive(Debug, Clone, PartialEq)]
pub struct CallRecord {
    pub module_id: ModuleId,
    pub method_id: MethodId,
    pub args: Vec<Value>,
}

impl CallRecord {
    pub fn new(module_id: ModuleId, method_id: MethodId, args: Vec<Value>) -> Self {
        Self {
            module_id,
            method_id,
            args,
        }
    }
}

/// An ordered batch of calls
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallBatch {
    records: Vec<CallRecord>,
}

impl CallBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: CallRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[CallRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<CallRecord> {
        self.records
    }

    /// Encode as the wire tuple
    pub fn to_wire(&self) -> Value {
        let mut module_ids = Vec::with_capacity(self.records.len());
        let mut method_ids = Vec::with_capacity(self.records.len());
        let mut params = Vec::with_capacity(self.records.len());
        for record in &self.records {
            module_ids.push(Value::from(record.module_id.0));
            method_ids.push(Value::from(record.method_id.0));
            params.push(Value::Array(record.args.clone()));
        }
        Value::Array(vec![
            Value::Array(module_ids),
            Value::Array(method_ids),
            Value::Array(params),
        ])
    }

    /// Decode a wire tuple, rejecting the whole batch on the first bad entry
    pub fn from_wire(value: &Value) -> ProtocolResult<Self> {
        let document = ResultDocument::from_value(value)?;
        let records = document.entries.into_iter().collect::<ProtocolResult<Vec<_>>>()?;
        Ok(Self { records })
    }
}

impl FromIterator<CallRecord> for CallBatch {
    fn from_iter<I: IntoIterator<Item = CallRecord>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

/// Decoded result of a script entry point
///
/// The shape is checked up front; each entry is decoded on its own so a
/// bad entry is reported without losing the rest.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultDocument {
    pub entries: Vec<ProtocolResult<CallRecord>>,
}

impl ResultDocument {
    /// `null` means the script had nothing queued.
    pub fn from_value(value: &Value) -> ProtocolResult<Self> {
        let parts = match value {
            Value::Null => return Ok(Self::default()),
            Value::Array(parts) => parts,
            other => {
                return Err(ProtocolError::Malformed(format!(
                    "expected an array, got {}",
                    type_name(other)
                )))
            }
        };
        if parts.len() < 3 {
            return Err(ProtocolError::Malformed(format!(
                "expected 3 parallel arrays, got {}",
                parts.len()
            )));
        }

        let module_ids = column(parts, 0, "module ids")?;
        let method_ids = column(parts, 1, "method ids")?;
        let params = column(parts, 2, "argument lists")?;

        if module_ids.len() != method_ids.len() || module_ids.len() != params.len() {
            return Err(ProtocolError::Misaligned {
                module_ids: module_ids.len(),
                method_ids: method_ids.len(),
                params: params.len(),
            });
        }

        let entries = module_ids
            .iter()
            .zip(method_ids)
            .zip(params)
            .enumerate()
            .map(|(index, ((module_id, method_id), args))| {
                let module_id = ModuleId(parse_id(module_id, "module id", index)?);
                let method_id = MethodId(parse_id(method_id, "method id", index)?);
                let args = args.as_array().cloned().ok_or_else(|| {
                    ProtocolError::InvalidEntry {
                        field: "argument list",
                        index,
                        value: args.to_string(),
                    }
                })?;
                Ok(CallRecord::new(module_id, method_id, args))
            })
            .collect();

        Ok(Self { entries })
    }

    pub fn from_json(text: &str) -> ProtocolResult<Self> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Ok(Self::default());
        }
        let value: Value =
            serde_json::from_str(trimmed).map_err(|e| ProtocolError::Malformed(e.to_string()))?;
        Self::from_value(&value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn column<'a>(parts: &'a [Value], index: usize, name: &str) -> ProtocolResult<&'a Vec<Value>> {
    parts[index].as_array().ok_or_else(|| {
        ProtocolError::Malformed(format!(
            "{name} must be an array, got {}",
            type_name(&parts[index])
        ))
    })
}

fn parse_id(value: &Value, field: &'static str, index: usize) -> ProtocolResult<u32> {
    let invalid = || ProtocolError::InvalidEntry {
        field,
        index,
        value: value.to_string(),
    };
    if let Some(id) = value.as_u64() {
        return u32::try_from(id).map_err(|_| invalid());
    }
    // Script numbers are doubles
    match value.as_f64() {
        Some(id) if id >= 0.0 && id.fract() == 0.0 && id <= f64::from(u32::MAX) => Ok(id as u32),
        _ => Err(invalid()),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Script text calling `__fbBatchedBridge.<method>(args...)`
///
/// Arguments are written as JSON literals, which are valid script literals.
pub fn invocation_script(method: &str, args: &[Value]) -> String {
    let args = args
        .iter()
        .map(Value::to_string)
        .collect::<Vec<_>>()
        .join(",");
    format!("{BATCHED_BRIDGE}.{method}({args})")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_wire_format() {
        let batch: CallBatch = vec![
            CallRecord::new(ModuleId(0), MethodId(0), vec![json!(1), json!(1000), json!(true)]),
            CallRecord::new(ModuleId(2), MethodId(1), vec![]),
        ]
        .into_iter()
        .collect();

        assert_eq!(batch.to_wire(), json!([[0, 2], [0, 1], [[1, 1000, true], []]]));
        assert_eq!(CallBatch::from_wire(&batch.to_wire()).unwrap(), batch);
    }

    #[test]
    fn test_null_document_is_empty() {
        assert!(ResultDocument::from_value(&Value::Null).unwrap().is_empty());
        assert!(ResultDocument::from_json("  ").unwrap().is_empty());
        assert!(ResultDocument::from_json("null").unwrap().is_empty());
    }

    #[test]
    fn test_misaligned_rejected() {
        let err = ResultDocument::from_value(&json!([[0, 1], [0], [[], []]])).unwrap_err();
        assert_eq!(
            err,
            ProtocolError::Misaligned {
                module_ids: 2,
                method_ids: 1,
                params: 2,
            }
        );
    }

    #[test]
    fn test_malformed_shape() {
        assert!(matches!(
            ResultDocument::from_value(&json!({ "a": 1 })),
            Err(ProtocolError::Malformed(_))
        ));
        assert!(matches!(
            ResultDocument::from_value(&json!([[0], [0]])),
            Err(ProtocolError::Malformed(_))
        ));
        assert!(matches!(
            ResultDocument::from_value(&json!([[0], "x", [[]]])),
            Err(ProtocolError::Malformed(_))
        ));
        assert!(ResultDocument::from_json("[[0],").is_err());
    }

    #[test]
    fn test_bad_entry_is_isolated() {
        // A fourth element (call id) is tolerated
        let document =
            ResultDocument::from_value(&json!([[0, "x", 1.0], [0, 0, 2], [[1], [], 5], 17]))
                .unwrap();

        assert_eq!(document.len(), 3);
        assert_eq!(
            document.entries[0],
            Ok(CallRecord::new(ModuleId(0), MethodId(0), vec![json!(1)]))
        );
        assert!(matches!(
            document.entries[1],
            Err(ProtocolError::InvalidEntry { field: "module id", index: 1, .. })
        ));
        assert!(matches!(
            document.entries[2],
            Err(ProtocolError::InvalidEntry { field: "argument list", index: 2, .. })
        ));
        assert!(CallBatch::from_wire(&json!([[0, "x", 1.0], [0, 0, 2], [[1], [], 5]])).is_err());
    }

    #[test]
    fn test_float_and_negative_ids() {
        assert_eq!(parse_id(&json!(3.0), "module id", 0), Ok(3));
        assert!(parse_id(&json!(3.5), "module id", 0).is_err());
        assert!(parse_id(&json!(-1), "module id", 0).is_err());
        assert!(parse_id(&json!(u64::from(u32::MAX) + 1), "module id", 0).is_err());
    }

    #[test]
    fn test_invocation_script() {
        assert_eq!(
            invocation_script(CALL_FUNCTIONS, &[json!([[0], [0], [[1, 1000, true]]])]),
            "__fbBatchedBridge.callFunctionsReturnFlushedQueue([[0],[0],[[1,1000,true]]])"
        );
        assert_eq!(
            invocation_script(INVOKE_CALLBACK, &[json!(42), json!(["ok"])]),
            "__fbBatchedBridge.invokeCallbackAndReturnFlushedQueue(42,[\"ok\"])"
        );
        assert_eq!(invocation_script(FLUSHED_QUEUE, &[]), "__fbBatchedBridge.flushedQueue()");
    }

    proptest! {
        #[test]
        fn wire_columns_stay_aligned(
            calls in prop::collection::vec((0u32..64, 0u32..16, prop::collection::vec(any::<i32>(), 0..4)), 0..32)
        ) {
            let batch: CallBatch = calls
                .iter()
                .map(|(module, method, args)| {
                    CallRecord::new(
                        ModuleId(*module),
                        MethodId(*method),
                        args.iter().map(|a| json!(a)).collect(),
                    )
                })
                .collect();

            let wire = batch.to_wire();
            for column in wire.as_array().unwrap() {
                prop_assert_eq!(column.as_array().unwrap().len(), calls.len());
            }
            let decoded = CallBatch::from_wire(&wire).unwrap();
            prop_assert_eq!(decoded.records(), batch.records());
        }
    }
}
