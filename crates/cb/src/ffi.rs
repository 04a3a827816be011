//! Foreign-function interop contract (spec §6 "FFI contract").
//!
//! Grounded on `original_source`'s `ffi_manager.h` (`FunctionSignature`,
//! `callFunction`, `isForeignFunction`, `getLastError`). Dynamic library
//! loading is out of scope (spec §1); this module specifies only the callable
//! surface the core consumes - a closure per declared foreign function, keyed
//! by name, restricted to the nine signatures spec §6 lists.

use ahash::AHashMap;

use crate::diagnostics::{EngineError, ErrorKind};
use crate::value::Value;

/// The closed set of FFI signatures the core supports (spec §6).
pub enum ForeignFn {
    NilaryInt(Box<dyn FnMut() -> i64 + Send>),
    UnaryInt(Box<dyn FnMut(i64) -> i64 + Send>),
    BinaryInt(Box<dyn FnMut(i64, i64) -> i64 + Send>),
    UnaryDouble(Box<dyn FnMut(f64) -> f64 + Send>),
    BinaryDouble(Box<dyn FnMut(f64, f64) -> f64 + Send>),
    NilaryVoid(Box<dyn FnMut() + Send>),
    UnaryVoidInt(Box<dyn FnMut(i64) + Send>),
}

impl std::fmt::Debug for ForeignFn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let shape = match self {
            Self::NilaryInt(_) => "() -> int",
            Self::UnaryInt(_) => "(int) -> int",
            Self::BinaryInt(_) => "(int,int) -> int",
            Self::UnaryDouble(_) => "(double) -> double",
            Self::BinaryDouble(_) => "(double,double) -> double",
            Self::NilaryVoid(_) => "() -> void",
            Self::UnaryVoidInt(_) => "(int) -> void",
        };
        write!(f, "ForeignFn[{shape}]")
    }
}

/// Registry of foreign functions a host embedding the interpreter has made
/// callable, keyed by name (spec §6 "a single-entry callable with arguments
/// already coerced to the FFI-permitted tags").
#[derive(Default)]
pub struct ForeignRegistry {
    functions: AHashMap<String, ForeignFn>,
}

impl ForeignRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, func: ForeignFn) {
        self.functions.insert(name.into(), func);
    }

    pub fn is_foreign(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Calls a registered foreign function with already-coerced arguments.
    /// Arity/shape mismatches against the registered signature are reported as
    /// `ForeignSignatureUnsupported` (spec §6 "Unsupported signatures must be
    /// reported as a `ForeignSignatureUnsupported` error").
    pub fn call(&mut self, name: &str, args: &[Value]) -> Result<Value, EngineError> {
        let func = self.functions.get_mut(name).ok_or_else(|| {
            EngineError::runtime(ErrorKind::FunctionNotFound, format!("no foreign function `{name}`"))
        })?;
        match (func, args) {
            (ForeignFn::NilaryInt(f), []) => Ok(Value::Int(f())),
            (ForeignFn::UnaryInt(f), [a]) => Ok(Value::Int(f(require_int(a)?))),
            (ForeignFn::BinaryInt(f), [a, b]) => Ok(Value::Int(f(require_int(a)?, require_int(b)?))),
            (ForeignFn::UnaryDouble(f), [a]) => Ok(Value::Double(f(require_double(a)?))),
            (ForeignFn::BinaryDouble(f), [a, b]) => Ok(Value::Double(f(require_double(a)?, require_double(b)?))),
            (ForeignFn::NilaryVoid(f), []) => {
                f();
                Ok(Value::Void)
            }
            (ForeignFn::UnaryVoidInt(f), [a]) => {
                f(require_int(a)?);
                Ok(Value::Void)
            }
            _ => Err(EngineError::runtime(
                ErrorKind::ForeignSignatureUnsupported,
                format!("call to `{name}` does not match its registered signature"),
            )),
        }
    }
}

fn require_int(v: &Value) -> Result<i64, EngineError> {
    v.as_int()
        .ok_or_else(|| EngineError::runtime(ErrorKind::TypeMismatch, "foreign call expected an integer argument"))
}

fn require_double(v: &Value) -> Result<f64, EngineError> {
    v.as_f64()
        .ok_or_else(|| EngineError::runtime(ErrorKind::TypeMismatch, "foreign call expected a floating argument"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_int_signature_round_trips() {
        let mut reg = ForeignRegistry::new();
        reg.register("add_ints", ForeignFn::BinaryInt(Box::new(|a, b| a + b)));
        let result = reg.call("add_ints", &[Value::Int(2), Value::Int(3)]).unwrap();
        assert_eq!(result, Value::Int(5));
    }

    #[test]
    fn arity_mismatch_is_unsupported_signature() {
        let mut reg = ForeignRegistry::new();
        reg.register("add_ints", ForeignFn::BinaryInt(Box::new(|a, b| a + b)));
        let err = reg.call("add_ints", &[Value::Int(2)]);
        assert!(matches!(err, Err(EngineError::Runtime(r)) if r.kind == ErrorKind::ForeignSignatureUnsupported));
    }

    #[test]
    fn unknown_function_is_function_not_found() {
        let mut reg = ForeignRegistry::new();
        let err = reg.call("missing", &[]);
        assert!(matches!(err, Err(EngineError::Runtime(r)) if r.kind == ErrorKind::FunctionNotFound));
    }
}
