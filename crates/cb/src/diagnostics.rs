//! Runtime error variants and top-level error formatting (spec §7).
//!
//! Grounded on the teacher's `exception_private.rs` (a `strum`-derived `ExcType`
//! enum paired with a `RunError` wrapper distinguishing interpreter-internal bugs
//! from user-surfaced exceptions) and `resource.rs`'s `ResourceError`/`Display`
//! pairing. `ErrorKind` is the closed set named in spec §7; `EngineError` is the
//! crate-wide `Result` error type, split into `Internal` (a contract violation by
//! the external AST/module producer - never user-caused) and `Runtime` (a
//! `RuntimeError` a `try`/`checked` expression can catch, per spec §7's
//! propagation policy).

use std::{borrow::Cow, fmt};

use strum::{Display, EnumString, IntoStaticStr};

use crate::ast::CodeLoc;

/// The closed set of runtime error variants named in spec §7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr)]
pub enum ErrorKind {
    DivisionByZero,
    NullPointer,
    IndexOutOfBounds,
    PointerOutOfBounds,
    TypeMismatch,
    ModuleNotFound,
    FunctionNotFound,
    UndefinedVariable,
    ConstReassignment,
    ConstPointerViolation,
    StructMemberNotFound,
    UnionValueNotAllowed,
    InterfaceMethodNotFound,
    DanglingPointer,
    ForeignSignatureUnsupported,
    RuntimeGeneric,
}

/// One call-stack frame, pushed on function entry and popped on exit (spec §7
/// "Stack trace").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame {
    pub function: String,
    pub module: String,
    pub file: String,
    pub loc: CodeLoc,
}

/// A user-surfaced runtime error: variant, message, and (when available) source
/// location plus the call stack active when it was raised.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeError {
    pub kind: ErrorKind,
    pub message: String,
    pub loc: Option<CodeLoc>,
    pub frames: Vec<StackFrame>,
}

impl RuntimeError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            loc: None,
            frames: Vec::new(),
        }
    }

    #[must_use]
    pub fn at(mut self, loc: CodeLoc) -> Self {
        self.loc = Some(loc);
        self
    }

    #[must_use]
    pub fn with_frames(mut self, frames: Vec<StackFrame>) -> Self {
        self.frames = frames;
        self
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)?;
        if let Some(loc) = self.loc {
            write!(f, " at {}:{}", loc.line, loc.col)?;
        }
        Ok(())
    }
}

impl std::error::Error for RuntimeError {}

/// The crate-wide error type.
///
/// `Internal` represents a contract violation by an external collaborator (a
/// malformed AST node, a module resolver that returns garbage) - an interpreter
/// bug, not user error - mirroring the teacher's `RunError::Internal` vs
/// `RunError::Exc` split.
#[derive(Debug, Clone)]
pub enum EngineError {
    Internal(Cow<'static, str>),
    Runtime(Box<RuntimeError>),
}

pub type EngineResult<T> = Result<T, EngineError>;

impl EngineError {
    pub fn internal(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn runtime(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::Runtime(Box::new(RuntimeError::new(kind, message)))
    }

    pub fn runtime_at(kind: ErrorKind, message: impl Into<String>, loc: CodeLoc) -> Self {
        Self::Runtime(Box::new(RuntimeError::new(kind, message).at(loc)))
    }

    /// The error variant as seen by `try`/`checked` (spec §4.3): categorized
    /// errors keep their kind, `checked` tags uncategorized internal failures
    /// `CheckedError`, `try` tags them `Custom`. `CheckedError`/`Custom` are not
    /// part of `ErrorKind` since they only ever arise from this conversion path,
    /// not from a direct raise inside the core - represented as plain strings.
    pub fn as_runtime(&self) -> Option<&RuntimeError> {
        match self {
            Self::Runtime(r) => Some(r),
            Self::Internal(_) => None,
        }
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Internal(msg) => write!(f, "internal error: {msg}"),
            Self::Runtime(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<RuntimeError> for EngineError {
    fn from(err: RuntimeError) -> Self {
        Self::Runtime(Box::new(err))
    }
}

/// Formats an unhandled error the way the top-level driver prints it: frames
/// innermost-to-outermost, each with its source line and a caret at the
/// reported column (spec §7).
pub fn format_unhandled(err: &EngineError, source_lines: &[&str]) -> String {
    let mut out = String::new();
    match err {
        EngineError::Internal(msg) => {
            out.push_str(&format!("internal error: {msg}\n"));
        }
        EngineError::Runtime(rt) => {
            out.push_str(&format!("error: {}: {}\n", rt.kind, rt.message));
            for frame in &rt.frames {
                out.push_str(&format!(
                    "  at {} ({}:{}:{})\n",
                    frame.function, frame.file, frame.loc.line, frame.loc.col
                ));
            }
            if let Some(loc) = rt.loc {
                if let Some(line) = source_lines.get(loc.line.saturating_sub(1) as usize) {
                    out.push_str(&format!("    {line}\n"));
                    out.push_str(&format!("    {}^\n", " ".repeat(loc.col.saturating_sub(1) as usize)));
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_location() {
        let err = RuntimeError::new(ErrorKind::DivisionByZero, "divide by zero").at(CodeLoc::new(3, 7));
        assert_eq!(err.to_string(), "DivisionByZero: divide by zero at 3:7");
    }

    #[test]
    fn formats_frames_innermost_first() {
        let rt = RuntimeError::new(ErrorKind::NullPointer, "deref of null").with_frames(vec![
            StackFrame {
                function: "inner".into(),
                module: "main".into(),
                file: "a.cb".into(),
                loc: CodeLoc::new(2, 1),
            },
            StackFrame {
                function: "outer".into(),
                module: "main".into(),
                file: "a.cb".into(),
                loc: CodeLoc::new(9, 1),
            },
        ]);
        let formatted = format_unhandled(&EngineError::Runtime(Box::new(rt)), &[]);
        let inner_pos = formatted.find("inner").unwrap();
        let outer_pos = formatted.find("outer").unwrap();
        assert!(inner_pos < outer_pos);
    }
}
