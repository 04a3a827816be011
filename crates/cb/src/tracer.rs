//! Pluggable execution tracing (SPEC_FULL.md §4.11 "Logging / Tracing").
//!
//! Grounded on the teacher's `tracer.rs`: the crate carries no logging
//! framework, instead exposing a `Tracer` trait the interpreter calls at
//! well-known points, with a zero-overhead `NoopTracer` default and a
//! `StderrTracer` for human-readable diagnosis.

use crate::ast::CodeLoc;
use crate::diagnostics::RuntimeError;

pub trait Tracer {
    fn on_call(&mut self, function: &str, loc: CodeLoc) {
        let _ = (function, loc);
    }
    fn on_return(&mut self, function: &str) {
        let _ = function;
    }
    fn on_statement(&mut self, loc: CodeLoc) {
        let _ = loc;
    }
    fn on_error(&mut self, err: &RuntimeError) {
        let _ = err;
    }
}

/// Default sink: discards every event.
#[derive(Debug, Default)]
pub struct NoopTracer;

impl Tracer for NoopTracer {}

/// Prints one line per call/error to stderr; wired up by the CLI's `--trace` flag.
#[derive(Debug, Default)]
pub struct StderrTracer;

impl Tracer for StderrTracer {
    fn on_call(&mut self, function: &str, loc: CodeLoc) {
        eprintln!("call {function} at {}:{}", loc.line, loc.col);
    }

    fn on_return(&mut self, function: &str) {
        eprintln!("return from {function}");
    }

    fn on_error(&mut self, err: &RuntimeError) {
        eprintln!("error: {err}");
    }
}

/// Records every event for later inspection; used by tests that assert on call
/// order without printing anything.
#[derive(Debug, Default)]
pub struct RecordingTracer {
    pub calls: Vec<String>,
    pub returns: Vec<String>,
    pub errors: Vec<String>,
}

impl Tracer for RecordingTracer {
    fn on_call(&mut self, function: &str, _loc: CodeLoc) {
        self.calls.push(function.to_string());
    }

    fn on_return(&mut self, function: &str) {
        self.returns.push(function.to_string());
    }

    fn on_error(&mut self, err: &RuntimeError) {
        self.errors.push(err.to_string());
    }
}
