//! Minimal driver binary for the `cb` interpreter core.
//!
//! Cb source text is lexed and parsed by an external front end (spec §1
//! Non-goals); this binary instead takes an already-validated AST, serialized
//! as JSON, and feeds it straight to `cb::Engine::run`. Grounded on the
//! teacher's `ouros-cli` main (`read_file`, `ExitCode`, timing via `Instant`).

use std::{env, fs, process::ExitCode, time::Instant};

use cb::ast::Program;
use cb::module_resolver::EmptyModuleResolver;
use cb::tracer::StderrTracer;
use cb::{Engine, EngineConfig};

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();
    let mut file_path = "example.json";
    let mut trace = false;
    for arg in args.iter().skip(1) {
        match arg.as_str() {
            "--trace" => trace = true,
            other => file_path = other,
        }
    }

    let source = match read_file(file_path) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };

    let program: Program = match serde_json::from_str(&source) {
        Ok(program) => program,
        Err(err) => {
            eprintln!("error: {file_path} is not a valid AST document: {err}");
            return ExitCode::FAILURE;
        }
    };

    let mut engine = Engine::new(EngineConfig::default(), Box::new(EmptyModuleResolver));
    if trace {
        engine = engine.with_tracer(Box::new(StderrTracer));
    }

    let start = Instant::now();
    let result = engine.run(&program);
    let elapsed = start.elapsed();
    print!("{}", engine.output);

    match result {
        Ok(value) => {
            eprintln!("success after {elapsed:?}, main returned {value:?}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("error after {elapsed:?}:\n{}", cb::format_unhandled(&err, &[]));
            ExitCode::FAILURE
        }
    }
}

fn read_file(file_path: &str) -> Result<String, String> {
    eprintln!("Reading AST document: {file_path}");
    match fs::metadata(file_path) {
        Ok(metadata) => {
            if !metadata.is_file() {
                return Err(format!("{file_path} is not a file"));
            }
        }
        Err(err) => {
            return Err(format!("reading {file_path}: {err}"));
        }
    }
    fs::read_to_string(file_path).map_err(|err| format!("reading {file_path}: {err}"))
}
