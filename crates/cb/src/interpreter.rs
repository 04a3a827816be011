//! Engine wiring & entry point (spec §2 "Data flows top-down from
//! `Interpreter.run(program)`").
//!
//! Grounded on the teacher's `Runner`/`Machine` split - one struct owning every
//! collaborator module needs (scope store, type tables, function table, FFI
//! registry, module resolver, tracer, resource limits) - constructed once from
//! a host-supplied `EngineConfig` and then driven by `run`. `declare_program`
//! mirrors the teacher's two-pass load (hoist declarations, then execute) so
//! forward references to a function or type declared later in the same file
//! resolve correctly, and so a freshly imported module's declarations are
//! visible before its own top-level statements run.

use crate::ast::{CodeLoc, Program, Stmt};
use crate::composite::TypeDefs;
use crate::control_flow::{ControlFlow, ExecResult, Signal};
use crate::diagnostics::{EngineError, EngineResult, ErrorKind};
use crate::ffi::ForeignRegistry;
use crate::function::FunctionTable;
use crate::intern::Interns;
use crate::module_resolver::{DEFAULT_SEARCH_ORDER, LoadedModules, ModuleResolver};
use crate::namespace::{NamespaceRegistry, UsingDirectives};
use crate::pointer::PointerArena;
use crate::resource::{DepthLimitTracker, NoLimitTracker, ResourceTracker};
use crate::scope::ScopeStack;
use crate::task::{Clock, ManualClock, Scheduler};
use crate::tracer::{NoopTracer, Tracer};
use crate::value::Value;

/// Host-supplied configuration (SPEC_FULL.md §4.12 "Configuration"): where
/// imports are searched for, the limits a sandboxed embedding wants enforced,
/// and a couple of debug toggles the CLI exposes as flags.
pub struct EngineConfig {
    /// Search-path precedence handed to embedding `ModuleResolver`s - the core
    /// never walks these itself (spec §6), but carries them so a resolver
    /// built from `EngineConfig` alone has everything `DEFAULT_SEARCH_ORDER`
    /// would otherwise hard-code.
    pub module_search_paths: Vec<String>,
    /// Caps call-stack depth via `DepthLimitTracker`; `None` uses `NoLimitTracker`.
    pub max_recursion_depth: Option<usize>,
    /// Caps the total number of statements a single `run` may execute, as a
    /// coarse runaway-script guard; `None` disables the check.
    pub max_statements: Option<usize>,
    /// Logs every `import` resolution attempt via the tracer.
    pub verbose_import: bool,
    /// Logs every generic instantiation (cache hit or miss) via the tracer.
    pub trace_generics: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            module_search_paths: DEFAULT_SEARCH_ORDER.iter().map(|s| (*s).to_string()).collect(),
            max_recursion_depth: None,
            max_statements: None,
            verbose_import: false,
            trace_generics: false,
        }
    }
}

/// Owns every collaborator the interpreter's modules need and is threaded as
/// `&mut Engine` through `exec`/`expr` (spec §2's "central state" shape).
pub struct Engine {
    pub scopes: ScopeStack,
    pub pointers: PointerArena,
    pub types: TypeDefs,
    pub functions: FunctionTable,
    pub namespaces: NamespaceRegistry,
    /// Per-scope-depth `using namespace N;` lists (spec §4.8). Index 0 is the
    /// file-scope list; nested scopes do not currently get their own frame; see
    /// DESIGN.md for why a single accumulating list was chosen over a full
    /// per-scope stack.
    pub using_stack: Vec<UsingDirectives>,
    /// Path components of the namespace currently executing, pushed/popped by
    /// `exec::exec_stmt`'s `NamespaceDecl` arm.
    pub current_namespace: Vec<String>,
    pub foreign: ForeignRegistry,
    pub modules: Box<dyn ModuleResolver>,
    pub loaded_modules: LoadedModules,
    pub resources: Box<dyn ResourceTracker>,
    pub tracer: Box<dyn Tracer>,
    /// Cooperative task scheduler (spec §5); the AST carries no `spawn`/`await`
    /// node yet, so this is populated only by a host embedding that drives it
    /// directly through the public API.
    pub tasks: Scheduler,
    pub clock: Box<dyn Clock>,
    /// Accumulated `print`/`println` output (spec §4.3 "builtin output").
    pub output: String,
    /// Identifier interning table (C1/C8 support). Not consulted on the hot
    /// lookup path - `Scope` and `NamespaceRegistry` dedupe through their own
    /// hash maps - but exposed for a host embedding that wants to dedupe
    /// repeated identifier strings (e.g. many `member` names from a generated
    /// AST) before handing a `Program` to `run`.
    pub interns: Interns,
    statements_executed: usize,
    pub config: EngineConfig,
}

impl Engine {
    pub fn new(config: EngineConfig, modules: Box<dyn ModuleResolver>) -> Self {
        let resources: Box<dyn ResourceTracker> = match config.max_recursion_depth {
            Some(limit) => Box::new(DepthLimitTracker::new(limit)),
            None => Box::new(NoLimitTracker::default()),
        };
        Self {
            scopes: ScopeStack::new(),
            pointers: PointerArena::new(),
            types: TypeDefs::new(),
            functions: FunctionTable::new(),
            namespaces: NamespaceRegistry::new(),
            using_stack: vec![UsingDirectives::default()],
            current_namespace: Vec::new(),
            foreign: ForeignRegistry::new(),
            modules,
            loaded_modules: LoadedModules::new(),
            resources,
            tracer: Box::new(NoopTracer),
            tasks: Scheduler::new(),
            clock: Box::new(ManualClock::default()),
            output: String::new(),
            interns: Interns::new(),
            statements_executed: 0,
            config,
        }
    }

    #[must_use]
    pub fn with_tracer(mut self, tracer: Box<dyn Tracer>) -> Self {
        self.tracer = tracer;
        self
    }

    /// Bumps the statement counter and rejects once `config.max_statements` is
    /// exceeded (SPEC_FULL.md §4.12); called once per statement by
    /// `exec::exec_stmt` so the limit covers nested blocks, loop bodies, and
    /// called functions alike.
    pub fn tick_statement(&mut self) -> Result<(), EngineError> {
        let Some(max) = self.config.max_statements else {
            return Ok(());
        };
        self.statements_executed += 1;
        if self.statements_executed > max {
            return Err(EngineError::runtime(
                ErrorKind::RuntimeGeneric,
                format!("statement budget of {max} exceeded"),
            ));
        }
        Ok(())
    }

    /// Declares every top-level item, executes the program's top-level
    /// statements (script-style side effects, if any), then - when the program
    /// declares a `main` - calls it with no arguments and returns what it
    /// returns (spec §2 "Data flows top-down from `Interpreter.run(program)`").
    pub fn run(&mut self, program: &Program) -> EngineResult<Value> {
        declare_program(self, program);
        toplevel_signal_to_result(crate::exec::exec_stmts(self, &program.items))?;
        match self.functions.by_name("main") {
            Some(main_id) => call_signal_to_result(crate::expr::call_function(self, main_id, crate::expr::ArgValues::new(), "main", CodeLoc::default())),
            None => Ok(Value::Void),
        }
    }
}

fn toplevel_signal_to_result(result: ExecResult<()>) -> EngineResult<()> {
    match result {
        Ok(()) => Ok(()),
        // A bare top-level `return` just ends the script early.
        Err(Signal::Flow(ControlFlow::Return(_))) => Ok(()),
        Err(Signal::Flow(ControlFlow::Break(_) | ControlFlow::Continue(_))) => {
            Err(EngineError::internal("break/continue statement outside of any loop"))
        }
        Err(Signal::Error(e)) => Err(e),
    }
}

fn call_signal_to_result(result: ExecResult<Value>) -> EngineResult<Value> {
    match result {
        Ok(v) => Ok(v),
        Err(Signal::Error(e)) => Err(e),
        Err(Signal::Flow(_)) => Err(EngineError::internal("control-flow signal escaped `main`")),
    }
}

/// Hoists every top-level (and namespace-nested) declaration into its
/// respective table before any statement body executes - functions, structs,
/// enums, unions, interfaces, `impl` method tables, and namespace symbol
/// entries - so forward references resolve regardless of declaration order
/// (spec §4.1, §4.8). Called once for the program itself and again for each
/// freshly resolved `import` (see `exec::exec_stmt`'s `Import` arm).
pub fn declare_program(engine: &mut Engine, program: &Program) {
    declare_items(engine, &program.items, &[]);
}

fn declare_items(engine: &mut Engine, items: &[Stmt], namespace: &[String]) {
    for item in items {
        declare_item(engine, item, namespace);
    }
}

fn declare_item(engine: &mut Engine, item: &Stmt, namespace: &[String]) {
    match item {
        Stmt::FuncDecl(def) => {
            let id = engine.functions.declare(def.clone());
            if !namespace.is_empty() {
                engine.namespaces.register(namespace, &def.name, id, true);
            }
        }
        Stmt::StructDecl(def) => engine.types.declare_struct(def.clone()),
        Stmt::EnumDecl(def) => engine.types.declare_enum(def.clone()),
        Stmt::UnionDecl(def) => engine.types.declare_union(def.clone()),
        Stmt::InterfaceDecl(def) => engine.types.declare_interface(def.clone()),
        Stmt::ImplBlock(def) => {
            for method in &def.methods {
                engine.functions.declare_method(&def.struct_name, method.clone());
                if let Some(interface) = &def.interface_name {
                    engine.functions.declare_interface_method(interface, &def.struct_name, method.clone());
                }
            }
        }
        Stmt::NamespaceDecl { path, body, .. } => {
            let mut full = namespace.to_vec();
            full.extend(path.iter().cloned());
            declare_items(engine, body, &full);
        }
        // Declared foreign signatures are a host-embedding contract (spec §6);
        // the closures themselves are registered directly into
        // `engine.foreign` by whoever constructs the `Engine`, not derived
        // from the AST node.
        Stmt::ForeignModule { .. } => {}
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::FuncDef;
    use crate::module_resolver::EmptyModuleResolver;
    use crate::types::{TypeName, TypeTag};
    use crate::value::Value;

    fn engine() -> Engine {
        Engine::new(EngineConfig::default(), Box::new(EmptyModuleResolver))
    }

    fn func(name: &str, body: Vec<Stmt>) -> FuncDef {
        FuncDef {
            name: name.to_string(),
            type_params: Vec::new(),
            params: Vec::new(),
            return_type: TypeName::scalar(TypeTag::Int),
            body,
            loc: CodeLoc::default(),
        }
    }

    #[test]
    fn run_calls_main_and_returns_its_value() {
        let mut e = engine();
        let program = Program {
            items: vec![Stmt::FuncDecl(func(
                "main",
                vec![Stmt::Return(Some(crate::ast::Expr::IntLit(7, CodeLoc::default())), CodeLoc::default())],
            ))],
        };
        assert_eq!(e.run(&program).unwrap(), Value::Int(7));
    }

    #[test]
    fn run_without_main_executes_top_level_statements_only() {
        let mut e = engine();
        let program = Program {
            items: vec![Stmt::VarDecl {
                name: "x".into(),
                ty: TypeName::scalar(TypeTag::Int),
                qualifiers: crate::ast::Qualifiers::default(),
                init: Some(crate::ast::Expr::IntLit(5, CodeLoc::default())),
                loc: CodeLoc::default(),
            }],
        };
        assert_eq!(e.run(&program).unwrap(), Value::Void);
        let handle = e.scopes.find_variable("x").unwrap();
        assert_eq!(e.scopes.resolve(handle).unwrap().value, Value::Int(5));
    }

    #[test]
    fn forward_reference_to_a_later_function_resolves() {
        let mut e = engine();
        let program = Program {
            items: vec![
                Stmt::FuncDecl(func(
                    "main",
                    vec![Stmt::Return(
                        Some(crate::ast::Expr::Call {
                            callee: Box::new(crate::ast::Expr::Variable("later".into(), CodeLoc::default())),
                            args: Vec::new(),
                            generic_args: Vec::new(),
                            loc: CodeLoc::default(),
                        }),
                        CodeLoc::default(),
                    )],
                )),
                Stmt::FuncDecl(func("later", vec![Stmt::Return(Some(crate::ast::Expr::IntLit(99, CodeLoc::default())), CodeLoc::default())])),
            ],
        };
        assert_eq!(e.run(&program).unwrap(), Value::Int(99));
    }

    #[test]
    fn statement_budget_is_enforced() {
        let mut config = EngineConfig::default();
        config.max_statements = Some(2);
        let mut e = Engine::new(config, Box::new(EmptyModuleResolver));
        let program = Program {
            items: vec![
                Stmt::ExprStmt(crate::ast::Expr::IntLit(1, CodeLoc::default())),
                Stmt::ExprStmt(crate::ast::Expr::IntLit(2, CodeLoc::default())),
                Stmt::ExprStmt(crate::ast::Expr::IntLit(3, CodeLoc::default())),
            ],
        };
        let err = e.run(&program);
        assert!(matches!(err, Err(EngineError::Runtime(r)) if r.kind == ErrorKind::RuntimeGeneric));
    }

    #[test]
    fn namespaced_function_is_reachable_by_qualified_call() {
        let mut e = engine();
        let program = Program {
            items: vec![
                Stmt::NamespaceDecl {
                    path: vec!["math".into()],
                    body: vec![Stmt::FuncDecl(func("square", vec![Stmt::Return(Some(crate::ast::Expr::IntLit(81, CodeLoc::default())), CodeLoc::default())]))],
                    loc: CodeLoc::default(),
                },
                Stmt::FuncDecl(func(
                    "main",
                    vec![Stmt::Return(
                        Some(crate::ast::Expr::Call {
                            callee: Box::new(crate::ast::Expr::Variable("math::square".into(), CodeLoc::default())),
                            args: Vec::new(),
                            generic_args: Vec::new(),
                            loc: CodeLoc::default(),
                        }),
                        CodeLoc::default(),
                    )],
                )),
            ],
        };
        assert_eq!(e.run(&program).unwrap(), Value::Int(81));
    }

    #[test]
    fn declare_program_registers_impl_methods() {
        let mut e = engine();
        let def = crate::ast::ImplDef {
            type_params: Vec::new(),
            interface_name: None,
            struct_name: "Counter".into(),
            methods: vec![func("bump", Vec::new())],
        };
        declare_program(&mut e, &Program { items: vec![Stmt::ImplBlock(def)] });
        assert!(e.functions.method("Counter", "bump").is_some());
    }
}
