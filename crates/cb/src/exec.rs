//! Statement Executor (C4).
//!
//! Grounded on the teacher's tree-walking statement dispatch and on
//! `original_source`'s `executors/` directory split by statement kind
//! (`if_executor.cpp`, `loop_executor.cpp`, `declaration executors`). Loop
//! `break`/`continue` level handling follows `step_loop_signal` (C9);
//! assignment-target declaration forms are the 11 kinds from spec §4.4 that
//! arise at declaration time (the `Expr::Assign` forms live in `expr.rs`).

use crate::ast::{ArrayInit, Stmt};
use crate::composite::{assign_union, create_array, fill_array_literal, instantiate_struct};
use crate::control_flow::{ControlFlow, ExecResult, ReturnValue, Signal, step_loop_signal};
use crate::diagnostics::{EngineError, ErrorKind};
use crate::expr::eval;
use crate::interpreter::Engine;
use crate::value::Variable;

/// Executes a statement sequence in its own lexical block: pushes a scope,
/// runs each statement, then pops the scope and runs its deferred cleanup in
/// LIFO order regardless of how the block exited (spec §4.4 "Scope cleanup").
pub fn exec_block(engine: &mut Engine, stmts: &[Stmt]) -> ExecResult<()> {
    engine.scopes.push_scope();
    let result = exec_stmts(engine, stmts);
    run_scope_defers(engine, result)
}

/// Like `exec_block` but executes directly in the caller's current scope,
/// without pushing a new frame - used for a function body (the call frame is
/// pushed by `expr::call_function`) and for the top-level program (the global
/// scope).
pub fn exec_stmts(engine: &mut Engine, stmts: &[Stmt]) -> ExecResult<()> {
    for stmt in stmts {
        exec_stmt(engine, stmt)?;
    }
    Ok(())
}

fn run_scope_defers(engine: &mut Engine, result: ExecResult<()>) -> ExecResult<()> {
    let defers = engine.scopes.current_mut().take_defers_lifo();
    let mut first_defer_err = None;
    for cleanup in &defers {
        if let Err(signal) = eval(engine, cleanup) {
            first_defer_err.get_or_insert(signal);
        }
    }
    engine.scopes.pop_scope();
    match first_defer_err {
        Some(signal) => Err(signal),
        None => result,
    }
}

fn exec_stmt(engine: &mut Engine, stmt: &Stmt) -> ExecResult<()> {
    engine.tick_statement().map_err(Signal::from)?;
    match stmt {
        Stmt::VarDecl { name, ty, qualifiers, init, loc } => {
            // References bind to a referent's address at declaration time and
            // never go through the generic value-coercion path below (spec
            // §4.4 "For references, requires an initializer that is an lvalue
            // variable and stores the referent's address").
            if ty.is_reference {
                let Some(crate::ast::Expr::Variable(ref_name, rloc)) = init else {
                    return Err(err_at(
                        ErrorKind::TypeMismatch,
                        format!("reference `{name}` must be initialized from an lvalue variable"),
                        *loc,
                    ));
                };
                let target = engine
                    .scopes
                    .find_variable(ref_name)
                    .ok_or_else(|| err_at(ErrorKind::UndefinedVariable, format!("undefined variable `{ref_name}`"), *rloc))?;
                let referent = engine.scopes.resolve(target)?;
                let meta = crate::pointer::PointerMetadata::Variable {
                    target,
                    pointee: referent.type_tag,
                    pointee_const: referent.is_const,
                };
                let handle = engine.pointers.alloc(meta);
                let mut var = Variable::new(ty.tag, ty.name.clone(), crate::value::Value::Pointer(Some(handle)));
                var.is_const = qualifiers.is_const;
                var.is_reference = true;
                var.assigned = true;
                engine.scopes.current_mut().insert(name.clone(), var);
                return Ok(());
            }
            let value = match init {
                Some(expr) => {
                    let v = eval(engine, expr)?;
                    match ty.tag {
                        // `union U u = v;` validates `v` against the union's
                        // allowed-type set and tags `current_type` (spec §4.6
                        // "Union assignment", §4.4 "accepts an initializer only
                        // if its value is in the union's allowed set").
                        crate::types::TypeTag::Union if !ty.is_pointer() => {
                            let union_name = ty
                                .name
                                .as_deref()
                                .ok_or_else(|| err_at(ErrorKind::TypeMismatch, format!("union declaration `{name}` is missing a type name"), *loc))?;
                            let mut union = crate::value::UnionValue {
                                type_name: union_name.to_string(),
                                current_type: crate::types::TypeTag::Void,
                                slot: Box::new(crate::value::Value::Void),
                            };
                            assign_union(&engine.types, &mut union, v).map_err(Signal::from)?;
                            crate::value::Value::Union(union)
                        }
                        // `interface I v = x;` stores the struct snapshot `x`
                        // under `v`'s declared interface tag (spec §4.6
                        // "Interface view assignment").
                        crate::types::TypeTag::Interface if !ty.is_pointer() => {
                            let interface_name = ty
                                .name
                                .clone()
                                .ok_or_else(|| err_at(ErrorKind::TypeMismatch, format!("interface declaration `{name}` is missing a type name"), *loc))?;
                            let crate::value::Value::Struct(underlying) = v else {
                                return Err(err_at(ErrorKind::TypeMismatch, format!("interface `{name}` can only be initialized from a struct value"), *loc));
                            };
                            crate::value::Value::Interface(crate::value::InterfaceValue {
                                interface_name,
                                underlying: Box::new(underlying),
                            })
                        }
                        _ => v,
                    }
                }
                None if ty.is_pointer() => crate::value::Value::Pointer(None),
                // A bare struct declaration (`P a;`) eagerly instantiates every
                // declared member (spec §4.4, §4.6 "Struct creation"; see
                // DESIGN.md's Open Question 2 - eager, never lazy).
                None if ty.tag == crate::types::TypeTag::Struct => {
                    let struct_name = ty
                        .name
                        .as_deref()
                        .ok_or_else(|| err_at(ErrorKind::TypeMismatch, format!("struct declaration `{name}` is missing a type name"), *loc))?;
                    crate::value::Value::Struct(instantiate_struct(&engine.types, struct_name).map_err(Signal::from)?)
                }
                None => crate::value::Value::default_for(ty.tag, ty.name.as_deref()),
            };
            // A pointer declaration's `tag` names the *pointee* type (so that
            // `TypeName::pointee` can strip one level of indirection and land
            // on the right base type); the stored `Value` is always a
            // `Value::Pointer`, so the declared-vs-initializer comparison below
            // has to check against `TypeTag::Pointer`, not `ty.tag`, for a
            // pointer declaration.
            let declared_tag = if ty.is_pointer() { crate::types::TypeTag::Pointer } else { ty.tag };
            if !crate::types::coercible(declared_tag, value.type_tag()) && declared_tag != value.type_tag() {
                return Err(err_at(ErrorKind::TypeMismatch, format!("cannot initialize `{name}` of type `{}` from `{}`", declared_tag, value.type_tag()), *loc));
            }
            // A `const T* p` may point at anything, but a non-const `T* p` must
            // not capture the address of a `const T` (spec §4.5 "its address may
            // not be stored in a non-`const T*` pointer").
            if ty.is_pointer() && !ty.pointee_const {
                if let crate::value::Value::Pointer(Some(handle)) = &value {
                    if engine.pointers.get(*handle).pointee_const() {
                        return Err(err_at(
                            ErrorKind::ConstPointerViolation,
                            format!("cannot store the address of a const value in non-const pointer `{name}`"),
                            *loc,
                        ));
                    }
                }
            }
            let mut var = Variable::new(ty.tag, ty.name.clone(), value);
            var.is_const = qualifiers.is_const;
            var.is_reference = ty.is_reference;
            var.is_pointer = ty.is_pointer();
            var.pointer_depth = ty.pointer_depth;
            var.pointee_const = ty.pointee_const;
            var.pointer_const = ty.pointer_const;
            if init.is_some() {
                var.assigned = true;
            }
            engine.scopes.current_mut().insert(name.clone(), var);
            Ok(())
        }

        Stmt::ArrayDecl { name, ty, array, qualifiers, init, loc } => {
            let dims: Vec<usize> = array
                .dims
                .iter()
                .map(|d| match d {
                    crate::types::DimSize::Fixed(n) => Ok(*n),
                    crate::types::DimSize::Dynamic => Err(err_at(ErrorKind::IndexOutOfBounds, "dynamic array dimension requires an explicit initializer", *loc)),
                })
                .collect::<Result<_, _>>()
                .or_else(|e: Signal| if matches!(init, ArrayInit::Literal(_)) { Ok(Vec::new()) } else { Err(e) })?;

            let mut array_value = match init {
                ArrayInit::Default => create_array(array.element, array.element_name.clone(), &dims).map_err(Signal::from)?,
                ArrayInit::Literal(elements) => {
                    let mut values = Vec::with_capacity(elements.len());
                    for el in elements {
                        values.push(eval(engine, el)?);
                    }
                    let shape = if dims.is_empty() { vec![values.len()] } else { dims };
                    let mut arr = create_array(array.element, array.element_name.clone(), &shape).map_err(Signal::from)?;
                    fill_array_literal(&mut arr, values).map_err(Signal::from)?;
                    arr
                }
                ArrayInit::FromCall(expr) => {
                    let value = eval(engine, expr)?;
                    match value {
                        crate::value::Value::Array(arr) => arr,
                        _ => return Err(err_at(ErrorKind::TypeMismatch, "array initializer must evaluate to an array", *loc)),
                    }
                }
            };
            array_value.element_type_name = array.element_name.clone();
            let mut var = Variable::new(crate::types::TypeTag::Array, ty.name.clone(), crate::value::Value::Array(array_value));
            var.is_const = qualifiers.is_const;
            var.assigned = true;
            engine.scopes.current_mut().insert(name.clone(), var);
            Ok(())
        }

        Stmt::ExprStmt(expr) => {
            eval(engine, expr)?;
            Ok(())
        }

        Stmt::Block(body) => exec_block(engine, body),

        Stmt::If { cond, then_branch, else_branch, .. } => {
            if eval(engine, cond)?.truthy() {
                exec_stmt(engine, then_branch)
            } else if let Some(else_branch) = else_branch {
                exec_stmt(engine, else_branch)
            } else {
                Ok(())
            }
        }

        Stmt::While { cond, body, .. } => {
            while eval(engine, cond)?.truthy() {
                match exec_stmt(engine, body) {
                    Ok(()) => {}
                    Err(Signal::Flow(ControlFlow::Break(n))) => match step_loop_signal(ControlFlow::Break(n)) {
                        None => break,
                        Some(flow) => return Err(Signal::Flow(flow)),
                    },
                    Err(Signal::Flow(ControlFlow::Continue(n))) => match step_loop_signal(ControlFlow::Continue(n)) {
                        None => continue,
                        Some(flow) => return Err(Signal::Flow(flow)),
                    },
                    other => return other,
                }
            }
            Ok(())
        }

        Stmt::For { init, cond, step, body, .. } => {
            engine.scopes.push_scope();
            let result = (|| -> ExecResult<()> {
                if let Some(init) = init {
                    exec_stmt(engine, init)?;
                }
                loop {
                    if let Some(cond) = cond {
                        if !eval(engine, cond)?.truthy() {
                            break;
                        }
                    }
                    match exec_stmt(engine, body) {
                        Ok(()) => {}
                        Err(Signal::Flow(ControlFlow::Break(n))) => match step_loop_signal(ControlFlow::Break(n)) {
                            None => break,
                            Some(flow) => return Err(Signal::Flow(flow)),
                        },
                        Err(Signal::Flow(ControlFlow::Continue(n))) => match step_loop_signal(ControlFlow::Continue(n)) {
                            None => {}
                            Some(flow) => return Err(Signal::Flow(flow)),
                        },
                        other => return other,
                    }
                    if let Some(step) = step {
                        eval(engine, step)?;
                    }
                }
                Ok(())
            })();
            run_scope_defers(engine, result)
        }

        Stmt::Return(expr, _) => {
            let rv = match expr {
                Some(expr) => ReturnValue::Value(eval(engine, expr)?),
                None => ReturnValue::Void,
            };
            Err(Signal::Flow(ControlFlow::Return(rv)))
        }

        Stmt::Break(n, _) => Err(Signal::Flow(ControlFlow::Break(*n))),
        Stmt::Continue(n, _) => Err(Signal::Flow(ControlFlow::Continue(*n))),

        Stmt::Defer(expr, _) => {
            engine.scopes.current_mut().defer(expr.clone());
            Ok(())
        }

        // Declarations are hoisted into their respective tables before any
        // statement body executes (see `interpreter::declare_program`); seeing
        // one here mid-execution (e.g. a local `fn` inside a block) is a no-op
        // re-registration.
        Stmt::FuncDecl(_)
        | Stmt::StructDecl(_)
        | Stmt::EnumDecl(_)
        | Stmt::UnionDecl(_)
        | Stmt::InterfaceDecl(_)
        | Stmt::ImplBlock(_)
        | Stmt::ForeignModule { .. } => Ok(()),

        Stmt::NamespaceDecl { path, body, .. } => {
            engine.current_namespace.extend(path.iter().cloned());
            let result = exec_stmts(engine, body);
            let floor = engine.current_namespace.len() - path.len();
            engine.current_namespace.truncate(floor);
            result
        }

        Stmt::Using { path, .. } => {
            engine.using_stack.last_mut().expect("using stack never empty").push(path.clone());
            Ok(())
        }

        Stmt::Import { module_name, loc } => {
            if !engine.loaded_modules.mark_loaded(module_name) {
                return Ok(());
            }
            let program = engine.modules.resolve(module_name).map_err(|e| promote_loc(e, *loc))?;
            crate::interpreter::declare_program(engine, &program);
            exec_stmts(engine, &program.items)
        }
    }
}

fn err_at(kind: ErrorKind, msg: impl Into<String>, loc: crate::ast::CodeLoc) -> Signal {
    Signal::Error(EngineError::runtime_at(kind, msg, loc))
}

fn promote_loc(err: EngineError, loc: crate::ast::CodeLoc) -> Signal {
    match err {
        EngineError::Runtime(rt) if rt.loc.is_none() => Signal::Error(EngineError::Runtime(Box::new(rt.at(loc)))),
        other => Signal::Error(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BinOp, CodeLoc, Expr, Qualifiers};
    use crate::interpreter::{Engine, EngineConfig};
    use crate::module_resolver::EmptyModuleResolver;
    use crate::types::TypeName;
    use crate::types::TypeTag;
    use crate::value::Value;

    fn engine() -> Engine {
        Engine::new(EngineConfig::default(), Box::new(EmptyModuleResolver))
    }

    fn loc() -> CodeLoc {
        CodeLoc::default()
    }

    #[test]
    fn var_decl_without_initializer_is_zeroed() {
        let mut e = engine();
        let stmt = Stmt::VarDecl {
            name: "x".into(),
            ty: TypeName::scalar(TypeTag::Int),
            qualifiers: Qualifiers::default(),
            init: None,
            loc: loc(),
        };
        exec_stmt(&mut e, &stmt).unwrap();
        let handle = e.scopes.find_variable("x").unwrap();
        assert_eq!(e.scopes.resolve(handle).unwrap().value, Value::Int(0));
    }

    #[test]
    fn while_break_stops_the_loop() {
        let mut e = engine();
        e.scopes.current_mut().insert("i", Variable::new(TypeTag::Int, None, Value::Int(0)));
        let body = Stmt::Block(vec![
            Stmt::ExprStmt(Expr::Assign {
                target: Box::new(Expr::Variable("i".into(), loc())),
                value: Box::new(Expr::Binary {
                    op: BinOp::Add,
                    lhs: Box::new(Expr::Variable("i".into(), loc())),
                    rhs: Box::new(Expr::IntLit(1, loc())),
                    loc: loc(),
                }),
                loc: loc(),
            }),
            Stmt::Break(1, loc()),
        ]);
        let stmt = Stmt::While {
            cond: Expr::BoolLit(true, loc()),
            body: Box::new(body),
            loc: loc(),
        };
        exec_stmt(&mut e, &stmt).unwrap();
        let handle = e.scopes.find_variable("i").unwrap();
        assert_eq!(e.scopes.resolve(handle).unwrap().value, Value::Int(1));
    }

    #[test]
    fn nested_break_level_propagates_outward() {
        assert_eq!(step_loop_signal(ControlFlow::Break(2)), Some(ControlFlow::Break(1)));
    }

    #[test]
    fn defer_runs_at_scope_exit() {
        let mut e = engine();
        e.scopes.global_mut().insert("log", Variable::new(TypeTag::Int, None, Value::Int(0)));
        let body = vec![
            Stmt::Defer(
                Expr::Assign {
                    target: Box::new(Expr::Variable("log".into(), loc())),
                    value: Box::new(Expr::IntLit(1, loc())),
                    loc: loc(),
                },
                loc(),
            ),
            Stmt::ExprStmt(Expr::Assign {
                target: Box::new(Expr::Variable("log".into(), loc())),
                value: Box::new(Expr::IntLit(0, loc())),
                loc: loc(),
            }),
        ];
        exec_block(&mut e, &body).unwrap();
        let handle = e.scopes.find_variable("log").unwrap();
        assert_eq!(e.scopes.resolve(handle).unwrap().value, Value::Int(1));
    }

    #[test]
    fn return_unwinds_through_nested_block() {
        let mut e = engine();
        let inner = Stmt::Block(vec![Stmt::Return(Some(Expr::IntLit(42, loc())), loc())]);
        let result = exec_stmt(&mut e, &inner);
        match result {
            Err(Signal::Flow(ControlFlow::Return(ReturnValue::Value(Value::Int(42))))) => {}
            other => panic!("expected Return(42), got {other:?}"),
        }
    }
}
