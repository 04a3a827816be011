//! End-to-end scenarios S1-S6 (spec §8 "End-to-end scenarios (literal I/O)").
//!
//! Each scenario hand-builds the AST the corresponding source snippet would
//! parse to (the lexer/parser is out of scope, spec §1) and drives it through
//! `Engine::run`, asserting on `engine.output` and/or the returned error.

use cb::ast::{
    ArrayInit, BinOp, CodeLoc, Expr, FuncDef, LiteralField, Param, Program, Qualifiers, Stmt, StructDef, MemberDef,
};
use cb::diagnostics::{EngineError, ErrorKind};
use cb::module_resolver::EmptyModuleResolver;
use cb::types::{ArrayTypeInfo, DimSize, TypeName, TypeTag};
use cb::{Engine, EngineConfig};

fn loc() -> CodeLoc {
    CodeLoc::default()
}

fn engine() -> Engine {
    Engine::new(EngineConfig::default(), Box::new(EmptyModuleResolver))
}

fn var(name: &str) -> Expr {
    Expr::Variable(name.to_string(), loc())
}

fn int(v: i64) -> Expr {
    Expr::IntLit(v, loc())
}

fn call(name: &str, args: Vec<Expr>) -> Expr {
    Expr::Call {
        callee: Box::new(var(name)),
        args,
        generic_args: Vec::new(),
        loc: loc(),
    }
}

fn main_func(body: Vec<Stmt>) -> FuncDef {
    FuncDef {
        name: "main".to_string(),
        type_params: Vec::new(),
        params: Vec::new(),
        return_type: TypeName::scalar(TypeTag::Int),
        body,
        loc: loc(),
    }
}

/// S1 - Arithmetic & printing.
/// `int main(){ int a = 2; int b = 3; print(a * b + 1); return 0; }`
#[test]
fn s1_arithmetic_and_printing() {
    let mut e = engine();
    let program = Program {
        items: vec![Stmt::FuncDecl(main_func(vec![
            Stmt::VarDecl {
                name: "a".into(),
                ty: TypeName::scalar(TypeTag::Int),
                qualifiers: Qualifiers::default(),
                init: Some(int(2)),
                loc: loc(),
            },
            Stmt::VarDecl {
                name: "b".into(),
                ty: TypeName::scalar(TypeTag::Int),
                qualifiers: Qualifiers::default(),
                init: Some(int(3)),
                loc: loc(),
            },
            Stmt::ExprStmt(call(
                "print",
                vec![Expr::Binary {
                    op: BinOp::Add,
                    lhs: Box::new(Expr::Binary {
                        op: BinOp::Mul,
                        lhs: Box::new(var("a")),
                        rhs: Box::new(var("b")),
                        loc: loc(),
                    }),
                    rhs: Box::new(int(1)),
                    loc: loc(),
                }],
            )),
            Stmt::Return(Some(int(0)), loc()),
        ]))],
    };
    let result = e.run(&program).unwrap();
    assert_eq!(result, cb::Value::Int(0));
    assert_eq!(e.output, "7");
}

/// S2 - Pointer arithmetic on array.
/// `int[4] a = [10,20,30,40]; int* p = &a[1]; p = p + 2; print(*p);`
#[test]
fn s2_pointer_arithmetic_on_array() {
    let mut e = engine();
    let int_ptr = TypeName {
        pointer_depth: 1,
        ..TypeName::scalar(TypeTag::Int)
    };
    let program = Program {
        items: vec![
            Stmt::ArrayDecl {
                name: "a".into(),
                ty: TypeName::scalar(TypeTag::Int),
                array: ArrayTypeInfo {
                    element: TypeTag::Int,
                    element_name: None,
                    dims: vec![DimSize::Fixed(4)],
                },
                qualifiers: Qualifiers::default(),
                init: ArrayInit::Literal(vec![int(10), int(20), int(30), int(40)]),
                loc: loc(),
            },
            Stmt::VarDecl {
                name: "p".into(),
                ty: int_ptr,
                qualifiers: Qualifiers::default(),
                init: Some(Expr::AddressOf {
                    operand: Box::new(Expr::ArrayRef {
                        base: Box::new(var("a")),
                        index: Box::new(int(1)),
                        loc: loc(),
                    }),
                    loc: loc(),
                }),
                loc: loc(),
            },
            Stmt::ExprStmt(Expr::Assign {
                target: Box::new(var("p")),
                value: Box::new(Expr::Binary {
                    op: BinOp::Add,
                    lhs: Box::new(var("p")),
                    rhs: Box::new(int(2)),
                    loc: loc(),
                }),
                loc: loc(),
            }),
            Stmt::ExprStmt(call(
                "print",
                vec![Expr::Dereference {
                    operand: Box::new(var("p")),
                    loc: loc(),
                }],
            )),
        ],
    };
    e.run(&program).unwrap();
    assert_eq!(e.output, "40");
}

/// S3 - Const violation.
/// `const int x = 1; int* p = &x;`
#[test]
fn s3_const_violation_is_reported_with_no_output() {
    let mut e = engine();
    let int_ptr = TypeName {
        pointer_depth: 1,
        ..TypeName::scalar(TypeTag::Int)
    };
    let program = Program {
        items: vec![
            Stmt::VarDecl {
                name: "x".into(),
                ty: TypeName::scalar(TypeTag::Int),
                qualifiers: Qualifiers { is_const: true, is_static: false },
                init: Some(int(1)),
                loc: loc(),
            },
            Stmt::VarDecl {
                name: "p".into(),
                ty: int_ptr,
                qualifiers: Qualifiers::default(),
                init: Some(Expr::AddressOf {
                    operand: Box::new(var("x")),
                    loc: loc(),
                }),
                loc: loc(),
            },
        ],
    };
    let err = e.run(&program).unwrap_err();
    match err {
        EngineError::Runtime(rt) => assert_eq!(rt.kind, ErrorKind::ConstPointerViolation),
        other => panic!("expected a ConstPointerViolation runtime error, got {other:?}"),
    }
    assert_eq!(e.output, "");
}

/// S4 - Struct member sync.
/// ```
/// struct P { int x; int y; }
/// P a = {1, 2}; P* p = &a; p->x = 9; print(a.x);
/// ```
#[test]
fn s4_struct_member_sync_through_a_pointer() {
    let mut e = engine();
    e.types.declare_struct(StructDef {
        name: "P".into(),
        type_params: Vec::new(),
        members: vec![
            MemberDef { name: "x".into(), ty: TypeName::scalar(TypeTag::Int), is_const: false },
            MemberDef { name: "y".into(), ty: TypeName::scalar(TypeTag::Int), is_const: false },
        ],
    });
    let p_ptr = TypeName {
        pointer_depth: 1,
        ..TypeName::named(TypeTag::Struct, "P")
    };
    let program = Program {
        items: vec![
            Stmt::VarDecl {
                name: "a".into(),
                ty: TypeName::named(TypeTag::Struct, "P"),
                qualifiers: Qualifiers::default(),
                init: Some(Expr::StructLiteral {
                    type_name: Some("P".into()),
                    fields: vec![LiteralField::Positional(int(1)), LiteralField::Positional(int(2))],
                    loc: loc(),
                }),
                loc: loc(),
            },
            Stmt::VarDecl {
                name: "p".into(),
                ty: p_ptr,
                qualifiers: Qualifiers::default(),
                init: Some(Expr::AddressOf {
                    operand: Box::new(var("a")),
                    loc: loc(),
                }),
                loc: loc(),
            },
            Stmt::ExprStmt(Expr::Assign {
                target: Box::new(Expr::ArrowAccess {
                    base: Box::new(var("p")),
                    member: "x".into(),
                    loc: loc(),
                }),
                value: Box::new(int(9)),
                loc: loc(),
            }),
            Stmt::ExprStmt(call(
                "print",
                vec![Expr::MemberAccess {
                    base: Box::new(var("a")),
                    member: "x".into(),
                    loc: loc(),
                }],
            )),
        ],
    };
    e.run(&program).unwrap();
    assert_eq!(e.output, "9");
}

/// S5 - Ternary with heterogeneous branches.
/// `int main(){ int n = 0; string s = n == 0 ? "zero" : "nonzero"; print(s); return 0; }`
#[test]
fn s5_ternary_with_heterogeneous_branches() {
    let mut e = engine();
    let program = Program {
        items: vec![Stmt::FuncDecl(main_func(vec![
            Stmt::VarDecl {
                name: "n".into(),
                ty: TypeName::scalar(TypeTag::Int),
                qualifiers: Qualifiers::default(),
                init: Some(int(0)),
                loc: loc(),
            },
            Stmt::VarDecl {
                name: "s".into(),
                ty: TypeName::scalar(TypeTag::StringT),
                qualifiers: Qualifiers::default(),
                init: Some(Expr::Ternary {
                    cond: Box::new(Expr::Binary {
                        op: BinOp::Eq,
                        lhs: Box::new(var("n")),
                        rhs: Box::new(int(0)),
                        loc: loc(),
                    }),
                    then_branch: Box::new(Expr::StringLit("zero".into(), loc())),
                    else_branch: Box::new(Expr::StringLit("nonzero".into(), loc())),
                    loc: loc(),
                }),
                loc: loc(),
            },
            Stmt::ExprStmt(call("print", vec![var("s")])),
            Stmt::Return(Some(int(0)), loc()),
        ]))],
    };
    e.run(&program).unwrap();
    assert_eq!(e.output, "zero");
}

/// S6 - Generic function instantiation cache.
/// ```
/// T identity<T>(T x){ return x; }
/// int main(){ print(identity<int>(7) + identity<int>(8)); return 0; }
/// ```
/// The cache-idempotence half of this property (same call twice, reuses the
/// same `FunctionId`) is exercised directly against `FunctionTable` in
/// `function.rs`'s unit tests; here we only check the end-to-end output.
#[test]
fn s6_generic_function_instantiation_cache() {
    let mut e = engine();
    let identity = FuncDef {
        name: "identity".into(),
        type_params: vec!["T".into()],
        params: vec![Param { name: "x".into(), ty: TypeName::named(TypeTag::Struct, "T") }],
        return_type: TypeName::named(TypeTag::Struct, "T"),
        body: vec![Stmt::Return(Some(var("x")), loc())],
        loc: loc(),
    };
    let program = Program {
        items: vec![
            Stmt::FuncDecl(identity),
            Stmt::FuncDecl(main_func(vec![
                Stmt::ExprStmt(call(
                    "print",
                    vec![Expr::Binary {
                        op: BinOp::Add,
                        lhs: Box::new(Expr::Call {
                            callee: Box::new(var("identity")),
                            args: vec![int(7)],
                            generic_args: vec![TypeName::scalar(TypeTag::Int)],
                            loc: loc(),
                        }),
                        rhs: Box::new(Expr::Call {
                            callee: Box::new(var("identity")),
                            args: vec![int(8)],
                            generic_args: vec![TypeName::scalar(TypeTag::Int)],
                            loc: loc(),
                        }),
                        loc: loc(),
                    }],
                )),
                Stmt::Return(Some(int(0)), loc()),
            ])),
        ],
    };
    e.run(&program).unwrap();
    assert_eq!(e.output, "15");
}
