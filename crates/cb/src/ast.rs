//! The AST contract the interpreter consumes (spec §3, §6).
//!
//! The lexer/parser is out of scope (spec §1 Non-goals); this module defines the
//! validated tree shape the parser is required to hand the interpreter. Every
//! node kind named in spec §3 ("number, string, variable, binop, unop, assign,
//! var-decl, array-decl, func-decl, call, member-access, array-ref, arrow-access,
//! if/while/for, return/break, struct-literal, array-literal, ternary, address-of,
//! dereference, pre/post inc-dec, try, checked") has a matching `Expr`/`Stmt`
//! variant below.

use crate::types::{ArrayTypeInfo, TypeName};

/// Source location carried by AST nodes for diagnostics (spec §3, §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct CodeLoc {
    pub line: u32,
    pub col: u32,
}

impl CodeLoc {
    pub const fn new(line: u32, col: u32) -> Self {
        Self { line, col }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    And,
    Or,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum UnOp {
    Not,
    Neg,
    Plus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum IncDecOp {
    Inc,
    Dec,
}

/// A struct-literal or array-literal initializer shape, used both as an
/// expression and as the RHS of a declaration/assignment.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum LiteralField {
    /// `{x: 1}` - named field.
    Named(String, Expr),
    /// `{1, 2}` - positional field.
    Positional(Expr),
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Expr {
    IntLit(i64, CodeLoc),
    FloatLit(f32, CodeLoc),
    DoubleLit(f64, CodeLoc),
    QuadLit(f64, CodeLoc),
    BoolLit(bool, CodeLoc),
    StringLit(String, CodeLoc),
    Variable(String, CodeLoc),
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        loc: CodeLoc,
    },
    Unary {
        op: UnOp,
        operand: Box<Expr>,
        loc: CodeLoc,
    },
    Assign {
        target: Box<Expr>,
        value: Box<Expr>,
        loc: CodeLoc,
    },
    IncDec {
        op: IncDecOp,
        is_post: bool,
        target: Box<Expr>,
        loc: CodeLoc,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
        generic_args: Vec<TypeName>,
        loc: CodeLoc,
    },
    /// `obj.member` - struct member or method receiver access.
    MemberAccess {
        base: Box<Expr>,
        member: String,
        loc: CodeLoc,
    },
    /// `ptr->member`, sugar for `(*ptr).member`.
    ArrowAccess {
        base: Box<Expr>,
        member: String,
        loc: CodeLoc,
    },
    ArrayRef {
        base: Box<Expr>,
        index: Box<Expr>,
        loc: CodeLoc,
    },
    Ternary {
        cond: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
        loc: CodeLoc,
    },
    AddressOf {
        operand: Box<Expr>,
        loc: CodeLoc,
    },
    Dereference {
        operand: Box<Expr>,
        loc: CodeLoc,
    },
    StructLiteral {
        type_name: Option<String>,
        fields: Vec<LiteralField>,
        loc: CodeLoc,
    },
    ArrayLiteral {
        elements: Vec<Expr>,
        loc: CodeLoc,
    },
    /// `try E` - wraps success in `Result::Ok`, any thrown error as `Custom`.
    Try {
        inner: Box<Expr>,
        loc: CodeLoc,
    },
    /// `checked E` - wraps success in `Result::Ok`, uncategorized errors as `CheckedError`.
    Checked {
        inner: Box<Expr>,
        loc: CodeLoc,
    },
    /// `E?` - unwraps `Ok`/`Some`, or returns the enclosing function with `Err`/`None`.
    ErrorPropagate {
        inner: Box<Expr>,
        loc: CodeLoc,
    },
    /// `Type::Variant` enum access.
    EnumAccess {
        type_name: String,
        variant: String,
        loc: CodeLoc,
    },
    /// `&f` where `f` names a function - binds a function-pointer value.
    FunctionRef {
        name: String,
        loc: CodeLoc,
    },
}

impl Expr {
    pub fn loc(&self) -> CodeLoc {
        match self {
            Self::IntLit(_, l)
            | Self::FloatLit(_, l)
            | Self::DoubleLit(_, l)
            | Self::QuadLit(_, l)
            | Self::BoolLit(_, l)
            | Self::StringLit(_, l)
            | Self::Variable(_, l)
            | Self::Binary { loc: l, .. }
            | Self::Unary { loc: l, .. }
            | Self::Assign { loc: l, .. }
            | Self::IncDec { loc: l, .. }
            | Self::Call { loc: l, .. }
            | Self::MemberAccess { loc: l, .. }
            | Self::ArrowAccess { loc: l, .. }
            | Self::ArrayRef { loc: l, .. }
            | Self::Ternary { loc: l, .. }
            | Self::AddressOf { loc: l, .. }
            | Self::Dereference { loc: l, .. }
            | Self::StructLiteral { loc: l, .. }
            | Self::ArrayLiteral { loc: l, .. }
            | Self::Try { loc: l, .. }
            | Self::Checked { loc: l, .. }
            | Self::ErrorPropagate { loc: l, .. }
            | Self::EnumAccess { loc: l, .. }
            | Self::FunctionRef { loc: l, .. } => *l,
        }
    }

    /// True for expressions that may legally appear on the LHS of `=` or as the
    /// operand of unary `&` (spec GLOSSARY "Lvalue").
    pub fn is_lvalue(&self) -> bool {
        matches!(
            self,
            Self::Variable(..)
                | Self::MemberAccess { .. }
                | Self::ArrowAccess { .. }
                | Self::ArrayRef { .. }
                | Self::Dereference { .. }
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Qualifiers {
    pub is_const: bool,
    pub is_static: bool,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum ArrayInit {
    Literal(Vec<Expr>),
    FromCall(Expr),
    Default,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Param {
    pub name: String,
    pub ty: TypeName,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FuncDef {
    pub name: String,
    pub type_params: Vec<String>,
    pub params: Vec<Param>,
    pub return_type: TypeName,
    pub body: Vec<Stmt>,
    pub loc: CodeLoc,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MemberDef {
    pub name: String,
    pub ty: TypeName,
    pub is_const: bool,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct StructDef {
    pub name: String,
    pub type_params: Vec<String>,
    pub members: Vec<MemberDef>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct EnumVariant {
    pub name: String,
    pub value: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct EnumDef {
    pub name: String,
    pub variants: Vec<EnumVariant>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct UnionDef {
    pub name: String,
    pub allowed: Vec<TypeName>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct InterfaceDef {
    pub name: String,
    pub methods: Vec<FuncDef>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ImplDef {
    pub type_params: Vec<String>,
    /// `impl StructName { .. }` when `interface_name` is `None`,
    /// `impl Interface for StructName { .. }` otherwise.
    pub interface_name: Option<String>,
    pub struct_name: String,
    pub methods: Vec<FuncDef>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Stmt {
    VarDecl {
        name: String,
        ty: TypeName,
        qualifiers: Qualifiers,
        init: Option<Expr>,
        loc: CodeLoc,
    },
    ArrayDecl {
        name: String,
        ty: TypeName,
        array: ArrayTypeInfo,
        qualifiers: Qualifiers,
        init: ArrayInit,
        loc: CodeLoc,
    },
    ExprStmt(Expr),
    Block(Vec<Stmt>),
    If {
        cond: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
        loc: CodeLoc,
    },
    While {
        cond: Expr,
        body: Box<Stmt>,
        loc: CodeLoc,
    },
    For {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        step: Option<Expr>,
        body: Box<Stmt>,
        loc: CodeLoc,
    },
    Return(Option<Expr>, CodeLoc),
    Break(u32, CodeLoc),
    Continue(u32, CodeLoc),
    /// `defer EXPR;` - registers cleanup to run LIFO before the enclosing scope exits
    /// (spec §4.4 "Scope cleanup"; supplemented from the original's destructor handling).
    Defer(Expr, CodeLoc),
    FuncDecl(FuncDef),
    StructDecl(StructDef),
    EnumDecl(EnumDef),
    UnionDecl(UnionDef),
    InterfaceDecl(InterfaceDef),
    ImplBlock(ImplDef),
    NamespaceDecl {
        path: Vec<String>,
        body: Vec<Stmt>,
        loc: CodeLoc,
    },
    Using {
        path: Vec<String>,
        loc: CodeLoc,
    },
    /// `foreign module "name" { fn sig; .. }` - declares the FFI surface (spec §6).
    ForeignModule {
        module_name: String,
        functions: Vec<FuncDef>,
        loc: CodeLoc,
    },
    /// `import name;` - module import (spec §4.8, §6); resolution is an external
    /// collaborator, this node only records the request.
    Import {
        module_name: String,
        loc: CodeLoc,
    },
}

/// A whole compilation unit: the validated top-level declaration list the module
/// resolver hands the interpreter (spec §6 "Module resolver contract").
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Program {
    pub items: Vec<Stmt>,
}
