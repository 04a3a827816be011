//! Function/Method Dispatch (C7).
//!
//! Grounded on the teacher's `function.rs` (a compiled `Function` with a
//! signature, closure metadata, and a namespace-size precomputed at definition
//! time) and `signature.rs` (parameter binding rules); generic instantiation is
//! grounded on `original_source`'s
//! `evaluator/functions/generic_instantiation.{h,cpp}` ("a deep clone of its AST
//! is made, and every occurrence of a type-parameter name ... is substituted
//! with the concrete type. Instantiations are cached under the key
//! `name<t1,t2,...>`").

use ahash::AHashMap;

use crate::ast::{FuncDef, Param};
use crate::diagnostics::{EngineError, ErrorKind};
use crate::types::TypeName;

/// Id of a function definition (generic or concrete, free or method) inside
/// the interpreter's function table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FunctionId(u32);

impl FunctionId {
    pub fn from_raw(id: u32) -> Self {
        Self(id)
    }
}

/// The function table: every free function, method, and generic instantiation
/// lives here by id; qualified/namespaced lookups go through `NamespaceRegistry`
/// (C8) which stores `FunctionId`s pointing back into this table.
#[derive(Debug, Default)]
pub struct FunctionTable {
    defs: Vec<FuncDef>,
    by_name: AHashMap<String, FunctionId>,
    /// `impl StructName { .. }` and `impl Interface for StructName { .. }`
    /// method tables (spec §4.7 "Search the `impl StructName { .. }` tables").
    methods: AHashMap<(String, String), FunctionId>,
    interface_methods: AHashMap<(String, String, String), FunctionId>,
    /// Generic instantiation cache, keyed `name<t1,t2,...>` (spec §4.7,
    /// testable property #8 "Generic cache idempotence").
    generic_cache: AHashMap<String, FunctionId>,
}

impl FunctionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare(&mut self, def: FuncDef) -> FunctionId {
        let id = FunctionId(self.defs.len().try_into().expect("function table overflow"));
        self.by_name.insert(def.name.clone(), id);
        self.defs.push(def);
        id
    }

    pub fn declare_method(&mut self, struct_name: &str, def: FuncDef) -> FunctionId {
        let name = def.name.clone();
        let id = FunctionId(self.defs.len().try_into().expect("function table overflow"));
        self.defs.push(def);
        self.methods.insert((struct_name.to_string(), name), id);
        id
    }

    pub fn declare_interface_method(&mut self, interface: &str, struct_name: &str, def: FuncDef) -> FunctionId {
        let name = def.name.clone();
        let id = FunctionId(self.defs.len().try_into().expect("function table overflow"));
        self.defs.push(def);
        self.interface_methods
            .insert((interface.to_string(), struct_name.to_string(), name), id);
        id
    }

    pub fn by_name(&self, name: &str) -> Option<FunctionId> {
        self.by_name.get(name).copied()
    }

    pub fn method(&self, struct_name: &str, method: &str) -> Option<FunctionId> {
        self.methods.get(&(struct_name.to_string(), method.to_string())).copied()
    }

    pub fn interface_method(&self, interface: &str, struct_name: &str, method: &str) -> Option<FunctionId> {
        self.interface_methods
            .get(&(interface.to_string(), struct_name.to_string(), method.to_string()))
            .copied()
    }

    pub fn get(&self, id: FunctionId) -> &FuncDef {
        &self.defs[id.0 as usize]
    }

    /// Builds (or reuses) the generic instantiation keyed `name<t1,t2,...>`
    /// (spec §4.7). The returned bool is `true` when a fresh instantiation was
    /// created, `false` when the cached one was reused - callers use this to
    /// verify testable property #8 without peeking at internal counters.
    pub fn instantiate_generic(
        &mut self,
        base: FunctionId,
        type_args: &[TypeName],
    ) -> Result<(FunctionId, bool), EngineError> {
        let base_def = self.get(base).clone();
        if base_def.type_params.len() != type_args.len() {
            return Err(EngineError::runtime(
                ErrorKind::RuntimeGeneric,
                format!(
                    "generic function `{}` expects {} type argument(s), got {}",
                    base_def.name,
                    base_def.type_params.len(),
                    type_args.len()
                ),
            ));
        }
        let key = cache_key(&base_def.name, type_args);
        if let Some(&id) = self.generic_cache.get(&key) {
            return Ok((id, false));
        }
        let substituted = substitute_generic(&base_def, type_args);
        let id = FunctionId(self.defs.len().try_into().expect("function table overflow"));
        self.defs.push(substituted);
        self.generic_cache.insert(key, id);
        Ok((id, true))
    }
}

fn cache_key(name: &str, type_args: &[TypeName]) -> String {
    let args = type_args
        .iter()
        .map(|t| t.name.clone().unwrap_or_else(|| t.tag.to_string()))
        .collect::<Vec<_>>()
        .join(",");
    format!("{name}<{args}>")
}

/// Deep-clones `def` and substitutes every occurrence of a type-parameter name
/// in parameter/return types with the matching concrete type (spec §4.7
/// "every occurrence of a type-parameter name in `type_name`, `return_type_name`,
/// `pointer_base_type_name` ... is substituted").
fn substitute_generic(def: &FuncDef, type_args: &[TypeName]) -> FuncDef {
    let subst: AHashMap<&str, &TypeName> = def
        .type_params
        .iter()
        .map(String::as_str)
        .zip(type_args.iter())
        .collect();

    let substitute_type = |ty: &TypeName| -> TypeName {
        if let Some(name) = &ty.name {
            if let Some(&concrete) = subst.get(name.as_str()) {
                let mut result = concrete.clone();
                result.pointer_depth += ty.pointer_depth;
                result.is_reference = ty.is_reference;
                return result;
            }
        }
        ty.clone()
    };

    let params = def
        .params
        .iter()
        .map(|p| Param {
            name: p.name.clone(),
            ty: substitute_type(&p.ty),
        })
        .collect();

    FuncDef {
        name: def.name.clone(),
        type_params: Vec::new(),
        params,
        return_type: substitute_type(&def.return_type),
        body: def.body.clone(),
        loc: def.loc,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::CodeLoc;
    use crate::types::TypeTag;

    fn identity_def() -> FuncDef {
        FuncDef {
            name: "identity".into(),
            type_params: vec!["T".into()],
            params: vec![Param {
                name: "x".into(),
                ty: TypeName::named(TypeTag::Struct, "T"),
            }],
            return_type: TypeName::named(TypeTag::Struct, "T"),
            body: Vec::new(),
            loc: CodeLoc::default(),
        }
    }

    #[test]
    fn generic_instantiation_is_cached() {
        let mut table = FunctionTable::new();
        let base = table.declare(identity_def());
        let int_arg = vec![TypeName::scalar(TypeTag::Int)];
        let (first, created_first) = table.instantiate_generic(base, &int_arg).unwrap();
        let (second, created_second) = table.instantiate_generic(base, &int_arg).unwrap();
        assert_eq!(first, second);
        assert!(created_first);
        assert!(!created_second);
    }

    #[test]
    fn generic_instantiation_substitutes_param_type() {
        let mut table = FunctionTable::new();
        let base = table.declare(identity_def());
        let int_arg = vec![TypeName::scalar(TypeTag::Int)];
        let (id, _) = table.instantiate_generic(base, &int_arg).unwrap();
        let instantiated = table.get(id);
        assert_eq!(instantiated.params[0].ty.tag, TypeTag::Int);
        assert_eq!(instantiated.return_type.tag, TypeTag::Int);
    }

    #[test]
    fn wrong_arity_is_rejected() {
        let mut table = FunctionTable::new();
        let base = table.declare(identity_def());
        let err = table.instantiate_generic(base, &[]);
        assert!(err.is_err());
    }
}
