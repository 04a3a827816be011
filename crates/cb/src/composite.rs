//! Struct/Array/Union/Enum Manager (C6).
//!
//! Grounded on `original_source`'s `executors/declarations/{array,variable}_declaration.cpp`
//! (dimension validation, default/ literal/ from-call initialization) and
//! `evaluator/access/member_helpers.cpp` (the member-not-found fallback
//! supplemented in SPEC_FULL.md §10.1). Per DESIGN.md, this module works
//! against the single nested `Value::Struct`/`Value::Array` representation -
//! there is no separate flat `"name.member"` table to keep in sync, so the
//! "struct sync" testable property (spec §8 invariant 2) holds by construction.

use ahash::AHashMap;
use indexmap::IndexMap;

use crate::ast::{EnumDef, InterfaceDef, LiteralField, MemberDef, StructDef, UnionDef};
use crate::diagnostics::{EngineError, ErrorKind};
use crate::types::TypeTag;
use crate::value::{ArrayValue, EnumValue, StructMembers, StructValue, UnionValue, Value, Variable};

#[derive(Debug, Default)]
pub struct TypeDefs {
    structs: AHashMap<String, StructDef>,
    enums: AHashMap<String, EnumDef>,
    unions: AHashMap<String, UnionDef>,
    interfaces: AHashMap<String, InterfaceDef>,
}

impl TypeDefs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare_struct(&mut self, def: StructDef) {
        self.structs.insert(def.name.clone(), def);
    }

    pub fn declare_enum(&mut self, def: EnumDef) {
        self.enums.insert(def.name.clone(), def);
    }

    pub fn declare_union(&mut self, def: UnionDef) {
        self.unions.insert(def.name.clone(), def);
    }

    pub fn declare_interface(&mut self, def: InterfaceDef) {
        self.interfaces.insert(def.name.clone(), def);
    }

    pub fn get_struct(&self, name: &str) -> Option<&StructDef> {
        self.structs.get(name)
    }

    pub fn get_enum(&self, name: &str) -> Option<&EnumDef> {
        self.enums.get(name)
    }

    pub fn get_union(&self, name: &str) -> Option<&UnionDef> {
        self.unions.get(name)
    }

    pub fn get_interface(&self, name: &str) -> Option<&InterfaceDef> {
        self.interfaces.get(name)
    }
}

/// Default-initializes each declared member, recursively for nested structs
/// (spec §4.6 "Struct creation": "instantiates each declared member as a
/// default-initialized `Variable`"). Eager creation, per the REDESIGN FLAGS
/// resolution in spec §9 ("The spec mandates eager creation at declaration
/// time for declared struct arrays").
pub fn instantiate_struct(defs: &TypeDefs, type_name: &str) -> Result<StructValue, EngineError> {
    let def = defs
        .get_struct(type_name)
        .ok_or_else(|| EngineError::internal(format!("unknown struct type `{type_name}`")))?
        .clone();
    let mut members: StructMembers = IndexMap::new();
    for member in &def.members {
        members.insert(member.name.clone(), instantiate_member(defs, member)?);
    }
    Ok(StructValue {
        type_name: type_name.to_string(),
        members,
    })
}

fn instantiate_member(defs: &TypeDefs, member: &MemberDef) -> Result<Variable, EngineError> {
    let value = if member.ty.tag == TypeTag::Struct {
        let name = member
            .ty
            .name
            .as_deref()
            .ok_or_else(|| EngineError::internal("struct member missing type name"))?;
        Value::Struct(instantiate_struct(defs, name)?)
    } else {
        Value::default_for(member.ty.tag, member.ty.name.as_deref())
    };
    let mut var = Variable::new(member.ty.tag, member.ty.name.clone(), value);
    var.is_const = member.is_const;
    Ok(var)
}

/// Matches a struct literal's fields to members: by name when keys are
/// present, else positionally, recursing into nested struct/array members
/// (spec §4.6 "Struct-literal assignment").
pub fn assign_struct_literal(
    defs: &TypeDefs,
    target: &mut StructValue,
    fields: &[(Option<String>, Value)],
) -> Result<(), EngineError> {
    let def = defs
        .get_struct(&target.type_name)
        .ok_or_else(|| EngineError::internal(format!("unknown struct type `{}`", target.type_name)))?
        .clone();
    let named = fields.iter().any(|(name, _)| name.is_some());
    if named {
        for (name, value) in fields {
            let member_name = name
                .as_ref()
                .ok_or_else(|| EngineError::internal("mixed named/positional struct literal fields"))?;
            assign_member(target, member_name, value.clone())?;
        }
    } else {
        for (member, (_, value)) in def.members.iter().zip(fields.iter()) {
            assign_member(target, &member.name, value.clone())?;
        }
    }
    Ok(())
}

fn assign_member(target: &mut StructValue, member: &str, value: Value) -> Result<(), EngineError> {
    let slot = target
        .members
        .get_mut(member)
        .ok_or_else(|| EngineError::runtime(ErrorKind::StructMemberNotFound, format!("no member `{member}`")))?;
    slot.value = value;
    slot.assigned = true;
    Ok(())
}

/// The member-not-found heuristic fallback (SPEC_FULL.md §10.1, spec §7
/// "Recovered locally"): before raising `StructMemberNotFound`, try resolving
/// `member` as a top-level flat variable of the same name in `fallback_scope`.
pub fn resolve_member_with_fallback<'a>(
    members: &'a StructMembers,
    member: &str,
    fallback_scope: Option<&'a StructMembers>,
) -> Result<&'a Variable, EngineError> {
    if let Some(v) = members.get(member) {
        return Ok(v);
    }
    if let Some(fallback) = fallback_scope {
        if let Some(v) = fallback.get(member) {
            return Ok(v);
        }
    }
    Err(EngineError::runtime(
        ErrorKind::StructMemberNotFound,
        format!("no member `{member}`"),
    ))
}

/// Validates requested dimensions and builds a zero/empty-initialized array
/// (spec §4.6 "Array creation": "validates dimensions; flat-sized
/// multi-dimensional arrays use a single vector with row-major indexing").
pub fn create_array(element_type: TypeTag, element_type_name: Option<String>, dims: &[usize]) -> Result<ArrayValue, EngineError> {
    if dims.is_empty() || dims.iter().any(|&d| d == 0) {
        return Err(EngineError::runtime(
            ErrorKind::IndexOutOfBounds,
            "array declared with zero or missing dimension",
        ));
    }
    Ok(ArrayValue::new_zeroed(element_type, element_type_name, dims.to_vec()))
}

/// Populates an array from a literal in row-major order, checking arity
/// against the declared dimensions (spec §4.4 assignment target 8).
pub fn fill_array_literal(array: &mut ArrayValue, values: Vec<Value>) -> Result<(), EngineError> {
    let expected = array.elements.len();
    if values.len() != expected {
        return Err(EngineError::runtime(
            ErrorKind::TypeMismatch,
            format!("array literal has {} element(s), expected {expected}", values.len()),
        ));
    }
    array.elements = values;
    Ok(())
}

/// `Type::Variant` enum access (spec §4.6): returns the variant's associated
/// value, if declared, alongside the enum tag.
pub fn enum_access(defs: &TypeDefs, type_name: &str, variant: &str) -> Result<EnumValue, EngineError> {
    let def = defs
        .get_enum(type_name)
        .ok_or_else(|| EngineError::internal(format!("unknown enum type `{type_name}`")))?;
    let found = def
        .variants
        .iter()
        .find(|v| v.name == variant)
        .ok_or_else(|| EngineError::runtime(ErrorKind::StructMemberNotFound, format!("enum `{type_name}` has no variant `{variant}`")))?;
    Ok(EnumValue {
        type_name: type_name.to_string(),
        variant: found.name.clone(),
        associated: None,
    })
}

/// Validates that `value`'s runtime type is one of the union's allowed types
/// and updates `current_type` (spec §4.6 "Union assignment").
pub fn assign_union(defs: &TypeDefs, union: &mut UnionValue, value: Value) -> Result<(), EngineError> {
    let def = defs
        .get_union(&union.type_name)
        .ok_or_else(|| EngineError::internal(format!("unknown union type `{}`", union.type_name)))?;
    let tag = value.type_tag();
    if !def.allowed.iter().any(|t| t.tag == tag) {
        return Err(EngineError::runtime(
            ErrorKind::UnionValueNotAllowed,
            format!("type `{tag}` is not a member of union `{}`", union.type_name),
        ));
    }
    union.current_type = tag;
    union.slot = Box::new(value);
    Ok(())
}

/// Helper for struct-literal/assignment callers that hold `LiteralField`s
/// rather than already-evaluated `(name, value)` pairs; the expressions
/// themselves are evaluated by `expr.rs` before calling into this module.
pub fn literal_field_name(field: &LiteralField) -> Option<&str> {
    match field {
        LiteralField::Named(name, _) => Some(name),
        LiteralField::Positional(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeName;

    fn point_def() -> StructDef {
        StructDef {
            name: "Point".into(),
            type_params: Vec::new(),
            members: vec![
                MemberDef {
                    name: "x".into(),
                    ty: TypeName::scalar(TypeTag::Int),
                    is_const: false,
                },
                MemberDef {
                    name: "y".into(),
                    ty: TypeName::scalar(TypeTag::Int),
                    is_const: false,
                },
            ],
        }
    }

    #[test]
    fn default_struct_has_zeroed_members() {
        let mut defs = TypeDefs::new();
        defs.declare_struct(point_def());
        let s = instantiate_struct(&defs, "Point").unwrap();
        assert_eq!(s.members["x"].value, Value::Int(0));
        assert_eq!(s.members["y"].value, Value::Int(0));
    }

    #[test]
    fn positional_literal_matches_declaration_order() {
        let mut defs = TypeDefs::new();
        defs.declare_struct(point_def());
        let mut s = instantiate_struct(&defs, "Point").unwrap();
        assign_struct_literal(&defs, &mut s, &[(None, Value::Int(1)), (None, Value::Int(2))]).unwrap();
        assert_eq!(s.members["x"].value, Value::Int(1));
        assert_eq!(s.members["y"].value, Value::Int(2));
    }

    #[test]
    fn array_literal_arity_mismatch_errors() {
        let mut array = create_array(TypeTag::Int, None, &[4]).unwrap();
        let err = fill_array_literal(&mut array, vec![Value::Int(1), Value::Int(2)]);
        assert!(err.is_err());
    }
}
