//! The `Variable` runtime cell and its tag-authoritative `Value` payload
//! (spec §3 "Variable").
//!
//! Grounded on the teacher's `value.rs`: a single enum payload per type tag
//! (never "parallel string slot and numeric slot both valid", per the Design
//! Notes §9), with composite payloads (`Struct`, `Array`, `Enum`, `Union`,
//! `Interface`) holding their nested data directly rather than through a
//! separate flat-name table - see DESIGN.md for why the dual flat/nested
//! representation from the original C++ source collapses to a single nested
//! representation here.

use indexmap::IndexMap;

use crate::function::FunctionId;
use crate::pointer::PointerHandle;
use crate::types::TypeTag;

/// A bound function-pointer value: the function it refers to, by name and id
/// (spec §3 "Function-pointer slots").
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionBinding {
    pub name: String,
    pub function: Option<FunctionId>,
}

/// A fixed- or dynamically-sized array payload. Multi-dimensional arrays are
/// stored flat in row-major order (spec §4.6 "flat-sized multi-dimensional
/// arrays use a single vector with row-major indexing").
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayValue {
    pub element_type: TypeTag,
    pub element_type_name: Option<String>,
    pub elements: Vec<Value>,
    pub dims: Vec<usize>,
    pub is_multidimensional: bool,
}

impl ArrayValue {
    pub fn new_zeroed(element_type: TypeTag, element_type_name: Option<String>, dims: Vec<usize>) -> Self {
        let count = dims.iter().product::<usize>().max(if dims.is_empty() { 0 } else { 1 });
        let fill = Value::default_for(element_type, element_type_name.as_deref());
        Self {
            element_type,
            element_type_name,
            elements: vec![fill; count],
            is_multidimensional: dims.len() > 1,
            dims,
        }
    }

    /// Row-major flat index for a multi-dimensional subscript path.
    pub fn flat_index(&self, indices: &[usize]) -> Option<usize> {
        if indices.len() > self.dims.len() {
            return None;
        }
        let mut idx = 0usize;
        let mut stride = 1usize;
        // Walk dims right-to-left accumulating strides, then apply given indices
        // left-to-right (row-major): index = sum(indices[i] * stride[i]).
        let mut strides = vec![1usize; self.dims.len()];
        for i in (0..self.dims.len().saturating_sub(1)).rev() {
            stride *= self.dims[i + 1];
            strides[i] = stride;
        }
        for (i, &ix) in indices.iter().enumerate() {
            if ix >= self.dims[i] {
                return None;
            }
            idx += ix * strides[i];
        }
        Some(idx)
    }
}

/// An ordered struct member map: name -> nested `Variable`. `IndexMap` keeps
/// declaration order for struct-literal positional matching and for `repr`
/// style output, matching the teacher's use of `indexmap` for similarly
/// order-sensitive maps (e.g. dict payloads).
pub type StructMembers = IndexMap<String, Variable>;

#[derive(Debug, Clone, PartialEq)]
pub struct StructValue {
    pub type_name: String,
    pub members: StructMembers,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumValue {
    pub type_name: String,
    pub variant: String,
    pub associated: Option<Box<Value>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnionValue {
    pub type_name: String,
    pub current_type: TypeTag,
    pub slot: Box<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InterfaceValue {
    pub interface_name: String,
    pub underlying: Box<StructValue>,
}

/// Either an `Ok`/`Some` payload or an `Err`/`None` payload, produced by
/// `try`/`checked` expressions (spec §4.3).
#[derive(Debug, Clone, PartialEq)]
pub enum ResultValue {
    Ok(Box<Value>),
    Err { kind: String, message: String },
}

/// The tag-authoritative runtime value. Each `Value` variant corresponds to
/// exactly one `TypeTag`; operations dispatch on the tag first and only then
/// access the one slot that tag authorizes (spec §9 "Dynamic typing via
/// `Variable` tag").
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Void,
    Bool(bool),
    Int(i64),
    Float(f32),
    Double(f64),
    Quad(f64),
    Str(String),
    Pointer(Option<PointerHandle>),
    Array(ArrayValue),
    Struct(StructValue),
    Enum(EnumValue),
    Union(UnionValue),
    Interface(InterfaceValue),
    FunctionPointer(FunctionBinding),
    Result(ResultValue),
}

impl Value {
    pub fn type_tag(&self) -> TypeTag {
        match self {
            Self::Void => TypeTag::Void,
            Self::Bool(_) => TypeTag::Bool,
            Self::Int(_) => TypeTag::Int,
            Self::Float(_) => TypeTag::Float,
            Self::Double(_) => TypeTag::Double,
            Self::Quad(_) => TypeTag::Quad,
            Self::Str(_) => TypeTag::StringT,
            Self::Pointer(_) => TypeTag::Pointer,
            Self::Array(_) => TypeTag::Array,
            Self::Struct(_) => TypeTag::Struct,
            Self::Enum(_) => TypeTag::Enum,
            Self::Union(_) => TypeTag::Union,
            Self::Interface(_) => TypeTag::Interface,
            Self::FunctionPointer(_) => TypeTag::Pointer,
            Self::Result(_) => TypeTag::Struct,
        }
    }

    /// Default ("zero") value for a declared type, used by default
    /// initialization of declarations and of struct members (spec §4.6).
    pub fn default_for(tag: TypeTag, type_name: Option<&str>) -> Self {
        match tag {
            TypeTag::Void => Self::Void,
            TypeTag::Bool => Self::Bool(false),
            TypeTag::Char | TypeTag::Tiny | TypeTag::Short | TypeTag::Int | TypeTag::Long | TypeTag::Big => {
                Self::Int(0)
            }
            TypeTag::Float => Self::Float(0.0),
            TypeTag::Double => Self::Double(0.0),
            TypeTag::Quad => Self::Quad(0.0),
            TypeTag::StringT => Self::Str(String::new()),
            TypeTag::Pointer => Self::Pointer(None),
            TypeTag::Array => Self::Array(ArrayValue::new_zeroed(TypeTag::Int, None, vec![0])),
            TypeTag::Struct => Self::Struct(StructValue {
                type_name: type_name.unwrap_or_default().to_string(),
                members: StructMembers::new(),
            }),
            TypeTag::Enum => Self::Enum(EnumValue {
                type_name: type_name.unwrap_or_default().to_string(),
                variant: String::new(),
                associated: None,
            }),
            TypeTag::Union => Self::Union(UnionValue {
                type_name: type_name.unwrap_or_default().to_string(),
                current_type: TypeTag::Void,
                slot: Box::new(Value::Void),
            }),
            TypeTag::Interface => Self::Interface(InterfaceValue {
                interface_name: type_name.unwrap_or_default().to_string(),
                underlying: Box::new(StructValue {
                    type_name: String::new(),
                    members: StructMembers::new(),
                }),
            }),
        }
    }

    /// Boolean coercion per spec §4.2: "any nonzero numeric or nonempty pointer
    /// is true."
    pub fn truthy(&self) -> bool {
        match self {
            Self::Void => false,
            Self::Bool(b) => *b,
            Self::Int(i) => *i != 0,
            Self::Float(f) => *f != 0.0,
            Self::Double(d) | Self::Quad(d) => *d != 0.0,
            Self::Str(s) => !s.is_empty(),
            Self::Pointer(p) => p.is_some(),
            Self::Array(a) => !a.elements.is_empty(),
            Self::FunctionPointer(_) => true,
            Self::Struct(_) | Self::Enum(_) | Self::Union(_) | Self::Interface(_) | Self::Result(_) => true,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Bool(b) => Some(i64::from(*b)),
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(f64::from(*f)),
            Self::Double(d) | Self::Quad(d) => Some(*d),
            Self::Int(i) => Some(*i as f64),
            _ => None,
        }
    }
}

/// The runtime cell stored in scope storage (spec §3 "Variable").
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub type_tag: TypeTag,
    pub type_name: Option<String>,
    pub value: Value,
    pub is_const: bool,
    pub assigned: bool,
    pub is_reference: bool,
    pub is_pointer: bool,
    pub pointer_depth: u32,
    pub pointee_const: bool,
    pub pointer_const: bool,
}

impl Variable {
    pub fn new(type_tag: TypeTag, type_name: Option<String>, value: Value) -> Self {
        Self {
            type_tag,
            type_name,
            value,
            is_const: false,
            assigned: false,
            is_reference: false,
            is_pointer: false,
            pointer_depth: 0,
            pointee_const: false,
            pointer_const: false,
        }
    }

    #[must_use]
    pub fn constant(mut self) -> Self {
        self.is_const = true;
        self
    }

    /// Rejects a second assignment to a const-and-already-assigned variable
    /// (spec §4.4 "const-assigned variables reject further assignment").
    pub fn check_assignable(&self) -> bool {
        !(self.is_const && self.assigned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthy_rules() {
        assert!(!Value::Int(0).truthy());
        assert!(Value::Int(-1).truthy());
        assert!(!Value::Pointer(None).truthy());
        assert!(!Value::Str(String::new()).truthy());
    }

    #[test]
    fn array_flat_index_row_major() {
        let arr = ArrayValue::new_zeroed(TypeTag::Int, None, vec![2, 3]);
        assert_eq!(arr.flat_index(&[0, 0]), Some(0));
        assert_eq!(arr.flat_index(&[1, 0]), Some(3));
        assert_eq!(arr.flat_index(&[1, 2]), Some(5));
        assert_eq!(arr.flat_index(&[2, 0]), None);
    }

    #[test]
    fn const_reassignment_rejected_after_first_assign() {
        let mut v = Variable::new(TypeTag::Int, None, Value::Int(1)).constant();
        assert!(v.check_assignable());
        v.assigned = true;
        assert!(!v.check_assignable());
    }
}
