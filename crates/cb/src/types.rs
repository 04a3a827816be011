//! Type model and inference (C2).
//!
//! `TypeTag` is the closed set of type tags from the AST contract (spec §3);
//! `ArrayTypeInfo` describes array shape; `TypeName` is the full declared-type
//! payload a variable declaration or parameter carries (tag + optional
//! struct/enum/union/interface name + pointer/array/reference qualifiers).
//!
//! Numeric widening follows spec §4.2: `bool < char/tiny < short < int < long < big`
//! for integers, `float < double < quad` for floats; mixed arithmetic widens to
//! the widest floating type if either operand is floating, else the widest
//! integer rank.

use std::fmt;

/// One of the type tags the AST contract names (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum TypeTag {
    Void,
    Bool,
    Char,
    Tiny,
    Short,
    Int,
    Long,
    Big,
    Float,
    Double,
    Quad,
    StringT,
    Pointer,
    Struct,
    Enum,
    Union,
    Interface,
    Array,
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Void => "void",
            Self::Bool => "bool",
            Self::Char => "char",
            Self::Tiny => "tiny",
            Self::Short => "short",
            Self::Int => "int",
            Self::Long => "long",
            Self::Big => "big",
            Self::Float => "float",
            Self::Double => "double",
            Self::Quad => "quad",
            Self::StringT => "string",
            Self::Pointer => "pointer",
            Self::Struct => "struct",
            Self::Enum => "enum",
            Self::Union => "union",
            Self::Interface => "interface",
            Self::Array => "array",
        };
        f.write_str(s)
    }
}

impl TypeTag {
    /// Integer widening rank; higher is wider. Non-integer tags return 0.
    fn int_rank(self) -> u8 {
        match self {
            Self::Bool => 1,
            Self::Char | Self::Tiny => 2,
            Self::Short => 3,
            Self::Int => 4,
            Self::Long => 5,
            Self::Big => 6,
            _ => 0,
        }
    }

    /// Floating widening rank; higher is wider. Non-floating tags return 0.
    fn float_rank(self) -> u8 {
        match self {
            Self::Float => 1,
            Self::Double => 2,
            Self::Quad => 3,
            _ => 0,
        }
    }

    pub fn is_integer(self) -> bool {
        self.int_rank() > 0
    }

    pub fn is_floating(self) -> bool {
        self.float_rank() > 0
    }

    pub fn is_numeric(self) -> bool {
        self.is_integer() || self.is_floating()
    }

    /// Common type of a binary arithmetic operation per spec §4.2:
    /// "if either operand is floating, result is the widest floating type among
    /// operands and the declared destination; otherwise widest integer rank."
    pub fn arithmetic_common(self, other: Self) -> Option<Self> {
        if self.is_floating() || other.is_floating() {
            let rank = self.float_rank().max(other.float_rank());
            return Some(match rank {
                1 => Self::Float,
                2 => Self::Double,
                _ => Self::Quad,
            });
        }
        if self.is_integer() && other.is_integer() {
            let rank = self.int_rank().max(other.int_rank());
            return Some(match rank {
                1 => Self::Bool,
                2 => Self::Tiny,
                3 => Self::Short,
                4 => Self::Int,
                5 => Self::Long,
                _ => Self::Big,
            });
        }
        None
    }
}

/// Either a fixed dimension size or a dynamically-sized dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum DimSize {
    Fixed(usize),
    Dynamic,
}

/// Describes the shape of an array type: element type plus its dimension list.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ArrayTypeInfo {
    pub element: TypeTag,
    pub element_name: Option<String>,
    pub dims: Vec<DimSize>,
}

impl ArrayTypeInfo {
    pub fn is_multidimensional(&self) -> bool {
        self.dims.len() > 1
    }

    /// Total element count for an all-fixed shape; `None` if any dimension is dynamic.
    pub fn element_count(&self) -> Option<usize> {
        self.dims.iter().try_fold(1usize, |acc, d| match d {
            DimSize::Fixed(n) => Some(acc * n),
            DimSize::Dynamic => None,
        })
    }
}

/// The full declared-type payload: tag, optional name (struct/enum/union/interface/
/// generic parameter), and qualifier flags, matching the AST node's "declared type
/// name, qualifier flags" contract from spec §3.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TypeName {
    pub tag: TypeTag,
    pub name: Option<String>,
    pub pointer_depth: u32,
    pub pointee_const: bool,
    pub pointer_const: bool,
    pub is_reference: bool,
    pub is_unsigned: bool,
    pub array: Option<ArrayTypeInfo>,
}

impl TypeName {
    pub fn scalar(tag: TypeTag) -> Self {
        Self {
            tag,
            name: None,
            pointer_depth: 0,
            pointee_const: false,
            pointer_const: false,
            is_reference: false,
            is_unsigned: false,
            array: None,
        }
    }

    pub fn named(tag: TypeTag, name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::scalar(tag)
        }
    }

    pub fn is_pointer(&self) -> bool {
        self.pointer_depth > 0
    }

    pub fn is_array(&self) -> bool {
        self.array.is_some()
    }

    /// Pointee type with one level of pointer stripped (used by `*` and `&`).
    pub fn pointee(&self) -> Self {
        let mut t = self.clone();
        t.pointer_depth = t.pointer_depth.saturating_sub(1);
        t
    }
}

/// Coerces a value's type-tag rules at an assignment boundary: the destination's
/// declared tag wins for the stored representation, but the common-type rule
/// from `arithmetic_common` governs whether the coercion is lossless-in-kind
/// (both numeric) vs. a `TypeMismatch`.
pub fn coercible(dest: TypeTag, src: TypeTag) -> bool {
    if dest == src {
        return true;
    }
    match (dest, src) {
        (d, s) if d.is_numeric() && s.is_numeric() => true,
        (TypeTag::StringT, TypeTag::StringT) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn widening_order_integers() {
        assert_eq!(TypeTag::Bool.arithmetic_common(TypeTag::Int), Some(TypeTag::Int));
        assert_eq!(TypeTag::Short.arithmetic_common(TypeTag::Long), Some(TypeTag::Long));
        assert_eq!(TypeTag::Int.arithmetic_common(TypeTag::Big), Some(TypeTag::Big));
    }

    #[test]
    fn widening_order_floats_dominate() {
        assert_eq!(TypeTag::Long.arithmetic_common(TypeTag::Float), Some(TypeTag::Float));
        assert_eq!(TypeTag::Float.arithmetic_common(TypeTag::Double), Some(TypeTag::Double));
        assert_eq!(TypeTag::Double.arithmetic_common(TypeTag::Quad), Some(TypeTag::Quad));
    }

    #[test]
    fn strings_do_not_mix_with_numbers() {
        assert_eq!(TypeTag::StringT.arithmetic_common(TypeTag::Int), None);
    }
}
