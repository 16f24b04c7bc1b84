// SPDX-License-Identifier: BSD-3-Clause
use super::name::ValueName;

/// Coarse type classification. The analyses only ever need to know whether
/// a value can hold an address.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TypeKind {
    Pointer,
    Scalar,
}

impl TypeKind {
    #[inline]
    pub fn is_pointer(self) -> bool {
        matches!(self, TypeKind::Pointer)
    }
}

/// An instruction operand.
#[derive(Clone, Debug, Hash, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Operand {
    /// A named SSA value with its type classification.
    Local { name: ValueName, ty: TypeKind },
    /// The literal null-pointer constant.
    Null,
    /// An integer constant.
    Int(i64),
    /// Anything else (metadata, floats, aggregates). Opaque to the analyses.
    Opaque,
}

impl Operand {
    pub fn local(name: impl Into<ValueName>, ty: TypeKind) -> Self {
        Operand::Local {
            name: name.into(),
            ty,
        }
    }

    pub fn pointer(name: impl Into<ValueName>) -> Self {
        Operand::local(name, TypeKind::Pointer)
    }

    pub fn scalar(name: impl Into<ValueName>) -> Self {
        Operand::local(name, TypeKind::Scalar)
    }

    /// The SSA name behind this operand, if it is a local.
    pub fn name(&self) -> Option<&ValueName> {
        match self {
            Operand::Local { name, .. } => Some(name),
            _ => None,
        }
    }

    pub fn is_pointer(&self) -> bool {
        match self {
            Operand::Local { ty, .. } => ty.is_pointer(),
            Operand::Null => true,
            _ => false,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Operand::Null)
    }

    pub fn constant_int(&self) -> Option<i64> {
        match self {
            Operand::Int(i) => Some(*i),
            _ => None,
        }
    }
}

impl std::fmt::Display for Operand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operand::Local { name, .. } => write!(f, "{}", name),
            Operand::Null => write!(f, "null"),
            Operand::Int(i) => write!(f, "{}", i),
            Operand::Opaque => write!(f, "<opaque>"),
        }
    }
}
