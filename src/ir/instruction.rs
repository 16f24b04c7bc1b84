// SPDX-License-Identifier: BSD-3-Clause
use super::name::{BlockName, FunctionName, ValueName};
use super::operand::{Operand, TypeKind};

/// Stack allocation of a pointer-sized slot. The result names the slot.
#[derive(Clone, Debug, Hash, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Alloca {
    /// Classification of the values stored in the slot.
    pub allocated: TypeKind,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Store {
    pub value: Operand,
    pub pointer: Operand,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Load {
    pub pointer: Operand,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Call {
    pub callee: FunctionName,
    pub args: Vec<Operand>,
}

/// Pointer-to-pointer cast (bitcast and friends).
#[derive(Clone, Debug, Hash, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Cast {
    pub operand: Operand,
}

/// Address computation from a base pointer (GEP-like).
#[derive(Clone, Debug, Hash, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Offset {
    pub base: Operand,
    pub index: Operand,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Phi {
    pub incoming: Vec<(Operand, BlockName)>,
}

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Predicate {
    Eq,
    Ne,
    /// Ordering comparisons; never interesting to the null-guard extractor.
    Other,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Compare {
    pub predicate: Predicate,
    pub lhs: Operand,
    pub rhs: Operand,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Binary {
    pub lhs: Operand,
    pub rhs: Operand,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "op", rename_all = "kebab-case")]
pub enum Opcode {
    Alloca(Alloca),
    Store(Store),
    Load(Load),
    Call(Call),
    Cast(Cast),
    Offset(Offset),
    Phi(Phi),
    Compare(Compare),
    Binary(Binary),
    /// Anything the analyses have no model for. Transfer degrades to the
    /// identity on these.
    Other,
}

impl Opcode {
    pub fn operands(&self) -> Vec<&Operand> {
        match self {
            Opcode::Alloca(_) => vec![],
            Opcode::Store(s) => vec![&s.value, &s.pointer],
            Opcode::Load(l) => vec![&l.pointer],
            Opcode::Call(c) => c.args.iter().collect(),
            Opcode::Cast(c) => vec![&c.operand],
            Opcode::Offset(o) => vec![&o.base, &o.index],
            Opcode::Phi(p) => p.incoming.iter().map(|(op, _)| op).collect(),
            Opcode::Compare(c) => vec![&c.lhs, &c.rhs],
            Opcode::Binary(b) => vec![&b.lhs, &b.rhs],
            Opcode::Other => vec![],
        }
    }

    /// A short mnemonic, used in diagnostics.
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Opcode::Alloca(_) => "alloca",
            Opcode::Store(_) => "store",
            Opcode::Load(_) => "load",
            Opcode::Call(_) => "call",
            Opcode::Cast(_) => "cast",
            Opcode::Offset(_) => "offset",
            Opcode::Phi(_) => "phi",
            Opcode::Compare(_) => "cmp",
            Opcode::Binary(_) => "binop",
            Opcode::Other => "other",
        }
    }
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Instruction {
    /// Name of the value this instruction defines, if any.
    #[serde(default)]
    pub result: Option<ValueName>,
    /// Classification of the defined value. `Scalar` when there is none.
    pub ty: TypeKind,
    pub opcode: Opcode,
}

impl Instruction {
    pub fn new(result: Option<ValueName>, ty: TypeKind, opcode: Opcode) -> Self {
        Instruction { result, ty, opcode }
    }

    pub fn defines_pointer(&self) -> bool {
        self.result.is_some() && self.ty.is_pointer()
    }
}

impl std::fmt::Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(r) = &self.result {
            write!(f, "{} = ", r)?;
        }
        write!(f, "{}", self.opcode.mnemonic())?;
        if let Opcode::Call(c) = &self.opcode {
            write!(f, " {}", c.callee)?;
        }
        for op in self.opcode.operands() {
            write!(f, " {}", op)?;
        }
        Ok(())
    }
}
