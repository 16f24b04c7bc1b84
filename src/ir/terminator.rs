// SPDX-License-Identifier: BSD-3-Clause
use super::name::BlockName;
use super::operand::Operand;

#[derive(Clone, Debug, Hash, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Br {
    pub dest: BlockName,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CondBr {
    pub condition: Operand,
    pub then_dest: BlockName,
    pub else_dest: BlockName,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Ret {
    pub operand: Option<Operand>,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "op", rename_all = "kebab-case")]
pub enum TerminatorOpcode {
    Br(Br),
    CondBr(CondBr),
    Ret(Ret),
    /// Unreachable, resume, and anything else without a modeled effect.
    Other,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Terminator {
    pub opcode: TerminatorOpcode,
}

impl Terminator {
    pub fn br(dest: impl Into<BlockName>) -> Self {
        Terminator {
            opcode: TerminatorOpcode::Br(Br { dest: dest.into() }),
        }
    }

    pub fn cond_br(
        condition: Operand,
        then_dest: impl Into<BlockName>,
        else_dest: impl Into<BlockName>,
    ) -> Self {
        Terminator {
            opcode: TerminatorOpcode::CondBr(CondBr {
                condition,
                then_dest: then_dest.into(),
                else_dest: else_dest.into(),
            }),
        }
    }

    pub fn ret(operand: Option<Operand>) -> Self {
        Terminator {
            opcode: TerminatorOpcode::Ret(Ret { operand }),
        }
    }

    pub fn successors(&self) -> Vec<&BlockName> {
        match &self.opcode {
            TerminatorOpcode::Br(b) => vec![&b.dest],
            TerminatorOpcode::CondBr(c) => vec![&c.then_dest, &c.else_dest],
            TerminatorOpcode::Ret(_) => vec![],
            TerminatorOpcode::Other => vec![],
        }
    }

    pub fn mnemonic(&self) -> &'static str {
        match &self.opcode {
            TerminatorOpcode::Br(_) => "br",
            TerminatorOpcode::CondBr(_) => "condbr",
            TerminatorOpcode::Ret(_) => "ret",
            TerminatorOpcode::Other => "other",
        }
    }
}

impl std::fmt::Display for Terminator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.opcode {
            TerminatorOpcode::Br(b) => write!(f, "br {}", b.dest.get()),
            TerminatorOpcode::CondBr(c) => write!(
                f,
                "br {} {} {}",
                c.condition,
                c.then_dest.get(),
                c.else_dest.get()
            ),
            TerminatorOpcode::Ret(r) => match &r.operand {
                Some(op) => write!(f, "ret {}", op),
                None => write!(f, "ret"),
            },
            TerminatorOpcode::Other => write!(f, "<terminator>"),
        }
    }
}
