// SPDX-License-Identifier: BSD-3-Clause
//! A small typed SSA IR, shaped so the analyses can pattern-match on opcode
//! categories directly. An external front-end lowers source programs into
//! this form; the host reads it from JSON.
//!
//! Values are named, assigned once, and classified only as pointer or
//! scalar. Every block carries an explicit terminator; the terminator
//! occupies the final instruction slot of its block for the purposes of
//! [`InstLoc`] addressing and dataflow.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

mod error;
pub use error::*;
mod name;
pub use name::*;
mod operand;
pub use operand::*;
pub mod instruction;
pub use instruction::{Instruction, Opcode};
pub mod terminator;
pub use terminator::{Terminator, TerminatorOpcode};

#[derive(Clone, Debug, Hash, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Parameter {
    pub name: ValueName,
    pub ty: TypeKind,
}

impl Parameter {
    pub fn pointer(name: impl Into<ValueName>) -> Self {
        Parameter {
            name: name.into(),
            ty: TypeKind::Pointer,
        }
    }

    pub fn scalar(name: impl Into<ValueName>) -> Self {
        Parameter {
            name: name.into(),
            ty: TypeKind::Scalar,
        }
    }
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Block {
    pub name: BlockName,
    pub instrs: Vec<Instruction>,
    pub terminator: Terminator,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Function {
    pub name: FunctionName,
    pub parameters: Vec<Parameter>,
    pub blocks: Vec<Block>,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Module {
    pub functions: Vec<Function>,
}

impl Module {
    pub fn get(&self, name: &FunctionName) -> Option<&Function> {
        self.functions.iter().find(|f| &f.name == name)
    }
}

/// The position of an instruction within its function: block index plus
/// offset into the block, where `index == instrs.len()` addresses the
/// block's terminator.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct InstLoc {
    pub block: usize,
    pub index: usize,
}

impl Function {
    /// Every instruction location in linear IR order, terminators included.
    pub fn locs(&self) -> impl Iterator<Item = InstLoc> + '_ {
        self.blocks.iter().enumerate().flat_map(|(b, block)| {
            (0..=block.instrs.len()).map(move |index| InstLoc { block: b, index })
        })
    }

    /// The instruction at `loc`, or `None` when `loc` addresses a terminator.
    pub fn instruction(&self, loc: InstLoc) -> Option<&Instruction> {
        self.blocks.get(loc.block)?.instrs.get(loc.index)
    }

    pub fn terminator(&self, loc: InstLoc) -> Option<&Terminator> {
        let block = self.blocks.get(loc.block)?;
        if loc.index == block.instrs.len() {
            Some(&block.terminator)
        } else {
            None
        }
    }

    /// Map from each defined SSA name to its defining instruction.
    pub fn definitions(&self) -> HashMap<&ValueName, &Instruction> {
        let mut defs = HashMap::new();
        for block in &self.blocks {
            for instr in &block.instrs {
                if let Some(result) = &instr.result {
                    defs.insert(result, instr);
                }
            }
        }
        defs
    }

    /// All SSA names of pointer type: pointer parameters plus every
    /// pointer-typed instruction result.
    pub fn pointer_names(&self) -> Vec<&ValueName> {
        let mut names: Vec<&ValueName> = self
            .parameters
            .iter()
            .filter(|p| p.ty.is_pointer())
            .map(|p| &p.name)
            .collect();
        for block in &self.blocks {
            for instr in &block.instrs {
                if instr.defines_pointer() {
                    names.push(instr.result.as_ref().unwrap());
                }
            }
        }
        names
    }

    /// Render `loc` for diagnostics: `block:index: <instruction>`.
    pub fn format_loc(&self, loc: InstLoc) -> String {
        let block = &self.blocks[loc.block];
        match self.instruction(loc) {
            Some(i) => format!("{}{}: {}", block.name, loc.index, i),
            None => format!("{}{}: {}", block.name, loc.index, block.terminator),
        }
    }

    /// Structural sanity checks; a function that fails any of them is
    /// skipped by the per-module driver.
    pub fn validate(&self) -> Result<(), Error> {
        if self.blocks.is_empty() {
            return Err(Error::EmptyFunction(self.name.clone()));
        }

        let mut block_names = HashMap::new();
        for (i, block) in self.blocks.iter().enumerate() {
            if block_names.insert(block.name.get(), i).is_some() {
                return Err(Error::DuplicateBlock(self.name.clone(), block.name.clone()));
            }
        }

        let mut defined: HashMap<&ValueName, ()> = HashMap::new();
        for p in &self.parameters {
            if let Entry::Vacant(e) = defined.entry(&p.name) {
                e.insert(());
            } else {
                return Err(Error::DuplicateDefinition(
                    self.name.clone(),
                    p.name.clone(),
                ));
            }
        }

        for block in &self.blocks {
            for instr in &block.instrs {
                if let Some(result) = &instr.result {
                    if let Entry::Vacant(e) = defined.entry(result) {
                        e.insert(());
                    } else {
                        return Err(Error::DuplicateDefinition(
                            self.name.clone(),
                            result.clone(),
                        ));
                    }
                }
                match &instr.opcode {
                    Opcode::Store(s) => {
                        if !s.pointer.is_pointer() {
                            return Err(Error::NonPointerAccess(self.name.clone(), "store"));
                        }
                    }
                    Opcode::Load(l) => {
                        if !l.pointer.is_pointer() {
                            return Err(Error::NonPointerAccess(self.name.clone(), "load"));
                        }
                    }
                    Opcode::Offset(o) => {
                        if !o.base.is_pointer() {
                            return Err(Error::NonPointerAccess(self.name.clone(), "offset"));
                        }
                    }
                    Opcode::Phi(phi) => {
                        for (_, incoming_block) in &phi.incoming {
                            if !block_names.contains_key(incoming_block.get()) {
                                return Err(Error::UnknownPhiBlock(
                                    self.name.clone(),
                                    instr.result.clone().unwrap_or_else(|| "?".into()),
                                    incoming_block.clone(),
                                ));
                            }
                        }
                    }
                    _ => {}
                }
            }
            for succ in block.terminator.successors() {
                if !block_names.contains_key(succ.get()) {
                    return Err(Error::UnknownBlock(self.name.clone(), succ.clone()));
                }
            }
        }
        Ok(())
    }
}

/// Precomputed control-flow queries for one (validated) function.
pub struct Cfg<'f> {
    function: &'f Function,
    index: HashMap<&'f str, usize>,
    preds: Vec<Vec<usize>>,
    succs: Vec<Vec<usize>>,
}

impl<'f> Cfg<'f> {
    pub fn new(function: &'f Function) -> Self {
        let index: HashMap<&'f str, usize> = function
            .blocks
            .iter()
            .enumerate()
            .map(|(i, b)| (b.name.get(), i))
            .collect();
        let mut preds = vec![Vec::new(); function.blocks.len()];
        let mut succs = vec![Vec::new(); function.blocks.len()];
        for (b, block) in function.blocks.iter().enumerate() {
            for succ in block.terminator.successors() {
                let s = index[succ.get()];
                succs[b].push(s);
                preds[s].push(b);
            }
        }
        Cfg {
            function,
            index,
            preds,
            succs,
        }
    }

    pub fn block_index(&self, name: &BlockName) -> Option<usize> {
        self.index.get(name.get()).copied()
    }

    pub fn block_preds(&self, block: usize) -> &[usize] {
        &self.preds[block]
    }

    pub fn block_succs(&self, block: usize) -> &[usize] {
        &self.succs[block]
    }

    fn first_loc(&self, block: usize) -> InstLoc {
        InstLoc { block, index: 0 }
    }

    fn terminator_loc(&self, block: usize) -> InstLoc {
        InstLoc {
            block,
            index: self.function.blocks[block].instrs.len(),
        }
    }

    /// Instruction-level predecessors: the previous instruction in the
    /// block, or the terminators of all predecessor blocks for a block's
    /// first location.
    pub fn loc_preds(&self, loc: InstLoc) -> Vec<InstLoc> {
        if loc.index > 0 {
            return vec![InstLoc {
                block: loc.block,
                index: loc.index - 1,
            }];
        }
        self.preds[loc.block]
            .iter()
            .map(|&p| self.terminator_loc(p))
            .collect()
    }

    /// Instruction-level successors: the next instruction in the block, or
    /// the first locations of all successor blocks for a terminator.
    pub fn loc_succs(&self, loc: InstLoc) -> Vec<InstLoc> {
        if loc.index < self.function.blocks[loc.block].instrs.len() {
            return vec![InstLoc {
                block: loc.block,
                index: loc.index + 1,
            }];
        }
        self.succs[loc.block]
            .iter()
            .map(|&s| self.first_loc(s))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_block_function() -> Function {
        Function {
            name: "f".into(),
            parameters: vec![Parameter::pointer("p")],
            blocks: vec![
                Block {
                    name: "entry".into(),
                    instrs: vec![Instruction::new(
                        Some("x".into()),
                        TypeKind::Pointer,
                        Opcode::Cast(instruction::Cast {
                            operand: Operand::pointer("p"),
                        }),
                    )],
                    terminator: Terminator::br("exit"),
                },
                Block {
                    name: "exit".into(),
                    instrs: vec![],
                    terminator: Terminator::ret(None),
                },
            ],
        }
    }

    #[test]
    fn validate_ok() {
        assert_eq!(Ok(()), two_block_function().validate());
    }

    #[test]
    fn validate_unknown_block() {
        let mut f = two_block_function();
        f.blocks[0].terminator = Terminator::br("nowhere");
        assert!(matches!(f.validate(), Err(Error::UnknownBlock(_, _))));
    }

    #[test]
    fn validate_duplicate_definition() {
        let mut f = two_block_function();
        f.blocks[0].instrs.push(Instruction::new(
            Some("x".into()),
            TypeKind::Pointer,
            Opcode::Cast(instruction::Cast {
                operand: Operand::pointer("p"),
            }),
        ));
        assert!(matches!(
            f.validate(),
            Err(Error::DuplicateDefinition(_, _))
        ));
    }

    #[test]
    fn loc_edges_cross_blocks() {
        let f = two_block_function();
        let cfg = Cfg::new(&f);
        // entry terminator → first loc of exit (its terminator, as exit has
        // no instructions)
        let term = InstLoc { block: 0, index: 1 };
        assert_eq!(vec![InstLoc { block: 1, index: 0 }], cfg.loc_succs(term));
        assert_eq!(vec![term], cfg.loc_preds(InstLoc { block: 1, index: 0 }));
    }

    #[test]
    fn linear_order_covers_terminators() {
        let f = two_block_function();
        let locs: Vec<_> = f.locs().collect();
        assert_eq!(4, locs.len());
        assert!(f.instruction(locs[0]).is_some());
        assert!(f.terminator(locs[1]).is_some());
    }
}
