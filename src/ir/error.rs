// SPDX-License-Identifier: BSD-3-Clause
use super::name::{BlockName, FunctionName, ValueName};

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("malformed IR: function {0} has no blocks")]
    EmptyFunction(FunctionName),
    #[error("malformed IR: duplicate block {1} in function {0}")]
    DuplicateBlock(FunctionName, BlockName),
    #[error("malformed IR: duplicate SSA definition {1} in function {0}")]
    DuplicateDefinition(FunctionName, ValueName),
    #[error("malformed IR: branch to unknown block {1} in function {0}")]
    UnknownBlock(FunctionName, BlockName),
    #[error("malformed IR: phi {1} names unknown incoming block {2} in function {0}")]
    UnknownPhiBlock(FunctionName, ValueName, BlockName),
    #[error("malformed IR: {1} through non-pointer operand in function {0}")]
    NonPointerAccess(FunctionName, &'static str),
}
