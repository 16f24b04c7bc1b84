// SPDX-License-Identifier: BSD-3-Clause
use std::fmt::Display;

/// The name of an SSA value: a register, an instruction result, or a
/// function parameter. Treated as an opaque key everywhere.
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct ValueName(String);

impl ValueName {
    pub fn get(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ValueName {
    fn from(s: &str) -> Self {
        ValueName(s.to_string())
    }
}

impl From<String> for ValueName {
    fn from(s: String) -> Self {
        ValueName(s)
    }
}

impl Display for ValueName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "%{}", self.0)
    }
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct FunctionName(String);

impl FunctionName {
    pub fn get(&self) -> &str {
        &self.0
    }
}

impl From<&str> for FunctionName {
    fn from(s: &str) -> Self {
        FunctionName(s.to_string())
    }
}

impl From<String> for FunctionName {
    fn from(s: String) -> Self {
        FunctionName(s)
    }
}

impl<T> PartialEq<T> for FunctionName
where
    T: AsRef<str>,
{
    fn eq(&self, other: &T) -> bool {
        self.0.as_str().eq(other.as_ref())
    }
}

impl Display for FunctionName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "@{}", self.0)
    }
}

/// The label of a basic block, unique within its function.
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct BlockName(String);

impl BlockName {
    pub fn get(&self) -> &str {
        &self.0
    }
}

impl From<&str> for BlockName {
    fn from(s: &str) -> Self {
        BlockName(s.to_string())
    }
}

impl From<String> for BlockName {
    fn from(s: String) -> Self {
        BlockName(s)
    }
}

impl Display for BlockName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:", self.0)
    }
}
