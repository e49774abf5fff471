use serde::{Deserialize, Serialize};

// =============================================================================
// IR - Compiled program representation
// =============================================================================

/// The immutable output of one compilation: a flat instruction stream and
/// the ordered constant pool its `OpConstant` operands index into.
///
/// Serialization keeps the opcode bytes verbatim and the constant pool as
/// a type-tagged, length-prefixed sequence (postcard's enum + Vec layout),
/// which is the on-disk `.cinb` format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bytecode {
    pub instructions: Vec<u8>,
    pub constants: Vec<Constant>,
}

impl Bytecode {
    pub fn to_bytes(&self) -> Result<Vec<u8>, postcard::Error> {
        postcard::to_allocvec(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, postcard::Error> {
        postcard::from_bytes(bytes)
    }
}

/// A constant-pool entry. Only literals and compiled functions can appear
/// here; indices are append-only and stable within one compilation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Constant {
    Integer(i64),
    Str(String),
    Function(CompiledFunction),
}

/// A function lowered to bytecode: its own instruction stream plus how
/// many stack slots its locals need and how many arguments it expects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledFunction {
    pub instructions: Vec<u8>,
    pub num_locals: usize,
    pub num_params: usize,
}
