/// An operand as it was written; numbers are kept as text so the loader can
/// report conversion problems with a proper location.
#[derive(Debug, Clone, PartialEq)]
pub enum OperandAst {
    Register(String),
    Immediate(String),
    MemoryAccess { offset: String, base: String },
}

/// A single instruction line.
#[derive(Debug, Clone, PartialEq)]
pub struct InstrAst {
    pub mnemonic: String,
    pub operands: Vec<OperandAst>,
    // byte offset of the mnemonic within the line
    pub pos: usize,
}
