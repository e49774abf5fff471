// =============================================================================
// OP - Opcodes and the byte-level instruction encoding
// =============================================================================
//
// An instruction is one opcode byte followed by its operands. Two-byte
// operands are big-endian. Instruction length is fixed per opcode, which
// is what makes in-place back-patching possible.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Op {
    Constant = 0,
    Add,
    Sub,
    Mul,
    Div,
    Pop,
    True,
    False,
    Equal,
    NotEqual,
    GreaterThan,
    Minus,
    Bang,
    JumpNotTruthy,
    Jump,
    Null,
    GetGlobal,
    SetGlobal,
    Call,
    ReturnValue,
    Return,
    GetLocal,
    SetLocal,
}

/// Registered shape of one opcode: mnemonic plus the byte width of each
/// operand (0, 1 or 2 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Definition {
    pub name: &'static str,
    pub operand_widths: &'static [usize],
}

impl Op {
    pub fn definition(self) -> Definition {
        let (name, operand_widths): (&'static str, &'static [usize]) = match self {
            Op::Constant => ("OpConstant", &[2]),
            Op::Add => ("OpAdd", &[]),
            Op::Sub => ("OpSub", &[]),
            Op::Mul => ("OpMul", &[]),
            Op::Div => ("OpDiv", &[]),
            Op::Pop => ("OpPop", &[]),
            Op::True => ("OpTrue", &[]),
            Op::False => ("OpFalse", &[]),
            Op::Equal => ("OpEqual", &[]),
            Op::NotEqual => ("OpNotEqual", &[]),
            Op::GreaterThan => ("OpGreaterThan", &[]),
            Op::Minus => ("OpMinus", &[]),
            Op::Bang => ("OpBang", &[]),
            Op::JumpNotTruthy => ("OpJumpNotTruthy", &[2]),
            Op::Jump => ("OpJump", &[2]),
            Op::Null => ("OpNull", &[]),
            Op::GetGlobal => ("OpGetGlobal", &[2]),
            Op::SetGlobal => ("OpSetGlobal", &[2]),
            Op::Call => ("OpCall", &[1]),
            Op::ReturnValue => ("OpReturnValue", &[]),
            Op::Return => ("OpReturn", &[]),
            Op::GetLocal => ("OpGetLocal", &[1]),
            Op::SetLocal => ("OpSetLocal", &[1]),
        };

        Definition {
            name,
            operand_widths,
        }
    }

    /// Decode a raw byte back into an opcode. Unknown bytes are a fatal
    /// decoding error for whoever is reading the stream.
    pub fn from_byte(byte: u8) -> Option<Op> {
        let op = match byte {
            0 => Op::Constant,
            1 => Op::Add,
            2 => Op::Sub,
            3 => Op::Mul,
            4 => Op::Div,
            5 => Op::Pop,
            6 => Op::True,
            7 => Op::False,
            8 => Op::Equal,
            9 => Op::NotEqual,
            10 => Op::GreaterThan,
            11 => Op::Minus,
            12 => Op::Bang,
            13 => Op::JumpNotTruthy,
            14 => Op::Jump,
            15 => Op::Null,
            16 => Op::GetGlobal,
            17 => Op::SetGlobal,
            18 => Op::Call,
            19 => Op::ReturnValue,
            20 => Op::Return,
            21 => Op::GetLocal,
            22 => Op::SetLocal,
            _ => return None,
        };
        Some(op)
    }

    /// Inverse of `Definition::name`. Lets disassembly output be
    /// re-encoded, which keeps the text format honest.
    pub fn from_name(name: &str) -> Option<Op> {
        let op = match name {
            "OpConstant" => Op::Constant,
            "OpAdd" => Op::Add,
            "OpSub" => Op::Sub,
            "OpMul" => Op::Mul,
            "OpDiv" => Op::Div,
            "OpPop" => Op::Pop,
            "OpTrue" => Op::True,
            "OpFalse" => Op::False,
            "OpEqual" => Op::Equal,
            "OpNotEqual" => Op::NotEqual,
            "OpGreaterThan" => Op::GreaterThan,
            "OpMinus" => Op::Minus,
            "OpBang" => Op::Bang,
            "OpJumpNotTruthy" => Op::JumpNotTruthy,
            "OpJump" => Op::Jump,
            "OpNull" => Op::Null,
            "OpGetGlobal" => Op::GetGlobal,
            "OpSetGlobal" => Op::SetGlobal,
            "OpCall" => Op::Call,
            "OpReturnValue" => Op::ReturnValue,
            "OpReturn" => Op::Return,
            "OpGetLocal" => Op::GetLocal,
            "OpSetLocal" => Op::SetLocal,
            _ => return None,
        };
        Some(op)
    }
}

/// Encode one instruction. Operands beyond the registered widths are
/// ignored; missing ones encode as zero placeholders (the compiler relies
/// on this when emitting jumps it patches later).
pub fn make(op: Op, operands: &[usize]) -> Vec<u8> {
    let def = op.definition();
    let len = 1 + def.operand_widths.iter().sum::<usize>();
    let mut instruction = Vec::with_capacity(len);

    instruction.push(op as u8);
    for (i, width) in def.operand_widths.iter().enumerate() {
        let operand = operands.get(i).copied().unwrap_or(0);
        match width {
            2 => {
                instruction.push((operand >> 8) as u8);
                instruction.push(operand as u8);
            }
            1 => {
                instruction.push(operand as u8);
            }
            _ => {}
        }
    }

    instruction
}

/// Decode the operands that follow an opcode byte. Returns the operand
/// values and how many bytes they occupied, so that
/// `read_operands(&op.definition(), &make(op, xs)[1..]) == (xs, widths)`.
pub fn read_operands(def: &Definition, ins: &[u8]) -> (Vec<usize>, usize) {
    let mut operands = Vec::with_capacity(def.operand_widths.len());
    let mut offset = 0;

    for width in def.operand_widths {
        match width {
            2 => {
                operands.push(read_u16(&ins[offset..]));
                offset += 2;
            }
            1 => {
                operands.push(read_u8(&ins[offset..]));
                offset += 1;
            }
            _ => {}
        }
    }

    (operands, offset)
}

pub fn read_u16(ins: &[u8]) -> usize {
    ((ins[0] as usize) << 8) | ins[1] as usize
}

pub fn read_u8(ins: &[u8]) -> usize {
    ins[0] as usize
}
