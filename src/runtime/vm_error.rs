use std::fmt;

/// A machine-level fault. These are capacity and decoding failures of the
/// virtual machine itself, not errors in the guest program; guest errors
/// travel through the value channel as `Object::Error`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VmFault {
    StackOverflow,
    StackUnderflow,
    FrameOverflow,
    FrameUnderflow,
    GlobalsOverflow,
    UnknownOpcode(u8),
    TruncatedOperand,
    ConstantOutOfRange(usize),
}

impl fmt::Display for VmFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VmFault::StackOverflow => write!(f, "vm fault: stack overflow"),
            VmFault::StackUnderflow => write!(f, "vm fault: stack underflow"),
            VmFault::FrameOverflow => write!(f, "vm fault: call depth exceeded"),
            VmFault::FrameUnderflow => write!(f, "vm fault: frame underflow"),
            VmFault::GlobalsOverflow => write!(f, "vm fault: globals store exhausted"),
            VmFault::UnknownOpcode(byte) => write!(f, "vm fault: unknown opcode {}", byte),
            VmFault::TruncatedOperand => write!(f, "vm fault: truncated operand"),
            VmFault::ConstantOutOfRange(index) => {
                write!(f, "vm fault: constant index {} out of range", index)
            }
        }
    }
}

impl std::error::Error for VmFault {}
