use std::rc::Rc;

use crate::bytecode::ir::{Bytecode, Constant};
use crate::bytecode::op::Op;
use crate::lang::object::{Object, RuntimeError};
use crate::runtime::frame::Frame;
use crate::runtime::vm_error::VmFault;

// =============================================================================
// VM - Stack-based bytecode interpreter
// =============================================================================

pub const STACK_SIZE: usize = 2048;
pub const GLOBALS_SIZE: usize = 65536;
pub const MAX_FRAMES: usize = 1024;

/// The virtual machine. One shared value stack serves every call frame:
/// a frame's arguments and locals occupy the slots starting at its base
/// pointer, and its scratch values grow above them.
///
/// Errors split into two channels. Faults of the machine itself (capacity
/// and decoding failures) come back as `Err(VmFault)`. Errors of the guest
/// program are `Object::Error` values: they halt execution and become the
/// program's result.
pub struct Vm {
    constants: Vec<Object>,
    stack: Vec<Object>,
    sp: usize,
    globals: Vec<Object>,
    frames: Vec<Frame>,
}

impl Vm {
    pub fn new(bytecode: Bytecode) -> Self {
        Vm::with_globals(bytecode, vec![Object::Null; GLOBALS_SIZE])
    }

    /// Run with a pre-populated globals store, as the REPL does to keep
    /// bindings alive across lines.
    pub fn with_globals(bytecode: Bytecode, globals: Vec<Object>) -> Self {
        let constants = bytecode
            .constants
            .into_iter()
            .map(|constant| match constant {
                Constant::Integer(value) => Object::Integer(value),
                Constant::Str(value) => Object::Str(value),
                Constant::Function(func) => Object::CompiledFunction(Rc::new(func)),
            })
            .collect();

        // The top-level program runs as an implicit zero-argument frame.
        let main = Rc::new(crate::bytecode::ir::CompiledFunction {
            instructions: bytecode.instructions,
            num_locals: 0,
            num_params: 0,
        });

        Vm {
            constants,
            stack: vec![Object::Null; STACK_SIZE],
            sp: 0,
            globals,
            frames: vec![Frame::new(main, 0)],
        }
    }

    pub fn into_globals(self) -> Vec<Object> {
        self.globals
    }

    /// The value sitting just above the stack pointer: whatever the last
    /// `OpPop` discarded. This is the result of an expression statement.
    pub fn last_popped(&self) -> &Object {
        &self.stack[self.sp]
    }

    pub fn run(&mut self) -> Result<Object, VmFault> {
        loop {
            let frame = self.current_frame();
            if frame.ip >= frame.instructions().len() {
                break;
            }

            let byte = frame.instructions()[frame.ip];
            let op = Op::from_byte(byte).ok_or(VmFault::UnknownOpcode(byte))?;
            self.current_frame_mut().ip += 1;

            match op {
                Op::Constant => {
                    let index = self.read_u16_operand()?;
                    let constant = self
                        .constants
                        .get(index)
                        .cloned()
                        .ok_or(VmFault::ConstantOutOfRange(index))?;
                    self.push(constant)?;
                }

                Op::Add | Op::Sub | Op::Mul | Op::Div => {
                    let right = self.pop()?;
                    let left = self.pop()?;
                    let result = execute_binary_operation(op, left, right);
                    if result.is_error() {
                        return Ok(result);
                    }
                    self.push(result)?;
                }

                Op::True => self.push(Object::Boolean(true))?,
                Op::False => self.push(Object::Boolean(false))?,
                Op::Null => self.push(Object::Null)?,
                Op::Pop => {
                    self.pop()?;
                }

                Op::Equal | Op::NotEqual | Op::GreaterThan => {
                    let right = self.pop()?;
                    let left = self.pop()?;
                    let result = execute_comparison(op, left, right);
                    if result.is_error() {
                        return Ok(result);
                    }
                    self.push(result)?;
                }

                Op::Bang => {
                    let operand = self.pop()?;
                    self.push(bang(&operand))?;
                }

                Op::Minus => {
                    let operand = self.pop()?;
                    match operand {
                        Object::Integer(value) => {
                            self.push(Object::Integer(value.wrapping_neg()))?
                        }
                        other => {
                            return Ok(Object::Error(RuntimeError::UnknownOperator {
                                operator: "-".to_string(),
                                left: None,
                                right: other.type_name(),
                            }));
                        }
                    }
                }

                Op::JumpNotTruthy => {
                    let target = self.read_u16_operand()?;
                    let condition = self.pop()?;
                    if !is_truthy(&condition) {
                        self.current_frame_mut().ip = target;
                    }
                }

                Op::Jump => {
                    let target = self.read_u16_operand()?;
                    self.current_frame_mut().ip = target;
                }

                Op::SetGlobal => {
                    let index = self.read_u16_operand()?;
                    if index >= self.globals.len() {
                        return Err(VmFault::GlobalsOverflow);
                    }
                    self.globals[index] = self.pop()?;
                }

                Op::GetGlobal => {
                    let index = self.read_u16_operand()?;
                    let value = self
                        .globals
                        .get(index)
                        .cloned()
                        .ok_or(VmFault::GlobalsOverflow)?;
                    self.push(value)?;
                }

                Op::SetLocal => {
                    let index = self.read_u8_operand()?;
                    let slot = self.current_frame().base_pointer + index;
                    if slot >= STACK_SIZE {
                        return Err(VmFault::StackOverflow);
                    }
                    self.stack[slot] = self.pop()?;
                }

                Op::GetLocal => {
                    let index = self.read_u8_operand()?;
                    let slot = self.current_frame().base_pointer + index;
                    if slot >= STACK_SIZE {
                        return Err(VmFault::StackOverflow);
                    }
                    self.push(self.stack[slot].clone())?;
                }

                Op::Call => {
                    let num_args = self.read_u8_operand()?;
                    if let Some(error) = self.call(num_args)? {
                        return Ok(error);
                    }
                }

                Op::ReturnValue => {
                    let value = self.pop()?;
                    if self.frames.len() == 1 {
                        // Top-level return halts the whole program.
                        return Ok(value);
                    }
                    self.pop_frame()?;
                    self.push(value)?;
                }

                Op::Return => {
                    if self.frames.len() == 1 {
                        return Ok(Object::Null);
                    }
                    self.pop_frame()?;
                    self.push(Object::Null)?;
                }
            }
        }

        Ok(self.last_popped().clone())
    }

    /// Invoke whatever sits below the arguments on the stack. A guest
    /// error comes back as `Some(error)`.
    fn call(&mut self, num_args: usize) -> Result<Option<Object>, VmFault> {
        if self.sp < num_args + 1 {
            return Err(VmFault::StackUnderflow);
        }
        let callee = self.stack[self.sp - 1 - num_args].clone();

        match callee {
            Object::CompiledFunction(func) => {
                if num_args != func.num_params {
                    return Ok(Some(Object::Error(RuntimeError::ArgumentNumberMismatch {
                        expected: func.num_params,
                        actual: num_args,
                    })));
                }
                if self.frames.len() >= MAX_FRAMES {
                    return Err(VmFault::FrameOverflow);
                }

                let base_pointer = self.sp - num_args;
                if base_pointer + func.num_locals > STACK_SIZE {
                    return Err(VmFault::StackOverflow);
                }

                // Arguments are already in place as the first locals;
                // reserve the rest above them.
                self.sp = base_pointer + func.num_locals;
                self.frames.push(Frame::new(func, base_pointer));
                Ok(None)
            }

            Object::Builtin(builtin) => {
                let args = self.stack[self.sp - num_args..self.sp].to_vec();
                let result = (builtin.func)(args);
                self.sp -= num_args + 1;
                if result.is_error() {
                    return Ok(Some(result));
                }
                self.push(result)?;
                Ok(None)
            }

            other => Ok(Some(Object::Error(RuntimeError::NotAFunction(
                other.type_name(),
            )))),
        }
    }

    /// Tear down the current frame: the stack shrinks back past the
    /// frame's locals and the function object itself.
    fn pop_frame(&mut self) -> Result<Frame, VmFault> {
        let frame = self.frames.pop().ok_or(VmFault::FrameUnderflow)?;
        if frame.base_pointer == 0 {
            return Err(VmFault::StackUnderflow);
        }
        self.sp = frame.base_pointer - 1;
        Ok(frame)
    }

    fn current_frame(&self) -> &Frame {
        &self.frames[self.frames.len() - 1]
    }

    fn current_frame_mut(&mut self) -> &mut Frame {
        let index = self.frames.len() - 1;
        &mut self.frames[index]
    }

    fn read_u16_operand(&mut self) -> Result<usize, VmFault> {
        let frame = self.current_frame();
        let ins = frame.instructions();
        if frame.ip + 2 > ins.len() {
            return Err(VmFault::TruncatedOperand);
        }
        let value = ((ins[frame.ip] as usize) << 8) | ins[frame.ip + 1] as usize;
        self.current_frame_mut().ip += 2;
        Ok(value)
    }

    fn read_u8_operand(&mut self) -> Result<usize, VmFault> {
        let frame = self.current_frame();
        let ins = frame.instructions();
        if frame.ip >= ins.len() {
            return Err(VmFault::TruncatedOperand);
        }
        let value = ins[frame.ip] as usize;
        self.current_frame_mut().ip += 1;
        Ok(value)
    }

    fn push(&mut self, object: Object) -> Result<(), VmFault> {
        if self.sp >= STACK_SIZE {
            return Err(VmFault::StackOverflow);
        }
        self.stack[self.sp] = object;
        self.sp += 1;
        Ok(())
    }

    fn pop(&mut self) -> Result<Object, VmFault> {
        if self.sp == 0 {
            return Err(VmFault::StackUnderflow);
        }
        self.sp -= 1;
        Ok(self.stack[self.sp].clone())
    }
}

/// Conditional truthiness: false and null are falsy, everything else,
/// including zero, is truthy.
fn is_truthy(object: &Object) -> bool {
    match object {
        Object::Boolean(value) => *value,
        Object::Null => false,
        _ => true,
    }
}

/// Prefix `!`. Unlike conditional truthiness this never inspects
/// integers: any non-boolean, non-null operand negates to false.
fn bang(object: &Object) -> Object {
    match object {
        Object::Boolean(value) => Object::Boolean(!value),
        Object::Null => Object::Boolean(true),
        _ => Object::Boolean(false),
    }
}

fn operator_symbol(op: Op) -> &'static str {
    match op {
        Op::Add => "+",
        Op::Sub => "-",
        Op::Mul => "*",
        Op::Div => "/",
        Op::GreaterThan => ">",
        Op::Equal => "==",
        Op::NotEqual => "!=",
        _ => "?",
    }
}

fn execute_binary_operation(op: Op, left: Object, right: Object) -> Object {
    match (left, right) {
        // Arithmetic wraps on overflow, like a two's-complement machine
        // word; overflow is never a host panic.
        (Object::Integer(left), Object::Integer(right)) => match op {
            Op::Add => Object::Integer(left.wrapping_add(right)),
            Op::Sub => Object::Integer(left.wrapping_sub(right)),
            Op::Mul => Object::Integer(left.wrapping_mul(right)),
            Op::Div => {
                if right == 0 {
                    Object::Error(RuntimeError::DivisionByZero)
                } else {
                    Object::Integer(left.wrapping_div(right))
                }
            }
            _ => Object::Error(RuntimeError::UnknownOperator {
                operator: operator_symbol(op).to_string(),
                left: Some(crate::lang::object::INTEGER),
                right: crate::lang::object::INTEGER,
            }),
        },

        (Object::Str(left), Object::Str(right)) => match op {
            Op::Add => Object::Str(left + &right),
            _ => Object::Error(RuntimeError::UnknownOperator {
                operator: operator_symbol(op).to_string(),
                left: Some(crate::lang::object::STRING),
                right: crate::lang::object::STRING,
            }),
        },

        (left, right) if left.type_name() == right.type_name() => {
            Object::Error(RuntimeError::UnknownOperator {
                operator: operator_symbol(op).to_string(),
                left: Some(left.type_name()),
                right: right.type_name(),
            })
        }

        (left, right) => Object::Error(RuntimeError::TypeMismatch {
            left: left.type_name(),
            right: right.type_name(),
        }),
    }
}

fn execute_comparison(op: Op, left: Object, right: Object) -> Object {
    if let (Object::Integer(left), Object::Integer(right)) = (&left, &right) {
        return match op {
            Op::Equal => Object::Boolean(left == right),
            Op::NotEqual => Object::Boolean(left != right),
            Op::GreaterThan => Object::Boolean(left > right),
            _ => Object::Null,
        };
    }

    match op {
        Op::Equal => Object::Boolean(left == right),
        Op::NotEqual => Object::Boolean(left != right),
        _ => Object::Error(RuntimeError::UnknownOperator {
            operator: operator_symbol(op).to_string(),
            left: Some(left.type_name()),
            right: right.type_name(),
        }),
    }
}
