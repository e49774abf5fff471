use std::rc::Rc;

use crate::bytecode::ir::CompiledFunction;

/// One activation record. `base_pointer` marks where this call's region of
/// the shared value stack begins: arguments and locals live at
/// `base_pointer..base_pointer + num_locals`, scratch space above that.
#[derive(Debug, Clone)]
pub struct Frame {
    pub func: Rc<CompiledFunction>,
    pub ip: usize,
    pub base_pointer: usize,
}

impl Frame {
    pub fn new(func: Rc<CompiledFunction>, base_pointer: usize) -> Self {
        Frame {
            func,
            ip: 0,
            base_pointer,
        }
    }

    pub fn instructions(&self) -> &[u8] {
        &self.func.instructions
    }
}
