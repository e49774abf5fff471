use std::mem;

use crate::bytecode::compile_error::{CompileError, CompileErrors};
use crate::bytecode::ir::{Bytecode, CompiledFunction, Constant};
use crate::bytecode::op::{Op, make};
use crate::bytecode::symbol::{SymbolScope, SymbolTable};
use crate::lang::ast::{Block, Expression, Program, Statement};

/// Opcode and byte offset of an already-emitted instruction, kept so the
/// peephole rewrites can look one instruction back.
#[derive(Debug, Clone, Copy)]
struct EmittedInstruction {
    op: Op,
    position: usize,
}

/// One instruction buffer on the scope stack. The stack mirrors function
/// nesting: the bottom scope is the top-level program, every function
/// literal being compiled pushes another.
#[derive(Debug, Default)]
struct CompilationScope {
    instructions: Vec<u8>,
    last_instruction: Option<EmittedInstruction>,
    previous_instruction: Option<EmittedInstruction>,
}

pub struct Compiler {
    constants: Vec<Constant>,
    symbols: SymbolTable,
    scopes: Vec<CompilationScope>,
    errors: Vec<CompileError>,
}

impl Default for Compiler {
    fn default() -> Self {
        Compiler::new()
    }
}

impl Compiler {
    pub fn new() -> Self {
        Compiler::with_state(SymbolTable::new(), Vec::new())
    }

    /// Resume with a symbol table and constant pool from an earlier
    /// compilation. This is what keeps REPL lines sharing globals.
    pub fn with_state(symbols: SymbolTable, constants: Vec<Constant>) -> Self {
        Compiler {
            constants,
            symbols,
            scopes: vec![CompilationScope::default()],
            errors: Vec::new(),
        }
    }

    /// Hand the symbol table and constant pool back for the next
    /// compilation unit.
    pub fn into_state(self) -> (SymbolTable, Vec<Constant>) {
        (self.symbols, self.constants)
    }

    /// Compile a whole program into the current scope. Errors accumulate
    /// across the traversal; the result carries every one of them.
    pub fn compile(&mut self, program: &Program) -> Result<(), CompileErrors> {
        for statement in &program.statements {
            self.compile_statement(statement);
        }

        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(CompileErrors(mem::take(&mut self.errors)))
        }
    }

    /// The finished artifact for the outermost scope.
    pub fn bytecode(&self) -> Bytecode {
        Bytecode {
            instructions: self.scopes[0].instructions.clone(),
            constants: self.constants.clone(),
        }
    }

    // Traversal

    fn compile_statement(&mut self, statement: &Statement) {
        match statement {
            Statement::Let { name, value } => {
                self.compile_expression(value);
                let symbol = self.symbols.define(name);
                match symbol.scope {
                    SymbolScope::Global => self.emit(Op::SetGlobal, &[symbol.index]),
                    SymbolScope::Local => self.emit(Op::SetLocal, &[symbol.index]),
                };
            }
            Statement::Return(value) => {
                self.compile_expression(value);
                self.emit(Op::ReturnValue, &[]);
            }
            Statement::Expr(expression) => {
                self.compile_expression(expression);
                self.emit(Op::Pop, &[]);
            }
        }
    }

    fn compile_block(&mut self, block: &Block) {
        for statement in &block.statements {
            self.compile_statement(statement);
        }
    }

    fn compile_expression(&mut self, expression: &Expression) {
        match expression {
            Expression::Identifier(name) => match self.symbols.resolve(name) {
                Some(symbol) => {
                    let (scope, index) = (symbol.scope, symbol.index);
                    match scope {
                        SymbolScope::Global => self.emit(Op::GetGlobal, &[index]),
                        SymbolScope::Local => self.emit(Op::GetLocal, &[index]),
                    };
                }
                None => self.errors.push(CompileError::UndefinedVariable(name.clone())),
            },

            Expression::Integer(value) => {
                let index = self.add_constant(Constant::Integer(*value));
                self.emit(Op::Constant, &[index]);
            }

            Expression::Str(value) => {
                let index = self.add_constant(Constant::Str(value.clone()));
                self.emit(Op::Constant, &[index]);
            }

            Expression::Boolean(true) => {
                self.emit(Op::True, &[]);
            }
            Expression::Boolean(false) => {
                self.emit(Op::False, &[]);
            }

            Expression::Prefix { operator, right } => {
                self.compile_expression(right);
                match operator.as_str() {
                    "!" => self.emit(Op::Bang, &[]),
                    "-" => self.emit(Op::Minus, &[]),
                    _ => {
                        self.errors
                            .push(CompileError::UnknownPrefixOperator(operator.clone()));
                        return;
                    }
                };
            }

            Expression::Infix {
                operator,
                left,
                right,
            } => self.compile_infix(operator, left, right),

            Expression::If {
                condition,
                consequence,
                alternative,
            } => self.compile_if(condition, consequence, alternative.as_ref()),

            Expression::Function { parameters, body } => {
                self.compile_function(parameters, body);
            }

            Expression::Call {
                function,
                arguments,
            } => {
                self.compile_expression(function);
                for argument in arguments {
                    self.compile_expression(argument);
                }
                self.emit(Op::Call, &[arguments.len()]);
            }

            Expression::Bad => self.errors.push(CompileError::InvalidExpression),
        }
    }

    /// Only one relational opcode exists: `a < b` lowers to `b > a`, and
    /// `a >= b` to `!(b > a)`, by reversing the operand emission order.
    fn compile_infix(&mut self, operator: &str, left: &Expression, right: &Expression) {
        match operator {
            "<" | ">=" => {
                self.compile_expression(right);
                self.compile_expression(left);
            }
            _ => {
                self.compile_expression(left);
                self.compile_expression(right);
            }
        }

        match operator {
            "+" => {
                self.emit(Op::Add, &[]);
            }
            "-" => {
                self.emit(Op::Sub, &[]);
            }
            "*" => {
                self.emit(Op::Mul, &[]);
            }
            "/" => {
                self.emit(Op::Div, &[]);
            }
            "==" => {
                self.emit(Op::Equal, &[]);
            }
            "!=" => {
                self.emit(Op::NotEqual, &[]);
            }
            ">" | "<" => {
                self.emit(Op::GreaterThan, &[]);
            }
            ">=" | "<=" => {
                self.emit(Op::GreaterThan, &[]);
                self.emit(Op::Bang, &[]);
            }
            _ => {
                self.errors
                    .push(CompileError::UnknownInfixOperator(operator.to_string()));
            }
        }
    }

    /// Conditionals compile with forward jumps whose targets are patched
    /// in once each arm's end offset is known. Each arm's trailing pop is
    /// trimmed so the arm's value stays on the stack as the expression
    /// result; a missing alternative pushes null instead.
    fn compile_if(
        &mut self,
        condition: &Expression,
        consequence: &Block,
        alternative: Option<&Block>,
    ) {
        self.compile_expression(condition);
        let jump_not_truthy = self.emit(Op::JumpNotTruthy, &[0]);

        self.compile_if_arm(consequence);

        let jump = self.emit(Op::Jump, &[0]);

        let after_consequence = self.current_instructions().len();
        self.change_operand(jump_not_truthy, Op::JumpNotTruthy, after_consequence);

        match alternative {
            Some(block) => self.compile_if_arm(block),
            None => {
                self.emit(Op::Null, &[]);
            }
        }

        let after_alternative = self.current_instructions().len();
        self.change_operand(jump, Op::Jump, after_alternative);
    }

    /// Compile one arm of a conditional, trimming its trailing pop so the
    /// arm's value survives as the expression result. An arm that emitted
    /// nothing, or ended in a binding, leaves no value on the stack; the
    /// surrounding pop would underflow, so substitute null.
    fn compile_if_arm(&mut self, block: &Block) {
        let start = self.current_instructions().len();
        self.compile_block(block);
        if self.last_instruction_is(Op::Pop) {
            self.remove_last_instruction();
        }

        let leaves_value = self.current_instructions().len() > start
            && !self.last_instruction_is(Op::SetGlobal)
            && !self.last_instruction_is(Op::SetLocal);
        if !leaves_value {
            self.emit(Op::Null, &[]);
        }
    }

    fn compile_function(&mut self, parameters: &[String], body: &Block) {
        self.enter_scope();
        for parameter in parameters {
            self.symbols.define(parameter);
        }

        self.compile_block(body);

        // A body ending in a discarded expression returns that value; a
        // body with no return at all returns null.
        if self.last_instruction_is(Op::Pop) {
            self.replace_last_pop_with_return();
        }
        if !self.last_instruction_is(Op::ReturnValue) {
            self.emit(Op::Return, &[]);
        }

        let num_locals = self.symbols.num_definitions();
        let instructions = self.leave_scope();

        let index = self.add_constant(Constant::Function(CompiledFunction {
            instructions,
            num_locals,
            num_params: parameters.len(),
        }));
        self.emit(Op::Constant, &[index]);
    }

    // Emission

    fn emit(&mut self, op: Op, operands: &[usize]) -> usize {
        let instruction = make(op, operands);
        let position = self.add_instruction(&instruction);
        self.set_last_instruction(op, position);
        position
    }

    fn add_instruction(&mut self, instruction: &[u8]) -> usize {
        let scope = self.current_scope_mut();
        let position = scope.instructions.len();
        scope.instructions.extend_from_slice(instruction);
        position
    }

    fn add_constant(&mut self, constant: Constant) -> usize {
        self.constants.push(constant);
        self.constants.len() - 1
    }

    fn set_last_instruction(&mut self, op: Op, position: usize) {
        let scope = self.current_scope_mut();
        scope.previous_instruction = scope.last_instruction;
        scope.last_instruction = Some(EmittedInstruction { op, position });
    }

    fn last_instruction_is(&self, op: Op) -> bool {
        self.current_scope()
            .last_instruction
            .is_some_and(|last| last.op == op)
    }

    /// Drop the most recently emitted instruction from the buffer.
    fn remove_last_instruction(&mut self) {
        let scope = self.current_scope_mut();
        match scope.last_instruction {
            Some(last) => {
                scope.instructions.truncate(last.position);
                scope.last_instruction = scope.previous_instruction;
                scope.previous_instruction = None;
            }
            None => self.errors.push(CompileError::NothingToTrim),
        }
    }

    /// The implicit-return peephole: rewrite a trailing `OpPop` into
    /// `OpReturnValue` at the same offset.
    fn replace_last_pop_with_return(&mut self) {
        let position = match self.current_scope().last_instruction {
            Some(last) if last.op == Op::Pop => last.position,
            _ => {
                self.errors.push(CompileError::NothingToTrim);
                return;
            }
        };

        self.replace_instruction(position, &make(Op::ReturnValue, &[]));
        self.current_scope_mut().last_instruction = Some(EmittedInstruction {
            op: Op::ReturnValue,
            position,
        });
    }

    /// Back-patch the operand of an instruction already in the buffer.
    /// Encoded length is fixed per opcode, so this never shifts offsets.
    fn change_operand(&mut self, position: usize, op: Op, operand: usize) {
        self.replace_instruction(position, &make(op, &[operand]));
    }

    fn replace_instruction(&mut self, position: usize, instruction: &[u8]) {
        let buffer = &mut self.current_scope_mut().instructions;
        buffer[position..position + instruction.len()].copy_from_slice(instruction);
    }

    // Scope stack

    fn enter_scope(&mut self) {
        self.scopes.push(CompilationScope::default());
        let outer = mem::take(&mut self.symbols);
        self.symbols = SymbolTable::new_enclosed(outer);
    }

    /// Pop the current scope and hand back its finished instruction
    /// buffer, restoring the enclosing symbol table. The outermost scope
    /// is never popped; trying is an internal error.
    fn leave_scope(&mut self) -> Vec<u8> {
        if self.scopes.len() <= 1 || self.symbols.is_global() {
            self.errors.push(CompileError::LeftGlobalScope);
            return Vec::new();
        }

        let instructions = self
            .scopes
            .pop()
            .map(|scope| scope.instructions)
            .unwrap_or_default();

        let table = mem::take(&mut self.symbols);
        if let Some(outer) = table.into_outer() {
            self.symbols = outer;
        }

        instructions
    }

    fn current_scope(&self) -> &CompilationScope {
        &self.scopes[self.scopes.len() - 1]
    }

    fn current_scope_mut(&mut self) -> &mut CompilationScope {
        let index = self.scopes.len() - 1;
        &mut self.scopes[index]
    }

    fn current_instructions(&self) -> &[u8] {
        &self.current_scope().instructions
    }
}
