use std::io::{BufRead, Write};

use crate::bytecode::compile::Compiler;
use crate::bytecode::ir::Constant;
use crate::bytecode::symbol::SymbolTable;
use crate::frontend::lexer::Lexer;
use crate::frontend::parser::Parser;
use crate::lang::ast::Program;
use crate::lang::object::Object;
use crate::runtime::environment::Environment;
use crate::runtime::eval::eval_program;
use crate::runtime::vm::{GLOBALS_SIZE, Vm};

const PROMPT: &str = ">> ";

/// Which engine executes REPL input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Engine {
    Bytecode,
    TreeWalker,
}

pub fn start(engine: Engine) {
    match engine {
        Engine::Bytecode => run_bytecode_repl(),
        Engine::TreeWalker => run_tree_walker_repl(),
    }
}

fn read_parse(line: &str) -> Option<Program> {
    let tokens = match Lexer::new(line).tokenize() {
        Ok(tokens) => tokens,
        Err(err) => {
            eprintln!("{}", err);
            return None;
        }
    };

    match Parser::new(tokens).parse() {
        Ok(program) => Some(program),
        Err(errors) => {
            for err in errors {
                eprintln!("{}", err);
            }
            None
        }
    }
}

/// Compile-and-run loop. Symbol table, constant pool and globals store
/// carry over between lines, so bindings persist.
fn run_bytecode_repl() {
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();

    let mut symbols = SymbolTable::new();
    let mut constants: Vec<Constant> = Vec::new();
    let mut globals = vec![Object::Null; GLOBALS_SIZE];

    loop {
        print!("{}", PROMPT);
        let _ = stdout.flush();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }

        let Some(program) = read_parse(&line) else {
            continue;
        };

        let mut compiler = Compiler::with_state(symbols, constants);
        let compiled = compiler.compile(&program);
        let bytecode = compiler.bytecode();
        (symbols, constants) = compiler.into_state();

        if let Err(errors) = compiled {
            eprintln!("{}", errors);
            continue;
        }

        let mut vm = Vm::with_globals(bytecode, globals);
        match vm.run() {
            Ok(result) => println!("{}", result),
            Err(fault) => eprintln!("{}", fault),
        }
        globals = vm.into_globals();
    }
}

/// Evaluator loop; one environment for the whole session.
fn run_tree_walker_repl() {
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    let env = Environment::new();

    loop {
        print!("{}", PROMPT);
        let _ = stdout.flush();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }

        let Some(program) = read_parse(&line) else {
            continue;
        };

        println!("{}", eval_program(&program, &env));
    }
}
