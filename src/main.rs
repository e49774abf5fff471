mod bytecode;
mod frontend;
mod lang;
mod repl;
mod runtime;

use std::{env, fs, path::Path, process};

use crate::bytecode::compile::Compiler;
use crate::bytecode::disasm::disassemble;
use crate::bytecode::ir::{Bytecode, Constant};
use crate::frontend::lexer::Lexer;
use crate::frontend::parser::Parser;
use crate::lang::ast::Program;
use crate::lang::object::Object;
use crate::runtime::environment::Environment;
use crate::runtime::eval::eval_program;
use crate::runtime::vm::Vm;

const SOURCE_EXT: &str = "cdr";
const IMAGE_EXT: &str = "cinb";

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.contains(&"--help".to_string()) || args.contains(&"-h".to_string()) {
        print_usage();
        return;
    }

    let tokens_only = args.contains(&"--tokens".to_string());
    let ast_only = args.contains(&"--ast".to_string());
    let disasm_only = args.contains(&"--disasm".to_string());
    let use_eval = args.contains(&"--eval".to_string());
    let emit_image = args.contains(&"--emit-bc".to_string());

    // first non-flag argument is the filename
    let filename = args.iter().skip(1).find(|a| !a.starts_with('-'));

    match filename {
        Some(filename) => run_file(
            filename,
            tokens_only,
            ast_only,
            disasm_only,
            use_eval,
            emit_image,
        ),
        None => {
            let engine = if use_eval {
                repl::Engine::TreeWalker
            } else {
                repl::Engine::Bytecode
            };
            repl::start(engine);
        }
    }
}

fn print_usage() {
    println!("CINDER - Expression-Oriented Scripting Language");
    println!();
    println!("Usage:");
    println!("  cinder                      Start interactive REPL (bytecode engine)");
    println!("  cinder <file.{}>           Compile and run a program", SOURCE_EXT);
    println!("  cinder <file.{}>          Run a compiled image", IMAGE_EXT);
    println!("  cinder --eval [file]        Use the tree-walking evaluator");
    println!("  cinder --tokens <file>      Show tokens only");
    println!("  cinder --ast <file>         Show the parsed program only");
    println!("  cinder --disasm <file>      Show disassembled bytecode only");
    println!("  cinder --emit-bc <file>     Compile to a .{} image", IMAGE_EXT);
    println!("  cinder --help, -h           Show this help");
}

fn run_file(
    filename: &str,
    tokens_only: bool,
    ast_only: bool,
    disasm_only: bool,
    use_eval: bool,
    emit_image: bool,
) {
    match extension(filename) {
        Some(IMAGE_EXT) => run_image(filename, disasm_only),
        Some(SOURCE_EXT) => run_source(
            filename,
            tokens_only,
            ast_only,
            disasm_only,
            use_eval,
            emit_image,
        ),
        _ => {
            eprintln!(
                "Error: expected a .{} or .{} file, got {}",
                SOURCE_EXT, IMAGE_EXT, filename
            );
            process::exit(1);
        }
    }
}

fn extension(filename: &str) -> Option<&str> {
    Path::new(filename).extension().and_then(|e| e.to_str())
}

fn run_image(filename: &str, disasm_only: bool) {
    let bytes = match fs::read(filename) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Failed to read '{}': {}", filename, e);
            process::exit(1);
        }
    };

    let bytecode = match Bytecode::from_bytes(&bytes) {
        Ok(bytecode) => bytecode,
        Err(e) => {
            eprintln!("Invalid bytecode image '{}': {}", filename, e);
            process::exit(1);
        }
    };

    if disasm_only {
        print_disassembly(&bytecode);
        return;
    }

    execute(bytecode);
}

fn run_source(
    filename: &str,
    tokens_only: bool,
    ast_only: bool,
    disasm_only: bool,
    use_eval: bool,
    emit_image: bool,
) {
    let source = match fs::read_to_string(filename) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Failed to read '{}': {}", filename, e);
            process::exit(1);
        }
    };

    let tokens = match Lexer::new(&source).tokenize() {
        Ok(tokens) => tokens,
        Err(e) => {
            eprintln!("Lexer error: {}", e);
            process::exit(1);
        }
    };

    if tokens_only {
        for spanned in &tokens {
            println!(
                "{:>4}:{:<3} {:?}",
                spanned.span.line, spanned.span.col, spanned.token
            );
        }
        return;
    }

    let program = match Parser::new(tokens).parse() {
        Ok(program) => program,
        Err(errors) => {
            for e in errors {
                eprintln!("{}", e);
            }
            process::exit(1);
        }
    };

    if ast_only {
        println!("{}", program);
        return;
    }

    if use_eval {
        report_result(eval_program(&program, &Environment::new()));
        return;
    }

    let bytecode = compile(&program);

    if disasm_only {
        print_disassembly(&bytecode);
        return;
    }

    if emit_image {
        write_image(filename, &bytecode);
        return;
    }

    execute(bytecode);
}

fn compile(program: &Program) -> Bytecode {
    let mut compiler = Compiler::new();
    if let Err(errors) = compiler.compile(program) {
        eprintln!("{}", errors);
        process::exit(1);
    }
    compiler.bytecode()
}

fn print_disassembly(bytecode: &Bytecode) {
    print!("{}", disassemble(&bytecode.instructions));
    for (index, constant) in bytecode.constants.iter().enumerate() {
        if let Constant::Function(func) = constant {
            println!("-- fn constant {} ({} locals) --", index, func.num_locals);
            print!("{}", disassemble(&func.instructions));
        }
    }
}

fn write_image(filename: &str, bytecode: &Bytecode) {
    let out = Path::new(filename).with_extension(IMAGE_EXT);
    let bytes = match bytecode.to_bytes() {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Failed to serialize bytecode: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = fs::write(&out, bytes) {
        eprintln!("Failed to write '{}': {}", out.display(), e);
        process::exit(1);
    }
}

fn execute(bytecode: Bytecode) {
    let mut vm = Vm::new(bytecode);
    match vm.run() {
        Ok(result) => report_result(result),
        Err(fault) => {
            eprintln!("{}", fault);
            process::exit(1);
        }
    }
}

fn report_result(result: Object) {
    match result {
        Object::Error(err) => {
            eprintln!("Runtime error: {}", err);
            process::exit(1);
        }
        Object::Null => {}
        other => println!("{}", other),
    }
}
