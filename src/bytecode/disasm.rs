use std::fmt::Write;

use crate::bytecode::op::{Op, read_operands};

// =============================================================================
// DISASM - Human-readable rendering of an instruction stream
// =============================================================================

/// Render a flat instruction stream, one instruction per line:
/// a four-digit byte offset, the mnemonic, then each operand in decimal.
pub fn disassemble(instructions: &[u8]) -> String {
    let mut out = String::new();
    let mut ip = 0;

    while ip < instructions.len() {
        let Some(op) = Op::from_byte(instructions[ip]) else {
            let _ = writeln!(out, "{:04} ERROR: unknown opcode {}", ip, instructions[ip]);
            ip += 1;
            continue;
        };

        let def = op.definition();
        let (operands, read) = read_operands(&def, &instructions[ip + 1..]);

        let _ = write!(out, "{:04} {}", ip, def.name);
        for operand in &operands {
            let _ = write!(out, " {}", operand);
        }
        out.push('\n');

        ip += 1 + read;
    }

    out
}

/// Parse one line of disassembly back into its components. Used to check
/// that the text format loses nothing.
#[cfg(test)]
fn parse_line(line: &str) -> Option<(usize, Op, Vec<usize>)> {
    let mut parts = line.split_whitespace();
    let offset = parts.next()?.parse().ok()?;
    let op = Op::from_name(parts.next()?)?;
    let operands = parts.map(|p| p.parse().ok()).collect::<Option<Vec<_>>>()?;
    Some((offset, op, operands))
}
