//! Assembler and Disassembler for Armlite
//!
//! Converts between text assembly and the in-memory [`Program`].
//!
//! ```text
//! ; sum two numbers
//!         mov x1, 5
//!         mov x2, 3
//!         add x3, x1, x2
//!         print x3, d
//! ```
//!
//! Each line holds at most one instruction, optionally preceded by one or
//! more `label:` declarations. A label binds to the next instruction in the
//! file, even when that instruction is on a later line. `;` and `#` start a
//! comment outside of string literals.
//!
//! Branch and call targets are not checked here: a program may mention a
//! label it never declares, and the interpreter reports it when (and only
//! when) that branch is taken. Use [`Program::undefined_labels`] to find
//! them ahead of time.

use crate::ir::format::{
    AluOp, BranchCond, CmpMode, Instruction, Opcode, Operand, PrintBase, Program, Register,
};
use crate::ir::labels::{LabelError, DEFAULT_BUCKETS};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AsmError {
    #[error("Invalid opcode at line {line}: {mnemonic}")]
    InvalidOpcode { line: usize, mnemonic: String },
    #[error("Invalid register at line {line}: {token}")]
    InvalidRegister { line: usize, token: String },
    #[error("Invalid immediate value at line {line}: {token}")]
    InvalidImmediate { line: usize, token: String },
    #[error("Invalid print base at line {line}: {token} (expected d, x, b or s)")]
    InvalidBase { line: usize, token: String },
    #[error("Invalid label name at line {line}: {name}")]
    InvalidLabel { line: usize, name: String },
    #[error("Missing operand at line {0}")]
    MissingOperand(usize),
    #[error("Unexpected operand at line {line}: {token}")]
    UnexpectedOperand { line: usize, token: String },
    #[error("Unterminated string literal at line {0}")]
    UnterminatedString(usize),
    #[error("Duplicate label at line {line}: {label}")]
    DuplicateLabel { line: usize, label: String },
    #[error("Parse error at line {line}: {message}")]
    ParseError { line: usize, message: String },
}

impl AsmError {
    /// 1-based source line the error was found on
    pub fn line(&self) -> usize {
        match self {
            AsmError::InvalidOpcode { line, .. }
            | AsmError::InvalidRegister { line, .. }
            | AsmError::InvalidImmediate { line, .. }
            | AsmError::InvalidBase { line, .. }
            | AsmError::InvalidLabel { line, .. }
            | AsmError::UnexpectedOperand { line, .. }
            | AsmError::DuplicateLabel { line, .. }
            | AsmError::ParseError { line, .. } => *line,
            AsmError::MissingOperand(line) | AsmError::UnterminatedString(line) => *line,
        }
    }
}

/// Largest byte count a single store/load can move (one register)
pub const MAX_TRANSFER_BYTES: i64 = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token<'a> {
    Word(&'a str),
    Str(String),
    Colon,
}

impl Token<'_> {
    fn describe(&self) -> String {
        match self {
            Token::Word(word) => word.to_string(),
            Token::Str(text) => format!("\"{}\"", text),
            Token::Colon => ":".to_string(),
        }
    }
}

/// Split one source line into words, string literals and colons.
fn tokenize(line: &str, line_num: usize) -> Result<Vec<Token<'_>>, AsmError> {
    let mut tokens = Vec::new();
    let mut chars = line.char_indices().peekable();

    while let Some(&(start, c)) = chars.peek() {
        match c {
            ';' | '#' => break,
            ',' => {
                chars.next();
            }
            ':' => {
                chars.next();
                tokens.push(Token::Colon);
            }
            '"' => {
                chars.next();
                let mut text = String::new();
                let mut closed = false;
                while let Some((_, c)) = chars.next() {
                    match c {
                        '"' => {
                            closed = true;
                            break;
                        }
                        '\\' => match chars.next() {
                            Some((_, 'n')) => text.push('\n'),
                            Some((_, 'r')) => text.push('\r'),
                            Some((_, 't')) => text.push('\t'),
                            Some((_, '0')) => text.push('\0'),
                            Some((_, '\\')) => text.push('\\'),
                            Some((_, '"')) => text.push('"'),
                            Some((_, other)) => {
                                text.push('\\');
                                text.push(other);
                            }
                            None => break,
                        },
                        other => text.push(other),
                    }
                }
                if !closed {
                    return Err(AsmError::UnterminatedString(line_num));
                }
                tokens.push(Token::Str(text));
            }
            c if c.is_whitespace() => {
                chars.next();
            }
            _ => {
                let mut end = line.len();
                while let Some(&(i, c)) = chars.peek() {
                    if c.is_whitespace() || matches!(c, ',' | ':' | ';' | '#' | '"') {
                        end = i;
                        break;
                    }
                    chars.next();
                }
                tokens.push(Token::Word(&line[start..end]));
            }
        }
    }

    Ok(tokens)
}

fn is_label_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '.' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

/// Parse `x0`..`x31`.
fn parse_register(s: &str) -> Option<Register> {
    let digits = s.strip_prefix('x').or_else(|| s.strip_prefix('X'))?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let index: u32 = digits.parse().ok()?;
    u8::try_from(index).ok().and_then(Register::new)
}

fn parse_radix(digits: &str, radix: u32) -> Option<u64> {
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return None;
    }
    u64::from_str_radix(digits, radix).ok()
}

/// Parse a decimal, `0x` hex or `0b` binary immediate.
///
/// Hex and binary accept the full 64-bit pattern (`0xffffffffffffffff` is
/// -1); decimal values must fit in `i64`.
pub fn parse_immediate(s: &str) -> Option<i64> {
    let (negative, body) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };

    let (magnitude, bit_pattern) =
        if let Some(hex) = body.strip_prefix("0x").or_else(|| body.strip_prefix("0X")) {
            (parse_radix(hex, 16)?, true)
        } else if let Some(bin) = body.strip_prefix("0b").or_else(|| body.strip_prefix("0B")) {
            (parse_radix(bin, 2)?, true)
        } else {
            (parse_radix(body, 10)?, false)
        };

    if negative {
        if magnitude > i64::MAX as u64 + 1 {
            return None;
        }
        Some((magnitude as i64).wrapping_neg())
    } else if bit_pattern || magnitude <= i64::MAX as u64 {
        Some(magnitude as i64)
    } else {
        None
    }
}

/// Cursor over the operand tokens of one instruction
struct Operands<'t, 'a> {
    tokens: &'t [Token<'a>],
    pos: usize,
    line: usize,
}

impl<'t, 'a> Operands<'t, 'a> {
    fn new(tokens: &'t [Token<'a>], line: usize) -> Self {
        Self {
            tokens,
            pos: 0,
            line,
        }
    }

    fn next(&mut self) -> Result<&'t Token<'a>, AsmError> {
        let token = self
            .tokens
            .get(self.pos)
            .ok_or(AsmError::MissingOperand(self.line))?;
        self.pos += 1;
        Ok(token)
    }

    fn word(&mut self) -> Result<&'a str, AsmError> {
        match self.next()? {
            Token::Word(word) => Ok(*word),
            other => Err(AsmError::UnexpectedOperand {
                line: self.line,
                token: other.describe(),
            }),
        }
    }

    fn register(&mut self) -> Result<Register, AsmError> {
        let word = self.word()?;
        parse_register(word).ok_or_else(|| AsmError::InvalidRegister {
            line: self.line,
            token: word.to_string(),
        })
    }

    fn immediate(&mut self) -> Result<i64, AsmError> {
        let word = self.word()?;
        parse_immediate(word).ok_or_else(|| AsmError::InvalidImmediate {
            line: self.line,
            token: word.to_string(),
        })
    }

    /// Register or immediate, told apart by the `x` prefix
    fn value(&mut self) -> Result<Operand, AsmError> {
        let word = self.word()?;
        if word.starts_with('x') || word.starts_with('X') {
            parse_register(word)
                .map(Operand::Reg)
                .ok_or_else(|| AsmError::InvalidRegister {
                    line: self.line,
                    token: word.to_string(),
                })
        } else {
            parse_immediate(word)
                .map(Operand::Imm)
                .ok_or_else(|| AsmError::InvalidImmediate {
                    line: self.line,
                    token: word.to_string(),
                })
        }
    }

    fn byte_count(&mut self) -> Result<u8, AsmError> {
        let count = self.immediate()?;
        if !(0..=MAX_TRANSFER_BYTES).contains(&count) {
            return Err(AsmError::ParseError {
                line: self.line,
                message: format!(
                    "byte count {} out of range (0..={})",
                    count, MAX_TRANSFER_BYTES
                ),
            });
        }
        Ok(count as u8)
    }

    fn base(&mut self) -> Result<PrintBase, AsmError> {
        let word = self.word()?;
        let mut chars = word.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => PrintBase::from_char(c),
            _ => None,
        }
        .ok_or_else(|| AsmError::InvalidBase {
            line: self.line,
            token: word.to_string(),
        })
    }

    fn label(&mut self) -> Result<String, AsmError> {
        let word = self.word()?;
        if !is_label_name(word) {
            return Err(AsmError::InvalidLabel {
                line: self.line,
                name: word.to_string(),
            });
        }
        Ok(word.to_string())
    }

    fn text(&mut self) -> Result<String, AsmError> {
        match self.next()? {
            Token::Str(text) => Ok(text.clone()),
            other => Err(AsmError::ParseError {
                line: self.line,
                message: format!("expected string literal, found {}", other.describe()),
            }),
        }
    }

    /// Reject trailing operands.
    fn finish(&self) -> Result<(), AsmError> {
        match self.tokens.get(self.pos) {
            Some(extra) => Err(AsmError::UnexpectedOperand {
                line: self.line,
                token: extra.describe(),
            }),
            None => Ok(()),
        }
    }
}

/// Assembler for Armlite
pub struct Assembler {
    label_buckets: usize,
}

impl Assembler {
    pub fn new() -> Self {
        Self {
            label_buckets: DEFAULT_BUCKETS,
        }
    }

    /// Use a specific bucket count for the program's label table
    pub fn with_label_buckets(mut self, buckets: usize) -> Self {
        self.label_buckets = buckets;
        self
    }

    /// Assemble text to a Program
    pub fn assemble(&self, source: &str) -> Result<Program, AsmError> {
        let mut program = Program::with_label_buckets(self.label_buckets);

        for (idx, line) in source.lines().enumerate() {
            let line_num = idx + 1;
            let tokens = tokenize(line, line_num)?;
            let mut rest: &[Token<'_>] = &tokens;

            // Leading label declarations
            while let [Token::Word(name), Token::Colon, tail @ ..] = rest {
                if !is_label_name(name) {
                    return Err(AsmError::InvalidLabel {
                        line: line_num,
                        name: name.to_string(),
                    });
                }
                program.define_label(*name).map_err(|e| match e {
                    LabelError::DuplicateLabel(label) => AsmError::DuplicateLabel {
                        line: line_num,
                        label,
                    },
                    LabelError::UnknownLabel(label) => AsmError::InvalidLabel {
                        line: line_num,
                        name: label,
                    },
                })?;
                rest = tail;
            }

            if rest.is_empty() {
                continue;
            }

            let instr = self.parse_instruction(rest, line_num)?;
            program.push(instr, line_num);
        }

        tracing::debug!(
            instructions = program.len(),
            labels = program.labels().len(),
            "assembled program"
        );

        Ok(program)
    }

    fn parse_instruction(&self, tokens: &[Token<'_>], line: usize) -> Result<Instruction, AsmError> {
        let mnemonic = match &tokens[0] {
            Token::Word(word) => word.to_lowercase(),
            other => {
                return Err(AsmError::ParseError {
                    line,
                    message: format!("expected instruction, found {}", other.describe()),
                })
            }
        };
        let (opcode, cond) =
            Opcode::from_mnemonic(&mnemonic).ok_or_else(|| AsmError::InvalidOpcode {
                line,
                mnemonic: mnemonic.clone(),
            })?;

        let mut ops = Operands::new(&tokens[1..], line);

        let instr = match opcode {
            Opcode::Mov => {
                let rd = ops.register()?;
                let imm = ops.immediate()?;
                Instruction::Mov { rd, imm }
            }

            // rd, rn, register-or-immediate
            Opcode::Add | Opcode::Sub => {
                let op = if opcode == Opcode::Add {
                    AluOp::Add
                } else {
                    AluOp::Sub
                };
                let rd = ops.register()?;
                let rn = ops.register()?;
                let rm = ops.value()?;
                Instruction::Alu { op, rd, rn, rm }
            }

            // Three registers
            Opcode::And | Opcode::Eor | Opcode::Orr => {
                let op = match opcode {
                    Opcode::And => AluOp::And,
                    Opcode::Eor => AluOp::Eor,
                    _ => AluOp::Orr,
                };
                let rd = ops.register()?;
                let rn = ops.register()?;
                let rm = Operand::Reg(ops.register()?);
                Instruction::Alu { op, rd, rn, rm }
            }

            // Shift amount is always an immediate
            Opcode::Asr | Opcode::Lsl | Opcode::Lsr => {
                let op = match opcode {
                    Opcode::Asr => AluOp::Asr,
                    Opcode::Lsl => AluOp::Lsl,
                    _ => AluOp::Lsr,
                };
                let rd = ops.register()?;
                let rn = ops.register()?;
                let rm = Operand::Imm(ops.immediate()?);
                Instruction::Alu { op, rd, rn, rm }
            }

            Opcode::Cmp | Opcode::CmpU => {
                let mode = if opcode == Opcode::Cmp {
                    CmpMode::Signed
                } else {
                    CmpMode::Unsigned
                };
                let rn = ops.register()?;
                let rm = ops.value()?;
                Instruction::Cmp { mode, rn, rm }
            }

            // store rs, addr, count
            Opcode::Store => {
                let rs = ops.register()?;
                let addr = ops.value()?;
                let count = ops.byte_count()?;
                Instruction::Store { rs, addr, count }
            }

            // load rd, count, addr
            Opcode::Load => {
                let rd = ops.register()?;
                let count = ops.byte_count()?;
                let addr = ops.value()?;
                Instruction::Load { rd, count, addr }
            }

            // put "text", addr
            Opcode::Put => {
                let text = ops.text()?;
                let addr = ops.value()?;
                Instruction::Put { text, addr }
            }

            Opcode::Print => {
                let value = ops.value()?;
                let base = ops.base()?;
                Instruction::Print { value, base }
            }

            Opcode::Branch => Instruction::Branch {
                cond,
                label: ops.label()?,
            },

            Opcode::Call => Instruction::Call {
                label: ops.label()?,
            },

            Opcode::Ret => Instruction::Ret,
        };

        ops.finish()?;
        Ok(instr)
    }
}

impl Default for Assembler {
    fn default() -> Self {
        Self::new()
    }
}

/// Disassembler for Armlite
pub struct Disassembler {
    show_offsets: bool,
    show_labels: bool,
}

impl Disassembler {
    pub fn new() -> Self {
        Self {
            show_offsets: false,
            show_labels: true,
        }
    }

    pub fn with_offsets(mut self, show: bool) -> Self {
        self.show_offsets = show;
        self
    }

    pub fn with_labels(mut self, show: bool) -> Self {
        self.show_labels = show;
        self
    }

    /// Disassemble a program to text
    pub fn disassemble(&self, program: &Program) -> String {
        // Labels grouped by target position; a label may sit past the end
        let mut labels_at: Vec<Vec<&str>> = vec![Vec::new(); program.len() + 1];
        if self.show_labels {
            for (name, target) in program.labels().iter() {
                if let Some(slot) = labels_at.get_mut(target) {
                    slot.push(name);
                }
            }
            for names in &mut labels_at {
                names.sort_unstable();
            }
        }

        let mut output = String::new();
        for (pc, instr) in program.instructions().iter().enumerate() {
            for name in &labels_at[pc] {
                output.push_str(&format!("{}:\n", name));
            }
            if self.show_offsets {
                output.push_str(&format!("{:04}:  ", pc));
            }
            output.push_str(&format!("    {}\n", instr));
        }
        for name in &labels_at[program.len()] {
            output.push_str(&format!("{}:\n", name));
        }

        output
    }
}

impl Default for Disassembler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn x(i: u8) -> Register {
        Register::new(i).unwrap()
    }

    #[test]
    fn test_assemble_simple() {
        let asm = Assembler::new();
        let source = r#"
            mov x1, 5
            mov x2, 3
            add x3, x1, x2
            print x3, d
        "#;

        let program = asm.assemble(source).unwrap();
        assert_eq!(program.len(), 4);
        assert_eq!(program.instructions()[0], Instruction::Mov { rd: x(1), imm: 5 });
        assert_eq!(
            program.instructions()[2],
            Instruction::Alu {
                op: AluOp::Add,
                rd: x(3),
                rn: x(1),
                rm: Operand::Reg(x(2)),
            }
        );
        assert_eq!(program.line_of(2), Some(4));
    }

    #[test]
    fn test_assemble_with_labels() {
        let asm = Assembler::new();
        let source = r#"
        start:
            mov x0, 10
        loop: sub x0, x0, 1
            cmp x0, 0
            bne loop
        end:
        "#;

        let program = asm.assemble(source).unwrap();
        assert_eq!(program.len(), 4);
        assert_eq!(program.labels().get("start"), Ok(0));
        assert_eq!(program.labels().get("loop"), Ok(1));
        assert_eq!(program.labels().get("end"), Ok(4));
        assert_eq!(
            program.instructions()[3],
            Instruction::Branch {
                cond: BranchCond::Ne,
                label: "loop".into()
            }
        );
    }

    #[test]
    fn test_immediates() {
        assert_eq!(parse_immediate("42"), Some(42));
        assert_eq!(parse_immediate("-7"), Some(-7));
        assert_eq!(parse_immediate("0x1F"), Some(31));
        assert_eq!(parse_immediate("0b101"), Some(5));
        assert_eq!(parse_immediate("0xffffffffffffffff"), Some(-1));
        assert_eq!(parse_immediate("-9223372036854775808"), Some(i64::MIN));
        assert_eq!(parse_immediate("9223372036854775808"), None);
        assert_eq!(parse_immediate("0x"), None);
        assert_eq!(parse_immediate("12a"), None);
        assert_eq!(parse_immediate("+5"), None);
    }

    #[test]
    fn test_registers() {
        assert_eq!(parse_register("x0"), Some(x(0)));
        assert_eq!(parse_register("x31"), Some(x(31)));
        assert_eq!(parse_register("x32"), None);
        assert_eq!(parse_register("x"), None);
        assert_eq!(parse_register("x-1"), None);
        assert_eq!(parse_register("r1"), None);
    }

    #[test]
    fn test_memory_operand_order() {
        let asm = Assembler::new();
        let program = asm
            .assemble("store x1, 0x100, 8\nload x2, 4, x3\nput \"a; b\", x4")
            .unwrap();
        assert_eq!(
            program.instructions()[0],
            Instruction::Store {
                rs: x(1),
                addr: Operand::Imm(256),
                count: 8
            }
        );
        assert_eq!(
            program.instructions()[1],
            Instruction::Load {
                rd: x(2),
                count: 4,
                addr: Operand::Reg(x(3))
            }
        );
        assert_eq!(
            program.instructions()[2],
            Instruction::Put {
                text: "a; b".into(),
                addr: Operand::Reg(x(4))
            }
        );
    }

    #[test]
    fn test_print_bases() {
        let asm = Assembler::new();
        let program = asm.assemble("print x1, x\nprint 7, b\nprint x2, s").unwrap();
        assert_eq!(
            program.instructions()[0],
            Instruction::Print {
                value: Operand::Reg(x(1)),
                base: PrintBase::Hex
            }
        );
        assert!(matches!(
            asm.assemble("print x1, q"),
            Err(AsmError::InvalidBase { line: 1, .. })
        ));
    }

    #[test]
    fn test_shape_errors() {
        let asm = Assembler::new();
        assert!(matches!(
            asm.assemble("mov x1, x2"),
            Err(AsmError::InvalidImmediate { .. })
        ));
        assert!(matches!(
            asm.assemble("and x1, x2, 3"),
            Err(AsmError::InvalidRegister { .. })
        ));
        assert!(matches!(
            asm.assemble("lsl x1, x2, x3"),
            Err(AsmError::InvalidImmediate { .. })
        ));
        assert!(matches!(
            asm.assemble("ret x1"),
            Err(AsmError::UnexpectedOperand { .. })
        ));
        assert!(matches!(
            asm.assemble("add x1, x2"),
            Err(AsmError::MissingOperand(1))
        ));
        assert!(matches!(
            asm.assemble("store x1, 0, 9"),
            Err(AsmError::ParseError { .. })
        ));
        assert!(matches!(
            asm.assemble("halt"),
            Err(AsmError::InvalidOpcode { .. })
        ));
        assert!(matches!(
            asm.assemble("put \"open, 0"),
            Err(AsmError::UnterminatedString(1))
        ));
    }

    #[test]
    fn test_duplicate_label_rejected() {
        let asm = Assembler::new();
        let err = asm.assemble("a:\nmov x1, 1\na:\nret").unwrap_err();
        assert!(matches!(err, AsmError::DuplicateLabel { line: 3, ref label } if label == "a"));
        assert_eq!(err.line(), 3);
    }

    #[test]
    fn test_comments_and_escapes() {
        let asm = Assembler::new();
        let program = asm
            .assemble("put \"tab\\there # not a comment\", 0 ; real comment\n# whole line")
            .unwrap();
        assert_eq!(program.len(), 1);
        assert_eq!(
            program.instructions()[0],
            Instruction::Put {
                text: "tab\there # not a comment".into(),
                addr: Operand::Imm(0)
            }
        );
    }

    #[test]
    fn test_disassemble() {
        let asm = Assembler::new();
        let source = "main:\n mov x1, 0\n cmp x1, 0\n beq done\n print x1, d\ndone:\n print x1, x";
        let program = asm.assemble(source).unwrap();

        let output = Disassembler::new().disassemble(&program);
        assert!(output.starts_with("main:\n    mov x1, 0\n"));
        assert!(output.contains("done:\n    print x1, x\n"));

        // The listing assembles back to the same instructions
        let again = asm.assemble(&output).unwrap();
        assert_eq!(again.instructions(), program.instructions());
        assert_eq!(again.labels().get("done"), Ok(4));
    }
}
