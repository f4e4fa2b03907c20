use std::fs;
use std::io::ErrorKind;
use std::rc::Rc;

use log::debug;
use thiserror::Error;

use crate::assembly::InstrParser;
use crate::instructions::instructions::{create_instr, get_opcode, get_register, Instr, MemoryAddressType, Operand, Program, SourceLocation, WordType};
use crate::loader::ast::{InstrAst, OperandAst};

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("{0}")]
    ParseError(String),

    #[error("{}", .0.join("\n"))]
    AnalysisError(Vec<String>),

    #[error("{0}")]
    NotFoundError(String),

    #[error("{0}")]
    IOError(String),
}

struct Loader {
    code: Vec<Instr>,
    errors: Vec<String>,
}

impl Loader {
    fn load(&mut self, src: &str) -> Result<(), LoadError> {
        let parser = InstrParser::new();

        for (line_index, line) in src.lines().enumerate() {
            let line_nr = line_index + 1;
            let text = strip_comment(line);
            if text.is_empty() {
                continue;
            }

            let ast = match parser.parse(text) {
                Ok(ast) => ast,
                Err(err) => {
                    return Err(LoadError::ParseError(
                        format!("Parsing error at line {}: '{}': {}", line_nr, text, err)));
                }
            };

            let loc = SourceLocation { line: line_nr, column: leading_whitespace(line) + ast.pos + 1 };
            match self.analyze_instr(&ast, text, loc) {
                Ok(instr) => {
                    debug!("Loaded [{}]", instr);
                    self.code.push(instr)
                }
                Err(msg) => self.errors.push(format!("{} at [{}]", msg, loc)),
            }
        }

        Ok(())
    }

    fn analyze_instr(&self, ast: &InstrAst, text: &str, loc: SourceLocation) -> Result<Instr, String> {
        let opcode = match get_opcode(&ast.mnemonic) {
            None => return Err(format!("Unknown mnemonic '{}'", ast.mnemonic)),
            Some(opcode) => opcode,
        };

        let mut operands = Vec::with_capacity(ast.operands.len());
        for operand_ast in &ast.operands {
            operands.push(self.analyze_operand(operand_ast)?);
        }

        create_instr(opcode, &operands, text, Some(loc))
    }

    fn analyze_operand(&self, operand_ast: &OperandAst) -> Result<Operand, String> {
        match operand_ast {
            OperandAst::Register(name) => match get_register(name) {
                None => Err(format!("Illegal register '{}'", name)),
                Some(reg) => Ok(Operand::Register(reg)),
            },
            OperandAst::Immediate(value) => Ok(Operand::Immediate(parse_integer(value)?)),
            OperandAst::MemoryAccess { offset, base } => {
                Ok(Operand::Memory(decode_memory_access(offset, base)?))
            }
        }
    }
}

fn strip_comment(line: &str) -> &str {
    match line.find(|c: char| c == '#' || c == ';') {
        Some(index) => line[..index].trim(),
        None => line.trim(),
    }
}

fn leading_whitespace(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

fn parse_integer(s: &str) -> Result<WordType, String> {
    s.trim().parse().map_err(|_| format!("Illegal integer '{}'", s))
}

// The address of offset(base) is offset+base; the base may carry a '$' prefix.
fn decode_memory_access(offset: &str, base: &str) -> Result<MemoryAddressType, String> {
    let offset = parse_integer(offset)?;
    let base = parse_integer(base.trim_start_matches('$'))?;
    let addr = offset.checked_add(base)
        .ok_or_else(|| format!("Memory address {}+{} overflows", offset, base))?;
    MemoryAddressType::try_from(addr)
        .map_err(|_| format!("Illegal memory address {}", addr))
}

pub fn load_from_string(src: String) -> Result<Program, LoadError> {
    let mut loader = Loader {
        code: Vec::new(),
        errors: Vec::new(),
    };

    loader.load(&src)?;

    if !loader.errors.is_empty() {
        return Err(LoadError::AnalysisError(loader.errors));
    }

    let mut code = Vec::with_capacity(loader.code.len());
    for instr in loader.code {
        code.push(Rc::new(instr));
    }
    Ok(Program { code })
}

pub fn load(path: &str) -> Result<Program, LoadError> {
    let src = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            return Err(LoadError::NotFoundError(format!("File '{}' does not exist.", path)));
        }
        Err(err) => {
            return Err(LoadError::IOError(format!("Error reading file '{}': {}", path, err)));
        }
    };

    load_from_string(src)
}
