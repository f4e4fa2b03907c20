use std::fmt;
use std::rc::Rc;

use regex::Regex;

use crate::instructions::instructions::Operand::{Immediate, Memory, Register, Unused};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

pub(crate) type WordType = i64;
pub(crate) type MemoryAddressType = u32;

// The number of integer registers and the number of floating point registers.
pub(crate) const ARCH_REG_CNT: u8 = 32;

// The maximum number of source (input) operands for an instruction.
pub(crate) const MAX_SOURCE_COUNT: usize = 2;

/// The type of functional unit an instruction needs for its whole execution.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub(crate) enum UnitType {
    FpAdd,
    FpMult,
    FpDiv,
    Int,
}

impl UnitType {
    // The order in which the functional unit pool is laid out.
    pub(crate) const ALL: [UnitType; 4] = [UnitType::FpAdd, UnitType::FpMult, UnitType::FpDiv, UnitType::Int];
}

impl fmt::Display for UnitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UnitType::FpAdd => "FP Add",
            UnitType::FpMult => "FP Mult",
            UnitType::FpDiv => "FP Div",
            UnitType::Int => "Int Unit",
        };
        write!(f, "{}", name)
    }
}

#[allow(non_camel_case_types)]
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Opcode {
    L_D,
    S_D,
    LI,
    LW,
    SW,
    ADD,
    ADDI,
    ADD_D,
    SUB_D,
    SUB,
    MUL_D,
    DIV_D,
}

pub(crate) fn mnemonic(opcode: Opcode) -> &'static str {
    match opcode {
        Opcode::L_D => "L.D",
        Opcode::S_D => "S.D",
        Opcode::LI => "LI",
        Opcode::LW => "LW",
        Opcode::SW => "SW",
        Opcode::ADD => "ADD",
        Opcode::ADDI => "ADDI",
        Opcode::ADD_D => "ADD.D",
        Opcode::SUB_D => "SUB.D",
        Opcode::SUB => "SUB",
        Opcode::MUL_D => "MUL.D",
        Opcode::DIV_D => "DIV.D",
    }
}

pub(crate) fn get_opcode(mnemonic: &str) -> Option<Opcode> {
    let string = mnemonic.to_uppercase();
    let mnemonic_uppercased = string.as_str();

    match mnemonic_uppercased {
        "L.D" => Some(Opcode::L_D),
        "S.D" => Some(Opcode::S_D),
        "LI" => Some(Opcode::LI),
        "LW" => Some(Opcode::LW),
        "SW" => Some(Opcode::SW),
        "ADD" => Some(Opcode::ADD),
        "ADDI" => Some(Opcode::ADDI),
        "ADD.D" => Some(Opcode::ADD_D),
        "SUB.D" => Some(Opcode::SUB_D),
        "SUB" => Some(Opcode::SUB),
        "MUL.D" => Some(Opcode::MUL_D),
        "DIV.D" => Some(Opcode::DIV_D),
        _ => None,
    }
}

impl Opcode {
    pub(crate) fn unit_type(self) -> UnitType {
        match self {
            Opcode::L_D |
            Opcode::S_D |
            Opcode::LI |
            Opcode::LW |
            Opcode::SW |
            Opcode::ADD |
            Opcode::ADDI |
            Opcode::SUB => UnitType::Int,
            Opcode::ADD_D |
            Opcode::SUB_D => UnitType::FpAdd,
            Opcode::MUL_D => UnitType::FpMult,
            Opcode::DIV_D => UnitType::FpDiv,
        }
    }

    /// The number of source operands the opcode reads.
    pub(crate) fn source_cnt(self) -> usize {
        match self {
            Opcode::L_D |
            Opcode::S_D |
            Opcode::LI |
            Opcode::LW |
            Opcode::SW => 1,
            Opcode::ADD |
            Opcode::ADDI |
            Opcode::ADD_D |
            Opcode::SUB_D |
            Opcode::SUB |
            Opcode::MUL_D |
            Opcode::DIV_D => 2,
        }
    }

    /// Computes the value committed to the sink from the values read during
    /// the read-operands stage.
    pub(crate) fn compute(self, values: &[Value; MAX_SOURCE_COUNT]) -> Value {
        let a = values[0];
        let b = values[1];
        match self {
            Opcode::L_D |
            Opcode::S_D |
            Opcode::LI |
            Opcode::LW |
            Opcode::SW => a,
            Opcode::ADD |
            Opcode::ADDI => a.int_op(b, i64::wrapping_add, |x, y| x + y),
            Opcode::SUB => a.int_op(b, i64::wrapping_sub, |x, y| x - y),
            Opcode::ADD_D => Value::Float(a.as_f64() + b.as_f64()),
            Opcode::SUB_D => Value::Float(a.as_f64() - b.as_f64()),
            Opcode::MUL_D => Value::Float(a.as_f64() * b.as_f64()),
            Opcode::DIV_D => Value::Float(a.as_f64() / b.as_f64()),
        }
    }
}

/// The content of a register or memory cell.
#[derive(Clone, Copy, PartialEq, Debug)]
pub(crate) enum Value {
    Int(WordType),
    Float(f64),
}

impl Default for Value {
    fn default() -> Self {
        Value::Int(0)
    }
}

impl Value {
    pub(crate) fn as_f64(self) -> f64 {
        match self {
            Value::Int(v) => v as f64,
            Value::Float(v) => v,
        }
    }

    // Integer arithmetic stays integer; as soon as a floating value is involved
    // the result is floating.
    fn int_op(self, other: Value, int: fn(i64, i64) -> i64, float: fn(f64, f64) -> f64) -> Value {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Value::Int(int(a, b)),
            (a, b) => Value::Float(float(a.as_f64(), b.as_f64())),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) if v.is_finite() && v.fract() == 0.0 => write!(f, "{:.1}", v),
            Value::Float(v) => write!(f, "{}", v),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub(crate) enum RegisterType {
    Int(u8),
    Float(u8),
}

impl fmt::Display for RegisterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegisterType::Int(reg) => write!(f, "${}", reg),
            RegisterType::Float(reg) => write!(f, "F{}", reg),
        }
    }
}

/// Parses a register name: `$n` is an integer register, `Fn` and `$Fn` are
/// floating point registers.
pub(crate) fn get_register(name: &str) -> Option<RegisterType> {
    let re = Regex::new(r"^\$?((?i)F)?(\d+)$").unwrap();
    let captures = re.captures(name.trim())?;
    let reg: u8 = captures.get(2)?.as_str().parse().ok()?;
    if reg >= ARCH_REG_CNT {
        return None;
    }

    if captures.get(1).is_some() {
        Some(RegisterType::Float(reg))
    } else if name.trim().starts_with('$') {
        Some(RegisterType::Int(reg))
    } else {
        // a bare number is a literal, not a register
        None
    }
}

/// A storage location tracked by the scoreboard: either a register or a memory cell.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub(crate) enum Location {
    Register(RegisterType),
    Memory(MemoryAddressType),
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Register(reg) => write!(f, "{}", reg),
            Location::Memory(addr) => write!(f, "[{}]", addr),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Debug)]
pub(crate) enum Operand {
    Register(RegisterType),
    // The operand is directly specified in the instruction itself.
    Immediate(WordType),
    // A decoded offset(base) memory access.
    Memory(MemoryAddressType),
    Unused,
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Register(reg) => write!(f, "{}", reg),
            Immediate(val) => write!(f, "{}", val),
            Memory(addr) => write!(f, "[{}]", addr),
            Unused => write!(f, "Unused"),
        }
    }
}

impl Operand {
    /// The location the operand reads from; immediates don't have one.
    pub(crate) fn location(&self) -> Option<Location> {
        match *self {
            Register(reg) => Some(Location::Register(reg)),
            Memory(addr) => Some(Location::Memory(addr)),
            Immediate(_) | Unused => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Instr {
    pub(crate) opcode: Opcode,
    pub(crate) source_cnt: u8,
    pub(crate) source: [Operand; MAX_SOURCE_COUNT],
    pub(crate) sink: Location,
    pub(crate) loc: Option<SourceLocation>,
    // The instruction as it was written in the program.
    pub(crate) text: String,
}

impl Instr {
    pub(crate) fn locations(&self) -> impl Iterator<Item=Location> + '_ {
        self.source.iter()
            .filter_map(|op| op.location())
            .chain(std::iter::once(self.sink))
    }
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ", mnemonic(self.opcode))?;

        match self.opcode {
            Opcode::L_D |
            Opcode::LW |
            Opcode::LI => write!(f, "{},{}", self.sink, self.source[0])?,
            Opcode::S_D |
            Opcode::SW => write!(f, "{},{}", self.source[0], self.sink)?,
            Opcode::ADD |
            Opcode::ADDI |
            Opcode::ADD_D |
            Opcode::SUB_D |
            Opcode::SUB |
            Opcode::MUL_D |
            Opcode::DIV_D => write!(f, "{},{},{}", self.sink, self.source[0], self.source[1])?,
        }

        if let Some(loc) = self.loc {
            write!(f, " ; {}", loc)?;
        }

        Ok(())
    }
}

/// Creates an instruction from its decoded operands, checking the operand
/// layout of the opcode.
pub(crate) fn create_instr(opcode: Opcode,
                           operands: &[Operand],
                           text: &str,
                           loc: Option<SourceLocation>) -> Result<Instr, String> {
    let expected = opcode.source_cnt() + 1;
    if operands.len() != expected {
        return Err(format!("{} expects {} arguments, but {} are provided.",
                           mnemonic(opcode), expected, operands.len()));
    }

    let mut instr = Instr {
        opcode,
        source_cnt: opcode.source_cnt() as u8,
        source: [Unused, Unused],
        sink: Location::Memory(0),
        loc,
        text: text.to_string(),
    };

    match opcode {
        Opcode::L_D |
        Opcode::LW => {
            instr.sink = expect_register(opcode, &operands[0], "first")?;
            match operands[1] {
                Memory(_) => instr.source[0] = operands[1],
                _ => return Err(format!("{} expects a memory access as second argument.", mnemonic(opcode))),
            }
        }
        Opcode::S_D |
        Opcode::SW => {
            match operands[0] {
                Register(_) => instr.source[0] = operands[0],
                _ => return Err(format!("{} expects a register as first argument.", mnemonic(opcode))),
            }
            match operands[1] {
                Memory(addr) => instr.sink = Location::Memory(addr),
                _ => return Err(format!("{} expects a memory access as second argument.", mnemonic(opcode))),
            }
        }
        Opcode::LI => {
            instr.sink = expect_register(opcode, &operands[0], "first")?;
            match operands[1] {
                Immediate(_) => instr.source[0] = operands[1],
                _ => return Err(format!("{} expects an immediate as second argument.", mnemonic(opcode))),
            }
        }
        Opcode::ADDI => {
            instr.sink = expect_register(opcode, &operands[0], "first")?;
            match operands[1] {
                Register(_) => instr.source[0] = operands[1],
                _ => return Err(format!("{} expects a register as second argument.", mnemonic(opcode))),
            }
            match operands[2] {
                Immediate(_) => instr.source[1] = operands[2],
                _ => return Err(format!("{} expects an immediate as third argument.", mnemonic(opcode))),
            }
        }
        Opcode::ADD |
        Opcode::SUB |
        Opcode::ADD_D |
        Opcode::SUB_D |
        Opcode::MUL_D |
        Opcode::DIV_D => {
            instr.sink = expect_register(opcode, &operands[0], "first")?;
            match operands[1] {
                Register(_) => instr.source[0] = operands[1],
                _ => return Err(format!("{} expects a register as second argument.", mnemonic(opcode))),
            }
            match operands[2] {
                Register(_) => instr.source[1] = operands[2],
                _ => return Err(format!("{} expects a register as third argument.", mnemonic(opcode))),
            }
        }
    }

    Ok(instr)
}

fn expect_register(opcode: Opcode, operand: &Operand, position: &str) -> Result<Location, String> {
    match operand {
        Register(reg) => Ok(Location::Register(*reg)),
        _ => Err(format!("{} expects a register as {} argument.", mnemonic(opcode), position)),
    }
}

/// The instructions in program order; the position in `code` is the ordinal
/// of the instruction.
pub(crate) struct Program {
    pub(crate) code: Vec<Rc<Instr>>,
}

impl Program {
    pub fn get_instr(&self, pos: usize) -> Rc<Instr> {
        Rc::clone(&self.code[pos])
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_register() {
        assert_eq!(get_register("$0"), Some(RegisterType::Int(0)));
        assert_eq!(get_register("$31"), Some(RegisterType::Int(31)));
        assert_eq!(get_register("F2"), Some(RegisterType::Float(2)));
        assert_eq!(get_register("$F2"), Some(RegisterType::Float(2)));
        assert_eq!(get_register("f7"), Some(RegisterType::Float(7)));
        assert_eq!(get_register("$32"), None);
        assert_eq!(get_register("F32"), None);
        assert_eq!(get_register("R1"), None);
        assert_eq!(get_register("5"), None);
    }

    #[test]
    fn test_location_display() {
        assert_eq!(Location::Memory(4).to_string(), "[4]");
        assert_eq!(Location::Register(RegisterType::Int(3)).to_string(), "$3");
        assert_eq!(Location::Register(RegisterType::Float(3)).to_string(), "F3");
    }

    #[test]
    fn test_get_opcode() {
        assert_eq!(get_opcode("add.d"), Some(Opcode::ADD_D));
        assert_eq!(get_opcode("L.D"), Some(Opcode::L_D));
        assert_eq!(get_opcode("MUL"), None);
        for opcode in [Opcode::L_D, Opcode::S_D, Opcode::LI, Opcode::LW, Opcode::SW, Opcode::ADD,
            Opcode::ADDI, Opcode::ADD_D, Opcode::SUB_D, Opcode::SUB, Opcode::MUL_D, Opcode::DIV_D] {
            assert_eq!(get_opcode(mnemonic(opcode)), Some(opcode));
        }
    }

    #[test]
    fn test_unit_types() {
        assert_eq!(Opcode::LW.unit_type(), UnitType::Int);
        assert_eq!(Opcode::SUB.unit_type(), UnitType::Int);
        assert_eq!(Opcode::SUB_D.unit_type(), UnitType::FpAdd);
        assert_eq!(Opcode::MUL_D.unit_type(), UnitType::FpMult);
        assert_eq!(Opcode::DIV_D.unit_type(), UnitType::FpDiv);
    }

    #[test]
    fn test_compute_integer_and_float() {
        let ints = [Value::Int(7), Value::Int(3)];
        assert_eq!(Opcode::ADD.compute(&ints), Value::Int(10));
        assert_eq!(Opcode::SUB.compute(&ints), Value::Int(4));
        assert_eq!(Opcode::ADD_D.compute(&ints), Value::Float(10.0));
        assert_eq!(Opcode::SUB_D.compute(&ints), Value::Float(4.0));
        assert_eq!(Opcode::MUL_D.compute(&ints), Value::Float(21.0));
        assert_eq!(Opcode::DIV_D.compute(&[Value::Int(9), Value::Int(2)]), Value::Float(4.5));

        let mixed = [Value::Float(1.5), Value::Int(2)];
        assert_eq!(Opcode::ADD.compute(&mixed), Value::Float(3.5));
        assert_eq!(Opcode::LI.compute(&[Value::Int(42), Value::Int(0)]), Value::Int(42));
    }

    #[test]
    fn test_value_display() {
        assert_eq!(Value::Int(5).to_string(), "5");
        assert_eq!(Value::Float(24.0).to_string(), "24.0");
        assert_eq!(Value::Float(2.5).to_string(), "2.5");
    }

    #[test]
    fn test_create_instr_store_sinks_into_memory() {
        let operands = [Register(RegisterType::Float(6)), Memory(3)];
        let instr = create_instr(Opcode::S_D, &operands, "S.D F6, 0($3)", None).unwrap();
        assert_eq!(instr.sink, Location::Memory(3));
        assert_eq!(instr.source[0], Register(RegisterType::Float(6)));
        assert_eq!(instr.source[1], Unused);
    }

    #[test]
    fn test_create_instr_bad_layout() {
        let operands = [Register(RegisterType::Int(1)), Register(RegisterType::Int(2))];
        assert!(create_instr(Opcode::ADD, &operands, "ADD $1, $2", None).is_err());

        let operands = [Register(RegisterType::Int(1)), Register(RegisterType::Int(2)), Register(RegisterType::Int(3))];
        assert!(create_instr(Opcode::ADDI, &operands, "ADDI $1, $2, $3", None).is_err());

        let operands = [Immediate(1), Memory(2)];
        assert!(create_instr(Opcode::LW, &operands, "LW 1, 2(0)", None).is_err());
    }
}
