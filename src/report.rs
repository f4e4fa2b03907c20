use std::fmt;

use crate::backend::instr_status::{Cycle, InstrStatus};
use crate::cpu::{MachineState, PerfCounters};
use crate::instructions::instructions::{ARCH_REG_CNT, Location, Program, RegisterType, Value};

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct InstrReport {
    pub(crate) text: String,
    pub(crate) issue: Option<Cycle>,
    pub(crate) read: Option<Cycle>,
    pub(crate) execute: Option<Cycle>,
    pub(crate) write: Option<Cycle>,
}

/// The outcome of a run: the stage timestamps of every instruction and the
/// final machine state.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Report {
    pub(crate) instrs: Vec<InstrReport>,
    pub(crate) int_registers: Vec<Value>,
    pub(crate) float_registers: Vec<Value>,
    pub(crate) memory: Vec<Value>,
    pub(crate) cycles: Cycle,
    pub(crate) perf_counters: PerfCounters,
}

impl Report {
    pub(crate) fn new(program: &Program,
                      instr_status: &[InstrStatus],
                      machine: &MachineState,
                      cycles: Cycle,
                      perf_counters: PerfCounters) -> Report {
        let instrs = program.code.iter()
            .zip(instr_status.iter())
            .map(|(instr, status)| InstrReport {
                text: instr.text.clone(),
                issue: status.issue,
                read: status.read,
                execute: status.execute,
                write: status.write,
            })
            .collect();

        let register = |reg| machine.get_value(&Location::Register(reg));
        Report {
            instrs,
            int_registers: (0..ARCH_REG_CNT).map(|k| register(RegisterType::Int(k))).collect(),
            float_registers: (0..ARCH_REG_CNT).map(|k| register(RegisterType::Float(k))).collect(),
            memory: machine.memory_subsystem.memory.clone(),
            cycles,
            perf_counters,
        }
    }

    #[cfg(test)]
    pub(crate) fn register(&self, reg: RegisterType) -> Value {
        match reg {
            RegisterType::Int(index) => self.int_registers[index as usize],
            RegisterType::Float(index) => self.float_registers[index as usize],
        }
    }

    #[cfg(test)]
    pub(crate) fn memory(&self, addr: crate::instructions::instructions::MemoryAddressType) -> Value {
        self.memory[addr as usize]
    }
}

fn cycle_str(cycle: Option<Cycle>) -> String {
    match cycle {
        Some(cycle) => cycle.to_string(),
        None => String::from("-"),
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:<25} {:<8} {:<8} {:<8} {:<8}", "Instruction", "Issue", "Read", "Exec", "Write")?;
        for instr in &self.instrs {
            writeln!(f, "{:<25} {:<8} {:<8} {:<8} {:<8}",
                     instr.text,
                     cycle_str(instr.issue),
                     cycle_str(instr.read),
                     cycle_str(instr.execute),
                     cycle_str(instr.write))?;
        }

        writeln!(f)?;
        writeln!(f, "------Register Values------")?;
        writeln!(f, "{:<8} {:<12} {:<15}", "#", "$", "F")?;
        for (k, (int, float)) in self.int_registers.iter().zip(self.float_registers.iter()).enumerate() {
            writeln!(f, "{:<8} {:<12} {:<15}", k, int.to_string(), float.to_string())?;
        }

        writeln!(f)?;
        writeln!(f, "---Memory Values---")?;
        writeln!(f, "{:<8} {:<15}", "#", "Value")?;
        for (k, value) in self.memory.iter().enumerate() {
            writeln!(f, "{:<8} {:<15}", k, value.to_string())?;
        }

        writeln!(f)?;
        write!(f, "{}", self.perf_counters)
    }
}
