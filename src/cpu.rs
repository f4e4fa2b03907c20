use std::error::Error;
use std::fmt;
use std::fs::File;
use std::rc::Rc;

use log::info;
use serde::Deserialize;
use thiserror::Error;

use crate::backend::scoreboard::{CycleOutcome, Scoreboard};
use crate::instructions::instructions::{ARCH_REG_CNT, Location, Program, RegisterType, UnitType, Value, WordType};
use crate::memory_subsystem::memory_subsystem::MemorySubsystem;
use crate::report::Report;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub(crate) struct PerfCounters {
    pub issue_cnt: u64,
    pub read_cnt: u64,
    pub execute_cnt: u64,
    pub write_cnt: u64,
    pub cycle_cnt: u64,
    pub waw_stall_cnt: u64,
    pub structural_stall_cnt: u64,
    pub raw_stall_cnt: u64,
    pub war_stall_cnt: u64,
}

impl fmt::Display for PerfCounters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[Cycle:{}][Issued={}][Read={}][Executed={}][Written={}]",
               self.cycle_cnt, self.issue_cnt, self.read_cnt, self.execute_cnt, self.write_cnt)?;
        write!(f, "[Stalls: WAW={} Structural={} RAW={} WAR={}]",
               self.waw_stall_cnt, self.structural_stall_cnt, self.raw_stall_cnt, self.war_stall_cnt)
    }
}

#[derive(Clone, Deserialize, Debug, Default, PartialEq)]
#[serde(default)]
pub(crate) struct Trace {
    pub issue: bool,
    pub read: bool,
    pub execute: bool,
    pub write: bool,
    pub stall: bool,
    pub cycle: bool,
}

#[derive(Clone, Copy, Deserialize, Debug, PartialEq)]
pub(crate) struct UnitConfig {
    // the number of functional units of this type
    pub(crate) count: u8,
    // the number of cycles an instruction spends executing on the unit
    pub(crate) latency: u8,
}

#[derive(Clone, Deserialize, Debug, PartialEq)]
#[serde(default)]
pub(crate) struct CPUConfig {
    pub(crate) fp_add: UnitConfig,
    pub(crate) fp_mult: UnitConfig,
    pub(crate) fp_div: UnitConfig,
    pub(crate) int: UnitConfig,
    // the initial content of the memory; its length is the number of addressable cells.
    pub(crate) memory: Vec<WordType>,
    // stop with an error once this many cycles have passed; None runs until completion.
    pub(crate) max_cycles: Option<u64>,
    // if processing of a single instruction should be traced
    pub(crate) trace: Trace,
}

impl Default for CPUConfig {
    fn default() -> Self {
        CPUConfig {
            fp_add: UnitConfig { count: 1, latency: 2 },
            fp_mult: UnitConfig { count: 1, latency: 10 },
            fp_div: UnitConfig { count: 1, latency: 40 },
            int: UnitConfig { count: 1, latency: 1 },
            memory: vec![45, 12, 0, 0, 10, 135, 254, 127, 18, 4, 55, 8, 2, 98, 13, 5, 233, 158, 167],
            max_cycles: None,
            trace: Trace::default(),
        }
    }
}

impl CPUConfig {
    pub(crate) fn unit_config(&self, unit_type: UnitType) -> UnitConfig {
        match unit_type {
            UnitType::FpAdd => self.fp_add,
            UnitType::FpMult => self.fp_mult,
            UnitType::FpDiv => self.fp_div,
            UnitType::Int => self.int,
        }
    }

    pub(crate) fn unit_config_mut(&mut self, unit_type: UnitType) -> &mut UnitConfig {
        match unit_type {
            UnitType::FpAdd => &mut self.fp_add,
            UnitType::FpMult => &mut self.fp_mult,
            UnitType::FpDiv => &mut self.fp_div,
            UnitType::Int => &mut self.int,
        }
    }

    /// Checks the settings the engine can't work with. A latency of 0 would
    /// never complete execution.
    pub(crate) fn validate(&self) -> Result<(), String> {
        for unit_type in UnitType::ALL {
            if self.unit_config(unit_type).latency == 0 {
                return Err(format!("The latency of '{}' must be at least 1.", unit_type));
            }
        }
        Ok(())
    }

    /// Every unit type needs at least one unit, otherwise instructions of that
    /// type can never issue.
    pub(crate) fn validate_unit_counts(&self) -> Result<(), String> {
        for unit_type in UnitType::ALL {
            if self.unit_config(unit_type).count == 0 {
                return Err(format!("The number of '{}' units must be at least 1.", unit_type));
            }
        }
        Ok(())
    }
}

pub fn load_cpu_config(file_path: &str) -> Result<CPUConfig, Box<dyn Error>> {
    let file = File::open(file_path)?;
    let config: CPUConfig = serde_yaml::from_reader(file)?;
    config.validate()?;
    Ok(config)
}

#[derive(Error, Debug, PartialEq)]
pub enum SimError {
    #[error("Invalid operand {location} in instruction {index} '{text}'")]
    InvalidOperand { index: usize, text: String, location: String },

    #[error("The program did not complete within {cycles} cycles")]
    CycleLimitExceeded { cycles: u64 },
}

pub struct ArgRegFile {
    int: Vec<Value>,
    float: Vec<Value>,
}

impl ArgRegFile {
    fn new(reg_count: u8) -> ArgRegFile {
        ArgRegFile {
            int: vec![Value::default(); reg_count as usize],
            float: vec![Value::default(); reg_count as usize],
        }
    }

    pub fn get_value(&self, reg: RegisterType) -> Value {
        match reg {
            RegisterType::Int(index) => self.int[index as usize],
            RegisterType::Float(index) => self.float[index as usize],
        }
    }

    pub fn set_value(&mut self, reg: RegisterType, value: Value) {
        match reg {
            RegisterType::Int(index) => self.int[index as usize] = value,
            RegisterType::Float(index) => self.float[index as usize] = value,
        }
    }
}

/// The architectural state of the simulated machine: the register files and
/// the memory. It is only changed by the write-back stage.
pub(crate) struct MachineState {
    pub(crate) arch_reg_file: ArgRegFile,
    pub(crate) memory_subsystem: MemorySubsystem,
}

impl MachineState {
    pub(crate) fn new(cpu_config: &CPUConfig) -> MachineState {
        MachineState {
            arch_reg_file: ArgRegFile::new(ARCH_REG_CNT),
            memory_subsystem: MemorySubsystem::new(cpu_config),
        }
    }

    pub(crate) fn contains(&self, location: &Location) -> bool {
        match *location {
            Location::Register(RegisterType::Int(index)) |
            Location::Register(RegisterType::Float(index)) => index < ARCH_REG_CNT,
            Location::Memory(addr) => self.memory_subsystem.contains(addr),
        }
    }

    pub(crate) fn get_value(&self, location: &Location) -> Value {
        match *location {
            Location::Register(reg) => self.arch_reg_file.get_value(reg),
            Location::Memory(addr) => self.memory_subsystem.get_value(addr),
        }
    }

    pub(crate) fn set_value(&mut self, location: &Location, value: Value) {
        match *location {
            Location::Register(reg) => self.arch_reg_file.set_value(reg, value),
            Location::Memory(addr) => self.memory_subsystem.set_value(addr, value),
        }
    }
}

/// Drives the scoreboard clock until every instruction has written back.
pub(crate) struct CPU {
    cpu_config: CPUConfig,
    trace: Trace,
}

impl CPU {
    pub(crate) fn new(cpu_config: &CPUConfig) -> CPU {
        CPU {
            cpu_config: cpu_config.clone(),
            trace: cpu_config.trace.clone(),
        }
    }

    /// Runs the program from a fresh machine state. Every run of the same
    /// program and config gives the same report.
    pub(crate) fn run(&mut self, program: &Rc<Program>) -> Result<Report, SimError> {
        let mut scoreboard = Scoreboard::new(Rc::clone(program), &self.cpu_config)?;

        loop {
            let outcome = scoreboard.do_cycle();

            if self.trace.cycle {
                info!("{}", scoreboard.perf_counters());
            }

            if outcome == CycleOutcome::Finished {
                break;
            }

            if let Some(max_cycles) = self.cpu_config.max_cycles {
                if scoreboard.clock() >= max_cycles {
                    return Err(SimError::CycleLimitExceeded { cycles: scoreboard.clock() });
                }
            }
        }

        info!("Program complete after {} cycles", scoreboard.clock());
        Ok(scoreboard.report())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config: CPUConfig = serde_yaml::from_str(r#"
fp_add:
  count: 3
  latency: 4
trace:
  issue: true
"#).unwrap();

        assert_eq!(config.fp_add, UnitConfig { count: 3, latency: 4 });
        assert_eq!(config.fp_div, UnitConfig { count: 1, latency: 40 });
        assert_eq!(config.memory.len(), 19);
        assert_eq!(config.max_cycles, None);
        assert!(config.trace.issue);
        assert!(!config.trace.write);
    }

    #[test]
    fn test_perf_counters_display() {
        let perf_counters = PerfCounters { cycle_cnt: 8, issue_cnt: 2, raw_stall_cnt: 2, ..PerfCounters::default() };
        let line = perf_counters.to_string();
        assert!(line.starts_with("[Cycle:8][Issued=2][Read=0][Executed=0][Written=0]"));
        assert!(line.ends_with("[Stalls: WAW=0 Structural=0 RAW=2 WAR=0]"));
    }

    #[test]
    fn test_validate() {
        let mut config = CPUConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.validate_unit_counts().is_ok());

        config.unit_config_mut(UnitType::FpMult).count = 0;
        assert!(config.validate().is_ok());
        assert!(config.validate_unit_counts().is_err());

        config.unit_config_mut(UnitType::Int).latency = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_machine_state_locations() {
        let mut machine = MachineState::new(&CPUConfig::default());
        let f3 = Location::Register(RegisterType::Float(3));
        let mem = Location::Memory(5);

        assert!(machine.contains(&f3));
        assert!(machine.contains(&mem));
        assert!(!machine.contains(&Location::Memory(19)));
        assert!(!machine.contains(&Location::Register(RegisterType::Int(32))));

        assert_eq!(machine.get_value(&mem), Value::Int(135));
        machine.set_value(&f3, Value::Float(1.5));
        assert_eq!(machine.get_value(&f3), Value::Float(1.5));
        assert_eq!(machine.get_value(&Location::Register(RegisterType::Int(3))), Value::Int(0));
    }
}
