use std::fmt;
use std::rc::Rc;

use log::{debug, info, trace};

use crate::backend::functional_unit::{FUTable, PendingRead, ReadState};
use crate::backend::instr_status::{Cycle, InstrStatus, Stage};
use crate::backend::register_status::RegisterStatus;
use crate::cpu::{CPUConfig, MachineState, PerfCounters, SimError, Trace};
use crate::instructions::instructions::{MAX_SOURCE_COUNT, Operand, Program, Value};
use crate::report::Report;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum CycleOutcome {
    Continue,
    Finished,
}

/// The scoreboard: advances every in-flight instruction by at most one stage
/// per clock cycle while enforcing the WAW, structural, RAW and WAR hazards.
///
/// Instructions issue one per cycle in program order and may complete out of
/// order. Within a cycle the instructions are visited in program order.
pub(crate) struct Scoreboard {
    program: Rc<Program>,
    instr_status: Vec<InstrStatus>,
    fu_table: FUTable,
    reg_status: RegisterStatus,
    machine: MachineState,
    clock: Cycle,
    // the earliest instruction that hasn't issued; the only issue candidate
    frontier: usize,
    trace: Trace,
    perf_counters: PerfCounters,
}

impl Scoreboard {
    /// Creates a scoreboard with a fresh machine state. Fails if an
    /// instruction refers to a location the machine doesn't have.
    pub(crate) fn new(program: Rc<Program>, cpu_config: &CPUConfig) -> Result<Scoreboard, SimError> {
        let machine = MachineState::new(cpu_config);

        for (index, instr) in program.code.iter().enumerate() {
            if let Some(location) = instr.locations().find(|location| !machine.contains(location)) {
                return Err(SimError::InvalidOperand {
                    index,
                    text: instr.text.clone(),
                    location: location.to_string(),
                });
            }
        }

        let fu_table = FUTable::new(cpu_config);
        debug!("Scoreboard for {} instructions on {} functional units", program.len(), fu_table.capacity);

        Ok(Scoreboard {
            instr_status: vec![InstrStatus::default(); program.len()],
            program,
            fu_table,
            reg_status: RegisterStatus::new(),
            machine,
            clock: 0,
            frontier: 0,
            trace: cpu_config.trace.clone(),
            perf_counters: PerfCounters::default(),
        })
    }

    pub(crate) fn clock(&self) -> Cycle {
        self.clock
    }

    #[cfg(test)]
    pub(crate) fn status(&self, index: usize) -> &InstrStatus {
        &self.instr_status[index]
    }

    #[cfg(test)]
    pub(crate) fn machine(&self) -> &MachineState {
        &self.machine
    }

    #[cfg(test)]
    pub(crate) fn fu_table(&self) -> &FUTable {
        &self.fu_table
    }

    pub(crate) fn perf_counters(&self) -> PerfCounters {
        self.perf_counters
    }

    pub(crate) fn report(&self) -> Report {
        Report::new(&self.program, &self.instr_status, &self.machine, self.clock, self.perf_counters)
    }

    /// Runs a single clock cycle.
    pub(crate) fn do_cycle(&mut self) -> CycleOutcome {
        let mut ticked = false;
        let mut issued = false;

        for index in 0..self.program.len() {
            if index > self.frontier {
                break;
            }

            if self.instr_status[index].is_complete() {
                continue;
            }

            if !ticked {
                self.clock += 1;
                self.perf_counters.cycle_cnt = self.clock;
                ticked = true;
            }

            if self.advance(index) == Some(Stage::Issue) {
                issued = true;
            }
        }

        if self.instr_status.iter().all(InstrStatus::is_complete) {
            return CycleOutcome::Finished;
        }

        if issued {
            self.frontier += 1;
        }
        self.reg_status.release_completed();
        self.fu_table.retire_reads();
        self.fu_table.release_freed();
        CycleOutcome::Continue
    }

    // Attempts the single stage transition the instruction is due for.
    fn advance(&mut self, index: usize) -> Option<Stage> {
        let stage = self.instr_status[index].next_stage()?;
        let advanced = match stage {
            Stage::Issue => self.issue(index),
            Stage::Read => self.read(index),
            Stage::Execute => self.execute(index),
            Stage::Write => self.write(index),
        };

        if advanced { Some(stage) } else { None }
    }

    fn issue(&mut self, index: usize) -> bool {
        debug_assert!(index == self.frontier);
        let instr = self.program.get_instr(index);
        let sink = instr.sink;

        if let Some(owner) = self.reg_status.pending_writer(&sink) {
            self.perf_counters.waw_stall_cnt += 1;
            self.log_stall(format_args!("WAW stall [{}]: {} has a pending write by instruction {}",
                                        instr.text, sink, owner));
            return false;
        }

        let unit_type = instr.opcode.unit_type();
        let fu_index = match self.fu_table.allocate(unit_type, index) {
            Some(fu_index) => fu_index,
            None => {
                self.perf_counters.structural_stall_cnt += 1;
                self.log_stall(format_args!("Structural stall [{}]: no idle '{}' unit", instr.text, unit_type));
                return false;
            }
        };

        let fu = self.fu_table.get_mut(fu_index);
        fu.sink = Some(sink);
        for (read, operand) in fu.source.iter_mut().zip(instr.source.iter()) {
            *read = PendingRead { location: operand.location(), state: ReadState::Awaiting };
        }

        let status = &mut self.instr_status[index];
        status.set(Stage::Issue, self.clock);
        status.fu_index = Some(fu_index);
        self.reg_status.mark_pending(sink, index);

        self.perf_counters.issue_cnt += 1;
        self.log_stage(self.trace.issue, format_args!("Issued [{}] at cycle {} on '{}' unit {}",
                                                      instr.text, self.clock, unit_type, fu_index));
        true
    }

    fn read(&mut self, index: usize) -> bool {
        let instr = self.program.get_instr(index);

        for operand in &instr.source[..instr.source_cnt as usize] {
            let location = match operand.location() {
                Some(location) => location,
                None => continue,
            };

            if let Some(owner) = self.reg_status.pending_writer(&location) {
                if owner < index {
                    self.perf_counters.raw_stall_cnt += 1;
                    self.log_stall(format_args!("RAW stall [{}]: {} is written by instruction {}",
                                                instr.text, location, owner));
                    return false;
                }
            }
        }

        let mut values = [Value::default(); MAX_SOURCE_COUNT];
        for (value, operand) in values.iter_mut().zip(instr.source.iter()) {
            *value = self.operand_value(operand);
        }

        let fu_index = self.fu_index(index);
        let fu = self.fu_table.get_mut(fu_index);
        fu.values = values;
        for read in fu.source.iter_mut() {
            read.state = ReadState::Satisfied;
        }

        self.instr_status[index].set(Stage::Read, self.clock);
        self.perf_counters.read_cnt += 1;
        self.log_stage(self.trace.read, format_args!("Read [{}] at cycle {}", instr.text, self.clock));
        true
    }

    fn execute(&mut self, index: usize) -> bool {
        let fu_index = self.fu_index(index);
        if !self.fu_table.get_mut(fu_index).execute() {
            return false;
        }

        self.instr_status[index].set(Stage::Execute, self.clock);
        self.perf_counters.execute_cnt += 1;
        self.log_stage(self.trace.execute, format_args!("Executed [{}] at cycle {}",
                                                        self.program.code[index].text, self.clock));
        true
    }

    fn write(&mut self, index: usize) -> bool {
        let instr = self.program.get_instr(index);
        let sink = instr.sink;

        if self.fu_table.has_pending_read_before(index, &sink) {
            self.perf_counters.war_stall_cnt += 1;
            self.log_stall(format_args!("WAR stall [{}]: an earlier instruction still has to read {}",
                                        instr.text, sink));
            return false;
        }

        let fu_index = self.fu_index(index);
        let value = instr.opcode.compute(&self.fu_table.get(fu_index).values);
        self.machine.set_value(&sink, value);

        // the status entry and the unit are freed at the end of the cycle
        self.reg_status.mark_releasing(&sink);
        self.fu_table.get_mut(fu_index).release();

        let status = &mut self.instr_status[index];
        status.set(Stage::Write, self.clock);
        status.fu_index = None;

        self.perf_counters.write_cnt += 1;
        self.log_stage(self.trace.write, format_args!("Wrote [{}] {}={} at cycle {}",
                                                      instr.text, sink, value, self.clock));
        true
    }

    fn operand_value(&self, operand: &Operand) -> Value {
        match *operand {
            Operand::Register(reg) => self.machine.arch_reg_file.get_value(reg),
            Operand::Memory(addr) => self.machine.memory_subsystem.get_value(addr),
            Operand::Immediate(value) => Value::Int(value),
            Operand::Unused => Value::default(),
        }
    }

    fn fu_index(&self, index: usize) -> u16 {
        self.instr_status[index].fu_index
            .expect("an issued instruction is bound to a functional unit until it writes back")
    }

    fn log_stage(&self, enabled: bool, msg: fmt::Arguments) {
        if enabled {
            info!("{}", msg);
        } else {
            trace!("{}", msg);
        }
    }

    fn log_stall(&self, msg: fmt::Arguments) {
        if self.trace.stall {
            info!("[Cycle:{}] {}", self.clock, msg);
        } else {
            debug!("[Cycle:{}] {}", self.clock, msg);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::cpu::SimError;
    use crate::instructions::instructions::{Location, RegisterType};
    use crate::loader::loader::load_from_string;

    use super::*;

    fn scoreboard(src: &str, cpu_config: &CPUConfig) -> Scoreboard {
        let program = load_from_string(src.to_string()).unwrap();
        Scoreboard::new(Rc::new(program), cpu_config).unwrap()
    }

    fn stamps(status: &InstrStatus) -> (Option<Cycle>, Option<Cycle>, Option<Cycle>, Option<Cycle>) {
        (status.issue, status.read, status.execute, status.write)
    }

    #[test]
    fn test_single_instruction_cycle_by_cycle() {
        let mut scoreboard = scoreboard("ADDI $1, $0, 5", &CPUConfig::default());

        assert_eq!(scoreboard.do_cycle(), CycleOutcome::Continue);
        assert_eq!(stamps(scoreboard.status(0)), (Some(1), None, None, None));
        assert_eq!(scoreboard.fu_table().busy_count(crate::instructions::instructions::UnitType::Int), 1);

        assert_eq!(scoreboard.do_cycle(), CycleOutcome::Continue);
        assert_eq!(stamps(scoreboard.status(0)), (Some(1), Some(2), None, None));

        assert_eq!(scoreboard.do_cycle(), CycleOutcome::Continue);
        assert_eq!(stamps(scoreboard.status(0)), (Some(1), Some(2), Some(3), None));

        assert_eq!(scoreboard.do_cycle(), CycleOutcome::Finished);
        assert_eq!(stamps(scoreboard.status(0)), (Some(1), Some(2), Some(3), Some(4)));
        assert_eq!(scoreboard.clock(), 4);

        let one = Location::Register(RegisterType::Int(1));
        assert_eq!(scoreboard.machine().get_value(&one), Value::Int(5));
    }

    #[test]
    fn test_empty_program_finishes_immediately() {
        let mut scoreboard = scoreboard("", &CPUConfig::default());
        assert_eq!(scoreboard.do_cycle(), CycleOutcome::Finished);
        assert_eq!(scoreboard.clock(), 0);
    }

    #[test]
    fn test_unit_freed_one_cycle_after_write() {
        let mut scoreboard = scoreboard("LI $1, 1\nLI $2, 2", &CPUConfig::default());
        for _ in 0..4 {
            scoreboard.do_cycle();
        }
        // LI $1 wrote at cycle 4; LI $2 could not take the unit in that same cycle
        assert_eq!(scoreboard.status(0).write, Some(4));
        assert_eq!(scoreboard.status(1).issue, None);

        scoreboard.do_cycle();
        assert_eq!(scoreboard.status(1).issue, Some(5));
        assert_eq!(scoreboard.perf_counters().structural_stall_cnt, 3);
    }

    #[test]
    fn test_invalid_memory_address() {
        let program = load_from_string("LI $1, 1\nS.D F0, 10(9)".to_string()).unwrap();
        match Scoreboard::new(Rc::new(program), &CPUConfig::default()) {
            Err(SimError::InvalidOperand { index, location, .. }) => {
                assert_eq!(index, 1);
                assert_eq!(location, "[19]");
            }
            _ => panic!("expected an invalid operand"),
        }
    }
}
