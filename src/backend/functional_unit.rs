use crate::cpu::CPUConfig;
use crate::instructions::instructions::{Location, MAX_SOURCE_COUNT, UnitType, Value};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum ReadState {
    // the instruction has not read the operand yet
    Awaiting,
    // the operand was read this cycle; becomes Done at the end of the cycle
    Satisfied,
    Done,
}

/// A source operand of the instruction bound to a functional unit, tracked so
/// that later writers can detect a WAR hazard.
#[derive(Clone, Copy, PartialEq, Debug)]
pub(crate) struct PendingRead {
    pub(crate) location: Option<Location>,
    pub(crate) state: ReadState,
}

impl PendingRead {
    const IDLE: PendingRead = PendingRead { location: None, state: ReadState::Done };

    /// True if the operand reads `location` and that read hasn't been retired.
    pub(crate) fn blocks_write_to(&self, location: &Location) -> bool {
        self.state != ReadState::Done && self.location.as_ref() == Some(location)
    }
}

/// A single functional unit.
pub(crate) struct FU {
    pub(crate) index: u16,
    pub(crate) unit_type: UnitType,
    pub(crate) latency: u8,
    pub(crate) busy: bool,
    // the ordinal of the instruction that owns the unit; cleared at write-back
    // while the unit stays busy until the end of the cycle.
    pub(crate) instr_index: Option<usize>,
    pub(crate) cycles: u8,
    pub(crate) sink: Option<Location>,
    pub(crate) source: [PendingRead; MAX_SOURCE_COUNT],
    pub(crate) values: [Value; MAX_SOURCE_COUNT],
}

impl FU {
    fn new(index: u16, unit_type: UnitType, latency: u8) -> FU {
        FU {
            index,
            unit_type,
            latency,
            busy: false,
            instr_index: None,
            cycles: 0,
            sink: None,
            source: [PendingRead::IDLE; MAX_SOURCE_COUNT],
            values: [Value::default(); MAX_SOURCE_COUNT],
        }
    }

    fn reset(&mut self) {
        self.busy = false;
        self.instr_index = None;
        self.cycles = 0;
        self.sink = None;
        self.source = [PendingRead::IDLE; MAX_SOURCE_COUNT];
        self.values = [Value::default(); MAX_SOURCE_COUNT];
    }

    /// Advances execution by one cycle; returns true once the latency is reached.
    pub(crate) fn execute(&mut self) -> bool {
        debug_assert!(self.busy);
        self.cycles += 1;
        self.cycles == self.latency
    }

    /// Marks the unit as done with its instruction. The unit stays busy until
    /// `FUTable::release_freed` runs at the end of the cycle.
    pub(crate) fn release(&mut self) {
        debug_assert!(self.busy);
        self.instr_index = None;
    }

    fn is_released(&self) -> bool {
        self.busy && self.instr_index.is_none()
    }
}

/// The pool of functional units, grouped by type. The pool is sized once
/// from the config and never changes during a run.
pub(crate) struct FUTable {
    pub(crate) capacity: u16,
    array: Vec<FU>,
}

impl FUTable {
    pub(crate) fn new(cpu_config: &CPUConfig) -> FUTable {
        let mut array = Vec::new();
        for unit_type in UnitType::ALL {
            let unit_config = cpu_config.unit_config(unit_type);
            for _ in 0..unit_config.count {
                let index = array.len() as u16;
                array.push(FU::new(index, unit_type, unit_config.latency));
            }
        }

        FUTable {
            capacity: array.len() as u16,
            array,
        }
    }

    pub(crate) fn get(&self, fu_index: u16) -> &FU {
        &self.array[fu_index as usize]
    }

    pub(crate) fn get_mut(&mut self, fu_index: u16) -> &mut FU {
        &mut self.array[fu_index as usize]
    }

    #[cfg(test)]
    pub(crate) fn iter(&self) -> impl Iterator<Item=&FU> {
        self.array.iter()
    }

    #[cfg(test)]
    pub(crate) fn has_idle(&self, unit_type: UnitType) -> bool {
        self.array.iter().any(|fu| fu.unit_type == unit_type && !fu.busy)
    }

    /// Binds the first idle unit of the given type to the instruction.
    pub(crate) fn allocate(&mut self, unit_type: UnitType, instr_index: usize) -> Option<u16> {
        let fu = self.array.iter_mut()
            .find(|fu| fu.unit_type == unit_type && !fu.busy)?;

        debug_assert!(fu.instr_index.is_none());
        debug_assert!(fu.cycles == 0);

        fu.busy = true;
        fu.instr_index = Some(instr_index);
        Some(fu.index)
    }

    #[cfg(test)]
    pub(crate) fn busy_count(&self, unit_type: UnitType) -> usize {
        self.array.iter().filter(|fu| fu.unit_type == unit_type && fu.busy).count()
    }

    /// True if a unit owned by an instruction before `instr_index` still has
    /// to read `location`.
    pub(crate) fn has_pending_read_before(&self, instr_index: usize, location: &Location) -> bool {
        self.array.iter().any(|fu| {
            matches!(fu.instr_index, Some(owner) if owner < instr_index)
                && fu.source.iter().any(|read| read.blocks_write_to(location))
        })
    }

    // End of cycle: reads done this cycle no longer block writers.
    pub(crate) fn retire_reads(&mut self) {
        for fu in &mut self.array {
            for read in &mut fu.source {
                if read.state == ReadState::Satisfied {
                    read.state = ReadState::Done;
                }
            }
        }
    }

    // End of cycle: units that wrote back this cycle become available.
    pub(crate) fn release_freed(&mut self) {
        for fu in &mut self.array {
            if fu.is_released() {
                fu.reset();
            }
        }
    }
}
