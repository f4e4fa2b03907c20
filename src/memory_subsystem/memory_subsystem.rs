use crate::cpu::CPUConfig;
use crate::instructions::instructions::{MemoryAddressType, Value};

/// The data memory of the simulated machine. Every address in
/// `0..memory.len()` exists; no other address does.
pub(crate) struct MemorySubsystem {
    pub(crate) memory: Vec<Value>,
}

impl MemorySubsystem {
    pub fn new(cpu_config: &CPUConfig) -> MemorySubsystem {
        let mut memory = Vec::with_capacity(cpu_config.memory.len());

        for value in &cpu_config.memory {
            memory.push(Value::Int(*value));
        }

        MemorySubsystem {
            memory,
        }
    }

    pub(crate) fn contains(&self, addr: MemoryAddressType) -> bool {
        (addr as usize) < self.memory.len()
    }

    pub(crate) fn get_value(&self, addr: MemoryAddressType) -> Value {
        self.memory[addr as usize]
    }

    pub(crate) fn set_value(&mut self, addr: MemoryAddressType, value: Value) {
        self.memory[addr as usize] = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_image() {
        let memory_subsystem = MemorySubsystem::new(&CPUConfig::default());
        assert_eq!(memory_subsystem.memory.len(), 19);
        assert_eq!(memory_subsystem.get_value(0), Value::Int(45));
        assert_eq!(memory_subsystem.get_value(18), Value::Int(167));
        assert!(memory_subsystem.contains(18));
        assert!(!memory_subsystem.contains(19));
    }
}
