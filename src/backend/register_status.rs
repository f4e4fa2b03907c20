use std::collections::HashMap;

use crate::instructions::instructions::Location;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum WriteState {
    // the owner has issued and not yet written back
    Pending,
    // the owner wrote back this cycle; the entry is removed at the end of the cycle
    Releasing,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) struct StatusEntry {
    pub(crate) state: WriteState,
    // the ordinal of the instruction that will write the location
    pub(crate) owner: usize,
}

/// The register/memory result status. A location with an entry has a write
/// in flight; at most one instruction owns a location at any time.
pub(crate) struct RegisterStatus {
    table: HashMap<Location, StatusEntry>,
}

impl RegisterStatus {
    pub fn new() -> Self {
        Self { table: HashMap::new() }
    }

    #[cfg(test)]
    pub fn get(&self, location: &Location) -> Option<&StatusEntry> {
        self.table.get(location)
    }

    /// The owner of the write in flight on the location, if any.
    pub fn pending_writer(&self, location: &Location) -> Option<usize> {
        self.table.get(location).map(|entry| entry.owner)
    }

    pub fn mark_pending(&mut self, location: Location, owner: usize) {
        debug_assert!(!self.table.contains_key(&location), "WAW on {}", location);
        self.table.insert(location, StatusEntry { state: WriteState::Pending, owner });
    }

    pub fn mark_releasing(&mut self, location: &Location) {
        if let Some(entry) = self.table.get_mut(location) {
            entry.state = WriteState::Releasing;
        }
    }

    // End of cycle: drop the writes that completed this cycle.
    pub fn release_completed(&mut self) {
        self.table.retain(|_, entry| entry.state == WriteState::Pending);
    }
}

#[cfg(test)]
mod tests {
    use crate::instructions::instructions::RegisterType;

    use super::*;

    #[test]
    fn test_lifecycle() {
        let mut status = RegisterStatus::new();
        let f0 = Location::Register(RegisterType::Float(0));
        let mem = Location::Memory(0);

        assert_eq!(status.pending_writer(&f0), None);

        status.mark_pending(f0, 3);
        status.mark_pending(mem, 4);
        assert_eq!(status.pending_writer(&f0), Some(3));
        assert_eq!(status.get(&f0).unwrap().state, WriteState::Pending);

        status.mark_releasing(&f0);
        // still visible until the end of the cycle
        assert_eq!(status.pending_writer(&f0), Some(3));

        status.release_completed();
        assert_eq!(status.pending_writer(&f0), None);
        assert_eq!(status.pending_writer(&mem), Some(4));
    }

    #[test]
    fn test_register_and_memory_do_not_alias() {
        let mut status = RegisterStatus::new();
        status.mark_pending(Location::Memory(1), 0);
        assert_eq!(status.pending_writer(&Location::Register(RegisterType::Int(1))), None);
    }
}
