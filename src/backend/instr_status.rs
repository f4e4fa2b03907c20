/// The stage an instruction moves into on a successful transition.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum Stage {
    Issue,
    Read,
    Execute,
    Write,
}

pub(crate) type Cycle = u64;

/// The stage timestamps of a single instruction and the functional unit that
/// services it while it is in flight.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub(crate) struct InstrStatus {
    pub(crate) issue: Option<Cycle>,
    pub(crate) read: Option<Cycle>,
    pub(crate) execute: Option<Cycle>,
    pub(crate) write: Option<Cycle>,
    pub(crate) fu_index: Option<u16>,
}

impl InstrStatus {
    /// The next stage to attempt; None once the instruction has written back.
    pub(crate) fn next_stage(&self) -> Option<Stage> {
        if self.issue.is_none() {
            Some(Stage::Issue)
        } else if self.read.is_none() {
            Some(Stage::Read)
        } else if self.execute.is_none() {
            Some(Stage::Execute)
        } else if self.write.is_none() {
            Some(Stage::Write)
        } else {
            None
        }
    }

    pub(crate) fn is_complete(&self) -> bool {
        self.write.is_some()
    }

    pub(crate) fn set(&mut self, stage: Stage, cycle: Cycle) {
        let slot = match stage {
            Stage::Issue => &mut self.issue,
            Stage::Read => &mut self.read,
            Stage::Execute => &mut self.execute,
            Stage::Write => &mut self.write,
        };
        debug_assert!(slot.is_none(), "{:?} set twice", stage);
        *slot = Some(cycle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_progression() {
        let mut status = InstrStatus::default();
        assert_eq!(status.next_stage(), Some(Stage::Issue));
        status.set(Stage::Issue, 1);
        assert_eq!(status.next_stage(), Some(Stage::Read));
        status.set(Stage::Read, 2);
        assert_eq!(status.next_stage(), Some(Stage::Execute));
        status.set(Stage::Execute, 3);
        assert_eq!(status.next_stage(), Some(Stage::Write));
        assert!(!status.is_complete());
        status.set(Stage::Write, 4);
        assert_eq!(status.next_stage(), None);
        assert!(status.is_complete());
    }
}
