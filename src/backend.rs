pub(crate) mod functional_unit;
pub(crate) mod instr_status;
pub(crate) mod register_status;
pub(crate) mod scoreboard;
