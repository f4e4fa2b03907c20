use std::path::PathBuf;
use std::process::exit;
use std::rc::Rc;

use lalrpop_util::lalrpop_mod;
use log::info;
use structopt::StructOpt;

use crate::cpu::{CPU, load_cpu_config};
use crate::instructions::instructions::UnitType;
use crate::loader::loader::{load, LoadError};

mod cpu;
mod loader;
mod backend;
mod instructions;
mod memory_subsystem;
mod report;

lalrpop_mod!(pub assembly, "/loader/assembly.rs");

#[derive(StructOpt, Debug)]
#[structopt(name = "Scoreboard Simulator")]
struct Opt {
    /// Path of the program to load
    #[structopt(short, long, parse(from_os_str))]
    file: PathBuf,

    /// Sets a custom config file
    #[structopt(short, long, parse(from_os_str), default_value = "scoreboard.yaml")]
    config: PathBuf,

    /// Number of FP adders
    #[structopt(long)]
    fp_adders: Option<u8>,

    /// Number of FP multipliers
    #[structopt(long)]
    fp_multipliers: Option<u8>,

    /// Number of FP dividers
    #[structopt(long)]
    fp_dividers: Option<u8>,

    /// Number of integer units
    #[structopt(long)]
    int_units: Option<u8>,

    /// Abort when the program hasn't completed after this many cycles
    #[structopt(long)]
    max_cycles: Option<u64>,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let opt = Opt::from_args();

    let cpu_config_path = opt.config.to_string_lossy();
    let mut cpu_config = match load_cpu_config(&cpu_config_path) {
        Ok(config) => config,
        Err(error) => {
            eprintln!("Failed to load {}. Cause: {}", cpu_config_path, error);
            exit(1);
        }
    };

    let overrides = [
        (UnitType::FpAdd, opt.fp_adders),
        (UnitType::FpMult, opt.fp_multipliers),
        (UnitType::FpDiv, opt.fp_dividers),
        (UnitType::Int, opt.int_units),
    ];
    for (unit_type, count) in overrides {
        if let Some(count) = count {
            cpu_config.unit_config_mut(unit_type).count = count;
        }
    }
    if opt.max_cycles.is_some() {
        cpu_config.max_cycles = opt.max_cycles;
    }

    if let Err(msg) = cpu_config.validate_unit_counts() {
        eprintln!("{}", msg);
        exit(1);
    }

    let path = opt.file.to_string_lossy();
    info!("Loading {}", path);
    let program = match load(&path) {
        Ok(p) => Rc::new(p),
        Err(err) => {
            eprintln!("Loading program '{}' failed.", path);
            match err {
                LoadError::AnalysisError(msg_vec) => {
                    for msg in msg_vec {
                        eprintln!("{}", msg);
                    }
                }
                LoadError::ParseError(msg) |
                LoadError::NotFoundError(msg) |
                LoadError::IOError(msg) => eprintln!("{}", msg),
            }
            exit(1);
        }
    };

    let mut cpu = CPU::new(&cpu_config);
    match cpu.run(&program) {
        Ok(report) => println!("{}", report),
        Err(err) => {
            eprintln!("{}", err);
            exit(1);
        }
    }
}
