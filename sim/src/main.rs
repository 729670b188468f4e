//! `vsrun`: a thin CLI that assembles a source file and runs it to
//! completion (or to the first unanswered `INT 6`), printing each event.
//! Mirrors `vsasm`'s `clap` front end over a library entry point.

use std::fs;
use std::process;

use clap::{App, Arg};

use vonsim_core::events::SimulatorEvent;
use vonsim_core::memory::DataInit;
use vonsim_core::value::Byte;
use vonsim_sim::{DeviceConfig, LoadRequest, Simulator};

fn main() {
    env_logger::init();

    let matches = App::new("vsrun")
        .version("0.1.0")
        .about("Assembles and runs a VonSim source file to completion")
        .arg(Arg::with_name("input").required(true).help("assembly source file"))
        .arg(
            Arg::with_name("console-byte")
                .long("console-byte")
                .takes_value(true)
                .help("byte (as a decimal number) to feed any INT 6 read; defaults to 0"),
        )
        .get_matches();

    let path = matches.value_of("input").unwrap();
    let source = match fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("{}: {}", path, e);
            process::exit(1);
        }
    };
    let console_byte = matches
        .value_of("console-byte")
        .map(|s| s.parse::<u8>().unwrap_or_else(|_| { eprintln!("--console-byte must be 0-255"); process::exit(1) }))
        .unwrap_or(0);

    let mut sim = Simulator::new();
    let request = LoadRequest {
        source: &source,
        data_init: DataInit::Clean,
        devices: vec![DeviceConfig::PioSwitchesLeds],
    };
    if let Err(errors) = sim.load_program(request) {
        for e in &errors {
            eprintln!("{} [{}]", e, e.code());
        }
        process::exit(1);
    }

    let mut stream = sim.start_cpu();
    loop {
        match stream.next() {
            Some(SimulatorEvent::ConsoleReadRequest) => {
                stream.provide_console_byte(Byte::new(console_byte));
            }
            Some(event) => println!("{:?}", event),
            None if stream.is_awaiting_console() => {
                eprintln!("blocked on INT 6 with no byte to provide");
                process::exit(1);
            }
            None => break,
        }
    }

    let state = sim.computer_state();
    println!("AX={:04X}h CX={:04X}h DX={:04X}h BX={:04X}h SP={:04X}h IP={:04X}h",
        state.registers.ax, state.registers.cx, state.registers.dx,
        state.registers.bx, state.registers.sp, state.registers.ip);
    if !state.screen.is_empty() {
        println!("screen: {}", state.screen);
    }
}
