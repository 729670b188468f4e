//! `vsasm`: a thin `clap` CLI front end over `vonsim_asm::compile`.

use std::fs;
use std::process;

use clap::{App, Arg};

fn main() {
    env_logger::init();

    let matches = App::new("vsasm")
        .version("0.1.0")
        .about("Assembles a VonSim source file into a RAM preload image")
        .arg(Arg::with_name("input").required(true).help("assembly source file"))
        .arg(
            Arg::with_name("disassemble")
                .long("disassemble")
                .help("disassemble the assembled program back to text instead of writing an image"),
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

    match vonsim_asm::compile(&source) {
        Ok(program) => {
            if matches.is_present("disassemble") {
                let end = program.source_map.entries().iter().map(|e| e.address + e.length).max().unwrap_or(0);
                println!("{}", vonsim_asm::disassemble::disassemble(&program.image, program.entry.unsigned(), end));
            } else {
                println!("entry: {}", program.entry);
                for (name, addr) in &program.labels {
                    println!("{} = {:04X}h", name, addr);
                }
            }
        }
        Err(errors) => {
            for e in &errors {
                eprintln!("{} [{}]", e, e.code());
            }
            process::exit(1);
        }
    }
}
