//! Interactive simulator driver
//!
//! Reads one command per line from stdin and dispatches to the hart.
//! Numeric operands accept decimal or 0x-prefixed hex; register and
//! CSR values print as sixteen zero-filled hex digits.
//!
//! ```text
//! pc                  show the program counter
//! pc = <value>        set the program counter
//! x<n>                show register n
//! x<n> = <value>      set register n
//! csr <num>           show a CSR
//! csr <num> = <value> write a CSR
//! prv                 show the privilege level
//! prv = <0|3>         set the privilege level
//! step [n]            execute n instructions (default 1)
//! break <addr>        set the breakpoint
//! unbreak             clear the breakpoint
//! load <file>         load a hex image and jump to its entry address
//! count               show the retired instruction count
//! cycles              show the cycle count
//! quit                exit
//! ```

use std::io::{self, BufRead};

use clap::Parser;
use clap_num::maybe_hex;
use log::LevelFilter;
use thiserror::Error;

use rv64sim::hart::csr::CsrError;
use rv64sim::hart::{Hart, PrivilegeLevel};

/// RV64I machine-mode instruction set simulator
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Trace fetch, decode and trap activity
    #[arg(short, long)]
    verbose: bool,

    /// Report the cycle count on exit
    #[arg(short, long)]
    cycles: bool,
}

#[derive(Debug, Error)]
enum CommandError {
    #[error("unknown command: {0}")]
    Unknown(String),
    #[error("missing operand for {0}")]
    MissingOperand(&'static str),
    #[error("invalid operand: {0}")]
    BadOperand(String),
    #[error("register index must be in 0..=31")]
    BadRegister,
    #[error("privilege level must be 0 (user) or 3 (machine)")]
    BadPrivilege,
}

enum Outcome {
    Continue,
    Quit,
}

fn parse_value(token: &str) -> Result<u64, CommandError> {
    maybe_hex::<u64>(token).map_err(|_| CommandError::BadOperand(token.to_string()))
}

fn register_index(token: &str) -> Result<u8, CommandError> {
    token
        .strip_prefix('x')
        .and_then(|index| index.parse::<u8>().ok())
        .filter(|index| *index < 32)
        .ok_or(CommandError::BadRegister)
}

fn csr_number(token: &str) -> Result<u32, CommandError> {
    let number = parse_value(token)?;
    u32::try_from(number).map_err(|_| CommandError::BadOperand(token.to_string()))
}

/// Handle `<target> = <value>`
fn assign(hart: &mut Hart, target: &str, value: u64) -> Result<(), CommandError> {
    let mut tokens = target.split_whitespace();
    let name = tokens
        .next()
        .ok_or_else(|| CommandError::Unknown(target.to_string()))?;
    match name {
        "pc" => hart.set_pc(value),
        "prv" => {
            let prv = PrivilegeLevel::from_raw(value).ok_or(CommandError::BadPrivilege)?;
            hart.set_privilege(prv);
        }
        "csr" => {
            let number = csr_number(tokens.next().ok_or(CommandError::MissingOperand("csr"))?)?;
            match hart.set_csr(number, value) {
                Ok(()) => {}
                Err(CsrError::ReadOnly(_)) => println!("Illegal write to read-only CSR"),
                // Writes to absent CSR numbers are dropped quietly
                Err(CsrError::Unknown(_)) => {}
            }
        }
        _ if name.starts_with('x') => hart.set_reg(register_index(name)?, value),
        _ => return Err(CommandError::Unknown(name.to_string())),
    }
    Ok(())
}

fn run_command(hart: &mut Hart, line: &str) -> Result<Outcome, CommandError> {
    if let Some((target, value)) = line.split_once('=') {
        let value = parse_value(value.trim())?;
        assign(hart, target.trim(), value)?;
        return Ok(Outcome::Continue);
    }

    let mut tokens = line.split_whitespace();
    let Some(command) = tokens.next() else {
        return Ok(Outcome::Continue);
    };
    match command {
        "pc" => println!("{:016x}", hart.pc()),
        "csr" => {
            let number = csr_number(tokens.next().ok_or(CommandError::MissingOperand("csr"))?)?;
            match hart.csr(number) {
                Ok(value) => println!("{value:016x}"),
                Err(_) => println!("Illegal CSR number"),
            }
        }
        "prv" => {
            let prv = hart.privilege();
            println!("{} ({})", prv as u32, prv.name());
        }
        "step" => {
            let num = match tokens.next() {
                Some(token) => parse_value(token)?,
                None => 1,
            };
            if let Some(address) = hart.execute(num, true) {
                println!("Breakpoint reached at {address:016x}");
            }
        }
        "break" => {
            let address = parse_value(tokens.next().ok_or(CommandError::MissingOperand("break"))?)?;
            hart.set_breakpoint(address);
        }
        "unbreak" => hart.clear_breakpoint(),
        "load" => {
            let path = tokens.next().ok_or(CommandError::MissingOperand("load"))?;
            match hart.load_image(path) {
                Ok(entry) => hart.set_pc(entry),
                Err(e) => println!("Failed to load image: {e}"),
            }
        }
        "count" => println!("{}", hart.instruction_count()),
        "cycles" => println!("{}", hart.cycle_count()),
        "quit" | "exit" | "q" => return Ok(Outcome::Quit),
        _ if command.starts_with('x') => {
            println!("{:016x}", hart.reg(register_index(command)?));
        }
        _ => return Err(CommandError::Unknown(command.to_string())),
    }
    Ok(Outcome::Continue)
}

fn main() {
    let args = Args::parse();
    env_logger::Builder::from_default_env()
        .filter_level(if args.verbose {
            LevelFilter::Trace
        } else {
            LevelFilter::Warn
        })
        .format_timestamp(None)
        .format_target(false)
        .init();

    let mut hart = Hart::new();

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        match run_command(&mut hart, line.trim()) {
            Ok(Outcome::Continue) => {}
            Ok(Outcome::Quit) => break,
            Err(e) => println!("{e}"),
        }
    }

    println!("Instructions executed: {}", hart.instruction_count());
    if args.cycles {
        println!("CPU cycle count: {}", hart.cycle_count());
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn check_register_index_parsing() {
        assert_eq!(register_index("x0").unwrap(), 0);
        assert_eq!(register_index("x31").unwrap(), 31);
        assert!(register_index("x32").is_err());
        assert!(register_index("pc").is_err());
        assert!(register_index("x").is_err());
    }

    #[test]
    fn check_parse_value_accepts_hex_and_decimal() {
        assert_eq!(parse_value("100").unwrap(), 100);
        assert_eq!(parse_value("0x100").unwrap(), 0x100);
        assert!(parse_value("0xzz").is_err());
    }

    #[test]
    fn check_assignment_commands() {
        let mut hart = Hart::new();
        run_command(&mut hart, "pc = 0x100").unwrap();
        assert_eq!(hart.pc(), 0x100);
        run_command(&mut hart, "x5 = 42").unwrap();
        assert_eq!(hart.reg(5), 42);
        run_command(&mut hart, "csr 0x340 = 0xff").unwrap();
        assert_eq!(hart.csr(0x340).unwrap(), 0xff);
        run_command(&mut hart, "prv = 0").unwrap();
        assert_eq!(hart.privilege(), PrivilegeLevel::User);
        assert!(run_command(&mut hart, "prv = 2").is_err());
    }

    #[test]
    fn check_step_command_executes() {
        let mut hart = Hart::new();
        // addi x1, x0, -1
        hart.memory
            .write_doubleword(0, 0xfff0_0093, 0xffff_ffff);
        run_command(&mut hart, "step").unwrap();
        assert_eq!(hart.reg(1), u64::MAX);
        assert_eq!(hart.instruction_count(), 1);
    }

    #[test]
    fn check_quit_and_unknown_commands() {
        let mut hart = Hart::new();
        assert!(matches!(
            run_command(&mut hart, "quit").unwrap(),
            Outcome::Quit
        ));
        assert!(run_command(&mut hart, "bogus").is_err());
        assert!(matches!(
            run_command(&mut hart, "").unwrap(),
            Outcome::Continue
        ));
    }
}
