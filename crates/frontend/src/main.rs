//! VCS emulator frontend.
//!
//! Provides two execution modes:
//!
//! - **Headless mode** (default): Run `--frames` frames, recording a rewind
//!   state after each, and print a summary.
//! - **Step mode** (`--step`): Interactive monitor for frame stepping, bank
//!   forcing, memory peek/poke, rewind/unwind and quick save/load.
//!
//! Logging goes through `simplelog`; `--debug` shows bank switches and
//! rewind bookkeeping, `--quiet` only errors.

use std::fs;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::process;

use clap::Parser;
use log::{error, info, warn, LevelFilter};
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};

use vcs_core::cart::CartKind;
use vcs_core::debugger::WatchKind;
use vcs_core::rewind::{RewindConfig, RewindManager};
use vcs_core::{debugger, savestate, StateManager, Vcs};

#[derive(Parser, Debug)]
#[command(name = "vcs-emu", about = "Atari 2600 bank-switching core with rewind")]
struct Args {
    /// ROM image to load.
    rom: PathBuf,

    /// Cartridge type (2K, 4K, F8, F6, F4, F9); detected from size if omitted.
    #[arg(long = "type", value_name = "TYPE")]
    cart_type: Option<CartKind>,

    /// Number of frames to run in headless mode.
    #[arg(long, default_value_t = 60)]
    frames: u64,

    /// Interactive step monitor.
    #[arg(long, default_value_t = false)]
    step: bool,

    /// Quick save file (defaults to the ROM path with a .state extension).
    #[arg(long, value_name = "FILE")]
    state: Option<PathBuf>,

    /// Extra rewind history capacity beyond the guaranteed entries.
    #[arg(long, default_value_t = RewindConfig::default().slack)]
    rewind_slack: usize,

    /// Show bank switches and rewind bookkeeping.
    #[arg(long, default_value_t = false)]
    debug: bool,

    /// Only report errors.
    #[arg(long, default_value_t = false, conflicts_with = "debug")]
    quiet: bool,
}

fn main() {
    let args = Args::parse();

    let level = if args.debug {
        LevelFilter::Debug
    } else if args.quiet {
        LevelFilter::Error
    } else {
        LevelFilter::Info
    };
    if let Err(e) = TermLogger::init(level, Config::default(), TerminalMode::Mixed, ColorChoice::Auto) {
        eprintln!("Warning: logger: {}", e);
    }

    let image = match fs::read(&args.rom) {
        Ok(data) => data,
        Err(e) => {
            error!("cannot read {}: {}", args.rom.display(), e);
            process::exit(1);
        }
    };
    let mut vcs = match Vcs::from_image(image, args.cart_type) {
        Ok(vcs) => vcs,
        Err(e) => {
            error!("{}: {}", args.rom.display(), e);
            process::exit(1);
        }
    };
    vcs.reset();
    info!("{} ({} bank(s))", vcs.cart.name(), vcs.cart.bank_count());

    let config = RewindConfig { slack: args.rewind_slack, ..RewindConfig::default() };
    let mut rewind = RewindManager::new(config);
    let state_path = args.state.clone().unwrap_or_else(|| savestate::state_path(&args.rom));

    if args.step {
        run_step_mode(&mut vcs, &mut rewind, &state_path);
    } else {
        run_headless(&mut vcs, &mut rewind, args.frames);
    }
}

// ─── Headless Mode ──────────────────────────────────────────────────────────

fn run_headless(vcs: &mut Vcs, rewind: &mut RewindManager, frames: u64) {
    for _ in 0..frames {
        vcs.run_frame();
        if vcs.take_bank_changed() {
            info!("frame {}: {}", vcs.frame_count(), debugger::bank_state(vcs.cart.as_ref()));
        }
        rewind.add_state(vcs, "Frame");
    }
    println!("{}", debugger::bank_state(vcs.cart.as_ref()));
    println!("Frames: {}  Cycles: {}", vcs.frame_count(), vcs.cycles());
    println!("Rewind: {}/{} entries", rewind.len(), rewind.max_size());
}

// ─── Step Mode ──────────────────────────────────────────────────────────────

const HELP: &str = "\
  f [N]         run N frames (default 1)
  b N           force bank N (locks switching)
  b -           release forced bank
  watch A [B]   watch reads/writes of A, only in bank B if given
  watch         list watchpoints
  unwatch N     remove watchpoint N
  p ADDR        peek (no side effects)
  w ADDR VAL    poke through the bus
  patch ADDR V  overwrite ROM byte in the visible bank
  r / R         rewind one entry / ~1 second
  u / U         unwind one entry / ~1 second
  s / l         quick save / quick load
  i             cartridge and rewind info
  d             RAM dump
  q             quit";

fn run_step_mode(vcs: &mut Vcs, rewind: &mut RewindManager, state_path: &std::path::Path) {
    println!("Step mode: h=help, q=quit");
    print!("{}", debugger::cart_info(vcs.cart.as_ref()));

    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("vcs> ");
        let _ = std::io::stdout().flush();
        let line = match lines.next() {
            Some(Ok(line)) => line,
            _ => break,
        };
        let parts: Vec<&str> = line.split_whitespace().collect();
        let Some(&cmd) = parts.first() else { continue };

        match cmd {
            "q" | "quit" => break,
            "h" | "help" | "?" => println!("{}", HELP),
            "f" => {
                let n: u64 = parts.get(1).and_then(|s| s.parse().ok()).unwrap_or(1);
                for _ in 0..n {
                    vcs.run_frame();
                    rewind.add_state(vcs, "Frame");
                }
                if let Some(hit) = vcs.debugger.take_hit() {
                    println!(
                        "*** Watchpoint {}: {:?} ${:04X} = ${:02X} (bank {}) ***",
                        hit.index, hit.access, hit.addr, hit.new_val, hit.bank
                    );
                }
                println!("Frame {}  {}", vcs.frame_count(), debugger::bank_state(vcs.cart.as_ref()));
            }
            "b" => match parts.get(1).copied() {
                Some("-") => {
                    debugger::release_bank(vcs.cart.as_mut());
                    println!("{} (released)", debugger::bank_state(vcs.cart.as_ref()));
                }
                Some(arg) => match arg.parse::<u16>() {
                    Ok(bank) => {
                        debugger::force_bank(vcs.cart.as_mut(), &mut vcs.system, bank);
                        println!("{} [locked]", debugger::bank_state(vcs.cart.as_ref()));
                    }
                    Err(_) => warn!("usage: b N | b -"),
                },
                None => warn!("usage: b N | b -"),
            },
            "watch" => match parts.get(1).and_then(|s| parse_hex(s)) {
                Some(addr) => {
                    let idx = match parts.get(2).and_then(|s| s.parse::<u16>().ok()) {
                        Some(bank) => vcs.debugger.watch_bank(addr, WatchKind::ReadWrite, bank),
                        None => vcs.debugger.watch(addr, WatchKind::ReadWrite),
                    };
                    println!("watchpoint #{}", idx);
                }
                None => print!("{}", vcs.debugger.list_watchpoints()),
            },
            "unwatch" => match parts.get(1).and_then(|s| s.parse::<usize>().ok()) {
                Some(idx) if vcs.debugger.unwatch(idx) => println!("watchpoint #{} removed", idx),
                Some(idx) => warn!("no watchpoint #{}", idx),
                None => warn!("usage: unwatch N"),
            },
            "p" => match parts.get(1).and_then(|s| parse_hex(s)) {
                Some(addr) => println!("${:04X} = ${:02X}", addr & 0x1FFF, vcs.debug_peek(addr)),
                None => warn!("usage: p ADDR"),
            },
            "w" | "patch" => {
                let addr = parts.get(1).and_then(|s| parse_hex(s));
                let value = parts.get(2).and_then(|s| parse_hex(s)).and_then(|v| u8::try_from(v).ok());
                match (addr, value) {
                    (Some(addr), Some(value)) if cmd == "w" => {
                        let taken = vcs.poke(addr, value);
                        println!("${:04X} <- ${:02X}{}", addr & 0x1FFF, value, if taken { "" } else { " (ignored)" });
                    }
                    (Some(addr), Some(value)) => {
                        if vcs.patch(addr, value) {
                            println!("patched ${:04X} = ${:02X}", addr & 0x1FFF, value);
                        }
                    }
                    _ => warn!("usage: {} ADDR VAL", cmd),
                }
            }
            "r" | "R" | "u" | "U" => {
                let ok = match cmd {
                    "r" => rewind.rewind_debugger_state(vcs),
                    "R" => rewind.rewind_emulation_state(vcs),
                    "u" => rewind.unwind_debugger_state(vcs),
                    _ => rewind.unwind_emulation_state(vcs),
                };
                if ok {
                    println!("{}  (frame {})", rewind.last_message().unwrap_or(""), vcs.frame_count());
                } else {
                    println!("Nothing to {}", if cmd.eq_ignore_ascii_case("r") { "rewind" } else { "unwind" });
                }
            }
            "s" => {
                if let Err(e) = savestate::save_to_file(vcs, state_path) {
                    error!("save: {}", e);
                }
            }
            "l" => match savestate::load_from_file(vcs, state_path) {
                Ok(()) => rewind.clear(),
                Err(e) => error!("load: {}", e),
            },
            "i" => {
                print!("{}", debugger::cart_info(vcs.cart.as_ref()));
                print!("{}", debugger::code_access_summary(vcs.cart.as_ref(), vcs.cart.get_bank()));
                println!(
                    "Rewind: {}/{} entries, position {}  frame steps {:?}",
                    rewind.len(),
                    rewind.max_size(),
                    rewind.current_position(),
                    rewind.frame_steps()
                );
            }
            "d" => print!("{}", debugger::dump_ram(&vcs.ram.data, 0x80, 0x80, 128)),
            _ => println!("Unknown command '{}' (h for help)", cmd),
        }
    }
    println!("Total: {} frames, {} cycles", vcs.frame_count(), vcs.cycles());
}

/// Parse `1FF9`, `$1FF9` or `0x1FF9`.
fn parse_hex(s: &str) -> Option<u16> {
    let s = s.trim_start_matches('$').trim_start_matches("0x").trim_start_matches("0X");
    u16::from_str_radix(s, 16).ok()
}
