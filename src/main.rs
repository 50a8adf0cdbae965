use std::{path::PathBuf, process::ExitCode};

use clap::{ArgAction, Parser};
use env_logger::Env;
use log::{error, info, LevelFilter};

use cpu65::{image_len, load_image, load_rom_image, Bus, LayoutBuilder, LoadError};

#[derive(Parser, Debug)]
#[command(name = "cpu65", version, about = "Runs a 6502 binary image on an emulated machine.")]
struct Args {
    /// Binary image to load.
    image: PathBuf,

    /// Bus address the image is copied to. Without it a ROM image is placed
    /// so it ends at the top of ROM, and a RAM image starts at the RAM base.
    #[arg(long, value_name = "ADDR", value_parser = parse_number::<u16>)]
    load_addr: Option<u16>,

    /// Byte offset into the image file.
    #[arg(long, value_name = "N", default_value = "0", value_parser = parse_number::<u64>)]
    offset: u64,

    /// Number of bytes to copy (default: rest of the file).
    #[arg(long, value_name = "N", value_parser = parse_number::<usize>)]
    count: Option<usize>,

    /// Load the image into RAM instead of ROM.
    #[arg(long)]
    ram: bool,

    #[arg(long, value_name = "ADDR", default_value = "0x0000", value_parser = parse_number::<usize>)]
    ram_base: usize,

    #[arg(long, value_name = "N", default_value = "0x8000", value_parser = parse_number::<usize>)]
    ram_size: usize,

    #[arg(long, value_name = "ADDR", default_value = "0xC000", value_parser = parse_number::<usize>)]
    rom_base: usize,

    #[arg(long, value_name = "N", default_value = "0x4000", value_parser = parse_number::<usize>)]
    rom_size: usize,

    /// Base of the four ACIA registers.
    #[arg(long, value_name = "ADDR", default_value = "0x8000", value_parser = parse_number::<usize>)]
    serial_base: usize,

    /// Map a halt register; a write stops the machine and becomes the exit code.
    #[arg(long, value_name = "ADDR", value_parser = parse_number::<usize>)]
    halt_addr: Option<usize>,

    /// Stop after this many instructions.
    #[arg(long, value_name = "N", value_parser = parse_number::<u64>)]
    max_instructions: Option<u64>,

    /// Stop when an instruction leaves the program counter where it was.
    #[arg(long)]
    stop_on_trap: bool,

    /// Print memory START:END after the run. May be repeated.
    #[arg(long, value_name = "START:END", value_parser = parse_range)]
    dump: Vec<(u16, u16)>,

    /// Print the processor status after the run.
    #[arg(long)]
    status: bool,

    /// More logging (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn parse_number<T: TryFrom<u64>>(s: &str) -> Result<T, String> {
    let s = s.trim();
    let value = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => s.parse(),
    }
    .map_err(|e| format!("invalid number {s:?}: {e}"))?;
    T::try_from(value).map_err(|_| format!("{s} is out of range"))
}

fn parse_range(s: &str) -> Result<(u16, u16), String> {
    let (start, end) = s
        .split_once(':')
        .ok_or_else(|| format!("expected START:END, got {s:?}"))?;
    let start = parse_number::<u16>(start)?;
    let end = parse_number::<u16>(end)?;
    if end < start {
        return Err(format!("range {s} ends before it starts"));
    }
    Ok((start, end))
}

fn load(bus: &mut Bus, args: &Args) -> Result<(), LoadError> {
    let region = if args.ram { bus.ram_mut() } else { bus.rom_mut() };

    if !args.ram && args.load_addr.is_none() && args.count.is_none() && args.offset == 0 {
        load_rom_image(region, &args.image)?;
        return Ok(());
    }

    let pos = args.load_addr.unwrap_or(region.base());
    let count = match args.count {
        Some(count) => count,
        None => image_len(&args.image)?.saturating_sub(args.offset) as usize,
    };
    load_image(region, pos, &args.image, args.offset, count)
}

fn main() -> ExitCode {
    let args = Args::parse();

    let mut logger = env_logger::Builder::from_env(Env::default().default_filter_or("warn"));
    let level = match args.verbose {
        0 => None,
        1 => Some(LevelFilter::Info),
        2 => Some(LevelFilter::Debug),
        _ => Some(LevelFilter::Trace),
    };
    if let Some(level) = level {
        logger.filter_level(level);
    }
    logger.init();

    let mut builder = LayoutBuilder::new();
    builder
        .ram(args.ram_base, args.ram_size)
        .rom(args.rom_base, args.rom_size)
        .serial(args.serial_base);
    if let Some(addr) = args.halt_addr {
        builder.halt(addr);
    }
    let layout = match builder.build() {
        Ok(layout) => layout,
        Err(e) => {
            error!("Invalid memory map: {e}");
            return ExitCode::FAILURE;
        }
    };

    let mut bus = Bus::new(layout);
    if let Err(e) = load(&mut bus, &args) {
        error!("Could not load image: {e}");
        return ExitCode::FAILURE;
    }

    bus.reset();
    info!("Running from {:#06x}", bus.cpu().pc());

    let executed = if args.stop_on_trap {
        let mut executed = 0;
        while !bus.is_halted() && args.max_instructions.map_or(true, |max| executed < max) {
            let pc = bus.cpu().pc();
            bus.step();
            executed += 1;
            if bus.cpu().pc() == pc {
                info!("Trapped at {pc:#06x}: {}", bus.disassemble(pc).0);
                break;
            }
        }
        executed
    } else {
        bus.run(args.max_instructions)
    };
    info!(
        "Stopped at {:#06x} after {executed} instructions, {} cycles",
        bus.cpu().pc(),
        bus.cpu().clock_count()
    );

    for (start, end) in &args.dump {
        print!("{}", bus.dump(*start, *end));
    }
    if args.status {
        println!("{}", bus.cpu());
        let pc = bus.cpu().pc();
        println!("Next: {pc:04x}  {}", bus.disassemble(pc).0);
    }

    match bus.exit_code() {
        Some(code) => ExitCode::from(code),
        None => ExitCode::SUCCESS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_accept_hex_and_decimal() {
        assert_eq!(parse_number::<u16>("0xC000"), Ok(0xC000));
        assert_eq!(parse_number::<u16>("0x00ff"), Ok(0xFF));
        assert_eq!(parse_number::<usize>("32768"), Ok(0x8000));
        assert!(parse_number::<u16>("0x10000").is_err());
        assert!(parse_number::<u16>("abc").is_err());
    }

    #[test]
    fn dump_ranges() {
        assert_eq!(parse_range("0x0200:0x020f"), Ok((0x0200, 0x020F)));
        assert!(parse_range("0x0200").is_err());
        assert!(parse_range("0x0300:0x0200").is_err());
    }

    #[test]
    fn cli_defaults_match_classic_map() {
        let args = Args::try_parse_from(["cpu65", "rom.bin"]).unwrap();
        assert_eq!(args.ram_base, 0x0000);
        assert_eq!(args.ram_size, 0x8000);
        assert_eq!(args.rom_base, 0xC000);
        assert_eq!(args.rom_size, 0x4000);
        assert_eq!(args.serial_base, 0x8000);
        assert_eq!(args.offset, 0);
        assert!(args.dump.is_empty());
    }

    #[test]
    fn cli_parses_run_options() {
        let args = Args::try_parse_from([
            "cpu65",
            "prog.bin",
            "--ram",
            "--load-addr",
            "0x0600",
            "--max-instructions",
            "1000",
            "--stop-on-trap",
            "--dump",
            "0x0000:0x000f",
            "-vv",
        ])
        .unwrap();
        assert!(args.ram);
        assert_eq!(args.load_addr, Some(0x0600));
        assert_eq!(args.max_instructions, Some(1000));
        assert!(args.stop_on_trap);
        assert_eq!(args.dump, vec![(0x0000, 0x000F)]);
        assert_eq!(args.verbose, 2);
    }
}
