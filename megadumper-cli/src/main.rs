use colored::*;
use crc_any::CRCu32;
use megadumper::{
    worker, Dumper, DumperConfig, Error, Operation, Payload, Progress, ReturnCode,
    SerialTransport, Wait,
};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use structopt::StructOpt;

fn main() {
    pretty_env_logger::init();

    let args = Opt::from_args();

    if let Err(e) = run(args) {
        eprintln!("{} {}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn config(args: &Opt) -> DumperConfig {
    let mut config = DumperConfig::default();
    if let Some(baud) = args.baud {
        config.line.baud_rate = baud;
    }
    if let Some(ms) = args.timeout {
        let bound = Duration::from_millis(ms);
        config.version_timeout = bound;
        config.header_timeout = bound;
        config.dump_wait = Wait::Idle(bound);
    }
    config
}

fn run(args: Opt) -> Result<(), Error> {
    let mut dumper = Dumper::with_config(SerialTransport::new(), config(&args));

    match (&args.cmd, args.port) {
        (Cmd::ports, _) => {
            for port in dumper.ports()? {
                println!("{}", port);
            }
            return Ok(());
        }
        (Cmd::autodetect, _) | (_, None) => {
            println!("    {} for a dumper", "Searching".green().bold());
            let port = dumper.autodetect()?;
            println!("    {} {}", "Found".green().bold(), port);
        }
        (_, Some(port)) => dumper.set_port(port),
    }

    match args.cmd {
        Cmd::ports | Cmd::autodetect => {}
        Cmd::version => {
            let version = dumper.get_version();
            if version.is_empty() {
                return Err(Error::Timeout(dumper.config().version_timeout));
            }
            println!("{}", version.trim_end());
        }
        Cmd::header => {
            let header = dumper.get_header()?;
            print_hex(&header);
        }
        Cmd::dump { from, to, out } => dump(dumper, from, to, out)?,
    }

    Ok(())
}

fn dump(dumper: Dumper<SerialTransport>, from: u32, to: u32, out: PathBuf) -> Result<(), Error> {
    let job = worker::spawn(dumper, Operation::Dump { from, to })?;

    for event in job.progress.iter() {
        match event {
            Progress::Percent(p) => {
                print!("\r    {} {:>3}%", "Dumping".green().bold(), p);
                let _ = std::io::stdout().flush();
            }
            Progress::Header { start, end, .. } => {
                println!(
                    "    {} content 0x{:08X}..0x{:08X}",
                    "Header".green().bold(),
                    start,
                    end
                );
            }
        }
    }
    println!();

    let (_, result) = job
        .join()
        .map_err(|_| Error::ProtocolViolation("dump worker panicked".into()))?;

    let dump = match (result.code, result.payload, result.error) {
        (ReturnCode::Ok, Payload::Dump(dump), _) => dump,
        (_, _, Some(e)) => return Err(e),
        _ => return Err(Error::ProtocolViolation("dump returned no data".into())),
    };

    std::fs::write(&out, &dump.data)?;

    let mut crc = CRCu32::crc32();
    crc.digest(&dump.data);

    let elapsed = dump.finished - dump.started;
    println!(
        "    {} {} bytes to {:?} in {}s, crc32 {:08X}",
        "Finished".green().bold(),
        dump.data.len(),
        out,
        elapsed.num_milliseconds() as f32 / 1000.0,
        crc.get_crc()
    );

    Ok(())
}

fn print_hex(data: &[u8]) {
    for (i, line) in data.chunks(16).enumerate() {
        let hex: Vec<String> = line.iter().map(|b| format!("{:02X}", b)).collect();
        let text: String = line
            .iter()
            .map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { '.' })
            .collect();
        println!("{:08X}  {:<48} {}", i * 16, hex.join(" "), text);
    }
}

fn parse_hex_32(input: &str) -> Result<u32, std::num::ParseIntError> {
    if input.starts_with("0x") {
        u32::from_str_radix(&input[2..], 16)
    } else {
        input.parse::<u32>()
    }
}

#[allow(non_camel_case_types)]
#[derive(StructOpt, Debug, PartialEq)]
pub enum Cmd {
    /// List serial ports that could host a dumper
    ports,

    /// Find the port running the dumper firmware
    autodetect,

    /// Firmware identity string
    version,

    /// Hex dump of the cartridge header
    header,

    /// Dump cartridge memory to a file, the whole cartridge unless a range is given
    dump {
        #[structopt(short = "f", name = "from", long = "from", default_value = "0", parse(try_from_str = parse_hex_32))]
        from: u32,
        #[structopt(short = "t", name = "to", long = "to", default_value = "0", parse(try_from_str = parse_hex_32))]
        to: u32,
        #[structopt(short = "o", name = "out", long = "out", parse(from_os_str))]
        out: PathBuf,
    },
}

#[derive(Debug, StructOpt)]
#[structopt(name = "megadumper", about = "Serial cartridge dumper")]
struct Opt {
    #[structopt(subcommand)]
    cmd: Cmd,

    /// Serial port, autodetected when omitted
    #[structopt(short = "p", name = "port", long = "port")]
    port: Option<String>,
    #[structopt(short = "b", name = "baud", long = "baud")]
    baud: Option<u32>,
    /// Milliseconds allowed for version and header replies, and of silence during a dump
    #[structopt(name = "timeout", long = "timeout")]
    timeout: Option<u64>,
}
