#[macro_use]
extern crate log;

extern crate structopt;
use structopt::StructOpt;

extern crate simplelog;
use simplelog::{Config, LevelFilter, SimpleLogger};

use std::num::ParseIntError;
use std::path::PathBuf;

use anyhow::Context;
use indicatif::{ProgressBar, ProgressStyle};

use lpc_uart_isp::protocol::ExecMode;
use lpc_uart_isp::{Options, Session};

/// Bytes handed to each `W` command when loading an image
const RAM_CHUNK: usize = 1024;

#[derive(Clone, Debug, StructOpt)]
pub struct Args {
    /// Serial port to connect to
    #[structopt(long, default_value = "/dev/ttyUSB0")]
    port: String,

    /// Serial port baud rate
    #[structopt(long, default_value = "115200")]
    baud: usize,

    /// Target crystal frequency in kHz
    #[structopt(long, default_value = "12000")]
    clock_khz: u32,

    #[structopt(flatten)]
    options: Options,

    /// Log level for console output
    #[structopt(long, default_value = "debug")]
    log_level: LevelFilter,

    #[structopt(subcommand)]
    action: Action,
}

#[derive(Clone, Debug, StructOpt)]
pub enum Action {
    /// Read the part identification and unique ID
    Info,
    /// Unlock the target and load a binary image into RAM
    LoadRam {
        /// Image file to transfer
        file: PathBuf,

        /// Destination RAM address
        #[structopt(long, default_value = "0x10000200", parse(try_from_str = parse_address))]
        address: u32,
    },
    /// Start execution at an address, leaving the ISP handler
    Exec {
        /// Entry address
        #[structopt(parse(try_from_str = parse_address))]
        address: u32,

        /// Execution mode
        #[structopt(long, default_value = "thumb")]
        mode: ExecMode,
    },
}

fn parse_address(s: &str) -> Result<u32, ParseIntError> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16)
    } else {
        s.parse()
    }
}

fn main() -> anyhow::Result<()> {
    // Parse out arguments
    let args = Args::from_args();

    // Configure logger
    let _ = SimpleLogger::init(args.log_level, Config::default());

    info!("Connecting to {} at {} baud", args.port, args.baud);

    let mut session = Session::linux(&args.port, args.baud, args.clock_khz, args.options)
        .context("connecting to serial port")?;

    info!("Synchronizing with ISP handler");

    session.sync().context("synchronizing with target")?;

    match args.action {
        Action::Info => {
            let part_id = session.read_part_id().context("reading part ID")?;
            info!("Part ID: {}", part_id);

            let uid = session.read_uid().context("reading UID")?;
            info!("UID: {}", uid);
        }
        Action::LoadRam { file, address } => {
            load_ram(&mut session, &file, address)?;
        }
        Action::Exec { address, mode } => {
            session.exec(address, mode).context("starting execution")?;
            info!("Execution started at 0x{:08x}", address);
        }
    }

    Ok(())
}

fn load_ram(
    session: &mut Session<linux_embedded_hal::Serial, linux_embedded_hal::Delay, std::io::ErrorKind>,
    file: &PathBuf,
    address: u32,
) -> anyhow::Result<()> {
    let mut data = std::fs::read(file).with_context(|| format!("reading {}", file.display()))?;

    // The W command takes word-multiple counts only
    while data.len() % 4 != 0 {
        data.push(0);
    }

    info!(
        "Loaded {} ({})",
        file.display(),
        bytefmt::format(data.len() as u64)
    );
    debug!("Image head: {}", hex::encode(&data[..data.len().min(16)]));

    session.set_echo(false).context("disabling echo")?;
    session.unlock().context("unlocking target")?;

    let bar = ProgressBar::new(data.len() as u64);
    bar.set_style(
        ProgressStyle::default_bar().template("[{elapsed_precise}] {bar:40} {bytes}/{total_bytes}"),
    );

    let mut resends = 0;
    let mut offset = address;

    for chunk in data.chunks(RAM_CHUNK) {
        let summary = session
            .write_to_ram(offset, chunk)
            .with_context(|| format!("writing to RAM at 0x{:08x}", offset))?;

        resends += summary.resends;
        offset += chunk.len() as u32;
        bar.inc(chunk.len() as u64);
    }

    bar.finish();

    if resends > 0 {
        info!("Recovered {} rejected transfer blocks", resends);
    }

    info!("Transfer complete");

    Ok(())
}
