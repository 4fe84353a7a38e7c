use std::fs;
use std::io::Read;
use std::path::PathBuf;

use clap::{Args, Subcommand};

use crate::exit::{io_error, CliResult};
use crate::output::OutputFormat;

pub mod decode;
pub mod encode;
#[cfg(unix)]
pub mod listen;
#[cfg(unix)]
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Frame one datagram and write it to stdout.
    Encode(EncodeArgs),
    /// Read a SLIP byte stream and print every datagram in it.
    Decode(DecodeArgs),
    /// Send one datagram over a Unix socket link.
    #[cfg(unix)]
    Send(SendArgs),
    /// Accept one Unix socket link and print received datagrams.
    #[cfg(unix)]
    Listen(ListenArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Encode(args) => encode::run(args),
        Command::Decode(args) => decode::run(args, format),
        #[cfg(unix)]
        Command::Send(args) => send::run(args),
        #[cfg(unix)]
        Command::Listen(args) => listen::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Where a single datagram comes from.
#[derive(Args, Debug)]
pub struct PayloadArgs {
    /// Raw string payload.
    #[arg(long, conflicts_with = "file")]
    pub data: Option<String>,
    /// Read payload from file.
    #[arg(long, conflicts_with = "data")]
    pub file: Option<PathBuf>,
}

impl PayloadArgs {
    /// `--data`, then `--file`, then all of stdin.
    pub fn resolve(&self) -> CliResult<Vec<u8>> {
        if let Some(data) = &self.data {
            return Ok(data.as_bytes().to_vec());
        }
        if let Some(path) = &self.file {
            return fs::read(path)
                .map_err(|err| io_error(&format!("failed reading {}", path.display()), err));
        }
        let mut buf = Vec::new();
        std::io::stdin()
            .read_to_end(&mut buf)
            .map_err(|err| io_error("failed reading stdin", err))?;
        Ok(buf)
    }
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    #[command(flatten)]
    pub payload: PayloadArgs,
    /// Print the frame as hex text instead of raw bytes.
    #[arg(long)]
    pub hex: bool,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Read the stream from a file instead of stdin.
    #[arg(long)]
    pub file: Option<PathBuf>,
    /// Treat the input as hex text.
    #[arg(long)]
    pub hex: bool,
}

#[cfg(unix)]
#[derive(Args, Debug)]
pub struct SendArgs {
    /// Socket path to connect to.
    pub path: PathBuf,
    /// Address the remote end is known by.
    #[arg(long, short = 'n', default_value = "peer")]
    pub neighbor: String,
    #[command(flatten)]
    pub payload: PayloadArgs,
}

#[cfg(unix)]
#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Socket path to bind.
    pub path: PathBuf,
    /// Address the connecting end is known by.
    #[arg(long, short = 'n', default_value = "peer")]
    pub neighbor: String,
    /// Exit after receiving N datagrams.
    #[arg(long)]
    pub count: Option<u64>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
