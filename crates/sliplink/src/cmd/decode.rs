use std::fs::File;
use std::io::{ErrorKind, Read};

use sliplink_frame::Deframer;
use tracing::{info, warn};

use crate::cmd::DecodeArgs;
use crate::exit::{io_error, CliError, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{from_hex, print_datagram, OutputFormat};

const READ_CHUNK_SIZE: usize = 8 * 1024;

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let mut input: Box<dyn Read> = match &args.file {
        Some(path) => Box::new(
            File::open(path)
                .map_err(|err| io_error(&format!("failed opening {}", path.display()), err))?,
        ),
        None => Box::new(std::io::stdin().lock()),
    };

    let mut deframer = Deframer::new();
    let mut printed = 0u64;
    let mut emit = |datagram: bytes::Bytes| {
        printed += 1;
        print_datagram(printed, None, &datagram, format);
    };

    if args.hex {
        let mut text = String::new();
        input
            .read_to_string(&mut text)
            .map_err(|err| io_error("failed reading input", err))?;
        let wire = from_hex(&text)
            .map_err(|err| CliError::new(DATA_INVALID, format!("input is not hex: {err}")))?;
        deframer.feed(&wire, &mut emit);
    } else {
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        loop {
            let read = match input.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(io_error("failed reading input", err)),
            };
            deframer.feed(&chunk[..read], &mut emit);
        }
    }

    let stats = deframer.stats();
    if !deframer.is_idle() {
        warn!(
            pending = deframer.pending_len(),
            "input ended mid-frame, partial datagram dropped"
        );
    }
    info!(
        bytes = stats.bytes_in,
        datagrams = stats.frames,
        invalid_escapes = stats.invalid_escapes,
        "decode finished"
    );

    Ok(SUCCESS)
}
