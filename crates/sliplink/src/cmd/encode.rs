use sliplink_frame::encode;
use tracing::debug;

use crate::cmd::EncodeArgs;
use crate::exit::{CliResult, SUCCESS};
use crate::output::{print_raw, to_hex};

pub fn run(args: EncodeArgs) -> CliResult<i32> {
    let datagram = args.payload.resolve()?;
    let frame = encode(&datagram);
    debug!(payload = datagram.len(), frame = frame.len(), "datagram encoded");

    if args.hex {
        println!("{}", to_hex(&frame));
    } else {
        print_raw(&frame);
    }

    Ok(SUCCESS)
}
