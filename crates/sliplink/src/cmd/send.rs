use std::os::unix::net::UnixStream;

use sliplink_layer::LinkLayer;
use sliplink_transport::StreamTransport;
use tracing::info;

use crate::cmd::SendArgs;
use crate::exit::{io_error, link_error, transport_error, CliResult, SUCCESS};

pub fn run(args: SendArgs) -> CliResult<i32> {
    let datagram = args.payload.resolve()?;

    let stream = UnixStream::connect(&args.path).map_err(|err| {
        io_error(&format!("connect to {} failed", args.path.display()), err)
    })?;
    let transport = StreamTransport::from_unix_stream(stream)
        .map_err(|err| transport_error("transport setup failed", err))?;

    let layer = LinkLayer::new([(args.neighbor.as_str(), transport)]);
    layer
        .send(&datagram, &args.neighbor)
        .map_err(|err| link_error("send failed", err))?;

    info!(neighbor = %args.neighbor, size = datagram.len(), "datagram sent");
    Ok(SUCCESS)
}
