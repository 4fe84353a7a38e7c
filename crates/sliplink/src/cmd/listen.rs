use std::os::unix::fs::FileTypeExt;
use std::os::unix::net::UnixListener;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use sliplink_layer::{LinkLayer, NeighborAddress};
use sliplink_transport::StreamTransport;
use tracing::{debug, info};

use crate::cmd::ListenArgs;
use crate::exit::{io_error, transport_error, CliError, CliResult, INTERNAL, SUCCESS, USAGE};
use crate::output::{print_datagram, OutputFormat};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    remove_stale_socket(&args.path)?;
    let listener = UnixListener::bind(&args.path)
        .map_err(|err| io_error(&format!("bind {} failed", args.path.display()), err))?;
    info!(path = %args.path.display(), "listening");

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(Arc::clone(&running))?;

    let (stream, _) = listener
        .accept()
        .map_err(|err| io_error("accept failed", err))?;
    let transport = Arc::new(
        StreamTransport::from_unix_stream(stream)
            .map_err(|err| transport_error("transport setup failed", err))?,
    );
    let (tx, rx) = mpsc::channel::<(NeighborAddress, Bytes)>();
    let tx = Mutex::new(tx);
    let layer = LinkLayer::with_receiver(
        [(args.neighbor.as_str(), Arc::clone(&transport))],
        move |from: &NeighborAddress, datagram: Bytes| -> Result<(), &'static str> {
            tx.lock()
                .map_err(|_| "datagram channel lock poisoned")?
                .send((from.clone(), datagram))
                .map_err(|_| "datagram channel closed")
        },
    );
    info!(neighbor = %args.neighbor, "link up");

    let mut printed = 0u64;
    while running.load(Ordering::SeqCst) {
        match rx.recv_timeout(POLL_INTERVAL) {
            Ok((from, datagram)) => {
                printed += 1;
                print_datagram(printed, Some(from.as_str()), &datagram, format);
                if args.count.is_some_and(|count| printed >= count) {
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) if transport.is_closed() => {
                debug!("peer closed the link");
                break;
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    layer.clear_receiver();
    let _ = std::fs::remove_file(&args.path);
    info!(datagrams = printed, "listener stopped");
    Ok(SUCCESS)
}

fn remove_stale_socket(path: &Path) -> CliResult<()> {
    let Ok(metadata) = std::fs::symlink_metadata(path) else {
        return Ok(());
    };
    if !metadata.file_type().is_socket() {
        return Err(CliError::new(
            USAGE,
            format!("{} exists and is not a socket", path.display()),
        ));
    }
    debug!(path = %path.display(), "removing stale socket");
    std::fs::remove_file(path)
        .map_err(|err| io_error(&format!("failed removing {}", path.display()), err))
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
