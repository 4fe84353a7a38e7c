use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, RwLock};

use bytes::Bytes;
use tracing::{trace, warn};

use crate::address::NeighborAddress;

/// Boxed error a receiver may report.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub(crate) type UpwardReceiver =
    dyn Fn(&NeighborAddress, Bytes) -> Result<(), BoxError> + Send + Sync + 'static;

/// A failure raised while handing a datagram to the upward receiver.
///
/// Caught and logged where the receiver is invoked; never reaches the
/// deframer that produced the datagram.
#[derive(Debug, thiserror::Error)]
pub enum ReceiverError {
    /// The receiver returned an error.
    #[error("receiver failed: {0}")]
    Failed(BoxError),

    /// The receiver panicked.
    #[error("receiver panicked: {0}")]
    Panicked(String),
}

/// Return types accepted from upward receivers: `()` or `Result<(), E>`.
pub trait ReceiverOutcome {
    fn into_result(self) -> Result<(), BoxError>;
}

impl ReceiverOutcome for () {
    fn into_result(self) -> Result<(), BoxError> {
        Ok(())
    }
}

impl<E: Into<BoxError>> ReceiverOutcome for Result<(), E> {
    fn into_result(self) -> Result<(), BoxError> {
        self.map_err(Into::into)
    }
}

/// The single upward receiver slot shared by every link of one layer.
#[derive(Default)]
pub(crate) struct FanIn {
    slot: RwLock<Option<Arc<UpwardReceiver>>>,
}

impl FanIn {
    pub(crate) fn set(&self, receiver: Option<Arc<UpwardReceiver>>) {
        let mut slot = self.slot.write().unwrap_or_else(|p| p.into_inner());
        *slot = receiver;
    }

    pub(crate) fn has_receiver(&self) -> bool {
        self.current().is_some()
    }

    /// Hand one completed datagram upward, isolating receiver failures.
    ///
    /// The slot lock is released before the call, so a receiver may replace
    /// itself.
    pub(crate) fn dispatch(&self, from: &NeighborAddress, datagram: Bytes) {
        let Some(receiver) = self.current() else {
            trace!(
                neighbor = %from,
                len = datagram.len(),
                "no receiver registered, datagram dropped"
            );
            return;
        };

        let len = datagram.len();
        if let Err(err) = invoke(&*receiver, from, datagram) {
            warn!(neighbor = %from, len, error = %err, "upward receiver failed");
        }
    }

    fn current(&self) -> Option<Arc<UpwardReceiver>> {
        self.slot.read().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

fn invoke(
    receiver: &UpwardReceiver,
    from: &NeighborAddress,
    datagram: Bytes,
) -> Result<(), ReceiverError> {
    match panic::catch_unwind(AssertUnwindSafe(|| receiver(from, datagram))) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(ReceiverError::Failed(err)),
        Err(payload) => Err(ReceiverError::Panicked(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    fn addr() -> NeighborAddress {
        NeighborAddress::from("10.0.0.2")
    }

    #[test]
    fn invoke_passes_success_through() {
        let receiver = |_: &NeighborAddress, _: Bytes| -> Result<(), BoxError> { Ok(()) };
        assert!(invoke(&receiver, &addr(), Bytes::from_static(b"x")).is_ok());
    }

    #[test]
    fn invoke_wraps_returned_error() {
        let receiver =
            |_: &NeighborAddress, _: Bytes| -> Result<(), BoxError> { Err("bad datagram".into()) };
        let err = invoke(&receiver, &addr(), Bytes::new()).unwrap_err();
        assert!(matches!(err, ReceiverError::Failed(_)));
        assert_eq!(err.to_string(), "receiver failed: bad datagram");
    }

    #[test]
    fn invoke_catches_panic() {
        let receiver = |_: &NeighborAddress, _: Bytes| -> Result<(), BoxError> {
            panic!("upper layer blew up");
        };
        let err = invoke(&receiver, &addr(), Bytes::new()).unwrap_err();
        assert!(matches!(err, ReceiverError::Panicked(ref msg) if msg == "upper layer blew up"));
    }

    #[test]
    fn panic_message_formats_owned_strings() {
        let receiver = |_: &NeighborAddress, _: Bytes| -> Result<(), BoxError> {
            panic!("code {}", 7);
        };
        let err = invoke(&receiver, &addr(), Bytes::new()).unwrap_err();
        assert!(matches!(err, ReceiverError::Panicked(ref msg) if msg == "code 7"));
    }

    #[test]
    fn dispatch_without_receiver_is_a_no_op() {
        let fan_in = FanIn::default();
        assert!(!fan_in.has_receiver());
        fan_in.dispatch(&addr(), Bytes::from_static(b"dropped"));
    }

    #[test]
    fn receiver_may_replace_itself() {
        let fan_in = Arc::new(FanIn::default());
        let seen = Arc::new(Mutex::new(Vec::new()));

        let inner_fan_in = Arc::clone(&fan_in);
        let inner_seen = Arc::clone(&seen);
        fan_in.set(Some(Arc::new(
            move |_: &NeighborAddress, d: Bytes| -> Result<(), BoxError> {
                inner_seen.lock().unwrap().push(d);
                inner_fan_in.set(None);
                Ok(())
            },
        )));

        fan_in.dispatch(&addr(), Bytes::from_static(b"first"));
        fan_in.dispatch(&addr(), Bytes::from_static(b"second"));

        assert_eq!(seen.lock().unwrap().len(), 1);
        assert!(!fan_in.has_receiver());
    }

    #[test]
    fn outcome_conversions() {
        assert!(().into_result().is_ok());
        assert!(Ok::<(), std::io::Error>(()).into_result().is_ok());
        assert!(Err::<(), _>("nope").into_result().is_err());
    }
}
