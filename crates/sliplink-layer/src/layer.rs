use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use sliplink_transport::Transport;
use tracing::debug;

use crate::address::NeighborAddress;
use crate::error::{LinkError, Result};
use crate::link::Link;
use crate::receiver::{FanIn, ReceiverOutcome};

/// One link per directly connected neighbor, behind a single send/receive
/// surface.
///
/// Membership is fixed at construction. Every link feeds the same upward
/// receiver; datagrams from different neighbors may arrive in any
/// interleaving, while each link's own datagrams keep their wire order.
///
/// The receiver runs synchronously on whichever thread the transport uses to
/// deliver bytes, inside the call that completed the frame. A receiver that
/// blocks stalls that link's receive path.
pub struct LinkLayer {
    links: HashMap<NeighborAddress, Link>,
    fan_in: Arc<FanIn>,
}

impl LinkLayer {
    /// Build a layer with one link per `(neighbor, transport)` entry.
    ///
    /// A neighbor listed twice keeps its last transport; earlier ones are
    /// dropped without ever being subscribed to.
    ///
    /// Transports may start delivering as soon as they are subscribed, and
    /// datagrams completed before a receiver is registered are dropped. Use
    /// [`with_receiver`](Self::with_receiver) when nothing may be lost.
    pub fn new<I, A, T>(transports: I) -> Self
    where
        I: IntoIterator<Item = (A, T)>,
        A: Into<NeighborAddress>,
        T: Transport + 'static,
    {
        Self::attach_all(transports, Arc::new(FanIn::default()))
    }

    /// Build a layer whose upward receiver is in place before any link is
    /// subscribed to its transport.
    pub fn with_receiver<I, A, T, F, R>(transports: I, receiver: F) -> Self
    where
        I: IntoIterator<Item = (A, T)>,
        A: Into<NeighborAddress>,
        T: Transport + 'static,
        F: Fn(&NeighborAddress, Bytes) -> R + Send + Sync + 'static,
        R: ReceiverOutcome,
    {
        let fan_in = Arc::new(FanIn::default());
        fan_in.set(Some(Arc::new(
            move |from: &NeighborAddress, datagram: Bytes| receiver(from, datagram).into_result(),
        )));
        Self::attach_all(transports, fan_in)
    }

    fn attach_all<I, A, T>(transports: I, fan_in: Arc<FanIn>) -> Self
    where
        I: IntoIterator<Item = (A, T)>,
        A: Into<NeighborAddress>,
        T: Transport + 'static,
    {
        let by_address: HashMap<NeighborAddress, T> = transports
            .into_iter()
            .map(|(address, transport)| (address.into(), transport))
            .collect();

        let links: HashMap<_, _> = by_address
            .into_iter()
            .map(|(address, transport)| {
                debug!(neighbor = %address, "link attached");
                let link =
                    Link::attach(address.clone(), Box::new(transport), Arc::clone(&fan_in));
                (address, link)
            })
            .collect();

        Self { links, fan_in }
    }

    /// Register the upward receiver, replacing any previous one.
    ///
    /// `receiver` may return `()` or `Result<(), E>`. Errors and panics are
    /// logged and swallowed; they never disturb the links.
    pub fn register_receiver<F, R>(&self, receiver: F)
    where
        F: Fn(Bytes) -> R + Send + Sync + 'static,
        R: ReceiverOutcome,
    {
        self.fan_in.set(Some(Arc::new(
            move |_: &NeighborAddress, datagram: Bytes| receiver(datagram).into_result(),
        )));
    }

    /// Like [`register_receiver`](Self::register_receiver), but the receiver
    /// also learns which neighbor the datagram came from.
    pub fn register_receiver_from<F, R>(&self, receiver: F)
    where
        F: Fn(&NeighborAddress, Bytes) -> R + Send + Sync + 'static,
        R: ReceiverOutcome,
    {
        self.fan_in.set(Some(Arc::new(
            move |from: &NeighborAddress, datagram: Bytes| receiver(from, datagram).into_result(),
        )));
    }

    /// Remove the upward receiver. Datagrams received meanwhile are dropped.
    pub fn clear_receiver(&self) {
        self.fan_in.set(None);
    }

    /// Whether an upward receiver is registered.
    pub fn has_receiver(&self) -> bool {
        self.fan_in.has_receiver()
    }

    /// Send `datagram` to a directly connected neighbor.
    ///
    /// Fails with [`LinkError::UnknownNeighbor`] when no link reaches
    /// `neighbor`; nothing is written anywhere in that case.
    pub fn send(&self, datagram: &[u8], neighbor: impl AsRef<str>) -> Result<()> {
        let neighbor = neighbor.as_ref();
        let link = self
            .links
            .get(neighbor)
            .ok_or_else(|| LinkError::UnknownNeighbor(NeighborAddress::from(neighbor)))?;
        link.send(datagram)
    }

    /// The link reaching `neighbor`, if configured.
    pub fn link(&self, neighbor: impl AsRef<str>) -> Option<&Link> {
        self.links.get(neighbor.as_ref())
    }

    /// Whether a link reaches `neighbor`.
    pub fn contains(&self, neighbor: impl AsRef<str>) -> bool {
        self.links.contains_key(neighbor.as_ref())
    }

    /// Configured neighbors, in no particular order.
    pub fn neighbors(&self) -> impl Iterator<Item = &NeighborAddress> {
        self.links.keys()
    }

    /// Number of links.
    pub fn len(&self) -> usize {
        self.links.len()
    }

    /// Whether the layer has no links at all.
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}

impl std::fmt::Debug for LinkLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut neighbors: Vec<_> = self.links.keys().map(NeighborAddress::as_str).collect();
        neighbors.sort_unstable();
        f.debug_struct("LinkLayer")
            .field("neighbors", &neighbors)
            .field("has_receiver", &self.has_receiver())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use sliplink_frame::encode;

    use super::*;
    use crate::mock::MockTransport;

    fn two_neighbors() -> (LinkLayer, Arc<MockTransport>, Arc<MockTransport>) {
        let a = MockTransport::shared();
        let b = MockTransport::shared();
        let layer = LinkLayer::new([
            ("10.0.0.1", Arc::clone(&a)),
            ("10.0.0.2", Arc::clone(&b)),
        ]);
        (layer, a, b)
    }

    fn collecting(layer: &LinkLayer) -> Arc<Mutex<Vec<Bytes>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        layer.register_receiver(move |datagram| sink.lock().unwrap().push(datagram));
        seen
    }

    #[test]
    fn construction_subscribes_every_link() {
        let (layer, a, b) = two_neighbors();
        assert_eq!(layer.len(), 2);
        assert!(!layer.is_empty());
        assert!(a.has_receiver());
        assert!(b.has_receiver());
        assert!(layer.contains("10.0.0.1"));
        assert!(!layer.contains("10.0.0.3"));
        assert_eq!(
            layer.link("10.0.0.2").map(|link| link.address().as_str()),
            Some("10.0.0.2")
        );
        assert!(layer.link("10.0.0.3").is_none());

        let mut neighbors: Vec<_> = layer.neighbors().map(|n| n.to_string()).collect();
        neighbors.sort();
        assert_eq!(neighbors, vec!["10.0.0.1", "10.0.0.2"]);
    }

    #[test]
    fn with_receiver_sees_frames_delivered_during_construction() {
        let transport = MockTransport::preloaded(&encode(b"hello"));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        let layer = LinkLayer::with_receiver(
            [("10.0.0.1", Arc::clone(&transport))],
            move |from: &NeighborAddress, datagram: Bytes| {
                sink.lock().unwrap().push((from.to_string(), datagram));
            },
        );

        assert!(layer.has_receiver());
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, "10.0.0.1");
        assert_eq!(seen[0].1.as_ref(), b"hello");
    }

    #[test]
    fn new_drops_frames_delivered_before_registration() {
        let transport = MockTransport::preloaded(&encode(b"early"));
        let layer = LinkLayer::new([("10.0.0.1", Arc::clone(&transport))]);
        let seen = collecting(&layer);

        transport.inject(&encode(b"late"));

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].as_ref(), b"late");
    }

    #[test]
    fn mixed_transport_types_share_one_layer() {
        use std::io::Cursor;

        use sliplink_transport::StreamTransport;

        #[derive(Clone, Default)]
        struct Wire(Arc<Mutex<Vec<u8>>>);

        impl std::io::Write for Wire {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                self.0.lock().unwrap().extend_from_slice(buf);
                Ok(buf.len())
            }

            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let mock = MockTransport::shared();
        let wire = Wire::default();
        let stream = StreamTransport::new(Cursor::new(Vec::<u8>::new()), wire.clone());

        let first: Arc<dyn Transport> = mock.clone();
        let second: Arc<dyn Transport> = Arc::new(stream);
        let layer = LinkLayer::new([("10.0.0.1", first), ("10.0.0.2", second)]);

        layer.send(b"a", "10.0.0.1").unwrap();
        layer.send(&[0xDB], "10.0.0.2").unwrap();

        assert_eq!(layer.len(), 2);
        assert_eq!(mock.sent(), vec![vec![0xC0, 0x61, 0xC0]]);
        assert_eq!(*wire.0.lock().unwrap(), vec![0xC0, 0xDB, 0xDD, 0xC0]);
    }

    #[test]
    fn duplicate_neighbor_keeps_last_transport() {
        let first = MockTransport::shared();
        let second = MockTransport::shared();
        let layer = LinkLayer::new([
            ("10.0.0.1", Arc::clone(&first)),
            ("10.0.0.1", Arc::clone(&second)),
        ]);

        layer.send(b"x", "10.0.0.1").unwrap();

        assert_eq!(layer.len(), 1);
        assert!(!first.has_receiver());
        assert!(first.sent().is_empty());
        assert_eq!(second.sent().len(), 1);
    }

    #[test]
    fn send_routes_by_neighbor() {
        let (layer, a, b) = two_neighbors();

        layer.send(&[0x01, 0x02], "10.0.0.2").unwrap();

        assert!(a.sent().is_empty());
        assert_eq!(b.sent(), vec![vec![0xC0, 0x01, 0x02, 0xC0]]);
    }

    #[test]
    fn send_accepts_address_values() {
        let (layer, a, _) = two_neighbors();
        let neighbor = NeighborAddress::from(std::net::Ipv4Addr::new(10, 0, 0, 1));

        layer.send(b"ok", &neighbor).unwrap();

        assert_eq!(a.sent(), vec![encode(b"ok").to_vec()]);
    }

    #[test]
    fn unknown_neighbor_is_an_error_and_touches_nothing() {
        let (layer, a, b) = two_neighbors();
        let seen = collecting(&layer);

        // Leave link A mid-frame, with an escape pending.
        a.inject(&[0xC0, 0x41, 0xDB]);

        let err = layer.send(b"lost", "192.168.0.1").unwrap_err();
        assert!(matches!(err, LinkError::UnknownNeighbor(ref n) if n.as_str() == "192.168.0.1"));
        assert_eq!(err.to_string(), "no link configured for neighbor 192.168.0.1");
        assert!(a.sent().is_empty());
        assert!(b.sent().is_empty());

        // The partial frame on A resumes exactly where it was.
        a.inject(&[0xDC, 0x42, 0xC0]);
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].as_ref(), &[0x41, 0xC0, 0x42]);
    }

    #[test]
    fn inbound_datagrams_merge_into_one_receiver() {
        let (layer, a, b) = two_neighbors();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        layer.register_receiver_from(move |from: &NeighborAddress, datagram: Bytes| {
            sink.lock().unwrap().push((from.to_string(), datagram));
        });

        a.inject(&encode(b"from-a"));
        b.inject(&encode(b"from-b"));
        a.inject(&encode(b"again-a"));

        let seen = seen.lock().unwrap();
        let got: Vec<(&str, &[u8])> = seen
            .iter()
            .map(|(n, d)| (n.as_str(), d.as_ref()))
            .collect();
        assert_eq!(
            got,
            vec![
                ("10.0.0.1", &b"from-a"[..]),
                ("10.0.0.2", &b"from-b"[..]),
                ("10.0.0.1", &b"again-a"[..]),
            ]
        );
    }

    #[test]
    fn interleaved_partial_frames_stay_separate_per_link() {
        let (layer, a, b) = two_neighbors();
        let seen = collecting(&layer);

        a.inject(&[0xC0, 0x61]);
        b.inject(&[0xC0, 0x62]);
        a.inject(&[0x61, 0xC0]);
        b.inject(&[0x62, 0xC0]);

        let seen = seen.lock().unwrap();
        assert_eq!(seen[0].as_ref(), b"aa");
        assert_eq!(seen[1].as_ref(), b"bb");
    }

    #[test]
    fn datagrams_without_receiver_are_dropped() {
        let (layer, a, _) = two_neighbors();
        assert!(!layer.has_receiver());

        a.inject(&encode(b"early"));

        let seen = collecting(&layer);
        a.inject(&encode(b"late"));

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].as_ref(), b"late");
    }

    #[test]
    fn replacing_receiver_routes_only_to_latest() {
        let (layer, a, _) = two_neighbors();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&first);
        layer.register_receiver(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        a.inject(&encode(b"one"));

        let counter = Arc::clone(&second);
        layer.register_receiver(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        a.inject(&encode(b"two"));
        a.inject(&encode(b"three"));

        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn clear_receiver_stops_delivery() {
        let (layer, a, _) = two_neighbors();
        let seen = collecting(&layer);

        layer.clear_receiver();
        a.inject(&encode(b"ignored"));

        assert!(!layer.has_receiver());
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn failing_receiver_does_not_break_the_link() {
        let (layer, a, _) = two_neighbors();
        let calls = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&calls);
        layer.register_receiver(move |datagram: Bytes| {
            sink.lock().unwrap().push(datagram.clone());
            if datagram.as_ref() == b"bad" {
                return Err("rejected by upper layer");
            }
            Ok(())
        });

        let mut wire = encode(b"bad").to_vec();
        wire.extend_from_slice(&encode(b"good"));
        a.inject(&wire);

        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].as_ref(), b"good");
    }

    #[test]
    fn panicking_receiver_does_not_break_the_link() {
        let (layer, a, _) = two_neighbors();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        layer.register_receiver(move |datagram: Bytes| {
            counter.fetch_add(1, Ordering::SeqCst);
            if datagram.as_ref() == b"boom" {
                panic!("receiver panic");
            }
        });

        a.inject(&[0xC0, 0x62, 0x6F, 0x6F, 0x6D, 0xC0, 0x6F, 0x6B]);
        a.inject(&[0xC0]);

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    #[cfg(unix)]
    fn end_to_end_over_unix_stream_pair() {
        use std::sync::mpsc;
        use std::time::Duration;

        use sliplink_transport::StreamTransport;

        let (left, right) = std::os::unix::net::UnixStream::pair().unwrap();
        let near = LinkLayer::new([(
            "10.0.0.2",
            StreamTransport::from_unix_stream(left).unwrap(),
        )]);
        let far = LinkLayer::new([(
            "10.0.0.1",
            StreamTransport::from_unix_stream(right).unwrap(),
        )]);

        let (tx, rx) = mpsc::channel();
        let tx = Mutex::new(tx);
        far.register_receiver(move |datagram: Bytes| tx.lock().unwrap().send(datagram));

        let payloads: [&[u8]; 3] = [b"ping", &[0xC0, 0xDB, 0xC0], b"pong"];
        for payload in payloads {
            near.send(payload, "10.0.0.2").unwrap();
        }

        for payload in payloads {
            let got = rx.recv_timeout(Duration::from_secs(2)).unwrap();
            assert_eq!(got.as_ref(), payload);
        }
    }

    #[test]
    #[cfg(unix)]
    fn dropping_layer_stops_delivery_and_closes_link() {
        use std::io::{Read, Write};
        use std::time::Duration;

        use sliplink_transport::StreamTransport;

        let (near, mut peer) = std::os::unix::net::UnixStream::pair().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let layer = LinkLayer::with_receiver(
            [("10.0.0.2", StreamTransport::from_unix_stream(near).unwrap())],
            move |_: &NeighborAddress, _: Bytes| {
                counter.fetch_add(1, Ordering::SeqCst);
            },
        );

        drop(layer);
        let _ = peer.write_all(&encode(b"after-drop"));

        peer.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
        let mut buf = [0u8; 16];
        assert_eq!(peer.read(&mut buf).unwrap(), 0);

        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
