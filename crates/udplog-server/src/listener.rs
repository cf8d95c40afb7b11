//! UDP datagram listener.

use std::collections::HashSet;
use std::net::{IpAddr, SocketAddr};

use tokio::net::UdpSocket;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::error::{ServerError, ServerResult};
use crate::intake::IntakeSender;

/// Largest datagram accepted in full.
pub const RECV_BUFFER_SIZE: usize = 65_535;

/// Sender addresses allowed to submit logs.
///
/// Matching is on the textual form of the IP. An empty list allows everyone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowList {
    addrs: HashSet<String>,
}

impl AllowList {
    /// Creates an allow-list from address strings.
    pub fn new<I, S>(addrs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            addrs: addrs
                .into_iter()
                .map(Into::into)
                .map(|a| a.trim().to_string())
                .filter(|a| !a.is_empty())
                .collect(),
        }
    }

    /// Returns true if every sender is accepted.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.addrs.is_empty()
    }

    /// Returns true if `ip` may submit logs.
    #[must_use]
    pub fn permits(&self, ip: IpAddr) -> bool {
        self.is_open() || self.addrs.contains(&ip.to_canonical().to_string())
    }
}

/// Characters that end a line: LF, CR, VT, FF, FS, GS, RS, NEL, LS and PS.
const LINE_BOUNDARIES: [char; 10] = [
    '\n', '\r', '\u{0b}', '\u{0c}', '\u{1c}', '\u{1d}', '\u{1e}', '\u{85}', '\u{2028}',
    '\u{2029}',
];

/// Splits decoded datagram text into non-empty lines.
///
/// LF, CR, VT, FF, FS, GS, RS, NEL, LS and PS each end a line; `\r\n` counts once
/// because the empty piece between the two is skipped.
pub fn split_lines(text: &str) -> impl Iterator<Item = &str> {
    text.split(LINE_BOUNDARIES).filter(|line| !line.is_empty())
}

/// Receives datagrams and queues their lines for ingestion.
#[derive(Debug)]
pub struct DatagramListener {
    socket: UdpSocket,
    allow: AllowList,
    tx: IntakeSender,
}

impl DatagramListener {
    /// Binds the socket.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::UdpBind`] if the address is unavailable.
    pub async fn bind(addr: SocketAddr, allow: AllowList, tx: IntakeSender) -> ServerResult<Self> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|e| ServerError::UdpBind(addr, e))?;
        Ok(Self { socket, allow, tx })
    }

    /// The bound address.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket address cannot be read.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Receives until `cancel` fires. Receive errors are logged and skipped.
    pub async fn run(self, cancel: CancellationToken) {
        let mut buf = vec![0u8; RECV_BUFFER_SIZE];
        info!(
            addr = ?self.socket.local_addr().ok(),
            allow_all = self.allow.is_open(),
            "UDP listener started"
        );

        loop {
            let received = tokio::select! {
                () = cancel.cancelled() => break,
                received = self.socket.recv_from(&mut buf) => received,
            };
            match received {
                Ok((len, peer)) => {
                    self.handle_datagram(&buf[..len], peer);
                }
                Err(e) => warn!(error = %e, "UDP receive failed"),
            }
        }

        info!("UDP listener stopped");
    }

    /// Filters, decodes and queues one datagram. Returns the number of lines queued.
    pub fn handle_datagram(&self, data: &[u8], peer: SocketAddr) -> usize {
        if !self.allow.permits(peer.ip()) {
            trace!(peer = %peer, "datagram from non-allowed sender discarded");
            return 0;
        }

        let text = String::from_utf8_lossy(data);
        let mut queued = 0;
        for line in split_lines(&text) {
            match self.tx.try_send(line.to_string()) {
                Ok(()) => queued += 1,
                Err(TrySendError::Full(_)) => {
                    warn!(peer = %peer, "intake queue is full, dropping line");
                }
                Err(TrySendError::Closed(_)) => {
                    debug!("intake queue closed, dropping datagram");
                    break;
                }
            }
        }
        queued
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intake::intake_channel;
    use std::net::Ipv4Addr;
    use test_case::test_case;

    fn peer(ip: [u8; 4]) -> SocketAddr {
        SocketAddr::from((ip, 40_000))
    }

    fn drain(rx: &mut crate::intake::IntakeReceiver) -> Vec<String> {
        let mut out = Vec::new();
        while let Ok(line) = rx.try_recv() {
            out.push(line);
        }
        out
    }

    #[test_case("a\nb\n\nc", &["a", "b", "c"] ; "newlines with empty line")]
    #[test_case("a\r\nb\r\n", &["a", "b"] ; "crlf")]
    #[test_case("a\rb", &["a", "b"] ; "lone cr")]
    #[test_case("single", &["single"] ; "no terminator")]
    #[test_case("a\x0bb\u{2028}c\x0cd", &["a", "b", "c", "d"] ; "vertical tab line and form feed")]
    #[test_case("a\x1cb\x1dc\x1ed", &["a", "b", "c", "d"] ; "file group record separators")]
    #[test_case("a\u{85}b\u{2029}c", &["a", "b", "c"] ; "next line and paragraph separator")]
    #[test_case("tab\tstays", &["tab\tstays"] ; "tab is not a boundary")]
    #[test_case("\n\n", &[] ; "only newlines")]
    #[test_case("", &[] ; "empty")]
    fn split_lines_cases(text: &str, expected: &[&str]) {
        assert_eq!(split_lines(text).collect::<Vec<_>>(), expected);
    }

    #[test]
    fn empty_allow_list_permits_all() {
        let allow = AllowList::default();
        assert!(allow.is_open());
        assert!(allow.permits(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 9))));
    }

    #[test]
    fn allow_list_matches_exact_address() {
        let allow = AllowList::new(["10.0.0.1"]);
        assert!(allow.permits(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1))));
        assert!(!allow.permits(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2))));
    }

    #[test]
    fn allow_list_matches_mapped_ipv4() {
        let allow = AllowList::new(["10.0.0.1"]);
        let mapped = Ipv4Addr::new(10, 0, 0, 1).to_ipv6_mapped();
        assert!(allow.permits(IpAddr::V6(mapped)));
    }

    #[test]
    fn blank_allow_list_entries_are_ignored() {
        assert!(AllowList::new(["", "  "]).is_open());
    }

    #[tokio::test]
    async fn datagram_from_allowed_sender_is_queued() {
        let (tx, mut rx) = intake_channel(16);
        let listener = DatagramListener::bind(
            SocketAddr::from(([127, 0, 0, 1], 0)),
            AllowList::new(["10.0.0.1"]),
            tx,
        )
        .await
        .unwrap();

        assert_eq!(listener.handle_datagram(b"from 2", peer([10, 0, 0, 2])), 0);
        assert_eq!(listener.handle_datagram(b"from 1", peer([10, 0, 0, 1])), 1);
        assert_eq!(drain(&mut rx), vec!["from 1"]);
    }

    #[tokio::test]
    async fn invalid_utf8_is_replaced() {
        let (tx, mut rx) = intake_channel(16);
        let listener =
            DatagramListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)), AllowList::default(), tx)
                .await
                .unwrap();

        listener.handle_datagram(b"ok \xff end", peer([127, 0, 0, 1]));
        assert_eq!(drain(&mut rx), vec!["ok \u{fffd} end"]);
    }

    #[tokio::test]
    async fn full_queue_drops_excess_lines() {
        let (tx, mut rx) = intake_channel(2);
        let listener =
            DatagramListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)), AllowList::default(), tx)
                .await
                .unwrap();

        let queued = listener.handle_datagram(b"1\n2\n3\n4", peer([127, 0, 0, 1]));

        assert_eq!(queued, 2);
        assert_eq!(drain(&mut rx), vec!["1", "2"]);
    }

    #[tokio::test]
    async fn run_receives_real_datagrams_until_cancelled() {
        let (tx, mut rx) = intake_channel(16);
        let listener =
            DatagramListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)), AllowList::default(), tx)
                .await
                .unwrap();
        let addr = listener.local_addr().unwrap();
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(listener.run(cancel.clone()));

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        client.send_to(b"a\nb\n\nc", addr).await.unwrap();

        let mut lines = Vec::new();
        for _ in 0..3 {
            let line = tokio::time::timeout(std::time::Duration::from_secs(2), rx.recv())
                .await
                .unwrap()
                .unwrap();
            lines.push(line);
        }
        assert_eq!(lines, vec!["a", "b", "c"]);

        cancel.cancel();
        handle.await.unwrap();
        // The listener owned the only sender.
        assert!(rx.recv().await.is_none());
    }
}
