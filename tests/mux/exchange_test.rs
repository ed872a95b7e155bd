/*!
 * Exchange Tests
 * Send-and-wait with resend on timeout, against a mocked port
 */

use mockall::{automock, Sequence};
use opflow::{CorrelationId, Multiplexer, OpError, OpResult, Tagged};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

#[automock]
trait Port {
    fn send(&self, id: CorrelationId) -> OpResult<()>;
}

#[derive(Debug, Clone, PartialEq)]
enum Reply {
    Ack,
    Nak,
}

impl Tagged for Reply {
    type Tag = Reply;

    fn tag(&self) -> Reply {
        self.clone()
    }
}

const TIMEOUT: Duration = Duration::from_millis(50);

#[tokio::test(start_paused = true)]
async fn test_resend_after_lost_request() {
    let mux = Multiplexer::<Reply>::new();
    let sent = Arc::new(Mutex::new(Vec::new()));

    let mut port = MockPort::new();
    let mut seq = Sequence::new();
    {
        let sent = sent.clone();
        port.expect_send()
            .times(1)
            .in_sequence(&mut seq)
            .returning(move |id| {
                sent.lock().push(id);
                Ok(())
            });
    }
    {
        let sent = sent.clone();
        let peer = mux.clone();
        port.expect_send()
            .times(1)
            .in_sequence(&mut seq)
            .returning(move |id| {
                sent.lock().push(id);
                peer.fulfill(id, Reply::Ack);
                Ok(())
            });
    }

    let mut tx = mux.transaction().unwrap();
    let start = Instant::now();
    let reply = tx
        .exchange(Reply::Ack, TIMEOUT, 2, |id| std::future::ready(port.send(id)))
        .await
        .unwrap();

    assert_eq!(reply, Reply::Ack);
    assert_eq!(start.elapsed(), TIMEOUT);

    let sent = sent.lock().clone();
    assert_eq!(sent.len(), 2);
    assert_ne!(sent[0], sent[1], "resend must carry a fresh identifier");
    assert_eq!(tx.id(), sent[1]);

    // Late answer to the lost request goes nowhere
    assert!(!mux.fulfill(sent[0], Reply::Ack));
}

#[tokio::test(start_paused = true)]
async fn test_mismatch_is_not_retried() {
    let mux = Multiplexer::<Reply>::new();
    let peer = mux.clone();

    let mut port = MockPort::new();
    port.expect_send().times(1).returning(move |id| {
        peer.fulfill(id, Reply::Nak);
        Ok(())
    });

    let mut tx = mux.transaction().unwrap();
    let err = tx
        .exchange(Reply::Ack, TIMEOUT, 3, |id| std::future::ready(port.send(id)))
        .await
        .unwrap_err();

    assert!(err.is_unexpected_reply());
}

#[tokio::test(start_paused = true)]
async fn test_retries_exhausted() {
    let mux = Multiplexer::<Reply>::new();

    let mut port = MockPort::new();
    port.expect_send().times(3).returning(|_| Ok(()));

    let mut tx = mux.transaction().unwrap();
    let start = Instant::now();
    let err: OpError = tx
        .exchange(Reply::Ack, TIMEOUT, 2, |id| std::future::ready(port.send(id)))
        .await
        .unwrap_err();

    assert!(err.is_timeout());
    assert_eq!(start.elapsed(), TIMEOUT * 3);
    assert_eq!(mux.live_transactions(), 1);
}

#[tokio::test]
async fn test_send_error_passes_through() {
    let mux = Multiplexer::<Reply>::new();

    let mut port = MockPort::new();
    port.expect_send()
        .times(1)
        .returning(|_| Err(io::Error::new(io::ErrorKind::BrokenPipe, "port closed").into()));

    let mut tx = mux.transaction().unwrap();
    let err = tx
        .exchange(Reply::Ack, TIMEOUT, 3, |id| std::future::ready(port.send(id)))
        .await
        .unwrap_err();

    match err {
        OpError::Io(inner) => assert_eq!(inner.kind(), io::ErrorKind::BrokenPipe),
        other => panic!("expected transport error, got {:?}", other),
    }
}
