/*!
 * Signal Race Tests
 * Operations interrupted by process signals
 *
 * Signals are process-wide, so every test here runs serially.
 */

use nix::sys::signal::{raise, Signal};
use opflow::{signalled, CancelToken, OpError, OpResult, SignalSet};
use pretty_assertions::assert_eq;
use serial_test::serial;
use std::time::Duration;

#[tokio::test]
#[serial]
async fn test_signal_interrupts_operation() {
    let token = CancelToken::new();
    let mut signals = SignalSet::new(&[Signal::SIGUSR1 as i32]).expect("Failed to register SIGUSR1");

    tokio::spawn(async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        raise(Signal::SIGUSR1).expect("Failed to raise SIGUSR1");
    });

    let result: OpResult<()> = signalled(&token, &mut signals, token.run(std::future::pending())).await;

    match result {
        Err(OpError::Interrupted { signal }) => assert_eq!(signal, Signal::SIGUSR1 as i32),
        other => panic!("expected interruption, got {:?}", other),
    }
    assert_eq!(token.cancellations(), 1);
}

#[tokio::test]
#[serial]
async fn test_op_first_ignores_signals() {
    let token = CancelToken::new();
    let mut signals = SignalSet::new(&[Signal::SIGUSR1 as i32, Signal::SIGUSR2 as i32]).unwrap();
    assert_eq!(
        signals.numbers(),
        vec![Signal::SIGUSR1 as i32, Signal::SIGUSR2 as i32]
    );

    let value = signalled(&token, &mut signals, async { OpResult::Ok(3) })
        .await
        .unwrap();

    assert_eq!(value, 3);
    assert_eq!(token.cancellations(), 0);
}

#[tokio::test]
#[serial]
async fn test_only_listed_signals_interrupt() {
    let token = CancelToken::new();
    let mut signals = SignalSet::new(&[Signal::SIGUSR2 as i32]).unwrap();

    // Handled, so raising it below does not terminate the process
    let _other = SignalSet::new(&[Signal::SIGUSR1 as i32]).unwrap();

    tokio::spawn(async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        raise(Signal::SIGUSR1).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        raise(Signal::SIGUSR2).unwrap();
    });

    let result: OpResult<()> = signalled(&token, &mut signals, token.run(std::future::pending())).await;
    assert!(matches!(
        result,
        Err(OpError::Interrupted { signal }) if signal == Signal::SIGUSR2 as i32
    ));
}

#[tokio::test]
async fn test_empty_set_never_fires() {
    let token = CancelToken::new();
    let mut signals = SignalSet::new(&[]).unwrap();
    assert!(signals.is_empty());

    let value = signalled(&token, &mut signals, async {
        tokio::time::sleep(Duration::from_millis(5)).await;
        OpResult::Ok(())
    })
    .await;
    assert!(value.is_ok());
}
