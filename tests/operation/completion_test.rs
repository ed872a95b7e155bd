/*!
 * Completion Tests
 * Every started operation completes its handler exactly once, whether it
 * finishes, fails, or is aborted
 */

use opflow::{Executor, OpError, OpResult, Operation, OperationState};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
enum Plan {
    Succeed(u32),
    Fail,
    SuspendThenSucceed(u8),
    Abort,
}

fn plan() -> impl Strategy<Value = Plan> {
    prop_oneof![
        any::<u32>().prop_map(Plan::Succeed),
        Just(Plan::Fail),
        (1u8..4).prop_map(Plan::SuspendThenSucceed),
        Just(Plan::Abort),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_exactly_once_completion(plans in prop::collection::vec(plan(), 1..24)) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .start_paused(true)
            .build()
            .unwrap();

        rt.block_on(async {
            let executor = Executor::current();
            let calls: Vec<Arc<AtomicUsize>> =
                plans.iter().map(|_| Arc::new(AtomicUsize::new(0))).collect();

            let mut handles = Vec::new();
            for (plan, counter) in plans.iter().copied().zip(calls.iter().cloned()) {
                let handle = Operation::start(
                    &executor,
                    "planned",
                    move |_ctx| async move {
                        match plan {
                            Plan::Succeed(v) => Ok(v),
                            Plan::Fail => Err(OpError::Aborted),
                            Plan::SuspendThenSucceed(n) => {
                                for _ in 0..n {
                                    tokio::time::sleep(Duration::from_millis(1)).await;
                                }
                                Ok(u32::from(n))
                            }
                            Plan::Abort => std::future::pending().await,
                        }
                    },
                    move |result: OpResult<u32>| {
                        counter.fetch_add(1, Ordering::SeqCst);
                        if matches!(plan, Plan::Abort) {
                            assert!(matches!(result, Err(OpError::Abandoned)));
                        }
                    },
                );
                if matches!(plan, Plan::Abort) {
                    handle.abort();
                }
                handles.push(handle);
            }

            for handle in handles {
                handle.join().await;
            }
            executor.wait_idle().await;

            for counter in &calls {
                assert_eq!(counter.load(Ordering::SeqCst), 1);
            }

            let stats = executor.stats();
            assert_eq!(stats.started, plans.len() as u64);
            assert_eq!(stats.completed + stats.abandoned, stats.started);
            assert_eq!(stats.live(), 0);
        });
    }
}

#[tokio::test(start_paused = true)]
async fn test_continuation_flag_set_after_suspension() {
    let executor = Executor::current();

    let (first, resumed) = Operation::run(&executor, "flags", |ctx| async move {
        let first = ctx.is_continuation();
        tokio::time::sleep(Duration::from_millis(10)).await;
        OpResult::Ok((first, ctx.is_continuation()))
    })
    .await
    .unwrap();

    assert!(!first, "first invocation must not be a continuation");
    assert!(resumed, "invocation after suspension must be a continuation");
}

#[tokio::test]
async fn test_state_after_completion() {
    let executor = Executor::current();
    let handle = Operation::start(
        &executor,
        "quick",
        |_ctx| async { OpResult::Ok(()) },
        |_result: OpResult<()>| {},
    );
    assert_eq!(handle.name(), "quick");
    assert!(!handle.trace_id().is_empty());

    executor.wait_idle().await;
    assert_eq!(handle.state(), OperationState::Destroyed);
    assert!(handle.state().is_terminal());
    assert_eq!(executor.stats().completed, 1);
}

#[tokio::test]
async fn test_transport_error_passes_through() {
    let executor = Executor::current();

    let result: Result<(), std::io::Error> = Operation::run(&executor, "io", |_ctx| async {
        Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "peer reset"))
    })
    .await;

    let err = result.unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::ConnectionReset);
    assert_eq!(err.to_string(), "peer reset");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_stats_consistent_under_load() {
    const WORKERS: u64 = 3;
    const PER_WORKER: u64 = 500;

    let executor = Executor::current();
    let done = Arc::new(AtomicBool::new(false));

    let observer = {
        let executor = executor.clone();
        let done = Arc::clone(&done);
        tokio::task::spawn_blocking(move || {
            let mut samples = 0u64;
            loop {
                let finished = done.load(Ordering::Acquire);
                let stats = executor.stats();
                assert!(
                    stats.completed + stats.abandoned <= stats.started,
                    "finished count ran ahead of started: {:?}",
                    stats
                );
                assert!(stats.live() <= stats.started);
                samples += 1;
                if finished {
                    break samples;
                }
            }
        })
    };

    let workers: Vec<_> = (0..WORKERS)
        .map(|_| {
            let executor = executor.clone();
            tokio::spawn(async move {
                for i in 0..PER_WORKER {
                    let value = Operation::run(&executor, "load", move |_ctx| async move {
                        tokio::task::yield_now().await;
                        OpResult::Ok(i)
                    })
                    .await
                    .unwrap();
                    assert_eq!(value, i);
                }
            })
        })
        .collect();

    for worker in workers {
        worker.await.unwrap();
    }
    executor.wait_idle().await;
    done.store(true, Ordering::Release);
    assert!(observer.await.unwrap() > 0);

    let stats = executor.stats();
    assert_eq!(stats.started, WORKERS * PER_WORKER);
    assert_eq!(stats.completed, WORKERS * PER_WORKER);
    assert_eq!(stats.live(), 0);
}
