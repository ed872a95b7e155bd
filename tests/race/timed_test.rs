/*!
 * Timer Race Tests
 * Deadline-bounded operations on a cancellable resource
 */

use mockall::mock;
use opflow::{timed, timed_until, Cancel, CancelToken, OpError, OpResult};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

mock! {
    Resource {}

    impl Cancel for Resource {
        fn cancel(&self);
    }
}

/// Resource whose cancel is observed by the mock and forwarded to a token
fn cancelling_resource(token: &CancelToken) -> MockResource {
    let token = token.clone();
    let mut resource = MockResource::new();
    resource.expect_cancel().times(1).returning(move || token.cancel());
    resource
}

#[tokio::test(start_paused = true)]
async fn test_never_completing_op_times_out_at_deadline() {
    let token = CancelToken::new();
    let resource = cancelling_resource(&token);
    let deadline = Duration::from_millis(250);

    let start = Instant::now();
    let result: OpResult<()> = timed(&resource, deadline, token.run(std::future::pending())).await;

    assert_eq!(start.elapsed(), deadline);
    assert!(matches!(
        result,
        Err(OpError::Timeout { timeout_ms: 250, .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn test_op_first_never_cancels() {
    let mut resource = MockResource::new();
    resource.expect_cancel().times(0);

    let value = timed(&resource, Duration::from_millis(100), async {
        tokio::time::sleep(Duration::from_millis(99)).await;
        OpResult::Ok("in time")
    })
    .await
    .unwrap();

    assert_eq!(value, "in time");
}

#[tokio::test(start_paused = true)]
async fn test_drains_op_before_reporting() {
    let token = CancelToken::new();
    let resource = cancelling_resource(&token);
    let drained = Arc::new(std::sync::atomic::AtomicBool::new(false));

    let flag = drained.clone();
    let op = async {
        let outcome: OpResult<u8> = token
            .run(async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(1)
            })
            .await;
        // Cleanup after the abort still runs before the race returns
        tokio::time::sleep(Duration::from_millis(5)).await;
        flag.store(true, std::sync::atomic::Ordering::SeqCst);
        outcome
    };

    let start = Instant::now();
    let result = timed(&resource, Duration::from_millis(20), op).await;

    assert!(drained.load(std::sync::atomic::Ordering::SeqCst));
    assert_eq!(start.elapsed(), Duration::from_millis(25));
    // Timeout wins over the abort the op reported
    assert!(result.unwrap_err().is_timeout());
}

#[tokio::test(start_paused = true)]
async fn test_op_success_after_cancel_still_times_out() {
    let mut resource = MockResource::new();
    resource.expect_cancel().times(1).return_const(());

    // Ignores cancellation and finishes anyway
    let result = timed(&resource, Duration::from_millis(10), async {
        tokio::time::sleep(Duration::from_millis(30)).await;
        OpResult::Ok(7)
    })
    .await;

    assert!(result.unwrap_err().is_timeout());
}

#[tokio::test(start_paused = true)]
async fn test_simultaneous_finish_counts_as_timeout() {
    let deadline = Duration::from_millis(80);
    let mut resource = MockResource::new();
    resource.expect_cancel().times(1).return_const(());

    // Op and timer become ready on the same tick
    let start = Instant::now();
    let result = timed(&resource, deadline, async {
        tokio::time::sleep(deadline).await;
        OpResult::Ok("just in time")
    })
    .await;

    assert_eq!(start.elapsed(), deadline);
    assert!(matches!(
        result,
        Err(OpError::Timeout { timeout_ms: 80, .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn test_expired_deadline_returns_promptly() {
    let token = CancelToken::new();
    let resource = cancelling_resource(&token);

    let result: OpResult<()> = tokio::time::timeout(
        Duration::from_secs(3600),
        timed(&resource, Duration::ZERO, token.run(std::future::pending())),
    )
    .await
    .expect("expired deadline must not wait on the operation forever");

    assert!(result.unwrap_err().is_timeout());
    assert_eq!(token.cancellations(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_absolute_deadline() {
    let token = CancelToken::new();
    let resource = cancelling_resource(&token);
    let at = Instant::now() + Duration::from_millis(40);

    let result: OpResult<()> = timed_until(&resource, at, token.run(std::future::pending())).await;

    assert_eq!(Instant::now(), at);
    assert!(result.unwrap_err().is_timeout());
    assert_eq!(token.cancellations(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_is_coarse() {
    let token = CancelToken::new();
    let resource = cancelling_resource(&token);

    // A sibling operation on the same resource is cancelled too
    let sibling = {
        let token = token.clone();
        tokio::spawn(async move {
            token
                .run(async {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    OpResult::Ok(())
                })
                .await
        })
    };
    tokio::task::yield_now().await;

    let _: OpResult<()> = timed(&resource, Duration::from_millis(10), token.run(std::future::pending())).await;

    assert!(matches!(sibling.await.unwrap(), Err(OpError::Aborted)));
}
