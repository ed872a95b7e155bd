/*!
 * Phaser Liveness Tests
 * The wait resumes exactly when the last branch retires
 */

use opflow::{Executor, Phaser};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::time::Duration;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn test_wait_pending_until_all_branches(n in 1usize..32, order in any::<u64>()) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .start_paused(true)
            .build()
            .unwrap();

        rt.block_on(async {
            let phaser = Phaser::new();
            let mut branches: Vec<_> = (0..n).map(|_| phaser.discard()).collect();
            assert_eq!(phaser.in_flight(), n);

            let waiter = {
                let phaser = phaser.clone();
                tokio::spawn(async move { phaser.async_wait().await })
            };

            // Retire all but one, in a scrambled order
            let keep = (order as usize) % n;
            let last = branches.swap_remove(keep);
            for (i, branch) in branches.into_iter().enumerate() {
                if i % 2 == 0 {
                    branch.complete(i);
                } else {
                    drop(branch);
                }
            }

            tokio::time::sleep(Duration::from_millis(10)).await;
            assert!(!waiter.is_finished(), "wait resumed with one branch outstanding");
            assert_eq!(phaser.in_flight(), 1);

            last.complete(());
            waiter.await.unwrap();
            assert!(phaser.is_idle());
        });
    }
}

#[tokio::test]
async fn test_many_waiters_resume_together() {
    let phaser = Phaser::new();
    let branch = phaser.discard();

    let waiters: Vec<_> = (0..4)
        .map(|_| {
            let phaser = phaser.clone();
            tokio::spawn(async move { phaser.async_wait().await })
        })
        .collect();
    tokio::task::yield_now().await;

    branch.complete(());
    for waiter in waiters {
        waiter.await.unwrap();
    }
}

#[tokio::test]
async fn test_branches_from_spawned_tasks() {
    let executor = Executor::current();
    let phaser = Phaser::with_executor(executor.clone());

    for delay in [3u64, 1, 2] {
        let branch = phaser.discard();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(delay)).await;
            branch.complete(delay);
        });
    }
    assert_eq!(executor.outstanding_work(), 3);

    phaser.async_wait().await;
    assert!(phaser.is_idle());
    executor.wait_idle().await;
}

#[tokio::test]
async fn test_phaser_reusable_after_idle() {
    let phaser = Phaser::new();

    phaser.track(async {}).await;
    phaser.async_wait().await;

    let branch = phaser.discard();
    assert!(!phaser.is_idle());
    drop(branch);
    phaser.async_wait().await;
}
