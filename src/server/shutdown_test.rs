use super::*;
use std::time::Duration;

#[tokio::test]
async fn wait_returns_immediately_once_triggered() {
    let (controller, mut signal) = shutdown_channel();
    controller.trigger();

    tokio::time::timeout(Duration::from_millis(50), signal.wait())
        .await
        .expect("wait() should resolve once triggered");
    assert!(signal.is_shutting_down());
}

#[tokio::test]
async fn wait_blocks_until_triggered() {
    let (controller, mut signal) = shutdown_channel();
    assert!(!signal.is_shutting_down());

    let waiter = tokio::spawn(async move {
        signal.wait().await;
        signal.is_shutting_down()
    });

    tokio::time::sleep(Duration::from_millis(10)).await;
    controller.trigger();

    let was_shutting_down = tokio::time::timeout(Duration::from_millis(50), waiter)
        .await
        .expect("waiter should finish")
        .expect("waiter task should not panic");
    assert!(was_shutting_down);
}

#[tokio::test]
async fn clones_share_the_same_signal() {
    let (controller, signal) = shutdown_channel();
    let mut clone_a = signal.clone();
    let mut clone_b = signal;

    controller.trigger();

    tokio::time::timeout(Duration::from_millis(50), clone_a.wait())
        .await
        .expect("clone_a should see the trigger");
    tokio::time::timeout(Duration::from_millis(50), clone_b.wait())
        .await
        .expect("clone_b should see the trigger");
}

#[tokio::test]
async fn dropping_the_controller_without_triggering_still_unblocks_waiters() {
    let (controller, mut signal) = shutdown_channel();
    drop(controller);

    tokio::time::timeout(Duration::from_millis(50), signal.wait())
        .await
        .expect("wait() should not hang when the controller is dropped");
}
