//! Time service end to end: publisher and consumer over a real socket,
//! monotonicity of the shared estimate, recovery from garbled lines.

use amb_ingest::shutdown::shutdown_channel;
use amb_ingest::time::{DEFAULT_PUBLISH_INTERVAL, DecoderTime, TimeClient, TimeServer};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio::time::sleep;

async fn wait_until_set(clock: &DecoderTime) -> bool {
    for _ in 0..200 {
        if clock.is_set() {
            return true;
        }
        sleep(Duration::from_millis(25)).await;
    }
    false
}

#[tokio::test]
async fn published_estimate_reaches_consumer_and_advances() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");

    let (handle, shutdown) = shutdown_channel();

    let source = Arc::new(DecoderTime::new(1_000_000_000));
    let server = TimeServer::new(source.clone(), Duration::from_millis(50));
    let server_task = tokio::spawn(server.run(listener, shutdown.clone()));

    let mirrored = Arc::new(DecoderTime::unset());
    let client = TimeClient::new(addr.to_string(), mirrored.clone());
    let client_task = tokio::spawn(client.run(shutdown.clone()));

    assert!(wait_until_set(&mirrored).await, "no time line arrived");

    let first = mirrored.now_us();
    assert!(first >= 1_000_000_000);
    assert!(first < 1_000_000_000 + 60_000_000, "estimate ran wild: {}", first);

    // Reads advance monotonically between corrections
    sleep(Duration::from_millis(5)).await;
    let second = mirrored.now_us();
    assert!(second >= first);

    handle.trigger();
    server_task.await.expect("server joins");
    client_task.await.expect("client joins").expect("clean exit");
}

#[tokio::test]
async fn garbled_line_resets_estimate_and_reconnects() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");

    let (handle, shutdown) = shutdown_channel();

    // A misbehaving publisher: one garbage line, then a clean stream on
    // the reconnect
    let feeder = tokio::spawn(async move {
        let (mut first, _) = listener.accept().await.expect("first accept");
        first
            .write_all(b"this is not a timestamp\n")
            .await
            .expect("write garbage");
        drop(first);

        let (mut second, _) = listener.accept().await.expect("second accept");
        loop {
            if second.write_all(b"5000000000\n").await.is_err() {
                break;
            }
            sleep(DEFAULT_PUBLISH_INTERVAL).await;
        }
    });

    let mirrored = Arc::new(DecoderTime::unset());
    let client = TimeClient::new(addr.to_string(), mirrored.clone());
    let client_task = tokio::spawn(client.run(shutdown.clone()));

    assert!(wait_until_set(&mirrored).await, "never recovered from garbage");
    assert!(mirrored.now_us() >= 5_000_000_000);

    handle.trigger();
    client_task.await.expect("client joins").expect("clean exit");
    feeder.abort();
}
