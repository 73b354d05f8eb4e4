//! Integration tests for the acknowledged command link.
//!
//! These tests drive `VehicleLink` through its public API against the
//! simulated vehicle and, in one case, a fake serial bridge on a local TCP
//! socket.  They verify:
//!
//! - Redundant directional commands never reach the wire.
//! - A command that is never acknowledged fails after the ack window and
//!   leaves the recorded direction unchanged.
//! - Only one command is in flight at a time; a second caller waits for the
//!   first ack or gives up after the lock window.
//! - Sensor bytes read by the background listener reach subscribers.
//! - A dropped connection is noticed and later commands are refused.
//!
//! # The exchange (for beginners)
//!
//! ```text
//! Host                               Vehicle
//! ────                               ───────
//! connect                   ───────►
//!                           ◄─────── "BoxCar ready\r\n"      (greeting)
//! 0x01 (forward)            ───────►
//!                           ◄─────── 0x01                     (ack)
//!                           ◄─────── 0x02                     (left IR sensor)
//! ```
//!
//! Timing tests use `start_paused = true`: tokio's clock only moves when
//! every task is idle, so a 10 s ack window elapses instantly.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::time::{self, Instant};

use boxcar_controller::application::transport::TransportError;
use boxcar_controller::application::vehicle_link::{LinkError, LinkTiming, VehicleLink};
use boxcar_controller::infrastructure::transport::{
    AckPolicy, SimulatedVehicle, SimulatorHandle, TcpTransport,
};
use boxcar_core::{Command, Direction, SensorEvent};

// ── Helpers ───────────────────────────────────────────────────────────────────

async fn connected(policy: AckPolicy, timing: LinkTiming) -> (Arc<VehicleLink>, SimulatorHandle) {
    let (vehicle, sim) = SimulatedVehicle::with_policy(policy);
    let link = Arc::new(VehicleLink::new(vehicle, timing));
    link.connect().await.expect("simulated vehicle connects");
    (link, sim)
}

/// Sleeps in small steps until `cond` holds, failing after 30 s of (virtual)
/// time.
async fn eventually(what: &str, mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(30);
    while !cond() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        time::sleep(Duration::from_millis(5)).await;
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_direction_changes_are_written_once_each() {
    // Arrange
    let (link, sim) = connected(AckPolicy::Always, LinkTiming::default()).await;

    // Act
    link.move_forwards().await.unwrap();
    link.move_forwards().await.unwrap();
    link.turn_left().await.unwrap();
    link.turn_left().await.unwrap();
    link.stop_moving().await.unwrap();
    link.stop_moving().await.unwrap();

    // Assert
    assert_eq!(
        sim.commands(),
        vec![Command::Forward, Command::Left, Command::Stop]
    );
    assert!(link.is_stopped_moving());
    link.disconnect().await.unwrap();
}

#[tokio::test]
async fn test_speed_is_sent_as_two_bytes() {
    let (link, sim) = connected(AckPolicy::Always, LinkTiming::default()).await;

    link.change_speed(180).await.unwrap();

    assert_eq!(sim.raw_writes(), vec![vec![0x05, 180]]);
    assert_eq!(sim.speed(), Some(180));
    link.disconnect().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_unacknowledged_command_times_out() {
    // Arrange
    let (link, sim) = connected(AckPolicy::Never, LinkTiming::default()).await;
    let started = Instant::now();

    // Act
    let err = link.move_forwards().await.unwrap_err();

    // Assert
    assert!(
        matches!(err, LinkError::AckTimeout(window) if window == Duration::from_secs(10)),
        "{err:?}"
    );
    assert!(started.elapsed() >= Duration::from_secs(10));
    assert_eq!(sim.commands(), vec![Command::Forward], "the byte was written");
    assert_eq!(link.direction(), Direction::Stopped, "direction not updated");
    assert!(err.is_protocol_fault());
    assert!(link.is_connected(), "a timeout does not close the link");
}

#[tokio::test]
async fn test_reply_that_is_not_an_ack_is_a_mismatch() {
    let (link, _sim) = connected(AckPolicy::Garbage, LinkTiming::default()).await;

    let err = link.turn_right().await.unwrap_err();

    assert!(matches!(err, LinkError::AckMismatch), "{err:?}");
    assert_eq!(link.direction(), Direction::Stopped);
}

#[tokio::test(start_paused = true)]
async fn test_second_command_waits_for_first_ack() {
    // Arrange – the vehicle only answers when told to
    let (link, sim) = connected(AckPolicy::Never, LinkTiming::default()).await;

    // Act – two commands race for the link
    let first = tokio::spawn({
        let link = Arc::clone(&link);
        async move { link.move_forwards().await }
    });
    eventually("first write", || sim.commands().len() == 1).await;
    let second = tokio::spawn({
        let link = Arc::clone(&link);
        async move { link.turn_left().await }
    });
    time::sleep(Duration::from_millis(500)).await;

    // Assert – nothing else on the wire until the first ack
    assert_eq!(sim.commands(), vec![Command::Forward]);

    sim.ack();
    first.await.unwrap().unwrap();
    eventually("second write", || sim.commands().len() == 2).await;
    assert_eq!(link.direction(), Direction::Forward);

    sim.ack();
    second.await.unwrap().unwrap();
    assert_eq!(sim.commands(), vec![Command::Forward, Command::Left]);
    assert_eq!(link.direction(), Direction::Left);
}

#[tokio::test(start_paused = true)]
async fn test_caller_gives_up_after_lock_window() {
    // Arrange
    let timing = LinkTiming {
        lock_timeout: Duration::from_millis(50),
        ..LinkTiming::default()
    };
    let (link, sim) = connected(AckPolicy::Never, timing).await;
    let holder = tokio::spawn({
        let link = Arc::clone(&link);
        async move { link.move_forwards().await }
    });
    eventually("first write", || sim.commands().len() == 1).await;

    // Act
    let err = link.turn_left().await.unwrap_err();

    // Assert
    assert!(
        matches!(err, LinkError::LockTimeout(window) if window == Duration::from_millis(50)),
        "{err:?}"
    );
    sim.ack();
    holder.await.unwrap().unwrap();
    assert_eq!(sim.commands(), vec![Command::Forward]);
}

#[tokio::test]
async fn test_listener_publishes_sensor_events() {
    // Arrange
    let (link, sim) = connected(AckPolicy::Always, LinkTiming::default()).await;
    let mut sensors = link.subscribe_sensors();

    // Act
    sim.trigger(SensorEvent::RightSensorTriggered);
    sim.trigger(SensorEvent::LeftSensorTriggered);

    // Assert
    let first = time::timeout(Duration::from_secs(2), sensors.recv()).await;
    let second = time::timeout(Duration::from_secs(2), sensors.recv()).await;
    assert_eq!(first.unwrap().unwrap(), SensorEvent::RightSensorTriggered);
    assert_eq!(second.unwrap().unwrap(), SensorEvent::LeftSensorTriggered);
    link.disconnect().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_dropped_link_refuses_further_commands() {
    // Arrange
    let (link, sim) = connected(AckPolicy::Always, LinkTiming::default()).await;
    link.move_forwards().await.unwrap();

    // Act
    sim.drop_link();
    eventually("listener notices the drop", || !link.is_connected()).await;
    let err = link.turn_left().await.unwrap_err();

    // Assert
    assert!(
        matches!(err, LinkError::Transport(TransportError::NotConnected)),
        "{err:?}"
    );
    assert_eq!(link.direction(), Direction::Forward);
    link.disconnect().await.unwrap();
}

#[tokio::test]
async fn test_unreachable_vehicle_fails_to_connect() {
    let (vehicle, sim) = SimulatedVehicle::unreachable();
    let link = VehicleLink::new(vehicle, LinkTiming::default());

    let err = link.connect().await.unwrap_err();

    assert!(
        matches!(err, LinkError::Transport(TransportError::LinkNotFound(_))),
        "{err:?}"
    );
    assert!(!link.is_connected());
    assert_eq!(sim.connect_count(), 0);
}

#[tokio::test]
async fn test_link_over_tcp_bridge() {
    // Arrange – a fake serial bridge that greets, then acks every byte it
    // reads and reports one left-sensor hit after the first command
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();
    let bridge = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        socket.write_all(b"BoxCar ready\r\n").await.unwrap();
        let mut received = Vec::new();
        let mut buf = [0u8; 16];
        loop {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            received.extend_from_slice(&buf[..n]);
            socket.write_all(&[0x01]).await.unwrap();
            if received.len() == 1 {
                time::sleep(Duration::from_millis(20)).await;
                socket.write_all(&[0x02]).await.unwrap();
            }
        }
        received
    });
    let link = VehicleLink::new(TcpTransport::new(address), LinkTiming::default());
    let mut sensors = link.subscribe_sensors();

    // Act
    link.connect().await.unwrap();
    link.move_forwards().await.unwrap();
    let event = time::timeout(Duration::from_secs(2), sensors.recv()).await;
    link.stop_moving().await.unwrap();
    link.disconnect().await.unwrap();

    // Assert
    assert_eq!(event.unwrap().unwrap(), SensorEvent::LeftSensorTriggered);
    assert_eq!(bridge.await.unwrap(), vec![0x01, 0x00]);
}
