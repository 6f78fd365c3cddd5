use std::sync::mpsc;
use std::time::{Duration, Instant};

use numclient::{
    setup_local_tracing, CancellationWatcher, ChannelSource, Client, ClientConfig, Connection,
    ConnectionEvent, ConnectionState, Identity, Shutdown, WatchOutcome,
};
use rstest::{fixture, rstest};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::broadcast;

const GRACE_MS: u64 = 60;

#[fixture]
#[once]
fn setup() {
    setup_local_tracing().expect("failed to setup tracing");
}

fn test_config(port: u16) -> ClientConfig {
    let mut config = ClientConfig::default();
    config.network.port = port;
    config.timing.number_interval_ms = 10;
    config.timing.watcher_poll_interval_ms = 5;
    config.timing.stop_grace_ms = GRACE_MS;
    config
}

/// What the fake server does once it has seen `after` numbers.
enum Finish {
    ServerStop { after: usize },
    OperatorCancel { after: usize, trigger: mpsc::Sender<()> },
}

/// Accepts one client, answers every line and returns all received lines
/// once the client hangs up.
async fn serve(listener: TcpListener, finish: Finish) -> Vec<String> {
    let (socket, _) = listener.accept().await.unwrap();
    let (read_half, mut write_half) = socket.into_split();
    let mut lines = BufReader::new(read_half).lines();
    let mut received = Vec::new();
    let mut nums = 0;

    while let Ok(Some(line)) = lines.next_line().await {
        received.push(line.clone());
        let reply = if line.starts_with("login ") {
            "login ok\n".to_string()
        } else if let Some(value) = line.strip_prefix("num ") {
            nums += 1;
            match &finish {
                Finish::ServerStop { after } if nums == *after => {
                    "num client_list_stopped\n".to_string()
                }
                Finish::OperatorCancel { after, trigger } if nums == *after => {
                    // a second keypress is never forwarded by the watcher
                    let _ = trigger.send(());
                    let _ = trigger.send(());
                    format!("num {}\n", value)
                }
                _ => format!("num {}\n", value),
            }
        } else {
            continue;
        };
        if write_half.write_all(reply.as_bytes()).await.is_err() {
            break;
        }
    }
    received
}

fn count(lines: &[String], prefix: &str) -> usize {
    lines.iter().filter(|l| l.starts_with(prefix)).count()
}

#[rstest]
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn operator_cancel_walks_every_state_once(_setup: ()) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = listener.local_addr().unwrap();
    let (trigger, source) = ChannelSource::pair();
    let server = tokio::spawn(serve(listener, Finish::OperatorCancel { after: 3, trigger }));

    let (notify, cancel_rx) = broadcast::channel(1);
    let mut connection = Connection::new(
        Identity::new("abc12").unwrap(),
        endpoint,
        &test_config(endpoint.port()),
        Shutdown::new(cancel_rx),
    );
    let mut events = connection.subscribe();
    let watcher = CancellationWatcher::spawn(source, notify, Duration::from_millis(5)).unwrap();

    let state = connection.run().await;
    assert_eq!(state, ConnectionState::Stopped);
    drop(connection);
    assert_eq!(watcher.join().unwrap(), WatchOutcome::Fired);

    let lines = server.await.unwrap();
    assert_eq!(lines[0], "login abc12");
    assert!(count(&lines, "num ") >= 3);
    assert_eq!(count(&lines, "stop"), 1);
    assert_eq!(lines.last().unwrap(), "stop");

    let mut transitions = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let ConnectionEvent::StateChanged { from, to } = event {
            assert!(from < to);
            transitions.push(to);
        }
    }
    assert_eq!(
        transitions,
        vec![
            ConnectionState::LoggingIn,
            ConnectionState::Active,
            ConnectionState::Stopping,
            ConnectionState::Stopped,
        ]
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn server_stop_ends_exchange_after_grace(_setup: ()) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let server = tokio::spawn(serve(listener, Finish::ServerStop { after: 2 }));

    // the trigger is kept alive but never fired
    let (_trigger, source) = ChannelSource::pair();
    let client = Client::new(test_config(port), Identity::generate())
        .handle_ctrl_c(false)
        .with_seed(3);

    let started = Instant::now();
    let state = client.run(source).await.unwrap();
    assert_eq!(state, ConnectionState::Stopped);
    assert!(started.elapsed() >= Duration::from_millis(GRACE_MS));

    let lines = server.await.unwrap();
    assert_eq!(lines[0], format!("login {}", client.identity()));
    assert_eq!(count(&lines, "num "), 2);
    assert_eq!(count(&lines, "stop"), 1);
    assert_eq!(lines.last().unwrap(), "stop");
}

#[rstest]
#[tokio::test]
async fn refused_connection_stops_without_retry(_setup: ()) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let (_trigger, source) = ChannelSource::pair();
    let client = Client::new(test_config(port), Identity::generate()).handle_ctrl_c(false);
    let state = client.run(source).await.unwrap();
    assert_eq!(state, ConnectionState::Stopped);
}

#[rstest]
#[tokio::test]
async fn numbers_sent_by_client_are_in_range(_setup: ()) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let server = tokio::spawn(serve(listener, Finish::ServerStop { after: 20 }));

    let (_trigger, source) = ChannelSource::pair();
    let mut config = test_config(port);
    config.timing.number_interval_ms = 1;
    let client = Client::new(config, Identity::generate()).handle_ctrl_c(false);
    client.run(source).await.unwrap();

    let lines = server.await.unwrap();
    let values: Vec<u32> = lines
        .iter()
        .filter_map(|l| l.strip_prefix("num "))
        .map(|v| v.parse().unwrap())
        .collect();
    assert_eq!(values.len(), 20);
    assert!(values.iter().all(|v| *v < 1024));
}
