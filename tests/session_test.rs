//! Integration tests for the client duplex session against a scripted peer
//! and against a real server.

use std::net::SocketAddr;
use std::sync::{mpsc as std_mpsc, Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio::time::timeout;

use lanchat::{
    connect, AppError, ChatDisplay, ChatLog, ClientConfig, DuplexSession, InputSource, Server,
    ServerConfig, SessionEnd, SharedChatLog, ShutdownReason,
};

const WAIT: Duration = Duration::from_secs(3);

/// Input source fed from the test body
struct ScriptedInput(std_mpsc::Receiver<String>);

impl InputSource for ScriptedInput {
    fn read_line(&mut self) -> Result<Option<String>, AppError> {
        Ok(self.0.recv().ok())
    }
}

/// Display that records the newest line at every refresh
#[derive(Default)]
struct RecordingDisplay {
    rendered: Mutex<Vec<String>>,
}

impl RecordingDisplay {
    fn rendered(&self) -> Vec<String> {
        self.rendered.lock().unwrap().clone()
    }
}

impl ChatDisplay for RecordingDisplay {
    fn refresh(&self, log: &ChatLog) {
        if let Some(line) = log.newest() {
            self.rendered.lock().unwrap().push(line.to_string());
        }
    }
}

struct Client {
    input: std_mpsc::Sender<String>,
    log: SharedChatLog,
    display: Arc<RecordingDisplay>,
    session: JoinHandle<Result<SessionEnd, AppError>>,
}

impl Client {
    async fn start(server: SocketAddr, name: &str) -> Self {
        let config = ClientConfig::new(server, name).with_display(80, 12);
        let stream = connect(&config).await.unwrap();
        let log = ChatLog::shared(config.log_capacity());
        let display = Arc::new(RecordingDisplay::default());
        let session = DuplexSession::new(stream, &config, log.clone(), display.clone());

        let (input, input_rx) = std_mpsc::channel();
        let session = tokio::spawn(session.run(move || Ok(ScriptedInput(input_rx))));

        Self {
            input,
            log,
            display,
            session,
        }
    }

    fn type_line(&self, line: &str) {
        self.input.send(line.to_string()).unwrap();
    }

    fn lines(&self) -> Vec<String> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .map(str::to_string)
            .collect()
    }

    /// Poll the chat log until `check` holds
    async fn wait_for_log<F>(&self, check: F)
    where
        F: Fn(&[String]) -> bool,
    {
        timeout(WAIT, async {
            while !check(&self.lines()) {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("chat log never matched: {:?}", self.lines()));
    }

    async fn finish(self) -> SessionEnd {
        timeout(WAIT, self.session)
            .await
            .expect("session did not end")
            .unwrap()
            .unwrap()
    }
}

/// Read from a scripted server connection until `text` has arrived
async fn read_until(stream: &mut TcpStream, received: &mut String, text: &str) {
    timeout(WAIT, async {
        while !received.contains(text) {
            let mut buf = [0u8; 256];
            let n = stream.read(&mut buf).await.unwrap();
            assert!(n > 0, "client closed before {:?} arrived", text);
            received.push_str(&String::from_utf8_lossy(&buf[..n]));
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {:?}, got {:?}", text, received));
}

#[tokio::test]
async fn test_session_sends_formatted_lines_and_quits_with_frame() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let client = Client::start(addr, "Ann").await;
    let (mut peer, _) = listener.accept().await.unwrap();
    let mut received = String::new();
    read_until(&mut peer, &mut received, "Ann").await;

    client.type_line("  hello there  ");
    read_until(&mut peer, &mut received, "Ann: hello there").await;

    peer.write_all(b"Bob: hi Ann").await.unwrap();
    client
        .wait_for_log(|lines| lines.first().map(String::as_str) == Some("Bob: hi Ann"))
        .await;

    client.type_line("/q");
    read_until(&mut peer, &mut received, "-~~Ann~~-").await;
    assert!(!received.contains("Ann: /q"));

    assert_eq!(client.finish().await, SessionEnd::Quit);
}

#[tokio::test]
async fn test_remote_close_posts_two_notices_and_keeps_outbound() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let client = Client::start(addr, "Ann").await;
    let (mut peer, _) = listener.accept().await.unwrap();
    let mut received = String::new();
    read_until(&mut peer, &mut received, "Ann").await;

    peer.write_all(b"SERVER: Ann has joined the chat!").await.unwrap();
    client.wait_for_log(|lines| lines.len() == 1).await;

    // Server goes away without a disconnect frame
    drop(peer);

    client.wait_for_log(|lines| lines.len() == 3).await;
    assert_eq!(
        client.lines(),
        vec![
            "~!~Enter '/q' to quit.",
            "~!~You have been disconnected from the server...",
            "SERVER: Ann has joined the chat!",
        ]
    );
    // Each notice is rendered on its own refresh, oldest first
    assert_eq!(
        client.display.rendered(),
        vec![
            "SERVER: Ann has joined the chat!",
            "~!~You have been disconnected from the server...",
            "~!~Enter '/q' to quit.",
        ]
    );

    // Typing still works and the quit command still ends the session
    client.type_line("anyone?");
    client.type_line("/q");
    assert_eq!(client.finish().await, SessionEnd::Quit);
}

#[tokio::test]
async fn test_closed_input_still_sends_disconnect_frame() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let client = Client::start(addr, "Bob").await;
    let (mut peer, _) = listener.accept().await.unwrap();
    let mut received = String::new();
    read_until(&mut peer, &mut received, "Bob").await;

    let Client {
        input, session, ..
    } = client;
    drop(input);

    read_until(&mut peer, &mut received, "-~~Bob~~-").await;
    let end = timeout(WAIT, session).await.unwrap().unwrap().unwrap();
    assert_eq!(end, SessionEnd::InputClosed);
}

#[tokio::test]
async fn test_owner_session_quit_stops_non_persistent_server() {
    let config = ServerConfig::default()
        .with_addr("127.0.0.1:0".parse().unwrap())
        .with_poll_interval(Duration::from_millis(20));
    let server = Server::bind(config).unwrap();
    let addr = server.local_addr().unwrap();
    let server = tokio::spawn(server.run());

    let ann = Client::start(addr, "Ann").await;
    ann.wait_for_log(|lines| lines.iter().any(|l| l == "SERVER: Ann has joined the chat!"))
        .await;

    let bob = Client::start(addr, "Bob").await;
    bob.wait_for_log(|lines| lines.iter().any(|l| l == "SERVER: Bob has joined the chat!"))
        .await;
    ann.wait_for_log(|lines| lines.iter().any(|l| l.contains("Bob has joined")))
        .await;

    bob.type_line("hi");
    ann.wait_for_log(|lines| lines.iter().any(|l| l.contains("Bob: hi")))
        .await;

    ann.type_line("/q");
    assert_eq!(ann.finish().await, SessionEnd::Quit);

    bob.wait_for_log(|lines| lines.iter().any(|l| l.contains("Good-bye!")))
        .await;
    bob.wait_for_log(|lines| lines.first().map(String::as_str) == Some("~!~Enter '/q' to quit."))
        .await;

    let reason = timeout(WAIT, server).await.unwrap().unwrap().unwrap();
    assert_eq!(reason, ShutdownReason::OwnerLeft);

    bob.type_line("/q");
    assert_eq!(bob.finish().await, SessionEnd::Quit);
}
