//! Client duplex session
//!
//! One connected stream, two independent directions. The inbound task
//! owns the read half and feeds the chat log; the outbound task owns the
//! write half and sends what the user types. A dedicated input thread
//! owns the input source and blocks on it.
//!
//! The session ends when the outbound side exits (quit command or closed
//! input). The inbound task is then aborted with no drain.

use std::sync::{Arc, MutexGuard, PoisonError};
use std::thread;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::chat_log::{disconnect_notices, ChatLog, SharedChatLog};
use crate::config::ClientConfig;
use crate::error::AppError;
use crate::message::{encode_disconnect_frame, format_chat_line, is_quit_command};
use crate::terminal::{ChatDisplay, InputSource};

/// How a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The user entered the quit command
    Quit,
    /// The input device closed (Ctrl-C, Ctrl-D, end of file)
    InputClosed,
}

/// Open a connection and send the join payload
pub async fn connect(config: &ClientConfig) -> Result<TcpStream, AppError> {
    let mut stream = TcpStream::connect(config.server).await?;
    stream.write_all(config.name.as_bytes()).await?;
    info!("Connected to {} as '{}'", config.server, config.name);
    Ok(stream)
}

/// A connected client session
pub struct DuplexSession {
    stream: TcpStream,
    name: String,
    receive_cap: usize,
    log: SharedChatLog,
    display: Arc<dyn ChatDisplay>,
}

impl DuplexSession {
    /// Create a session over an already joined stream
    pub fn new(
        stream: TcpStream,
        config: &ClientConfig,
        log: SharedChatLog,
        display: Arc<dyn ChatDisplay>,
    ) -> Self {
        Self {
            stream,
            name: config.name.clone(),
            receive_cap: config.receive_cap(),
            log,
            display,
        }
    }

    /// Run both directions until the user quits
    ///
    /// `make_input` runs on the input thread; the source it builds is
    /// dropped there when the session's input ends.
    pub async fn run<F, S>(self, make_input: F) -> Result<SessionEnd, AppError>
    where
        F: FnOnce() -> Result<S, AppError> + Send + 'static,
        S: InputSource + 'static,
    {
        let (reader, writer) = self.stream.into_split();

        // Input thread -> outbound task
        let (line_tx, line_rx) = mpsc::unbounded_channel::<String>();
        let input_thread = thread::spawn(move || read_input(make_input, line_tx));

        let inbound = tokio::spawn(inbound_loop(
            reader,
            self.receive_cap,
            self.log,
            self.display,
        ));
        let outbound = tokio::spawn(outbound_loop(writer, self.name, line_rx));

        let end = outbound.await;
        inbound.abort();
        let end = end?;

        // The input thread stops right after handing over the last line
        match tokio::task::spawn_blocking(move || input_thread.join()).await? {
            Ok(Err(e)) => warn!("Input source failed: {}", e),
            Err(_) => warn!("Input thread panicked"),
            Ok(Ok(())) => {}
        }

        debug!("Session ended: {:?}", end);
        Ok(end)
    }
}

/// Pump lines from the input source into the outbound channel
///
/// Stops after the quit command, on closed input, or when the outbound
/// side is gone. The source is dropped on return.
fn read_input<F, S>(make_input: F, line_tx: mpsc::UnboundedSender<String>) -> Result<(), AppError>
where
    F: FnOnce() -> Result<S, AppError>,
    S: InputSource,
{
    let mut source = make_input()?;
    while let Some(line) = source.read_line()? {
        let quit = is_quit_command(&line);
        if line_tx.send(line).is_err() || quit {
            break;
        }
    }
    Ok(())
}

/// Outbound loop: format and send each input line
///
/// Send failures are logged and ignored so the user can still quit after
/// the server has gone away.
async fn outbound_loop(
    mut writer: OwnedWriteHalf,
    name: String,
    mut line_rx: mpsc::UnboundedReceiver<String>,
) -> SessionEnd {
    let end = loop {
        let Some(text) = line_rx.recv().await else {
            break SessionEnd::InputClosed;
        };
        if is_quit_command(&text) {
            break SessionEnd::Quit;
        }
        let line = format_chat_line(&name, &text);
        if let Err(e) = writer.write_all(line.as_bytes()).await {
            debug!("Failed to send message: {}", e);
        }
    };

    if let Err(e) = writer.write_all(&encode_disconnect_frame(&name)).await {
        debug!("Failed to send disconnect frame: {}", e);
    }
    end
}

/// Inbound loop: apply received payloads to the chat log
///
/// Ends on a zero-length receive after posting the disconnect notices,
/// refreshing the display once per notice.
async fn inbound_loop(
    mut reader: OwnedReadHalf,
    receive_cap: usize,
    log: SharedChatLog,
    display: Arc<dyn ChatDisplay>,
) {
    let mut buf = vec![0; receive_cap.max(1)];
    loop {
        let n = match reader.read(&mut buf).await {
            Ok(n) => n,
            Err(e) => {
                debug!("Read error, treating as disconnect: {}", e);
                0
            }
        };

        if n == 0 {
            let mut chat_log = lock(&log);
            for notice in disconnect_notices() {
                chat_log.push_notice(&notice);
                display.refresh(&chat_log);
            }
            info!("Disconnected from server");
            return;
        }

        {
            let mut chat_log = lock(&log);
            chat_log.push(String::from_utf8_lossy(&buf[..n]).into_owned());
            display.refresh(&chat_log);
        }
    }
}

fn lock(log: &SharedChatLog) -> MutexGuard<'_, ChatLog> {
    log.lock().unwrap_or_else(PoisonError::into_inner)
}
