use std::io;
use std::process::{ExitStatus, Stdio};

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time::{Instant, timeout_at};
use tracing::debug;

use super::{EngineError, EngineOutput, EngineRunner, ExitState, Invocation};

/// Launches engines as child processes with `tokio::process`.
///
/// stdout and stderr are read line by line into one buffer, so the output of
/// a killed engine is still available up to the moment it was killed.
pub struct ProcessRunner;

#[async_trait]
impl EngineRunner for ProcessRunner {
    async fn run(&self, invocation: Invocation) -> Result<EngineOutput, EngineError> {
        debug!("Running {invocation}");
        let program = invocation.program.clone();

        let stdin = match invocation.stdin {
            Some(_) => Stdio::piped(),
            None => Stdio::null(),
        };
        let mut child: Child = Command::new(&invocation.program)
            .args(&invocation.args)
            .stdin(stdin)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| EngineError::Spawn {
                program: program.clone(),
                source,
            })?;

        if let (Some(input), Some(mut pipe)) = (invocation.stdin, child.stdin.take()) {
            tokio::spawn(async move {
                if let Err(e) = pipe.write_all(input.as_bytes()).await {
                    debug!("Engine stopped reading its input: {e}");
                }
            });
        }

        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        if let Some(stdout) = child.stdout.take() {
            spawn_line_reader(stdout, tx.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_line_reader(stderr, tx);
        }

        let mut lines: Vec<String> = Vec::new();
        let exit = match invocation.timeout {
            Some(limit) => {
                let deadline = Instant::now() + limit;
                let outcome = timeout_at(deadline, drain_and_wait(&mut rx, &mut lines, &mut child)).await;
                match outcome {
                    Ok(status) => exit_state(status, &program)?,
                    Err(_elapsed) => {
                        debug!("{program} exceeded {limit:?}, killing it");
                        let _ = child.start_kill();
                        let _ = child.wait().await;
                        while let Ok(line) = rx.try_recv() {
                            lines.push(line);
                        }
                        ExitState::TimedOut
                    }
                }
            }
            None => exit_state(drain_and_wait(&mut rx, &mut lines, &mut child).await, &program)?,
        };

        debug!("{program} finished with {exit} after {} line(s)", lines.len());
        Ok(EngineOutput::new(lines.join("\n"), exit))
    }
}

async fn drain_and_wait(
    rx: &mut UnboundedReceiver<String>,
    lines: &mut Vec<String>,
    child: &mut Child,
) -> io::Result<ExitStatus> {
    while let Some(line) = rx.recv().await {
        lines.push(line);
    }
    child.wait().await
}

fn exit_state(status: io::Result<ExitStatus>, program: &str) -> Result<ExitState, EngineError> {
    match status {
        Ok(status) if status.success() => Ok(ExitState::Success),
        Ok(status) => Ok(ExitState::Failed(status.code())),
        Err(source) => Err(EngineError::Io {
            program: program.to_string(),
            source,
        }),
    }
}

fn spawn_line_reader<R>(reader: R, tx: UnboundedSender<String>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut buf: Vec<u8> = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf)
                        .trim_end_matches(|c: char| c == '\n' || c == '\r')
                        .to_string();
                    if tx.send(line).is_err() {
                        break;
                    }
                }
            }
        }
    });
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
