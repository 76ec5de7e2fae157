//! Process runner - launches one algorithm invocation under a deadline.

use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::algorithm::SamplingAlgorithm;
use crate::error::ProcessError;
use crate::model::Cnf;

use super::result::RunResult;

/// How long the stream readers may take to hit EOF once the child is gone.
const DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Runs algorithms as child processes, one at a time.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    timeout: Option<Duration>,
}

impl ProcessRunner {
    /// Creates a runner. `None` waits without a deadline.
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Runs `algorithm` once against `variant`.
    ///
    /// Never fails: launch, exit and parse problems are folded into the
    /// returned [`RunResult`]. `post_process` runs on every path.
    pub async fn run(&self, algorithm: &mut dyn SamplingAlgorithm, variant: &Cnf) -> RunResult {
        settle().await;

        let mut result = match algorithm.pre_process(variant).await {
            Ok(()) => self.execute(algorithm).await,
            Err(e) => {
                warn!("{}: pre-launch setup failed: {}", algorithm.name(), e);
                RunResult::not_launched(e.to_string())
            }
        };

        if result.runtime_millis >= 0 {
            collect_outputs(algorithm, variant, &mut result).await;
        }

        if let Err(e) = algorithm.post_process().await {
            warn!("{}: failed to remove run outputs: {}", algorithm.name(), e);
        }
        result
    }

    async fn execute(&self, algorithm: &mut dyn SamplingAlgorithm) -> RunResult {
        let command = algorithm.command_elements().to_vec();
        let Some((program, args)) = command.split_first() else {
            warn!("{}: {}", algorithm.name(), ProcessError::EmptyCommand);
            return RunResult::not_launched(ProcessError::EmptyCommand.to_string());
        };

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        let start = Instant::now();
        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(source) => {
                let e = ProcessError::Spawn {
                    program: program.clone(),
                    source,
                };
                warn!("{}: {}", algorithm.name(), e);
                return RunResult::not_launched(e.to_string());
            }
        };
        let pid = child.id();
        debug!("Spawned {} (pid {:?})", program, pid);

        let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
            kill_group(&mut child, pid);
            let _ = child.wait().await;
            return RunResult::not_launched("output pipes were not captured");
        };

        // Both readers start before the wait so full pipes cannot stall the child
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let (err_tx, mut err_rx) = mpsc::unbounded_channel::<String>();
        let stdout_task = tokio::spawn(forward_lines(stdout, tx, Stream::Stdout));
        let stderr_task = tokio::spawn(forward_lines(stderr, err_tx, Stream::Stderr));

        let deadline = async {
            match self.timeout {
                Some(timeout) => tokio::time::sleep(timeout).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(deadline);

        let mut stdout_open = true;
        let (status, terminated_in_time) = loop {
            tokio::select! {
                line = rx.recv(), if stdout_open => match line {
                    Some(line) => algorithm.consume_line(&line),
                    None => stdout_open = false,
                },
                status = child.wait() => break (status, true),
                _ = &mut deadline => {
                    info!("{}: timeout after {:?}, killing process group", algorithm.name(), self.timeout);
                    kill_group(&mut child, pid);
                    break (child.wait().await, false);
                }
            }
        };
        let runtime = start.elapsed();

        // Stragglers left in the group would keep the pipes open
        kill_group(&mut child, pid);

        let drained = drain(
            [stdout_task, stderr_task],
            &mut rx,
            &mut err_rx,
            algorithm,
            DRAIN_GRACE,
        )
        .await;

        let exit_code = status.as_ref().ok().and_then(|s| s.code());
        let exited_cleanly = match &status {
            Ok(s) => s.success() || !terminated_in_time,
            Err(e) => {
                warn!("{}: waiting on process failed: {}", algorithm.name(), e);
                false
            }
        };
        if terminated_in_time && !exited_cleanly {
            warn!("{}: process exited with code {:?}", algorithm.name(), exit_code);
        }

        RunResult {
            terminated_in_time,
            no_error_occurred: drained.stderr.is_empty() && drained.complete && exited_cleanly,
            runtime_millis: runtime.as_millis() as i64,
            sample: None,
            memory: None,
            exit_code,
            errors: drained.stderr,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stream {
    Stdout,
    Stderr,
}

/// Sends every line of `reader` to `tx` until EOF or a read error.
///
/// Bytes that are not valid UTF-8 are replaced, never dropped.
async fn forward_lines<R>(reader: R, tx: mpsc::UnboundedSender<String>, stream: Stream)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf)
                    .trim_end_matches(|c| c == '\n' || c == '\r')
                    .to_string();
                match stream {
                    Stream::Stdout => debug!(target: "algorithm.stdout", "{}", line),
                    Stream::Stderr => warn!(target: "algorithm.stderr", "{}", line),
                }
                // The receiver may be gone; the pipe is still drained
                let _ = tx.send(line);
            }
            Err(e) => {
                warn!("Error reading {:?}: {}", stream, e);
                break;
            }
        }
    }
}

/// Output gathered once the readers are done.
struct Drained {
    stderr: Vec<String>,
    /// Both streams reached EOF within the grace period.
    complete: bool,
}

/// Joins both readers, forwards stdout lines that arrived after exit and
/// collects stderr. Lines received before an abandoned join are kept.
async fn drain(
    readers: [JoinHandle<()>; 2],
    rx: &mut mpsc::UnboundedReceiver<String>,
    err_rx: &mut mpsc::UnboundedReceiver<String>,
    algorithm: &mut dyn SamplingAlgorithm,
    grace: Duration,
) -> Drained {
    let aborts: Vec<_> = readers.iter().map(JoinHandle::abort_handle).collect();
    let joined = tokio::time::timeout(grace, async {
        for reader in readers {
            let _ = reader.await;
        }
    })
    .await;

    let complete = joined.is_ok();
    if !complete {
        warn!(
            "{}: output streams still open {:?} after exit, abandoning readers",
            algorithm.name(),
            grace
        );
        aborts.iter().for_each(|a| a.abort());
    }

    while let Ok(line) = rx.try_recv() {
        algorithm.consume_line(&line);
    }
    let mut stderr = Vec::new();
    while let Ok(line) = err_rx.try_recv() {
        stderr.push(line);
    }
    Drained { stderr, complete }
}

/// Parses the sample and memory log, flipping `no_error_occurred` on failure
/// only for runs that finished in time.
async fn collect_outputs(algorithm: &mut dyn SamplingAlgorithm, variant: &Cnf, result: &mut RunResult) {
    match algorithm.parse_results(variant.variables()).await {
        Ok(sample) => result.sample = sample,
        Err(e) => {
            warn!("{}: failed to parse sample: {}", algorithm.name(), e);
            if result.terminated_in_time {
                result.no_error_occurred = false;
            }
        }
    }
    match algorithm.parse_memory().await {
        Ok(memory) => result.memory = Some(memory),
        Err(e) => {
            warn!("{}: failed to parse memory log: {}", algorithm.name(), e);
            if result.terminated_in_time {
                result.no_error_occurred = false;
            }
        }
    }
}

/// Kills the child and everything in its process group.
#[cfg(unix)]
fn kill_group(child: &mut Child, pid: Option<u32>) {
    if let Some(pid) = pid {
        // SAFETY: killpg only sends a signal; the group id is our own child's pid
        let rc = unsafe { libc::killpg(pid as libc::pid_t, libc::SIGKILL) };
        if rc == 0 {
            return;
        }
    }
    let _ = child.start_kill();
}

#[cfg(not(unix))]
fn kill_group(child: &mut Child, _pid: Option<u32>) {
    let _ = child.start_kill();
}

/// Lets buffered output and pending tasks settle before a measured launch.
async fn settle() {
    tokio::task::yield_now().await;
}
