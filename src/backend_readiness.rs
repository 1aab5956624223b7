use std::{io, time::Duration};

use tokio::{net::TcpStream, time::Instant};

use crate::{
    StartupError, BACKEND_HOST, BACKEND_PROBE_ATTEMPT_TIMEOUT_MS,
    DEFAULT_BACKEND_POLL_INTERVAL_MS,
};

/// Progress of one readiness wait. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadinessState {
    Unknown,
    Polling,
    Ready,
    TimedOut,
}

impl ReadinessState {
    pub fn can_advance_to(self, next: ReadinessState) -> bool {
        matches!(
            (self, next),
            (ReadinessState::Unknown, ReadinessState::Polling)
                | (ReadinessState::Polling, ReadinessState::Ready)
                | (ReadinessState::Polling, ReadinessState::TimedOut)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ReadinessState::Ready | ReadinessState::TimedOut)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Connected,
    Refused,
    Failed(String),
}

fn loopback(port: u16) -> (&'static str, u16) {
    (BACKEND_HOST, port)
}

/// A single bounded connect attempt against the loopback port.
pub async fn probe_once(port: u16, attempt_timeout: Duration) -> ProbeOutcome {
    match tokio::time::timeout(attempt_timeout, TcpStream::connect(loopback(port))).await {
        Ok(Ok(_stream)) => ProbeOutcome::Connected,
        Ok(Err(error)) if error.kind() == io::ErrorKind::ConnectionRefused => {
            ProbeOutcome::Refused
        }
        Ok(Err(error)) => ProbeOutcome::Failed(error.to_string()),
        Err(_) => ProbeOutcome::Failed(format!(
            "connect attempt timed out after {}ms",
            attempt_timeout.as_millis()
        )),
    }
}

#[derive(Debug)]
pub struct ReadinessProbe {
    port: u16,
    timeout: Duration,
    interval: Duration,
    attempt_timeout: Duration,
    state: ReadinessState,
}

impl ReadinessProbe {
    pub fn new(port: u16, timeout: Duration) -> Self {
        Self {
            port,
            timeout,
            interval: Duration::from_millis(DEFAULT_BACKEND_POLL_INTERVAL_MS),
            attempt_timeout: Duration::from_millis(BACKEND_PROBE_ATTEMPT_TIMEOUT_MS),
            state: ReadinessState::Unknown,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_attempt_timeout(mut self, attempt_timeout: Duration) -> Self {
        self.attempt_timeout = attempt_timeout;
        self
    }

    pub fn state(&self) -> ReadinessState {
        self.state
    }

    fn advance(&mut self, next: ReadinessState) {
        if self.state.can_advance_to(next) {
            self.state = next;
        }
    }

    fn timed_out(&mut self) -> StartupError {
        self.advance(ReadinessState::TimedOut);
        StartupError::ReadinessTimeout {
            port: self.port,
            timeout: self.timeout,
        }
    }

    /// Polls until the port accepts a connection, returning how long that took.
    ///
    /// A probe that already reached a terminal state is not re-run.
    pub async fn wait(&mut self) -> Result<Duration, StartupError> {
        if self.state.is_terminal() {
            return match self.state {
                ReadinessState::Ready => Ok(Duration::ZERO),
                _ => Err(self.timed_out()),
            };
        }

        let started = Instant::now();
        self.advance(ReadinessState::Polling);
        tracing::info!(
            port = self.port,
            timeout_ms = self.timeout.as_millis() as u64,
            interval_ms = self.interval.as_millis() as u64,
            "waiting for backend readiness"
        );

        let mut attempts: u32 = 0;
        loop {
            attempts += 1;
            let remaining = self.timeout.saturating_sub(started.elapsed());
            let attempt_timeout = self
                .attempt_timeout
                .min(remaining)
                .max(Duration::from_millis(1));
            match probe_once(self.port, attempt_timeout).await {
                ProbeOutcome::Connected => {
                    self.advance(ReadinessState::Ready);
                    let elapsed = started.elapsed();
                    tracing::info!(
                        port = self.port,
                        attempts,
                        elapsed_ms = elapsed.as_millis() as u64,
                        "backend is accepting connections"
                    );
                    return Ok(elapsed);
                }
                ProbeOutcome::Refused => {
                    tracing::trace!(port = self.port, attempts, "backend refused connection");
                }
                ProbeOutcome::Failed(reason) => {
                    tracing::debug!(port = self.port, attempts, %reason, "backend probe failed");
                }
            }

            let elapsed = started.elapsed();
            if elapsed >= self.timeout {
                break;
            }
            tokio::time::sleep(self.interval.min(self.timeout - elapsed)).await;
            if started.elapsed() >= self.timeout {
                break;
            }
        }

        tracing::warn!(
            port = self.port,
            attempts,
            timeout_ms = self.timeout.as_millis() as u64,
            "backend readiness timed out"
        );
        Err(self.timed_out())
    }
}

pub async fn wait_for_port(port: u16, timeout: Duration) -> Result<Duration, StartupError> {
    ReadinessProbe::new(port, timeout).wait().await
}
