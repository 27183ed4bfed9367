//! Runs a `RecognitionSession` on its own thread.
//!
//! Hosts talk to the session through `DriverHandle`, which forwards lifecycle commands
//! over a channel. Commands are applied between scheduler turns, so they never
//! interleave with a tick. A camera reset started by the stall watchdog holds the
//! turn until the camera is back or the readiness wait gives up; `stop` and
//! `shutdown` queue behind it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::{anyhow, Result};

use super::{RecognitionSession, SessionState, SessionStats, Visibility, DISPLAY_REFRESH_MS};
use crate::profile::ProfileOverrides;

/// Longest the driver sleeps between turns, so shutdown stays responsive.
const MAX_IDLE_WAIT_MS: u64 = DISPLAY_REFRESH_MS;

pub enum SessionCommand {
    Start(Sender<bool>),
    Stop,
    Restart(Sender<bool>),
    ResetCooldown,
    ResetDevice(Sender<bool>),
    SetVisibility(Visibility),
    SetDeviceProfile(ProfileOverrides, Sender<Result<()>>),
    State(Sender<SessionState>),
    Stats(Sender<SessionStats>),
}

pub struct SessionDriver;

impl SessionDriver {
    pub fn spawn(session: RecognitionSession) -> DriverHandle {
        let (commands, receiver) = mpsc::channel();
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_thread = shutdown.clone();
        let join = std::thread::spawn(move || run_driver(session, receiver, shutdown_thread));
        DriverHandle {
            commands,
            shutdown,
            join: Some(join),
        }
    }
}

fn apply(session: &mut RecognitionSession, command: SessionCommand) {
    // Reply failures mean the caller stopped waiting; the command still ran.
    match command {
        SessionCommand::Start(reply) => {
            let _ = reply.send(session.start());
        }
        SessionCommand::Stop => session.stop(),
        SessionCommand::Restart(reply) => {
            let _ = reply.send(session.restart());
        }
        SessionCommand::ResetCooldown => session.reset_cooldown(),
        SessionCommand::ResetDevice(reply) => {
            let _ = reply.send(session.reset_device());
        }
        SessionCommand::SetVisibility(visibility) => session.set_visibility(visibility),
        SessionCommand::SetDeviceProfile(overrides, reply) => {
            let _ = reply.send(session.set_device_profile(overrides));
        }
        SessionCommand::State(reply) => {
            let _ = reply.send(session.state());
        }
        SessionCommand::Stats(reply) => {
            let _ = reply.send(session.stats().clone());
        }
    }
}

fn run_driver(
    mut session: RecognitionSession,
    commands: Receiver<SessionCommand>,
    shutdown: Arc<AtomicBool>,
) -> RecognitionSession {
    'turns: loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        loop {
            match commands.try_recv() {
                Ok(command) => apply(&mut session, command),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => break 'turns,
            }
        }

        session.poll();

        let now = session.now_ms();
        let wait_ms = session
            .next_wakeup()
            .map_or(MAX_IDLE_WAIT_MS, |at| at.saturating_sub(now))
            .clamp(1, MAX_IDLE_WAIT_MS);
        match commands.recv_timeout(Duration::from_millis(wait_ms)) {
            Ok(command) => apply(&mut session, command),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    session.stop();
    log::info!("gesture session driver stopped");
    session
}

/// Control handle for a session running on a driver thread.
pub struct DriverHandle {
    commands: Sender<SessionCommand>,
    shutdown: Arc<AtomicBool>,
    join: Option<JoinHandle<RecognitionSession>>,
}

impl DriverHandle {
    fn send(&self, command: SessionCommand) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| anyhow!("session driver is not running"))
    }

    fn request<T>(&self, command: impl FnOnce(Sender<T>) -> SessionCommand) -> Result<T> {
        let (reply, response) = mpsc::channel();
        self.send(command(reply))?;
        response
            .recv()
            .map_err(|_| anyhow!("session driver is not running"))
    }

    pub fn start(&self) -> Result<bool> {
        self.request(SessionCommand::Start)
    }

    pub fn stop(&self) -> Result<()> {
        self.send(SessionCommand::Stop)
    }

    pub fn restart(&self) -> Result<bool> {
        self.request(SessionCommand::Restart)
    }

    pub fn reset_cooldown(&self) -> Result<()> {
        self.send(SessionCommand::ResetCooldown)
    }

    pub fn reset_device(&self) -> Result<bool> {
        self.request(SessionCommand::ResetDevice)
    }

    pub fn set_visibility(&self, visibility: Visibility) -> Result<()> {
        self.send(SessionCommand::SetVisibility(visibility))
    }

    pub fn set_device_profile(&self, overrides: ProfileOverrides) -> Result<()> {
        self.request(|reply| SessionCommand::SetDeviceProfile(overrides, reply))?
    }

    pub fn state(&self) -> Result<SessionState> {
        self.request(SessionCommand::State)
    }

    pub fn stats(&self) -> Result<SessionStats> {
        self.request(SessionCommand::Stats)
    }

    /// Stop the driver thread and hand the stopped session back.
    pub fn shutdown(mut self) -> Result<RecognitionSession> {
        self.shutdown.store(true, Ordering::SeqCst);
        let join = self
            .join
            .take()
            .ok_or_else(|| anyhow!("session driver already shut down"))?;
        join.join()
            .map_err(|_| anyhow!("session driver thread panicked"))
    }
}

impl Drop for DriverHandle {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}
