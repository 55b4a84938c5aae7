//! Foreground content process
//!
//! Content runs in an external emulator. While it runs it owns input focus;
//! navigation is suppressed until [`ControllerEvent::ProcessExited`] arrives.

use crate::collaborators::ProcessRunner;
use crate::error::{Result, ShelfError};
use crate::events::{ControllerEvent, EventSink};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Program, working directory and arguments for one launch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchCommand {
    pub program: PathBuf,
    pub working_dir: PathBuf,
    pub args: Vec<String>,
}

impl LaunchCommand {
    /// `-g <content>` plus `-f` for fullscreen, run from the emulator's directory
    pub fn compose(emulator: &Path, content: &Path, fullscreen: bool) -> Self {
        let mut args = vec!["-g".to_string(), content.display().to_string()];
        if fullscreen {
            args.push("-f".to_string());
        }
        let working_dir = emulator
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Self {
            program: emulator.to_path_buf(),
            working_dir,
            args,
        }
    }
}

/// Runs one foreground process at a time with tokio
pub struct ExternalProcess {
    events: EventSink,
    running: Arc<AtomicBool>,
    stop: Mutex<Option<CancellationToken>>,
}

impl ExternalProcess {
    pub fn new(events: EventSink) -> Self {
        Self {
            events,
            running: Arc::new(AtomicBool::new(false)),
            stop: Mutex::new(None),
        }
    }
}

impl ProcessRunner for ExternalProcess {
    fn start(&self, command: LaunchCommand) -> Result<()> {
        if self.is_running() {
            return Err(ShelfError::Process {
                program: command.program,
                message: "another process is already running".to_string(),
            });
        }

        let mut child = Command::new(&command.program)
            .args(&command.args)
            .current_dir(&command.working_dir)
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ShelfError::Process {
                program: command.program.clone(),
                message: e.to_string(),
            })?;

        info!("Started {} {:?}", command.program.display(), command.args);
        let token = CancellationToken::new();
        if let Ok(mut stop) = self.stop.lock() {
            *stop = Some(token.clone());
        }
        self.running.store(true, Ordering::SeqCst);
        self.events.send(ControllerEvent::ProcessStarted);

        let running = self.running.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let status = tokio::select! {
                status = child.wait() => status,
                _ = token.cancelled() => {
                    if let Err(e) = child.kill().await {
                        warn!("Failed to kill foreground process: {}", e);
                    }
                    child.wait().await
                }
            };
            running.store(false, Ordering::SeqCst);
            let code = match status {
                Ok(status) => status.code(),
                Err(e) => {
                    warn!("Waiting on foreground process failed: {}", e);
                    None
                }
            };
            info!("Foreground process exited with {:?}", code);
            events.send(ControllerEvent::ProcessExited { code });
        });

        Ok(())
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn terminate(&self) -> Result<()> {
        let stop = self.stop.lock().ok().and_then(|mut stop| stop.take());
        if let Some(token) = stop {
            token.cancel();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compose_windowed() {
        let command = LaunchCommand::compose(Path::new("/emu/cemu"), Path::new("/lib/game/code/game.rpx"), false);
        assert_eq!(command.program, PathBuf::from("/emu/cemu"));
        assert_eq!(command.working_dir, PathBuf::from("/emu"));
        assert_eq!(command.args, vec!["-g", "/lib/game/code/game.rpx"]);
    }

    #[test]
    fn test_compose_fullscreen() {
        let command = LaunchCommand::compose(Path::new("/emu/cemu"), Path::new("/lib/game.rpx"), true);
        assert_eq!(command.args.last().map(String::as_str), Some("-f"));
    }

    #[tokio::test]
    async fn test_missing_program_is_an_error() {
        let (sink, _rx) = EventSink::channel();
        let process = ExternalProcess::new(sink);
        let command = LaunchCommand::compose(Path::new("/definitely/not/here/emu"), Path::new("/x.rpx"), false);
        assert!(process.start(command).is_err());
        assert!(!process.is_running());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_terminate_emits_exit() {
        let (sink, mut rx) = EventSink::channel();
        let process = ExternalProcess::new(sink);
        let command = LaunchCommand {
            program: PathBuf::from("sleep"),
            working_dir: std::env::temp_dir(),
            args: vec!["30".to_string()],
        };
        process.start(command).unwrap();
        assert!(process.is_running());
        assert!(matches!(rx.recv().await, Some(ControllerEvent::ProcessStarted)));

        process.terminate().unwrap();
        assert!(matches!(rx.recv().await, Some(ControllerEvent::ProcessExited { .. })));
        assert!(!process.is_running());
    }
}
