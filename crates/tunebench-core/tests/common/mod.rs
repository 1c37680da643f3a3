//! Scripted executor shared by the integration suites

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use tunebench_core::{ExecutorSettings, RebootPolicy};
use tunebench_exec::{CommandResult, ExecError, RemoteExecutor};

/// Canned reply for a command
#[derive(Debug, Clone)]
pub enum Reply {
    Exit(i32, &'static str),
    Unreachable,
}

/// Executor replying from per-command scripts and recording every call.
///
/// Each command has a queue of replies; the last one repeats. Unscripted
/// commands exit 0 with no output.
#[derive(Default)]
pub struct ScriptedExecutor {
    scripts: Mutex<HashMap<String, VecDeque<Reply>>>,
    calls: Mutex<Vec<(String, String)>>,
    releases: Mutex<Vec<String>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(self, cmd: &str, replies: impl IntoIterator<Item = Reply>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(cmd.to_string(), replies.into_iter().collect());
        self
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn commands(&self) -> Vec<String> {
        self.calls().into_iter().map(|(_, cmd)| cmd).collect()
    }

    pub fn count(&self, target: &str, cmd: &str) -> usize {
        self.calls()
            .iter()
            .filter(|(t, c)| t == target && c == cmd)
            .count()
    }

    pub fn releases(&self) -> Vec<String> {
        self.releases.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteExecutor for ScriptedExecutor {
    async fn execute(&self, target: &str, cmd: &str) -> Result<CommandResult, ExecError> {
        self.calls
            .lock()
            .unwrap()
            .push((target.to_string(), cmd.to_string()));

        let reply = {
            let mut scripts = self.scripts.lock().unwrap();
            match scripts.get_mut(cmd) {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().cloned(),
                None => None,
            }
        };

        match reply.unwrap_or(Reply::Exit(0, "")) {
            Reply::Exit(status, stdout) => Ok(CommandResult {
                status,
                stdout: stdout.to_string(),
                stderr: String::new(),
                duration: Duration::from_millis(1),
            }),
            Reply::Unreachable => Err(ExecError::ConnectionFailed {
                target: target.to_string(),
                reason: "connection refused".to_string(),
            }),
        }
    }

    async fn release(&self, target: &str) -> Result<(), ExecError> {
        self.releases.lock().unwrap().push(target.to_string());
        Ok(())
    }

    fn executor_type(&self) -> &'static str {
        "scripted"
    }
}

/// Settings with millisecond delays
pub fn fast_settings(max_attempts: u32) -> ExecutorSettings {
    ExecutorSettings {
        reboot: RebootPolicy {
            settle: Duration::from_millis(1),
            poll_interval: Duration::from_millis(1),
            max_attempts,
        },
        client_delay: Duration::from_millis(1),
        ..ExecutorSettings::default()
    }
}
