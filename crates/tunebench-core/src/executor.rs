//! `ActionExecutor`: mutating actions over a target list
//!
//! Targets are processed strictly in caller order, one remote call at a
//! time. A failing target is reported in its outcome and the batch moves
//! on.

use std::sync::Arc;
use std::time::Instant;

use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

use tunebench_exec::{CommandResult, ExecError, RemoteExecutor};

use crate::commands::{CommandBuilder, parse_active_profile};
use crate::config::{EnvTestSpec, ExecutorSettings, MutationSpec, ProfileSpec, RingBufferSpec};
use crate::error::{ActionError, CoreError};
use crate::exit_codes::ExitClass;
use crate::outcome::{ActionOutcome, BatchReport, EnvTestReport};
use crate::reboot::{RebootState, RebootTracker};

/// Drives mutating commands through a `RemoteExecutor`
pub struct ActionExecutor {
    executor: Arc<dyn RemoteExecutor>,
    settings: ExecutorSettings,
    commands: CommandBuilder,
}

impl ActionExecutor {
    pub fn new(executor: Arc<dyn RemoteExecutor>, settings: ExecutorSettings) -> Self {
        let commands = CommandBuilder::new(settings.use_sudo);
        Self {
            executor,
            settings,
            commands,
        }
    }

    #[must_use]
    pub fn settings(&self) -> &ExecutorSettings {
        &self.settings
    }

    async fn run(&self, target: &str, cmd: &str) -> Result<CommandResult, ExecError> {
        debug!(target_host = %target, cmd, "executing");
        self.executor.execute(target, cmd).await
    }

    /// Run every action `spec` defines against `targets`: ring buffers
    /// first, then the profile. The environment test is not target based
    /// and runs through `run_env_test`.
    ///
    /// # Errors
    /// Returns `CoreError` only for failures that abort a whole batch.
    pub async fn apply(
        &self,
        targets: &[String],
        spec: &MutationSpec,
    ) -> Result<Vec<BatchReport>, CoreError> {
        let mut reports = Vec::new();
        if !spec.ring_buffers.is_empty() {
            reports.push(self.apply_ring_buffers(targets, &spec.ring_buffers).await?);
        }
        if let Some(profile) = &spec.profile {
            reports.push(self.apply_profile(targets, profile).await?);
        }
        Ok(reports)
    }

    // ------------------------------------------------------------------
    // Ring buffers
    // ------------------------------------------------------------------

    /// Set ring buffer sizes on every target.
    ///
    /// The command is always issued; its exit code decides between
    /// changed, already satisfied, and failed. A target stops at its first
    /// failing adapter.
    ///
    /// # Errors
    /// Currently infallible at batch level.
    #[instrument(skip(self, targets, specs), fields(targets = targets.len()))]
    pub async fn apply_ring_buffers(
        &self,
        targets: &[String],
        specs: &[RingBufferSpec],
    ) -> Result<BatchReport, CoreError> {
        let mut report = BatchReport::start("ring-buffers");
        for target in targets {
            let outcome = self.ring_buffers_on(target, specs).await;
            log_outcome("ring-buffers", &outcome);
            report.outcomes.push(outcome);
        }
        let report = report.finish();
        info!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            changed = report.changed(),
            "ring buffer batch complete"
        );
        Ok(report)
    }

    async fn ring_buffers_on(&self, target: &str, specs: &[RingBufferSpec]) -> ActionOutcome {
        let start = Instant::now();
        let mut changed = false;
        let mut output = Vec::new();

        for spec in specs {
            let result = match self.run(target, &self.commands.ring_buffers(spec)).await {
                Ok(result) => result,
                Err(e) => {
                    return ActionOutcome::failed(target, ActionError::Connectivity(e.to_string()))
                        .with_changed(changed)
                        .with_output(output.join("\n"))
                        .with_elapsed(start.elapsed());
                }
            };
            output.push(result.combined_output());

            match self.settings.ring_buffer_codes.classify(result.status) {
                ExitClass::Changed => changed = true,
                ExitClass::Unchanged => {
                    debug!(target_host = %target, adapter = %spec.adapter, "rings already set");
                }
                ExitClass::Failed => {
                    return ActionOutcome::failed(
                        target,
                        ActionError::MutationFailed {
                            exit_code: result.status,
                        },
                    )
                    .with_changed(changed)
                    .with_output(output.join("\n"))
                    .with_elapsed(start.elapsed());
                }
            }
        }

        ActionOutcome::ok(target, changed)
            .with_output(output.join("\n"))
            .with_elapsed(start.elapsed())
    }

    // ------------------------------------------------------------------
    // Tuned profile
    // ------------------------------------------------------------------

    /// Switch every target to `profile` unless it is already active
    ///
    /// # Errors
    /// Currently infallible at batch level.
    #[instrument(skip(self, targets, profile), fields(profile = %profile.name, targets = targets.len()))]
    pub async fn apply_profile(
        &self,
        targets: &[String],
        profile: &ProfileSpec,
    ) -> Result<BatchReport, CoreError> {
        let mut report = BatchReport::start("profile");
        for target in targets {
            let start = Instant::now();
            let outcome = self
                .profile_on(target, profile)
                .await
                .with_elapsed(start.elapsed());
            log_outcome("profile", &outcome);
            report.outcomes.push(outcome);
        }
        let report = report.finish();
        info!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            changed = report.changed(),
            "profile batch complete"
        );
        Ok(report)
    }

    async fn profile_on(&self, target: &str, profile: &ProfileSpec) -> ActionOutcome {
        let current = match self.run(target, &self.commands.active_profile()).await {
            Ok(r) if r.success() => r,
            Ok(r) => {
                return ActionOutcome::failed(
                    target,
                    ActionError::MutationFailed { exit_code: r.status },
                )
                .with_output(r.combined_output());
            }
            Err(e) => return ActionOutcome::failed(target, ActionError::Connectivity(e.to_string())),
        };

        if parse_active_profile(&current.stdout).as_deref() == Some(profile.name.as_str()) {
            debug!(target_host = %target, "profile already active");
            return ActionOutcome::ok(target, false).with_output(current.stdout);
        }

        match self.run(target, &self.commands.path_exists(&profile.path)).await {
            Ok(r) if r.success() => {}
            Ok(r) => {
                return ActionOutcome::failed(
                    target,
                    ActionError::ProfileMissing {
                        path: profile.path.clone(),
                    },
                )
                .with_output(r.combined_output());
            }
            Err(e) => return ActionOutcome::failed(target, ActionError::Connectivity(e.to_string())),
        }

        match self.run(target, &self.commands.set_profile(&profile.name)).await {
            Ok(r) if r.success() => ActionOutcome::ok(target, true).with_output(r.combined_output()),
            Ok(r) => ActionOutcome::failed(target, ActionError::MutationFailed { exit_code: r.status })
                .with_output(r.combined_output()),
            Err(e) => ActionOutcome::failed(target, ActionError::Connectivity(e.to_string())),
        }
    }

    // ------------------------------------------------------------------
    // Reboot
    // ------------------------------------------------------------------

    /// Reboot every target in turn and wait for each to come back.
    ///
    /// A reboot is confirmed when the target's boot timestamp differs from
    /// the one read before rebooting.
    ///
    /// # Errors
    /// Returns `CoreError::InvalidTransition` if the state machine is
    /// driven out of order.
    #[instrument(skip(self, targets), fields(targets = targets.len()))]
    pub async fn reboot(&self, targets: &[String]) -> Result<BatchReport, CoreError> {
        let mut report = BatchReport::start("reboot");
        for target in targets {
            let start = Instant::now();
            let outcome = self.reboot_one(target).await?.with_elapsed(start.elapsed());
            log_outcome("reboot", &outcome);
            report.outcomes.push(outcome);
        }
        let report = report.finish();
        info!(
            confirmed = report.succeeded(),
            failed = report.failed(),
            "reboot batch complete"
        );
        Ok(report)
    }

    async fn reboot_one(&self, target: &str) -> Result<ActionOutcome, CoreError> {
        let policy = self.settings.reboot;
        let boot_time = self.commands.boot_time();

        let baseline = match self.run(target, &boot_time).await {
            Ok(r) if r.success() => r.stdout.trim().to_string(),
            Ok(r) => {
                return Ok(ActionOutcome::failed(
                    target,
                    ActionError::MutationFailed { exit_code: r.status },
                )
                .with_output(r.combined_output()));
            }
            Err(e) => {
                return Ok(ActionOutcome::failed(
                    target,
                    ActionError::Connectivity(e.to_string()),
                ));
            }
        };

        match self.run(target, &self.commands.reboot()).await {
            Ok(r) if r.success() => {}
            Ok(r) => {
                return Ok(ActionOutcome::failed(
                    target,
                    ActionError::MutationFailed { exit_code: r.status },
                )
                .with_output(r.combined_output()));
            }
            // the session may die before the exit status arrives
            Err(e) if e.is_connectivity() => {
                debug!(target_host = %target, error = %e, "connection lost while issuing reboot");
            }
            Err(e) => {
                return Ok(ActionOutcome::failed(
                    target,
                    ActionError::Connectivity(e.to_string()),
                ));
            }
        }

        let mut tracker = RebootTracker::new(target);
        self.release(target).await;

        tracker.transition_to(RebootState::AwaitingDown)?;
        sleep(policy.settle).await;
        tracker.transition_to(RebootState::AwaitingUp)?;

        while tracker.polls() < policy.max_attempts {
            sleep(policy.poll_interval).await;
            tracker.record_poll();

            match self.run(target, &boot_time).await {
                Ok(r) if r.success() && r.stdout.trim() != baseline => {
                    tracker.transition_to(RebootState::Confirmed)?;
                    return Ok(ActionOutcome::ok(target, true).with_output(r.stdout.trim()));
                }
                Ok(r) => {
                    debug!(
                        target_host = %target,
                        poll = tracker.polls(),
                        status = r.status,
                        "boot time unchanged"
                    );
                }
                Err(e) => {
                    debug!(
                        target_host = %target,
                        poll = tracker.polls(),
                        error = %e,
                        "target unreachable"
                    );
                    self.release(target).await;
                }
            }
        }

        tracker.transition_to(RebootState::Unconfirmed)?;
        // the reboot command was issued even though no restart was observed
        Ok(ActionOutcome::failed(
            target,
            ActionError::ConvergenceTimeout {
                attempts: tracker.polls(),
            },
        )
        .with_changed(true))
    }

    async fn release(&self, target: &str) {
        if let Err(e) = self.executor.release(target).await {
            debug!(target_host = %target, error = %e, "release failed");
        }
    }

    // ------------------------------------------------------------------
    // Environment test
    // ------------------------------------------------------------------

    /// Start the test server, then the client once the server is up.
    ///
    /// The client is never issued if the server fails to start. An empty
    /// `client.server_address` must be resolved by the caller.
    ///
    /// # Errors
    /// Returns `CoreError::ConfigError` if no server address is set.
    #[instrument(skip(self, spec), fields(server = %spec.server.workload, client = %spec.client.workload))]
    pub async fn run_env_test(
        &self,
        server_target: &str,
        client_target: &str,
        spec: &EnvTestSpec,
    ) -> Result<EnvTestReport, CoreError> {
        if spec.client.server_address.is_empty() {
            return Err(CoreError::ConfigError(
                "environment test has no server address".to_string(),
            ));
        }

        let start = Instant::now();
        let server = match self
            .run(server_target, &self.commands.env_server(&spec.server))
            .await
        {
            Ok(r) if r.success() => {
                ActionOutcome::ok(server_target, true).with_output(r.combined_output())
            }
            Ok(r) => ActionOutcome::failed(
                server_target,
                ActionError::ServerStartFailed { exit_code: r.status },
            )
            .with_output(r.combined_output()),
            Err(e) => {
                ActionOutcome::failed(server_target, ActionError::Connectivity(e.to_string()))
            }
        }
        .with_elapsed(start.elapsed());
        log_outcome("env-test server", &server);

        if !server.success {
            warn!("server did not start, client not issued");
            return Ok(EnvTestReport {
                server,
                client: None,
            });
        }

        sleep(self.settings.client_delay).await;

        let start = Instant::now();
        let client_cmd = self
            .commands
            .env_client(&spec.client, &spec.client.server_address);
        let client = match self.run(client_target, &client_cmd).await {
            Ok(r) if r.success() => {
                ActionOutcome::ok(client_target, true).with_output(r.combined_output())
            }
            Ok(r) => ActionOutcome::failed(
                client_target,
                ActionError::ClientStartFailed { exit_code: r.status },
            )
            .with_output(r.combined_output()),
            Err(e) => {
                ActionOutcome::failed(client_target, ActionError::Connectivity(e.to_string()))
            }
        }
        .with_elapsed(start.elapsed());
        log_outcome("env-test client", &client);

        Ok(EnvTestReport {
            server,
            client: Some(client),
        })
    }
}

fn log_outcome(action: &str, outcome: &ActionOutcome) {
    if outcome.success {
        info!(action, target_host = %outcome.target, status = %outcome.status_line(), "target done");
    } else {
        warn!(action, target_host = %outcome.target, status = %outcome.status_line(), "target failed");
    }
}
