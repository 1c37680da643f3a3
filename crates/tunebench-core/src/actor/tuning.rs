//! `TuningActor`: single owner of the cluster inventory and the executors
//!
//! Concurrent callers are serialized through the actor mailbox, so cache
//! reads and mutating batches never interleave.

use kameo::actor::{ActorRef, WeakActorRef};
use kameo::error::ActorStopReason;
use kameo::message::{Context, Message};
use kameo::prelude::*;
use tracing::{debug, info};

use tunebench_inventory::{ClusterInventory, NodeRecord};

use crate::error::CoreError;
use crate::executor::ActionExecutor;
use crate::message::{
    ApplyProfile, ApplyRingBuffers, InvalidateInventory, ListNodes, RebootNodes, RunEnvTest,
};
use crate::outcome::{BatchReport, EnvTestReport};

/// Arguments for spawning a `TuningActor`
pub struct TuningActorArgs {
    pub inventory: ClusterInventory,
    /// Executor for node-level commands (SSH to node IPs)
    pub node_actions: ActionExecutor,
    /// Executor for workload commands (`kubectl exec`)
    pub workload_actions: ActionExecutor,
    /// Target that `kubectl exec` runs on
    pub workload_target: String,
    /// Node listing selector for node-targeted actions
    pub node_selector: String,
}

/// Actor owning inventory and executors
pub struct TuningActor {
    inventory: ClusterInventory,
    node_actions: ActionExecutor,
    workload_actions: ActionExecutor,
    workload_target: String,
    node_selector: String,
}

impl TuningActor {
    /// Explicit targets, or the IPs of every selected node
    async fn resolve_targets(
        &mut self,
        targets: Option<Vec<String>>,
    ) -> Result<Vec<String>, CoreError> {
        let targets = match targets {
            Some(targets) => targets,
            None => self.inventory.node_ips(&self.node_selector, false).await?,
        };
        if targets.is_empty() {
            return Err(CoreError::NoTargets(self.node_selector.clone()));
        }
        debug!(count = targets.len(), "targets resolved");
        Ok(targets)
    }
}

impl Actor for TuningActor {
    type Args = TuningActorArgs;
    type Error = CoreError;

    async fn on_start(args: Self::Args, actor_ref: ActorRef<Self>) -> Result<Self, Self::Error> {
        info!(
            id = %actor_ref.id(),
            selector = %args.node_selector,
            "TuningActor starting"
        );

        Ok(Self {
            inventory: args.inventory,
            node_actions: args.node_actions,
            workload_actions: args.workload_actions,
            workload_target: args.workload_target,
            node_selector: args.node_selector,
        })
    }

    async fn on_stop(
        &mut self,
        _actor_ref: WeakActorRef<Self>,
        reason: ActorStopReason,
    ) -> Result<(), Self::Error> {
        info!(reason = ?reason, "TuningActor stopping");
        Ok(())
    }
}

// ============================================================================
// Message Handlers
// ============================================================================

impl Message<ListNodes> for TuningActor {
    type Reply = Result<Vec<NodeRecord>, CoreError>;

    async fn handle(&mut self, msg: ListNodes, _ctx: &mut Context<Self, Self::Reply>) -> Self::Reply {
        let nodes = self
            .inventory
            .nodes(&self.node_selector, msg.force_refresh)
            .await?;
        Ok(nodes.values().cloned().collect())
    }
}

impl Message<InvalidateInventory> for TuningActor {
    type Reply = ();

    async fn handle(
        &mut self,
        _msg: InvalidateInventory,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        self.inventory.clear();
        info!("inventory invalidated");
    }
}

impl Message<ApplyRingBuffers> for TuningActor {
    type Reply = Result<BatchReport, CoreError>;

    async fn handle(
        &mut self,
        msg: ApplyRingBuffers,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        let targets = self.resolve_targets(msg.targets).await?;
        self.node_actions
            .apply_ring_buffers(&targets, &msg.specs)
            .await
    }
}

impl Message<ApplyProfile> for TuningActor {
    type Reply = Result<BatchReport, CoreError>;

    async fn handle(
        &mut self,
        msg: ApplyProfile,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        let targets = self.resolve_targets(msg.targets).await?;
        self.node_actions.apply_profile(&targets, &msg.profile).await
    }
}

impl Message<RebootNodes> for TuningActor {
    type Reply = Result<BatchReport, CoreError>;

    async fn handle(
        &mut self,
        msg: RebootNodes,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        let targets = self.resolve_targets(msg.targets).await?;
        let report = self.node_actions.reboot(&targets).await?;
        // node IPs may change across a reboot
        self.inventory.invalidate_nodes();
        Ok(report)
    }
}

impl Message<RunEnvTest> for TuningActor {
    type Reply = Result<EnvTestReport, CoreError>;

    async fn handle(
        &mut self,
        msg: RunEnvTest,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        let mut spec = msg.spec;
        if spec.client.server_address.is_empty() {
            let ip = self
                .inventory
                .pod_ip(&spec.server.namespace, &spec.server.workload)
                .await?
                .ok_or_else(|| {
                    CoreError::ConfigError(format!(
                        "server pod {}/{} has no IP",
                        spec.server.namespace, spec.server.workload
                    ))
                })?;
            debug!(%ip, "server address resolved from pod status");
            spec.client.server_address = ip;
        }

        self.workload_actions
            .run_env_test(&self.workload_target, &self.workload_target, &spec)
            .await
    }
}
