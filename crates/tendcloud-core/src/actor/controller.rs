//! `ControllerActor`: Pass scheduling
//!
//! Owns the pass gate and the last pass result. Passes run on their own task
//! so the actor keeps answering status queries while a pass waits on the
//! provider.

use std::sync::Arc;

use kameo::actor::{ActorRef, WeakActorRef};
use kameo::error::ActorStopReason;
use kameo::message::{Context, Message};
use kameo::prelude::*;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use tendcloud_api::pass::PassResult;

use crate::error::CoreError;
use crate::message::{GetLastPass, LastPass, PassStarted, Tick, TriggerPass};
use crate::pass::Reconciler;
use crate::scheduler::{PassGate, PassPermit};

/// Log target carrying every finished pass as JSON
pub const PASS_LOG_TARGET: &str = "tendcloud::pass";

/// Arguments for spawning a `ControllerActor`
pub struct ControllerActorArgs {
    pub reconciler: Arc<Reconciler>,
}

/// Schedules reconciliation passes
pub struct ControllerActor {
    reconciler: Arc<Reconciler>,
    gate: Arc<PassGate>,
    /// Result of the last finished pass, written by the pass task
    last: Arc<RwLock<Option<PassResult>>>,
}

impl ControllerActor {
    /// Run a pass in the background, releasing `permit` when it finishes
    fn spawn_pass(&self, permit: PassPermit) {
        let reconciler = Arc::clone(&self.reconciler);
        let last = Arc::clone(&self.last);

        tokio::spawn(async move {
            let result = reconciler.run_pass().await;
            match serde_json::to_string(&result) {
                Ok(json) => info!(target: PASS_LOG_TARGET, result = %json, "pass finished"),
                Err(e) => warn!(error = %e, "failed to serialize pass result"),
            }
            *last.write().await = Some(result);
            drop(permit);
        });
    }
}

impl Actor for ControllerActor {
    type Args = ControllerActorArgs;
    type Error = CoreError;

    async fn on_start(args: Self::Args, actor_ref: ActorRef<Self>) -> Result<Self, Self::Error> {
        info!(id = %actor_ref.id(), "ControllerActor starting");

        Ok(Self {
            reconciler: args.reconciler,
            gate: PassGate::new(),
            last: Arc::new(RwLock::new(None)),
        })
    }

    async fn on_stop(
        &mut self,
        _actor_ref: WeakActorRef<Self>,
        reason: ActorStopReason,
    ) -> Result<(), Self::Error> {
        if self.gate.is_running() {
            warn!(reason = ?reason, "ControllerActor stopping while a pass is running");
        } else {
            info!(reason = ?reason, "ControllerActor stopping");
        }
        Ok(())
    }
}

// ============================================================================
// Message Handlers
// ============================================================================

impl Message<Tick> for ControllerActor {
    type Reply = Result<PassStarted, CoreError>;

    async fn handle(&mut self, _msg: Tick, _ctx: &mut Context<Self, Self::Reply>) -> Self::Reply {
        if self.gate.is_running() {
            debug!("pass in flight, tick ignored");
            return Ok(PassStarted { started: false });
        }

        let modified = self.reconciler.source().modified().await.map_err(|e| {
            error!(error = %e, "failed to read desired state modification time");
            e
        })?;

        let Some(permit) = self.gate.try_begin(modified) else {
            return Ok(PassStarted { started: false });
        };
        info!("desired state changed, starting pass");
        self.spawn_pass(permit);
        Ok(PassStarted { started: true })
    }
}

impl Message<TriggerPass> for ControllerActor {
    type Reply = PassStarted;

    async fn handle(
        &mut self,
        _msg: TriggerPass,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        let Some(permit) = self.gate.begin_forced() else {
            debug!("pass in flight, trigger ignored");
            return PassStarted { started: false };
        };
        info!("pass triggered");
        self.spawn_pass(permit);
        PassStarted { started: true }
    }
}

impl Message<GetLastPass> for ControllerActor {
    type Reply = LastPass;

    async fn handle(
        &mut self,
        _msg: GetLastPass,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        LastPass {
            in_flight: self.gate.is_running(),
            result: self.last.read().await.clone(),
        }
    }
}
