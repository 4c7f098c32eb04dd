//! Background timer asking the controller to check the desired state

use std::time::Duration;

use kameo::actor::ActorRef;
use tendcloud_core::{ControllerActor, Tick};
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

/// Send a `Tick` every `every` until the task is aborted
pub async fn run(controller: ActorRef<ControllerActor>, every: Duration) {
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        interval.tick().await;
        match controller.ask(Tick).await {
            Ok(reply) if reply.started => debug!("tick started a pass"),
            Ok(_) => {}
            Err(e) => warn!(error = %e, "tick failed"),
        }
    }
}
