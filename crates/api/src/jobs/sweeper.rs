//! Background Sweeper (spec §4.G) — guards against lost Dispatchers and
//! reaps stale in-memory state. Idempotent by design: every action it takes
//! is safe to repeat or skip on the next tick.

use super::scheduler::{Job, JobFrequency};
use crate::realtime::{EventRouter, RealtimeContext};

pub struct SweeperJob {
    ctx: RealtimeContext,
    router: EventRouter,
}

impl SweeperJob {
    pub fn new(ctx: RealtimeContext) -> Self {
        let router = EventRouter::new(ctx.clone());
        Self { ctx, router }
    }
}

#[async_trait::async_trait]
impl Job for SweeperJob {
    fn name(&self) -> &'static str {
        "sweeper"
    }

    fn frequency(&self) -> JobFrequency {
        JobFrequency::Seconds(self.ctx.config.dispatch.sweep_interval_sec)
    }

    async fn execute(&self) -> Result<(), String> {
        self.restart_orphaned_dispatchers().await?;
        self.reap_stale_locations();
        self.drop_terminal_ride_sharing_links().await?;
        Ok(())
    }
}

impl SweeperJob {
    async fn restart_orphaned_dispatchers(&self) -> Result<(), String> {
        let active = self.ctx.dispatch_registry.active_ride_ids();
        let orphaned = self
            .ctx
            .rides
            .list_requested_without_dispatcher(&active)
            .await
            .map_err(|e| e.to_string())?;

        for entity in orphaned {
            tracing::info!(ride_id = %entity.id, "sweeper: restarting orphaned dispatcher");
            self.router.start_dispatcher(entity.id);
        }
        Ok(())
    }

    fn reap_stale_locations(&self) {
        let ttl = chrono::Duration::seconds(self.ctx.config.dispatch.captain_location_ttl_sec as i64);
        let reaped = self.ctx.geo_index.reap_stale(ttl);
        if reaped > 0 {
            tracing::debug!(count = reaped, "sweeper: reaped stale captain locations");
        }
    }

    async fn drop_terminal_ride_sharing_links(&self) -> Result<(), String> {
        for (captain_id, ride_id) in self.ctx.ride_sharing.entries() {
            let ride = self.ctx.rides.get(ride_id).await.map_err(|e| e.to_string())?;
            let is_terminal = match ride {
                Some(entity) => entity.into_domain().status.is_terminal(),
                None => true,
            };
            if is_terminal {
                self.ctx.ride_sharing.remove(captain_id);
            }
        }
        Ok(())
    }
}
