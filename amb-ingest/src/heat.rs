//! The heat/lap engine.
//!
//! Turns the append-only passings stream into heats bounded by the race
//! flag and the configured duration and cooldown. One heat runs at a time:
//! adopt the unfinished heat if one exists, otherwise wait for the green
//! flag and the first qualifying passing. Each poll applies the
//! minimum-lap filter, waves the finish flag
//! when the nominal duration elapses, and finalizes on the earliest
//! completion criterion.

use crate::db::{self, passes::PassRow};
use crate::error::CoreResult;
use crate::shutdown::Shutdown;
use crate::time::DecoderTime;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info};

/// Cadence of the steady-state poll.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Cadence while waiting for the green flag or the opening passing.
const ACQUIRE_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Race flag values in `heats.race_flag`.
pub const FLAG_GREEN: i64 = 0;
pub const FLAG_FINISH_WAVED: i64 = 1;
pub const FLAG_CLOSED: i64 = 2;

/// The heat currently being driven.
#[derive(Debug, Clone)]
pub struct ActiveHeat {
    pub heat_id: i64,
    pub first_pass_id: i64,
    pub rtc_time_start: i64,
    pub rtc_time_end: i64,
    pub rtc_time_max_end: i64,
    pub race_flag: i64,
    /// Minimum lap time in microseconds, read through at heat creation
    pub minimum_lap_time_us: i64,
}

/// Outcome of one poll cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeatPoll {
    Running,
    Finished,
}

pub struct HeatEngine {
    pool: SqlitePool,
    clock: Arc<DecoderTime>,
    poll_interval: Duration,
}

impl HeatEngine {
    pub fn new(pool: SqlitePool, clock: Arc<DecoderTime>) -> Self {
        Self {
            pool,
            clock,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Drive heats until shutdown: acquire, run to completion, repeat.
    pub async fn run(&self, mut shutdown: Shutdown) -> CoreResult<()> {
        loop {
            let Some(mut heat) = self.acquire_heat(&mut shutdown).await? else {
                return Ok(());
            };
            info!(
                heat_id = heat.heat_id,
                first_pass_id = heat.first_pass_id,
                rtc_time_start = heat.rtc_time_start,
                "Running heat"
            );

            loop {
                tokio::select! {
                    _ = shutdown.recv() => return Ok(()),
                    _ = sleep(self.poll_interval) => {}
                }
                if self.poll_heat(&mut heat).await? == HeatPoll::Finished {
                    break;
                }
            }
        }
    }

    /// Adopt the unfinished heat, or create one. `Ok(None)` means shutdown
    /// was requested while waiting.
    pub async fn acquire_heat(&self, shutdown: &mut Shutdown) -> CoreResult<Option<ActiveHeat>> {
        // Settings are read through before a heat can be created
        let settings = db::settings::load(&self.pool).await?;
        let minimum_lap_time_us = (settings.minimum_lap_time * 1_000_000) as i64;

        if let Some(row) = db::heats::unfinished(&self.pool).await? {
            info!(heat_id = row.heat_id, "Resuming unfinished heat");
            return Ok(Some(ActiveHeat {
                heat_id: row.heat_id,
                first_pass_id: row.first_pass_id,
                rtc_time_start: row.rtc_time_start,
                rtc_time_end: row.rtc_time_end,
                rtc_time_max_end: row.rtc_time_max_end,
                race_flag: row.race_flag,
                minimum_lap_time_us,
            }));
        }

        // Wait for the green flag, then sample the device clock
        loop {
            if db::settings::green_flag(&self.pool).await? {
                break;
            }
            debug!("Waiting for green flag");
            tokio::select! {
                _ = shutdown.recv() => return Ok(None),
                _ = sleep(ACQUIRE_POLL_INTERVAL) => {}
            }
        }

        let Some(green_flag_time) = self.wait_device_clock(shutdown).await else {
            return Ok(None);
        };
        info!(green_flag_time, "Green flag is up");

        // Wait for the first passing after the green flag that is newer
        // than every pass already turned into a lap
        let starting_pass = loop {
            if let Some(pass) =
                db::passes::first_qualifying(&self.pool, green_flag_time as i64).await?
            {
                break pass;
            }
            debug!("Waiting on a new passing");
            tokio::select! {
                _ = shutdown.recv() => return Ok(None),
                _ = sleep(ACQUIRE_POLL_INTERVAL) => {}
            }
        };

        let rtc_time_start = starting_pass.rtc_time;
        let rtc_time_end = rtc_time_start + (settings.heat_duration * 1_000_000) as i64;
        let rtc_time_max_end =
            rtc_time_start + ((settings.heat_duration + settings.heat_cooldown) * 1_000_000) as i64;

        let heat_id = db::heats::insert(
            &self.pool,
            starting_pass.pass_id,
            rtc_time_start,
            rtc_time_end,
            rtc_time_max_end,
        )
        .await?;

        info!(
            heat_id,
            first_pass_id = starting_pass.pass_id,
            heat_duration = settings.heat_duration,
            "Created heat"
        );

        Ok(Some(ActiveHeat {
            heat_id,
            first_pass_id: starting_pass.pass_id,
            rtc_time_start,
            rtc_time_end,
            rtc_time_max_end,
            race_flag: FLAG_GREEN,
            minimum_lap_time_us,
        }))
    }

    /// One steady-state poll cycle.
    pub async fn poll_heat(&self, heat: &mut ActiveHeat) -> CoreResult<HeatPoll> {
        // Re-read the flag: an operator may close the race externally
        heat.race_flag = db::heats::race_flag(&self.pool, heat.heat_id).await?;
        if heat.race_flag == FLAG_CLOSED {
            info!(heat_id = heat.heat_id, "Race closed externally");
            self.finalize(heat).await?;
            return Ok(HeatPoll::Finished);
        }

        if self.all_transponders_finished(heat).await? {
            info!(heat_id = heat.heat_id, "Every transponder has finished");
            self.finalize(heat).await?;
            return Ok(HeatPoll::Finished);
        }

        let now = self.clock.now_us() as i64;
        let unprocessed =
            db::passes::unprocessed_for_heat(&self.pool, heat.first_pass_id, heat.rtc_time_max_end)
                .await?;

        if now > heat.rtc_time_end && heat.race_flag == FLAG_GREEN {
            self.wave_finish_flag(heat).await?;
        }

        if now > heat.rtc_time_max_end {
            info!(heat_id = heat.heat_id, "Cooldown elapsed");
            self.finalize(heat).await?;
            return Ok(HeatPoll::Finished);
        }

        for pass in unprocessed {
            if pass.rtc_time > heat.rtc_time_max_end {
                info!(
                    heat_id = heat.heat_id,
                    pass_id = pass.pass_id,
                    "Passing beyond the heat window"
                );
                self.finalize(heat).await?;
                return Ok(HeatPoll::Finished);
            }

            if self.valid_lap_time(heat, &pass).await? {
                db::laps::insert(
                    &self.pool,
                    heat.heat_id,
                    pass.pass_id,
                    pass.transponder_id,
                    pass.rtc_time,
                )
                .await?;
                info!(
                    heat_id = heat.heat_id,
                    pass_id = pass.pass_id,
                    transponder = pass.transponder_id,
                    "Lap recorded"
                );
            }
        }

        Ok(HeatPoll::Running)
    }

    /// Minimum-lap check. A passing closer to the transponder's previous
    /// lap than the minimum is a repeated detection of the same physical
    /// pass; it is deleted from `passes` and no lap is written.
    async fn valid_lap_time(&self, heat: &ActiveHeat, pass: &PassRow) -> CoreResult<bool> {
        let previous = db::laps::previous_lap_time(
            &self.pool,
            heat.heat_id,
            pass.transponder_id,
            pass.pass_id,
        )
        .await?
        .unwrap_or(0);

        if pass.rtc_time - previous > heat.minimum_lap_time_us {
            Ok(true)
        } else {
            debug!(
                pass_id = pass.pass_id,
                transponder = pass.transponder_id,
                "Dropping repeated detection"
            );
            db::passes::delete(&self.pool, pass.pass_id).await?;
            Ok(false)
        }
    }

    async fn wave_finish_flag(&self, heat: &mut ActiveHeat) -> CoreResult<()> {
        db::heats::wave_finish_flag(&self.pool, heat.heat_id).await?;
        heat.race_flag = FLAG_FINISH_WAVED;
        info!(heat_id = heat.heat_id, "Finish flag waved");
        Ok(())
    }

    /// Completion criterion (c): every transponder seen in the heat has a
    /// lap past the nominal end. Vacuously false before any lap exists.
    async fn all_transponders_finished(&self, heat: &ActiveHeat) -> CoreResult<bool> {
        let seen = db::laps::distinct_transponders(&self.pool, heat.heat_id).await?;
        if seen == 0 {
            return Ok(false);
        }
        let finished =
            db::laps::transponders_past(&self.pool, heat.heat_id, heat.rtc_time_end).await?;
        Ok(finished >= seen)
    }

    async fn finalize(&self, heat: &ActiveHeat) -> CoreResult<()> {
        let last_pass_id = db::laps::last_pass_id(&self.pool, heat.heat_id).await?;
        db::heats::finalize(&self.pool, heat.heat_id, last_pass_id).await?;
        info!(
            heat_id = heat.heat_id,
            last_pass_id = ?last_pass_id,
            "Heat finalized"
        );
        Ok(())
    }

    async fn wait_device_clock(&self, shutdown: &mut Shutdown) -> Option<u64> {
        loop {
            let now = self.clock.now_us();
            if now > 0 {
                return Some(now);
            }
            debug!("Waiting on device time");
            tokio::select! {
                _ = shutdown.recv() => return None,
                _ = sleep(ACQUIRE_POLL_INTERVAL) => {}
            }
        }
    }
}
