//! Tick Scheduler Implementation

use broadcast::{BroadcastPool, ConsumerRegistry, DEFAULT_POOL_SIZE};
use crank_physics::{EngineHandle, PhysicsEngine};
use metrics::counter;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use telemetry_protocol::serialize_state;
use tracing::{debug, info, warn};

/// Configuration for the tick scheduler
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Target tick period (default: 10 ms, 100 Hz)
    pub tick_period: Duration,
    /// How often the stats line is logged (default: 2 s)
    pub stats_interval: Duration,
    /// Number of rotating broadcast slots
    pub pool_size: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_period: Duration::from_millis(10),
            stats_interval: Duration::from_secs(2),
            pool_size: DEFAULT_POOL_SIZE,
        }
    }
}

/// Result of a single tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickReport {
    /// State was serialized and handed to consumers
    Broadcast { delivered: usize, evicted: usize },
    /// Serialization produced nothing, no broadcast this tick
    Skipped,
}

/// Cumulative counters since the scheduler started
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickStats {
    pub ticks: u64,
    pub broadcasts: u64,
    pub skipped: u64,
    /// Ticks whose processing exceeded the period (no sleep)
    pub overruns: u64,
    pub evicted: u64,
}

/// Owns the engine and the broadcast pool; shares the registry with the
/// transport layer.
pub struct TickScheduler {
    engine: PhysicsEngine,
    pool: BroadcastPool,
    registry: Arc<ConsumerRegistry>,
    config: SchedulerConfig,
    stats: TickStats,
    window_start: Instant,
    window_broadcasts: u64,
}

impl TickScheduler {
    /// Create a new scheduler around `engine`
    pub fn new(
        engine: PhysicsEngine,
        registry: Arc<ConsumerRegistry>,
        config: SchedulerConfig,
    ) -> Self {
        info!(
            "Tick scheduler created: period={:?}, pool_size={}",
            config.tick_period, config.pool_size
        );
        Self {
            engine,
            pool: BroadcastPool::new(config.pool_size),
            registry,
            config,
            stats: TickStats::default(),
            window_start: Instant::now(),
            window_broadcasts: 0,
        }
    }

    /// Shared engine handle for control input and snapshot reads
    pub fn handle(&self) -> Arc<EngineHandle> {
        self.engine.handle()
    }

    pub fn engine(&self) -> &PhysicsEngine {
        &self.engine
    }

    pub fn stats(&self) -> TickStats {
        self.stats
    }

    /// Step, serialize into the next slot, fan out
    pub fn tick_once(&mut self) -> TickReport {
        let state = self.engine.step();
        self.stats.ticks += 1;

        let slot = self.pool.next(|buf| serialize_state(&state, buf));

        if slot.is_empty() {
            self.stats.skipped += 1;
            debug!(tick = self.engine.tick(), "State did not fit slot, skipping broadcast");
            return TickReport::Skipped;
        }

        let report = self.registry.dispatch(&slot);
        self.stats.broadcasts += 1;
        self.stats.evicted += report.evicted as u64;
        self.window_broadcasts += 1;
        counter!("crank_broadcast_ticks_total").increment(1);

        TickReport::Broadcast {
            delivered: report.delivered,
            evicted: report.evicted,
        }
    }

    fn maybe_log_stats(&mut self, now: Instant) {
        let elapsed = now.duration_since(self.window_start);
        if elapsed < self.config.stats_interval {
            return;
        }

        let rate = self.window_broadcasts as f64 / elapsed.as_secs_f64();
        info!(
            clients = self.registry.len(),
            broadcast_rate_hz = rate,
            rpm = self.engine.rpm(),
            overruns = self.stats.overruns,
            "stats"
        );
        self.window_broadcasts = 0;
        self.window_start = now;
    }

    /// Run until `shutdown` is set, checked at the top of every tick.
    ///
    /// Sleeps for whatever remains of the period after each tick. A tick
    /// that overran is followed immediately by the next one, so sustained
    /// overload lowers the effective rate rather than stalling.
    pub fn run(&mut self, shutdown: &AtomicBool) -> TickStats {
        info!("Starting tick scheduler");
        self.window_start = Instant::now();

        while !shutdown.load(Ordering::Relaxed) {
            let tick_start = Instant::now();

            self.tick_once();
            self.maybe_log_stats(Instant::now());

            let elapsed = tick_start.elapsed();
            match self.config.tick_period.checked_sub(elapsed) {
                Some(remaining) if !remaining.is_zero() => thread::sleep(remaining),
                _ => {
                    self.stats.overruns += 1;
                    counter!("crank_tick_overruns_total").increment(1);
                    debug!(elapsed_us = elapsed.as_micros() as u64, "Tick overran period");
                }
            }
        }

        info!(
            ticks = self.stats.ticks,
            broadcasts = self.stats.broadcasts,
            "Tick scheduler stopped"
        );
        self.stats
    }

    /// Move the scheduler onto its own named thread
    pub fn spawn(mut self, shutdown: Arc<AtomicBool>) -> std::io::Result<JoinHandle<TickStats>> {
        thread::Builder::new()
            .name("sim-tick".into())
            .spawn(move || self.run(&shutdown))
            .map_err(|e| {
                warn!("Failed to spawn tick thread: {}", e);
                e
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn scheduler(config: SchedulerConfig) -> (TickScheduler, Arc<ConsumerRegistry>) {
        let registry = Arc::new(ConsumerRegistry::default());
        let scheduler = TickScheduler::new(
            PhysicsEngine::with_rpm(1200.0),
            Arc::clone(&registry),
            config,
        );
        (scheduler, registry)
    }

    #[test]
    fn test_scheduler_creation() {
        let (scheduler, _) = scheduler(SchedulerConfig::default());
        assert_eq!(scheduler.stats(), TickStats::default());
        assert_eq!(scheduler.engine().tick(), 0);
    }

    #[test]
    fn test_tick_without_consumers_still_broadcasts() {
        let (mut scheduler, _) = scheduler(SchedulerConfig::default());
        let report = scheduler.tick_once();
        assert_eq!(report, TickReport::Broadcast { delivered: 0, evicted: 0 });
        assert_eq!(scheduler.stats().broadcasts, 1);
        assert_eq!(scheduler.engine().history().len(), 1);
    }

    #[test]
    fn test_consumers_receive_same_slot() {
        let (mut scheduler, registry) = scheduler(SchedulerConfig::default());
        let mut subs: Vec<_> = (0..3).map(|_| registry.register()).collect();

        let report = scheduler.tick_once();
        assert_eq!(report, TickReport::Broadcast { delivered: 3, evicted: 0 });

        let slots: Vec<_> = subs.iter_mut().map(|s| s.try_recv().unwrap()).collect();
        assert!(slots.iter().all(|s| s.as_bytes() == slots[0].as_bytes()));

        let value: Value = serde_json::from_slice(slots[0].as_bytes()).unwrap();
        assert_eq!(value["type"], "state");
        let ts = value["payload"]["timestamp_ms"].as_u64().unwrap();
        assert_eq!(ts, scheduler.handle().snapshot().timestamp_ms);
        assert_eq!(Some(ts), scheduler.engine().history().latest().map(|s| s.timestamp_ms));
    }

    #[test]
    fn test_control_target_applies_on_next_tick() {
        let (mut scheduler, _) = scheduler(SchedulerConfig::default());
        let handle = scheduler.handle();
        handle.set_rpm_target(9999.0);

        for _ in 0..2000 {
            scheduler.tick_once();
            assert!(handle.snapshot().rpm <= crank_physics::constants::RPM_MAX);
        }
        assert_eq!(handle.rpm_target(), crank_physics::constants::RPM_MAX);
        assert!(handle.snapshot().rpm > 7990.0);
    }

    #[test]
    fn test_run_exits_on_preset_shutdown() {
        let (mut scheduler, _) = scheduler(SchedulerConfig::default());
        let shutdown = AtomicBool::new(true);
        let stats = scheduler.run(&shutdown);
        assert_eq!(stats.ticks, 0);
    }

    #[test]
    fn test_spawned_loop_ticks_and_stops() {
        let config = SchedulerConfig {
            tick_period: Duration::from_millis(2),
            stats_interval: Duration::from_millis(20),
            ..Default::default()
        };
        let (scheduler, _) = scheduler(config);
        let handle = scheduler.handle();
        let shutdown = Arc::new(AtomicBool::new(false));

        let join = scheduler.spawn(Arc::clone(&shutdown)).unwrap();
        thread::sleep(Duration::from_millis(100));
        shutdown.store(true, Ordering::Relaxed);
        let stats = join.join().unwrap();

        assert!(stats.ticks > 5);
        assert_eq!(stats.ticks, stats.broadcasts + stats.skipped);
        assert_eq!(handle.published_ticks(), stats.ticks);
    }

    #[test]
    fn test_zero_period_counts_overruns() {
        let config = SchedulerConfig {
            tick_period: Duration::ZERO,
            ..Default::default()
        };
        let (scheduler, _) = scheduler(config);
        let shutdown = Arc::new(AtomicBool::new(false));

        let join = scheduler.spawn(Arc::clone(&shutdown)).unwrap();
        thread::sleep(Duration::from_millis(20));
        shutdown.store(true, Ordering::Relaxed);
        let stats = join.join().unwrap();

        assert_eq!(stats.overruns, stats.ticks);
    }
}
