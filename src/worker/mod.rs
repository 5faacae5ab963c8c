//! The thread manager: keeps the right number of worker threads running,
//! harvests their exit status, and drives the periodic throughput report.
//!
//! The manager has no idea what a worker thread actually does; that is
//! entirely the job of the `routine` closure handed to [`ThreadManager::manage`].
//! It only tracks enable/started/running bookkeeping per slot and collects
//! each slot's [`PerfStats`].

use crate::command::{Command, CommandChannel};
use crate::report::report;
use crate::stats::PerfStats;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// A job spawned per slot. Receives its slot index, display name, a
/// running flag it must clear just before returning, and a shared stats
/// handle to record transfers into. Returns the exit-status bitmask.
pub type Job = Arc<
    dyn Fn(usize, String, Arc<AtomicBool>, Arc<Mutex<PerfStats>>) -> u32 + Send + Sync,
>;

struct Slot {
    name: String,
    enabled: bool,
    started: bool,
    running: Arc<AtomicBool>,
    stats: Arc<Mutex<PerfStats>>,
    handle: Option<thread::JoinHandle<u32>>,
}

impl Slot {
    fn new(name: String) -> Self {
        Slot {
            name,
            enabled: false,
            started: false,
            running: Arc::new(AtomicBool::new(false)),
            stats: Arc::new(Mutex::new(PerfStats::new())),
            handle: None,
        }
    }
}

/// Owns the fixed set of worker slots for one run and drives them to
/// completion.
pub struct ThreadManager {
    slots: Vec<Slot>,
}

impl ThreadManager {
    /// One slot per `names` entry; slots are started lazily as
    /// [`manage`](Self::manage) ramps up toward the requested thread count.
    pub fn new(names: Vec<String>) -> Self {
        ThreadManager { slots: names.into_iter().map(Slot::new).collect() }
    }

    /// Run the management loop until every slot has started and finished
    /// at least once (or the run is shut down before any of them start).
    ///
    /// `update_interval` doubles as the throughput-report cadence and the
    /// `changeNumThreads` poll window. Returns the OR of every slot's exit
    /// status.
    pub fn manage(
        &mut self,
        job: Job,
        initial_threads: usize,
        update_interval: Duration,
        halt_on_error: bool,
        shutdown: &Arc<AtomicBool>,
        commands: &mut CommandChannel,
        zombie: bool,
        tag: Option<&str>,
    ) -> u32 {
        let mut status = 0u32;
        let mut wanted = initial_threads;
        let mut enabled = 0usize;
        let available_total = self.slots.len();

        let mut prev = PerfStats::new();
        let mut time_prev = Instant::now();

        loop {
            if shutdown.load(Ordering::Acquire) {
                wanted = 0;
            }

            // harvest finished threads
            for slot in &mut self.slots {
                if slot.started && !slot.running.load(Ordering::Acquire) {
                    if slot.enabled {
                        slot.enabled = false;
                        enabled -= 1;
                        if let Some(handle) = slot.handle.take() {
                            if let Ok(bits) = handle.join() {
                                status |= bits;
                            }
                        }
                        if status != 0 && halt_on_error {
                            shutdown.store(true, Ordering::Release);
                        }
                    }
                }
            }

            // start new slots up to `wanted`
            while enabled < wanted {
                let next = self.slots.iter_mut().position(|s| !s.started);
                let Some(idx) = next else { break };
                let slot = &mut self.slots[idx];

                slot.enabled = true;
                let running = Arc::new(AtomicBool::new(true)); // birth-order: true before spawn returns
                let stats = slot.stats.clone();
                let name = slot.name.clone();
                let running_for_thread = running.clone();
                let job = job.clone();
                let handle = thread::spawn(move || {
                    let bits = job(idx, name, running_for_thread.clone(), stats);
                    running_for_thread.store(false, Ordering::Release);
                    bits
                });
                slot.running = running;
                slot.handle = Some(handle);
                slot.started = true;
                enabled += 1;
            }

            // bookkeeping-only shrink: stop counting excess slots as
            // "enabled" so they are not restarted, but do not force-kill
            // the underlying thread (it notices shutdown/quota on its own).
            while enabled > wanted {
                let Some(slot) = self.slots.iter_mut().find(|s| s.enabled) else { break };
                slot.enabled = false;
                enabled -= 1;
            }

            let update_secs = update_interval.as_secs().max(1) as u32;
            match commands.wait(update_secs, zombie) {
                Command::SetThreads(n) => wanted = n as usize,
                Command::Shutdown => shutdown.store(true, Ordering::Release),
                Command::NoChange => {}
            }

            let mut running_count = 0usize;
            let mut sum = PerfStats::new();
            let time_now = Instant::now();
            for slot in &self.slots {
                sum += &*slot.stats.lock().unwrap();
                if slot.running.load(Ordering::Acquire) {
                    running_count += 1;
                }
            }

            let mut delta = sum.clone();
            delta -= &prev;
            let delta_us = time_now.duration_since(time_prev).as_micros() as i64;
            report(tag, running_count as u32, delta_us, &delta);

            prev = sum;
            time_prev = time_now;

            let available = if shutdown.load(Ordering::Acquire) {
                0
            } else {
                available_total - self.slots.iter().filter(|s| s.started).count()
            };
            if available == 0 && running_count == 0 {
                break;
            }
        }

        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn runs_every_slot_exactly_once_and_collects_status() {
        let names: Vec<String> = (0..3).map(|i| format!("w{i}")).collect();
        let mut mgr = ThreadManager::new(names);
        let shutdown = Arc::new(AtomicBool::new(false));
        let mut commands = CommandChannel::new();
        let runs = Arc::new(AtomicUsize::new(0));
        let runs2 = runs.clone();

        let job: Job = Arc::new(move |_idx, _name, _running, stats| {
            runs2.fetch_add(1, Ordering::SeqCst);
            stats.lock().unwrap().xfer_done(1024, 10);
            0
        });

        let status = mgr.manage(
            job,
            2,
            Duration::from_millis(1),
            false,
            &shutdown,
            &mut commands,
            false,
            None,
        );

        assert_eq!(status, 0);
        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn propagates_nonzero_exit_status() {
        let names = vec!["w0".to_string()];
        let mut mgr = ThreadManager::new(names);
        let shutdown = Arc::new(AtomicBool::new(false));
        let mut commands = CommandChannel::new();

        let job: Job = Arc::new(|_idx, _name, _running, _stats| crate::error::OUTPUT_FILE_ERROR);

        let status = mgr.manage(
            job,
            1,
            Duration::from_millis(1),
            false,
            &shutdown,
            &mut commands,
            false,
            None,
        );

        assert_eq!(status, crate::error::OUTPUT_FILE_ERROR);
    }

    /// End-to-end scenario 5: start with zero wanted threads (a pool larger
    /// than zero slots started), then shut down before any slot ever runs.
    /// The un-started slack slots must not keep `available` nonzero forever.
    #[test]
    fn shutdown_before_any_slot_starts_still_terminates() {
        let names: Vec<String> = (0..100).map(|i| format!("w{i}")).collect();
        let mut mgr = ThreadManager::new(names);
        let shutdown = Arc::new(AtomicBool::new(false));
        let mut commands = CommandChannel::new();

        let shutdown_for_thread = shutdown.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            shutdown_for_thread.store(true, Ordering::Release);
        });

        let job: Job = Arc::new(|_idx, _name, _running, _stats| 0);

        let status = mgr.manage(
            job,
            0,
            Duration::from_millis(5),
            false,
            &shutdown,
            &mut commands,
            false,
            None,
        );

        assert_eq!(status, 0);
    }
}
