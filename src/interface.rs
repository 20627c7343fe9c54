//! Interface worker orchestration.
//!
//! One dedicated thread owns the device, the ARP responder and its
//! broadcast table. It polls the device without blocking, handles one frame
//! per iteration and sleeps a fixed backoff when nothing arrived, draining
//! the manual injection channel at that point. Statistics are shared with
//! the reporting side behind a mutex.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use metrics::counter;
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::network::{
    ArpResponder, Buffer, Decision, Device, Injector, Packet, ResponderConfig, to_hex,
};
use crate::protocol::ETHERNET_MAX_FRAME_LEN;

/// Default sleep between two empty device reads.
pub const DEFAULT_IDLE_BACKOFF: Duration = Duration::from_millis(30);

/// Settings for one interface worker.
#[derive(Debug, Clone)]
pub struct InterfaceConfig {
    pub responder: ResponderConfig,
    pub idle_backoff: Duration,
}

/// Packet and byte count in one direction.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Counters {
    pub packets: u64,
    pub bytes: u64,
}

impl Counters {
    fn add(&mut self, bytes: usize) {
        self.packets += 1;
        self.bytes += bytes as u64;
    }
}

/// Aggregate activity counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    pub received: Counters,
    pub sent: Counters,
    pub replies: u64,
    pub rebroadcasts: u64,
    pub suppressed: u64,
    pub ignored: u64,
    pub dropped: u64,
    pub injected: u64,
    pub write_errors: u64,
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "rx {} pkt/{} B, tx {} pkt/{} B, replies {}, rebroadcast {}, suppressed {}, \
             ignored {}, dropped {}, injected {}, write errors {}",
            self.received.packets,
            self.received.bytes,
            self.sent.packets,
            self.sent.bytes,
            self.replies,
            self.rebroadcasts,
            self.suppressed,
            self.ignored,
            self.dropped,
            self.injected,
            self.write_errors,
        )
    }
}

/// Counters for the last reporting period and since start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsReport {
    pub period: Stats,
    pub total: Stats,
    pub elapsed: Duration,
}

impl fmt::Display for StatsReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "last {:.1}s: {} | total: {}",
            self.elapsed.as_secs_f64(),
            self.period,
            self.total
        )
    }
}

#[derive(Debug)]
struct StatsState {
    period: Stats,
    total: Stats,
    since: Instant,
}

impl StatsState {
    fn new() -> Self {
        Self {
            period: Stats::default(),
            total: Stats::default(),
            since: Instant::now(),
        }
    }

    fn record(&mut self, update: impl Fn(&mut Stats)) {
        update(&mut self.period);
        update(&mut self.total);
    }

    fn take_report(&mut self) -> StatsReport {
        let now = Instant::now();
        let report = StatsReport {
            period: std::mem::take(&mut self.period),
            total: self.total,
            elapsed: now.saturating_duration_since(self.since),
        };
        self.since = now;
        report
    }
}

/// Outcome of one [`FrameLoop::poll_once`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
    /// The device had nothing to read.
    Idle,
    /// One frame was read and handled, successfully or not.
    Handled,
}

/// Per-frame state machine over a [`Device`].
pub struct FrameLoop<D> {
    device: D,
    responder: ArpResponder,
    injector: Option<Injector>,
    stats: Arc<Mutex<StatsState>>,
    next_index: u64,
}

impl<D: Device> FrameLoop<D> {
    pub fn new(device: D, responder: ArpResponder, injector: Option<Injector>) -> Self {
        Self {
            device,
            responder,
            injector,
            stats: Arc::new(Mutex::new(StatsState::new())),
            next_index: 0,
        }
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn responder(&self) -> &ArpResponder {
        &self.responder
    }

    /// Snapshot and reset the period counters.
    pub fn report(&self) -> StatsReport {
        self.stats.lock().take_report()
    }

    fn record(&self, update: impl Fn(&mut Stats)) {
        self.stats.lock().record(update);
    }

    /// Read and handle at most one frame.
    ///
    /// Failures never escape: malformed frames and device errors are logged
    /// and counted, and the loop carries on with the next frame.
    pub fn poll_once(&mut self, now: Instant) -> Activity {
        let mut frame = [0u8; ETHERNET_MAX_FRAME_LEN];
        let len = match self.device.read(&mut frame) {
            Ok(0) => return Activity::Idle,
            Ok(len) => len,
            Err(err) => {
                warn!(error = %err, "device read failed");
                return Activity::Idle;
            }
        };

        let index = self.next_index;
        self.next_index += 1;
        self.record(|stats| stats.received.add(len));
        counter!("taplink_frames_received_total").increment(1);

        let buffer = match Buffer::borrowed(&mut frame, len) {
            Ok(buffer) => buffer,
            Err(err) => {
                error!(index, len, error = %err, "device returned an oversized frame");
                self.record(|stats| stats.dropped += 1);
                return Activity::Handled;
            }
        };

        let packet = match Packet::parse(index, buffer) {
            Ok(packet) => packet,
            Err(err) => {
                warn!(
                    index = err.index,
                    offset = err.offset,
                    len = err.len,
                    error = %err.source,
                    "dropping malformed frame"
                );
                debug!(index, frame = %to_hex(&frame[..len]), "malformed frame bytes");
                self.record(|stats| stats.dropped += 1);
                counter!("taplink_frames_dropped_total").increment(1);
                return Activity::Handled;
            }
        };

        match self.responder.decide(&packet, now) {
            Ok(Decision::Answer(reply)) => {
                if self.transmit(index, reply.as_bytes()) {
                    self.record(|stats| stats.replies += 1);
                    counter!("taplink_arp_replies_total").increment(1);
                }
            }
            Ok(Decision::Rebroadcast) => {
                if self.transmit(index, packet.as_bytes()) {
                    self.record(|stats| stats.rebroadcasts += 1);
                    counter!("taplink_arp_rebroadcasts_total").increment(1);
                }
            }
            Ok(Decision::Suppress) => {
                self.record(|stats| stats.suppressed += 1);
                counter!("taplink_arp_suppressed_total").increment(1);
            }
            Ok(Decision::Ignore) => self.record(|stats| stats.ignored += 1),
            Err(err) => {
                warn!(
                    index = err.index,
                    offset = err.offset,
                    len = err.len,
                    error = %err.source,
                    "failed to build ARP reply"
                );
                debug!(
                    index,
                    frame = %packet.buffer().hex(0, packet.len()),
                    "request frame bytes"
                );
                self.record(|stats| stats.dropped += 1);
            }
        }
        Activity::Handled
    }

    /// Write every pending injected frame. Returns how many were written.
    pub fn drain_injector(&mut self) -> usize {
        let Some(injector) = self.injector.as_mut() else {
            return 0;
        };
        let frames = injector.poll();
        let mut written = 0;
        for frame in &frames {
            debug!(len = frame.len(), "injecting frame");
            if self.transmit(self.next_index, frame) {
                written += 1;
                self.record(|stats| stats.injected += 1);
            }
        }
        written
    }

    /// Write one frame; short writes are reported, never retried.
    fn transmit(&mut self, index: u64, frame: &[u8]) -> bool {
        match self.device.write(frame) {
            Ok(written) if written == frame.len() => {
                self.record(|stats| stats.sent.add(written));
                counter!("taplink_frames_sent_total").increment(1);
                true
            }
            Ok(written) => {
                error!(
                    index,
                    written,
                    expected = frame.len(),
                    "short write to device"
                );
                self.record(|stats| stats.write_errors += 1);
                false
            }
            Err(err) => {
                error!(index, error = %err, "device write failed");
                self.record(|stats| stats.write_errors += 1);
                false
            }
        }
    }

    /// Poll until `running` is cleared. The frame in flight always
    /// completes before the flag is checked again.
    pub fn run(&mut self, running: &AtomicBool, idle_backoff: Duration) {
        while running.load(Ordering::SeqCst) {
            if self.poll_once(Instant::now()) == Activity::Idle {
                thread::sleep(idle_backoff);
                self.drain_injector();
            }
        }
    }
}

/// A running interface worker.
///
/// Dropping the handle stops the worker and joins it.
pub struct Interface {
    running: Arc<AtomicBool>,
    stats: Arc<Mutex<StatsState>>,
    worker: Option<JoinHandle<()>>,
}

impl Interface {
    /// Spawn the worker thread for `device`.
    pub fn start<D>(config: InterfaceConfig, device: D, injector: Option<Injector>) -> Result<Self>
    where
        D: Device + 'static,
    {
        let responder = ArpResponder::new(config.responder.clone());
        let mut frame_loop = FrameLoop::new(device, responder, injector);
        let stats = Arc::clone(&frame_loop.stats);
        let running = Arc::new(AtomicBool::new(true));

        let flag = Arc::clone(&running);
        let idle_backoff = config.idle_backoff;
        let worker = thread::Builder::new()
            .name("taplink-worker".into())
            .spawn(move || {
                info!("Interface worker started");
                frame_loop.run(&flag, idle_backoff);
                info!("Interface worker stopped");
            })?;

        info!(
            "Answering ARP for {} as {}",
            config.responder.local_ip, config.responder.local_mac
        );
        Ok(Self {
            running,
            stats,
            worker: Some(worker),
        })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
            && self
                .worker
                .as_ref()
                .is_some_and(|worker| !worker.is_finished())
    }

    /// Snapshot and reset the period counters.
    pub fn report(&self) -> StatsReport {
        self.stats.lock().take_report()
    }

    /// Ask the worker to stop and wait for it.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(worker) = self.worker.take()
            && worker.join().is_err()
        {
            error!("Interface worker panicked");
        }
    }
}

impl Drop for Interface {
    fn drop(&mut self) {
        self.stop();
    }
}
