//! Signal-driven operator console.
//!
//! SIGUSR1 prints a one-line status, SIGUSR2 the ranked report. SIGINT and
//! SIGTERM arm a two-step shutdown: a second termination signal inside the
//! confirmation window stops the service, a later one re-arms instead, so a
//! single stray signal never takes the proxy down.
//!
//! Everything here writes to stdout with `println!` on purpose: status and
//! report output is the product's interface, not diagnostics.

use std::cell::RefCell;
use std::io;
use std::rc::Rc;
use std::time::{Duration, Instant};

use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::broadcast;
use tracing::info;

use crate::stats::StatsTable;

/// Window in which a second termination signal confirms the first.
const CONFIRM_WINDOW: Duration = Duration::from_secs(30);

/// How many ranked domains a report shows.
const REPORT_TOP_N: usize = 10;

/// Outcome of a termination request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// First request, or a stale one; the service keeps running.
    Armed,
    /// Second request inside the window; stop now.
    Confirmed,
}

/// Two-step termination confirmation.
#[derive(Debug, Default)]
pub struct ShutdownGuard {
    last_request: Option<Instant>,
}

impl ShutdownGuard {
    pub fn new() -> Self {
        Self { last_request: None }
    }

    /// Register a termination request observed at `now`.
    pub fn request(&mut self, now: Instant) -> Termination {
        match self.last_request {
            Some(prev) if now.duration_since(prev) < CONFIRM_WINDOW => Termination::Confirmed,
            _ => {
                self.last_request = Some(now);
                Termination::Armed
            }
        }
    }
}

/// Operator console task: owns the uptime clock and the shutdown trigger,
/// reads the stats table the collector writes.
pub struct Console {
    table: Rc<RefCell<StatsTable>>,
    started: Instant,
    shutdown: broadcast::Sender<()>,
}

impl Console {
    pub fn new(
        table: Rc<RefCell<StatsTable>>,
        started: Instant,
        shutdown: broadcast::Sender<()>,
    ) -> Self {
        Self {
            table,
            started,
            shutdown,
        }
    }

    /// Listen for operator signals until shutdown is confirmed, then
    /// broadcast it and return.
    pub async fn run(self) -> io::Result<()> {
        let mut interrupt = signal(SignalKind::interrupt())?;
        let mut terminate = signal(SignalKind::terminate())?;
        let mut status = signal(SignalKind::user_defined1())?;
        let mut report = signal(SignalKind::user_defined2())?;

        let mut guard = ShutdownGuard::new();

        loop {
            tokio::select! {
                _ = interrupt.recv() => {
                    if self.on_termination(&mut guard) {
                        break;
                    }
                }
                _ = terminate.recv() => {
                    if self.on_termination(&mut guard) {
                        break;
                    }
                }
                _ = status.recv() => {
                    println!("{}", self.status_line());
                }
                _ = report.recv() => {
                    println!("{}", self.status_line());
                    self.print_report();
                }
            }
        }

        info!("shutdown confirmed");
        // Nobody listening means the transports are already gone.
        let _ = self.shutdown.send(());
        Ok(())
    }

    /// Returns true once shutdown is confirmed.
    fn on_termination(&self, guard: &mut ShutdownGuard) -> bool {
        match guard.request(Instant::now()) {
            Termination::Confirmed => {
                println!("{}, stopping", self.status_line());
                true
            }
            Termination::Armed => {
                println!(
                    "{}, send the signal again within {}s to quit",
                    self.status_line(),
                    CONFIRM_WINDOW.as_secs()
                );
                self.print_report();
                false
            }
        }
    }

    fn status_line(&self) -> String {
        format!(
            "uptime {}, {} queries performed",
            format_uptime(self.started.elapsed()),
            self.table.borrow().total()
        )
    }

    fn print_report(&self) {
        println!("Query Statistics:");
        for line in self.table.borrow().report(REPORT_TOP_N) {
            println!("{}", line);
        }
    }
}

fn format_uptime(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    let hours = secs / 3600;
    let mins = (secs % 3600) / 60;
    let secs = secs % 60;

    if hours > 0 {
        format!("{}h{:02}m{:02}s", hours, mins, secs)
    } else if mins > 0 {
        format!("{}m{:02}s", mins, secs)
    } else {
        format!("{}s", secs)
    }
}
