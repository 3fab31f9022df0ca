//! Per-domain query statistics.
//!
//! Every handled query produces one `QueryEvent` on a bounded queue; a
//! single collector task folds events into the `StatsTable`. Collapsing
//! all writers into one serialized stream keeps the table lock-free, and
//! a full queue applies backpressure to producers instead of losing data.

use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashMap;
use tokio::sync::mpsc;
use tracing::info;

use crate::dns::RecordType;

/// Capacity of the event queue between query handlers and the collector.
pub const EVENT_QUEUE_CAPACITY: usize = 10;

/// One record per handled query, emitted before the reply is produced.
#[derive(Debug, Clone)]
pub struct QueryEvent {
    /// Queried name, lowercase trailing-dot form.
    pub name: String,
    pub rtype: RecordType,
    /// True when the query was answered locally instead of forwarded.
    pub filtered: bool,
}

/// Counters for one root domain. Counts only ever go up.
#[derive(Debug)]
pub struct DomainStats {
    pub root: String,
    /// Queries seen for this root, filtered or not.
    pub frequency: u64,
    /// Queries answered locally by the AAAA filter.
    pub filtered: u64,
    /// Per record type breakdown; values sum to `frequency`.
    pub by_type: FxHashMap<RecordType, u64>,
}

/// Grouping key for statistics: the last two labels of a name.
///
/// Expects trailing-dot form. Names with fewer than two labels ahead of
/// the root group under the empty key. Multi-label public suffixes are not
/// recognized (`a.example.co.uk.` groups as `co.uk`).
pub fn root_domain(name: &str) -> String {
    let labels: Vec<&str> = name.split('.').collect();
    if labels.len() > 2 {
        format!("{}.{}", labels[labels.len() - 3], labels[labels.len() - 2])
    } else {
        String::new()
    }
}

/// Aggregate query counters, owned by the collector task.
///
/// Entries are append-only; `ranked` holds entry indices ordered by
/// descending frequency and is the view reports iterate.
pub struct StatsTable {
    total: u64,
    entries: Vec<DomainStats>,
    index: FxHashMap<String, usize>,
    ranked: Vec<usize>,
}

impl StatsTable {
    pub fn new() -> Self {
        Self {
            total: 0,
            entries: Vec::new(),
            index: FxHashMap::default(),
            ranked: Vec::new(),
        }
    }

    /// Fold one event into the table.
    pub fn record(&mut self, event: &QueryEvent) {
        self.total += 1;

        let root = root_domain(&event.name);
        let slot = match self.index.get(&root) {
            Some(&slot) => slot,
            None => {
                let slot = self.entries.len();
                self.entries.push(DomainStats {
                    root: root.clone(),
                    frequency: 0,
                    filtered: 0,
                    by_type: FxHashMap::default(),
                });
                self.index.insert(root, slot);
                self.ranked.push(slot);
                slot
            }
        };

        let entry = &mut self.entries[slot];
        entry.frequency += 1;
        if event.filtered {
            entry.filtered += 1;
        }
        *entry.by_type.entry(event.rtype).or_insert(0) += 1;

        // A domain's first event cannot change the order; anything later can.
        // Stable sort keeps arrival order among equal frequencies.
        if self.entries[slot].frequency > 1 {
            let entries = &self.entries;
            self.ranked
                .sort_by(|&a, &b| entries[b].frequency.cmp(&entries[a].frequency));
        }
    }

    /// Total events folded in, filtered or not.
    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn get(&self, root: &str) -> Option<&DomainStats> {
        self.index.get(root).map(|&slot| &self.entries[slot])
    }

    /// Entries ordered by descending frequency.
    pub fn ranked(&self) -> impl Iterator<Item = &DomainStats> + '_ {
        self.ranked.iter().map(|&slot| &self.entries[slot])
    }

    /// Render up to `n` ranked entries in the operator report format.
    pub fn report(&self, n: usize) -> Vec<String> {
        self.ranked()
            .take(n)
            .map(|entry| {
                let mut line = format!("{:>25}: {:>3} queries", entry.root, entry.frequency);
                if entry.filtered > 0 {
                    line.push_str(&format!(", {:>3} dropped", entry.filtered));
                }
                line
            })
            .collect()
    }
}

impl Default for StatsTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Drain the event queue into the table until every sender is gone.
///
/// Returning only after the queue closes is what makes shutdown graceful:
/// events already queued are always counted before the process exits.
pub async fn run_collector(mut events: mpsc::Receiver<QueryEvent>, table: Rc<RefCell<StatsTable>>) {
    while let Some(event) = events.recv().await {
        table.borrow_mut().record(&event);
    }
    info!("stats collector stopping");
}
