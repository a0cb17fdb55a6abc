use std::{sync::Arc, time::Duration};

use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{interval, MissedTickBehavior},
};
use tracing::{debug, error, info};

use super::{
    repo::EntryStore,
    repo_types::{DailyStats, FoodEntry},
};
use crate::clock::{start_of_day, Clock};

/// Read side for the presentation layer: each receiver always holds the latest
/// complete snapshot.
#[derive(Clone)]
pub struct Views {
    pub recent_entries: watch::Receiver<Vec<FoodEntry>>,
    pub today_entries: watch::Receiver<Vec<FoodEntry>>,
    pub daily_stats: watch::Receiver<DailyStats>,
    pub day_start: watch::Receiver<i64>,
}

struct Publishers {
    recent_entries: watch::Sender<Vec<FoodEntry>>,
    today_entries: watch::Sender<Vec<FoodEntry>>,
    daily_stats: watch::Sender<DailyStats>,
    day_start: watch::Sender<i64>,
}

/// Replace the value only when it differs, so subscribers never wake for a no-op.
fn publish<T: PartialEq>(tx: &watch::Sender<T>, next: T) -> bool {
    tx.send_if_modified(|cur| {
        if *cur == next {
            false
        } else {
            *cur = next;
            true
        }
    })
}

impl Publishers {
    async fn refresh_entries(&self, store: &EntryStore) {
        match store.list_all().await {
            Ok(rows) => {
                publish(&self.recent_entries, rows);
            }
            Err(e) => error!(error = %e, "list entries failed"),
        }
    }

    /// Today's rows are published before the totals, so a reader that saw new
    /// totals also sees the rows behind them.
    async fn refresh_today(&self, store: &EntryStore) {
        let start = *self.day_start.borrow();
        match store.list_since(start).await {
            Ok(rows) => {
                publish(&self.today_entries, rows);
            }
            Err(e) => error!(error = %e, start, "list today entries failed"),
        }
        match store.daily_stats(start).await {
            Ok(stats) => {
                if publish(&self.daily_stats, stats) {
                    debug!(calories = stats.calories, start, "daily stats updated");
                }
            }
            Err(e) => error!(error = %e, start, "daily stats failed"),
        }
    }
}

/// Start the aggregator task.
///
/// The task re-derives every view when the store reports a write, and
/// recomputes the day boundary every `refresh`; a tick that lands on the same
/// boundary does not query the store. The task ends when every [`Views`] clone
/// is dropped.
pub fn spawn(store: EntryStore, clock: Arc<dyn Clock>, refresh: Duration) -> (Views, JoinHandle<()>) {
    let initial_start = start_of_day(clock.now());
    let (recent_tx, recent_rx) = watch::channel(Vec::new());
    let (today_tx, today_rx) = watch::channel(Vec::new());
    let (stats_tx, stats_rx) = watch::channel(DailyStats::default());
    let (start_tx, start_rx) = watch::channel(initial_start);

    let publishers = Publishers {
        recent_entries: recent_tx,
        today_entries: today_tx,
        daily_stats: stats_tx,
        day_start: start_tx,
    };
    let mut changes = store.subscribe();

    let handle = tokio::spawn(async move {
        changes.borrow_and_update();
        publishers.refresh_entries(&store).await;
        publishers.refresh_today(&store).await;

        let mut tick = interval(refresh);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // the first tick completes immediately and the boundary is already fresh
        tick.tick().await;

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    let start = start_of_day(clock.now());
                    if publish(&publishers.day_start, start) {
                        info!(start, "day boundary rolled over");
                        publishers.refresh_today(&store).await;
                    }
                }
                _ = publishers.daily_stats.closed() => {
                    debug!("no view subscribers left; stopping views");
                    break;
                }
                changed = changes.changed() => {
                    if changed.is_err() {
                        debug!("entry store dropped; stopping views");
                        break;
                    }
                    changes.borrow_and_update();
                    publishers.refresh_entries(&store).await;
                    publishers.refresh_today(&store).await;
                }
            }
        }
    });

    (
        Views {
            recent_entries: recent_rx,
            today_entries: today_rx,
            daily_stats: stats_rx,
            day_start: start_rx,
        },
        handle,
    )
}
