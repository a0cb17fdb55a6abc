use std::sync::Mutex;

use time::{Duration, OffsetDateTime, Time, UtcOffset};

/// Source of "now" in the device's local offset.
pub trait Clock: Send + Sync {
    fn now(&self) -> OffsetDateTime;

    fn now_millis(&self) -> i64 {
        to_millis(self.now())
    }
}

type OffsetLookup = Box<dyn Fn() -> Option<UtcOffset> + Send + Sync>;

/// Wall clock in either a configured fixed offset or the device's current
/// local offset, looked up on every read so DST changes apply without a restart.
pub struct SystemClock {
    fixed: Option<UtcOffset>,
    lookup: OffsetLookup,
    last: Mutex<UtcOffset>,
}

impl SystemClock {
    pub fn fixed(offset: UtcOffset) -> Self {
        Self {
            fixed: Some(offset),
            lookup: Box::new(|| None),
            last: Mutex::new(offset),
        }
    }

    /// Follow the system timezone.
    pub fn local() -> Self {
        Self::following(local_offset)
    }

    /// Follow whatever `lookup` reports; when it has no answer the last known
    /// offset is kept (UTC before the first answer).
    pub fn following(lookup: impl Fn() -> Option<UtcOffset> + Send + Sync + 'static) -> Self {
        let initial = lookup().unwrap_or(UtcOffset::UTC);
        Self {
            fixed: None,
            lookup: Box::new(lookup),
            last: Mutex::new(initial),
        }
    }

    /// `LOCAL_UTC_OFFSET_MINUTES` pins the offset; without it the clock follows the system.
    pub fn from_config(minutes: Option<i32>) -> Self {
        match minutes.and_then(fixed_offset) {
            Some(offset) => Self::fixed(offset),
            None => Self::local(),
        }
    }

    pub fn offset(&self) -> UtcOffset {
        if let Some(offset) = self.fixed {
            return offset;
        }
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        match (self.lookup)() {
            Some(offset) => {
                if *last != offset {
                    let previous = *last;
                    tracing::info!(from = %previous, to = %offset, "local utc offset changed");
                    *last = offset;
                }
                offset
            }
            None => *last,
        }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc().to_offset(self.offset())
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<OffsetDateTime>,
}

impl ManualClock {
    pub fn new(start: OffsetDateTime) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, at: OffsetDateTime) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = at;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> OffsetDateTime {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

pub fn to_millis(at: OffsetDateTime) -> i64 {
    (at.unix_timestamp_nanos() / 1_000_000) as i64
}

/// Local midnight of `now` (in `now`'s own offset), as epoch milliseconds.
pub fn start_of_day(now: OffsetDateTime) -> i64 {
    to_millis(now.replace_time(Time::MIDNIGHT))
}

/// Offset for a whole number of minutes east of UTC, if representable.
pub fn fixed_offset(minutes: i32) -> Option<UtcOffset> {
    let offset = minutes
        .checked_mul(60)
        .and_then(|secs| UtcOffset::from_whole_seconds(secs).ok());
    if offset.is_none() {
        tracing::warn!(minutes, "invalid utc offset; ignoring");
    }
    offset
}

/// Current offset of the system timezone.
///
/// `time` refuses to read it once the process is multi-threaded, so the
/// lookup goes through `chrono`, which reads the zone database itself.
pub fn local_offset() -> Option<UtcOffset> {
    let secs = chrono::Local::now().offset().local_minus_utc();
    UtcOffset::from_whole_seconds(secs).ok()
}
