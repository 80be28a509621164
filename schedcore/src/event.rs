use crate::helpe::*;

/// What happens when an event fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// A job enters the system.
    Arrival(JobSpec),
    /// An allocated job begins executing.
    Start(JobId),
    /// A running job is done.
    Completion(JobId),
    /// Explicit kill, for queued and running jobs alike.
    Kill(JobId),
    /// Walltime limit of a running job.
    Timeout(JobId),
    /// Periodic re-opening of a decision point after a refused allocation.
    Retry,
    /// Capture of the full simulation state.
    Snapshot,
}

impl EventKind {
    /// Only timers may be called off.
    #[inline(always)]
    pub fn is_cancelable(&self) -> bool {
        matches!(self, EventKind::Timeout(_) | EventKind::Retry)
    }

    pub fn name(&self) -> &'static str {
        match self {
            EventKind::Arrival(_)       => "arrival",
            EventKind::Start(_)         => "start",
            EventKind::Completion(_)    => "completion",
            EventKind::Kill(_)          => "kill",
            EventKind::Timeout(_)       => "timeout",
            EventKind::Retry            => "retry",
            EventKind::Snapshot         => "snapshot",
        }
    }
}

/// Handle to a scheduled event. It is the event's sequence number, so it
/// stays meaningful across snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EventId(pub u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub time:       SimTime,
    pub seq:        u64,
    pub kind:       EventKind,
    pub canceled:   bool,
}

impl Event {
    #[inline(always)]
    pub fn id(&self) -> EventId {
        EventId(self.seq)
    }
}

/// Heap key: time first, scheduling order second. Sequence numbers are
/// unique, so the order is total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct EventKey {
    time:   SimTime,
    seq:    u64,
}

impl Ord for EventKey {
    fn cmp(&self, other: &Self) -> Ordering {
        // We're using a BinaryHeap, which is a max-priority queue.
        // We want a min-one and so we're reversing the order of `cmp`.
        (other.time, other.seq).cmp(&(self.time, self.seq))
    }
}

impl PartialOrd for EventKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// The simulation clock plus every event still to come.
///
/// Owns its own sequence generator: two queues never share numbering.
/// Canceled events stay in the heap and are dropped when they surface.
#[derive(Debug, Default)]
pub struct EventQueue {
    heap:       BinaryHeap<EventKey>,
    events:     BTreeMap<u64, Event>,
    /// Every cancelable sequence number ever issued, pending or not.
    cancelable: BTreeSet<u64>,
    next_seq:   u64,
    now:        SimTime,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline(always)]
    pub fn now(&self) -> SimTime {
        self.now
    }

    #[inline(always)]
    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }

    /// Number of live events.
    pub fn len(&self) -> usize {
        self.events.values().filter(|e| !e.canceled).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn schedule(&mut self, time: SimTime, kind: EventKind) -> Result<EventId, SimError> {
        if time < self.now {
            return Err(SimError::ScheduleInPast { at: time, now: self.now });
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        trace!(time, seq, kind = kind.name(), "scheduled");
        if kind.is_cancelable() {
            self.cancelable.insert(seq);
        }
        self.heap.push(EventKey { time, seq });
        self.events.insert(seq, Event { time, seq, kind, canceled: false });

        Ok(EventId(seq))
    }

    /// Flags a pending event so that it is dropped when it surfaces.
    ///
    /// Returns `Ok(false)` if a cancelable event already fired or was
    /// canceled.
    /// Canceling an event whose kind is not cancelable is a contract
    /// violation, whether or not it is still pending.
    pub fn cancel(&mut self, id: EventId) -> Result<bool, SimError> {
        match self.events.get_mut(&id.0) {
            Some(e) if !e.kind.is_cancelable()  => Err(SimError::IllegalCancel { event: id }),
            Some(e) if e.canceled               => Ok(false),
            Some(e)                             => {
                e.canceled = true;
                Ok(true)
            },
            None if self.cancelable.contains(&id.0) => Ok(false),
            None                                => Err(SimError::IllegalCancel { event: id }),
        }
    }

    pub(crate) fn cancelable(&self) -> &BTreeSet<u64> {
        &self.cancelable
    }

    /// Removes the next live event and moves the clock to its time.
    pub fn pop(&mut self) -> Option<Event> {
        while let Some(key) = self.heap.pop() {
            let Some(e) = self.events.remove(&key.seq) else { continue; };
            if e.canceled {
                trace!(time = e.time, seq = e.seq, kind = e.kind.name(), "dropped canceled event");
                continue;
            }
            debug_assert!(e.time >= self.now, "Time went backwards!");
            self.now = e.time;
            return Some(e);
        }

        None
    }

    /// Time of the next live event, without dispatching it.
    pub fn peek_time(&mut self) -> Option<SimTime> {
        // Canceled events on top are garbage; drop them here.
        while let Some(seq) = self.heap.peek().map(|k| k.seq) {
            match self.events.get(&seq) {
                Some(e) if !e.canceled  => return Some(e.time),
                _                       => {
                    self.heap.pop();
                    self.events.remove(&seq);
                },
            }
        }

        None
    }

    /// Live events in dispatch order.
    pub fn pending(&self) -> Vec<&Event> {
        self.events.values()
            .filter(|e| !e.canceled)
            .sorted_by_key(|e| (e.time, e.seq))
            .collect()
    }

    /// Rebuilds a queue from captured state. Sequence numbers are kept as
    /// they were so ties resolve exactly as before.
    pub(crate) fn restore(
        now:        SimTime,
        next_seq:   u64,
        events:     Vec<Event>,
        cancelable: BTreeSet<u64>,
    ) -> Result<Self, ConfigError> {
        if cancelable.last().is_some_and(|s| *s >= next_seq) {
            return Err(ConfigError::Snapshot(format!("cancelable event past next sequence {next_seq}")));
        }
        let mut res = Self { heap: BinaryHeap::new(), events: BTreeMap::new(), cancelable, next_seq, now };
        for e in events {
            if e.kind.is_cancelable() {
                res.cancelable.insert(e.seq);
            }
            if e.time < now || e.seq >= next_seq {
                return Err(ConfigError::Snapshot(format!(
                    "event #{} at {} does not fit clock {now} / next sequence {next_seq}", e.seq, e.time
                )));
            }
            res.heap.push(EventKey { time: e.time, seq: e.seq });
            if res.events.insert(e.seq, e).is_some() {
                return Err(ConfigError::Snapshot(String::from("two events share a sequence number")));
            }
        }

        Ok(res)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_then_sequence() {
        let mut q = EventQueue::new();
        q.schedule(10, EventKind::Completion(1)).unwrap();
        q.schedule(5, EventKind::Completion(2)).unwrap();
        q.schedule(10, EventKind::Completion(3)).unwrap();
        q.schedule(5, EventKind::Completion(4)).unwrap();

        let order: Vec<_> = std::iter::from_fn(|| q.pop()).map(|e| (e.time, e.kind)).collect();
        assert_eq!(order, vec![
            (5, EventKind::Completion(2)),
            (5, EventKind::Completion(4)),
            (10, EventKind::Completion(1)),
            (10, EventKind::Completion(3)),
        ]);
        assert_eq!(q.now(), 10);
    }

    #[test]
    fn no_scheduling_in_the_past() {
        let mut q = EventQueue::new();
        q.schedule(7, EventKind::Retry).unwrap();
        q.pop();
        assert!(matches!(q.schedule(3, EventKind::Retry), Err(SimError::ScheduleInPast { at: 3, now: 7 })));
        assert!(q.schedule(7, EventKind::Retry).is_ok());
    }

    #[test]
    fn cancellation() {
        let mut q = EventQueue::new();
        let timeout = q.schedule(10, EventKind::Timeout(1)).unwrap();
        let done = q.schedule(5, EventKind::Completion(1)).unwrap();
        assert!(matches!(q.cancel(done), Err(SimError::IllegalCancel { .. })));
        assert!(q.cancel(timeout).unwrap());
        assert!(!q.cancel(timeout).unwrap());
        assert_eq!(q.len(), 1);

        assert_eq!(q.pop().map(|e| e.id()), Some(done));
        assert_eq!(q.peek_time(), None);
        assert!(q.pop().is_none());
        // Firing does not make a completion cancelable.
        assert!(matches!(q.cancel(done), Err(SimError::IllegalCancel { .. })));
        assert!(!q.cancel(timeout).unwrap());
        assert!(matches!(q.cancel(EventId(42)), Err(SimError::IllegalCancel { .. })));
    }

    #[test]
    fn independent_sequences() {
        let mut a = EventQueue::new();
        let mut b = EventQueue::new();
        a.schedule(1, EventKind::Retry).unwrap();
        a.schedule(1, EventKind::Retry).unwrap();
        assert_eq!(b.schedule(1, EventKind::Retry).unwrap(), EventId(0));
        assert_eq!(a.next_seq(), 2);
    }

    #[test]
    fn restore_keeps_order() {
        let mut q = EventQueue::new();
        q.schedule(4, EventKind::Snapshot).unwrap();
        q.schedule(4, EventKind::Kill(2)).unwrap();
        q.schedule(2, EventKind::Start(2)).unwrap();
        let events: Vec<Event> = q.pending().into_iter().cloned().collect();
        let mut r = EventQueue::restore(0, q.next_seq(), events, BTreeSet::new()).unwrap();
        let kinds: Vec<_> = std::iter::from_fn(|| r.pop()).map(|e| e.kind).collect();
        assert_eq!(kinds, vec![EventKind::Start(2), EventKind::Snapshot, EventKind::Kill(2)]);

        let stale = vec![Event { time: 1, seq: 0, kind: EventKind::Retry, canceled: false }];
        assert!(EventQueue::restore(3, 5, stale, BTreeSet::new()).is_err());
        assert!(EventQueue::restore(0, 5, vec![], BTreeSet::from([5])).is_err());
    }
}
