use crate::types::{ClockMillis, SequenceId};

/// Lower bound of the probe interval.
const PROBE_INTERVAL_FLOOR: ClockMillis = 500;
/// Interval above which a successful round-trip starts tightening.
const PROBE_INTERVAL_CEILING: ClockMillis = 2_000;
/// Adjustment applied per missed or tightening round-trip.
const PROBE_INTERVAL_STEP: ClockMillis = 500;

/// Per-connection clock-offset and latency estimation. Neither endpoint
/// assumes synchronized wall clocks: the estimates judge message freshness
/// relative to the peer's own clock.
///
/// The probe interval self-tunes between bandwidth and freshness: a missed
/// round-trip widens it by a fixed step, a successful one narrows it while
/// it sits above the ceiling, and it never drops below the floor.
pub struct ClockSync {
    next_sequence: SequenceId,
    /// Sequence and local send time of the probe still awaiting an answer.
    outstanding: Option<(SequenceId, ClockMillis)>,
    probe_interval: ClockMillis,
    last_probe_at: Option<ClockMillis>,
    estimated_latency: ClockMillis,
    /// Peer clock minus local clock, from the freshest round-trip.
    remote_offset: Option<i64>,
}

impl ClockSync {
    pub fn new() -> Self {
        Self {
            next_sequence: 0,
            outstanding: None,
            probe_interval: PROBE_INTERVAL_FLOOR,
            last_probe_at: None,
            estimated_latency: 0,
            remote_offset: None,
        }
    }

    /// Evaluated once per tick. Returns the sequence id of a probe to send
    /// when one is due. An unanswered probe at that moment counts as a
    /// missed round-trip and widens the interval.
    pub fn on_tick(&mut self, now: ClockMillis) -> Option<SequenceId> {
        let due = match self.last_probe_at {
            Some(at) => now.saturating_sub(at) >= self.probe_interval,
            None => true,
        };
        if !due {
            return None;
        }

        if self.outstanding.is_some() {
            self.probe_interval += PROBE_INTERVAL_STEP;
        }

        let sequence = self.next_sequence;
        self.next_sequence = self.next_sequence.wrapping_add(1);
        self.outstanding = Some((sequence, now));
        self.last_probe_at = Some(now);
        Some(sequence)
    }

    /// Feed a probe answer. Stale or mismatched sequence ids are discarded.
    pub fn receive_response(
        &mut self,
        sequence: SequenceId,
        remote_time: ClockMillis,
        now: ClockMillis,
    ) {
        let Some((expected, sent_at)) = self.outstanding else {
            return;
        };
        if expected != sequence {
            return;
        }
        self.outstanding = None;

        let round_trip = now.saturating_sub(sent_at);
        self.estimated_latency = round_trip / 2;
        self.remote_offset =
            Some((remote_time + self.estimated_latency) as i64 - now as i64);

        if self.probe_interval > PROBE_INTERVAL_CEILING {
            self.probe_interval -= PROBE_INTERVAL_STEP;
            if self.probe_interval < PROBE_INTERVAL_FLOOR {
                self.probe_interval = PROBE_INTERVAL_FLOOR;
            }
        }
    }

    /// One-way latency, half of the freshest round-trip.
    pub fn estimated_latency(&self) -> ClockMillis {
        self.estimated_latency
    }

    /// The peer's clock value right now, per the freshest estimate. Falls
    /// back to the local clock before any round-trip has completed.
    pub fn estimated_remote_time(&self, now: ClockMillis) -> ClockMillis {
        match self.remote_offset {
            Some(offset) => (now as i64 + offset).max(0) as ClockMillis,
            None => now,
        }
    }

    /// The peer's clock value expected at the moment a just-sent unreliable
    /// message arrives.
    pub fn estimated_arrival_time(&self, now: ClockMillis) -> ClockMillis {
        self.estimated_remote_time(now) + self.estimated_latency
    }

    pub fn probe_interval(&self) -> ClockMillis {
        self.probe_interval
    }
}

impl Default for ClockSync {
    fn default() -> Self {
        Self::new()
    }
}
