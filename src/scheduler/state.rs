//! Emission bookkeeping shared across scheduler ticks

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Single-instance emission state, mutated only by the scheduler.
///
/// `last_emission_at` is monotonically non-decreasing: commits take the max
/// of the stored and observed instant.
#[derive(Debug)]
pub struct EmissionState {
    last_emission_at: Option<Instant>,
    last_external_call_at: Option<Instant>,
    recent_outputs: VecDeque<String>,
    consecutive_duplicate_count: u32,
    is_first_emission: bool,
    total_emitted: u64,
    total_skipped: u64,
}

impl Default for EmissionState {
    fn default() -> Self {
        Self {
            last_emission_at: None,
            last_external_call_at: None,
            recent_outputs: VecDeque::new(),
            consecutive_duplicate_count: 0,
            is_first_emission: true,
            total_emitted: 0,
            total_skipped: 0,
        }
    }
}

impl EmissionState {
    /// Time since the last accepted emission; `None` before the first.
    #[must_use]
    pub fn elapsed_since_emission(&self, now: Instant) -> Option<Duration> {
        self.last_emission_at
            .map(|at| now.saturating_duration_since(at))
    }

    /// Time since the last external generation call; `None` before the first.
    #[must_use]
    pub fn elapsed_since_external_call(&self, now: Instant) -> Option<Duration> {
        self.last_external_call_at
            .map(|at| now.saturating_duration_since(at))
    }

    /// True until the first emission has been committed.
    #[must_use]
    pub const fn is_first_emission(&self) -> bool {
        self.is_first_emission
    }

    /// Accepted outputs available for deduplication, oldest-first.
    #[must_use]
    pub fn recent_outputs(&self) -> impl Iterator<Item = &str> {
        self.recent_outputs.iter().map(String::as_str)
    }

    /// Current run of consecutively suppressed duplicates.
    #[must_use]
    pub const fn duplicate_streak(&self) -> u32 {
        self.consecutive_duplicate_count
    }

    /// Total accepted emissions.
    #[must_use]
    pub const fn total_emitted(&self) -> u64 {
        self.total_emitted
    }

    /// Total ticks that reached generation but produced no emission.
    #[must_use]
    pub const fn total_skipped(&self) -> u64 {
        self.total_skipped
    }

    /// Record that the external generation call was made.
    pub fn record_external_call(&mut self, now: Instant) {
        self.last_external_call_at = Some(now);
    }

    /// Count one post-generation skip (no result, rejected, duplicate).
    pub fn record_skip(&mut self) {
        self.total_skipped += 1;
    }

    /// Count one suppressed duplicate.
    pub fn record_duplicate(&mut self) {
        self.consecutive_duplicate_count += 1;
        self.total_skipped += 1;
    }

    /// Commit an accepted emission.
    pub fn commit(&mut self, text: String, now: Instant, max_recent: usize) {
        while self.recent_outputs.len() >= max_recent.max(1) {
            self.recent_outputs.pop_front();
        }
        self.recent_outputs.push_back(text);

        self.last_emission_at = Some(self.last_emission_at.map_or(now, |at| at.max(now)));
        self.is_first_emission = false;
        self.consecutive_duplicate_count = 0;
        self.total_emitted += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_as_first_emission_with_no_history() {
        let state = EmissionState::default();
        let now = Instant::now();

        assert!(state.is_first_emission());
        assert!(state.elapsed_since_emission(now).is_none());
        assert!(state.elapsed_since_external_call(now).is_none());
    }

    #[test]
    fn commit_clears_first_emission_and_counts() {
        let mut state = EmissionState::default();
        state.commit("привет".to_string(), Instant::now(), 5);

        assert!(!state.is_first_emission());
        assert_eq!(state.total_emitted(), 1);
        assert_eq!(state.recent_outputs().count(), 1);
    }

    #[test]
    fn recent_outputs_are_bounded() {
        let mut state = EmissionState::default();
        for i in 0..8 {
            state.commit(format!("реакция {i}"), Instant::now(), 5);
        }

        let outputs: Vec<&str> = state.recent_outputs().collect();
        assert_eq!(outputs.len(), 5);
        assert_eq!(outputs[0], "реакция 3");
        assert_eq!(outputs[4], "реакция 7");
    }

    #[test]
    fn last_emission_never_moves_backward() {
        let mut state = EmissionState::default();
        let later = Instant::now();
        let earlier = later - Duration::from_secs(10);

        state.commit("a".to_string(), later, 5);
        state.commit("b".to_string(), earlier, 5);

        // measured from `later`, elapsed must be zero, not ten seconds
        assert_eq!(state.elapsed_since_emission(later), Some(Duration::ZERO));
    }

    #[test]
    fn commit_resets_duplicate_streak() {
        let mut state = EmissionState::default();
        state.record_duplicate();
        state.record_duplicate();
        assert_eq!(state.duplicate_streak(), 2);
        assert_eq!(state.total_skipped(), 2);

        state.commit("новая".to_string(), Instant::now(), 5);
        assert_eq!(state.duplicate_streak(), 0);
    }
}
