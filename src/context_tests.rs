// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for context.rs

#[cfg(test)]
mod tests {
    use crate::context::RequeueSettings;
    use crate::crd::StatusPhase;
    use std::time::Duration;

    #[test]
    fn test_default_requeue_intervals() {
        let requeue = RequeueSettings::default();
        assert_eq!(requeue.ready, Duration::from_secs(300));
        assert_eq!(requeue.pending, Duration::from_secs(30));
    }

    #[test]
    fn test_interval_by_phase() {
        let requeue = RequeueSettings {
            ready: Duration::from_secs(10),
            pending: Duration::from_secs(1),
        };
        assert_eq!(requeue.interval(StatusPhase::Completed), Duration::from_secs(10));
        for phase in [
            StatusPhase::Initial,
            StatusPhase::InProgress,
            StatusPhase::AwaitingComponents,
            StatusPhase::Failed,
        ] {
            assert_eq!(requeue.interval(phase), Duration::from_secs(1));
        }
    }
}
