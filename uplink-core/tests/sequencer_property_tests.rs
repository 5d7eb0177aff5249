// SPDX-FileCopyrightText: 2026 Uplink Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Property tests for sync id and client message id ordering.

use proptest::prelude::*;

use uplink_core::{Sequencer, SyncPhase};

proptest! {
    /// Sync ids assigned to outbound deltas are strictly increasing
    /// with no gaps, regardless of interleaved acknowledgments.
    #[test]
    fn sync_ids_strictly_increasing_without_gaps(acks in prop::collection::vec(0i64..100, 1..50)) {
        let mut seq = Sequencer::new();
        let mut previous = 0;
        for ack in acks {
            seq.observe_client_ack(ack);
            let id = seq.next_sync_id();
            prop_assert_eq!(id, previous + 1);
            previous = id;
        }
    }

    /// Any ack not matching the last-sent id desyncs a synced session;
    /// the very next delta re-baselines back to synced.
    #[test]
    fn mismatched_ack_desyncs_then_recovers(sent in 1usize..20, off_by in 1i64..5) {
        let mut seq = Sequencer::new();
        for _ in 0..sent {
            seq.next_sync_id();
        }
        let stale = seq.last_sync_id() - off_by.min(seq.last_sync_id());
        seq.observe_client_ack(stale);
        prop_assert_eq!(seq.phase(), SyncPhase::Desynced);
        prop_assert!(seq.needs_full_state());

        seq.next_sync_id();
        prop_assert_eq!(seq.phase(), SyncPhase::Synced);
    }

    /// Client message ids accept exactly the sequential run 0..n and
    /// reject everything out of place without advancing.
    #[test]
    fn client_ids_accept_only_sequential(run in 0i64..50, candidate in 0i64..100) {
        let mut seq = Sequencer::new();
        for i in 0..run {
            prop_assert!(seq.accept_client_id(i).is_ok());
        }
        if candidate != run {
            prop_assert!(seq.accept_client_id(candidate).is_err());
            prop_assert_eq!(seq.expected_client_id(), run);
        } else {
            prop_assert!(seq.accept_client_id(candidate).is_ok());
        }
    }
}
