//! End-to-end engine tests.
//!
//! Tests cover:
//! - Full replay runs: place, auto-exit, flatten, summary
//! - The per-tick ordering contract seen through a recording observer
//! - Playback state machine behavior under play/pause/seek/step
//! - Session persistence through in-memory, JSON-file, and sqlite stores
//! - The indicator calculator contract

mod common;

use approx::assert_relative_eq;
use common::*;
use replaylab::domain::bar::BarSeries;
use replaylab::domain::clock::PlaybackState;
use replaylab::domain::error::ReplayError;
use replaylab::domain::session::{ReplaySession, SavedSession};
use replaylab::domain::trade::{ExitReason, TradeSide};

mod scripted_replay_runs {
    use super::*;

    #[test]
    fn buy_stops_out_on_breach_bar() {
        // Buy 100 @ 100 with stop 95 / target 110; the next bar trades
        // 94..101, so the stop fills at 95 for -500.
        let series = series_from(vec![
            flat_bar(0),
            make_bar(1, 100.0, 101.0, 94.0, 96.0),
            flat_bar(2),
        ]);
        let mut session = make_session(series);
        session
            .place_trade(TradeSide::Buy, 100.0, Some(95.0), Some(110.0))
            .unwrap();

        let event = session.step(1).unwrap().unwrap();
        assert_eq!(event.exits.len(), 1);
        let exit = &event.exits[0];
        assert_eq!(exit.exit_reason, Some(ExitReason::StopLoss));
        assert!((exit.exit_price.unwrap() - 95.0).abs() < f64::EPSILON);
        assert!((exit.realized_pnl.unwrap() - (-500.0)).abs() < f64::EPSILON);

        let summary = session.summary();
        assert_eq!(summary.total_trades, 1);
        assert_eq!(summary.trades_lost, 1);
        assert!((summary.total_pnl - (-500.0)).abs() < f64::EPSILON);
    }

    #[test]
    fn sell_stop_fires_on_first_qualifying_bar_only() {
        // Sell 50 @ 50 with stop 52, no target. Bars rise to high 53 and
        // later 60: the trade closes once at 52 for -100 and the later bar
        // cannot re-trigger it.
        let series = series_from(vec![
            make_bar(0, 50.0, 50.5, 49.5, 50.0),
            make_bar(1, 50.0, 53.0, 49.8, 52.5),
            make_bar(2, 52.5, 60.0, 52.0, 58.0),
        ]);
        let mut session = make_session(series);
        session
            .place_trade(TradeSide::Sell, 50.0, Some(52.0), None)
            .unwrap();

        let token = session.play().unwrap().unwrap();

        let first = session.tick(token).unwrap().unwrap();
        assert_eq!(first.exits.len(), 1);
        assert!((first.exits[0].exit_price.unwrap() - 52.0).abs() < f64::EPSILON);
        assert!((first.exits[0].realized_pnl.unwrap() - (-100.0)).abs() < f64::EPSILON);

        let second = session.tick(token).unwrap().unwrap();
        assert!(second.exits.is_empty());

        let snapshot = session.snapshot();
        assert_eq!(snapshot.closed_trades.len(), 1);
        assert!((snapshot.cumulative_realized_pnl - (-100.0)).abs() < f64::EPSILON);
    }

    #[test]
    fn flatten_closes_both_trades_in_open_order() {
        let mut session = make_session(flat_series(5));
        let first = session
            .place_trade(TradeSide::Buy, 10.0, None, None)
            .unwrap();
        let second = session
            .place_trade(TradeSide::Sell, 5.0, None, None)
            .unwrap();

        let before = session.snapshot().closed_trades.len();
        let flattened = session.flatten_all().unwrap();

        assert_eq!(flattened.len(), 2);
        assert_eq!(flattened[0].id, first.id);
        assert_eq!(flattened[1].id, second.id);

        let snapshot = session.snapshot();
        assert_eq!(snapshot.closed_trades.len(), before + 2);
        assert!(snapshot.open_trades.is_empty());
        for trade in &snapshot.closed_trades {
            assert_eq!(trade.exit_reason, Some(ExitReason::Flatten));
            assert_eq!(trade.exit_price, Some(100.0));
        }
    }

    #[test]
    fn conservation_cumulative_matches_independent_sum() {
        let series = series_from(vec![
            flat_bar(0),
            make_bar(1, 100.0, 112.0, 99.0, 108.0),
            make_bar(2, 108.0, 109.0, 101.0, 103.0),
        ]);
        let mut session = make_session(series);
        session
            .place_trade(TradeSide::Buy, 100.0, None, None)
            .unwrap();
        session
            .place_trade(TradeSide::Sell, 40.0, None, None)
            .unwrap();
        session.step(2).unwrap();
        session.flatten_all().unwrap();

        let snapshot = session.snapshot();
        let independent: f64 = snapshot
            .closed_trades
            .iter()
            .map(|t| {
                let sign = t.side.direction();
                sign * (t.exit_price.unwrap() - t.entry_price) * t.quantity
            })
            .sum();
        assert_relative_eq!(
            snapshot.cumulative_realized_pnl,
            independent,
            epsilon = 1e-9
        );
    }

    #[test]
    fn gap_through_bar_fills_at_stop_not_target() {
        let series = series_from(vec![flat_bar(0), make_bar(1, 100.0, 120.0, 90.0, 115.0)]);
        let mut session = make_session(series);
        session
            .place_trade(TradeSide::Buy, 10.0, Some(95.0), Some(110.0))
            .unwrap();

        let event = session.step(1).unwrap().unwrap();
        assert_eq!(event.exits[0].exit_reason, Some(ExitReason::StopLoss));
        assert!((event.exits[0].exit_price.unwrap() - 95.0).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_summary_has_no_nan() {
        let session = make_session(flat_series(3));
        let summary = session.summary();
        assert_eq!(summary.total_trades, 0);
        assert_eq!(summary.win_rate, 0.0);
        assert_eq!(summary.profit_factor, 0.0);
    }
}

mod playback_state_machine {
    use super::*;

    #[test]
    fn full_play_through_finishes_at_last_bar() {
        let n = 8;
        let mut session = make_session(flat_series(n));
        let token = session.play().unwrap().unwrap();

        let mut cursors = Vec::new();
        while let Some(event) = session.tick(token).unwrap() {
            cursors.push(event.cursor);
        }

        // speedMultiplier 1: each of the N-1 ticks lands one bar further.
        assert_eq!(cursors, (1..n).collect::<Vec<_>>());
        let state = session.replay_state();
        assert_eq!(state.state, PlaybackState::Finished);
        assert_eq!(state.cursor, n - 1);
    }

    #[test]
    fn pause_stops_a_scheduled_tick() {
        let mut session = make_session(flat_series(10));
        let token = session.play().unwrap().unwrap();
        session.tick(token).unwrap().unwrap();

        session.pause();
        // The driver's timer already fired; the stale token mutates nothing.
        assert!(session.tick(token).unwrap().is_none());
        assert_eq!(session.replay_state().cursor, 1);
        assert_eq!(session.replay_state().state, PlaybackState::Paused);
    }

    #[test]
    fn stale_token_cannot_drive_a_restarted_run() {
        let mut session = make_session(flat_series(10));
        let stale = session.play().unwrap().unwrap();
        session.pause();
        let fresh = session.play().unwrap().unwrap();

        assert!(session.tick(stale).unwrap().is_none());
        assert_eq!(session.tick(fresh).unwrap().unwrap().cursor, 1);
    }

    #[test]
    fn seek_pauses_playback() {
        let mut session = make_session(flat_series(10));
        session.play().unwrap().unwrap();
        session.seek(5).unwrap();

        let state = session.replay_state();
        assert_eq!(state.state, PlaybackState::Paused);
        assert_eq!(state.cursor, 5);
    }

    #[test]
    fn seek_out_of_range_leaves_cursor_alone() {
        let mut session = make_session(flat_series(10));
        session.seek(4).unwrap();
        assert!(matches!(
            session.seek(10),
            Err(ReplayError::Validation { .. })
        ));
        assert_eq!(session.replay_state().cursor, 4);
    }

    #[test]
    fn play_on_empty_series_is_rejected() {
        let mut session = make_session(BarSeries::new(vec![]).unwrap());
        assert!(matches!(session.play(), Err(ReplayError::EmptySeries)));
        assert_eq!(session.replay_state().state, PlaybackState::Idle);
    }

    #[test]
    fn speed_multiplier_reaches_end_in_fewer_ticks() {
        let mut session = make_session(flat_series(10));
        session.set_speed_multiplier(4).unwrap();
        let token = session.play().unwrap().unwrap();

        let mut ticks = 0;
        while session.tick(token).unwrap().is_some() {
            ticks += 1;
        }
        assert_eq!(ticks, 3); // 4, 8, 9(clamped)
        assert_eq!(session.replay_state().state, PlaybackState::Finished);
    }
}

mod observer_contract {
    use super::*;

    #[test]
    fn bar_reached_carries_post_exit_snapshot() {
        let series = series_from(vec![flat_bar(0), make_bar(1, 100.0, 101.0, 94.0, 96.0)]);
        let mut session = make_session(series);
        let recorder = SharedSyncRecorder::default();
        session.attach_sync(Box::new(recorder.clone()));

        session
            .place_trade(TradeSide::Buy, 100.0, Some(95.0), None)
            .unwrap();
        session.step(1).unwrap();

        let seen = recorder.0.borrow();
        assert_eq!(seen.bar_reached.len(), 1);
        let event = &seen.bar_reached[0];
        assert_eq!(event.cursor, 1);
        assert!(event.snapshot.open_trades.is_empty());
        assert_eq!(event.snapshot.closed_trades.len(), 1);
        assert_eq!(event.exits.len(), 1);
    }

    #[test]
    fn user_operations_repaint_without_bar_events() {
        let mut session = make_session(flat_series(5));
        let recorder = SharedSyncRecorder::default();
        session.attach_sync(Box::new(recorder.clone()));

        session
            .place_trade(TradeSide::Buy, 10.0, None, None)
            .unwrap();
        session.flatten_all().unwrap();
        session.seek(3).unwrap();

        let seen = recorder.0.borrow();
        assert!(seen.bar_reached.is_empty());
        assert_eq!(seen.repaints.len(), 3);
        // The final repaint reflects the seek.
        assert_eq!(seen.repaints[2].1.cursor, 3);
    }
}

mod session_persistence {
    use super::*;
    use replaylab::adapters::json_store_adapter::JsonStoreAdapter;
    use replaylab::ports::store_port::DocumentStorePort;

    fn played_session() -> ReplaySession {
        let mut session = make_session(flat_series(10));
        session.seek(2).unwrap();
        session
            .place_trade(TradeSide::Buy, 10.0, Some(95.0), None)
            .unwrap();
        session.step(1).unwrap();
        session
            .place_trade(TradeSide::Sell, 5.0, None, None)
            .unwrap();
        session
            .close_trade_manual(session.snapshot().open_trades[1].id, 101.0)
            .unwrap();
        session
    }

    #[test]
    fn memory_store_round_trip_restores_everything() {
        let session = played_session();
        let store = MemoryStore::new();
        session.save(&store, "afternoon").unwrap();

        let saved = SavedSession::read(&store, "afternoon").unwrap().unwrap();
        let restored = ReplaySession::restore(saved, flat_series(10)).unwrap();

        assert_eq!(restored.replay_state().cursor, session.replay_state().cursor);
        assert_eq!(restored.snapshot(), session.snapshot());
        assert_eq!(restored.symbol(), "ES");
        assert_eq!(restored.timeframe(), "5m");
    }

    #[test]
    fn json_store_round_trip() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = JsonStoreAdapter::new(dir.path().join("sessions")).unwrap();

        let session = played_session();
        session.save(&store, "morning").unwrap();
        session.save(&store, "morning").unwrap(); // last write wins, no error

        let saved = SavedSession::read(&store, "morning").unwrap().unwrap();
        assert_eq!(saved.ledger, session.snapshot());
        assert_eq!(store.list_keys().unwrap(), vec!["morning"]);
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn sqlite_store_round_trip() {
        use replaylab::adapters::sqlite_store_adapter::SqliteStoreAdapter;

        let store = SqliteStoreAdapter::in_memory().unwrap();
        let session = played_session();
        session.save(&store, "scalps").unwrap();

        let saved = SavedSession::read(&store, "scalps").unwrap().unwrap();
        assert_eq!(saved.ledger, session.snapshot());
    }

    #[test]
    fn reading_a_missing_session_is_none() {
        let store = MemoryStore::new();
        assert!(SavedSession::read(&store, "nope").unwrap().is_none());
    }
}

mod indicator_contract {
    use super::*;
    use replaylab::domain::indicator::{IndicatorType, IndicatorValue};

    #[test]
    fn calculator_output_is_carried_with_warm_up_alignment() {
        let mut session = make_session(flat_series(10));
        let calculator = ConstantCalculator {
            warm_up: 3,
            value: 42.0,
        };
        session
            .compute_indicator(&calculator, IndicatorType::Sma(3))
            .unwrap();

        let series = &session.indicators()[0];
        assert_eq!(series.indicator, IndicatorType::Sma(3));
        assert_eq!(series.values.len(), 7);
        assert_eq!(series.at_bar(2), None);
        assert_eq!(series.at_bar(3), Some(&IndicatorValue::Simple(42.0)));
        assert_eq!(series.at_bar(9), Some(&IndicatorValue::Simple(42.0)));
    }
}
