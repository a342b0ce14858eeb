use chrono::{NaiveDate, NaiveTime};
use routines_server::engine::EngineError;
use routines_server::engine::announce::spoken_text;
use routines_server::engine::expand::{
    ActiveAssignment, AssignmentDiff, DateWindow, MAX_WINDOW_DAYS, expand, reconcile_pending,
};
use routines_server::engine::ledger::{StreakState, Transition, TransitionCtx};
use routines_server::engine::schedule::{ScheduleDef, parse_time};
use routines_shared::domain::{LogStatus, ScheduleType, WeekdaySet};

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn t(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

fn assignment(id: i32, member: &str) -> ActiveAssignment {
    ActiveAssignment {
        assignment_id: id,
        member_id: member.into(),
        is_active: true,
    }
}

fn weekdays(days: &[i64]) -> ScheduleDef {
    ScheduleDef::from_raw(ScheduleType::Weekdays, Some(days), None, t(7, 30), 60).unwrap()
}

fn daily() -> ScheduleDef {
    ScheduleDef::from_parts(ScheduleType::Daily, None, None, t(8, 0), 30).unwrap()
}

#[test]
fn workweek_schedule_yields_one_log_per_working_day() {
    // 2025-06-01 is a Sunday
    let window = DateWindow::new(d(2025, 6, 1), d(2025, 6, 7)).unwrap();
    let out = expand(&weekdays(&[1, 2, 3, 4, 5]), &[assignment(1, "amy")], window);

    let dates: Vec<NaiveDate> = out.iter().map(|o| o.due_date).collect();
    assert_eq!(
        dates,
        vec![
            d(2025, 6, 2),
            d(2025, 6, 3),
            d(2025, 6, 4),
            d(2025, 6, 5),
            d(2025, 6, 6)
        ]
    );
    assert!(out.iter().all(|o| o.status == LogStatus::Pending));
    assert!(out.iter().all(|o| o.due_time == t(7, 30)));
    assert!(out.iter().all(|o| o.member_id == "amy"));
}

#[test]
fn weekend_only_schedule_skips_working_days() {
    let window = DateWindow::new(d(2025, 6, 2), d(2025, 6, 8)).unwrap();
    let out = expand(&weekdays(&[0, 6]), &[assignment(1, "amy")], window);
    let dates: Vec<NaiveDate> = out.iter().map(|o| o.due_date).collect();
    assert_eq!(dates, vec![d(2025, 6, 7), d(2025, 6, 8)]);
}

#[test]
fn daily_output_is_ordered_by_date_then_assignment() {
    let window = DateWindow::new(d(2025, 6, 1), d(2025, 6, 2)).unwrap();
    let out = expand(
        &daily(),
        &[assignment(7, "bo"), assignment(3, "amy"), assignment(7, "bo")],
        window,
    );
    let keys: Vec<(NaiveDate, i32)> = out.iter().map(|o| (o.due_date, o.assignment_id)).collect();
    assert_eq!(
        keys,
        vec![
            (d(2025, 6, 1), 3),
            (d(2025, 6, 1), 7),
            (d(2025, 6, 2), 3),
            (d(2025, 6, 2), 7),
        ]
    );
}

#[test]
fn date_schedule_only_fires_inside_window() {
    let def = ScheduleDef::from_parts(
        ScheduleType::Date,
        None,
        Some(d(2025, 6, 10)),
        t(18, 0),
        15,
    )
    .unwrap();
    let a = [assignment(1, "amy")];

    let hit = expand(&def, &a, DateWindow::new(d(2025, 6, 1), d(2025, 6, 30)).unwrap());
    assert_eq!(hit.len(), 1);
    assert_eq!(hit[0].due_date, d(2025, 6, 10));

    let miss = expand(&def, &a, DateWindow::new(d(2025, 6, 11), d(2025, 6, 30)).unwrap());
    assert!(miss.is_empty());
}

#[test]
fn inactive_assignments_produce_nothing() {
    let mut a = assignment(1, "amy");
    a.is_active = false;
    let out = expand(&daily(), &[a], DateWindow::single(d(2025, 6, 1)));
    assert!(out.is_empty());
}

#[test]
fn expansion_is_deterministic() {
    let window = DateWindow::new(d(2025, 1, 1), d(2025, 3, 31)).unwrap();
    let a = [assignment(2, "amy"), assignment(5, "bo")];
    let def = weekdays(&[1, 3, 5]);
    assert_eq!(expand(&def, &a, window), expand(&def, &a, window));
}

#[test]
fn inconsistent_schedules_are_rejected() {
    let cases = [
        ScheduleDef::from_parts(ScheduleType::Weekdays, None, None, t(8, 0), 60),
        ScheduleDef::from_parts(ScheduleType::Daily, None, Some(d(2025, 6, 1)), t(8, 0), 60),
        ScheduleDef::from_parts(
            ScheduleType::Daily,
            Some(WeekdaySet::WORKWEEK),
            None,
            t(8, 0),
            60,
        ),
        ScheduleDef::from_parts(ScheduleType::Date, None, None, t(8, 0), 60),
        ScheduleDef::from_parts(ScheduleType::Weekdays, Some(WeekdaySet::default()), None, t(8, 0), 60),
        ScheduleDef::from_parts(ScheduleType::Daily, None, None, t(8, 0), 0),
        ScheduleDef::from_raw(ScheduleType::Weekdays, Some(&[1, 7]), None, t(8, 0), 60),
    ];
    for (i, case) in cases.into_iter().enumerate() {
        assert!(
            matches!(case, Err(EngineError::Validation(_))),
            "case {i} should fail validation: {case:?}"
        );
    }
}

#[test]
fn windows_are_bounded() {
    assert!(matches!(
        DateWindow::new(d(2025, 6, 2), d(2025, 6, 1)),
        Err(EngineError::Validation(_))
    ));
    let start = d(2025, 1, 1);
    let too_far = start + chrono::Duration::days(MAX_WINDOW_DAYS);
    assert!(DateWindow::new(start, too_far).is_err());
    assert!(DateWindow::new(start, too_far - chrono::Duration::days(1)).is_ok());
}

#[test]
fn previous_occurrence_follows_the_rule() {
    let workweek = weekdays(&[1, 2, 3, 4, 5]);
    // Monday's predecessor is the previous Friday
    assert_eq!(workweek.previous_occurrence(d(2025, 6, 9)), Some(d(2025, 6, 6)));
    assert_eq!(workweek.previous_occurrence(d(2025, 6, 10)), Some(d(2025, 6, 9)));
    assert_eq!(daily().previous_occurrence(d(2025, 6, 1)), Some(d(2025, 5, 31)));

    let once =
        ScheduleDef::from_parts(ScheduleType::Date, None, Some(d(2025, 6, 1)), t(8, 0), 60)
            .unwrap();
    assert_eq!(once.previous_occurrence(d(2025, 6, 1)), None);
}

#[test]
fn streak_grows_on_consecutive_completions() {
    let def = daily();
    let mut s = StreakState::default();
    for day in 1..=3 {
        let due = d(2025, 6, day);
        s = s.completed(due, def.previous_occurrence(due));
    }
    assert_eq!(s.current, 3);
    assert_eq!(s.longest, 3);
    assert_eq!(s.last_completed_date, Some(d(2025, 6, 3)));
}

#[test]
fn streak_restarts_after_a_gap_and_keeps_longest() {
    let def = daily();
    let mut s = StreakState::default();
    for day in [1, 2, 3, 5] {
        let due = d(2025, 6, day);
        s = s.completed(due, def.previous_occurrence(due));
    }
    assert_eq!(s.current, 1);
    assert_eq!(s.longest, 3);
}

#[test]
fn workweek_streak_spans_the_weekend() {
    let def = weekdays(&[1, 2, 3, 4, 5]);
    let mut s = StreakState::default();
    for due in [d(2025, 6, 5), d(2025, 6, 6), d(2025, 6, 9)] {
        s = s.completed(due, def.previous_occurrence(due));
    }
    assert_eq!(s.current, 3);
}

#[test]
fn older_completion_does_not_move_the_streak() {
    let def = daily();
    let s = StreakState::default()
        .completed(d(2025, 6, 2), def.previous_occurrence(d(2025, 6, 2)))
        .completed(d(2025, 6, 3), def.previous_occurrence(d(2025, 6, 3)));
    let late = s.completed(d(2025, 6, 1), def.previous_occurrence(d(2025, 6, 1)));
    assert_eq!(late, s);
}

#[test]
fn miss_resets_current_only() {
    let ctx = TransitionCtx {
        due_date: d(2025, 6, 4),
        previous_expected: Some(d(2025, 6, 3)),
        points_value: 10,
    };
    let s = StreakState {
        current: 4,
        longest: 6,
        last_completed_date: Some(d(2025, 6, 3)),
    };
    let after = Transition::Miss.apply(s, &ctx);
    assert_eq!(after.current, 0);
    assert_eq!(after.longest, 6);
    assert_eq!(after.last_completed_date, Some(d(2025, 6, 3)));
    assert_eq!(Transition::Miss.target(), LogStatus::Missed);
    assert!(Transition::Miss.target().is_terminal());
    assert!(!LogStatus::Pending.is_terminal());

    let again = Transition::Complete.apply(after, &ctx);
    assert_eq!(again.current, 1, "a miss breaks the chain even if dates line up");
}

#[test]
fn miss_before_last_completion_keeps_the_streak() {
    let ctx = TransitionCtx {
        due_date: d(2025, 6, 2),
        previous_expected: Some(d(2025, 6, 1)),
        points_value: 10,
    };
    let s = StreakState {
        current: 2,
        longest: 2,
        last_completed_date: Some(d(2025, 6, 4)),
    };
    assert_eq!(Transition::Miss.apply(s, &ctx), s);

    let same_day = TransitionCtx {
        due_date: d(2025, 6, 4),
        ..ctx
    };
    assert_eq!(Transition::Miss.apply(s, &same_day).current, 0);
}

#[test]
fn assignment_diff_keeps_adds_and_retracts() {
    let current = vec![
        (1, "amy".to_string(), true),
        (2, "bo".to_string(), true),
        (3, "cy".to_string(), false),
    ];
    let desired = vec!["amy".to_string(), "cy".to_string(), "dee".to_string()];
    let diff = AssignmentDiff::compute(&current, &desired);
    assert_eq!(diff.keep, vec![(1, false), (3, true)]);
    assert_eq!(diff.add, vec!["dee".to_string()]);
    assert_eq!(diff.retract, vec![2]);
    assert!(!diff.is_noop());

    let same = AssignmentDiff::compute(&current[..2], &["amy".into(), "bo".into()]);
    assert!(same.is_noop());
}

#[test]
fn reconcile_retimes_and_retracts_pending_logs() {
    let def = weekdays(&[1, 3]); // 07:30
    let pending = vec![
        (10, d(2025, 6, 2), t(7, 30)), // Monday, same time
        (11, d(2025, 6, 3), t(7, 30)), // Tuesday, no longer scheduled
        (12, d(2025, 6, 4), t(9, 0)),  // Wednesday, time moved
    ];
    let (retime, retract) = reconcile_pending(&def, &pending);
    assert_eq!(retime, vec![12]);
    assert_eq!(retract, vec![11]);
}

#[test]
fn time_of_day_accepts_both_forms() {
    assert_eq!(parse_time("07:05").unwrap(), t(7, 5));
    assert_eq!(parse_time("19:45:00").unwrap(), t(19, 45));
    assert!(parse_time("25:00").is_err());
    assert!(parse_time("soon").is_err());
}

#[test]
fn announcement_prefers_custom_text() {
    assert_eq!(
        spoken_text("Amy", "Brush teeth", None),
        "Time for Brush teeth for Amy."
    );
    assert_eq!(
        spoken_text("Amy", "Brush teeth", Some("  ")),
        "Time for Brush teeth for Amy."
    );
    assert_eq!(
        spoken_text("Amy", "Brush teeth", Some("Amy, teeth please!")),
        "Amy, teeth please!"
    );
}

#[test]
fn weekday_sets_round_trip_through_storage_text() {
    let set = WeekdaySet::from_indices([5, 1, 3]).unwrap();
    assert_eq!(set.to_db_string(), "1,3,5");
    assert_eq!(WeekdaySet::parse_db("1,3,5").unwrap(), set);
    assert_eq!(set.len(), 3);
    assert!(set.contains_date(d(2025, 6, 4))); // Wednesday
    assert!(!set.contains_date(d(2025, 6, 3)));
}
