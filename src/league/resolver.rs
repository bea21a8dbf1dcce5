//! Pure mapping from a league's season windows to its resolved status.
//!
//! The resolver only computes a proposed status; callers write it back when
//! it differs from the current one. It never mutates season records.

use time::OffsetDateTime;

use crate::league::{LeagueStatus, SeasonWindow};

/// Resolve a league's status from its season windows at the instant `now`.
///
/// Priority order is deliberate: a window covering `now` always wins over an
/// upcoming or past one, even when several windows overlap. A league with no
/// season windows is not auto-managed beyond the initial `Upcoming` to
/// `Active` promotion, and a `Canceled` league is never resurrected.
pub fn resolve(
    seasons: &[SeasonWindow],
    current: LeagueStatus,
    now: OffsetDateTime,
) -> LeagueStatus {
    if current == LeagueStatus::Canceled {
        return LeagueStatus::Canceled;
    }

    if seasons.is_empty() {
        return match current {
            LeagueStatus::Upcoming => LeagueStatus::Active,
            other => other,
        };
    }

    if seasons.iter().any(|window| window.contains(now)) {
        return LeagueStatus::Active;
    }

    if seasons.iter().any(|window| window.start > now) {
        return LeagueStatus::Upcoming;
    }

    LeagueStatus::Completed
}

/// The next season window strictly in the future, if any (earliest start).
pub fn next_window(seasons: &[SeasonWindow], now: OffsetDateTime) -> Option<SeasonWindow> {
    seasons
        .iter()
        .filter(|window| window.start > now)
        .min_by_key(|window| (window.start, window.id))
        .copied()
}

#[cfg(test)]
mod tests {
    use time::Duration;
    use time::macros::datetime;
    use uuid::Uuid;

    use super::*;

    const NOW: OffsetDateTime = datetime!(2025-06-01 12:00 UTC);

    fn window(start_offset_days: i64, end_offset_days: i64) -> SeasonWindow {
        SeasonWindow::new(
            Uuid::new_v4(),
            NOW + Duration::days(start_offset_days),
            NOW + Duration::days(end_offset_days),
        )
        .unwrap()
    }

    #[test]
    fn covering_window_resolves_active() {
        let seasons = vec![window(-10, 10)];
        assert_eq!(
            resolve(&seasons, LeagueStatus::Upcoming, NOW),
            LeagueStatus::Active
        );
    }

    #[test]
    fn only_past_windows_resolve_completed() {
        let seasons = vec![window(-20, -10)];
        assert_eq!(
            resolve(&seasons, LeagueStatus::Active, NOW),
            LeagueStatus::Completed
        );
    }

    #[test]
    fn only_future_windows_resolve_upcoming() {
        let seasons = vec![window(5, 15)];
        assert_eq!(
            resolve(&seasons, LeagueStatus::Completed, NOW),
            LeagueStatus::Upcoming
        );
    }

    #[test]
    fn active_window_dominates_future_one() {
        let seasons = vec![window(3, 10), window(-1, 1)];
        assert_eq!(
            resolve(&seasons, LeagueStatus::Upcoming, NOW),
            LeagueStatus::Active
        );
    }

    #[test]
    fn empty_seasons_only_promote_upcoming() {
        assert_eq!(
            resolve(&[], LeagueStatus::Upcoming, NOW),
            LeagueStatus::Active
        );
        assert_eq!(
            resolve(&[], LeagueStatus::Completed, NOW),
            LeagueStatus::Completed
        );
        assert_eq!(resolve(&[], LeagueStatus::Active, NOW), LeagueStatus::Active);
    }

    #[test]
    fn canceled_league_is_never_resurrected() {
        let seasons = vec![window(-1, 1)];
        assert_eq!(
            resolve(&seasons, LeagueStatus::Canceled, NOW),
            LeagueStatus::Canceled
        );
    }

    #[test]
    fn resolution_is_idempotent_for_fixed_now() {
        let cases = vec![
            vec![window(-10, 10)],
            vec![window(-20, -10)],
            vec![window(5, 15)],
            vec![window(-20, -10), window(5, 15)],
            vec![],
        ];
        for seasons in cases {
            for current in [
                LeagueStatus::Upcoming,
                LeagueStatus::Active,
                LeagueStatus::Completed,
            ] {
                let once = resolve(&seasons, current, NOW);
                assert_eq!(resolve(&seasons, once, NOW), once);
            }
        }
    }

    #[test]
    fn next_window_picks_earliest_future_start() {
        let near = window(2, 4);
        let far = window(8, 12);
        let seasons = vec![far, near];
        assert_eq!(next_window(&seasons, NOW), Some(near));
        assert_eq!(next_window(&[window(-5, -1)], NOW), None);
    }

    #[test]
    fn malformed_window_is_rejected_at_construction() {
        let err = SeasonWindow::new(Uuid::new_v4(), NOW, NOW - Duration::days(1)).unwrap_err();
        assert!(err.start > err.end);
    }
}
