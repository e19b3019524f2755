//! Derived series computed from a player's statistics history.
//!
//! The history arrives oldest first (see [`TimeSeriesRecord::from_newest_first`]).
//! [`aggregate`] appends the live values of the player as the most recent
//! period and then derives per-period deltas for the cumulative play
//! counters, plus the unranked share of the daily plays.

use crate::models::{PlayerRecord, TimeSeriesRecord};
use crate::types::TimeStamped;

pub const TIMESTAMP_FIELD: &str = "timestamp";
pub const COUNTRY_RANK_FIELD: &str = "countryRank";
pub const TOTAL_PLAY_COUNT_FIELD: &str = "totalPlayCount";
pub const RANKED_PLAY_COUNT_FIELD: &str = "rankedPlayCount";
pub const UNRANKED_PLAY_COUNT_DAILY_FIELD: &str = "unrankedPlayCountDaily";

pub const CUMULATIVE_FIELDS: [&str; 2] = [TOTAL_PLAY_COUNT_FIELD, RANKED_PLAY_COUNT_FIELD];

pub fn daily_field_name(cumulative_field: &str) -> String {
    format!("{cumulative_field}Daily")
}

/// Per-period growth of a cumulative counter.
///
/// The first delta is always zero. A missing sample counts as no growth, and
/// a missing predecessor counts as zero. A drop in the counter (an upstream
/// reset or correction) is clamped to zero.
pub fn daily_deltas(samples: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut deltas = Vec::with_capacity(samples.len());

    for (index, sample) in samples.iter().enumerate() {
        let delta = match (index, sample) {
            (0, _) | (_, None) => 0.0,
            (_, Some(current)) => {
                let previous = samples[index - 1].unwrap_or(0.0);
                let delta = current - previous;
                if delta < 0.0 {
                    tracing::debug!(index, previous, current, "cumulative counter went down");
                    0.0
                } else {
                    delta
                }
            }
        };

        deltas.push(Some(delta));
    }

    deltas
}

/// `max(0, total - ranked)` per period. A hole in `total_daily` stays a hole;
/// a hole in `ranked_daily` counts as zero ranked plays.
pub fn unranked_daily(total_daily: &[Option<f64>], ranked_daily: &[Option<f64>]) -> Vec<Option<f64>> {
    total_daily
        .iter()
        .enumerate()
        .map(|(index, total)| {
            total.map(|total| {
                let ranked = ranked_daily.get(index).copied().flatten().unwrap_or(0.0);
                (total - ranked).max(0.0)
            })
        })
        .collect()
}

/// Appends the live snapshot as the most recent sample of every field.
///
/// The timestamp field receives the snapshot time in epoch seconds and the
/// country rank field the player's first country rank; every other field
/// receives the player's live value for it, or a hole when there is none.
pub fn append_live_snapshot(record: &mut TimeSeriesRecord, live: &TimeStamped<PlayerRecord>) {
    let fields = record.fields().map(str::to_owned).collect::<Vec<_>>();

    for field in fields {
        #[allow(clippy::cast_precision_loss)]
        let current = match field.as_str() {
            TIMESTAMP_FIELD => Some(live.epoch_seconds()),
            COUNTRY_RANK_FIELD => live.data.country_rank().map(|rank| rank as f64),
            other => live.data.current_value(other),
        };

        if let Some(samples) = record.field_mut(&field) {
            samples.push(current);
        }
    }
}

/// Full pipeline: live snapshot appended, then daily deltas for each
/// cumulative counter present and the unranked daily series when both
/// counters are present. An empty history stays empty.
pub fn aggregate(mut history: TimeSeriesRecord, live: &TimeStamped<PlayerRecord>) -> TimeSeriesRecord {
    if history.is_empty() {
        return history;
    }

    append_live_snapshot(&mut history, live);

    for field in CUMULATIVE_FIELDS {
        if let Some(samples) = history.field(field) {
            let deltas = daily_deltas(samples);
            history.insert(daily_field_name(field), deltas);
        }
    }

    let unranked = match (
        history.field(&daily_field_name(TOTAL_PLAY_COUNT_FIELD)),
        history.field(&daily_field_name(RANKED_PLAY_COUNT_FIELD)),
    ) {
        (Some(total), Some(ranked)) => Some(unranked_daily(total, ranked)),
        _ => None,
    };

    if let Some(unranked) = unranked {
        history.insert(UNRANKED_PLAY_COUNT_DAILY_FIELD, unranked);
    }

    history
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::models::{CountryRank, PlayerId, PlayerInfo};
    use chrono::{TimeZone, Utc};
    use serde_json::{json, Map, Value};

    fn some(values: &[f64]) -> Vec<Option<f64>> {
        values.iter().copied().map(Some).collect()
    }

    fn live_player(score_stats: Value) -> TimeStamped<PlayerRecord> {
        TimeStamped {
            data: PlayerRecord {
                player_id: PlayerId::from("1"),
                name: Some("someone".into()),
                player_info: PlayerInfo {
                    avatar: None,
                    banned: false,
                    inactive: false,
                    rank_history: vec![],
                    external_profile_url: None,
                    countries: vec![CountryRank {
                        country: Some("JP".into()),
                        rank: Some(12),
                    }],
                    other: json!({"pp": 1234.5, "rank": 300}).as_object().cloned().unwrap(),
                },
                score_stats: score_stats.as_object().cloned(),
            },
            utc_timestamp: Utc.timestamp_opt(1_700_000_000, 500_000_000).unwrap(),
        }
    }

    fn snapshot(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn deltas_of_increasing_counter() {
        assert_eq!(
            daily_deltas(&some(&[0.0, 5.0, 12.0, 12.0, 20.0])),
            some(&[0.0, 5.0, 7.0, 0.0, 8.0])
        );
    }

    #[test]
    fn downward_correction_is_clamped() {
        assert_eq!(
            daily_deltas(&some(&[10.0, 15.0, 9.0, 20.0])),
            some(&[0.0, 5.0, 0.0, 11.0])
        );
    }

    #[test]
    fn missing_samples_give_zero_growth() {
        assert_eq!(
            daily_deltas(&[Some(3.0), None, Some(7.0)]),
            some(&[0.0, 0.0, 7.0])
        );
        assert!(daily_deltas(&[]).is_empty());
    }

    #[test]
    fn unranked_is_total_minus_ranked() {
        assert_eq!(
            unranked_daily(&some(&[0.0, 5.0, 7.0]), &some(&[0.0, 2.0, 3.0])),
            some(&[0.0, 3.0, 4.0])
        );
    }

    #[test]
    fn unranked_preserves_holes_in_total() {
        assert_eq!(
            unranked_daily(&[Some(0.0), None, Some(7.0)], &some(&[0.0, 2.0, 3.0])),
            vec![Some(0.0), None, Some(4.0)]
        );
    }

    #[test]
    fn unranked_never_goes_negative() {
        assert_eq!(
            unranked_daily(&some(&[1.0]), &[Some(4.0)]),
            some(&[0.0])
        );
        assert_eq!(unranked_daily(&some(&[2.0]), &[None]), some(&[2.0]));
    }

    #[test]
    fn aggregate_appends_live_values_and_derives_series() {
        let history = TimeSeriesRecord::from_newest_first(vec![
            snapshot(json!({"timestamp": 200, "countryRank": 15, "totalPlayCount": 12, "rankedPlayCount": 5, "pp": 1200.0})),
            snapshot(json!({"timestamp": 100, "countryRank": 20, "totalPlayCount": 5, "rankedPlayCount": 2, "pp": 1100.0})),
        ]);
        let live = live_player(json!({"totalPlayCount": 20, "rankedPlayCount": 6}));

        let aggregated = aggregate(history, &live);

        assert_eq!(
            aggregated.field(TIMESTAMP_FIELD),
            Some(&[Some(100.0), Some(200.0), Some(1_700_000_000.5)][..])
        );
        assert_eq!(
            aggregated.field(COUNTRY_RANK_FIELD),
            Some(&[Some(20.0), Some(15.0), Some(12.0)][..])
        );
        assert_eq!(
            aggregated.field("pp"),
            Some(&[Some(1100.0), Some(1200.0), Some(1234.5)][..])
        );
        assert_eq!(
            aggregated.field("totalPlayCountDaily"),
            Some(&some(&[0.0, 7.0, 8.0])[..])
        );
        assert_eq!(
            aggregated.field("rankedPlayCountDaily"),
            Some(&some(&[0.0, 3.0, 1.0])[..])
        );
        assert_eq!(
            aggregated.field(UNRANKED_PLAY_COUNT_DAILY_FIELD),
            Some(&some(&[0.0, 4.0, 7.0])[..])
        );
    }

    #[test]
    fn field_without_live_value_gets_a_hole() {
        let history = TimeSeriesRecord::from_newest_first(vec![snapshot(
            json!({"totalPlayCount": 5, "replaysWatched": 3}),
        )]);
        let live = live_player(json!({}));

        let aggregated = aggregate(history, &live);

        assert_eq!(aggregated.field("replaysWatched"), Some(&[Some(3.0), None][..]));
        assert_eq!(
            aggregated.field("totalPlayCountDaily"),
            Some(&some(&[0.0, 0.0])[..])
        );
        assert_eq!(aggregated.field(UNRANKED_PLAY_COUNT_DAILY_FIELD), None);
    }

    #[test]
    fn empty_history_is_left_alone() {
        let aggregated = aggregate(TimeSeriesRecord::default(), &live_player(json!({})));
        assert!(aggregated.is_empty());
    }
}
