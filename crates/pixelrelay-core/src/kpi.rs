//! Period-over-period KPI aggregation for a landing page.
//!
//! Joins tracking sessions (scoped by page) with Purchase conversion sends
//! (not scoped by page) on `visit_uid`, for the requested window and for the
//! equal-length window immediately before it.

use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{KpiError, PeriodKind, StoreKind};
use crate::event::{ConversionEvent, TimeRange, TrackingRecord, PURCHASE_EVENT};
use crate::page::PageRef;
use crate::store::{EventStore, TrackingStore};

/// Raw request parameters, as received from the caller.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct KpiQuery {
    pub from: Option<String>,
    pub to: Option<String>,
    #[serde(rename = "pageId")]
    pub page_id: Option<String>,
}

/// One reported metric and its change against the previous period, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Metric<T> {
    pub valor: T,
    pub variacion: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeriodBounds {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeriodEcho {
    pub actual: PeriodBounds,
    pub anterior: PeriodBounds,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KpiReport {
    pub visitantes_totales: Metric<u64>,
    /// Seconds.
    pub tiempo_promedio: Metric<u64>,
    /// Percent, two decimals.
    pub tasa_conversion: Metric<f64>,
    /// No registration source is wired in; always zero.
    pub registros_casino: Metric<u64>,
    pub periodo: PeriodEcho,
}

/// Metrics for a single window.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PeriodStats {
    pub visitor_count: u64,
    pub avg_active_time: u64,
    pub conversion_rate_pct: f64,
    pub registration_count: u64,
}

/// Parse an ISO-8601 timestamp into UTC.
///
/// Accepts RFC 3339 (any offset), a naive `YYYY-MM-DDTHH:MM:SS[.fff]` and a
/// bare `YYYY-MM-DD`; the last two are read as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// The window of identical length that ends where `current` starts.
pub fn previous_period(current: &TimeRange) -> TimeRange {
    let diff = current.to - current.from;
    TimeRange::new(current.from - diff, current.from)
}

/// Percentage change from `previous` to `actual`.
///
/// `0` when both are zero, `100` when only `previous` is zero.
pub fn variation(actual: f64, previous: f64) -> f64 {
    if previous == 0.0 {
        if actual == 0.0 {
            0.0
        } else {
            100.0
        }
    } else {
        100.0 * (actual - previous) / previous
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Derive the four metrics for one window.
///
/// `purchases` is expected to hold Purchase sends for the same window only.
pub fn period_stats(tracking: &[TrackingRecord], purchases: &[ConversionEvent]) -> PeriodStats {
    let visitor_count = tracking.len() as u64;
    if visitor_count == 0 {
        return PeriodStats::default();
    }

    // Summed in u128 so totals near u64::MAX cannot overflow.
    let total_active: u128 = tracking
        .iter()
        .map(|r| u128::from(r.total_active_time.unwrap_or(0)))
        .sum();
    let n = u128::from(visitor_count);
    // Integer round-half-up of total_active / visitor_count.
    let avg_active_time = u64::try_from((2 * total_active + n) / (2 * n)).unwrap_or(u64::MAX);

    let tracked: HashSet<&str> = tracking
        .iter()
        .filter_map(|r| r.visit_uid.as_deref())
        .collect();
    let converted = purchases
        .iter()
        .filter_map(|e| e.visit_uid.as_deref())
        .collect::<HashSet<&str>>()
        .intersection(&tracked)
        .count();

    PeriodStats {
        visitor_count,
        avg_active_time,
        conversion_rate_pct: round2(100.0 * converted as f64 / visitor_count as f64),
        registration_count: 0,
    }
}

fn iso_millis(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn required<'a>(value: &'a Option<String>, field: &str) -> Result<&'a str, KpiError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| KpiError::InvalidInput(format!("{field} is required")))
}

async fn fetch_period(
    tracking: &dyn TrackingStore,
    events: &dyn EventStore,
    page_id: &PageRef,
    range: &TimeRange,
    period: PeriodKind,
) -> Result<(Vec<TrackingRecord>, Vec<ConversionEvent>), KpiError> {
    let tracking_fut = async {
        tracking
            .find_tracking(page_id, range)
            .await
            .map_err(|source| KpiError::StoreFetch {
                period,
                store: StoreKind::Tracking,
                source,
            })
    };
    let events_fut = async {
        events
            .find_events(PURCHASE_EVENT, range)
            .await
            .map_err(|source| KpiError::StoreFetch {
                period,
                store: StoreKind::Events,
                source,
            })
    };
    tokio::try_join!(tracking_fut, events_fut)
}

/// Compute the KPI report for `query` against the two stores.
///
/// All four fetches run concurrently; the first failure aborts the whole
/// computation and nothing partial is returned.
pub async fn compute_kpis(
    tracking: &dyn TrackingStore,
    events: &dyn EventStore,
    query: &KpiQuery,
) -> Result<KpiReport, KpiError> {
    let from_raw = required(&query.from, "from")?;
    let to_raw = required(&query.to, "to")?;
    let page_raw = required(&query.page_id, "pageId")?;

    let from = parse_timestamp(from_raw)
        .ok_or_else(|| KpiError::InvalidInput("from must be an ISO-8601 timestamp".to_string()))?;
    let to = parse_timestamp(to_raw)
        .ok_or_else(|| KpiError::InvalidInput("to must be an ISO-8601 timestamp".to_string()))?;
    if to < from {
        return Err(KpiError::InvalidInput(
            "to must be on or after from".to_string(),
        ));
    }
    let page_id = PageRef::parse(page_raw)?;

    let current = TimeRange::new(from, to);
    let previous = previous_period(&current);

    let ((cur_tracking, cur_purchases), (prev_tracking, prev_purchases)) = tokio::try_join!(
        fetch_period(tracking, events, &page_id, &current, PeriodKind::Current),
        fetch_period(tracking, events, &page_id, &previous, PeriodKind::Previous),
    )?;

    let actual = period_stats(&cur_tracking, &cur_purchases);
    let prior = period_stats(&prev_tracking, &prev_purchases);

    tracing::debug!(
        page_id = %page_id,
        visitors = actual.visitor_count,
        prev_visitors = prior.visitor_count,
        purchases = cur_purchases.len(),
        "KPI periods aggregated"
    );

    Ok(KpiReport {
        visitantes_totales: Metric {
            valor: actual.visitor_count,
            variacion: variation(actual.visitor_count as f64, prior.visitor_count as f64),
        },
        tiempo_promedio: Metric {
            valor: actual.avg_active_time,
            variacion: variation(actual.avg_active_time as f64, prior.avg_active_time as f64),
        },
        tasa_conversion: Metric {
            valor: actual.conversion_rate_pct,
            variacion: variation(actual.conversion_rate_pct, prior.conversion_rate_pct),
        },
        registros_casino: Metric {
            valor: actual.registration_count,
            variacion: variation(
                actual.registration_count as f64,
                prior.registration_count as f64,
            ),
        },
        periodo: PeriodEcho {
            actual: PeriodBounds {
                from: from_raw.to_string(),
                to: to_raw.to_string(),
            },
            anterior: PeriodBounds {
                from: iso_millis(previous.from),
                to: iso_millis(previous.to),
            },
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryStore;

    const PAGE: &str = "65a1f0c2b3d4e5f6a7b8c9d0";
    const OTHER_PAGE: &str = "ffffffffffffffffffffffff";

    fn ts(raw: &str) -> DateTime<Utc> {
        parse_timestamp(raw).expect("timestamp")
    }

    fn visit(page: &str, uid: Option<&str>, at: &str, active: Option<u64>) -> TrackingRecord {
        TrackingRecord {
            id: uuid::Uuid::new_v4().to_string(),
            visit_uid: uid.map(str::to_string),
            page_id: PageRef::parse(page).expect("page"),
            created_at: ts(at),
            total_active_time: active,
        }
    }

    fn send(name: &str, uid: Option<&str>, at: &str) -> ConversionEvent {
        ConversionEvent {
            id: uuid::Uuid::new_v4().to_string(),
            visit_uid: uid.map(str::to_string),
            page_id: None,
            event_name: name.to_string(),
            pixel_id: "123".to_string(),
            payload: "{}".to_string(),
            success: true,
            response: None,
            error: None,
            created_at: ts(at),
        }
    }

    fn week_query() -> KpiQuery {
        KpiQuery {
            from: Some("2024-01-08T00:00:00Z".to_string()),
            to: Some("2024-01-15T00:00:00Z".to_string()),
            page_id: Some(PAGE.to_string()),
        }
    }

    async fn run(store: &InMemoryStore, query: &KpiQuery) -> Result<KpiReport, KpiError> {
        compute_kpis(store, store, query).await
    }

    #[test]
    fn variation_zero_over_zero_is_zero() {
        assert_eq!(variation(0.0, 0.0), 0.0);
    }

    #[test]
    fn variation_from_zero_is_one_hundred() {
        assert_eq!(variation(3.0, 0.0), 100.0);
        assert_eq!(variation(0.5, 0.0), 100.0);
    }

    #[test]
    fn variation_is_relative_change() {
        assert_eq!(variation(15.0, 10.0), 50.0);
        assert_eq!(variation(5.0, 10.0), -50.0);
        assert_eq!(variation(0.0, 4.0), -100.0);
        assert!((variation(2.0, 3.0) + 100.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn previous_period_has_same_length_and_ends_at_start() {
        let current = TimeRange::new(ts("2024-01-08T00:00:00Z"), ts("2024-01-15T00:00:00Z"));
        let prev = previous_period(&current);
        assert_eq!(prev.from, ts("2024-01-01T00:00:00Z"));
        assert_eq!(prev.to, ts("2024-01-08T00:00:00Z"));
        assert_eq!(prev.to - prev.from, current.to - current.from);
    }

    #[test]
    fn timestamps_accept_offsets_naive_and_dates() {
        assert_eq!(ts("2024-01-08T03:00:00+03:00"), ts("2024-01-08T00:00:00Z"));
        assert_eq!(ts("2024-01-08T00:00:00.000"), ts("2024-01-08T00:00:00Z"));
        assert_eq!(ts("2024-01-08"), ts("2024-01-08T00:00:00Z"));
        assert!(parse_timestamp("last tuesday").is_none());
    }

    #[test]
    fn average_rounds_half_up() {
        let records = vec![
            visit(PAGE, None, "2024-01-09T00:00:00Z", Some(1)),
            visit(PAGE, None, "2024-01-09T00:00:00Z", Some(2)),
        ];
        assert_eq!(period_stats(&records, &[]).avg_active_time, 2);

        let records = vec![
            visit(PAGE, None, "2024-01-09T00:00:00Z", Some(1)),
            visit(PAGE, None, "2024-01-09T00:00:00Z", Some(1)),
            visit(PAGE, None, "2024-01-09T00:00:00Z", Some(2)),
        ];
        // 4 / 3 = 1.33
        assert_eq!(period_stats(&records, &[]).avg_active_time, 1);
    }

    #[test]
    fn average_survives_huge_totals() {
        let big = i64::MAX as u64;
        let records = vec![
            visit(PAGE, None, "2024-01-09T00:00:00Z", Some(big)),
            visit(PAGE, None, "2024-01-09T00:00:00Z", Some(big)),
        ];
        assert_eq!(period_stats(&records, &[]).avg_active_time, big);

        let records = vec![
            visit(PAGE, None, "2024-01-09T00:00:00Z", Some(u64::MAX)),
            visit(PAGE, None, "2024-01-09T00:00:00Z", Some(u64::MAX)),
            visit(PAGE, None, "2024-01-09T00:00:00Z", Some(u64::MAX)),
        ];
        assert_eq!(period_stats(&records, &[]).avg_active_time, u64::MAX);
    }

    #[test]
    fn missing_active_time_counts_as_zero() {
        let records = vec![
            visit(PAGE, None, "2024-01-09T00:00:00Z", Some(30)),
            visit(PAGE, None, "2024-01-09T00:00:00Z", None),
        ];
        assert_eq!(period_stats(&records, &[]).avg_active_time, 15);
    }

    #[test]
    fn conversion_uses_set_semantics() {
        let records = vec![
            visit(PAGE, Some("A"), "2024-01-09T00:00:00Z", None),
            visit(PAGE, Some("A"), "2024-01-09T01:00:00Z", None),
            visit(PAGE, Some("B"), "2024-01-09T02:00:00Z", None),
            visit(PAGE, None, "2024-01-09T03:00:00Z", None),
        ];
        let purchases = vec![
            send(PURCHASE_EVENT, Some("A"), "2024-01-09T05:00:00Z"),
            send(PURCHASE_EVENT, Some("A"), "2024-01-09T06:00:00Z"),
            send(PURCHASE_EVENT, None, "2024-01-09T06:00:00Z"),
            send(PURCHASE_EVENT, Some("Z"), "2024-01-09T06:00:00Z"),
        ];
        let stats = period_stats(&records, &purchases);
        // one converted uid out of four tracking records
        assert_eq!(stats.conversion_rate_pct, 25.0);
    }

    #[test]
    fn conversion_rate_stays_within_bounds() {
        let records = vec![visit(PAGE, Some("A"), "2024-01-09T00:00:00Z", None)];
        let purchases = vec![
            send(PURCHASE_EVENT, Some("A"), "2024-01-09T05:00:00Z"),
            send(PURCHASE_EVENT, Some("A"), "2024-01-09T06:00:00Z"),
        ];
        let stats = period_stats(&records, &purchases);
        assert_eq!(stats.conversion_rate_pct, 100.0);
        assert_eq!(period_stats(&[], &purchases).conversion_rate_pct, 0.0);
    }

    #[test]
    fn conversion_rate_rounds_to_two_decimals() {
        let records = vec![
            visit(PAGE, Some("A"), "2024-01-09T00:00:00Z", None),
            visit(PAGE, Some("B"), "2024-01-09T00:00:00Z", None),
            visit(PAGE, Some("C"), "2024-01-09T00:00:00Z", None),
        ];
        let purchases = vec![send(PURCHASE_EVENT, Some("A"), "2024-01-09T05:00:00Z")];
        assert_eq!(period_stats(&records, &purchases).conversion_rate_pct, 33.33);
    }

    #[tokio::test]
    async fn five_visitors_two_purchases() {
        let store = InMemoryStore::new();
        for (uid, active) in [("A", 10), ("B", 20), ("C", 30), ("D", 0), ("E", 40)] {
            store
                .insert_tracking(visit(PAGE, Some(uid), "2024-01-10T12:00:00Z", Some(active)))
                .await;
        }
        store
            .insert_event(send(PURCHASE_EVENT, Some("A"), "2024-01-11T00:00:00Z"))
            .await;
        store
            .insert_event(send(PURCHASE_EVENT, Some("D"), "2024-01-12T00:00:00Z"))
            .await;

        let report = run(&store, &week_query()).await.expect("report");
        assert_eq!(report.visitantes_totales.valor, 5);
        assert_eq!(report.tiempo_promedio.valor, 20);
        assert_eq!(report.tasa_conversion.valor, 40.0);
        assert_eq!(report.registros_casino.valor, 0);
        assert_eq!(report.registros_casino.variacion, 0.0);
        // empty previous period
        assert_eq!(report.visitantes_totales.variacion, 100.0);
        assert_eq!(report.tasa_conversion.variacion, 100.0);
    }

    #[tokio::test]
    async fn empty_periods_report_all_zeros() {
        let store = InMemoryStore::new();
        let report = run(&store, &week_query()).await.expect("report");
        assert_eq!(report.visitantes_totales, Metric { valor: 0, variacion: 0.0 });
        assert_eq!(report.tiempo_promedio, Metric { valor: 0, variacion: 0.0 });
        assert_eq!(report.tasa_conversion, Metric { valor: 0.0, variacion: 0.0 });
        assert_eq!(report.registros_casino, Metric { valor: 0, variacion: 0.0 });
    }

    #[tokio::test]
    async fn visitors_up_from_empty_previous_period() {
        let store = InMemoryStore::new();
        for uid in ["A", "B", "C"] {
            store
                .insert_tracking(visit(PAGE, Some(uid), "2024-01-09T00:00:00Z", Some(5)))
                .await;
        }
        let report = run(&store, &week_query()).await.expect("report");
        assert_eq!(report.visitantes_totales.valor, 3);
        assert_eq!(report.visitantes_totales.variacion, 100.0);
    }

    #[tokio::test]
    async fn compares_against_previous_week() {
        let store = InMemoryStore::new();
        for uid in ["A", "B"] {
            store
                .insert_tracking(visit(PAGE, Some(uid), "2024-01-03T00:00:00Z", Some(10)))
                .await;
        }
        for uid in ["C", "D", "E"] {
            store
                .insert_tracking(visit(PAGE, Some(uid), "2024-01-10T00:00:00Z", Some(20)))
                .await;
        }
        let report = run(&store, &week_query()).await.expect("report");
        assert_eq!(report.visitantes_totales.variacion, 50.0);
        assert_eq!(report.tiempo_promedio.variacion, 100.0);
    }

    #[tokio::test]
    async fn only_tracking_is_scoped_by_page() {
        let store = InMemoryStore::new();
        store
            .insert_tracking(visit(PAGE, Some("A"), "2024-01-10T00:00:00Z", None))
            .await;
        store
            .insert_tracking(visit(PAGE, Some("B"), "2024-01-10T00:00:00Z", None))
            .await;
        store
            .insert_tracking(visit(OTHER_PAGE, Some("C"), "2024-01-10T00:00:00Z", None))
            .await;
        // the send for A carries no page; C's visit is on another page
        store
            .insert_event(send(PURCHASE_EVENT, Some("A"), "2024-01-10T01:00:00Z"))
            .await;
        store
            .insert_event(send(PURCHASE_EVENT, Some("C"), "2024-01-10T01:00:00Z"))
            .await;

        let report = run(&store, &week_query()).await.expect("report");
        assert_eq!(report.visitantes_totales.valor, 2);
        assert_eq!(report.tasa_conversion.valor, 50.0);
    }

    #[tokio::test]
    async fn purchases_must_fall_in_the_same_window() {
        let store = InMemoryStore::new();
        store
            .insert_tracking(visit(PAGE, Some("A"), "2024-01-10T00:00:00Z", None))
            .await;
        store
            .insert_event(send(PURCHASE_EVENT, Some("A"), "2024-01-20T00:00:00Z"))
            .await;
        store
            .insert_event(send("PageView", Some("A"), "2024-01-10T00:00:00Z"))
            .await;

        let report = run(&store, &week_query()).await.expect("report");
        assert_eq!(report.tasa_conversion.valor, 0.0);
    }

    #[tokio::test]
    async fn bounds_are_inclusive() {
        let store = InMemoryStore::new();
        store
            .insert_tracking(visit(PAGE, Some("A"), "2024-01-08T00:00:00Z", None))
            .await;
        store
            .insert_tracking(visit(PAGE, Some("B"), "2024-01-15T00:00:00Z", None))
            .await;
        let report = run(&store, &week_query()).await.expect("report");
        assert_eq!(report.visitantes_totales.valor, 2);
        // the record at `from` also sits on the previous period's closing bound
        assert_eq!(report.visitantes_totales.variacion, 100.0);
    }

    #[tokio::test]
    async fn report_echoes_periods() {
        let store = InMemoryStore::new();
        let report = run(&store, &week_query()).await.expect("report");
        assert_eq!(report.periodo.actual.from, "2024-01-08T00:00:00Z");
        assert_eq!(report.periodo.actual.to, "2024-01-15T00:00:00Z");
        assert_eq!(report.periodo.anterior.from, "2024-01-01T00:00:00.000Z");
        assert_eq!(report.periodo.anterior.to, "2024-01-08T00:00:00.000Z");
    }

    #[tokio::test]
    async fn serializes_with_wire_names() {
        let store = InMemoryStore::new();
        let report = run(&store, &week_query()).await.expect("report");
        let json = serde_json::to_value(&report).expect("json");
        assert!(json["visitantesTotales"]["valor"].is_u64());
        assert!(json["tiempoPromedio"]["variacion"].is_f64());
        assert!(json["tasaConversion"]["valor"].is_f64());
        assert_eq!(json["registrosCasino"]["valor"], 0);
        assert!(json["periodo"]["anterior"]["from"].is_string());
    }

    #[tokio::test]
    async fn missing_parameters_are_invalid_input() {
        let store = InMemoryStore::new();
        for query in [
            KpiQuery { from: None, ..week_query() },
            KpiQuery { to: None, ..week_query() },
            KpiQuery { page_id: None, ..week_query() },
            KpiQuery { page_id: Some("  ".to_string()), ..week_query() },
        ] {
            let err = run(&store, &query).await.expect_err("must fail");
            assert!(matches!(err, KpiError::InvalidInput(_)), "got {err:?}");
        }
    }

    #[tokio::test]
    async fn malformed_page_is_reference_error() {
        let store = InMemoryStore::new();
        let query = KpiQuery {
            page_id: Some("landing-1".to_string()),
            ..week_query()
        };
        let err = run(&store, &query).await.expect_err("must fail");
        assert!(matches!(err, KpiError::ReferenceParse(_)));
    }

    #[tokio::test]
    async fn malformed_or_inverted_range_is_invalid_input() {
        let store = InMemoryStore::new();
        let bad_ts = KpiQuery {
            from: Some("yesterday".to_string()),
            ..week_query()
        };
        assert!(matches!(
            run(&store, &bad_ts).await,
            Err(KpiError::InvalidInput(_))
        ));

        let inverted = KpiQuery {
            from: Some("2024-01-15T00:00:00Z".to_string()),
            to: Some("2024-01-08T00:00:00Z".to_string()),
            ..week_query()
        };
        assert!(matches!(
            run(&store, &inverted).await,
            Err(KpiError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn store_failure_aborts_with_context() {
        let store = InMemoryStore::new();
        store.fail_reads("connection reset").await;
        let err = run(&store, &week_query()).await.expect_err("must fail");
        match err {
            KpiError::StoreFetch { source, .. } => {
                assert!(source.to_string().contains("connection reset"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
