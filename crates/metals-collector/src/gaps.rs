//! 데이터 공백(gap) 탐지.
//!
//! 시작일부터 오늘까지의 영업일(월–금) 집합과 저장소의 관측 날짜 집합을
//! 비교해, 연속 결손 영업일 그룹을 찾습니다. 1–2일짜리 결손은 휴일
//! 소음으로 간주해 보고하지 않고, 3일 이상 연속 결손만 이상으로
//! 보고합니다. 결과는 긴 것부터 정렬됩니다.
//!
//! 국내(중국) 시장은 춘절/국경절 연휴로 5–7 영업일 공백이 정상적으로
//! 발생하므로, 여기서 찾는 것은 장기간의 불명 단층입니다.

use std::collections::HashSet;

use chrono::{Datelike, Days, NaiveDate, Weekday};
use tracing::{info, warn};

use metals_core::Metal;
use metals_data::storage::SeriesSelector;
use metals_data::MetalsStore;

use crate::Result;

/// 보고 대상이 되는 최소 연속 결손 길이.
pub const MIN_ANOMALY_LEN: usize = 3;

/// 연속 결손 영업일 그룹.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gap {
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// 결손 영업일 수
    pub len: usize,
}

/// 시작일부터 종료일까지(포함)의 영업일 목록.
pub fn business_days(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let mut days = Vec::new();
    let mut current = start;
    while current <= end {
        if !matches!(current.weekday(), Weekday::Sat | Weekday::Sun) {
            days.push(current);
        }
        current = match current.checked_add_days(Days::new(1)) {
            Some(d) => d,
            None => break,
        };
    }
    days
}

/// 기대 영업일 대비 결손 그룹 탐지.
///
/// 두 결손 날짜는 영업일 시퀀스에서 인접할 때(사이에 관측 영업일이 없을
/// 때) 같은 그룹으로 묶입니다. `min_len` 미만 그룹은 버려지고, 결과는
/// 길이 내림차순(동률은 시작일 오름차순)입니다.
pub fn find_gaps(
    expected: &[NaiveDate],
    observed: &HashSet<NaiveDate>,
    min_len: usize,
) -> Vec<Gap> {
    let mut groups: Vec<Vec<NaiveDate>> = Vec::new();
    let mut current: Vec<NaiveDate> = Vec::new();
    let mut last_missing_idx: Option<usize> = None;

    for (idx, day) in expected.iter().enumerate() {
        if observed.contains(day) {
            continue;
        }
        match last_missing_idx {
            // 영업일 시퀀스상 바로 다음 결손이면 같은 그룹
            Some(prev) if idx == prev + 1 => current.push(*day),
            _ => {
                if !current.is_empty() {
                    groups.push(std::mem::take(&mut current));
                }
                current.push(*day);
            }
        }
        last_missing_idx = Some(idx);
    }
    if !current.is_empty() {
        groups.push(current);
    }

    let mut gaps: Vec<Gap> = groups
        .into_iter()
        .filter(|g| g.len() >= min_len)
        .map(|g| Gap {
            start: g[0],
            end: *g.last().expect("non-empty gap group"),
            len: g.len(),
        })
        .collect();

    gaps.sort_by(|a, b| b.len.cmp(&a.len).then(a.start.cmp(&b.start)));
    gaps
}

/// 시계열 하나의 공백 감사.
pub async fn audit_series(
    store: &MetalsStore,
    name: &str,
    selector: &SeriesSelector,
    start: NaiveDate,
    today: NaiveDate,
) -> Result<Vec<Gap>> {
    let observed: HashSet<NaiveDate> = store
        .distinct_dates(selector, start)
        .await?
        .into_iter()
        .collect();
    let expected = business_days(start, today);
    let gaps = find_gaps(&expected, &observed, MIN_ANOMALY_LEN);

    if gaps.is_empty() {
        info!(series = name, "공백 없음 (1-2일 휴일 소음 제외)");
    } else {
        warn!(series = name, count = gaps.len(), "3일 이상 연속 공백 발견");
        for gap in gaps.iter().take(5) {
            warn!(
                series = name,
                start = %gap.start,
                end = %gap.end,
                len = gap.len,
                "공백 구간"
            );
        }
        if gaps.len() > 5 {
            warn!(series = name, "가장 긴 5개만 표시");
        }
    }

    Ok(gaps)
}

/// 표준 시계열 전체 감사.
pub async fn audit_standard_series(
    store: &MetalsStore,
    start: NaiveDate,
    today: NaiveDate,
) -> Result<Vec<(String, Vec<Gap>)>> {
    let series: Vec<(&str, SeriesSelector)> = vec![
        (
            "SHFE 금 선물",
            SeriesSelector::future_prices("SHFE", Metal::Gold),
        ),
        (
            "SHFE 은 선물",
            SeriesSelector::future_prices("SHFE", Metal::Silver),
        ),
        (
            "CME 금 선물",
            SeriesSelector::future_prices("CME", Metal::Gold),
        ),
        (
            "CME 은 선물",
            SeriesSelector::future_prices("CME", Metal::Silver),
        ),
        (
            "SGE 금 현물",
            SeriesSelector::spot_prices("SGE", Metal::Gold),
        ),
        ("GLD ETF", SeriesSelector::etf_holdings("GLD")),
        ("USDCNH 환율", SeriesSelector::fx_rates("USDCNH")),
    ];

    let mut results = Vec::new();
    for (name, selector) in series {
        let gaps = audit_series(store, name, &selector, start, today).await?;
        results.push((name.to_string(), gaps));
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_business_days_skip_weekends() {
        // 2026-02-02(월) ~ 2026-02-08(일)
        let days = business_days(date(2026, 2, 2), date(2026, 2, 8));
        assert_eq!(days.len(), 5);
        assert_eq!(days[0], date(2026, 2, 2));
        assert_eq!(days[4], date(2026, 2, 6));
    }

    #[test]
    fn test_five_consecutive_missing_days_form_one_gap() {
        // 2026-01-05(월) ~ 2026-01-30(금), 1/12~1/16 한 주 결손
        let expected = business_days(date(2026, 1, 5), date(2026, 1, 30));
        let missing_week: Vec<NaiveDate> = business_days(date(2026, 1, 12), date(2026, 1, 16));
        let observed: HashSet<NaiveDate> = expected
            .iter()
            .copied()
            .filter(|d| !missing_week.contains(d))
            .collect();

        let gaps = find_gaps(&expected, &observed, MIN_ANOMALY_LEN);
        assert_eq!(gaps.len(), 1);
        assert_eq!(gaps[0].start, date(2026, 1, 12));
        assert_eq!(gaps[0].end, date(2026, 1, 16));
        assert_eq!(gaps[0].len, 5);
    }

    #[test]
    fn test_isolated_single_missing_day_is_not_reported() {
        let expected = business_days(date(2026, 1, 5), date(2026, 1, 30));
        let mut observed: HashSet<NaiveDate> = expected.iter().copied().collect();
        observed.remove(&date(2026, 1, 14));

        assert!(find_gaps(&expected, &observed, MIN_ANOMALY_LEN).is_empty());
    }

    #[test]
    fn test_weekend_does_not_split_gap() {
        // 금요일+월요일+화요일 결손 → 주말을 사이에 두고 한 그룹 (길이 3)
        let expected = business_days(date(2026, 1, 5), date(2026, 1, 30));
        let mut observed: HashSet<NaiveDate> = expected.iter().copied().collect();
        observed.remove(&date(2026, 1, 9)); // 금
        observed.remove(&date(2026, 1, 12)); // 월
        observed.remove(&date(2026, 1, 13)); // 화

        let gaps = find_gaps(&expected, &observed, MIN_ANOMALY_LEN);
        assert_eq!(gaps.len(), 1);
        assert_eq!(gaps[0].start, date(2026, 1, 9));
        assert_eq!(gaps[0].len, 3);
    }

    #[test]
    fn test_gaps_sorted_longest_first() {
        let expected = business_days(date(2026, 1, 5), date(2026, 2, 27));
        let mut observed: HashSet<NaiveDate> = expected.iter().copied().collect();
        // 3일 공백
        for d in business_days(date(2026, 1, 7), date(2026, 1, 9)) {
            observed.remove(&d);
        }
        // 5일 공백
        for d in business_days(date(2026, 2, 2), date(2026, 2, 6)) {
            observed.remove(&d);
        }

        let gaps = find_gaps(&expected, &observed, MIN_ANOMALY_LEN);
        assert_eq!(gaps.len(), 2);
        assert_eq!(gaps[0].len, 5);
        assert_eq!(gaps[1].len, 3);
    }

    #[tokio::test]
    async fn test_audit_series_against_store() {
        use metals_core::SpotPriceRecord;

        let store = MetalsStore::in_memory().await.unwrap();
        let start = date(2026, 1, 5);
        let today = date(2026, 1, 16);

        // 1/12~1/16 주만 비우고 나머지 영업일 채움
        let records: Vec<SpotPriceRecord> = business_days(start, date(2026, 1, 9))
            .into_iter()
            .map(|d| SpotPriceRecord {
                date: d,
                market: "SGE".to_string(),
                metal: Metal::Gold,
                price: 780.0,
                currency: "CNY".to_string(),
                source: "sge_web".to_string(),
            })
            .collect();
        store.upsert_spot_prices(&records).await.unwrap();

        let selector = SeriesSelector::spot_prices("SGE", Metal::Gold);
        let gaps = audit_series(&store, "SGE 금 현물", &selector, start, today)
            .await
            .unwrap();
        assert_eq!(gaps.len(), 1);
        assert_eq!(gaps[0].len, 5);
    }
}
