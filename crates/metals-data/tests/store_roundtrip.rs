//! 저장소 멱등성/natural-key 교체 통합 테스트.

use chrono::NaiveDate;
use metals_core::{
    CftcPositionRecord, EtfHoldingRecord, FxRateRecord, InventoryCategory, InventoryRecord, Metal,
    SpotPriceRecord,
};
use metals_data::storage::SeriesSelector;
use metals_data::MetalsStore;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn spot(d: NaiveDate, price: f64) -> SpotPriceRecord {
    SpotPriceRecord {
        date: d,
        market: "SGE".to_string(),
        metal: Metal::Gold,
        price,
        currency: "CNY".to_string(),
        source: "sge_web".to_string(),
    }
}

fn inventory(d: NaiveDate, warehouse: &str, value: f64) -> InventoryRecord {
    InventoryRecord {
        date: d,
        exchange: "COMEX".to_string(),
        metal: Metal::Gold,
        category: InventoryCategory::Registered,
        warehouse: warehouse.to_string(),
        inventory: value,
        unit: "oz".to_string(),
        source: "cme_xls".to_string(),
    }
}

#[tokio::test]
async fn reupserting_identical_batch_does_not_duplicate_rows() {
    let store = MetalsStore::in_memory().await.unwrap();
    let records = vec![
        spot(date(2026, 2, 2), 780.0),
        spot(date(2026, 2, 3), 781.0),
        spot(date(2026, 2, 4), 782.0),
    ];

    assert_eq!(store.upsert_spot_prices(&records).await.unwrap(), 3);
    assert_eq!(store.upsert_spot_prices(&records).await.unwrap(), 3);

    let stored = store
        .spot_prices_since("SGE", Metal::Gold, date(2026, 1, 1))
        .await
        .unwrap();
    assert_eq!(stored.len(), 3);
}

#[tokio::test]
async fn natural_key_collision_keeps_most_recent_value() {
    let store = MetalsStore::in_memory().await.unwrap();
    let d = date(2026, 2, 6);

    store
        .upsert_inventory(&[inventory(d, "WH1", 100.0)])
        .await
        .unwrap();
    store
        .upsert_inventory(&[inventory(d, "WH1", 150.0)])
        .await
        .unwrap();

    let latest = store
        .latest_inventory("COMEX", Metal::Gold)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(latest.inventory, 150.0);
    assert_eq!(latest.warehouse, "WH1");

    // 같은 키로 두 번 써도 행은 하나
    let dates = store
        .distinct_dates(
            &SeriesSelector::inventory("COMEX", Metal::Gold),
            date(2026, 1, 1),
        )
        .await
        .unwrap();
    assert_eq!(dates, vec![d]);
}

#[tokio::test]
async fn different_warehouses_are_distinct_keys() {
    let store = MetalsStore::in_memory().await.unwrap();
    let d = date(2026, 2, 6);

    store
        .upsert_inventory(&[inventory(d, "WH1", 100.0), inventory(d, "WH2", 20.0)])
        .await
        .unwrap();
    store
        .upsert_inventory(&[inventory(d, "WH1", 110.0)])
        .await
        .unwrap();

    // WH2는 교체되지 않고 유지
    let latest = store
        .latest_inventory("COMEX", Metal::Gold)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(latest.date, d);
}

#[tokio::test]
async fn latest_returns_most_recent_by_date() {
    let store = MetalsStore::in_memory().await.unwrap();
    let records = vec![
        FxRateRecord {
            date: date(2026, 2, 4),
            pair: "USDCNH".to_string(),
            rate: 7.21,
            source: "sina_fx".to_string(),
        },
        FxRateRecord {
            date: date(2026, 2, 6),
            pair: "USDCNH".to_string(),
            rate: 7.25,
            source: "sina_fx".to_string(),
        },
        FxRateRecord {
            date: date(2026, 2, 5),
            pair: "USDCNH".to_string(),
            rate: 7.23,
            source: "sina_fx".to_string(),
        },
    ];
    store.upsert_fx_rates(&records).await.unwrap();

    let latest = store.latest_fx("USDCNH").await.unwrap().unwrap();
    assert_eq!(latest.date, date(2026, 2, 6));
    assert_eq!(latest.rate, 7.25);

    assert!(store.latest_fx("EURUSD").await.unwrap().is_none());
}

#[tokio::test]
async fn etf_row_count_tracks_symbol_history() {
    let store = MetalsStore::in_memory().await.unwrap();
    assert_eq!(store.etf_row_count("GLD").await.unwrap(), 0);

    let records: Vec<EtfHoldingRecord> = (1..=3)
        .map(|day| EtfHoldingRecord {
            date: date(2026, 2, day),
            symbol: "GLD".to_string(),
            metal: Metal::Gold,
            shares: Some(1_000_000.0 + day as f64),
            ounces: Some(100_000.0),
            change: Some(0.0),
            source: "yahoo_chart".to_string(),
        })
        .collect();
    store.upsert_etf_holdings(&records).await.unwrap();

    assert_eq!(store.etf_row_count("GLD").await.unwrap(), 3);
    assert_eq!(store.etf_row_count("SLV").await.unwrap(), 0);
}

#[tokio::test]
async fn cftc_upsert_replaces_on_report_date_key() {
    let store = MetalsStore::in_memory().await.unwrap();
    let base = CftcPositionRecord {
        report_date: date(2026, 2, 3),
        market: "COMEX".to_string(),
        metal: Metal::Gold,
        non_commercial_long: Some(300_000.0),
        non_commercial_short: Some(80_000.0),
        commercial_long: Some(150_000.0),
        commercial_short: Some(350_000.0),
        net_position: Some(220_000.0),
        source: "cftc_api".to_string(),
    };
    store.upsert_cftc_positions(&[base.clone()]).await.unwrap();

    let revised = CftcPositionRecord {
        non_commercial_long: Some(310_000.0),
        net_position: Some(230_000.0),
        source: "cftc_zip".to_string(),
        ..base
    };
    store.upsert_cftc_positions(&[revised]).await.unwrap();

    // 재실행해도 키당 한 행, 값은 마지막 upsert 기준
    let dates = store
        .distinct_dates(
            &SeriesSelector {
                table: "cftc_positions_weekly",
                date_column: "report_date",
                filters: vec![
                    ("market", "COMEX".to_string()),
                    ("metal", "gold".to_string()),
                ],
            },
            date(2026, 1, 1),
        )
        .await
        .unwrap();
    assert_eq!(dates.len(), 1);
}

#[tokio::test]
async fn computed_factors_follow_same_replace_semantics() {
    use metals_core::ComputedFactorRecord;

    let store = MetalsStore::in_memory().await.unwrap();
    let d = date(2026, 2, 6);

    // 외부 지표 계산기가 쓰는 경로도 동일한 replace 계약
    store
        .upsert_computed_factors(&[ComputedFactorRecord {
            date: d,
            metric_type: "dpi".to_string(),
            value: 1.1,
            description: Some("delivery pressure index".to_string()),
        }])
        .await
        .unwrap();
    let written = store
        .upsert_computed_factors(&[ComputedFactorRecord {
            date: d,
            metric_type: "dpi".to_string(),
            value: 1.3,
            description: None,
        }])
        .await
        .unwrap();
    assert_eq!(written, 1);
}

#[tokio::test]
async fn has_observation_on_checks_single_date() {
    let store = MetalsStore::in_memory().await.unwrap();
    store
        .upsert_spot_prices(&[spot(date(2026, 2, 6), 782.5)])
        .await
        .unwrap();

    let selector = SeriesSelector::spot_prices("SGE", Metal::Gold);
    assert!(store
        .has_observation_on(&selector, date(2026, 2, 6))
        .await
        .unwrap());
    assert!(!store
        .has_observation_on(&selector, date(2026, 2, 5))
        .await
        .unwrap());
}
