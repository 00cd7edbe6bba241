//! HTTP 제공자 어댑터 통합 테스트 (mockito).

use chrono::NaiveDate;
use metals_core::{DataProvider, FetchContext, FetchError, HttpConfig, InventoryCategory, Metal};
use metals_data::provider::cftc::CftcApiProvider;
use metals_data::provider::shfe::ShfeWarrantProvider;
use metals_data::provider::sina::SinaFuturesProvider;
use metals_data::provider::yahoo::{CmeFuturesProvider, YahooChartClient};

fn ctx(y: i32, m: u32, d: u32) -> FetchContext {
    FetchContext::for_date(NaiveDate::from_ymd_opt(y, m, d).unwrap())
}

#[tokio::test]
async fn shfe_provider_maps_warrant_items() {
    let mut server = mockito::Server::new_async().await;
    let body = r#"{
        "o_cursor": [
            {"VARNAME": "黄金AU", "REGNAME": "中国银行上海分行", "WRTWGHTS": "3,000", "WGHTUNIT": "千克"},
            {"VARNAME": "白银AG", "REGNAME": "", "WHABBRNAME": "国储库", "WRTWGHTS": "120000", "WGHTUNIT": "千克"},
            {"VARNAME": "铜CU", "REGNAME": "无关", "WRTWGHTS": "500"},
            {"VARNAME": "黄金AU", "REGNAME": "零仓库", "WRTWGHTS": "0"}
        ]
    }"#;
    let mock = server
        .mock("GET", "/pm20260206.dat")
        .with_status(200)
        .with_body(body)
        .create_async()
        .await;

    let provider = ShfeWarrantProvider::with_base_url(&HttpConfig::default(), server.url());
    let records = provider.fetch(&ctx(2026, 2, 6)).await.unwrap();
    mock.assert_async().await;

    // 구리와 0중량 행은 제외
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].metal, Metal::Gold);
    assert_eq!(records[0].warehouse, "中国银行上海分行");
    assert_eq!(records[0].inventory, 3000.0);
    assert_eq!(records[0].category, InventoryCategory::Warehouse);
    assert_eq!(records[1].metal, Metal::Silver);
    assert_eq!(records[1].warehouse, "国储库");
}

#[tokio::test]
async fn shfe_provider_classifies_404_as_not_published() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/pm20260207.dat")
        .with_status(404)
        .create_async()
        .await;

    let provider = ShfeWarrantProvider::with_base_url(&HttpConfig::default(), server.url());
    let err = provider.fetch(&ctx(2026, 2, 7)).await.unwrap_err();
    assert!(matches!(err, FetchError::NotPublished(_)));
    assert!(err.is_hard());
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn cftc_api_provider_maps_socrata_items() {
    let mut server = mockito::Server::new_async().await;
    let body = r#"[
        {
            "report_date_as_yyyy_mm_dd": "2026-02-03T00:00:00.000",
            "noncomm_positions_long_all": "300000",
            "noncomm_positions_short_all": "80000",
            "comm_positions_long_all": "150000",
            "comm_positions_short_all": "350000"
        }
    ]"#;
    server
        .mock("GET", "/cot.json")
        .match_query(mockito::Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(body)
        .expect(2)
        .create_async()
        .await;

    let provider = CftcApiProvider::with_api_url(
        &HttpConfig::default(),
        0,
        format!("{}/cot.json", server.url()),
    );
    let records = provider.fetch(&ctx(2026, 2, 6)).await.unwrap();

    // 금/은 각각 한 건
    assert_eq!(records.len(), 2);
    let gold = records.iter().find(|r| r.metal == Metal::Gold).unwrap();
    assert_eq!(
        gold.report_date,
        NaiveDate::from_ymd_opt(2026, 2, 3).unwrap()
    );
    assert_eq!(gold.non_commercial_long, Some(300_000.0));
    assert_eq!(gold.net_position, Some(220_000.0));
    assert_eq!(gold.source, "cftc_api");
}

#[tokio::test]
async fn yahoo_chart_provider_maps_points() {
    let mut server = mockito::Server::new_async().await;
    // 2026-02-05, 2026-02-06 (UTC 자정 타임스탬프)
    let body = r#"{
        "chart": {
            "result": [{
                "timestamp": [1770249600, 1770336000],
                "indicators": {
                    "quote": [{
                        "close": [2700.5, null],
                        "volume": [120000, 110000]
                    }]
                }
            }]
        }
    }"#;
    server
        .mock("GET", mockito::Matcher::Regex("^/GC=F".to_string()))
        .match_query(mockito::Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(body)
        .create_async()
        .await;

    let chart = YahooChartClient::with_base_url(&HttpConfig::default(), server.url());
    let provider = CmeFuturesProvider::new(chart, Metal::Gold);
    let records = provider.fetch(&ctx(2026, 2, 6)).await.unwrap();

    // 종가 null 행은 제외
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].close_price, Some(2700.5));
    assert_eq!(records[0].contract, "continuous");
    assert_eq!(records[0].exchange, "CME");
    assert_eq!(records[0].open_interest, None);
}

#[tokio::test]
async fn sina_futures_provider_parses_jsonp_kline() {
    let mut server = mockito::Server::new_async().await;
    let body = r#"var _au0=([
        {"d":"2026-02-04","o":"778","h":"783","l":"777","c":"780.5","v":"100000","p":"205000"},
        {"d":"2026-02-05","o":"780","h":"786","l":"779","c":"783.2","v":"120000","p":"210000"}
    ]);"#;
    server
        .mock(
            "GET",
            mockito::Matcher::Regex("InnerFuturesNewService".to_string()),
        )
        .match_query(mockito::Matcher::Any)
        .with_status(200)
        .with_body(body)
        .create_async()
        .await;

    let provider =
        SinaFuturesProvider::with_base_url(&HttpConfig::default(), Metal::Gold, server.url());
    let records = provider.fetch(&ctx(2026, 2, 6)).await.unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(records[1].close_price, Some(783.2));
    assert_eq!(records[1].open_interest, Some(210_000.0));
    assert_eq!(records[1].volume, Some(120_000.0));
    assert_eq!(records[1].contract, "au0");
    assert_eq!(records[1].currency, "CNY");
}
