//! Yahoo Finance 차트 API 제공자.
//!
//! v8 chart JSON으로 CME 연속 선물(GC=F/SI=F), ETF 일봉(GLD/SLV),
//! 환율/현물 fallback(USDCNH=X, XAUUSD=X)을 수집합니다. 일부 회선에서
//! IP 차단이 있어 어느 체인에서도 최후순위 또는 스킵 가능으로만
//! 배치됩니다.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use serde_json::Value;
use tracing::{debug, info};

use metals_core::{
    DataProvider, EtfHoldingRecord, FetchContext, FetchError, FetchResult, FuturePriceRecord,
    FxRateRecord, HttpConfig, Metal, SpotPriceRecord,
};

use crate::provider::{build_client, status_error, transport_error};

const DEFAULT_CHART_BASE_URL: &str = "https://query2.finance.yahoo.com/v8/finance/chart";

/// 차트 한 점: 날짜 + 종가/거래량.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ChartPoint {
    pub date: NaiveDate,
    pub close: Option<f64>,
    pub volume: Option<f64>,
}

/// v8 chart 호출 공통부.
#[derive(Clone)]
pub struct YahooChartClient {
    client: reqwest::Client,
    base_url: String,
}

impl YahooChartClient {
    pub fn new(config: &HttpConfig) -> Self {
        Self::with_base_url(config, DEFAULT_CHART_BASE_URL.to_string())
    }

    /// base URL을 지정해 생성 (테스트용).
    pub fn with_base_url(config: &HttpConfig, base_url: String) -> Self {
        Self {
            client: build_client(config),
            base_url,
        }
    }

    /// 최근 `days`일 일봉 조회.
    pub(crate) async fn daily(&self, symbol: &str, days: u32) -> FetchResult<Vec<ChartPoint>> {
        let url = format!(
            "{}/{}?range={}d&interval=1d",
            self.base_url, symbol, days
        );
        debug!(url = %url, "Yahoo 차트 요청");

        let resp = self.client.get(&url).send().await.map_err(transport_error)?;
        if !resp.status().is_success() {
            return Err(status_error(resp.status(), "Yahoo 차트"));
        }
        let value: Value = resp.json().await.map_err(transport_error)?;

        let result = value
            .pointer("/chart/result/0")
            .ok_or_else(|| FetchError::Structural("chart.result 없음".to_string()))?;

        let timestamps = result
            .pointer("/timestamp")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let quote = result
            .pointer("/indicators/quote/0")
            .cloned()
            .unwrap_or(Value::Null);
        let closes = quote
            .pointer("/close")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let volumes = quote
            .pointer("/volume")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let mut points = Vec::new();
        for (idx, ts) in timestamps.iter().enumerate() {
            let ts = match ts.as_i64() {
                Some(t) => t,
                None => continue,
            };
            let date = match DateTime::from_timestamp(ts, 0) {
                Some(dt) => dt.date_naive(),
                None => continue,
            };
            points.push(ChartPoint {
                date,
                close: closes.get(idx).and_then(Value::as_f64),
                volume: volumes.get(idx).and_then(Value::as_f64),
            });
        }

        Ok(points)
    }
}

/// CME 연속 선물 제공자 (GC=F / SI=F).
pub struct CmeFuturesProvider {
    chart: YahooChartClient,
    metal: Metal,
}

impl CmeFuturesProvider {
    pub fn new(chart: YahooChartClient, metal: Metal) -> Self {
        Self { chart, metal }
    }

    fn symbol(&self) -> &'static str {
        match self.metal {
            Metal::Gold => "GC=F",
            Metal::Silver => "SI=F",
        }
    }
}

#[async_trait]
impl DataProvider for CmeFuturesProvider {
    type Record = FuturePriceRecord;

    fn source_id(&self) -> &'static str {
        "yahoo_chart"
    }

    async fn fetch(&self, ctx: &FetchContext) -> FetchResult<Vec<FuturePriceRecord>> {
        let points = self.chart.daily(self.symbol(), ctx.history_days).await?;

        let records: Vec<FuturePriceRecord> = points
            .into_iter()
            .filter(|p| p.close.is_some())
            .map(|p| FuturePriceRecord {
                date: p.date,
                exchange: "CME".to_string(),
                metal: self.metal,
                contract: "continuous".to_string(),
                close_price: p.close,
                // 차트 API는 미결제약정을 제공하지 않음
                open_interest: None,
                volume: p.volume,
                currency: "USD".to_string(),
                source: self.source_id().to_string(),
            })
            .collect();

        info!(metal = %self.metal, count = records.len(), "CME 선물 레코드 추출 완료");
        Ok(records)
    }
}

/// ETF 보유량 근사 제공자 (GLD / SLV).
///
/// 실제 톤 단위 보유량 아카이브는 무료 API가 없어, 거래량을 자금 흐름의
/// 근사 지표로 사용합니다. GLD는 주당 0.1oz, SLV는 주당 1.0oz.
pub struct EtfHoldingsProvider {
    chart: YahooChartClient,
    symbol: String,
    metal: Metal,
    oz_per_share: f64,
}

impl EtfHoldingsProvider {
    /// 가져올 이력 일수는 컨텍스트의 `history_days`를 따릅니다. 호출
    /// 측이 콜드스타트(DB에 이력 부족) 여부에 따라 5 또는 30으로
    /// 정합니다.
    pub fn new(chart: YahooChartClient, symbol: &str, metal: Metal) -> Self {
        let oz_per_share = if symbol == "GLD" { 0.1 } else { 1.0 };
        Self {
            chart,
            symbol: symbol.to_string(),
            metal,
            oz_per_share,
        }
    }
}

#[async_trait]
impl DataProvider for EtfHoldingsProvider {
    type Record = EtfHoldingRecord;

    fn source_id(&self) -> &'static str {
        "yahoo_chart"
    }

    async fn fetch(&self, ctx: &FetchContext) -> FetchResult<Vec<EtfHoldingRecord>> {
        let points = self.chart.daily(&self.symbol, ctx.history_days).await?;

        let mut records = Vec::new();
        let mut prev_shares: Option<f64> = None;
        for p in points {
            let shares = match p.volume {
                Some(v) => v,
                None => continue,
            };
            let change = prev_shares.map(|prev| shares - prev).unwrap_or(0.0);
            prev_shares = Some(shares);

            records.push(EtfHoldingRecord {
                date: p.date,
                symbol: self.symbol.clone(),
                metal: self.metal,
                shares: Some(shares),
                ounces: Some(shares * self.oz_per_share),
                change: Some(change),
                source: self.source_id().to_string(),
            });
        }

        info!(symbol = %self.symbol, count = records.len(), "ETF 레코드 추출 완료");
        Ok(records)
    }
}

/// 런던 현물 fallback 제공자 (XAUUSD=X / XAGUSD=X).
pub struct YahooSpotProvider {
    chart: YahooChartClient,
}

impl YahooSpotProvider {
    pub fn new(chart: YahooChartClient) -> Self {
        Self { chart }
    }
}

#[async_trait]
impl DataProvider for YahooSpotProvider {
    type Record = SpotPriceRecord;

    fn source_id(&self) -> &'static str {
        "yahoo_chart"
    }

    async fn fetch(&self, ctx: &FetchContext) -> FetchResult<Vec<SpotPriceRecord>> {
        let mut records = Vec::new();
        for (metal, symbol) in [(Metal::Gold, "XAUUSD=X"), (Metal::Silver, "XAGUSD=X")] {
            let points = match self.chart.daily(symbol, ctx.history_days).await {
                Ok(p) => p,
                Err(e) => {
                    debug!(symbol = symbol, error = %e, "Yahoo 현물 조회 실패");
                    continue;
                }
            };
            for p in points {
                if let Some(close) = p.close {
                    records.push(SpotPriceRecord {
                        date: p.date,
                        market: "LBMA".to_string(),
                        metal,
                        price: close,
                        currency: "USD".to_string(),
                        source: self.source_id().to_string(),
                    });
                }
            }
        }
        Ok(records)
    }
}

/// 환율 fallback 제공자 (USDCNH=X).
pub struct YahooFxProvider {
    chart: YahooChartClient,
}

impl YahooFxProvider {
    pub fn new(chart: YahooChartClient) -> Self {
        Self { chart }
    }
}

#[async_trait]
impl DataProvider for YahooFxProvider {
    type Record = FxRateRecord;

    fn source_id(&self) -> &'static str {
        "yahoo_chart"
    }

    async fn fetch(&self, ctx: &FetchContext) -> FetchResult<Vec<FxRateRecord>> {
        let points = self.chart.daily("USDCNH=X", ctx.history_days).await?;

        let records: Vec<FxRateRecord> = points
            .into_iter()
            .filter_map(|p| {
                p.close.map(|rate| FxRateRecord {
                    date: p.date,
                    pair: "USDCNH".to_string(),
                    rate: (rate * 10_000.0).round() / 10_000.0,
                    source: self.source_id().to_string(),
                })
            })
            .collect();

        info!(count = records.len(), "USDCNH 환율 레코드 추출 완료");
        Ok(records)
    }
}
