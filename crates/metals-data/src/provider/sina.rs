//! Sina 시세 제공자.
//!
//! 국내(중국) 직통 회선에서 차단 없이 접근 가능한 Sina 시세 인터페이스를
//! 사용합니다:
//! - `hq.sinajs.cn` 실시간 시세 (GBK 인코딩 텍스트): 런던 현물(XAU/XAG),
//!   역외 위안 환율(USDCNH)
//! - 선물 일봉 JSONP: SHFE 주력 연속(au0/ag0)

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;
use tracing::{debug, info};

use metals_core::{
    DataProvider, FetchContext, FetchError, FetchResult, FuturePriceRecord, FxRateRecord,
    HttpConfig, Metal, SpotPriceRecord,
};

use crate::extract::feed;
use crate::provider::{build_client, status_error, transport_error};

const DEFAULT_HQ_SPOT_URL: &str = "https://hq.sinajs.cn/list=hf_XAU,hf_XAG";
const DEFAULT_HQ_FX_URL: &str = "https://hq.sinajs.cn/list=fx_susdcnh";
const DEFAULT_KLINE_BASE_URL: &str = "https://stock2.finance.sina.com.cn/futures/api/jsonp.php";
const SINA_REFERER: &str = "https://finance.sina.com.cn/";

/// hq 인터페이스 응답을 GBK로 디코딩.
async fn fetch_hq_text(client: &reqwest::Client, url: &str) -> FetchResult<String> {
    let resp = client
        .get(url)
        .header(reqwest::header::REFERER, SINA_REFERER)
        .send()
        .await
        .map_err(transport_error)?;
    if !resp.status().is_success() {
        return Err(status_error(resp.status(), "Sina hq"));
    }
    let bytes = resp.bytes().await.map_err(transport_error)?;
    let (text, _, _) = encoding_rs::GBK.decode(&bytes);
    Ok(text.into_owned())
}

/// `var hq_str_xxx="a,b,c,...";` 한 줄에서 쉼표 구분 필드 추출.
fn hq_fields(line: &str) -> Option<Vec<String>> {
    let payload = line.split('"').nth(1)?;
    Some(payload.split(',').map(|s| s.trim().to_string()).collect())
}

/// 런던 현물 (XAU/XAG) 제공자.
pub struct SinaSpotProvider {
    client: reqwest::Client,
    url: String,
}

impl SinaSpotProvider {
    pub fn new(config: &HttpConfig) -> Self {
        Self::with_url(config, DEFAULT_HQ_SPOT_URL.to_string())
    }

    /// URL을 지정해 생성 (테스트용).
    pub fn with_url(config: &HttpConfig, url: String) -> Self {
        Self {
            client: build_client(config),
            url,
        }
    }
}

#[async_trait]
impl DataProvider for SinaSpotProvider {
    type Record = SpotPriceRecord;

    fn source_id(&self) -> &'static str {
        "sina_hq"
    }

    async fn fetch(&self, ctx: &FetchContext) -> FetchResult<Vec<SpotPriceRecord>> {
        let text = fetch_hq_text(&self.client, &self.url).await?;

        let mut records = Vec::new();
        for line in text.lines() {
            if !line.contains("hq_str_hf_") {
                continue;
            }
            let metal = if line.contains("XAU") {
                Metal::Gold
            } else if line.contains("XAG") {
                Metal::Silver
            } else {
                continue;
            };

            let fields = match hq_fields(line) {
                Some(f) if f.len() >= 13 => f,
                _ => continue,
            };
            let price: f64 = match fields[0].parse() {
                Ok(p) => p,
                Err(_) => continue,
            };
            // 13번째 필드가 시세 일자
            let date = NaiveDate::parse_from_str(&fields[12], "%Y-%m-%d")
                .unwrap_or(ctx.run_date);

            records.push(SpotPriceRecord {
                date,
                market: "LBMA".to_string(),
                metal,
                price,
                currency: "USD".to_string(),
                source: self.source_id().to_string(),
            });
        }

        info!(count = records.len(), "Sina 런던 현물 추출 완료");
        Ok(records)
    }
}

/// 역외 위안 환율 (USDCNH) 제공자.
pub struct SinaFxProvider {
    client: reqwest::Client,
    url: String,
}

impl SinaFxProvider {
    pub fn new(config: &HttpConfig) -> Self {
        Self::with_url(config, DEFAULT_HQ_FX_URL.to_string())
    }

    /// URL을 지정해 생성 (테스트용).
    pub fn with_url(config: &HttpConfig, url: String) -> Self {
        Self {
            client: build_client(config),
            url,
        }
    }
}

#[async_trait]
impl DataProvider for SinaFxProvider {
    type Record = FxRateRecord;

    fn source_id(&self) -> &'static str {
        "sina_fx"
    }

    async fn fetch(&self, ctx: &FetchContext) -> FetchResult<Vec<FxRateRecord>> {
        let text = fetch_hq_text(&self.client, &self.url).await?;

        for line in text.lines() {
            if !line.contains("hq_str_fx_") {
                continue;
            }
            let fields = match hq_fields(line) {
                Some(f) if f.len() >= 3 => f,
                _ => continue,
            };
            // [시각, 매수호가, 매도호가, ...] 중 매도호가(ask)를 환율로
            let rate: f64 = match fields[2].parse() {
                Ok(r) => r,
                Err(_) => continue,
            };

            return Ok(vec![FxRateRecord {
                date: ctx.run_date,
                pair: "USDCNH".to_string(),
                rate: (rate * 10_000.0).round() / 10_000.0,
                source: self.source_id().to_string(),
            }]);
        }

        Ok(Vec::new())
    }
}

/// SHFE 주력 연속 선물 일봉 제공자.
///
/// 주력 연속 심볼: au0 = 황금, ag0 = 백은.
pub struct SinaFuturesProvider {
    client: reqwest::Client,
    base_url: String,
    metal: Metal,
}

impl SinaFuturesProvider {
    pub fn new(config: &HttpConfig, metal: Metal) -> Self {
        Self::with_base_url(config, metal, DEFAULT_KLINE_BASE_URL.to_string())
    }

    /// base URL을 지정해 생성 (테스트용).
    pub fn with_base_url(config: &HttpConfig, metal: Metal, base_url: String) -> Self {
        Self {
            client: build_client(config),
            base_url,
            metal,
        }
    }

    fn symbol(&self) -> &'static str {
        match self.metal {
            Metal::Gold => "au0",
            Metal::Silver => "ag0",
        }
    }
}

#[async_trait]
impl DataProvider for SinaFuturesProvider {
    type Record = FuturePriceRecord;

    fn source_id(&self) -> &'static str {
        "sina_kline"
    }

    async fn fetch(&self, ctx: &FetchContext) -> FetchResult<Vec<FuturePriceRecord>> {
        let symbol = self.symbol();
        let url = format!(
            "{}/var%20_{}=/InnerFuturesNewService.getDailyKLine?symbol={}",
            self.base_url, symbol, symbol
        );
        debug!(url = %url, "Sina 선물 일봉 요청");

        let resp = self.client.get(&url).send().await.map_err(transport_error)?;
        if !resp.status().is_success() {
            return Err(status_error(resp.status(), "Sina 선물 일봉"));
        }
        let body = resp.text().await.map_err(transport_error)?;

        let items = parse_jsonp_array(&body)
            .ok_or_else(|| FetchError::Structural("Sina JSONP 배열을 찾지 못함".to_string()))?;

        // 최근 history_days개 일봉만 유지
        let start = items.len().saturating_sub(ctx.history_days as usize);
        let mut records = Vec::new();
        for item in &items[start..] {
            let item = match item.as_object() {
                Some(obj) => obj,
                None => continue,
            };
            let date = match feed::lookup_str(item, &["d"])
                .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
            {
                Some(d) => d,
                None => continue,
            };

            records.push(FuturePriceRecord {
                date,
                exchange: "SHFE".to_string(),
                metal: self.metal,
                contract: symbol.to_string(),
                close_price: feed::lookup_f64(item, &["c"]),
                // p = 持仓量 (미결제약정)
                open_interest: feed::lookup_f64(item, &["p"]),
                volume: feed::lookup_f64(item, &["v"]),
                currency: "CNY".to_string(),
                source: self.source_id().to_string(),
            });
        }

        info!(metal = %self.metal, count = records.len(), "SHFE 선물 일봉 추출 완료");
        Ok(records)
    }
}

/// JSONP 응답 본문에서 JSON 배열 부분만 파싱.
fn parse_jsonp_array(body: &str) -> Option<Vec<Value>> {
    let start = body.find('[')?;
    let end = body.rfind(']')?;
    if end < start {
        return None;
    }
    serde_json::from_str::<Value>(&body[start..=end])
        .ok()?
        .as_array()
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hq_fields() {
        let line = r#"var hq_str_hf_XAU="2700.50,5183.880,2700.1,2700.9,2710.0,2690.0,21:30:00,2695.0,2696.0,0,0,0,2026-02-06";"#;
        let fields = hq_fields(line).unwrap();
        assert_eq!(fields[0], "2700.50");
        assert_eq!(fields[12], "2026-02-06");
    }

    #[test]
    fn test_parse_jsonp_array() {
        let body = r#"var _au0=([{"d":"2026-02-05","o":"780","h":"785","l":"778","c":"782","v":"120000","p":"210000"}]);"#;
        let items = parse_jsonp_array(body).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["d"], "2026-02-05");
    }

    #[test]
    fn test_parse_jsonp_array_without_brackets() {
        assert!(parse_jsonp_array("var _au0=null;").is_none());
    }
}
