//! SHFE 창고 수증(warrant) 제공자.
//!
//! 상해선물거래소 일일 수증 JSON(`pm{date}.dat`)을 파싱합니다. 휴장일에는
//! 확정 404가 돌아오므로, 최근 날짜부터의 lookback 회귀는 오케스트레이터
//! 쪽 설정으로 처리합니다.

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

use metals_core::{
    DataProvider, FetchContext, FetchError, FetchResult, HttpConfig, InventoryCategory,
    InventoryRecord, Metal,
};

use crate::extract::feed;
use crate::provider::{build_client, status_error, transport_error};

const DEFAULT_BASE_URL: &str = "https://www.shfe.com.cn/data/tradedata/future/dailydata";

/// SHFE 수증 JSON 제공자.
pub struct ShfeWarrantProvider {
    client: reqwest::Client,
    base_url: String,
}

impl ShfeWarrantProvider {
    /// 기본 SHFE 경로로 생성.
    pub fn new(config: &HttpConfig) -> Self {
        Self::with_base_url(config, DEFAULT_BASE_URL.to_string())
    }

    /// base URL을 지정해 생성 (테스트용).
    pub fn with_base_url(config: &HttpConfig, base_url: String) -> Self {
        Self {
            client: build_client(config),
            base_url,
        }
    }
}

#[async_trait]
impl DataProvider for ShfeWarrantProvider {
    type Record = InventoryRecord;

    fn source_id(&self) -> &'static str {
        "shfe_json"
    }

    async fn fetch(&self, ctx: &FetchContext) -> FetchResult<Vec<InventoryRecord>> {
        let url = format!(
            "{}/pm{}.dat",
            self.base_url,
            ctx.target_date.format("%Y%m%d")
        );
        debug!(url = %url, "SHFE 수증 데이터 요청");

        let resp = self.client.get(&url).send().await.map_err(transport_error)?;
        if !resp.status().is_success() {
            // 404 = 미발행일 (주말/휴일). lookback 회귀의 트리거.
            return Err(status_error(resp.status(), "SHFE 수증"));
        }

        let text = resp.text().await.map_err(transport_error)?;
        let value: Value = serde_json::from_str(&text)
            .map_err(|e| FetchError::Decode(format!("SHFE JSON 파싱 실패: {}", e)))?;

        let items = value
            .get("o_cursor")
            .and_then(Value::as_array)
            .ok_or_else(|| FetchError::Structural("SHFE 응답에 o_cursor 없음".to_string()))?;

        let mut records = Vec::new();
        for item in items {
            let item = match item.as_object() {
                Some(obj) => obj,
                None => continue,
            };

            let var_name = feed::lookup_str(item, &["VARNAME"])
                .unwrap_or("")
                .trim()
                .to_uppercase();
            let metal = if var_name.contains("AU") {
                Metal::Gold
            } else if var_name.contains("AG") {
                Metal::Silver
            } else {
                continue;
            };

            // 창고명: REGNAME 우선, 비어 있으면 축약명
            let mut warehouse = feed::lookup_str(item, &["REGNAME"])
                .unwrap_or("")
                .trim()
                .to_string();
            if warehouse.is_empty() || warehouse == "nan" {
                warehouse = feed::lookup_str(item, &["WHABBRNAME"])
                    .unwrap_or("")
                    .trim()
                    .to_string();
            }

            let weight = feed::lookup_f64(item, &["WRTWGHTS"]).unwrap_or(0.0);
            let unit = feed::lookup_str(item, &["WGHTUNIT"])
                .unwrap_or("千克")
                .trim()
                .to_string();

            if weight > 0.0 {
                records.push(InventoryRecord {
                    date: ctx.target_date,
                    exchange: "SHFE".to_string(),
                    metal,
                    category: InventoryCategory::Warehouse,
                    warehouse,
                    inventory: weight,
                    unit,
                    source: self.source_id().to_string(),
                });
            }
        }

        info!(
            count = records.len(),
            date = %ctx.target_date,
            "SHFE 수증 레코드 추출 완료"
        );

        Ok(records)
    }
}
