//! CFTC COT 제공자.
//!
//! - Socrata Open Data API (Legacy Futures): 최근 보고서 4건
//! - 연도별 공식 ZIP 아카이브: 히스토리 백필
//!
//! API 문서: <https://publicreporting.cftc.gov/resource/6dca-aqww.json>
//! 황금 계약 코드 088691, 백은 084691.

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use serde_json::Value;
use tracing::{info, warn};

use metals_core::{
    CftcPositionRecord, DataProvider, FetchContext, FetchError, FetchResult, HttpConfig, Metal,
};

use crate::error::{DataError, Result};
use crate::extract::archive::{parse_cot_archive, GOLD_CONTRACT_CODE, SILVER_CONTRACT_CODE};
use crate::extract::feed;
use crate::provider::{build_client, status_error, transport_error};

const DEFAULT_API_URL: &str = "https://publicreporting.cftc.gov/resource/6dca-aqww.json";
const DEFAULT_ARCHIVE_BASE_URL: &str = "https://www.cftc.gov/files/dea/history";

/// Socrata COT API 제공자.
///
/// `year_offset`만큼 과거 연도를 조회합니다. 당해 연도 제공자 뒤에
/// offset 1 제공자를 두면 연초의 "작년 데이터만 존재" 구간을 자연스럽게
/// fallback으로 처리합니다.
pub struct CftcApiProvider {
    client: reqwest::Client,
    api_url: String,
    year_offset: i32,
}

impl CftcApiProvider {
    pub fn new(config: &HttpConfig, year_offset: i32) -> Self {
        Self::with_api_url(config, year_offset, DEFAULT_API_URL.to_string())
    }

    /// API URL을 지정해 생성 (테스트용).
    pub fn with_api_url(config: &HttpConfig, year_offset: i32, api_url: String) -> Self {
        Self {
            client: build_client(config),
            api_url,
            year_offset,
        }
    }

    async fn fetch_metal(
        &self,
        metal: Metal,
        code: &str,
        year: i32,
    ) -> FetchResult<Vec<CftcPositionRecord>> {
        let resp = self
            .client
            .get(&self.api_url)
            .query(&[
                (
                    "$where",
                    format!(
                        "cftc_contract_market_code='{}' AND report_date_as_yyyy_mm_dd >= '{}-01-01'",
                        code, year
                    ),
                ),
                ("$order", "report_date_as_yyyy_mm_dd DESC".to_string()),
                ("$limit", "4".to_string()),
            ])
            .send()
            .await
            .map_err(transport_error)?;

        if !resp.status().is_success() {
            return Err(status_error(resp.status(), "CFTC API"));
        }

        let items: Vec<Value> = resp.json().await.map_err(transport_error)?;

        let mut records = Vec::new();
        for item in items {
            let item = match item.as_object() {
                Some(obj) => obj,
                None => continue,
            };

            let report_date = item
                .get("report_date_as_yyyy_mm_dd")
                .and_then(Value::as_str)
                .map(|s| &s[..s.len().min(10)])
                .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok());
            let report_date = match report_date {
                Some(d) => d,
                None => continue,
            };

            let ncl = feed::lookup_f64(item, &["noncomm_positions_long_all"]);
            let ncs = feed::lookup_f64(item, &["noncomm_positions_short_all"]);

            records.push(CftcPositionRecord {
                report_date,
                market: "COMEX".to_string(),
                metal,
                net_position: feed::net_position(ncl, ncs),
                non_commercial_long: ncl,
                non_commercial_short: ncs,
                commercial_long: feed::lookup_f64(item, &["comm_positions_long_all"]),
                commercial_short: feed::lookup_f64(item, &["comm_positions_short_all"]),
                source: self.source_id().to_string(),
            });
        }

        Ok(records)
    }
}

#[async_trait]
impl DataProvider for CftcApiProvider {
    type Record = CftcPositionRecord;

    fn source_id(&self) -> &'static str {
        "cftc_api"
    }

    async fn fetch(&self, ctx: &FetchContext) -> FetchResult<Vec<CftcPositionRecord>> {
        let year = ctx.target_date.year() - self.year_offset;

        let mut records = Vec::new();
        let mut last_err: Option<FetchError> = None;

        for (metal, code) in [
            (Metal::Gold, GOLD_CONTRACT_CODE),
            (Metal::Silver, SILVER_CONTRACT_CODE),
        ] {
            match self.fetch_metal(metal, code, year).await {
                Ok(mut r) => records.append(&mut r),
                Err(e) => {
                    warn!(metal = %metal, year = year, error = %e, "CFTC API 조회 실패");
                    last_err = Some(e);
                }
            }
        }

        // 두 금속 모두 실패했을 때만 실패로 분류
        if records.is_empty() {
            if let Some(err) = last_err {
                return Err(err);
            }
        }

        info!(year = year, count = records.len(), "CFTC API 레코드 추출 완료");
        Ok(records)
    }
}

/// 연도별 공식 ZIP 아카이브 클라이언트 (히스토리 백필 전용).
pub struct CftcArchiveClient {
    client: reqwest::Client,
    base_url: String,
}

impl CftcArchiveClient {
    pub fn new(config: &HttpConfig) -> Self {
        Self::with_base_url(config, DEFAULT_ARCHIVE_BASE_URL.to_string())
    }

    /// base URL을 지정해 생성 (테스트용).
    pub fn with_base_url(config: &HttpConfig, base_url: String) -> Self {
        Self {
            client: build_client(config),
            base_url,
        }
    }

    /// 한 해치 ZIP을 받아 금/은 주간 레코드로 파싱합니다.
    ///
    /// 아직 발행되지 않은 연도(404)는 빈 결과입니다.
    pub async fn fetch_year(&self, year: i32) -> Result<Vec<CftcPositionRecord>> {
        let url = format!("{}/deacot{}.zip", self.base_url, year);
        info!(url = %url, year = year, "CFTC 연간 ZIP 다운로드");

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| DataError::Fetch(e.to_string()))?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            warn!(year = year, "CFTC 연간 ZIP 미존재");
            return Ok(Vec::new());
        }
        if !resp.status().is_success() {
            return Err(DataError::Fetch(format!(
                "CFTC ZIP 다운로드 실패: HTTP {}",
                resp.status()
            )));
        }

        let bytes = resp.bytes().await.map_err(|e| DataError::Fetch(e.to_string()))?;
        let records = parse_cot_archive(&bytes, "cftc_zip")?;

        info!(year = year, count = records.len(), "CFTC 연간 레코드 파싱 완료");
        Ok(records)
    }
}
