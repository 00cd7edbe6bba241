//! SGE(상해황금거래소) 제공자.
//!
//! - 일일 행정 공고 목록 JSON → 인도(delivery) PDF 다운로드 → 휴리스틱
//!   테이블 파싱
//! - 일일 시세 페이지 HTML 테이블의 현물가

use async_trait::async_trait;
use chrono::NaiveDate;
use scraper::{Html, Selector};
use serde_json::Value;
use tracing::{debug, info, warn};

use metals_core::{
    DataProvider, FetchContext, FetchError, FetchResult, HttpConfig, InventoryCategory,
    InventoryRecord, Metal, SpotPriceRecord,
};

use crate::decode::pdf_text;
use crate::extract::pdf::{DeliveryTableParser, NumericPick};
use crate::provider::{build_client, status_error, transport_error};

const DEFAULT_ARTICLE_API_URL: &str =
    "https://www.sge.com.cn/public/front/findArticleExtList?pageNo=1&pageSize=15&menuId=1738";
const DEFAULT_SITE_BASE_URL: &str = "https://www.sge.com.cn";
const DEFAULT_QUOTATION_URL: &str = "https://www.sge.com.cn/sjzx/quotation_daily_new";

/// SGE 인도 PDF 제공자.
///
/// Vue 동적 렌더링을 우회하기 위해 문서 목록 JSON API에서 직접 PDF
/// 링크를 얻습니다.
pub struct SgeDeliveryProvider {
    client: reqwest::Client,
    article_api_url: String,
    site_base_url: String,
    parser: DeliveryTableParser,
}

impl SgeDeliveryProvider {
    /// 기본 SGE 주소로 생성.
    pub fn new(config: &HttpConfig, pick: NumericPick) -> Self {
        Self::with_urls(
            config,
            pick,
            DEFAULT_ARTICLE_API_URL.to_string(),
            DEFAULT_SITE_BASE_URL.to_string(),
        )
    }

    /// URL들을 지정해 생성 (테스트용).
    pub fn with_urls(
        config: &HttpConfig,
        pick: NumericPick,
        article_api_url: String,
        site_base_url: String,
    ) -> Self {
        Self {
            client: build_client(config),
            article_api_url,
            site_base_url,
            parser: DeliveryTableParser::with_pick(pick),
        }
    }
}

#[async_trait]
impl DataProvider for SgeDeliveryProvider {
    type Record = InventoryRecord;

    fn source_id(&self) -> &'static str {
        "sge_pdf"
    }

    async fn fetch(&self, ctx: &FetchContext) -> FetchResult<Vec<InventoryRecord>> {
        // 1. 문서 목록 조회
        let resp = self
            .client
            .get(&self.article_api_url)
            .send()
            .await
            .map_err(transport_error)?;
        if !resp.status().is_success() {
            return Err(status_error(resp.status(), "SGE 문서 목록 API"));
        }
        let body = resp.text().await.map_err(transport_error)?;
        let value: Value = serde_json::from_str(&body)
            .map_err(|e| FetchError::Decode(format!("SGE JSON 파싱 실패: {}", e)))?;

        let articles = value
            .get("list")
            .and_then(Value::as_array)
            .ok_or_else(|| FetchError::Structural("SGE 응답에 list 없음".to_string()))?;

        // 2. 인도/시세 관련 최신 문서 탐색
        let target = articles.iter().find(|item| {
            item.get("title")
                .and_then(Value::as_str)
                .map(|t| t.contains("交割") || t.contains("交收") || t.contains("行情"))
                .unwrap_or(false)
        });
        let target = match target {
            Some(t) => t,
            None => {
                debug!("SGE 목록에 인도 관련 문서 없음");
                return Ok(Vec::new());
            }
        };

        let file_url = target
            .get("fileUrl")
            .and_then(Value::as_str)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| {
                FetchError::Structural("SGE 문서에 PDF 링크(fileUrl) 없음".to_string())
            })?;

        let publish_date = target
            .get("publishDate")
            .and_then(Value::as_str)
            .and_then(|s| s.split_whitespace().next())
            .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
            .unwrap_or(ctx.target_date);

        // 3. PDF 다운로드 & 파싱
        let pdf_url = format!("{}{}", self.site_base_url, file_url);
        debug!(url = %pdf_url, date = %publish_date, "SGE 인도 PDF 다운로드");

        let pdf_resp = self
            .client
            .get(&pdf_url)
            .send()
            .await
            .map_err(transport_error)?;
        if !pdf_resp.status().is_success() {
            return Err(status_error(pdf_resp.status(), "SGE 인도 PDF"));
        }
        let bytes = pdf_resp.bytes().await.map_err(transport_error)?;

        let tables = pdf_text::decode_tables(&bytes)
            .map_err(|e| FetchError::Decode(e.to_string()))?;
        let volumes = self.parser.parse(&tables);

        let mut records = Vec::new();
        for (metal, kg) in [
            (Metal::Gold, volumes.gold_kg),
            (Metal::Silver, volumes.silver_kg),
        ] {
            if kg > 0.0 {
                records.push(InventoryRecord {
                    date: publish_date,
                    exchange: "SGE".to_string(),
                    metal,
                    category: InventoryCategory::DeliveryVolume,
                    warehouse: "SGE Main".to_string(),
                    inventory: ((kg / 1000.0) * 10_000.0).round() / 10_000.0,
                    unit: "ton".to_string(),
                    source: self.source_id().to_string(),
                });
            }
        }

        if records.is_empty() {
            warn!("SGE PDF에서 인도량을 추출하지 못함 (레이아웃 변동 가능)");
        } else {
            info!(count = records.len(), date = %publish_date, "SGE 인도 레코드 추출 완료");
        }
        Ok(records)
    }
}

/// SGE 일일 시세 HTML 현물가 제공자.
pub struct SgeSpotProvider {
    client: reqwest::Client,
    url: String,
    metal: Metal,
}

impl SgeSpotProvider {
    pub fn new(config: &HttpConfig, metal: Metal) -> Self {
        Self::with_url(config, metal, DEFAULT_QUOTATION_URL.to_string())
    }

    /// URL을 지정해 생성 (테스트용).
    pub fn with_url(config: &HttpConfig, metal: Metal, url: String) -> Self {
        Self {
            client: build_client(config),
            url,
            metal,
        }
    }

    /// 금속별 대상 품종명.
    fn contract_name(&self) -> &'static str {
        match self.metal {
            Metal::Gold => "Au99.99",
            Metal::Silver => "Ag(T+D)",
        }
    }
}

#[async_trait]
impl DataProvider for SgeSpotProvider {
    type Record = SpotPriceRecord;

    fn source_id(&self) -> &'static str {
        "sge_web"
    }

    async fn fetch(&self, ctx: &FetchContext) -> FetchResult<Vec<SpotPriceRecord>> {
        let resp = self.client.get(&self.url).send().await.map_err(transport_error)?;
        if !resp.status().is_success() {
            return Err(status_error(resp.status(), "SGE 시세 페이지"));
        }
        let html = resp.text().await.map_err(transport_error)?;

        let records = parse_quotation_table(
            &html,
            self.contract_name(),
            self.metal,
            ctx.run_date,
            self.source_id(),
        );
        info!(metal = %self.metal, count = records.len(), "SGE 시세 추출 완료");
        Ok(records)
    }
}

/// 시세 테이블 파싱.
///
/// 통상 구조: [날짜, 품종, 시가, 고가, 저가, 종가, ...]. 당일 최신
/// 한 건만 취합니다.
fn parse_quotation_table(
    html: &str,
    contract: &str,
    metal: Metal,
    fallback_date: NaiveDate,
    source: &str,
) -> Vec<SpotPriceRecord> {
    let document = Html::parse_document(html);
    let row_selector = match Selector::parse("table tr") {
        Ok(s) => s,
        Err(_) => return Vec::new(),
    };
    let cell_selector = match Selector::parse("td, th") {
        Ok(s) => s,
        Err(_) => return Vec::new(),
    };

    for row in document.select(&row_selector) {
        let cells: Vec<String> = row
            .select(&cell_selector)
            .map(|c| c.text().collect::<String>().trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();

        if cells.len() >= 6 && cells[1].contains(contract) {
            let price = match cells[5].replace(',', "").parse::<f64>() {
                Ok(p) => p,
                Err(_) => continue,
            };
            let date = NaiveDate::parse_from_str(&cells[0], "%Y-%m-%d")
                .unwrap_or(fallback_date);
            return vec![SpotPriceRecord {
                date,
                market: "SGE".to_string(),
                metal,
                price,
                currency: "CNY".to_string(),
                source: source.to_string(),
            }];
        }
    }

    Vec::new()
}
