//! LBMA 제공자.
//!
//! - 월간 런던 금고 보유량 XLSX (발행이 1개월 지연되므로 전월 파일을
//!   조회)
//! - 가격 페이지 HTML 테이블 현물가 (Sina 시세 실패 시의 fallback)

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use regex::Regex;
use scraper::{Html, Selector};
use tracing::{debug, info};

use metals_core::{
    DataProvider, FetchContext, FetchError, FetchResult, HttpConfig, InventoryCategory,
    InventoryRecord, Metal, SpotPriceRecord, OUNCE_TO_TON,
};

use crate::decode::xls;
use crate::extract::grid::{Cell, CellGrid};
use crate::provider::{build_client, status_error, transport_error};

const DEFAULT_VAULT_BASE_URL: &str = "https://cdn.lbma.org.uk/downloads";
const DEFAULT_PRICE_PAGE_URL: &str =
    "https://www.lbma.org.uk/prices-and-data/precious-metal-prices";

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// LBMA 월간 금고 보유량 제공자.
pub struct LbmaVaultProvider {
    client: reqwest::Client,
    base_url: String,
}

impl LbmaVaultProvider {
    pub fn new(config: &HttpConfig) -> Self {
        Self::with_base_url(config, DEFAULT_VAULT_BASE_URL.to_string())
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
impl DataProvider for LbmaVaultProvider {
    type Record = InventoryRecord;

    fn source_id(&self) -> &'static str {
        "lbma_xlsx"
    }

    async fn fetch(&self, ctx: &FetchContext) -> FetchResult<Vec<InventoryRecord>> {
        // LBMA 데이터는 통상 1개월 지연 발행
        let (year, month) = previous_month(ctx.target_date);
        let url = format!(
            "{}/LBMA-London-Vault-Holdings-Data-{}-{}.xlsx",
            self.base_url,
            MONTH_NAMES[(month - 1) as usize],
            year
        );
        debug!(url = %url, "LBMA 금고 데이터 요청");

        let resp = self.client.get(&url).send().await.map_err(transport_error)?;
        if !resp.status().is_success() {
            // 아직 발행 전이면 404
            return Err(status_error(resp.status(), "LBMA 금고 XLSX"));
        }

        let bytes = resp.bytes().await.map_err(transport_error)?;
        let grid = xls::decode_first_sheet(&bytes)
            .map_err(|e| FetchError::Decode(e.to_string()))?;

        let mut records = parse_vault_grid(&grid, self.source_id());

        // 최신 2개월(금/은 4건)만 유지. 과도한 과거 재기록 방지.
        if records.len() > 4 {
            records.drain(..records.len() - 4);
        }

        info!(count = records.len(), "LBMA 금고 레코드 추출 완료");
        Ok(records)
    }
}

/// 금고 XLSX 그리드 파싱: 3행째부터 `YYYY-MM` 행을 찾아 금/은 천온스
/// 값을 톤으로 환산합니다.
fn parse_vault_grid(grid: &CellGrid, source: &str) -> Vec<InventoryRecord> {
    let month_re = Regex::new(r"^(\d{4})-(\d{2})").expect("invalid month regex");
    let mut records = Vec::new();

    for row in grid.rows.iter().skip(2) {
        let month_text = match row.first().and_then(Cell::as_text) {
            Some(t) => t,
            None => continue,
        };
        let caps = match month_re.captures(month_text) {
            Some(c) => c,
            None => continue,
        };
        let year: i32 = caps[1].parse().unwrap_or(0);
        let month: u32 = caps[2].parse().unwrap_or(0);
        let date = match month_end(year, month) {
            Some(d) => d,
            None => continue,
        };

        // Gold = 열 1, Silver = 열 2 (단위: 천온스)
        for (metal, col) in [(Metal::Gold, 1usize), (Metal::Silver, 2usize)] {
            let koz = row.get(col).and_then(Cell::as_number);
            if let Some(koz) = koz {
                if koz > 0.0 {
                    let tons = (koz * 1000.0) / OUNCE_TO_TON;
                    records.push(InventoryRecord {
                        date,
                        exchange: "LBMA".to_string(),
                        metal,
                        category: InventoryCategory::VaultTotal,
                        warehouse: "London Vaults".to_string(),
                        inventory: (tons * 100.0).round() / 100.0,
                        unit: "ton".to_string(),
                        source: source.to_string(),
                    });
                }
            }
        }
    }

    records
}

/// 전월 (연, 월). 1월은 전년 12월로 넘어갑니다.
fn previous_month(date: NaiveDate) -> (i32, u32) {
    if date.month() == 1 {
        (date.year() - 1, 12)
    } else {
        (date.year(), date.month() - 1)
    }
}

/// 해당 월의 말일.
fn month_end(year: i32, month: u32) -> Option<NaiveDate> {
    let (next_y, next_m) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_y, next_m, 1).and_then(|d| d.pred_opt())
}

/// LBMA 가격 페이지 HTML 현물가 제공자.
///
/// 페이지 구조 변동에 대비한 휴리스틱 추출입니다: GOLD/SILVER가 포함된
/// 테이블 행에서 첫 숫자 셀을 가격으로 간주합니다.
pub struct LbmaPricePageProvider {
    client: reqwest::Client,
    url: String,
}

impl LbmaPricePageProvider {
    pub fn new(config: &HttpConfig) -> Self {
        Self::with_url(config, DEFAULT_PRICE_PAGE_URL.to_string())
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
impl DataProvider for LbmaPricePageProvider {
    type Record = SpotPriceRecord;

    fn source_id(&self) -> &'static str {
        "lbma_web"
    }

    async fn fetch(&self, ctx: &FetchContext) -> FetchResult<Vec<SpotPriceRecord>> {
        let resp = self.client.get(&self.url).send().await.map_err(transport_error)?;
        if !resp.status().is_success() {
            return Err(status_error(resp.status(), "LBMA 가격 페이지"));
        }
        let html = resp.text().await.map_err(transport_error)?;

        let records = parse_price_page(&html, ctx.run_date, self.source_id());
        info!(count = records.len(), "LBMA 가격 페이지 추출 완료");
        Ok(records)
    }
}

/// 가격 페이지 테이블에서 금속별 첫 숫자 셀을 추출.
fn parse_price_page(html: &str, date: NaiveDate, source: &str) -> Vec<SpotPriceRecord> {
    let document = Html::parse_document(html);
    let row_selector = match Selector::parse("table tr") {
        Ok(s) => s,
        Err(_) => return Vec::new(),
    };
    let cell_selector = match Selector::parse("td, th") {
        Ok(s) => s,
        Err(_) => return Vec::new(),
    };

    let mut gold: Option<f64> = None;
    let mut silver: Option<f64> = None;

    for row in document.select(&row_selector) {
        let text = row.text().collect::<String>().to_uppercase();
        let slot = if text.contains("GOLD") {
            &mut gold
        } else if text.contains("SILVER") {
            &mut silver
        } else {
            continue;
        };
        if slot.is_some() {
            continue;
        }

        let cells: Vec<String> = row
            .select(&cell_selector)
            .map(|c| c.text().collect::<String>().trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();

        // 첫 셀은 레이블, 이후 셀에서 첫 숫자를 가격으로
        *slot = cells
            .iter()
            .skip(1)
            .find_map(|c| c.replace(',', "").parse::<f64>().ok());
    }

    let mut records = Vec::new();
    for (metal, price) in [(Metal::Gold, gold), (Metal::Silver, silver)] {
        if let Some(price) = price {
            records.push(SpotPriceRecord {
                date,
                market: "LBMA".to_string(),
                metal,
                price,
                currency: "USD".to_string(),
                source: source.to_string(),
            });
        }
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_previous_month_rolls_over_year() {
        let jan = NaiveDate::from_ymd_opt(2026, 1, 15).unwrap();
        assert_eq!(previous_month(jan), (2025, 12));
        let jul = NaiveDate::from_ymd_opt(2026, 7, 1).unwrap();
        assert_eq!(previous_month(jul), (2026, 6));
    }

    #[test]
    fn test_month_end() {
        assert_eq!(
            month_end(2026, 2),
            Some(NaiveDate::from_ymd_opt(2026, 2, 28).unwrap())
        );
        assert_eq!(
            month_end(2026, 12),
            Some(NaiveDate::from_ymd_opt(2026, 12, 31).unwrap())
        );
    }

    #[test]
    fn test_parse_vault_grid() {
        let grid = CellGrid::new(vec![
            vec![Cell::Text("LBMA London Vault Holdings".into())],
            vec![Cell::Text("Month".into()), Cell::Text("Gold (koz)".into())],
            vec![
                Cell::Text("2025-12".into()),
                Cell::Number(280_000.0),
                Cell::Number(850_000.0),
            ],
        ]);
        let records = parse_vault_grid(&grid, "lbma_xlsx");
        assert_eq!(records.len(), 2);
        assert_eq!(
            records[0].date,
            NaiveDate::from_ymd_opt(2025, 12, 31).unwrap()
        );
        let expected = (280_000.0 * 1000.0) / OUNCE_TO_TON;
        assert!((records[0].inventory - (expected * 100.0).round() / 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_parse_price_page_rows() {
        let html = r#"
            <table>
              <tr><th>Metal</th><th>Price (USD)</th></tr>
              <tr><td>Gold AM</td><td>2,700.50</td></tr>
              <tr><td>Silver AM</td><td>31.20</td></tr>
            </table>
        "#;
        let date = NaiveDate::from_ymd_opt(2026, 2, 6).unwrap();
        let records = parse_price_page(html, date, "lbma_web");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].metal, Metal::Gold);
        assert_eq!(records[0].price, 2700.5);
        assert_eq!(records[1].price, 31.2);
    }
}
