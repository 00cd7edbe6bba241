//! 스프레드시트 창고 블록 파서.
//!
//! CME 공식 재고 XLS처럼 고정 스키마가 없는 2차원 셀 그리드에서 창고별
//! Registered/Eligible/Total 값을 추출합니다. 스캔 커서를 명시적 유한
//! 상태 기계로 모델링하여 문서 I/O 없이 독립적으로 테스트합니다:
//!
//! ```text
//! SeekDate → SeekHeader → SeekGroup ⇄ InGroup → Done
//! ```
//!
//! 구조 가정이 깨진 경우(헤더 없음 등)에는 빈 결과를 반환하며, 절대
//! 에러를 내지 않습니다.

use chrono::NaiveDate;
use metals_core::{InventoryCategory, OUNCE_TO_TON};
use regex::Regex;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// 디코딩된 그리드의 셀 값.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    /// 빈 셀
    Empty,
    /// 텍스트 셀
    Text(String),
    /// 숫자 셀
    Number(f64),
}

impl Cell {
    /// 빈 셀 여부. 공백만 있는 텍스트도 빈 셀로 취급.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(s) => s.trim().is_empty(),
            Self::Number(_) => false,
        }
    }

    /// 셀의 텍스트 표현. 숫자 셀은 None.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) if !s.trim().is_empty() => Some(s.trim()),
            _ => None,
        }
    }

    /// 숫자 강제 변환. 쉼표가 포함된 숫자 문자열도 허용.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => s.trim().replace(',', "").parse().ok(),
            Self::Empty => None,
        }
    }
}

/// 행 × 열 셀 그리드.
#[derive(Debug, Clone, Default)]
pub struct CellGrid {
    pub rows: Vec<Vec<Cell>>,
}

impl CellGrid {
    /// 행 목록에서 그리드 생성.
    pub fn new(rows: Vec<Vec<Cell>>) -> Self {
        Self { rows }
    }
}

/// 스캔 상태 기계.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    /// 보고서 날짜 마커 탐색 중 (상위 N행)
    SeekDate,
    /// 데이터 영역 시작 헤더 탐색 중
    SeekHeader,
    /// 새 창고 그룹 행 탐색 중
    SeekGroup,
    /// 그룹 내부: 카테고리 행 수집 중
    InGroup,
    /// GRAND TOTAL 도달, 스캔 종료
    Done,
}

/// 창고 하나의 카테고리별 값 (온스).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WarehouseTotals {
    pub registered: Option<f64>,
    pub eligible: Option<f64>,
    pub total: Option<f64>,
}

/// (창고, 카테고리) 단위 추출 결과 블록.
///
/// `warehouse`가 빈 문자열이면 전 창고 합산 행입니다.
#[derive(Debug, Clone, PartialEq)]
pub struct WarehouseBlock {
    pub warehouse: String,
    pub category: InventoryCategory,
    pub value: f64,
    pub unit: &'static str,
}

/// 그리드 파싱 결과.
#[derive(Debug, Clone, Default)]
pub struct GridParseResult {
    /// 문서에서 추출한 보고서 날짜. 마커가 없으면 None (호출자가 실행
    /// 날짜로 대체).
    pub report_date: Option<NaiveDate>,
    /// 창고별 + 합산 블록. 헤더를 찾지 못하면 빈 목록.
    pub blocks: Vec<WarehouseBlock>,
}

/// 날짜 마커를 찾을 상위 행 수.
const DATE_SCAN_ROWS: usize = 10;

/// 카테고리/합산 행 키워드. 그룹 행 판정에서 제외됩니다.
const CATEGORY_KEYWORDS: [&str; 6] = [
    "REGISTERED",
    "ELIGIBLE",
    "PLEDGED",
    "TOTAL",
    "GRAND",
    "---",
];

/// 창고 블록 그리드 파서.
pub struct WarehouseGridParser {
    date_re: Regex,
}

impl WarehouseGridParser {
    /// 새 파서 생성.
    pub fn new() -> Self {
        // "Report Date: 2/6/2026" / "Activity Date: 02/06/2026" 형태
        let date_re =
            Regex::new(r"(?:Report|Activity)\s*Date[:\s]*(\d{1,2}/\d{1,2}/\d{4})")
                .expect("invalid date marker regex");
        Self { date_re }
    }

    /// 그리드를 스캔해 창고 블록을 추출합니다.
    pub fn parse(&self, grid: &CellGrid) -> GridParseResult {
        let mut state = ScanState::SeekDate;
        let mut report_date = None;
        let mut warehouses: BTreeMap<String, WarehouseTotals> = BTreeMap::new();
        let mut current: Option<String> = None;
        let mut cursor = 0usize;

        loop {
            match state {
                // SeekDate: 상위 N행 한정 서브스캔. 실패해도 비치명적.
                ScanState::SeekDate => {
                    report_date = self.scan_report_date(grid);
                    if report_date.is_none() {
                        warn!("그리드에서 보고서 날짜 마커를 찾지 못함, 실행 날짜로 대체 예정");
                    }
                    state = ScanState::SeekHeader;
                }

                // SeekHeader: DEPOSITORY / PREV 키워드 행 아래부터 데이터 영역.
                ScanState::SeekHeader => match find_header(grid) {
                    Some(idx) => {
                        cursor = idx + 1;
                        state = ScanState::SeekGroup;
                    }
                    None => {
                        warn!("그리드에서 헤더 행을 찾지 못함, 빈 결과 반환");
                        return GridParseResult {
                            report_date,
                            blocks: Vec::new(),
                        };
                    }
                },

                ScanState::SeekGroup | ScanState::InGroup => {
                    let row = match grid.rows.get(cursor) {
                        Some(row) => row,
                        None => break,
                    };
                    cursor += 1;

                    let text = match row.first().and_then(Cell::as_text) {
                        Some(t) => t.to_string(),
                        None => continue,
                    };
                    let upper = text.to_uppercase();

                    // 구분선 행은 상태 전이 없이 건너뜀
                    if upper.contains("---") || upper.starts_with('=') {
                        continue;
                    }

                    if upper.contains("GRAND") && upper.contains("TOTAL") {
                        state = ScanState::Done;
                        continue;
                    }

                    let is_category_row =
                        CATEGORY_KEYWORDS.iter().any(|kw| upper.contains(kw));

                    if !is_category_row && non_empty_count(row) <= 2 {
                        // 첫 셀만 값이 있는 행 → 새 창고 그룹 시작
                        current = Some(text.clone());
                        warehouses.entry(text).or_default();
                        state = ScanState::InGroup;
                        continue;
                    }

                    if state == ScanState::InGroup {
                        if let (Some(wh), Some(val)) = (current.as_ref(), last_numeric(row)) {
                            let totals = warehouses.entry(wh.clone()).or_default();
                            if upper.contains("REGISTERED") {
                                totals.registered = Some(val);
                            } else if upper.contains("ELIGIBLE") {
                                totals.eligible = Some(val);
                            } else if upper.contains("TOTAL") {
                                totals.total = Some(val);
                            }
                        }
                    }
                }

                ScanState::Done => break,
            }
        }

        debug!(warehouses = warehouses.len(), "그리드 스캔 완료");

        GridParseResult {
            report_date,
            blocks: emit_blocks(&warehouses),
        }
    }

    /// 상위 N행에서 보고서 날짜 마커를 찾습니다.
    fn scan_report_date(&self, grid: &CellGrid) -> Option<NaiveDate> {
        for row in grid.rows.iter().take(DATE_SCAN_ROWS) {
            if let Some(text) = row.first().and_then(Cell::as_text) {
                if let Some(caps) = self.date_re.captures(text) {
                    if let Ok(date) = NaiveDate::parse_from_str(&caps[1], "%m/%d/%Y") {
                        return Some(date);
                    }
                }
            }
        }
        None
    }
}

impl Default for WarehouseGridParser {
    fn default() -> Self {
        Self::new()
    }
}

/// DEPOSITORY / PREV 키워드가 들어간 헤더 행의 인덱스.
fn find_header(grid: &CellGrid) -> Option<usize> {
    grid.rows.iter().position(|row| {
        row.first()
            .and_then(Cell::as_text)
            .map(|t| {
                let upper = t.to_uppercase();
                upper.contains("DEPOSITORY") || upper.contains("PREV")
            })
            .unwrap_or(false)
    })
}

/// 행의 "현재 값": 왼쪽에서 오른쪽으로 마지막 숫자 셀.
///
/// TOTAL TODAY 컬럼은 통상 유효 숫자가 있는 마지막 열입니다. 뒤쪽의
/// 비숫자 셀은 건너뜁니다.
fn last_numeric(row: &[Cell]) -> Option<f64> {
    row.iter().skip(1).filter_map(Cell::as_number).next_back()
}

fn non_empty_count(row: &[Cell]) -> usize {
    row.iter().filter(|c| !c.is_empty()).count()
}

/// 창고별 totals → 블록 목록 + 전 창고 합산 블록.
fn emit_blocks(warehouses: &BTreeMap<String, WarehouseTotals>) -> Vec<WarehouseBlock> {
    let mut blocks = Vec::new();
    let mut sum_registered = 0.0;
    let mut sum_eligible = 0.0;
    let mut any = false;

    for (name, totals) in warehouses {
        let registered = totals.registered.unwrap_or(0.0);
        let eligible = totals.eligible.unwrap_or(0.0);
        let total = totals.total.unwrap_or(registered + eligible);
        if total <= 0.0 {
            continue;
        }
        any = true;
        sum_registered += registered;
        sum_eligible += eligible;

        blocks.push(WarehouseBlock {
            warehouse: name.clone(),
            category: InventoryCategory::Registered,
            value: registered,
            unit: "oz",
        });
        blocks.push(WarehouseBlock {
            warehouse: name.clone(),
            category: InventoryCategory::Eligible,
            value: eligible,
            unit: "oz",
        });
        blocks.push(WarehouseBlock {
            warehouse: name.clone(),
            category: InventoryCategory::Total,
            value: round4(total / OUNCE_TO_TON),
            unit: "ton",
        });
    }

    if any {
        let grand = sum_registered + sum_eligible;
        blocks.push(WarehouseBlock {
            warehouse: String::new(),
            category: InventoryCategory::Registered,
            value: sum_registered,
            unit: "oz",
        });
        blocks.push(WarehouseBlock {
            warehouse: String::new(),
            category: InventoryCategory::Eligible,
            value: sum_eligible,
            unit: "oz",
        });
        blocks.push(WarehouseBlock {
            warehouse: String::new(),
            category: InventoryCategory::Total,
            value: round4(grand / OUNCE_TO_TON),
            unit: "ton",
        });
    }

    blocks
}

fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}
