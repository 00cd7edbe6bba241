//! PDF 인도(delivery) 테이블 휴리스틱 파서.
//!
//! 페이지별 테이블로 분해된 문서에서 금/은 인도량을 추출합니다. 명시적
//! best-effort 파서입니다: 출력 품질은 소스 레이아웃 안정성에 의존하며,
//! 호출자는 레코드 부재를 "데이터 없음"으로 취급해야지 에러로 취급하면
//! 안 됩니다.
//!
//! 헤더에서 인도량 컬럼을 찾으면 정확한 컬럼 인덱스로 값을 읽고, 찾지
//! 못하면 행의 모든 숫자 토큰 중 하나를 고르는 fallback으로 내려갑니다.
//! 어느 토큰이 맞는지는 관측된 레이아웃마다 달라 단정할 수 없으므로
//! 선택 규칙을 [`NumericPick`] 전략으로 노출합니다.

use regex::Regex;
use std::sync::OnceLock;

/// 한 페이지에서 복원된 테이블 (행 × 문자열 셀).
#[derive(Debug, Clone, Default)]
pub struct PdfTable {
    pub rows: Vec<Vec<String>>,
}

impl PdfTable {
    pub fn new(rows: Vec<Vec<String>>) -> Self {
        Self { rows }
    }
}

/// 헤더 컬럼을 못 찾았을 때의 숫자 토큰 선택 전략.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NumericPick {
    /// 행의 마지막 숫자 토큰. 인도량 컬럼은 통상 표 우측에 있습니다.
    #[default]
    Last,
    /// 행의 첫 숫자 토큰.
    First,
}

/// 금속별 누적 인도량 (킬로그램).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DeliveryVolumes {
    pub gold_kg: f64,
    pub silver_kg: f64,
}

impl DeliveryVolumes {
    /// 어느 금속도 양수 누적값이 없으면 true.
    pub fn is_empty(&self) -> bool {
        self.gold_kg <= 0.0 && self.silver_kg <= 0.0
    }
}

fn number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[\d.]+").expect("invalid numeric token regex"))
}

/// 인도 테이블 파서.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeliveryTableParser {
    pick: NumericPick,
}

impl DeliveryTableParser {
    /// 기본 전략(Last)으로 생성.
    pub fn new() -> Self {
        Self::default()
    }

    /// 지정 전략으로 생성.
    pub fn with_pick(pick: NumericPick) -> Self {
        Self { pick }
    }

    /// 전체 테이블을 스캔해 금속별 인도량을 누적합니다.
    ///
    /// 같은 금속이 여러 행/테이블/페이지에 걸쳐 나오면 모두 합산되며,
    /// 누적값이 0이면 해당 금속은 결과에서 빠집니다.
    pub fn parse(&self, tables: &[PdfTable]) -> DeliveryVolumes {
        let mut volumes = DeliveryVolumes::default();

        for table in tables {
            let mut delivery_col: Option<usize> = None;

            for row in &table.rows {
                let row_text: String = row
                    .iter()
                    .map(|c| c.replace('\n', ""))
                    .collect::<Vec<_>>()
                    .join("")
                    .to_uppercase();

                // 헤더 행에서 인도량 컬럼 탐지 (정확 컬럼 매칭 우선)
                if row_text.contains("交收") || row_text.contains("交割") {
                    for (idx, cell) in row.iter().enumerate() {
                        if cell.contains("交收") || cell.contains("交割") {
                            delivery_col = Some(idx);
                            break;
                        }
                    }
                }

                let is_gold = row_text.contains("AU") || row_text.contains("金");
                let is_silver = row_text.contains("AG") || row_text.contains("银");
                if !is_gold && !is_silver {
                    continue;
                }

                let value = match delivery_col {
                    Some(col) if col < row.len() => extract_number(&row[col]),
                    _ => self.pick_number(row),
                };

                if let Some(v) = value {
                    if v > 0.0 {
                        if is_gold {
                            volumes.gold_kg += v;
                        } else if is_silver {
                            volumes.silver_kg += v;
                        }
                    }
                }
            }
        }

        volumes
    }

    /// 헤더 컬럼 없이 행의 숫자 토큰에서 전략에 따라 하나 선택.
    fn pick_number(&self, row: &[String]) -> Option<f64> {
        let nums: Vec<f64> = row.iter().filter_map(|c| extract_number(c)).collect();
        match self.pick {
            NumericPick::Last => nums.last().copied(),
            NumericPick::First => nums.first().copied(),
        }
    }
}

/// 셀 텍스트에서 첫 숫자 토큰 추출 (쉼표 제거).
fn extract_number(cell: &str) -> Option<f64> {
    let cleaned = cell.replace(',', "");
    number_re()
        .find(&cleaned)
        .and_then(|m| m.as_str().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_header_column_takes_precedence() {
        let table = PdfTable::new(vec![
            row(&["品种", "开盘", "收盘", "交割量"]),
            row(&["Au99.99", "780.1", "782.5", "1,500"]),
            row(&["Ag(T+D)", "9100", "9150", "30000"]),
        ]);
        let volumes = DeliveryTableParser::new().parse(&[table]);
        assert_eq!(volumes.gold_kg, 1500.0);
        assert_eq!(volumes.silver_kg, 30000.0);
    }

    #[test]
    fn test_fallback_last_numeric_token() {
        // 헤더 없는 테이블: 마지막 숫자 토큰을 인도량으로 간주
        let table = PdfTable::new(vec![row(&["Au(T+D)", "779.0", "781.2", "2500"])]);
        let volumes = DeliveryTableParser::new().parse(&[table]);
        assert_eq!(volumes.gold_kg, 2500.0);
    }

    #[test]
    fn test_fallback_first_numeric_token_strategy() {
        let table = PdfTable::new(vec![row(&["Au(T+D)", "779.0", "781.2", "2500"])]);
        let volumes = DeliveryTableParser::with_pick(NumericPick::First).parse(&[table]);
        assert_eq!(volumes.gold_kg, 779.0);
    }

    #[test]
    fn test_accumulates_across_tables() {
        let t1 = PdfTable::new(vec![row(&["Au99.99", "1000"])]);
        let t2 = PdfTable::new(vec![row(&["黄金延期", "500"]), row(&["白银", "200"])]);
        let volumes = DeliveryTableParser::new().parse(&[t1, t2]);
        assert_eq!(volumes.gold_kg, 1500.0);
        assert_eq!(volumes.silver_kg, 200.0);
    }

    #[test]
    fn test_no_commodity_rows_yields_empty() {
        let table = PdfTable::new(vec![row(&["品种", "价格"]), row(&["铂金", "3000"])]);
        let volumes = DeliveryTableParser::new().parse(&[table]);
        assert!(volumes.is_empty());
    }
}
