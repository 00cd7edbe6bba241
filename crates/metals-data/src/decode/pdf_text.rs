//! PDF → 텍스트 테이블 디코더.
//!
//! PDF에서 구조화된 표를 복원하는 것은 본질적으로 근사입니다. 여기서는
//! 텍스트 레이어를 추출한 뒤 빈 줄로 구분된 블록을 테이블로, 각 줄의
//! 공백 구분 토큰을 셀로 취급합니다. 결과 품질은 소스 레이아웃에
//! 의존하며, 후속 파서가 best-effort로 처리합니다.

use crate::error::{DataError, Result};
use crate::extract::pdf::PdfTable;

/// PDF 바이트에서 텍스트 테이블 목록을 복원합니다.
pub fn decode_tables(bytes: &[u8]) -> Result<Vec<PdfTable>> {
    let text = pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| DataError::Decode(format!("PDF 텍스트 추출 실패: {}", e)))?;

    Ok(tables_from_text(&text))
}

/// 추출된 텍스트를 빈 줄 기준 블록으로 나눠 테이블화합니다.
pub fn tables_from_text(text: &str) -> Vec<PdfTable> {
    let mut tables = Vec::new();
    let mut rows: Vec<Vec<String>> = Vec::new();

    for line in text.lines() {
        let cells: Vec<String> = line
            .split_whitespace()
            .map(|tok| tok.to_string())
            .collect();

        if cells.is_empty() {
            if !rows.is_empty() {
                tables.push(PdfTable::new(std::mem::take(&mut rows)));
            }
            continue;
        }
        rows.push(cells);
    }

    if !rows.is_empty() {
        tables.push(PdfTable::new(rows));
    }

    tables
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_lines_split_tables() {
        let text = "品种 收盘 交割量\nAu99.99 782.5 1500\n\n品种 交割量\nAg(T+D) 30000\n";
        let tables = tables_from_text(text);
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0].rows.len(), 2);
        assert_eq!(tables[0].rows[1][0], "Au99.99");
        assert_eq!(tables[1].rows[1][1], "30000");
    }

    #[test]
    fn test_empty_text_yields_no_tables() {
        assert!(tables_from_text("\n\n").is_empty());
    }
}
