//! XLS/XLSX → 셀 그리드 디코더.

use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Reader};

use crate::error::{DataError, Result};
use crate::extract::grid::{Cell, CellGrid};

/// 워크북 바이트의 첫 시트를 셀 그리드로 디코딩합니다.
///
/// XLS/XLSX 포맷은 확장자 없이 내용으로 자동 판별합니다. 날짜·수식
/// 에러 셀은 빈 셀로 취급합니다 (그리드 파서의 숫자 추출 규칙과 일치).
pub fn decode_first_sheet(bytes: &[u8]) -> Result<CellGrid> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| DataError::Decode(format!("워크북 열기 실패: {}", e)))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| DataError::Decode("워크북에 시트가 없음".to_string()))?
        .map_err(|e| DataError::Decode(format!("시트 읽기 실패: {}", e)))?;

    let rows = range
        .rows()
        .map(|row| row.iter().map(to_cell).collect())
        .collect();

    Ok(CellGrid::new(rows))
}

fn to_cell(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Empty,
        Data::String(s) => Cell::Text(s.clone()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Float(f) => Cell::Number(*f),
        Data::Bool(b) => Cell::Text(b.to_string()),
        // 엑셀 날짜/에러 셀은 값 추출 대상이 아님
        Data::DateTime(_) | Data::Error(_) => Cell::Empty,
    }
}
