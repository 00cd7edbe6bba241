//! CFTC COT 아카이브 배치 파서.
//!
//! 연도별 공식 ZIP(`deacot{year}.zip`) 안의 `.txt` CSV에서 금/은 계약의
//! 주간 포지션을 추출합니다. 레거시 포맷은 연도에 따라 컬럼명이 조금씩
//! 달라 피드 정규화기의 alias 조회를 그대로 사용합니다.

use std::io::{Cursor, Read};

use chrono::NaiveDate;
use serde_json::{Map, Value};
use tracing::warn;

use metals_core::{CftcPositionRecord, Metal};

use crate::error::{DataError, Result};
use crate::extract::feed;

/// CFTC 계약 시장 코드.
pub const GOLD_CONTRACT_CODE: &str = "088691";
pub const SILVER_CONTRACT_CODE: &str = "084691";

/// 레거시 COT CSV의 보고일 후보 컬럼.
const DATE_ALIASES: [&str; 6] = [
    "Report_Date_as_YYYY-MM-DD",
    "Report Date as YYYY-MM-DD",
    "As_of_Date_In_Form_YYMMDD",
    "As of Date in Form YYMMDD",
    "As_of_Date_Form_MM/DD/YYYY",
    "As of Date Form MM/DD/YYYY",
];

const NONCOMM_LONG_ALIASES: [&str; 2] =
    ["NonComm_Positions_Long_All", "Noncommercial Positions-Long"];
const NONCOMM_SHORT_ALIASES: [&str; 2] =
    ["NonComm_Positions_Short_All", "Noncommercial Positions-Short"];
const COMM_LONG_ALIASES: [&str; 2] = ["Comm_Positions_Long_All", "Commercial Positions-Long"];
const COMM_SHORT_ALIASES: [&str; 2] = ["Comm_Positions_Short_All", "Commercial Positions-Short"];

/// ZIP 바이트에서 COT 주간 포지션 레코드를 추출합니다.
///
/// ZIP 해제 실패는 에러, 기대 컬럼 부재는 경고 후 빈 결과입니다.
pub fn parse_cot_archive(bytes: &[u8], source: &str) -> Result<Vec<CftcPositionRecord>> {
    let mut zip = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| DataError::Decode(format!("COT ZIP 해제 실패: {}", e)))?;

    // ZIP 안의 첫 .txt 멤버가 연간 CSV
    let txt_name = (0..zip.len())
        .filter_map(|i| zip.by_index(i).ok().map(|f| f.name().to_string()))
        .find(|name| name.to_lowercase().ends_with(".txt"));

    let txt_name = match txt_name {
        Some(name) => name,
        None => {
            warn!("COT ZIP 안에 txt 멤버가 없음");
            return Ok(Vec::new());
        }
    };

    let mut raw = Vec::new();
    zip.by_name(&txt_name)
        .map_err(|e| DataError::Decode(format!("COT ZIP 멤버 읽기 실패: {}", e)))?
        .read_to_end(&mut raw)
        .map_err(|e| DataError::Decode(format!("COT ZIP 멤버 읽기 실패: {}", e)))?;

    parse_cot_csv(&String::from_utf8_lossy(&raw), source)
}

/// 연간 COT CSV 텍스트에서 금/은 레코드를 추출합니다.
pub fn parse_cot_csv(text: &str, source: &str) -> Result<Vec<CftcPositionRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| DataError::Parse(format!("COT CSV 헤더 파싱 실패: {}", e)))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let code_col = match headers
        .iter()
        .position(|h| h == "CFTC Contract Market Code")
    {
        Some(idx) => idx,
        None => {
            warn!("COT CSV에 CFTC Contract Market Code 컬럼이 없음");
            return Ok(Vec::new());
        }
    };

    let mut records = Vec::new();

    for row in reader.records() {
        let row = match row {
            Ok(r) => r,
            Err(_) => continue,
        };

        let code = row.get(code_col).map(str::trim).unwrap_or("");
        let metal = match code {
            GOLD_CONTRACT_CODE => Metal::Gold,
            SILVER_CONTRACT_CODE => Metal::Silver,
            _ => continue,
        };

        let item = row_to_map(&headers, &row);
        if let Some(rec) = extract_cot_row(&item, metal, source) {
            records.push(rec);
        }
    }

    Ok(records)
}

/// CSV 행을 피드 정규화기 입력 형태(필드명 → 값)로 변환.
fn row_to_map(headers: &[String], row: &csv::StringRecord) -> Map<String, Value> {
    headers
        .iter()
        .zip(row.iter())
        .map(|(h, v)| (h.clone(), Value::String(v.trim().to_string())))
        .collect()
}

/// 피드 항목 하나에서 포지션 레코드 추출. 보고일이 없으면 None.
pub(crate) fn extract_cot_row(
    item: &Map<String, Value>,
    metal: Metal,
    source: &str,
) -> Option<CftcPositionRecord> {
    let report_date = feed::lookup_str(item, &DATE_ALIASES).and_then(parse_report_date)?;

    let non_commercial_long = feed::lookup_f64(item, &NONCOMM_LONG_ALIASES);
    let non_commercial_short = feed::lookup_f64(item, &NONCOMM_SHORT_ALIASES);

    Some(CftcPositionRecord {
        report_date,
        market: "COMEX".to_string(),
        metal,
        net_position: feed::net_position(non_commercial_long, non_commercial_short),
        non_commercial_long,
        non_commercial_short,
        commercial_long: feed::lookup_f64(item, &COMM_LONG_ALIASES),
        commercial_short: feed::lookup_f64(item, &COMM_SHORT_ALIASES),
        source: source.to_string(),
    })
}

/// 보고일 파싱: `YYYY-MM-DD` / `MM/DD/YYYY` / `YYMMDD`.
fn parse_report_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%m/%d/%Y") {
        return Some(date);
    }
    // 6자리 YYMMDD (레거시 "As of Date in Form YYMMDD")
    if s.len() == 6 && s.chars().all(|c| c.is_ascii_digit()) {
        return NaiveDate::parse_from_str(&format!("20{}", s), "%Y%m%d").ok();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_CSV: &str = "\
Market and Exchange Names,As of Date in Form YYMMDD,Report Date as YYYY-MM-DD,CFTC Contract Market Code,NonComm_Positions_Long_All,NonComm_Positions_Short_All,Comm_Positions_Long_All,Comm_Positions_Short_All
GOLD - COMMODITY EXCHANGE INC.,260203,2026-02-03,088691,300000,80000,150000,350000
SILVER - COMMODITY EXCHANGE INC.,260203,2026-02-03,084691,90000,30000,50000,100000
COPPER - COMMODITY EXCHANGE INC.,260203,2026-02-03,085692,10,20,30,40
";

    #[test]
    fn test_parse_cot_csv_filters_by_contract_code() {
        let records = parse_cot_csv(SAMPLE_CSV, "cftc_zip").unwrap();
        assert_eq!(records.len(), 2);

        let gold = records.iter().find(|r| r.metal == Metal::Gold).unwrap();
        assert_eq!(
            gold.report_date,
            NaiveDate::from_ymd_opt(2026, 2, 3).unwrap()
        );
        assert_eq!(gold.non_commercial_long, Some(300_000.0));
        assert_eq!(gold.net_position, Some(220_000.0));
        assert_eq!(gold.source, "cftc_zip");
    }

    #[test]
    fn test_missing_code_column_yields_empty() {
        let csv = "Name,Value\nGOLD,1\n";
        let records = parse_cot_csv(csv, "cftc_zip").unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_parse_report_date_variants() {
        let expected = NaiveDate::from_ymd_opt(2026, 2, 3).unwrap();
        assert_eq!(parse_report_date("2026-02-03"), Some(expected));
        assert_eq!(parse_report_date("02/03/2026"), Some(expected));
        assert_eq!(parse_report_date("260203"), Some(expected));
        assert_eq!(parse_report_date("not a date"), None);
    }

    #[test]
    fn test_yymmdd_only_row_still_parses() {
        let csv = "\
CFTC Contract Market Code,As of Date in Form YYMMDD,NonComm_Positions_Long_All,NonComm_Positions_Short_All
088691,260127,100,40
";
        let records = parse_cot_csv(csv, "cftc_zip").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(
            records[0].report_date,
            NaiveDate::from_ymd_opt(2026, 1, 27).unwrap()
        );
        assert_eq!(records[0].net_position, Some(60.0));
        assert_eq!(records[0].commercial_long, None);
    }
}
