//! JSON/피드 필드 정규화기.
//!
//! 소스가 시간에 따라 스키마를 바꾸는 것을 흡수하기 위해, canonical
//! 필드마다 순서 있는 후보 필드명(alias) 목록으로 조회합니다.
//!
//! 조회 순서: 모든 alias에 대해 정확한 이름 일치 우선, 없으면 사용
//! 가능한 전체 필드명에 대한 대소문자 무시 부분 문자열 일치.
//! 값은 f64로 강제 변환되며, 변환 불가/부재는 0이 아니라 None입니다.

use serde_json::{Map, Value};

/// alias 목록으로 피드 항목에서 값을 조회합니다.
pub fn lookup<'a>(item: &'a Map<String, Value>, aliases: &[&str]) -> Option<&'a Value> {
    // 1차: 정확한 이름 일치
    for alias in aliases {
        if let Some(v) = item.get(*alias) {
            if !v.is_null() {
                return Some(v);
            }
        }
    }

    // 2차: 대소문자 무시 부분 문자열 일치
    for alias in aliases {
        let alias_lower = alias.to_lowercase();
        for (key, v) in item {
            if key.to_lowercase().contains(&alias_lower) && !v.is_null() {
                return Some(v);
            }
        }
    }

    None
}

/// alias 목록으로 f64 값을 조회합니다. 변환 불가는 None.
pub fn lookup_f64(item: &Map<String, Value>, aliases: &[&str]) -> Option<f64> {
    lookup(item, aliases).and_then(coerce_f64)
}

/// alias 목록으로 문자열 값을 조회합니다.
pub fn lookup_str<'a>(item: &'a Map<String, Value>, aliases: &[&str]) -> Option<&'a str> {
    lookup(item, aliases).and_then(Value::as_str)
}

/// JSON 값을 f64로 강제 변환.
///
/// 숫자는 그대로, 문자열은 쉼표 제거 후 파싱. 그 외 타입과 파싱 실패는
/// None.
pub fn coerce_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let cleaned = s.trim().replace(',', "");
            if cleaned.is_empty() {
                None
            } else {
                cleaned.parse().ok()
            }
        }
        _ => None,
    }
}

/// 파생 필드: 순포지션 (long − short).
///
/// 두 피연산자가 모두 있을 때만 계산합니다. 한쪽이라도 없으면 0이 아닌
/// None입니다.
pub fn net_position(long: Option<f64>, short: Option<f64>) -> Option<f64> {
    match (long, short) {
        (Some(l), Some(s)) => Some(l - s),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item(v: Value) -> Map<String, Value> {
        v.as_object().unwrap().clone()
    }

    #[test]
    fn test_exact_match_wins_over_substring() {
        let item = item(json!({
            "open_interest_all": 100,
            "open_interest": 42,
        }));
        // 정확 일치("open_interest")가 부분 일치 후보보다 우선
        assert_eq!(lookup_f64(&item, &["open_interest"]), Some(42.0));
    }

    #[test]
    fn test_substring_fallback_is_case_insensitive() {
        let item = item(json!({
            "NonComm_Positions_Long_All": "123,456",
        }));
        assert_eq!(
            lookup_f64(&item, &["noncomm_positions_long"]),
            Some(123_456.0)
        );
    }

    #[test]
    fn test_alias_order_respected() {
        let item = item(json!({
            "legacy_name": 1,
            "current_name": 2,
        }));
        assert_eq!(lookup_f64(&item, &["current_name", "legacy_name"]), Some(2.0));
    }

    #[test]
    fn test_missing_and_unparseable_become_none() {
        let item = item(json!({
            "value": "n/a",
            "nothing": null,
        }));
        assert_eq!(lookup_f64(&item, &["value"]), None);
        assert_eq!(lookup_f64(&item, &["nothing"]), None);
        assert_eq!(lookup_f64(&item, &["absent"]), None);
    }

    #[test]
    fn test_net_position_requires_both_operands() {
        assert_eq!(net_position(Some(10.0), Some(4.0)), Some(6.0));
        assert_eq!(net_position(Some(10.0), None), None);
        assert_eq!(net_position(None, Some(4.0)), None);
    }

    #[test]
    fn test_coerce_string_with_commas() {
        assert_eq!(coerce_f64(&json!("1,234.5")), Some(1234.5));
        assert_eq!(coerce_f64(&json!(true)), None);
    }
}
