//! 정규화된 관측 레코드.
//!
//! 어느 데이터 소스가 생산했는지와 무관하게 저장되는 도메인별 canonical
//! 레코드를 정의합니다. 각 레코드의 차원 키 + 날짜 조합이 natural key이며,
//! 저장소는 이 키 기준으로 replace(last-write-wins) 합니다.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// 트로이온스 → 톤 환산 계수 (1톤 = 32,150.7466 oz t).
pub const OUNCE_TO_TON: f64 = 32150.7466;

/// 금속 종류.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metal {
    /// 금
    Gold,
    /// 은
    Silver,
}

impl Metal {
    /// DB 저장용 소문자 문자열.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gold => "gold",
            Self::Silver => "silver",
        }
    }

    /// 문자열에서 금속 파싱.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "gold" => Some(Self::Gold),
            "silver" => Some(Self::Silver),
            _ => None,
        }
    }
}

impl std::fmt::Display for Metal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 재고 카테고리.
///
/// `inventory_daily` 테이블의 CHECK 제약과 동일한 어휘를 사용합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InventoryCategory {
    /// 등록(registered) 재고
    Registered,
    /// 적격(eligible) 재고
    Eligible,
    /// 담보(pledged) 재고
    Pledged,
    /// 합계 (톤 단위로 저장)
    Total,
    /// 개별 창고 수증(warrant) 재고
    Warehouse,
    /// 금고 합계 (LBMA 월간)
    VaultTotal,
    /// 일일 인도(delivery) 물량
    DeliveryVolume,
}

impl InventoryCategory {
    /// DB 저장용 문자열.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Registered => "registered",
            Self::Eligible => "eligible",
            Self::Pledged => "pledged",
            Self::Total => "total",
            Self::Warehouse => "warehouse",
            Self::VaultTotal => "vault_total",
            Self::DeliveryVolume => "delivery_volume",
        }
    }
}

impl std::fmt::Display for InventoryCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 거래소별 일일 재고 관측.
///
/// Natural key: (date, exchange, metal, category, warehouse)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryRecord {
    pub date: NaiveDate,
    pub exchange: String,
    pub metal: Metal,
    pub category: InventoryCategory,
    /// 창고명. 거래소 전체 합산 행은 빈 문자열.
    pub warehouse: String,
    pub inventory: f64,
    pub unit: String,
    pub source: String,
}

/// 선물 가격 관측.
///
/// Natural key: (date, exchange, metal, contract)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuturePriceRecord {
    pub date: NaiveDate,
    pub exchange: String,
    pub metal: Metal,
    pub contract: String,
    pub close_price: Option<f64>,
    pub open_interest: Option<f64>,
    pub volume: Option<f64>,
    pub currency: String,
    pub source: String,
}

/// 현물 가격 관측.
///
/// Natural key: (date, market, metal)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpotPriceRecord {
    pub date: NaiveDate,
    pub market: String,
    pub metal: Metal,
    pub price: f64,
    pub currency: String,
    pub source: String,
}

/// ETF 보유량 관측.
///
/// Natural key: (date, symbol, metal)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EtfHoldingRecord {
    pub date: NaiveDate,
    pub symbol: String,
    pub metal: Metal,
    pub shares: Option<f64>,
    pub ounces: Option<f64>,
    pub change: Option<f64>,
    pub source: String,
}

/// CFTC COT 주간 포지션 관측.
///
/// Natural key: (report_date, market, metal)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CftcPositionRecord {
    pub report_date: NaiveDate,
    pub market: String,
    pub metal: Metal,
    pub non_commercial_long: Option<f64>,
    pub non_commercial_short: Option<f64>,
    pub commercial_long: Option<f64>,
    pub commercial_short: Option<f64>,
    /// 순포지션 (non-commercial long − short). 두 값이 모두 있을 때만 계산.
    pub net_position: Option<f64>,
    pub source: String,
}

/// 계산 지표 결과 행.
///
/// 지표 계산기는 외부 협력자이며 이 코어는 스키마와 upsert 경로만 소유합니다.
/// Natural key: (date, metric_type)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputedFactorRecord {
    pub date: NaiveDate,
    pub metric_type: String,
    pub value: f64,
    pub description: Option<String>,
}

/// 환율 관측.
///
/// Natural key: (date, pair)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FxRateRecord {
    pub date: NaiveDate,
    pub pair: String,
    pub rate: f64,
    pub source: String,
}
