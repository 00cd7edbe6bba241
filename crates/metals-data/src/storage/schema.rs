//! 테이블 스키마.
//!
//! 모든 테이블은 natural key에 UNIQUE 제약을 걸고, 쓰기는
//! `INSERT ... ON CONFLICT ... DO UPDATE`(replace, last-write-wins)로
//! 수행합니다. 정정 이력은 의도적으로 보관하지 않습니다.

/// 기동 시 실행되는 테이블 생성 DDL 목록.
pub(crate) const CREATE_TABLES: &[&str] = &[
    // 1. 거래소별 재고 (일별)
    r#"
    CREATE TABLE IF NOT EXISTS inventory_daily (
        date        TEXT    NOT NULL,
        exchange    TEXT    NOT NULL,
        metal       TEXT    NOT NULL,
        category    TEXT    CHECK(category IN (
            'registered','eligible','pledged','total',
            'warehouse','vault_total','delivery_volume')),
        warehouse   TEXT    DEFAULT '',
        inventory   REAL    NOT NULL,
        unit        TEXT,
        source      TEXT,
        UNIQUE(date, exchange, metal, category, warehouse)
    )
    "#,
    // 2. 선물 가격 (일별)
    r#"
    CREATE TABLE IF NOT EXISTS future_prices_daily (
        date            TEXT    NOT NULL,
        exchange        TEXT    NOT NULL,
        metal           TEXT    NOT NULL,
        contract        TEXT    NOT NULL,
        close_price     REAL,
        open_interest   REAL,
        volume          REAL,
        currency        TEXT,
        source          TEXT,
        UNIQUE(date, exchange, metal, contract)
    )
    "#,
    // 3. 현물 가격 (일별)
    r#"
    CREATE TABLE IF NOT EXISTS spot_prices_daily (
        date        TEXT    NOT NULL,
        market      TEXT    NOT NULL,
        metal       TEXT    NOT NULL,
        price       REAL    NOT NULL,
        currency    TEXT,
        source      TEXT,
        UNIQUE(date, market, metal)
    )
    "#,
    // 4. ETF 보유량 (일별)
    r#"
    CREATE TABLE IF NOT EXISTS etf_holdings_daily (
        date    TEXT    NOT NULL,
        symbol  TEXT    NOT NULL,
        metal   TEXT    NOT NULL,
        shares  REAL,
        ounces  REAL,
        change  REAL,
        source  TEXT,
        UNIQUE(date, symbol, metal)
    )
    "#,
    // 5. CFTC 포지션 (주별)
    r#"
    CREATE TABLE IF NOT EXISTS cftc_positions_weekly (
        report_date             TEXT    NOT NULL,
        market                  TEXT    NOT NULL,
        metal                   TEXT    NOT NULL,
        non_commercial_long     REAL,
        non_commercial_short    REAL,
        commercial_long         REAL,
        commercial_short        REAL,
        net_position            REAL,
        source                  TEXT,
        UNIQUE(report_date, market, metal)
    )
    "#,
    // 6. 계산 지표 결과 (외부 계산기가 씀)
    r#"
    CREATE TABLE IF NOT EXISTS computed_factors (
        date            TEXT    NOT NULL,
        metric_type     TEXT    NOT NULL,
        value           REAL    NOT NULL,
        description     TEXT,
        UNIQUE(date, metric_type)
    )
    "#,
    // 7. 환율 (일별)
    r#"
    CREATE TABLE IF NOT EXISTS fx_rates_daily (
        date    TEXT    NOT NULL,
        pair    TEXT    NOT NULL,
        rate    REAL    NOT NULL,
        source  TEXT,
        UNIQUE(date, pair)
    )
    "#,
];
