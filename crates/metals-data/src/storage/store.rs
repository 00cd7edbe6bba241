//! SQLite 멱등 저장소.
//!
//! 모든 쓰기는 natural-key replace(last-write-wins)이며, 배치 하나가
//! 하나의 트랜잭션입니다. 레코드 단위 실패가 발생하면 배치 전체가
//! 롤백되고 에러가 호출자에게 올라갑니다 (파이프라인에서 유일하게
//! 치명적으로 취급되는 실패 클래스).
//!
//! 읽기 쿼리에는 암묵적 신선도 필터가 없습니다. 신선도 윈도우는
//! 호출자의 책임입니다.

use chrono::NaiveDate;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use tracing::{debug, info};

use metals_core::{
    CftcPositionRecord, ComputedFactorRecord, EtfHoldingRecord, FuturePriceRecord, FxRateRecord,
    InventoryCategory, InventoryRecord, Metal, SpotPriceRecord,
};

use crate::error::{DataError, Result};
use crate::storage::schema::CREATE_TABLES;

/// 시계열 하나를 지정하는 (테이블, 날짜 컬럼, 차원 필터) 셀렉터.
///
/// 컬럼명은 고정 리터럴만 허용해 동적 SQL 주입 여지를 없앱니다.
#[derive(Debug, Clone)]
pub struct SeriesSelector {
    pub table: &'static str,
    pub date_column: &'static str,
    pub filters: Vec<(&'static str, String)>,
}

impl SeriesSelector {
    /// 선물 가격 시계열.
    pub fn future_prices(exchange: &str, metal: Metal) -> Self {
        Self {
            table: "future_prices_daily",
            date_column: "date",
            filters: vec![
                ("exchange", exchange.to_string()),
                ("metal", metal.as_str().to_string()),
            ],
        }
    }

    /// 현물 가격 시계열.
    pub fn spot_prices(market: &str, metal: Metal) -> Self {
        Self {
            table: "spot_prices_daily",
            date_column: "date",
            filters: vec![
                ("market", market.to_string()),
                ("metal", metal.as_str().to_string()),
            ],
        }
    }

    /// ETF 보유량 시계열.
    pub fn etf_holdings(symbol: &str) -> Self {
        Self {
            table: "etf_holdings_daily",
            date_column: "date",
            filters: vec![("symbol", symbol.to_string())],
        }
    }

    /// 환율 시계열.
    pub fn fx_rates(pair: &str) -> Self {
        Self {
            table: "fx_rates_daily",
            date_column: "date",
            filters: vec![("pair", pair.to_string())],
        }
    }

    /// 재고 시계열.
    pub fn inventory(exchange: &str, metal: Metal) -> Self {
        Self {
            table: "inventory_daily",
            date_column: "date",
            filters: vec![
                ("exchange", exchange.to_string()),
                ("metal", metal.as_str().to_string()),
            ],
        }
    }

    /// WHERE 절 조각 생성 (`date >= ?` + 차원 필터).
    fn where_clause(&self) -> String {
        let mut clause = format!("{} >= ?", self.date_column);
        for (col, _) in &self.filters {
            clause.push_str(&format!(" AND {} = ?", col));
        }
        clause
    }
}

/// SQLite 저장소.
#[derive(Clone)]
pub struct MetalsStore {
    pool: SqlitePool,
}

impl MetalsStore {
    /// 파일 DB에 연결하고 스키마를 생성합니다.
    ///
    /// `sqlite://data/metals.db?mode=rwc` 형태의 URL을 받으며, 파일
    /// 경로의 상위 디렉터리는 자동 생성합니다.
    pub async fn connect(database_url: &str) -> Result<Self> {
        ensure_parent_dir(database_url);
        let pool = SqlitePool::connect(database_url)
            .await
            .map_err(|e| DataError::Connection(e.to_string()))?;
        let store = Self { pool };
        store.init_schema().await?;
        info!(url = %database_url, "데이터베이스 초기화 완료");
        Ok(store)
    }

    /// 인메모리 DB 생성 (테스트용).
    ///
    /// 인메모리 SQLite는 커넥션마다 별도 DB이므로 풀을 1개로 고정합니다.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| DataError::Connection(e.to_string()))?;
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<()> {
        for ddl in CREATE_TABLES {
            sqlx::query(ddl).execute(&self.pool).await?;
        }
        Ok(())
    }

    // --------------------------------------------------------
    // 쓰기 (배치 = 트랜잭션 하나)
    // --------------------------------------------------------

    /// 재고 레코드 배치 upsert. 기록된 행 수 반환.
    pub async fn upsert_inventory(&self, records: &[InventoryRecord]) -> Result<u64> {
        if records.is_empty() {
            return Ok(0);
        }
        let mut tx = self.pool.begin().await?;
        for rec in records {
            let res = sqlx::query(
                r#"
                INSERT INTO inventory_daily
                    (date, exchange, metal, category, warehouse, inventory, unit, source)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(date, exchange, metal, category, warehouse)
                DO UPDATE SET
                    inventory = excluded.inventory,
                    unit = excluded.unit,
                    source = excluded.source
                "#,
            )
            .bind(rec.date)
            .bind(&rec.exchange)
            .bind(rec.metal.as_str())
            .bind(rec.category.as_str())
            .bind(&rec.warehouse)
            .bind(rec.inventory)
            .bind(&rec.unit)
            .bind(&rec.source)
            .execute(&mut *tx)
            .await;

            if let Err(e) = res {
                tx.rollback().await.ok();
                return Err(DataError::BatchAborted(e.to_string()));
            }
        }
        tx.commit().await?;
        info!(table = "inventory_daily", count = records.len(), "배치 upsert 완료");
        Ok(records.len() as u64)
    }

    /// 선물 가격 레코드 배치 upsert.
    pub async fn upsert_future_prices(&self, records: &[FuturePriceRecord]) -> Result<u64> {
        if records.is_empty() {
            return Ok(0);
        }
        let mut tx = self.pool.begin().await?;
        for rec in records {
            let res = sqlx::query(
                r#"
                INSERT INTO future_prices_daily
                    (date, exchange, metal, contract, close_price, open_interest,
                     volume, currency, source)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(date, exchange, metal, contract)
                DO UPDATE SET
                    close_price = excluded.close_price,
                    open_interest = excluded.open_interest,
                    volume = excluded.volume,
                    currency = excluded.currency,
                    source = excluded.source
                "#,
            )
            .bind(rec.date)
            .bind(&rec.exchange)
            .bind(rec.metal.as_str())
            .bind(&rec.contract)
            .bind(rec.close_price)
            .bind(rec.open_interest)
            .bind(rec.volume)
            .bind(&rec.currency)
            .bind(&rec.source)
            .execute(&mut *tx)
            .await;

            if let Err(e) = res {
                tx.rollback().await.ok();
                return Err(DataError::BatchAborted(e.to_string()));
            }
        }
        tx.commit().await?;
        info!(table = "future_prices_daily", count = records.len(), "배치 upsert 완료");
        Ok(records.len() as u64)
    }

    /// 현물 가격 레코드 배치 upsert.
    pub async fn upsert_spot_prices(&self, records: &[SpotPriceRecord]) -> Result<u64> {
        if records.is_empty() {
            return Ok(0);
        }
        let mut tx = self.pool.begin().await?;
        for rec in records {
            let res = sqlx::query(
                r#"
                INSERT INTO spot_prices_daily (date, market, metal, price, currency, source)
                VALUES (?, ?, ?, ?, ?, ?)
                ON CONFLICT(date, market, metal)
                DO UPDATE SET
                    price = excluded.price,
                    currency = excluded.currency,
                    source = excluded.source
                "#,
            )
            .bind(rec.date)
            .bind(&rec.market)
            .bind(rec.metal.as_str())
            .bind(rec.price)
            .bind(&rec.currency)
            .bind(&rec.source)
            .execute(&mut *tx)
            .await;

            if let Err(e) = res {
                tx.rollback().await.ok();
                return Err(DataError::BatchAborted(e.to_string()));
            }
        }
        tx.commit().await?;
        info!(table = "spot_prices_daily", count = records.len(), "배치 upsert 완료");
        Ok(records.len() as u64)
    }

    /// ETF 보유량 레코드 배치 upsert.
    pub async fn upsert_etf_holdings(&self, records: &[EtfHoldingRecord]) -> Result<u64> {
        if records.is_empty() {
            return Ok(0);
        }
        let mut tx = self.pool.begin().await?;
        for rec in records {
            let res = sqlx::query(
                r#"
                INSERT INTO etf_holdings_daily
                    (date, symbol, metal, shares, ounces, change, source)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(date, symbol, metal)
                DO UPDATE SET
                    shares = excluded.shares,
                    ounces = excluded.ounces,
                    change = excluded.change,
                    source = excluded.source
                "#,
            )
            .bind(rec.date)
            .bind(&rec.symbol)
            .bind(rec.metal.as_str())
            .bind(rec.shares)
            .bind(rec.ounces)
            .bind(rec.change)
            .bind(&rec.source)
            .execute(&mut *tx)
            .await;

            if let Err(e) = res {
                tx.rollback().await.ok();
                return Err(DataError::BatchAborted(e.to_string()));
            }
        }
        tx.commit().await?;
        info!(table = "etf_holdings_daily", count = records.len(), "배치 upsert 완료");
        Ok(records.len() as u64)
    }

    /// CFTC 포지션 레코드 배치 upsert.
    pub async fn upsert_cftc_positions(&self, records: &[CftcPositionRecord]) -> Result<u64> {
        if records.is_empty() {
            return Ok(0);
        }
        let mut tx = self.pool.begin().await?;
        for rec in records {
            let res = sqlx::query(
                r#"
                INSERT INTO cftc_positions_weekly
                    (report_date, market, metal, non_commercial_long, non_commercial_short,
                     commercial_long, commercial_short, net_position, source)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(report_date, market, metal)
                DO UPDATE SET
                    non_commercial_long = excluded.non_commercial_long,
                    non_commercial_short = excluded.non_commercial_short,
                    commercial_long = excluded.commercial_long,
                    commercial_short = excluded.commercial_short,
                    net_position = excluded.net_position,
                    source = excluded.source
                "#,
            )
            .bind(rec.report_date)
            .bind(&rec.market)
            .bind(rec.metal.as_str())
            .bind(rec.non_commercial_long)
            .bind(rec.non_commercial_short)
            .bind(rec.commercial_long)
            .bind(rec.commercial_short)
            .bind(rec.net_position)
            .bind(&rec.source)
            .execute(&mut *tx)
            .await;

            if let Err(e) = res {
                tx.rollback().await.ok();
                return Err(DataError::BatchAborted(e.to_string()));
            }
        }
        tx.commit().await?;
        info!(table = "cftc_positions_weekly", count = records.len(), "배치 upsert 완료");
        Ok(records.len() as u64)
    }

    /// 계산 지표 레코드 배치 upsert (외부 지표 계산기 전용 경로).
    pub async fn upsert_computed_factors(&self, records: &[ComputedFactorRecord]) -> Result<u64> {
        if records.is_empty() {
            return Ok(0);
        }
        let mut tx = self.pool.begin().await?;
        for rec in records {
            let res = sqlx::query(
                r#"
                INSERT INTO computed_factors (date, metric_type, value, description)
                VALUES (?, ?, ?, ?)
                ON CONFLICT(date, metric_type)
                DO UPDATE SET
                    value = excluded.value,
                    description = excluded.description
                "#,
            )
            .bind(rec.date)
            .bind(&rec.metric_type)
            .bind(rec.value)
            .bind(&rec.description)
            .execute(&mut *tx)
            .await;

            if let Err(e) = res {
                tx.rollback().await.ok();
                return Err(DataError::BatchAborted(e.to_string()));
            }
        }
        tx.commit().await?;
        Ok(records.len() as u64)
    }

    /// 환율 레코드 배치 upsert.
    pub async fn upsert_fx_rates(&self, records: &[FxRateRecord]) -> Result<u64> {
        if records.is_empty() {
            return Ok(0);
        }
        let mut tx = self.pool.begin().await?;
        for rec in records {
            let res = sqlx::query(
                r#"
                INSERT INTO fx_rates_daily (date, pair, rate, source)
                VALUES (?, ?, ?, ?)
                ON CONFLICT(date, pair)
                DO UPDATE SET
                    rate = excluded.rate,
                    source = excluded.source
                "#,
            )
            .bind(rec.date)
            .bind(&rec.pair)
            .bind(rec.rate)
            .bind(&rec.source)
            .execute(&mut *tx)
            .await;

            if let Err(e) = res {
                tx.rollback().await.ok();
                return Err(DataError::BatchAborted(e.to_string()));
            }
        }
        tx.commit().await?;
        Ok(records.len() as u64)
    }

    // --------------------------------------------------------
    // 읽기
    // --------------------------------------------------------

    /// 지정 시장/금속의 최신 현물 가격.
    pub async fn latest_spot(&self, market: &str, metal: Metal) -> Result<Option<SpotPriceRecord>> {
        let row: Option<SpotRow> = sqlx::query_as(
            r#"
            SELECT date, market, metal, price, currency, source
            FROM spot_prices_daily
            WHERE market = ? AND metal = ?
            ORDER BY date DESC LIMIT 1
            "#,
        )
        .bind(market)
        .bind(metal.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.and_then(SpotRow::into_record))
    }

    /// 지정 거래소/금속의 최신 선물 가격.
    pub async fn latest_future(
        &self,
        exchange: &str,
        metal: Metal,
    ) -> Result<Option<FuturePriceRecord>> {
        let row: Option<FutureRow> = sqlx::query_as(
            r#"
            SELECT date, exchange, metal, contract, close_price, open_interest,
                   volume, currency, source
            FROM future_prices_daily
            WHERE exchange = ? AND metal = ?
            ORDER BY date DESC LIMIT 1
            "#,
        )
        .bind(exchange)
        .bind(metal.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.and_then(FutureRow::into_record))
    }

    /// 지정 거래소/금속의 최신 재고 행.
    pub async fn latest_inventory(
        &self,
        exchange: &str,
        metal: Metal,
    ) -> Result<Option<InventoryRecord>> {
        let row: Option<InventoryRow> = sqlx::query_as(
            r#"
            SELECT date, exchange, metal, category, warehouse, inventory, unit, source
            FROM inventory_daily
            WHERE exchange = ? AND metal = ?
            ORDER BY date DESC LIMIT 1
            "#,
        )
        .bind(exchange)
        .bind(metal.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.and_then(InventoryRow::into_record))
    }

    /// 최신 환율.
    pub async fn latest_fx(&self, pair: &str) -> Result<Option<FxRateRecord>> {
        let row: Option<FxRow> = sqlx::query_as(
            r#"
            SELECT date, pair, rate, source
            FROM fx_rates_daily
            WHERE pair = ?
            ORDER BY date DESC LIMIT 1
            "#,
        )
        .bind(pair)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(FxRow::into_record))
    }

    /// 시작일 이후의 현물 가격 행 (오름차순).
    pub async fn spot_prices_since(
        &self,
        market: &str,
        metal: Metal,
        start: NaiveDate,
    ) -> Result<Vec<SpotPriceRecord>> {
        let rows: Vec<SpotRow> = sqlx::query_as(
            r#"
            SELECT date, market, metal, price, currency, source
            FROM spot_prices_daily
            WHERE market = ? AND metal = ? AND date >= ?
            ORDER BY date ASC
            "#,
        )
        .bind(market)
        .bind(metal.as_str())
        .bind(start)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().filter_map(SpotRow::into_record).collect())
    }

    /// ETF 심볼의 저장 행 수 (콜드스타트 판정용).
    pub async fn etf_row_count(&self, symbol: &str) -> Result<i64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(1) FROM etf_holdings_daily WHERE symbol = ?")
                .bind(symbol)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    /// 시계열 셀렉터와 시작일로 관측된 고유 날짜 집합 조회 (공백 탐지용).
    pub async fn distinct_dates(
        &self,
        selector: &SeriesSelector,
        start: NaiveDate,
    ) -> Result<Vec<NaiveDate>> {
        let sql = format!(
            "SELECT DISTINCT {} FROM {} WHERE {} ORDER BY {} ASC",
            selector.date_column,
            selector.table,
            selector.where_clause(),
            selector.date_column,
        );
        debug!(sql = %sql, "고유 날짜 조회");

        let mut query = sqlx::query_as::<_, (NaiveDate,)>(&sql).bind(start);
        for (_, value) in &selector.filters {
            query = query.bind(value);
        }

        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(|(d,)| d).collect())
    }

    /// 지정 날짜에 시계열 관측이 존재하는지 (신선도 점검용).
    pub async fn has_observation_on(
        &self,
        selector: &SeriesSelector,
        date: NaiveDate,
    ) -> Result<bool> {
        let mut sql = format!(
            "SELECT 1 FROM {} WHERE {} = ?",
            selector.table, selector.date_column
        );
        for (col, _) in &selector.filters {
            sql.push_str(&format!(" AND {} = ?", col));
        }
        sql.push_str(" LIMIT 1");

        let mut query = sqlx::query_as::<_, (i64,)>(&sql).bind(date);
        for (_, value) in &selector.filters {
            query = query.bind(value);
        }

        Ok(query.fetch_optional(&self.pool).await?.is_some())
    }
}

/// `sqlite://path?params` URL에서 파일 경로를 떼어 상위 디렉터리 생성.
fn ensure_parent_dir(database_url: &str) {
    let path = database_url
        .strip_prefix("sqlite://")
        .or_else(|| database_url.strip_prefix("sqlite:"))
        .unwrap_or(database_url);
    let path = path.split('?').next().unwrap_or(path);
    if path == ":memory:" || path.is_empty() {
        return;
    }
    if let Some(parent) = std::path::Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).ok();
        }
    }
}

// --------------------------------------------------------
// DB 행 ↔ 도메인 레코드 변환
// --------------------------------------------------------

#[derive(Debug, FromRow)]
struct InventoryRow {
    date: NaiveDate,
    exchange: String,
    metal: String,
    category: Option<String>,
    warehouse: Option<String>,
    inventory: f64,
    unit: Option<String>,
    source: Option<String>,
}

impl InventoryRow {
    fn into_record(self) -> Option<InventoryRecord> {
        let metal = Metal::parse(&self.metal)?;
        let category = match self.category.as_deref() {
            Some("registered") => InventoryCategory::Registered,
            Some("eligible") => InventoryCategory::Eligible,
            Some("pledged") => InventoryCategory::Pledged,
            Some("total") => InventoryCategory::Total,
            Some("warehouse") => InventoryCategory::Warehouse,
            Some("vault_total") => InventoryCategory::VaultTotal,
            Some("delivery_volume") => InventoryCategory::DeliveryVolume,
            _ => return None,
        };
        Some(InventoryRecord {
            date: self.date,
            exchange: self.exchange,
            metal,
            category,
            warehouse: self.warehouse.unwrap_or_default(),
            inventory: self.inventory,
            unit: self.unit.unwrap_or_default(),
            source: self.source.unwrap_or_default(),
        })
    }
}

#[derive(Debug, FromRow)]
struct SpotRow {
    date: NaiveDate,
    market: String,
    metal: String,
    price: f64,
    currency: Option<String>,
    source: Option<String>,
}

impl SpotRow {
    fn into_record(self) -> Option<SpotPriceRecord> {
        Some(SpotPriceRecord {
            date: self.date,
            market: self.market,
            metal: Metal::parse(&self.metal)?,
            price: self.price,
            currency: self.currency.unwrap_or_default(),
            source: self.source.unwrap_or_default(),
        })
    }
}

#[derive(Debug, FromRow)]
struct FutureRow {
    date: NaiveDate,
    exchange: String,
    metal: String,
    contract: String,
    close_price: Option<f64>,
    open_interest: Option<f64>,
    volume: Option<f64>,
    currency: Option<String>,
    source: Option<String>,
}

impl FutureRow {
    fn into_record(self) -> Option<FuturePriceRecord> {
        Some(FuturePriceRecord {
            date: self.date,
            exchange: self.exchange,
            metal: Metal::parse(&self.metal)?,
            contract: self.contract,
            close_price: self.close_price,
            open_interest: self.open_interest,
            volume: self.volume,
            currency: self.currency.unwrap_or_default(),
            source: self.source.unwrap_or_default(),
        })
    }
}

#[derive(Debug, FromRow)]
struct FxRow {
    date: NaiveDate,
    pair: String,
    rate: f64,
    source: Option<String>,
}

impl FxRow {
    fn into_record(self) -> FxRateRecord {
        FxRateRecord {
            date: self.date,
            pair: self.pair,
            rate: self.rate,
            source: self.source.unwrap_or_default(),
        }
    }
}
