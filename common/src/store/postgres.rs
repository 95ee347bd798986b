// Postgres store implementations

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgPool;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use super::{SignalFilters, SignalStore, ViewRecordStore};
use crate::signal::{LeverageHint, MarketCategory, Signal, SignalDirection, SignalStatus};

/// Signal records in Postgres.
pub struct PgSignalStore {
    pool: Arc<PgPool>,
}

impl PgSignalStore {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Create the signals table and indexes.
    pub async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS signals (
                id UUID PRIMARY KEY,
                category TEXT NOT NULL,
                symbol TEXT NOT NULL,
                symbol_name TEXT NOT NULL,
                direction TEXT NOT NULL,
                entry_price NUMERIC(20, 8) NOT NULL,
                stop_loss NUMERIC(20, 8),
                tp1 NUMERIC(20, 8),
                tp2 NUMERIC(20, 8),
                tp3 NUMERIC(20, 8),
                leverage_conservative INTEGER,
                leverage_aggressive INTEGER,
                confidence SMALLINT NOT NULL,
                timeframe TEXT NOT NULL,
                rationale TEXT NOT NULL,
                status TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                closed_at TIMESTAMPTZ,
                result_pnl_percent NUMERIC(10, 2)
            );

            CREATE INDEX IF NOT EXISTS idx_signals_symbol_status ON signals(symbol, status);
            CREATE INDEX IF NOT EXISTS idx_signals_created ON signals(created_at);
            "#,
        )
        .execute(self.pool.as_ref())
        .await
        .context("Failed to create signals table")?;

        info!("Signal tables initialized");
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct SignalRow {
    id: Uuid,
    category: String,
    symbol: String,
    symbol_name: String,
    direction: String,
    entry_price: Decimal,
    stop_loss: Option<Decimal>,
    tp1: Option<Decimal>,
    tp2: Option<Decimal>,
    tp3: Option<Decimal>,
    leverage_conservative: Option<i32>,
    leverage_aggressive: Option<i32>,
    confidence: i16,
    timeframe: String,
    rationale: String,
    status: String,
    created_at: DateTime<Utc>,
    closed_at: Option<DateTime<Utc>>,
    result_pnl_percent: Option<Decimal>,
}

impl SignalRow {
    fn into_signal(self) -> Result<Signal> {
        let category = MarketCategory::parse(&self.category)
            .ok_or_else(|| anyhow!("unknown category '{}' for signal {}", self.category, self.id))?;
        let direction = SignalDirection::parse(&self.direction)
            .ok_or_else(|| anyhow!("unknown direction '{}' for signal {}", self.direction, self.id))?;
        let status = SignalStatus::parse(&self.status)
            .ok_or_else(|| anyhow!("unknown status '{}' for signal {}", self.status, self.id))?;
        let leverage = match (self.leverage_conservative, self.leverage_aggressive) {
            (Some(conservative), Some(aggressive)) => Some(LeverageHint {
                conservative: conservative as u32,
                aggressive: aggressive as u32,
            }),
            _ => None,
        };
        let confidence = u8::try_from(self.confidence)
            .map_err(|_| anyhow!("confidence {} out of range for signal {}", self.confidence, self.id))?;

        Ok(Signal {
            id: self.id,
            category,
            symbol: self.symbol,
            symbol_name: self.symbol_name,
            direction,
            entry_price: self.entry_price,
            stop_loss: self.stop_loss,
            take_profits: [self.tp1, self.tp2, self.tp3].into_iter().flatten().collect(),
            leverage,
            confidence,
            timeframe: self.timeframe,
            rationale: self.rationale,
            status,
            created_at: self.created_at,
            closed_at: self.closed_at,
            result_pnl_percent: self.result_pnl_percent,
        })
    }
}

const SIGNAL_COLUMNS: &str = "id, category, symbol, symbol_name, direction, entry_price, \
     stop_loss, tp1, tp2, tp3, leverage_conservative, leverage_aggressive, confidence, \
     timeframe, rationale, status, created_at, closed_at, result_pnl_percent";

#[async_trait::async_trait]
impl SignalStore for PgSignalStore {
    async fn insert(&self, signal: &Signal) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO signals (
                id, category, symbol, symbol_name, direction, entry_price,
                stop_loss, tp1, tp2, tp3, leverage_conservative, leverage_aggressive,
                confidence, timeframe, rationale, status, created_at, closed_at,
                result_pnl_percent
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)
            "#,
        )
        .bind(signal.id)
        .bind(signal.category.as_str())
        .bind(&signal.symbol)
        .bind(&signal.symbol_name)
        .bind(signal.direction.as_str())
        .bind(signal.entry_price)
        .bind(signal.stop_loss)
        .bind(signal.take_profit(1))
        .bind(signal.take_profit(2))
        .bind(signal.take_profit(3))
        .bind(signal.leverage.map(|l| l.conservative as i32))
        .bind(signal.leverage.map(|l| l.aggressive as i32))
        .bind(signal.confidence as i16)
        .bind(&signal.timeframe)
        .bind(&signal.rationale)
        .bind(signal.status.as_str())
        .bind(signal.created_at)
        .bind(signal.closed_at)
        .bind(signal.result_pnl_percent)
        .execute(self.pool.as_ref())
        .await
        .context("Failed to insert signal")?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Signal>> {
        let row = sqlx::query_as::<_, SignalRow>(&format!(
            "SELECT {SIGNAL_COLUMNS} FROM signals WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool.as_ref())
        .await
        .context("Failed to fetch signal")?;

        row.map(SignalRow::into_signal).transpose()
    }

    async fn update(&self, signal: &Signal) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE signals SET
                category = $2, symbol = $3, symbol_name = $4, direction = $5,
                entry_price = $6, stop_loss = $7, tp1 = $8, tp2 = $9, tp3 = $10,
                leverage_conservative = $11, leverage_aggressive = $12, confidence = $13,
                timeframe = $14, rationale = $15, status = $16, created_at = $17,
                closed_at = $18, result_pnl_percent = $19
            WHERE id = $1
            "#,
        )
        .bind(signal.id)
        .bind(signal.category.as_str())
        .bind(&signal.symbol)
        .bind(&signal.symbol_name)
        .bind(signal.direction.as_str())
        .bind(signal.entry_price)
        .bind(signal.stop_loss)
        .bind(signal.take_profit(1))
        .bind(signal.take_profit(2))
        .bind(signal.take_profit(3))
        .bind(signal.leverage.map(|l| l.conservative as i32))
        .bind(signal.leverage.map(|l| l.aggressive as i32))
        .bind(signal.confidence as i16)
        .bind(&signal.timeframe)
        .bind(&signal.rationale)
        .bind(signal.status.as_str())
        .bind(signal.created_at)
        .bind(signal.closed_at)
        .bind(signal.result_pnl_percent)
        .execute(self.pool.as_ref())
        .await
        .context("Failed to update signal")?;

        if result.rows_affected() == 0 {
            anyhow::bail!("update of unknown signal {}", signal.id);
        }
        Ok(())
    }

    async fn list(&self, filters: &SignalFilters) -> Result<Vec<Signal>> {
        let rows = sqlx::query_as::<_, SignalRow>(&format!(
            r#"
            SELECT {SIGNAL_COLUMNS} FROM signals
            WHERE ($1::text IS NULL OR category = $1)
              AND ($2::text IS NULL OR symbol = $2)
              AND ($3::text IS NULL OR status = $3)
              AND ($4::timestamptz IS NULL OR created_at >= $4)
              AND ($5::timestamptz IS NULL OR created_at <= $5)
            ORDER BY created_at DESC
            LIMIT $6
            "#
        ))
        .bind(filters.category.map(|c| c.as_str()))
        .bind(filters.symbol.as_deref())
        .bind(filters.status.map(|s| s.as_str()))
        .bind(filters.created_after)
        .bind(filters.created_before)
        .bind(filters.limit.map(|l| l as i64))
        .fetch_all(self.pool.as_ref())
        .await
        .context("Failed to list signals")?;

        rows.into_iter().map(SignalRow::into_signal).collect()
    }

    async fn list_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<Signal>> {
        let rows = sqlx::query_as::<_, SignalRow>(&format!(
            r#"
            SELECT {SIGNAL_COLUMNS} FROM signals
            WHERE created_at >= $1 AND created_at <= $2
            ORDER BY created_at DESC
            "#
        ))
        .bind(start)
        .bind(end)
        .fetch_all(self.pool.as_ref())
        .await
        .context("Failed to list signals by range")?;

        rows.into_iter().map(SignalRow::into_signal).collect()
    }
}

/// View identity records in Postgres. The primary key enforces the
/// per-(viewer, day, signal) atomicity that quota idempotence requires.
pub struct PgViewRecordStore {
    pool: Arc<PgPool>,
}

impl PgViewRecordStore {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    pub async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS signal_views (
                viewer_id UUID NOT NULL,
                view_date DATE NOT NULL,
                signal_id UUID NOT NULL,
                seen_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                PRIMARY KEY (viewer_id, view_date, signal_id)
            );
            "#,
        )
        .execute(self.pool.as_ref())
        .await
        .context("Failed to create signal_views table")?;

        info!("View record tables initialized");
        Ok(())
    }
}

#[async_trait::async_trait]
impl ViewRecordStore for PgViewRecordStore {
    async fn record(&self, viewer_id: Uuid, day: NaiveDate, signal_id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO signal_views (viewer_id, view_date, signal_id)
            VALUES ($1, $2, $3)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(viewer_id)
        .bind(day)
        .bind(signal_id)
        .execute(self.pool.as_ref())
        .await
        .context("Failed to record signal view")?;

        Ok(result.rows_affected() > 0)
    }

    async fn count(&self, viewer_id: Uuid, day: NaiveDate) -> Result<u32> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM signal_views WHERE viewer_id = $1 AND view_date = $2",
        )
        .bind(viewer_id)
        .bind(day)
        .fetch_one(self.pool.as_ref())
        .await
        .context("Failed to count signal views")?;

        Ok(count as u32)
    }
}
