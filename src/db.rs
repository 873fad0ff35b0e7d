use std::time::Duration;

use anyhow::Result;
use rusqlite::{Connection, OptionalExtension};
use serde_json::Value;

use crate::classify::record::{DetailRecord, PageOutcome, SiteInfoRecord};

const DB_PATH: &str = "data/lots.sqlite";
const BUSY_RETRIES: u32 = 3;

pub fn connect() -> Result<Connection> {
    std::fs::create_dir_all("data")?;
    let conn = Connection::open(DB_PATH)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS listings (
            id            INTEGER PRIMARY KEY,
            url           TEXT UNIQUE,
            vin           TEXT,
            brand         TEXT,
            model         TEXT,
            year          INTEGER,
            price_value   REAL,
            price_raw     TEXT,
            currency      TEXT,
            mileage_value INTEGER,
            mileage_unit  TEXT,
            fuel          TEXT,
            transmission  TEXT,
            description   TEXT,
            source        TEXT,
            confidence    REAL,
            raw           TEXT,
            sample        TEXT,
            scraped_at    TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at    TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE UNIQUE INDEX IF NOT EXISTS idx_listings_vin
            ON listings(vin) WHERE vin IS NOT NULL;
        CREATE INDEX IF NOT EXISTS idx_listings_brand ON listings(brand);

        CREATE TABLE IF NOT EXISTS site_info (
            host       TEXT PRIMARY KEY,
            name       TEXT,
            telephone  TEXT,
            email      TEXT,
            address    TEXT,
            raw        TEXT,
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- Classification log: one row per classified document
        CREATE TABLE IF NOT EXISTS samples (
            id            INTEGER PRIMARY KEY,
            sample        TEXT NOT NULL,
            url           TEXT NOT NULL,
            category      TEXT NOT NULL,
            strategy      TEXT,
            outcome       TEXT,
            classified_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_samples_category ON samples(category);
        ",
    )?;
    Ok(())
}

// ── Listings ──

/// Per-record store outcome. A failed write is reported here, never
/// raised, so one bad record cannot abort a batch.
#[derive(Debug)]
pub struct StoreResult {
    pub ok: bool,
    pub inserted: bool,
    pub error: Option<String>,
}

fn vin_of(record: &DetailRecord) -> Option<String> {
    record
        .extras
        .get("vin")
        .or_else(|| {
            record
                .raw
                .as_ref()
                .and_then(|raw| raw.get("vin").or_else(|| raw.get("vehicleIdentificationNumber")))
        })
        .and_then(Value::as_str)
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
}

/// Upsert one extracted listing, keyed by URL when present, VIN
/// otherwise. Retries briefly on a busy database.
pub fn upsert_listing(
    conn: &Connection,
    url: Option<&str>,
    sample: &str,
    record: &DetailRecord,
) -> StoreResult {
    let vin = vin_of(record);
    if url.is_none() && vin.is_none() {
        return StoreResult {
            ok: false,
            inserted: false,
            error: Some("record has neither url nor vin".to_string()),
        };
    }

    for attempt in 0..BUSY_RETRIES {
        match try_upsert(conn, url, vin.as_deref(), sample, record) {
            Ok(inserted) => {
                return StoreResult {
                    ok: true,
                    inserted,
                    error: None,
                }
            }
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::DatabaseBusy && attempt + 1 < BUSY_RETRIES =>
            {
                std::thread::sleep(Duration::from_millis(50 * (attempt as u64 + 1)));
            }
            Err(e) => {
                return StoreResult {
                    ok: false,
                    inserted: false,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    StoreResult {
        ok: false,
        inserted: false,
        error: Some("database busy".to_string()),
    }
}

fn try_upsert(
    conn: &Connection,
    url: Option<&str>,
    vin: Option<&str>,
    sample: &str,
    record: &DetailRecord,
) -> std::result::Result<bool, rusqlite::Error> {
    let raw = record
        .raw
        .as_ref()
        .map(|v| v.to_string());

    let (key_column, key): (&str, &str) = match (url, vin) {
        (Some(u), _) => ("url", u),
        (None, Some(v)) => ("vin", v),
        (None, None) => unreachable!("caller checked"),
    };

    let existing: Option<i64> = conn
        .query_row(
            &format!("SELECT id FROM listings WHERE {} = ?1", key_column),
            [key],
            |r| r.get(0),
        )
        .optional()?;

    match existing {
        Some(id) => {
            conn.execute(
                "UPDATE listings SET
                    url = COALESCE(?1, url), vin = COALESCE(?2, vin),
                    brand = ?3, model = ?4, year = ?5,
                    price_value = ?6, price_raw = ?7, currency = ?8,
                    mileage_value = ?9, mileage_unit = ?10,
                    fuel = ?11, transmission = ?12, description = ?13,
                    source = ?14, confidence = ?15, raw = ?16, sample = ?17,
                    updated_at = datetime('now')
                 WHERE id = ?18",
                rusqlite::params![
                    url, vin, record.brand, record.model, record.year,
                    record.price_value, record.price_raw, record.currency,
                    record.mileage_value, record.mileage_unit,
                    record.fuel, record.transmission, record.description,
                    record.source, record.confidence, raw, sample, id,
                ],
            )?;
            Ok(false)
        }
        None => {
            conn.execute(
                "INSERT INTO listings
                    (url, vin, brand, model, year, price_value, price_raw, currency,
                     mileage_value, mileage_unit, fuel, transmission, description,
                     source, confidence, raw, sample)
                 VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17)",
                rusqlite::params![
                    url, vin, record.brand, record.model, record.year,
                    record.price_value, record.price_raw, record.currency,
                    record.mileage_value, record.mileage_unit,
                    record.fuel, record.transmission, record.description,
                    record.source, record.confidence, raw, sample,
                ],
            )?;
            Ok(true)
        }
    }
}

// ── Site info ──

pub fn upsert_site_info(conn: &Connection, host: &str, info: &SiteInfoRecord) -> Result<()> {
    let raw = info.raw.as_ref().map(|v| v.to_string());
    conn.execute(
        "INSERT INTO site_info (host, name, telephone, email, address, raw)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(host) DO UPDATE SET
            name = excluded.name, telephone = excluded.telephone,
            email = excluded.email, address = excluded.address,
            raw = excluded.raw, updated_at = datetime('now')",
        rusqlite::params![host, info.name, info.telephone, info.email, info.address, raw],
    )?;
    Ok(())
}

// ── Classification log ──

pub fn log_outcome(conn: &Connection, url: &str, outcome: &PageOutcome) -> Result<()> {
    let payload = serde_json::to_string(outcome)?;
    conn.execute(
        "INSERT INTO samples (sample, url, category, strategy, outcome)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![
            outcome.sample_id,
            url,
            outcome.category.as_str(),
            outcome.strategy_name,
            payload,
        ],
    )?;
    Ok(())
}

// ── Overview ──

pub struct OverviewRow {
    pub url: String,
    pub brand: String,
    pub model: String,
    pub year: Option<i32>,
    pub price_value: Option<f64>,
    pub currency: String,
    pub mileage_value: Option<i64>,
    pub confidence: f64,
    pub source: String,
}

pub fn fetch_overview(
    conn: &Connection,
    brand: Option<&str>,
    limit: usize,
) -> Result<Vec<OverviewRow>> {
    let mut conditions = Vec::new();
    let mut params: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

    if let Some(b) = brand {
        conditions.push(format!("brand = ?{}", params.len() + 1));
        params.push(Box::new(b.to_string()));
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    };

    let sql = format!(
        "SELECT COALESCE(url,''), COALESCE(brand,''), COALESCE(model,''),
                year, price_value, COALESCE(currency,''),
                mileage_value, COALESCE(confidence, 0), COALESCE(source,'')
         FROM listings{}
         ORDER BY updated_at DESC, id
         LIMIT {}",
        where_clause, limit
    );

    let mut stmt = conn.prepare(&sql)?;
    let param_refs: Vec<&dyn rusqlite::types::ToSql> = params.iter().map(|p| p.as_ref()).collect();
    let rows = stmt
        .query_map(param_refs.as_slice(), |row| {
            Ok(OverviewRow {
                url: row.get(0)?,
                brand: row.get(1)?,
                model: row.get(2)?,
                year: row.get(3)?,
                price_value: row.get(4)?,
                currency: row.get(5)?,
                mileage_value: row.get(6)?,
                confidence: row.get(7)?,
                source: row.get(8)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ── Stats ──

pub struct Stats {
    pub listings: usize,
    pub with_price: usize,
    pub with_vin: usize,
    pub site_info: usize,
    pub samples: usize,
    pub detail_samples: usize,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let listings: usize = conn.query_row("SELECT COUNT(*) FROM listings", [], |r| r.get(0))?;
    let with_price: usize = conn.query_row(
        "SELECT COUNT(*) FROM listings WHERE price_value IS NOT NULL",
        [],
        |r| r.get(0),
    )?;
    let with_vin: usize = conn.query_row(
        "SELECT COUNT(*) FROM listings WHERE vin IS NOT NULL",
        [],
        |r| r.get(0),
    )?;
    let site_info: usize = conn.query_row("SELECT COUNT(*) FROM site_info", [], |r| r.get(0))?;
    let samples: usize = conn.query_row("SELECT COUNT(*) FROM samples", [], |r| r.get(0))?;
    let detail_samples: usize = conn.query_row(
        "SELECT COUNT(*) FROM samples WHERE category = 'detail'",
        [],
        |r| r.get(0),
    )?;
    Ok(Stats {
        listings,
        with_price,
        with_vin,
        site_info,
        samples,
        detail_samples,
    })
}
