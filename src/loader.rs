//! Loads a scraped CSV into the `products` table of a SQLite database.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Context, Result, bail};
use rusqlite::{Connection, params};
use serde::Deserialize;
use tracing::{debug, info, warn};

const SCHEMA: &str = "
DROP TABLE IF EXISTS products;
CREATE TABLE products (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    description TEXT,
    bullet_description TEXT,
    price DECIMAL(10,2),
    rating DECIMAL(3,1),
    seller TEXT,
    product_number TEXT
);
";

#[derive(Debug, Deserialize)]
struct CsvRow {
    title: String,
    description: String,
    bullet_description: String,
    price: String,
    rating: String,
    seller: String,
    product_number: String,
}

#[derive(Debug)]
pub struct LoadReport {
    pub source: PathBuf,
    pub added: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredProduct {
    pub id: i64,
    pub title: String,
    pub price: f64,
    pub rating: f64,
    pub seller: String,
    pub bullet_description: String,
}

/// Parse a price or rating as written by the scraper, e.g. `$12;999.00`.
/// Anything unparseable counts as zero.
pub fn clean_decimal(raw: &str) -> f64 {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, '$' | ',' | ';') && !c.is_whitespace())
        .collect();
    cleaned.parse().unwrap_or(0.0)
}

/// Newest `<prefix>_*.csv` in `dir` by creation time.
pub fn find_latest_csv(dir: &Path, prefix: &str) -> Result<PathBuf> {
    let stem = format!("{prefix}_");
    let mut newest: Option<(SystemTime, PathBuf)> = None;
    let mut seen = Vec::new();

    for entry in fs::read_dir(dir).with_context(|| format!("reading {}", dir.display()))? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        seen.push(name.clone());
        if !(name.starts_with(&stem) && name.ends_with(".csv")) {
            continue;
        }
        let meta = entry.metadata()?;
        let created = meta.created().or_else(|_| meta.modified())?;
        if newest.as_ref().is_none_or(|(t, _)| created > *t) {
            newest = Some((created, entry.path()));
        }
    }

    match newest {
        Some((_, path)) => Ok(path),
        None => {
            debug!("Directory contents: {:?}", seen);
            bail!("no {}*.csv files found in {}", stem, dir.display())
        }
    }
}

/// Drop and recreate the `products` table.
pub fn rebuild_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

/// Rebuild the table and fill it from `csv_path`. Bad rows are logged and skipped.
pub fn load_csv(conn: &mut Connection, csv_path: &Path) -> Result<LoadReport> {
    rebuild_table(conn)?;
    info!("Opening CSV file: {}", csv_path.display());

    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("opening {}", csv_path.display()))?;
    debug!("CSV headers: {:?}", reader.headers()?);

    let tx = conn.transaction()?;
    let mut added = 0;
    let mut skipped = 0;
    {
        let mut insert = tx.prepare(
            "INSERT INTO products
             (title, description, bullet_description, price, rating, seller, product_number)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )?;

        for (line, result) in reader.deserialize::<CsvRow>().enumerate() {
            let row = match result {
                Ok(row) => row,
                Err(e) => {
                    warn!("Error processing row {}: {}", line + 1, e);
                    skipped += 1;
                    continue;
                }
            };

            let inserted = insert.execute(params![
                row.title,
                row.description,
                row.bullet_description,
                clean_decimal(&row.price),
                clean_decimal(&row.rating),
                row.seller,
                row.product_number,
            ]);
            match inserted {
                Ok(_) => {
                    added += 1;
                    if added % 10 == 0 {
                        info!("Added {} products...", added);
                    }
                }
                Err(e) => {
                    warn!("Error processing row {}: {:?}: {}", line + 1, row, e);
                    skipped += 1;
                }
            }
        }
    }
    tx.commit()?;

    info!("Successfully added {} products to the database", added);
    Ok(LoadReport {
        source: csv_path.to_path_buf(),
        added,
        skipped,
    })
}

pub fn count_products(conn: &Connection) -> Result<i64> {
    Ok(conn.query_row("SELECT COUNT(*) FROM products", [], |row| row.get(0))?)
}

pub fn sample_products(conn: &Connection, limit: usize) -> Result<Vec<StoredProduct>> {
    let mut stmt = conn.prepare(
        "SELECT id, title, price, rating, seller, bullet_description FROM products ORDER BY id LIMIT ?1",
    )?;
    let rows = stmt.query_map([limit as i64], |row| {
        Ok(StoredProduct {
            id: row.get(0)?,
            title: row.get(1)?,
            price: row.get(2)?,
            rating: row.get(3)?,
            seller: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
            bullet_description: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
        })
    })?;
    Ok(rows.collect::<Result<_, _>>()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;
    use tempfile::tempdir;

    const HEADER: &str = "number,title,description,bullet_description,price,rating,seller,product_number\n";

    fn columns(conn: &Connection) -> Vec<String> {
        let mut stmt = conn.prepare("PRAGMA table_info(products)").unwrap();
        stmt.query_map([], |row| row.get::<_, String>(1))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap()
    }

    #[test]
    fn test_clean_decimal() {
        assert_eq!(clean_decimal("$12,999.00"), 12999.0);
        assert_eq!(clean_decimal("$12;999.00"), 12999.0);
        assert_eq!(clean_decimal(" 4.5 "), 4.5);
        assert_eq!(clean_decimal(""), 0.0);
        assert_eq!(clean_decimal("N/A"), 0.0);
    }

    #[test]
    fn test_load_converts_price_and_rating() {
        let tmp = tempdir().unwrap();
        let csv_path = tmp.path().join("newegg_products_20240101_000000.csv");
        fs::write(
            &csv_path,
            format!(
                "{HEADER}1,Laptop; 16GB,Thin,Fast charging cable,$12;999.00,4.5,Newegg,N1\n\
                 2,Mouse,,,,,Logitech,N2\n"
            ),
        )
        .unwrap();

        let mut conn = Connection::open(tmp.path().join("test.db")).unwrap();
        let report = load_csv(&mut conn, &csv_path).unwrap();
        assert_eq!(report.added, 2);
        assert_eq!(report.skipped, 0);
        assert_eq!(count_products(&conn).unwrap(), 2);

        let sample = sample_products(&conn, 5).unwrap();
        assert_eq!(sample[0].id, 1);
        assert_eq!(sample[0].title, "Laptop; 16GB");
        assert_eq!(sample[0].price, 12999.0);
        assert_eq!(sample[0].rating, 4.5);
        assert_eq!(sample[1].price, 0.0);
        assert_eq!(sample[1].rating, 0.0);
        assert_eq!(sample[1].seller, "Logitech");
    }

    #[test]
    fn test_header_only_csv_gives_empty_table() {
        let tmp = tempdir().unwrap();
        let csv_path = tmp.path().join("newegg_products_20240101_000000.csv");
        fs::write(&csv_path, HEADER).unwrap();

        let mut conn = Connection::open_in_memory().unwrap();
        let report = load_csv(&mut conn, &csv_path).unwrap();
        assert_eq!(report.added, 0);
        assert_eq!(count_products(&conn).unwrap(), 0);
        assert_eq!(
            columns(&conn),
            [
                "id",
                "title",
                "description",
                "bullet_description",
                "price",
                "rating",
                "seller",
                "product_number"
            ]
        );
    }

    #[test]
    fn test_reload_replaces_rows() {
        let tmp = tempdir().unwrap();
        let csv_path = tmp.path().join("newegg_products_1.csv");
        fs::write(&csv_path, format!("{HEADER}1,A,,,1,1,S,P\n")).unwrap();

        let mut conn = Connection::open_in_memory().unwrap();
        load_csv(&mut conn, &csv_path).unwrap();
        load_csv(&mut conn, &csv_path).unwrap();
        assert_eq!(count_products(&conn).unwrap(), 1);
        assert_eq!(sample_products(&conn, 5).unwrap()[0].id, 1);
    }

    #[test]
    fn test_bad_rows_are_skipped() {
        let tmp = tempdir().unwrap();
        let csv_path = tmp.path().join("newegg_products_1.csv");
        fs::write(
            &csv_path,
            format!("{HEADER}1,Good,,,1,1,S,P1\n2,Short row\n3,Also good,,,2,2,S,P3\n"),
        )
        .unwrap();

        let mut conn = Connection::open_in_memory().unwrap();
        let report = load_csv(&mut conn, &csv_path).unwrap();
        assert_eq!(report.added, 2);
        assert_eq!(report.skipped, 1);
    }

    #[test]
    fn test_find_latest_csv() {
        let tmp = tempdir().unwrap();
        fs::write(tmp.path().join("newegg_products_20240101_000000.csv"), HEADER).unwrap();
        fs::write(tmp.path().join("newegg_products_20240101_000000.json"), "[]").unwrap();
        fs::write(tmp.path().join("other_20250101_000000.csv"), HEADER).unwrap();
        thread::sleep(Duration::from_millis(50));
        fs::write(tmp.path().join("newegg_products_20240202_000000.csv"), HEADER).unwrap();

        let latest = find_latest_csv(tmp.path(), "newegg_products").unwrap();
        assert_eq!(latest, tmp.path().join("newegg_products_20240202_000000.csv"));
    }

    #[test]
    fn test_find_latest_csv_none() {
        let tmp = tempdir().unwrap();
        fs::write(tmp.path().join("notes.txt"), "x").unwrap();
        assert!(find_latest_csv(tmp.path(), "newegg_products").is_err());
    }
}
