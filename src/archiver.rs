use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::{error, info};

use crate::models::ProductRecord;

pub const CSV_HEADERS: [&str; 8] = [
    "number",
    "title",
    "description",
    "bullet_description",
    "price",
    "rating",
    "seller",
    "product_number",
];

/// Somewhere finished artifacts can be written by name.
pub trait Sink {
    fn write(&self, name: &str, bytes: &[u8]) -> Result<PathBuf>;
}

/// Writes files into one directory, creating it on demand.
pub struct DirSink {
    dir: PathBuf,
}

impl DirSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl Sink for DirSink {
    fn write(&self, name: &str, bytes: &[u8]) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(name);
        fs::write(&path, bytes)?;
        Ok(path)
    }
}

/// Fans a write out to several sinks. Succeeds if any child does.
pub struct CompositeSink {
    sinks: Vec<Box<dyn Sink>>,
}

impl CompositeSink {
    pub fn new(sinks: Vec<Box<dyn Sink>>) -> Self {
        Self { sinks }
    }

    pub fn from_dirs<P: AsRef<Path>>(dirs: &[P]) -> Self {
        Self::new(
            dirs.iter()
                .map(|d| Box::new(DirSink::new(d.as_ref())) as Box<dyn Sink>)
                .collect(),
        )
    }
}

impl Sink for CompositeSink {
    fn write(&self, name: &str, bytes: &[u8]) -> Result<PathBuf> {
        let mut first = None;
        for sink in &self.sinks {
            match sink.write(name, bytes) {
                Ok(path) => {
                    first.get_or_insert(path);
                }
                Err(e) => error!("Failed to write {}: {:#}", name, e),
            }
        }
        match first {
            Some(path) => Ok(path),
            None => bail!("no sink accepted {name}"),
        }
    }
}

#[derive(Serialize)]
struct ExportRow<'a> {
    number: String,
    title: Cow<'a, str>,
    description: Cow<'a, str>,
    bullet_description: Cow<'a, str>,
    price: Cow<'a, str>,
    rating: Cow<'a, str>,
    seller: Cow<'a, str>,
    product_number: Cow<'a, str>,
}

impl<'a> ExportRow<'a> {
    /// Row for the CSV file: commas inside cells become semicolons.
    fn for_csv(p: &'a ProductRecord) -> Self {
        Self {
            number: p.sequence_number.to_string(),
            title: no_commas(&p.title),
            description: no_commas(&p.description),
            bullet_description: no_commas(&p.bullet_description),
            price: no_commas(&p.price),
            rating: no_commas(&p.rating),
            seller: no_commas(&p.seller),
            product_number: no_commas(&p.product_number),
        }
    }

    /// Object for the JSON file: text kept verbatim, missing rating shown as N/A.
    fn for_json(p: &'a ProductRecord) -> Self {
        Self {
            number: p.sequence_number.to_string(),
            title: Cow::Borrowed(&p.title),
            description: Cow::Borrowed(&p.description),
            bullet_description: Cow::Borrowed(&p.bullet_description),
            price: Cow::Borrowed(&p.price),
            rating: if p.rating.is_empty() { Cow::Borrowed("N/A") } else { Cow::Borrowed(&p.rating) },
            seller: Cow::Borrowed(&p.seller),
            product_number: Cow::Borrowed(&p.product_number),
        }
    }
}

fn no_commas(text: &str) -> Cow<'_, str> {
    if text.contains(',') {
        Cow::Owned(text.replace(',', ";"))
    } else {
        Cow::Borrowed(text)
    }
}

pub fn to_csv(products: &[ProductRecord]) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(Vec::new());
    // Written explicitly so an empty run still produces a header row.
    writer.write_record(CSV_HEADERS)?;
    for product in products {
        writer.serialize(ExportRow::for_csv(product))?;
    }
    Ok(writer.into_inner().map_err(|e| e.into_error())?)
}

pub fn to_json(products: &[ProductRecord]) -> Result<Vec<u8>> {
    let rows: Vec<_> = products.iter().map(ExportRow::for_json).collect();
    Ok(serde_json::to_string_pretty(&rows)?.into_bytes())
}

pub fn timestamped_name(prefix: &str, stamp: NaiveDateTime, ext: &str) -> String {
    format!("{}_{}.{}", prefix, stamp.format("%Y%m%d_%H%M%S"), ext)
}

#[derive(Debug, Default)]
pub struct SavedFiles {
    pub csv: Option<PathBuf>,
    pub json: Option<PathBuf>,
}

/// Write the CSV and JSON artifacts. Failures are logged, never returned.
pub fn save_products(
    sink: &dyn Sink,
    products: &[ProductRecord],
    prefix: &str,
    stamp: NaiveDateTime,
) -> SavedFiles {
    let csv = write_artifact(sink, &timestamped_name(prefix, stamp, "csv"), to_csv(products));
    if let Some(path) = &csv {
        info!("Data saved to CSV: {}", path.display());
    }
    let json = write_artifact(sink, &timestamped_name(prefix, stamp, "json"), to_json(products));
    if let Some(path) = &json {
        info!("Data saved to JSON: {}", path.display());
    }
    SavedFiles { csv, json }
}

fn write_artifact(sink: &dyn Sink, name: &str, rendered: Result<Vec<u8>>) -> Option<PathBuf> {
    match rendered.and_then(|bytes| sink.write(name, &bytes)) {
        Ok(path) => Some(path),
        Err(e) => {
            error!("Error saving {}: {:#}", name, e);
            None
        }
    }
}
