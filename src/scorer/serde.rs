use std::{fs::File, io::{BufReader, BufWriter, Read, Write}, path::Path};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{CiderError, Result};
use crate::scorer::{
    corpus::DocumentFrequency,
    ngram::{NGram, MAX_ORDER},
};

/// Persisted form of a [`DocumentFrequency`] table
/// {order -> {ngram -> document count}} plus the document total.
///
/// N-grams are stored as token arrays, so the per-order maps are written as
/// `[ngram, count]` pair sequences (JSON map keys must be strings).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentFrequencyData {
    pub total_documents: u64,
    pub orders: Vec<OrderTable>,
}

/// Document counts of one n-gram order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderTable {
    pub order: usize,
    #[serde(with = "indexmap::map::serde_seq")]
    pub counts: IndexMap<NGram, u64>,
}

/// On-disk encoding of a table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Cbor,
    Json,
}

impl TableFormat {
    /// `.json` selects JSON, anything else CBOR
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => TableFormat::Json,
            _ => TableFormat::Cbor,
        }
    }
}

impl From<&DocumentFrequency> for DocumentFrequencyData {
    fn from(table: &DocumentFrequency) -> Self {
        Self {
            total_documents: table.total_documents,
            orders: table
                .orders
                .iter()
                .enumerate()
                .map(|(i, counts)| OrderTable {
                    order: i + 1,
                    counts: counts.clone(),
                })
                .collect(),
        }
    }
}

impl DocumentFrequencyData {
    /// Convert back into a table, checking the table invariants
    pub fn into_document_frequency(self) -> Result<DocumentFrequency> {
        // order は 1 始まり、確保前に範囲を確認
        if let Some(bad) = self.orders.iter().find(|t| !(1..=MAX_ORDER).contains(&t.order)) {
            return Err(CiderError::MalformedTable(format!(
                "order {} is outside 1..={MAX_ORDER}",
                bad.order
            )));
        }
        let max_order = self.orders.iter().map(|t| t.order).max().unwrap_or(0);
        let mut table = DocumentFrequency::new(max_order);
        table.total_documents = self.total_documents;
        for OrderTable { order, counts } in self.orders {
            let Some(slot) = order.checked_sub(1).and_then(|i| table.orders.get_mut(i)) else {
                return Err(CiderError::MalformedTable(format!("order {order} is not valid")));
            };
            if !slot.is_empty() {
                return Err(CiderError::MalformedTable(format!("order {order} listed twice")));
            }
            *slot = counts;
        }
        table.validate()?;
        Ok(table)
    }
}

impl Serialize for DocumentFrequency {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        DocumentFrequencyData::from(self).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for DocumentFrequency {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        DocumentFrequencyData::deserialize(deserializer)?
            .into_document_frequency()
            .map_err(serde::de::Error::custom)
    }
}

/// Persistence
impl DocumentFrequency {
    /// Write the table as CBOR
    pub fn to_writer<W: Write>(&self, writer: W) -> Result<()> {
        serde_cbor::to_writer(writer, &DocumentFrequencyData::from(self))?;
        Ok(())
    }

    /// Read a CBOR table
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let data: DocumentFrequencyData = serde_cbor::from_reader(reader)?;
        data.into_document_frequency()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&DocumentFrequencyData::from(self))?)
    }

    pub fn from_json(s: &str) -> Result<Self> {
        let data: DocumentFrequencyData = serde_json::from_str(s)?;
        data.into_document_frequency()
    }

    /// Save to `path`, format picked from the extension
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| CiderError::io(path, e))?;
        let mut writer = BufWriter::new(file);
        match TableFormat::from_path(path) {
            TableFormat::Cbor => self.to_writer(&mut writer)?,
            TableFormat::Json => {
                serde_json::to_writer(&mut writer, &DocumentFrequencyData::from(self))?
            }
        }
        writer.flush().map_err(|e| CiderError::io(path, e))?;
        info!(
            path = %path.display(),
            documents = self.total_documents,
            ngrams = self.vocab_size(),
            "saved document frequency table"
        );
        Ok(())
    }

    /// Load from `path`, format picked from the extension
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| CiderError::io(path, e))?;
        let reader = BufReader::new(file);
        let table = match TableFormat::from_path(path) {
            TableFormat::Cbor => Self::from_reader(reader)?,
            TableFormat::Json => {
                let data: DocumentFrequencyData = serde_json::from_reader(reader)?;
                data.into_document_frequency()?
            }
        };
        debug!(
            path = %path.display(),
            documents = table.total_documents,
            max_order = table.max_order(),
            "loaded document frequency table"
        );
        Ok(table)
    }
}
