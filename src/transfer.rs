// Copyright 2026 Agrimatch Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::collections::HashSet;
use std::io::BufRead;
use std::io::BufReader;
use std::io::Write;

use anyhow::Context;
use anyhow::Result;

use crate::model::Listing;
use crate::store::Store;

/// Demo catalog: the marketplace's featured properties and jobs.
const SEED_CATALOG: &str = include_str!("../data/seed.jsonl");

#[derive(Debug)]
pub struct TransferStats {
    pub listings: usize,
}

pub fn export_listings(store: &Store, mut writer: impl Write) -> Result<TransferStats> {
    let mut listings = 0usize;
    for listing in store.snapshot()? {
        let line = serde_json::to_string(&listing)?;
        writeln!(writer, "{}", line)?;
        listings += 1;
    }
    Ok(TransferStats { listings })
}

/// Parses JSONL listings. Every line is validated and ids must be unique
/// within the input.
pub fn parse_listings(reader: impl std::io::Read) -> Result<Vec<Listing>> {
    let mut buf = BufReader::new(reader);
    let mut out = Vec::new();
    let mut seen = HashSet::new();
    let mut line = String::new();
    let mut line_no = 0usize;
    loop {
        line.clear();
        let bytes = buf.read_line(&mut line)?;
        if bytes == 0 {
            break;
        }
        line_no += 1;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let listing: Listing = serde_json::from_str(trimmed)
            .with_context(|| format!("parse listing on line {line_no}"))?;
        listing
            .validate()
            .with_context(|| format!("invalid listing on line {line_no}"))?;
        if !seen.insert(listing.id.clone()) {
            anyhow::bail!("duplicate listing id {} on line {line_no}", listing.id);
        }
        out.push(listing);
    }
    Ok(out)
}

pub fn import_listings(store: &Store, reader: impl std::io::Read) -> Result<TransferStats> {
    let listings = parse_listings(reader)?;
    write_all(store, &listings)?;
    tracing::info!(listings = listings.len(), "imported listings");
    Ok(TransferStats {
        listings: listings.len(),
    })
}

pub fn seed_catalog() -> Result<Vec<Listing>> {
    parse_listings(SEED_CATALOG.as_bytes()).context("parse built-in catalog")
}

pub fn import_seed(store: &Store) -> Result<TransferStats> {
    let listings = seed_catalog()?;
    write_all(store, &listings)?;
    tracing::info!(listings = listings.len(), "seeded demo catalog");
    Ok(TransferStats {
        listings: listings.len(),
    })
}

fn write_all(store: &Store, listings: &[Listing]) -> Result<()> {
    store.conn.execute_batch("BEGIN IMMEDIATE")?;
    let res = listings
        .iter()
        .try_for_each(|listing| store.upsert_listing(listing));
    if res.is_err() {
        store.conn.execute_batch("ROLLBACK")?;
        return res;
    }
    store.conn.execute_batch("COMMIT")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;
    use crate::model::ListingKind;
    use crate::model::fixtures::listing;
    use crate::store::StoreMode;

    #[test]
    fn seed_catalog_is_valid() -> Result<()> {
        let listings = seed_catalog()?;
        assert_eq!(listings.len(), 11);
        assert_eq!(
            listings
                .iter()
                .filter(|l| l.kind == ListingKind::Job)
                .count(),
            3
        );
        Ok(())
    }

    #[test]
    fn parse_rejects_duplicate_ids() {
        let input = "{\"id\":\"1\",\"title\":\"A\",\"location\":\"X\",\"region\":\"R\",\"price\":1,\"size\":1,\"category\":\"Cropland\"}\n\n{\"id\":\"1\",\"title\":\"B\",\"location\":\"Y\",\"region\":\"R\",\"price\":2,\"size\":2,\"category\":\"Cropland\"}\n";
        let err = parse_listings(input.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("duplicate listing id 1 on line 3"));
    }

    #[test]
    fn parse_rejects_out_of_range_relevance() {
        let input = "{\"id\":\"1\",\"title\":\"A\",\"location\":\"X\",\"region\":\"R\",\"price\":1,\"size\":1,\"category\":\"Cropland\",\"relevance\":120}\n";
        let err = parse_listings(input.as_bytes()).unwrap_err();
        assert!(format!("{err:#}").contains("relevance 120"));
    }

    #[test]
    fn export_round_trips_through_store() -> Result<()> {
        let dir = tempdir()?;
        let db_path = dir.path().join("agrimatch.db");
        Store::init(&db_path)?;
        let store = Store::open(&db_path, StoreMode::ReadWrite)?;
        let seeded = import_seed(&store)?;

        let mut out = Vec::new();
        let exported = export_listings(&store, &mut out)?;
        assert_eq!(exported.listings, seeded.listings);

        let reparsed = parse_listings(out.as_slice())?;
        assert_eq!(reparsed, seed_catalog()?);
        Ok(())
    }

    #[test]
    fn failed_upsert_rolls_back_the_whole_batch() -> Result<()> {
        let dir = tempdir()?;
        let db_path = dir.path().join("agrimatch.db");
        Store::init(&db_path)?;
        let store = Store::open(&db_path, StoreMode::ReadWrite)?;
        store.upsert_listing(&listing("kept"))?;
        store.conn.execute_batch(
            "CREATE TRIGGER reject_broken BEFORE INSERT ON listing WHEN NEW.id = 'broken'
             BEGIN SELECT RAISE(ABORT, 'listing rejected'); END;",
        )?;

        let batch = [listing("first"), listing("broken"), listing("last")];
        let err = write_all(&store, &batch).unwrap_err();
        assert!(format!("{err:#}").contains("listing rejected"));

        let ids: Vec<String> = store.snapshot()?.into_iter().map(|l| l.id).collect();
        assert_eq!(ids, vec!["kept"]);

        write_all(&store, &[listing("after")])?;
        assert_eq!(store.snapshot()?.len(), 2);
        Ok(())
    }
}
