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

use anyhow::Result;
use serde::Serialize;
use serde_json::Value;

use crate::model::Listing;

#[derive(Debug, Clone, Serialize, Default)]
pub struct StatsOut {
    pub took_ms: i64,
    pub total_hits: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listing_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind_counts: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_filters: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saved_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_views: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_size_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_counts: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub integrity: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryOut {
    pub text: String,
    pub filters: Option<String>,
    pub sort: String,
    pub limit: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorOut {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct JsonResponse {
    pub ok: bool,
    pub schema_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<QueryOut>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explain: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<StatsOut>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorOut>,
}

impl JsonResponse {
    pub fn ok() -> Self {
        Self {
            ok: true,
            schema_version: "1".to_string(),
            ..Default::default()
        }
    }

    pub fn error(code: &str, message: &str) -> Self {
        Self {
            ok: false,
            schema_version: "1".to_string(),
            error: Some(ErrorOut {
                code: code.to_string(),
                message: message.to_string(),
            }),
            ..Default::default()
        }
    }

    pub fn with_query(
        mut self,
        text: &str,
        filters: Option<String>,
        sort: &str,
        limit: usize,
    ) -> Self {
        self.query = Some(QueryOut {
            text: text.to_string(),
            filters,
            sort: sort.to_string(),
            limit: limit as i64,
        });
        self
    }

    pub fn with_results(mut self, results: Vec<Value>) -> Self {
        self.results = Some(results);
        self
    }

    pub fn with_explain(mut self, explain: Value) -> Self {
        self.explain = Some(explain);
        self
    }

    pub fn with_stats(mut self, stats: StatsOut) -> Self {
        self.stats = Some(stats);
        self
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings = warnings;
        self
    }
}

/// Listings as result rows, ranked from 1.
pub fn listing_results(listings: &[&Listing]) -> Result<Vec<Value>> {
    listings
        .iter()
        .enumerate()
        .map(|(idx, listing)| {
            let mut value = serde_json::to_value(listing)?;
            if let Value::Object(map) = &mut value {
                map.insert("rank".to_string(), Value::from(idx + 1));
            }
            Ok(value)
        })
        .collect()
}

pub fn print_json(resp: &JsonResponse) -> Result<()> {
    let text = serde_json::to_string_pretty(resp)?;
    println!("{text}");
    Ok(())
}

/// Plain-text row for browse and saved listings.
pub fn print_listing_table(listings: &[&Listing]) {
    for (idx, listing) in listings.iter().enumerate() {
        println!(
            "{:>3}. [{}] {} | {} | {} {:.0} | size {} | rel {}",
            idx + 1,
            listing.id,
            listing.title,
            listing.location,
            price_label(listing),
            listing.price,
            listing.size,
            listing.relevance
        );
    }
}

fn price_label(listing: &Listing) -> &'static str {
    match listing.kind {
        crate::model::ListingKind::Property => "INR",
        crate::model::ListingKind::Job => "USD/h",
    }
}
