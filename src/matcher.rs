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

//! Filter/rank evaluation over a listing snapshot.
//!
//! A listing survives only if every predicate holds. Survivors are ordered
//! with a stable sort, so ties keep their snapshot order.

use std::cmp::Ordering;

use serde::Serialize;

use crate::criteria::CriteriaError;
use crate::criteria::FilterCriteria;
use crate::model::Flag;
use crate::model::Listing;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    Relevance,
    PriceAsc,
    PriceDesc,
    SizeDesc,
}

impl SortKey {
    pub fn parse(input: &str) -> Result<Self, CriteriaError> {
        match input.trim().to_lowercase().as_str() {
            "relevance" | "match" => Ok(SortKey::Relevance),
            "price-asc" | "price_asc" | "price-low" => Ok(SortKey::PriceAsc),
            "price-desc" | "price_desc" | "price-high" => Ok(SortKey::PriceDesc),
            "size-desc" | "size_desc" | "size" | "acreage" => Ok(SortKey::SizeDesc),
            _ => Err(CriteriaError::UnknownSort(input.to_string())),
        }
    }

    pub fn as_label(self) -> &'static str {
        match self {
            SortKey::Relevance => "relevance",
            SortKey::PriceAsc => "price-asc",
            SortKey::PriceDesc => "price-desc",
            SortKey::SizeDesc => "size-desc",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Predicate {
    Text,
    Location,
    Price,
    Size,
    Kind,
    Category,
    Region,
    SoilType,
    Irrigation,
    CropHistory,
    WaterSource,
    Elevation,
    RoadAccess,
    Required(Flag),
}

impl Predicate {
    const FIXED: [Predicate; 13] = [
        Predicate::Text,
        Predicate::Location,
        Predicate::Price,
        Predicate::Size,
        Predicate::Kind,
        Predicate::Category,
        Predicate::Region,
        Predicate::SoilType,
        Predicate::Irrigation,
        Predicate::CropHistory,
        Predicate::WaterSource,
        Predicate::Elevation,
        Predicate::RoadAccess,
    ];

    pub fn label(self) -> String {
        match self {
            Predicate::Text => "text".to_string(),
            Predicate::Location => "location".to_string(),
            Predicate::Price => "price".to_string(),
            Predicate::Size => "size".to_string(),
            Predicate::Kind => "kind".to_string(),
            Predicate::Category => "category".to_string(),
            Predicate::Region => "region".to_string(),
            Predicate::SoilType => "soil".to_string(),
            Predicate::Irrigation => "irrigation".to_string(),
            Predicate::CropHistory => "crop".to_string(),
            Predicate::WaterSource => "water".to_string(),
            Predicate::Elevation => "elevation".to_string(),
            Predicate::RoadAccess => "road".to_string(),
            Predicate::Required(flag) => format!("require:{}", flag.as_label()),
        }
    }
}

/// Criteria with the case-folded strings computed once per evaluation.
struct Compiled<'c> {
    criteria: &'c FilterCriteria,
    text: String,
    location: String,
    category: Option<String>,
}

impl<'c> Compiled<'c> {
    fn new(criteria: &'c FilterCriteria) -> Self {
        Self {
            criteria,
            text: criteria.text.to_lowercase(),
            location: criteria.location.to_lowercase(),
            category: criteria.category.as_ref().map(|c| c.to_lowercase()),
        }
    }

    fn predicates(&self) -> impl Iterator<Item = Predicate> + '_ {
        Predicate::FIXED.into_iter().chain(
            self.criteria
                .required_flags
                .iter()
                .map(|flag| Predicate::Required(*flag)),
        )
    }

    fn holds(&self, pred: Predicate, listing: &Listing) -> bool {
        let c = self.criteria;
        match pred {
            Predicate::Text => {
                self.text.is_empty()
                    || listing.title.to_lowercase().contains(&self.text)
                    || listing.location.to_lowercase().contains(&self.text)
                    || listing
                        .features
                        .iter()
                        .any(|f| f.to_lowercase().contains(&self.text))
            }
            Predicate::Location => {
                self.location.is_empty() || listing.location.to_lowercase().contains(&self.location)
            }
            Predicate::Price => c.price.is_none_or(|r| r.contains(listing.price)),
            Predicate::Size => c.size.is_none_or(|r| r.contains(listing.size)),
            Predicate::Kind => c.kind.is_none_or(|k| k == listing.kind),
            Predicate::Category => self
                .category
                .as_ref()
                .is_none_or(|cat| listing.category.to_lowercase() == *cat),
            Predicate::Region => c.region.as_ref().is_none_or(|r| *r == listing.region),
            Predicate::SoilType => intersects(&c.soil_types, &listing.soil_types),
            Predicate::Irrigation => intersects(&c.irrigation_types, &listing.irrigation_types),
            Predicate::CropHistory => intersects(&c.crop_history, &listing.crop_history),
            Predicate::WaterSource => intersects(&c.water_sources, &listing.water_sources),
            Predicate::Elevation => c.elevation.is_none_or(|r| r.contains(listing.elevation)),
            Predicate::RoadAccess => c
                .road_access
                .as_ref()
                .is_none_or(|r| *r == listing.road_access),
            Predicate::Required(flag) => listing.flag(flag),
        }
    }

    fn matches(&self, listing: &Listing) -> bool {
        self.predicates().all(|pred| self.holds(pred, listing))
    }

    fn failures(&self, listing: &Listing) -> Vec<Predicate> {
        self.predicates()
            .filter(|pred| !self.holds(*pred, listing))
            .collect()
    }
}

/// Empty selector means unconstrained; otherwise one shared value is enough.
fn intersects(selected: &[String], values: &[String]) -> bool {
    selected.is_empty() || selected.iter().any(|s| values.contains(s))
}

pub fn evaluate<'a>(
    listings: &'a [Listing],
    criteria: &FilterCriteria,
    sort: SortKey,
) -> Vec<&'a Listing> {
    evaluate_indices(listings, criteria, sort)
        .into_iter()
        .map(|idx| &listings[idx])
        .collect()
}

/// Same as [`evaluate`], returning positions into `listings`.
pub fn evaluate_indices(listings: &[Listing], criteria: &FilterCriteria, sort: SortKey) -> Vec<usize> {
    let compiled = Compiled::new(criteria);
    let mut out: Vec<usize> = listings
        .iter()
        .enumerate()
        .filter(|(_, l)| compiled.matches(l))
        .map(|(idx, _)| idx)
        .collect();
    apply_ordering(&mut out, listings, sort);
    tracing::debug!(
        candidates = listings.len(),
        matched = out.len(),
        sort = sort.as_label(),
        "evaluated criteria"
    );
    out
}

// Numbers are validated finite, so `partial_cmp` only sees comparable
// values. It also keeps `-0.0` and `0.0` equal, which `total_cmp` does not.
fn numeric(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

fn apply_ordering(items: &mut [usize], listings: &[Listing], sort: SortKey) {
    let at = |idx: &usize| &listings[*idx];
    match sort {
        SortKey::Relevance => items.sort_by(|a, b| at(b).relevance.cmp(&at(a).relevance)),
        SortKey::PriceAsc => items.sort_by(|a, b| numeric(at(a).price, at(b).price)),
        SortKey::PriceDesc => items.sort_by(|a, b| numeric(at(b).price, at(a).price)),
        SortKey::SizeDesc => items.sort_by(|a, b| numeric(at(b).size, at(a).size)),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Verdict {
    pub id: String,
    pub matched: bool,
    pub failed: Vec<String>,
}

/// Per-listing failure report in snapshot order.
pub fn explain(listings: &[Listing], criteria: &FilterCriteria) -> Vec<Verdict> {
    let compiled = Compiled::new(criteria);
    listings
        .iter()
        .map(|listing| {
            let failed = compiled.failures(listing);
            Verdict {
                id: listing.id.clone(),
                matched: failed.is_empty(),
                failed: failed.into_iter().map(Predicate::label).collect(),
            }
        })
        .collect()
}
