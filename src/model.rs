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

//! Shared domain types used across import, matching, and the store.

use anyhow::Result;
use serde::Deserialize;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ListingKind {
    #[default]
    Property,
    Job,
}

impl ListingKind {
    pub fn as_label(self) -> &'static str {
        match self {
            ListingKind::Property => "property",
            ListingKind::Job => "job",
        }
    }

    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_lowercase().as_str() {
            "property" => Some(ListingKind::Property),
            "job" => Some(ListingKind::Job),
            _ => None,
        }
    }
}

/// Boolean attributes a filter can require to be true.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Flag {
    Organic,
    Equipment,
    Electricity,
    Storage,
    Processing,
    Contract,
}

impl Flag {
    pub fn as_label(self) -> &'static str {
        match self {
            Flag::Organic => "organic",
            Flag::Equipment => "equipment",
            Flag::Electricity => "electricity",
            Flag::Storage => "storage",
            Flag::Processing => "processing",
            Flag::Contract => "contract",
        }
    }

    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_lowercase().as_str() {
            "organic" | "organic_certified" => Some(Flag::Organic),
            "equipment" | "equipment_included" => Some(Flag::Equipment),
            "electricity" | "electricity_available" => Some(Flag::Electricity),
            "storage" | "storage_available" => Some(Flag::Storage),
            "processing" | "processing_facility" => Some(Flag::Processing),
            "contract" | "contract_farming" => Some(Flag::Contract),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub id: String,
    #[serde(default)]
    pub kind: ListingKind,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub location: String,
    pub region: String,
    pub price: f64,
    pub size: f64,
    pub category: String,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub organic_certified: bool,
    #[serde(default)]
    pub equipment_included: bool,
    #[serde(default)]
    pub soil_types: Vec<String>,
    #[serde(default)]
    pub irrigation_types: Vec<String>,
    #[serde(default)]
    pub crop_history: Vec<String>,
    #[serde(default)]
    pub water_sources: Vec<String>,
    #[serde(default)]
    pub elevation: f64,
    #[serde(default)]
    pub road_access: String,
    #[serde(default)]
    pub electricity_available: bool,
    #[serde(default)]
    pub storage_available: bool,
    #[serde(default)]
    pub processing_facility: bool,
    #[serde(default)]
    pub contract_farming: bool,
    #[serde(default)]
    pub relevance: u8,
    #[serde(default)]
    pub views: u64,
}

impl Listing {
    pub fn flag(&self, flag: Flag) -> bool {
        match flag {
            Flag::Organic => self.organic_certified,
            Flag::Equipment => self.equipment_included,
            Flag::Electricity => self.electricity_available,
            Flag::Storage => self.storage_available,
            Flag::Processing => self.processing_facility,
            Flag::Contract => self.contract_farming,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            anyhow::bail!("listing id must not be empty");
        }
        for (name, value) in [
            ("price", self.price),
            ("size", self.size),
            ("elevation", self.elevation),
        ] {
            if !value.is_finite() || value < 0.0 {
                anyhow::bail!("listing {}: {name} must be a non-negative number", self.id);
            }
        }
        if self.relevance > 100 {
            anyhow::bail!(
                "listing {}: relevance {} is outside 0..=100",
                self.id,
                self.relevance
            );
        }
        Ok(())
    }
}
