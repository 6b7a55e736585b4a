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

//! Filter criteria and their construction-time validation.
//!
//! Every inconsistency is rejected here so that evaluation stays total.

use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;

use anyhow::Context;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::model::Flag;
use crate::model::ListingKind;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CriteriaError {
    #[error("{field} range is inverted: min {min} > max {max}")]
    InvertedRange { field: String, min: f64, max: f64 },

    #[error("{field} range bounds must be non-negative numbers")]
    InvalidBound { field: String },

    #[error("cannot parse {field} range `{input}`; expected MIN..MAX")]
    BadRange { field: String, input: String },

    #[error("unknown flag: {0}")]
    UnknownFlag(String),

    #[error("unknown listing kind: {0}")]
    UnknownKind(String),

    #[error("unknown sort key: {0}")]
    UnknownSort(String),
}

/// Inclusive numeric range with `min <= max`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(into = "RawRange")]
pub struct NumRange {
    min: f64,
    max: f64,
}

/// Wire form of a range. A missing `min` starts at 0 and a missing `max`
/// is unbounded, matching `MIN..` and `..MAX` on the command line.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct RawRange {
    #[serde(default)]
    min: f64,
    #[serde(default = "unbounded")]
    max: f64,
}

fn unbounded() -> f64 {
    f64::MAX
}

impl From<NumRange> for RawRange {
    fn from(range: NumRange) -> Self {
        RawRange {
            min: range.min,
            max: range.max,
        }
    }
}

impl NumRange {
    pub fn new(field: &str, min: f64, max: f64) -> Result<Self, CriteriaError> {
        if min.is_nan() || max.is_nan() || min < 0.0 || max < 0.0 || min.is_infinite() {
            return Err(CriteriaError::InvalidBound {
                field: field.to_string(),
            });
        }
        if min > max {
            return Err(CriteriaError::InvertedRange {
                field: field.to_string(),
                min,
                max,
            });
        }
        Ok(Self { min, max })
    }

    /// Parses `MIN..MAX`. Either side may be omitted: `..50000` starts at 0
    /// and `100..` has no upper bound.
    pub fn parse(field: &str, input: &str) -> Result<Self, CriteriaError> {
        let bad = || CriteriaError::BadRange {
            field: field.to_string(),
            input: input.to_string(),
        };
        let (lo, hi) = input.trim().split_once("..").ok_or_else(bad)?;
        let min = match lo.trim() {
            "" => 0.0,
            s => s.parse::<f64>().map_err(|_| bad())?,
        };
        let max = match hi.trim() {
            "" => f64::MAX,
            s => s.parse::<f64>().map_err(|_| bad())?,
        };
        Self::new(field, min, max)
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

impl fmt::Display for NumRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.max == f64::MAX {
            write!(f, "{}..", self.min)
        } else {
            write!(f, "{}..{}", self.min, self.max)
        }
    }
}

/// A snapshot of the selected constraints. `None` selectors and empty sets
/// are unconstrained.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterCriteria {
    pub text: String,
    pub location: String,
    #[serde(deserialize_with = "de::price")]
    pub price: Option<NumRange>,
    #[serde(deserialize_with = "de::size")]
    pub size: Option<NumRange>,
    #[serde(deserialize_with = "de::elevation")]
    pub elevation: Option<NumRange>,
    #[serde(deserialize_with = "de::kind")]
    pub kind: Option<ListingKind>,
    pub category: Option<String>,
    pub region: Option<String>,
    pub road_access: Option<String>,
    pub soil_types: Vec<String>,
    pub irrigation_types: Vec<String>,
    pub crop_history: Vec<String>,
    pub water_sources: Vec<String>,
    pub required_flags: BTreeSet<Flag>,
}

impl FilterCriteria {
    pub fn builder() -> CriteriaBuilder {
        CriteriaBuilder::default()
    }

    /// Reads criteria from a JSON file. Ranges are validated while parsing;
    /// `"any"` selectors are folded into wildcards.
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read criteria {}", path.display()))?;
        let criteria: FilterCriteria = serde_json::from_str(&text)
            .with_context(|| format!("parse criteria {}", path.display()))?;
        Ok(criteria.normalized())
    }

    fn normalized(mut self) -> Self {
        self.category = wildcard(self.category);
        self.region = wildcard(self.region);
        self.road_access = wildcard(self.road_access);
        self
    }

    /// Number of constraints that can exclude a listing.
    pub fn active_count(&self) -> usize {
        let mut count = 0;
        count += usize::from(!self.text.is_empty());
        count += usize::from(!self.location.is_empty());
        count += [self.price, self.size, self.elevation]
            .iter()
            .filter(|r| r.is_some())
            .count();
        count += usize::from(self.kind.is_some());
        count += [&self.category, &self.region, &self.road_access]
            .iter()
            .filter(|s| s.is_some())
            .count();
        count += [
            &self.soil_types,
            &self.irrigation_types,
            &self.crop_history,
            &self.water_sources,
        ]
        .iter()
        .filter(|set| !set.is_empty())
        .count();
        count + self.required_flags.len()
    }

    /// Compact one-line rendering used in output envelopes.
    pub fn describe(&self) -> Option<String> {
        let mut parts = Vec::new();
        if !self.text.is_empty() {
            parts.push(format!("text='{}'", self.text));
        }
        if !self.location.is_empty() {
            parts.push(format!("location='{}'", self.location));
        }
        for (name, range) in [
            ("price", &self.price),
            ("size", &self.size),
            ("elevation", &self.elevation),
        ] {
            if let Some(range) = range {
                parts.push(format!("{name}={range}"));
            }
        }
        if let Some(kind) = self.kind {
            parts.push(format!("kind={}", kind.as_label()));
        }
        for (name, value) in [
            ("category", &self.category),
            ("region", &self.region),
            ("road", &self.road_access),
        ] {
            if let Some(value) = value {
                parts.push(format!("{name}='{value}'"));
            }
        }
        for (name, set) in [
            ("soil", &self.soil_types),
            ("irrigation", &self.irrigation_types),
            ("crop", &self.crop_history),
            ("water", &self.water_sources),
        ] {
            if !set.is_empty() {
                parts.push(format!("{name}=[{}]", set.join(", ")));
            }
        }
        if !self.required_flags.is_empty() {
            let flags: Vec<&str> = self.required_flags.iter().map(|f| f.as_label()).collect();
            parts.push(format!("require=[{}]", flags.join(", ")));
        }
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    }
}

fn wildcard(value: Option<String>) -> Option<String> {
    value.filter(|v| {
        let v = v.trim();
        !v.is_empty() && !v.eq_ignore_ascii_case("any")
    })
}

fn parse_kind(input: &str) -> Result<Option<ListingKind>, CriteriaError> {
    match wildcard(Some(input.to_string())) {
        Some(kind) => ListingKind::parse(&kind)
            .map(Some)
            .ok_or_else(|| CriteriaError::UnknownKind(input.to_string())),
        None => Ok(None),
    }
}

/// Criteria-file deserializers. Range errors name their field and `kind`
/// folds `"any"` into a wildcard, as the builder does.
mod de {
    use serde::Deserialize;
    use serde::Deserializer;
    use serde::de::Error;

    use super::NumRange;
    use super::RawRange;
    use super::parse_kind;
    use crate::model::ListingKind;

    fn range<'de, D>(field: &str, deserializer: D) -> Result<Option<NumRange>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<RawRange>::deserialize(deserializer)?
            .map(|raw| NumRange::new(field, raw.min, raw.max))
            .transpose()
            .map_err(D::Error::custom)
    }

    pub fn price<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NumRange>, D::Error> {
        range("price", d)
    }

    pub fn size<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NumRange>, D::Error> {
        range("size", d)
    }

    pub fn elevation<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NumRange>, D::Error> {
        range("elevation", d)
    }

    pub fn kind<'de, D: Deserializer<'de>>(d: D) -> Result<Option<ListingKind>, D::Error> {
        match Option::<String>::deserialize(d)? {
            Some(input) => parse_kind(&input).map_err(D::Error::custom),
            None => Ok(None),
        }
    }
}

/// Collects raw user input and validates it once in [`CriteriaBuilder::build`].
#[derive(Debug, Default)]
pub struct CriteriaBuilder {
    criteria: FilterCriteria,
    price: Option<String>,
    size: Option<String>,
    elevation: Option<String>,
    kind: Option<String>,
    flags: Vec<String>,
}

impl CriteriaBuilder {
    pub fn from_base(criteria: FilterCriteria) -> Self {
        Self {
            criteria,
            ..Default::default()
        }
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.criteria.text = text.into();
        self
    }

    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.criteria.location = location.into();
        self
    }

    pub fn price(mut self, range: impl Into<String>) -> Self {
        self.price = Some(range.into());
        self
    }

    pub fn size(mut self, range: impl Into<String>) -> Self {
        self.size = Some(range.into());
        self
    }

    pub fn elevation(mut self, range: impl Into<String>) -> Self {
        self.elevation = Some(range.into());
        self
    }

    pub fn kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.criteria.category = Some(category.into());
        self
    }

    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.criteria.region = Some(region.into());
        self
    }

    pub fn road_access(mut self, road: impl Into<String>) -> Self {
        self.criteria.road_access = Some(road.into());
        self
    }

    pub fn soil_types(mut self, values: Vec<String>) -> Self {
        self.criteria.soil_types.extend(values);
        self
    }

    pub fn irrigation_types(mut self, values: Vec<String>) -> Self {
        self.criteria.irrigation_types.extend(values);
        self
    }

    pub fn crop_history(mut self, values: Vec<String>) -> Self {
        self.criteria.crop_history.extend(values);
        self
    }

    pub fn water_sources(mut self, values: Vec<String>) -> Self {
        self.criteria.water_sources.extend(values);
        self
    }

    pub fn require(mut self, flag: impl Into<String>) -> Self {
        self.flags.push(flag.into());
        self
    }

    pub fn build(self) -> Result<FilterCriteria, CriteriaError> {
        let mut criteria = self.criteria;
        if let Some(input) = self.price {
            criteria.price = Some(NumRange::parse("price", &input)?);
        }
        if let Some(input) = self.size {
            criteria.size = Some(NumRange::parse("size", &input)?);
        }
        if let Some(input) = self.elevation {
            criteria.elevation = Some(NumRange::parse("elevation", &input)?);
        }
        if let Some(input) = self.kind {
            criteria.kind = parse_kind(&input)?;
        }
        for name in self.flags {
            let flag = Flag::parse(&name).ok_or(CriteriaError::UnknownFlag(name))?;
            criteria.required_flags.insert(flag);
        }
        Ok(criteria.normalized())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_rejects_inverted_bounds() {
        let err = NumRange::new("price", 100.0, 50.0).unwrap_err();
        assert_eq!(
            err,
            CriteriaError::InvertedRange {
                field: "price".to_string(),
                min: 100.0,
                max: 50.0
            }
        );
    }

    #[test]
    fn range_is_inclusive() -> Result<(), CriteriaError> {
        let range = NumRange::new("price", 0.0, 50000.0)?;
        assert!(range.contains(0.0));
        assert!(range.contains(50000.0));
        assert!(!range.contains(50000.5));
        Ok(())
    }

    #[test]
    fn range_parse_open_ends() -> Result<(), CriteriaError> {
        let upper = NumRange::parse("price", "..500")?;
        assert_eq!(upper, NumRange::new("price", 0.0, 500.0)?);
        let lower = NumRange::parse("price", "100..")?;
        assert!(lower.contains(1e12));
        assert_eq!(lower.to_string(), "100..");
        Ok(())
    }

    #[test]
    fn range_parse_rejects_garbage() {
        assert!(matches!(
            NumRange::parse("size", "ten"),
            Err(CriteriaError::BadRange { .. })
        ));
        assert!(matches!(
            NumRange::parse("size", "-5..10"),
            Err(CriteriaError::InvalidBound { .. })
        ));
    }

    #[test]
    fn builder_folds_any_into_wildcard() -> Result<(), CriteriaError> {
        let criteria = FilterCriteria::builder()
            .category("any")
            .region("ANY")
            .kind("any")
            .road_access("")
            .build()?;
        assert_eq!(criteria, FilterCriteria::default());
        Ok(())
    }

    #[test]
    fn builder_rejects_unknown_flag() {
        let err = FilterCriteria::builder().require("irrigated").build().unwrap_err();
        assert_eq!(err, CriteriaError::UnknownFlag("irrigated".to_string()));
    }

    #[test]
    fn active_count_tracks_each_constraint() -> Result<(), CriteriaError> {
        let criteria = FilterCriteria::builder()
            .text("rice")
            .price("0..50000")
            .region("Punjab")
            .soil_types(vec!["Alluvial".to_string(), "Laterite".to_string()])
            .require("organic")
            .require("storage")
            .build()?;
        assert_eq!(criteria.active_count(), 6);
        assert_eq!(
            criteria.describe().as_deref(),
            Some("text='rice' price=0..50000 region='Punjab' soil=[Alluvial, Laterite] require=[organic, storage]")
        );
        Ok(())
    }

    #[test]
    fn json_criteria_reject_inverted_range() {
        let text = r#"{"price":{"min":50000,"max":10}}"#;
        let err = serde_json::from_str::<FilterCriteria>(text).unwrap_err();
        assert!(err.to_string().contains("price range is inverted"));

        let text = r#"{"elevation":{"min":-5}}"#;
        let err = serde_json::from_str::<FilterCriteria>(text).unwrap_err();
        assert!(err.to_string().contains("elevation"));
    }

    #[test]
    fn json_criteria_accept_open_ended_ranges() -> anyhow::Result<()> {
        let text = r#"{"price":{"min":100},"size":{"max":40}}"#;
        let criteria: FilterCriteria = serde_json::from_str(text)?;
        assert_eq!(criteria.price, Some(NumRange::new("price", 100.0, f64::MAX)?));
        assert_eq!(criteria.size, Some(NumRange::new("size", 0.0, 40.0)?));
        assert_eq!(criteria.describe().as_deref(), Some("price=100.. size=0..40"));
        Ok(())
    }

    #[test]
    fn json_criteria_fold_any_kind() -> anyhow::Result<()> {
        let criteria: FilterCriteria = serde_json::from_str(r#"{"kind":"any"}"#)?;
        assert_eq!(criteria.kind, None);
        let criteria: FilterCriteria = serde_json::from_str(r#"{"kind":"Job"}"#)?;
        assert_eq!(criteria.kind, Some(ListingKind::Job));

        let err = serde_json::from_str::<FilterCriteria>(r#"{"kind":"lease"}"#).unwrap_err();
        assert!(err.to_string().contains("unknown listing kind: lease"));
        Ok(())
    }

    #[test]
    fn json_criteria_file_normalizes_any() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("criteria.json");
        std::fs::write(
            &path,
            r#"{"category":"any","region":"Kerala","required_flags":["organic"]}"#,
        )?;
        let criteria = FilterCriteria::from_json_file(&path)?;
        assert_eq!(criteria.category, None);
        assert_eq!(criteria.region.as_deref(), Some("Kerala"));
        assert!(criteria.required_flags.contains(&Flag::Organic));
        Ok(())
    }
}
