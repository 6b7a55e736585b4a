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

use std::sync::Arc;

use crate::criteria::FilterCriteria;
use crate::matcher;
use crate::matcher::SortKey;
use crate::model::Listing;

/// Holds the latest listing snapshot and criteria; any replacement re-runs
/// the evaluator against immutable copies of both.
#[derive(Debug, Clone)]
pub struct BrowseSession {
    snapshot: Arc<[Listing]>,
    criteria: FilterCriteria,
    sort: SortKey,
    matched: Vec<usize>,
}

impl BrowseSession {
    pub fn new(snapshot: Vec<Listing>, criteria: FilterCriteria, sort: SortKey) -> Self {
        let mut session = Self {
            snapshot: snapshot.into(),
            criteria,
            sort,
            matched: Vec::new(),
        };
        session.reevaluate();
        session
    }

    /// Feed update: the new snapshot replaces the old one wholesale.
    pub fn replace_snapshot(&mut self, snapshot: Vec<Listing>) {
        self.snapshot = snapshot.into();
        self.reevaluate();
    }

    pub fn set_criteria(&mut self, criteria: FilterCriteria) {
        self.criteria = criteria;
        self.reevaluate();
    }

    pub fn set_sort(&mut self, sort: SortKey) {
        self.sort = sort;
        self.reevaluate();
    }

    pub fn criteria(&self) -> &FilterCriteria {
        &self.criteria
    }

    pub fn snapshot(&self) -> Arc<[Listing]> {
        Arc::clone(&self.snapshot)
    }

    pub fn results(&self) -> Vec<&Listing> {
        self.matched.iter().map(|idx| &self.snapshot[*idx]).collect()
    }

    pub fn total(&self) -> usize {
        self.snapshot.len()
    }

    fn reevaluate(&mut self) {
        self.matched = matcher::evaluate_indices(&self.snapshot, &self.criteria, self.sort);
    }
}
