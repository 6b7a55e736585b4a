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

use std::path::PathBuf;

use clap::Args;
use clap::Parser;
use clap::Subcommand;
use clap_complete::Shell;

#[derive(Parser, Debug)]
#[command(
    name = "agrimatch",
    version,
    about = "Browse and rank farmland and farm-job listings"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a new store
    Init {
        /// Directory to create the store in
        path: Option<PathBuf>,
    },

    /// Load the built-in demo catalog
    Seed {
        /// Output JSON
        #[arg(long)]
        json: bool,
    },

    /// Import listings from JSONL
    Import(ImportArgs),

    /// Export listings as JSONL
    Export(ExportArgs),

    /// Remove listings
    Rm(RmArgs),

    /// Filter and rank listings
    Browse(BrowseArgs),

    /// Show one listing and record a view
    Show {
        /// Listing ID
        id: String,

        /// Output JSON
        #[arg(long)]
        json: bool,
    },

    /// Toggle a saved listing
    Save(UserArgs),

    /// List saved listings
    Saved {
        /// User ID
        #[arg(long)]
        user: String,

        /// Sort key: relevance, price-asc, price-desc, size-desc
        #[arg(long)]
        sort: Option<String>,

        /// Output JSON
        #[arg(long)]
        json: bool,
    },

    /// Apply to a listing
    Apply(ApplyArgs),

    /// List applications
    Applications(ApplicationsArgs),

    /// Move an application to a new status
    Review(ReviewArgs),

    /// Show stats
    Stats {
        /// Output JSON
        #[arg(long)]
        json: bool,
    },

    /// Run integrity checks
    Doctor {
        /// Output JSON
        #[arg(long)]
        json: bool,
    },

    /// Print shell completions
    Completions {
        /// Target shell
        shell: Shell,
    },
}

#[derive(Args, Debug)]
pub struct BrowseArgs {
    /// Free-text query over title, location and feature tags
    pub query: Option<String>,

    /// Location substring
    #[arg(long)]
    pub location: Option<String>,

    /// Price range, MIN..MAX (either end may be omitted)
    #[arg(long)]
    pub price: Option<String>,

    /// Size range in acres (contract months for jobs), MIN..MAX
    #[arg(long)]
    pub size: Option<String>,

    /// Elevation range in metres, MIN..MAX
    #[arg(long)]
    pub elevation: Option<String>,

    /// Category, or "any"
    #[arg(long)]
    pub category: Option<String>,

    /// Region, or "any"
    #[arg(long)]
    pub region: Option<String>,

    /// Listing kind: property or job
    #[arg(long)]
    pub kind: Option<String>,

    /// Soil types, any one may match
    #[arg(long = "soil", value_delimiter = ',')]
    pub soil: Vec<String>,

    /// Irrigation types, any one may match
    #[arg(long = "irrigation", value_delimiter = ',')]
    pub irrigation: Vec<String>,

    /// Crop history, any one may match
    #[arg(long = "crop", value_delimiter = ',')]
    pub crop: Vec<String>,

    /// Water sources, any one may match
    #[arg(long = "water", value_delimiter = ',')]
    pub water: Vec<String>,

    /// Road access, or "any"
    #[arg(long)]
    pub road: Option<String>,

    /// Required flags (organic, equipment, electricity, storage, processing, contract)
    #[arg(long = "require", value_delimiter = ',')]
    pub require: Vec<String>,

    /// Base criteria from a JSON file; flags are layered on top
    #[arg(long)]
    pub criteria: Option<PathBuf>,

    /// Sort key: relevance, price-asc, price-desc, size-desc
    #[arg(long)]
    pub sort: Option<String>,

    /// Maximum rows to print
    #[arg(long)]
    pub limit: Option<usize>,

    /// Include per-listing predicate failures
    #[arg(long)]
    pub explain: bool,

    /// Output JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct UserArgs {
    /// Listing ID
    pub id: String,

    /// User ID
    #[arg(long)]
    pub user: String,

    /// Output JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ApplyArgs {
    /// Listing ID
    pub id: String,

    /// Applicant ID
    #[arg(long)]
    pub user: String,

    /// Cover message
    #[arg(long, default_value = "")]
    pub message: String,

    /// Output JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ApplicationsArgs {
    /// Applicant ID
    #[arg(long)]
    pub user: Option<String>,

    /// Listing ID
    #[arg(long)]
    pub listing: Option<String>,

    /// Only this status
    #[arg(long)]
    pub status: Option<String>,

    /// Output JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ReviewArgs {
    /// Application ID
    pub id: String,

    /// New status
    #[arg(long)]
    pub status: String,

    /// Output JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct RmArgs {
    /// Listing IDs to remove
    #[arg(required = true)]
    pub ids: Vec<String>,

    /// Force compaction after removal
    #[arg(long)]
    pub purge: bool,

    /// Output JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Output file (defaults to stdout)
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Output JSON stats (requires --out)
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ImportArgs {
    /// Input file (JSONL)
    pub path: PathBuf,

    /// Output JSON stats
    #[arg(long)]
    pub json: bool,
}
