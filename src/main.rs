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

mod applications;
mod cli;
mod config;
mod criteria;
mod matcher;
mod model;
mod output;
mod session;
mod store;
mod transfer;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context as _;
use anyhow::Result;
use clap::CommandFactory;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

use crate::applications::ApplicationStatus;
use crate::cli::ApplicationsArgs;
use crate::cli::BrowseArgs;
use crate::cli::Cli;
use crate::cli::Commands;
use crate::config::Config;
use crate::config::StoreCtx;
use crate::criteria::CriteriaBuilder;
use crate::criteria::CriteriaError;
use crate::criteria::FilterCriteria;
use crate::matcher::SortKey;
use crate::output::JsonResponse;
use crate::output::StatsOut;
use crate::output::print_json;
use crate::session::BrowseSession;
use crate::store::ApplicationQuery;
use crate::store::Store;
use crate::store::StoreMode;

fn main() {
    init_tracing();
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let fallback = config::load_global_config()
        .map(|config| config.log_filter)
        .unwrap_or_else(|_| Config::default().log_filter);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init();
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Init { path } => cmd_init(path),
        Commands::Seed { json } => handle_result(cmd_seed(json), json),
        Commands::Import(args) => handle_result(cmd_import(args.path, args.json), args.json),
        Commands::Export(args) => handle_result(cmd_export(args.out, args.json), args.json),
        Commands::Rm(args) => handle_result(cmd_rm(args.ids, args.purge, args.json), args.json),
        Commands::Browse(args) => {
            let json = args.json;
            handle_result(cmd_browse(args), json)
        }
        Commands::Show { id, json } => handle_result(cmd_show(id, json), json),
        Commands::Save(args) => {
            handle_result(cmd_save(args.id, args.user, args.json), args.json)
        }
        Commands::Saved { user, sort, json } => handle_result(cmd_saved(user, sort, json), json),
        Commands::Apply(args) => handle_result(
            cmd_apply(args.id, args.user, args.message, args.json),
            args.json,
        ),
        Commands::Applications(args) => {
            let json = args.json;
            handle_result(cmd_applications(args), json)
        }
        Commands::Review(args) => {
            handle_result(cmd_review(args.id, args.status, args.json), args.json)
        }
        Commands::Stats { json } => handle_result(cmd_stats(json), json),
        Commands::Doctor { json } => handle_result(cmd_doctor(json), json),
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "agrimatch", &mut std::io::stdout());
            Ok(())
        }
    }
}

fn handle_result(result: Result<()>, json: bool) -> Result<()> {
    match result {
        Ok(()) => Ok(()),
        Err(err) => {
            if json {
                let code = if err.downcast_ref::<CriteriaError>().is_some() {
                    "invalid_criteria"
                } else {
                    "error"
                };
                let resp = JsonResponse::error(code, &format!("{err:#}"));
                print_json(&resp)?;
                Ok(())
            } else {
                Err(err)
            }
        }
    }
}

fn open_store(mode: StoreMode) -> Result<(StoreCtx, Store)> {
    let ctx = StoreCtx::discover_from_cwd()?;
    let store = Store::open(&ctx.store_path, mode)?;
    Ok((ctx, store))
}

fn cmd_init(path: Option<PathBuf>) -> Result<()> {
    let root = path.unwrap_or_else(|| PathBuf::from("."));
    std::fs::create_dir_all(&root).with_context(|| format!("create dir {root:?}"))?;

    let config = config::load_global_config()?;
    let store_path = if config.store_path.is_absolute() {
        config.store_path.clone()
    } else {
        root.join(&config.store_path)
    };
    Store::init(&store_path)?;

    println!("Initialized agrimatch store at {}", store_path.display());
    Ok(())
}

fn cmd_seed(json: bool) -> Result<()> {
    let (_, store) = open_store(StoreMode::ReadWrite)?;
    let stats = transfer::import_seed(&store)?;
    if json {
        let resp = JsonResponse::ok().with_stats(StatsOut {
            total_hits: stats.listings as i64,
            listing_count: Some(store.stats()?.listing_count),
            ..Default::default()
        });
        print_json(&resp)?;
    } else {
        println!("Seeded {} listings", stats.listings);
    }
    Ok(())
}

fn cmd_import(path: PathBuf, json: bool) -> Result<()> {
    let (_, store) = open_store(StoreMode::ReadWrite)?;
    let file = std::fs::File::open(&path).with_context(|| format!("open {}", path.display()))?;
    let stats = transfer::import_listings(&store, file)?;

    if json {
        let resp = JsonResponse::ok().with_stats(StatsOut {
            total_hits: stats.listings as i64,
            listing_count: Some(store.stats()?.listing_count),
            ..Default::default()
        });
        print_json(&resp)?;
    } else {
        println!("Imported {} listings", stats.listings);
    }
    Ok(())
}

fn cmd_export(out: Option<PathBuf>, json: bool) -> Result<()> {
    if json && out.is_none() {
        anyhow::bail!("--json requires --out for export");
    }
    let (_, store) = open_store(StoreMode::ReadOnly)?;

    let stats = if let Some(path) = out {
        let file =
            std::fs::File::create(&path).with_context(|| format!("create {}", path.display()))?;
        transfer::export_listings(&store, file)?
    } else {
        let stdout = std::io::stdout();
        let handle = stdout.lock();
        transfer::export_listings(&store, handle)?
    };

    if json {
        let resp = JsonResponse::ok().with_stats(StatsOut {
            total_hits: stats.listings as i64,
            listing_count: Some(stats.listings as i64),
            ..Default::default()
        });
        print_json(&resp)?;
    }
    Ok(())
}

fn cmd_rm(ids: Vec<String>, purge: bool, json: bool) -> Result<()> {
    let (_, store) = open_store(StoreMode::ReadWrite)?;
    let mut removed = 0usize;
    let mut warnings = Vec::new();
    for id in ids {
        let count = store.mark_listing_deleted(&id)?;
        if count == 0 {
            tracing::warn!(id = %id, "listing not found for removal");
            warnings.push(format!("listing not found: {id}"));
        }
        removed += count;
    }

    if purge {
        store.compact()?;
    }

    if json {
        let resp = JsonResponse::ok()
            .with_stats(StatsOut {
                total_hits: removed as i64,
                listing_count: Some(store.stats()?.listing_count),
                ..Default::default()
            })
            .with_warnings(warnings);
        print_json(&resp)?;
    } else {
        println!("Removed {removed} listings");
        for warn in warnings {
            eprintln!("warning: {warn}");
        }
    }
    Ok(())
}

fn browse_criteria(args: &BrowseArgs) -> Result<FilterCriteria> {
    let base = match &args.criteria {
        Some(path) => FilterCriteria::from_json_file(path)?,
        None => FilterCriteria::default(),
    };
    let mut builder = CriteriaBuilder::from_base(base);
    if let Some(text) = &args.query {
        builder = builder.text(text.clone());
    }
    if let Some(location) = &args.location {
        builder = builder.location(location.clone());
    }
    if let Some(price) = &args.price {
        builder = builder.price(price.clone());
    }
    if let Some(size) = &args.size {
        builder = builder.size(size.clone());
    }
    if let Some(elevation) = &args.elevation {
        builder = builder.elevation(elevation.clone());
    }
    if let Some(kind) = &args.kind {
        builder = builder.kind(kind.clone());
    }
    if let Some(category) = &args.category {
        builder = builder.category(category.clone());
    }
    if let Some(region) = &args.region {
        builder = builder.region(region.clone());
    }
    if let Some(road) = &args.road {
        builder = builder.road_access(road.clone());
    }
    builder = builder
        .soil_types(args.soil.clone())
        .irrigation_types(args.irrigation.clone())
        .crop_history(args.crop.clone())
        .water_sources(args.water.clone());
    for flag in &args.require {
        builder = builder.require(flag.clone());
    }
    Ok(builder.build()?)
}

fn cmd_browse(args: BrowseArgs) -> Result<()> {
    let (ctx, store) = open_store(StoreMode::ReadOnly)?;
    let criteria = browse_criteria(&args)?;
    let sort = match &args.sort {
        Some(key) => SortKey::parse(key)?,
        None => ctx.config.default_sort,
    };
    let limit = args.limit.unwrap_or(ctx.config.max_results);

    let start = Instant::now();
    let session = BrowseSession::new(store.snapshot()?, criteria, sort);
    let results = session.results();
    let shown = &results[..results.len().min(limit)];
    let took_ms = start.elapsed().as_millis() as i64;

    let mut warnings = Vec::new();
    if shown.len() < results.len() {
        warnings.push(format!(
            "showing {} of {} matches; raise --limit for more",
            shown.len(),
            results.len()
        ));
    }

    if args.json {
        let mut resp = JsonResponse::ok()
            .with_query(
                session.criteria().text.as_str(),
                session.criteria().describe(),
                sort.as_label(),
                limit,
            )
            .with_results(output::listing_results(shown)?)
            .with_stats(StatsOut {
                took_ms,
                total_hits: results.len() as i64,
                listing_count: Some(session.total() as i64),
                active_filters: Some(session.criteria().active_count()),
                ..Default::default()
            })
            .with_warnings(warnings);
        if args.explain {
            let verdicts = matcher::explain(&session.snapshot(), session.criteria());
            resp = resp.with_explain(serde_json::to_value(verdicts)?);
        }
        print_json(&resp)?;
        return Ok(());
    }

    output::print_listing_table(shown);
    println!(
        "{} of {} listings match ({} active filters, sorted by {})",
        results.len(),
        session.total(),
        session.criteria().active_count(),
        sort.as_label()
    );
    if args.explain {
        for verdict in matcher::explain(&session.snapshot(), session.criteria()) {
            if !verdict.matched {
                println!("  - {} failed: {}", verdict.id, verdict.failed.join(", "));
            }
        }
    }
    for warn in warnings {
        eprintln!("warning: {warn}");
    }
    Ok(())
}

fn cmd_show(id: String, json: bool) -> Result<()> {
    let (_, store) = open_store(StoreMode::ReadWrite)?;
    store.record_view(&id)?;
    let listing = store
        .get_listing(&id)?
        .ok_or_else(|| anyhow::anyhow!("listing not found: {id}"))?;

    if json {
        let resp = JsonResponse::ok().with_results(output::listing_results(&[&listing])?);
        print_json(&resp)?;
    } else {
        println!("[{}] {} ({})", listing.id, listing.title, listing.kind.as_label());
        println!("{}, {}", listing.location, listing.region);
        println!(
            "price {:.0} | size {} | {} | elevation {}",
            listing.price, listing.size, listing.category, listing.elevation
        );
        if !listing.description.is_empty() {
            println!("{}", listing.description);
        }
        if !listing.features.is_empty() {
            println!("features: {}", listing.features.join(", "));
        }
        println!("views: {}", listing.views);
    }
    Ok(())
}

fn cmd_save(id: String, user: String, json: bool) -> Result<()> {
    let (_, store) = open_store(StoreMode::ReadWrite)?;
    let state = store.toggle_saved(&user, &id)?;
    if json {
        let resp = JsonResponse::ok().with_results(vec![serde_json::json!({
            "listing_id": id,
            "user_id": user,
            "state": state.as_label(),
        })]);
        print_json(&resp)?;
    } else {
        println!("{} listing {id} for {user}", capitalize(state.as_label()));
    }
    Ok(())
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn cmd_saved(user: String, sort: Option<String>, json: bool) -> Result<()> {
    let (ctx, store) = open_store(StoreMode::ReadOnly)?;
    let sort = match sort {
        Some(key) => SortKey::parse(&key)?,
        None => ctx.config.default_sort,
    };
    let listings = store.saved_listings(&user)?;
    let refs = matcher::evaluate(&listings, &FilterCriteria::default(), sort);
    if json {
        let resp = JsonResponse::ok()
            .with_results(output::listing_results(&refs)?)
            .with_stats(StatsOut {
                total_hits: refs.len() as i64,
                ..Default::default()
            });
        print_json(&resp)?;
    } else if refs.is_empty() {
        println!("No saved listings for {user}");
    } else {
        output::print_listing_table(&refs);
    }
    Ok(())
}

fn cmd_apply(id: String, user: String, message: String, json: bool) -> Result<()> {
    let (_, store) = open_store(StoreMode::ReadWrite)?;
    let row = store.create_application(&id, &user, &message)?;
    if json {
        let resp = JsonResponse::ok().with_results(vec![serde_json::to_value(&row)?]);
        print_json(&resp)?;
    } else {
        println!("Application {} submitted ({})", row.id, row.status.as_label());
    }
    Ok(())
}

fn cmd_applications(args: ApplicationsArgs) -> Result<()> {
    let (_, store) = open_store(StoreMode::ReadOnly)?;
    let status = args
        .status
        .as_deref()
        .map(ApplicationStatus::parse)
        .transpose()?;
    let rows = store.applications(&ApplicationQuery {
        applicant_id: args.user,
        listing_id: args.listing,
    })?;
    let counts = applications::status_counts(&rows);
    let rows = applications::filter_by_status(rows, status);

    if args.json {
        let results = rows
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()?;
        let resp = JsonResponse::ok().with_results(results).with_stats(StatsOut {
            total_hits: rows.len() as i64,
            status_counts: Some(serde_json::to_value(&counts)?),
            ..Default::default()
        });
        print_json(&resp)?;
        return Ok(());
    }

    for row in &rows {
        println!(
            "{} | listing {} | {} | {} | {}",
            row.id,
            row.listing_id,
            row.applicant_id,
            row.status.as_label(),
            row.updated_at
        );
    }
    let tabs: Vec<String> = counts
        .iter()
        .map(|(status, count)| format!("{status} {count}"))
        .collect();
    println!("{}", tabs.join(" | "));
    Ok(())
}

fn cmd_review(id: String, status: String, json: bool) -> Result<()> {
    let (_, store) = open_store(StoreMode::ReadWrite)?;
    let next = ApplicationStatus::parse(&status)?;
    let row = store.set_application_status(&id, next)?;
    if json {
        let resp = JsonResponse::ok().with_results(vec![serde_json::to_value(&row)?]);
        print_json(&resp)?;
    } else {
        println!("Application {} is now {}", row.id, row.status.as_label());
    }
    Ok(())
}

fn cmd_stats(json: bool) -> Result<()> {
    let (ctx, store) = open_store(StoreMode::ReadOnly)?;
    let stats = store.stats()?;
    let counts = applications::status_counts(&store.applications(&ApplicationQuery::default())?);

    if json {
        let resp = JsonResponse::ok().with_stats(StatsOut {
            listing_count: Some(stats.listing_count),
            kind_counts: Some(serde_json::to_value(&stats.kind_counts)?),
            saved_count: Some(stats.saved_count),
            application_count: Some(stats.application_count),
            total_views: Some(stats.total_views),
            db_size_bytes: Some(stats.db_size_bytes),
            status_counts: Some(serde_json::to_value(&counts)?),
            ..Default::default()
        });
        print_json(&resp)?;
    } else {
        let by_kind = stats
            .kind_counts
            .iter()
            .map(|(kind, count)| format!("{count} {kind}"))
            .collect::<Vec<_>>()
            .join(", ");
        println!("Listings: {} ({by_kind})", stats.listing_count);
        println!("Saved: {}", stats.saved_count);
        println!("Applications: {}", stats.application_count);
        println!("Views: {}", stats.total_views);
        println!("DB size: {} bytes", stats.db_size_bytes);
        println!("Default sort: {}", ctx.config.default_sort.as_label());
    }
    Ok(())
}

fn cmd_doctor(json: bool) -> Result<()> {
    let (_, store) = open_store(StoreMode::ReadOnly)?;
    let report = store.integrity_check()?;
    let mut warnings = Vec::new();
    if report.orphaned_saved > 0 {
        warnings.push(format!(
            "{} saved entries point at missing listings",
            report.orphaned_saved
        ));
    }
    if report.orphaned_applications > 0 {
        warnings.push(format!(
            "{} applications point at missing listings",
            report.orphaned_applications
        ));
    }

    if json {
        let resp = JsonResponse::ok()
            .with_stats(StatsOut {
                listing_count: Some(report.stats.listing_count),
                saved_count: Some(report.stats.saved_count),
                application_count: Some(report.stats.application_count),
                db_size_bytes: Some(report.stats.db_size_bytes),
                integrity: Some(report.status),
                ..Default::default()
            })
            .with_warnings(warnings);
        print_json(&resp)?;
    } else {
        println!("Integrity: {}", report.status);
        for warn in warnings {
            eprintln!("warning: {warn}");
        }
    }
    Ok(())
}
