// Copyright 2026 Modelshelf Authors
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

mod cli;
mod clock;
mod config;
mod engine;
mod error;
mod filters;
mod fts;
mod highlight;
mod history;
mod minilang;
mod model;
mod output;
mod predicate;
mod query;
mod sql;
mod store;
mod suggest;
mod transfer;

use std::path::PathBuf;

use anyhow::Context as _;
use anyhow::Result;
use clap::CommandFactory;
use clap::Parser;
use serde_json::Value;
use serde_json::json;
use time::OffsetDateTime;
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;
use crate::cli::Commands;
use crate::cli::SaveArgs;
use crate::cli::SearchArgs;
use crate::cli::SuggestArgs;
use crate::config::ConfigCtx;
use crate::engine::SearchEngine;
use crate::error::SearchError;
use crate::filters::FilterSet;
use crate::output::JsonResponse;
use crate::output::StatsOut;
use crate::output::print_json;
use crate::store::Store;

const LOG_ENV: &str = "MODELSHELF_LOG";

fn main() {
    init_tracing();
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

/// Logs go to stderr so `--json` output on stdout stays parseable.
fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| {
        let level = config::load_global_config()
            .map(|config| config.log_level)
            .unwrap_or_else(|_| "warn".to_string());
        EnvFilter::try_new(&level).unwrap_or_else(|_| EnvFilter::new("warn"))
    });
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Init { path } => cmd_init(path),
        Commands::Import(args) => handle_result(cmd_import(args.path, args.json), args.json),
        Commands::Export(args) => handle_result(cmd_export(args.out, args.json), args.json),
        Commands::Search(args) => {
            let json = args.json;
            handle_result(cmd_search(args), json)
        }
        Commands::Suggest(args) => {
            let json = args.json;
            handle_result(cmd_suggest(args), json)
        }
        Commands::Save(args) => {
            let json = args.json;
            handle_result(cmd_save(args), json)
        }
        Commands::Saved { json } => handle_result(cmd_saved(json), json),
        Commands::Unsave { id, json } => handle_result(cmd_unsave(id, json), json),
        Commands::History { limit, json } => handle_result(cmd_history(limit, json), json),
        Commands::ClearHistory {
            older_than_days,
            json,
        } => handle_result(cmd_clear_history(older_than_days, json), json),
        Commands::Reindex { json } => handle_result(cmd_reindex(json), json),
        Commands::View { target, json } => handle_result(cmd_view(target, json), json),
        Commands::Stats { json } => handle_result(cmd_stats(json), json),
        Commands::Doctor { json } => handle_result(cmd_doctor(json), json),
        Commands::Completions { shell } => {
            clap_complete::generate(
                shell,
                &mut Cli::command(),
                "modelshelf",
                &mut std::io::stdout(),
            );
            Ok(())
        }
    }
}

fn handle_result(result: Result<()>, json: bool) -> Result<()> {
    match result {
        Ok(()) => Ok(()),
        Err(err) => {
            if json {
                let code = err
                    .downcast_ref::<SearchError>()
                    .map(SearchError::code)
                    .unwrap_or("error");
                let mut resp = JsonResponse::error(code, &format!("{err:#}"));
                if let Some(SearchError::UnknownFilter(_)) = err.downcast_ref::<SearchError>() {
                    resp = resp.with_hint(
                        "known filters: tags_include, tags_exclude, in_project, lat_days, \
                         category, format, min_rating, date_added_start, date_added_end, \
                         last_viewed_start, last_viewed_end, min_file_size, max_file_size",
                    );
                }
                print_json(&resp)?;
                Ok(())
            } else {
                Err(err)
            }
        }
    }
}

fn open_store() -> Result<(ConfigCtx, Store)> {
    let ctx = ConfigCtx::load_from_cwd()?;
    let store = Store::open(&ctx.store_path())?;
    Ok((ctx, store))
}

fn open_engine() -> Result<SearchEngine<Store>> {
    let (ctx, store) = open_store()?;
    Ok(SearchEngine::new(store, ctx.config))
}

fn to_values<T: serde::Serialize>(items: &[T]) -> Result<Vec<Value>> {
    items
        .iter()
        .map(|item| serde_json::to_value(item).map_err(anyhow::Error::from))
        .collect()
}

fn cmd_init(path: Option<PathBuf>) -> Result<()> {
    let root = path.unwrap_or_else(|| PathBuf::from("."));
    std::fs::create_dir_all(&root).with_context(|| format!("create dir {}", root.display()))?;

    let config = config::load_global_config()?;
    let store_path = if config.store_path.is_absolute() {
        config.store_path.clone()
    } else {
        root.join(&config.store_path)
    };
    Store::init(&store_path)?;

    println!("Initialized modelshelf store at {}", store_path.display());
    Ok(())
}

fn cmd_import(path: PathBuf, json: bool) -> Result<()> {
    let (_, store) = open_store()?;
    let file = std::fs::File::open(&path).with_context(|| format!("open {}", path.display()))?;
    let stats = transfer::import_store(&store, file, OffsetDateTime::now_utc())?;

    if json {
        let totals = store.stats()?;
        let resp = JsonResponse::ok()
            .with_stats(StatsOut {
                total_count: (stats.models + stats.saved_searches) as u64,
                model_count: Some(totals.model_count),
                ..StatsOut::default()
            })
            .with_diagnostics(serde_json::to_value(&stats)?);
        print_json(&resp)?;
    } else {
        println!(
            "Imported {} models and {} saved searches",
            stats.models, stats.saved_searches
        );
    }
    Ok(())
}

fn cmd_export(out: Option<PathBuf>, json: bool) -> Result<()> {
    if json && out.is_none() {
        anyhow::bail!("--json requires --out for export");
    }
    let (_, store) = open_store()?;

    let stats = if let Some(path) = &out {
        transfer::export_to_path(&store, path)?
    } else {
        let stdout = std::io::stdout();
        transfer::export_store(&store, stdout.lock())?
    };

    if json {
        let resp = JsonResponse::ok()
            .with_stats(StatsOut {
                total_count: (stats.models + stats.saved_searches) as u64,
                model_count: Some(stats.models as i64),
                ..StatsOut::default()
            })
            .with_diagnostics(serde_json::to_value(&stats)?);
        print_json(&resp)?;
    }
    Ok(())
}

fn cmd_search(args: SearchArgs) -> Result<()> {
    let engine = open_engine()?;
    let envelope = match &args.saved {
        Some(name) => engine.run_saved(name, args.limit, args.offset)?,
        None => {
            let filters = FilterSet::from_pairs(args.filters.as_slice())?;
            let query = args.query.as_deref().unwrap_or_default();
            engine.search(query, Some(&filters), args.limit, args.offset)?
        }
    };

    if args.json {
        let resp = JsonResponse::from_envelope(&envelope, args.saved.as_deref())?;
        print_json(&resp)?;
    } else {
        output::print_table(&envelope);
    }
    Ok(())
}

fn cmd_suggest(args: SuggestArgs) -> Result<()> {
    let engine = open_engine()?;
    let suggestions = engine.get_search_suggestions(&args.partial, args.limit);

    if args.json {
        let resp = JsonResponse::ok()
            .with_results(suggestions.iter().map(|s| json!(s)).collect())
            .with_stats(StatsOut {
                total_count: suggestions.len() as u64,
                returned: suggestions.len(),
                ..StatsOut::default()
            });
        print_json(&resp)?;
    } else {
        for suggestion in suggestions {
            println!("{suggestion}");
        }
    }
    Ok(())
}

fn cmd_save(args: SaveArgs) -> Result<()> {
    let engine = open_engine()?;
    let filters = FilterSet::from_pairs(args.filters.as_slice())?;
    let id = engine.save_search(&args.name, &args.query, &filters)?;

    if args.json {
        let resp = JsonResponse::ok().with_results(vec![json!({ "id": id, "name": args.name })]);
        print_json(&resp)?;
    } else {
        println!("Saved search {} ({id})", args.name);
    }
    Ok(())
}

fn cmd_saved(json: bool) -> Result<()> {
    let engine = open_engine()?;
    let saved = engine.get_saved_searches()?;

    if json {
        let resp = JsonResponse::ok()
            .with_stats(StatsOut {
                total_count: saved.len() as u64,
                returned: saved.len(),
                ..StatsOut::default()
            })
            .with_results(to_values(&saved)?);
        print_json(&resp)?;
    } else {
        for entry in saved {
            println!("{:>4}  {:<24} {}", entry.id, entry.name, entry.query);
        }
    }
    Ok(())
}

fn cmd_unsave(id: i64, json: bool) -> Result<()> {
    let engine = open_engine()?;
    let deleted = engine.delete_saved_search(id)?;

    if json {
        let mut resp =
            JsonResponse::ok().with_diagnostics(json!({ "id": id, "deleted": deleted }));
        if deleted {
            resp = resp.with_actions(vec![format!("deleted saved search {id}")]);
        }
        print_json(&resp)?;
    } else if deleted {
        println!("Deleted saved search {id}");
    } else {
        println!("No saved search {id}");
    }
    Ok(())
}

fn cmd_history(limit: Option<usize>, json: bool) -> Result<()> {
    let engine = open_engine()?;
    let records = engine.get_search_history(limit)?;

    if json {
        let resp = JsonResponse::ok()
            .with_stats(StatsOut {
                total_count: records.len() as u64,
                returned: records.len(),
                ..StatsOut::default()
            })
            .with_results(to_values(&records)?);
        print_json(&resp)?;
    } else {
        for record in records {
            println!(
                "{}  {:>5}  {}",
                record.created_at, record.result_count, record.query
            );
        }
    }
    Ok(())
}

fn cmd_clear_history(older_than_days: u32, json: bool) -> Result<()> {
    let engine = open_engine()?;
    let removed = engine.clear_search_history(older_than_days)?;

    if json {
        let resp = JsonResponse::ok().with_diagnostics(json!({ "removed": removed }));
        print_json(&resp)?;
    } else {
        println!("Removed {removed} history entries");
    }
    Ok(())
}

fn cmd_reindex(json: bool) -> Result<()> {
    let engine = open_engine()?;
    engine.rebuild_text_indexes()?;
    let report = engine.backend().consistency_report()?;

    if json {
        let resp = JsonResponse::ok().with_diagnostics(serde_json::to_value(&report)?);
        print_json(&resp)?;
    } else {
        println!(
            "Reindexed {} models and {} metadata rows",
            report.models_fts_count, report.metadata_fts_count
        );
    }
    Ok(())
}

fn cmd_view(target: String, json: bool) -> Result<()> {
    let (_, store) = open_store()?;
    if store.mark_viewed(&target, OffsetDateTime::now_utc())? == 0 {
        anyhow::bail!("no model matches {target}");
    }

    if json {
        print_json(&JsonResponse::ok().with_actions(vec![format!("viewed {target}")]))?;
    } else {
        println!("Marked {target} as viewed");
    }
    Ok(())
}

fn cmd_stats(json: bool) -> Result<()> {
    let (ctx, store) = open_store()?;
    let stats = store.stats()?;

    if json {
        let resp = JsonResponse::ok()
            .with_stats(StatsOut {
                model_count: Some(stats.model_count),
                db_size_bytes: Some(stats.db_size_bytes),
                ..StatsOut::default()
            })
            .with_diagnostics(serde_json::to_value(&stats)?);
        print_json(&resp)?;
    } else {
        println!("Store: {}", store.path.display());
        println!("Models: {}", stats.model_count);
        println!("With metadata: {}", stats.metadata_count);
        println!("Projects: {}", stats.project_count);
        println!("Saved searches: {}", stats.saved_search_count);
        println!("History entries: {}", stats.history_count);
        println!("DB size: {} bytes", stats.db_size_bytes);
        println!("Default limit: {}", ctx.config.default_limit);
    }
    Ok(())
}

fn cmd_doctor(json: bool) -> Result<()> {
    let (_, store) = open_store()?;
    let integrity = store.integrity_check()?;
    let consistency = store.consistency_report()?;
    let mut actions = Vec::new();
    if !consistency.models_fts_ok() || !consistency.metadata_fts_ok() {
        actions.push("run `modelshelf reindex` to rebuild text indexes".to_string());
    }

    if json {
        let resp = JsonResponse::ok()
            .with_stats(StatsOut {
                model_count: Some(integrity.stats.model_count),
                db_size_bytes: Some(integrity.stats.db_size_bytes),
                ..StatsOut::default()
            })
            .with_diagnostics(json!({
                "integrity": integrity.status,
                "consistency": consistency,
            }))
            .with_actions(actions);
        print_json(&resp)?;
    } else {
        println!("Integrity: {}", integrity.status);
        println!(
            "Model index: {}/{}",
            consistency.models_fts_count, consistency.model_count
        );
        println!(
            "Metadata index: {}/{}",
            consistency.metadata_fts_count, consistency.metadata_count
        );
        for action in actions {
            println!("hint: {action}");
        }
    }
    Ok(())
}
