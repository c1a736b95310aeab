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

use std::path::PathBuf;

use clap::Args;
use clap::Parser;
use clap::Subcommand;
use clap_complete::Shell;

#[derive(Parser, Debug)]
#[command(name = "modelshelf", version, about = "Ranked search over a local 3D model catalog")]
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

    /// Import a JSONL catalog
    Import(ImportArgs),

    /// Export the catalog as JSONL
    Export(ExportArgs),

    /// Search models with free text and tag=, tag!=, inProject, LAT>= predicates
    Search(SearchArgs),

    /// Suggest completions for a partial word
    Suggest(SuggestArgs),

    /// Save a named search
    Save(SaveArgs),

    /// List saved searches
    Saved {
        /// Output JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete a saved search by id
    Unsave {
        /// Saved search id
        id: i64,

        /// Output JSON
        #[arg(long)]
        json: bool,
    },

    /// Show recent searches
    History {
        /// Maximum entries to show
        #[arg(long)]
        limit: Option<usize>,

        /// Output JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete old search history
    ClearHistory {
        /// Remove entries older than this many days
        #[arg(long)]
        older_than_days: u32,

        /// Output JSON
        #[arg(long)]
        json: bool,
    },

    /// Rebuild both text indexes
    Reindex {
        /// Output JSON
        #[arg(long)]
        json: bool,
    },

    /// Record that a model was viewed now
    View {
        /// Model id or file path
        target: String,

        /// Output JSON
        #[arg(long)]
        json: bool,
    },

    /// Show stats
    Stats {
        /// Output JSON
        #[arg(long)]
        json: bool,
    },

    /// Run integrity and index consistency checks
    Doctor {
        /// Output JSON
        #[arg(long)]
        json: bool,
    },

    /// Print a shell completion script
    Completions {
        /// Target shell
        shell: Shell,
    },
}

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Query text
    #[arg(required_unless_present = "saved")]
    pub query: Option<String>,

    /// Structured filter, KEY=VALUE (repeatable; commas make a list)
    #[arg(long = "filter", value_name = "KEY=VALUE")]
    pub filters: Vec<String>,

    /// Page size
    #[arg(long)]
    pub limit: Option<usize>,

    /// Page offset
    #[arg(long, default_value_t = 0)]
    pub offset: usize,

    /// Run a saved search instead of QUERY
    #[arg(long, conflicts_with_all = ["query", "filters"])]
    pub saved: Option<String>,

    /// Output JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct SuggestArgs {
    /// Partial word (at least two characters)
    pub partial: String,

    /// Maximum suggestions
    #[arg(long)]
    pub limit: Option<usize>,

    /// Output JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct SaveArgs {
    /// Unique name; saving an existing name replaces it
    pub name: String,

    /// Query text
    pub query: String,

    /// Structured filter, KEY=VALUE (repeatable)
    #[arg(long = "filter", value_name = "KEY=VALUE")]
    pub filters: Vec<String>,

    /// Output JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Output path
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Output JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ImportArgs {
    /// JSONL file to import
    pub path: PathBuf,

    /// Output JSON
    #[arg(long)]
    pub json: bool,
}
