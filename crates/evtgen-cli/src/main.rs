use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process;

use clap::{Args, Parser, Subcommand};
use evtgen::{Completeness, EmitError, Emitter, EmitterConfig, Policy, Schema};
use evtgen_ast::LogicalNode;
use serde::Deserialize;

#[derive(Parser)]
#[command(name = "evtgen")]
#[command(about = "Generate event documents that trigger detection queries")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate documents for every query in a file
    ///
    /// The file holds one serialized query tree or a list of
    /// `{ name, query }` entries, as YAML or JSON. Documents are printed
    /// one per line; a summary goes to stderr.
    Generate {
        #[command(flatten)]
        opts: GenerateOpts,

        /// Pretty-print JSON output
        #[arg(short, long)]
        pretty: bool,

        /// Omit the @timestamp field
        #[arg(long)]
        no_timestamp: bool,

        /// Print per-node statistics to stderr when done
        #[arg(long)]
        stats: bool,
    },

    /// Print the index mapping of every field the queries touch
    Mappings {
        #[command(flatten)]
        opts: GenerateOpts,

        /// Print the mapping on a single line
        #[arg(long)]
        compact: bool,
    },
}

#[derive(Args)]
struct GenerateOpts {
    /// Query file (YAML or JSON), or `-` for stdin
    queries: PathBuf,

    /// Schema YAML file(s) layered over the built-in schema (can be specified multiple times)
    #[arg(short, long = "schema")]
    schemas: Vec<PathBuf>,

    /// Randomization level; 0 is deterministic
    #[arg(short, long, default_value_t = 0)]
    fuzziness: u32,

    /// Keep every alternative instead of one per disjunction
    #[arg(short, long)]
    complete: bool,

    /// Seed for reproducible output
    #[arg(long)]
    seed: Option<u64>,
}

/// A query file entry.
#[derive(Deserialize)]
struct NamedQuery {
    name: String,
    query: LogicalNode,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum QueryFile {
    Many(Vec<NamedQuery>),
    One(LogicalNode),
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Generate {
            opts,
            pretty,
            no_timestamp,
            stats,
        } => cmd_generate(opts, pretty, !no_timestamp, stats),
        Commands::Mappings { opts, compact } => cmd_mappings(opts, !compact),
    }
}

// ---------------------------------------------------------------------------
// Subcommand implementations
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Summary {
    queries: usize,
    documents: usize,
    unsupported: usize,
    failed: usize,
}

impl Summary {
    fn report(&self) {
        let ok = self.queries - self.unsupported - self.failed;
        eprintln!(
            "Generated {} document(s) for {ok}/{} queries ({} unsupported, {} failed)",
            self.documents, self.queries, self.unsupported, self.failed
        );
    }
}

fn cmd_generate(opts: GenerateOpts, pretty: bool, emit_timestamp: bool, stats: bool) {
    let queries = load_queries(&opts.queries);
    let mut emitter = build_emitter(&opts);
    let mut summary = Summary::default();

    for (name, query) in &queries {
        summary.queries += 1;
        match emitter.docs_from_ast(query, emit_timestamp) {
            Ok(branches) => {
                for doc in branches.iter().flatten() {
                    print_json(doc, pretty);
                    summary.documents += 1;
                }
            }
            Err(e) => record_failure(&mut summary, name, &e),
        }
    }

    summary.report();
    if stats {
        match serde_json::to_string_pretty(emitter.ast_stats()) {
            Ok(j) => eprintln!("{j}"),
            Err(e) => eprintln!("JSON serialization error: {e}"),
        }
    }
    if summary.failed > 0 {
        process::exit(1);
    }
}

fn cmd_mappings(opts: GenerateOpts, pretty: bool) {
    let queries = load_queries(&opts.queries);
    let mut emitter = build_emitter(&opts);
    let mut summary = Summary::default();

    for (name, query) in &queries {
        summary.queries += 1;
        match emitter.emit_docs(query) {
            Ok(docs) => summary.documents += docs.len(),
            Err(e) => record_failure(&mut summary, name, &e),
        }
    }

    print_json(&emitter.emit_mappings(), pretty);
    summary.report();
    if summary.failed > 0 {
        process::exit(1);
    }
}

fn record_failure(summary: &mut Summary, name: &str, err: &EmitError) {
    if err.is_unsupported() {
        summary.unsupported += 1;
        eprintln!("Unsupported: {name}: {err}");
    } else {
        summary.failed += 1;
        eprintln!("Failed: {name}: {err}");
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn build_emitter(opts: &GenerateOpts) -> Emitter {
    let mut schema = Schema::default();
    for path in &opts.schemas {
        match Schema::from_file(path) {
            Ok(s) => {
                log::info!("Loaded {} schema field(s) from {}", s.len(), path.display());
                schema.merge(s);
            }
            Err(e) => {
                eprintln!("Error loading schema {}: {e}", path.display());
                process::exit(1);
            }
        }
    }

    let completeness = if opts.complete {
        Completeness::Exhaustive
    } else {
        Completeness::Sampled
    };
    Emitter::with_config(
        schema,
        EmitterConfig {
            seed: opts.seed,
            policy: Policy {
                fuzziness: opts.fuzziness,
                completeness,
            },
            base_timestamp: None,
        },
    )
}

/// Read the query file and name every query; a lone query takes the file
/// stem as its name.
fn load_queries(path: &Path) -> Vec<(String, LogicalNode)> {
    let content = if path == Path::new("-") {
        let mut input = String::new();
        if let Err(e) = io::stdin().read_to_string(&mut input) {
            eprintln!("Error reading stdin: {e}");
            process::exit(1);
        }
        input
    } else {
        match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error reading {}: {e}", path.display());
                process::exit(1);
            }
        }
    };

    // YAML is a superset of JSON, so one parser covers both formats
    let parsed: QueryFile = match evtgen_ast::from_yaml_str(&content) {
        Ok(q) => q,
        Err(e) => {
            eprintln!("Error parsing {}: {e}", path.display());
            process::exit(1);
        }
    };

    let queries = match parsed {
        QueryFile::Many(entries) => entries.into_iter().map(|q| (q.name, q.query)).collect(),
        QueryFile::One(query) => {
            let name = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "query".to_string());
            vec![(name, query)]
        }
    };
    log::info!("Loaded {} query(ies) from {}", queries.len(), path.display());
    queries
}

fn print_json(value: &impl serde::Serialize, pretty: bool) {
    let json = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    match json {
        Ok(j) => println!("{j}"),
        Err(e) => {
            eprintln!("JSON serialization error: {e}");
            process::exit(1);
        }
    }
}
