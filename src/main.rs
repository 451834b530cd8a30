//! Book Index CLI
//!
//! Converts tab-indented text indices to JSON trees, delimited tables, or
//! SQLite, loads delimited tables into a database, and looks entries up in
//! a converted database.

use anyhow::{Context, Result};
use book_index::{
    IndexError,
    builder::{ContinuationPolicy, IndexEntry, ParseOptions, parse_document},
    config::Config,
    document::IndexDocument,
    persistence::{OutputFormat, file_size, load_table, load_tree, save_table, save_tree},
    store::{ConflictPolicy, IndexStore, LookupQuery, Publication},
    table::TableProjector,
    tree::IndexTree,
};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Book Index - converts text indices to alternative formats
#[derive(Parser)]
#[command(name = "book-index")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a text index; the output type follows the output file extension
    /// (json: tree, db/sqlite: database, anything else: delimited table)
    Convert {
        /// Path to the text index
        path: PathBuf,

        /// Path to the output file
        out_file: PathBuf,

        /// Field delimiter for delimited output
        #[arg(short, long)]
        delim: Option<String>,

        /// Separator between categories in the idx_text column
        #[arg(short, long)]
        index_delimiter: Option<String>,

        /// Version of the index (e.g. 'original' or 'improved')
        #[arg(short, long)]
        version: Option<String>,

        /// Behaviour on database record conflicts
        #[arg(short, long, value_parser = parse_conflict)]
        conflict: Option<ConflictPolicy>,

        /// Where pages-only continuation lines are merged ('pages' or 'note')
        #[arg(long, value_parser = parse_continuation)]
        continuation: Option<ContinuationPolicy>,

        #[command(flatten)]
        publication: PublicationArgs,
    },

    /// Load a delimited table written by 'convert' into a database
    Insert {
        /// Path to the SQLite database
        db: PathBuf,

        /// Path to the delimited table
        table: PathBuf,

        /// Field delimiter of the table
        #[arg(short, long)]
        delim: Option<String>,

        /// Version of the index; defaults to the table's version column
        #[arg(short, long)]
        version: Option<String>,

        /// Behaviour on database record conflicts
        #[arg(short, long, value_parser = parse_conflict)]
        conflict: Option<ConflictPolicy>,

        #[command(flatten)]
        publication: PublicationArgs,
    },

    /// Display the tree structure of an index
    Show {
        /// Path to a text index or a JSON tree
        path: PathBuf,

        /// Output as JSON instead of formatted tree
        #[arg(long)]
        json: bool,

        /// Where pages-only continuation lines are merged ('pages' or 'note')
        #[arg(long, value_parser = parse_continuation)]
        continuation: Option<ContinuationPolicy>,
    },

    /// Show information about an index
    Info {
        /// Path to a text index or a JSON tree
        path: PathBuf,

        /// Where pages-only continuation lines are merged ('pages' or 'note')
        #[arg(long, value_parser = parse_continuation)]
        continuation: Option<ContinuationPolicy>,
    },

    /// Search a converted database
    Search {
        /// Path to the SQLite database
        db: PathBuf,

        /// Substring of the entry text
        query: Option<String>,

        /// Restrict to one publication key
        #[arg(short = 'k', long)]
        pubkey: Option<String>,

        /// Substring of the entry path (idx_text)
        #[arg(short, long)]
        path: Option<String>,

        /// Maximum number of results
        #[arg(short, long, default_value_t = 50)]
        limit: usize,

        /// List publications instead of entries
        #[arg(long)]
        publications: bool,
    },
}

/// Publication metadata stored with database output.
#[derive(Args)]
struct PublicationArgs {
    /// Text primary key for this index (for 'insert', defaults to the table's pubkey column)
    #[arg(short = 'k', long)]
    pubkey: Option<String>,

    /// Path to the PDF of the text
    #[arg(short, long)]
    link: Option<String>,

    /// Abbreviation of the title (e.g. PHB, DMG)
    #[arg(short, long)]
    abbr: Option<String>,

    /// Offset from printed page to PDF page (e.g. 1, -2)
    #[arg(short = 'p', long, default_value_t = 0, allow_negative_numbers = true)]
    page_adjust: i64,

    /// Author(s) of the text
    #[arg(long)]
    author: Option<String>,

    /// Full title of the text (e.g. Player's Handbook)
    #[arg(long)]
    title: Option<String>,

    /// Edition of the text (e.g. 5th, 3.5)
    #[arg(long)]
    edition: Option<String>,

    /// Publisher of the text
    #[arg(long)]
    publisher: Option<String>,

    /// Month of publication
    #[arg(long)]
    month: Option<String>,

    /// Year of publication
    #[arg(long)]
    year: Option<i64>,

    /// Volume number
    #[arg(long)]
    volume: Option<String>,

    /// Series the text belongs to
    #[arg(long)]
    series: Option<String>,

    /// Address of the publisher
    #[arg(long)]
    address: Option<String>,

    /// Any additional information about the text
    #[arg(long)]
    note: Option<String>,

    /// ISBN of the text
    #[arg(long)]
    isbn: Option<String>,
}

impl PublicationArgs {
    fn into_publication(self, pubkey: String) -> Publication {
        Publication {
            pubkey,
            author: self.author,
            title: self.title,
            abbr: self.abbr,
            edition: self.edition,
            publisher: self.publisher,
            month: self.month,
            year: self.year,
            volume: self.volume,
            series: self.series,
            address: self.address,
            note: self.note,
            isbn: self.isbn,
            link: self.link,
            adjust: self.page_adjust,
        }
    }
}

fn parse_conflict(s: &str) -> std::result::Result<ConflictPolicy, String> {
    s.parse().map_err(|e: IndexError| e.to_string())
}

fn parse_continuation(s: &str) -> std::result::Result<ContinuationPolicy, String> {
    s.parse().map_err(|e: IndexError| e.to_string())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Convert {
            path,
            out_file,
            delim,
            index_delimiter,
            version,
            conflict,
            continuation,
            publication,
        } => {
            let mut config = Config::load().context("Failed to load configuration")?;
            if let Some(delim) = delim {
                config.convert.field_delimiter = delim;
            }
            if let Some(index_delimiter) = index_delimiter {
                config.convert.index_delimiter = index_delimiter;
            }
            if let Some(continuation) = continuation {
                config.convert.continuation = continuation;
            }
            if let Some(conflict) = conflict {
                config.store.conflict = conflict;
            }
            config.validate().context("Invalid configuration")?;

            cmd_convert(path, out_file, version, publication, &config)
        }
        Commands::Insert {
            db,
            table,
            delim,
            version,
            conflict,
            publication,
        } => {
            let mut config = Config::load().context("Failed to load configuration")?;
            if let Some(delim) = delim {
                config.convert.field_delimiter = delim;
            }
            if let Some(conflict) = conflict {
                config.store.conflict = conflict;
            }
            config.validate().context("Invalid configuration")?;

            cmd_insert(db, table, version, publication, &config)
        }
        Commands::Show {
            path,
            json,
            continuation,
        } => cmd_show(path, json, parse_options(continuation)?),
        Commands::Info { path, continuation } => cmd_info(path, parse_options(continuation)?),
        Commands::Search {
            db,
            query,
            pubkey,
            path,
            limit,
            publications,
        } => {
            let lookup = LookupQuery {
                entry: query,
                path,
                pubkey,
                limit,
            };
            cmd_search(db, lookup, publications)
        }
    }
}

fn cmd_convert(
    path: PathBuf,
    out_file: PathBuf,
    version: Option<String>,
    publication: PublicationArgs,
    config: &Config,
) -> Result<()> {
    let start = Instant::now();

    let options = ParseOptions {
        continuation: config.convert.continuation,
    };
    let (document, entries) = parse_index(&path, options)?;

    println!("Converting index: {}", path.display());
    println!("  Lines:    {}", document.line_count());
    println!("  Entries:  {}", entries.len());

    match OutputFormat::from_path(&out_file) {
        OutputFormat::Json => {
            let tree = IndexTree::from_entries(&document.name, &entries);
            save_tree(&tree, &out_file).context("Failed to save tree")?;
            println!("  Max depth: {}", tree.max_depth());
        }
        OutputFormat::Sqlite => {
            let pubkey = publication
                .pubkey
                .clone()
                .context("--pubkey is required for database output")?;
            let version = version.context("--version is required for database output")?;

            let projector = TableProjector::new(&config.convert.index_delimiter);
            let rows = projector.project(&entries);
            let publication = publication.into_publication(pubkey);

            let mut store = IndexStore::open(&out_file).context("Failed to open database")?;
            let summary = store
                .insert_index(&publication, &version, &rows, config.store.conflict)
                .context("Failed to insert index")?;

            println!("  {} rows inserted into table pub", summary.pub_rows);
            println!("  {} rows inserted into table indices", summary.index_rows);
        }
        OutputFormat::Delimited => {
            let projector = TableProjector::new(&config.convert.index_delimiter)
                .with_pubkey(publication.pubkey.clone())
                .with_version(version);
            let rows = projector.project(&entries);
            let delimiter = config.convert.field_delimiter_byte()?;
            save_table(&projector, &rows, &out_file, delimiter).context("Failed to save table")?;
        }
    }

    let size = file_size(&out_file)?;
    println!("\nOutput saved to: {}", out_file.display());
    println!("  File size: {:.1} KB", size as f64 / 1024.0);
    println!("  Time:      {:.2?}", start.elapsed());

    Ok(())
}

fn cmd_insert(
    db: PathBuf,
    table: PathBuf,
    version: Option<String>,
    publication: PublicationArgs,
    config: &Config,
) -> Result<()> {
    let delimiter = config.convert.field_delimiter_byte()?;
    let rows = load_table(&table, delimiter).context("Failed to load table")?;

    let first = rows.first();
    let pubkey = publication
        .pubkey
        .clone()
        .or_else(|| first.and_then(|r| r.pubkey.clone()))
        .context("--pubkey is required when the table has no pubkey column")?;
    let version = version
        .or_else(|| first.and_then(|r| r.version.clone()))
        .context("--version is required when the table has no version column")?;
    let publication = publication.into_publication(pubkey);

    let mut store = IndexStore::open(&db).context("Failed to open database")?;
    let summary = store
        .insert_index(&publication, &version, &rows, config.store.conflict)
        .context("Failed to insert index")?;

    println!("Inserting table: {}", table.display());
    println!("  {} rows inserted into table pub", summary.pub_rows);
    println!("  {} rows inserted into table indices", summary.index_rows);

    Ok(())
}

/// Parse options from the config file, with a command-line override.
fn parse_options(continuation: Option<ContinuationPolicy>) -> Result<ParseOptions> {
    let config = Config::load().context("Failed to load configuration")?;
    Ok(ParseOptions {
        continuation: continuation.unwrap_or(config.convert.continuation),
    })
}

/// Read and parse a text index, naming the offending line on failure.
fn parse_index(path: &Path, options: ParseOptions) -> Result<(IndexDocument, Vec<IndexEntry>)> {
    let document = IndexDocument::from_text_file(path).context("Failed to load index")?;
    let entries = parse_document(&document, options).map_err(|e: IndexError| {
        let context = match e.line() {
            Some(line) => format!("Failed to parse '{}' at line {}", path.display(), line),
            None => format!("Failed to parse '{}'", path.display()),
        };
        anyhow::Error::new(e).context(context)
    })?;
    Ok((document, entries))
}

/// Load a tree from a JSON export, or parse a text index into one.
fn load_any(path: &Path, options: ParseOptions) -> Result<IndexTree> {
    if OutputFormat::from_path(path) == OutputFormat::Json {
        return load_tree(path).context("Failed to load tree");
    }

    let (document, entries) = parse_index(path, options)?;
    Ok(IndexTree::from_entries(&document.name, &entries))
}

fn cmd_show(path: PathBuf, json: bool, options: ParseOptions) -> Result<()> {
    let tree = load_any(&path, options)?;

    if json {
        let json_str = tree.to_json().context("Failed to serialize tree")?;
        println!("{}", json_str);
    } else {
        println!("{}", tree.format());
    }

    Ok(())
}

fn cmd_info(path: PathBuf, options: ParseOptions) -> Result<()> {
    let tree = load_any(&path, options)?;

    println!("Index Information");
    println!("{}", "─".repeat(40));
    println!("  Name:         {}", tree.name);
    println!("  Top level:    {}", tree.nodes.len());
    println!("  Entries:      {}", tree.node_count());
    println!("  Leaves:       {}", tree.leaf_count());
    println!("  Max depth:    {}", tree.max_depth());
    println!("  Path:         {}", path.display());

    Ok(())
}

fn cmd_search(db: PathBuf, query: LookupQuery, publications: bool) -> Result<()> {
    if !db.exists() {
        anyhow::bail!(
            "Database not found at '{}'. Run 'convert' with a .db output first.",
            db.display()
        );
    }

    let store = IndexStore::open(&db).context("Failed to open database")?;

    if publications {
        let labels = store
            .publications(query.entry.as_deref())
            .context("Failed to list publications")?;
        for label in labels {
            println!("{:<12} {}", label.pubkey, label.label);
        }
        return Ok(());
    }

    let results = store.search(&query).context("Search failed")?;

    if results.is_empty() {
        println!("No matching entries found.");
        return Ok(());
    }

    println!("Results:");
    println!("{}", "─".repeat(60));
    for entry in &results {
        let page = entry.page.as_deref().unwrap_or("-");
        println!(
            "{} ({}) {:<8} {} [p. {}]",
            entry.pubkey, entry.version, entry.idx, entry.idx_text, page
        );
        if let Some(notes) = &entry.notes {
            println!("    {}", notes);
        }
        if let Some(printed) = first_page(page) {
            if let Some(target) = store.page_target(&entry.pubkey)? {
                if let Some(link) = &target.link {
                    println!("    {} (pdf page {})", link, target.pdf_page(printed));
                }
            }
        }
    }
    println!("{}", "─".repeat(60));
    println!("Found {} entries", results.len());

    Ok(())
}

/// First printed page number of a page specification, e.g. 6 for "6-8, 12".
fn first_page(page: &str) -> Option<i64> {
    page.split(|c: char| !c.is_ascii_digit())
        .next()
        .and_then(|n| n.parse().ok())
}
