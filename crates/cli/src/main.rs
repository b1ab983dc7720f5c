use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;

use textpager_core::config::{config_path, load_config, processing_options_from_config, AppConfig};
use textpager_core::encoding;
use textpager_core::prelude::*;
use textpager_core::progress::ProgressEvent;

#[derive(Parser)]
#[command(name = "textpager")]
#[command(about = "Paginate plain-text books into chapter-indexed HTML")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Process a text file into paginated HTML lines
    Process {
        /// Input file
        #[arg(required = true)]
        input: String,

        /// Write the processed book as JSON to this file
        #[arg(short, long)]
        output: Option<String>,

        /// Encoding label, skipping detection (e.g. gbk, utf-16le)
        #[arg(long)]
        encoding: Option<String>,

        /// Bytes decoded in the first phase
        #[arg(long)]
        chunk_size: Option<u64>,

        /// Page size in characters (Eastern) or words (Western)
        #[arg(long)]
        page_size: Option<usize>,

        /// Do not start a new page at each title
        #[arg(long)]
        no_title_break: bool,

        /// Skip the generated title page
        #[arg(long)]
        no_title_page: bool,
    },

    /// Detect encoding, script, book name and author
    Detect {
        /// Input file
        #[arg(required = true)]
        input: String,

        /// Encoding label, skipping detection
        #[arg(long)]
        encoding: Option<String>,
    },

    /// List the chapter titles found in a file
    Titles {
        /// Input file
        #[arg(required = true)]
        input: String,

        /// Encoding label, skipping detection
        #[arg(long)]
        encoding: Option<String>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Create default config file
    Init,
    /// Show current config
    Show,
    /// Set a config value
    Set {
        /// Config key (e.g. pagination.eastern_page_size)
        key: String,
        /// Value
        value: String,
    },
}

type CliResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let result = match &cli.command {
        Commands::Process {
            input,
            output,
            encoding,
            chunk_size,
            page_size,
            no_title_break,
            no_title_page,
        } => {
            let overrides = Overrides {
                encoding: encoding.clone(),
                chunk_size: *chunk_size,
                page_size: *page_size,
                no_title_break: *no_title_break,
                no_title_page: *no_title_page,
            };
            run_process(input, output.as_deref(), &overrides, cli.json)
        }
        Commands::Detect { input, encoding } => run_detect(input, encoding.as_deref(), cli.json),
        Commands::Titles { input, encoding } => run_titles(input, encoding.as_deref(), cli.json),
        Commands::Config { action } => run_config(action, cli.json),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Command-line settings layered over the config file.
#[derive(Default)]
struct Overrides {
    encoding: Option<String>,
    chunk_size: Option<u64>,
    page_size: Option<usize>,
    no_title_break: bool,
    no_title_page: bool,
}

fn build_options(overrides: &Overrides) -> Result<ProcessingOptions, Box<dyn std::error::Error + Send + Sync>> {
    let mut options = processing_options_from_config(&load_config());
    if let Some(label) = &overrides.encoding {
        encoding::resolve(&[], Some(label))?;
        options.encoding = Some(label.clone());
    }
    if let Some(size) = overrides.chunk_size {
        if size == 0 {
            return Err("--chunk-size must be greater than 0".into());
        }
        options.initial_chunk_size = size;
    }
    if let Some(size) = overrides.page_size {
        if size == 0 {
            return Err("--page-size must be greater than 0".into());
        }
        options.pagination.eastern_page_size = size;
        options.pagination.western_page_size = size;
    }
    if overrides.no_title_break {
        options.pagination.page_break_on_title = false;
    }
    if overrides.no_title_page {
        options.title_page = false;
    }
    Ok(options)
}

fn open_source(input: &str) -> Result<FileSource, Box<dyn std::error::Error + Send + Sync>> {
    let path = Path::new(input);
    if !path.is_file() {
        return Err(format!("Input file not found: {}", input).into());
    }
    Ok(FileSource::open(path)?)
}

fn progress_bar(total: u64, hidden: bool) -> ProgressBar {
    if hidden {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(total);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}")
            .expect("template is compile-time constant")
            .progress_chars("=> "),
    );
    bar
}

fn run_process(input: &str, output: Option<&str>, overrides: &Overrides, json: bool) -> CliResult {
    let options = build_options(overrides)?;
    let source = open_source(input)?;

    // Book JSON on stdout leaves no room for a bar.
    let bar = progress_bar(source.len(), json || output.is_none());
    let handle = bar.clone();
    let session = ProcessingSession::new(source, options).with_progress(move |event: ProgressEvent| {
        handle.set_message(event.operation);
        handle.set_position(event.current);
    });

    let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
    let book = runtime.block_on(process_in_background(session))?;
    bar.finish_and_clear();

    let Some(output) = output else {
        println!("{}", serde_json::to_string_pretty(&book)?);
        return Ok(());
    };

    std::fs::write(output, serde_json::to_string(&book)?)?;
    let pages = book.pages().len();
    if json {
        let summary = serde_json::json!({
            "output": output,
            "bookName": book.metadata.book_name,
            "author": book.metadata.author,
            "encoding": book.metadata.encoding,
            "lines": book.line_count(),
            "titles": book.titles.len(),
            "footnotes": book.footnotes.len(),
            "pages": pages,
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("{} -> {}", input, output);
        println!("Book: {}", book.metadata.book_name);
        if !book.metadata.author.is_empty() {
            println!("Author: {}", book.metadata.author);
        }
        println!("Encoding: {}", book.metadata.encoding);
        println!("Lines: {}", book.line_count());
        println!("Titles: {}", book.titles.len());
        println!("Footnotes: {}", book.footnotes.len());
        println!("Pages: {}", pages);
    }
    Ok(())
}

fn run_detect(input: &str, encoding: Option<&str>, json: bool) -> CliResult {
    let overrides = Overrides {
        encoding: encoding.map(str::to_string),
        ..Default::default()
    };
    let options = build_options(&overrides)?;
    let mut session = ProcessingSession::new(open_source(input)?, options);
    let meta = session.detect_metadata()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&meta)?);
    } else {
        println!("Book: {}", meta.book_name);
        if !meta.author.is_empty() {
            println!("Author: {}", meta.author);
        }
        println!("Encoding: {}", meta.encoding);
        println!("Script: {}", if meta.is_eastern { "eastern" } else { "western" });
    }
    Ok(())
}

fn run_titles(input: &str, encoding: Option<&str>, json: bool) -> CliResult {
    let overrides = Overrides {
        encoding: encoding.map(str::to_string),
        no_title_page: true,
        ..Default::default()
    };
    let options = build_options(&overrides)?;
    let mut session = ProcessingSession::new(open_source(input)?, options);
    let book = session.run_to_completion()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&book.titles)?);
    } else {
        if let Some(rule) = session.custom_rule() {
            println!("Inferred rule: {}", rule.pattern());
        }
        for title in &book.titles {
            println!("{:>7}  {}", title.line, title.text);
        }
        println!("{} titles", book.titles.len());
    }
    Ok(())
}

fn run_config(action: &ConfigAction, json: bool) -> CliResult {
    match action {
        ConfigAction::Init => {
            let path = config_path().ok_or("Could not determine config directory")?;
            if let Some(dir) = path.parent() {
                std::fs::create_dir_all(dir)?;
            }
            let default_cfg = AppConfig::default();
            let toml = toml::to_string_pretty(&default_cfg)?;
            std::fs::write(&path, toml)?;
            println!("Wrote default config to {}", path.display());
        }
        ConfigAction::Show => {
            let cfg = load_config();
            if json {
                println!("{}", serde_json::to_string_pretty(&cfg)?);
            } else {
                println!("{}", toml::to_string_pretty(&cfg)?);
            }
        }
        ConfigAction::Set { key, value } => {
            let path = config_path().ok_or("Could not determine config directory")?;
            let mut cfg: AppConfig = if path.exists() {
                let s = std::fs::read_to_string(&path)?;
                toml::from_str(&s).unwrap_or_else(|_| AppConfig::default())
            } else {
                AppConfig::default()
            };

            cfg.set(key, value)?;

            if let Some(dir) = path.parent() {
                std::fs::create_dir_all(dir)?;
            }
            let toml = toml::to_string_pretty(&cfg)?;
            std::fs::write(&path, toml)?;
            if !json {
                println!("Updated {}", key);
            }
        }
    }
    Ok(())
}
