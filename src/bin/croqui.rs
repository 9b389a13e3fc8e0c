//! CLI binary for croqui.
//!
//! A thin shim over the library crate: each subcommand maps its flags to a
//! library call and prints the result.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use croqui::{
    collect_into, export_routes, extract_guidebook, filter_routes, BrowseSession, Catalog,
    ExtractionConfig, ExtractionProgressCallback, Facets, LlmRouteExtractor, PageSelection,
    ProgressCallback, Route, TesseractCli, TextRecognizer, DEFAULT_CATALOG_PATH,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Live progress bar plus one log line per page. Pages may finish out of
/// order when several model calls are in flight.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
    skipped: AtomicUsize,
}

impl CliProgressCallback {
    /// Spinner until `on_run_start` tells us how many pages there are.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Rendering and reading pages…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            skipped: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Extracting");
        self.bar.reset_eta();
    }

    fn elapsed_secs(&self, page_num: usize) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut times| times.remove(&page_num))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_run_start(&self, total_pages: usize) {
        self.activate_bar(total_pages);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Extracting routes from {total_pages} pages…"))
        ));
    }

    fn on_page_start(&self, page_num: usize, _total: usize) {
        if let Ok(mut times) = self.start_times.lock() {
            times.insert(page_num, Instant::now());
        }
        self.bar.set_message(format!("page {page_num}"));
    }

    fn on_page_complete(&self, page_num: usize, total: usize, routes_found: usize) {
        let elapsed = self.elapsed_secs(page_num);
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {:<10}  {}",
            green("✓"),
            page_num,
            total,
            dim(&format!("{routes_found:>3} routes")),
            dim(&format!("{elapsed:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_page_skipped(&self, page_num: usize, total: usize, reason: &str) {
        let elapsed = self.elapsed_secs(page_num);
        self.skipped.fetch_add(1, Ordering::SeqCst);

        let msg: String = if reason.chars().count() > 80 {
            format!("{}\u{2026}", reason.chars().take(79).collect::<String>())
        } else {
            reason.to_string()
        };

        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}  {}",
            yellow("–"),
            page_num,
            total,
            dim(&msg),
            dim(&format!("{elapsed:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_run_complete(&self, total_pages: usize, extracted: usize) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {}/{} pages yielded routes  ({} skipped)",
            if extracted > 0 { green("✔") } else { yellow("⚠") },
            bold(&extracted.to_string()),
            total_pages,
            self.skipped.load(Ordering::SeqCst),
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract route fragments from a guidebook (pages 17 to 60)
  croqui extract --pdf guidebook.pdf --pages 17-60

  # Merge every fragment under output/ into the catalog
  croqui collect

  # List V3 routes in a sector
  croqui list --sector "Setor Seu Luiz" --grade V3

  # Cascading filter choices
  croqui options --sector "setor seu luiz"

  # Step through the routes of one block
  croqui browse --block "Bloco do Sapo" --images output/guidebook

  # Export the topo pages of the selection as a PDF
  croqui export --sector "Setor Seu Luiz" --images output/guidebook --out-dir exports

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY        OpenAI API key
  ANTHROPIC_API_KEY     Anthropic API key
  CROQUI_LLM_PROVIDER   Override provider (openai, anthropic, gemini, ollama)
  CROQUI_MODEL          Override model ID
  PDFIUM_LIB_PATH       Path to libpdfium (file or directory)
  RUST_LOG              Log filter, e.g. croqui=debug
"#;

/// Browse, filter and export climbing routes from a scanned guidebook.
#[derive(Parser, Debug)]
#[command(
    name = "croqui",
    version,
    about = "Browse, filter and export climbing routes from a scanned guidebook",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "CROQUI_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "CROQUI_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render, OCR and structure guidebook pages into `page_N.json` fragments.
    Extract(ExtractArgs),
    /// Merge all fragments into the consolidated catalog.
    Collect {
        /// Directory scanned recursively for fragments.
        #[arg(long, env = "CROQUI_OUTPUT_ROOT", default_value = "output")]
        root: PathBuf,
        /// Catalog file to write.
        #[arg(long, env = "CROQUI_CATALOG", default_value = DEFAULT_CATALOG_PATH)]
        out: PathBuf,
    },
    /// Print the routes matching the filters.
    List {
        #[command(flatten)]
        filters: FilterArgs,
        /// Print the routes as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Print the sector, block and grade choices for the given filters.
    Options {
        #[arg(long, env = "CROQUI_CATALOG", default_value = DEFAULT_CATALOG_PATH)]
        catalog: PathBuf,
        #[arg(long)]
        sector: Option<String>,
        #[arg(long)]
        block: Option<String>,
    },
    /// Step through matching routes one at a time.
    Browse {
        #[command(flatten)]
        filters: FilterArgs,
        /// Folder holding the guidebook's `page_N.png` images.
        #[arg(long, env = "CROQUI_IMAGES")]
        images: PathBuf,
    },
    /// Write the page images of the matching routes to a PDF.
    Export {
        #[command(flatten)]
        filters: FilterArgs,
        /// Folder holding the guidebook's `page_N.png` images.
        #[arg(long, env = "CROQUI_IMAGES")]
        images: PathBuf,
        /// Directory the PDF is written to.
        #[arg(long, env = "CROQUI_EXPORT_DIR", default_value = "exports")]
        out_dir: PathBuf,
    },
}

#[derive(Args, Debug)]
struct FilterArgs {
    /// Catalog file to read.
    #[arg(long, env = "CROQUI_CATALOG", default_value = DEFAULT_CATALOG_PATH)]
    catalog: PathBuf,
    /// Sector name (case and accents ignored).
    #[arg(long)]
    sector: Option<String>,
    /// Block name (case and accents ignored).
    #[arg(long)]
    block: Option<String>,
    /// Grade, matched exactly (e.g. V3).
    #[arg(long)]
    grade: Option<String>,
}

impl FilterArgs {
    fn apply(&self) -> Result<Vec<Route>> {
        let catalog = Catalog::load(&self.catalog)
            .with_context(|| format!("Failed to load catalog {}", self.catalog.display()))?;
        Ok(filter_routes(
            &catalog,
            self.grade.as_deref(),
            self.block.as_deref(),
            self.sector.as_deref(),
        ))
    }
}

#[derive(Args, Debug)]
struct ExtractArgs {
    /// Guidebook PDF.
    #[arg(long, env = "CROQUI_PDF")]
    pdf: PathBuf,

    /// Root folder; fragments go to `<output>/<pdf name>/`.
    #[arg(short, long, env = "CROQUI_OUTPUT_ROOT", default_value = "output")]
    output: PathBuf,

    /// Page selection: all, 5, 3-15, or 1,2,5-10.
    #[arg(short, long, env = "CROQUI_PAGES", default_value = "all")]
    pages: String,

    /// LLM model ID (e.g. gpt-4o-mini).
    #[arg(long, env = "CROQUI_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "CROQUI_PROVIDER")]
    provider: Option<String>,

    /// Rendering DPI (72–400).
    #[arg(long, env = "CROQUI_DPI", default_value_t = 150,
          value_parser = clap::value_parser!(u32).range(72..=400))]
    dpi: u32,

    /// Number of pages sent to the model at once.
    #[arg(short, long, env = "CROQUI_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// PDF user password for encrypted guidebooks.
    #[arg(long, env = "CROQUI_PASSWORD")]
    password: Option<String>,

    /// Path to a text file replacing the extraction prompt.
    #[arg(long, env = "CROQUI_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Max LLM output tokens per page.
    #[arg(long, env = "CROQUI_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "CROQUI_TEMPERATURE", default_value_t = 0.0)]
    temperature: f32,

    /// Retries per page on LLM failure.
    #[arg(long, env = "CROQUI_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Also send each page image to the model.
    #[arg(long, env = "CROQUI_ATTACH_IMAGE")]
    attach_image: bool,

    /// Tesseract language code (e.g. por).
    #[arg(long, env = "CROQUI_OCR_LANG")]
    ocr_lang: Option<String>,

    /// Print the run outcome as JSON.
    #[arg(long)]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "CROQUI_NO_PROGRESS")]
    no_progress: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The extraction progress bar replaces INFO logs unless -v is given.
    let show_progress = match cli.command {
        Command::Extract(ref args) => !cli.quiet && !args.no_progress && !args.json,
        _ => false,
    };
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::Extract(ref args) => run_extract(args, show_progress, cli.quiet).await,
        Command::Collect { ref root, ref out } => {
            let catalog = collect_into(root, out)
                .with_context(|| format!("Failed to build catalog from {}", root.display()))?;
            if !cli.quiet {
                eprintln!(
                    "{}  {} routes  →  {}",
                    green("✔"),
                    catalog.route_count(),
                    bold(&out.display().to_string())
                );
            }
            Ok(())
        }
        Command::List { ref filters, json } => {
            let routes = filters.apply()?;
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&routes).context("Failed to serialise routes")?
                );
            } else if routes.is_empty() {
                warn_no_matches();
            } else {
                for (i, route) in routes.iter().enumerate() {
                    println!("{:>4}  {}  {}", i, route.heading(), dim(&format!("p.{}", route.page_number)));
                }
            }
            Ok(())
        }
        Command::Options {
            ref catalog,
            ref sector,
            ref block,
        } => {
            let catalog = Catalog::load(catalog)
                .with_context(|| format!("Failed to load catalog {}", catalog.display()))?;
            println!("{}", bold("Sectors:"));
            print_choices(&Facets::sectors(&catalog));
            println!("{}", bold("Blocks:"));
            print_choices(&Facets::blocks(&catalog, sector.as_deref()));
            println!("{}", bold("Grades:"));
            print_choices(&Facets::grades(&catalog, block.as_deref()));
            Ok(())
        }
        Command::Browse {
            ref filters,
            ref images,
        } => browse(filters.apply()?, images),
        Command::Export {
            ref filters,
            ref images,
            ref out_dir,
        } => {
            let routes = filters.apply()?;
            if routes.is_empty() {
                warn_no_matches();
            }
            let path = export_routes(
                &routes,
                images,
                out_dir,
                filters.sector.as_deref(),
                filters.block.as_deref(),
                filters.grade.as_deref(),
            )
            .context("Export failed")?;
            println!("{}", path.display());
            Ok(())
        }
    }
}

async fn run_extract(args: &ExtractArgs, show_progress: bool, quiet: bool) -> Result<()> {
    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn ExtractionProgressCallback>)
    } else {
        None
    };

    let config = build_config(args, progress_cb).await?;
    let recognizer: Arc<dyn TextRecognizer> = Arc::new(TesseractCli::new(config.ocr_language.clone()));
    let mut extractor =
        LlmRouteExtractor::from_config(&config).context("No LLM provider available")?;
    if config.attach_page_image {
        extractor = extractor.with_page_images(croqui::pipeline::input::output_folder(
            &args.pdf,
            &args.output,
        ));
    }

    let output = extract_guidebook(&args.pdf, &args.output, &config, recognizer, &extractor)
        .await
        .context("Extraction failed")?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&output).context("Failed to serialise output")?
        );
    } else if !quiet {
        eprintln!(
            "   {} routes  ·  {} page images rendered  ·  {}ms  →  {}",
            bold(&output.stats.total_routes.to_string()),
            output.stats.rendered_images,
            output.stats.total_duration_ms,
            bold(&output.folder.display().to_string()),
        );
    }
    Ok(())
}

/// Map CLI args to `ExtractionConfig`.
async fn build_config(
    args: &ExtractArgs,
    progress: Option<ProgressCallback>,
) -> Result<ExtractionConfig> {
    let pages = PageSelection::parse(&args.pages).context("Invalid --pages")?;

    let mut builder = ExtractionConfig::builder()
        .dpi(args.dpi)
        .concurrency(args.concurrency)
        .pages(pages)
        .max_tokens(args.max_tokens)
        .temperature(args.temperature)
        .max_retries(args.max_retries)
        .attach_page_image(args.attach_image);

    if let Some(ref path) = args.system_prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read system prompt from {:?}", path))?;
        builder = builder.system_prompt(prompt);
    }
    if let Some(ref model) = args.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = args.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(ref password) = args.password {
        builder = builder.password(password.clone());
    }
    if let Some(ref lang) = args.ocr_lang {
        builder = builder.ocr_language(lang.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn warn_no_matches() {
    eprintln!(
        "{} No routes match the selected criteria. Please adjust your filters.",
        yellow("⚠")
    );
}

fn print_choices(choices: &[String]) {
    if choices.is_empty() {
        println!("  {}", dim("(none)"));
    }
    for choice in choices {
        println!("  {choice}");
    }
}

/// Line-oriented route browser: `n` next, `p` previous, a number selects,
/// `q` quits.
fn browse(routes: Vec<Route>, images: &Path) -> Result<()> {
    let mut session = BrowseSession::new(routes);
    if session.is_empty() {
        warn_no_matches();
        return Ok(());
    }

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        show_route(&session, images);
        print!("{} ", cyan("[n]ext [p]rev [#] select [q]uit >"));
        io::stdout().flush().context("Failed to write to stdout")?;

        let Some(line) = lines.next() else {
            return Ok(());
        };
        let line = line.context("Failed to read from stdin")?;
        match line.trim() {
            "q" | "quit" => return Ok(()),
            "n" | "" => session.next(),
            "p" => session.previous(),
            other => match other.parse::<usize>() {
                Ok(index) => {
                    if let Err(e) = session.select(index) {
                        eprintln!("{} {e}", yellow("⚠"));
                    }
                }
                Err(_) => eprintln!("{} unknown command '{other}'", yellow("⚠")),
            },
        }
    }
}

fn show_route(session: &BrowseSession, images: &Path) {
    let Some(route) = session.current() else {
        return;
    };
    println!();
    println!(
        "{}  {}",
        dim(&format!("[{}/{}]", session.cursor() + 1, session.len())),
        bold(&route.heading())
    );
    if !route.description.is_empty() {
        println!("{}", route.description);
    }
    let image = route.image_path(images);
    if image.is_file() {
        println!("{} {}", dim("Image:"), image.display());
    } else {
        println!("{}", dim("Image not available"));
    }
}
