use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::rc::Rc;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::LevelFilter;
use notify::{Event, RecursiveMode, Watcher};
use serde::Deserialize;

use dials::export::ExportFormat;
use dials::media::{ColorScheme, Viewport};
use dials::model::ContextualVariable;
use dials::sheet::Snapshot;
use dials::store::context_label;
use dials::value;
use dials::{Engine, EngineConfig, SnapshotHost};

#[derive(Parser)]
#[command(name = "dials", version = "0.3.0")]
#[command(about = "Dials — inspect and override contextual CSS custom properties")]
struct Cli {
    /// Log engine activity (debug level)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the custom properties in a stylesheet snapshot
    Inspect {
        /// Stylesheet snapshot (.json)
        snapshot: PathBuf,

        /// Only variables with more than one distinct value
        #[arg(long)]
        contextual: bool,

        /// Print the model as JSON
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        env: EnvArgs,
    },

    /// Replay a list of edits and print the resulting overrides
    Apply {
        /// Stylesheet snapshot (.json)
        snapshot: PathBuf,

        /// Edit list: [{ "name", "value", "context"?, "base"? }]
        #[arg(long)]
        edits: PathBuf,

        #[arg(long, value_enum, default_value_t = OutputFormat::Overrides)]
        format: OutputFormat,

        /// Write output to file instead of stdout
        #[arg(short)]
        o: Option<PathBuf>,

        #[command(flatten)]
        env: EnvArgs,
    },

    /// Re-run detection whenever the snapshot file changes
    Watch {
        /// Stylesheet snapshot (.json)
        snapshot: PathBuf,

        /// Quiet period before rescanning, in milliseconds
        #[arg(long, default_value_t = 100)]
        debounce: u64,

        #[command(flatten)]
        env: EnvArgs,
    },
}

/// The runtime environment the snapshot is evaluated under.
#[derive(Args)]
struct EnvArgs {
    /// Viewport width in CSS pixels
    #[arg(long, default_value_t = 1280.0)]
    width: f64,

    /// Viewport height in CSS pixels
    #[arg(long, default_value_t = 800.0)]
    height: f64,

    /// prefers-color-scheme: dark
    #[arg(long)]
    dark: bool,

    /// prefers-contrast: more
    #[arg(long)]
    high_contrast: bool,

    /// prefers-reduced-motion: reduce
    #[arg(long)]
    reduced_motion: bool,

    /// Treat this media query as matching verbatim (repeatable)
    #[arg(long = "match")]
    matching: Vec<String>,
}

impl EnvArgs {
    fn viewport(&self) -> Viewport {
        Viewport {
            width: self.width,
            height: self.height,
            color_scheme: if self.dark { ColorScheme::Dark } else { ColorScheme::Light },
            high_contrast: self.high_contrast,
            reduced_motion: self.reduced_motion,
            matching: self.matching.iter().map(|q| q.trim().to_string()).collect(),
            ..Viewport::default()
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// The override stylesheet as written to the page
    Overrides,
    /// CSS export of the changed variables
    Css,
    /// JSON export keyed by context
    Json,
}

/// One entry of an `--edits` file.
#[derive(Deserialize)]
struct Edit {
    name: String,
    value: String,
    /// Context key to target; the active context when absent.
    #[serde(default)]
    context: Option<String>,
    /// Edit the flat base layer instead of a context.
    #[serde(default)]
    base: bool,
}

fn main() {
    let cli = Cli::parse();

    let mut logger = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if cli.verbose {
        logger.filter_level(LevelFilter::Debug);
    }
    logger.init();

    let result = match cli.command {
        Commands::Inspect {
            snapshot,
            contextual,
            json,
            env,
        } => inspect(&snapshot, contextual, json, &env),
        Commands::Apply {
            snapshot,
            edits,
            format,
            o,
            env,
        } => apply(&snapshot, &edits, format, o.as_deref(), &env),
        Commands::Watch {
            snapshot,
            debounce,
            env,
        } => watch(&snapshot, debounce, &env),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

fn load_engine(path: &Path, env: &EnvArgs, config: EngineConfig) -> anyhow::Result<Engine<SnapshotHost>> {
    let snapshot = Snapshot::load(path).with_context(|| format!("loading {}", path.display()))?;
    let mut engine = Engine::with_config(SnapshotHost::new(snapshot, env.viewport()), config);
    let stats = engine.init(Rc::new(|| {}));
    if stats.skipped_sheets > 0 {
        eprintln!(
            "warning: {} of {} stylesheets could not be read",
            stats.skipped_sheets, stats.sheets
        );
    }
    Ok(engine)
}

// ── inspect ───────────────────────────────────────────────────────────

fn inspect(path: &Path, contextual: bool, json: bool, env: &EnvArgs) -> anyhow::Result<()> {
    let config = EngineConfig {
        include_uniform_variables: !contextual,
        ..EngineConfig::default()
    };
    let engine = load_engine(path, env, config)?;
    let listing = engine.listing();

    if json {
        let out: Vec<serde_json::Value> = listing
            .iter()
            .map(|var| {
                let mut entry = serde_json::to_value(var)?;
                if let Some(obj) = entry.as_object_mut() {
                    obj.insert(
                        "activeContext".into(),
                        engine.active_context_key(&var.name).into(),
                    );
                    obj.insert("kind".into(), serde_json::to_value(value::variable_kind(&var.value))?);
                }
                Ok(entry)
            })
            .collect::<Result<_, serde_json::Error>>()?;
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    if listing.is_empty() {
        eprintln!("no custom properties found");
        return Ok(());
    }
    for var in listing {
        print_variable(&engine, var);
    }
    Ok(())
}

fn print_variable(engine: &Engine<SnapshotHost>, var: &ContextualVariable) {
    let marker = if var.is_rewritten { " (contextual)" } else { "" };
    println!("{}: {}{marker}", var.name, var.value);

    let active = engine.active_context(&var.name);
    for ctx in &var.contexts {
        let label = context_label(ctx.key(), ctx.kind());
        let flag = if active == Some(ctx) { "*" } else { " " };
        println!(
            "  {flag} {label:<32} {:<24} {:>4}  {}",
            ctx.selector, ctx.specificity, ctx.value
        );
    }
}

// ── apply ─────────────────────────────────────────────────────────────

fn apply(
    path: &Path,
    edits_path: &Path,
    format: OutputFormat,
    out: Option<&Path>,
    env: &EnvArgs,
) -> anyhow::Result<()> {
    let raw = fs::read_to_string(edits_path)
        .with_context(|| format!("cannot read '{}'", edits_path.display()))?;
    let edits: Vec<Edit> = serde_json::from_str(&raw)
        .with_context(|| format!("malformed edit list '{}'", edits_path.display()))?;

    let mut engine = load_engine(path, env, EngineConfig::default())?;
    for edit in &edits {
        if edit.base {
            engine.set_base_value(&edit.name, &edit.value);
            continue;
        }
        let key = edit.context.as_deref();
        if engine
            .set_contextual_value(&edit.name, &edit.value, None, key)
            .is_none()
        {
            let target = key.unwrap_or("the active environment");
            eprintln!("warning: no context for {} in {target}; edit skipped", edit.name);
        }
    }

    let output = match format {
        OutputFormat::Overrides => engine.host().style_text().to_string(),
        OutputFormat::Css => engine.export(ExportFormat::Css),
        OutputFormat::Json => engine.export(ExportFormat::Json),
    };

    match out {
        Some(out_path) => {
            fs::write(out_path, &output)
                .with_context(|| format!("cannot write '{}'", out_path.display()))?;
            eprintln!("wrote {} ({} bytes)", out_path.display(), output.len());
        }
        None => println!("{output}"),
    }
    Ok(())
}

// ── watch ─────────────────────────────────────────────────────────────

fn watch(path: &Path, debounce: u64, env: &EnvArgs) -> anyhow::Result<()> {
    let config = EngineConfig {
        rescan_debounce_ms: debounce,
        ..EngineConfig::default()
    };
    let mut engine = load_engine(path, env, config)?;
    print_summary(&engine);

    let (tx, rx) = mpsc::channel();
    let mut watcher = notify::recommended_watcher(move |res: Result<Event, _>| {
        if let Ok(event) = res {
            if event.kind.is_modify() || event.kind.is_create() {
                let _ = tx.send(());
            }
        }
    })?;
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
    watcher.watch(dir, RecursiveMode::NonRecursive)?;

    eprintln!("watching {} for changes...", path.display());
    let start = Instant::now();
    loop {
        match rx.recv_timeout(Duration::from_millis(25)) {
            // A half-written file fails to parse; the next write event retries.
            Ok(()) => match Snapshot::load(path) {
                Ok(snapshot) => {
                    engine.host_mut().replace_snapshot(snapshot);
                    engine.note_stylesheet_mutation(start.elapsed());
                }
                Err(e) => eprintln!("warning: {e}"),
            },
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
        if engine.poll(start.elapsed()) {
            print_summary(&engine);
        }
    }
    Ok(())
}

fn print_summary(engine: &Engine<SnapshotHost>) {
    let total = engine.variables().count();
    let contextual = engine.contextual_variables().count();
    eprintln!("{total} variables, {contextual} contextual");
    for var in engine.contextual_variables() {
        match engine.active_context(&var.name) {
            Some(ctx) => {
                let value = engine
                    .store()
                    .value_for(&var.name, ctx.key())
                    .unwrap_or(ctx.value.as_str());
                let label = context_label(ctx.key(), ctx.kind());
                eprintln!("  {} = {value} [{label}]", var.name);
            }
            None => eprintln!("  {} = {} [-]", var.name, var.value),
        }
    }
}
