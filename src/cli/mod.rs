//! GY-050: CLI subcommands (bake, magic, validate, ops, highlight, schema, completions).

use crate::core::chef::{BakeOptions, Chef, HighlightDirection};
use crate::core::config::EngineConfig;
use crate::core::dish::Dish;
use crate::core::dispatch;
use crate::core::operation::OperationRegistry;
use crate::core::recipe;
use crate::core::types::{BakeResult, OpConfig, RecipeFile, TypeTag};
use crate::magic::{Magic, MagicOptions, MagicResult};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Environment variable holding a tracing filter that overrides `-v` and the config file.
pub const LOG_ENV: &str = "GALLEY_LOG";

#[derive(Parser, Debug)]
#[command(
    name = "galley",
    version,
    about = "Recipe-driven data transformation: typed dish, flow control, speculative decoding"
)]
pub struct Cli {
    /// Engine configuration file (default: ./galley.toml if present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a recipe over one or more inputs
    Bake {
        /// Recipe file (YAML, or JSON by extension)
        #[arg(short, long)]
        recipe: PathBuf,

        /// Input files or glob patterns; stdin is read when none are given
        #[arg(short, long)]
        input: Vec<String>,

        /// Read an extra input from stdin
        #[arg(long)]
        stdin: bool,

        /// Stop before the step at this index
        #[arg(long)]
        step_to: Option<usize>,

        /// Write the output bytes unconverted
        #[arg(long)]
        raw: bool,

        /// Concurrent bakes for multiple inputs (0: from config)
        #[arg(long, default_value_t = 0)]
        workers: usize,
    },

    /// Guess which operations decode the input
    Magic {
        /// Input file (default: stdin)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Maximum chain length
        #[arg(long)]
        depth: Option<usize>,

        /// Also brute-force single-byte XOR keys and rotations
        #[arg(long)]
        intensive: bool,

        /// Score against every known language
        #[arg(long)]
        extensive: bool,

        /// Only report results matching this regex
        #[arg(long)]
        crib: Option<String>,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Parse a recipe and check its arguments without running it
    Validate {
        #[arg(short, long)]
        recipe: PathBuf,
    },

    /// List registered operations
    Ops {
        /// Only operations whose name contains this text (case-insensitive)
        filter: Option<String>,
    },

    /// Map a selection through a recipe
    Highlight {
        #[arg(short, long)]
        recipe: PathBuf,

        /// Selection start offset
        #[arg(long)]
        start: usize,

        /// Selection end offset (exclusive)
        #[arg(long)]
        end: usize,

        /// Map output offsets back to input offsets
        #[arg(long)]
        reverse: bool,
    },

    /// Print the recipe file JSON Schema
    Schema,

    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Tracing filter: `GALLEY_LOG` wins, then `-v`, then the configured level.
pub fn log_filter(verbose: u8, configured: &str) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_env(LOG_ENV) {
        return filter;
    }
    let level = match verbose {
        0 => configured,
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn"))
}

/// Load configuration, install logging and dispatch.
pub fn run(cli: Cli) -> Result<(), String> {
    let config = EngineConfig::discover(cli.config.as_deref()).map_err(|e| e.to_string())?;
    // Ignored when a subscriber is already installed
    let _ = tracing_subscriber::fmt()
        .with_env_filter(log_filter(cli.verbose, &config.logging.level))
        .with_writer(std::io::stderr)
        .try_init();
    dispatch(cli.command, config)
}

/// Dispatch a CLI command.
pub fn dispatch(cmd: Commands, config: EngineConfig) -> Result<(), String> {
    let chef = Chef::new(OperationRegistry::with_builtins(), config);
    let mut out = std::io::stdout().lock();
    match cmd {
        Commands::Bake {
            recipe,
            input,
            stdin,
            step_to,
            raw,
            workers,
        } => {
            let mut dishes = collect_inputs(&input)?;
            if stdin || dishes.is_empty() {
                dishes.push(("<stdin>".to_string(), read_stdin()?));
            }
            cmd_bake(&chef, &recipe, dishes, step_to, raw, workers, &mut out)
        }
        Commands::Magic {
            input,
            depth,
            intensive,
            extensive,
            crib,
            json,
        } => {
            let data = match input {
                Some(path) => read_file(&path)?,
                None => read_stdin()?,
            };
            let mut options = MagicOptions::from_config(&chef.config().magic);
            options.depth = depth.unwrap_or(options.depth);
            options.intensive |= intensive;
            options.extensive_languages |= extensive;
            options.crib = crib;
            cmd_magic(&chef, &data, options, json, &mut out)
        }
        Commands::Validate { recipe } => cmd_validate(&chef, &recipe, &mut out),
        Commands::Ops { filter } => cmd_ops(chef.registry(), filter.as_deref(), &mut out),
        Commands::Highlight {
            recipe,
            start,
            end,
            reverse,
        } => cmd_highlight(&chef, &recipe, start..end, reverse, &mut out),
        Commands::Schema => cmd_schema(&mut out),
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "galley", &mut out);
            Ok(())
        }
    }
}

// ============================================================================
// Inputs
// ============================================================================

fn read_file(path: &Path) -> Result<Vec<u8>, String> {
    std::fs::read(path).map_err(|e| format!("cannot read {}: {}", path.display(), e))
}

fn read_stdin() -> Result<Vec<u8>, String> {
    let mut buf = Vec::new();
    std::io::stdin()
        .read_to_end(&mut buf)
        .map_err(|e| format!("cannot read stdin: {}", e))?;
    Ok(buf)
}

/// Expand each argument as a glob when it contains wildcards, else as a path.
fn collect_inputs(patterns: &[String]) -> Result<Vec<(String, Vec<u8>)>, String> {
    let mut inputs = Vec::new();
    for pattern in patterns {
        if !pattern.contains(['*', '?', '[']) {
            inputs.push((pattern.clone(), read_file(Path::new(pattern))?));
            continue;
        }
        let paths = glob::glob(pattern).map_err(|e| format!("bad glob {}: {}", pattern, e))?;
        let mut matched = 0usize;
        for entry in paths {
            let path = entry.map_err(|e| e.to_string())?;
            if path.is_file() {
                inputs.push((path.display().to_string(), read_file(&path)?));
                matched += 1;
            }
        }
        if matched == 0 {
            return Err(format!("no files match {}", pattern));
        }
    }
    Ok(inputs)
}

fn load(path: &Path) -> Result<RecipeFile, String> {
    recipe::load_recipe(path).map_err(|e| e.to_string())
}

fn write_out(out: &mut dyn Write, bytes: &[u8]) -> Result<(), String> {
    out.write_all(bytes)
        .map_err(|e| format!("cannot write output: {}", e))
}

// ============================================================================
// Commands
// ============================================================================

fn cmd_bake(
    chef: &Chef,
    recipe_path: &Path,
    inputs: Vec<(String, Vec<u8>)>,
    step_to: Option<usize>,
    raw: bool,
    workers: usize,
    out: &mut dyn Write,
) -> Result<(), String> {
    let mut steps = load(recipe_path)?.recipe;
    if let Some(step) = step_to.and_then(|n| steps.get_mut(n)) {
        step.breakpoint = true;
    }
    let options = BakeOptions::returning(if raw {
        TypeTag::ArrayBuffer
    } else {
        TypeTag::String
    });

    let (names, dishes): (Vec<String>, Vec<Dish>) = inputs
        .into_iter()
        .map(|(name, data)| (name, Dish::from_bytes(data)))
        .unzip();
    debug!("baking {} input(s) with {} step(s)", dishes.len(), steps.len());
    let results = if dishes.len() == 1 {
        dishes
            .into_iter()
            .map(|d| chef.bake(d, &steps, &options))
            .collect()
    } else {
        dispatch::bake_all_blocking(Arc::new(chef.clone()), dishes, steps, options, workers)?
    };

    let total = results.len();
    let mut failed = 0usize;
    for (name, result) in names.iter().zip(results) {
        if total > 1 {
            write_out(out, format!("==> {} <==\n", name).as_bytes())?;
        }
        if let Some(err) = &result.error {
            eprintln!("error: {}: {}", name, err.display_str);
            failed += 1;
        }
        write_out(out, &output_bytes(result, raw)?)?;
        if total > 1 && !raw {
            write_out(out, b"\n")?;
        }
    }
    if failed > 0 {
        return Err(format!("{} of {} bake(s) failed", failed, total));
    }
    Ok(())
}

fn output_bytes(result: BakeResult, raw: bool) -> Result<Vec<u8>, String> {
    let mut dish = Dish::new(result.result);
    if raw {
        dish.get_bytes().map_err(|e| e.to_string())
    } else {
        dish.get_string()
            .map(String::into_bytes)
            .map_err(|e| e.to_string())
    }
}

/// `From Hex("Space") > From Base64(...)`, or `(input)` for the root.
fn describe_recipe(recipe: &[OpConfig]) -> String {
    if recipe.is_empty() {
        return "(input)".to_string();
    }
    recipe
        .iter()
        .map(|step| {
            let args: Vec<String> = step
                .args
                .iter()
                .map(|a| serde_json::to_string(a).unwrap_or_default())
                .collect();
            format!("{}({})", step.op, args.join(", "))
        })
        .collect::<Vec<_>>()
        .join(" > ")
}

fn describe_result(result: &MagicResult) -> String {
    let mut props = vec![format!("entropy {:.2}", result.entropy)];
    if let Some(ft) = result.file_type {
        props.push(format!("file type {} ({})", ft.name, ft.extension));
    }
    if let Some(lang) = result
        .language_scores
        .first()
        .filter(|_| crate::magic::heuristics::has_language(&result.language_scores))
    {
        props.push(format!("language {}", lang.lang));
    }
    if result.is_utf8 {
        props.push("valid UTF-8".to_string());
    }
    props.join(", ")
}

fn cmd_magic(
    chef: &Chef,
    data: &[u8],
    options: MagicOptions,
    json: bool,
    out: &mut dyn Write,
) -> Result<(), String> {
    let magic = Magic::new(chef.registry().clone(), options).map_err(|e| e.to_string())?;
    let results = magic.search(data);
    if json {
        let text = serde_json::to_string_pretty(&results).map_err(|e| e.to_string())?;
        return write_out(out, format!("{}\n", text).as_bytes());
    }
    if results.is_empty() {
        return write_out(
            out,
            b"Nothing of interest could be detected about the input data.\n",
        );
    }
    for (rank, result) in results.iter().enumerate() {
        let line = format!(
            "{:>2}. {}\n    {}\n    [{}]\n",
            rank + 1,
            describe_recipe(&result.recipe),
            result.data.escape_debug(),
            describe_result(result)
        );
        write_out(out, line.as_bytes())?;
    }
    Ok(())
}

fn cmd_validate(chef: &Chef, recipe_path: &Path, out: &mut dyn Write) -> Result<(), String> {
    let file = load(recipe_path)?;
    let ops = recipe::hydrate(&file.recipe, chef.registry()).map_err(|e| e.to_string())?;
    let flow = ops.iter().filter(|op| op.flow_control()).count();
    let line = format!(
        "OK: {} ({} steps, {} flow control)\n",
        file.name.as_deref().unwrap_or("recipe"),
        ops.len(),
        flow
    );
    write_out(out, line.as_bytes())
}

fn cmd_ops(
    registry: &OperationRegistry,
    filter: Option<&str>,
    out: &mut dyn Write,
) -> Result<(), String> {
    let filter = filter.map(str::to_lowercase);
    for op in registry.iter() {
        let meta = op.meta();
        if filter
            .as_deref()
            .is_some_and(|f| !meta.name.to_lowercase().contains(f))
        {
            continue;
        }
        let line = format!(
            "{:<28} {:<12} {} -> {}{}\n",
            meta.name,
            meta.module,
            meta.input_type,
            meta.output_type,
            if meta.flow_control { "  [flow]" } else { "" }
        );
        write_out(out, line.as_bytes())?;
    }
    Ok(())
}

fn cmd_highlight(
    chef: &Chef,
    recipe_path: &Path,
    range: std::ops::Range<usize>,
    reverse: bool,
    out: &mut dyn Write,
) -> Result<(), String> {
    let steps = load(recipe_path)?.recipe;
    let direction = if reverse {
        HighlightDirection::Reverse
    } else {
        HighlightDirection::Forward
    };
    let mapped = chef
        .calculate_highlights(&steps, direction, &[range])
        .ok_or_else(|| "recipe does not support highlighting".to_string())?;
    for r in mapped {
        write_out(out, format!("{}..{}\n", r.start, r.end).as_bytes())?;
    }
    Ok(())
}

fn cmd_schema(out: &mut dyn Write) -> Result<(), String> {
    let schema = schemars::schema_for!(RecipeFile);
    let text = serde_json::to_string_pretty(&schema).map_err(|e| e.to_string())?;
    write_out(out, format!("{}\n", text).as_bytes())
}
