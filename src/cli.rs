use anyhow::{Context, Result, anyhow, bail};
use clap::{ArgAction, Parser, ValueEnum};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[cfg(feature = "server")]
use oxtree::serve::{ServeArgs, run_serve};
use oxtree::render::render_svg;
use oxtree::{LayoutConfig, TreeSession, parse_entries};

#[derive(Debug, Clone, PartialEq, Eq)]
enum InputSource {
    Stdin,
    File(PathBuf),
}

#[derive(Debug, Clone)]
enum OutputDestination {
    Stdout,
    File(PathBuf),
}

#[derive(Debug, Parser)]
#[command(
    name = "oxtree",
    about = "Lay out a repository file tree and render it as a node-link diagram."
)]
pub struct RenderArgs {
    /// Tree listing (API tree JSON, entry array or plain path list). Use '-' to read from stdin.
    #[arg(short = 'i', long = "input")]
    input: Option<String>,

    /// Path to the output file. Use '-' to write to stdout.
    #[arg(short = 'o', long = "output")]
    output: Option<String>,

    /// Output format (defaults to the output file extension or svg).
    #[arg(short = 'e', long = "output-format")]
    output_format: Option<OutputFormat>,

    /// Convenience flag to force PNG output without specifying --output-format.
    #[arg(long = "png", action = ArgAction::SetTrue, conflicts_with = "output_format")]
    png: bool,

    /// Scale factor when rasterizing PNG output.
    #[arg(long = "scale", default_value_t = 2.0)]
    scale: f32,

    /// Label for the root node. Defaults to the input file stem.
    #[arg(long = "name")]
    name: Option<String>,

    /// Canvas width in pixels.
    #[arg(long = "width", default_value_t = 1280.0)]
    width: f32,

    /// Canvas height in pixels.
    #[arg(long = "height", default_value_t = 800.0)]
    height: f32,

    /// Remove a node and everything below it before rendering. Repeatable.
    #[arg(long = "hide", value_name = "PATH")]
    hide: Vec<String>,

    /// Highlight nodes whose name contains the query. Repeatable.
    #[arg(long = "highlight", value_name = "QUERY")]
    highlight: Vec<String>,

    /// Background color for the rendered diagram.
    #[arg(short = 'b', long = "background-color", default_value = "white")]
    background_color: String,

    /// Suppress informational output.
    #[arg(short = 'q', long = "quiet", action = ArgAction::SetTrue)]
    quiet: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
enum OutputFormat {
    Svg,
    Png,
}

impl OutputFormat {
    fn from_path(path: &Path) -> Option<Self> {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
        {
            Some(ext) if ext == "svg" => Some(OutputFormat::Svg),
            Some(ext) if ext == "png" => Some(OutputFormat::Png),
            _ => None,
        }
    }

    fn extension(self) -> &'static str {
        match self {
            OutputFormat::Svg => "svg",
            OutputFormat::Png => "png",
        }
    }
}

fn init_tracing(default_directive: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn run_render(cli: RenderArgs) -> Result<()> {
    let input_source = parse_input(cli.input.as_deref())?;
    let format_preference = if cli.png {
        Some(OutputFormat::Png)
    } else {
        cli.output_format
    };

    let target = OutputTarget::resolve(cli.output.as_deref(), &input_source, format_preference)?;

    if target.format == OutputFormat::Png && (cli.scale <= 0.0 || !cli.scale.is_finite()) {
        bail!("--scale must be greater than zero for PNG output");
    }
    if cli.width <= 0.0 || cli.height <= 0.0 || !cli.width.is_finite() || !cli.height.is_finite() {
        bail!("--width and --height must be greater than zero");
    }

    let listing = input_source.read_listing()?;
    let entries = parse_entries(&listing)
        .with_context(|| format!("failed to decode tree listing from {}", input_source.describe()))?;

    let name = cli
        .name
        .clone()
        .unwrap_or_else(|| default_root_name(&input_source));
    let mut session = TreeSession::new(
        &name,
        &entries,
        LayoutConfig::with_size(cli.width, cli.height),
    );

    for path in &cli.hide {
        let path = path.trim_matches('/');
        if !session.delete_node(path) {
            tracing::warn!(path, "--hide did not match a removable node");
        }
    }
    for query in &cli.highlight {
        if session.search(query) == 0 {
            tracing::warn!(query = %query, "--highlight matched no nodes");
        }
    }

    let output_bytes = match target.format {
        OutputFormat::Svg => render_svg(&session, &cli.background_color)?.into_bytes(),
        OutputFormat::Png => render_png_bytes(&session, &cli.background_color, cli.scale)?,
    };

    target.write(&output_bytes, cli.quiet)
}

#[cfg(feature = "png")]
fn render_png_bytes(session: &TreeSession, background: &str, scale: f32) -> Result<Vec<u8>> {
    oxtree::render::render_png(session, background, scale)
}

#[cfg(not(feature = "png"))]
fn render_png_bytes(_session: &TreeSession, _background: &str, _scale: f32) -> Result<Vec<u8>> {
    bail!("PNG output requires the 'png' feature to be enabled")
}

#[cfg(feature = "server")]
pub async fn dispatch() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    match args.get(1).map(|s| s.as_str()) {
        Some("serve") => {
            init_tracing("info");
            let serve_args = ServeArgs::parse_from(
                std::iter::once(args[0].clone()).chain(args.iter().skip(2).cloned()),
            );
            run_serve(serve_args).await
        }
        Some("render") => {
            init_tracing("warn");
            let render_args = RenderArgs::parse_from(
                std::iter::once(args[0].clone()).chain(args.iter().skip(2).cloned()),
            );
            run_render(render_args)
        }
        _ => {
            init_tracing("warn");
            let render_args = RenderArgs::parse_from(args);
            run_render(render_args)
        }
    }
}

#[cfg(not(feature = "server"))]
pub fn dispatch_sync() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    init_tracing("warn");
    match args.get(1).map(|s| s.as_str()) {
        Some("serve") => Err(anyhow!(
            "'serve' command requires the 'server' feature to be enabled"
        )),
        Some("render") => {
            let render_args = RenderArgs::parse_from(
                std::iter::once(args[0].clone()).chain(args.iter().skip(2).cloned()),
            );
            run_render(render_args)
        }
        _ => {
            let render_args = RenderArgs::parse_from(args);
            run_render(render_args)
        }
    }
}

fn parse_input(input: Option<&str>) -> Result<InputSource> {
    match input {
        None | Some("-") => Ok(InputSource::Stdin),
        Some(path_str) => {
            let path = PathBuf::from(path_str);
            if !path.exists() {
                bail!("input file '{path_str}' does not exist");
            }
            Ok(InputSource::File(path))
        }
    }
}

fn default_root_name(input: &InputSource) -> String {
    match input {
        InputSource::File(path) => path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "root".to_string()),
        InputSource::Stdin => "root".to_string(),
    }
}

impl InputSource {
    /// An empty listing is valid and renders a root-only tree.
    fn read_listing(&self) -> Result<String> {
        match self {
            InputSource::Stdin => {
                let mut buffer = String::new();
                io::stdin()
                    .read_to_string(&mut buffer)
                    .context("failed to read tree listing from stdin")?;
                Ok(buffer)
            }
            InputSource::File(path) => fs::read_to_string(path)
                .with_context(|| format!("failed to read '{}'", path.display())),
        }
    }

    fn describe(&self) -> String {
        match self {
            InputSource::File(path) => format!("'{}'", path.display()),
            InputSource::Stdin => "stdin".to_string(),
        }
    }
}

/// Where the diagram goes and in which format.
#[derive(Debug, Clone)]
struct OutputTarget {
    dest: OutputDestination,
    format: OutputFormat,
}

impl OutputTarget {
    /// An explicit format wins, then the output extension. Without `--output`
    /// a file input gets a sibling `<stem>.<format>` and stdin goes to stdout.
    fn resolve(
        output: Option<&str>,
        input: &InputSource,
        preference: Option<OutputFormat>,
    ) -> Result<Self> {
        let dest = match (output, input) {
            (Some("-"), _) | (None, InputSource::Stdin) => OutputDestination::Stdout,
            (Some(path_str), _) => {
                let path = PathBuf::from(path_str);
                match path.parent() {
                    Some(parent) if !parent.as_os_str().is_empty() && !parent.is_dir() => {
                        bail!("output directory '{}' does not exist", parent.display())
                    }
                    _ => OutputDestination::File(path),
                }
            }
            (None, InputSource::File(path)) => {
                let ext = preference.unwrap_or(OutputFormat::Svg).extension();
                OutputDestination::File(path.with_extension(ext))
            }
        };

        let format = match (preference, &dest) {
            (Some(format), _) => format,
            (None, OutputDestination::Stdout) => OutputFormat::Svg,
            (None, OutputDestination::File(path)) => {
                OutputFormat::from_path(path).ok_or_else(|| {
                    anyhow!(
                        "cannot infer a diagram format from '{}'; pass --output-format svg or png",
                        path.display()
                    )
                })?
            }
        };

        Ok(Self { dest, format })
    }

    fn write(&self, bytes: &[u8], quiet: bool) -> Result<()> {
        match &self.dest {
            OutputDestination::Stdout => {
                let mut stdout = io::stdout().lock();
                stdout.write_all(bytes)?;
                stdout.flush()?;
            }
            OutputDestination::File(path) => {
                fs::write(path, bytes)
                    .with_context(|| format!("failed to write '{}'", path.display()))?;
                if !quiet {
                    println!("Generated tree diagram -> {}", path.display());
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stdin_without_output_goes_to_stdout_as_svg() {
        let target = OutputTarget::resolve(None, &InputSource::Stdin, None).unwrap();
        assert!(matches!(target.dest, OutputDestination::Stdout));
        assert_eq!(target.format, OutputFormat::Svg);
    }

    #[test]
    fn file_input_defaults_to_sibling_with_format_extension() {
        let input = InputSource::File(PathBuf::from("listings/tree.json"));
        let target = OutputTarget::resolve(None, &input, Some(OutputFormat::Png)).unwrap();
        match target.dest {
            OutputDestination::File(path) => assert_eq!(path, PathBuf::from("listings/tree.png")),
            OutputDestination::Stdout => panic!("expected a file destination"),
        }
        assert_eq!(target.format, OutputFormat::Png);
    }

    #[test]
    fn format_follows_output_extension_unless_forced() {
        let target = OutputTarget::resolve(Some("diagram.PNG"), &InputSource::Stdin, None).unwrap();
        assert_eq!(target.format, OutputFormat::Png);

        let forced =
            OutputTarget::resolve(Some("diagram.png"), &InputSource::Stdin, Some(OutputFormat::Svg))
                .unwrap();
        assert_eq!(forced.format, OutputFormat::Svg);

        let err = OutputTarget::resolve(Some("diagram.txt"), &InputSource::Stdin, None).unwrap_err();
        assert!(err.to_string().contains("--output-format"));
    }

    #[test]
    fn missing_output_directory_is_rejected() {
        let err = OutputTarget::resolve(Some("no/such/dir/out.svg"), &InputSource::Stdin, None)
            .unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }
}
