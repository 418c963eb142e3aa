use anyhow::{Context, Result, anyhow, bail};
use clap::{ArgAction, Parser, ValueEnum};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

#[cfg(feature = "server")]
use crate::serve::{ServeArgs, run_serve};
use crate::payload::{export_json, export_xml, import_diagram};

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
    name = "archcanvas",
    about = "Render and convert system-design diagrams from the command line."
)]
pub struct RenderArgs {
    /// Path to the input diagram file (JSON or XML). Use '-' to read from stdin.
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

    /// Background color for the rendered diagram.
    #[arg(short = 'b', long = "background-color", default_value = "white")]
    background_color: String,

    /// Suppress informational output.
    #[arg(short = 'q', long = "quiet", action = ArgAction::SetTrue)]
    quiet: bool,
}

#[derive(Debug, Parser)]
#[command(
    name = "archcanvas convert",
    about = "Convert a diagram between the JSON and XML interchange forms."
)]
pub struct ConvertArgs {
    /// Path to the input diagram file. Use '-' to read from stdin.
    #[arg(short = 'i', long = "input")]
    input: Option<String>,

    /// Path to the output file. Use '-' to write to stdout.
    #[arg(short = 'o', long = "output")]
    output: Option<String>,

    /// Target interchange form.
    #[arg(long = "to", value_enum)]
    to: InterchangeArg,

    /// Suppress informational output.
    #[arg(short = 'q', long = "quiet", action = ArgAction::SetTrue)]
    quiet: bool,
}

#[derive(Debug, Parser)]
#[command(
    name = "archcanvas check",
    about = "Validate a diagram file without producing output."
)]
pub struct CheckArgs {
    /// Path to the diagram file. Use '-' to read from stdin.
    #[arg(short = 'i', long = "input")]
    input: Option<String>,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
enum OutputFormat {
    Svg,
    Png,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
enum InterchangeArg {
    Json,
    Xml,
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

#[cfg(feature = "server")]
pub async fn dispatch() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if args.get(1).map(|s| s.as_str()) == Some("serve") {
        let serve_args = ServeArgs::parse_from(
            std::iter::once(args[0].clone()).chain(args.iter().skip(2).cloned()),
        );
        return run_serve(serve_args).await;
    }
    dispatch_sync()
}

pub fn dispatch_sync() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    match args.get(1).map(|s| s.as_str()) {
        Some("serve") => Err(anyhow!(
            "'serve' command requires the 'server' feature to be enabled"
        )),
        Some("convert") => {
            let convert_args = ConvertArgs::parse_from(
                std::iter::once(args[0].clone()).chain(args.iter().skip(2).cloned()),
            );
            run_convert(convert_args)
        }
        Some("check") => {
            let check_args = CheckArgs::parse_from(
                std::iter::once(args[0].clone()).chain(args.iter().skip(2).cloned()),
            );
            run_check(check_args)
        }
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

fn run_render(cli: RenderArgs) -> Result<()> {
    let input_source = parse_input(cli.input.as_deref())?;
    let format_preference = if cli.png {
        Some(OutputFormat::Png)
    } else {
        cli.output_format
    };

    let output_dest = parse_output(cli.output.as_deref(), &input_source, format_preference)?;
    let format = determine_format(format_preference, &output_dest)?;

    if format == OutputFormat::Png && cli.scale <= 0.0 {
        bail!("--scale must be greater than zero for PNG output");
    }

    let contents = load_contents(&input_source)?;
    let diagram = import_diagram(&contents)?;

    let output_bytes = match format {
        OutputFormat::Svg => diagram.render_svg(&cli.background_color)?.into_bytes(),
        OutputFormat::Png => {
            #[cfg(feature = "raster")]
            {
                diagram.render_png(&cli.background_color, cli.scale)?
            }
            #[cfg(not(feature = "raster"))]
            {
                bail!("PNG output requires the 'raster' feature to be enabled");
            }
        }
    };

    write_output(output_dest, &output_bytes, cli.quiet)?;

    Ok(())
}

fn run_convert(cli: ConvertArgs) -> Result<()> {
    let input_source = parse_input(cli.input.as_deref())?;
    let contents = load_contents(&input_source)?;
    let diagram = import_diagram(&contents)?;

    let (serialized, extension) = match cli.to {
        InterchangeArg::Json => (export_json(&diagram), "json"),
        InterchangeArg::Xml => (export_xml(&diagram), "xml"),
    };

    let output_dest = match cli.output.as_deref() {
        Some("-") => OutputDestination::Stdout,
        Some(path_str) => OutputDestination::File(PathBuf::from(path_str)),
        None => match &input_source {
            InputSource::File(path) => {
                let mut default_path = path.clone();
                default_path.set_extension(extension);
                if default_path == *path {
                    bail!(
                        "refusing to overwrite '{}'; pass --output explicitly",
                        path.display()
                    );
                }
                OutputDestination::File(default_path)
            }
            InputSource::Stdin => OutputDestination::Stdout,
        },
    };

    write_output(output_dest, serialized.as_bytes(), cli.quiet)?;

    Ok(())
}

fn run_check(cli: CheckArgs) -> Result<()> {
    let input_source = parse_input(cli.input.as_deref())?;
    let contents = load_contents(&input_source)?;
    let diagram = import_diagram(&contents)?;

    println!(
        "OK: {} nodes, {} edges",
        diagram.nodes.len(),
        diagram.edges.len()
    );
    Ok(())
}

fn parse_input(input: Option<&str>) -> Result<InputSource> {
    match input {
        Some("-") => Ok(InputSource::Stdin),
        Some(path_str) => {
            let path = PathBuf::from(path_str);
            if !path.exists() {
                return Err(anyhow!("input file '{path_str}' does not exist"));
            }
            Ok(InputSource::File(path))
        }
        None => Ok(InputSource::Stdin),
    }
}

fn parse_output(
    output: Option<&str>,
    input: &InputSource,
    format_hint: Option<OutputFormat>,
) -> Result<OutputDestination> {
    match output {
        Some("-") => Ok(OutputDestination::Stdout),
        Some(path_str) => {
            let path = PathBuf::from(path_str);
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    return Err(anyhow!(
                        "output directory '{}' does not exist",
                        parent.display()
                    ));
                }
            }
            Ok(OutputDestination::File(path))
        }
        None => match input {
            InputSource::File(path) => {
                let ext = format_hint.unwrap_or(OutputFormat::Svg).extension();
                let default_name = path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .map(|name| format!("{name}.{ext}"))
                    .unwrap_or_else(|| format!("out.{ext}"));
                let mut default_path = path.to_path_buf();
                default_path.set_file_name(default_name);
                Ok(OutputDestination::File(default_path))
            }
            InputSource::Stdin => {
                let ext = format_hint.unwrap_or(OutputFormat::Svg).extension();
                Ok(OutputDestination::File(PathBuf::from(format!("out.{ext}"))))
            }
        },
    }
}

fn determine_format(
    preference: Option<OutputFormat>,
    output: &OutputDestination,
) -> Result<OutputFormat> {
    if let Some(fmt) = preference {
        return Ok(fmt);
    }

    match output {
        OutputDestination::Stdout => Ok(OutputFormat::Svg),
        OutputDestination::File(path) => OutputFormat::from_path(path).ok_or_else(|| {
            anyhow!(
                "unable to determine output format from '{}'; please specify --output-format",
                path.display()
            )
        }),
    }
}

fn load_contents(source: &InputSource) -> Result<String> {
    match source {
        InputSource::Stdin => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            if buffer.trim().is_empty() {
                Err(anyhow!("no diagram supplied on stdin"))
            } else {
                Ok(buffer)
            }
        }
        InputSource::File(path) => {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("failed to read '{}'", path.display()))?;
            if contents.trim().is_empty() {
                Err(anyhow!("input file '{}' was empty", path.display()))
            } else {
                Ok(contents)
            }
        }
    }
}

fn write_output(dest: OutputDestination, bytes: &[u8], quiet: bool) -> Result<()> {
    match dest {
        OutputDestination::Stdout => {
            let mut stdout = io::stdout();
            stdout.write_all(bytes)?;
            stdout.flush()?;
        }
        OutputDestination::File(path) => {
            fs::write(&path, bytes)?;
            if !quiet {
                println!("Generated diagram -> {}", path.display());
            }
        }
    }
    Ok(())
}
