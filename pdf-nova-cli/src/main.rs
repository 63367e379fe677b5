mod client;
mod queue;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use client::ApiClient;
use pdf_nova::operations::{
    self, BlankOptions, ConvertMode, OcrOptions, RotateOptions, RotationAngle, SplitOptions,
    VideoOptions, WatermarkOptions,
};
use pdf_nova::{
    format_bytes, pdf, registry, Artifact, Capabilities, FieldKind, NovaConfig, SizeReport,
    ToolLocator, Upload, Workspace,
};
use queue::FileQueue;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "pdfnova",
    about = "PDF toolbox: merge, split, convert, OCR and more",
    version,
    author
)]
struct Cli {
    /// JSON configuration file
    #[arg(long, global = true, env = "PDF_NOVA_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge PDFs in the order given
    Merge {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Split a PDF into parts of N pages (ZIP)
    Split {
        input: PathBuf,

        #[arg(short, long, default_value_t = 1)]
        chunk_size: usize,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Keep only the listed pages (e.g. "1-3,5")
    Extract {
        input: PathBuf,

        #[arg(short, long)]
        pages: String,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Rotate pages
    Rotate {
        input: PathBuf,

        /// Rotation angle (90, 180, 270)
        #[arg(short, long, default_value_t = 90)]
        angle: i64,

        /// Pages to rotate; empty means all
        #[arg(short, long, default_value = "")]
        pages: String,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Stamp diagonal text on every page
    Watermark {
        input: PathBuf,

        #[arg(short, long)]
        text: String,

        #[arg(long, default_value_t = 0.15)]
        opacity: f64,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// One page per image
    Images {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Recompress streams (light, balanced, aggressive)
    Compress {
        input: PathBuf,

        #[arg(short, long, default_value = "balanced")]
        level: String,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Drop pages with no visible content
    RemoveBlank {
        input: PathBuf,

        /// Largest content stream size (bytes) still counted as blank
        #[arg(long, default_value_t = 80)]
        threshold: usize,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Extract text, running OCR on pages without a text layer
    Ocr {
        input: PathBuf,

        #[arg(short, long, default_value = "fra+eng")]
        lang: String,

        #[arg(long, default_value_t = 40)]
        min_chars: usize,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Download a video you own the rights to
    Video {
        url: String,

        /// Platform label used in messages and the output name
        #[arg(short, long, default_value = "")]
        source: String,

        /// Confirm that you own the rights to this video
        #[arg(long)]
        owns_rights: bool,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Convert between PDF, Office and image formats
    Convert {
        input: PathBuf,

        /// image_to_pdf, office_to_pdf, pdf_to_docx, pdf_to_excel, pdf_to_images
        #[arg(short, long)]
        mode: String,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show information about a PDF file
    Info { input: PathBuf },

    /// List the available tools
    Tools,

    /// Report which external programs were found
    Capabilities,

    /// Run a tool on a PDF Nova server
    Submit {
        /// Tool id, as listed by `pdfnova tools`
        tool: String,

        files: Vec<PathBuf>,

        /// Form field as name=value; repeatable
        #[arg(short, long = "field", value_name = "NAME=VALUE")]
        fields: Vec<String>,

        /// Server base URL (defaults to PDF_NOVA_API, then localhost:8091)
        #[arg(long)]
        api: Option<String>,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pdf_nova=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = NovaConfig::load(cli.config.as_deref()).context("loading configuration")?;
    let limits = config.upload_limits();

    match cli.command {
        Commands::Merge { files, output } => {
            let uploads = read_all(&files)?;
            let artifact = operations::merge(&uploads, &limits)?;
            finish(artifact, &uploads, output)?;
        }

        Commands::Split {
            input,
            chunk_size,
            output,
        } => {
            let upload = read(&input)?;
            let artifact = operations::split(&upload, &SplitOptions { chunk_size })?;
            finish(artifact, &[upload], output)?;
        }

        Commands::Extract {
            input,
            pages,
            output,
        } => {
            let upload = read(&input)?;
            let artifact = operations::extract(&upload, &pages)?;
            finish(artifact, &[upload], output)?;
        }

        Commands::Rotate {
            input,
            angle,
            pages,
            output,
        } => {
            let upload = read(&input)?;
            let options = RotateOptions {
                angle: RotationAngle::from_degrees(angle)?,
                pages,
            };
            let artifact = operations::rotate(&upload, &options)?;
            finish(artifact, &[upload], output)?;
        }

        Commands::Watermark {
            input,
            text,
            opacity,
            output,
        } => {
            let upload = read(&input)?;
            let artifact = operations::watermark(&upload, &WatermarkOptions { text, opacity })?;
            finish(artifact, &[upload], output)?;
        }

        Commands::Images { files, output } => {
            let uploads = read_all(&files)?;
            let artifact = operations::images_to_pdf(&uploads, &limits)?;
            finish(artifact, &uploads, output)?;
        }

        Commands::Compress {
            input,
            level,
            output,
        } => {
            let upload = read(&input)?;
            let artifact = operations::compress(&upload, level.parse()?)?;
            finish(artifact, &[upload], output)?;
        }

        Commands::RemoveBlank {
            input,
            threshold,
            output,
        } => {
            let upload = read(&input)?;
            let options = BlankOptions {
                content_threshold: threshold,
            };
            let artifact = operations::remove_blank(&upload, &options)?;
            finish(artifact, &[upload], output)?;
        }

        Commands::Ocr {
            input,
            lang,
            min_chars,
            output,
        } => {
            let upload = read(&input)?;
            let (locator, workspace) = external(&config)?;
            let options = OcrOptions { lang, min_chars };
            let artifact = operations::ocr_text(&upload, &options, &locator, &workspace).await?;
            finish(artifact, &[upload], output)?;
        }

        Commands::Video {
            url,
            source,
            owns_rights,
            output,
        } => {
            let (locator, workspace) = external(&config)?;
            let options = VideoOptions {
                url,
                source,
                owns_rights,
            };
            let artifact = operations::video_extract(&options, &locator, &workspace).await?;
            finish(artifact, &[], output)?;
        }

        Commands::Convert {
            input,
            mode,
            output,
        } => {
            let mode: ConvertMode = mode.parse()?;
            let upload = read(&input)?;
            let (locator, workspace) = external(&config)?;
            let artifact = operations::convert(&upload, mode, &locator, &workspace).await?;
            finish(artifact, &[upload], output)?;
        }

        Commands::Info { input } => {
            let upload = read(&input)?;
            let doc = pdf::load(&upload)?;
            let pages = pdf::page_ids(&doc);

            println!("File: {}", input.display());
            println!("Size: {}", format_bytes(upload.len() as u64));
            println!("PDF version: {}", doc.version);
            println!("Pages: {}", pages.len());
            if let Some(first) = pages.first() {
                let media = pdf::media_box(&doc, *first);
                println!(
                    "First page: {:.0} x {:.0} pt, rotation {}",
                    media.width(),
                    media.height(),
                    pdf::rotation(&doc, *first)
                );
            }
        }

        Commands::Tools => {
            for tool in registry() {
                let gate = tool
                    .requires
                    .map(|c| format!(" (needs {c:?})"))
                    .unwrap_or_default();
                println!("{:<14} {:<20} {}{}", tool.id, tool.endpoint, tool.title, gate);
                for field in tool.fields {
                    let kind = match field.kind {
                        FieldKind::Text => "text",
                        FieldKind::Url => "url",
                        FieldKind::Number { .. } => "number",
                        FieldKind::Select { .. } => "select",
                        FieldKind::Checkbox => "checkbox",
                    };
                    println!("    --field {}=<{kind}>  {}", field.name, field.label);
                }
            }
        }

        Commands::Capabilities => {
            let capabilities = Capabilities::detect(&ToolLocator::from_config(&config)).await;
            println!("{}", serde_json::to_string_pretty(&capabilities)?);
        }

        Commands::Submit {
            tool,
            files,
            fields,
            api,
            output,
        } => {
            submit(&tool, &files, &fields, api.as_deref(), output, limits.max_files).await?;
        }
    }

    Ok(())
}

fn read(path: &Path) -> Result<Upload> {
    Upload::from_path(path).with_context(|| format!("reading {}", path.display()))
}

fn read_all(paths: &[PathBuf]) -> Result<Vec<Upload>> {
    paths.iter().map(|p| read(p)).collect()
}

fn external(config: &NovaConfig) -> Result<(ToolLocator, Workspace)> {
    let workspace = Workspace::create(&config.work_dir)
        .with_context(|| format!("creating a job directory in {}", config.work_dir.display()))?;
    Ok((ToolLocator::from_config(config), workspace))
}

/// Write the artifact and print what happened
fn finish(artifact: Artifact, inputs: &[Upload], output: Option<PathBuf>) -> Result<()> {
    let path = output.unwrap_or_else(|| PathBuf::from(&artifact.file_name));
    std::fs::write(&path, &artifact.data)
        .with_context(|| format!("writing {}", path.display()))?;

    let input_bytes = operations::input_bytes(inputs);
    if input_bytes > 0 {
        let sizes = SizeReport::new(input_bytes, artifact.len() as u64);
        println!("Wrote {} ({})", path.display(), sizes.summary());
    } else {
        println!("Wrote {} ({})", path.display(), format_bytes(artifact.len() as u64));
    }
    Ok(())
}

async fn submit(
    tool_id: &str,
    files: &[PathBuf],
    raw_fields: &[String],
    api: Option<&str>,
    output: Option<PathBuf>,
    max_files: usize,
) -> Result<()> {
    let tool = pdf_nova::tools::find(tool_id)
        .ok_or_else(|| anyhow!("Unknown tool '{tool_id}'. Run `pdfnova tools` for the list."))?;

    let mut queue = FileQueue::new(tool, max_files);
    match &mut queue {
        Some(queue) => {
            for path in files {
                if !queue.add(path)? {
                    eprintln!("Skipping duplicate {}", path.display());
                }
            }
            queue.validate()?;
        }
        None if !files.is_empty() => bail!("{tool_id} does not take files."),
        None => {}
    }

    let mut fields: Vec<(String, String)> = tool
        .fields
        .iter()
        .map(|f| (f.name.to_string(), f.default.to_string()))
        .collect();
    for raw in raw_fields {
        let (name, value) = raw
            .split_once('=')
            .ok_or_else(|| anyhow!("Field '{raw}' must look like name=value."))?;
        let Some(slot) = fields.iter_mut().find(|(n, _)| n == name) else {
            bail!("{tool_id} has no field '{name}'.");
        };
        slot.1 = value.to_string();
    }

    let client = ApiClient::discover(api).await?;
    let (file_field, staged) = match &queue {
        Some(queue) => (queue.field_name(), queue.files()),
        None => ("files", &[][..]),
    };
    let download = client
        .submit(tool.endpoint, &fields, file_field, staged)
        .await
        .with_context(|| format!("{} via {}", tool.title, client.base()))?;

    let path = download.save(output.as_deref())?;
    match &download.info {
        Some(info) if info.sizes.input_bytes > 0 => {
            println!("Wrote {} ({})", path.display(), info.sizes.summary())
        }
        _ => println!(
            "Wrote {} ({})",
            path.display(),
            format_bytes(download.data.len() as u64)
        ),
    }
    Ok(())
}
