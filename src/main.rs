use std::path::PathBuf;

use anyhow::Context;
use blackline::batch::{run_batch, BatchPaths, RunInputs};
use blackline::config::{peek_log_level, peek_pdfium_path};
use blackline::logging;
use blackline_core::CancelToken;
use blackline_oracle::{load_specification, PromptTemplate};
use clap::Parser;

/// Redacts every PDF in a folder as directed by a plain-text specification.
#[derive(Parser, Debug)]
#[command(name = "blackline", version, about)]
struct Cli {
    /// Folder with the PDFs to redact
    #[arg(long, default_value = "./input_pdfs")]
    input: PathBuf,

    /// Folder for the final documents and reports
    #[arg(long, default_value = "./output_pdfs")]
    output: PathBuf,

    /// Folder for the documents after the first pass
    #[arg(long, default_value = "./intermediate_pdfs")]
    intermediate: PathBuf,

    /// What to redact, in plain language
    #[arg(long, default_value = "./entities_to_redact.txt")]
    spec: PathBuf,

    /// Text prompt template
    #[arg(long, default_value = "./prompts/redaction_prompt.txt")]
    prompt: PathBuf,

    /// Image prompt template
    #[arg(long, default_value = "./prompts/redact_images_prompt.txt")]
    image_prompt: PathBuf,

    #[arg(long, default_value = "./config.json")]
    config: PathBuf,

    /// Folder for log files
    #[arg(long, default_value = "./logs")]
    logs: PathBuf,

    /// Skip the image pass
    #[arg(long)]
    no_images: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_path = logging::init(&cli.logs, peek_log_level(&cli.config).as_deref())?;
    log::info!("[Main] logging to {}", log_path.display());

    let specification = load_specification(&cli.spec)
        .with_context(|| format!("cannot load specification {}", cli.spec.display()))?;
    let text_prompt = PromptTemplate::load(&cli.prompt)
        .with_context(|| format!("cannot load prompt {}", cli.prompt.display()))?;
    let image_prompt = if cli.no_images {
        None
    } else {
        let prompt = PromptTemplate::load(&cli.image_prompt).with_context(|| {
            format!("cannot load image prompt {}", cli.image_prompt.display())
        })?;
        Some(prompt)
    };

    let pdfium = blackline_pdf::bind_pdfium(peek_pdfium_path(&cli.config).as_deref())
        .context("cannot load the pdfium library")?;

    let paths = BatchPaths {
        input: cli.input,
        output: cli.output,
        intermediate: cli.intermediate,
        config: cli.config,
    };
    let inputs = RunInputs {
        specification,
        text_prompt,
        image_prompt,
    };

    let result = run_batch(&pdfium, &paths, &inputs, &CancelToken::new())?;
    if !result.all_succeeded() {
        log::warn!("[Main] {} file(s) failed:", result.errors.len());
        for (file, reason) in &result.errors {
            log::warn!("[Main]   {}: {}", file.display(), reason);
        }
    }
    Ok(())
}
