//! Directory batch: every PDF in the input folder goes through both text
//! passes, the image pass and the final save, one file at a time.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use blackline_core::{
    CancelToken, CoreError, DocumentReport, ImageRegionRedactor, SlidingWindowResolver,
    TwoPassController,
};
use blackline_ocr::TesseractEngine;
use blackline_oracle::{OpenAiOracle, PromptTemplate};
use blackline_pdf::{OcrMode, PdfRedactionDocument};
use pdfium_render::prelude::Pdfium;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::config::AppConfig;

/// Folders and files a run works with.
#[derive(Debug, Clone)]
pub struct BatchPaths {
    pub input: PathBuf,
    pub output: PathBuf,
    pub intermediate: PathBuf,
    pub config: PathBuf,
}

/// Inputs shared by every document, loaded once before the batch starts.
#[derive(Debug, Clone)]
pub struct RunInputs {
    pub specification: String,
    pub text_prompt: PromptTemplate,
    /// `None` disables the image pass for the whole run.
    pub image_prompt: Option<PromptTemplate>,
}

#[derive(Debug, Default)]
pub struct BatchResult {
    pub processed: Vec<PathBuf>,
    pub errors: Vec<(PathBuf, String)>,
}

impl BatchResult {
    pub fn all_succeeded(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Per-document report written next to the output file.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileReport<'a> {
    pub file: String,
    pub input_sha256: String,
    pub output_sha256: String,
    pub unresolved: usize,
    #[serde(flatten)]
    pub report: &'a DocumentReport,
}

/// `.pdf` files (any case) directly inside `dir`, sorted by name.
pub fn discover_pdfs(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .filter(|p| {
            p.extension()
                .map(|ext| ext.eq_ignore_ascii_case("pdf"))
                .unwrap_or(false)
        })
        .collect();
    files.sort();
    Ok(files)
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

pub fn report_path(output_dir: &Path, input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    output_dir.join(format!("{}.report.json", stem))
}

/// Processes the input folder. A failing document is logged and recorded;
/// the batch moves on to the next one.
pub fn run_batch(
    pdfium: &Pdfium,
    paths: &BatchPaths,
    inputs: &RunInputs,
    cancel: &CancelToken,
) -> anyhow::Result<BatchResult> {
    let files = discover_pdfs(&paths.input)
        .with_context(|| format!("cannot list input folder {}", paths.input.display()))?;
    fs::create_dir_all(&paths.output)
        .with_context(|| format!("cannot create {}", paths.output.display()))?;
    fs::create_dir_all(&paths.intermediate)
        .with_context(|| format!("cannot create {}", paths.intermediate.display()))?;

    log::info!("[Batch] {} PDF file(s) in {}", files.len(), paths.input.display());

    let mut result = BatchResult::default();
    for file in files {
        if cancel.is_cancelled() {
            log::warn!("[Batch] cancelled before {}", file.display());
            break;
        }
        match process_file(pdfium, paths, inputs, cancel, &file) {
            Ok(output) => {
                log::info!("[Batch] {} -> {}", file.display(), output.display());
                result.processed.push(file);
            }
            Err(e) => {
                log::error!("[Batch] {} failed: {:#}", file.display(), e);
                result.errors.push((file, format!("{:#}", e)));
            }
        }
    }

    log::info!(
        "[Batch] done: {} processed, {} failed",
        result.processed.len(),
        result.errors.len()
    );
    Ok(result)
}

fn process_file(
    pdfium: &Pdfium,
    paths: &BatchPaths,
    inputs: &RunInputs,
    cancel: &CancelToken,
    file: &Path,
) -> anyhow::Result<PathBuf> {
    let name = file
        .file_name()
        .context("input path has no file name")?
        .to_os_string();
    let intermediate_path = paths.intermediate.join(&name);
    let output_path = paths.output.join(&name);

    // Reloaded per document so edits between files take effect.
    let config = AppConfig::load(&paths.config)?;

    let mut oracle = OpenAiOracle::new(
        config.openai.clone(),
        config.api_key(),
        inputs.text_prompt.clone(),
    )?;
    if let Some(prompt) = &inputs.image_prompt {
        oracle = oracle.with_image_prompt(prompt.clone());
    }

    let input_bytes = fs::read(file).with_context(|| format!("cannot read {}", file.display()))?;
    let input_sha256 = sha256_hex(&input_bytes);
    let mut doc = PdfRedactionDocument::from_bytes(pdfium, input_bytes)?;

    if config.ocr.mode != OcrMode::Off {
        match TesseractEngine::new(config.ocr.tesseract.clone()) {
            Ok(engine) => doc = doc.with_ocr(Box::new(engine), config.ocr.mode, config.ocr.dpi),
            Err(e) => log::warn!("[Batch] OCR unavailable, using text layers only: {}", e),
        }
    }

    let controller = TwoPassController::with_resolver(
        &oracle,
        &inputs.specification,
        SlidingWindowResolver::with_window(config.resolver.window_size),
    )
    .with_policy(config.on_oracle_error)
    .with_cancel_token(cancel.clone());

    let mut report = controller.run_with_checkpoint(&mut doc, |d| {
        d.write_to(&intermediate_path).map_err(CoreError::from)?;
        log::info!("[Batch] pass 1 written to {}", intermediate_path.display());
        Ok(())
    })?;

    if config.redact_images && inputs.image_prompt.is_some() {
        report.images = ImageRegionRedactor::new(&oracle, &inputs.specification)
            .with_cancel_token(cancel.clone())
            .run(&mut doc)?;
    }

    doc.save(&output_path)?;

    let unresolved = report.unresolved();
    for (page, resolution) in &unresolved {
        log::warn!("[Batch] page {}: could not place '{}'", page, resolution.target.text);
    }
    for leak in &report.leaks {
        log::warn!("[Batch] page {}: '{}' is still readable", leak.page, leak.text);
    }

    if config.write_reports {
        let file_report = FileReport {
            file: name.to_string_lossy().into_owned(),
            input_sha256,
            output_sha256: sha256_hex(doc.as_bytes()),
            unresolved: unresolved.len(),
            report: &report,
        };
        let path = report_path(&paths.output, file);
        let json = serde_json::to_string_pretty(&file_report)?;
        fs::write(&path, json).with_context(|| format!("cannot write {}", path.display()))?;
    }

    log::info!(
        "[Batch] {}: {} redaction(s), {} unresolved, {} leak(s)",
        name.to_string_lossy(),
        report.committed(),
        unresolved.len(),
        report.leaks.len()
    );
    Ok(output_path)
}
