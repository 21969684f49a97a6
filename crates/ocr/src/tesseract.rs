//! Tesseract OCR engine (CLI wrapper)

use std::process::Command;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use image::DynamicImage;

use crate::engine::OcrEngine;
use crate::error::OcrError;
use crate::types::{BBox, OcrWord, TesseractConfig};

static TEMP_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// Tesseract OCR engine
pub struct TesseractEngine {
    config: TesseractConfig,
    version: Option<String>,
}

impl TesseractEngine {
    /// Creates the engine, checking that the binary runs.
    pub fn new(config: TesseractConfig) -> Result<Self, OcrError> {
        let version = get_tesseract_version(config.binary_or_default())?;

        log::info!("[Tesseract] ready, version {}", version);

        Ok(Self {
            config,
            version: Some(version),
        })
    }

    fn run(&self, image_path: &str) -> Result<String, OcrError> {
        let mut cmd = Command::new(self.config.binary_or_default());

        cmd.arg(image_path)
            .arg("stdout")
            .arg("-l")
            .arg(self.config.lang_or_default())
            .arg("--psm")
            .arg(self.config.psm_or_default().to_string())
            .arg("--oem")
            .arg(self.config.oem_or_default().to_string())
            .arg("tsv");

        if let Some(tessdata_path) = &self.config.tessdata_path {
            cmd.env("TESSDATA_PREFIX", tessdata_path);
        }

        log::debug!(
            "[Tesseract] running: {} {} -l {} --psm {} --oem {} tsv",
            self.config.binary_or_default(),
            image_path,
            self.config.lang_or_default(),
            self.config.psm_or_default(),
            self.config.oem_or_default()
        );

        let output = cmd.output()?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OcrError::Engine(stderr.trim().to_string()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl OcrEngine for TesseractEngine {
    fn recognize_image(&mut self, img: &DynamicImage) -> Result<Vec<OcrWord>, OcrError> {
        let start = Instant::now();

        let temp_input = std::env::temp_dir().join(format!(
            "blackline_ocr_{}_{}.png",
            std::process::id(),
            TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        img.save(&temp_input)
            .map_err(|e| OcrError::ImageProcess(format!("failed to write temp image: {}", e)))?;

        let tsv = self.run(temp_input.to_string_lossy().as_ref());
        let _ = std::fs::remove_file(&temp_input);

        let results = parse_tesseract_tsv(&tsv?, img.width() as f32, img.height() as f32)?;

        log::info!(
            "[Tesseract] recognized {} word(s) in {} ms",
            results.len(),
            start.elapsed().as_millis()
        );

        Ok(results)
    }

    fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }
}

/// Parses Tesseract TSV output.
///
/// Columns:
/// level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext
///
/// Only word rows (level 5) with text and a confidence are kept; boxes are
/// normalized to the image size.
fn parse_tesseract_tsv(
    tsv: &str,
    img_width: f32,
    img_height: f32,
) -> Result<Vec<OcrWord>, OcrError> {
    if img_width <= 0.0 || img_height <= 0.0 {
        return Err(OcrError::Parse(format!(
            "invalid image size {}x{}",
            img_width, img_height
        )));
    }

    let mut results = Vec::new();

    for line in tsv.lines().skip(1) {
        let cols: Vec<&str> = line.split('\t').collect();
        if cols.len() < 12 {
            continue;
        }

        let level: i32 = cols[0].parse().unwrap_or(-1);
        let block: u32 = cols[2].parse().unwrap_or(0);
        let par: u32 = cols[3].parse().unwrap_or(0);
        let line_num: u32 = cols[4].parse().unwrap_or(0);
        let left: f32 = cols[6].parse().unwrap_or(0.0);
        let top: f32 = cols[7].parse().unwrap_or(0.0);
        let width: f32 = cols[8].parse().unwrap_or(0.0);
        let height: f32 = cols[9].parse().unwrap_or(0.0);
        let conf: f32 = cols[10].parse().unwrap_or(-1.0);
        let text = cols[11].trim();

        if level != 5 || text.is_empty() || conf < 0.0 {
            continue;
        }

        results.push(OcrWord {
            text: text.to_string(),
            confidence: conf / 100.0,
            bbox: BBox {
                x: left / img_width,
                y: top / img_height,
                w: width / img_width,
                h: height / img_height,
            },
            block,
            par,
            line: line_num,
        });
    }

    Ok(results)
}

/// Reads the Tesseract version from `--version`.
pub fn get_tesseract_version(binary_path: &str) -> Result<String, OcrError> {
    let output = Command::new(binary_path)
        .arg("--version")
        .output()
        .map_err(|e| OcrError::Unavailable(format!("{}: {}", binary_path, e)))?;

    if !output.status.success() {
        return Err(OcrError::Unavailable(format!(
            "{} --version exited with {}",
            binary_path, output.status
        )));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    Ok(parse_version(&format!("{}{}", stdout, stderr)))
}

/// "tesseract 5.3.0" or "tesseract v5.3.0", usually on the first line.
fn parse_version(output: &str) -> String {
    output
        .lines()
        .filter(|line| line.contains("tesseract"))
        .find_map(|line| line.split_whitespace().nth(1))
        .map(|v| v.trim_start_matches('v').to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::group_lines;

    #[test]
    fn test_parse_tsv_word_level() {
        let tsv = r#"level	page_num	block_num	par_num	line_num	word_num	left	top	width	height	conf	text
1	1	0	0	0	0	0	0	1000	1000	-1
4	1	1	1	1	0	100	200	120	20	-1
5	1	1	1	1	1	100	200	50	20	95.5	Hello
5	1	1	1	1	2	160	200	60	20	92.3	World
5	1	1	1	2	1	100	250	100	20	88.0	Test
5	1	1	1	2	2	210	250	10	20	-1
"#;
        let results = parse_tesseract_tsv(tsv, 1000.0, 1000.0).unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].text, "Hello");
        assert_eq!(results[1].text, "World");
        assert_eq!(results[2].text, "Test");
        assert_eq!((results[2].block, results[2].par, results[2].line), (1, 1, 2));

        assert!((results[0].bbox.x - 0.1).abs() < 0.001);
        assert!((results[0].bbox.y - 0.2).abs() < 0.001);
        assert!((results[0].bbox.w - 0.05).abs() < 0.001);
        assert!((results[0].confidence - 0.955).abs() < 0.001);

        let lines = group_lines(&results);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text, "Hello World");
    }

    #[test]
    fn test_parse_tsv_rejects_empty_image() {
        assert!(parse_tesseract_tsv("", 0.0, 10.0).is_err());
    }

    #[test]
    fn test_parse_version() {
        assert_eq!(parse_version("tesseract 5.3.0\n leptonica-1.82.0"), "5.3.0");
        assert_eq!(parse_version("tesseract v4.1.1"), "4.1.1");
        assert_eq!(parse_version("garbage"), "unknown");
    }
}
