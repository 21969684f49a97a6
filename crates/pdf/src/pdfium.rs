//! Locating and binding the pdfium library.

use std::path::{Path, PathBuf};

use pdfium_render::prelude::*;

use crate::{PdfError, Result};

/// Directories searched for the platform pdfium library, in order.
fn get_pdfium_search_paths(configured: Option<&Path>) -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Some(path) = configured {
        paths.push(path.to_path_buf());
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            paths.push(exe_dir.join("libs"));
            paths.push(exe_dir.to_path_buf());

            #[cfg(target_os = "macos")]
            {
                if let Some(contents_dir) = exe_dir.parent() {
                    paths.push(contents_dir.join("Resources").join("libs"));
                }
            }
        }
    }

    paths.push(PathBuf::from("libs"));
    paths.push(PathBuf::from("./"));

    paths
}

/// Binds pdfium from the configured directory (or the library file itself),
/// the executable's directory, `./libs`, the working directory, then the
/// system library path.
pub fn bind_pdfium(configured: Option<&Path>) -> Result<Pdfium> {
    if let Some(path) = configured.filter(|p| p.is_file()) {
        log::debug!("[Pdfium] trying {:?}", path);
        match Pdfium::bind_to_library(path) {
            Ok(bindings) => {
                log::info!("[Pdfium] loaded {:?}", path);
                return Ok(Pdfium::new(bindings));
            }
            Err(e) => log::warn!("[Pdfium] could not load {:?}: {}", path, e),
        }
    }

    for dir in get_pdfium_search_paths(configured.filter(|p| p.is_dir())) {
        let lib_path = Pdfium::pdfium_platform_library_name_at_path(&dir);
        log::debug!("[Pdfium] trying {:?}", lib_path);

        if let Ok(bindings) = Pdfium::bind_to_library(&lib_path) {
            log::info!("[Pdfium] loaded from {:?}", dir);
            return Ok(Pdfium::new(bindings));
        }
    }

    log::debug!("[Pdfium] trying the system library");
    Pdfium::bind_to_system_library()
        .map(Pdfium::new)
        .map_err(|e| PdfError::PdfiumUnavailable(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configured_directory_is_searched_first() {
        let paths = get_pdfium_search_paths(Some(Path::new("/opt/pdfium")));
        assert_eq!(paths[0], PathBuf::from("/opt/pdfium"));
        assert!(paths.contains(&PathBuf::from("libs")));
        assert_eq!(paths.last(), Some(&PathBuf::from("./")));
    }
}
