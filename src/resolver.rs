//! # Size Resolution
//!
//! Turns the image path written in a mixin call into pixel dimensions. The
//! path is looked up under the configured images root first and, failing
//! that, anywhere in the workspace. When several files match, a
//! [`Disambiguator`] chooses; declining counts as "not found".

use crate::config::Config;
use crate::image_search;
use image::ImageReader;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Image not found: {file}")]
    NotFound { file: String },
    #[error("Reading the size of .{extension} files is not supported: {file}")]
    UnsupportedExtension { extension: String, file: String },
    #[error("Could not determine the SVG size (width/height or viewBox required): {file}")]
    SvgWithoutSize { file: String },
    #[error("Failed to read the image size of {file}: {reason}")]
    Decode { file: String, reason: String },
    #[error("Failed to read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Resolves an image path, as written in the source, to its intrinsic size.
pub trait SizeResolver {
    fn resolve(&mut self, file: &str) -> Result<ImageSize, ResolveError>;
}

/// Chooses among several files matching the same image path.
pub trait Disambiguator {
    /// Returns the index of the chosen candidate, or `None` to decline.
    fn pick(&mut self, file: &str, candidates: &[PathBuf]) -> Option<usize>;
}

impl<F> Disambiguator for F
where
    F: FnMut(&str, &[PathBuf]) -> Option<usize>,
{
    fn pick(&mut self, file: &str, candidates: &[PathBuf]) -> Option<usize> {
        self(file, candidates)
    }
}

/// Declines every choice. Used when nobody can be asked.
pub struct DeclinePicker;

impl Disambiguator for DeclinePicker {
    fn pick(&mut self, file: &str, candidates: &[PathBuf]) -> Option<usize> {
        info!(file, count = candidates.len(), "ambiguous image path, not asking");
        None
    }
}

/// Resolves images on the local file system.
pub struct FsResolver {
    root: PathBuf,
    images_root: PathBuf,
    glob_fallback: bool,
    unsupported_extensions: Vec<String>,
    picker: Box<dyn Disambiguator>,
}

impl FsResolver {
    pub fn new(root: &Path, config: &Config, picker: Box<dyn Disambiguator>) -> Self {
        Self {
            root: root.to_path_buf(),
            images_root: root.join(&config.images_root),
            glob_fallback: config.glob_fallback,
            unsupported_extensions: config
                .unsupported_extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_lowercase())
                .collect(),
            picker,
        }
    }

    fn locate(&mut self, file: &str) -> Result<PathBuf, ResolveError> {
        let not_found = || ResolveError::NotFound {
            file: file.to_string(),
        };
        let relative = file.trim_start_matches('/');

        let direct = self.images_root.join(relative);
        if direct.is_file() {
            return Ok(direct);
        }
        if !self.glob_fallback {
            return Err(not_found());
        }

        let matches = image_search::find_by_suffix(&self.root, relative);
        let chosen = match matches.as_slice() {
            [] => None,
            [only] => Some(only),
            many => self
                .picker
                .pick(file, many)
                .and_then(|index| many.get(index)),
        };
        chosen.map(|m| self.root.join(m)).ok_or_else(not_found)
    }
}

impl SizeResolver for FsResolver {
    fn resolve(&mut self, file: &str) -> Result<ImageSize, ResolveError> {
        let path = self.locate(file)?;
        debug!(file, path = %path.display(), "located image");
        let size = measure(&path, file, &self.unsupported_extensions)?;
        info!(file, width = size.width, height = size.height, "resolved image size");
        Ok(size)
    }
}

/// Reads the dimensions of the image at `path`. `file` is the name used in
/// error messages.
pub fn measure(
    path: &Path,
    file: &str,
    unsupported_extensions: &[String],
) -> Result<ImageSize, ResolveError> {
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    if unsupported_extensions.contains(&extension) {
        return Err(ResolveError::UnsupportedExtension {
            extension,
            file: file.to_string(),
        });
    }

    if extension == "svg" {
        let svg = fs::read_to_string(path).map_err(|source| ResolveError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        return parse_svg_size(&svg).ok_or_else(|| ResolveError::SvgWithoutSize {
            file: file.to_string(),
        });
    }

    // The format is sniffed from the content; the extension is only a hint.
    let io_error = |source| ResolveError::Io {
        path: path.to_path_buf(),
        source,
    };
    let (width, height) = ImageReader::open(path)
        .map_err(io_error)?
        .with_guessed_format()
        .map_err(io_error)?
        .into_dimensions()
        .map_err(|e| ResolveError::Decode {
            file: file.to_string(),
            reason: e.to_string(),
        })?;
    if width == 0 || height == 0 {
        return Err(ResolveError::Decode {
            file: file.to_string(),
            reason: format!("image reports a size of {width}x{height}"),
        });
    }
    Ok(ImageSize { width, height })
}

static SVG_ROOT_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<svg\b[^>]*>").expect("Invalid regex"));
static PX_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^([0-9]+(?:\.[0-9]+)?)(?:px)?$").expect("Invalid regex"));

fn svg_attr<'a>(tag: &'a str, name: &str) -> Option<&'a str> {
    let pattern = format!(r#"(?i)\s{name}\s*=\s*["']([^"']+)["']"#);
    let re = Regex::new(&pattern).ok()?;
    re.captures(tag)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim())
}

/// `100` and `100px` are pixels; percentages and other units are not.
fn parse_px(value: &str) -> Option<u32> {
    let number: f64 = PX_NUMBER.captures(value)?.get(1)?.as_str().parse().ok()?;
    let rounded = number.round();
    (rounded >= 1.0 && rounded <= f64::from(u32::MAX)).then_some(rounded as u32)
}

/// Size of an SVG document from its root element: explicit `width` and
/// `height` first, then the `viewBox`.
pub fn parse_svg_size(svg: &str) -> Option<ImageSize> {
    let tag = SVG_ROOT_TAG.find(svg)?.as_str();

    let width = svg_attr(tag, "width").and_then(parse_px);
    let height = svg_attr(tag, "height").and_then(parse_px);
    if let (Some(width), Some(height)) = (width, height) {
        return Some(ImageSize { width, height });
    }

    let view_box: Vec<f64> = svg_attr(tag, "viewBox")?
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|part| !part.is_empty())
        .map(str::parse::<f64>)
        .collect::<Result<_, _>>()
        .ok()?;
    let [_, _, w, h] = view_box.as_slice() else {
        return None;
    };
    if !w.is_finite() || !h.is_finite() {
        return None;
    }
    let (w, h) = (w.round(), h.round());
    (w >= 1.0 && h >= 1.0).then(|| ImageSize {
        width: w as u32,
        height: h as u32,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;
    use tempfile::Builder;

    fn config() -> Config {
        Config {
            images_root: "app/assets/images".to_string(),
            ..Config::default()
        }
    }

    fn write_png(path: &Path, width: u32, height: u32) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        image::RgbImage::new(width, height).save(path).unwrap();
    }

    #[test]
    fn test_svg_width_and_height() {
        let svg = r#"<?xml version="1.0"?><svg xmlns="http://www.w3.org/2000/svg" width="120px" height='80.4' viewBox="0 0 10 10"><rect width="5" height="5"/></svg>"#;
        assert_eq!(
            parse_svg_size(svg),
            Some(ImageSize {
                width: 120,
                height: 80
            })
        );
    }

    #[test]
    fn test_svg_falls_back_to_view_box() {
        let svg = "<svg\n  width=\"100%\"\n  stroke-width=\"2\"\n  viewBox=\"0,0, 24.6 12\">\n</svg>";
        assert_eq!(
            parse_svg_size(svg),
            Some(ImageSize {
                width: 25,
                height: 12
            })
        );
    }

    #[test]
    fn test_svg_without_size() {
        assert_eq!(parse_svg_size("<svg><rect width=\"5\" height=\"5\"/></svg>"), None);
        assert_eq!(parse_svg_size("<svg viewBox=\"0 0 0 10\"></svg>"), None);
        assert_eq!(parse_svg_size("<svg viewBox=\"0 0 10\"></svg>"), None);
        assert_eq!(parse_svg_size("not an svg"), None);
    }

    #[test]
    fn test_measure_png_and_unsupported() {
        let tmp_dir = Builder::new().prefix("test-measure").tempdir().unwrap();
        let png = tmp_dir.path().join("a.png");
        write_png(&png, 7, 3);
        assert_eq!(
            measure(&png, "a.png", &[]).unwrap(),
            ImageSize {
                width: 7,
                height: 3
            }
        );

        let avif = tmp_dir.path().join("a.AVIF");
        fs::write(&avif, "").unwrap();
        assert!(matches!(
            measure(&avif, "a.AVIF", &["avif".to_string()]),
            Err(ResolveError::UnsupportedExtension { extension, .. }) if extension == "avif"
        ));

        let broken = tmp_dir.path().join("broken.png");
        fs::write(&broken, "not a png").unwrap();
        assert!(matches!(
            measure(&broken, "broken.png", &[]),
            Err(ResolveError::Decode { .. })
        ));
    }

    #[test]
    fn test_measure_sniffs_format_from_content() {
        let tmp_dir = Builder::new().prefix("test-measure").tempdir().unwrap();
        let png = tmp_dir.path().join("real.png");
        write_png(&png, 9, 4);
        let misnamed = tmp_dir.path().join("photo.jpg");
        fs::rename(&png, &misnamed).unwrap();

        assert_eq!(
            measure(&misnamed, "photo.jpg", &[]).unwrap(),
            ImageSize {
                width: 9,
                height: 4
            }
        );
    }

    #[test]
    fn test_resolver_prefers_images_root() {
        let tmp_dir = Builder::new().prefix("test-resolver").tempdir().unwrap();
        let root = tmp_dir.path();
        write_png(&root.join("app/assets/images/top/hero.png"), 40, 20);
        write_png(&root.join("public/top/hero.png"), 10, 10);

        let mut resolver = FsResolver::new(root, &config(), Box::new(DeclinePicker));
        assert_eq!(
            resolver.resolve("top/hero.png").unwrap(),
            ImageSize {
                width: 40,
                height: 20
            }
        );
        assert_eq!(
            resolver.resolve("/top/hero.png").unwrap(),
            ImageSize {
                width: 40,
                height: 20
            }
        );
    }

    #[test]
    fn test_resolver_falls_back_to_workspace_search() {
        let tmp_dir = Builder::new().prefix("test-resolver").tempdir().unwrap();
        let root = tmp_dir.path();
        write_png(&root.join("public/img/logo.png"), 12, 6);

        let mut resolver = FsResolver::new(root, &config(), Box::new(DeclinePicker));
        assert_eq!(
            resolver.resolve("logo.png").unwrap(),
            ImageSize {
                width: 12,
                height: 6
            }
        );
        assert!(matches!(
            resolver.resolve("missing.png"),
            Err(ResolveError::NotFound { .. })
        ));

        let no_fallback = Config {
            glob_fallback: false,
            ..config()
        };
        let mut resolver = FsResolver::new(root, &no_fallback, Box::new(DeclinePicker));
        assert!(matches!(
            resolver.resolve("logo.png"),
            Err(ResolveError::NotFound { .. })
        ));
    }

    #[test]
    fn test_resolver_asks_on_ambiguity() {
        let tmp_dir = Builder::new().prefix("test-resolver").tempdir().unwrap();
        let root = tmp_dir.path();
        write_png(&root.join("a/icon.png"), 1, 1);
        write_png(&root.join("b/icon.png"), 2, 2);

        let asked = Rc::new(RefCell::new(Vec::new()));
        let seen = Rc::clone(&asked);
        let picker = move |file: &str, candidates: &[PathBuf]| {
            seen.borrow_mut().push((file.to_string(), candidates.to_vec()));
            Some(1)
        };
        let mut resolver = FsResolver::new(root, &config(), Box::new(picker));
        assert_eq!(
            resolver.resolve("icon.png").unwrap(),
            ImageSize {
                width: 2,
                height: 2
            }
        );
        assert_eq!(
            asked.borrow().as_slice(),
            &[(
                "icon.png".to_string(),
                vec![PathBuf::from("a/icon.png"), PathBuf::from("b/icon.png")]
            )]
        );

        let mut resolver = FsResolver::new(root, &config(), Box::new(DeclinePicker));
        assert!(matches!(
            resolver.resolve("icon.png"),
            Err(ResolveError::NotFound { .. })
        ));
    }
}
