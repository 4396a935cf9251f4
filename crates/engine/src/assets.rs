use std::cell::RefCell;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use image::RgbaImage;
use thiserror::Error;
use tracing::debug;

use crate::mask::{PixelMask, DEFAULT_ALPHA_THRESHOLD};

/// Decoded sprite image reduced to what the core needs: its size and its alpha mask.
#[derive(Debug, Clone)]
pub struct ImageAsset {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub mask: Arc<PixelMask>,
}

impl ImageAsset {
    pub fn from_rgba(name: impl Into<String>, image: &RgbaImage) -> Self {
        Self::from_mask(name, PixelMask::from_alpha(image, DEFAULT_ALPHA_THRESHOLD))
    }

    pub fn from_mask(name: impl Into<String>, mask: PixelMask) -> Self {
        Self {
            name: name.into(),
            width: mask.width(),
            height: mask.height(),
            mask: Arc::new(mask),
        }
    }
}

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("image '{name}' not found at {path}")]
    NotFound { name: String, path: PathBuf },
    #[error("failed to decode image '{name}' at {path}: {source}")]
    Decode {
        name: String,
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("image '{name}' is not registered")]
    Unregistered { name: String },
}

pub trait AssetProvider {
    fn load_image(&self, name: &str) -> Result<Arc<ImageAsset>, AssetError>;
}

/// Loads `<root>/<name>.png` and caches the decoded result by name.
#[derive(Debug)]
pub struct ImageDirAssets {
    root: PathBuf,
    cache: RefCell<HashMap<String, Arc<ImageAsset>>>,
}

impl ImageDirAssets {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            cache: RefCell::new(HashMap::new()),
        }
    }

    fn path_for(&self, name: &str) -> PathBuf {
        let mut path = self.root.clone();
        for part in name.split('/') {
            path.push(part);
        }
        path.set_extension("png");
        path
    }
}

impl AssetProvider for ImageDirAssets {
    fn load_image(&self, name: &str) -> Result<Arc<ImageAsset>, AssetError> {
        if let Some(cached) = self.cache.borrow().get(name) {
            return Ok(Arc::clone(cached));
        }

        let path = self.path_for(name);
        if !path.is_file() {
            return Err(AssetError::NotFound {
                name: name.to_string(),
                path,
            });
        }
        let decoded = image::open(&path).map_err(|source| AssetError::Decode {
            name: name.to_string(),
            path: path.clone(),
            source,
        })?;
        let asset = Arc::new(ImageAsset::from_rgba(name, &decoded.to_rgba8()));
        debug!(
            name,
            width = asset.width,
            height = asset.height,
            path = %path.display(),
            "image_loaded"
        );
        self.cache
            .borrow_mut()
            .insert(name.to_string(), Arc::clone(&asset));
        Ok(asset)
    }
}

/// In-memory provider for headless runs and tests.
#[derive(Debug, Default, Clone)]
pub struct MemoryAssets {
    images: HashMap<String, Arc<ImageAsset>>,
}

impl MemoryAssets {
    pub fn insert_mask(&mut self, name: &str, mask: PixelMask) {
        self.images
            .insert(name.to_string(), Arc::new(ImageAsset::from_mask(name, mask)));
    }
}

impl AssetProvider for MemoryAssets {
    fn load_image(&self, name: &str) -> Result<Arc<ImageAsset>, AssetError> {
        self.images
            .get(name)
            .cloned()
            .ok_or_else(|| AssetError::Unregistered {
                name: name.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use image::Rgba;
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn loads_png_and_derives_mask_from_alpha() {
        let temp = TempDir::new().expect("temp");
        let dir = temp.path().join("600ad");
        std::fs::create_dir_all(&dir).expect("mkdir");
        let mut image = RgbaImage::new(3, 2);
        image.put_pixel(1, 1, Rgba([10, 20, 30, 255]));
        image.save(dir.join("rock.png")).expect("save png");

        let assets = ImageDirAssets::new(temp.path());
        let rock = assets.load_image("600ad/rock").expect("load");

        assert_eq!((rock.width, rock.height), (3, 2));
        assert_eq!(rock.mask.count(), 1);
        assert!(rock.mask.get(1, 1));

        let again = assets.load_image("600ad/rock").expect("cached");
        assert!(Arc::ptr_eq(&rock, &again));
    }

    #[test]
    fn missing_image_is_reported_with_path() {
        let temp = TempDir::new().expect("temp");
        let assets = ImageDirAssets::new(temp.path());

        let error = assets.load_image("nope").expect_err("missing");
        match error {
            AssetError::NotFound { name, path } => {
                assert_eq!(name, "nope");
                assert!(path.ends_with("nope.png"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn memory_assets_serve_registered_masks() {
        let mut assets = MemoryAssets::default();
        assets.insert_mask("crate", PixelMask::solid(16, 16));

        assert_eq!(assets.load_image("crate").expect("crate").width, 16);
        assert!(assets.load_image("barrel").is_err());
    }
}
