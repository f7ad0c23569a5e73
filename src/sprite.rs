//! Decoded image handles handed to the presentation layer.

use image::RgbaImage;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{AssetError, Result};

/// A named decoded image. Cloning shares the pixel buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct Sprite {
    name: String,
    image: Arc<RgbaImage>,
}

impl Sprite {
    pub fn new(name: impl Into<String>, image: RgbaImage) -> Self {
        Self {
            name: name.into(),
            image: Arc::new(image),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn image(&self) -> &Arc<RgbaImage> {
        &self.image
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// True when both handles share the same pixel buffer
    pub fn same_image(&self, other: &Sprite) -> bool {
        Arc::ptr_eq(&self.image, &other.image)
    }
}

/// Sprites extracted from one bundle, keyed by their embedded names
#[derive(Debug, Clone, PartialEq)]
pub struct SpriteSet {
    bundle: String,
    /// Names in archive order; the first one is the primary sprite
    order: Vec<String>,
    sprites: HashMap<String, Sprite>,
}

impl SpriteSet {
    pub fn new(bundle: impl Into<String>, sprites: Vec<Sprite>) -> Self {
        let mut order = Vec::with_capacity(sprites.len());
        let mut by_name = HashMap::with_capacity(sprites.len());
        for sprite in sprites {
            if by_name.insert(sprite.name.clone(), sprite.clone()).is_none() {
                order.push(sprite.name);
            }
        }

        Self {
            bundle: bundle.into(),
            order,
            sprites: by_name,
        }
    }

    /// Name of the bundle the sprites came from
    pub fn bundle(&self) -> &str {
        &self.bundle
    }

    pub fn get(&self, name: &str) -> Result<&Sprite> {
        self.sprites.get(name).ok_or_else(|| AssetError::ResourceNotFound {
            bundle: self.bundle.clone(),
            asset: name.to_string(),
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sprites.contains_key(name)
    }

    /// First sprite of the bundle
    pub fn primary(&self) -> Result<&Sprite> {
        self.order
            .first()
            .and_then(|name| self.sprites.get(name))
            .ok_or_else(|| AssetError::ResourceNotFound {
                bundle: self.bundle.clone(),
                asset: "<first image>".to_string(),
            })
    }

    pub fn names(&self) -> &[String] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
