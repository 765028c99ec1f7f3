//! Product image cache layered on the chunked store
//!
//! All images live under one logical key as a map from product ID to its
//! main and additional images. Base64 image data makes this map large, so
//! it is the typical chunked value. The cache is an optimization: every
//! failure is logged and treated as a miss.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::medium::Medium;
use crate::store::ChunkedStore;

/// Logical key holding the whole image map
pub const IMAGE_STORAGE_KEY: &str = "product_images";

/// Images cached for one product
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductImages {
    pub main_image: String,
    #[serde(default)]
    pub additional_images: Vec<String>,
}

/// Image map keyed by product ID
pub type ImageMap = BTreeMap<String, ProductImages>;

/// Typed view over the image map stored in a [`ChunkedStore`]
pub struct ProductImageCache<'a, M: Medium> {
    store: &'a ChunkedStore<M>,
}

impl<'a, M: Medium> ProductImageCache<'a, M> {
    pub fn new(store: &'a ChunkedStore<M>) -> Self {
        Self { store }
    }

    /// Load the whole map, empty if absent or unreadable
    pub fn images(&self) -> ImageMap {
        match self.store.get::<ImageMap>(IMAGE_STORAGE_KEY) {
            Ok(images) => images.unwrap_or_default(),
            Err(err) => {
                warn!(error = %err, "Failed to load product images, starting empty");
                ImageMap::new()
            }
        }
    }

    /// Record the images for `product_id`
    ///
    /// `main_image` is dropped from `additional_images` so it is not stored twice.
    /// The map is read and written under one hold of its key lock, so concurrent
    /// saves for different products never drop each other's entries.
    pub fn save_product_images(&self, product_id: &str, main_image: &str, additional_images: &[String]) {
        let entry = ProductImages {
            main_image: main_image.to_string(),
            additional_images: additional_images
                .iter()
                .filter(|img| img.as_str() != main_image)
                .cloned()
                .collect(),
        };
        debug!(product_id, "Saving product images");

        let result = self.store.update::<ImageMap, _>(IMAGE_STORAGE_KEY, |current| {
            let mut images = current.unwrap_or_default();
            images.insert(product_id.to_string(), entry.clone());
            Some(images)
        });

        match result {
            Ok(()) => {}
            Err(err) if err.is_corruption() || matches!(err, StoreError::Deserialization { .. }) => {
                warn!(error = %err, "Product image map unreadable, replacing it");
                let images = ImageMap::from([(product_id.to_string(), entry)]);
                if let Err(err) = self.store.set(IMAGE_STORAGE_KEY, &images) {
                    warn!(error = %err, "Failed to cache product images");
                }
            }
            Err(err) => warn!(error = %err, "Failed to cache product images"),
        }
    }

    /// Images for `product_id`, if cached
    pub fn product_images(&self, product_id: &str) -> Option<ProductImages> {
        self.images().remove(product_id)
    }

    /// Forget the images for `product_id`
    pub fn delete_product_images(&self, product_id: &str) {
        let result = self.store.update::<ImageMap, _>(IMAGE_STORAGE_KEY, |current| {
            let mut images = current?;
            images.remove(product_id)?;
            Some(images)
        });

        if let Err(err) = result {
            warn!(product_id, error = %err, "Failed to delete product images");
        }
    }
}
