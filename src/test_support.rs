//! Shared fixtures for unit tests: an in-memory fetcher that counts requests
//! and a builder for zip bundles of tiny PNGs.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::io::{Cursor, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::AssetsConfig;
use crate::error::{AssetError, Result};
use crate::fetcher::RemoteFetcher;

pub const TEST_ORIGIN: &str = "http://assets.test";

/// Serves registered payloads under `TEST_ORIGIN`, 404 for everything else
pub struct FakeFetcher {
    payloads: Mutex<HashMap<String, Bytes>>,
    calls: Mutex<HashMap<String, usize>>,
    delay: Duration,
    data_dir: tempfile::TempDir,
}

impl FakeFetcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            payloads: Mutex::new(HashMap::new()),
            calls: Mutex::new(HashMap::new()),
            delay: Duration::from_millis(20),
            data_dir: tempfile::tempdir().unwrap(),
        })
    }

    /// Config pointing at this fetcher, data dir private to this fetcher
    pub fn config(&self) -> AssetsConfig {
        let mut config = AssetsConfig::with_data_dir(self.data_dir.path());
        config.origin = TEST_ORIGIN.to_string();
        config
    }

    pub fn serve(&self, name: &str, payload: Bytes) {
        self.payloads
            .lock()
            .unwrap()
            .insert(format!("{TEST_ORIGIN}/{name}"), payload);
    }

    /// Number of requests made for `name`
    pub fn calls(&self, name: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .get(&format!("{TEST_ORIGIN}/{name}"))
            .copied()
            .unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }
}

#[async_trait]
impl RemoteFetcher for FakeFetcher {
    async fn get(&self, url: &str) -> Result<Bytes> {
        *self.calls.lock().unwrap().entry(url.to_string()).or_default() += 1;
        tokio::time::sleep(self.delay).await;

        let payload = self.payloads.lock().unwrap().get(url).cloned();
        payload.ok_or_else(|| AssetError::Http {
            url: url.to_string(),
            status: 404,
        })
    }
}

/// Zip archive with one 2x2 PNG per name
pub fn bundle_bytes(names: &[&str]) -> Bytes {
    sized_bundle_bytes(names, 2)
}

/// Zip archive with one `size`x`size` PNG per name
pub fn sized_bundle_bytes(names: &[&str], size: u32) -> Bytes {
    let files: Vec<(String, Vec<u8>)> = names
        .iter()
        .enumerate()
        .map(|(index, name)| (format!("{name}.png"), png_bytes(size, index)))
        .collect();
    archive_bytes(&files.iter().map(|(file, data)| (file.as_str(), data.as_slice())).collect::<Vec<_>>())
}

/// PNG of a single colour picked by `index`
pub fn png_bytes(size: u32, index: usize) -> Vec<u8> {
    let shade = (index * 40 % 256) as u8;
    let image = image::RgbaImage::from_pixel(size, size, image::Rgba([shade, 128, 255 - shade, 255]));
    let mut png = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
        .unwrap();
    png
}

/// Zip archive with the given raw entries, in order
pub fn archive_bytes(files: &[(&str, &[u8])]) -> Bytes {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));

    for (file, data) in files {
        let options = zip::write::SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
        writer.start_file(*file, options).unwrap();
        writer.write_all(data).unwrap();
    }

    Bytes::from(writer.finish().unwrap().into_inner())
}
