use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use image::{DynamicImage, ImageFormat, RgbaImage};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::catalog::{CachedImage, CatalogSnapshot, ImageSet};
use crate::error::MaterializeError;
use crate::processing::transform::{CropScale, Scaler};
use crate::sources::ImageSource;

const STAGING_DIR: &str = ".staging";

/// Numbered `N.jpg` files in a single directory.
#[derive(Debug, Clone)]
pub struct ImageCache {
    dir: PathBuf,
}

impl ImageCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn frame_path(&self, index: usize) -> PathBuf {
        self.dir.join(frame_file_name(index))
    }

    fn staging_dir(&self) -> PathBuf {
        self.dir.join(STAGING_DIR)
    }

    /// Creates an empty staging directory, discarding leftovers from a crash.
    fn begin(&self) -> Result<PathBuf, MaterializeError> {
        let staging = self.staging_dir();
        remove_dir_if_exists(&staging)?;
        fs::create_dir_all(&staging).map_err(|e| MaterializeError::io(&staging, e))?;
        Ok(staging)
    }

    fn abandon(&self) {
        if let Err(err) = remove_dir_if_exists(&self.staging_dir()) {
            warn!(error = %err, "failed to clean staging directory");
        }
    }

    /// Moves `count` staged frames over the live ones and drops stale indices.
    fn commit(&self, count: usize) -> Result<Vec<PathBuf>, MaterializeError> {
        let staging = self.staging_dir();
        let mut paths = Vec::with_capacity(count);
        for index in 0..count {
            let from = staging.join(frame_file_name(index));
            let to = self.frame_path(index);
            fs::rename(&from, &to).map_err(|e| MaterializeError::io(&to, e))?;
            paths.push(to);
        }
        let mut stale = count;
        loop {
            let path = self.frame_path(stale);
            match fs::remove_file(&path) {
                Ok(()) => debug!(path = %path.display(), "removed stale frame"),
                Err(e) if e.kind() == ErrorKind::NotFound => break,
                Err(e) => return Err(MaterializeError::io(&path, e)),
            }
            stale += 1;
        }
        remove_dir_if_exists(&staging)?;
        Ok(paths)
    }
}

fn frame_file_name(index: usize) -> String {
    format!("{index}.jpg")
}

fn remove_dir_if_exists(path: &Path) -> Result<(), MaterializeError> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(MaterializeError::io(path, e)),
    }
}

/// Downloads, transforms and persists a catalog as a display-ready set.
///
/// All-or-nothing: any failing item aborts the batch and the previously
/// committed files stay untouched, so indices never shift under the viewer.
pub struct ImageMaterializer<I> {
    source: I,
    cache: ImageCache,
    transform: CropScale,
    archive_base_url: String,
}

impl<I: ImageSource> ImageMaterializer<I> {
    pub fn new(
        source: I,
        cache: ImageCache,
        transform: CropScale,
        archive_base_url: impl Into<String>,
    ) -> Self {
        Self {
            source,
            cache,
            transform,
            archive_base_url: archive_base_url.into(),
        }
    }

    #[instrument(
        skip(self, catalog, cancel),
        fields(identifier = catalog.identifier(), items = catalog.len())
    )]
    pub async fn materialize(
        &self,
        catalog: &CatalogSnapshot,
        cancel: &CancellationToken,
    ) -> Result<ImageSet, MaterializeError> {
        info!("saving photos");
        let staging = self.cache.begin()?;
        match self.stage_all(catalog, &staging, cancel).await {
            Ok(images) => {
                let paths = match self.cache.commit(images.len()) {
                    Ok(paths) => paths,
                    Err(err) => {
                        self.cache.abandon();
                        return Err(err);
                    }
                };
                let frames = paths
                    .into_iter()
                    .zip(images)
                    .map(|(path, image)| CachedImage { path, image })
                    .collect();
                let set = ImageSet::new(frames);
                info!(count = set.len(), "photos saved");
                Ok(set)
            }
            Err(err) => {
                self.cache.abandon();
                Err(err)
            }
        }
    }

    async fn stage_all(
        &self,
        catalog: &CatalogSnapshot,
        staging: &Path,
        cancel: &CancellationToken,
    ) -> Result<Vec<Arc<RgbaImage>>, MaterializeError> {
        let mut images = Vec::with_capacity(catalog.len());
        let mut scaler = Scaler::default();
        for (index, item) in catalog.items().iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(MaterializeError::Cancelled);
            }
            let url = item.source_url(&self.archive_base_url);
            debug!(index, %url, "downloading");
            let bytes = self
                .source
                .fetch_image(&url)
                .await
                .map_err(|source| MaterializeError::Download {
                    index,
                    url: url.clone(),
                    source,
                })?;

            let transform = self.transform;
            let path = staging.join(frame_file_name(index));
            let (returned, prepared) = tokio::task::spawn_blocking(move || {
                let prepared = prepare_frame(transform, &mut scaler, &bytes, &path);
                (scaler, prepared)
            })
            .await
            .map_err(|err| MaterializeError::Worker(err.to_string()))?;
            scaler = returned;
            let prepared =
                prepared.map_err(|reason| MaterializeError::Transform { index, reason })?;
            images.push(Arc::new(prepared));
        }
        Ok(images)
    }
}

fn prepare_frame(
    transform: CropScale,
    scaler: &mut Scaler,
    bytes: &[u8],
    path: &Path,
) -> anyhow::Result<RgbaImage> {
    let image = transform.decode_and_apply(scaler, bytes)?;
    DynamicImage::ImageRgba8(image.clone())
        .to_rgb8()
        .save_with_format(path, ImageFormat::Jpeg)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(image)
}
