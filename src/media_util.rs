use std::path::Path;

use bytes::Bytes;
use image::ImageFormat;
use log::{error, info, warn};

use crate::errors::MediaStoreError;

const POST_IMAGES_DIR: &str = "posts_images";

/// A file field pulled out of a multipart body.
#[derive(Clone, Debug)]
pub struct UploadedImage {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub data: Bytes,
}

impl UploadedImage {
    /// Browsers send an empty file part when nothing was picked.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty() && self.file_name.as_deref().map_or(true, str::is_empty)
    }

    /// The format to store the upload as. The declared type has to be an
    /// image and the bytes themselves one of `ACCEPTED_FORMATS`.
    pub fn format(&self) -> Option<String> {
        guess_format(&self.content_type.as_deref())?;
        sniff_format(&self.data).map(str::to_string)
    }
}

const ACCEPTED_FORMATS: &[(ImageFormat, &str)] = &[
    (ImageFormat::Jpeg, "jpeg"),
    (ImageFormat::Png, "png"),
    (ImageFormat::Gif, "gif"),
    (ImageFormat::WebP, "webp"),
];

pub fn guess_format(content_type: &Option<&str>) -> Option<String> {
    if let Some(ct) = content_type {
        if let Ok(m) = ct.parse::<mime::Mime>() {
            match (m.type_(), m.subtype()) {
                (mime::IMAGE, mime::STAR) => None,
                (mime::IMAGE, format) => Some(format.as_str().into()),
                _ => None,
            }
        } else {
            None
        }
    } else {
        None
    }
}

/// Identifies the image format from the file's magic bytes.
pub fn sniff_format(data: &[u8]) -> Option<&'static str> {
    let detected = image::guess_format(data).ok()?;
    ACCEPTED_FORMATS
        .iter()
        .find(|(format, _)| *format == detected)
        .map(|(_, name)| *name)
}

fn extension_for(format: &str) -> &str {
    match format {
        "jpeg" => "jpg",
        other => other,
    }
}

/// Writes the image under `media_dir` and returns its path relative to it.
pub async fn store_image(
    media_dir: &Path,
    image: &UploadedImage,
    format: &str,
) -> Result<String, MediaStoreError> {
    let dir = media_dir.join(POST_IMAGES_DIR);
    tokio::fs::create_dir_all(&dir).await.map_err(|e| {
        error!("could not create media dir {:?}: {:?}", dir, e);
        MediaStoreError
    })?;

    let file_name = format!("{}.{}", uuid::Uuid::new_v4().simple(), extension_for(format));
    let path = dir.join(&file_name);
    tokio::fs::write(&path, &image.data).await.map_err(|e| {
        error!("could not write image {:?}: {:?}", path, e);
        MediaStoreError
    })?;
    info!("stored {} byte image at {:?}", image.data.len(), path);

    Ok(format!("{}/{}", POST_IMAGES_DIR, file_name))
}

pub async fn remove_image(media_dir: &Path, relative: &str) {
    if relative.contains("..") {
        warn!("refusing to remove suspicious media path {:?}", relative);
        return;
    }
    let path = media_dir.join(relative);
    if let Err(e) = tokio::fs::remove_file(&path).await {
        warn!("could not remove image {:?}: {:?}", path, e);
    }
}

pub fn image_url(relative: &str) -> String {
    format!("{}/{}", crate::MEDIA_URL, relative)
}
