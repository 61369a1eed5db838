use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use fast_image_resize as fir;
use image::RgbaImage;
use tracing::debug;

use crate::error::{Error, Result};
use crate::events::PreparedImageCpu;

/// Decodes `path`, applies EXIF orientation and shrinks it to fit within
/// `max_dim` on both axes so the result can always be uploaded.
pub fn prepare_image(path: &Path, max_dim: u32) -> Result<PreparedImageCpu> {
    let mut rgba = decode_rgba8_apply_exif(path)?;
    let (width, height) = rgba.dimensions();
    if let Some((w, h)) = shrink_to_limit(width, height, max_dim) {
        debug!(
            path = %path.display(),
            from = %format!("{width}x{height}"),
            to = %format!("{w}x{h}"),
            "shrinking image beyond texture limit"
        );
        rgba = resize_rgba(path, &rgba, w, h)?;
    }
    let (width, height) = rgba.dimensions();
    Ok(PreparedImageCpu {
        path: path.to_path_buf(),
        width,
        height,
        pixels: rgba.into_raw(),
    })
}

/// Decodes an image to RGBA8 and applies EXIF orientation if available.
/// Missing or unreadable metadata leaves the pixels as decoded.
pub fn decode_rgba8_apply_exif(path: &Path) -> Result<RgbaImage> {
    let decode_err = |source| Error::Decode {
        path: path.to_path_buf(),
        source,
    };
    let img = image::ImageReader::open(path)?
        .with_guessed_format()?
        .decode()
        .map_err(decode_err)?;
    let img = img.to_rgba8();

    let orientation = read_orientation(path).unwrap_or(1);
    Ok(match orientation {
        2 => image::imageops::flip_horizontal(&img),
        3 => image::imageops::rotate180(&img),
        4 => image::imageops::flip_vertical(&img),
        // transpose
        5 => image::imageops::flip_horizontal(&image::imageops::rotate90(&img)),
        6 => image::imageops::rotate90(&img),
        // transverse
        7 => image::imageops::flip_horizontal(&image::imageops::rotate270(&img)),
        8 => image::imageops::rotate270(&img),
        _ => img,
    })
}

fn read_orientation(path: &Path) -> Option<u16> {
    let file = File::open(path).ok()?;
    let mut buf = BufReader::new(file);
    let exif = exif::Reader::new().read_from_container(&mut buf).ok()?;
    let field = exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)?;
    let o = field.value.get_uint(0)? as u16;
    debug!(path = %path.display(), orientation = o, "exif orientation");
    Some(o)
}

/// Aspect-preserving size that fits within `max_dim`, or `None` if already inside.
fn shrink_to_limit(width: u32, height: u32, max_dim: u32) -> Option<(u32, u32)> {
    if max_dim == 0 || (width <= max_dim && height <= max_dim) {
        return None;
    }
    let scale = f64::from(max_dim) / f64::from(width.max(height));
    let w = ((f64::from(width) * scale).round() as u32).clamp(1, max_dim);
    let h = ((f64::from(height) * scale).round() as u32).clamp(1, max_dim);
    Some((w, h))
}

fn resize_rgba(path: &Path, source: &RgbaImage, target_w: u32, target_h: u32) -> Result<RgbaImage> {
    let upload_err = |reason: String| Error::Upload {
        path: path.to_path_buf(),
        reason,
    };
    let src_view = fir::images::ImageRef::new(
        source.width(),
        source.height(),
        source.as_raw(),
        fir::PixelType::U8x4,
    )
    .map_err(|e| upload_err(format!("source view: {e}")))?;
    let mut dst_image = fir::images::Image::new(target_w, target_h, fir::PixelType::U8x4);
    let options = fir::ResizeOptions::new()
        .resize_alg(fir::ResizeAlg::Convolution(fir::FilterType::Lanczos3));
    fir::Resizer::new()
        .resize(&src_view, &mut dst_image, Some(&options))
        .map_err(|e| upload_err(format!("resize: {e}")))?;
    RgbaImage::from_raw(target_w, target_h, dst_image.into_vec())
        .ok_or_else(|| upload_err("resized buffer has the wrong length".into()))
}
