//! Software renderer for the overlay
//!
//! Paints one frame the size of the menu bar: the wallpaper backdrop for
//! shaped modes, the tint inside the shape, then the border. tiny-skia has no
//! inside stroke, so the border is stroked at twice the requested width and
//! clipped to the shape.

use anyhow::{Context, Result};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tiny_skia::{
    ColorU8, FillRule, IntSize, LineJoin, Mask, Paint, Pixmap, PixmapPaint, Stroke, Transform,
};
use tracing::debug;

use super::shape::{OverlayPath, ShapeKind};
use crate::config::AppearanceConfig;
use crate::platform::WallpaperSnapshot;
use crate::types::Rect;

/// Convert an RGBA8 snapshot into a premultiplied pixmap
fn wallpaper_pixmap(wallpaper: &WallpaperSnapshot) -> Option<Pixmap> {
    let size = IntSize::from_wh(wallpaper.width, wallpaper.height)?;
    if wallpaper.rgba.len() != wallpaper.width as usize * wallpaper.height as usize * 4 {
        return None;
    }
    let data = wallpaper
        .rgba
        .chunks_exact(4)
        .flat_map(|px| {
            let c = ColorU8::from_rgba(px[0], px[1], px[2], px[3]).premultiply();
            [c.red(), c.green(), c.blue(), c.alpha()]
        })
        .collect();
    Pixmap::from_vec(data, size)
}

/// Paint one overlay frame covering `bar`
pub fn render_frame(
    bar: Rect,
    path: &OverlayPath,
    appearance: &AppearanceConfig,
    wallpaper: Option<&WallpaperSnapshot>,
    dragging: bool,
) -> Result<Pixmap> {
    let width = bar.width.ceil().max(1.0) as u32;
    let height = bar.height.ceil().max(1.0) as u32;
    let mut pixmap = Pixmap::new(width, height)
        .context(format!("Failed to allocate {width}x{height} overlay pixmap"))?;

    // Fully transparent while items are being rearranged
    if dragging {
        return Ok(pixmap);
    }

    if appearance.shape_kind != ShapeKind::None
        && let Some(backdrop) = wallpaper.and_then(wallpaper_pixmap)
    {
        let scale = Transform::from_scale(
            width as f32 / backdrop.width() as f32,
            height as f32 / backdrop.height() as f32,
        );
        pixmap.draw_pixmap(0, 0, backdrop.as_ref(), &PixmapPaint::default(), scale, None);
    }

    let Some(shape) = path.to_skia_path() else {
        debug!("Overlay path is empty, drawing backdrop only");
        return Ok(pixmap);
    };
    let to_local = Transform::from_translate(-bar.x as f32, -bar.y as f32);

    if let Some(tint) = appearance.tint_color() {
        let mut paint = Paint::default();
        paint.set_color(tint.to_skia());
        paint.anti_alias = true;
        pixmap.fill_path(&shape, &paint, FillRule::Winding, to_local, None);
    }

    if let Some((color, border_width)) = appearance.border_color()
        && border_width > 0.0
    {
        let mut clip = Mask::new(width, height).context("Failed to allocate border clip mask")?;
        clip.fill_path(&shape, FillRule::Winding, true, to_local);

        let mut paint = Paint::default();
        paint.set_color(color.to_skia());
        paint.anti_alias = true;
        let stroke = Stroke {
            width: (border_width * 2.0) as f32,
            line_join: LineJoin::Round,
            ..Default::default()
        };
        pixmap.stroke_path(&shape, &paint, &stroke, to_local, Some(&clip));
    }

    Ok(pixmap)
}

/// Write a frame as an 8-bit RGBA PNG
pub fn write_png(pixmap: &Pixmap, path: &Path) -> Result<()> {
    let file = File::create(path).context(format!("Failed to create {}", path.display()))?;
    let mut encoder = png::Encoder::new(BufWriter::new(file), pixmap.width(), pixmap.height());
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);

    let data: Vec<u8> = pixmap
        .pixels()
        .iter()
        .flat_map(|p| {
            let c = p.demultiply();
            [c.red(), c.green(), c.blue(), c.alpha()]
        })
        .collect();

    let mut writer = encoder.write_header().context("Failed to write PNG header")?;
    writer
        .write_image_data(&data)
        .context(format!("Failed to write PNG data to {}", path.display()))?;
    writer.finish().context("Failed to finish PNG stream")?;
    Ok(())
}
