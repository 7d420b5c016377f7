//! Frame overlays: episode badge, caption speech bubble and brand handle,
//! rasterised from SVG and composited onto the frame.

use std::sync::Arc;

use image::{
    codecs::jpeg::JpegEncoder, imageops, imageops::FilterType, ExtendedColorType, ImageEncoder,
    RgbaImage,
};
use once_cell::sync::Lazy;

use crate::error::{GenerationError, GenerationResult};

pub const GENERATED_JPEG_QUALITY: u8 = 90;
pub const PLACEHOLDER_JPEG_QUALITY: u8 = 85;

const CAPTION_LINE_CHARS: usize = 52;
const CAPTION_MAX_LINES: usize = 3;

static FONT_DB: Lazy<Arc<usvg::fontdb::Database>> = Lazy::new(|| {
    let mut db = usvg::fontdb::Database::new();
    db.load_system_fonts();
    Arc::new(db)
});

/// Everything drawn on top of a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlaySpec {
    pub width: u32,
    pub height: u32,
    pub episode_number: u32,
    pub caption: String,
    pub brand_handle: String,
}

pub fn escape_xml(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Greedy word wrap; overflow past the last line is cut with an ellipsis.
pub fn wrap_caption(caption: &str, line_chars: usize, max_lines: usize) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();

    for word in caption.split_whitespace() {
        let needed = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };
        if needed > line_chars && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }

    if lines.len() > max_lines {
        lines.truncate(max_lines);
        if let Some(last) = lines.last_mut() {
            let kept: String = last.chars().take(line_chars.saturating_sub(3)).collect();
            *last = format!("{}...", kept.trim_end());
        }
    }
    lines
}

fn caption_block(spec: &OverlaySpec, font_size: u32, weight: &str) -> String {
    let top = spec.height.saturating_sub(200);
    let line_height = font_size + 10;
    let tspans: String = wrap_caption(&spec.caption, CAPTION_LINE_CHARS, CAPTION_MAX_LINES)
        .iter()
        .enumerate()
        .map(|(i, line)| {
            format!(
                r#"<tspan x="70" y="{}">{}</tspan>"#,
                top + i as u32 * line_height,
                escape_xml(line)
            )
        })
        .collect();

    format!(
        r##"<text fill="#ffffff" font-size="{font_size}" font-family="Inter, sans-serif" font-weight="{weight}">{tspans}</text>"##
    )
}

fn bubble(spec: &OverlaySpec, fill: &str) -> String {
    let (w, h) = (spec.width, spec.height);
    let top = h.saturating_sub(260);
    format!(
        r#"<rect x="40" y="{top}" width="{}" height="200" rx="16" fill="{fill}"/><path d="M 110 {top} L 150 {} L 190 {top} Z" fill="{fill}"/>"#,
        w.saturating_sub(80),
        top.saturating_sub(40),
    )
}

fn badge_and_brand(spec: &OverlaySpec, badge_weight: &str) -> String {
    let (w, h) = (spec.width, spec.height);
    format!(
        r##"<text x="{}" y="80" text-anchor="end" fill="#ffffff" font-size="44" font-family="Inter, sans-serif" font-weight="{badge_weight}">Ep {}</text><text x="70" y="{}" fill="#a1a1aa" font-size="22" font-family="Inter, sans-serif">{}</text>"##,
        w.saturating_sub(120),
        spec.episode_number,
        h.saturating_sub(40),
        escape_xml(&spec.brand_handle),
    )
}

/// Transparent overlay drawn over a generated frame.
pub fn overlay_svg(spec: &OverlaySpec) -> String {
    let (w, h) = (spec.width, spec.height);
    format!(
        r#"<svg width="{w}" height="{h}" viewBox="0 0 {w} {h}" xmlns="http://www.w3.org/2000/svg">{}{}{}</svg>"#,
        bubble(spec, "rgba(0,0,0,0.7)"),
        badge_and_brand(spec, "bold"),
        caption_block(spec, 32, "600"),
    )
}

/// Full placeholder frame: gradient background, the same overlay, and a
/// centred label.
pub fn placeholder_svg(spec: &OverlaySpec, label: &str) -> String {
    let (w, h) = (spec.width, spec.height);
    format!(
        r##"<svg width="{w}" height="{h}" viewBox="0 0 {w} {h}" xmlns="http://www.w3.org/2000/svg"><defs><linearGradient id="g" x1="0" y1="0" x2="1" y2="1"><stop offset="0%" stop-color="#0a0a0a"/><stop offset="100%" stop-color="#1f1f1f"/></linearGradient></defs><rect width="100%" height="100%" fill="url(#g)"/>{}{}{}<text x="{}" y="{}" text-anchor="middle" fill="#666666" font-size="24" font-family="Inter, sans-serif" font-weight="bold">{}</text></svg>"##,
        bubble(spec, "rgba(0,0,0,0.55)"),
        badge_and_brand(spec, "normal"),
        caption_block(spec, 38, "normal"),
        w / 2,
        h / 2,
        escape_xml(label),
    )
}

fn rasterize(svg: &str, width: u32, height: u32) -> GenerationResult<RgbaImage> {
    let options = usvg::Options {
        fontdb: FONT_DB.clone(),
        ..Default::default()
    };
    let tree = usvg::Tree::from_str(svg, &options)?;

    let mut pixmap = resvg::tiny_skia::Pixmap::new(width, height)
        .ok_or_else(|| GenerationError::Image(format!("cannot allocate {width}x{height} pixmap")))?;
    let sx = width as f32 / tree.size().width();
    let sy = height as f32 / tree.size().height();
    resvg::render(
        &tree,
        resvg::tiny_skia::Transform::from_scale(sx, sy),
        &mut pixmap.as_mut(),
    );

    // tiny-skia stores premultiplied alpha; image expects straight alpha.
    let mut rgba = Vec::with_capacity((width * height * 4) as usize);
    for pixel in pixmap.pixels() {
        let color = pixel.demultiply();
        rgba.extend_from_slice(&[color.red(), color.green(), color.blue(), color.alpha()]);
    }
    RgbaImage::from_raw(width, height, rgba)
        .ok_or_else(|| GenerationError::Image("rasterised buffer has the wrong size".into()))
}

fn encode_jpeg(image: &RgbaImage, quality: u8) -> GenerationResult<Vec<u8>> {
    let rgb = image::DynamicImage::ImageRgba8(image.clone()).to_rgb8();
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality).write_image(
        rgb.as_raw(),
        rgb.width(),
        rgb.height(),
        ExtendedColorType::Rgb8,
    )?;
    Ok(out)
}

/// Resize a downloaded image to cover the frame, draw the overlay, and
/// encode as JPEG.
pub fn compose_generated_frame(source: &[u8], spec: &OverlaySpec) -> GenerationResult<Vec<u8>> {
    let decoded = image::load_from_memory(source)?;
    let mut base = decoded
        .resize_to_fill(spec.width, spec.height, FilterType::Lanczos3)
        .to_rgba8();

    let overlay = rasterize(&overlay_svg(spec), spec.width, spec.height)?;
    imageops::overlay(&mut base, &overlay, 0, 0);

    encode_jpeg(&base, GENERATED_JPEG_QUALITY)
}

/// Deterministic placeholder frame carrying the same caption and overlay.
pub fn render_placeholder_frame(spec: &OverlaySpec, label: &str) -> GenerationResult<Vec<u8>> {
    let image = rasterize(&placeholder_svg(spec, label), spec.width, spec.height)?;
    encode_jpeg(&image, PLACEHOLDER_JPEG_QUALITY)
}
