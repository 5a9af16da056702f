// Page-one preview rendering through PDFium.
// PDFium is a shared library bound at runtime: PDFIUM_LIBRARY_PATH, then ./, then the system path.
use image::{DynamicImage, ImageFormat, RgbaImage};
use pdfium_render::prelude::*;
use std::io::Cursor;
use std::path::Path;

use crate::error::{CertError, Result};

pub fn render_preview(pdf: &[u8], width: u16, library_dir: Option<&Path>) -> Result<Vec<u8>> {
    let pdfium = load_pdfium(library_dir)?;
    let document = pdfium
        .load_pdf_from_byte_slice(pdf, None)
        .map_err(render_err)?;
    let page = document.pages().get(0).map_err(render_err)?;

    let config = PdfRenderConfig::new().set_target_width(i32::from(width));
    let bitmap = page.render_with_config(&config).map_err(render_err)?;

    let (w, h) = (bitmap.width() as u32, bitmap.height() as u32);
    encode_png(bitmap.as_rgba_bytes(), w, h)
}

fn load_pdfium(library_dir: Option<&Path>) -> Result<Pdfium> {
    let mut dirs: Vec<String> = library_dir
        .map(|dir| dir.to_string_lossy().into_owned())
        .into_iter()
        .collect();
    dirs.push("./".to_string());

    let bindings = dirs
        .iter()
        .find_map(|dir| {
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir)).ok()
        })
        .map(Ok)
        .unwrap_or_else(Pdfium::bind_to_system_library)
        .map_err(|e| {
            CertError::PreviewUnavailable(format!("cannot load the PDFium library: {:?}", e))
        })?;

    Ok(Pdfium::new(bindings))
}

fn render_err(err: PdfiumError) -> CertError {
    CertError::Render(format!("{:?}", err))
}

pub fn encode_png(rgba: Vec<u8>, width: u32, height: u32) -> Result<Vec<u8>> {
    if width == 0 || height == 0 {
        return Err(CertError::Render("rendered page has zero dimensions".to_string()));
    }
    let image = RgbaImage::from_raw(width, height, rgba)
        .ok_or_else(|| CertError::Render("bitmap size does not match its dimensions".to_string()))?;

    let mut png = Vec::new();
    DynamicImage::ImageRgba8(image).write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
    Ok(png)
}
