use pdfium_render::prelude::*;

pub fn extract_pdf_text(bytes: &[u8]) -> Result<String, String> {
    let pdfium = Pdfium::default();
    let document = pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(|err| format!("load pdf: {err}"))?;

    let mut combined = String::new();
    let pages = document.pages();
    for page_index in 0..pages.len() {
        let page = pages
            .get(page_index)
            .map_err(|err| format!("load page {page_index}: {err}"))?;
        let text = page.text();
        if let Ok(page_text) = text {
            let segments = page_text.segments();
            for segment in segments.iter() {
                combined.push_str(&segment.text());
                combined.push('\n');
            }
        }
    }

    Ok(combined)
}
