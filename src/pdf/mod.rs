// Text overlay on the first page of a template PDF.
// Uses lopdf and the base-14 fonts, so no font files are needed at runtime.
mod encoding;

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use std::collections::HashMap;

use crate::error::{CertError, Result};
use crate::layout::Placement;

pub use encoding::encode_win_ansi;

const LETTER_MEDIA_BOX: [f32; 4] = [0.0, 0.0, 612.0, 792.0];
const FONT_RESOURCE_PREFIX: &str = "CertF";
const MAX_PARENT_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub struct TextStamp {
    pub text: String,
    pub placement: Placement,
}

impl TextStamp {
    pub fn new(text: impl Into<String>, placement: Placement) -> Self {
        Self {
            text: text.into(),
            placement,
        }
    }
}

/// Opens a fresh copy of `template` and draws every stamp onto page one.
pub fn stamp_first_page(template: &[u8], stamps: &[TextStamp]) -> Result<Vec<u8>> {
    let mut doc = Document::load_mem(template)?;
    if doc.is_encrypted() {
        return Err(CertError::Template("template PDF is encrypted".to_string()));
    }

    let page_id = doc
        .get_pages()
        .values()
        .next()
        .copied()
        .ok_or_else(|| CertError::Template("template PDF has no pages".to_string()))?;

    let [x0, y0, x1, y1] = media_box(&doc, page_id);
    let left = x0.min(x1);
    let top = y0.max(y1);

    let mut resources = inherited(&doc, page_id, b"Resources")
        .and_then(|obj| obj.as_dict().ok())
        .cloned()
        .unwrap_or_default();
    let mut fonts = resources
        .get(b"Font")
        .ok()
        .map(|obj| resolve(&doc, obj))
        .and_then(|obj| obj.as_dict().ok())
        .cloned()
        .unwrap_or_default();

    let mut registered: HashMap<&'static str, String> = HashMap::new();
    let mut operations = vec![Operation::new("q", vec![])];

    for stamp in stamps {
        let base_font = stamp.placement.style.base_font();
        let resource_name = match registered.get(base_font) {
            Some(name) => name.clone(),
            None => {
                let name = unused_font_name(&fonts);
                let font_id = doc.add_object(dictionary! {
                    "Type" => "Font",
                    "Subtype" => "Type1",
                    "BaseFont" => base_font,
                    "Encoding" => "WinAnsiEncoding",
                });
                fonts.set(name.as_bytes().to_vec(), Object::Reference(font_id));
                registered.insert(base_font, name.clone());
                name
            }
        };

        operations.extend(text_operations(stamp, &resource_name, left, top));
    }
    operations.push(Operation::new("Q", vec![]));

    resources.set("Font", Object::Dictionary(fonts));
    doc.get_object_mut(page_id)
        .and_then(Object::as_dict_mut)?
        .set("Resources", Object::Dictionary(resources));

    let overlay = Content { operations }.encode()?;
    wrap_page_contents(&mut doc, page_id, overlay)?;

    let mut output = Vec::new();
    doc.save_to(&mut output)?;
    Ok(output)
}

fn text_operations(stamp: &TextStamp, font: &str, left: f32, top: f32) -> Vec<Operation> {
    let Placement { x, y, style } = stamp.placement;
    vec![
        Operation::new("BT", vec![]),
        Operation::new(
            "rg",
            vec![style.color.r.into(), style.color.g.into(), style.color.b.into()],
        ),
        Operation::new(
            "Tf",
            vec![Object::Name(font.as_bytes().to_vec()), style.size.into()],
        ),
        Operation::new("Td", vec![(left + x).into(), (top - y).into()]),
        Operation::new(
            "Tj",
            vec![Object::String(
                encode_win_ansi(&stamp.text),
                StringFormat::Literal,
            )],
        ),
        Operation::new("ET", vec![]),
    ]
}

fn unused_font_name(fonts: &Dictionary) -> String {
    (1..)
        .map(|i| format!("{}{}", FONT_RESOURCE_PREFIX, i))
        .find(|name| !fonts.has(name.as_bytes()))
        .unwrap_or_else(|| FONT_RESOURCE_PREFIX.to_string())
}

// Existing content is bracketed by q/Q so its graphics state cannot leak into the overlay.
fn wrap_page_contents(doc: &mut Document, page_id: ObjectId, overlay: Vec<u8>) -> Result<()> {
    let existing: Vec<Object> = {
        let page = doc.get_dictionary(page_id)?;
        match page.get(b"Contents") {
            Ok(Object::Reference(id)) => match doc.get_object(*id) {
                Ok(Object::Array(items)) => items.clone(),
                _ => vec![Object::Reference(*id)],
            },
            Ok(Object::Array(items)) => items.clone(),
            _ => Vec::new(),
        }
    };

    let save_id = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
    let mut restore_and_draw = b"\nQ\n".to_vec();
    restore_and_draw.extend(overlay);
    let overlay_id = doc.add_object(Stream::new(Dictionary::new(), restore_and_draw));

    let mut contents = Vec::with_capacity(existing.len() + 2);
    contents.push(Object::Reference(save_id));
    contents.extend(existing);
    contents.push(Object::Reference(overlay_id));

    doc.get_object_mut(page_id)
        .and_then(Object::as_dict_mut)?
        .set("Contents", Object::Array(contents));
    Ok(())
}

fn media_box(doc: &Document, page_id: ObjectId) -> [f32; 4] {
    let values: Option<Vec<f32>> = inherited(doc, page_id, b"MediaBox")
        .and_then(|obj| obj.as_array().ok())
        .map(|items| items.iter().filter_map(|o| number(resolve(doc, o))).collect());

    match values.as_deref() {
        Some([a, b, c, d]) => [*a, *b, *c, *d],
        _ => LETTER_MEDIA_BOX,
    }
}

/// Looks up a page attribute, walking up the page tree for inheritable keys.
fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut node = doc.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_PARENT_DEPTH {
        if let Ok(value) = node.get(key) {
            return Some(resolve(doc, value));
        }
        let parent = node.get(b"Parent").ok()?.as_reference().ok()?;
        node = doc.get_dictionary(parent).ok()?;
    }
    None
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        _ => obj,
    }
}

fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}
