//! Field Catalog Extractor: walks the AcroForm field tree.

use std::collections::{HashMap, HashSet};

use lopdf::{Dictionary, Document, Object, ObjectId};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::coords::{pdf_rect_to_viewport, ViewportRect, LETTER_MEDIA_BOX};
use crate::error::ActionError;
use crate::objects;

const MAX_FIELD_DEPTH: usize = 32;

/// Ff bit 16: push button.
const FLAG_PUSHBUTTON: i64 = 1 << 16;
/// Ff bit 15: radio button.
const FLAG_RADIO: i64 = 1 << 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldKind {
    Text,
    Choice,
    Checkbox,
    RadioButton,
    PushButton,
    Signature,
    Unknown,
}

impl FieldKind {
    fn from_type(field_type: Option<&[u8]>, flags: i64) -> Self {
        match field_type {
            Some(b"Tx") => FieldKind::Text,
            Some(b"Ch") => FieldKind::Choice,
            Some(b"Sig") => FieldKind::Signature,
            Some(b"Btn") if flags & FLAG_PUSHBUTTON != 0 => FieldKind::PushButton,
            Some(b"Btn") if flags & FLAG_RADIO != 0 => FieldKind::RadioButton,
            Some(b"Btn") => FieldKind::Checkbox,
            _ => FieldKind::Unknown,
        }
    }
}

/// Where a field's first widget sits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldGeometry {
    /// 1-based page number.
    pub page: u32,
    /// `[x1, y1, x2, y2]` in PDF points, bottom-left origin.
    pub rect: [f64; 4],
    /// `[x, y, width, height]` of the page box.
    pub media_box: [f64; 4],
}

impl FieldGeometry {
    pub fn to_viewport(&self, scale: f64) -> ViewportRect {
        pdf_rect_to_viewport(self.rect, self.media_box, scale)
    }
}

/// One terminal form field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormField {
    pub name: String,
    pub kind: FieldKind,
    #[serde(flatten, default, skip_serializing_if = "Option::is_none")]
    pub geometry: Option<FieldGeometry>,
}

/// A terminal field found by the walk.
#[derive(Debug, Clone)]
pub(crate) struct FieldEntry {
    pub id: ObjectId,
    /// Fully qualified dotted name.
    pub name: String,
    /// The field's own `T`, if it has one.
    pub partial: Option<String>,
    pub kind: FieldKind,
}

/// Walk `Fields` in document order and return every terminal field.
pub(crate) fn walk(doc: &Document, acroform: &Dictionary) -> Result<Vec<FieldEntry>, ActionError> {
    let roots = objects::array_entry(doc, acroform, b"Fields")
        .ok_or_else(|| ActionError::MalformedDocument("AcroForm has no Fields array".into()))?;

    let mut out = Vec::new();
    let mut visited = HashSet::new();
    for root in roots {
        match root {
            Object::Reference(id) => walk_node(doc, *id, None, None, 0, 0, &mut visited, &mut out),
            other => warn!(entry = ?other, "skipping non-reference entry in Fields"),
        }
    }
    debug!(count = out.len(), "walked field tree");
    Ok(out)
}

#[allow(clippy::too_many_arguments)]
fn walk_node(
    doc: &Document,
    id: ObjectId,
    parent_name: Option<&str>,
    inherited_type: Option<&[u8]>,
    inherited_flags: i64,
    depth: usize,
    visited: &mut HashSet<ObjectId>,
    out: &mut Vec<FieldEntry>,
) {
    if depth >= MAX_FIELD_DEPTH || !visited.insert(id) {
        warn!(object = id.0, "field tree too deep or cyclic");
        return;
    }
    let Some(dict) = doc.get_object(id).ok().and_then(|o| objects::dict(doc, o)) else {
        warn!(object = id.0, "field is not a dictionary");
        return;
    };

    let partial = dict.get(b"T").ok().and_then(|t| objects::text(doc, t));
    let name = match (parent_name, partial.as_deref()) {
        (Some(parent), Some(own)) => format!("{}.{}", parent, own),
        (Some(parent), None) => parent.to_string(),
        (None, Some(own)) => own.to_string(),
        (None, None) => String::new(),
    };
    let field_type = dict
        .get(b"FT")
        .ok()
        .and_then(|ft| objects::name(doc, ft))
        .or(inherited_type);
    let flags = dict
        .get(b"Ff")
        .ok()
        .and_then(|ff| objects::integer(doc, ff))
        .unwrap_or(inherited_flags);

    let child_fields: Vec<ObjectId> = objects::array_entry(doc, dict, b"Kids")
        .map(|kids| {
            kids.iter()
                .filter_map(|kid| match kid {
                    Object::Reference(kid_id) => Some(*kid_id),
                    _ => None,
                })
                .filter(|kid_id| is_field_node(doc, *kid_id))
                .collect()
        })
        .unwrap_or_default();

    if !child_fields.is_empty() {
        for kid in child_fields {
            walk_node(
                doc,
                kid,
                Some(&name),
                field_type,
                flags,
                depth + 1,
                visited,
                out,
            );
        }
        return;
    }

    if name.is_empty() {
        warn!(object = id.0, "skipping unnamed field");
        return;
    }

    out.push(FieldEntry {
        id,
        name,
        partial,
        kind: FieldKind::from_type(field_type, flags),
    });
}

/// A kid with its own `T` is a child field, and so is an unnamed
/// non-widget node that has kids of its own. Anything else is one of the
/// parent's widgets.
fn is_field_node(doc: &Document, id: ObjectId) -> bool {
    let Some(kid) = doc.get_object(id).ok().and_then(|o| objects::dict(doc, o)) else {
        return false;
    };
    if kid.has(b"T") {
        return true;
    }
    let is_widget = kid
        .get(b"Subtype")
        .ok()
        .and_then(|subtype| objects::name(doc, subtype))
        == Some(b"Widget".as_slice());
    !is_widget && kid.has(b"Kids")
}

/// First field whose fully qualified name matches, else the first whose own `T` does.
pub(crate) fn find<'e>(entries: &'e [FieldEntry], name: &str) -> Option<&'e FieldEntry> {
    entries
        .iter()
        .find(|e| e.name == name)
        .or_else(|| entries.iter().find(|e| e.partial.as_deref() == Some(name)))
}

/// Page lookup tables built once per extraction.
pub(crate) struct PageIndex {
    numbers: HashMap<ObjectId, u32>,
    annotations: HashMap<ObjectId, u32>,
}

impl PageIndex {
    pub fn build(doc: &Document) -> Self {
        let mut numbers = HashMap::new();
        let mut annotations = HashMap::new();
        for (number, page_id) in doc.get_pages() {
            numbers.insert(page_id, number);
            let annots = doc
                .get_object(page_id)
                .ok()
                .and_then(|o| objects::dict(doc, o))
                .and_then(|page| objects::array_entry(doc, page, b"Annots"));
            for annot in annots.into_iter().flatten() {
                if let Object::Reference(annot_id) = annot {
                    annotations.entry(*annot_id).or_insert(number);
                }
            }
        }
        Self {
            numbers,
            annotations,
        }
    }

    fn page_of(&self, doc: &Document, widget_id: ObjectId, widget: &Dictionary) -> Option<(u32, ObjectId)> {
        if let Ok(Object::Reference(page_id)) = widget.get(b"P") {
            if let Some(number) = self.numbers.get(page_id) {
                return Some((*number, *page_id));
            }
        }
        let number = *self.annotations.get(&widget_id)?;
        doc.get_pages().get(&number).map(|page_id| (number, *page_id))
    }
}

/// Page box of a page as `[x, y, width, height]`, inherited through `Parent`.
pub(crate) fn media_box(doc: &Document, page_id: ObjectId) -> [f64; 4] {
    let mut current = doc.get_object(page_id).ok().and_then(|o| objects::dict(doc, o));
    for _ in 0..MAX_FIELD_DEPTH {
        let Some(node) = current else { break };
        if let Some([x1, y1, x2, y2]) = node.get(b"MediaBox").ok().and_then(|mb| objects::rect(doc, mb)) {
            return [x1, y1, x2 - x1, y2 - y1];
        }
        current = objects::dict_entry(doc, node, b"Parent");
    }
    LETTER_MEDIA_BOX
}

/// Geometry of the field's first widget: the field itself when it has a
/// `Rect`, otherwise its first widget kid.
pub(crate) fn geometry(doc: &Document, entry: &FieldEntry, pages: &PageIndex) -> Option<FieldGeometry> {
    let field = doc.get_object(entry.id).ok().and_then(|o| objects::dict(doc, o))?;

    let (widget_id, widget) = if field.has(b"Rect") {
        (entry.id, field)
    } else {
        let kids = objects::array_entry(doc, field, b"Kids")?;
        kids.iter().find_map(|kid| match kid {
            Object::Reference(kid_id) => {
                let dict = doc.get_object(*kid_id).ok().and_then(|o| objects::dict(doc, o))?;
                dict.has(b"Rect").then_some((*kid_id, dict))
            }
            _ => None,
        })?
    };

    let rect = objects::rect(doc, widget.get(b"Rect").ok()?)?;
    let Some((page, page_id)) = pages.page_of(doc, widget_id, widget) else {
        debug!(field = %entry.name, "widget is not placed on any page");
        return None;
    };
    Some(FieldGeometry {
        page,
        rect,
        media_box: media_box(doc, page_id),
    })
}
