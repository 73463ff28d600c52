//! Builds small fillable sheets in memory.
//!
//! Used for test fixtures and for the blank sample sheet the CLI can emit.

use lopdf::xref::XrefType;
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};

use crate::error::ActionError;
use crate::fields::FieldKind;
use crate::objects;

#[derive(Debug, Clone)]
struct FieldSpec {
    name: String,
    kind: FieldKind,
    page: usize,
    rect: [f64; 4],
    calculation: Option<String>,
}

#[derive(Debug, Clone)]
struct GroupSpec {
    name: String,
    children: Vec<FieldSpec>,
}

#[derive(Debug, Clone)]
enum Entry {
    Field(FieldSpec),
    Group(GroupSpec),
}

/// Declarative description of a fillable sheet.
#[derive(Debug, Clone)]
pub struct SheetBuilder {
    pages: usize,
    media_box: [f64; 4],
    entries: Vec<Entry>,
    document_scripts: Vec<(String, String)>,
    with_acroform: bool,
}

impl Default for SheetBuilder {
    fn default() -> Self {
        Self {
            pages: 1,
            media_box: [0.0, 0.0, 612.0, 792.0],
            entries: Vec::new(),
            document_scripts: Vec::new(),
            with_acroform: true,
        }
    }
}

impl SheetBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pages(mut self, pages: usize) -> Self {
        self.pages = pages.max(1);
        self
    }

    /// Page size as `[x1, y1, x2, y2]`.
    pub fn media_box(mut self, media_box: [f64; 4]) -> Self {
        self.media_box = media_box;
        self
    }

    pub fn text(self, name: &str, page: usize, rect: [f64; 4]) -> Self {
        self.field(name, FieldKind::Text, page, rect)
    }

    pub fn checkbox(self, name: &str, page: usize, rect: [f64; 4]) -> Self {
        self.field(name, FieldKind::Checkbox, page, rect)
    }

    pub fn field(mut self, name: &str, kind: FieldKind, page: usize, rect: [f64; 4]) -> Self {
        self.entries.push(Entry::Field(FieldSpec {
            name: name.to_string(),
            kind,
            page,
            rect,
            calculation: None,
        }));
        self
    }

    /// A text field that already carries a calculation script.
    pub fn calculated_text(mut self, name: &str, page: usize, rect: [f64; 4], script: &str) -> Self {
        self.entries.push(Entry::Field(FieldSpec {
            name: name.to_string(),
            kind: FieldKind::Text,
            page,
            rect,
            calculation: Some(script.to_string()),
        }));
        self
    }

    /// A non-terminal field whose text children are named `parent.child`.
    pub fn group(mut self, parent: &str, children: &[(&str, [f64; 4])]) -> Self {
        self.entries.push(Entry::Group(GroupSpec {
            name: parent.to_string(),
            children: children
                .iter()
                .map(|(name, rect)| FieldSpec {
                    name: name.to_string(),
                    kind: FieldKind::Text,
                    page: 0,
                    rect: *rect,
                    calculation: None,
                })
                .collect(),
        }));
        self
    }

    /// A document-level JavaScript entry.
    pub fn document_script(mut self, name: &str, source: &str) -> Self {
        self.document_scripts.push((name.to_string(), source.to_string()));
        self
    }

    /// Leave out the AcroForm entirely.
    pub fn without_acroform(mut self) -> Self {
        self.with_acroform = false;
        self
    }

    pub fn build(&self) -> Result<Vec<u8>, ActionError> {
        let mut doc = Document::with_version("1.7");
        // Classic xref table, so attaching can append an incremental update.
        doc.reference_table.cross_reference_type = XrefType::CrossReferenceTable;
        let pages_id = doc.new_object_id();

        let mut page_ids = Vec::with_capacity(self.pages);
        let mut page_annots: Vec<Vec<Object>> = vec![Vec::new(); self.pages];
        for _ in 0..self.pages {
            let content = doc.add_object(Stream::new(Dictionary::new(), Vec::new()));
            page_ids.push(doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content,
            }));
        }

        let mut fields = Vec::new();
        let mut order = Vec::new();
        for entry in &self.entries {
            match entry {
                Entry::Field(spec) => {
                    let page = spec.page.min(self.pages - 1);
                    let id = self.add_widget_field(&mut doc, spec, page_ids[page], None)?;
                    page_annots[page].push(Object::Reference(id));
                    if spec.calculation.is_some() {
                        order.push(Object::Reference(id));
                    }
                    fields.push(Object::Reference(id));
                }
                Entry::Group(group) => {
                    let parent_id = doc.new_object_id();
                    let mut kids = Vec::new();
                    for child in &group.children {
                        let id = self.add_widget_field(&mut doc, child, page_ids[0], Some(parent_id))?;
                        page_annots[0].push(Object::Reference(id));
                        kids.push(Object::Reference(id));
                    }
                    doc.objects.insert(
                        parent_id,
                        Object::Dictionary(dictionary! {
                            "T" => objects::encode_text(&group.name),
                            "FT" => "Tx",
                            "Kids" => kids,
                        }),
                    );
                    fields.push(Object::Reference(parent_id));
                }
            }
        }

        for (page_id, annots) in page_ids.iter().zip(page_annots) {
            if annots.is_empty() {
                continue;
            }
            if let Ok(Object::Dictionary(page)) = doc.get_object_mut(*page_id) {
                page.set("Annots", annots);
            }
        }

        let [x1, y1, x2, y2] = self.media_box;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => page_ids.iter().map(|id| Object::Reference(*id)).collect::<Vec<_>>(),
                "Count" => self.pages as i64,
                "MediaBox" => vec![Object::Real(x1 as f32), Object::Real(y1 as f32), Object::Real(x2 as f32), Object::Real(y2 as f32)],
            }),
        );

        let mut catalog = dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        };
        if self.with_acroform {
            let mut acroform = dictionary! { "Fields" => fields };
            if !order.is_empty() {
                acroform.set("CO", order);
            }
            catalog.set("AcroForm", acroform);
        }
        if !self.document_scripts.is_empty() {
            let mut scripts = self.document_scripts.clone();
            scripts.sort();
            let mut pairs = Vec::new();
            for (name, source) in scripts {
                let action = doc.add_object(dictionary! {
                    "S" => "JavaScript",
                    "JS" => objects::encode_text(&source),
                });
                pairs.push(objects::encode_text(&name));
                pairs.push(Object::Reference(action));
            }
            catalog.set(
                "Names",
                dictionary! { "JavaScript" => dictionary! { "Names" => pairs } },
            );
        }
        let catalog_id = doc.add_object(catalog);
        doc.trailer.set("Root", catalog_id);

        let mut out = Vec::new();
        doc.save_to(&mut out)
            .map_err(|e| ActionError::SerializationFailed(e.to_string()))?;
        Ok(out)
    }

    fn add_widget_field(
        &self,
        doc: &mut Document,
        spec: &FieldSpec,
        page_id: ObjectId,
        parent: Option<ObjectId>,
    ) -> Result<ObjectId, ActionError> {
        let [x1, y1, x2, y2] = spec.rect;
        let mut field = dictionary! {
            "Type" => "Annot",
            "Subtype" => "Widget",
            "T" => objects::encode_text(&spec.name),
            "Rect" => vec![Object::Real(x1 as f32), Object::Real(y1 as f32), Object::Real(x2 as f32), Object::Real(y2 as f32)],
            "P" => page_id,
        };
        if let Some(parent) = parent {
            field.set("Parent", parent);
        } else {
            let (field_type, flags) = match spec.kind {
                FieldKind::Text | FieldKind::Unknown => ("Tx", 0),
                FieldKind::Choice => ("Ch", 0),
                FieldKind::Checkbox => ("Btn", 0),
                FieldKind::RadioButton => ("Btn", 1 << 15),
                FieldKind::PushButton => ("Btn", 1 << 16),
                FieldKind::Signature => ("Sig", 0),
            };
            field.set("FT", Object::Name(field_type.as_bytes().to_vec()));
            if flags != 0 {
                field.set("Ff", Object::Integer(flags));
            }
        }
        if let Some(script) = &spec.calculation {
            let action = doc.add_object(dictionary! {
                "S" => "JavaScript",
                "JS" => objects::encode_text(script),
            });
            field.set("AA", dictionary! { "C" => action });
        }
        Ok(doc.add_object(field))
    }
}

/// A blank sheet with the fields used by the bundled recipes.
pub fn sample_character_sheet() -> Result<Vec<u8>, ActionError> {
    let mut builder = SheetBuilder::new();
    let abilities = ["STR", "DEX", "CON", "INT", "WIS", "CHA"];
    for (row, ability) in abilities.iter().enumerate() {
        let y = 700.0 - row as f64 * 60.0;
        builder = builder
            .text(ability, 0, [40.0, y, 90.0, y + 30.0])
            .text(&format!("{}mod", ability), 0, [100.0, y, 150.0, y + 30.0])
            .checkbox(&format!("{} Save Prof", ability), 0, [170.0, y + 8.0, 184.0, y + 22.0])
            .text(&format!("ST {}", ability), 0, [190.0, y, 240.0, y + 30.0]);
    }
    builder
        .text("ProfBonus", 0, [40.0, 320.0, 90.0, 350.0])
        .checkbox("Athletics Prof", 0, [300.0, 708.0, 314.0, 722.0])
        .checkbox("Athletics Expertise", 0, [320.0, 708.0, 334.0, 722.0])
        .text("Athletics", 0, [340.0, 700.0, 390.0, 730.0])
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_sheet_parses() {
        let bytes = sample_character_sheet().unwrap();
        assert!(bytes.starts_with(b"%PDF-1.7"));
        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
    }
}
