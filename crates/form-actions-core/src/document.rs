//! Editable view of a loaded sheet that remembers which indirect objects changed.

use std::collections::BTreeSet;

use lopdf::{Dictionary, Document, Object, ObjectId};
use tracing::debug;

use crate::error::ActionError;

/// Where a dictionary lives: an indirect object plus the keys of the direct
/// dictionaries nested inside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DictLoc {
    pub owner: ObjectId,
    pub path: Vec<Vec<u8>>,
}

impl DictLoc {
    pub fn object(owner: ObjectId) -> Self {
        Self {
            owner,
            path: Vec::new(),
        }
    }

    fn nested(&self, key: &[u8]) -> Self {
        let mut path = self.path.clone();
        path.push(key.to_vec());
        Self {
            owner: self.owner,
            path,
        }
    }
}

/// A parsed sheet together with its source bytes and the set of objects an
/// edit has touched.
pub(crate) struct SheetDocument<'a> {
    pub doc: Document,
    pub source: &'a [u8],
    dirty: BTreeSet<ObjectId>,
}

/// Parse sheet bytes, checking for a PDF header first.
pub(crate) fn load(bytes: &[u8]) -> Result<Document, ActionError> {
    let window = &bytes[..bytes.len().min(1024)];
    if !window.windows(5).any(|w| w == b"%PDF-") {
        return Err(ActionError::MalformedDocument("missing %PDF- header".into()));
    }
    Document::load_mem(bytes).map_err(|e| {
        if bytes.windows(8).any(|w| w == b"/Encrypt") {
            ActionError::UnsupportedDocument(format!("encrypted document: {}", e))
        } else {
            ActionError::malformed(e)
        }
    })
}

enum Slot {
    Indirect(ObjectId),
    Direct,
    Missing,
    Invalid,
}

impl<'a> SheetDocument<'a> {
    pub fn load(source: &'a [u8]) -> Result<Self, ActionError> {
        Ok(Self::new(load(source)?, source))
    }

    pub fn new(doc: Document, source: &'a [u8]) -> Self {
        Self {
            doc,
            source,
            dirty: BTreeSet::new(),
        }
    }

    pub fn dirty(&self) -> &BTreeSet<ObjectId> {
        &self.dirty
    }

    pub fn is_changed(&self) -> bool {
        !self.dirty.is_empty()
    }

    pub fn catalog(&self) -> Result<DictLoc, ActionError> {
        match self.doc.trailer.get(b"Root") {
            Ok(Object::Reference(id)) => Ok(DictLoc::object(*id)),
            _ => Err(ActionError::MalformedDocument(
                "trailer has no indirect Root".into(),
            )),
        }
    }

    /// The AcroForm dictionary, which must exist.
    pub fn acroform(&self) -> Result<DictLoc, ActionError> {
        let catalog = self.catalog()?;
        self.child(&catalog, b"AcroForm")
            .ok_or_else(|| ActionError::MalformedDocument("document has no AcroForm".into()))
    }

    pub fn dict(&self, loc: &DictLoc) -> Result<&Dictionary, ActionError> {
        let obj = self.doc.get_object(loc.owner).map_err(ActionError::malformed)?;
        let mut dict = match obj {
            Object::Dictionary(d) => d,
            Object::Stream(s) => &s.dict,
            _ => return Err(not_a_dict(loc)),
        };
        for key in &loc.path {
            dict = match dict.get(key) {
                Ok(Object::Dictionary(d)) => d,
                _ => return Err(not_a_dict(loc)),
            };
        }
        Ok(dict)
    }

    /// Mutable access to a dictionary; its owning object is marked changed.
    pub fn dict_mut(&mut self, loc: &DictLoc) -> Result<&mut Dictionary, ActionError> {
        self.dirty.insert(loc.owner);
        let obj = self
            .doc
            .get_object_mut(loc.owner)
            .map_err(ActionError::malformed)?;
        dict_in_mut(obj, &loc.path).ok_or_else(|| not_a_dict(loc))
    }

    /// Location of the dictionary stored under `key`, following a reference.
    pub fn child(&self, loc: &DictLoc, key: &[u8]) -> Option<DictLoc> {
        match self.dict(loc).ok()?.get(key).ok()? {
            Object::Reference(id) => match self.doc.get_object(*id).ok()? {
                Object::Dictionary(_) | Object::Stream(_) => Some(DictLoc::object(*id)),
                _ => None,
            },
            Object::Dictionary(_) => Some(loc.nested(key)),
            _ => None,
        }
    }

    /// Like [`SheetDocument::child`], creating an empty direct dictionary when absent.
    pub fn child_or_insert(&mut self, loc: &DictLoc, key: &[u8]) -> Result<DictLoc, ActionError> {
        if let Some(found) = self.child(loc, key) {
            return Ok(found);
        }
        if self.dict(loc)?.has(key) {
            return Err(ActionError::MalformedDocument(format!(
                "/{} is not a dictionary",
                String::from_utf8_lossy(key)
            )));
        }
        debug!(key = %String::from_utf8_lossy(key), "creating dictionary");
        self.dict_mut(loc)?
            .set(key.to_vec(), Object::Dictionary(Dictionary::new()));
        Ok(loc.nested(key))
    }

    /// Mutable access to the array stored under `key`, created empty when absent.
    /// An indirect array object is edited in place.
    pub fn array_mut(&mut self, loc: &DictLoc, key: &[u8]) -> Result<&mut Vec<Object>, ActionError> {
        let slot = match self.dict(loc)?.get(key) {
            Ok(Object::Reference(id)) => Slot::Indirect(*id),
            Ok(Object::Array(_)) => Slot::Direct,
            Ok(_) => Slot::Invalid,
            Err(_) => Slot::Missing,
        };
        let invalid = || {
            ActionError::MalformedDocument(format!(
                "/{} is not an array",
                String::from_utf8_lossy(key)
            ))
        };
        match slot {
            Slot::Indirect(id) => {
                self.dirty.insert(id);
                match self.doc.get_object_mut(id).map_err(ActionError::malformed)? {
                    Object::Array(items) => Ok(items),
                    _ => Err(invalid()),
                }
            }
            Slot::Invalid => Err(invalid()),
            Slot::Direct | Slot::Missing => {
                let dict = self.dict_mut(loc)?;
                if !dict.has(key) {
                    dict.set(key.to_vec(), Object::Array(Vec::new()));
                }
                match dict.get_mut(key).map_err(ActionError::malformed)? {
                    Object::Array(items) => Ok(items),
                    _ => Err(invalid()),
                }
            }
        }
    }

    /// Read access to the array under `key`, following a reference.
    pub fn array(&self, loc: &DictLoc, key: &[u8]) -> Option<&Vec<Object>> {
        let dict = self.dict(loc).ok()?;
        crate::objects::array_entry(&self.doc, dict, key)
    }

    pub fn add_object(&mut self, obj: impl Into<Object>) -> ObjectId {
        let id = self.doc.add_object(obj);
        self.dirty.insert(id);
        id
    }

    pub fn object_mut(&mut self, id: ObjectId) -> Result<&mut Object, ActionError> {
        self.dirty.insert(id);
        self.doc.get_object_mut(id).map_err(ActionError::malformed)
    }
}

fn dict_in_mut<'d>(obj: &'d mut Object, path: &[Vec<u8>]) -> Option<&'d mut Dictionary> {
    let mut dict = match obj {
        Object::Dictionary(d) => d,
        Object::Stream(s) => &mut s.dict,
        _ => return None,
    };
    for key in path {
        dict = match dict.get_mut(key).ok()? {
            Object::Dictionary(d) => d,
            _ => return None,
        };
    }
    Some(dict)
}

fn not_a_dict(loc: &DictLoc) -> ActionError {
    ActionError::MalformedDocument(format!(
        "object {} {} has no dictionary at /{}",
        loc.owner.0,
        loc.owner.1,
        loc.path
            .iter()
            .map(|k| String::from_utf8_lossy(k).into_owned())
            .collect::<Vec<_>>()
            .join("/")
    ))
}
