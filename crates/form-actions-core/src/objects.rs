//! Read-side helpers over the lopdf object arena.

use lopdf::{Dictionary, Document, Object, StringFormat};

/// Reference chains longer than this are treated as broken.
const MAX_REFERENCE_HOPS: usize = 16;

/// Follow indirect references until a direct object is reached.
pub(crate) fn resolve<'d>(doc: &'d Document, mut obj: &'d Object) -> Option<&'d Object> {
    for _ in 0..MAX_REFERENCE_HOPS {
        match obj {
            Object::Reference(id) => obj = doc.get_object(*id).ok()?,
            other => return Some(other),
        }
    }
    None
}

pub(crate) fn dict<'d>(doc: &'d Document, obj: &'d Object) -> Option<&'d Dictionary> {
    match resolve(doc, obj)? {
        Object::Dictionary(d) => Some(d),
        Object::Stream(s) => Some(&s.dict),
        _ => None,
    }
}

pub(crate) fn array<'d>(doc: &'d Document, obj: &'d Object) -> Option<&'d Vec<Object>> {
    match resolve(doc, obj)? {
        Object::Array(a) => Some(a),
        _ => None,
    }
}

pub(crate) fn dict_entry<'d>(
    doc: &'d Document,
    parent: &'d Dictionary,
    key: &[u8],
) -> Option<&'d Dictionary> {
    dict(doc, parent.get(key).ok()?)
}

pub(crate) fn array_entry<'d>(
    doc: &'d Document,
    parent: &'d Dictionary,
    key: &[u8],
) -> Option<&'d Vec<Object>> {
    array(doc, parent.get(key).ok()?)
}

pub(crate) fn name<'d>(doc: &'d Document, obj: &'d Object) -> Option<&'d [u8]> {
    match resolve(doc, obj)? {
        Object::Name(n) => Some(n.as_slice()),
        _ => None,
    }
}

pub(crate) fn number(doc: &Document, obj: &Object) -> Option<f64> {
    match resolve(doc, obj)? {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(*r as f64),
        _ => None,
    }
}

pub(crate) fn integer(doc: &Document, obj: &Object) -> Option<i64> {
    match resolve(doc, obj)? {
        Object::Integer(i) => Some(*i),
        Object::Real(r) => Some(*r as i64),
        _ => None,
    }
}

/// Text string value, decoded from UTF-16BE or PDFDocEncoding.
pub(crate) fn text(doc: &Document, obj: &Object) -> Option<String> {
    match resolve(doc, obj)? {
        Object::String(bytes, _) => Some(decode_text(bytes)),
        _ => None,
    }
}

/// Script text held either as a string or as a (possibly compressed) stream.
pub(crate) fn script_text(doc: &Document, obj: &Object) -> Option<String> {
    match resolve(doc, obj)? {
        Object::String(bytes, _) => Some(decode_text(bytes)),
        Object::Stream(stream) => {
            let content = stream
                .decompressed_content()
                .unwrap_or_else(|_| stream.content.clone());
            Some(decode_text(&content))
        }
        _ => None,
    }
}

pub(crate) fn decode_text(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

/// Encode a text string: plain bytes for ASCII, UTF-16BE with a BOM otherwise.
pub(crate) fn encode_text(value: &str) -> Object {
    if value.is_ascii() {
        return Object::String(value.as_bytes().to_vec(), StringFormat::Literal);
    }
    let mut bytes = vec![0xFE, 0xFF];
    for unit in value.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Literal)
}

/// Rectangle as `[x1, y1, x2, y2]` with the lower-left corner first.
pub(crate) fn rect(doc: &Document, obj: &Object) -> Option<[f64; 4]> {
    let values = array(doc, obj)?;
    if values.len() != 4 {
        return None;
    }
    let mut nums = [0.0; 4];
    for (slot, value) in nums.iter_mut().zip(values) {
        *slot = number(doc, value)?;
    }
    Some([
        nums[0].min(nums[2]),
        nums[1].min(nums[3]),
        nums[0].max(nums[2]),
        nums[1].max(nums[3]),
    ])
}
