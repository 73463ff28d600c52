//! Serialization of an edited sheet: incremental update or full rewrite.
//!
//! An incremental update keeps the original bytes verbatim and appends:
//!
//! ```text
//! n g obj ... endobj        (every changed or new object)
//! xref
//! start count               (one subsection per contiguous run)
//! 0000000123 00000 n\r\n
//! trailer
//! << /Size /Root /Info /ID /Prev >>
//! startxref
//! offset
//! %%EOF
//! ```

use lopdf::{Dictionary, Object, StringFormat};
use tracing::debug;

use crate::document::SheetDocument;
use crate::error::ActionError;
use crate::options::SaveMode;

/// Write `sheet` out as a complete byte buffer.
///
/// Nothing is returned until the whole buffer has been built, so a failure
/// never yields a partial file. An unchanged sheet comes back byte-identical.
pub(crate) fn serialize(sheet: SheetDocument<'_>, mode: SaveMode) -> Result<Vec<u8>, ActionError> {
    if !sheet.is_changed() {
        return Ok(sheet.source.to_vec());
    }
    match mode {
        SaveMode::Incremental => match find_startxref(sheet.source) {
            Some(prev) if sheet.source[prev..].starts_with(b"xref") => incremental(&sheet, prev),
            _ => {
                debug!("source uses a cross-reference stream; rewriting instead");
                rewrite(sheet)
            }
        },
        SaveMode::Rewrite => rewrite(sheet),
    }
}

fn rewrite(sheet: SheetDocument<'_>) -> Result<Vec<u8>, ActionError> {
    let mut doc = sheet.doc;
    let mut out = Vec::new();
    doc.save_to(&mut out)
        .map_err(|e| ActionError::SerializationFailed(e.to_string()))?;
    Ok(out)
}

fn incremental(sheet: &SheetDocument<'_>, prev: usize) -> Result<Vec<u8>, ActionError> {
    let mut out = sheet.source.to_vec();
    if !matches!(out.last().copied(), Some(b'\n') | Some(b'\r')) {
        out.push(b'\n');
    }

    let mut offsets = Vec::with_capacity(sheet.dirty().len());
    for id in sheet.dirty() {
        let obj = sheet.doc.get_object(*id).map_err(|e| {
            ActionError::SerializationFailed(format!("object {} {}: {}", id.0, id.1, e))
        })?;
        offsets.push((*id, out.len()));
        out.extend_from_slice(format!("{} {} obj\n", id.0, id.1).as_bytes());
        write_object(&mut out, obj);
        out.extend_from_slice(b"\nendobj\n");
    }

    let xref_offset = out.len();
    out.extend_from_slice(b"xref\n");
    // Dirty ids come out of a BTreeSet, so runs are already sorted.
    let mut index = 0;
    while index < offsets.len() {
        let mut end = index + 1;
        while end < offsets.len() && offsets[end].0 .0 == offsets[end - 1].0 .0 + 1 {
            end += 1;
        }
        out.extend_from_slice(format!("{} {}\n", offsets[index].0 .0, end - index).as_bytes());
        for ((_, generation), offset) in &offsets[index..end] {
            out.extend_from_slice(format!("{:010} {:05} n\r\n", offset, generation).as_bytes());
        }
        index = end;
    }

    let mut trailer = Dictionary::new();
    let previous_size = match sheet.doc.trailer.get(b"Size") {
        Ok(Object::Integer(size)) => *size,
        _ => 0,
    };
    trailer.set("Size", Object::Integer(previous_size.max(sheet.doc.max_id as i64 + 1)));
    for key in [b"Root".as_slice(), b"Info".as_slice(), b"ID".as_slice()] {
        if let Ok(value) = sheet.doc.trailer.get(key) {
            trailer.set(key.to_vec(), value.clone());
        }
    }
    trailer.set("Prev", Object::Integer(prev as i64));

    out.extend_from_slice(b"trailer\n");
    write_dictionary(&mut out, &trailer);
    out.extend_from_slice(format!("\nstartxref\n{}\n%%EOF\n", xref_offset).as_bytes());

    debug!(objects = offsets.len(), bytes = out.len(), "wrote incremental update");
    Ok(out)
}

/// Offset named by the last `startxref` keyword in the file.
fn find_startxref(bytes: &[u8]) -> Option<usize> {
    let search_start = bytes.len().saturating_sub(2048);
    let tail = &bytes[search_start..];
    let pos = tail.windows(9).rposition(|w| w == b"startxref")?;
    let digits: String = tail[pos + 9..]
        .iter()
        .skip_while(|b| b.is_ascii_whitespace())
        .take_while(|b| b.is_ascii_digit())
        .map(|&b| b as char)
        .collect();
    let offset = digits.parse::<usize>().ok()?;
    (offset < bytes.len()).then_some(offset)
}

/// Escape a literal string body: backslash and both parentheses, plus CR which
/// readers would otherwise normalize to LF.
pub(crate) fn escape_pdf_string(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len());
    for &b in bytes {
        match b {
            b'(' => out.extend_from_slice(b"\\("),
            b')' => out.extend_from_slice(b"\\)"),
            b'\\' => out.extend_from_slice(b"\\\\"),
            b'\r' => out.extend_from_slice(b"\\r"),
            _ => out.push(b),
        }
    }
    out
}

fn is_regular_name_byte(b: u8) -> bool {
    (b'!'..=b'~').contains(&b) && !b"#()<>[]{}/%".contains(&b)
}

fn write_name(out: &mut Vec<u8>, name: &[u8]) {
    out.push(b'/');
    for &b in name {
        if is_regular_name_byte(b) {
            out.push(b);
        } else {
            out.extend_from_slice(format!("#{:02X}", b).as_bytes());
        }
    }
}

fn write_dictionary(out: &mut Vec<u8>, dict: &Dictionary) {
    out.extend_from_slice(b"<<");
    for (key, value) in dict.iter() {
        write_name(out, key);
        out.push(b' ');
        write_object(out, value);
    }
    out.extend_from_slice(b">>");
}

pub(crate) fn write_object(out: &mut Vec<u8>, obj: &Object) {
    match obj {
        Object::Null => out.extend_from_slice(b"null"),
        Object::Boolean(b) => out.extend_from_slice(if *b { b"true".as_slice() } else { b"false".as_slice() }),
        Object::Integer(i) => out.extend_from_slice(i.to_string().as_bytes()),
        Object::Real(r) if r.is_finite() => out.extend_from_slice(r.to_string().as_bytes()),
        Object::Real(_) => out.push(b'0'),
        Object::Name(name) => write_name(out, name),
        Object::String(bytes, StringFormat::Literal) => {
            out.push(b'(');
            out.extend_from_slice(&escape_pdf_string(bytes));
            out.push(b')');
        }
        Object::String(bytes, StringFormat::Hexadecimal) => {
            out.push(b'<');
            for b in bytes {
                out.extend_from_slice(format!("{:02X}", b).as_bytes());
            }
            out.push(b'>');
        }
        Object::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b' ');
                }
                write_object(out, item);
            }
            out.push(b']');
        }
        Object::Dictionary(dict) => write_dictionary(out, dict),
        Object::Stream(stream) => {
            let mut dict = stream.dict.clone();
            dict.set("Length", Object::Integer(stream.content.len() as i64));
            write_dictionary(out, &dict);
            out.extend_from_slice(b"\nstream\n");
            out.extend_from_slice(&stream.content);
            out.extend_from_slice(b"\nendstream");
        }
        Object::Reference((number, generation)) => {
            out.extend_from_slice(format!("{} {} R", number, generation).as_bytes());
        }
    }
}
