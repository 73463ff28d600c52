//! Name tree lookup and sorted insertion (`Names`/`Kids`/`Limits`).

use std::collections::HashSet;

use lopdf::{Object, ObjectId};
use tracing::{debug, warn};

use crate::document::{DictLoc, SheetDocument};
use crate::error::ActionError;
use crate::objects;

const MAX_TREE_DEPTH: usize = 32;

/// A key found in a leaf's `Names` array.
#[derive(Debug, Clone)]
pub(crate) struct NameHit {
    pub leaf: DictLoc,
    /// Index of the key; the value sits at `index + 1`.
    pub index: usize,
    pub value: Object,
}

fn key_text(sheet: &SheetDocument<'_>, obj: &Object) -> Option<String> {
    objects::text(&sheet.doc, obj)
}

/// Depth-first search of the tree rooted at `root` for `key`.
pub(crate) fn find(
    sheet: &SheetDocument<'_>,
    root: &DictLoc,
    key: &str,
) -> Result<Option<NameHit>, ActionError> {
    let mut visited = HashSet::new();
    find_in(sheet, root, key, 0, &mut visited)
}

fn find_in(
    sheet: &SheetDocument<'_>,
    node: &DictLoc,
    key: &str,
    depth: usize,
    visited: &mut HashSet<ObjectId>,
) -> Result<Option<NameHit>, ActionError> {
    if depth > MAX_TREE_DEPTH {
        return Err(ActionError::MalformedDocument("name tree is too deep".into()));
    }

    if let Some(pairs) = sheet.array(node, b"Names") {
        for (index, pair) in pairs.chunks(2).enumerate() {
            if pair.len() == 2 && key_text(sheet, &pair[0]).as_deref() == Some(key) {
                return Ok(Some(NameHit {
                    leaf: node.clone(),
                    index: index * 2,
                    value: pair[1].clone(),
                }));
            }
        }
    }

    let kids: Vec<ObjectId> = sheet
        .array(node, b"Kids")
        .map(|kids| {
            kids.iter()
                .filter_map(|kid| match kid {
                    Object::Reference(id) => Some(*id),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default();

    for kid in kids {
        if !visited.insert(kid) {
            warn!(object = kid.0, "name tree cycle skipped");
            continue;
        }
        if let Some(hit) = find_in(sheet, &DictLoc::object(kid), key, depth + 1, visited)? {
            return Ok(Some(hit));
        }
    }
    Ok(None)
}

fn limits(sheet: &SheetDocument<'_>, node: &DictLoc) -> Option<(String, String)> {
    let limits = sheet.array(node, b"Limits")?;
    if limits.len() != 2 {
        return None;
    }
    Some((key_text(sheet, &limits[0])?, key_text(sheet, &limits[1])?))
}

/// Insert `key -> value` keeping keys sorted, widening `Limits` on the way down.
pub(crate) fn insert(
    sheet: &mut SheetDocument<'_>,
    root: &DictLoc,
    key: &str,
    value: Object,
) -> Result<(), ActionError> {
    let mut path = Vec::new();
    let mut node = root.clone();

    loop {
        let kids: Vec<ObjectId> = sheet
            .array(&node, b"Kids")
            .map(|kids| {
                kids.iter()
                    .filter_map(|kid| match kid {
                        Object::Reference(id) => Some(*id),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default();
        if kids.is_empty() || path.len() > MAX_TREE_DEPTH {
            break;
        }

        // Last kid whose lower limit does not exceed the key, else the first.
        let mut chosen = kids[0];
        for kid in &kids {
            let kid_loc = DictLoc::object(*kid);
            match limits(sheet, &kid_loc).or_else(|| leaf_bounds(sheet, &kid_loc)) {
                Some((low, _)) if low.as_str() <= key => chosen = *kid,
                _ => {}
            }
        }
        path.push(node);
        node = DictLoc::object(chosen);
    }

    let position = {
        let existing = sheet.array(&node, b"Names");
        let mut position = existing.map(Vec::len).unwrap_or(0);
        if let Some(pairs) = existing {
            for (index, pair) in pairs.chunks(2).enumerate() {
                if key_text(sheet, &pair[0]).is_some_and(|k| k.as_str() > key) {
                    position = index * 2;
                    break;
                }
            }
        }
        position - position % 2
    };

    debug!(key, position, "inserting name tree entry");
    let pairs = sheet.array_mut(&node, b"Names")?;
    pairs.insert(position, value);
    pairs.insert(position, objects::encode_text(key));

    path.push(node);
    for node in path.iter().skip(1) {
        widen_limits(sheet, node, key)?;
    }
    Ok(())
}

/// First and last keys of a leaf's `Names` array.
fn leaf_bounds(sheet: &SheetDocument<'_>, node: &DictLoc) -> Option<(String, String)> {
    let pairs = sheet.array(node, b"Names")?;
    let mut keys = pairs.chunks(2).filter_map(|pair| key_text(sheet, &pair[0]));
    let first = keys.next()?;
    let last = keys.last().unwrap_or_else(|| first.clone());
    Some((first, last))
}

fn widen_limits(sheet: &mut SheetDocument<'_>, node: &DictLoc, key: &str) -> Result<(), ActionError> {
    let (low, high) = match limits(sheet, node).or_else(|| leaf_bounds(sheet, node)) {
        Some((low, high)) => (low, high),
        None => (key.to_string(), key.to_string()),
    };
    let new_low = if key < low.as_str() { key.to_string() } else { low.clone() };
    let new_high = if key > high.as_str() { key.to_string() } else { high.clone() };
    if new_low == low && new_high == high && sheet.array(node, b"Limits").is_some() {
        return Ok(());
    }
    sheet.dict_mut(node)?.set(
        "Limits",
        Object::Array(vec![objects::encode_text(&new_low), objects::encode_text(&new_high)]),
    );
    Ok(())
}
