/// vCard folder import
///
/// Walks a folder for `.vcf` files and loads the fields this app cares
/// about (names, organization, first postal address, photo) into the
/// contact store. Re-importing the same cards is a no-op thanks to the UID
/// uniqueness constraint.

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use std::path::Path;
use walkdir::WalkDir;

use super::library::{NewContact, SqliteContactStore};
use crate::error::ContactError;
use crate::photo::acquire::decode_data_url;

/// Result of a folder import operation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportResult {
    pub imported_count: usize,
    pub skipped_count: usize,
    /// Files that could not be read
    pub failed_files: usize,
}

/// Import every card found under `folder` into `store`
pub fn import_folder(store: &SqliteContactStore, folder: &Path) -> Result<ImportResult, ContactError> {
    let mut contacts = Vec::new();
    let mut failed_files = 0;

    tracing::info!(folder = %folder.display(), "scanning for vCards");

    // Walk the directory tree recursively
    for entry in WalkDir::new(folder)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let is_vcard = path
            .extension()
            .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case("vcf"))
            .unwrap_or(false);
        if !is_vcard {
            continue;
        }

        match std::fs::read_to_string(path) {
            Ok(text) => {
                let source = path.to_string_lossy();
                contacts.extend(parse_cards(&text, &source));
            }
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "skipping unreadable vCard");
                failed_files += 1;
            }
        }
    }

    let (imported_count, skipped_count) = store.insert_contacts(&contacts)?;

    tracing::info!(imported_count, skipped_count, failed_files, "vCard import complete");

    Ok(ImportResult {
        imported_count,
        skipped_count,
        failed_files,
    })
}

/// Parse all cards in one file. `source` names the file and seeds the
/// fallback UID of cards that carry none.
pub fn parse_cards(text: &str, source: &str) -> Vec<NewContact> {
    let mut cards = Vec::new();
    let mut current: Option<NewContact> = None;
    let mut has_address = false;
    let mut formatted_name = String::new();

    for line in unfold(text) {
        let Some((name, params, value)) = split_property(&line) else {
            continue;
        };

        match name.as_str() {
            "BEGIN" if value.eq_ignore_ascii_case("VCARD") => {
                current = Some(NewContact::default());
                has_address = false;
                formatted_name.clear();
            }
            "END" if value.eq_ignore_ascii_case("VCARD") => {
                if let Some(mut card) = current.take() {
                    if card.given_name.is_empty() && card.family_name.is_empty() {
                        card.given_name = formatted_name.clone();
                    }
                    if card.uid.is_empty() {
                        card.uid = format!("{}#{}", source, cards.len());
                    }
                    cards.push(card);
                }
            }
            _ => {
                let Some(card) = current.as_mut() else {
                    continue;
                };
                match name.as_str() {
                    "N" => {
                        let parts = split_components(value);
                        card.family_name = parts.first().cloned().unwrap_or_default();
                        card.given_name = parts.get(1).cloned().unwrap_or_default();
                    }
                    "FN" => formatted_name = unescape(value),
                    "ORG" => {
                        card.organization = split_components(value).into_iter().next().unwrap_or_default();
                    }
                    "ADR" if !has_address => {
                        // po-box; extended; street; locality; region; postal code; country
                        let parts = split_components(value);
                        card.city = parts.get(3).cloned().unwrap_or_default();
                        card.region = parts.get(4).cloned().unwrap_or_default();
                        has_address = true;
                    }
                    "UID" => card.uid = value.trim().to_string(),
                    "PHOTO" if card.image.is_none() => card.image = decode_photo(&params, value),
                    _ => {}
                }
            }
        }
    }

    cards
}

/// Join folded continuation lines (RFC 6350 §3.2)
fn unfold(text: &str) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    for raw in text.lines() {
        let raw = raw.trim_end_matches('\r');
        if let Some(rest) = raw.strip_prefix(' ').or_else(|| raw.strip_prefix('\t')) {
            if let Some(last) = lines.last_mut() {
                last.push_str(rest);
                continue;
            }
        }
        lines.push(raw.to_string());
    }
    lines
}

/// Split "item1.NAME;PARAM=x:value" into (NAME, [PARAM=x], value)
fn split_property(line: &str) -> Option<(String, Vec<String>, &str)> {
    let (head, value) = line.split_once(':')?;
    let mut segments = head.split(';');
    let name = segments.next()?;
    let name = name.rsplit('.').next().unwrap_or(name).trim().to_ascii_uppercase();
    let params = segments.map(|p| p.trim().to_ascii_uppercase()).collect();
    Some((name, params, value))
}

/// Split a structured value on unescaped ';' and unescape each part
fn split_components(value: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut escaped = false;

    for c in value.chars() {
        if escaped {
            current.push('\\');
            current.push(c);
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == ';' {
            parts.push(unescape(&current));
            current.clear();
        } else {
            current.push(c);
        }
    }
    parts.push(unescape(&current));
    parts
}

fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') | Some('N') => out.push('\n'),
            Some(other) => out.push(other),
            None => {}
        }
    }
    out.trim().to_string()
}

/// Inline photos only: a `data:` URI (vCard 4) or base64 with ENCODING=b (vCard 3).
/// Linked photos are skipped.
fn decode_photo(params: &[String], value: &str) -> Option<Vec<u8>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if value.get(..5).is_some_and(|scheme| scheme.eq_ignore_ascii_case("data:")) {
        return decode_data_url(value).ok().filter(|bytes| !bytes.is_empty());
    }

    let inline = params
        .iter()
        .any(|p| p == "ENCODING=B" || p == "ENCODING=BASE64" || p == "BASE64");
    if !inline {
        return None;
    }

    let filtered: String = value.chars().filter(|c| !c.is_whitespace()).collect();
    match BASE64_STANDARD.decode(filtered) {
        Ok(bytes) if !bytes.is_empty() => Some(bytes),
        Ok(_) => None,
        Err(err) => {
            tracing::warn!(error = %err, "ignoring undecodable vCard photo");
            None
        }
    }
}
