//! Column tag grammar.
//!
//! A tag is a comma-separated list. The first segment is the column name
//! (empty means the snake_case field name). Remaining segments are bare
//! flags or `key:value` pairs:
//!
//! ```text
//! "id,primary,auto_increment"
//! "email,not_null,unique,size:120"
//! ",type:DECIMAL(10,2)"       -- parentheses may contain commas
//! "-"                         -- field is not mapped
//! ```

use crate::error::{OrmError, OrmResult};

/// Parsed form of one field's tag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnTag {
    pub column: String,
    pub primary: bool,
    pub auto_increment: bool,
    pub not_null: bool,
    pub unique: bool,
    pub sql_type: Option<String>,
    pub size: u32,
    pub default: Option<String>,
    pub comment: Option<String>,
    pub index: Option<String>,
}

/// Parse `tag` for `field`. Returns `Ok(None)` when the field is skipped.
pub fn parse_tag(field: &str, tag: &str, type_name: &str) -> OrmResult<Option<ColumnTag>> {
    let tag = tag.trim();
    if tag == "-" {
        return Ok(None);
    }

    let segments = split_segments(tag);
    let mut parsed = ColumnTag::default();

    let mut iter = segments.into_iter();
    let name = iter.next().unwrap_or_default();
    parsed.column = if name.is_empty() {
        to_snake_case(field)
    } else {
        name
    };

    for segment in iter {
        if segment.is_empty() {
            continue;
        }
        match segment.split_once(':') {
            Some((key, value)) => apply_option(&mut parsed, field, key.trim(), value.trim(), type_name)?,
            None => apply_flag(&mut parsed, field, &segment, type_name)?,
        }
    }

    Ok(Some(parsed))
}

fn apply_flag(tag: &mut ColumnTag, field: &str, flag: &str, type_name: &str) -> OrmResult<()> {
    match flag.to_ascii_lowercase().as_str() {
        "primary" | "primary_key" | "pk" => tag.primary = true,
        "auto_increment" | "autoincrement" => tag.auto_increment = true,
        "not_null" | "notnull" => tag.not_null = true,
        "unique" => tag.unique = true,
        "index" => tag.index = Some(String::new()),
        other => {
            return Err(OrmError::mapping(
                format!("unknown tag flag '{}' on field '{}'", other, field),
                type_name,
            ));
        }
    }
    Ok(())
}

fn apply_option(
    tag: &mut ColumnTag,
    field: &str,
    key: &str,
    value: &str,
    type_name: &str,
) -> OrmResult<()> {
    match key.to_ascii_lowercase().as_str() {
        "type" => tag.sql_type = Some(value.to_string()),
        "size" => {
            tag.size = value.parse().map_err(|_| {
                OrmError::mapping(
                    format!("invalid size '{}' on field '{}'", value, field),
                    type_name,
                )
            })?;
        }
        "default" => tag.default = Some(value.to_string()),
        "comment" => tag.comment = Some(value.to_string()),
        "index" => tag.index = Some(value.to_string()),
        other => {
            return Err(OrmError::mapping(
                format!("unknown tag option '{}' on field '{}'", other, field),
                type_name,
            ));
        }
    }
    Ok(())
}

/// Split on commas that are not inside parentheses or quotes.
fn split_segments(tag: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut in_quote = false;

    for ch in tag.chars() {
        match ch {
            '\'' => {
                in_quote = !in_quote;
                current.push(ch);
            }
            '(' if !in_quote => {
                depth += 1;
                current.push(ch);
            }
            ')' if !in_quote => {
                depth = depth.saturating_sub(1);
                current.push(ch);
            }
            ',' if depth == 0 && !in_quote => {
                segments.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(ch),
        }
    }
    segments.push(current.trim().to_string());
    segments
}

/// `CreatedAt` / `createdAt` / `HTTPStatus` to `created_at` / `http_status`.
pub fn to_snake_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);
    for (i, &ch) in chars.iter().enumerate() {
        if ch.is_uppercase() {
            let prev = i.checked_sub(1).map(|p| chars[p]);
            let next = chars.get(i + 1).copied();
            let boundary = match prev {
                Some(p) if p.is_lowercase() || p.is_ascii_digit() => true,
                Some(p) if p.is_uppercase() => next.is_some_and(|n| n.is_lowercase()),
                _ => false,
            };
            if boundary && !out.ends_with('_') {
                out.push('_');
            }
            out.extend(ch.to_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}
