//! MySQL storage requirements used to bound index key length.
//!
//! Widths follow the "Data Type Storage Requirements" tables of the MySQL
//! reference manual. Variable-length blob and text types report one byte more
//! than the per-column budget so callers always fall back to a prefix index.

use std::collections::HashMap;

use once_cell::sync::Lazy;

/// Width assumed for character sets missing from [`CHARSETS`]
pub const DEFAULT_CHARSET_BYTES: usize = 4;

/// Server versions below this use the pre-5.6.4 temporal formats
const FRACTIONAL_SECONDS_VERSION: u32 = 50604;

/// Maximum bytes per character, as listed by `SHOW CHARACTER SET`
pub static CHARSETS: Lazy<HashMap<&'static str, usize>> = Lazy::new(|| {
    HashMap::from([
        ("armscii8", 1),
        ("ascii", 1),
        ("big5", 2),
        ("binary", 1),
        ("cp1250", 1),
        ("cp1251", 1),
        ("cp1256", 1),
        ("cp1257", 1),
        ("cp850", 1),
        ("cp852", 1),
        ("cp866", 1),
        ("cp932", 2),
        ("dec8", 1),
        ("eucjpms", 3),
        ("euckr", 2),
        ("gb18030", 4),
        ("gb2312", 2),
        ("gbk", 2),
        ("geostd8", 1),
        ("greek", 1),
        ("hebrew", 1),
        ("hp8", 1),
        ("keybcs2", 1),
        ("koi8r", 1),
        ("koi8u", 1),
        ("latin1", 1),
        ("latin2", 1),
        ("latin5", 1),
        ("latin7", 1),
        ("macce", 1),
        ("macroman", 1),
        ("sjis", 2),
        ("swe7", 1),
        ("tis620", 1),
        ("ucs2", 2),
        ("ujis", 3),
        ("utf16", 4),
        ("utf16le", 4),
        ("utf32", 4),
        ("utf8", 3),
        ("utf8mb3", 3),
        ("utf8mb4", 4),
    ])
});

/// Bytes per character for `charset`, `None` when the character set is unknown
pub fn charset_width(charset: &str) -> Option<usize> {
    CHARSETS.get(charset.to_ascii_lowercase().as_str()).copied()
}

/// Lower-cased base type, e.g. `varchar` for `VARCHAR(64)` or `int` for `int(11) unsigned`
pub fn base_type(data_type: &str) -> String {
    let end = data_type
        .find(|c: char| c == '(' || c.is_whitespace())
        .unwrap_or(data_type.len());
    data_type[..end].trim().to_ascii_lowercase()
}

/// Parenthesised type arguments. `enum` and `set` report their member count.
pub fn type_lengths(data_type: &str) -> Vec<usize> {
    let Some(open) = data_type.find('(') else {
        return Vec::new();
    };
    let Some(close) = data_type.rfind(')') else {
        return Vec::new();
    };
    if close <= open {
        return Vec::new();
    }

    let inner = &data_type[open + 1..close];
    match base_type(data_type).as_str() {
        "enum" | "set" => vec![inner.split(',').count()],
        _ => inner
            .split(',')
            .map(|part| part.trim().parse::<usize>())
            .collect::<Result<Vec<_>, _>>()
            .unwrap_or_default(),
    }
}

/// Whether the type stores characters and can therefore take a prefix length
pub fn is_string_type(data_type: &str) -> bool {
    matches!(
        base_type(data_type).as_str(),
        "char"
            | "varchar"
            | "binary"
            | "varbinary"
            | "tinytext"
            | "text"
            | "mediumtext"
            | "longtext"
            | "tinyblob"
            | "blob"
            | "mediumblob"
            | "longblob"
    )
}

/// Byte strings, whose prefix lengths count bytes rather than characters
pub fn is_binary_type(data_type: &str) -> bool {
    matches!(
        base_type(data_type).as_str(),
        "binary" | "varbinary" | "tinyblob" | "blob" | "mediumblob" | "longblob"
    )
}

/// Index key bytes needed by one column, `None` for unsupported or unknown types
pub fn data_bytes(data_type: &str, charset: &str, server_version: u32, max_bytes_per_column: usize) -> Option<usize> {
    if data_type.trim().is_empty() {
        return None;
    }

    match base_type(data_type).as_str() {
        "tinyint" | "smallint" | "mediumint" | "int" | "integer" | "bigint" | "double" | "real" | "float"
        | "decimal" | "numeric" | "bit" => numeric_bytes(data_type),
        "year" | "date" | "time" | "datetime" | "timestamp" => Some(temporal_bytes(data_type, server_version)),
        "char" | "binary" | "varchar" | "varbinary" | "enum" | "set" => string_bytes(data_type, charset),
        "tinyblob" | "tinytext" | "blob" | "text" | "mediumblob" | "mediumtext" | "longblob" | "longtext" => {
            Some(max_bytes_per_column + 1)
        }
        _ => None,
    }
}

fn numeric_bytes(data_type: &str) -> Option<usize> {
    let lengths = type_lengths(data_type);
    let bytes = match base_type(data_type).as_str() {
        "tinyint" => 1,
        "smallint" => 2,
        "mediumint" => 3,
        "int" | "integer" => 4,
        "bigint" | "double" | "real" => 8,
        "float" => match lengths.first() {
            Some(precision) if *precision > 24 => 8,
            _ => 4,
        },
        "decimal" | "numeric" => match lengths.as_slice() {
            [] => 4,
            [precision] => decimal_bytes(*precision),
            [precision, scale, ..] => decimal_bytes(precision.saturating_sub(*scale)) + decimal_bytes(*scale),
        },
        "bit" => match lengths.first() {
            Some(bits) => bits.saturating_add(7) / 8,
            None => 1,
        },
        _ => return None,
    };
    Some(bytes)
}

/// Nine digits pack into four bytes, leftover digits take a fraction of that
fn decimal_bytes(digits: usize) -> usize {
    let leftover = match digits % 9 {
        0 => 0,
        1..=2 => 1,
        3..=4 => 2,
        5..=6 => 3,
        _ => 4,
    };
    digits / 9 * 4 + leftover
}

fn temporal_bytes(data_type: &str, server_version: u32) -> usize {
    let legacy = server_version < FRACTIONAL_SECONDS_VERSION;
    let fractional = match type_lengths(data_type).first().copied().unwrap_or(0) {
        0 => 0,
        1..=2 => 1,
        3..=4 => 2,
        _ => 3,
    };

    match base_type(data_type).as_str() {
        "year" => 1,
        "date" => 3,
        "time" if legacy => 3,
        "time" => 3 + fractional,
        "datetime" if legacy => 8,
        "datetime" => 5 + fractional,
        "timestamp" if legacy => 4,
        "timestamp" => 4 + fractional,
        _ => 8,
    }
}

fn string_bytes(data_type: &str, charset: &str) -> Option<usize> {
    let width = charset_width(charset).unwrap_or(DEFAULT_CHARSET_BYTES);
    let lengths = type_lengths(data_type);
    let length = lengths.first().copied();

    let bytes = match base_type(data_type).as_str() {
        "char" => length.unwrap_or(1).min(255).checked_mul(width)?,
        "binary" => length.unwrap_or(1).min(255),
        "varchar" | "varbinary" => {
            let length = length?;
            let per_char = if base_type(data_type) == "varbinary" { 1 } else { width };
            let payload = length.checked_mul(per_char)?;
            payload.checked_add(if length < 255 { 1 } else { 2 })?
        }
        "enum" => match length {
            Some(members) if members > 255 => 2,
            _ => 1,
        },
        "set" => match length.unwrap_or(1).saturating_add(7) / 8 {
            0..=1 => 1,
            2 => 2,
            3 => 3,
            4 => 4,
            _ => 8,
        },
        _ => return None,
    };
    Some(bytes)
}
