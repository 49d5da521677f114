//! Human readable text rendering for `show`.

use std::io::{self, Write};

use crate::value::{Value, ValueData};

const INDENT: &str = "  ";
const BLOB_PREVIEW: usize = 32;

/// Write `value` as indented text, followed by a newline.
pub fn write_encoded_value<W: Write>(w: &mut W, value: &Value) -> io::Result<()> {
    write_value(w, value, 0)?;
    writeln!(w)
}

/// Render `value` into a string (no trailing newline).
pub fn to_text(value: &Value) -> String {
    let mut buf = Vec::new();
    // Writing into a Vec cannot fail.
    let _ = write_value(&mut buf, value, 0);
    String::from_utf8_lossy(&buf).into_owned()
}

fn pad<W: Write>(w: &mut W, depth: usize) -> io::Result<()> {
    for _ in 0..depth {
        w.write_all(INDENT.as_bytes())?;
    }
    Ok(())
}

fn write_value<W: Write>(w: &mut W, value: &Value, depth: usize) -> io::Result<()> {
    match value.data() {
        ValueData::Bool(b) => write!(w, "{b}"),
        ValueData::Number(n) => write!(w, "{n}"),
        ValueData::String(s) => write!(w, "{s:?}"),
        ValueData::Blob(bytes) => {
            let shown = &bytes[..bytes.len().min(BLOB_PREVIEW)];
            write!(w, "blob({} bytes) {}", bytes.len(), hex::encode(shown))?;
            if bytes.len() > BLOB_PREVIEW {
                write!(w, "...")?;
            }
            Ok(())
        }
        ValueData::Ref(r) => write!(w, "{r}"),
        ValueData::List(items) => {
            if items.is_empty() {
                return write!(w, "[]");
            }
            writeln!(w, "[")?;
            for item in items {
                pad(w, depth + 1)?;
                write_value(w, item, depth + 1)?;
                writeln!(w, ",")?;
            }
            pad(w, depth)?;
            write!(w, "]")
        }
        ValueData::Map(entries) => {
            if entries.is_empty() {
                return write!(w, "map {{}}");
            }
            writeln!(w, "map {{")?;
            for (k, v) in entries {
                pad(w, depth + 1)?;
                write!(w, "{k:?}: ")?;
                write_value(w, v, depth + 1)?;
                writeln!(w, ",")?;
            }
            pad(w, depth)?;
            write!(w, "}}")
        }
        ValueData::Struct { name, fields } => {
            if fields.is_empty() {
                return write!(w, "{name} {{}}");
            }
            writeln!(w, "{name} {{")?;
            for (k, v) in fields {
                pad(w, depth + 1)?;
                write!(w, "{k}: ")?;
                write_value(w, v, depth + 1)?;
                writeln!(w, ",")?;
            }
            pad(w, depth)?;
            write!(w, "}}")
        }
    }
}
