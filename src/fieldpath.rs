//! Lookups into an unstructured JSON field tree by path.
//!
//! Paths use the `spec.forProvider.region` dotted form. Array elements are
//! addressed as `items[0]` and keys containing dots as
//! `metadata.labels[app.kubernetes.io/name]`.

use std::fmt;

use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Field(String),
    Index(usize),
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Field(name) => write!(f, "{name}"),
            Segment::Index(index) => write!(f, "[{index}]"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FieldPathError {
    #[error("{path}: no such field")]
    NotFound { path: String },
    #[error("{path}: not an object")]
    NotAnObject { path: String },
    #[error("{path}: not an array")]
    NotAnArray { path: String },
    #[error("{path}: not a string")]
    NotAString { path: String },
    #[error("invalid field path {path:?}: {reason}")]
    Invalid { path: String, reason: &'static str },
}

impl FieldPathError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, FieldPathError::NotFound { .. })
    }
}

/// Splits a field path into segments.
pub fn parse(path: &str) -> Result<Vec<Segment>, FieldPathError> {
    let invalid = |reason| FieldPathError::Invalid { path: path.to_string(), reason };

    let mut segments = Vec::new();
    let mut field = String::new();
    let mut chars = path.chars().peekable();
    // Set after a closing bracket, where a field may only follow a '.'.
    let mut after_bracket = false;

    while let Some(c) = chars.next() {
        match c {
            '.' => {
                if field.is_empty() && !after_bracket {
                    return Err(invalid("empty field name"));
                }
                if !field.is_empty() {
                    segments.push(Segment::Field(std::mem::take(&mut field)));
                }
                if chars.peek().is_none() {
                    return Err(invalid("trailing '.'"));
                }
                after_bracket = false;
            }
            '[' => {
                if !field.is_empty() {
                    segments.push(Segment::Field(std::mem::take(&mut field)));
                } else if segments.is_empty() {
                    return Err(invalid("path cannot start with '['"));
                }
                let mut key = String::new();
                loop {
                    match chars.next() {
                        Some(']') => break,
                        Some(c) => key.push(c),
                        None => return Err(invalid("unterminated '['")),
                    }
                }
                if key.is_empty() {
                    return Err(invalid("empty brackets"));
                }
                match key.parse::<usize>() {
                    Ok(index) => segments.push(Segment::Index(index)),
                    Err(_) => segments.push(Segment::Field(key)),
                }
                after_bracket = true;
            }
            ']' => return Err(invalid("unexpected ']'")),
            c => {
                if after_bracket {
                    return Err(invalid("expected '.' or '[' after ']'"));
                }
                field.push(c);
            }
        }
    }

    if !field.is_empty() {
        segments.push(Segment::Field(field));
    }
    if segments.is_empty() {
        return Err(invalid("empty path"));
    }
    Ok(segments)
}

fn render(segments: &[Segment]) -> String {
    let mut out = String::new();
    for segment in segments {
        if let Segment::Field(name) = segment {
            if !out.is_empty() {
                out.push('.');
            }
            out.push_str(name);
        } else {
            out.push_str(&segment.to_string());
        }
    }
    out
}

/// A field tree that can be read by path.
#[derive(Debug, Clone, Copy)]
pub struct Paved<'a> {
    tree: &'a Value,
}

impl<'a> Paved<'a> {
    pub fn new(tree: &'a Value) -> Self {
        Self { tree }
    }

    pub fn get_value(&self, path: &str) -> Result<&'a Value, FieldPathError> {
        let segments = parse(path)?;
        let mut current = self.tree;
        for (i, segment) in segments.iter().enumerate() {
            let walked = || render(&segments[..=i]);
            current = match segment {
                Segment::Field(name) => current
                    .as_object()
                    .ok_or_else(|| FieldPathError::NotAnObject { path: render(&segments[..i]) })?
                    .get(name)
                    .ok_or_else(|| FieldPathError::NotFound { path: walked() })?,
                Segment::Index(index) => current
                    .as_array()
                    .ok_or_else(|| FieldPathError::NotAnArray { path: render(&segments[..i]) })?
                    .get(*index)
                    .ok_or_else(|| FieldPathError::NotFound { path: walked() })?,
            };
        }
        Ok(current)
    }

    /// Reads a string. A present value of any other type, `null` included,
    /// is an error distinct from [`FieldPathError::NotFound`].
    pub fn get_string(&self, path: &str) -> Result<&'a str, FieldPathError> {
        self.get_value(path)?
            .as_str()
            .ok_or_else(|| FieldPathError::NotAString { path: path.to_string() })
    }
}
