//! Rule pattern parsing and compilation.
//!
//! # Syntax
//! ```text
//! /chat/<room>                  default (string) converter
//! /users/<int:id>               named converter
//! /lang/<any(en, de):code>      converter with arguments
//! /static/<path:file>           path converter (may contain '/')
//! ```
//!
//! # Design Decisions
//! - Each pattern compiles to one anchored regex, built once at registration
//! - Specificity is captured in a sortable [`MatchKey`] so the table can order
//!   rules once instead of scoring on every request
//! - Values are validated against the converter on build as well as on match

use std::collections::HashSet;

use regex::Regex;

use crate::routing::error::ConfigError;

/// Value converter for a pattern variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Converter {
    /// One path segment (no `/`). The default.
    String,
    /// Unsigned decimal integer.
    Int,
    /// Unsigned decimal with a fractional part.
    Float,
    /// Remainder of the path, `/` included.
    Path,
    /// Hyphenated UUID.
    Uuid,
    /// One of a fixed set of literal segments.
    Any(Vec<String>),
}

impl Converter {
    fn parse(pattern: &str, name: &str, args: Option<&str>) -> Result<Self, ConfigError> {
        match (name, args) {
            ("string" | "default", None) => Ok(Converter::String),
            ("int", None) => Ok(Converter::Int),
            ("float", None) => Ok(Converter::Float),
            ("path", None) => Ok(Converter::Path),
            ("uuid", None) => Ok(Converter::Uuid),
            ("any", Some(args)) => {
                let items: Vec<String> = args
                    .split(',')
                    .map(|item| item.trim().trim_matches(|c| c == '\'' || c == '"'))
                    .filter(|item| !item.is_empty())
                    .map(str::to_string)
                    .collect();
                if items.is_empty() {
                    return Err(ConfigError::pattern(pattern, "any() needs at least one item"));
                }
                Ok(Converter::Any(items))
            }
            ("any", None) => Err(ConfigError::pattern(pattern, "any() needs at least one item")),
            ("string" | "default" | "int" | "float" | "path" | "uuid", Some(_)) => Err(
                ConfigError::pattern(pattern, format!("converter `{name}` takes no arguments")),
            ),
            _ => Err(ConfigError::pattern(
                pattern,
                format!("unknown converter `{name}`"),
            )),
        }
    }

    fn regex(&self) -> String {
        match self {
            Converter::String => "[^/]+".to_string(),
            Converter::Int => r"\d+".to_string(),
            Converter::Float => r"\d+\.\d+".to_string(),
            Converter::Path => "[^/].*?".to_string(),
            Converter::Uuid => {
                "[A-Fa-f0-9]{8}-[A-Fa-f0-9]{4}-[A-Fa-f0-9]{4}-[A-Fa-f0-9]{4}-[A-Fa-f0-9]{12}"
                    .to_string()
            }
            Converter::Any(items) => {
                let alternatives: Vec<String> = items.iter().map(|i| regex::escape(i)).collect();
                format!("(?:{})", alternatives.join("|"))
            }
        }
    }

    /// Lower weights are tried first among otherwise equal rules.
    fn weight(&self) -> isize {
        match self {
            Converter::Int | Converter::Float => 50,
            Converter::String | Converter::Uuid | Converter::Any(_) => 100,
            Converter::Path => 200,
        }
    }

    fn encode(&self, value: &str) -> String {
        match self {
            Converter::Path => value
                .split('/')
                .map(urlencoding::encode)
                .collect::<Vec<_>>()
                .join("/"),
            _ => urlencoding::encode(value).into_owned(),
        }
    }
}

#[derive(Debug, Clone)]
enum Part {
    Static(String),
    Variable {
        name: String,
        converter: Converter,
        validator: Regex,
    },
}

/// Sort key for rule specificity. Smaller sorts first.
///
/// Static-only rules precede rules with variables, longer rules precede
/// shorter ones, and within a position static text beats a converter.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct MatchKey {
    has_arguments: bool,
    neg_parts: isize,
    weights: Vec<(u8, isize)>,
}

/// A compiled rule pattern.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    parts: Vec<Part>,
    regex: Regex,
    key: MatchKey,
}

impl Pattern {
    /// Parse and compile a rule pattern.
    pub fn parse(source: &str) -> Result<Self, ConfigError> {
        if !source.starts_with('/') {
            return Err(ConfigError::pattern(source, "must start with `/`"));
        }

        let mut parts = Vec::new();
        let mut seen = HashSet::new();
        let mut rest = source;

        while let Some(open) = rest.find('<') {
            if open > 0 {
                parts.push(static_part(source, &rest[..open])?);
            }
            let after = &rest[open + 1..];
            let close = after
                .find('>')
                .ok_or_else(|| ConfigError::pattern(source, "unterminated `<`"))?;
            parts.push(variable_part(source, &after[..close], &mut seen)?);
            rest = &after[close + 1..];
        }
        if !rest.is_empty() {
            parts.push(static_part(source, rest)?);
        }

        let mut regex = String::from("^");
        let mut weights = Vec::new();
        for part in &parts {
            match part {
                Part::Static(text) => {
                    regex.push_str(&regex::escape(text));
                    weights.extend(
                        text.split('/')
                            .filter(|piece| !piece.is_empty())
                            .map(|piece| (0u8, -(piece.len() as isize))),
                    );
                }
                Part::Variable {
                    name, converter, ..
                } => {
                    regex.push_str(&format!("(?P<{name}>{})", converter.regex()));
                    weights.push((1u8, converter.weight()));
                }
            }
        }
        regex.push('$');

        let regex = Regex::new(&regex).map_err(|e| ConfigError::pattern(source, e.to_string()))?;
        let key = MatchKey {
            has_arguments: !seen.is_empty(),
            neg_parts: -(weights.len() as isize),
            weights,
        };

        Ok(Self {
            source: source.to_string(),
            parts,
            regex,
            key,
        })
    }

    /// The pattern as written.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Variable names in order of appearance.
    pub fn arguments(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().filter_map(|part| match part {
            Part::Variable { name, .. } => Some(name.as_str()),
            Part::Static(_) => None,
        })
    }

    pub fn has_argument(&self, name: &str) -> bool {
        self.arguments().any(|arg| arg == name)
    }

    /// The same pattern in axum's `{name}` / `{*name}` path syntax.
    ///
    /// Converters narrower than a segment are not expressible there, so
    /// callers still check [`Pattern::matches`] on the matched path. A
    /// variable must span a whole segment, and a `path` variable must end
    /// the pattern.
    pub fn to_axum_path(&self) -> Result<String, ConfigError> {
        let mut path = String::with_capacity(self.source.len());
        let last = self.parts.len().saturating_sub(1);

        for (index, part) in self.parts.iter().enumerate() {
            match part {
                Part::Static(text) => {
                    path.push_str(&text.replace('{', "{{").replace('}', "}}"));
                }
                Part::Variable { name, converter, .. } => {
                    let next_is_boundary = match self.parts.get(index + 1) {
                        None => true,
                        Some(Part::Static(text)) => text.starts_with('/'),
                        Some(Part::Variable { .. }) => false,
                    };
                    if !path.ends_with('/') || !next_is_boundary {
                        return Err(ConfigError::pattern(
                            &self.source,
                            format!("variable {name:?} must span a whole path segment"),
                        ));
                    }
                    if *converter == Converter::Path {
                        if index != last {
                            return Err(ConfigError::pattern(
                                &self.source,
                                format!("path variable {name:?} must end the pattern"),
                            ));
                        }
                        path.push_str(&format!("{{*{name}}}"));
                    } else {
                        path.push_str(&format!("{{{name}}}"));
                    }
                }
            }
        }
        Ok(path)
    }

    /// Whether a raw request path satisfies the pattern and its converters.
    pub fn matches(&self, path: &str) -> bool {
        self.captures(path).is_some()
    }

    pub(crate) fn key(&self) -> &MatchKey {
        &self.key
    }

    /// Match a raw (still percent-encoded) path and return decoded values.
    ///
    /// Returns `None` on no match or when a captured value is not valid
    /// UTF-8 once decoded.
    pub(crate) fn captures(&self, path: &str) -> Option<Vec<(String, String)>> {
        let caps = self.regex.captures(path)?;
        let mut values = Vec::new();
        for name in self.arguments() {
            let raw = caps.name(name)?.as_str();
            let decoded = urlencoding::decode(raw).ok()?;
            values.push((name.to_string(), decoded.into_owned()));
        }
        Some(values)
    }

    /// Render a path, pulling each variable from `lookup`.
    ///
    /// Returns `None` if a variable is missing or its value does not satisfy
    /// the converter.
    pub(crate) fn render<'v>(&self, lookup: impl Fn(&str) -> Option<&'v str>) -> Option<String> {
        let mut path = String::with_capacity(self.source.len());
        for part in &self.parts {
            match part {
                Part::Static(text) => path.push_str(text),
                Part::Variable {
                    name,
                    converter,
                    validator,
                } => {
                    let value = lookup(name)?;
                    if !validator.is_match(value) {
                        return None;
                    }
                    path.push_str(&converter.encode(value));
                }
            }
        }
        Some(path)
    }
}

fn static_part(source: &str, text: &str) -> Result<Part, ConfigError> {
    if text.contains('>') {
        return Err(ConfigError::pattern(source, "unbalanced `>`"));
    }
    Ok(Part::Static(text.to_string()))
}

fn variable_part(source: &str, spec: &str, seen: &mut HashSet<String>) -> Result<Part, ConfigError> {
    let (converter_spec, name) = match spec.rsplit_once(':') {
        Some((converter, name)) => (Some(converter.trim()), name.trim()),
        None => (None, spec.trim()),
    };

    if !is_identifier(name) {
        return Err(ConfigError::pattern(
            source,
            format!("variable name {name:?} is not an identifier"),
        ));
    }
    if !seen.insert(name.to_string()) {
        return Err(ConfigError::pattern(
            source,
            format!("variable name {name:?} used twice"),
        ));
    }

    let converter = match converter_spec {
        None => Converter::String,
        Some(spec) => match spec.split_once('(') {
            Some((converter, args)) => {
                let args = args
                    .strip_suffix(')')
                    .ok_or_else(|| ConfigError::pattern(source, "unterminated converter arguments"))?;
                Converter::parse(source, converter.trim(), Some(args))?
            }
            None => Converter::parse(source, spec, None)?,
        },
    };

    let validator = Regex::new(&format!("^(?:{})$", converter.regex()))
        .map_err(|e| ConfigError::pattern(source, e.to_string()))?;

    Ok(Part::Variable {
        name: name.to_string(),
        converter,
        validator,
    })
}

pub(crate) fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
