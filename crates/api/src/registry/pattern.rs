//! Prefix/tag templates such as `/api/{app_name}`.

use super::RegistryError;

const APP_NAME: &str = "app_name";
const APP_TITLE: &str = "app_title";

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PatternKind {
    Prefix,
    Tag,
}

impl PatternKind {
    fn as_str(self) -> &'static str {
        match self {
            PatternKind::Prefix => "prefix",
            PatternKind::Tag => "tag",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    AppName,
    AppTitle,
}

/// A validated template. Rendering is a pure function of the app name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePattern {
    template: String,
    segments: Vec<Segment>,
}

impl RoutePattern {
    /// URL prefix template: `{app_name}` only, starts with `/`, no trailing `/`.
    pub fn prefix(template: &str) -> Result<Self, RegistryError> {
        let pattern = Self::parse(template, PatternKind::Prefix)?;
        let err = |reason: &str| pattern_error(PatternKind::Prefix, template, reason);

        if !template.starts_with('/') {
            return Err(err("must start with `/`"));
        }
        if template.len() > 1 && template.ends_with('/') {
            return Err(err("must not end with `/`"));
        }
        if template.contains("//") {
            return Err(err("must not contain empty path segments"));
        }
        let bad_literal = pattern.segments.iter().any(|s| match s {
            Segment::Literal(text) => text
                .chars()
                .any(|c| c == '*' || c == ':' || c == '?' || c == '#' || c.is_whitespace()),
            _ => false,
        });
        if bad_literal {
            return Err(err("literal text must not contain `*`, `:`, `?`, `#` or whitespace"));
        }
        Ok(pattern)
    }

    /// Tag template: `{app_name}` and `{app_title}`.
    pub fn tag(template: &str) -> Result<Self, RegistryError> {
        Self::parse(template, PatternKind::Tag)
    }

    pub fn render(&self, app_name: &str) -> String {
        let mut out = String::with_capacity(self.template.len() + app_name.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::AppName => out.push_str(app_name),
                Segment::AppTitle => out.push_str(&title_case(app_name)),
            }
        }
        out
    }

    fn parse(template: &str, kind: PatternKind) -> Result<Self, RegistryError> {
        let err = |reason: String| pattern_error(kind, template, &reason);

        if template.trim().is_empty() {
            return Err(err("must not be empty".to_string()));
        }

        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = template.chars();

        while let Some(c) = chars.next() {
            match c {
                '{' => {
                    let mut name = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some('{') | None => return Err(err("unbalanced `{`".to_string())),
                            Some(other) => name.push(other),
                        }
                    }

                    let segment = match name.as_str() {
                        APP_NAME => Segment::AppName,
                        APP_TITLE if kind == PatternKind::Tag => Segment::AppTitle,
                        other => {
                            return Err(err(format!("unknown placeholder `{{{other}}}`")));
                        }
                    };
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(segment);
                }
                '}' => return Err(err("unbalanced `}`".to_string())),
                other => literal.push(other),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        if !segments.iter().any(|s| !matches!(s, Segment::Literal(_))) {
            return Err(err("must contain the `{app_name}` placeholder".to_string()));
        }

        Ok(Self {
            template: template.to_string(),
            segments,
        })
    }
}

fn pattern_error(kind: PatternKind, template: &str, reason: &str) -> RegistryError {
    RegistryError::Pattern {
        kind: kind.as_str(),
        pattern: template.to_string(),
        reason: reason.to_string(),
    }
}

/// `file_store` -> `File Store`.
pub fn title_case(app_name: &str) -> String {
    app_name
        .split(['_', '-'])
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
