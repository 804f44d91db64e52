use crate::common::FIELD_SEPARATOR;
use crate::errors::{ErrorKind, NestError, NestResult};
use smallvec::SmallVec;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    /// A field name. On a sequence a numeric name selects an element and any
    /// other name is applied to every element.
    Name(String),
    /// A bracketed position, `tags[2]`. Only meaningful on sequences.
    Index(usize),
}

impl PathSegment {
    #[inline]
    pub(crate) fn as_index(&self) -> Option<usize> {
        match self {
            PathSegment::Index(i) => Some(*i),
            PathSegment::Name(name) => name.parse::<usize>().ok(),
        }
    }
}

/// A parsed field path such as `literature.ratings` or `books[0].title`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath {
    text: String,
    segments: SmallVec<[PathSegment; 4]>,
}

impl FieldPath {
    pub fn parse(path: &str) -> NestResult<FieldPath> {
        if path.is_empty() {
            log::error!("Field path cannot be empty");
            return Err(NestError::new(
                "Field path cannot be empty",
                ErrorKind::InvalidFieldName,
            ));
        }

        let mut segments = SmallVec::new();
        for part in path.split(FIELD_SEPARATOR) {
            Self::parse_part(path, part, &mut segments)?;
        }

        Ok(FieldPath {
            text: path.to_string(),
            segments,
        })
    }

    fn parse_part(
        path: &str,
        part: &str,
        segments: &mut SmallVec<[PathSegment; 4]>,
    ) -> NestResult<()> {
        let invalid = |reason: &str| {
            log::error!("Invalid field path '{}': {}", path, reason);
            NestError::new(
                &format!("Invalid field path '{}': {}", path, reason),
                ErrorKind::InvalidFieldName,
            )
        };

        let (name, mut rest) = match part.find('[') {
            Some(pos) => (&part[..pos], &part[pos..]),
            None => (part, ""),
        };

        if name.is_empty() {
            return Err(invalid("empty segment"));
        }
        segments.push(PathSegment::Name(name.to_string()));

        while !rest.is_empty() {
            let close = rest.find(']').ok_or_else(|| invalid("unclosed '['"))?;
            if !rest.starts_with('[') {
                return Err(invalid("unexpected text after ']'"));
            }
            let index = rest[1..close]
                .parse::<usize>()
                .map_err(|_| invalid("array index must be a non-negative integer"))?;
            segments.push(PathSegment::Index(index));
            rest = &rest[close + 1..];
        }
        Ok(())
    }

    #[inline]
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// First segment, always a field name.
    pub fn root(&self) -> &str {
        match self.segments.first() {
            Some(PathSegment::Name(name)) => name,
            _ => "",
        }
    }
}

impl Display for FieldPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_dotted_paths() {
        let path = FieldPath::parse("literature.ratings").unwrap();
        assert_eq!(
            path.segments(),
            &[
                PathSegment::Name("literature".into()),
                PathSegment::Name("ratings".into())
            ]
        );
        assert_eq!(path.root(), "literature");
        assert_eq!(path.to_string(), "literature.ratings");
    }

    #[test]
    fn parses_bracket_indices() {
        let path = FieldPath::parse("books[1][0].title").unwrap();
        assert_eq!(
            path.segments(),
            &[
                PathSegment::Name("books".into()),
                PathSegment::Index(1),
                PathSegment::Index(0),
                PathSegment::Name("title".into()),
            ]
        );
    }

    #[test]
    fn numeric_names_act_as_indices() {
        let path = FieldPath::parse("tags.2").unwrap();
        assert_eq!(path.segments()[1].as_index(), Some(2));
        assert_eq!(path.segments()[0].as_index(), None);
    }

    #[test]
    fn rejects_malformed_paths() {
        for bad in ["", "a..b", ".a", "a.", "a[", "a[x]", "a[-1]", "a[0]b", "[0]"] {
            let err = FieldPath::parse(bad).unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::InvalidFieldName, "path {:?}", bad);
        }
    }
}
