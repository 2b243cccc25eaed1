use std::fmt;

/// A path from the document root to a nested value.
pub type Path = Vec<PathItem>;

/// One step of a [`Path`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum PathItem {
    /// A key of a JSON object.
    Key(String),
    /// An index into a JSON array.
    Index(usize),
}

impl From<&str> for PathItem {
    fn from(s: &str) -> Self {
        Self::Key(s.to_string())
    }
}

impl From<String> for PathItem {
    fn from(s: String) -> Self {
        Self::Key(s)
    }
}

impl From<usize> for PathItem {
    fn from(i: usize) -> Self {
        Self::Index(i)
    }
}

impl fmt::Display for PathItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathItem::Key(k) => f.write_str(k),
            PathItem::Index(i) => write!(f, "{i}"),
        }
    }
}

/// Splits a dotted path such as `edits.0.old_string` into components.
///
/// Segments made only of ASCII digits become [`PathItem::Index`]; everything
/// else is a key. An empty string is the root path.
#[must_use]
pub fn parse_dotted(path: &str) -> Path {
    if path.is_empty() {
        return Vec::new();
    }
    path.split('.')
        .map(|segment| match segment.parse::<usize>() {
            Ok(i) if segment.bytes().all(|b| b.is_ascii_digit()) => PathItem::Index(i),
            _ => PathItem::Key(segment.to_string()),
        })
        .collect()
}

#[doc(hidden)]
pub trait PathItemFrom<T> {
    fn from_path_component(value: T) -> PathItem;
}

macro_rules! impl_unsigned_as_path_component {
    ($($t:ty),+) => {
        $(
            impl PathItemFrom<$t> for PathItem {
                fn from_path_component(value: $t) -> Self {
                    #[allow(clippy::cast_possible_truncation, clippy::cast_lossless)]
                    PathItem::Index(value as usize)
                }
            }
        )+
    };
}
impl_unsigned_as_path_component!(u8, u16, u32, u64, usize);

macro_rules! impl_signed_as_path_component {
    ($($t:ty),+) => {
        $(
            impl PathItemFrom<$t> for PathItem {
                fn from_path_component(value: $t) -> Self {
                    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
                    PathItem::Index(value.max(0) as usize)
                }
            }
        )+
    };
}
impl_signed_as_path_component!(i8, i16, i32, i64, isize);

impl PathItemFrom<&str> for PathItem {
    fn from_path_component(value: &str) -> Self {
        PathItem::Key(value.to_string())
    }
}

impl PathItemFrom<String> for PathItem {
    fn from_path_component(value: String) -> Self {
        PathItem::Key(value)
    }
}
