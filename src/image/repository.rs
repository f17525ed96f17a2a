use crate::errors::ImageError;
use regex::Regex;

/// Name of a Docker-style image repository
///
/// Repository names are path-like groupings of lowercase alphanumeric
/// segments separated by slashes. Each segment may also contain internal
/// separators: single periods, single or double underscores, or any number of
/// dashes.
#[derive(Clone)]
pub struct Repository {
    serialized: String,
}

serialized_name_impls!(Repository);

impl Repository {
    /// Returns a reference to the existing string representation of a
    /// [Repository]
    pub fn as_str(&self) -> &str {
        &self.serialized
    }

    /// Parse a [prim@str] as a [Repository]
    ///
    /// ```
    /// # use berth::image::Repository;
    /// let repo = Repository::parse("some/path").unwrap();
    /// assert!(!repo.is_single_component());
    /// ```
    pub fn parse(s: &str) -> Result<Self, ImageError> {
        lazy_static! {
            static ref RE: Regex = Regex::new(&format!("^{}$", Repository::regex_str())).unwrap();
        }
        if RE.is_match(s) {
            Ok(Repository {
                serialized: s.to_owned(),
            })
        } else {
            Err(ImageError::InvalidReferenceFormat(s.to_owned()))
        }
    }

    /// Is this a single-component name like `alpine`, as opposed to
    /// `someone/alpine`?
    pub fn is_single_component(&self) -> bool {
        !self.serialized.contains('/')
    }

    /// Join two repository paths with a slash
    pub fn join(&self, other: &Self) -> Self {
        Repository {
            serialized: format!("{}/{}", self.serialized, other.serialized),
        }
    }

    pub(crate) fn regex_str() -> &'static str {
        concat!(
            "(?P<repo>",
            /*  */ "[a-z0-9]+(?:(?:[._]|__|[-]*)[a-z0-9]+)*", // first component
            /*  */ "(?:/[a-z0-9]+(?:(?:[._]|__|[-]*)[a-z0-9]+)*)*", // more components
            ")"
        )
    }
}
