use crate::{
    errors::ImageError,
    image::{ContentDigest, ImageVersion, Registry, Repository, Tag},
};
use regex::Regex;
use std::ops::Range;

/// Parsed Docker-style image name
///
/// A complete image name contains a [Registry], [Repository], [Tag], and
/// [ContentDigest] in that order. Only the [Repository] is mandatory.
///
/// The [Tag] always begins with a `:` and the [ContentDigest] with an `@`, but
/// telling the optional [Registry] apart from the first section of the
/// [Repository] takes a heuristic. If that first section includes any dot (.)
/// or colon (:) characters, or it is exactly `localhost`, it names a registry
/// server. Everything else is part of the repository path.
#[derive(Clone)]
pub struct ImageName {
    serialized: String,
    registry_pos: Option<Range<usize>>,
    repository_pos: Range<usize>,
    tag_pos: Option<Range<usize>>,
    digest_pos: Option<Range<usize>>,
}

serialized_name_impls!(ImageName);

impl ImageName {
    /// Returns a reference to the existing string representation of an
    /// [ImageName]
    pub fn as_str(&self) -> &str {
        &self.serialized
    }

    /// Parse a [prim@str] as an [ImageName]
    pub fn parse(s: &str) -> Result<Self, ImageError> {
        lazy_static! {
            static ref HAS_REGISTRY: Regex = Regex::new(concat!(
                "^",
                "(?:",
                /* */ "(?:", // a domain with at least one dot, optional port
                /* -- */ "(?:[a-zA-Z0-9]|[a-zA-Z0-9][a-zA-Z0-9-]*[a-zA-Z0-9])",
                /* -- */ "(?:\\.(?:[a-zA-Z0-9]|[a-zA-Z0-9][a-zA-Z0-9-]*[a-zA-Z0-9]))+",
                /* -- */ "(?::[0-9]+)?",
                /* */ ")",
                /* */ "|(?:", // no dots, but a port number
                /* -- */ "(?:[a-zA-Z0-9]|[a-zA-Z0-9][a-zA-Z0-9-]*[a-zA-Z0-9])",
                /* -- */ "(?::[0-9]+)",
                /* */ ")",
                /* */ "|(?:localhost(?::[0-9]+)?)",
                ")",
                "/",
            ))
            .unwrap();
            static ref WITH_REGISTRY: Regex = Regex::new(&format!(
                "^{}/{}(:{})?(@{})?$",
                Registry::regex_str(),
                Repository::regex_str(),
                Tag::regex_str(),
                ContentDigest::regex_str()
            ))
            .unwrap();
            static ref NO_REGISTRY: Regex = Regex::new(&format!(
                "^{}(:{})?(@{})?$",
                Repository::regex_str(),
                Tag::regex_str(),
                ContentDigest::regex_str()
            ))
            .unwrap();
        }
        let re: &Regex = if HAS_REGISTRY.is_match(s) {
            &WITH_REGISTRY
        } else {
            &NO_REGISTRY
        };
        let captures = re
            .captures(s)
            .ok_or_else(|| ImageError::InvalidReferenceFormat(s.to_owned()))?;
        Ok(ImageName {
            serialized: s.to_owned(),
            registry_pos: captures.name("reg").map(|m| m.range()),
            repository_pos: captures
                .name("repo")
                .ok_or_else(|| ImageError::InvalidReferenceFormat(s.to_owned()))?
                .range(),
            tag_pos: captures.name("tag").map(|m| m.range()),
            digest_pos: captures.name("dig").map(|m| m.range()),
        })
    }

    pub fn registry_str(&self) -> Option<&str> {
        self.registry_pos
            .as_ref()
            .map(|pos| &self.serialized[pos.clone()])
    }

    pub fn repository_str(&self) -> &str {
        &self.serialized[self.repository_pos.clone()]
    }

    pub fn tag_str(&self) -> Option<&str> {
        self.tag_pos
            .as_ref()
            .map(|pos| &self.serialized[pos.clone()])
    }

    pub fn content_digest_str(&self) -> Option<&str> {
        self.digest_pos
            .as_ref()
            .map(|pos| &self.serialized[pos.clone()])
    }

    pub fn registry(&self) -> Option<Registry> {
        self.registry_str()
            .map(|s| Registry::parse(s).expect("already parsed"))
    }

    pub fn repository(&self) -> Repository {
        Repository::parse(self.repository_str()).expect("already parsed")
    }

    pub fn tag(&self) -> Option<Tag> {
        self.tag_str()
            .map(|s| Tag::parse(s).expect("already parsed"))
    }

    pub fn content_digest(&self) -> Option<ContentDigest> {
        self.content_digest_str()
            .map(|s| ContentDigest::parse(s).expect("already parsed"))
    }

    /// The version a pull of this name asks for
    ///
    /// A digest wins over a tag, and a name with neither means the default tag.
    pub fn version(&self) -> ImageVersion {
        match (self.content_digest(), self.tag()) {
            (Some(digest), _) => ImageVersion::ContentDigest(digest),
            (None, Some(tag)) => ImageVersion::Tag(tag),
            (None, None) => ImageVersion::Tag(Tag::default()),
        }
    }

    /// The registry and repository alone, without tag or digest
    ///
    /// This is the `fromImage` an engine pulls, and the name a trusted
    /// digest gets attached to.
    pub fn without_version(&self) -> ImageName {
        let end = self.repository_pos.end;
        ImageName {
            serialized: self.serialized[..end].to_owned(),
            registry_pos: self.registry_pos.clone(),
            repository_pos: self.repository_pos.clone(),
            tag_pos: None,
            digest_pos: None,
        }
    }

    /// Same registry and repository, pinned to a digest instead of any tag
    pub fn with_digest(&self, digest: &ContentDigest) -> ImageName {
        let base = self.without_version();
        let start = base.serialized.len() + 1;
        let serialized = format!("{}@{}", base.serialized, digest);
        ImageName {
            digest_pos: Some(start..serialized.len()),
            serialized,
            ..base
        }
    }

    /// Same registry and repository, with a tag and no digest
    pub fn with_tag(&self, tag: &Tag) -> ImageName {
        let base = self.without_version();
        let start = base.serialized.len() + 1;
        let serialized = format!("{}:{}", base.serialized, tag);
        ImageName {
            tag_pos: Some(start..serialized.len()),
            serialized,
            ..base
        }
    }
}
