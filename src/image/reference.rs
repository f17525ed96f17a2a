use crate::{
    errors::ImageError,
    image::{ContentDigest, ImageName, ImageVersion, Tag},
};
use std::{fmt, str::FromStr};

/// An image reference resolved for use: repository, tag, and optional digest
///
/// Unlike [ImageName], the tag is never missing. References without one get
/// the [crate::image::DEFAULT_TAG]. When a digest is present it is
/// authoritative: pulls ask for the digest, and trust resolution is skipped.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Reference {
    name: ImageName,
    tag: Tag,
    digest: Option<ContentDigest>,
}

impl Reference {
    /// Split a user-supplied image string into its parts
    ///
    /// ```
    /// # use berth::image::Reference;
    /// let reference = Reference::parse("alpine").unwrap();
    /// assert_eq!(reference.name().as_str(), "alpine");
    /// assert_eq!(reference.tag().as_str(), "latest");
    /// assert_eq!(reference.to_string(), "alpine:latest");
    /// ```
    pub fn parse(s: &str) -> Result<Self, ImageError> {
        let parsed = ImageName::parse(s)?;
        Ok(Reference {
            name: parsed.without_version(),
            tag: parsed.tag().unwrap_or_default(),
            digest: parsed.content_digest(),
        })
    }

    /// Registry and repository, with no tag or digest
    pub fn name(&self) -> &ImageName {
        &self.name
    }

    pub fn tag(&self) -> &Tag {
        &self.tag
    }

    pub fn content_digest(&self) -> Option<&ContentDigest> {
        self.digest.as_ref()
    }

    pub fn has_digest(&self) -> bool {
        self.digest.is_some()
    }

    /// The most specific version this reference names
    pub fn version(&self) -> ImageVersion {
        match &self.digest {
            Some(digest) => ImageVersion::ContentDigest(digest.clone()),
            None => ImageVersion::Tag(self.tag.clone()),
        }
    }

    /// The name to show and pull: `name@digest` if pinned, else `name:tag`
    pub fn image_name(&self) -> ImageName {
        match self.version() {
            ImageVersion::ContentDigest(digest) => self.name.with_digest(&digest),
            ImageVersion::Tag(tag) => self.name.with_tag(&tag),
        }
    }
}

impl FromStr for Reference {
    type Err = ImageError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Reference::parse(s)
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.image_name())
    }
}

impl fmt::Debug for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Reference({})", self)
    }
}
