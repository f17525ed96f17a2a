//! Image identity: names, tags, digests, and parsed references

/// Comparison, hashing, formatting, and parsing for the string-backed name
/// types in this module. Each type keeps its canonical text in `serialized`
/// and provides `as_str()` and `parse()`.
macro_rules! serialized_name_impls {
    ($name:ident) => {
        impl Eq for $name {}

        impl PartialEq for $name {
            fn eq(&self, other: &Self) -> bool {
                self.serialized.eq(&other.serialized)
            }
        }

        impl std::hash::Hash for $name {
            fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
                self.serialized.hash(state);
            }
        }

        impl Ord for $name {
            fn cmp(&self, other: &Self) -> std::cmp::Ordering {
                self.serialized.cmp(&other.serialized)
            }
        }

        impl PartialOrd for $name {
            fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
                Some(self.cmp(other))
            }
        }

        impl std::str::FromStr for $name {
            type Err = crate::errors::ImageError;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                $name::parse(s)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}


mod digest;
mod name;
mod reference;
mod registry;
mod repository;
mod tag;
mod version;

pub use digest::ContentDigest;
pub use name::ImageName;
pub use reference::Reference;
pub use registry::Registry;
pub use repository::Repository;
pub use tag::{Tag, DEFAULT_TAG};
pub use version::ImageVersion;
