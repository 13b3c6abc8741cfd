//! Container image references, following the grammar of the distribution project:
//!
//! ```txt
//! reference        := name [ ":" tag ] [ "@" digest ]
//! name             := [domain '/'] path-component ['/' path-component]*
//! domain           := domain-component ['.' domain-component]* [':' port-number]
//! path-component   := alpha-numeric [separator alpha-numeric]*
//! tag              := /[\w][\w.-]{0,127}/
//! digest           := digest-algorithm ":" digest-hex
//! ```

use std::{fmt, sync::LazyLock};

use regex::Regex;

#[derive(Debug, PartialEq, Eq)]
pub struct InvalidImageName(String);

impl std::error::Error for InvalidImageName {}

impl fmt::Display for InvalidImageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid image name: {:?}", self.0)
    }
}

static REFERENCE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^",
        r"(?:(?P<registry>(?:localhost|[a-zA-Z0-9](?:[a-zA-Z0-9-]*[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]*[a-zA-Z0-9])?)+)(?::[0-9]+)?)/)?",
        r"(?P<path>[a-z0-9]+(?:(?:[_.]|__|-+)[a-z0-9]+)*(?:/[a-z0-9]+(?:(?:[_.]|__|-+)[a-z0-9]+)*)*)",
        r"(?::(?P<tag>[\w][\w.-]{0,127}))?",
        r"(?:@(?P<digest>[A-Za-z][A-Za-z0-9]*(?:[-_+.][A-Za-z][A-Za-z0-9]*)*:[0-9a-fA-F]{32,}))?",
        r"$"
    ))
    .expect("image reference regex is valid")
});

static TAG_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\w][\w.-]{0,127}$").expect("tag regex is valid"));

/// The sections of a parsed image reference, borrowed from the parsed string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageReference<'a> {
    pub registry: Option<&'a str>,
    pub path: &'a str,
    pub tag: Option<&'a str>,
    pub digest: Option<&'a str>,
}

impl<'a> ImageReference<'a> {
    pub fn parse(value: &'a str) -> Result<Self, InvalidImageName> {
        let captures = REFERENCE_REGEX
            .captures(value)
            .ok_or_else(|| InvalidImageName(value.to_owned()))?;
        let section = |name| captures.name(name).map(|m| m.as_str());
        Ok(Self {
            registry: section("registry"),
            path: section("path").ok_or_else(|| InvalidImageName(value.to_owned()))?,
            tag: section("tag"),
            digest: section("digest"),
        })
    }
}

/// Checks that `value` is an image name without tag or digest, which is what artifacts are
/// configured with.
pub fn validate_name(value: &str) -> Result<(), InvalidImageName> {
    let reference = ImageReference::parse(value)?;
    if reference.tag.is_some() || reference.digest.is_some() {
        return Err(InvalidImageName(value.to_owned()));
    }
    Ok(())
}

pub fn is_valid_tag(value: &str) -> bool {
    TAG_REGEX.is_match(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_works() {
        assert_eq!(
            ImageReference::parse("app").unwrap(),
            ImageReference {
                registry: None,
                path: "app",
                tag: None,
                digest: None,
            }
        );

        let reference = ImageReference::parse("reg.io:5000/org/app:v1").unwrap();
        assert_eq!(reference.registry, Some("reg.io:5000"));
        assert_eq!(reference.path, "org/app");
        assert_eq!(reference.tag, Some("v1"));

        let reference = ImageReference::parse("localhost:5000/app").unwrap();
        assert_eq!(reference.registry, Some("localhost:5000"));
        assert_eq!(reference.path, "app");

        let reference = ImageReference::parse(
            "registry/app:v1@sha256:01234567aaaaaaaa01234567aaaaaaaa01234567aaaaaaaa01234567aaaaaaaa",
        )
        .unwrap();
        assert_eq!(reference.registry, None);
        assert_eq!(reference.path, "registry/app");
        assert_eq!(reference.tag, Some("v1"));
        assert_eq!(
            reference.digest,
            Some("sha256:01234567aaaaaaaa01234567aaaaaaaa01234567aaaaaaaa01234567aaaaaaaa")
        );
    }

    #[test]
    fn invalid_references_are_rejected() {
        assert!(ImageReference::parse(".").is_err());
        assert!(ImageReference::parse("App").is_err());
        assert!(ImageReference::parse("a@sha256:1234").is_err()); // digest too short.
        assert!(ImageReference::parse("app:").is_err());
    }

    #[test]
    fn names_must_not_carry_tag_or_digest() {
        assert_eq!(validate_name("gcr.io/project/app"), Ok(()));
        assert_eq!(
            validate_name("app:v1"),
            Err(InvalidImageName("app:v1".to_owned()))
        );
    }

    #[test]
    fn tags() {
        assert!(is_valid_tag("latest"));
        assert!(is_valid_tag("v1.2.3-rc_1"));
        assert!(!is_valid_tag(""));
        assert!(!is_valid_tag(".hidden"));
        assert!(!is_valid_tag("a/b"));
    }
}
