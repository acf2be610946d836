// ABOUTME: Integration tests for type-safe identifiers and validated types.
// ABOUTME: Tests parsing, validation, and ordering properties of release tags and commits.

use proptest::prelude::*;
use releasegate::types::*;

mod image_ref_tests {
    use super::*;

    #[test]
    fn parse_simple_name() {
        let img = ImageRef::parse("nginx").unwrap();
        assert_eq!(img.name(), "nginx");
        assert_eq!(img.tag(), None);
        assert!(img.registry().is_none());
        assert!(img.digest().is_none());
    }

    #[test]
    fn parse_with_registry_port() {
        let img = ImageRef::parse("localhost:5000/shop").unwrap();
        assert_eq!(img.registry(), Some("localhost:5000"));
        assert_eq!(img.name(), "shop");
        assert_eq!(img.tag(), None);
    }

    #[test]
    fn with_tag_pins_release_and_drops_digest() {
        let img = ImageRef::parse("ghcr.io/org/shop@sha256:abc").unwrap();
        let pinned = img.with_tag("v1.2.3+build.7");
        assert_eq!(pinned.to_string(), "ghcr.io/org/shop:v1.2.3-build.7");
        assert!(pinned.digest().is_none());
    }

    #[test]
    fn parse_invalid_chars_returns_error() {
        assert!(ImageRef::parse("invalid image!").is_err());
        assert!(ImageRef::parse("").is_err());
    }
}

mod tag_name_tests {
    use super::*;

    #[test]
    fn accepts_prefixed_and_bare_versions() {
        assert_eq!(TagName::parse("v2.0.1").unwrap().as_str(), "v2.0.1");
        assert_eq!(TagName::parse("2.0.1").unwrap().as_str(), "2.0.1");
    }

    #[test]
    fn pre_release_is_exposed() {
        let tag = TagName::parse("v1.3.0-rc.2").unwrap();
        assert_eq!(tag.pre_release(), Some("rc.2"));
    }

    #[test]
    fn rejects_non_semver_names() {
        for bad in ["latest", "v1", "v1.2", "release/1.2.3", ""] {
            assert!(TagName::parse(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn serializes_as_plain_string() {
        let tag = TagName::parse("v1.0.0").unwrap();
        assert_eq!(serde_json::to_string(&tag).unwrap(), r#""v1.0.0""#);
        let back: TagName = serde_json::from_str(r#""v1.0.0""#).unwrap();
        assert_eq!(back, tag);
    }

    proptest! {
        #[test]
        fn version_order_follows_numbers(
            a in (0u64..50, 0u64..50, 0u64..50),
            b in (0u64..50, 0u64..50, 0u64..50),
        ) {
            let ta = TagName::parse(&format!("v{}.{}.{}", a.0, a.1, a.2)).unwrap();
            let tb = TagName::parse(&format!("v{}.{}.{}", b.0, b.1, b.2)).unwrap();
            prop_assert_eq!(ta.version().cmp(tb.version()), a.cmp(&b));
        }
    }
}

mod commit_hash_tests {
    use super::*;

    #[test]
    fn normalizes_to_lowercase() {
        let commit = CommitHash::new("ABCDEF1234").unwrap();
        assert_eq!(commit.as_str(), "abcdef1234");
        assert_eq!(commit.short(), "abcdef12");
    }

    #[test]
    fn abbreviated_hash_matches_full_hash() {
        let full = CommitHash::new("abcdef1234567890abcdef1234567890abcdef12").unwrap();
        let short = CommitHash::new("abcdef1").unwrap();
        assert!(full.matches(&short));
        assert!(short.matches(&full));
        assert!(!full.matches(&CommitHash::new("abcdef2").unwrap()));
    }

    #[test]
    fn rejects_short_or_non_hex() {
        assert!(CommitHash::new("abc").is_err());
        assert!(CommitHash::new("xyz1234567").is_err());
    }

    proptest! {
        #[test]
        fn any_hex_string_in_range_is_accepted(s in "[0-9a-f]{7,40}") {
            let commit = CommitHash::new(&s).unwrap();
            prop_assert_eq!(commit.as_str(), s.as_str());
            prop_assert!(commit.matches(&CommitHash::new(&s[..7]).unwrap()));
        }
    }
}

mod service_name_tests {
    use super::*;

    #[test]
    fn valid_dns_name() {
        let name = ServiceName::new("my-service").unwrap();
        assert_eq!(name.as_str(), "my-service");
    }

    #[test]
    fn invalid_names_are_rejected() {
        assert!(ServiceName::new("").is_err());
        assert!(ServiceName::new(&"a".repeat(64)).is_err());
        assert!(ServiceName::new("-service").is_err());
        assert!(ServiceName::new("service-").is_err());
        assert!(ServiceName::new("MyService").is_err());
        assert!(ServiceName::new("my_service").is_err());
    }

    #[test]
    fn valid_63_chars() {
        assert!(ServiceName::new(&"a".repeat(63)).is_ok());
    }
}

mod slot_tests {
    use super::*;

    #[test]
    fn other_slot_alternates() {
        assert_eq!(Slot::Blue.other(), Slot::Green);
        assert_eq!(Slot::Green.other(), Slot::Blue);
    }

    #[test]
    fn parses_label_values() {
        assert_eq!("green".parse::<Slot>().unwrap(), Slot::Green);
        assert!("purple".parse::<Slot>().is_err());
    }
}

mod id_tests {
    use super::*;

    #[test]
    fn container_id_short_form() {
        let id = ContainerId::new("0123456789abcdef0123");
        assert_eq!(id.as_str(), "0123456789abcdef0123");
        assert_eq!(id.short(), "0123456789ab");
    }

    #[test]
    fn image_id_stores_value() {
        let id = ImageId::new("sha256:abc");
        assert_eq!(id.as_str(), "sha256:abc");
    }
}
