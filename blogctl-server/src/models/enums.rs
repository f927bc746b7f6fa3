//! Closed value sets stored as TEXT columns and exchanged as lowercase strings

use std::fmt;

use super::ValidationError;

macro_rules! wire_enum {
    ($(#[$meta:meta])* $name:ident, $field:literal { $($variant:ident => $wire:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            /// Get string representation.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $wire),+
                }
            }

            /// Parse the wire form, reporting the field on failure.
            pub fn parse(value: &str) -> Result<Self, ValidationError> {
                match value.trim() {
                    $($wire => Ok(Self::$variant),)+
                    other => Err(ValidationError::InvalidVariant {
                        field: $field,
                        value: other.to_owned(),
                    }),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

wire_enum!(
    /// Publication state of a post
    BlogStatus, "status" {
        Published => "published",
        Archived => "archived",
    }
);

wire_enum!(LayoutType, "layout.type" {
    SingleColumn => "single-column",
    TwoColumn => "two-column",
});

wire_enum!(
    /// Content block kinds; the `content` JSON shape depends on the kind
    BlockType, "blocks.type" {
        Heading => "heading",
        Paragraph => "paragraph",
        Code => "code",
        Image => "image",
        Callout => "callout",
        List => "list",
        Quote => "quote",
        Divider => "divider",
    }
);

wire_enum!(LinkType, "links.type" {
    Internal => "internal",
    External => "external",
});

wire_enum!(VoteType, "voteType" {
    Upvote => "upvote",
    Downvote => "downvote",
});

wire_enum!(
    /// Moderation state; only approved comments are public
    CommentStatus, "status" {
        Approved => "approved",
        Pending => "pending",
        Spam => "spam",
        Deleted => "deleted",
    }
);

wire_enum!(EventColor, "color" {
    Blue => "blue",
    Green => "green",
    Purple => "purple",
    Orange => "orange",
});

wire_enum!(BlogSort, "sort" {
    Newest => "newest",
    Oldest => "oldest",
    Popular => "popular",
});

wire_enum!(CommentSort, "sort" {
    Newest => "newest",
    Oldest => "oldest",
});

impl Default for BlogStatus {
    fn default() -> Self {
        Self::Published
    }
}

impl Default for LayoutType {
    fn default() -> Self {
        Self::SingleColumn
    }
}

impl Default for LinkType {
    fn default() -> Self {
        Self::External
    }
}

impl Default for EventColor {
    fn default() -> Self {
        Self::Blue
    }
}

impl Default for BlogSort {
    fn default() -> Self {
        Self::Newest
    }
}

impl Default for CommentSort {
    fn default() -> Self {
        Self::Newest
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_wire_names() {
        assert_eq!(LayoutType::parse("two-column").unwrap(), LayoutType::TwoColumn);
        assert_eq!(VoteType::parse(" upvote ").unwrap(), VoteType::Upvote);
        assert_eq!(BlockType::Callout.as_str(), "callout");
        assert_eq!(CommentStatus::Spam.to_string(), "spam");
    }

    #[test]
    fn rejects_unknown_values_with_field() {
        let err = EventColor::parse("red").unwrap_err();
        assert_eq!(
            err,
            ValidationError::InvalidVariant {
                field: "color",
                value: "red".into()
            }
        );
        assert!(BlogSort::parse("Newest").is_err());
    }
}
