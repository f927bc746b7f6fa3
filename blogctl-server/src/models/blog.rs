//! Blog post payloads and their validated forms

use blogctl_core::slugify;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use super::validation::{optional_text, required_text};
use super::{
    BlockType, BlogSort, BlogStatus, LayoutType, LinkType, Pagination, PaginationParams, Slug,
    ValidationError, ValidationErrors,
};

const MAX_TITLE_LEN: usize = 500;
const MAX_DESCRIPTION_LEN: usize = 2000;
const MAX_AUTHOR_LEN: usize = 255;
const MAX_WIDTH_LEN: usize = 50;
const MAX_TAG_LEN: usize = 100;
const MAX_LINK_LABEL_LEN: usize = 255;
const MAX_URL_LEN: usize = 2048;
const MAX_SEARCH_LEN: usize = 200;

const DEFAULT_MAX_WIDTH: &str = "800px";

/// Blog listings default to 10 per page and never return more than 50.
pub const BLOG_PAGE_DEFAULT: u32 = 10;
pub const BLOG_PAGE_MAX: u32 = 50;

static URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^https?://[^\s/?#]+\.[^\s/?#]+(?:[/?#]\S*)?$").expect("invalid url regex"));

fn url(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let value = required_text(field, value, MAX_URL_LEN)?;
    if !URL_RE.is_match(&value) {
        return Err(ValidationError::InvalidFormat {
            field,
            reason: "must be a valid URL",
        });
    }
    Ok(value)
}

/// Create/update body for `/api/v1/blogs`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub slug: Option<String>,
    pub author: Option<String>,
    pub cover_image: Option<String>,
    pub layout: Option<LayoutRequest>,
    pub settings: Option<SettingsRequest>,
    pub status: Option<String>,
    pub tags: Option<Vec<String>>,
    pub links: Option<Vec<LinkRequest>>,
    pub blocks: Option<Vec<BlockRequest>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutRequest {
    #[serde(rename = "type")]
    pub layout_type: Option<String>,
    pub max_width: Option<String>,
    pub show_table_of_contents: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsRequest {
    pub enable_voting: Option<bool>,
    pub enable_social_share: Option<bool>,
    pub enable_comments: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LinkRequest {
    pub label: String,
    pub url: String,
    #[serde(rename = "type")]
    pub link_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BlockRequest {
    #[serde(rename = "type")]
    pub block_type: String,
    #[serde(default)]
    pub content: Value,
    pub order: Option<i32>,
}

/// Tag referenced by a post; created on first use
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagRef {
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewLink {
    pub label: String,
    pub url: String,
    pub link_type: LinkType,
    pub order: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewBlock {
    pub block_type: BlockType,
    pub content: Value,
    pub order: i32,
}

/// Validated create payload
#[derive(Debug, Clone)]
pub struct NewBlog {
    pub title: String,
    pub description: Option<String>,
    /// Client-chosen slug; when absent one is derived from the title
    pub slug: Option<Slug>,
    pub author: Option<String>,
    pub cover_image: Option<String>,
    pub layout_type: LayoutType,
    pub max_width: String,
    pub show_table_of_contents: bool,
    pub enable_voting: bool,
    pub enable_social_share: bool,
    pub enable_comments: bool,
    pub status: BlogStatus,
    pub tags: Vec<TagRef>,
    pub links: Vec<NewLink>,
    pub blocks: Vec<NewBlock>,
}

/// Validated update payload; `None` leaves a column untouched
#[derive(Debug, Clone, Default)]
pub struct BlogPatch {
    pub title: Option<String>,
    /// `Some(None)` clears the description
    pub description: Option<Option<String>>,
    pub slug: Option<Slug>,
    pub author: Option<Option<String>>,
    pub cover_image: Option<Option<String>>,
    pub layout_type: Option<LayoutType>,
    pub max_width: Option<String>,
    pub show_table_of_contents: Option<bool>,
    pub enable_voting: Option<bool>,
    pub enable_social_share: Option<bool>,
    pub enable_comments: Option<bool>,
    pub status: Option<BlogStatus>,
    pub tags: Option<Vec<TagRef>>,
    pub links: Option<Vec<NewLink>>,
    pub blocks: Option<Vec<NewBlock>>,
}

fn tag_refs(errors: &mut ValidationErrors, names: Vec<String>) -> Vec<TagRef> {
    let mut tags: Vec<TagRef> = Vec::with_capacity(names.len());
    for name in names {
        let Some(name) = errors.check(required_text("tags", &name, MAX_TAG_LEN)) else {
            continue;
        };
        let slug = slugify(&name);
        if slug.is_empty() {
            errors.push(ValidationError::InvalidFormat {
                field: "tags",
                reason: "tag names must contain letters or digits",
            });
            continue;
        }
        if !tags.iter().any(|t| t.slug == slug) {
            tags.push(TagRef { name, slug });
        }
    }
    tags
}

fn links(errors: &mut ValidationErrors, requests: Vec<LinkRequest>) -> Vec<NewLink> {
    let mut links = Vec::with_capacity(requests.len());
    for (idx, link) in requests.into_iter().enumerate() {
        let label = errors.check(required_text("links.label", &link.label, MAX_LINK_LABEL_LEN));
        let target = errors.check(url("links.url", &link.url));
        let link_type = match link.link_type.as_deref() {
            Some(t) => errors.check(LinkType::parse(t)),
            None => Some(LinkType::default()),
        };
        if let (Some(label), Some(url), Some(link_type)) = (label, target, link_type) {
            links.push(NewLink {
                label,
                url,
                link_type,
                order: idx as i32,
            });
        }
    }
    links
}

fn blocks(errors: &mut ValidationErrors, requests: Vec<BlockRequest>) -> Vec<NewBlock> {
    let mut blocks = Vec::with_capacity(requests.len());
    for (idx, block) in requests.into_iter().enumerate() {
        let Some(block_type) = errors.check(BlockType::parse(&block.block_type)) else {
            continue;
        };
        let content = match block.content {
            Value::Null => Value::Object(Default::default()),
            Value::Object(map) => Value::Object(map),
            _ => {
                errors.push(ValidationError::InvalidFormat {
                    field: "blocks.content",
                    reason: "must be a JSON object",
                });
                continue;
            }
        };
        blocks.push(NewBlock {
            block_type,
            content,
            // an explicit 0 falls back to the position, like an absent order
            order: block.order.filter(|o| *o != 0).unwrap_or(idx as i32),
        });
    }
    blocks
}

impl BlogRequest {
    /// Validate a create request. `title` is required.
    pub fn validate_create(self) -> Result<NewBlog, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let title = match self.title.as_deref() {
            Some(t) => errors.check(required_text("title", t, MAX_TITLE_LEN)),
            None => {
                errors.push(ValidationError::Empty { field: "title" });
                None
            }
        };
        let description = errors
            .check(optional_text("description", self.description.as_deref(), MAX_DESCRIPTION_LEN))
            .flatten();
        let slug = self
            .slug
            .as_deref()
            .and_then(|s| errors.check(Slug::new(s)));
        let author = errors
            .check(optional_text("author", self.author.as_deref(), MAX_AUTHOR_LEN))
            .flatten();
        let cover_image = self
            .cover_image
            .as_deref()
            .and_then(|u| errors.check(url("coverImage", u)));

        let layout = self.layout.unwrap_or_default();
        let layout_type = match layout.layout_type.as_deref() {
            Some(t) => errors.check(LayoutType::parse(t)).unwrap_or_default(),
            None => LayoutType::default(),
        };
        let max_width = errors
            .check(optional_text("layout.maxWidth", layout.max_width.as_deref(), MAX_WIDTH_LEN))
            .flatten()
            .unwrap_or_else(|| DEFAULT_MAX_WIDTH.to_owned());

        let settings = self.settings.unwrap_or_default();
        let status = match self.status.as_deref() {
            Some(s) => errors.check(BlogStatus::parse(s)).unwrap_or_default(),
            None => BlogStatus::default(),
        };

        let tags = tag_refs(&mut errors, self.tags.unwrap_or_default());
        let links = links(&mut errors, self.links.unwrap_or_default());
        let blocks = blocks(&mut errors, self.blocks.unwrap_or_default());

        errors.finish()?;

        Ok(NewBlog {
            // finish() above guarantees the title was recorded
            title: title.unwrap_or_default(),
            description,
            slug,
            author,
            cover_image,
            layout_type,
            max_width,
            show_table_of_contents: layout.show_table_of_contents.unwrap_or(false),
            enable_voting: settings.enable_voting.unwrap_or(true),
            enable_social_share: settings.enable_social_share.unwrap_or(true),
            enable_comments: settings.enable_comments.unwrap_or(true),
            status,
            tags,
            links,
            blocks,
        })
    }

    /// Validate an update request. Every field is optional.
    pub fn validate_update(self) -> Result<BlogPatch, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let title = self
            .title
            .as_deref()
            .and_then(|t| errors.check(required_text("title", t, MAX_TITLE_LEN)));
        let description = self.description.as_deref().and_then(|d| {
            errors.check(optional_text("description", Some(d), MAX_DESCRIPTION_LEN))
        });
        let slug = self
            .slug
            .as_deref()
            .and_then(|s| errors.check(Slug::new(s)));
        let author = self
            .author
            .as_deref()
            .and_then(|a| errors.check(optional_text("author", Some(a), MAX_AUTHOR_LEN)));
        let cover_image = self.cover_image.as_deref().and_then(|u| {
            if u.trim().is_empty() {
                Some(None)
            } else {
                errors.check(url("coverImage", u)).map(Some)
            }
        });

        let layout = self.layout.unwrap_or_default();
        let layout_type = layout
            .layout_type
            .as_deref()
            .and_then(|t| errors.check(LayoutType::parse(t)));
        let max_width = layout
            .max_width
            .as_deref()
            .and_then(|w| errors.check(required_text("layout.maxWidth", w, MAX_WIDTH_LEN)));
        let settings = self.settings.unwrap_or_default();
        let status = self
            .status
            .as_deref()
            .and_then(|s| errors.check(BlogStatus::parse(s)));

        let tags = self.tags.map(|names| tag_refs(&mut errors, names));
        let links = self.links.map(|requests| links(&mut errors, requests));
        let blocks = self.blocks.map(|requests| blocks(&mut errors, requests));

        errors.finish()?;

        Ok(BlogPatch {
            title,
            description,
            slug,
            author,
            cover_image,
            layout_type,
            max_width,
            show_table_of_contents: layout.show_table_of_contents,
            enable_voting: settings.enable_voting,
            enable_social_share: settings.enable_social_share,
            enable_comments: settings.enable_comments,
            status,
            tags,
            links,
            blocks,
        })
    }
}

/// Query string for `GET /api/v1/blogs`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BlogListParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub sort: Option<String>,
    /// Comma-separated tag slugs
    pub tags: Option<String>,
    pub author: Option<String>,
    pub search: Option<String>,
}

/// Validated listing filter
#[derive(Debug, Clone, PartialEq)]
pub struct BlogFilter {
    pub page: Pagination,
    pub sort: BlogSort,
    pub tags: Vec<String>,
    pub author: Option<String>,
    pub search: Option<String>,
}

impl BlogFilter {
    /// Published posts, newest first, no filters.
    pub fn new(page: Pagination) -> Self {
        Self {
            page,
            sort: BlogSort::default(),
            tags: Vec::new(),
            author: None,
            search: None,
        }
    }
}

/// Split a comma-separated tag list, dropping blanks.
pub fn split_tags(raw: Option<&str>) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_owned)
            .collect()
    })
    .unwrap_or_default()
}

impl BlogListParams {
    pub fn validate(self) -> Result<BlogFilter, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let page = Pagination::from_params(
            &PaginationParams {
                page: self.page,
                limit: self.limit,
            },
            BLOG_PAGE_DEFAULT,
            BLOG_PAGE_MAX,
        );
        let page = match page {
            Ok(page) => Some(page),
            Err(page_errors) => {
                for err in page_errors.errors() {
                    errors.push(err.clone());
                }
                None
            }
        };
        let sort = match self.sort.as_deref() {
            Some(s) => errors.check(BlogSort::parse(s)),
            None => Some(BlogSort::default()),
        };
        let author = errors
            .check(optional_text("author", self.author.as_deref(), MAX_AUTHOR_LEN))
            .flatten();
        let search = self
            .search
            .as_deref()
            .and_then(|q| errors.check(required_text("search", q, MAX_SEARCH_LEN)));

        errors.finish()?;

        Ok(BlogFilter {
            page: page.unwrap_or(Pagination::new(1, BLOG_PAGE_DEFAULT, BLOG_PAGE_MAX)),
            sort: sort.unwrap_or_default(),
            tags: split_tags(self.tags.as_deref()),
            author,
            search,
        })
    }
}
