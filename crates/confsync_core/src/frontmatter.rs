use anyhow::{Context, Result, bail};
use serde_yaml::{Mapping, Value};

pub const KEY_PAGE_ID: &str = "page-id";
pub const KEY_TITLE: &str = "title";
pub const KEY_PUBLISH: &str = "publish";
pub const KEY_SPACE_KEY: &str = "space-key";
pub const KEY_DONT_CHANGE_PARENT: &str = "dont-change-parent";
pub const KEY_BLOG_POST_DATE: &str = "blog-post-date";

const DELIMITER: &str = "---";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Page,
    Blogpost,
}

impl ContentType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Page => "page",
            Self::Blogpost => "blogpost",
        }
    }
}

/// A document's metadata block, kept as a raw YAML mapping so keys the sync
/// engine does not know about survive a round-trip untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frontmatter {
    data: Mapping,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedDocument {
    pub frontmatter: Frontmatter,
    pub body: String,
}

impl Frontmatter {
    pub fn from_mapping(data: Mapping) -> Self {
        Self { data }
    }

    pub fn mapping(&self) -> &Mapping {
        &self.data
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    fn get_scalar_string(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            Value::String(value) => Some(value.clone()),
            Value::Number(value) => Some(value.to_string()),
            _ => None,
        }
    }

    fn get_bool(&self, key: &str) -> Option<bool> {
        match self.get(key)? {
            Value::Bool(value) => Some(*value),
            _ => None,
        }
    }

    /// The remote page identifier, rendered as a string whether the YAML
    /// scalar was quoted or not. Absent before the first successful publish.
    pub fn page_id(&self) -> Option<String> {
        self.get_scalar_string(KEY_PAGE_ID)
    }

    pub fn title(&self) -> Option<String> {
        self.get_scalar_string(KEY_TITLE)
    }

    pub fn publish(&self) -> Option<bool> {
        self.get_bool(KEY_PUBLISH)
    }

    pub fn space_key(&self) -> Option<String> {
        self.get_scalar_string(KEY_SPACE_KEY)
    }

    pub fn dont_change_parent(&self) -> Option<bool> {
        self.get_bool(KEY_DONT_CHANGE_PARENT)
    }

    pub fn blog_post_date(&self) -> Option<String> {
        self.get_scalar_string(KEY_BLOG_POST_DATE)
    }

    /// Derived: a document is a blog post iff it carries a post date.
    pub fn content_type(&self) -> ContentType {
        if self.blog_post_date().is_some() {
            ContentType::Blogpost
        } else {
            ContentType::Page
        }
    }
}

/// Split a leading YAML frontmatter block from the trailing body. A document
/// without a block (or with an unterminated one) yields an empty mapping and
/// the whole text, trimmed, as body.
pub fn parse(text: &str) -> Result<ParsedDocument> {
    let lines: Vec<&str> = text.lines().collect();
    let has_open = lines
        .first()
        .is_some_and(|line| line.trim_end() == DELIMITER);
    if !has_open {
        return Ok(ParsedDocument {
            frontmatter: Frontmatter::default(),
            body: text.trim().to_string(),
        });
    }

    let Some(close) = lines[1..]
        .iter()
        .position(|line| line.trim_end() == DELIMITER)
        .map(|index| index + 1)
    else {
        return Ok(ParsedDocument {
            frontmatter: Frontmatter::default(),
            body: text.trim().to_string(),
        });
    };

    let block = lines[1..close].join("\n");
    let body = lines[close + 1..].join("\n").trim().to_string();

    let value: Value =
        serde_yaml::from_str(&block).context("failed to parse frontmatter block")?;
    let data = match value {
        Value::Null => Mapping::new(),
        Value::Mapping(mapping) => mapping,
        other => bail!("frontmatter must be a mapping, got {other:?}"),
    };

    Ok(ParsedDocument {
        frontmatter: Frontmatter::from_mapping(data),
        body,
    })
}

/// Serialize a frontmatter mapping back in front of a body. Documents with no
/// metadata stay plain markdown.
pub fn serialize(frontmatter: &Frontmatter, body: &str) -> Result<String> {
    let body = body.trim();
    if frontmatter.is_empty() {
        return Ok(format!("{body}\n"));
    }
    let block = serde_yaml::to_string(&Value::Mapping(frontmatter.data.clone()))
        .context("failed to serialize frontmatter block")?;
    Ok(format!("{DELIMITER}\n{block}{DELIMITER}\n\n{body}\n"))
}

/// Re-parse `text`, shallow-merge `new_data` over its frontmatter (new values
/// win, existing keys that are not mentioned survive), and serialize with the
/// original body. Pure transform; applying the same `new_data` twice yields
/// the same text as once.
pub fn update(text: &str, new_data: &Mapping) -> Result<String> {
    let parsed = parse(text)?;
    let mut data = parsed.frontmatter.data;
    for (key, value) in new_data {
        data.insert(key.clone(), value.clone());
    }
    serialize(&Frontmatter::from_mapping(data), &parsed.body)
}

#[cfg(test)]
mod tests {
    use serde_yaml::{Mapping, Value};

    use super::{ContentType, Frontmatter, parse, serialize, update};

    fn mapping(pairs: &[(&str, Value)]) -> Mapping {
        let mut out = Mapping::new();
        for (key, value) in pairs {
            out.insert(Value::String((*key).to_string()), value.clone());
        }
        out
    }

    #[test]
    fn parse_splits_frontmatter_and_body() {
        let text = "---\ntitle: Guide\npage-id: 100\n---\n\n# Guide\n\nBody text.\n";
        let parsed = parse(text).expect("parse");
        assert_eq!(parsed.frontmatter.title().as_deref(), Some("Guide"));
        assert_eq!(parsed.frontmatter.page_id().as_deref(), Some("100"));
        assert_eq!(parsed.body, "# Guide\n\nBody text.");
    }

    #[test]
    fn parse_without_frontmatter_yields_empty_mapping() {
        let parsed = parse("# Just a heading\n").expect("parse");
        assert!(parsed.frontmatter.is_empty());
        assert_eq!(parsed.body, "# Just a heading");
    }

    #[test]
    fn parse_unterminated_block_is_treated_as_body() {
        let parsed = parse("---\ntitle: Broken\n# Body\n").expect("parse");
        assert!(parsed.frontmatter.is_empty());
        assert!(parsed.body.contains("title: Broken"));
    }

    #[test]
    fn roundtrip_preserves_frontmatter_and_body() {
        let frontmatter = Frontmatter::from_mapping(mapping(&[
            ("title", Value::String("Guide".to_string())),
            ("page-id", Value::Number(100.into())),
            ("publish", Value::Bool(true)),
        ]));
        let body = "# Guide\n\nBody text.";
        let text = serialize(&frontmatter, body).expect("serialize");
        let parsed = parse(&text).expect("parse");
        assert_eq!(parsed.frontmatter, frontmatter);
        assert_eq!(parsed.body, body);
    }

    #[test]
    fn update_merges_new_values_over_existing() {
        let text = "---\ntitle: Guide\ncustom-key: kept\n---\n\nBody.\n";
        let new_data = mapping(&[
            ("page-id", Value::Number(200.into())),
            ("publish", Value::Bool(true)),
        ]);
        let updated = update(text, &new_data).expect("update");
        let parsed = parse(&updated).expect("parse");
        assert_eq!(parsed.frontmatter.title().as_deref(), Some("Guide"));
        assert_eq!(parsed.frontmatter.page_id().as_deref(), Some("200"));
        assert_eq!(parsed.frontmatter.publish(), Some(true));
        assert_eq!(
            parsed.frontmatter.get_scalar_string("custom-key").as_deref(),
            Some("kept")
        );
        assert_eq!(parsed.body, "Body.");
    }

    #[test]
    fn update_is_idempotent() {
        let text = "---\ntitle: Guide\n---\n\nBody.\n";
        let new_data = mapping(&[("page-id", Value::Number(42.into()))]);
        let once = update(text, &new_data).expect("first update");
        let twice = update(&once, &new_data).expect("second update");
        assert_eq!(once, twice);
    }

    #[test]
    fn update_adds_frontmatter_to_bare_document() {
        let updated = update("Plain body.\n", &mapping(&[("publish", Value::Bool(true))]))
            .expect("update");
        let parsed = parse(&updated).expect("parse");
        assert_eq!(parsed.frontmatter.publish(), Some(true));
        assert_eq!(parsed.body, "Plain body.");
    }

    #[test]
    fn content_type_derived_from_blog_post_date() {
        let page = Frontmatter::from_mapping(mapping(&[(
            "title",
            Value::String("Guide".to_string()),
        )]));
        assert_eq!(page.content_type(), ContentType::Page);

        let post = Frontmatter::from_mapping(mapping(&[(
            "blog-post-date",
            Value::String("2024-06-01".to_string()),
        )]));
        assert_eq!(post.content_type(), ContentType::Blogpost);
    }

    #[test]
    fn page_id_accepts_quoted_and_numeric_scalars() {
        let quoted = parse("---\npage-id: \"123\"\n---\nBody\n").expect("parse");
        assert_eq!(quoted.frontmatter.page_id().as_deref(), Some("123"));
        let numeric = parse("---\npage-id: 123\n---\nBody\n").expect("parse");
        assert_eq!(numeric.frontmatter.page_id().as_deref(), Some("123"));
    }
}
