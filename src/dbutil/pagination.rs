use serde::{Deserialize, Deserializer};

/// Page size used when the caller supplies none or a non-positive one.
pub const DEFAULT_PAGE_SIZE: i64 = 20;

/// One-indexed page request, as received from a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_page", deserialize_with = "lenient_int")]
    pub page: i64,
    #[serde(
        default = "default_page_size",
        rename = "pageSize",
        deserialize_with = "lenient_int"
    )]
    pub page_size: i64,
}

/// Accepts numbers or numeric strings. Anything else reads as 0, which
/// [`Pagination::normalize`] turns into the default.
fn lenient_int<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(i64),
        Text(String),
        Other(serde::de::IgnoredAny),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Int(n) => n,
        Raw::Text(s) => s.trim().parse().unwrap_or(0),
        Raw::Other(_) => 0,
    })
}

fn default_page() -> i64 {
    1
}

fn default_page_size() -> i64 {
    DEFAULT_PAGE_SIZE
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: default_page(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl Pagination {
    pub fn new(page: i64, page_size: i64) -> Self {
        Self { page, page_size }
    }

    pub fn normalize(self) -> Self {
        Self {
            page: if self.page <= 0 { 1 } else { self.page },
            page_size: if self.page_size < 1 {
                DEFAULT_PAGE_SIZE
            } else {
                self.page_size
            },
        }
    }

    /// `(limit, offset)` for SQL.
    pub fn limit_offset(&self) -> (i64, i64) {
        limit_offset(self.page, self.page_size)
    }
}

/// `LIMIT`/`OFFSET` for a one-indexed page.
pub fn limit_offset(page: i64, page_size: i64) -> (i64, i64) {
    let Pagination { page, page_size } = Pagination::new(page, page_size).normalize();
    (page_size, (page - 1).saturating_mul(page_size))
}
