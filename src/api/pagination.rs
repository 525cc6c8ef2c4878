use serde::Deserialize;

/// Items per page when `limit` is absent or unusable.
pub const DEFAULT_LIMIT: i64 = 20;
pub const MAX_LIMIT: i64 = 100;

/// `?page=&limit=` query parameters.
///
/// Both are taken as raw strings: a malformed or non-positive value falls back
/// to the default instead of failing the request.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    page: Option<String>,
    limit: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

impl PageQuery {
    pub fn page(&self) -> Page {
        let page = parse_positive(self.page.as_deref()).unwrap_or(1);
        let limit = parse_positive(self.limit.as_deref())
            .unwrap_or(DEFAULT_LIMIT)
            .min(MAX_LIMIT);
        Page {
            limit,
            offset: (page - 1).saturating_mul(limit),
        }
    }
}

fn parse_positive(value: Option<&str>) -> Option<i64> {
    value
        .and_then(|v| v.trim().parse::<i64>().ok())
        .filter(|v| *v >= 1)
}
