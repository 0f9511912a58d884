//! Request routing: turns an inbound method + URI into a [`PageRequest`].
//!
//! Everything the rest of the pipeline needs is derived here, once:
//! the [`CacheKey`], the capture viewport and source URL, the transform
//! directives and the `invalidate` flag.

use crate::{Config, RequestRejection, TransformDefaults, ViewportDefaults};
use axum::http::{Method, Uri};
use std::fmt;

/// Separator standing in for `/` inside a cache key.
pub const KEY_DELIMITER: &str = "--";

/// Image suffix appended to every cache key.
pub const KEY_SUFFIX: &str = ".jpeg";

const KEY_ESCAPE: char = '~';

/// Identity of a cached artifact, derived deterministically from the page path.
///
/// Path segments are joined with `--`. A `-` that touches another `-` or sits
/// at either end of a segment is written as `~d` and a literal `~` as `~~`, so
/// every `-` run in a key is either a lone literal dash or a whole number of
/// delimiters. Paths that only use single inner dashes (the common slug shape)
/// keep their plain form: `blog/my-post` becomes `blog--my-post.jpeg`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// `path` must already be trimmed of leading and trailing `/`.
    pub fn from_path(path: &str) -> Self {
        let mut key = String::with_capacity(path.len() + KEY_SUFFIX.len());

        for (i, segment) in path.split('/').enumerate() {
            if i > 0 {
                key.push_str(KEY_DELIMITER);
            }
            escape_segment(segment, &mut key);
        }

        key.push_str(KEY_SUFFIX);
        Self(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

fn escape_segment(segment: &str, out: &mut String) {
    let chars: Vec<char> = segment.chars().collect();

    for (i, &c) in chars.iter().enumerate() {
        match c {
            KEY_ESCAPE => {
                out.push(KEY_ESCAPE);
                out.push(KEY_ESCAPE);
            }
            '-' => {
                let at_edge = i == 0 || i + 1 == chars.len();
                let prev_dash = i > 0 && chars[i - 1] == '-';
                let next_dash = chars.get(i + 1) == Some(&'-');

                if at_edge || prev_dash || next_dash {
                    out.push(KEY_ESCAPE);
                    out.push('d');
                } else {
                    out.push('-');
                }
            }
            c => out.push(c),
        }
    }
}

/// Viewport handed to the rendering service. Both dimensions are non-zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    /// Resolve `vw`/`vh` query values. Anything that is not a positive integer
    /// falls back to the configured default, silently.
    pub fn from_query(vw: Option<&str>, vh: Option<&str>, defaults: ViewportDefaults) -> Self {
        Self {
            width: parse_dimension(vw).unwrap_or(defaults.width),
            height: parse_dimension(vh).unwrap_or(defaults.height),
        }
    }
}

fn parse_dimension(value: Option<&str>) -> Option<u32> {
    value
        .and_then(|v| v.trim().parse::<u32>().ok())
        .filter(|v| *v > 0)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureParameters {
    pub viewport: Viewport,
    /// Fully-qualified URL of the page to render.
    pub source_url: String,
}

/// Display directives forwarded to the transform service.
///
/// Values are opaque; the transform service decides what is valid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformParameters {
    directives: Vec<(&'static str, String)>,
}

impl TransformParameters {
    pub fn from_query(query: &QueryParams, defaults: &TransformDefaults) -> Self {
        let mut directives = vec![
            ("quality", query.non_empty("quality").unwrap_or(defaults.quality.as_str()).to_string()),
            ("width", query.non_empty("width").unwrap_or(defaults.width.as_str()).to_string()),
            ("format", query.non_empty("format").unwrap_or(defaults.format.as_str()).to_string()),
            ("fit", query.non_empty("fit").unwrap_or(defaults.fit.as_str()).to_string()),
        ];

        for name in ["height", "gravity"] {
            if let Some(value) = query.non_empty(name) {
                directives.push((name, value.to_string()));
            }
        }

        Self { directives }
    }

    /// `quality=80,width=500,format=auto,fit=cover[,height=..][,gravity=..]`
    pub fn to_path_segment(&self) -> String {
        self.directives
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Decoded query string. Lookups return the first occurrence of a name.
#[derive(Debug, Clone, Default)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    pub fn parse(query: Option<&str>) -> Self {
        let pairs = query
            .map(|q| {
                url::form_urlencoded::parse(q.as_bytes())
                    .into_owned()
                    .collect()
            })
            .unwrap_or_default();

        Self { pairs }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    fn non_empty(&self, name: &str) -> Option<&str> {
        self.get(name).filter(|v| !v.is_empty())
    }
}

/// Everything derived from one inbound page request.
#[derive(Debug, Clone)]
pub struct PageRequest {
    /// Request path without leading or trailing `/`.
    pub path: String,
    pub key: CacheKey,
    pub capture: CaptureParameters,
    pub transform: TransformParameters,
    /// Set only by the exact query value `invalidate=true`.
    pub invalidate: bool,
}

impl PageRequest {
    pub fn from_parts(method: &Method, uri: &Uri, config: &Config) -> Result<Self, RequestRejection> {
        if *method != Method::GET && *method != Method::HEAD {
            return Err(RequestRejection::MethodNotAllowed);
        }

        Self::parse(uri.path(), uri.query(), config)
    }

    /// Build a request from a raw path and query string, skipping the method check.
    pub fn parse(raw_path: &str, query: Option<&str>, config: &Config) -> Result<Self, RequestRejection> {
        let path = raw_path.trim_matches('/');
        if path.is_empty() {
            return Err(RequestRejection::MissingPath);
        }

        let query = QueryParams::parse(query);

        Ok(Self {
            path: path.to_string(),
            key: CacheKey::from_path(path),
            capture: CaptureParameters {
                viewport: Viewport::from_query(query.get("vw"), query.get("vh"), config.default_viewport),
                source_url: format!("{}/{}", config.site_base(), path),
            },
            transform: TransformParameters::from_query(&query, &config.transform_defaults),
            invalidate: query.get("invalidate") == Some("true"),
        })
    }
}
