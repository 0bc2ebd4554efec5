//! Audio format descriptors and the selection policy applied to mirror
//! detail responses.

use std::fmt;

use crate::error::AppError;

/// Tags tried in order when no explicit preference is configured:
/// AAC 128k, then Opus 160k, 70k, 50k.
pub const DEFAULT_TAG_PREFERENCE: &[&str] = &["140", "251", "250", "249"];

/// One encoding option advertised by a mirror for a given track.
#[derive(Debug, Clone, PartialEq)]
pub struct FormatDescriptor {
    pub url: String,
    /// Container short name such as `m4a` or `webm`.
    pub container: Option<String>,
    /// Bits per second.
    pub bitrate: Option<u64>,
    /// Upstream format tag (itag).
    pub tag: Option<String>,
    pub quality: Option<String>,
    /// Full MIME type, e.g. `audio/webm; codecs="opus"`.
    pub mime_type: Option<String>,
}

impl FormatDescriptor {
    fn is_audio_only(&self) -> bool {
        self.mime_type
            .as_deref()
            .is_some_and(|mime| mime.trim_start().starts_with("audio/"))
    }

    fn container_in(&self, containers: &[String]) -> bool {
        self.container
            .as_deref()
            .is_some_and(|c| containers.iter().any(|want| want.eq_ignore_ascii_case(c)))
    }
}

/// Ranking policy used to pick one format out of a detail response.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum FormatPreference {
    /// Audio-only or listed tags, ordered by list position. Unlisted entries
    /// sink to the end and otherwise keep their original order.
    Tags(Vec<String>),
    /// Entries whose container is in the set, highest bitrate first.
    Containers(Vec<String>),
}

impl Default for FormatPreference {
    fn default() -> Self {
        Self::Tags(DEFAULT_TAG_PREFERENCE.iter().map(|t| t.to_string()).collect())
    }
}

impl FormatPreference {
    /// Parses `140,251,...` into tag mode or `container:m4a,webm` into
    /// container mode.
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        let trimmed = raw.trim();
        let (containers, list) = match trimmed.strip_prefix("container:") {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };
        let items = list
            .split(',')
            .map(|item| item.trim().to_ascii_lowercase())
            .filter(|item| !item.is_empty())
            .collect::<Vec<_>>();
        if items.is_empty() {
            return Err(AppError::internal(format!(
                "invalid format preference {raw:?}; expected a comma-separated tag list or container:<list>"
            )));
        }
        Ok(if containers {
            Self::Containers(items)
        } else {
            Self::Tags(items)
        })
    }

    /// Picks the best format, or `None` when nothing passes the filter.
    pub fn select(&self, formats: &[FormatDescriptor]) -> Option<FormatDescriptor> {
        let mut candidates = match self {
            Self::Tags(tags) => formats
                .iter()
                .filter(|f| f.is_audio_only() || tag_rank(tags, f).is_some())
                .collect::<Vec<_>>(),
            Self::Containers(containers) => formats
                .iter()
                .filter(|f| f.container_in(containers))
                .collect::<Vec<_>>(),
        };

        // sort_by_key is stable, so ties keep first-seen order.
        match self {
            Self::Tags(tags) => {
                candidates.sort_by_key(|f| tag_rank(tags, f).unwrap_or(usize::MAX));
            }
            Self::Containers(_) => {
                candidates.sort_by_key(|f| std::cmp::Reverse(f.bitrate.unwrap_or(0)));
            }
        }

        candidates
            .into_iter()
            .find(|f| !f.url.trim().is_empty())
            .cloned()
    }
}

fn tag_rank(tags: &[String], format: &FormatDescriptor) -> Option<usize> {
    let tag = format.tag.as_deref()?;
    tags.iter().position(|t| t == tag)
}

impl fmt::Display for FormatPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tags(tags) => write!(f, "{}", tags.join(",")),
            Self::Containers(containers) => write!(f, "container:{}", containers.join(",")),
        }
    }
}
