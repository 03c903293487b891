use crate::error::{Error, Result};

pub const DEFAULT_MAX_SUBSCRIBERS: i64 = 1_000_000;
pub const DEFAULT_MIN_RATIO: f64 = 1.2;
pub const DEFAULT_TOP_K: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct VideoCandidate {
    pub title: String,
    pub url: String,
    pub channel_name: String,
    pub view_count: i64,
    pub subscriber_count: i64,
}

impl VideoCandidate {
    /// Views per subscriber; `None` for channels without subscribers.
    pub fn ratio(&self) -> Option<f64> {
        if self.subscriber_count == 0 {
            None
        } else {
            Some(self.view_count as f64 / self.subscriber_count as f64)
        }
    }

    fn validate(&self) -> Result<()> {
        if self.view_count < 0 {
            return Err(Error::InvalidCandidate {
                title: self.title.clone(),
                reason: format!("negative view count {}", self.view_count),
            });
        }
        if self.subscriber_count < 0 {
            return Err(Error::InvalidCandidate {
                title: self.title.clone(),
                reason: format!("negative subscriber count {}", self.subscriber_count),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RankedVideo {
    pub candidate: VideoCandidate,
    pub ratio: f64,
}

/// Cut-offs for "boosted but not yet mainstream" videos.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendThresholds {
    /// Channels at or above this size are excluded.
    pub max_subscribers: i64,
    /// Ratio must be strictly above this.
    pub min_ratio: f64,
}

impl Default for TrendThresholds {
    fn default() -> Self {
        Self {
            max_subscribers: DEFAULT_MAX_SUBSCRIBERS,
            min_ratio: DEFAULT_MIN_RATIO,
        }
    }
}

/// Filters `candidates` against `thresholds` and returns at most `top_k`,
/// highest ratio first. Ties keep discovery order.
pub fn rank(
    candidates: &[VideoCandidate],
    top_k: usize,
    thresholds: &TrendThresholds,
) -> Result<Vec<RankedVideo>> {
    for candidate in candidates {
        candidate.validate()?;
    }

    let mut ranked: Vec<RankedVideo> = candidates
        .iter()
        .filter(|c| c.subscriber_count > 0 && c.subscriber_count < thresholds.max_subscribers)
        .filter_map(|c| {
            c.ratio().map(|ratio| RankedVideo {
                candidate: c.clone(),
                ratio,
            })
        })
        .filter(|r| r.ratio > thresholds.min_ratio)
        .collect();

    // sort_by is stable
    ranked.sort_by(|a, b| b.ratio.total_cmp(&a.ratio));
    ranked.truncate(top_k);

    Ok(ranked)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(title: &str, views: i64, subs: i64) -> VideoCandidate {
        VideoCandidate {
            title: title.to_string(),
            url: format!("https://www.youtube.com/watch?v={title}"),
            channel_name: format!("{title}-channel"),
            view_count: views,
            subscriber_count: subs,
        }
    }

    #[test]
    fn keeps_only_boosted_small_channels() {
        let candidates = vec![
            candidate("a", 1000, 500),
            candidate("b", 100, 1_000_000),
            candidate("c", 300, 300),
        ];

        let ranked = rank(&candidates, 3, &TrendThresholds::default()).unwrap();

        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].candidate.title, "a");
        assert!((ranked[0].ratio - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn zero_subscribers_are_excluded() {
        let candidates = vec![candidate("ghost", 9_999_999, 0)];
        let ranked = rank(&candidates, 3, &TrendThresholds::default()).unwrap();
        assert!(ranked.is_empty());
        assert_eq!(candidates[0].ratio(), None);
    }

    #[test]
    fn ratio_exactly_at_cutoff_is_excluded() {
        let candidates = vec![candidate("edge", 120, 100)];
        let thresholds = TrendThresholds {
            max_subscribers: 1_000_000,
            min_ratio: 1.2,
        };
        assert!(rank(&candidates, 3, &thresholds).unwrap().is_empty());
    }

    #[test]
    fn sorted_descending_and_truncated() {
        let candidates: Vec<VideoCandidate> = (1..=10)
            .map(|i| candidate(&format!("v{i}"), 100 * i, 50))
            .collect();

        let ranked = rank(&candidates, 3, &TrendThresholds::default()).unwrap();

        assert_eq!(ranked.len(), 3);
        assert!(ranked.windows(2).all(|w| w[0].ratio >= w[1].ratio));
        let titles: Vec<&str> = ranked.iter().map(|r| r.candidate.title.as_str()).collect();
        assert_eq!(titles, vec!["v10", "v9", "v8"]);
    }

    #[test]
    fn ties_keep_discovery_order() {
        let candidates = vec![
            candidate("first", 400, 100),
            candidate("second", 800, 200),
            candidate("third", 200, 50),
        ];
        let ranked = rank(&candidates, 3, &TrendThresholds::default()).unwrap();
        let titles: Vec<&str> = ranked.iter().map(|r| r.candidate.title.as_str()).collect();
        assert_eq!(titles, vec!["first", "second", "third"]);
    }

    #[test]
    fn thresholds_are_configurable() {
        let candidates = vec![candidate("big", 3_000_000, 2_000_000)];
        let loose = TrendThresholds {
            max_subscribers: 10_000_000,
            min_ratio: 1.0,
        };
        assert_eq!(rank(&candidates, 3, &loose).unwrap().len(), 1);
        assert!(rank(&candidates, 3, &TrendThresholds::default()).unwrap().is_empty());
    }

    #[test]
    fn negative_counts_are_rejected() {
        let candidates = vec![candidate("ok", 10, 5), candidate("broken", -1, 5)];
        let err = rank(&candidates, 3, &TrendThresholds::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidCandidate { ref title, .. } if title == "broken"));
    }

    #[test]
    fn top_k_zero_returns_nothing() {
        let candidates = vec![candidate("a", 1000, 500)];
        assert!(rank(&candidates, 0, &TrendThresholds::default()).unwrap().is_empty());
    }
}
