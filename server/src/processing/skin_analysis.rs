use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::storage::{ImageStore, StorageError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SkinType {
    Normal,
    Oily,
    Dry,
    Combination,
    Sensitive,
}

impl SkinType {
    pub const ALL: [SkinType; 5] = [
        SkinType::Normal,
        SkinType::Oily,
        SkinType::Dry,
        SkinType::Combination,
        SkinType::Sensitive,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SkinIssue {
    Hyperpigmentation,
    #[serde(rename = "Fine Lines")]
    FineLines,
    Acne,
    #[serde(rename = "Dark Circles")]
    DarkCircles,
    Redness,
    #[serde(rename = "Uneven Texture")]
    UnevenTexture,
    #[serde(rename = "Large Pores")]
    LargePores,
    Dryness,
}

impl SkinIssue {
    pub const CATALOG: [SkinIssue; 8] = [
        SkinIssue::Hyperpigmentation,
        SkinIssue::FineLines,
        SkinIssue::Acne,
        SkinIssue::DarkCircles,
        SkinIssue::Redness,
        SkinIssue::UnevenTexture,
        SkinIssue::LargePores,
        SkinIssue::Dryness,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SkinIssue::Hyperpigmentation => "Hyperpigmentation",
            SkinIssue::FineLines => "Fine Lines",
            SkinIssue::Acne => "Acne",
            SkinIssue::DarkCircles => "Dark Circles",
            SkinIssue::Redness => "Redness",
            SkinIssue::UnevenTexture => "Uneven Texture",
            SkinIssue::LargePores => "Large Pores",
            SkinIssue::Dryness => "Dryness",
        }
    }

    pub fn recommendation(self) -> &'static str {
        match self {
            SkinIssue::Hyperpigmentation => "Use vitamin C serum for hyperpigmentation",
            SkinIssue::FineLines => "Apply retinol for fine lines",
            SkinIssue::Acne => "Consider salicylic acid for acne treatment",
            SkinIssue::DarkCircles => "Use caffeine-based eye cream for dark circles",
            SkinIssue::Redness => "Apply soothing niacinamide for redness",
            SkinIssue::UnevenTexture => "Use AHA/BHA exfoliant for texture improvement",
            SkinIssue::LargePores => "Try niacinamide to minimize pore appearance",
            SkinIssue::Dryness => "Apply hyaluronic acid serum for hydration",
        }
    }
}

/// The image-independent part of an analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct SkinProfile {
    pub skin_type: SkinType,
    pub issues: Vec<SkinIssue>,
    pub confidence: f64,
}

impl SkinProfile {
    pub fn recommendations(&self) -> Vec<String> {
        self.issues
            .iter()
            .map(|issue| issue.recommendation().to_string())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    pub image_id: String,
    pub skin_type: SkinType,
    pub issues: Vec<SkinIssue>,
    pub confidence: f64,
    pub recommendations: Vec<String>,
    pub analyzed_at: DateTime<Utc>,
}

/// Mock analysis keyed on pixel dimensions. Pure: the same size always
/// yields the same profile.
pub fn profile_for_dimensions(width: u32, height: u32) -> SkinProfile {
    let seed = u64::from(width) + u64::from(height);
    let digest = Sha256::digest(format!("{width}x{height}").as_bytes());

    let skin_type = SkinType::ALL[digest[0] as usize % SkinType::ALL.len()];

    // partial Fisher-Yates over the catalog, one digest byte per draw
    let count = 1 + (seed % 3) as usize;
    let mut pool = SkinIssue::CATALOG;
    let mut issues = Vec::with_capacity(count);
    for i in 0..count {
        let j = i + digest[1 + i] as usize % (pool.len() - i);
        pool.swap(i, j);
        issues.push(pool[i]);
    }
    issues.sort_by_key(|issue| issue.name());

    let confidence = (75 + seed % 20) as f64 / 100.0;

    SkinProfile {
        skin_type,
        issues,
        confidence,
    }
}

/// Used when the stored image header cannot be read.
pub fn fallback_profile() -> SkinProfile {
    SkinProfile {
        skin_type: SkinType::Combination,
        issues: vec![SkinIssue::Hyperpigmentation],
        confidence: 0.85,
    }
}

pub struct SkinAnalyzer {
    store: Arc<ImageStore>,
}

impl SkinAnalyzer {
    pub fn new(store: Arc<ImageStore>) -> Self {
        Self { store }
    }

    pub async fn analyze(
        &self,
        image_id: &str,
        analyzed_at: DateTime<Utc>,
    ) -> Result<AnalysisResult, StorageError> {
        let profile = match self.store.dimensions(image_id).await {
            Ok((width, height)) => {
                tracing::debug!("Analyzing {} at {}x{}", image_id, width, height);
                profile_for_dimensions(width, height)
            }
            Err(StorageError::Undecodable { id, source }) => {
                tracing::warn!(
                    "Unreadable image header for {}: {}, using fallback profile",
                    id,
                    source
                );
                fallback_profile()
            }
            Err(e) => return Err(e),
        };

        let recommendations = profile.recommendations();
        Ok(AnalysisResult {
            image_id: image_id.to_string(),
            skin_type: profile.skin_type,
            issues: profile.issues,
            confidence: profile.confidence,
            recommendations,
            analyzed_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_profiles() {
        let profile = profile_for_dimensions(100, 100);
        assert_eq!(profile.skin_type, SkinType::Dry);
        assert_eq!(
            profile.issues,
            vec![SkinIssue::Dryness, SkinIssue::FineLines, SkinIssue::Redness]
        );
        assert_eq!(profile.confidence, 0.75);

        let profile = profile_for_dimensions(640, 480);
        assert_eq!(profile.skin_type, SkinType::Oily);
        assert_eq!(profile.issues, vec![SkinIssue::DarkCircles, SkinIssue::FineLines]);

        // orientation matters even though the seed is symmetric
        let profile = profile_for_dimensions(480, 640);
        assert_eq!(profile.skin_type, SkinType::Sensitive);
        assert_eq!(profile.issues, vec![SkinIssue::Acne, SkinIssue::Redness]);

        assert_eq!(profile_for_dimensions(1, 1).confidence, 0.77);
    }

    #[test]
    fn test_profile_is_deterministic() {
        for (w, h) in [(1, 1), (100, 100), (1920, 1080), (u32::MAX, u32::MAX)] {
            assert_eq!(profile_for_dimensions(w, h), profile_for_dimensions(w, h));
        }
    }

    #[test]
    fn test_profile_bounds() {
        for width in (1..400).step_by(7) {
            for height in (1..400).step_by(11) {
                let profile = profile_for_dimensions(width, height);
                assert!((1..=3).contains(&profile.issues.len()));
                assert!(profile.confidence >= 0.75 && profile.confidence <= 0.95);

                let names: Vec<_> = profile.issues.iter().map(|i| i.name()).collect();
                let mut sorted = names.clone();
                sorted.sort();
                sorted.dedup();
                assert_eq!(names, sorted, "issues must be sorted and distinct");
            }
        }
    }

    #[test]
    fn test_recommendations_follow_issue_order() {
        let profile = profile_for_dimensions(100, 100);
        assert_eq!(
            profile.recommendations(),
            vec![
                "Apply hyaluronic acid serum for hydration",
                "Apply retinol for fine lines",
                "Apply soothing niacinamide for redness",
            ]
        );
    }

    #[test]
    fn test_issue_wire_names() {
        for issue in SkinIssue::CATALOG {
            let json = serde_json::to_value(issue).unwrap();
            assert_eq!(json, serde_json::Value::String(issue.name().to_string()));
        }
        assert_eq!(
            serde_json::to_value(SkinType::Combination).unwrap(),
            serde_json::json!("Combination")
        );
    }
}
