pub mod skin_analysis;

pub use skin_analysis::{AnalysisResult, SkinAnalyzer, SkinIssue, SkinProfile, SkinType};
