pub mod findings;
pub mod page;

pub use findings::{
    AccessibilityEngine, AccessibilityFacts, HeadingCounts, ImageCounts, LeadFacts, MobileFacts,
    PerformanceFacts, SeoFacts, TouchTargets, Violation,
};
pub use page::{NarrativeSource, PageEntry, PageError, PageResult, Scores};
