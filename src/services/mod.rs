pub mod accessibility;
pub mod lead;
pub mod mobile;
pub mod narrative;
pub mod performance;
pub mod report_writer;
pub mod scoring;
pub mod seo;

pub use accessibility::{AccessibilityAnalyzer, AxeLoader};
pub use lead::analyze_lead;
pub use mobile::analyze_mobile;
pub use narrative::{Narrative, NarrativeInput, NarrativeService};
pub use performance::analyze_performance;
pub use report_writer::{HtmlReportWriter, ReportEmitter};
pub use scoring::calculate_scores;
pub use seo::extract_seo;
