//! CMS detection for company homepages
//!
//! Every record with a homepage gets up to three best-effort probes whose
//! bodies are matched against platform markers. Probe failures become an
//! explicit [`CmsStatus::ProbeError`](crate::record::CmsStatus), never an error.

mod probe;

pub use probe::{classify, probe_urls, CmsProbe, ProbeBody};
