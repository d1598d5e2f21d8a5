//! Types exposed to JavaScript via wasm-bindgen.

use marginalia_browser::RestoreReport;
use serde::{Deserialize, Serialize};
use tsify_next::Tsify;

/// Outcome of one restore pass.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(rename_all = "camelCase")]
pub struct RestoreSummary {
    pub anchored: usize,
    /// Anchored on a single word rather than the full quotation.
    pub fuzzy: usize,
    /// Saved annotations with no highlight after this pass.
    pub missing: usize,
}

impl From<RestoreReport> for RestoreSummary {
    fn from(report: RestoreReport) -> Self {
        Self {
            anchored: report.anchored,
            fuzzy: report.fuzzy,
            missing: report.missing(),
        }
    }
}
