mod present;
mod result;

pub use present::{present, ConfidenceTier, DisplayModel, TreatmentLine, ECO_FRIENDLY_BADGE};
pub use result::{rejection_message, DiagnosisResult, Treatment, MALFORMED_DIAGNOSIS_MESSAGE};
