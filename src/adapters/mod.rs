//! Source Adapters (C2): one module per clinical data family. Each exposes a
//! type implementing `crate::registry::SourceAdapter`.

pub mod ambulance_ems;
pub mod handwritten_notes;
pub mod hospital_ehr;
pub mod realtime_vitals;
pub mod scans_labs;
pub mod wearable;
