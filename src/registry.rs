use crate::config::PipelineConfig;
use crate::error::IngestError;
use crate::identity::AdapterResult;

/// Raw bytes plus a filename hint, as handed to `supports`/`parse`. Adapters
/// never touch the filesystem directly beyond what the driver gives them
/// here, which keeps `supports` cheap and side-effect-free.
pub struct AdapterInput<'a> {
    pub file_name: &'a str,
    pub bytes: &'a [u8],
}

impl<'a> AdapterInput<'a> {
    pub fn as_str(&self) -> Option<&'a str> {
        std::str::from_utf8(self.bytes).ok()
    }

    pub fn extension(&self) -> Option<&str> {
        self.file_name.rsplit('.').next()
    }
}

/// Capability set implemented by each of the six source adapters. There is
/// no shared base-class state — an adapter is any value implementing this
/// trait.
pub trait SourceAdapter {
    fn source_type(&self) -> &'static str;

    /// Cheap, side-effect-free shape check. Must never panic or raise on
    /// unreadable/malformed input — return false instead.
    fn supports(&self, input: &AdapterInput) -> bool;

    /// Parse a claimed input. May fail with any `IngestError` variant; the
    /// caller treats that as a skip for this one file.
    fn parse(&self, input: &AdapterInput, config: &PipelineConfig) -> Result<AdapterResult, IngestError>;
}

/// Fixed, ordered dispatch table. The first adapter whose `supports` agrees
/// wins; there is no fallback to a later adapter on parse failure.
pub struct AdapterRegistry {
    adapters: Vec<Box<dyn SourceAdapter>>,
}

impl AdapterRegistry {
    pub fn new(adapters: Vec<Box<dyn SourceAdapter>>) -> Self {
        Self { adapters }
    }

    pub fn dispatch(
        &self,
        input: &AdapterInput,
        config: &PipelineConfig,
    ) -> Option<Result<AdapterResult, IngestError>> {
        for adapter in &self.adapters {
            if adapter.supports(input) {
                return Some(adapter.parse(input, config));
            }
        }
        None
    }
}
