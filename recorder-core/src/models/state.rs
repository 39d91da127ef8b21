/// Capture engine state machine.
///
/// State transitions:
/// ```text
/// uninitialized --init--> stopped --start--> started
///       ^                   |  ^                |
///       +------deinit-------+  +------stop------+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineState {
    #[default]
    Uninitialized,
    Stopped,
    Started,
}

impl EngineState {
    pub fn is_initialized(&self) -> bool {
        !matches!(self, Self::Uninitialized)
    }

    pub fn is_started(&self) -> bool {
        matches!(self, Self::Started)
    }
}
