use std::path::PathBuf;

/// Discrete commands delivered to the viewer core by the input layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Next,
    Previous,
    DeleteCurrent,
    JumpTo(Jump),
    ToggleInfo,
    ToggleScaling,
    ToggleShuffle,
    ToggleFullscreen,
    /// Auto-advance interval in seconds; `0` disables.
    SetAutoAdvance(u8),
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Jump {
    First,
    Last,
    Index(usize),
}

/// What the surrounding platform layer should do after the core handled an input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response {
    Unchanged,
    Redraw,
    Exit(ExitReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// The user asked to leave.
    Quit,
    /// Every slide was deleted or failed to decode.
    LibraryExhausted,
}

/// Decoded RGBA8 pixels ready for GPU upload.
#[derive(Debug, Clone)]
pub struct PreparedImageCpu {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}
