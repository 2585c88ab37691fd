use was_frame::FrameConfig;

/// Default cap on a request or response body held in memory.
pub const DEFAULT_MAX_BODY_SIZE: usize = 256 * 1024;

/// Configuration shared by [`SimpleClient`](crate::SimpleClient) and
/// [`SimpleServer`](crate::SimpleServer).
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Largest inbound body accepted. Default: 256 KiB.
    pub max_body_size: usize,
    /// Control channel limits.
    pub frame: FrameConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            frame: FrameConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Override the inbound body cap.
    pub fn with_max_body_size(mut self, max_body_size: usize) -> Self {
        self.max_body_size = max_body_size;
        self
    }

    /// Override the control channel limits.
    pub fn with_frame_config(mut self, frame: FrameConfig) -> Self {
        self.frame = frame;
        self
    }
}
