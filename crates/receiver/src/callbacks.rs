use crate::message::FrameHeader;

/// Invoked synchronously when a `Started` message opens a new frame, before
/// any of its buffers are merged.
pub trait FrameStartedCallback: Send + Sync {
    fn frame_started(&self, header: &FrameHeader);
}

impl<F> FrameStartedCallback for F
where
    F: Fn(&FrameHeader) + Send + Sync,
{
    fn frame_started(&self, header: &FrameHeader) {
        self(header)
    }
}

/// Receives human readable status lines.
pub trait MessageSink {
    fn message(&self, line: &str);
}

impl<F> MessageSink for F
where
    F: Fn(&str),
{
    fn message(&self, line: &str) {
        self(line)
    }
}

/// Callback for callers that do not care about frame starts.
pub fn no_frame_started(_: &FrameHeader) {}
