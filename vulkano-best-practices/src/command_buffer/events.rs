/// How a command buffer changes the state of an event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EventSignalingState {
    /// Whether the first command in the command buffer that changed the event signaled it.
    pub first_state_change_is_signal: bool,
    /// Whether the event is signaled after the commands recorded so far.
    pub signaled: bool,
}

impl EventSignalingState {
    #[inline]
    pub(crate) fn new(signaled: bool) -> Self {
        EventSignalingState {
            first_state_change_is_signal: signaled,
            signaled,
        }
    }
}
