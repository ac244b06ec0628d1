//! Interfaces implemented by the platform layer.
//!
//! The interpreter never draws or plays sound itself. It exposes a frame
//! buffer and a "should be beeping" level; hosts plug in sinks that turn
//! those into pixels and audio.
use crate::display::Frame;

pub trait DisplaySink {
    fn present(&mut self, frame: &Frame);
}

pub trait AudioSink {
    /// Called only when the beep level changes.
    fn set_beeping(&mut self, beeping: bool);
}

/// Edge detector for the beep level, so sinks only see transitions.
#[derive(Debug, Default, Clone, Copy)]
pub struct BeepEdge {
    level: bool,
}

impl BeepEdge {
    /// Feed the current level; returns the new level on a transition.
    pub fn update(&mut self, level: bool) -> Option<bool> {
        if level == self.level {
            return None;
        }
        self.level = level;
        Some(level)
    }

    /// Forward a transition, if any, to `sink`.
    pub fn drive(&mut self, level: bool, sink: &mut impl AudioSink) {
        if let Some(level) = self.update(level) {
            sink.set_beeping(level);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder(Vec<bool>);

    impl AudioSink for Recorder {
        fn set_beeping(&mut self, beeping: bool) {
            self.0.push(beeping);
        }
    }

    #[test]
    fn only_transitions_reach_the_sink() {
        let mut edge = BeepEdge::default();
        let mut sink = Recorder::default();
        for level in [false, true, true, true, false, false, true] {
            edge.drive(level, &mut sink);
        }
        assert_eq!(sink.0, vec![true, false, true]);
    }
}
