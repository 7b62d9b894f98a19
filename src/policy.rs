//! Capture policy: a pure function of config and local state, kept
//! side-effect-free so it can be property-tested directly (spec.md §9).

use crate::wire;
use crate::{CaptureMode, PlayerState};

/// Whether a captured frame should be transmitted this tick.
pub fn should_transmit(mode: CaptureMode, state: &PlayerState) -> bool {
    match mode {
        CaptureMode::PttOnly => state.ptt_down,
        CaptureMode::AlwaysOn => {
            if state.radio_enabled {
                state.ptt_down
            } else {
                true
            }
        }
    }
}

/// Builds the routing flags byte for a transmitted VOICE packet.
pub fn build_flags(state: &PlayerState) -> u8 {
    wire::flags_make(state.radio_enabled, state.radio_channel, state.ptt_down)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(ptt: bool, radio: bool, channel: u8) -> PlayerState {
        PlayerState {
            position: crate::Vec3 { x: 0.0, y: 0.0, z: 0.0 },
            forward: crate::Vec3 { x: 0.0, y: 0.0, z: 1.0 },
            ptt_down: ptt,
            radio_enabled: radio,
            radio_channel: channel,
        }
    }

    #[test]
    fn ptt_only_gates_on_ptt() {
        assert!(!should_transmit(CaptureMode::PttOnly, &state(false, false, 0)));
        assert!(should_transmit(CaptureMode::PttOnly, &state(true, false, 0)));
        assert!(should_transmit(CaptureMode::PttOnly, &state(true, true, 0)));
    }

    #[test]
    fn always_on_transmits_proximity_unconditionally() {
        assert!(should_transmit(CaptureMode::AlwaysOn, &state(false, false, 0)));
        assert!(should_transmit(CaptureMode::AlwaysOn, &state(true, false, 0)));
    }

    #[test]
    fn always_on_radio_still_requires_ptt() {
        assert!(!should_transmit(CaptureMode::AlwaysOn, &state(false, true, 0)));
        assert!(should_transmit(CaptureMode::AlwaysOn, &state(true, true, 0)));
    }

    #[test]
    fn idempotent_for_repeated_identical_state() {
        let s = state(true, true, 7);
        let a = should_transmit(CaptureMode::AlwaysOn, &s);
        let b = should_transmit(CaptureMode::AlwaysOn, &s);
        assert_eq!(a, b);
    }

    #[test]
    fn radio_transport_flags_example() {
        // radio_enabled=1, channel=7, ptt down => 0x01 | (7<<1) | 0x20 = 0x2F
        let s = state(true, true, 7);
        assert_eq!(build_flags(&s), 0x2F);
    }
}
