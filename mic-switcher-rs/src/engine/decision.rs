//! Headset selection rules.
//!
//! Pure functions over the configured headset order and their live mute
//! states; no I/O.

/// What the engine should do after a mute/volume notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// The active headset was muted: forget it and fall back to the stand mic.
    Deactivate { headset: String },

    /// A headset other than the active one is unmuted: select it.
    Activate { headset: String },

    /// No transition relevant to the active headset.
    NoChange,
}

/// First unmuted headset in configured order.
///
/// `live` yields `(device_id, is_muted)` for every headset that resolved,
/// in configured order; absent devices are simply not yielded.
pub fn initial_headset<'a, I>(live: I) -> Option<&'a str>
where
    I: IntoIterator<Item = (&'a str, bool)>,
{
    live.into_iter()
        .find(|(_, is_muted)| !is_muted)
        .map(|(id, _)| id)
}

/// Scan headsets in configured order; the first one that matches either
/// rule wins.
///
/// - muted and equal to `active`: [`Decision::Deactivate`]
/// - unmuted and different from `active`: [`Decision::Activate`]
pub fn decide<'a, I>(live: I, active: Option<&str>) -> Decision
where
    I: IntoIterator<Item = (&'a str, bool)>,
{
    for (id, is_muted) in live {
        let is_active = active == Some(id);
        if is_muted && is_active {
            return Decision::Deactivate {
                headset: id.to_string(),
            };
        }
        if !is_muted && !is_active {
            return Decision::Activate {
                headset: id.to_string(),
            };
        }
    }
    Decision::NoChange
}
