use std::fmt;
use std::str::FromStr;

use crate::error::OptionError;

/// Declarative inputs, named the way the host reflects them as attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OptionName {
    Src,
    UseCamera,
    IsLooping,
    PlaybackRate,
    Active,
    Mute,
    Autoplay,
    ManualStream,
    SolutionPath,
    HideVideo,
}

impl OptionName {
    pub const ALL: &[OptionName] = &[
        OptionName::Src,
        OptionName::UseCamera,
        OptionName::IsLooping,
        OptionName::PlaybackRate,
        OptionName::Active,
        OptionName::Mute,
        OptionName::Autoplay,
        OptionName::ManualStream,
        OptionName::SolutionPath,
        OptionName::HideVideo,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            OptionName::Src => "src",
            OptionName::UseCamera => "usecamera",
            OptionName::IsLooping => "islooping",
            OptionName::PlaybackRate => "playbackrate",
            OptionName::Active => "active",
            OptionName::Mute => "mute",
            OptionName::Autoplay => "autoplay",
            OptionName::ManualStream => "manualstream",
            OptionName::SolutionPath => "solutionpath",
            OptionName::HideVideo => "hidevideo",
        }
    }
}

impl fmt::Display for OptionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OptionName {
    type Err = OptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        OptionName::ALL
            .iter()
            .copied()
            .find(|name| name.as_str() == lowered)
            .ok_or_else(|| OptionError::Unknown(s.to_string()))
    }
}

/// What a successful `apply` touched, so the controller knows how to react.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionChange {
    /// Value identical to the current one (or irrelevant to runtime state).
    None,
    /// `src` or `usecamera`: the source intent must be reconciled.
    Source,
    Looping,
    PlaybackRate,
    Active,
    Muted,
    Hidden,
    Segmenter,
    Flag,
}

/// Source selection derived from `src`, `usecamera` and the manual-stream marker.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MediaSourceIntent {
    pub src: Option<String>,
    pub use_camera: bool,
    pub manual_stream: bool,
}

/// Validated, typed mirror of the declarative attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerOptions {
    pub src: Option<String>,
    pub use_camera: bool,
    pub manual_stream: bool,
    pub is_looping: bool,
    pub playback_rate: f64,
    pub active: bool,
    pub mute: bool,
    pub autoplay: bool,
    pub solution_path: Option<String>,
    pub hide_video: bool,
}

impl Default for PlayerOptions {
    fn default() -> Self {
        Self {
            src: None,
            use_camera: false,
            manual_stream: false,
            is_looping: false,
            playback_rate: 1.0,
            active: false,
            mute: false,
            autoplay: false,
            solution_path: None,
            hide_video: false,
        }
    }
}

impl PlayerOptions {
    /// Apply one attribute. `None` means the attribute is absent; presence
    /// flags are set by any `Some` value, including an empty string.
    pub fn apply(&mut self, name: OptionName, value: Option<&str>) -> Result<OptionChange, OptionError> {
        let present = value.is_some();
        let change = match name {
            OptionName::Src => {
                let src = value.map(str::to_string);
                if src == self.src {
                    OptionChange::None
                } else {
                    self.src = src;
                    OptionChange::Source
                }
            }
            // Always reconciled, even when unchanged
            OptionName::UseCamera => {
                self.use_camera = present;
                OptionChange::Source
            }
            OptionName::IsLooping => set_flag(&mut self.is_looping, present, OptionChange::Looping),
            OptionName::PlaybackRate => {
                let rate = match value {
                    Some(raw) => parse_rate(raw)?,
                    None => 1.0,
                };
                if rate == self.playback_rate {
                    OptionChange::None
                } else {
                    self.playback_rate = rate;
                    OptionChange::PlaybackRate
                }
            }
            OptionName::Active => set_flag(&mut self.active, present, OptionChange::Active),
            OptionName::Mute => set_flag(&mut self.mute, present, OptionChange::Muted),
            OptionName::Autoplay => set_flag(&mut self.autoplay, present, OptionChange::Flag),
            OptionName::ManualStream => {
                set_flag(&mut self.manual_stream, present, OptionChange::Flag)
            }
            OptionName::SolutionPath => {
                let path = value.map(str::to_string);
                if path == self.solution_path {
                    OptionChange::None
                } else {
                    self.solution_path = path;
                    OptionChange::Segmenter
                }
            }
            OptionName::HideVideo => set_flag(&mut self.hide_video, present, OptionChange::Hidden),
        };
        Ok(change)
    }

    /// Reflect an option back as the host would read the attribute.
    pub fn get(&self, name: OptionName) -> Option<String> {
        let flag = |on: bool| on.then(String::new);
        match name {
            OptionName::Src => self.src.clone(),
            OptionName::UseCamera => flag(self.use_camera),
            OptionName::IsLooping => flag(self.is_looping),
            OptionName::PlaybackRate => Some(self.playback_rate.to_string()),
            OptionName::Active => flag(self.active),
            OptionName::Mute => flag(self.mute),
            OptionName::Autoplay => flag(self.autoplay),
            OptionName::ManualStream => flag(self.manual_stream),
            OptionName::SolutionPath => self.solution_path.clone(),
            OptionName::HideVideo => flag(self.hide_video),
        }
    }

    pub fn intent(&self) -> MediaSourceIntent {
        MediaSourceIntent {
            src: self.src.clone(),
            use_camera: self.use_camera,
            manual_stream: self.manual_stream,
        }
    }

    /// Whether playback starts by itself once data is loaded.
    pub fn starts_automatically(&self) -> bool {
        self.autoplay || self.use_camera || self.manual_stream
    }
}

fn set_flag(flag: &mut bool, value: bool, change: OptionChange) -> OptionChange {
    if *flag == value {
        OptionChange::None
    } else {
        *flag = value;
        change
    }
}

fn parse_rate(raw: &str) -> Result<f64, OptionError> {
    match raw.trim().parse::<f64>() {
        Ok(rate) if rate.is_finite() && rate > 0.0 => Ok(rate),
        _ => Err(OptionError::InvalidPlaybackRate(raw.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_parse_case_insensitively() {
        assert_eq!("useCamera".parse::<OptionName>().unwrap(), OptionName::UseCamera);
        assert_eq!(" PLAYBACKRATE ".parse::<OptionName>().unwrap(), OptionName::PlaybackRate);
        for name in OptionName::ALL {
            assert_eq!(name.as_str().parse::<OptionName>().unwrap(), *name);
        }
        assert_eq!(
            "volume".parse::<OptionName>(),
            Err(OptionError::Unknown("volume".into()))
        );
    }

    #[test]
    fn presence_flags() {
        let mut opts = PlayerOptions::default();
        assert_eq!(opts.apply(OptionName::IsLooping, Some("")).unwrap(), OptionChange::Looping);
        assert!(opts.is_looping);
        assert_eq!(opts.apply(OptionName::IsLooping, Some("false")).unwrap(), OptionChange::None);
        assert!(opts.is_looping, "any present value sets the flag");
        assert_eq!(opts.apply(OptionName::IsLooping, None).unwrap(), OptionChange::Looping);
        assert!(!opts.is_looping);
    }

    #[test]
    fn src_change_only_when_different() {
        let mut opts = PlayerOptions::default();
        assert_eq!(opts.apply(OptionName::Src, Some("a.mp4")).unwrap(), OptionChange::Source);
        assert_eq!(opts.apply(OptionName::Src, Some("a.mp4")).unwrap(), OptionChange::None);
        assert_eq!(opts.apply(OptionName::Src, None).unwrap(), OptionChange::Source);
        assert_eq!(opts.src, None);
    }

    #[test]
    fn use_camera_always_requests_reconcile() {
        let mut opts = PlayerOptions::default();
        assert_eq!(opts.apply(OptionName::UseCamera, Some("")).unwrap(), OptionChange::Source);
        assert_eq!(opts.apply(OptionName::UseCamera, Some("")).unwrap(), OptionChange::Source);
        assert!(opts.use_camera);
    }

    #[test]
    fn playback_rate_is_validated() {
        let mut opts = PlayerOptions::default();
        assert_eq!(
            opts.apply(OptionName::PlaybackRate, Some("0.5")).unwrap(),
            OptionChange::PlaybackRate
        );
        assert_eq!(opts.playback_rate, 0.5);

        for bad in ["0", "-1", "fast", "NaN", "inf", ""] {
            assert_eq!(
                opts.apply(OptionName::PlaybackRate, Some(bad)),
                Err(OptionError::InvalidPlaybackRate(bad.to_string()))
            );
            assert_eq!(opts.playback_rate, 0.5, "rejected value must not stick");
        }

        opts.apply(OptionName::PlaybackRate, None).unwrap();
        assert_eq!(opts.playback_rate, 1.0);
    }

    #[test]
    fn get_reflects_values() {
        let mut opts = PlayerOptions::default();
        opts.apply(OptionName::Src, Some("clip.gif")).unwrap();
        opts.apply(OptionName::Mute, Some("")).unwrap();
        opts.apply(OptionName::PlaybackRate, Some("2")).unwrap();
        assert_eq!(opts.get(OptionName::Src).as_deref(), Some("clip.gif"));
        assert_eq!(opts.get(OptionName::Mute).as_deref(), Some(""));
        assert_eq!(opts.get(OptionName::Active), None);
        assert_eq!(opts.get(OptionName::PlaybackRate).as_deref(), Some("2"));
    }

    #[test]
    fn automatic_start_sources() {
        let mut opts = PlayerOptions::default();
        assert!(!opts.starts_automatically());
        opts.manual_stream = true;
        assert!(opts.starts_automatically());
        opts.manual_stream = false;
        opts.use_camera = true;
        assert!(opts.starts_automatically());
    }

    #[test]
    fn intent_mirrors_source_fields() {
        let mut opts = PlayerOptions::default();
        opts.apply(OptionName::Src, Some("x.png")).unwrap();
        opts.apply(OptionName::UseCamera, Some("")).unwrap();
        let intent = opts.intent();
        assert_eq!(intent.src.as_deref(), Some("x.png"));
        assert!(intent.use_camera);
        assert!(!intent.manual_stream);
    }
}
