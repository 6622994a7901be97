// Marker video rotation: per-marker state, found/lost transitions, auto-advance and manual rotation.
// Every handler is a transition on the owned registry that returns the effects JS must apply.
// The only guard against stale deferred callbacks is the active-marker re-check in `on_video_ended`.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, info};

use crate::effects::{Control, Effect, EffectList};
use crate::error::EngineError;
use crate::media::{self, FlashControl, FlashState, QualityLevel, TorchReading};
use crate::types::*;

/// Playback status of a single video element, as last commanded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Playback {
    Playing,
    Paused,
}

/// A video entity owned by a marker, with its mirrored element state.
#[derive(Debug, Clone, Serialize)]
pub struct VideoSlot {
    source: VideoSource,
    visible: bool,
    playback: Playback,
    at_start: bool,
    muted: bool,
    ended_listener: bool,
}

impl VideoSlot {
    fn new(source: VideoSource, muted: bool) -> Self {
        VideoSlot {
            source,
            visible: false,
            playback: Playback::Paused,
            at_start: true,
            muted,
            ended_listener: false,
        }
    }

    pub fn source(&self) -> &VideoSource {
        &self.source
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn playback(&self) -> Playback {
        self.playback
    }

    pub fn is_paused(&self) -> bool {
        self.playback == Playback::Paused
    }

    /// True when the element sits at time 0.
    pub fn is_at_start(&self) -> bool {
        self.at_start
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn has_ended_listener(&self) -> bool {
        self.ended_listener
    }
}

/// Rotation state for one marker.
#[derive(Debug, Clone, Serialize)]
pub struct MarkerState {
    index: MarkerIndex,
    videos: Vec<VideoSlot>,
    current: VideoIndex,
    is_active: bool,
}

impl MarkerState {
    fn new(index: MarkerIndex, config: &MarkerConfig, muted: bool) -> Self {
        MarkerState {
            index,
            videos: config
                .videos
                .iter()
                .cloned()
                .map(|source| VideoSlot::new(source, muted))
                .collect(),
            current: VideoIndex::default(),
            is_active: false,
        }
    }

    pub fn index(&self) -> MarkerIndex {
        self.index
    }

    pub fn current_video(&self) -> VideoIndex {
        self.current
    }

    pub fn video_count(&self) -> usize {
        self.videos.len()
    }

    pub fn videos(&self) -> &[VideoSlot] {
        &self.videos
    }

    pub fn video(&self, video: VideoIndex) -> Option<&VideoSlot> {
        self.videos.get(video.as_usize())
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    fn rotates(&self) -> bool {
        self.videos.len() > 1
    }

    fn check_video(&self, video: VideoIndex) -> Result<(), EngineError> {
        if video.as_usize() < self.videos.len() {
            Ok(())
        } else {
            Err(EngineError::UnknownVideo {
                marker: self.index.as_u32(),
                video: video.as_u32(),
            })
        }
    }

    /// Show the current video, hide its siblings and start playback.
    fn play_current(&mut self) -> EffectList {
        let marker = self.index;
        let current = self.current;
        let rotates = self.rotates();
        let mut effects = EffectList::new();

        for (i, slot) in self.videos.iter_mut().enumerate() {
            let video = VideoIndex::new(i as u32);
            if video != current {
                slot.visible = false;
                effects.push(Effect::HideVideo { marker, video });
            }
        }

        let slot = &mut self.videos[current.as_usize()];
        slot.visible = true;
        effects.push(Effect::ShowVideo {
            marker,
            video: current,
        });

        // A single video loops and never needs an "ended" callback.
        if rotates && !slot.ended_listener {
            slot.ended_listener = true;
            effects.push(Effect::AttachEndedListener {
                marker,
                video: current,
            });
        }

        slot.playback = Playback::Playing;
        slot.at_start = false;
        effects.push(Effect::PlayVideo {
            marker,
            video: current,
            looping: !rotates,
        });

        effects
    }

    /// Pause and rewind one video, detaching its auto-advance callback.
    fn stop_video(&mut self, video: VideoIndex, effects: &mut EffectList) {
        let marker = self.index;
        let slot = &mut self.videos[video.as_usize()];

        slot.playback = Playback::Paused;
        slot.at_start = true;
        effects.push(Effect::PauseVideo { marker, video });
        effects.push(Effect::RewindVideo { marker, video });

        if slot.ended_listener {
            slot.ended_listener = false;
            effects.push(Effect::DetachEndedListener { marker, video });
        }
    }
}

/// Serializable view of the controller for the JS debug overlay.
#[derive(Debug, Serialize)]
pub struct ControllerSnapshot<'a> {
    pub active_marker: Option<MarkerIndex>,
    pub flash: FlashState,
    pub quality: QualityLevel,
    pub markers: Vec<&'a MarkerState>,
}

/// Owns every marker's rotation state plus the single active-marker slot.
#[derive(Debug, Clone)]
pub struct MarkerVideoController {
    markers: BTreeMap<MarkerIndex, MarkerState>,
    active: Option<MarkerIndex>,
    start_muted: bool,
    flash: FlashControl,
    quality: QualityLevel,
}

impl MarkerVideoController {
    /// Build the registry from a validated configuration.
    pub fn new(config: &SceneConfig) -> Result<Self, EngineError> {
        config.validate()?;

        let markers = config
            .markers
            .iter()
            .enumerate()
            .map(|(i, marker)| {
                let index = MarkerIndex::new(i as u32);
                (index, MarkerState::new(index, marker, config.start_muted))
            })
            .collect();

        Ok(MarkerVideoController {
            markers,
            active: None,
            start_muted: config.start_muted,
            flash: FlashControl::new(),
            quality: QualityLevel::default(),
        })
    }

    pub fn active_marker(&self) -> Option<MarkerIndex> {
        self.active
    }

    pub fn marker(&self, marker: MarkerIndex) -> Option<&MarkerState> {
        self.markers.get(&marker)
    }

    pub fn markers(&self) -> impl Iterator<Item = &MarkerState> {
        self.markers.values()
    }

    pub fn flash_state(&self) -> FlashState {
        self.flash.state()
    }

    pub fn quality(&self) -> QualityLevel {
        self.quality
    }

    pub fn snapshot(&self) -> ControllerSnapshot<'_> {
        ControllerSnapshot {
            active_marker: self.active,
            flash: self.flash.state(),
            quality: self.quality,
            markers: self.markers.values().collect(),
        }
    }

    fn marker_mut(&mut self, marker: MarkerIndex) -> Result<&mut MarkerState, EngineError> {
        self.markers
            .get_mut(&marker)
            .ok_or(EngineError::UnknownMarker(marker.as_u32()))
    }

    /// Initial UI once the AR scene has loaded: everything hidden, mute applied, labels set.
    pub fn on_scene_ready(&mut self) -> EffectList {
        let mut effects = EffectList::new();

        for state in self.markers.values_mut() {
            let marker = state.index;
            for (i, slot) in state.videos.iter_mut().enumerate() {
                let video = VideoIndex::new(i as u32);
                slot.visible = false;
                slot.muted = self.start_muted;
                effects.push(Effect::HideVideo { marker, video });
                effects.push(Effect::SetMuted {
                    marker,
                    video,
                    muted: self.start_muted,
                });
            }
        }

        effects.push(Effect::HideControl {
            control: Control::Rotate,
        });
        effects.push(Effect::SetControlLabel {
            control: Control::Audio,
            label: media::audio_label(self.start_muted).to_string(),
        });
        effects.extend(media::quality_effects(self.quality));
        effects.extend(self.flash.reset());

        info!(markers = self.markers.len(), "scene ready");
        effects
    }

    /// The tracker reports `marker` in view.
    pub fn on_marker_found(&mut self, marker: MarkerIndex) -> Result<EffectList, EngineError> {
        self.marker_mut(marker)?;

        // Superseded without a defensive reset; the tracker emits "lost" first.
        if let Some(previous) = self.active.filter(|&p| p != marker) {
            debug!(previous = previous.as_u32(), "active marker superseded");
            if let Some(state) = self.markers.get_mut(&previous) {
                state.is_active = false;
            }
        }

        self.active = Some(marker);
        let state = self.marker_mut(marker)?;
        state.is_active = true;
        info!(marker = marker.as_u32(), video = state.current.as_u32(), "marker found");

        let mut effects = EffectList::new();
        if state.rotates() {
            effects.push(Effect::ShowControl {
                control: Control::Rotate,
            });
        }
        effects.extend(state.play_current());
        Ok(effects)
    }

    /// The tracker lost `marker`. Resets regardless of whether it was the active one.
    pub fn on_marker_lost(&mut self, marker: MarkerIndex) -> Result<EffectList, EngineError> {
        self.marker_mut(marker)?;
        let mut effects = EffectList::new();

        if self.active == Some(marker) {
            self.active = None;
            effects.push(Effect::HideControl {
                control: Control::Rotate,
            });
        }

        let state = self.marker_mut(marker)?;
        state.is_active = false;

        for i in 0..state.videos.len() {
            state.stop_video(VideoIndex::new(i as u32), &mut effects);
        }
        for (i, slot) in state.videos.iter_mut().enumerate() {
            slot.visible = false;
            effects.push(Effect::HideVideo {
                marker,
                video: VideoIndex::new(i as u32),
            });
        }
        state.current = VideoIndex::default();

        info!(marker = marker.as_u32(), "marker lost");
        Ok(effects)
    }

    /// Show and play whatever video is current for `marker`.
    pub fn play_current(&mut self, marker: MarkerIndex) -> Result<EffectList, EngineError> {
        Ok(self.marker_mut(marker)?.play_current())
    }

    /// Natural end of playback for `video`. Advances only if `marker` is still the active one.
    pub fn on_video_ended(
        &mut self,
        marker: MarkerIndex,
        video: VideoIndex,
    ) -> Result<EffectList, EngineError> {
        let active = self.active;
        let state = self.marker_mut(marker)?;
        state.check_video(video)?;

        if active != Some(marker) {
            debug!(marker = marker.as_u32(), "ended callback for inactive marker ignored");
            return Ok(EffectList::new());
        }
        if !state.videos[video.as_usize()].ended_listener {
            debug!(
                marker = marker.as_u32(),
                video = video.as_u32(),
                "ended callback already detached"
            );
            return Ok(EffectList::new());
        }

        let mut effects = EffectList::new();
        let finished = state.current;
        state.current = finished.next(state.videos.len());
        state.stop_video(video, &mut effects);

        debug!(
            marker = marker.as_u32(),
            from = finished.as_u32(),
            to = state.current.as_u32(),
            "auto-advance"
        );
        effects.extend(state.play_current());
        Ok(effects)
    }

    /// The browser refused to start playback (autoplay policy). Recorded, never retried here.
    pub fn on_play_rejected(
        &mut self,
        marker: MarkerIndex,
        video: VideoIndex,
    ) -> Result<EffectList, EngineError> {
        let state = self.marker_mut(marker)?;
        state.check_video(video)?;
        state.videos[video.as_usize()].playback = Playback::Paused;
        debug!(
            marker = marker.as_u32(),
            video = video.as_u32(),
            "playback start rejected"
        );
        Ok(EffectList::new())
    }

    /// "Next video" button.
    pub fn rotate_manually(&mut self) -> EffectList {
        let marker = match self.active {
            Some(marker) => marker,
            None => {
                debug!("rotate without an active marker");
                return EffectList::new();
            }
        };
        let state = match self.markers.get_mut(&marker) {
            Some(state) if state.rotates() => state,
            _ => return EffectList::new(),
        };

        let mut effects = EffectList::new();
        let previous = state.current;
        state.stop_video(previous, &mut effects);
        state.current = previous.next(state.videos.len());

        debug!(
            marker = marker.as_u32(),
            from = previous.as_u32(),
            to = state.current.as_u32(),
            "manual rotate"
        );
        effects.extend(state.play_current());
        effects
    }

    pub fn toggle_flash(&mut self, reading: Option<TorchReading>) -> EffectList {
        self.flash.toggle(reading)
    }

    pub fn on_torch_applied(&mut self, success: bool) -> EffectList {
        self.flash.on_applied(success)
    }

    /// Flip mute on every video, using the first marker's first video as the global state.
    pub fn toggle_audio(&mut self) -> EffectList {
        let currently_muted = self
            .markers
            .values()
            .next()
            .and_then(|state| state.videos.first())
            .map(|slot| slot.muted)
            .unwrap_or(self.start_muted);
        let muted = !currently_muted;

        let mut effects = EffectList::new();
        for state in self.markers.values_mut() {
            let marker = state.index;
            let looping = !state.rotates();
            for (i, slot) in state.videos.iter_mut().enumerate() {
                let video = VideoIndex::new(i as u32);
                slot.muted = muted;
                effects.push(Effect::SetMuted {
                    marker,
                    video,
                    muted,
                });

                if !muted && slot.playback == Playback::Paused {
                    slot.playback = Playback::Playing;
                    slot.at_start = false;
                    effects.push(Effect::PlayVideo {
                        marker,
                        video,
                        looping,
                    });
                }
            }
        }

        effects.push(Effect::SetControlLabel {
            control: Control::Audio,
            label: media::audio_label(muted).to_string(),
        });
        info!(muted, "audio toggled");
        effects
    }

    /// Rendering hint only; marker state is untouched.
    pub fn set_quality(&mut self, level: QualityLevel) -> EffectList {
        self.quality = level;
        media::quality_effects(level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn config(video_counts: &[usize]) -> SceneConfig {
        SceneConfig {
            target_src: "targets.mind".to_string(),
            tracking: TrackingSettings::default(),
            start_muted: true,
            markers: video_counts
                .iter()
                .enumerate()
                .map(|(m, &count)| MarkerConfig {
                    name: None,
                    videos: (0..count)
                        .map(|v| VideoSource {
                            src: format!("m{}_v{}.mp4", m, v),
                            width: 1.0,
                            height: 0.5625,
                        })
                        .collect(),
                })
                .collect(),
        }
    }

    fn controller(video_counts: &[usize]) -> MarkerVideoController {
        MarkerVideoController::new(&config(video_counts)).unwrap()
    }

    fn m(i: u32) -> MarkerIndex {
        MarkerIndex::new(i)
    }

    fn v(i: u32) -> VideoIndex {
        VideoIndex::new(i)
    }

    fn end_current(ctl: &mut MarkerVideoController, marker: MarkerIndex) -> EffectList {
        let current = ctl.marker(marker).unwrap().current_video();
        ctl.on_video_ended(marker, current).unwrap()
    }

    fn assert_reset(ctl: &MarkerVideoController, marker: MarkerIndex) {
        let state = ctl.marker(marker).unwrap();
        assert_eq!(state.current_video(), v(0));
        assert!(!state.is_active());
        for slot in state.videos() {
            assert!(slot.is_paused());
            assert!(slot.is_at_start());
            assert!(!slot.is_visible());
            assert!(!slot.has_ended_listener());
        }
    }

    #[test]
    fn found_plays_current_video() {
        let mut ctl = controller(&[3]);
        let effects = ctl.on_marker_found(m(0)).unwrap();

        assert_eq!(ctl.active_marker(), Some(m(0)));
        assert!(effects.contains(&Effect::ShowControl {
            control: Control::Rotate
        }));
        assert!(effects.contains(&Effect::PlayVideo {
            marker: m(0),
            video: v(0),
            looping: false,
        }));
        assert!(effects.contains(&Effect::AttachEndedListener {
            marker: m(0),
            video: v(0),
        }));

        let state = ctl.marker(m(0)).unwrap();
        assert!(state.is_active());
        assert!(state.video(v(0)).unwrap().is_visible());
        assert!(!state.video(v(1)).unwrap().is_visible());
    }

    #[test]
    fn single_video_loops_without_listener() {
        let mut ctl = controller(&[1]);
        let effects = ctl.on_marker_found(m(0)).unwrap();

        assert!(!effects.contains(&Effect::ShowControl {
            control: Control::Rotate
        }));
        assert!(effects.contains(&Effect::PlayVideo {
            marker: m(0),
            video: v(0),
            looping: true,
        }));
        assert!(!effects
            .iter()
            .any(|e| matches!(e, Effect::AttachEndedListener { .. })));
    }

    #[test]
    fn rotation_walkthrough() {
        let mut ctl = controller(&[3]);
        ctl.on_marker_found(m(0)).unwrap();

        let effects = end_current(&mut ctl, m(0));
        assert_eq!(ctl.marker(m(0)).unwrap().current_video(), v(1));
        assert!(effects.contains(&Effect::RewindVideo {
            marker: m(0),
            video: v(0),
        }));
        assert!(ctl.marker(m(0)).unwrap().video(v(1)).unwrap().is_visible());

        let effects = ctl.rotate_manually();
        assert_eq!(ctl.marker(m(0)).unwrap().current_video(), v(2));
        assert!(effects.contains(&Effect::DetachEndedListener {
            marker: m(0),
            video: v(1),
        }));

        ctl.on_marker_lost(m(0)).unwrap();
        assert_eq!(ctl.active_marker(), None);
        assert_reset(&ctl, m(0));
    }

    #[test]
    fn stale_ended_after_lost_is_ignored() {
        let mut ctl = controller(&[3]);
        ctl.on_marker_found(m(0)).unwrap();
        ctl.on_marker_lost(m(0)).unwrap();

        let effects = ctl.on_video_ended(m(0), v(0)).unwrap();
        assert!(effects.is_empty());
        assert_eq!(ctl.marker(m(0)).unwrap().current_video(), v(0));
    }

    #[test]
    fn stale_ended_after_manual_rotate_is_ignored() {
        let mut ctl = controller(&[3]);
        ctl.on_marker_found(m(0)).unwrap();
        ctl.rotate_manually();

        // Video 0 finished just as the user pressed "next".
        let effects = ctl.on_video_ended(m(0), v(0)).unwrap();
        assert!(effects.is_empty());
        assert_eq!(ctl.marker(m(0)).unwrap().current_video(), v(1));
    }

    #[test]
    fn ended_for_superseded_marker_is_ignored() {
        let mut ctl = controller(&[2, 2]);
        ctl.on_marker_found(m(0)).unwrap();
        ctl.on_marker_found(m(1)).unwrap();

        assert!(!ctl.marker(m(0)).unwrap().is_active());
        let effects = ctl.on_video_ended(m(0), v(0)).unwrap();
        assert!(effects.is_empty());
        assert_eq!(ctl.marker(m(0)).unwrap().current_video(), v(0));
    }

    #[test]
    fn lost_resets_inactive_marker() {
        let mut ctl = controller(&[3, 2]);
        ctl.on_marker_found(m(0)).unwrap();
        end_current(&mut ctl, m(0));
        ctl.on_marker_found(m(1)).unwrap();

        // Marker 0 was superseded, never lost; its reset must not depend on being active.
        let effects = ctl.on_marker_lost(m(0)).unwrap();
        assert_reset(&ctl, m(0));
        assert_eq!(ctl.active_marker(), Some(m(1)));
        assert!(!effects.contains(&Effect::HideControl {
            control: Control::Rotate
        }));
    }

    #[test]
    fn rotate_is_noop_without_active_marker() {
        let mut ctl = controller(&[3]);
        assert!(ctl.rotate_manually().is_empty());
        assert_eq!(ctl.marker(m(0)).unwrap().current_video(), v(0));
    }

    #[test]
    fn rotate_is_noop_for_single_video() {
        let mut ctl = controller(&[1]);
        ctl.on_marker_found(m(0)).unwrap();
        assert!(ctl.rotate_manually().is_empty());
        assert_eq!(ctl.marker(m(0)).unwrap().current_video(), v(0));
    }

    #[test]
    fn unknown_indices_are_errors() {
        let mut ctl = controller(&[2]);
        assert!(matches!(
            ctl.on_marker_found(m(4)),
            Err(EngineError::UnknownMarker(4))
        ));
        assert!(matches!(
            ctl.on_video_ended(m(0), v(9)),
            Err(EngineError::UnknownVideo { marker: 0, video: 9 })
        ));
        assert_eq!(ctl.active_marker(), None);
    }

    #[test]
    fn toggle_audio_unmutes_and_resumes_paused() {
        let mut ctl = controller(&[2, 1]);
        ctl.on_scene_ready();
        ctl.on_marker_found(m(0)).unwrap();

        let effects = ctl.toggle_audio();
        for state in ctl.markers() {
            for slot in state.videos() {
                assert!(!slot.is_muted());
                assert!(!slot.is_paused());
            }
        }
        // Video 0 of marker 0 was already playing; only the paused ones get a play command.
        let plays = effects
            .iter()
            .filter(|e| matches!(e, Effect::PlayVideo { .. }))
            .count();
        assert_eq!(plays, 2);
        assert!(effects.contains(&Effect::SetControlLabel {
            control: Control::Audio,
            label: "Sound: ON".to_string(),
        }));

        ctl.toggle_audio();
        assert!(ctl.markers().all(|s| s.videos().iter().all(|v| v.is_muted())));
    }

    #[test]
    fn play_rejection_is_swallowed() {
        let mut ctl = controller(&[2]);
        ctl.on_marker_found(m(0)).unwrap();
        let effects = ctl.on_play_rejected(m(0), v(0)).unwrap();

        assert!(effects.is_empty());
        assert_eq!(ctl.active_marker(), Some(m(0)));
        assert!(ctl.marker(m(0)).unwrap().video(v(0)).unwrap().is_paused());
    }

    #[test]
    fn quality_does_not_touch_markers() {
        let mut ctl = controller(&[3]);
        ctl.on_marker_found(m(0)).unwrap();
        let effects = ctl.set_quality(QualityLevel::Low);

        assert_eq!(effects.effects[0], Effect::SetAntialias { enabled: false });
        assert_eq!(ctl.quality(), QualityLevel::Low);
        assert_eq!(ctl.active_marker(), Some(m(0)));
        assert_eq!(ctl.marker(m(0)).unwrap().current_video(), v(0));
    }

    #[test]
    fn scene_ready_hides_everything() {
        let mut ctl = controller(&[2, 3]);
        let effects = ctl.on_scene_ready();
        let hides = effects
            .iter()
            .filter(|e| matches!(e, Effect::HideVideo { .. }))
            .count();
        assert_eq!(hides, 5);
        assert!(effects.contains(&Effect::SetControlLabel {
            control: Control::Audio,
            label: "Sound: OFF".to_string(),
        }));
    }

    #[test]
    fn snapshot_serializes() {
        let mut ctl = controller(&[2]);
        ctl.on_marker_found(m(0)).unwrap();
        let json = serde_json::to_string(&ctl.snapshot()).unwrap();
        assert!(json.contains(r#""active_marker":0"#));
        assert!(json.contains(r#""current":0"#));
    }

    // =========================================================================
    // Property-Based Tests
    // =========================================================================

    mod property_tests {
        use super::*;

        #[derive(Debug, Clone)]
        enum Event {
            Found(u32),
            Lost(u32),
            Ended(u32, u32),
            Rotate,
            Audio,
            Rejected(u32, u32),
        }

        fn video_counts_strategy() -> impl Strategy<Value = Vec<usize>> {
            prop::collection::vec(1usize..=4, 1..=3)
        }

        fn event_strategy() -> impl Strategy<Value = Event> {
            prop_oneof![
                (0u32..3).prop_map(Event::Found),
                (0u32..3).prop_map(Event::Lost),
                (0u32..3, 0u32..4).prop_map(|(m, v)| Event::Ended(m, v)),
                Just(Event::Rotate),
                Just(Event::Audio),
                (0u32..3, 0u32..4).prop_map(|(m, v)| Event::Rejected(m, v)),
            ]
        }

        fn apply(ctl: &mut MarkerVideoController, event: &Event) {
            // Out-of-range indices are rejected with an error and must leave state alone.
            let _ = match *event {
                Event::Found(i) => ctl.on_marker_found(m(i)).map(|_| ()),
                Event::Lost(i) => ctl.on_marker_lost(m(i)).map(|_| ()),
                Event::Ended(i, j) => ctl.on_video_ended(m(i), v(j)).map(|_| ()),
                Event::Rotate => {
                    ctl.rotate_manually();
                    Ok(())
                }
                Event::Audio => {
                    ctl.toggle_audio();
                    Ok(())
                }
                Event::Rejected(i, j) => ctl.on_play_rejected(m(i), v(j)).map(|_| ()),
            };
        }

        fn check_invariants(ctl: &MarkerVideoController) -> Result<(), TestCaseError> {
            let active: Vec<_> = ctl.markers().filter(|s| s.is_active()).collect();
            prop_assert!(active.len() <= 1, "more than one active marker");
            prop_assert_eq!(active.first().map(|s| s.index()), ctl.active_marker());

            for state in ctl.markers() {
                let n = state.video_count();
                prop_assert!(state.current_video().as_usize() < n);

                let visible: Vec<_> = state
                    .videos()
                    .iter()
                    .enumerate()
                    .filter(|(_, slot)| slot.is_visible())
                    .map(|(i, _)| i)
                    .collect();
                prop_assert!(visible.len() <= 1, "marker {:?} shows {:?}", state.index(), visible);
                if state.is_active() {
                    prop_assert_eq!(visible, vec![state.current_video().as_usize()]);
                }

                for (i, slot) in state.videos().iter().enumerate() {
                    if slot.has_ended_listener() {
                        prop_assert!(n > 1, "single video got an ended listener");
                        prop_assert_eq!(i, state.current_video().as_usize());
                    }
                }
                if n == 1 {
                    prop_assert_eq!(state.current_video(), v(0));
                }
            }
            Ok(())
        }

        proptest! {
            /// Any interleaving of host events keeps the registry consistent.
            #[test]
            fn arbitrary_event_orders_keep_invariants(
                counts in video_counts_strategy(),
                events in prop::collection::vec(event_strategy(), 0..60)
            ) {
                let mut ctl = controller(&counts);
                for event in &events {
                    apply(&mut ctl, event);
                    check_invariants(&ctl)?;
                }
            }

            /// k natural completions while continuously active land on k mod n.
            #[test]
            fn completions_advance_modulo(n in 2usize..=6, k in 0usize..40) {
                let mut ctl = controller(&[n]);
                ctl.on_marker_found(m(0)).unwrap();
                for _ in 0..k {
                    end_current(&mut ctl, m(0));
                }
                prop_assert_eq!(ctl.marker(m(0)).unwrap().current_video().as_usize(), k % n);
            }

            /// Manual rotation advances by exactly one and drops the old listener.
            #[test]
            fn manual_rotate_advances_by_one(n in 2usize..=6, k in 0usize..20) {
                let mut ctl = controller(&[n]);
                ctl.on_marker_found(m(0)).unwrap();
                for _ in 0..k {
                    end_current(&mut ctl, m(0));
                }
                let before = ctl.marker(m(0)).unwrap().current_video();
                let effects = ctl.rotate_manually();

                let state = ctl.marker(m(0)).unwrap();
                prop_assert_eq!(state.current_video().as_usize(), (before.as_usize() + 1) % n);
                prop_assert!(!state.video(before).unwrap().has_ended_listener());
                let detach = Effect::DetachEndedListener { marker: m(0), video: before };
                prop_assert!(effects.contains(&detach), "listener on {:?} not detached", before);
            }

            /// Lost always resets, whatever happened before.
            #[test]
            fn lost_always_resets(
                counts in video_counts_strategy(),
                events in prop::collection::vec(event_strategy(), 0..40),
                target in 0u32..3
            ) {
                let mut ctl = controller(&counts);
                for event in &events {
                    apply(&mut ctl, event);
                }
                if ctl.marker(m(target)).is_some() {
                    ctl.on_marker_lost(m(target)).unwrap();
                    assert_reset(&ctl, m(target));
                    prop_assert_ne!(ctl.active_marker(), Some(m(target)));
                }
            }

            /// Single-video markers never rotate, however many found/lost cycles.
            #[test]
            fn single_video_never_rotates(cycles in 1usize..20) {
                let mut ctl = controller(&[1]);
                for _ in 0..cycles {
                    let found = ctl.on_marker_found(m(0)).unwrap();
                    let attached = found.iter().any(|e| matches!(e, Effect::AttachEndedListener { .. }));
                    prop_assert!(!attached, "single video got an ended listener");
                    ctl.rotate_manually();
                    ctl.on_video_ended(m(0), v(0)).unwrap();
                    prop_assert_eq!(ctl.marker(m(0)).unwrap().current_video(), v(0));
                    ctl.on_marker_lost(m(0)).unwrap();
                }
            }
        }
    }
}
