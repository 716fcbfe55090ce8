//! crates/classroom_core/src/presentation.rs
//!
//! Slide presentation navigation: keyboard, swipe and thumbnail input mapped
//! onto a clamped slide index, with per-slide viewed tracking.

use serde::{Deserialize, Serialize};

use crate::lesson::Slide;

/// Minimum horizontal travel, in pixels, for a touch gesture to count as a swipe.
pub const SWIPE_THRESHOLD_PX: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", content = "index", rename_all = "snake_case")]
pub enum NavCommand {
    Next,
    Previous,
    First,
    Last,
    GoTo(usize),
    ToggleFullscreen,
    ExitFullscreen,
    ToggleHelp,
}

/// Maps a browser `KeyboardEvent.key` value to a command.
pub fn command_for_key(key: &str) -> Option<NavCommand> {
    match key {
        "ArrowRight" | "ArrowDown" | "PageDown" | " " => Some(NavCommand::Next),
        "ArrowLeft" | "ArrowUp" | "PageUp" => Some(NavCommand::Previous),
        "Home" => Some(NavCommand::First),
        "End" => Some(NavCommand::Last),
        "f" | "F" => Some(NavCommand::ToggleFullscreen),
        "Escape" => Some(NavCommand::ExitFullscreen),
        "?" => Some(NavCommand::ToggleHelp),
        _ => None,
    }
}

/// Maps a horizontal swipe (end x minus start x) to a command.
pub fn command_for_swipe(delta_x: f64) -> Option<NavCommand> {
    if delta_x <= -SWIPE_THRESHOLD_PX {
        Some(NavCommand::Next)
    } else if delta_x >= SWIPE_THRESHOLD_PX {
        Some(NavCommand::Previous)
    } else {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NavState {
    pub index: usize,
    pub slide_count: usize,
    pub viewed_count: usize,
    pub fullscreen: bool,
    pub show_help: bool,
    /// True only for the transition that completed the presentation.
    pub completed_now: bool,
}

#[derive(Debug, Clone)]
pub struct SlideNavigator {
    slide_count: usize,
    index: usize,
    viewed: Vec<bool>,
    require_full_viewing: bool,
    fullscreen: bool,
    show_help: bool,
    completed: bool,
    completed_on_open: bool,
}

impl SlideNavigator {
    /// Opens on the first slide, which counts as viewed. A one-slide deck
    /// is complete as soon as it opens; see [`SlideNavigator::opening_state`].
    pub fn new(slide_count: usize, require_full_viewing: bool) -> Self {
        let mut navigator = Self {
            slide_count,
            index: 0,
            viewed: vec![false; slide_count],
            require_full_viewing,
            fullscreen: false,
            show_help: false,
            completed: false,
            completed_on_open: false,
        };
        navigator.completed_on_open = navigator.land(0);
        navigator
    }

    /// State right after opening. `completed_now` is set when the first
    /// landing already viewed every slide.
    pub fn opening_state(&self) -> NavState {
        self.state(self.completed_on_open)
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn slide_count(&self) -> usize {
        self.slide_count
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub fn viewed_count(&self) -> usize {
        self.viewed.iter().filter(|v| **v).count()
    }

    fn clamp(&self, index: usize) -> usize {
        index.min(self.slide_count.saturating_sub(1))
    }

    /// Moves to `index` and returns whether this landing completed the deck.
    fn land(&mut self, index: usize) -> bool {
        self.index = self.clamp(index);
        if let Some(seen) = self.viewed.get_mut(self.index) {
            *seen = true;
        }
        let all_viewed = self.slide_count > 0 && self.viewed.iter().all(|v| *v);
        if self.require_full_viewing && all_viewed && !self.completed {
            self.completed = true;
            return true;
        }
        false
    }

    pub fn apply(&mut self, command: NavCommand) -> NavState {
        let completed_now = match command {
            NavCommand::Next => self.land(self.index.saturating_add(1)),
            NavCommand::Previous => self.land(self.index.saturating_sub(1)),
            NavCommand::First => self.land(0),
            NavCommand::Last => self.land(self.slide_count.saturating_sub(1)),
            NavCommand::GoTo(index) => self.land(index),
            NavCommand::ToggleFullscreen => {
                self.fullscreen = !self.fullscreen;
                false
            }
            NavCommand::ExitFullscreen => {
                self.fullscreen = false;
                self.show_help = false;
                false
            }
            NavCommand::ToggleHelp => {
                self.show_help = !self.show_help;
                false
            }
        };
        self.state(completed_now)
    }

    pub fn state(&self, completed_now: bool) -> NavState {
        NavState {
            index: self.index,
            slide_count: self.slide_count,
            viewed_count: self.viewed_count(),
            fullscreen: self.fullscreen,
            show_help: self.show_help,
            completed_now,
        }
    }
}

/// Splits a plain-text slide export into slides. Slides are separated by
/// form-feed characters or by lines consisting of `---`. The first non-empty
/// line of each slide is its title.
pub fn split_slide_export(text: &str) -> Vec<Slide> {
    let normalized = text.replace("\r\n", "\n").replace('\u{c}', "\n---\n");
    let mut chunks: Vec<Vec<&str>> = vec![Vec::new()];
    for line in normalized.lines() {
        if line.trim() == "---" {
            chunks.push(Vec::new());
        } else if let Some(current) = chunks.last_mut() {
            current.push(line);
        }
    }

    chunks
        .into_iter()
        .filter_map(|lines| {
            let mut lines = lines.into_iter().skip_while(|l| l.trim().is_empty());
            let title = lines.next()?.trim().to_string();
            let body = lines.collect::<Vec<_>>().join("\n").trim().to_string();
            Some(Slide {
                title,
                body,
                ..Slide::default()
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_map_to_commands() {
        assert_eq!(command_for_key("ArrowRight"), Some(NavCommand::Next));
        assert_eq!(command_for_key("ArrowLeft"), Some(NavCommand::Previous));
        assert_eq!(command_for_key("Home"), Some(NavCommand::First));
        assert_eq!(command_for_key("End"), Some(NavCommand::Last));
        assert_eq!(command_for_key("F"), Some(NavCommand::ToggleFullscreen));
        assert_eq!(command_for_key("Escape"), Some(NavCommand::ExitFullscreen));
        assert_eq!(command_for_key("?"), Some(NavCommand::ToggleHelp));
        assert_eq!(command_for_key("x"), None);
    }

    #[test]
    fn swipes_need_to_cross_the_threshold() {
        assert_eq!(command_for_swipe(-80.0), Some(NavCommand::Next));
        assert_eq!(command_for_swipe(75.0), Some(NavCommand::Previous));
        assert_eq!(command_for_swipe(20.0), None);
    }

    #[test]
    fn index_is_clamped() {
        let mut nav = SlideNavigator::new(3, false);
        assert_eq!(nav.apply(NavCommand::Previous).index, 0);
        assert_eq!(nav.apply(NavCommand::GoTo(99)).index, 2);
        assert_eq!(nav.apply(NavCommand::Next).index, 2);
        assert_eq!(nav.apply(NavCommand::First).index, 0);
    }

    #[test]
    fn empty_deck_stays_at_zero() {
        let mut nav = SlideNavigator::new(0, true);
        let state = nav.apply(NavCommand::Next);
        assert_eq!(state.index, 0);
        assert_eq!(state.viewed_count, 0);
        assert!(!state.completed_now);
    }

    #[test]
    fn completion_fires_once_after_every_slide_is_viewed() {
        let mut nav = SlideNavigator::new(3, true);
        assert!(!nav.apply(NavCommand::Last).completed_now);
        assert!(nav.apply(NavCommand::Previous).completed_now);
        assert!(nav.is_completed());
        assert!(!nav.apply(NavCommand::First).completed_now);
    }

    #[test]
    fn single_slide_deck_completes_on_open() {
        let mut nav = SlideNavigator::new(1, true);
        assert!(nav.is_completed());
        let opened = nav.opening_state();
        assert!(opened.completed_now);
        assert_eq!(opened.viewed_count, 1);
        for command in [NavCommand::Next, NavCommand::First, NavCommand::Last, NavCommand::GoTo(0)] {
            assert!(!nav.apply(command).completed_now);
        }
    }

    #[test]
    fn single_slide_deck_without_full_viewing_never_completes() {
        let nav = SlideNavigator::new(1, false);
        assert!(!nav.opening_state().completed_now);
        assert!(!nav.is_completed());
    }

    #[test]
    fn empty_deck_never_completes_on_open() {
        let nav = SlideNavigator::new(0, true);
        assert!(!nav.opening_state().completed_now);
        assert!(!nav.is_completed());
        assert_eq!(nav.slide_count(), 0);
    }

    #[test]
    fn completion_requires_full_viewing_flag() {
        let mut nav = SlideNavigator::new(2, false);
        assert!(!nav.apply(NavCommand::Next).completed_now);
        assert!(!nav.is_completed());
        assert_eq!(nav.viewed_count(), 2);
    }

    #[test]
    fn escape_closes_fullscreen_and_help() {
        let mut nav = SlideNavigator::new(2, false);
        nav.apply(NavCommand::ToggleFullscreen);
        let state = nav.apply(NavCommand::ToggleHelp);
        assert!(state.fullscreen && state.show_help);
        let state = nav.apply(NavCommand::ExitFullscreen);
        assert!(!state.fullscreen && !state.show_help);
    }

    #[test]
    fn slide_export_splits_on_separators() {
        let text = "Cells\nThe basic unit of life.\n---\n\nOrganelles\nMitochondria\nRibosomes\u{c}Summary\n---\n   \n";
        let slides = split_slide_export(text);
        assert_eq!(slides.len(), 3);
        assert_eq!(slides[0].title, "Cells");
        assert_eq!(slides[0].body, "The basic unit of life.");
        assert_eq!(slides[1].title, "Organelles");
        assert_eq!(slides[1].body, "Mitochondria\nRibosomes");
        assert_eq!(slides[2].title, "Summary");
        assert_eq!(slides[2].body, "");
    }
}
