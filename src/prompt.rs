//! Interactive candidate selection on stdin.

use std::io::{self, BufRead, Write};

use crate::{
    domain::{
        track::Track,
        video::{VideoCandidate, VideoId},
    },
    platform::ChooseCandidate,
};

/// Presents the ranked candidates on the terminal: pick one by number,
/// paste a custom video id, or skip the track for this run.
pub struct StdinChooser;

impl StdinChooser {
    pub fn new() -> Self {
        Self
    }
}

impl Default for StdinChooser {
    fn default() -> Self {
        Self::new()
    }
}

impl ChooseCandidate for StdinChooser {
    fn choose(&self, track: &Track, candidates: &[VideoCandidate]) -> Option<VideoId> {
        let album = track
            .album
            .as_deref()
            .map(|album| format!(" ({album})"))
            .unwrap_or_default();
        println!();
        println!("Track: {} - {}{album}", track.artist, track.title);
        println!("  0. Skip this track");
        println!("  c. Enter a custom video id");
        for (i, candidate) in candidates.iter().enumerate() {
            let duration = candidate
                .duration
                .map(|d| format!(" [{}:{:02}]", d.as_secs() / 60, d.as_secs() % 60))
                .unwrap_or_default();
            println!(
                "  {}. {} ({}){duration} {}",
                i + 1,
                candidate.title,
                candidate.channel,
                candidate.watch_url()
            );
        }

        let stdin = io::stdin();
        loop {
            print!("Select an option: ");
            io::stdout().flush().ok();

            let mut line = String::new();
            if stdin.lock().read_line(&mut line).is_err() {
                return None;
            }
            let input = line.trim();

            if input.is_empty() || input == "0" {
                return None;
            }

            if input == "c" {
                print!("Video id: ");
                io::stdout().flush().ok();
                let mut id = String::new();
                if stdin.lock().read_line(&mut id).is_err() {
                    return None;
                }
                let id = id.trim();
                if !id.is_empty() {
                    return Some(VideoId::new(id));
                }
                continue;
            }

            if let Ok(n) = input.parse::<usize>() {
                if (1..=candidates.len()).contains(&n) {
                    return Some(candidates[n - 1].id.clone());
                }
            }
            println!("Please answer 0, c, or 1..{}", candidates.len());
        }
    }
}
