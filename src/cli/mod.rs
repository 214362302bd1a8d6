use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config;
use crate::domain::{track::TrackId, video::VideoId};
use crate::platform::{plex::PlexClient, youtube::YouTubeClient};
use crate::prompt::StdinChooser;
use crate::storage::db::i64_seconds_to_local_time;
use crate::storage::operations::MatchStore;
use crate::sync::{self, Orchestrator, RunReport};

#[derive(Parser)]
#[command(name = "plextube")]
#[command(version = "0.1")]
#[command(about = "Keeps YouTube video playlists in step with Plex music playlists")]
pub struct Cli {
    /// Path to the config TOML file
    #[arg(short, long, default_value = "plextube.toml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Find a video for every track of the configured playlists
    Match {
        /// Only reuse confirmed matches, never search or prompt
        #[arg(long)]
        update_only: bool,
    },
    /// Point a track at an explicit video, overriding its stored match
    ReMatch {
        /// Plex rating key of the track
        track_id: String,
        /// YouTube video id it should map to
        video_id: String,
    },
    /// Reconcile every configured playlist pair on YouTube
    Sync,
    /// Report stored matches whose video is gone from the live playlist
    CheckTracks,
    /// List stored matches
    ListMatches,
    /// List playlist pairings
    ListPlaylists,
}

/// Entrypoint for CLI
pub fn run() {
    env_logger::init();
    let cli = Cli::parse();

    let cfg = config::Config::load(cli.config.to_str().unwrap()).unwrap();

    match &cli.command {
        Commands::Match { update_only } => {
            let mut store = MatchStore::new(&cfg.database).expect("Failed to open match store");
            let plex = PlexClient::new(&cfg.plex).expect("Failed to build Plex client");
            let youtube = YouTubeClient::new(&cfg.youtube).expect("Failed to build YouTube client");
            let chooser = StdinChooser::new();

            let mut orchestrator =
                Orchestrator::new(&mut store, &plex, &youtube, &youtube, &chooser);
            let report = orchestrator
                .match_all(&cfg.sync, *update_only)
                .expect("match run failed");
            print_report(&report, false);
        }

        Commands::ReMatch { track_id, video_id } => {
            let mut store = MatchStore::new(&cfg.database).expect("Failed to open match store");

            match store.re_match(&TrackId::new(track_id.clone()), &VideoId::new(video_id.clone()))
            {
                Ok(m) => println!(
                    "{} - {} now maps to {}, run \"sync\" to apply it",
                    m.artist, m.title, m.video_id
                ),
                Err(e) => println!("re-match failed: {e}"),
            }
        }

        Commands::Sync => {
            let mut store = MatchStore::new(&cfg.database).expect("Failed to open match store");
            let plex = PlexClient::new(&cfg.plex).expect("Failed to build Plex client");
            let youtube = YouTubeClient::new(&cfg.youtube).expect("Failed to build YouTube client");
            let chooser = StdinChooser::new();

            let mut orchestrator =
                Orchestrator::new(&mut store, &plex, &youtube, &youtube, &chooser);
            let report = orchestrator.sync_all(&cfg.sync).expect("sync run failed");
            print_report(&report, true);
        }

        Commands::CheckTracks => {
            let store = MatchStore::new(&cfg.database).expect("Failed to open match store");
            let youtube = YouTubeClient::new(&cfg.youtube).expect("Failed to build YouTube client");

            let entries = sync::check_tracks(&store, &youtube).expect("audit failed");
            if entries.is_empty() {
                println!("All applied matches still resolve.");
            } else {
                println!("Videos no longer present on YouTube:");
                for entry in &entries {
                    println!(
                        "  [GONE] {} - {} ({}) in '{}', track {}",
                        entry.artist,
                        entry.track_title,
                        entry.video_id,
                        entry.playlist_title,
                        entry.track_id
                    );
                }
                println!(
                    "{} match(es) need a \"re-match <track-id> <video-id>\"",
                    entries.len()
                );
            }
        }

        Commands::ListMatches => {
            let store = MatchStore::new(&cfg.database).expect("Failed to open match store");

            for m in store.list_matches().unwrap() {
                let state = if m.confirmed { "confirmed" } else { "pending" };
                println!("Track {}: {} - {}", m.track_id, m.artist, m.title);
                println!(
                    "    -> {} ({}, updated {})",
                    m.video_id,
                    state,
                    i64_seconds_to_local_time(m.updated_at).unwrap()
                );
            }
        }

        Commands::ListPlaylists => {
            let store = MatchStore::new(&cfg.database).expect("Failed to open match store");

            for link in store.links().unwrap() {
                println!("Playlist '{}'", link.title);
                println!("    plex    {}", link.source_playlist_id);
                println!("    youtube {}", link.target_playlist_id);
                println!("    {} item(s) applied at last sync", link.snapshot.len());
            }
        }
    }
}

fn print_report(report: &RunReport, with_mutations: bool) {
    if report.playlists.is_empty() {
        println!("Nothing to do: no configured playlists were found.");
        return;
    }

    for pr in &report.playlists {
        println!("Playlist: {}", pr.title);
        println!(
            "  {} matched, {} skipped, {} failed",
            pr.matched, pr.skipped, pr.failed
        );
        if with_mutations {
            if pr.applied {
                println!("  applied {} additions, {} removals", pr.added, pr.removed);
            } else {
                println!(
                    "  NOT applied ({} additions, {} removals pending), will retry next run",
                    pr.added, pr.removed
                );
            }
        }
    }
}
