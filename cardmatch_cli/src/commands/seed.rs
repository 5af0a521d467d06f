//! The `seed` subcommand: import reference sets and cards from JSON.
//!
//! The input is a JSON array of sets, each carrying its cards inline:
//!
//! ```json
//! [
//!   {
//!     "name": "Base Set",
//!     "year": 1999,
//!     "series": "Base",
//!     "card_count": 102,
//!     "cards": [
//!       { "name": "Charizard", "number": "4/102", "rarity": "Holo Rare" }
//!     ]
//!   }
//! ]
//! ```

use std::path::{Path, PathBuf};

use anyhow::Result;
use cardmatch_lib::{NewCard, NewSet, SqliteStore};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Deserialize;

/// Arguments for the `seed` subcommand.
#[derive(Args)]
pub struct SeedArgs {
    /// JSON file with sets and their cards
    pub input: PathBuf,
}

#[derive(Deserialize)]
struct SeedSet {
    #[serde(flatten)]
    set: NewSet,
    #[serde(default)]
    cards: Vec<NewCard>,
}

pub fn run(args: &SeedArgs, db: &Path) -> Result<()> {
    let content = std::fs::read_to_string(&args.input)?;
    let seed: Vec<SeedSet> = serde_json::from_str(&content)?;

    let store = SqliteStore::open(db)?;
    store.init()?;

    let bar = ProgressBar::new(seed.len() as u64);
    bar.set_style(ProgressStyle::with_template(
        "{bar:40.cyan/blue} {pos}/{len} {msg}",
    )?);

    let mut card_count = 0usize;
    for entry in &seed {
        let set_id = store.upsert_set(&entry.set)?;
        for card in &entry.cards {
            store.upsert_card(set_id, card)?;
            card_count += 1;
        }
        bar.inc(1);
    }
    bar.finish_and_clear();

    eprintln!(
        "Imported {} sets and {} cards into {}",
        seed.len(),
        card_count,
        db.display()
    );
    Ok(())
}
