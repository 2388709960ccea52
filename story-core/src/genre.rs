//! Genre catalogue for Quick Start.

use rand::Rng;

/// A genre the quick-start flow can invent a story in.
#[derive(Debug, Clone)]
pub struct Genre {
    pub name: &'static str,
    /// Flavor hints passed to the generator.
    pub hints: &'static str,
    pub tags: Vec<&'static str>,
}

impl Genre {
    pub fn new(name: &'static str, hints: &'static str) -> Self {
        Self {
            name,
            hints,
            tags: Vec::new(),
        }
    }

    pub fn with_tags(mut self, tags: Vec<&'static str>) -> Self {
        self.tags = tags;
        self
    }
}

lazy_static::lazy_static! {
    /// Built-in quick-start genres.
    pub static ref GENRES: Vec<Genre> = vec![
        Genre::new("Fantasy", "magic, ancient kingdoms, quests, mythical creatures")
            .with_tags(vec!["fantasy", "adventure"]),
        Genre::new("Science Fiction", "starships, alien worlds, strange technology, first contact")
            .with_tags(vec!["sci-fi", "space"]),
        Genre::new("Mystery", "a puzzling crime, unreliable witnesses, hidden motives, clues")
            .with_tags(vec!["mystery", "detective"]),
        Genre::new("Horror", "creeping dread, isolation, something wrong in the dark")
            .with_tags(vec!["horror", "suspense"]),
        Genre::new("Romance", "chance meetings, longing, misunderstandings, tender moments")
            .with_tags(vec!["romance", "drama"]),
        Genre::new("Post-Apocalyptic", "ruined cities, scarce resources, wary survivors")
            .with_tags(vec!["post-apocalyptic", "survival"]),
        Genre::new("Cyberpunk", "neon megacities, megacorporations, hackers, augmentations")
            .with_tags(vec!["cyberpunk", "sci-fi"]),
        Genre::new("Historical", "a vivid real era, period detail, people caught in great events")
            .with_tags(vec!["historical", "drama"]),
        Genre::new("Comedy", "absurd situations, witty banter, escalating mishaps")
            .with_tags(vec!["comedy", "lighthearted"]),
        Genre::new("Western", "dusty frontier towns, outlaws, lawmen, long rides")
            .with_tags(vec!["western", "adventure"]),
    ];
}

/// Look up a genre by name, ignoring case.
pub fn find_genre(name: &str) -> Option<&'static Genre> {
    let name = name.trim();
    GENRES.iter().find(|g| g.name.eq_ignore_ascii_case(name))
}

/// Pick a genre at random.
pub fn random_genre() -> &'static Genre {
    random_genre_with_rng(&mut rand::thread_rng())
}

/// Pick a genre with a caller-supplied RNG.
pub fn random_genre_with_rng<R: Rng>(rng: &mut R) -> &'static Genre {
    &GENRES[rng.gen_range(0..GENRES.len())]
}
