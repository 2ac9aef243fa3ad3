//! Rule-based English noun lemmatizer.
//!
//! Irregular plurals come from an exception table; regular plurals are
//! handled by suffix rules. Words that look plural but are not (`series`,
//! `analysis`, `glass`) are left alone. [`Lemmatizer::lemmatize`] applies the
//! rules until nothing changes, so a lemma is always its own lemma.

use std::collections::{HashMap, HashSet};

const IRREGULAR: &[(&str, &str)] = &[
	("men", "man"), ("women", "woman"), ("children", "child"), ("people", "person"),
	("feet", "foot"), ("teeth", "tooth"), ("geese", "goose"), ("mice", "mouse"),
	("lice", "louse"), ("oxen", "ox"), ("data", "datum"), ("criteria", "criterion"),
	("phenomena", "phenomenon"), ("analyses", "analysis"), ("crises", "crisis"),
	("theses", "thesis"), ("diagnoses", "diagnosis"), ("indices", "index"),
	("matrices", "matrix"), ("vertices", "vertex"), ("wolves", "wolf"), ("knives", "knife"),
	("lives", "life"), ("wives", "wife"), ("leaves", "leaf"), ("halves", "half"),
	("shelves", "shelf"), ("loaves", "loaf"), ("thieves", "thief"), ("calves", "calf"),
	("movies", "movie"), ("cookies", "cookie"), ("calories", "calorie"), ("zombies", "zombie"),
	("pies", "pie"), ("ties", "tie"), ("lies", "lie"), ("dies", "die"), ("shoes", "shoe"),
	("toes", "toe"), ("buses", "bus"), ("gases", "gas"), ("potatoes", "potato"),
	("tomatoes", "tomato"), ("heroes", "hero"), ("echoes", "echo"), ("cacti", "cactus"),
	("fungi", "fungus"), ("alumni", "alumnus"), ("radii", "radius"), ("goes", "go"),
	("does", "do"), ("canoes", "canoe"),
];

const INVARIANT: &[&str] = &[
	"series", "species", "news", "means", "physics", "mathematics", "economics", "politics",
	"ethics", "athletics", "gymnastics", "lens", "chaos", "bias", "atlas", "canvas", "yes",
	"always", "perhaps", "sometimes", "afterwards", "towards", "besides", "nowadays", "thanks",
	"whereas", "overseas", "alias", "upstairs", "downstairs", "indoors", "outdoors",
];

/// Shared, immutable lemmatizer. Build once, pass by reference.
#[derive(Debug, Clone)]
pub struct Lemmatizer {
	irregular: HashMap<&'static str, &'static str>,
	invariant: HashSet<&'static str>,
}

impl Default for Lemmatizer {
	fn default() -> Self {
		Self { irregular: IRREGULAR.iter().copied().collect(), invariant: INVARIANT.iter().copied().collect() }
	}
}

impl Lemmatizer {
	pub fn new() -> Self { Self::default() }

	/// Lemma of a lowercase ASCII word.
	pub fn lemmatize(&self, word: &str) -> String {
		let mut current = word.to_string();
		// every rule shortens the word or lands on a fixed point
		while let Some(next) = self.step(&current) {
			if next == current { break; }
			current = next;
		}
		current
	}

	fn step(&self, w: &str) -> Option<String> {
		if let Some(base) = self.irregular.get(w) { return Some((*base).to_string()); }
		if self.invariant.contains(w) { return None; }
		let n = w.len();
		if n > 4 && w.ends_with("ies") {
			return Some(format!("{}y", &w[..n - 3]));
		}
		if w.ends_with("sses") {
			return Some(w[..n - 2].to_string());
		}
		if n > 4 && ["xes", "zzes", "ches", "shes"].iter().any(|s| w.ends_with(s)) {
			return Some(w[..n - 2].to_string());
		}
		if ["ss", "us", "is"].iter().any(|s| w.ends_with(s)) {
			return None;
		}
		if n > 3 && w.ends_with('s') {
			return Some(w[..n - 1].to_string());
		}
		None
	}
}
