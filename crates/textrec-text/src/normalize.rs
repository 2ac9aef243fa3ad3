//! Text normalization shared by the build pipeline and the query path.
//!
//! Both sides must produce byte-identical cleaned text for the same input, so
//! there is exactly one implementation and it is constructed once per process.

use crate::lemmatize::Lemmatizer;
use crate::stopwords::StopWords;

/// Immutable normalizer: lowercases, keeps ASCII letters and whitespace, drops
/// stop words and lemmatizes what is left.
#[derive(Debug, Clone)]
pub struct Normalizer {
	stop_words: StopWords,
	lemmatizer: Lemmatizer,
}

impl Default for Normalizer {
	fn default() -> Self { Self::english() }
}

impl Normalizer {
	pub fn new(stop_words: StopWords, lemmatizer: Lemmatizer) -> Self { Self { stop_words, lemmatizer } }

	pub fn english() -> Self { Self::new(StopWords::english(), Lemmatizer::new()) }

	/// Cleaned tokens in input order.
	pub fn tokens(&self, raw: &str) -> Vec<String> {
		let lowered: String = raw
			.to_lowercase()
			.chars()
			.filter(|c| c.is_ascii_alphabetic() || c.is_whitespace())
			.collect();

		lowered
			.split_whitespace()
			.filter(|word| !self.stop_words.contains(word))
			.map(|word| self.lemmatizer.lemmatize(word))
			// a lemma can itself be a stop word ("wills" -> "will")
			.filter(|lemma| !self.stop_words.contains(lemma))
			.collect()
	}

	/// Cleaned text: tokens joined by single spaces. Empty when nothing survives.
	pub fn clean(&self, raw: &str) -> String { self.tokens(raw).join(" ") }

	pub fn clean_all<'a, I>(&self, texts: I) -> Vec<String>
	where
		I: IntoIterator<Item = &'a str>,
	{
		texts.into_iter().map(|t| self.clean(t)).collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn strips_punctuation_digits_and_stop_words() {
		let n = Normalizer::english();
		assert_eq!(n.clean("The Cats sat on 2 mats!!"), "cat sat mat");
		assert_eq!(n.clean("Don't   stop\tbelieving..."), "dont stop believing");
	}

	#[test]
	fn empty_and_stop_word_only_inputs_are_empty() {
		let n = Normalizer::english();
		assert_eq!(n.clean(""), "");
		assert_eq!(n.clean("   \n"), "");
		assert_eq!(n.clean("the and of it 123 !!!"), "");
	}

	#[test]
	fn non_ascii_letters_are_removed() {
		let n = Normalizer::english();
		assert_eq!(n.clean("café naïve"), "caf nave");
	}

	#[test]
	fn clean_is_idempotent() {
		let n = Normalizer::english();
		for raw in [
			"The children were playing with their toys in the gardens",
			"Glasses, businesses & analyses: 42 theses about OURS and yours",
			"Héllo wörld, cats and dogs!",
			"",
		] {
			let once = n.clean(raw);
			assert_eq!(n.clean(&once), once, "{raw}");
		}
	}
}
