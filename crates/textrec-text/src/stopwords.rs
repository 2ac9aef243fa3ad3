use std::collections::HashSet;

/// English stop words (NLTK list), letter-only entries. Contracted forms such
/// as "don't" are omitted: punctuation is stripped before matching, so they
/// could never match anyway.
pub const ENGLISH_STOP_WORDS: &[&str] = &[
	"i","me","my","myself","we","our","ours","ourselves","you","your","yours","yourself","yourselves",
	"he","him","his","himself","she","her","hers","herself","it","its","itself","they","them","their",
	"theirs","themselves","what","which","who","whom","this","that","these","those","am","is","are",
	"was","were","be","been","being","have","has","had","having","do","does","did","doing","a","an",
	"the","and","but","if","or","because","as","until","while","of","at","by","for","with","about",
	"against","between","into","through","during","before","after","above","below","to","from","up",
	"down","in","out","on","off","over","under","again","further","then","once","here","there","when",
	"where","why","how","all","any","both","each","few","more","most","other","some","such","no","nor",
	"not","only","own","same","so","than","too","very","s","t","can","will","just","don","should","now",
	"d","ll","m","o","re","ve","y","ain","aren","couldn","didn","doesn","hadn","hasn","haven","isn","ma",
	"mightn","mustn","needn","shan","shouldn","wasn","weren","won","wouldn",
];

/// Immutable stop-word set, built once and shared.
#[derive(Debug, Clone)]
pub struct StopWords {
	words: HashSet<String>,
}

impl StopWords {
	pub fn new<I, S>(words: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: AsRef<str>,
	{
		Self { words: words.into_iter().map(|w| w.as_ref().to_lowercase()).collect() }
	}

	pub fn english() -> Self { Self::new(ENGLISH_STOP_WORDS) }

	/// Exact match against the lowercased set; callers lowercase first.
	pub fn contains(&self, word: &str) -> bool { self.words.contains(word) }

	pub fn len(&self) -> usize { self.words.len() }
	pub fn is_empty(&self) -> bool { self.words.is_empty() }
}
