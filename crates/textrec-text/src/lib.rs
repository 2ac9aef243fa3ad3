pub mod lemmatize;
pub mod normalize;
pub mod stopwords;
pub mod tfidf;

pub use lemmatize::Lemmatizer;
pub use normalize::Normalizer;
pub use stopwords::StopWords;
pub use tfidf::TfidfVectorizer;
